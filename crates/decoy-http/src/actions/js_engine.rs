//! Boa-backed evaluation of `run_javascript` scripts.
//!
//! Each call builds a fresh [`Context`] on the calling thread, so no state
//! leaks between invocations. `console.log` writes to a per-thread sink that
//! the caller shares with the sandbox to recover output after a timeout.
//!
//! Scripts run through boa's budgeted evaluator on a current-thread runtime.
//! The VM yields every [`EVAL_BUDGET`] cost units, which is where the deadline
//! drops the evaluation and the script stops.

use boa_engine::{
    js_string, native_function::NativeFunction, object::builtins::JsArray, property::PropertyKey,
    script::Script, Context, JsError, JsNativeError, JsObject, JsResult, JsValue, Source,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::cell::RefCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) type LogSink = Arc<Mutex<Vec<String>>>;

/// VM cost units between deadline checks.
const EVAL_BUDGET: u32 = 4096;

/// Deepest object nesting accepted when reading values back out of a script.
pub(crate) const MAX_VALUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy)]
pub(crate) struct EvalLimits {
    pub deadline: Duration,
    pub loop_iteration_limit: u64,
}

#[derive(Debug)]
pub(crate) enum EvalFailure {
    Error(String),
    Interrupted,
}

thread_local! {
    static CONSOLE_SINK: RefCell<Option<LogSink>> = const { RefCell::new(None) };
}

fn create_js_object(context: &Context) -> JsObject {
    JsObject::with_object_proto(context.intrinsics())
}

/// Evaluate `script` against `input` (`{"request": .., "response": ..}`) and
/// return the possibly mutated `request` and `response` bindings.
pub(crate) fn execute(
    script: &str,
    input: &Value,
    limits: EvalLimits,
    logs: LogSink,
) -> Result<Value, EvalFailure> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| EvalFailure::Error(format!("failed to build script runtime: {e}")))?;
    let deadline = Instant::now() + limits.deadline;

    CONSOLE_SINK.with(|s| *s.borrow_mut() = Some(logs));
    let result = runtime.block_on(execute_inner(script, input, limits, deadline));
    CONSOLE_SINK.with(|s| *s.borrow_mut() = None);
    result
}

async fn execute_inner(
    script: &str,
    input: &Value,
    limits: EvalLimits,
    deadline: Instant,
) -> Result<Value, EvalFailure> {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(limits.loop_iteration_limit);
    let compiled = prepare(&mut context, script, input).map_err(script_error)?;

    let evaluation = compiled.evaluate_async_with_budget(&mut context, EVAL_BUDGET);
    let result = match tokio::time::timeout_at(deadline.into(), evaluation).await {
        Ok(result) => result.map_err(script_error)?,
        Err(_) => return Err(EvalFailure::Interrupted),
    };

    let mut converter = Converter::new(deadline);
    match converter.to_json(&mut context, &result) {
        Ok(value) => Ok(value),
        Err(_) if converter.expired => Err(EvalFailure::Interrupted),
        Err(e) => Err(script_error(e)),
    }
}

fn script_error(e: JsError) -> EvalFailure {
    EvalFailure::Error(e.to_string())
}

/// Install `console` and the exchange, then compile the wrapped script.
fn prepare(context: &mut Context, script: &str, input: &Value) -> JsResult<Script> {
    let console = create_js_object(context);
    console.set(
        js_string!("log"),
        NativeFunction::from_fn_ptr(console_log).to_js_function(context.realm()),
        false,
        context,
    )?;
    context
        .global_object()
        .set(js_string!("console"), console, false, context)?;

    let exchange = json_to_js(context, input)?;
    context
        .global_object()
        .set(js_string!("__exchange"), exchange, false, context)?;

    let wrapped = format!(
        "(function() {{\n\
         var request = __exchange.request || null;\n\
         var response = __exchange.response || null;\n\
         (function() {{\n{script}\n}})();\n\
         return {{ request: request, response: response }};\n\
         }})()"
    );
    Script::parse(Source::from_bytes(wrapped.as_bytes()), None, context)
}

fn console_log(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        let part = if let Some(s) = arg.as_string() {
            s.to_std_string_escaped()
        } else if arg.is_object() {
            Converter::unbounded().to_json(ctx, arg)?.to_string()
        } else {
            arg.to_string(ctx)?.to_std_string_escaped()
        };
        parts.push(part);
    }
    let line = parts.join(" ");
    CONSOLE_SINK.with(|s| {
        if let Some(sink) = s.borrow().as_ref() {
            sink.lock().push(line);
        }
    });
    Ok(JsValue::undefined())
}

fn json_to_js(context: &mut Context, value: &Value) -> JsResult<JsValue> {
    match value {
        Value::Null => Ok(JsValue::null()),
        Value::Bool(b) => Ok(JsValue::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(JsValue::from(i))
            } else if let Some(f) = n.as_f64() {
                Ok(JsValue::from(f))
            } else {
                Ok(JsValue::null())
            }
        }
        Value::String(s) => Ok(JsValue::from(js_string!(s.clone()))),
        Value::Array(arr) => {
            let js_arr = JsArray::new(context);
            for (i, v) in arr.iter().enumerate() {
                let js_val = json_to_js(context, v)?;
                js_arr.set(i as u32, js_val, false, context)?;
            }
            Ok(js_arr.into())
        }
        Value::Object(obj) => {
            let js_obj = create_js_object(context);
            for (k, v) in obj {
                let js_val = json_to_js(context, v)?;
                js_obj.set(js_string!(k.clone()), js_val, false, context)?;
            }
            Ok(js_obj.into())
        }
    }
}

/// Reads script values back as JSON. Cyclic or overly deep objects are
/// rejected instead of recursing without bound.
struct Converter {
    ancestors: Vec<JsObject>,
    deadline: Option<Instant>,
    expired: bool,
}

impl Converter {
    fn new(deadline: Instant) -> Self {
        Self {
            ancestors: Vec::new(),
            deadline: Some(deadline),
            expired: false,
        }
    }

    fn unbounded() -> Self {
        Self {
            ancestors: Vec::new(),
            deadline: None,
            expired: false,
        }
    }

    fn to_json(&mut self, context: &mut Context, value: &JsValue) -> JsResult<Value> {
        if value.is_null() || value.is_undefined() {
            return Ok(Value::Null);
        }
        if let Some(b) = value.as_boolean() {
            return Ok(Value::Bool(b));
        }
        if let Some(n) = value.as_number() {
            // Integral numbers stay integers so status codes survive the trip.
            if n.fract() == 0.0 && n.abs() < 9.0e15 {
                return Ok(Value::from(n as i64));
            }
            return Ok(serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number));
        }
        if let Some(s) = value.as_string() {
            return Ok(Value::String(s.to_std_string_escaped()));
        }
        match value.as_object() {
            Some(obj) if obj.is_callable() => Ok(Value::Null),
            Some(obj) => {
                self.enter(obj)?;
                let result = self.object_to_json(context, obj);
                self.ancestors.pop();
                result
            }
            None => Ok(Value::Null),
        }
    }

    fn enter(&mut self, obj: &JsObject) -> JsResult<()> {
        self.check_deadline()?;
        if self.ancestors.iter().any(|a| JsObject::equals(a, obj)) {
            return Err(JsNativeError::typ()
                .with_message("cyclic object value")
                .into());
        }
        if self.ancestors.len() >= MAX_VALUE_DEPTH {
            return Err(JsNativeError::range()
                .with_message(format!("object nesting deeper than {MAX_VALUE_DEPTH}"))
                .into());
        }
        self.ancestors.push(obj.clone());
        Ok(())
    }

    fn object_to_json(&mut self, context: &mut Context, obj: &JsObject) -> JsResult<Value> {
        if obj.is_array() {
            let len = obj
                .get(js_string!("length"), context)?
                .as_number()
                .unwrap_or(0.0) as u32;
            let mut arr = Vec::new();
            for i in 0..len {
                if i % 1024 == 0 {
                    self.check_deadline()?;
                }
                let item = obj.get(i, context)?;
                arr.push(self.to_json(context, &item)?);
            }
            return Ok(Value::Array(arr));
        }

        let mut map = serde_json::Map::new();
        for key in obj.own_property_keys(context)? {
            let key_str = match &key {
                PropertyKey::String(s) => s.to_std_string_escaped(),
                PropertyKey::Index(i) => i.get().to_string(),
                PropertyKey::Symbol(_) => continue,
            };
            let val = obj.get(key.clone(), context)?;
            map.insert(key_str, self.to_json(context, &val)?);
        }
        Ok(Value::Object(map))
    }

    fn check_deadline(&mut self) -> JsResult<()> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.expired = true;
            return Err(JsNativeError::runtime_limit()
                .with_message("script deadline passed while reading its result")
                .into());
        }
        Ok(())
    }
}
