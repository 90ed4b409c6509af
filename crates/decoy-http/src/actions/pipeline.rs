//! Ordered execution of a project's actions at one execution point.

use std::sync::Arc;
use tracing::{debug, warn};

use super::config::ActionConfig;
use super::filter::should_execute;
use super::replace_text;
use super::script::ScriptSandbox;
use super::{ActionContext, ActionError};
use crate::exchange::{RequestData, ResponseData};
use crate::metrics;
use crate::model::Action;
use crate::store::ActionStore;

/// Action ids grouped by what happened to them during one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
    /// `(action id, error message)`
    pub failed: Vec<(String, String)>,
}

pub struct ActionPipeline {
    store: Arc<dyn ActionStore>,
    sandbox: ScriptSandbox,
}

impl ActionPipeline {
    pub fn new(store: Arc<dyn ActionStore>, sandbox: ScriptSandbox) -> Self {
        Self { store, sandbox }
    }

    /// Run `before_request` actions, which may rewrite `request`.
    pub async fn run_before(&self, project_id: &str, request: &mut RequestData) -> PipelineReport {
        self.run(project_id, ActionContext::Before { request }).await
    }

    /// Run `after_request` actions, which may rewrite `response`.
    pub async fn run_after(
        &self,
        project_id: &str,
        request: &RequestData,
        response: &mut ResponseData,
    ) -> PipelineReport {
        self.run(project_id, ActionContext::After { request, response })
            .await
    }

    async fn run(&self, project_id: &str, mut ctx: ActionContext<'_>) -> PipelineReport {
        let mut report = PipelineReport::default();
        let point = ctx.point();

        let actions = match self.store.list_enabled_actions(project_id, point).await {
            Ok(actions) => actions,
            Err(e) => {
                warn!(
                    "Failed to load {} actions for project {}: {}",
                    point.as_str(),
                    project_id,
                    e
                );
                return report;
            }
        };

        for action in &actions {
            if !should_execute(&action.filters, ctx.request(), ctx.response()) {
                debug!(action = %action.id, "Action filters did not match, skipping");
                metrics::record_action(&action.action_type, "skipped");
                report.skipped.push(action.id.clone());
                continue;
            }

            match self.execute(action, &mut ctx).await {
                Ok(()) => {
                    metrics::record_action(&action.action_type, "success");
                    report.executed.push(action.id.clone());
                }
                Err(e) => {
                    for line in e.logs() {
                        debug!(action = %action.id, "console: {}", line);
                    }
                    warn!(
                        action = %action.id,
                        point = point.as_str(),
                        "Action '{}' failed: {}",
                        action.name,
                        e
                    );
                    metrics::record_action(&action.action_type, "failure");
                    report.failed.push((action.id.clone(), e.to_string()));
                }
            }
        }

        report
    }

    async fn execute(&self, action: &Action, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        match ActionConfig::from_action(action)? {
            ActionConfig::ReplaceText(config) => {
                replace_text::apply(&config, ctx);
                Ok(())
            }
            ActionConfig::RunJavascript(config) => {
                let outcome = self.sandbox.run(&config.script, ctx).await?;
                for line in outcome.logs {
                    debug!(action = %action.id, "console: {}", line);
                }
                Ok(())
            }
        }
    }
}
