//! Artificial response latency.
//!
//! One delay applies per request, resolved response first, then endpoint,
//! then project. A level whose value is absent, non-positive or malformed is
//! skipped. A response delay above the 120 s ceiling is clamped to it.

use std::time::Duration;
use tracing::debug;

use crate::model::{AdvanceConfig, Endpoint, MockResponse, Project, MAX_DELAY_MS};

/// Which configuration level supplied the delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelaySource {
    Response,
    Endpoint,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    pub duration: Duration,
    pub source: DelaySource,
}

impl Delay {
    /// Suspend the current task for the delay.
    pub async fn wait(&self) {
        debug!(
            "Applying {:?}-level delay of {}ms",
            self.source,
            self.duration.as_millis()
        );
        tokio::time::sleep(self.duration).await;
    }
}

/// Resolve the effective delay for a request.
pub fn resolve_delay(
    project: &Project,
    endpoint: Option<&Endpoint>,
    response: Option<&MockResponse>,
) -> Option<Delay> {
    let from_response = response
        .map(|r| r.delay_ms)
        .filter(|ms| *ms > 0)
        .map(|ms| Delay {
            duration: Duration::from_millis(ms.min(MAX_DELAY_MS) as u64),
            source: DelaySource::Response,
        });

    let from_endpoint = || {
        endpoint
            .and_then(|e| AdvanceConfig::parse(e.advance_config.as_deref()).delay())
            .map(|duration| Delay {
                duration,
                source: DelaySource::Endpoint,
            })
    };

    let from_project = || {
        AdvanceConfig::parse(project.advance_config.as_deref())
            .delay()
            .map(|duration| Delay {
                duration,
                source: DelaySource::Project,
            })
    };

    from_response.or_else(from_endpoint).or_else(from_project)
}

/// Resolve and apply the delay in one step.
pub async fn apply_delay(
    project: &Project,
    endpoint: Option<&Endpoint>,
    response: Option<&MockResponse>,
) {
    if let Some(delay) = resolve_delay(project, endpoint, response) {
        delay.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResponseMode, RulesLogic};
    use std::time::Instant;

    fn project(delay: Option<&str>) -> Project {
        Project {
            id: "p1".to_string(),
            alias: "shop".to_string(),
            advance_config: delay.map(str::to_string),
            ..Default::default()
        }
    }

    fn endpoint(delay: Option<&str>) -> Endpoint {
        Endpoint {
            id: "e1".to_string(),
            project_id: "p1".to_string(),
            method: "GET".to_string(),
            path: "/".to_string(),
            enabled: true,
            response_mode: ResponseMode::Static,
            advance_config: delay.map(str::to_string),
            use_proxy: false,
            proxy_target_id: None,
        }
    }

    fn response(delay_ms: i64) -> MockResponse {
        MockResponse {
            id: "r1".to_string(),
            endpoint_id: "e1".to_string(),
            status_code: 200,
            body: String::new(),
            headers: None,
            priority: 0,
            delay_ms,
            stream: false,
            enabled: true,
            rules: vec![],
            rules_logic: RulesLogic::Or,
        }
    }

    fn resolved_ms(delay: Option<Delay>) -> u128 {
        delay.map(|d| d.duration.as_millis()).unwrap_or(0)
    }

    #[test]
    fn test_cascade() {
        let project = project(Some(r#"{"delayMs":200}"#));
        let endpoint_with = endpoint(Some(r#"{"delayMs":80}"#));
        let endpoint_without = endpoint(None);

        let delay = resolve_delay(&project, Some(&endpoint_with), Some(&response(20)));
        assert_eq!(resolved_ms(delay), 20);
        assert_eq!(delay.unwrap().source, DelaySource::Response);

        let delay = resolve_delay(&project, Some(&endpoint_with), Some(&response(0)));
        assert_eq!(resolved_ms(delay), 80);
        assert_eq!(delay.unwrap().source, DelaySource::Endpoint);

        let delay = resolve_delay(&project, Some(&endpoint_without), Some(&response(0)));
        assert_eq!(resolved_ms(delay), 200);
        assert_eq!(delay.unwrap().source, DelaySource::Project);
    }

    #[test]
    fn test_no_delay_anywhere() {
        let delay = resolve_delay(&project(None), Some(&endpoint(None)), Some(&response(0)));
        assert!(delay.is_none());
    }

    #[test]
    fn test_invalid_levels_fall_through() {
        let project = project(Some(r#"{"delayMs":30}"#));
        let endpoint = endpoint(Some("{broken"));
        let delay = resolve_delay(&project, Some(&endpoint), Some(&response(-10)));
        assert_eq!(resolved_ms(delay), 30);
    }

    #[test]
    fn test_oversized_response_delay_is_clamped() {
        let endpoint = endpoint(Some(r#"{"delayMs":80}"#));
        let delay = resolve_delay(&project(None), Some(&endpoint), Some(&response(500_000)));
        assert_eq!(resolved_ms(delay), MAX_DELAY_MS as u128);
        assert_eq!(delay.unwrap().source, DelaySource::Response);
    }

    #[test]
    fn test_project_only_when_no_endpoint() {
        let project = project(Some(r#"{"delayMs":15}"#));
        assert_eq!(resolved_ms(resolve_delay(&project, None, None)), 15);
    }

    #[tokio::test]
    async fn test_apply_delay_suspends() {
        let project = project(None);
        let start = Instant::now();
        apply_delay(&project, Some(&endpoint(None)), Some(&response(20))).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
