//! Picks the response served for a matched endpoint.

use rand::Rng;
use tracing::debug;

use super::round_robin::RoundRobinScheduler;
use crate::exchange::RequestData;
use crate::matching::response_matches;
use crate::model::{Endpoint, MockResponse, ResponseMode};

/// Select one of `responses` for `request`.
///
/// Responses whose rules reject the request are dropped first; when that
/// leaves nothing, every response stays a candidate. Candidates are ordered
/// by descending priority (stable for equal priorities) and picked according
/// to the endpoint's [`ResponseMode`].
pub fn select_response<'a>(
    endpoint: &Endpoint,
    responses: &'a [MockResponse],
    request: &RequestData,
    scheduler: &RoundRobinScheduler,
) -> Option<&'a MockResponse> {
    if responses.is_empty() {
        return None;
    }

    let mut candidates: Vec<&MockResponse> = responses
        .iter()
        .filter(|response| response_matches(response, request))
        .collect();

    if candidates.is_empty() {
        debug!(
            "No response of endpoint {} passed its rules, using all {}",
            endpoint.id,
            responses.len()
        );
        candidates = responses.iter().collect();
    }

    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));

    match endpoint.response_mode {
        ResponseMode::Static => candidates.first().copied(),
        ResponseMode::Random => {
            let index = rand::thread_rng().gen_range(0..candidates.len());
            candidates.get(index).copied()
        }
        ResponseMode::RoundRobin => scheduler.next(&endpoint.id, &candidates).copied(),
    }
}
