//! Action filters.

use crate::exchange::{RequestData, ResponseData};
use crate::matching::ValueMatcher;
use crate::model::{ActionFilter, FilterType};

/// Whether an action with `filters` should run. Filters are OR-combined and
/// an empty set always runs.
pub fn should_execute(
    filters: &[ActionFilter],
    request: &RequestData,
    response: Option<&ResponseData>,
) -> bool {
    filters.is_empty()
        || filters
            .iter()
            .any(|filter| filter_matches(filter, request, response))
}

pub fn filter_matches(
    filter: &ActionFilter,
    request: &RequestData,
    response: Option<&ResponseData>,
) -> bool {
    let actual = match &filter.filter_type {
        FilterType::Method => request.method.as_str().to_string(),
        FilterType::Path => request.path.clone(),
        FilterType::Header => request.header(&filter.key).to_string(),
        FilterType::StatusCode => match response {
            Some(response) => response.status.as_u16().to_string(),
            None => return false,
        },
        FilterType::Unknown(_) => return false,
    };

    ValueMatcher::compile(&filter.operator, &filter.value)
        .is_some_and(|matcher| matcher.matches(&actual))
}
