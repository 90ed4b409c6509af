//! Endpoint path patterns and their tie-break scoring.
//!
//! A pattern is compared against a request path after trimming slashes on
//! both sides:
//!
//! - exact equality scores [`EXACT_SCORE`] and wins over everything else;
//! - patterns containing regex metacharacters are anchored and scored
//!   [`REGEX_SCORE`] on a match;
//! - otherwise segments are walked pairwise: literal `+10`, `:param` `+8`,
//!   `*` `+6`, and any other mismatch rejects the pattern. A walk that used a
//!   wildcard lands at `60 + sum`, one that used a parameter at `80 + sum`.

use regex::Regex;
use tracing::debug;

use crate::model::Endpoint;

pub const NO_MATCH: i32 = -1;
pub const EXACT_SCORE: i32 = 100;
pub const REGEX_SCORE: i32 = 40;

const PARAM_BASE: i32 = 80;
const WILDCARD_BASE: i32 = 60;
const LITERAL_SEGMENT: i32 = 10;
const PARAM_SEGMENT: i32 = 8;
const WILDCARD_SEGMENT: i32 = 6;

const REGEX_METACHARACTERS: &[char] = &['\\', '[', ']', '(', ')', '+', '?', '^', '$', '|'];

/// Shape of an endpoint path pattern, decided by inspection alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPattern {
    Literal,
    Param,
    Wildcard,
    Regex,
}

impl PathPattern {
    pub fn classify(pattern: &str) -> Self {
        let pattern = pattern.trim_matches('/');
        if pattern.contains(REGEX_METACHARACTERS) {
            return Self::Regex;
        }

        let mut kind = Self::Literal;
        for segment in pattern.split('/') {
            if segment == "*" {
                return Self::Wildcard;
            }
            if segment.starts_with(':') {
                kind = Self::Param;
            }
        }
        kind
    }
}

/// Score `pattern` against `path`; higher is better, [`NO_MATCH`] rejects.
pub fn score(pattern: &str, path: &str) -> i32 {
    let pattern = pattern.trim_matches('/');
    let path = path.trim_matches('/');

    if pattern == path {
        return EXACT_SCORE;
    }

    match PathPattern::classify(pattern) {
        PathPattern::Regex => regex_score(pattern, path),
        PathPattern::Literal | PathPattern::Param | PathPattern::Wildcard => {
            segment_score(pattern, path)
        }
    }
}

fn regex_score(pattern: &str, path: &str) -> i32 {
    match Regex::new(&format!("^{pattern}$")) {
        Ok(regex) if regex.is_match(path) => REGEX_SCORE,
        Ok(_) => NO_MATCH,
        Err(e) => {
            debug!("Endpoint pattern '{}' is not a valid regex: {}", pattern, e);
            NO_MATCH
        }
    }
}

fn segment_score(pattern: &str, path: &str) -> i32 {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();

    if pattern_segments.len() != path_segments.len() {
        return NO_MATCH;
    }

    let mut total = 0;
    let mut has_param = false;
    let mut has_wildcard = false;

    for (expected, actual) in pattern_segments.iter().zip(&path_segments) {
        if expected == actual {
            total += LITERAL_SEGMENT;
        } else if expected.starts_with(':') {
            total += PARAM_SEGMENT;
            has_param = true;
        } else if *expected == "*" {
            total += WILDCARD_SEGMENT;
            has_wildcard = true;
        } else {
            return NO_MATCH;
        }
    }

    if has_wildcard {
        WILDCARD_BASE + total
    } else if has_param {
        PARAM_BASE + total
    } else {
        total
    }
}

/// Pick the highest-scoring enabled endpoint for `method` and `path`.
///
/// Ties keep the first endpoint in iteration order.
pub fn best_match<'a, I>(endpoints: I, method: &str, path: &str) -> Option<(&'a Endpoint, i32)>
where
    I: IntoIterator<Item = &'a Endpoint>,
{
    let mut best: Option<(&'a Endpoint, i32)> = None;

    for endpoint in endpoints {
        if !endpoint.enabled || !endpoint.method.eq_ignore_ascii_case(method) {
            continue;
        }

        let candidate = score(&endpoint.path, path);
        if candidate == NO_MATCH {
            continue;
        }

        if best.map_or(true, |(_, best_score)| candidate > best_score) {
            best = Some((endpoint, candidate));
        }
    }

    if let Some((endpoint, best_score)) = best {
        debug!(
            "Matched endpoint {} {} for path {} with score {}",
            endpoint.method, endpoint.path, path, best_score
        );
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResponseMode;

    fn endpoint(id: &str, method: &str, path: &str) -> Endpoint {
        Endpoint {
            id: id.to_string(),
            project_id: "p1".to_string(),
            method: method.to_string(),
            path: path.to_string(),
            enabled: true,
            response_mode: ResponseMode::Static,
            advance_config: None,
            use_proxy: false,
            proxy_target_id: None,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(PathPattern::classify("/users/list"), PathPattern::Literal);
        assert_eq!(PathPattern::classify("/users/:id"), PathPattern::Param);
        assert_eq!(PathPattern::classify("/files/*"), PathPattern::Wildcard);
        assert_eq!(PathPattern::classify("/files/*/:id"), PathPattern::Wildcard);
        assert_eq!(PathPattern::classify(r"/users/\d+"), PathPattern::Regex);
        assert_eq!(PathPattern::classify("/users/(a|b)"), PathPattern::Regex);
    }

    #[test]
    fn test_exact_match_wins() {
        assert_eq!(score("/users/me", "/users/me"), EXACT_SCORE);
        assert_eq!(score("users/me/", "/users/me"), EXACT_SCORE);
        assert!(score("/users/:id", "/users/me") < EXACT_SCORE);
        assert!(score("/users/*", "/users/me") < EXACT_SCORE);
        assert!(score(r"/users/\w+", "/users/me") < EXACT_SCORE);
    }

    #[test]
    fn test_param_score() {
        // one literal segment (+10) and one param (+8) on top of the param base
        assert_eq!(score("/users/:id", "/users/42"), 98);
        assert_eq!(score("/:a/:b", "/x/y"), 96);
    }

    #[test]
    fn test_wildcard_score() {
        assert_eq!(score("/files/*", "/files/report.pdf"), 76);
        // wildcard takes precedence over param when both are used
        assert_eq!(score("/*/:id", "/files/7"), 74);
    }

    #[test]
    fn test_regex_score() {
        assert_eq!(score(r"/users/\d+", "/users/42"), REGEX_SCORE);
        assert_eq!(score(r"/users/\d+", "/users/abc"), NO_MATCH);
        assert_eq!(score("/users/([a-z", "/users/a"), NO_MATCH);
    }

    #[test]
    fn test_segment_count_must_match() {
        assert_eq!(score("/users/:id", "/users/42/orders"), NO_MATCH);
        assert_eq!(score("/files/*", "/files/a/b"), NO_MATCH);
        assert_eq!(score("/users/:id", "/users"), NO_MATCH);
    }

    #[test]
    fn test_literal_mismatch() {
        assert_eq!(score("/users/list", "/users/all"), NO_MATCH);
        assert_eq!(score("/orders/:id", "/users/42"), NO_MATCH);
    }

    #[test]
    fn test_best_match_prefers_higher_score() {
        let endpoints = vec![
            endpoint("wild", "GET", "/users/*"),
            endpoint("param", "GET", "/users/:id"),
            endpoint("exact", "GET", "/users/me"),
        ];

        let (found, found_score) = best_match(&endpoints, "GET", "/users/me").unwrap();
        assert_eq!(found.id, "exact");
        assert_eq!(found_score, EXACT_SCORE);

        let (found, _) = best_match(&endpoints, "GET", "/users/42").unwrap();
        assert_eq!(found.id, "param");
    }

    #[test]
    fn test_best_match_ties_keep_first() {
        let endpoints = vec![
            endpoint("first", "GET", "/users/:id"),
            endpoint("second", "GET", "/users/:name"),
        ];
        let (found, _) = best_match(&endpoints, "GET", "/users/42").unwrap();
        assert_eq!(found.id, "first");
    }

    #[test]
    fn test_best_match_filters_method_and_enabled() {
        let mut disabled = endpoint("disabled", "GET", "/users/:id");
        disabled.enabled = false;
        let endpoints = vec![
            disabled,
            endpoint("post", "POST", "/users/:id"),
            endpoint("get", "get", "/users/*"),
        ];

        let (found, _) = best_match(&endpoints, "GET", "/users/42").unwrap();
        assert_eq!(found.id, "get");
        assert!(best_match(&endpoints, "DELETE", "/users/42").is_none());
    }
}
