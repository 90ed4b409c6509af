//! Request matching: endpoint path scoring and response rule evaluation.

pub mod operator;
pub mod path;
pub mod rules;

#[allow(unused_imports)]
pub use operator::ValueMatcher;
#[allow(unused_imports)]
pub use path::{best_match, score, PathPattern, EXACT_SCORE, NO_MATCH, REGEX_SCORE};
#[allow(unused_imports)]
pub use rules::{response_matches, rule_matches};
