//! Response selection strategies.

pub mod round_robin;
pub mod selector;

pub use round_robin::RoundRobinScheduler;
pub use selector::select_response;
