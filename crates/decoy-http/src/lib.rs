// Library exports for the binary and integration tests
// Allow dead_code for library targets - some helpers are used by the binary only
#![allow(dead_code)]

// ===== Serving path =====
pub mod actions;
pub mod delay;
pub mod engine;
pub mod matching;
pub mod proxy;
pub mod response;
pub mod selection;
pub mod server;

// ===== Data and collaborators =====
pub mod config;
pub mod error;
pub mod exchange;
pub mod model;
pub mod store;

pub mod metrics;

pub use engine::{Dispatched, Engine};
pub use error::DecoyError;
pub use exchange::{RequestData, ResponseData};
