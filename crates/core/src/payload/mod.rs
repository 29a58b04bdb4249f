//! Turning the winning candidate's locator into something a backend accepts.

mod http;
mod types;

pub use http::HttpPayloadResolver;
pub use types::*;
