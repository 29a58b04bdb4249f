//! Search orchestration: one album at a time through providers, filters,
//! ranking, payload resolution and dispatch.

mod pipeline;
mod types;
mod wanted;

pub use pipeline::SelectionPipeline;
pub use types::*;
pub use wanted::{WantedReport, WantedResult, WantedSearch};
