//! Release search: provider adapters and the stages that judge their results.
//!
//! Providers turn a search term into [`CandidateRecord`]s. The
//! [`TokenMatcher`], [`SizeWindow`] and [`DuplicateFilter`] decide which of
//! them are eligible, and the [`RankingEngine`] orders the survivors.

mod duplicate;
mod matcher;
mod newznab;
mod ranking;
mod size_window;
mod term;
mod torznab;
mod types;

pub use duplicate::DuplicateFilter;
pub use matcher::TokenMatcher;
pub use newznab::NewznabProvider;
pub use ranking::RankingEngine;
pub use size_window::{bitrate_size, SizeWindow};
pub use term::{SearchTerm, TermFlavor};
pub use torznab::TorznabProvider;
pub use types::*;
