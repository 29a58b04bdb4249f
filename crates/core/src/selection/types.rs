use serde::{Deserialize, Serialize};

use crate::download::DownloadOutcome;
use crate::searcher::CandidateRecord;

/// How a search ends once candidates are judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Rank the survivors and dispatch the winner.
    #[default]
    Automatic,
    /// Return the token-matched list for a human to pick from.
    ChooseSpecific,
}

/// Terminal result of one search attempt. None of these are errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// No provider returned anything.
    NothingFound,
    /// Results came back but none was appropriate.
    NoSuitableRelease,
    Choices(Vec<CandidateRecord>),
    PayloadUnresolvable(String),
    NotSnatched(String),
    Snatched(DownloadOutcome),
}

impl SearchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SearchOutcome::NothingFound => "nothing_found",
            SearchOutcome::NoSuitableRelease => "no_suitable_release",
            SearchOutcome::Choices(_) => "choices",
            SearchOutcome::PayloadUnresolvable(_) => "payload_unresolvable",
            SearchOutcome::NotSnatched(_) => "not_snatched",
            SearchOutcome::Snatched(_) => "snatched",
        }
    }

    pub fn is_snatched(&self) -> bool {
        matches!(self, SearchOutcome::Snatched(_))
    }
}
