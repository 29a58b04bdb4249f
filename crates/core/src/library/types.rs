//! Album and snatch-history types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::searcher::CandidateKind;

/// How the user trades size for quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Biggest lossy release; lossless titles are rejected.
    #[default]
    HighestExcludingLossless,
    /// Biggest release of any kind.
    HighestIncludingLossless,
    /// Closest to a target bitrate.
    PreferredBitrate,
    /// Lossless releases only.
    LosslessOnly,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::HighestExcludingLossless => "highest_excluding_lossless",
            QualityTier::HighestIncludingLossless => "highest_including_lossless",
            QualityTier::PreferredBitrate => "preferred_bitrate",
            QualityTier::LosslessOnly => "lossless_only",
        }
    }
}

/// Lifecycle status of an album in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlbumStatus {
    Skipped,
    Wanted,
    #[serde(rename = "Wanted Lossless")]
    WantedLossless,
    Snatched,
    Downloaded,
}

impl AlbumStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumStatus::Skipped => "Skipped",
            AlbumStatus::Wanted => "Wanted",
            AlbumStatus::WantedLossless => "Wanted Lossless",
            AlbumStatus::Snatched => "Snatched",
            AlbumStatus::Downloaded => "Downloaded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Skipped" => Some(AlbumStatus::Skipped),
            "Wanted" => Some(AlbumStatus::Wanted),
            "Wanted Lossless" => Some(AlbumStatus::WantedLossless),
            "Snatched" => Some(AlbumStatus::Snatched),
            "Downloaded" => Some(AlbumStatus::Downloaded),
            _ => None,
        }
    }

    pub fn is_wanted(&self) -> bool {
        matches!(self, AlbumStatus::Wanted | AlbumStatus::WantedLossless)
    }
}

/// An album tracked by the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub album_id: String,
    pub artist_name: String,
    pub album_title: String,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
    pub release_date: Option<String>,
    pub album_type: Option<String>,
    /// Sum of track durations.
    pub duration_ms: Option<u64>,
    /// Literal term that overrides the derived one.
    pub search_term: Option<String>,
    pub status: AlbumStatus,
}

/// What the pipeline searches for. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumRequest {
    pub album_id: String,
    pub artist: String,
    pub album_title: String,
    pub release_date: Option<String>,
    pub album_type: Option<String>,
    pub duration_ms: Option<u64>,
    pub search_term: Option<String>,
    pub quality: QualityTier,
    /// Automatic re-check of a still-wanted album; enables duplicate suppression.
    pub is_new: bool,
}

impl AlbumRequest {
    /// Build a request for a library album. `Wanted Lossless` forces the lossless tier.
    pub fn from_record(record: &AlbumRecord, default_tier: QualityTier, is_new: bool) -> Self {
        let quality = if record.status == AlbumStatus::WantedLossless {
            QualityTier::LosslessOnly
        } else {
            default_tier
        };

        Self {
            album_id: record.album_id.clone(),
            artist: record.artist_name.clone(),
            album_title: record.album_title.clone(),
            release_date: record.release_date.clone(),
            album_type: record.album_type.clone(),
            duration_ms: record.duration_ms,
            search_term: record.search_term.clone(),
            quality,
            is_new,
        }
    }

    pub fn is_lossless_request(&self) -> bool {
        self.quality == QualityTier::LosslessOnly
    }

    /// Four-digit year prefix of the release date.
    pub fn year(&self) -> Option<&str> {
        let date = self.release_date.as_deref()?;
        let year = date.get(..4)?;
        year.chars().all(|c| c.is_ascii_digit()).then_some(year)
    }

    /// Release date, with missing month/day filled with the first.
    pub fn parsed_release_date(&self) -> Option<NaiveDate> {
        let date = self.release_date.as_deref()?.trim();
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", date), "%Y-%m-%d"))
            .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01-01", date), "%Y-%m-%d"))
            .ok()
    }
}

/// Status written to a snatch history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnatchStatus {
    Snatched,
    #[serde(rename = "Seed_Snatched")]
    SeedSnatched,
}

impl SnatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnatchStatus::Snatched => "Snatched",
            SnatchStatus::SeedSnatched => "Seed_Snatched",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Snatched" => Some(SnatchStatus::Snatched),
            "Seed_Snatched" => Some(SnatchStatus::SeedSnatched),
            _ => None,
        }
    }
}

/// One persisted snatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnatchRecord {
    pub album_id: String,
    pub title: String,
    pub size: u64,
    pub locator: String,
    pub snatched_at: DateTime<Utc>,
    pub status: SnatchStatus,
    pub folder_name: String,
    pub kind: CandidateKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_id: Option<String>,
}
