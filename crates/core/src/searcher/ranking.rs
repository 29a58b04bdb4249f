//! Priority scoring and the final order of surviving candidates.

use tracing::{debug, info};

use crate::config::SearchPreferences;
use crate::library::{AlbumRequest, QualityTier};

use super::matcher::contains_token;
use super::size_window::bitrate_size;
use super::CandidateRecord;

/// Orders filtered candidates best-first.
#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    /// Lowercased, earlier entries weigh more.
    preferred_words: Vec<String>,
    preferred_bitrate: Option<u32>,
    allow_lossless: bool,
}

impl RankingEngine {
    pub fn new(
        preferred_words: &[String],
        preferred_bitrate: Option<u32>,
        allow_lossless: bool,
    ) -> Self {
        Self {
            preferred_words: preferred_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
            preferred_bitrate: preferred_bitrate.filter(|b| *b > 0),
            allow_lossless,
        }
    }

    pub fn from_preferences(prefs: &SearchPreferences) -> Self {
        Self::new(
            &prefs.preferred_words,
            prefs.preferred_bitrate,
            prefs.allow_lossless,
        )
    }

    /// Sum of `len - index` over preferred words found in the title (token-bounded)
    /// or equal to the provider id.
    pub fn priority(&self, candidate: &CandidateRecord) -> u32 {
        let title = candidate.title.to_lowercase();
        let provider = candidate.provider_id.to_lowercase();
        let total = self.preferred_words.len();

        self.preferred_words
            .iter()
            .enumerate()
            .filter(|(_, word)| contains_token(&title, word) || provider == **word)
            .map(|(index, _)| (total - index) as u32)
            .sum()
    }

    /// Best-first order of the policy-matching candidates, or `None` when
    /// there is nothing appropriate to pick.
    ///
    /// Sorts are stable, so equal keys keep discovery order.
    pub fn rank(
        &self,
        candidates: Vec<CandidateRecord>,
        request: &AlbumRequest,
    ) -> Option<Vec<CandidateRecord>> {
        let scored: Vec<(CandidateRecord, u32)> = candidates
            .into_iter()
            .filter(|c| c.matches_policy())
            .map(|c| {
                let priority = self.priority(&c);
                (c, priority)
            })
            .collect();

        if scored.is_empty() {
            return None;
        }

        let kbps = match (request.quality, self.preferred_bitrate) {
            (QualityTier::PreferredBitrate, Some(kbps)) => kbps,
            _ => return Some(by_priority_then_size(scored)),
        };

        let target = bitrate_size(request.duration_ms.unwrap_or(0), kbps);
        if target == 0 {
            info!(
                artist = %request.artist,
                album = %request.album_title,
                "No track duration, ranking by size"
            );
            return Some(by_priority_then_size(scored));
        }

        let (lossless, mut lossy): (Vec<_>, Vec<_>) =
            scored.iter().cloned().partition(|(c, _)| c.looks_lossless());

        if !lossy.is_empty() {
            lossy.sort_by(|(a, pa), (b, pb)| {
                pb.cmp(pa)
                    .then_with(|| a.size.abs_diff(target).cmp(&b.size.abs_diff(target)))
            });
            debug!(target_size = target, candidates = lossy.len(), "Ranked by distance to target");
            return Some(lossy.into_iter().map(|(c, _)| c).collect());
        }

        if self.allow_lossless && !lossless.is_empty() {
            info!("No appropriate lossy matches, falling back to lossless");
            return Some(by_priority_then_size(scored));
        }

        info!(
            artist = %request.artist,
            album = %request.album_title,
            "No appropriate matches"
        );
        None
    }
}

fn by_priority_then_size(mut scored: Vec<(CandidateRecord, u32)>) -> Vec<CandidateRecord> {
    scored.sort_by(|(a, pa), (b, pb)| pb.cmp(pa).then_with(|| b.size.cmp(&a.size)));
    scored.into_iter().map(|(c, _)| c).collect()
}
