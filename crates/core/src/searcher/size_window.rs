//! Byte-size window derived from bitrate and album duration.

use tracing::debug;

use crate::config::SearchPreferences;
use crate::library::{AlbumRequest, QualityTier};

use super::CandidateRecord;

/// `duration_ms / 1000 * kbps * 128`, floored.
pub fn bitrate_size(duration_ms: u64, kbps: u32) -> u64 {
    (duration_ms as f64 / 1000.0 * kbps as f64 * 128.0).floor() as u64
}

/// Acceptable size range for one request. `None` bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeWindow {
    pub low: Option<u64>,
    pub high: Option<u64>,
    /// Lossless titles above `high` are kept as a fallback pool.
    pub allow_lossless: bool,
}

impl SizeWindow {
    pub fn compute(prefs: &SearchPreferences, request: &AlbumRequest) -> Self {
        let duration = request.duration_ms.filter(|d| *d > 0);

        match (request.quality, duration) {
            (QualityTier::LosslessOnly, Some(duration)) => Self {
                low: prefs
                    .lossless_bitrate_from
                    .filter(|b| *b > 0)
                    .map(|kbps| bitrate_size(duration, kbps)),
                high: prefs
                    .lossless_bitrate_to
                    .filter(|b| *b > 0)
                    .map(|kbps| bitrate_size(duration, kbps)),
                allow_lossless: false,
            },
            (QualityTier::PreferredBitrate, Some(duration)) => {
                let Some(kbps) = prefs.preferred_bitrate.filter(|b| *b > 0) else {
                    return Self::default();
                };
                let target = bitrate_size(duration, kbps) as f64;
                let scaled = |pct: u32| (target * pct as f64 / 100.0).floor() as u64;
                let high_buffer = prefs.bitrate_high_buffer.filter(|b| *b > 0);

                debug!(target_size = target as u64, "Computed preferred-bitrate target");
                Self {
                    low: prefs.bitrate_low_buffer.filter(|b| *b > 0).map(scaled),
                    high: high_buffer.map(scaled),
                    allow_lossless: high_buffer.is_some() && prefs.allow_lossless,
                }
            }
            _ => Self::default(),
        }
    }

    pub fn admits(&self, candidate: &CandidateRecord) -> bool {
        if let Some(low) = self.low {
            if candidate.size < low {
                debug!(
                    title = %candidate.title,
                    provider = %candidate.provider_id,
                    size = candidate.size,
                    min_size = low,
                    "Rejected: too small"
                );
                return false;
            }
        }

        if let Some(high) = self.high {
            if candidate.size > high {
                if self.allow_lossless && candidate.looks_lossless() {
                    debug!(title = %candidate.title, "Kept oversized lossless release as fallback");
                    return true;
                }
                debug!(
                    title = %candidate.title,
                    provider = %candidate.provider_id,
                    size = candidate.size,
                    max_size = high,
                    "Rejected: too large"
                );
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::CandidateKind;

    fn request(quality: QualityTier, duration_ms: Option<u64>) -> AlbumRequest {
        AlbumRequest {
            album_id: "a".to_string(),
            artist: "Foo".to_string(),
            album_title: "Bar".to_string(),
            release_date: None,
            album_type: None,
            duration_ms,
            search_term: None,
            quality,
            is_new: true,
        }
    }

    fn prefs() -> SearchPreferences {
        SearchPreferences {
            quality: QualityTier::PreferredBitrate,
            preferred_bitrate: Some(256),
            bitrate_low_buffer: Some(80),
            bitrate_high_buffer: Some(120),
            ..Default::default()
        }
    }

    fn candidate(title: &str, size: u64) -> CandidateRecord {
        CandidateRecord::new(title, size, "http://x", "p", CandidateKind::Torrent)
    }

    #[test]
    fn test_bitrate_formula() {
        assert_eq!(bitrate_size(3_600_000, 256), 117_964_800);
        assert_eq!(bitrate_size(1_500, 320), 61_440);
    }

    #[test]
    fn test_preferred_bitrate_window() {
        let window = SizeWindow::compute(
            &prefs(),
            &request(QualityTier::PreferredBitrate, Some(3_600_000)),
        );
        assert_eq!(window.low, Some(94_371_840));
        assert_eq!(window.high, Some(141_557_760));
        assert!(!window.allow_lossless);

        assert!(!window.admits(&candidate("Foo Bar", 94_371_839)));
        assert!(window.admits(&candidate("Foo Bar", 94_371_840)));
        assert!(window.admits(&candidate("Foo Bar", 141_557_760)));
        assert!(!window.admits(&candidate("Foo Bar", 141_557_761)));
        assert!(!window.admits(&candidate("Foo Bar FLAC", 400_000_000)));
    }

    #[test]
    fn test_lossless_carve_out() {
        let prefs = SearchPreferences {
            allow_lossless: true,
            ..prefs()
        };
        let window =
            SizeWindow::compute(&prefs, &request(QualityTier::PreferredBitrate, Some(3_600_000)));
        assert!(window.allow_lossless);
        assert!(window.admits(&candidate("Foo Bar FLAC", 400_000_000)));
        assert!(!window.admits(&candidate("Foo Bar 320", 400_000_000)));
        assert!(!window.admits(&candidate("Foo Bar FLAC", 1_000)));
    }

    #[test]
    fn test_lossless_window() {
        let prefs = SearchPreferences {
            lossless_bitrate_from: Some(500),
            ..Default::default()
        };
        let window =
            SizeWindow::compute(&prefs, &request(QualityTier::LosslessOnly, Some(1_000_000)));
        assert_eq!(window.low, Some(64_000_000));
        assert_eq!(window.high, None);
    }

    #[test]
    fn test_no_window_without_duration_or_for_other_tiers() {
        let window = SizeWindow::compute(&prefs(), &request(QualityTier::PreferredBitrate, None));
        assert_eq!(window, SizeWindow::default());

        let window = SizeWindow::compute(
            &prefs(),
            &request(QualityTier::HighestIncludingLossless, Some(3_600_000)),
        );
        assert_eq!(window, SizeWindow::default());
        assert!(window.admits(&candidate("anything", 1)));
    }
}
