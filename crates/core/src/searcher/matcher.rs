//! Title verification against the search term.

use regex_lite::Regex;
use tracing::debug;

use crate::config::SearchPreferences;
use crate::library::QualityTier;

use super::term::SearchTerm;

const CLEAN_RELEASE_WORDS: [&str; 3] = ["clean", "edited", "censored"];
const SKIPPED_TOKENS: [&str; 3] = ["Various", "Artists", "VA"];

/// Decides whether a result title plausibly belongs to the searched album.
///
/// Pure apart from debug logging: the same arguments always give the same verdict.
#[derive(Debug, Clone, Default)]
pub struct TokenMatcher {
    tier: QualityTier,
    ignored_words: Vec<String>,
    /// Each inner list is one requirement; any alternative satisfies it.
    required_groups: Vec<Vec<String>>,
    ignore_clean_releases: bool,
}

impl TokenMatcher {
    pub fn new(
        tier: QualityTier,
        ignored_words: &[String],
        required_words: &[String],
        ignore_clean_releases: bool,
    ) -> Self {
        let ignored_words = ignored_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        let required_groups = required_words
            .iter()
            .map(|entry| {
                entry
                    .split(" OR ")
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|group| !group.is_empty())
            .collect();

        Self {
            tier,
            ignored_words,
            required_groups,
            ignore_clean_releases,
        }
    }

    pub fn from_preferences(prefs: &SearchPreferences) -> Self {
        Self::new(
            prefs.quality,
            &prefs.ignored_words,
            &prefs.required_words,
            prefs.ignore_clean_releases,
        )
    }

    pub fn matches(&self, title: &str, term: &SearchTerm, lossless_request: bool) -> bool {
        let title: String = title
            .chars()
            .map(|c| if matches!(c, '.' | '-' | '/' | '_') { ' ' } else { c })
            .collect();
        let lower_title = title.to_lowercase();
        let lower_term = term.term.to_lowercase();

        if lower_title.contains("remix") && !lower_term.contains("remix") {
            debug!(title = %title, "Rejected: remix not requested");
            return false;
        }

        if self.tier == QualityTier::HighestExcludingLossless
            && lower_title.contains("flac")
            && !lossless_request
        {
            debug!(title = %title, "Rejected: lossless release for a lossy search");
            return false;
        }

        if let Some(word) = self.ignored_words.iter().find(|w| lower_title.contains(w.as_str())) {
            debug!(title = %title, word = %word, "Rejected: ignored word");
            return false;
        }

        for group in &self.required_groups {
            if !group.iter().any(|w| lower_title.contains(w.as_str())) {
                debug!(title = %title, required = ?group, "Rejected: missing required word");
                return false;
            }
        }

        if self.ignore_clean_releases {
            if let Some(word) = CLEAN_RELEASE_WORDS
                .iter()
                .find(|w| lower_title.contains(*w) && !lower_term.contains(*w))
            {
                debug!(title = %title, word = %word, "Rejected: clean release");
                return false;
            }
        }

        for token in term.term.split(|c: char| !is_word_char(c)) {
            if token.is_empty() || SKIPPED_TOKENS.contains(&token) {
                continue;
            }
            if !token_present(&lower_title, token) {
                debug!(
                    title = %title,
                    token = %token,
                    artist_term = %term.artist_term,
                    "Rejected: missing token"
                );
                return false;
            }
        }

        true
    }
}

/// Raw token, then with punctuation stripped, then with `!`→`i` and `$`→`s`.
///
/// `matches` splits the term on non-word characters first, so its tokens
/// never carry punctuation and only the raw check applies there.
fn token_present(lower_title: &str, token: &str) -> bool {
    let token = token.to_lowercase();
    if contains_token(lower_title, &token) {
        return true;
    }

    let stripped: String = token.chars().filter(|c| !c.is_ascii_punctuation()).collect();
    if stripped.is_empty() {
        return true;
    }
    if contains_token(lower_title, &stripped) {
        return true;
    }

    let substituted = token.replace('!', "i").replace('$', "s");
    contains_token(lower_title, &substituted)
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `needle` occurs in `haystack` with a non-word character or the
/// string edge on both sides. Callers pass both sides already lowercased.
pub(crate) fn contains_token(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let pattern = format!(r"(?:\W|^){}(?:\W|$)", regex_lite::escape(needle));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(haystack),
        Err(e) => {
            debug!(needle = %needle, error = %e, "Unusable token pattern");
            false
        }
    }
}
