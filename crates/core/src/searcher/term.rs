//! Search term construction for an album request.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::library::AlbumRequest;

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[./\-]").unwrap());

/// Providers differ in how much punctuation their search backends tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermFlavor {
    Nzb,
    Torrent,
}

impl TermFlavor {
    fn replacements(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            TermFlavor::Nzb => &[
                ("...", ""),
                (" & ", " "),
                (" = ", " "),
                ("?", ""),
                ("$", "s"),
                (" + ", " "),
                ("\"", ""),
                (",", ""),
                ("*", ""),
                (".", ""),
                (":", ""),
            ],
            TermFlavor::Torrent => &[
                ("...", ""),
                (" & ", " "),
                (" = ", " "),
                ("?", ""),
                ("$", "s"),
                (" + ", " "),
                ("\"", ""),
                (",", " "),
                ("*", ""),
            ],
        }
    }
}

/// The term sent to providers plus the artist part used by the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub term: String,
    pub artist_term: String,
}

impl SearchTerm {
    pub fn build(request: &AlbumRequest, flavor: TermFlavor) -> Self {
        let clean_artist = clean(&request.artist, flavor);
        let clean_album = clean(&request.album_title, flavor);
        let year = request.year().unwrap_or("");

        let term = match request.search_term.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(literal) => literal.to_string(),
            None if request.album_type.as_deref() == Some("part of") => {
                format!("{} {}", clean_album, year)
            }
            None if request.album_title.contains(request.artist.as_str())
                || request.artist.chars().count() < 4
                || request.album_title.chars().count() < 4 =>
            {
                format!("{} {} {}", clean_artist, clean_album, year)
            }
            None if request.artist == "Various Artists" => format!("{} {}", clean_album, year),
            None => format!("{} {}", clean_artist, clean_album),
        };

        Self {
            term: separators_to_spaces(&term),
            artist_term: separators_to_spaces(&clean_artist),
        }
    }
}

fn clean(value: &str, flavor: TermFlavor) -> String {
    let mut out = value.to_string();
    for (from, to) in flavor.replacements() {
        out = out.replace(from, to);
    }
    out.trim().to_string()
}

fn separators_to_spaces(value: &str) -> String {
    SEPARATORS
        .replace_all(value, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::QualityTier;

    fn request(artist: &str, album: &str) -> AlbumRequest {
        AlbumRequest {
            album_id: "a1".to_string(),
            artist: artist.to_string(),
            album_title: album.to_string(),
            release_date: Some("2007-05-14".to_string()),
            album_type: Some("Album".to_string()),
            duration_ms: None,
            search_term: None,
            quality: QualityTier::default(),
            is_new: false,
        }
    }

    #[test]
    fn test_plain_artist_album() {
        let t = SearchTerm::build(&request("Radiohead", "In Rainbows"), TermFlavor::Torrent);
        assert_eq!(t.term, "Radiohead In Rainbows");
        assert_eq!(t.artist_term, "Radiohead");
    }

    #[test]
    fn test_self_titled_and_short_names_get_year() {
        let t = SearchTerm::build(&request("Weezer", "Weezer"), TermFlavor::Nzb);
        assert_eq!(t.term, "Weezer Weezer 2007");

        let t = SearchTerm::build(&request("Air", "Moon Safari"), TermFlavor::Nzb);
        assert_eq!(t.term, "Air Moon Safari 2007");
    }

    #[test]
    fn test_various_artists_and_part_of() {
        let t = SearchTerm::build(
            &request("Various Artists", "Now That's What I Call Music"),
            TermFlavor::Torrent,
        );
        assert_eq!(t.term, "Now That's What I Call Music 2007");

        let mut req = request("Burial", "Untrue");
        req.album_type = Some("part of".to_string());
        assert_eq!(SearchTerm::build(&req, TermFlavor::Torrent).term, "Untrue 2007");
    }

    #[test]
    fn test_flavor_punctuation() {
        let req = request("Crosby, Stills & Nash", "Déjà vu: Live?");
        let nzb = SearchTerm::build(&req, TermFlavor::Nzb);
        assert_eq!(nzb.term, "Crosby Stills Nash Déjà vu Live");

        let torrent = SearchTerm::build(&req, TermFlavor::Torrent);
        assert_eq!(torrent.term, "Crosby Stills Nash Déjà vu: Live");
        assert_eq!(torrent.artist_term, "Crosby Stills Nash");
    }

    #[test]
    fn test_separators_become_spaces() {
        let t = SearchTerm::build(&request("AC/DC", "Back-In Black"), TermFlavor::Torrent);
        assert_eq!(t.term, "AC DC Back In Black");
        assert_eq!(t.artist_term, "AC DC");
    }

    #[test]
    fn test_literal_term_wins() {
        let mut req = request("Radiohead", "In Rainbows");
        req.search_term = Some("radiohead in_rainbows.disc-1".to_string());
        let t = SearchTerm::build(&req, TermFlavor::Nzb);
        assert_eq!(t.term, "radiohead in_rainbows disc 1");
        assert_eq!(t.artist_term, "Radiohead");
    }
}
