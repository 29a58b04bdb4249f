//! File and folder names derived from release titles.

use crate::library::AlbumRequest;

/// Folder name SABnzbd (and the NZB blackhole) will create for `title`.
pub fn sanitize_folder_name(title: &str) -> String {
    let mapped: String = title
        .chars()
        .map(|c| match c {
            '\\' | '/' => '+',
            '<' => '{',
            '>' => '}',
            '?' => '!',
            '*' => '@',
            '|' => '#',
            '"' => '`',
            ':' => '-',
            '\u{92}' => '\'',
            other => other,
        })
        .collect();

    let trimmed = mapped.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Rewrites a client applies to folder names after sanitization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderRewrites {
    pub dots_to_spaces: bool,
    pub spaces_to_underscores: bool,
}

impl FolderRewrites {
    pub fn apply(&self, name: &str) -> String {
        let mut out = name.to_string();
        if self.dots_to_spaces {
            out = out.replace('.', " ");
        }
        if self.spaces_to_underscores {
            out = out.replace(' ', "_");
        }
        out
    }
}

/// `Artist - Album [Year]`, with path separators replaced.
pub fn album_folder_name(request: &AlbumRequest) -> String {
    let name = format!(
        "{} - {} [{}]",
        request.artist,
        request.album_title,
        request.year().unwrap_or("")
    );
    name.replace('/', "_")
}

/// Torrent file name for the watch directory.
pub fn torrent_file_name(request: &AlbumRequest) -> String {
    let stem: String = album_folder_name(request)
        .chars()
        .map(|c| if "?\"*:|<>/".contains(c) { '_' } else { c })
        .collect();
    format!("{}.torrent", stem)
}
