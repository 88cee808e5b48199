//! Download file names

/// Longest artist fragment kept in a file name, in characters
pub const MAX_ARTIST_CHARS: usize = 50;

/// Replace everything outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `music_report_<period>[_new_tracks][_<artist>]`, sanitized, without extension
pub fn report_file_stem(period: &str, only_new: bool, artist: Option<&str>) -> String {
    let mut name = format!("music_report_{}", period);
    if only_new {
        name.push_str("_new_tracks");
    }
    if let Some(artist) = artist.filter(|a| !a.is_empty()) {
        let artist: String = sanitize_file_name(artist)
            .chars()
            .take(MAX_ARTIST_CHARS)
            .collect();
        name.push('_');
        name.push_str(&artist);
    }
    sanitize_file_name(&name)
}

/// `report_<artist>_<period>[_new_tracks]`, sanitized, without extension
pub fn artist_file_stem(artist: &str, period: &str, only_new: bool) -> String {
    let mut name = format!("report_{}_{}", artist, period);
    if only_new {
        name.push_str("_new_tracks");
    }
    sanitize_file_name(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_each_char() {
        assert_eq!(sanitize_file_name("Q1 2024"), "Q1_2024");
        assert_eq!(sanitize_file_name("Алиса"), "_____");
        assert_eq!(sanitize_file_name("a.b_c-d"), "a.b_c-d");
        assert_eq!(sanitize_file_name("AC/DC"), "AC_DC");
    }

    #[test]
    fn test_report_file_stem() {
        assert_eq!(report_file_stem("Q1 2024", false, None), "music_report_Q1_2024");
        assert_eq!(
            report_file_stem("Q1", true, Some("The Band")),
            "music_report_Q1_new_tracks_The_Band"
        );
    }

    #[test]
    fn test_artist_fragment_truncated() {
        let artist = "x".repeat(80);
        let stem = report_file_stem("Q1", false, Some(&artist));
        assert_eq!(stem, format!("music_report_Q1_{}", "x".repeat(50)));
    }

    #[test]
    fn test_artist_file_stem() {
        assert_eq!(artist_file_stem("Alice", "Q1", false), "report_Alice_Q1");
        assert_eq!(artist_file_stem("Alice B", "Q1", true), "report_Alice_B_Q1_new_tracks");
    }
}
