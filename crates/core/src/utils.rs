use chrono::{DateTime, Local, TimeZone};

const CAPTURE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in the format stored in the `collected_at` column
pub fn capture_timestamp() -> String {
    format_capture_timestamp(&Local::now())
}

/// Formats a timestamp as "YYYY-MM-DD HH:MM:SS" in its own timezone
pub fn format_capture_timestamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format(CAPTURE_FORMAT).to_string()
}

/// Joins items into a "- " bulleted block, one item per line.
/// An empty list yields an empty string.
pub fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shortens text to at most `max_chars` characters, collapsing newlines
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_format_capture_timestamp_utc() {
        let dt = Utc.with_ymd_and_hms(2025, 12, 16, 10, 30, 0).unwrap();
        assert_eq!(format_capture_timestamp(&dt), "2025-12-16 10:30:00");
    }

    #[test]
    fn test_format_capture_timestamp_keeps_offset_local_time() {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let dt = kst.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_capture_timestamp(&dt), "2025-01-02 03:04:05");
    }

    #[test]
    fn test_capture_timestamp_shape() {
        let ts = capture_timestamp();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }

    #[test]
    fn test_bullet_list_multiple() {
        assert_eq!(bullet_list(&["rates up", "dollar weak"]), "- rates up\n- dollar weak");
    }

    #[test]
    fn test_bullet_list_single() {
        assert_eq!(bullet_list(&["only one"]), "- only one");
    }

    #[test]
    fn test_bullet_list_empty() {
        let empty: [&str; 0] = [];
        assert_eq!(bullet_list(&empty), "");
    }

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("gold outlook", 20), "gold outlook");
    }

    #[test]
    fn test_preview_collapses_newlines() {
        assert_eq!(preview("- a\n- b", 20), "- a - b");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("금리 인상 전망과 채권 시장", 8), "금리 인상...");
    }
}
