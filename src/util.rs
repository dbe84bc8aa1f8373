/// Render a human-friendly transfer speed string.
#[must_use]
pub fn format_speed(bytes_per_sec: f32) -> String {
    const KIB: f32 = 1024.0;
    const MIB: f32 = KIB * 1024.0;

    if bytes_per_sec < KIB {
        format!("{bytes_per_sec:.0} B/s")
    } else if bytes_per_sec < MIB {
        format!("{:.1} KB/s", bytes_per_sec / KIB)
    } else {
        format!("{:.1} MB/s", bytes_per_sec / MIB)
    }
}

/// Percentage of `current` over `total`, or `None` when the total is unknown.
#[must_use]
pub fn progress_percent(current: u64, total: Option<u64>) -> Option<f32> {
    match total {
        Some(total) if total > 0 => Some((current as f32 / total as f32) * 100.0),
        _ => None,
    }
}

/// Prefix `message` with `[pct%]` when a percentage is known.
#[must_use]
pub fn format_progress_message(message: &str, current: Option<u64>, total: Option<u64>) -> String {
    match current.and_then(|current| progress_percent(current, total)) {
        Some(percent) => format!("[{percent:.1}%] {message}"),
        None => message.to_owned(),
    }
}

/// File name component of a URL, without query string or fragment.
#[must_use]
pub fn url_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_speed_human_readable() {
        assert_eq!(format_speed(512.0), "512 B/s");
        assert_eq!(format_speed(2_048.0), "2.0 KB/s");
        assert_eq!(format_speed(5_242_880.0), "5.0 MB/s");
    }

    #[test]
    fn calculates_progress_percent() {
        assert_eq!(progress_percent(0, Some(10)), Some(0.0));
        assert_eq!(progress_percent(5, Some(10)), Some(50.0));
        assert_eq!(progress_percent(10, Some(10)), Some(100.0));
        assert_eq!(progress_percent(5, None), None);
        assert_eq!(progress_percent(5, Some(0)), None);
    }

    #[test]
    fn prefixes_message_with_percentage() {
        assert_eq!(
            format_progress_message("Downloading game.zip", Some(1), Some(4)),
            "[25.0%] Downloading game.zip"
        );
        assert_eq!(
            format_progress_message("Hashing patch.pak", None, None),
            "Hashing patch.pak"
        );
    }

    #[test]
    fn extracts_file_name_from_url() {
        assert_eq!(
            url_file_name("https://cdn.example.com/1.0.0/game.zip"),
            Some("game.zip")
        );
        assert_eq!(
            url_file_name("https://cdn.example.com/a/patch.pak?sig=abc#x"),
            Some("patch.pak")
        );
        assert_eq!(url_file_name("https://cdn.example.com/dir/"), None);
    }
}
