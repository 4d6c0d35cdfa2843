//! Human-friendly formatting of values shown in admin listings.

/// Formats a byte count as a human-readable file size.
///
/// # Examples
///
/// ```
/// use cms_core::humanize::filesizeformat;
///
/// assert_eq!(filesizeformat(1), "1 byte");
/// assert_eq!(filesizeformat(500), "500 bytes");
/// assert_eq!(filesizeformat(1024), "1.0 KB");
/// assert_eq!(filesizeformat(1_572_864), "1.5 MB");
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn filesizeformat(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let size = bytes as f64;
    if bytes == 1 {
        "1 byte".to_string()
    } else if size < KB {
        format!("{bytes} bytes")
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else if size < GB {
        format!("{:.1} MB", size / MB)
    } else if size < TB {
        format!("{:.1} GB", size / GB)
    } else {
        format!("{:.1} TB", size / TB)
    }
}

/// Title-cases each word (`"image category"` -> `"Image Category"`).
pub fn title(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesizeformat_bytes() {
        assert_eq!(filesizeformat(0), "0 bytes");
        assert_eq!(filesizeformat(1023), "1023 bytes");
    }

    #[test]
    fn test_filesizeformat_units() {
        assert_eq!(filesizeformat(2048), "2.0 KB");
        assert_eq!(filesizeformat(1_048_576), "1.0 MB");
        assert_eq!(filesizeformat(1_073_741_824), "1.0 GB");
        assert_eq!(filesizeformat(1_099_511_627_776), "1.0 TB");
    }

    #[test]
    fn test_title() {
        assert_eq!(title("category"), "Category");
        assert_eq!(title("image category"), "Image Category");
    }
}
