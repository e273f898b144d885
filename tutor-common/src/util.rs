//! String helpers for log output.

use std::sync::OnceLock;

use regex::Regex;

/// Shorten `s` to at most `max_chars` characters for a log preview.
///
/// Cuts on character boundaries so multi-byte text (CJK, emoji) is safe.
pub fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
        None => s.to_string(),
    }
}

fn key_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"sk-[A-Za-z0-9_-]{16,}",
            r"(?i)bearer\s+[A-Za-z0-9._-]{10,}",
            r#"(?i)"api_keys"\s*:\s*\[[^\]]*\]"#,
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Mask API keys in text that is about to be logged.
///
/// Every value in `known_keys` is replaced, plus anything that looks like a
/// provider key or an `api_keys` JSON array.
pub fn redact_keys(s: &str, known_keys: &[String]) -> String {
    let mut result = s.to_string();
    for key in known_keys.iter().filter(|k| k.len() >= 4) {
        result = result.replace(key.as_str(), "***");
    }
    for re in key_patterns() {
        result = re.replace_all(&result, "***").into_owned();
    }
    result
}

/// Format bytes as human-readable size.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
