use sha2::{Digest, Sha256};

const MAX_STEM_CHARS: usize = 80;

/// Windows-safe file stem for an exported report: `{sanitized_title}--{short_hash(report_id)}`.
///
/// The hash keeps two reports with the same title apart; the same report
/// always maps to the same stem.
pub fn export_stem(title: &str, report_id: &str) -> String {
    let sanitized = sanitize_title(title);
    let hash = short_hash(report_id);
    format!("{sanitized}--{hash}")
}

fn sanitize_title(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();

    let mut compacted = String::with_capacity(replaced.len());
    let mut prev_underscore = false;
    for c in replaced.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    let mut stem: String = compacted
        .trim_matches(&['_', ' ', '.'][..])
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    stem = stem.trim_end_matches(&['_', ' ', '.'][..]).to_string();
    if stem.is_empty() {
        stem = "untitled".to_string();
    }
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    stem
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_characters_are_replaced() {
        let stem = export_stem("Heat sink: <v2>?", "r-1");
        assert!(stem.starts_with("Heat sink_ _v2--"), "{stem}");
    }

    #[test]
    fn stem_is_stable_and_id_sensitive() {
        assert_eq!(export_stem("Same", "a"), export_stem("Same", "a"));
        assert_ne!(export_stem("Same", "a"), export_stem("Same", "b"));
    }

    #[test]
    fn empty_and_reserved_titles_get_safe_stems() {
        assert!(export_stem("  ..  ", "x").starts_with("untitled--"));
        assert!(export_stem("con", "x").starts_with("con_--"));
    }

    #[test]
    fn long_titles_are_truncated_on_char_boundaries() {
        let title = "\u{e9}".repeat(200);
        let stem = export_stem(&title, "x");
        let (name, _) = stem.split_once("--").unwrap();
        assert_eq!(name.chars().count(), MAX_STEM_CHARS);
    }
}
