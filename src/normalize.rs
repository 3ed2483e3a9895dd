//! Column-name canonicalization.

/// Whitespace as the sheet exports see it. U+FEFF is included because a
/// stray byte-order mark on a header would otherwise survive trimming.
fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Canonicalizes a raw column name: trims, lowercases, and collapses every
/// run of whitespace to a single space.
///
/// Total and idempotent.
pub fn normalize_key(key: &str) -> String {
    key.split(is_space)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize_key("  Java Status "), "java status");
        assert_eq!(normalize_key("USN"), "usn");
    }

    #[test]
    fn test_normalize_collapses_internal_whitespace() {
        assert_eq!(normalize_key("First \t  Name"), "first name");
        assert_eq!(normalize_key("Machine\nLearning-30m"), "machine learning-30m");
    }

    #[test]
    fn test_normalize_keeps_spacing_inside_tokens() {
        // "Java- 35m" is a distinct header from "Java-35m"; only the run
        // length of the whitespace changes.
        assert_eq!(normalize_key("Java-  35m"), "java- 35m");
        assert_eq!(normalize_key("Java-35m"), "java-35m");
    }

    #[test]
    fn test_normalize_strips_bom_and_nbsp() {
        assert_eq!(normalize_key("\u{feff}USN"), "usn");
        assert_eq!(normalize_key("First\u{a0}Name"), "first name");
    }

    #[test]
    fn test_normalize_empty_and_blank() {
        assert_eq!(normalize_key(""), "");
        assert_eq!(normalize_key(" \t "), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "  Java Status ",
            "ML   STATUS",
            "\u{feff} Total ",
            "Python-35m",
            "İstanbul  Campus",
            "",
        ] {
            let once = normalize_key(raw);
            assert_eq!(normalize_key(&once), once, "not idempotent for {raw:?}");
        }
    }
}
