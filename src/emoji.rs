//! Emoji comparison tolerant of variation selectors and combining marks.

fn is_ignorable(c: char) -> bool {
    matches!(
        c as u32,
        0xFE00..=0xFE0F       // variation selectors
            | 0xE0100..=0xE01EF // variation selectors supplement
            | 0x0300..=0x036F   // combining diacritical marks
            | 0x1AB0..=0x1AFF
            | 0x1DC0..=0x1DFF
            | 0x20D0..=0x20FF   // combining marks for symbols (keycaps)
            | 0xFE20..=0xFE2F
    )
}

fn strip(s: &str) -> String {
    s.chars().filter(|c| !is_ignorable(*c)).collect()
}

/// Raw equality first; on mismatch compare again with selectors and
/// combining marks removed.
pub fn emoji_matches(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (a, b) = (strip(a.trim()), strip(b.trim()));
    !a.is_empty() && a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variation_selector_is_ignored() {
        assert!(emoji_matches("\u{1F94F}", "\u{1F94F}\u{FE0F}"));
        assert!(emoji_matches("\u{1F94F}\u{FE0F}", "\u{1F94F}"));
        assert!(emoji_matches("🥏", "🥏"));
    }

    #[test]
    fn test_different_emoji_do_not_match() {
        assert!(!emoji_matches("🥏", "⛳"));
        assert!(!emoji_matches("\u{2764}\u{FE0F}", "\u{1F499}"));
    }

    #[test]
    fn test_selector_only_strings_do_not_match_everything() {
        assert!(!emoji_matches("\u{FE0F}", ""));
        assert!(emoji_matches("", ""));
    }

    #[test]
    fn test_keycap_combining_mark() {
        assert!(emoji_matches("1\u{FE0F}\u{20E3}", "1\u{20E3}"));
    }
}
