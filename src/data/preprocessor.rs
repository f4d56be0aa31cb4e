// ============================================================
// Layer 4: Title Cleaner
// ============================================================
// Normalises an article title before tokenisation.
//
// Scraped news titles carry:
//   - ideographic spaces (U+3000) from full-width layouts
//   - non-breaking / zero-width spaces from HTML
//   - stray newlines and tabs from the crawler
//   - control characters
//
// A title is one line, so every whitespace run collapses to a
// single ASCII space and the result is trimmed.
//
// Reference: Rust Book §8 (Strings in Rust)

pub struct TitleCleaner;

impl TitleCleaner {
    pub fn new() -> Self {
        Self
    }

    pub fn clean(&self, title: &str) -> String {
        let mut out        = String::with_capacity(title.len());
        let mut last_space = true; // swallows leading whitespace

        for c in title.chars() {
            let c = match c {
                '\u{3000}' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_whitespace() || c.is_control() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        if out.ends_with(' ') {
            out.pop();
        }
        out
    }
}

impl Default for TitleCleaner {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace_runs() {
        let c = TitleCleaner::new();
        assert_eq!(c.clean("stocks \t\n rally"), "stocks rally");
    }

    #[test]
    fn test_full_width_space_is_a_separator() {
        let c = TitleCleaner::new();
        assert_eq!(c.clean("茅台\u{3000}业绩"), "茅台 业绩");
    }

    #[test]
    fn test_trims_and_strips_control_chars() {
        let c = TitleCleaner::new();
        assert_eq!(c.clean("  a\x01b  "), "a b");
        assert_eq!(c.clean(""), "");
        assert_eq!(c.clean(" \u{200B} "), "");
    }
}
