//! Content Minifier
//!
//! Collapses multi-line templated prose into one compact line. Text
//! between a pair of `<!>` markers is passed through verbatim, and the
//! `{{user}}` / `{{char}}` placeholders survive untouched.

use regex::{Regex, RegexBuilder};

/// Toggles between minified and verbatim segments.
pub const ESCAPE_MARKER: &str = "<!>";

/// Placeholders protected from the collapsing rules (matched in any case).
pub const PLACEHOLDERS: [&str; 2] = ["{{user}}", "{{char}}"];

/// Literal rewrites, each applied until its pattern no longer occurs.
/// No replacement may contain its own pattern.
const RULES: &[(&str, &str)] = &[
    // Duplicate spaces
    ("  ", " "),
    (" \n", "\n"),
    ("\n ", "\n"),
    // The only line feed that carries meaning
    ("}\n", "}; "),
    // Remaining line feeds
    ("\n", " "),
    ("  ", " "),
    // Duplicate semicolons
    ("; }", " }"),
    (";;", ";"),
    ("; ;", ";"),
    // Repeated closing brackets
    ("}; }", "}}"),
    ("};}", "}}"),
    ("} }", "}}"),
];

/// Replace `from` with `to` until `from` no longer occurs.
pub fn replace_until_stable(text: &str, from: &str, to: &str) -> String {
    debug_assert!(!to.contains(from), "replacement {:?} contains {:?}", to, from);

    let mut text = text.to_string();
    while text.contains(from) {
        text = text.replace(from, to);
    }
    text
}

/// Trim the text and clamp runs of blank lines to a single blank line.
pub fn deep_strip(text: &str) -> String {
    replace_until_stable(text.trim(), "\n\n\n", "\n\n")
}

/// Minify `text`. Idempotent for text without escape markers.
pub fn minify_content(text: &str) -> String {
    let placeholders = placeholder_pattern();

    let segments: Vec<String> = text
        .split(ESCAPE_MARKER)
        .enumerate()
        .map(|(i, segment)| {
            if i % 2 == 0 {
                minify_segment(segment, &placeholders)
            } else {
                segment.to_string()
            }
        })
        .collect();

    deep_strip(&segments.join("\n"))
}

fn placeholder_pattern() -> Option<Regex> {
    let alternatives: Vec<String> = PLACEHOLDERS.iter().map(|p| regex::escape(p)).collect();
    RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(true)
        .build()
        .ok()
}

fn minify_segment(segment: &str, placeholders: &Option<Regex>) -> String {
    let (shielded, sentinel, saved) = shield(segment, placeholders);
    let collapsed = collapse(&shielded);
    unshield(&collapsed, sentinel, saved)
}

/// Swap every placeholder for a sentinel character that does not occur in
/// the segment, remembering the original spellings in order.
fn shield(segment: &str, placeholders: &Option<Regex>) -> (String, char, Vec<String>) {
    let sentinel = ('\u{E000}'..='\u{F8FF}')
        .find(|c| !segment.contains(*c))
        .unwrap_or('\u{E000}');

    let Some(pattern) = placeholders else {
        return (segment.to_string(), sentinel, vec![]);
    };

    let saved: Vec<String> = pattern
        .find_iter(segment)
        .map(|m| m.as_str().to_string())
        .collect();
    let shielded = pattern
        .replace_all(segment, sentinel.to_string().as_str())
        .into_owned();
    (shielded, sentinel, saved)
}

fn unshield(text: &str, sentinel: char, saved: Vec<String>) -> String {
    if saved.is_empty() {
        return text.to_string();
    }

    let mut restored = String::with_capacity(text.len() + saved.len() * 8);
    let mut saved = saved.into_iter();
    for c in text.chars() {
        match (c == sentinel).then(|| saved.next()).flatten() {
            Some(original) => restored.push_str(&original),
            None => restored.push(c),
        }
    }
    restored
}

/// Run the rule list (trimming after each rule) until nothing changes.
fn collapse(segment: &str) -> String {
    let mut current = segment.trim().to_string();
    loop {
        let mut next = current.clone();
        for (from, to) in RULES {
            next = replace_until_stable(&next, from, to).trim().to_string();
        }
        if next == current {
            return next;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_collapse_to_one_line() {
        assert_eq!(minify_content("Hello\n\nworld"), "Hello world");
        assert_eq!(minify_content("  a  \n   b   c \n"), "a b c");
    }

    #[test]
    fn test_closing_brace_line_feed_becomes_separator() {
        assert_eq!(
            minify_content("{{char}} = {\n  mood: calm\n}\n{{user}} = { }"),
            "{{char}} = { mood: calm }; {{user}} = { }"
        );
        assert_eq!(minify_content("a {\nb {\nc }\n}\n"), "a { b { c }}");
    }

    #[test]
    fn test_semicolons_are_deduplicated() {
        assert_eq!(minify_content("x;;; y; ; z"), "x; y; z");
        assert_eq!(minify_content("{ a; }"), "{ a }");
    }

    #[test]
    fn test_placeholders_are_not_rewritten() {
        assert_eq!(minify_content("{{User}}\nlikes {{CHAR}}"), "{{User}} likes {{CHAR}}");
        assert_eq!(minify_content("{{char}}\n{{user}}"), "{{char}} {{user}}");
    }

    #[test]
    fn test_escaped_segment_is_verbatim() {
        let text = "Intro\ntext<!>line one\n  line  two\n<!>outro  here";
        assert_eq!(
            minify_content(text),
            "Intro text\nline one\n  line  two\n\noutro here"
        );
    }

    #[test]
    fn test_idempotent_on_plain_text() {
        let once = minify_content("a ;; }\n} }\n\n{{user}}\n}  x");
        assert_eq!(minify_content(&once), once);
    }

    #[test]
    fn test_deep_strip_clamps_blank_lines() {
        assert_eq!(deep_strip("\n\n a\n\n\n\n\nb \n\n"), "a\n\nb");
    }

    #[test]
    fn test_replace_until_stable_reaches_fixed_point() {
        assert_eq!(replace_until_stable("a     b", "  ", " "), "a b");
    }
}
