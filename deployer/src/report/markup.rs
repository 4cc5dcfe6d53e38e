//! Terminal color markers in report text
//!
//! Tools run during a deployment may color their output with a small set
//! of ANSI sequences. Plain sinks strip them; the web page translates
//! them into inline styled spans.

pub const GREEN: &str = "\u{1b}[32m";
pub const BOLD_RED: &str = "\u{1b}[1;31m";
pub const RESET: &str = "\u{1b}[0m";

/// Output flavour for [`filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Plain,
    Html,
}

const PLAIN_REPLACEMENTS: [(&str, &str); 3] = [(GREEN, ""), (BOLD_RED, ""), (RESET, "")];

const HTML_REPLACEMENTS: [(&str, &str); 4] = [
    (GREEN, "<span style=\"color: green\">"),
    (BOLD_RED, "<span style=\"color: red\">"),
    (RESET, "</span>"),
    ("\n", "<br>"),
];

pub fn filter(message: &str, mode: Mode) -> String {
    match mode {
        Mode::Plain => {
            // Deleting a marker can splice the halves of another one together.
            let mut text = replace_all(message, &PLAIN_REPLACEMENTS);
            while PLAIN_REPLACEMENTS.iter().any(|(marker, _)| text.contains(marker)) {
                text = replace_all(&text, &PLAIN_REPLACEMENTS);
            }
            text
        }
        Mode::Html => replace_all(message, &HTML_REPLACEMENTS),
    }
}

/// Remove color markers.
pub fn strip(message: &str) -> String {
    filter(message, Mode::Plain)
}

/// Translate color markers to spans and newlines to `<br>`.
pub fn to_html(message: &str) -> String {
    filter(message, Mode::Html)
}

/// Escape text for an HTML element body. Markers pass through untouched.
pub fn escape_html(message: &str) -> String {
    replace_all(message, &[("&", "&amp;"), ("<", "&lt;"), (">", "&gt;")])
}

fn replace_all(message: &str, replacements: &[(&str, &str)]) -> String {
    replacements
        .iter()
        .fold(message.to_string(), |text, (from, to)| text.replace(from, to))
}
