use regex::Regex;
use std::sync::OnceLock;

/// Break inserted before each speaker marker or timestamp
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// Speaker-change marker used by caption tracks and transcript pages
pub const SPEAKER_MARKER: &str = ">>";

fn boundaries() -> &'static Regex {
    static BOUNDARIES: OnceLock<Regex> = OnceLock::new();
    BOUNDARIES.get_or_init(|| Regex::new(r">>|\b\d{2}:\d{2}\b").expect("valid regex"))
}

/// Start a new paragraph before every speaker marker and `MM:SS` timestamp.
///
/// An occurrence at the very start of the text is left alone.
pub fn format_transcript(text: &str) -> String {
    let mut formatted = String::with_capacity(text.len() + text.len() / 16);
    let mut last = 0;

    for found in boundaries().find_iter(text) {
        if found.start() == 0 || inside_longer_timestamp(text, found.start()) {
            continue;
        }
        formatted.push_str(&text[last..found.start()]);
        formatted.push_str(PARAGRAPH_BREAK);
        last = found.start();
    }
    formatted.push_str(&text[last..]);

    formatted
}

/// A match right after `<digit>:` is the tail of an `H:MM:SS` stamp
fn inside_longer_timestamp(text: &str, start: usize) -> bool {
    let before = &text.as_bytes()[..start];
    before.len() >= 2 && before[before.len() - 1] == b':' && before[before.len() - 2].is_ascii_digit()
}

/// Paragraphs of formatted text, blank ones dropped
pub fn paragraphs(formatted: &str) -> impl Iterator<Item = &str> {
    formatted
        .split(PARAGRAPH_BREAK)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}
