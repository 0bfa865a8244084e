//! Splitting of long documentation pages into overlapping windows.
//!
//! Pages from the acquisition job can run to tens of kilobytes. Each page is
//! cut into windows of at most `window_chars` characters, breaking on
//! whitespace where possible, so one retrievable chunk covers roughly one
//! topic of the page.

/// Default window size in characters.
pub const DEFAULT_WINDOW_CHARS: usize = 1500;

/// Default overlap between adjacent windows in characters.
pub const DEFAULT_WINDOW_OVERLAP: usize = 150;

/// How far back from a hard cut we look for whitespace to break on.
const BOUNDARY_LOOKBACK: usize = 100;

/// A window of page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub text: String,
    /// Zero-based position of the window within its page.
    pub index: usize,
}

/// Split `text` into windows (optionally overlapping).
///
/// Text no longer than `window_chars` comes back as a single window.
/// Window edges always fall on char boundaries, so multi-byte text is safe.
///
/// # Examples
///
/// ```
/// use cdpqa::chunking::split_windows;
///
/// let windows = split_windows("Add a source.", 1000, 0);
/// assert_eq!(windows.len(), 1);
///
/// let long = "track ".repeat(500);
/// let windows = split_windows(&long, 1000, 100);
/// assert!(windows.len() >= 3);
/// ```
pub fn split_windows(
    text: &str,
    window_chars: usize,
    overlap: usize,
) -> Vec<Window> {
    let window_chars = window_chars.max(1);
    let char_count = text.chars().count();

    if char_count <= window_chars {
        return vec![Window {
            text: text.to_string(),
            index: 0,
        }];
    }

    // char index -> byte index, with one past-the-end entry
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();

    let mut windows = Vec::new();
    let mut start_char = 0;

    while start_char < char_count {
        let hard_end = (start_char + window_chars).min(char_count);
        let end_char = if hard_end < char_count {
            soft_boundary(text, &char_to_byte, start_char, hard_end)
        } else {
            hard_end
        };

        let slice = &text[char_to_byte[start_char]..char_to_byte[end_char]];
        if !slice.trim().is_empty() {
            windows.push(Window {
                text: slice.to_string(),
                index: windows.len(),
            });
        }

        if end_char >= char_count {
            break;
        }

        // Overlap is measured from where the window actually ended, so a
        // soft boundary never leaves a gap before the next window.
        start_char = end_char.saturating_sub(overlap).max(start_char + 1);
    }

    windows
}

/// Move a hard cut at `end_char` back to just after the closest whitespace,
/// without shrinking the window below half its size.
fn soft_boundary(
    text: &str,
    char_to_byte: &[usize],
    start_char: usize,
    end_char: usize,
) -> usize {
    let floor = start_char + (end_char - start_char) / 2;
    let search_from = end_char.saturating_sub(BOUNDARY_LOOKBACK).max(floor);
    let region = &text[char_to_byte[search_from]..char_to_byte[end_char]];

    match region.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
        Some((byte_in_region, _)) => {
            let ws_byte = char_to_byte[search_from] + byte_in_region;
            // char_to_byte is sorted; the first entry past the whitespace
            // is the char right after it.
            char_to_byte.partition_point(|&b| b <= ws_byte)
        }
        None => end_char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_window() {
        let windows = split_windows(
            "Hello, world!",
            DEFAULT_WINDOW_CHARS,
            DEFAULT_WINDOW_OVERLAP,
        );
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].text, "Hello, world!");
        assert_eq!(windows[0].index, 0);
    }

    #[test]
    fn long_text_overlapping_windows() {
        let text = "word ".repeat(500); // 2500 chars
        let windows = split_windows(&text, 1000, 200);

        assert!(windows.len() >= 2);
        assert_eq!(windows[0].index, 0);
        assert_eq!(windows[1].index, 1);

        let covered: usize = windows.iter().map(|w| w.text.len()).sum();
        assert!(covered > text.len(), "windows should overlap");
    }

    #[test]
    fn windows_break_on_whitespace() {
        let text = "alpha beta gamma delta ".repeat(100);
        for window in split_windows(&text, 300, 0) {
            let last = window.text.chars().last().unwrap();
            let at_end = text.ends_with(&window.text);
            assert!(last.is_whitespace() || at_end, "{:?}", window.text);
        }
    }

    #[test]
    fn windows_cover_the_whole_text() {
        let text = "a".repeat(3000);
        let windows = split_windows(&text, 1000, 200);

        assert!(text.starts_with(&windows[0].text));
        let last = windows.last().unwrap();
        assert!(text.ends_with(&last.text));
        let covered: usize = windows.iter().map(|w| w.text.len()).sum();
        assert!(covered >= text.len());
    }

    #[test]
    fn handles_multibyte_chars() {
        let text = "Hello 👉 world 🌍 café 日本語 ".repeat(100);
        let windows = split_windows(&text, 200, 50);

        assert!(!windows.is_empty());
        for window in &windows {
            assert!(!window.text.is_empty());
            assert!(window.text.chars().count() <= 200);
        }
    }

    #[test]
    fn zero_window_size_does_not_loop() {
        let windows = split_windows("abc", 0, 0);
        assert_eq!(windows.len(), 3);
    }
}
