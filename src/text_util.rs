//! Plain-text helpers for rendering answers: excerpts, sentences and
//! enumerated steps.

/// Ordinal words that open a step when they start a sentence.
const ORDINAL_MARKERS: &[&str] =
    &["First,", "Second,", "Third,", "Next,", "Then,", "Finally,"];

/// Cut `text` to at most `max_chars` characters, preferring a word
/// boundary, and mark the cut with `...`.
///
/// # Examples
///
/// ```
/// use cdpqa::text_util::truncate_chars;
///
/// assert_eq!(truncate_chars("short", 10), "short");
/// assert_eq!(truncate_chars("one two three", 9), "one two...");
/// ```
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let head = &text[..cut];
    let end = match head.rfind(char::is_whitespace) {
        Some(ws) if ws >= cut / 2 => ws,
        _ => cut,
    };

    let mut out = head[..end].trim_end().to_string();
    out.push_str("...");
    out
}

/// Byte offsets where enumerated steps start ("1.", "2)", "Step 3",
/// "First,", "Next,", ...), in text order.
pub fn step_offsets(text: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut prev: Option<char> = None;
    let mut last_visible: Option<char> = None;

    for (i, c) in text.char_indices() {
        let word_start = prev.is_none_or(char::is_whitespace);
        if word_start && !c.is_whitespace() {
            let rest = &text[i..];
            let sentence_start = last_visible.is_none_or(|p| ".:!?".contains(p));
            if is_numbered_step(rest)
                || is_step_word(rest)
                || (sentence_start
                    && ORDINAL_MARKERS.iter().any(|m| rest.starts_with(m)))
            {
                offsets.push(i);
            }
        }
        if !c.is_whitespace() {
            last_visible = Some(c);
        }
        prev = Some(c);
    }

    offsets
}

fn is_numbered_step(rest: &str) -> bool {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > 2 {
        return false;
    }
    let mut after = rest[digits..].chars();
    matches!(after.next(), Some('.' | ')'))
        && after.next().is_none_or(char::is_whitespace)
}

fn is_step_word(rest: &str) -> bool {
    let Some(head) = rest.get(..5) else {
        return false;
    };
    head.eq_ignore_ascii_case("step ")
        && rest[5..].starts_with(|c: char| c.is_ascii_digit())
}

/// Put every enumerated step on its own line, keeping their order.
///
/// Text with fewer than two steps is not a list and is returned as is.
pub fn format_steps(text: &str) -> String {
    let offsets = step_offsets(text);
    if offsets.len() < 2 {
        return text.to_string();
    }

    let mut bounds = offsets;
    if bounds[0] != 0 {
        bounds.insert(0, 0);
    }
    bounds.push(text.len());

    bounds
        .windows(2)
        .map(|w| text[w[0]..w[1]].trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// An excerpt of at most `max_chars` characters. Long text containing a
/// list of steps is excerpted from its first step.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let offsets = step_offsets(text);
    let start = if text.chars().count() > max_chars && offsets.len() >= 2 {
        offsets[0]
    } else {
        0
    };
    format_steps(&truncate_chars(&text[start..], max_chars))
}

/// Split text into sentences on `.`, `!` or `?` followed by whitespace.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_none_or(|(_, next)| next.is_whitespace())
        {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn truncate_prefers_word_boundary() {
        let text = "alpha beta gamma delta";
        assert_eq!(truncate_chars(text, 13), "alpha beta...");
    }

    #[test]
    fn truncate_hard_cuts_long_words() {
        assert_eq!(truncate_chars("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn truncate_is_char_safe() {
        let text = "日本語のテキストです";
        let cut = truncate_chars(text, 3);
        assert_eq!(cut, "日本語...");
    }

    #[test]
    fn finds_numbered_steps() {
        let text = "Setup: 1. Open Sources. 2) Click Add. 3. Save it.";
        assert_eq!(step_offsets(text).len(), 3);
    }

    #[test]
    fn version_numbers_are_not_steps() {
        assert!(step_offsets("Requires version 2.0 or 10.5 and up").is_empty());
    }

    #[test]
    fn finds_step_words_and_ordinals() {
        let text = "Step 1 open the app. Step 2 log in. First, check access. \
                    Then, continue. The first, wrong one.";
        let offsets = step_offsets(text);
        assert_eq!(offsets.len(), 4);
        assert_eq!(&text[offsets[2]..offsets[2] + 6], "First,");
    }

    #[test]
    fn ordinals_mid_sentence_are_ignored() {
        assert!(step_offsets("do this and Next, that").is_empty());
    }

    #[test]
    fn format_steps_one_per_line() {
        let text = "To add a source: 1. Open Sources. 2. Click Add Source. 3. Name it.";
        assert_eq!(
            format_steps(text),
            "To add a source:\n1. Open Sources.\n2. Click Add Source.\n3. Name it."
        );
    }

    #[test]
    fn single_step_is_not_a_list() {
        let text = "Go to 1. settings";
        assert_eq!(format_steps(text), text);
    }

    #[test]
    fn excerpt_starts_at_first_step_when_long() {
        let intro = "Background text. ".repeat(20);
        let text = format!("{intro}1. Open the workspace. 2. Click Sources.");
        let out = excerpt(&text, 60);
        assert!(out.starts_with("1. Open the workspace."), "{out}");
        assert!(out.contains("\n2. Click Sources."));
    }

    #[test]
    fn excerpt_keeps_intro_when_short() {
        let text = "Intro. 1. Open. 2. Click.";
        assert_eq!(excerpt(text, 800), "Intro.\n1. Open.\n2. Click.");
    }

    #[test]
    fn splits_sentences() {
        assert_eq!(
            sentences("One. Two! Three? v2.0 stays whole. tail"),
            vec!["One.", "Two!", "Three?", "v2.0 stays whole.", "tail"]
        );
    }
}
