//! Small text helpers shared by extraction, intent parsing and retrieval.

const TRIM_CHARS: &[char] = &[
    '?', '!', '.', ',', ';', ':', '"', '\'', '(', ')', '[', ']', '{', '}', '`',
];

/// Lowercased whitespace tokens with surrounding punctuation removed.
///
/// Internal hyphens are kept so names like `insat-3d` survive as one token.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(TRIM_CHARS).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Tokens longer than two characters, the ones retrieval scores on.
pub fn significant_tokens(text: &str) -> Vec<String> {
    tokenize(text).into_iter().filter(|t| t.chars().count() > 2).collect()
}

/// Byte range of the first case-insensitive occurrence of `needle`.
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle_lower: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle_lower.is_empty() {
        return None;
    }
    for (start, _) in haystack.char_indices() {
        let mut expected = needle_lower.iter().peekable();
        let mut chars = haystack[start..].char_indices();
        let mut end = start;
        loop {
            if expected.peek().is_none() {
                return Some((start, end));
            }
            let Some((offset, c)) = chars.next() else {
                break;
            };
            let lowered_matches = c
                .to_lowercase()
                .all(|lc| matches!(expected.next(), Some(&e) if e == lc));
            if !lowered_matches {
                break;
            }
            end = start + offset + c.len_utf8();
        }
    }
    None
}

/// Up to `radius` characters either side of `start..end`, trimmed.
pub fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    if radius == 0 {
        return text[start..end].trim().to_string();
    }
    let ctx_start = text[..start]
        .char_indices()
        .rev()
        .nth(radius - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let ctx_end = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[ctx_start..ctx_end].trim().to_string()
}

/// Context for the first case-insensitive occurrence of `needle`, or empty.
pub fn mention_context(text: &str, needle: &str, radius: usize) -> String {
    match find_case_insensitive(text, needle) {
        Some((start, end)) => context_window(text, start, end, radius),
        None => String::new(),
    }
}

/// Split text into sentences on terminal punctuation and newlines.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    for (i, &(idx, c)) in chars.iter().enumerate() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => chars
                .get(i + 1)
                .map(|&(_, next)| next.is_whitespace())
                .unwrap_or(true),
            _ => false,
        };
        if boundary {
            let end = idx + c.len_utf8();
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
