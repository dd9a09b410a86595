//! Text helpers shared by matching and rendering

/// Lower-case and fold German umlauts and `ß` to their ASCII transcriptions
///
/// `"Nächstes Krankenhaus"` and `"naechstes krankenhaus"` fold identically.
#[must_use]
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        match c {
            'ä' => out.push_str("ae"),
            'ö' => out.push_str("oe"),
            'ü' => out.push_str("ue"),
            'ß' => out.push_str("ss"),
            _ => out.push(c),
        }
    }
    out
}

/// Folded words of a text, split on anything that is not alphanumeric
#[must_use]
pub fn words(text: &str) -> Vec<String> {
    fold(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// First `max_chars` characters, with an ellipsis when cut
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

/// Longest prefix of `text` within `max_chars` that ends at a sentence boundary
///
/// Falls back to the last word boundary when no sentence ends early enough
#[must_use]
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    let sentence_end = head
        .char_indices()
        .filter(|&(i, c)| {
            matches!(c, '.' | '!' | '?' | '\n')
                && head[i + c.len_utf8()..].chars().next().is_none_or(char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .last();
    let end = sentence_end
        .or_else(|| head.rfind(char::is_whitespace))
        .unwrap_or(0);
    head[..end].trim_end().to_string()
}
