use serde_json::Value;

/// Canonical comparable form of a piece of text: lowercase, punctuation
/// stripped, split on whitespace, empty tokens dropped.
///
/// The character classes match the scoring backend: a "word character" is an
/// ASCII letter, digit or underscore. Everything else that is not whitespace
/// is removed before splitting, so `"don't"` becomes `"dont"` and `"well-read"`
/// becomes `"wellread"`.
pub fn normalize_words(text: &str) -> Vec<String> {
    let clean: String = text
        .to_lowercase()
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();

    clean.split_whitespace().map(str::to_owned).collect()
}

/// Same as [`normalize_words`] for untyped payload fields; anything that is
/// not a JSON string yields no tokens.
pub fn normalize_value(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => normalize_words(s),
        _ => Vec::new(),
    }
}

/// First normalized token of `text`, or an empty string when there is none.
pub fn first_token(text: &str) -> String {
    normalize_words(text).into_iter().next().unwrap_or_default()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
