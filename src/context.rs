use log::warn;
use reqwest::Url;

/// What the current attempt is about: the reference text and, when the
/// reading belongs to an assignment, its identifier. Threaded explicitly into
/// the pipeline and playback rather than read from shared state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PracticeContext {
    pub passage_text: String,
    pub assignment_id: Option<i64>,
    pub title: Option<String>,
}

impl PracticeContext {
    pub fn new(passage_text: impl Into<String>) -> Self {
        Self {
            passage_text: passage_text.into(),
            ..Default::default()
        }
    }

    pub fn with_assignment(mut self, assignment_id: Option<i64>) -> Self {
        self.assignment_id = assignment_id;
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }
}

/// Assignment id from the `id` query parameter of a page URL.
///
/// Leading digits are used the way a lenient integer parse would read them
/// (`"42abc"` is 42); an id with no leading digits is ignored.
pub fn assignment_id_from_url(url: &str) -> Option<i64> {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => {
            warn!("ignoring unparseable page url {}: {}", url, e);
            return None;
        }
    };
    let raw = parsed
        .query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned())?;
    parse_assignment_id(&raw)
}

pub fn parse_assignment_id(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        if !raw.is_empty() {
            warn!("ignoring non-numeric assignment id {:?}", raw);
        }
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_query() {
        assert_eq!(
            assignment_id_from_url("http://localhost:8000/read.html?id=42"),
            Some(42)
        );
        assert_eq!(
            assignment_id_from_url("https://school.example/read?lang=en&id=7&x=1"),
            Some(7)
        );
    }

    #[test]
    fn test_missing_or_empty_id() {
        assert_eq!(assignment_id_from_url("http://localhost/read.html"), None);
        assert_eq!(assignment_id_from_url("http://localhost/read.html?id="), None);
        assert_eq!(assignment_id_from_url("not a url"), None);
    }

    #[test]
    fn test_lenient_integer_parse() {
        assert_eq!(parse_assignment_id("42abc"), Some(42));
        assert_eq!(parse_assignment_id("  9"), Some(9));
        assert_eq!(parse_assignment_id("-3"), Some(-3));
        assert_eq!(parse_assignment_id("abc"), None);
        assert_eq!(parse_assignment_id(""), None);
    }

    #[test]
    fn test_builder() {
        let ctx = PracticeContext::new("text")
            .with_assignment(Some(42))
            .with_title(Some("Fox".into()));
        assert_eq!(ctx.passage_text, "text");
        assert_eq!(ctx.assignment_id, Some(42));
        assert_eq!(ctx.title.as_deref(), Some("Fox"));
    }
}
