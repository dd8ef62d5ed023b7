//! Results produced by the scoring and coaching services.
//!
//! Responses are parsed leniently from `serde_json::Value`: a missing or
//! mistyped field is treated as absent instead of failing the whole stage.

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordStatus {
    Correct,
    Misread,
    Other(String),
}

impl WordStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "correct" => WordStatus::Correct,
            "misread" => WordStatus::Misread,
            other => WordStatus::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WordStatus::Correct => "correct",
            WordStatus::Misread => "misread",
            WordStatus::Other(s) => s,
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, WordStatus::Correct)
    }
}

impl fmt::Display for WordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordFeedback {
    pub word: String,
    pub status: WordStatus,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationResult {
    /// Percentage in `[0, 100]`.
    pub accuracy: f64,
    pub words: Vec<WordFeedback>,
}

impl EvaluationResult {
    pub fn from_value(value: &Value) -> Self {
        let accuracy = value
            .get("accuracy")
            .and_then(Value::as_f64)
            .filter(|a| a.is_finite())
            .map(|a| a.clamp(0.0, 100.0))
            .unwrap_or(0.0);

        let words = value
            .get("words")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let word = entry.get("word")?.as_str()?;
                        let status = entry.get("status").and_then(Value::as_str).unwrap_or("");
                        Some(WordFeedback {
                            word: word.to_owned(),
                            status: WordStatus::parse(status),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { accuracy, words }
    }

    /// Passage words the scorer did not accept as correct, in passage order.
    pub fn misread_words(&self) -> Vec<String> {
        self.words
            .iter()
            .filter(|w| !w.status.is_correct())
            .map(|w| w.word.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tip {
    pub word: String,
    pub tip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoachingResult {
    pub encouragement: Option<String>,
    pub tips: Option<Vec<Tip>>,
    pub questions: Option<Vec<String>>,
}

impl CoachingResult {
    pub fn from_value(value: &Value) -> Self {
        let encouragement = value
            .get("encouragement")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned);

        let tips = value.get("tips").and_then(Value::as_array).map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    Some(Tip {
                        word: entry.get("word")?.as_str()?.to_owned(),
                        tip: entry.get("tip")?.as_str()?.to_owned(),
                    })
                })
                .collect()
        });

        let questions = value
            .get("questions")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            });

        Self {
            encouragement,
            tips,
            questions,
        }
    }
}

/// Grade level from an assignment record, if it carries a usable one.
pub fn grade_level_from_value(value: &Value) -> Option<u32> {
    value
        .get("grade_level")
        .and_then(Value::as_u64)
        .and_then(|g| u32::try_from(g).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_evaluation_parses_words_in_order() {
        let result = EvaluationResult::from_value(&json!({
            "accuracy": 80,
            "words": [
                {"word": "the", "status": "correct"},
                {"word": "jumps", "status": "misread"},
                {"word": "fox", "status": "skipped"}
            ]
        }));

        assert_eq!(result.accuracy, 80.0);
        assert_eq!(result.words.len(), 3);
        assert_eq!(result.words[1].status, WordStatus::Misread);
        assert_eq!(result.words[2].status, WordStatus::Other("skipped".into()));
    }

    #[test]
    fn test_misread_words_are_everything_not_correct() {
        let result = EvaluationResult::from_value(&json!({
            "accuracy": 50,
            "words": [
                {"word": "a", "status": "correct"},
                {"word": "b", "status": "misread"},
                {"word": "c", "status": "skipped"}
            ]
        }));
        assert_eq!(result.misread_words(), vec!["b", "c"]);
    }

    #[test]
    fn test_evaluation_tolerates_missing_fields() {
        let result = EvaluationResult::from_value(&json!({"words": "nope"}));
        assert_eq!(result.accuracy, 0.0);
        assert!(result.words.is_empty());

        let result = EvaluationResult::from_value(&json!({
            "accuracy": "high",
            "words": [{"status": "correct"}, {"word": "ok"}]
        }));
        assert_eq!(result.accuracy, 0.0);
        assert_eq!(result.words.len(), 1);
        assert_eq!(result.words[0].status, WordStatus::Other(String::new()));
    }

    #[test]
    fn test_accuracy_is_clamped() {
        let result = EvaluationResult::from_value(&json!({"accuracy": 140.5}));
        assert_eq!(result.accuracy, 100.0);
        let result = EvaluationResult::from_value(&json!({"accuracy": -3}));
        assert_eq!(result.accuracy, 0.0);
    }

    #[test]
    fn test_coaching_fields_are_independent() {
        let coaching = CoachingResult::from_value(&json!({
            "encouragement": "Great job!",
            "questions": ["Who ran?", 7]
        }));
        assert_eq!(coaching.encouragement.as_deref(), Some("Great job!"));
        assert_eq!(coaching.tips, None);
        assert_eq!(coaching.questions, Some(vec!["Who ran?".to_string()]));
    }

    #[test]
    fn test_coaching_malformed_fields_are_absent() {
        let coaching = CoachingResult::from_value(&json!({
            "encouragement": 12,
            "tips": "say it slowly",
            "questions": null
        }));
        assert_eq!(coaching, CoachingResult::default());
    }

    #[test]
    fn test_coaching_tips_skip_incomplete_entries() {
        let coaching = CoachingResult::from_value(&json!({
            "tips": [{"word": "jumps", "tip": "Sound out j-u-m-p-s."}, {"word": "fox"}]
        }));
        assert_eq!(
            coaching.tips,
            Some(vec![Tip {
                word: "jumps".into(),
                tip: "Sound out j-u-m-p-s.".into()
            }])
        );
    }

    #[test]
    fn test_grade_level() {
        assert_eq!(grade_level_from_value(&json!({"grade_level": 3})), Some(3));
        assert_eq!(grade_level_from_value(&json!({"grade_level": "3"})), None);
        assert_eq!(grade_level_from_value(&json!({})), None);
    }
}
