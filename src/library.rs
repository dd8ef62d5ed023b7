//! Passages bundled into the binary, grouped by grade level.

use include_dir::{include_dir, Dir};
use log::{debug, warn};
use rand::seq::SliceRandom;
use serde::Deserialize;

static PASSAGE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/passages");

#[derive(Deserialize, Clone, Debug)]
pub struct Collection {
    pub name: String,
    pub grade_level: Option<u32>,
    pub passages: Vec<RawPassage>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RawPassage {
    pub title: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryEntry {
    pub title: String,
    pub text: String,
    pub grade_level: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct Library {
    entries: Vec<LibraryEntry>,
}

impl Library {
    /// Every bundled collection. Files that fail to parse are skipped.
    pub fn bundled() -> Self {
        let mut files: Vec<_> = PASSAGE_DIR
            .files()
            .filter(|f| f.path().extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort_by(|a, b| a.path().cmp(b.path()));

        let mut library = Self::default();
        for file in files {
            let parsed = file
                .contents_utf8()
                .ok_or_else(|| "not utf-8".to_string())
                .and_then(|s| serde_json::from_str::<Collection>(s).map_err(|e| e.to_string()));
            match parsed {
                Ok(collection) => library.add_collection(collection),
                Err(e) => warn!("skipping passage file {}: {}", file.path().display(), e),
            }
        }
        library
    }

    pub fn from_entries(entries: Vec<LibraryEntry>) -> Self {
        Self { entries }
    }

    pub fn add_collection(&mut self, collection: Collection) {
        debug!(
            "loading {} passages from {}",
            collection.passages.len(),
            collection.name
        );
        let grade_level = collection.grade_level;
        self.entries.extend(
            collection
                .passages
                .into_iter()
                .filter(|p| !p.text.trim().is_empty())
                .map(|p| LibraryEntry {
                    title: p.title,
                    text: p.text,
                    grade_level,
                }),
        );
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn random(&self) -> Option<&LibraryEntry> {
        self.entries.choose(&mut rand::thread_rng())
    }

    /// A random passage other than `current_text`, when there is one.
    pub fn another(&self, current_text: &str) -> Option<&LibraryEntry> {
        let others: Vec<&LibraryEntry> = self
            .entries
            .iter()
            .filter(|e| e.text != current_text)
            .collect();
        match others.choose(&mut rand::thread_rng()) {
            Some(entry) => Some(*entry),
            None => self.entries.first(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> LibraryEntry {
        LibraryEntry {
            title: text.to_uppercase(),
            text: text.into(),
            grade_level: None,
        }
    }

    #[test]
    fn test_bundled_passages_load() {
        let library = Library::bundled();
        assert!(!library.is_empty());
        assert!(library.entries().iter().all(|e| !e.text.is_empty()));
        assert!(library
            .entries()
            .iter()
            .any(|e| e.text.starts_with("The quick brown fox")));
        assert!(library.entries().iter().all(|e| e.grade_level.is_some()));
    }

    #[test]
    fn test_collection_deserialization() {
        let json_data = r#"
        {
            "name": "test",
            "grade_level": 3,
            "passages": [
                {"title": "One", "text": "first passage"},
                {"title": "Blank", "text": "   "}
            ]
        }
        "#;
        let collection: Collection = serde_json::from_str(json_data).unwrap();
        let mut library = Library::default();
        library.add_collection(collection);

        assert_eq!(library.entries().len(), 1);
        assert_eq!(library.entries()[0].grade_level, Some(3));
    }

    #[test]
    fn test_another_avoids_current() {
        let library = Library::from_entries(vec![entry("a"), entry("b")]);
        for _ in 0..20 {
            assert_eq!(library.another("a").unwrap().text, "b");
        }
    }

    #[test]
    fn test_another_with_single_entry() {
        let library = Library::from_entries(vec![entry("only")]);
        assert_eq!(library.another("only").unwrap().text, "only");
        assert!(Library::default().another("x").is_none());
        assert!(Library::default().random().is_none());
    }
}
