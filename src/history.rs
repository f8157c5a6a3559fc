//! Generation history.
//!
//! A newest-first list of past generations, kept as a single JSON file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::entry::now_millis;
use crate::types::OutputFormat;
use crate::{Result, VizgenError};

/// Items kept by default.
pub const DEFAULT_MAX_ITEMS: usize = 100;

const PREVIEW_CHARS: usize = 200;
const TITLE_CHARS: usize = 30;

/// One past generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// Unique id, milliseconds since the Unix epoch at creation.
    pub id: u64,
    /// Preview of the input text.
    pub text: String,
    /// Template key used to build the prompt.
    pub template: String,
    pub model: String,
    pub format: OutputFormat,
    /// The generated code.
    pub result: String,
    pub timestamp: u64,
    pub title: String,
}

/// A new history entry, before it is assigned an id.
#[derive(Debug, Clone, Copy)]
pub struct NewHistoryItem<'a> {
    pub text: &'a str,
    pub template: &'a str,
    pub model: &'a str,
    pub format: OutputFormat,
    pub result: &'a str,
}

/// File-backed generation history.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    max_items: usize,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = n.max(1);
        self
    }

    /// Default location: `<user data dir>/vizgen/history.json`.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vizgen")
            .join("history.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a generation; returns the new item's id.
    pub fn add(&self, new: NewHistoryItem<'_>) -> Result<u64> {
        let mut items = self.list()?;
        let now = now_millis();
        // Two saves within one millisecond still get distinct ids.
        let id = match items.first() {
            Some(newest) if newest.id >= now => newest.id + 1,
            _ => now,
        };
        items.insert(
            0,
            HistoryItem {
                id,
                text: preview(new.text),
                template: new.template.to_string(),
                model: new.model.to_string(),
                format: new.format,
                result: new.result.to_string(),
                timestamp: now,
                title: title(new.text),
            },
        );
        items.truncate(self.max_items);
        self.save(&items)?;
        debug!(id, items = items.len(), "history item saved");
        Ok(id)
    }

    /// All items, newest first. A missing file is an empty history.
    pub fn list(&self) -> Result<Vec<HistoryItem>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, id: u64) -> Result<HistoryItem> {
        self.list()?
            .into_iter()
            .find(|item| item.id == id)
            .ok_or(VizgenError::HistoryItemNotFound(id))
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        let mut items = self.list()?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Err(VizgenError::HistoryItemNotFound(id));
        }
        self.save(&items)
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, items: &[HistoryItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn preview(text: &str) -> String {
    truncate_chars(text, PREVIEW_CHARS)
}

fn title(text: &str) -> String {
    let first_line = text.trim().lines().next().unwrap_or_default();
    truncate_chars(first_line, TITLE_CHARS)
}

/// `text` cut to `max` characters, with `...` appended when cut.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item<'a>(text: &'a str, result: &'a str) -> NewHistoryItem<'a> {
        NewHistoryItem {
            text,
            template: "data-analysis",
            model: "x-ai/grok-4",
            format: OutputFormat::Svg,
            result,
        }
    }

    #[test]
    fn preview_and_title_truncation() {
        let long = "x".repeat(250);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(200)));
        assert_eq!(preview("short"), "short");

        assert_eq!(title("  Quarterly sales\nQ1 10, Q2 20"), "Quarterly sales");
        let long_line = "a".repeat(31);
        assert_eq!(title(&long_line), format!("{}...", "a".repeat(30)));
        assert_eq!(title(&"b".repeat(30)), "b".repeat(30));
    }

    #[test]
    fn truncation_counts_characters() {
        let text = "数".repeat(40);
        assert_eq!(title(&text), format!("{}...", "数".repeat(30)));
    }

    #[test]
    fn newest_first_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested").join("history.json"));
        assert!(store.list().unwrap().is_empty());

        let first = store.add(item("first", "<svg id=\"1\"/>")).unwrap();
        let second = store.add(item("second", "<svg id=\"2\"/>")).unwrap();
        assert_ne!(first, second);

        let items = store.list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, second);
        assert_eq!(store.get(first).unwrap().result, "<svg id=\"1\"/>");
    }

    #[test]
    fn capped_at_max_items() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json")).max_items(3);
        for i in 0..5 {
            store.add(item(&format!("text {i}"), "<svg/>")).unwrap();
        }
        let titles: Vec<String> = store.list().unwrap().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["text 4", "text 3", "text 2"]);
    }

    #[test]
    fn delete_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        let id = store.add(item("one", "<svg/>")).unwrap();
        store.add(item("two", "<svg/>")).unwrap();

        store.delete(id).unwrap();
        assert!(matches!(
            store.get(id),
            Err(VizgenError::HistoryItemNotFound(missing)) if missing == id
        ));
        assert!(matches!(
            store.delete(id),
            Err(VizgenError::HistoryItemNotFound(_))
        ));

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            HistoryStore::new(path).list(),
            Err(VizgenError::Json(_))
        ));
    }
}
