//! JSON data files backing the local API
//! Creative ideas, generation history, UI settings and desktop layout

use crate::config::Paths;
use crate::constants::HISTORY_LIMIT;
use crate::utils::{externalize_creative_image, format_bytes, now_iso, now_millis};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A free-form JSON object carrying an integer `id`
pub type Record = Map<String, Value>;

pub fn record_id(record: &Record) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

/// Load a JSON file, returning `default` when missing or unparsable
pub fn load_json(path: &Path, default: Value) -> Value {
    match std::fs::read_to_string(path) {
        Ok(s) => match serde_json::from_str(&s) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse data file");
                default
            }
        },
        Err(_) => default,
    }
}

/// Write `value` next to `path` and rename it into place, so readers see
/// either the old or the new file, never a partial one
pub fn save_json(path: &Path, value: &Value) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

fn load_records(path: &Path) -> Vec<Record> {
    match load_json(path, json!([])) {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn save_records(path: &Path, records: &[Record]) -> std::io::Result<()> {
    let value = Value::Array(records.iter().cloned().map(Value::Object).collect());
    save_json(path, &value)
}

fn next_id(records: &[Record]) -> i64 {
    records.iter().filter_map(record_id).max().unwrap_or(0) + 1
}

fn default_settings() -> Value {
    json!({ "theme": "dark" })
}

/// Title and prompt, trimmed and lowercased, identify an idea for imports
fn idea_key(idea: &Record) -> (String, String) {
    let field = |name: &str| {
        idea.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    };
    (field("title"), field("prompt"))
}

/// Outcome of a bulk idea import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub imported: Vec<Record>,
    pub skipped: usize,
}

impl ImportOutcome {
    pub fn message(&self) -> String {
        let mut message = format!("Imported {} new ideas", self.imported.len());
        if self.skipped > 0 {
            message.push_str(&format!(", skipped {} duplicates", self.skipped));
        }
        message
    }
}

pub struct Store {
    paths: Paths,
}

impl Store {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Create the directory layout and seed missing data files
    pub fn init(&self) -> std::io::Result<()> {
        for dir in [
            &self.paths.input,
            &self.paths.output,
            &self.paths.data,
            &self.paths.creative_images,
        ] {
            std::fs::create_dir_all(dir)?;
            debug!(path = %dir.display(), "Directory ready");
        }

        let seeds = [
            (self.paths.creative_ideas_file(), json!([])),
            (self.paths.history_file(), json!([])),
            (self.paths.settings_file(), default_settings()),
            (self.paths.desktop_items_file(), json!([])),
        ];
        for (path, value) in seeds {
            if !path.exists() {
                save_json(&path, &value)?;
                info!(path = %path.display(), "Created data file");
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Creative ideas
    // ------------------------------------------------------------------

    pub fn ideas(&self) -> Vec<Record> {
        load_records(&self.paths.creative_ideas_file())
    }

    pub fn idea(&self, id: i64) -> Option<Record> {
        self.ideas().into_iter().find(|idea| record_id(idea) == Some(id))
    }

    fn externalize_image(&self, idea: &mut Record) {
        match externalize_creative_image(idea, &self.paths.creative_images) {
            Ok(Some(bytes)) => debug!(size = %format_bytes(bytes as u64), "Creative image saved"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to save creative image"),
        }
    }

    pub fn create_idea(&self, mut idea: Record) -> std::io::Result<Record> {
        let mut ideas = self.ideas();
        let now = now_iso();
        idea.insert("id".into(), json!(next_id(&ideas)));
        idea.insert("createdAt".into(), json!(now));
        idea.insert("updatedAt".into(), json!(now));
        self.externalize_image(&mut idea);

        ideas.push(idea.clone());
        save_records(&self.paths.creative_ideas_file(), &ideas)?;
        Ok(idea)
    }

    /// Append ideas whose title+prompt are not yet present, including
    /// duplicates within the same batch.
    pub fn import_ideas(&self, incoming: Vec<Record>) -> std::io::Result<ImportOutcome> {
        let mut ideas = self.ideas();
        let mut seen: HashSet<(String, String)> = ideas.iter().map(idea_key).collect();
        let mut max_id = next_id(&ideas) - 1;
        let mut outcome = ImportOutcome {
            imported: Vec::new(),
            skipped: 0,
        };

        for mut idea in incoming {
            let key = idea_key(&idea);
            if seen.contains(&key) {
                outcome.skipped += 1;
                continue;
            }

            max_id += 1;
            let now = now_iso();
            idea.insert("id".into(), json!(max_id));
            idea.insert("createdAt".into(), json!(now));
            idea.insert("updatedAt".into(), json!(now));
            self.externalize_image(&mut idea);

            ideas.push(idea.clone());
            outcome.imported.push(idea);
            seen.insert(key);
        }

        save_records(&self.paths.creative_ideas_file(), &ideas)?;
        info!(
            imported = outcome.imported.len(),
            skipped = outcome.skipped,
            "Ideas imported"
        );
        Ok(outcome)
    }

    /// Put `ordered_ids` first, tagging each with its position as `order`,
    /// followed by the remaining ideas in their previous order.
    pub fn reorder_ideas(&self, ordered_ids: &[i64]) -> std::io::Result<()> {
        let ideas = self.ideas();
        let mut by_id: HashMap<i64, Record> = HashMap::new();
        let mut rest = Vec::new();
        for idea in ideas {
            match record_id(&idea) {
                Some(id) if ordered_ids.contains(&id) => {
                    by_id.insert(id, idea);
                }
                _ => rest.push(idea),
            }
        }

        let mut reordered = Vec::with_capacity(by_id.len() + rest.len());
        for (idx, id) in ordered_ids.iter().enumerate() {
            if let Some(mut idea) = by_id.remove(id) {
                idea.insert("order".into(), json!(idx));
                reordered.push(idea);
            }
        }
        reordered.extend(rest);

        save_records(&self.paths.creative_ideas_file(), &reordered)
    }

    /// Merge `changes` into idea `id`, keeping its id and creation time
    pub fn update_idea(&self, id: i64, changes: Record) -> std::io::Result<Option<Record>> {
        let mut ideas = self.ideas();
        let Some(idea) = ideas.iter_mut().find(|idea| record_id(idea) == Some(id)) else {
            return Ok(None);
        };

        let created_at = idea
            .get("createdAt")
            .cloned()
            .unwrap_or_else(|| json!(now_iso()));
        idea.extend(changes);
        idea.insert("id".into(), json!(id));
        idea.insert("createdAt".into(), created_at);
        idea.insert("updatedAt".into(), json!(now_iso()));
        let updated = idea.clone();

        save_records(&self.paths.creative_ideas_file(), &ideas)?;
        Ok(Some(updated))
    }

    pub fn delete_idea(&self, id: i64) -> std::io::Result<bool> {
        let mut ideas = self.ideas();
        let before = ideas.len();
        ideas.retain(|idea| record_id(idea) != Some(id));
        if ideas.len() == before {
            return Ok(false);
        }
        save_records(&self.paths.creative_ideas_file(), &ideas)?;
        Ok(true)
    }

    /// Rewrite every inline base64 idea image as a file. Returns
    /// `(migrated, skipped, errors)`.
    pub fn migrate_idea_images(&self) -> std::io::Result<(usize, usize, usize)> {
        let mut ideas = self.ideas();
        let (mut migrated, mut skipped, mut errors) = (0, 0, 0);

        for (i, idea) in ideas.iter_mut().enumerate() {
            let title = idea
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("idea {}", i));
            match externalize_creative_image(idea, &self.paths.creative_images) {
                Ok(Some(bytes)) => {
                    migrated += 1;
                    info!(title = %title, size = %format_bytes(bytes as u64), "Migrated image");
                }
                Ok(None) => skipped += 1,
                Err(e) => {
                    errors += 1;
                    warn!(title = %title, error = %e, "Failed to migrate image");
                }
            }
        }

        if migrated > 0 {
            save_records(&self.paths.creative_ideas_file(), &ideas)?;
        }
        Ok((migrated, skipped, errors))
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn history(&self) -> Vec<Record> {
        load_records(&self.paths.history_file())
    }

    /// Insert a record at the front, capped at [`HISTORY_LIMIT`] entries
    pub fn add_history(&self, mut record: Record) -> std::io::Result<Record> {
        let mut history = self.history();
        record.insert("id".into(), json!(next_id(&history)));
        if !record.contains_key("timestamp") {
            record.insert("timestamp".into(), json!(now_millis()));
        }

        history.insert(0, record.clone());
        history.truncate(HISTORY_LIMIT);
        save_records(&self.paths.history_file(), &history)?;
        Ok(record)
    }

    pub fn delete_history(&self, id: i64) -> std::io::Result<bool> {
        let mut history = self.history();
        let before = history.len();
        history.retain(|record| record_id(record) != Some(id));
        if history.len() == before {
            return Ok(false);
        }
        save_records(&self.paths.history_file(), &history)?;
        Ok(true)
    }

    pub fn clear_history(&self) -> std::io::Result<()> {
        save_records(&self.paths.history_file(), &[])
    }

    // ------------------------------------------------------------------
    // Settings & desktop
    // ------------------------------------------------------------------

    pub fn settings(&self) -> Value {
        load_json(&self.paths.settings_file(), default_settings())
    }

    pub fn save_settings(&self, settings: &Value) -> std::io::Result<()> {
        save_json(&self.paths.settings_file(), settings)
    }

    pub fn desktop_items(&self) -> Value {
        load_json(&self.paths.desktop_items_file(), json!([]))
    }

    pub fn save_desktop_items(&self, items: &Value) -> std::io::Result<()> {
        save_json(&self.paths.desktop_items_file(), items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::encode_data_url;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path(), dir.path().join("desktop"));
        let store = Store::new(paths);
        store.init().unwrap();
        (dir, store)
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn init_seeds_data_files() {
        let (dir, store) = store();
        assert!(dir.path().join("input").is_dir());
        assert!(dir.path().join("creative_images").is_dir());
        assert_eq!(store.settings(), json!({ "theme": "dark" }));
        assert!(store.ideas().is_empty());
        assert_eq!(store.desktop_items(), json!([]));
    }

    #[test]
    fn ideas_get_sequential_ids_and_timestamps() {
        let (_dir, store) = store();
        let a = store.create_idea(record(json!({ "title": "a" }))).unwrap();
        let b = store.create_idea(record(json!({ "title": "b" }))).unwrap();
        assert_eq!(record_id(&a), Some(1));
        assert_eq!(record_id(&b), Some(2));
        assert!(a.contains_key("createdAt"));
        assert_eq!(store.idea(2).unwrap()["title"], json!("b"));
        assert!(store.idea(3).is_none());
    }

    #[test]
    fn create_idea_externalizes_inline_image() {
        let (dir, store) = store();
        let idea = store
            .create_idea(record(json!({
                "title": "img",
                "imageUrl": encode_data_url("image/webp", b"webp-bytes"),
            })))
            .unwrap();
        let url = idea["imageUrl"].as_str().unwrap();
        let name = url.strip_prefix("/files/creative/").unwrap();
        assert!(name.ends_with(".webp"));
        assert_eq!(
            std::fs::read(dir.path().join("creative_images").join(name)).unwrap(),
            b"webp-bytes"
        );
    }

    #[test]
    fn import_skips_existing_and_batch_duplicates() {
        let (_dir, store) = store();
        store
            .create_idea(record(json!({ "title": "Cat", "prompt": "a cat" })))
            .unwrap();

        let outcome = store
            .import_ideas(vec![
                record(json!({ "title": " cat ", "prompt": "A CAT" })),
                record(json!({ "title": "Dog", "prompt": "a dog" })),
                record(json!({ "title": "dog", "prompt": "a dog " })),
            ])
            .unwrap();

        assert_eq!(outcome.imported.len(), 1);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(record_id(&outcome.imported[0]), Some(2));
        assert_eq!(outcome.message(), "Imported 1 new ideas, skipped 2 duplicates");
        assert_eq!(store.ideas().len(), 2);
    }

    #[test]
    fn reorder_puts_listed_ids_first() {
        let (_dir, store) = store();
        for title in ["a", "b", "c", "d"] {
            store.create_idea(record(json!({ "title": title }))).unwrap();
        }
        store.reorder_ideas(&[3, 1, 99]).unwrap();

        let ideas = store.ideas();
        let ids: Vec<_> = ideas.iter().filter_map(record_id).collect();
        assert_eq!(ids, [3, 1, 2, 4]);
        assert_eq!(ideas[0]["order"], json!(0));
        assert_eq!(ideas[1]["order"], json!(1));
        assert!(!ideas[2].contains_key("order"));
    }

    #[test]
    fn update_merges_and_keeps_identity() {
        let (_dir, store) = store();
        let created = store
            .create_idea(record(json!({ "title": "a", "prompt": "p" })))
            .unwrap();
        let updated = store
            .update_idea(1, record(json!({ "title": "b", "id": 42, "createdAt": "x" })))
            .unwrap()
            .unwrap();
        assert_eq!(updated["title"], json!("b"));
        assert_eq!(updated["prompt"], json!("p"));
        assert_eq!(record_id(&updated), Some(1));
        assert_eq!(updated["createdAt"], created["createdAt"]);
        assert!(store.update_idea(7, Record::new()).unwrap().is_none());
    }

    #[test]
    fn delete_reports_missing() {
        let (_dir, store) = store();
        store.create_idea(record(json!({ "title": "a" }))).unwrap();
        assert!(store.delete_idea(1).unwrap());
        assert!(!store.delete_idea(1).unwrap());
    }

    #[test]
    fn history_is_newest_first_and_capped() {
        let (_dir, store) = store();
        for i in 0..(HISTORY_LIMIT + 5) {
            store.add_history(record(json!({ "n": i }))).unwrap();
        }
        let history = store.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0]["n"], json!(HISTORY_LIMIT + 4));
        assert!(history[0].contains_key("timestamp"));

        let kept = store.add_history(record(json!({ "timestamp": 5 }))).unwrap();
        assert_eq!(kept["timestamp"], json!(5));

        let id = record_id(&kept).unwrap();
        assert!(store.delete_history(id).unwrap());
        assert!(!store.delete_history(id).unwrap());
        store.clear_history().unwrap();
        assert!(store.history().is_empty());
    }

    #[test]
    fn readers_never_see_partial_writes() {
        let (_dir, store) = store();
        for i in 0..20 {
            store.create_idea(record(json!({ "title": i }))).unwrap();
        }
        let store = std::sync::Arc::new(store);

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    store.create_idea(record(json!({ "title": i }))).unwrap();
                }
            })
        };

        let mut last = 20;
        while !writer.is_finished() {
            let seen = store.ideas().len();
            assert!(seen >= last, "read {} ideas after seeing {}", seen, last);
            last = seen;
        }
        writer.join().unwrap();
        assert_eq!(store.ideas().len(), 220);
        assert!(!store.paths().creative_ideas_file().with_extension("json.tmp").exists());
    }

    #[test]
    fn migration_rewrites_inline_images() {
        let (_dir, store) = store();
        let ideas = json!([
            { "id": 1, "title": "inline", "imageUrl": encode_data_url("image/png", b"png") },
            { "id": 2, "title": "local", "imageUrl": "/files/creative/x.png" },
            { "id": 3, "title": "none" },
            { "id": 4, "title": "broken", "imageUrl": "data:image/png;base64,@@@" },
        ]);
        save_json(&store.paths().creative_ideas_file(), &ideas).unwrap();

        assert_eq!(store.migrate_idea_images().unwrap(), (1, 2, 1));
        let ideas = store.ideas();
        assert!(ideas[0]["imageUrl"].as_str().unwrap().starts_with("/files/creative/"));
        assert_eq!(ideas[1]["imageUrl"], json!("/files/creative/x.png"));
        assert!(ideas[3]["imageUrl"].as_str().unwrap().starts_with("data:"));
    }
}
