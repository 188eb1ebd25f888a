//! `~/.smart-sticker/config.toml`.
//!
//! ```toml
//! [ollama]
//! base_url = "http://127.0.0.1:11434"
//! model = "mistral:7b-instruct"
//! timeout_secs = 30
//!
//! [giphy]
//! api_key = "..."
//! base_url = "https://api.giphy.com"
//! limit = 2
//! rating = "g"
//! timeout_secs = 10
//!
//! [rate_limit]
//! max_calls = 50
//! window_secs = 3600
//! ```
//!
//! Every key is optional. A file that is not valid TOML is still read line by
//! line so a single typo does not silently reset every setting.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use sticker_media_search::SearchConfig;
use toml_edit::DocumentMut;
use toml_edit::Item as TomlItem;
use toml_edit::Table as TomlTable;
use toml_edit::value;

use crate::atomic_write::write_atomic_text;
use crate::ollama::OllamaConfig;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settings {
    pub ollama: OllamaConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn new_default() -> anyhow::Result<Self> {
        let Some(home) = dirs::home_dir() else {
            anyhow::bail!("cannot determine home directory for config path");
        };
        Ok(Self::new(default_config_path(&home)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file over the built-in defaults. A missing file yields the
    /// defaults unchanged.
    pub fn load(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::default();
        let Some(content) = read_document_string(&self.path)? else {
            return Ok(settings);
        };

        let source = match content.parse::<DocumentMut>() {
            Ok(doc) => Source::Document(doc),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "config is not valid TOML ({err}); reading it line by line"
                );
                Source::Lines(parse_entries_fallback(&content))
            }
        };
        source.apply(&mut settings);
        Ok(settings)
    }

    pub fn set_giphy_api_key(&self, api_key: &str) -> anyhow::Result<()> {
        let content = read_document_string(&self.path)?.unwrap_or_default();

        let updated = match content.parse::<DocumentMut>() {
            Ok(mut doc) => {
                let giphy = ensure_table_for_write(&mut doc, "giphy");
                giphy["api_key"] = value(api_key);
                doc.to_string()
            }
            Err(_) => append_api_key_fallback(&content, api_key),
        };

        write_atomic_text(&self.path, &updated)
    }
}

fn default_config_path(home: &Path) -> PathBuf {
    home.join(".smart-sticker").join("config.toml")
}

enum Source {
    Document(DocumentMut),
    /// `(table, key)` to the raw value text.
    Lines(HashMap<(String, String), String>),
}

impl Source {
    fn string(&self, table: &str, key: &str) -> Option<String> {
        match self {
            Source::Document(doc) => doc
                .get(table)
                .and_then(TomlItem::as_table)
                .and_then(|t| t.get(key))
                .and_then(TomlItem::as_str)
                .map(str::to_string),
            Source::Lines(entries) => entries
                .get(&(table.to_string(), key.to_string()))
                .map(String::as_str)
                .and_then(unquote)
                .map(str::to_string),
        }
    }

    fn unsigned(&self, table: &str, key: &str) -> Option<u64> {
        let parsed = match self {
            Source::Document(doc) => doc
                .get(table)
                .and_then(TomlItem::as_table)
                .and_then(|t| t.get(key))
                .and_then(TomlItem::as_integer),
            Source::Lines(entries) => entries
                .get(&(table.to_string(), key.to_string()))
                .and_then(|raw| raw.parse::<i64>().ok()),
        };
        parsed.and_then(|n| u64::try_from(n).ok())
    }

    fn apply(&self, settings: &mut Settings) {
        let ollama = &mut settings.ollama;
        if let Some(base_url) = self.string("ollama", "base_url") {
            ollama.base_url = base_url;
        }
        if let Some(model) = self.string("ollama", "model") {
            ollama.model = model;
        }
        if let Some(secs) = self.unsigned("ollama", "timeout_secs") {
            ollama.generate_timeout = Duration::from_secs(secs);
        }

        let search = &mut settings.search;
        if let Some(api_key) = self.string("giphy", "api_key") {
            search.api_key = api_key;
        }
        if let Some(base_url) = self.string("giphy", "base_url") {
            search.base_url = base_url;
        }
        if let Some(limit) = self.unsigned("giphy", "limit") {
            search.limit = usize::try_from(limit).unwrap_or(usize::MAX);
        }
        if let Some(rating) = self.string("giphy", "rating") {
            search.rating = rating;
        }
        if let Some(secs) = self.unsigned("giphy", "timeout_secs") {
            search.request_timeout = Duration::from_secs(secs);
        }
        if let Some(max_calls) = self.unsigned("rate_limit", "max_calls") {
            search.max_calls_per_window = u32::try_from(max_calls).unwrap_or(u32::MAX);
        }
        if let Some(secs) = self.unsigned("rate_limit", "window_secs") {
            search.window = Duration::from_secs(secs);
        }
    }
}

fn unquote(raw: &str) -> Option<&str> {
    raw.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')))
}

fn parse_entries_fallback(contents: &str) -> HashMap<(String, String), String> {
    let mut table = String::new();
    let mut entries = HashMap::new();

    for line in contents.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            table = parse_table_header_name(trimmed)
                .unwrap_or_default()
                .to_string();
            continue;
        }

        let Some(line) = strip_toml_comment(trimmed) else {
            continue;
        };
        let Some((key, raw)) = line.split_once('=') else {
            continue;
        };
        entries.insert(
            (table.clone(), key.trim().to_string()),
            raw.trim().to_string(),
        );
    }

    entries
}

fn parse_table_header_name(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if !line.starts_with('[') {
        return None;
    }
    let end = line.find(']')?;
    if end <= 1 {
        return None;
    }
    let name = line[1..end].trim();
    if name.is_empty() {
        return None;
    }
    Some(name)
}

/// Drops a trailing `#` comment unless the `#` sits inside a quoted value.
fn strip_toml_comment(line: &str) -> Option<&str> {
    let mut in_quotes = None;
    let mut end = line.len();
    for (idx, ch) in line.char_indices() {
        match (ch, in_quotes) {
            ('"' | '\'', None) => in_quotes = Some(ch),
            (c, Some(open)) if c == open => in_quotes = None,
            ('#', None) => {
                end = idx;
                break;
            }
            _ => {}
        }
    }
    let line = line[..end].trim();
    if line.is_empty() { None } else { Some(line) }
}

fn ensure_table_for_write<'a>(doc: &'a mut DocumentMut, key: &str) -> &'a mut TomlTable {
    if doc.get(key).and_then(TomlItem::as_table).is_none() {
        let mut table = TomlTable::new();
        table.set_implicit(false);
        doc[key] = TomlItem::Table(table);
    }
    doc[key]
        .as_table_mut()
        .unwrap_or_else(|| unreachable!("`{key}` was just made a table"))
}

fn append_api_key_fallback(existing: &str, api_key: &str) -> String {
    let mut out = existing.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str("[giphy]\n");
    out.push_str(&format!("api_key = {}\n", toml_edit::Value::from(api_key)));
    out
}

fn read_document_string(path: &Path) -> anyhow::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(anyhow::Error::new(err).context("read config.toml")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store_with(contents: &str) -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).expect("write config");
        (dir, ConfigStore::new(path))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join("config.toml"));
        assert_eq!(store.load().expect("load"), Settings::default());
    }

    #[test]
    fn reads_every_table() {
        let (_dir, store) = store_with(
            r#"
[ollama]
base_url = "http://gpu-box:11434"
model = "llama3:8b"
timeout_secs = 12

[giphy]
api_key = "abc123"
limit = 4
rating = "pg"
timeout_secs = 3

[rate_limit]
max_calls = 10
window_secs = 60
"#,
        );

        let settings = store.load().expect("load");
        assert_eq!(
            settings.ollama,
            OllamaConfig {
                base_url: "http://gpu-box:11434".to_string(),
                model: "llama3:8b".to_string(),
                generate_timeout: Duration::from_secs(12),
            }
        );
        assert_eq!(
            settings.search,
            SearchConfig {
                api_key: "abc123".to_string(),
                limit: 4,
                rating: "pg".to_string(),
                request_timeout: Duration::from_secs(3),
                max_calls_per_window: 10,
                window: Duration::from_secs(60),
                ..SearchConfig::default()
            }
        );
    }

    #[test]
    fn reads_values_when_toml_is_invalid() {
        let (_dir, store) = store_with(
            r#"# broken table header makes this TOML invalid
[other
key = 1

[giphy]
api_key = "k#1" # keep me

[rate_limit]
max_calls = 5
"#,
        );

        let settings = store.load().expect("load");
        assert_eq!(settings.search.api_key, "k#1");
        assert_eq!(settings.search.max_calls_per_window, 5);
        assert_eq!(settings.ollama, OllamaConfig::default());
    }

    #[test]
    fn setting_api_key_preserves_comments() {
        let (_dir, store) = store_with(
            r#"# top comment

[giphy] # keep me
# inner comment
api_key = "old"

[ollama]
model = "llama3:8b"
"#,
        );

        store.set_giphy_api_key("new-key").expect("set key");

        let updated = std::fs::read_to_string(store.path()).expect("read updated");
        assert!(updated.contains("# top comment"));
        assert!(updated.contains("# inner comment"));
        assert!(updated.contains(r#"api_key = "new-key""#));
        let settings = store.load().expect("load");
        assert_eq!(settings.search.api_key, "new-key");
        assert_eq!(settings.ollama.model, "llama3:8b");
    }

    #[test]
    fn setting_api_key_creates_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join("nested").join("config.toml"));

        store.set_giphy_api_key("fresh").expect("set key");
        assert_eq!(store.load().expect("load").search.api_key, "fresh");
    }

    #[test]
    fn default_config_path_uses_smart_sticker_home_dir() {
        let home = Path::new("home");
        assert_eq!(
            default_config_path(home),
            home.join(".smart-sticker").join("config.toml")
        );
    }
}
