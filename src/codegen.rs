//! Prompt-to-source collaborator behind `aik @{ "prompt" }`.
//!
//! A [`CodeGen`] pairs a [`CodeGenerator`] with a [`SuggestionStore`]: the
//! store is consulted first under the normalized prompt, and the generator is
//! only invoked on a miss. Both halves are injected so tests can swap in
//! counting fakes and an in-memory store.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Result;

pub trait CodeGenerator {
    fn generate(&mut self, prompt: &str) -> Result<String>;
}

/// Offline generator producing canned snippets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateGenerator;

impl CodeGenerator for TemplateGenerator {
    fn generate(&mut self, prompt: &str) -> Result<String> {
        let lowered = prompt.to_lowercase();
        if lowered.contains("add") && lowered.contains("function") {
            return Ok("func add(a, b) -> a + b".to_string());
        }
        Ok(format!("# no template for: {}", prompt.trim()))
    }
}

pub trait SuggestionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&mut self, key: &str, source: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: IndexMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SuggestionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, source: &str) -> Result<()> {
        self.entries.insert(key.to_string(), source.to_string());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SuggestionFile {
    #[serde(default)]
    suggestions: IndexMap<String, String>,
}

/// JSON-backed store; the whole file is rewritten on every `put`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    contents: SuggestionFile,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == ErrorKind::NotFound => SuggestionFile::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(
            "opened suggestion cache {} ({} entries)",
            path.display(),
            contents.suggestions.len()
        );
        Ok(Self { path, contents })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SuggestionStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.contents.suggestions.get(key).cloned()
    }

    fn put(&mut self, key: &str, source: &str) -> Result<()> {
        self.contents
            .suggestions
            .insert(key.to_string(), source.to_string());
        let text = serde_json::to_string_pretty(&self.contents)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Cache key for a prompt: trimmed, lowercased, internal whitespace collapsed.
pub fn normalize_prompt(prompt: &str) -> String {
    prompt
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct CodeGen {
    generator: Box<dyn CodeGenerator>,
    store: Box<dyn SuggestionStore>,
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new(TemplateGenerator, MemoryStore::new())
    }
}

impl CodeGen {
    pub fn new(
        generator: impl CodeGenerator + 'static,
        store: impl SuggestionStore + 'static,
    ) -> Self {
        Self {
            generator: Box::new(generator),
            store: Box::new(store),
        }
    }

    /// Returns the stored source for `prompt`, generating and storing it on a
    /// miss.
    pub fn resolve(&mut self, prompt: &str) -> Result<String> {
        let key = normalize_prompt(prompt);
        if let Some(source) = self.store.get(&key) {
            debug!("codegen cache hit for {key:?}");
            return Ok(source);
        }
        debug!("codegen cache miss for {key:?}");
        let source = self.generator.generate(prompt)?;
        self.store.put(&key, &source)?;
        Ok(source)
    }
}
