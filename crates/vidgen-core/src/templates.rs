//! Keyword-addressable prompt presets.
//!
//! Built once at startup from `templates.list` and passed to whoever needs
//! it. Lookups are case-insensitive and ignore surrounding whitespace.

use std::collections::BTreeMap;

use tracing::info;

use crate::config::schema::TemplateConfig;

/// In-memory template store.
#[derive(Clone, Debug, Default)]
pub struct TemplateStore {
    /// Keyed by lower-cased keyword.
    templates: BTreeMap<String, TemplateConfig>,
}

impl TemplateStore {
    /// Build a store, skipping entries with a blank keyword.
    pub fn new(list: &[TemplateConfig]) -> Self {
        let mut store = Self::default();
        for template in list {
            store.add(template.clone());
        }
        info!(count = store.len(), "loaded templates");
        store
    }

    fn normalize(keyword: &str) -> String {
        keyword.trim().to_lowercase()
    }

    /// Look up a template by keyword.
    pub fn get(&self, keyword: &str) -> Option<&TemplateConfig> {
        if keyword.trim().is_empty() {
            return None;
        }
        self.templates.get(&Self::normalize(keyword))
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    /// Insert or replace a template. Returns `false` for a blank keyword.
    pub fn add(&mut self, mut template: TemplateConfig) -> bool {
        let keyword = template.keyword.trim().to_string();
        if keyword.is_empty() {
            return false;
        }
        template.keyword = keyword;
        self.templates.insert(Self::normalize(&template.keyword), template);
        true
    }

    pub fn remove(&mut self, keyword: &str) -> bool {
        self.templates.remove(&Self::normalize(keyword)).is_some()
    }

    /// Original-case keywords, sorted.
    pub fn keywords(&self) -> Vec<&str> {
        self.templates.values().map(|t| t.keyword.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateConfig> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
