//! `InMemoryRecipeStore`: the concrete `edge_resolver::RecipeStore` the
//! agent wires into its resolver. Recipe file I/O under `recipes/` is out
//! of scope (spec §1), so recipes arrive pre-parsed via `insert`/`mark_installed`
//! and this store just indexes them for resolution.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use edge_core::{ComponentIdentifier, Recipe};
use edge_resolver::RecipeStore;

struct Entry {
    recipe: Recipe,
    installed: bool,
    published_at: Option<u64>,
}

#[derive(Default)]
pub struct InMemoryRecipeStore {
    entries: RwLock<HashMap<ComponentIdentifier, Entry>>,
}

impl InMemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a known recipe. `published_at` should be a monotonic
    /// publish timestamp used for tie-break 2 (spec §4.3); `None` sorts as
    /// least recent.
    pub fn insert(&self, identifier: ComponentIdentifier, recipe: Recipe, published_at: Option<u64>) {
        self.entries.write().unwrap().insert(identifier, Entry { recipe, installed: false, published_at });
    }

    pub fn mark_installed(&self, identifier: &ComponentIdentifier) {
        if let Some(entry) = self.entries.write().unwrap().get_mut(identifier) {
            entry.installed = true;
        }
    }

    pub fn mark_uninstalled(&self, identifier: &ComponentIdentifier) {
        if let Some(entry) = self.entries.write().unwrap().get_mut(identifier) {
            entry.installed = false;
        }
    }
}

#[async_trait]
impl RecipeStore for InMemoryRecipeStore {
    async fn versions_of(&self, name: &str) -> anyhow::Result<Vec<ComponentIdentifier>> {
        Ok(self.entries.read().unwrap().keys().filter(|id| id.name == name).cloned().collect())
    }

    async fn recipe(&self, identifier: &ComponentIdentifier) -> anyhow::Result<Recipe> {
        self.entries
            .read()
            .unwrap()
            .get(identifier)
            .map(|entry| entry.recipe.clone())
            .ok_or_else(|| anyhow::anyhow!("no recipe known for {identifier}"))
    }

    fn is_installed(&self, identifier: &ComponentIdentifier) -> bool {
        self.entries.read().unwrap().get(identifier).map(|entry| entry.installed).unwrap_or(false)
    }

    fn published_at(&self, identifier: &ComponentIdentifier) -> Option<u64> {
        self.entries.read().unwrap().get(identifier).and_then(|entry| entry.published_at)
    }
}
