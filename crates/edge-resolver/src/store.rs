//! `RecipeStore` decouples the resolver from on-disk recipe I/O (out of
//! scope here, spec §1) so resolution logic is testable against an
//! in-memory fixture.

use async_trait::async_trait;
use edge_core::{ComponentIdentifier, Recipe};

#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// All known versions of `name`, in no particular order; the resolver
    /// sorts candidates itself.
    async fn versions_of(&self, name: &str) -> anyhow::Result<Vec<ComponentIdentifier>>;

    async fn recipe(&self, identifier: &ComponentIdentifier) -> anyhow::Result<Recipe>;

    /// Tie-break 1 (spec §4.3): prefer the version already installed locally.
    fn is_installed(&self, identifier: &ComponentIdentifier) -> bool;

    /// Tie-break 2 (spec §4.3): prefer the most recently published version.
    /// Larger is more recent; `None` sorts as least recent.
    fn published_at(&self, identifier: &ComponentIdentifier) -> Option<u64>;
}
