//! Backtracking DFS resolver (spec §4.3).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use semver::VersionReq;

use edge_core::{ComponentIdentifier, DependencyKind, RootComponentRequest};

use crate::error::ResolverError;
use crate::store::RecipeStore;

#[derive(Default)]
struct ResolutionState {
    chosen: BTreeMap<String, ComponentIdentifier>,
    in_progress: BTreeSet<String>,
}

pub struct Resolver<S> {
    store: Arc<S>,
}

impl<S: RecipeStore + 'static> Resolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolves `roots` to an ordered, dependency-first list of
    /// `ComponentIdentifier`s, or fails with `UNSATISFIABLE`/`CYCLE`.
    pub async fn resolve(&self, roots: &[RootComponentRequest]) -> Result<Vec<ComponentIdentifier>, ResolverError> {
        let mut state = ResolutionState::default();
        let mut order = Vec::new();
        for root in roots {
            let mut path = Vec::new();
            self.resolve_component(&root.name, &root.version_constraint, DependencyKind::Hard, &mut state, &mut order, &mut path)
                .await?;
        }
        Ok(order)
    }

    fn resolve_component<'a>(
        &'a self,
        name: &'a str,
        constraint: &'a VersionReq,
        kind: DependencyKind,
        state: &'a mut ResolutionState,
        order: &'a mut Vec<ComponentIdentifier>,
        path: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<Option<ComponentIdentifier>, ResolverError>> {
        Box::pin(async move {
            if let Some(existing) = state.chosen.get(name).cloned() {
                if constraint.matches(&existing.version) {
                    return Ok(Some(existing));
                }
                return if kind == DependencyKind::Hard {
                    Err(ResolverError::Unsatisfiable { name: name.to_string(), constraint: constraint.to_string() })
                } else {
                    Ok(None)
                };
            }

            if state.in_progress.contains(name) {
                if kind == DependencyKind::Hard {
                    path.push(name.to_string());
                    return Err(ResolverError::Cycle { path: path.clone() });
                }
                return Ok(None);
            }

            let mut candidates = self
                .store
                .versions_of(name)
                .await
                .map_err(|source| ResolverError::Store { name: name.to_string(), source })?;
            candidates.retain(|id| constraint.matches(&id.version));
            candidates.sort_by(|a, b| {
                b.version
                    .cmp(&a.version)
                    .then_with(|| self.store.is_installed(b).cmp(&self.store.is_installed(a)))
                    .then_with(|| self.store.published_at(b).cmp(&self.store.published_at(a)))
            });

            if candidates.is_empty() {
                return if kind == DependencyKind::Hard {
                    Err(ResolverError::Unsatisfiable { name: name.to_string(), constraint: constraint.to_string() })
                } else {
                    Ok(None)
                };
            }

            state.in_progress.insert(name.to_string());
            path.push(name.to_string());

            for candidate in candidates {
                let recipe = match self.store.recipe(&candidate).await {
                    Ok(recipe) => recipe,
                    Err(_) => continue,
                };

                let mut local_order = Vec::new();
                let mut failed = false;
                for dep in recipe.hard_dependencies() {
                    match self.resolve_component(&dep.name, &dep.range, DependencyKind::Hard, state, &mut local_order, path).await {
                        Ok(_) => {}
                        Err(_) => {
                            failed = true;
                            break;
                        }
                    }
                }
                if !failed {
                    for dep in recipe.soft_dependencies() {
                        let _ = self.resolve_component(&dep.name, &dep.range, DependencyKind::Soft, state, &mut local_order, path).await;
                    }
                }

                if !failed {
                    state.in_progress.remove(name);
                    path.pop();
                    state.chosen.insert(name.to_string(), candidate.clone());
                    order.extend(local_order);
                    order.push(candidate.clone());
                    return Ok(Some(candidate));
                }

                for id in &local_order {
                    state.chosen.remove(&id.name);
                }
            }

            state.in_progress.remove(name);
            path.pop();
            if kind == DependencyKind::Hard {
                Err(ResolverError::Unsatisfiable { name: name.to_string(), constraint: constraint.to_string() })
            } else {
                Ok(None)
            }
        })
    }
}
