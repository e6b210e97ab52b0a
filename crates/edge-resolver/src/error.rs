use edge_core::{Classify, DetailedStatus, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("no version of {name:?} satisfies {constraint}")]
    Unsatisfiable { name: String, constraint: String },
    #[error("dependency cycle through HARD edges: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("recipe store error for {name:?}: {source}")]
    Store { name: String, #[source] source: anyhow::Error },
}

impl Classify for ResolverError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::UnsatisfiableDependency
    }

    fn detailed_status(&self) -> DetailedStatus {
        match self {
            ResolverError::Unsatisfiable { .. } | ResolverError::Store { .. } => DetailedStatus::UnsatisfiableDependency,
            ResolverError::Cycle { .. } => DetailedStatus::DependencyCycle,
        }
    }
}
