//! `ComponentIdentifier` (spec §3): `(name, version)` with equality over both
//! fields and ordering by semver within a name.

use std::cmp::Ordering;
use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ComponentIdentifier {
    pub name: String,
    #[serde(with = "version_serde")]
    pub version: Version,
}

impl ComponentIdentifier {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for ComponentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Ordering is only meaningful within a shared `name`; components with
/// different names compare by name first so `ComponentIdentifier` can sit in
/// a `BTreeSet` without losing sort-by-version-within-name semantics.
impl Ord for ComponentIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name).then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for ComponentIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

mod version_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(version: &Version, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(version)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Version, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_name_then_version() {
        let a = ComponentIdentifier::new("App", Version::new(1, 0, 0));
        let b = ComponentIdentifier::new("App", Version::new(2, 0, 0));
        let c = ComponentIdentifier::new("GreenSignal", Version::new(1, 0, 0));
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn equality_requires_both_fields() {
        let a = ComponentIdentifier::new("App", Version::new(1, 0, 0));
        let b = ComponentIdentifier::new("App", Version::new(1, 0, 1));
        assert_ne!(a, b);
    }
}
