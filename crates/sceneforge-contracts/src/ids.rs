use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source of entity identifiers. Ids are never reused by one generator.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, prefix: &str) -> String;
}

/// Random v4 UUIDs, prefixed with the entity kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::new_v4().simple())
    }
}

/// Monotonic counter ids (`img-1`, `pt-2`, ...). Deterministic across runs.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, prefix: &str) -> String {
        let value = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{value}")
    }
}

macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn generate(ids: &dyn IdGenerator) -> Self {
                Self(ids.next_id(Self::PREFIX))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ImageId, "img");
string_id!(PointId, "pt");
string_id!(ResultId, "res");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_monotonic_and_prefixed() {
        let ids = SequentialIds::new();
        assert_eq!(ImageId::generate(&ids).as_str(), "img-1");
        assert_eq!(PointId::generate(&ids).as_str(), "pt-2");
        assert_eq!(ResultId::generate(&ids).to_string(), "res-3");
    }

    #[test]
    fn uuid_ids_do_not_repeat() {
        let ids = UuidIds;
        let first = PointId::generate(&ids);
        let second = PointId::generate(&ids);
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("pt-"));
    }
}
