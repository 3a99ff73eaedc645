pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
pub use std::{fmt::Debug, hash::Hash};

// ============================================================================
// FOUNDATIONAL KINDS
// ============================================================================

///
/// Path
/// Fully-qualified entity path.
///
/// The path doubles as the store name used by store-backed collaborators,
/// so it must stay stable across renames when persisted rows must survive.
///

pub trait Path {
    const PATH: &'static str;
}

// ============================================================================
// ENTITY IDENTITY
// ============================================================================

///
/// EntityKey
///
/// Associates an entity with the primitive type used as its primary key.
///
/// ## Semantics
/// - `Self::Key` is a plain value (u64, Ulid, String-like ids wrapped in Copy types)
/// - Collaborators key their identity maps and stores by it
/// - Ordering of `Self::Key` is the natural enumeration order of a set
///

pub trait EntityKey {
    type Key: Copy + Debug + Eq + Ord + Hash + Serialize + DeserializeOwned + 'static;
}

///
/// EntityKind
///
/// A persistable domain entity.
///
/// Identity and persistence state are owned by the collaborator; the entity
/// itself only knows how to report its primary key.
///

pub trait EntityKind:
    Path + EntityKey + Clone + Default + PartialEq + Debug + Serialize + DeserializeOwned + 'static
{
    fn key(&self) -> Self::Key;
}
