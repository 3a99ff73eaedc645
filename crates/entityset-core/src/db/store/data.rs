use crate::{
    db::store::StoreError,
    error::InternalError,
    serialize::{SerializeError, deserialize, serialize},
    traits::EntityKind,
};
use derive_more::{Deref, DerefMut};
use std::collections::BTreeMap;

/// Max serialized bytes for a single row to keep value loads bounded.
pub const MAX_ROW_BYTES: u32 = 4 * 1024 * 1024;

///
/// DataKey
/// Encoded primary key of one stored row.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DataKey(Vec<u8>);

impl DataKey {
    pub fn try_from_key<E: EntityKind>(key: &E::Key) -> Result<Self, SerializeError> {
        serialize(key).map(Self)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

///
/// RawRow
/// Encoded entity value, bounded by [`MAX_ROW_BYTES`].
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawRow(Vec<u8>);

impl RawRow {
    pub fn try_new(bytes: Vec<u8>) -> Result<Self, StoreError> {
        if bytes.len() > MAX_ROW_BYTES as usize {
            return Err(StoreError::RowTooLarge { len: bytes.len() });
        }

        Ok(Self(bytes))
    }

    /// Encode an entity into a row.
    pub fn try_encode<E: EntityKind>(entity: &E) -> Result<Self, InternalError> {
        let bytes = serialize(entity)?;

        Ok(Self::try_new(bytes)?)
    }

    pub fn try_decode<E: EntityKind>(&self) -> Result<E, SerializeError> {
        deserialize::<E>(&self.0)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

///
/// DataStore
/// Ordered map of encoded rows for one entity path.
///

#[derive(Default, Deref, DerefMut)]
pub struct DataStore(BTreeMap<DataKey, RawRow>);

impl DataStore {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Encode and store an entity, replacing any row under its key.
    pub fn put<E: EntityKind>(&mut self, entity: &E) -> Result<(), InternalError> {
        let key = DataKey::try_from_key::<E>(&entity.key())?;
        let row = RawRow::try_encode(entity)?;
        self.0.insert(key, row);

        Ok(())
    }

    /// Decode every row, ordered by primary key.
    pub fn decode_all<E: EntityKind>(&self) -> Result<Vec<E>, InternalError> {
        let mut rows = self
            .0
            .values()
            .map(RawRow::try_decode::<E>)
            .collect::<Result<Vec<_>, _>>()?;
        rows.sort_by_key(E::key);

        Ok(rows)
    }

    /// Sum of bytes used by all stored keys and rows.
    #[must_use]
    pub fn memory_bytes(&self) -> u64 {
        self.0
            .iter()
            .map(|(key, row)| (key.as_bytes().len() + row.len()) as u64)
            .sum()
    }
}

///
/// TESTS
///
