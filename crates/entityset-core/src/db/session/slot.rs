use crate::{
    db::{
        response::CommitSummary,
        store::{DataKey, RawRow, RowOp, RowOpKind, StoreWrite},
        tracker::ChangeTracker,
    },
    error::InternalError,
    traits::EntityKind,
};
use std::any::Any;

///
/// TrackerSlot
///
/// Type-erased view of one entity type's [`ChangeTracker`], so a session can
/// hold trackers for many entity types and commit them together.
///

pub(super) trait TrackerSlot {
    /// Encode pending changes as row ops without mutating anything.
    fn prepare(&self) -> Result<(StoreWrite, CommitSummary), InternalError>;

    fn accept(&mut self);

    fn clear(&mut self);

    fn has_changes(&self) -> bool;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: EntityKind> TrackerSlot for ChangeTracker<E> {
    fn prepare(&self) -> Result<(StoreWrite, CommitSummary), InternalError> {
        let changes = self.pending()?;
        let mut ops = Vec::with_capacity(changes.len());

        for (key, entity) in &changes.inserts {
            ops.push(row_op::<E>(key, RowOpKind::Insert(RawRow::try_encode(entity)?))?);
        }
        for (key, entity) in &changes.updates {
            ops.push(row_op::<E>(key, RowOpKind::Update(RawRow::try_encode(entity)?))?);
        }
        for key in &changes.deletes {
            ops.push(row_op::<E>(key, RowOpKind::Delete)?);
        }

        let summary = CommitSummary {
            inserted: changes.inserts.len() as u64,
            updated: changes.updates.len() as u64,
            deleted: changes.deletes.len() as u64,
        };

        Ok((StoreWrite { store: E::PATH, ops }, summary))
    }

    fn accept(&mut self) {
        Self::accept(self);
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn has_changes(&self) -> bool {
        Self::has_changes(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn row_op<E: EntityKind>(key: &E::Key, kind: RowOpKind) -> Result<RowOp, InternalError> {
    Ok(RowOp {
        key: DataKey::try_from_key::<E>(key)?,
        label: format!("{key:?}"),
        kind,
    })
}
