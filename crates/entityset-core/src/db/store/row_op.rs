use crate::{
    db::store::{DataKey, RawRow, StoreError, StoreRegistry},
    error::InternalError,
};

///
/// RowOpKind
///

#[derive(Clone, Debug)]
pub(crate) enum RowOpKind {
    Insert(RawRow),
    Update(RawRow),
    Delete,
}

///
/// RowOp
/// One prepared write against a store. `label` is the printable entity key.
///

#[derive(Clone, Debug)]
pub(crate) struct RowOp {
    pub(crate) key: DataKey,
    pub(crate) label: String,
    pub(crate) kind: RowOpKind,
}

///
/// StoreWrite
/// Prepared row ops for one store.
///

#[derive(Debug)]
pub(crate) struct StoreWrite {
    pub(crate) store: &'static str,
    pub(crate) ops: Vec<RowOp>,
}

impl StoreRegistry {
    /// Check every prepared write against current rows.
    ///
    /// Nothing is mutated; a failure here leaves all stores untouched.
    pub(crate) fn preflight(&self, writes: &[StoreWrite]) -> Result<(), InternalError> {
        for write in writes {
            let store = self.try_get_store(write.store)?;

            for op in &write.ops {
                let exists = store.contains_key(&op.key);

                match op.kind {
                    RowOpKind::Insert(_) if exists => {
                        return Err(StoreError::AlreadyExists {
                            store: write.store,
                            key: op.label.clone(),
                        }
                        .into());
                    }
                    RowOpKind::Update(_) | RowOpKind::Delete if !exists => {
                        return Err(StoreError::NotFound {
                            store: write.store,
                            key: op.label.clone(),
                        }
                        .into());
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    /// Apply preflighted writes.
    pub(crate) fn apply(&mut self, writes: Vec<StoreWrite>) -> Result<(), InternalError> {
        for write in writes {
            let store = self.try_get_store_mut(write.store)?;

            for op in write.ops {
                match op.kind {
                    RowOpKind::Insert(row) | RowOpKind::Update(row) => {
                        store.insert(op.key, row);
                    }
                    RowOpKind::Delete => {
                        store.remove(&op.key);
                    }
                }
            }
        }

        Ok(())
    }
}
