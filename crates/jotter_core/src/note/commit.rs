//! Commit engine: applies a diff buffer to the record store.
//!
//! # Responsibility
//! - Write the container diff, then insert or update each fragment diff.
//! - Allocate container ids for notes that do not exist yet.
//!
//! # Invariants
//! - The container diff is cleared after its write attempt, even when the
//!   write matched no row or failed. Fragment writes are still attempted so
//!   staged content is never dropped.
//! - A fragment diff is cleared only after its own write succeeded.
//! - All fragment updates of one commit run as one atomic batch.

use super::diff::{AppliedDiff, DiffBuffer};
use super::now_millis;
use crate::model::container::{ContainerId, ContainerKind};
use crate::model::fragment::{FragmentKind, UNSET_FRAGMENT_ID};
use crate::store::fields::{ContainerColumn, ContainerValues, FragmentColumn};
use crate::store::filter::ContainerFilter;
use crate::store::{FragmentUpdate, RecordStore, StoreError};
use log::{debug, error, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

const FRAGMENT_KINDS: [FragmentKind; 2] = [FragmentKind::Text, FragmentKind::Call];

/// Errors from committing a diff buffer.
#[derive(Debug)]
pub enum CommitError {
    /// Container id is not a caller container id (`<= 0`).
    InvalidArgument(ContainerId),
    /// A new container id could not be allocated.
    AllocationFailed {
        folder_id: ContainerId,
        source: Option<StoreError>,
    },
    /// Inserting a new fragment failed; its diff is still pending.
    FragmentInsert {
        kind: FragmentKind,
        source: StoreError,
    },
    /// The fragment update batch failed or returned nothing; the queued
    /// fragment diffs are still pending.
    Batch { source: Option<StoreError> },
}

impl Display for CommitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(id) => write!(f, "cannot commit to container id {id}"),
            Self::AllocationFailed { folder_id, .. } => {
                write!(f, "failed to allocate note id in folder {folder_id}")
            }
            Self::FragmentInsert { kind, .. } => {
                write!(f, "failed to insert {} fragment", kind.as_db_str())
            }
            Self::Batch { .. } => write!(f, "fragment update batch failed"),
        }
    }
}

impl Error for CommitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AllocationFailed { source, .. } | Self::Batch { source } => {
                source.as_ref().map(|err| err as &(dyn Error + 'static))
            }
            Self::FragmentInsert { source, .. } => Some(source),
            Self::InvalidArgument(_) => None,
        }
    }
}

/// Inserts a minimal note container in `folder_id` and returns its id.
pub fn allocate_note_id(
    store: &RecordStore,
    folder_id: ContainerId,
) -> Result<ContainerId, CommitError> {
    let now = now_millis();
    let values = ContainerValues::new()
        .with(ContainerColumn::ParentId, folder_id)
        .with(ContainerColumn::CreatedDate, now)
        .with(ContainerColumn::ModifiedDate, now)
        .with(ContainerColumn::Kind, ContainerKind::Note.to_db())
        .with(ContainerColumn::LocalModified, 1_i64);

    match store.insert_container(&values) {
        Ok(id) if id > 0 => Ok(id),
        Ok(id) => {
            error!(
                "event=note_allocate module=note status=error folder_id={} error_code=reserved_id id={}",
                folder_id, id
            );
            Err(CommitError::AllocationFailed {
                folder_id,
                source: None,
            })
        }
        Err(err) => {
            error!(
                "event=note_allocate module=note status=error folder_id={} error={}",
                folder_id, err
            );
            Err(CommitError::AllocationFailed {
                folder_id,
                source: Some(err),
            })
        }
    }
}

/// Applies every pending piece of `diff` to container `container_id`.
///
/// Returns `container_id` on success, including when nothing was pending.
pub fn commit(
    store: &RecordStore,
    diff: &mut DiffBuffer,
    container_id: ContainerId,
) -> Result<ContainerId, CommitError> {
    if container_id <= 0 {
        return Err(CommitError::InvalidArgument(container_id));
    }
    if !diff.has_pending_changes() {
        return Ok(container_id);
    }

    if diff.has_pending_container() {
        let applied = diff.take_container();
        match store.update_containers(&ContainerFilter::by_id(container_id), applied.values()) {
            Ok(0) => warn!(
                "event=note_commit module=note status=skip container_id={} reason=container_missing",
                container_id
            ),
            Ok(_) => {}
            Err(err) => error!(
                "event=note_commit module=note status=error container_id={} stage=container error={}",
                container_id, err
            ),
        }
    }

    let mut queued: Vec<(FragmentKind, AppliedDiff<FragmentColumn>)> = Vec::new();
    for kind in FRAGMENT_KINDS {
        if !diff.has_pending_fragment(kind) {
            continue;
        }
        let applied = diff.take_fragment(kind);
        if diff.fragment_id(kind) != UNSET_FRAGMENT_ID {
            queued.push((kind, applied));
            continue;
        }

        let inserted = store
            .insert_fragment(container_id, kind, applied.values())
            .and_then(|fragment_id| {
                if fragment_id > 0 {
                    Ok(fragment_id)
                } else {
                    Err(StoreError::InvalidData(format!(
                        "fragment insert returned id {fragment_id}"
                    )))
                }
            });
        match inserted {
            Ok(fragment_id) => {
                diff.set_fragment_id(kind, fragment_id);
                debug!(
                    "event=note_commit module=note status=ok container_id={} stage=fragment_insert kind={} fragment_id={}",
                    container_id,
                    kind.as_db_str(),
                    fragment_id
                );
            }
            Err(err) => {
                error!(
                    "event=note_commit module=note status=error container_id={} stage=fragment_insert kind={} error={}",
                    container_id,
                    kind.as_db_str(),
                    err
                );
                diff.restore_fragment(kind, applied);
                restore_queued(diff, queued);
                return Err(CommitError::FragmentInsert { kind, source: err });
            }
        }
    }

    if queued.is_empty() {
        return Ok(container_id);
    }

    let updates: Vec<FragmentUpdate> = queued
        .iter()
        .map(|(kind, applied)| FragmentUpdate {
            fragment_id: diff.fragment_id(*kind),
            values: applied.values().clone(),
        })
        .collect();
    match store.apply_fragment_batch(&updates) {
        Ok(results) if !results.is_empty() => Ok(container_id),
        Ok(_) => {
            error!(
                "event=note_commit module=note status=error container_id={} stage=fragment_batch error_code=empty_result",
                container_id
            );
            restore_queued(diff, queued);
            Err(CommitError::Batch { source: None })
        }
        Err(err) => {
            error!(
                "event=note_commit module=note status=error container_id={} stage=fragment_batch error={}",
                container_id, err
            );
            restore_queued(diff, queued);
            Err(CommitError::Batch { source: Some(err) })
        }
    }
}

fn restore_queued(diff: &mut DiffBuffer, queued: Vec<(FragmentKind, AppliedDiff<FragmentColumn>)>) {
    for (kind, applied) in queued {
        diff.restore_fragment(kind, applied);
    }
}

#[cfg(test)]
mod tests {
    use super::{allocate_note_id, commit, CommitError};
    use crate::model::container::ROOT_FOLDER_ID;
    use crate::model::fragment::FragmentKind;
    use crate::note::diff::DiffBuffer;
    use crate::store::fields::FragmentColumn;
    use crate::store::RecordStore;

    #[test]
    fn rejects_reserved_container_ids() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut diff = DiffBuffer::new();
        diff.set_fragment_field(FragmentKind::Text, FragmentColumn::Content, "x".to_string());

        let err = commit(&store, &mut diff, ROOT_FOLDER_ID).unwrap_err();
        assert!(matches!(err, CommitError::InvalidArgument(0)));
        assert!(diff.has_pending_fragment(FragmentKind::Text));
    }

    #[test]
    fn first_commit_inserts_then_second_updates() {
        let store = RecordStore::open_in_memory().unwrap();
        let note_id = allocate_note_id(&store, ROOT_FOLDER_ID).unwrap();
        let mut diff = DiffBuffer::new();

        diff.set_fragment_field(FragmentKind::Text, FragmentColumn::Content, "one".to_string());
        assert_eq!(commit(&store, &mut diff, note_id).unwrap(), note_id);
        let fragment_id = diff.fragment_id(FragmentKind::Text);
        assert!(fragment_id > 0);
        assert!(!diff.has_pending_changes());

        diff.set_fragment_field(FragmentKind::Text, FragmentColumn::Content, "two".to_string());
        commit(&store, &mut diff, note_id).unwrap();
        assert_eq!(diff.fragment_id(FragmentKind::Text), fragment_id);
        assert_eq!(
            store.get_fragment(fragment_id).unwrap().unwrap().content,
            "two"
        );
    }
}
