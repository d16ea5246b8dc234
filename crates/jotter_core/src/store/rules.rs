//! Consistency rules applied inside every store transaction.
//!
//! # Responsibility
//! - Keep denormalized container state (`notes_count`, `snippet`) in step
//!   with row mutations.
//! - Cascade container deletes to fragments and child containers.
//! - Relocate the children of a container moved to the trash.
//!
//! # Invariants
//! - Rules run in the order returned by `default_rules`, once per queued
//!   event, in the same transaction as the mutation that queued it.
//! - A rule either succeeds or fails the whole store call.

use super::fields::{ContainerColumn, ContainerValues};
use super::unit::{RowEvent, UnitOfWork};
use super::StoreResult;
use crate::model::container::TRASH_FOLDER_ID;
use crate::model::fragment::FragmentKind;

/// One reaction to row events.
pub(crate) trait ConsistencyRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, unit: &mut UnitOfWork<'_>, event: &RowEvent) -> StoreResult<()>;
}

/// Rules every record store runs, in order.
pub(crate) fn default_rules() -> Vec<Box<dyn ConsistencyRule>> {
    vec![
        Box::new(FolderCountRule),
        Box::new(FragmentCascadeRule),
        Box::new(ChildCascadeRule),
        Box::new(TrashCascadeRule),
        Box::new(SnippetRule),
    ]
}

/// Keeps each container's `notes_count` equal to its number of children.
struct FolderCountRule;

impl ConsistencyRule for FolderCountRule {
    fn name(&self) -> &'static str {
        "folder_count"
    }

    fn apply(&self, unit: &mut UnitOfWork<'_>, event: &RowEvent) -> StoreResult<()> {
        match *event {
            RowEvent::ContainerInserted { parent_id, .. } => {
                unit.adjust_notes_count(parent_id, 1)
            }
            RowEvent::ContainerParentChanged {
                old_parent_id,
                new_parent_id,
                ..
            } => {
                unit.adjust_notes_count(new_parent_id, 1)?;
                unit.adjust_notes_count(old_parent_id, -1)
            }
            RowEvent::ContainerDeleted { parent_id, .. } => {
                unit.adjust_notes_count(parent_id, -1)
            }
            _ => Ok(()),
        }
    }
}

struct FragmentCascadeRule;

impl ConsistencyRule for FragmentCascadeRule {
    fn name(&self) -> &'static str {
        "fragment_cascade"
    }

    fn apply(&self, unit: &mut UnitOfWork<'_>, event: &RowEvent) -> StoreResult<()> {
        let RowEvent::ContainerDeleted { id, .. } = *event else {
            return Ok(());
        };
        for fragment_id in unit.fragment_ids(id)? {
            unit.delete_fragment(fragment_id)?;
        }
        Ok(())
    }
}

/// Deletes child containers; grandchildren follow through their own events.
struct ChildCascadeRule;

impl ConsistencyRule for ChildCascadeRule {
    fn name(&self) -> &'static str {
        "child_cascade"
    }

    fn apply(&self, unit: &mut UnitOfWork<'_>, event: &RowEvent) -> StoreResult<()> {
        let RowEvent::ContainerDeleted { id, .. } = *event else {
            return Ok(());
        };
        for child_id in unit.child_ids(id)? {
            unit.delete_container(child_id)?;
        }
        Ok(())
    }
}

/// Moves the children of a trashed container into the trash as well.
struct TrashCascadeRule;

impl ConsistencyRule for TrashCascadeRule {
    fn name(&self) -> &'static str {
        "trash_cascade"
    }

    fn apply(&self, unit: &mut UnitOfWork<'_>, event: &RowEvent) -> StoreResult<()> {
        let RowEvent::ContainerParentChanged {
            id, new_parent_id, ..
        } = *event
        else {
            return Ok(());
        };
        if new_parent_id != TRASH_FOLDER_ID {
            return Ok(());
        }

        let values = ContainerValues::new()
            .with(ContainerColumn::ParentId, TRASH_FOLDER_ID)
            .with(ContainerColumn::OriginParentId, id)
            .with(ContainerColumn::LocalModified, 1_i64);
        for child_id in unit.child_ids(id)? {
            unit.update_container(child_id, &values)?;
        }
        Ok(())
    }
}

/// Mirrors text fragment content into the owner's `snippet`.
struct SnippetRule;

impl ConsistencyRule for SnippetRule {
    fn name(&self) -> &'static str {
        "snippet"
    }

    fn apply(&self, unit: &mut UnitOfWork<'_>, event: &RowEvent) -> StoreResult<()> {
        match *event {
            RowEvent::FragmentInserted {
                id,
                container_id,
                kind: FragmentKind::Text,
            }
            | RowEvent::FragmentUpdated {
                id,
                container_id,
                kind: FragmentKind::Text,
            } => {
                // Row may already be gone when a later event in the queue deleted it.
                match unit.fragment_content(id)? {
                    Some(content) => unit.set_snippet(container_id, &content),
                    None => Ok(()),
                }
            }
            RowEvent::FragmentDeleted {
                container_id,
                kind: FragmentKind::Text,
                ..
            } => unit.set_snippet(container_id, ""),
            _ => Ok(()),
        }
    }
}
