//! Pending field changes for one note.
//!
//! # Responsibility
//! - Accumulate container field writes and per-kind fragment field writes.
//! - Track the known fragment id per kind (`UNSET_FRAGMENT_ID` until created).
//!
//! # Invariants
//! - Every staged write also stages `local_modified = 1` and a fresh
//!   `modified_date` on the container.
//! - Pieces leave the buffer only through `take_*`; the caller either drops
//!   the returned `AppliedDiff` (cleared) or hands it back via `restore_*`.

use super::now_millis;
use crate::model::fragment::{FragmentId, FragmentKind, UNSET_FRAGMENT_ID};
use crate::store::fields::{
    Column, ContainerColumn, ContainerValues, FieldValues, FragmentColumn, FragmentValues,
};
use rusqlite::types::Value;

/// Values moved out of a diff buffer while a store write is attempted.
#[must_use = "dropping an applied diff clears it; restore it if the write failed"]
#[derive(Debug)]
pub struct AppliedDiff<C: Column> {
    values: FieldValues<C>,
}

impl<C: Column> AppliedDiff<C> {
    pub fn values(&self) -> &FieldValues<C> {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FragmentDiff {
    fragment_id: FragmentId,
    values: FragmentValues,
}

impl FragmentDiff {
    fn new() -> Self {
        Self {
            fragment_id: UNSET_FRAGMENT_ID,
            values: FragmentValues::new(),
        }
    }
}

/// Staged, not yet committed, changes of one note.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffBuffer {
    container: ContainerValues,
    text: FragmentDiff,
    call: FragmentDiff,
}

impl Default for DiffBuffer {
    fn default() -> Self {
        Self {
            container: ContainerValues::new(),
            text: FragmentDiff::new(),
            call: FragmentDiff::new(),
        }
    }
}

impl DiffBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages one container field.
    pub fn set_container_field(&mut self, column: ContainerColumn, value: impl Into<Value>) {
        self.container.put(column, value);
        self.touch();
    }

    /// Stages one field of the fragment of `kind`.
    pub fn set_fragment_field(
        &mut self,
        kind: FragmentKind,
        column: FragmentColumn,
        value: impl Into<Value>,
    ) {
        self.fragment_mut(kind).values.put(column, value);
        self.touch();
    }

    pub fn has_pending_changes(&self) -> bool {
        self.has_pending_container()
            || self.has_pending_fragment(FragmentKind::Text)
            || self.has_pending_fragment(FragmentKind::Call)
    }

    pub fn has_pending_container(&self) -> bool {
        !self.container.is_empty()
    }

    pub fn has_pending_fragment(&self, kind: FragmentKind) -> bool {
        !self.fragment(kind).values.is_empty()
    }

    pub fn container_values(&self) -> &ContainerValues {
        &self.container
    }

    pub fn fragment_values(&self, kind: FragmentKind) -> &FragmentValues {
        &self.fragment(kind).values
    }

    /// Known id of the fragment of `kind`, `UNSET_FRAGMENT_ID` before insert.
    pub fn fragment_id(&self, kind: FragmentKind) -> FragmentId {
        self.fragment(kind).fragment_id
    }

    pub fn set_fragment_id(&mut self, kind: FragmentKind, fragment_id: FragmentId) {
        self.fragment_mut(kind).fragment_id = fragment_id;
    }

    pub(crate) fn take_container(&mut self) -> AppliedDiff<ContainerColumn> {
        AppliedDiff {
            values: std::mem::take(&mut self.container),
        }
    }

    pub(crate) fn take_fragment(&mut self, kind: FragmentKind) -> AppliedDiff<FragmentColumn> {
        AppliedDiff {
            values: std::mem::take(&mut self.fragment_mut(kind).values),
        }
    }

    /// Puts applied values back; fields staged since the take win.
    pub(crate) fn restore_container(&mut self, applied: AppliedDiff<ContainerColumn>) {
        let newer = std::mem::replace(&mut self.container, applied.values);
        self.container.merge(newer);
    }

    /// Puts applied values back; fields staged since the take win.
    pub(crate) fn restore_fragment(
        &mut self,
        kind: FragmentKind,
        applied: AppliedDiff<FragmentColumn>,
    ) {
        let slot = &mut self.fragment_mut(kind).values;
        let newer = std::mem::replace(slot, applied.values);
        slot.merge(newer);
    }

    fn touch(&mut self) {
        self.container.put(ContainerColumn::LocalModified, 1_i64);
        self.container
            .put(ContainerColumn::ModifiedDate, now_millis());
    }

    fn fragment(&self, kind: FragmentKind) -> &FragmentDiff {
        match kind {
            FragmentKind::Text => &self.text,
            FragmentKind::Call => &self.call,
        }
    }

    fn fragment_mut(&mut self, kind: FragmentKind) -> &mut FragmentDiff {
        match kind {
            FragmentKind::Text => &mut self.text,
            FragmentKind::Call => &mut self.call,
        }
    }
}
