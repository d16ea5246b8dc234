//! Row-level write primitives executed inside one store transaction.
//!
//! # Responsibility
//! - Perform single-row inserts/updates/deletes on containers and fragments.
//! - Queue a `RowEvent` for every structural mutation so consistency rules can
//!   react in the same transaction.
//! - Collect the change keys to publish once the transaction commits.
//!
//! # Invariants
//! - A `UnitOfWork` never outlives the transaction it borrows.
//! - Aggregate maintenance (`adjust_notes_count`, `set_snippet`,
//!   `clear_dirty`) does not queue events and does not bump `version`.

use super::fields::{ContainerColumn, ContainerValues, FragmentValues};
use super::rules::ConsistencyRule;
use super::{StoreError, StoreResult};
use crate::model::container::{ContainerId, ROOT_FOLDER_ID};
use crate::model::fragment::{FragmentId, FragmentKind};
use crate::notify::{ChangeKey, ChangeSet};
use log::trace;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{HashSet, VecDeque};

/// Structural mutation observed by consistency rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RowEvent {
    ContainerInserted {
        id: ContainerId,
        parent_id: ContainerId,
    },
    ContainerParentChanged {
        id: ContainerId,
        old_parent_id: ContainerId,
        new_parent_id: ContainerId,
    },
    ContainerDeleted {
        id: ContainerId,
        parent_id: ContainerId,
    },
    FragmentInserted {
        id: FragmentId,
        container_id: ContainerId,
        kind: FragmentKind,
    },
    FragmentUpdated {
        id: FragmentId,
        container_id: ContainerId,
        kind: FragmentKind,
    },
    FragmentDeleted {
        id: FragmentId,
        container_id: ContainerId,
        kind: FragmentKind,
    },
}

pub(crate) struct UnitOfWork<'conn> {
    conn: &'conn Connection,
    pending: VecDeque<RowEvent>,
    changes: ChangeSet,
}

impl<'conn> UnitOfWork<'conn> {
    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            pending: VecDeque::new(),
            changes: ChangeSet::new(),
        }
    }

    pub(crate) fn conn(&self) -> &'conn Connection {
        self.conn
    }

    /// Drains queued events through `rules`, in rule order, until no rule
    /// produces further events.
    pub(crate) fn run_rules(&mut self, rules: &[Box<dyn ConsistencyRule>]) -> StoreResult<()> {
        while let Some(event) = self.pending.pop_front() {
            for rule in rules {
                trace!(
                    "event=store_rule module=store status=start rule={} row_event={:?}",
                    rule.name(),
                    event
                );
                rule.apply(self, &event)?;
            }
        }
        Ok(())
    }

    pub(crate) fn into_changes(self) -> ChangeSet {
        self.changes
    }

    pub(crate) fn insert_container(&mut self, values: &ContainerValues) -> StoreResult<ContainerId> {
        let (columns, binds) = values.insert_parts();
        if columns.is_empty() {
            self.conn
                .execute("INSERT INTO containers DEFAULT VALUES;", [])?;
        } else {
            let placeholders = vec!["?"; columns.len()].join(", ");
            self.conn.execute(
                &format!(
                    "INSERT INTO containers ({}) VALUES ({placeholders});",
                    columns.join(", ")
                ),
                params_from_iter(binds),
            )?;
        }

        let id = self.conn.last_insert_rowid();
        let parent_id = values
            .get_integer(ContainerColumn::ParentId)
            .unwrap_or(ROOT_FOLDER_ID);
        self.pending
            .push_back(RowEvent::ContainerInserted { id, parent_id });
        self.changes.insert(ChangeKey::Container(id));
        Ok(id)
    }

    /// Updates one container and bumps its version. Returns `false` when the
    /// row does not exist.
    pub(crate) fn update_container(
        &mut self,
        id: ContainerId,
        values: &ContainerValues,
    ) -> StoreResult<bool> {
        let Some(old_parent_id) = self.parent_of(id)? else {
            return Ok(false);
        };

        let (mut assignments, mut binds) = values.assignments();
        assignments.push("version = version + 1".to_string());
        binds.push(Value::Integer(id));
        self.conn.execute(
            &format!(
                "UPDATE containers SET {} WHERE id = ?;",
                assignments.join(", ")
            ),
            params_from_iter(binds),
        )?;

        if let Some(new_parent_id) = values.get_integer(ContainerColumn::ParentId) {
            if new_parent_id != old_parent_id {
                self.pending.push_back(RowEvent::ContainerParentChanged {
                    id,
                    old_parent_id,
                    new_parent_id,
                });
            }
        }
        self.changes.insert(ChangeKey::Container(id));
        Ok(true)
    }

    pub(crate) fn delete_container(&mut self, id: ContainerId) -> StoreResult<bool> {
        let Some(parent_id) = self.parent_of(id)? else {
            return Ok(false);
        };
        self.conn
            .execute("DELETE FROM containers WHERE id = ?1;", [id])?;
        self.pending
            .push_back(RowEvent::ContainerDeleted { id, parent_id });
        self.changes.insert(ChangeKey::Container(id));
        Ok(true)
    }

    pub(crate) fn insert_fragment(
        &mut self,
        container_id: ContainerId,
        kind: FragmentKind,
        values: &FragmentValues,
    ) -> StoreResult<FragmentId> {
        let (mut columns, mut binds) = values.insert_parts();
        columns.push("kind");
        binds.push(Value::Text(kind.as_db_str().to_string()));
        columns.push("container_id");
        binds.push(Value::Integer(container_id));

        let placeholders = vec!["?"; columns.len()].join(", ");
        self.conn.execute(
            &format!(
                "INSERT INTO fragments ({}) VALUES ({placeholders});",
                columns.join(", ")
            ),
            params_from_iter(binds),
        )?;

        let id = self.conn.last_insert_rowid();
        self.pending.push_back(RowEvent::FragmentInserted {
            id,
            container_id,
            kind,
        });
        self.changes.insert(ChangeKey::Fragment(id));
        self.changes.insert(ChangeKey::Container(container_id));
        Ok(id)
    }

    /// Updates one fragment. Returns `false` when the row does not exist.
    pub(crate) fn update_fragment(
        &mut self,
        id: FragmentId,
        values: &FragmentValues,
    ) -> StoreResult<bool> {
        let Some((container_id, kind)) = self.fragment_owner(id)? else {
            return Ok(false);
        };

        let (assignments, mut binds) = values.assignments();
        binds.push(Value::Integer(id));
        self.conn.execute(
            &format!(
                "UPDATE fragments SET {} WHERE id = ?;",
                assignments.join(", ")
            ),
            params_from_iter(binds),
        )?;

        self.pending.push_back(RowEvent::FragmentUpdated {
            id,
            container_id,
            kind,
        });
        self.changes.insert(ChangeKey::Fragment(id));
        self.changes.insert(ChangeKey::Container(container_id));
        Ok(true)
    }

    pub(crate) fn delete_fragment(&mut self, id: FragmentId) -> StoreResult<bool> {
        let Some((container_id, kind)) = self.fragment_owner(id)? else {
            return Ok(false);
        };
        self.conn
            .execute("DELETE FROM fragments WHERE id = ?1;", [id])?;
        self.pending.push_back(RowEvent::FragmentDeleted {
            id,
            container_id,
            kind,
        });
        self.changes.insert(ChangeKey::Fragment(id));
        self.changes.insert(ChangeKey::Container(container_id));
        Ok(true)
    }

    /// Adds `+1` or `-1` to a container's child count, never going below 0.
    pub(crate) fn adjust_notes_count(&mut self, id: ContainerId, delta: i8) -> StoreResult<()> {
        let changed = if delta >= 0 {
            self.conn.execute(
                "UPDATE containers SET notes_count = notes_count + 1 WHERE id = ?1;",
                [id],
            )?
        } else {
            self.conn.execute(
                "UPDATE containers
                 SET notes_count = notes_count - 1
                 WHERE id = ?1
                   AND notes_count > 0;",
                [id],
            )?
        };
        if changed > 0 {
            self.changes.insert(ChangeKey::Container(id));
        }
        Ok(())
    }

    pub(crate) fn set_snippet(&mut self, id: ContainerId, snippet: &str) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE containers SET snippet = ?2 WHERE id = ?1;",
            params![id, snippet],
        )?;
        if changed > 0 {
            self.changes.insert(ChangeKey::Container(id));
        }
        Ok(())
    }

    /// Clears the dirty marker when `version` still matches.
    pub(crate) fn clear_dirty(&mut self, id: ContainerId, version: i64) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE containers
             SET local_modified = 0
             WHERE id = ?1
               AND version = ?2;",
            params![id, version],
        )?;
        if changed > 0 {
            self.changes.insert(ChangeKey::Container(id));
        }
        Ok(changed > 0)
    }

    pub(crate) fn parent_of(&self, id: ContainerId) -> StoreResult<Option<ContainerId>> {
        let parent_id = self
            .conn
            .query_row(
                "SELECT parent_id FROM containers WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(parent_id)
    }

    pub(crate) fn child_ids(&self, parent_id: ContainerId) -> StoreResult<Vec<ContainerId>> {
        collect_ids(
            self.conn,
            "SELECT id FROM containers WHERE parent_id = ?1 AND id <> ?1 ORDER BY id ASC;",
            parent_id,
        )
    }

    pub(crate) fn fragment_ids(&self, container_id: ContainerId) -> StoreResult<Vec<FragmentId>> {
        collect_ids(
            self.conn,
            "SELECT id FROM fragments WHERE container_id = ?1 ORDER BY id ASC;",
            container_id,
        )
    }

    pub(crate) fn fragment_content(&self, id: FragmentId) -> StoreResult<Option<String>> {
        let content = self
            .conn
            .query_row(
                "SELECT content FROM fragments WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    /// Returns whether `candidate` is `id` itself or one of its descendants.
    ///
    /// Walks parent pointers up from `candidate`; stops at system ids and on
    /// any pre-existing loop.
    pub(crate) fn is_self_or_descendant(
        &self,
        candidate: ContainerId,
        id: ContainerId,
    ) -> StoreResult<bool> {
        let mut visited = HashSet::new();
        let mut cursor = candidate;
        while cursor > 0 && visited.insert(cursor) {
            if cursor == id {
                return Ok(true);
            }
            match self.parent_of(cursor)? {
                Some(parent_id) => cursor = parent_id,
                None => break,
            }
        }
        Ok(false)
    }

    fn fragment_owner(&self, id: FragmentId) -> StoreResult<Option<(ContainerId, FragmentKind)>> {
        let row: Option<(ContainerId, String)> = self
            .conn
            .query_row(
                "SELECT container_id, kind FROM fragments WHERE id = ?1;",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((container_id, kind_text)) => {
                let kind = FragmentKind::from_db_str(&kind_text).ok_or_else(|| {
                    StoreError::InvalidData(format!(
                        "invalid fragment kind `{kind_text}` in fragments.kind"
                    ))
                })?;
                Ok(Some((container_id, kind)))
            }
        }
    }
}

fn collect_ids(conn: &Connection, sql: &str, key: i64) -> StoreResult<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([key])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}
