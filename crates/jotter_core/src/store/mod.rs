//! Record store for containers and fragments.
//!
//! # Responsibility
//! - Own the single SQLite connection of the notes core.
//! - Expose predicate-based create/read/update/delete for both record kinds.
//! - Run consistency rules inside the transaction of every write.
//! - Publish change keys to observers once a write has committed.
//!
//! # Invariants
//! - Every public write is one `IMMEDIATE` transaction: all rule side effects
//!   of a call are visible, or none are.
//! - Caller-level updates and deletes never touch containers with ids `<= 0`.
//! - Reads of missing rows return `None` or an empty vector, never an error.

use crate::db::migrations::latest_version;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::container::{Container, ContainerId};
use crate::model::fragment::{Fragment, FragmentId, FragmentKind};
use crate::notify::{ChangeBus, ChangeObserver};
use log::{debug, warn};
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

pub mod fields;
pub mod filter;
mod rows;
mod rules;
mod unit;

use self::fields::{ContainerColumn, ContainerValues, FragmentValues};
use self::filter::{ContainerFilter, ContainerOrder, FragmentFilter, FragmentOrder};
use self::rows::{
    parse_container_row, parse_fragment_row, CONTAINER_SELECT_SQL, FRAGMENT_SELECT_SQL,
};
use self::rules::{default_rules, ConsistencyRule};
use self::unit::UnitOfWork;

/// Result type used by record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from record store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Caller passed a reserved id, an empty write or another unusable input.
    InvalidArgument(String),
    /// Reparent would place a container under itself or its descendant.
    CycleDetected {
        container_id: ContainerId,
        parent_id: ContainerId,
    },
    /// One operation of an atomic fragment batch matched no row.
    BatchOperationFailed {
        index: usize,
        fragment_id: FragmentId,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::CycleDetected {
                container_id,
                parent_id,
            } => write!(
                f,
                "move would create cycle: container {container_id} under parent {parent_id}"
            ),
            Self::BatchOperationFailed { index, fragment_id } => write!(
                f,
                "fragment batch operation {index} matched no row (fragment {fragment_id})"
            ),
            Self::InvalidData(message) => write!(f, "invalid store data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "record store requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One update of an atomic fragment batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentUpdate {
    pub fragment_id: FragmentId,
    pub values: FragmentValues,
}

/// Explicit handle to the notes database.
///
/// Construct once at startup and share by reference or `Arc`; the store
/// serializes access to its connection internally.
pub struct RecordStore {
    conn: Mutex<Connection>,
    rules: Vec<Box<dyn ConsistencyRule>>,
    bus: ChangeBus,
}

impl RecordStore {
    /// Opens (or creates) a database file and applies pending migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(open_db_in_memory()?)
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            rules: default_rules(),
            bus: ChangeBus::new(),
        })
    }

    /// Registers a change observer.
    pub fn subscribe(&self, observer: Arc<dyn ChangeObserver>) {
        self.bus.subscribe(observer);
    }

    /// Removes a change observer. Returns `false` when it was not registered.
    pub fn unsubscribe(&self, observer: &Arc<dyn ChangeObserver>) -> bool {
        self.bus.unsubscribe(observer)
    }

    /// Inserts one container and returns its store-assigned id.
    ///
    /// Omitted columns take schema defaults (parent = root, kind = note).
    pub fn insert_container(&self, values: &ContainerValues) -> StoreResult<ContainerId> {
        self.write("insert_container", |unit| unit.insert_container(values))
    }

    pub fn get_container(&self, id: ContainerId) -> StoreResult<Option<Container>> {
        let mut containers =
            self.query_containers(&ContainerFilter::by_id(id), ContainerOrder::IdAsc)?;
        Ok(containers.pop())
    }

    pub fn query_containers(
        &self,
        filter: &ContainerFilter,
        order: ContainerOrder,
    ) -> StoreResult<Vec<Container>> {
        let (where_sql, binds) = filter.where_clause();
        let sql = format!(
            "{CONTAINER_SELECT_SQL} WHERE {where_sql} ORDER BY {};",
            order.order_by()
        );

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut containers = Vec::new();
        while let Some(row) = rows.next()? {
            containers.push(parse_container_row(row)?);
        }
        Ok(containers)
    }

    /// Updates every non-system container matching `filter`.
    ///
    /// Each updated row gets `version + 1`. Returns the number of rows updated.
    pub fn update_containers(
        &self,
        filter: &ContainerFilter,
        values: &ContainerValues,
    ) -> StoreResult<usize> {
        if values.is_empty() {
            return Err(StoreError::InvalidArgument(
                "container update has no values".to_string(),
            ));
        }
        ensure_caller_ids(filter.named_ids())?;
        let new_parent_id = values.get_integer(ContainerColumn::ParentId);

        self.write("update_containers", |unit| {
            let mut updated = 0;
            for id in caller_container_ids(unit.conn(), filter)? {
                if let Some(parent_id) = new_parent_id {
                    ensure_no_cycle(unit, id, parent_id)?;
                }
                if unit.update_container(id, values)? {
                    updated += 1;
                }
            }
            Ok(updated)
        })
    }

    /// Deletes every non-system container matching `filter`, cascading to
    /// fragments and child containers. Returns the number of matched rows.
    pub fn delete_containers(&self, filter: &ContainerFilter) -> StoreResult<usize> {
        ensure_caller_ids(filter.named_ids())?;

        self.write("delete_containers", |unit| {
            let mut deleted = 0;
            for id in caller_container_ids(unit.conn(), filter)? {
                if unit.delete_container(id)? {
                    deleted += 1;
                }
            }
            Ok(deleted)
        })
    }

    /// Reparents containers to `target_parent_id`, recording the previous
    /// parent in `origin_parent_id` and marking each moved row dirty.
    ///
    /// Containers already under the target are skipped. Returns the number
    /// of containers moved.
    pub fn move_containers(
        &self,
        ids: &[ContainerId],
        target_parent_id: ContainerId,
    ) -> StoreResult<usize> {
        ensure_caller_ids(ids)?;

        self.write("move_containers", |unit| {
            if unit.parent_of(target_parent_id)?.is_none() {
                return Err(StoreError::InvalidArgument(format!(
                    "target folder {target_parent_id} does not exist"
                )));
            }

            let mut moved = 0;
            for &id in ids {
                let Some(old_parent_id) = unit.parent_of(id)? else {
                    continue;
                };
                if old_parent_id == target_parent_id {
                    continue;
                }
                ensure_no_cycle(unit, id, target_parent_id)?;

                let values = ContainerValues::new()
                    .with(ContainerColumn::ParentId, target_parent_id)
                    .with(ContainerColumn::OriginParentId, old_parent_id)
                    .with(ContainerColumn::LocalModified, 1_i64);
                if unit.update_container(id, &values)? {
                    moved += 1;
                }
            }
            Ok(moved)
        })
    }

    /// Inserts one fragment owned by `container_id`.
    pub fn insert_fragment(
        &self,
        container_id: ContainerId,
        kind: FragmentKind,
        values: &FragmentValues,
    ) -> StoreResult<FragmentId> {
        if container_id <= 0 {
            return Err(StoreError::InvalidArgument(format!(
                "fragment owner must be a caller container, got {container_id}"
            )));
        }
        self.write("insert_fragment", |unit| {
            unit.insert_fragment(container_id, kind, values)
        })
    }

    pub fn get_fragment(&self, id: FragmentId) -> StoreResult<Option<Fragment>> {
        let mut fragments =
            self.query_fragments(&FragmentFilter::by_id(id), FragmentOrder::IdAsc)?;
        Ok(fragments.pop())
    }

    pub fn query_fragments(
        &self,
        filter: &FragmentFilter,
        order: FragmentOrder,
    ) -> StoreResult<Vec<Fragment>> {
        let (where_sql, binds) = filter.where_clause();
        let sql = format!(
            "{FRAGMENT_SELECT_SQL} WHERE {where_sql} ORDER BY {};",
            order.order_by()
        );

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut fragments = Vec::new();
        while let Some(row) = rows.next()? {
            fragments.push(parse_fragment_row(row)?);
        }
        Ok(fragments)
    }

    /// Updates every fragment matching `filter`. Returns the number updated.
    pub fn update_fragments(
        &self,
        filter: &FragmentFilter,
        values: &FragmentValues,
    ) -> StoreResult<usize> {
        if values.is_empty() {
            return Err(StoreError::InvalidArgument(
                "fragment update has no values".to_string(),
            ));
        }
        ensure_fragment_ids(filter.ids.as_deref().unwrap_or(&[]))?;

        self.write("update_fragments", |unit| {
            let mut updated = 0;
            for id in matching_fragment_ids(unit.conn(), filter)? {
                if unit.update_fragment(id, values)? {
                    updated += 1;
                }
            }
            Ok(updated)
        })
    }

    /// Applies fragment updates as one all-or-nothing batch.
    ///
    /// Returns the affected row count per operation. Any operation matching no
    /// row rolls the whole batch back with `BatchOperationFailed`.
    pub fn apply_fragment_batch(&self, updates: &[FragmentUpdate]) -> StoreResult<Vec<usize>> {
        for update in updates {
            if update.values.is_empty() {
                return Err(StoreError::InvalidArgument(format!(
                    "fragment {} update has no values",
                    update.fragment_id
                )));
            }
            ensure_fragment_ids(&[update.fragment_id])?;
        }

        self.write("apply_fragment_batch", |unit| {
            let mut results = Vec::with_capacity(updates.len());
            for (index, update) in updates.iter().enumerate() {
                if !unit.update_fragment(update.fragment_id, &update.values)? {
                    return Err(StoreError::BatchOperationFailed {
                        index,
                        fragment_id: update.fragment_id,
                    });
                }
                results.push(1);
            }
            Ok(results)
        })
    }

    /// Deletes every fragment matching `filter`. Returns the number deleted.
    pub fn delete_fragments(&self, filter: &FragmentFilter) -> StoreResult<usize> {
        ensure_fragment_ids(filter.ids.as_deref().unwrap_or(&[]))?;

        self.write("delete_fragments", |unit| {
            let mut deleted = 0;
            for id in matching_fragment_ids(unit.conn(), filter)? {
                if unit.delete_fragment(id)? {
                    deleted += 1;
                }
            }
            Ok(deleted)
        })
    }

    /// Lists non-system containers carrying the dirty marker.
    pub fn list_dirty_containers(&self) -> StoreResult<Vec<Container>> {
        let mut containers = self.query_containers(
            &ContainerFilter::all().with_local_modified(true),
            ContainerOrder::IdAsc,
        )?;
        containers.retain(|container| container.id > 0);
        Ok(containers)
    }

    /// Clears the dirty marker of `id` when its version still equals
    /// `version`. Returns `false` when the container changed in between.
    pub fn clear_dirty_if_version(&self, id: ContainerId, version: i64) -> StoreResult<bool> {
        ensure_caller_ids(&[id])?;
        self.write("clear_dirty", |unit| unit.clear_dirty(id, version))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `op` and the consistency rules in one immediate transaction, then
    /// publishes the collected changes after the connection is released.
    fn write<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut UnitOfWork<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        let outcome = {
            let conn = self.lock();
            run_in_transaction(&conn, &self.rules, f)
        };

        match outcome {
            Ok((value, changes)) => {
                debug!(
                    "event=store_write module=store status=ok op={} changes={} duration_ms={}",
                    op,
                    changes.len(),
                    started_at.elapsed().as_millis()
                );
                self.bus.publish(&changes);
                Ok(value)
            }
            Err(err) => {
                warn!(
                    "event=store_write module=store status=error op={} duration_ms={} error={}",
                    op,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

fn run_in_transaction<T>(
    conn: &Connection,
    rules: &[Box<dyn ConsistencyRule>],
    f: impl FnOnce(&mut UnitOfWork<'_>) -> StoreResult<T>,
) -> StoreResult<(T, crate::notify::ChangeSet)> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let mut unit = UnitOfWork::new(&tx);
    let value = f(&mut unit)?;
    unit.run_rules(rules)?;
    let changes = unit.into_changes();
    tx.commit()?;
    Ok((value, changes))
}

fn ensure_caller_ids(ids: &[ContainerId]) -> StoreResult<()> {
    match ids.iter().find(|id| **id <= 0) {
        Some(id) => Err(StoreError::InvalidArgument(format!(
            "container id {id} is reserved or invalid"
        ))),
        None => Ok(()),
    }
}

fn ensure_fragment_ids(ids: &[FragmentId]) -> StoreResult<()> {
    match ids.iter().find(|id| **id <= 0) {
        Some(id) => Err(StoreError::InvalidArgument(format!(
            "fragment id {id} is invalid"
        ))),
        None => Ok(()),
    }
}

fn ensure_no_cycle(
    unit: &UnitOfWork<'_>,
    container_id: ContainerId,
    parent_id: ContainerId,
) -> StoreResult<()> {
    if unit.is_self_or_descendant(parent_id, container_id)? {
        return Err(StoreError::CycleDetected {
            container_id,
            parent_id,
        });
    }
    Ok(())
}

fn caller_container_ids(
    conn: &Connection,
    filter: &ContainerFilter,
) -> StoreResult<Vec<ContainerId>> {
    let (where_sql, binds) = filter.where_clause();
    let sql = format!("SELECT id FROM containers WHERE ({where_sql}) AND id > 0 ORDER BY id ASC;");
    collect_ids(conn, &sql, binds)
}

fn matching_fragment_ids(
    conn: &Connection,
    filter: &FragmentFilter,
) -> StoreResult<Vec<FragmentId>> {
    let (where_sql, binds) = filter.where_clause();
    let sql = format!("SELECT id FROM fragments WHERE {where_sql} ORDER BY id ASC;");
    collect_ids(conn, &sql, binds)
}

fn collect_ids(
    conn: &Connection,
    sql: &str,
    binds: Vec<rusqlite::types::Value>,
) -> StoreResult<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
