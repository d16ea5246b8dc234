//! Typed column sets for container and fragment writes.
//!
//! A `FieldValues` map is the unit callers hand to the store (and the unit a
//! diff buffer accumulates): one value per column, last write wins.

use rusqlite::types::Value;
use std::collections::BTreeMap;

/// Column of a store table that callers may write.
pub trait Column: Copy + Ord + std::fmt::Debug {
    fn column_name(self) -> &'static str;
}

/// Writable container columns.
///
/// `id`, `notes_count` and `version` are maintained by the store and have no
/// variant here, so callers cannot write them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContainerColumn {
    ParentId,
    AlertedDate,
    BgColorId,
    CreatedDate,
    HasAttachment,
    ModifiedDate,
    Snippet,
    Kind,
    WidgetId,
    WidgetType,
    SyncId,
    LocalModified,
    OriginParentId,
    GtaskId,
}

impl Column for ContainerColumn {
    fn column_name(self) -> &'static str {
        match self {
            Self::ParentId => "parent_id",
            Self::AlertedDate => "alerted_date",
            Self::BgColorId => "bg_color_id",
            Self::CreatedDate => "created_date",
            Self::HasAttachment => "has_attachment",
            Self::ModifiedDate => "modified_date",
            Self::Snippet => "snippet",
            Self::Kind => "type",
            Self::WidgetId => "widget_id",
            Self::WidgetType => "widget_type",
            Self::SyncId => "sync_id",
            Self::LocalModified => "local_modified",
            Self::OriginParentId => "origin_parent_id",
            Self::GtaskId => "gtask_id",
        }
    }
}

/// Writable fragment columns. `kind` and `container_id` are fixed at insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FragmentColumn {
    Content,
    CreatedDate,
    ModifiedDate,
    Data1,
    Data2,
    Data3,
    Data4,
    Data5,
}

impl FragmentColumn {
    /// Text fragment list mode slot.
    pub const TEXT_MODE: Self = Self::Data1;
    /// Call fragment call date slot.
    pub const CALL_DATE: Self = Self::Data1;
    /// Call fragment phone number slot.
    pub const PHONE_NUMBER: Self = Self::Data3;
}

impl Column for FragmentColumn {
    fn column_name(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::CreatedDate => "created_date",
            Self::ModifiedDate => "modified_date",
            Self::Data1 => "data1",
            Self::Data2 => "data2",
            Self::Data3 => "data3",
            Self::Data4 => "data4",
            Self::Data5 => "data5",
        }
    }
}

/// Column → value map for one row write.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValues<C: Column> {
    values: BTreeMap<C, Value>,
}

pub type ContainerValues = FieldValues<ContainerColumn>;
pub type FragmentValues = FieldValues<FragmentColumn>;

impl<C: Column> Default for FieldValues<C> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<C: Column> FieldValues<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one column, replacing any earlier value.
    pub fn put(&mut self, column: C, value: impl Into<Value>) -> &mut Self {
        self.values.insert(column, value.into());
        self
    }

    /// Builder form of `put`.
    pub fn with(mut self, column: C, value: impl Into<Value>) -> Self {
        self.put(column, value);
        self
    }

    pub fn get(&self, column: C) -> Option<&Value> {
        self.values.get(&column)
    }

    pub fn get_integer(&self, column: C) -> Option<i64> {
        match self.values.get(&column) {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_text(&self, column: C) -> Option<&str> {
        match self.values.get(&column) {
            Some(Value::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn contains(&self, column: C) -> bool {
        self.values.contains_key(&column)
    }

    pub fn remove(&mut self, column: C) -> Option<Value> {
        self.values.remove(&column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Copies every column of `other` over this map.
    pub fn merge(&mut self, other: Self) {
        self.values.extend(other.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (C, &Value)> {
        self.values.iter().map(|(column, value)| (*column, value))
    }

    /// Column names and bind values, in column order.
    pub(crate) fn insert_parts(&self) -> (Vec<&'static str>, Vec<Value>) {
        self.values
            .iter()
            .map(|(column, value)| (column.column_name(), value.clone()))
            .unzip()
    }

    /// Renders `col = ?` assignments and their bind values, in column order.
    pub(crate) fn assignments(&self) -> (Vec<String>, Vec<Value>) {
        let (columns, binds) = self.insert_parts();
        let assignments = columns
            .into_iter()
            .map(|column| format!("{column} = ?"))
            .collect();
        (assignments, binds)
    }
}
