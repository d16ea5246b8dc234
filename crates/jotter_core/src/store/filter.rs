//! Row predicates and orderings for store reads and writes.
//!
//! Filters are conjunctions: every field that is set must match.

use crate::model::container::{ContainerId, ContainerKind};
use crate::model::fragment::{FragmentId, FragmentKind};
use rusqlite::types::Value;

/// Predicate over container rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    pub ids: Option<Vec<ContainerId>>,
    pub parent_id: Option<ContainerId>,
    /// Rows whose parent differs from this id.
    pub exclude_parent_id: Option<ContainerId>,
    pub kind: Option<ContainerKind>,
    pub local_modified: Option<bool>,
    /// Exact snippet match (folder names live in the snippet).
    pub snippet: Option<String>,
    /// Case-insensitive substring match on the snippet.
    pub snippet_contains: Option<String>,
}

impl ContainerFilter {
    /// Matches every container, system ones included.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: ContainerId) -> Self {
        Self {
            ids: Some(vec![id]),
            ..Self::default()
        }
    }

    pub fn by_ids(ids: impl IntoIterator<Item = ContainerId>) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn by_parent(parent_id: ContainerId) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: ContainerKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn excluding_parent(mut self, parent_id: ContainerId) -> Self {
        self.exclude_parent_id = Some(parent_id);
        self
    }

    pub fn with_local_modified(mut self, local_modified: bool) -> Self {
        self.local_modified = Some(local_modified);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_snippet_containing(mut self, needle: impl Into<String>) -> Self {
        self.snippet_contains = Some(needle.into());
        self
    }

    /// Explicitly named ids (empty when the filter is not id-based).
    pub fn named_ids(&self) -> &[ContainerId] {
        self.ids.as_deref().unwrap_or(&[])
    }

    pub(crate) fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        if let Some(ids) = self.ids.as_ref() {
            push_id_list(&mut clauses, &mut binds, "id", ids);
        }
        if let Some(parent_id) = self.parent_id {
            clauses.push("parent_id = ?".to_string());
            binds.push(Value::Integer(parent_id));
        }
        if let Some(parent_id) = self.exclude_parent_id {
            clauses.push("parent_id <> ?".to_string());
            binds.push(Value::Integer(parent_id));
        }
        if let Some(kind) = self.kind {
            clauses.push("type = ?".to_string());
            binds.push(Value::Integer(kind.to_db()));
        }
        if let Some(local_modified) = self.local_modified {
            clauses.push("local_modified = ?".to_string());
            binds.push(Value::Integer(i64::from(local_modified)));
        }
        if let Some(snippet) = self.snippet.as_ref() {
            clauses.push("snippet = ?".to_string());
            binds.push(Value::Text(snippet.clone()));
        }
        if let Some(needle) = self.snippet_contains.as_ref() {
            clauses.push("snippet LIKE ? ESCAPE '\\'".to_string());
            binds.push(Value::Text(format!("%{}%", escape_like(needle))));
        }

        (join_clauses(clauses), binds)
    }
}

/// Sort key for container reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerOrder {
    #[default]
    IdAsc,
    ModifiedDesc,
    /// Folders before notes, newest first within each kind.
    KindThenModifiedDesc,
    SnippetAsc,
}

impl ContainerOrder {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            Self::IdAsc => "id ASC",
            Self::ModifiedDesc => "modified_date DESC, id ASC",
            Self::KindThenModifiedDesc => "type DESC, modified_date DESC, id ASC",
            Self::SnippetAsc => "snippet COLLATE NOCASE ASC, id ASC",
        }
    }
}

/// Predicate over fragment rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentFilter {
    pub ids: Option<Vec<FragmentId>>,
    pub container_id: Option<ContainerId>,
    pub kind: Option<FragmentKind>,
    /// Call fragments with this phone number (`data3`).
    pub phone_number: Option<String>,
    /// Call fragments with this call date (`data1`).
    pub call_date: Option<i64>,
}

impl FragmentFilter {
    pub fn by_id(id: FragmentId) -> Self {
        Self {
            ids: Some(vec![id]),
            ..Self::default()
        }
    }

    pub fn by_container(container_id: ContainerId) -> Self {
        Self {
            container_id: Some(container_id),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: FragmentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Call fragments recorded for `phone_number` at `call_date`.
    pub fn call(phone_number: impl Into<String>, call_date: i64) -> Self {
        Self {
            kind: Some(FragmentKind::Call),
            phone_number: Some(phone_number.into()),
            call_date: Some(call_date),
            ..Self::default()
        }
    }

    pub(crate) fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        if let Some(ids) = self.ids.as_ref() {
            push_id_list(&mut clauses, &mut binds, "id", ids);
        }
        if let Some(container_id) = self.container_id {
            clauses.push("container_id = ?".to_string());
            binds.push(Value::Integer(container_id));
        }
        if let Some(kind) = self.kind {
            clauses.push("kind = ?".to_string());
            binds.push(Value::Text(kind.as_db_str().to_string()));
        }
        if let Some(phone_number) = self.phone_number.as_ref() {
            clauses.push("data3 = ?".to_string());
            binds.push(Value::Text(phone_number.clone()));
        }
        if let Some(call_date) = self.call_date {
            clauses.push("data1 = ?".to_string());
            binds.push(Value::Integer(call_date));
        }

        (join_clauses(clauses), binds)
    }
}

/// Sort key for fragment reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentOrder {
    #[default]
    IdAsc,
    ModifiedDesc,
}

impl FragmentOrder {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            Self::IdAsc => "id ASC",
            Self::ModifiedDesc => "modified_date DESC, id ASC",
        }
    }
}

fn push_id_list(clauses: &mut Vec<String>, binds: &mut Vec<Value>, column: &str, ids: &[i64]) {
    if ids.is_empty() {
        clauses.push("0 = 1".to_string());
        return;
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    clauses.push(format!("{column} IN ({placeholders})"));
    binds.extend(ids.iter().map(|id| Value::Integer(*id)));
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn join_clauses(clauses: Vec<String>) -> String {
    if clauses.is_empty() {
        "1 = 1".to_string()
    } else {
        clauses.join(" AND ")
    }
}

#[cfg(test)]
mod tests {
    use super::{ContainerFilter, FragmentFilter};
    use crate::model::container::ContainerKind;
    use crate::model::fragment::FragmentKind;
    use rusqlite::types::Value;

    #[test]
    fn container_filter_renders_conjunction() {
        let (sql, binds) = ContainerFilter::by_parent(4)
            .with_kind(ContainerKind::Folder)
            .where_clause();
        assert_eq!(sql, "parent_id = ? AND type = ?");
        assert_eq!(binds, vec![Value::Integer(4), Value::Integer(1)]);
    }

    #[test]
    fn empty_id_list_matches_nothing() {
        let (sql, binds) = ContainerFilter::by_ids(Vec::new()).where_clause();
        assert_eq!(sql, "0 = 1");
        assert!(binds.is_empty());
    }

    #[test]
    fn unrestricted_filter_matches_everything() {
        let (sql, _) = ContainerFilter::all().where_clause();
        assert_eq!(sql, "1 = 1");
    }

    #[test]
    fn snippet_substring_escapes_like_wildcards() {
        let (sql, binds) = ContainerFilter::all()
            .with_snippet_containing("50%_off")
            .where_clause();
        assert_eq!(sql, "snippet LIKE ? ESCAPE '\\'");
        assert_eq!(binds, vec![Value::Text("%50\\%\\_off%".to_string())]);
    }

    #[test]
    fn fragment_filter_binds_kind_tag() {
        let (sql, binds) = FragmentFilter::by_container(7)
            .with_kind(FragmentKind::Call)
            .where_clause();
        assert_eq!(sql, "container_id = ? AND kind = ?");
        assert_eq!(
            binds,
            vec![Value::Integer(7), Value::Text("call_note".to_string())]
        );
    }

    #[test]
    fn call_filter_matches_phone_and_date_slots() {
        let (sql, binds) = FragmentFilter::call("555-0100", 42).where_clause();
        assert_eq!(sql, "kind = ? AND data3 = ? AND data1 = ?");
        assert_eq!(
            binds,
            vec![
                Value::Text("call_note".to_string()),
                Value::Text("555-0100".to_string()),
                Value::Integer(42)
            ]
        );
    }
}
