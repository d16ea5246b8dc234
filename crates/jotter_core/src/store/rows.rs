//! Row decoding for container and fragment reads.
//!
//! # Invariants
//! - Persisted discriminators that do not decode are reported as
//!   `StoreError::InvalidData`, never silently masked.

use super::{StoreError, StoreResult};
use crate::model::container::{Container, ContainerKind, WidgetBinding, WidgetType};
use crate::model::fragment::{Fragment, FragmentKind};
use rusqlite::Row;

pub(crate) const CONTAINER_SELECT_SQL: &str = "SELECT
    id,
    parent_id,
    alerted_date,
    bg_color_id,
    created_date,
    has_attachment,
    modified_date,
    notes_count,
    snippet,
    type,
    widget_id,
    widget_type,
    sync_id,
    local_modified,
    origin_parent_id,
    gtask_id,
    version
FROM containers";

pub(crate) const FRAGMENT_SELECT_SQL: &str = "SELECT
    id,
    kind,
    container_id,
    created_date,
    modified_date,
    content,
    data1,
    data2,
    data3,
    data4,
    data5
FROM fragments";

pub(crate) fn parse_container_row(row: &Row<'_>) -> StoreResult<Container> {
    let kind_value: i64 = row.get("type")?;
    let kind = ContainerKind::from_db(kind_value).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid container type `{kind_value}` in containers.type"
        ))
    })?;

    Ok(Container {
        id: row.get("id")?,
        parent_id: row.get("parent_id")?,
        kind,
        created_date: row.get("created_date")?,
        modified_date: row.get("modified_date")?,
        alerted_date: row.get("alerted_date")?,
        bg_color_id: row.get("bg_color_id")?,
        has_attachment: parse_flag(row, "has_attachment")?,
        snippet: row.get("snippet")?,
        notes_count: row.get("notes_count")?,
        widget: WidgetBinding {
            widget_id: row.get("widget_id")?,
            widget_type: WidgetType::from_db(row.get("widget_type")?),
        },
        sync_id: row.get("sync_id")?,
        local_modified: parse_flag(row, "local_modified")?,
        origin_parent_id: row.get("origin_parent_id")?,
        gtask_id: row.get("gtask_id")?,
        version: row.get("version")?,
    })
}

pub(crate) fn parse_fragment_row(row: &Row<'_>) -> StoreResult<Fragment> {
    let kind_text: String = row.get("kind")?;
    let kind = FragmentKind::from_db_str(&kind_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid fragment kind `{kind_text}` in fragments.kind"
        ))
    })?;

    Ok(Fragment {
        id: row.get("id")?,
        container_id: row.get("container_id")?,
        kind,
        content: row.get("content")?,
        created_date: row.get("created_date")?,
        modified_date: row.get("modified_date")?,
        data1: row.get("data1")?,
        data2: row.get("data2")?,
        data3: row.get("data3")?,
        data4: row.get("data4")?,
        data5: row.get("data5")?,
    })
}

fn parse_flag(row: &Row<'_>, column: &'static str) -> StoreResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid flag value `{other}` in containers.{column}"
        ))),
    }
}
