//! Container domain model (notes, folders and system folders).
//!
//! # Responsibility
//! - Define the parent-level record shared by notes and folders.
//! - Own the reserved system container identifiers.
//!
//! # Invariants
//! - Ids `<= 0` are reserved for system containers and never allocated.
//! - `notes_count` and `version` are maintained by the store, never by callers.
//! - `widget_id == INVALID_WIDGET_ID` or `widget_type == WidgetType::Invalid`
//!   means the container is not bound to a home-screen widget.

use serde::{Deserialize, Serialize};

/// Store-assigned container identifier.
pub type ContainerId = i64;

/// Default folder every new note lands in.
pub const ROOT_FOLDER_ID: ContainerId = 0;
/// Scratch folder used while a move is in progress.
pub const TEMP_FOLDER_ID: ContainerId = -1;
/// Folder holding notes created from call logs.
pub const CALL_RECORD_FOLDER_ID: ContainerId = -2;
/// Trash folder.
pub const TRASH_FOLDER_ID: ContainerId = -3;

/// All system containers seeded by the initial migration.
pub const SYSTEM_CONTAINER_IDS: [ContainerId; 4] = [
    ROOT_FOLDER_ID,
    TEMP_FOLDER_ID,
    CALL_RECORD_FOLDER_ID,
    TRASH_FOLDER_ID,
];

/// Widget id meaning "no widget bound".
pub const INVALID_WIDGET_ID: i64 = 0;

/// Returns whether `id` is one of the reserved system container ids.
pub fn is_system_container_id(id: ContainerId) -> bool {
    id <= 0
}

/// Container discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Note,
    Folder,
    /// Reserved folders (root, trash, call records, move scratch).
    System,
}

impl ContainerKind {
    pub fn to_db(self) -> i64 {
        match self {
            Self::Note => 0,
            Self::Folder => 1,
            Self::System => 2,
        }
    }

    pub fn from_db(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Note),
            1 => Some(Self::Folder),
            2 => Some(Self::System),
            _ => None,
        }
    }
}

/// Home-screen widget size a container is rendered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetType {
    Invalid,
    Small,
    Large,
}

impl WidgetType {
    pub fn to_db(self) -> i64 {
        match self {
            Self::Invalid => -1,
            Self::Small => 0,
            Self::Large => 1,
        }
    }

    /// Unknown persisted values decode as `Invalid`.
    pub fn from_db(value: i64) -> Self {
        match value {
            0 => Self::Small,
            1 => Self::Large,
            _ => Self::Invalid,
        }
    }
}

/// Association between a container and a home-screen widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WidgetBinding {
    pub widget_id: i64,
    pub widget_type: WidgetType,
}

impl WidgetBinding {
    /// Binding for containers with no widget.
    pub const fn unbound() -> Self {
        Self {
            widget_id: INVALID_WIDGET_ID,
            widget_type: WidgetType::Invalid,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.widget_id != INVALID_WIDGET_ID && self.widget_type != WidgetType::Invalid
    }
}

impl Default for WidgetBinding {
    fn default() -> Self {
        Self::unbound()
    }
}

/// Committed container row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub parent_id: ContainerId,
    pub kind: ContainerKind,
    /// Epoch milliseconds.
    pub created_date: i64,
    /// Epoch milliseconds.
    pub modified_date: i64,
    /// Epoch milliseconds, `0` when no alert is set.
    pub alerted_date: i64,
    pub bg_color_id: i64,
    pub has_attachment: bool,
    /// Preview text for notes, display name for folders.
    pub snippet: String,
    /// Number of containers whose parent is this one.
    pub notes_count: i64,
    pub widget: WidgetBinding,
    pub sync_id: i64,
    /// Local modification not yet seen by the synchronizer.
    pub local_modified: bool,
    /// Parent before the last move, used to restore from trash.
    pub origin_parent_id: ContainerId,
    /// Opaque id assigned by the external synchronizer.
    pub gtask_id: String,
    pub version: i64,
}

impl Container {
    pub fn is_system(&self) -> bool {
        self.kind == ContainerKind::System || is_system_container_id(self.id)
    }

    pub fn is_in_trash(&self) -> bool {
        self.parent_id == TRASH_FOLDER_ID
    }

    pub fn has_alert(&self) -> bool {
        self.alerted_date > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_db_discriminant() {
        for kind in [
            ContainerKind::Note,
            ContainerKind::Folder,
            ContainerKind::System,
        ] {
            assert_eq!(ContainerKind::from_db(kind.to_db()), Some(kind));
        }
        assert_eq!(ContainerKind::from_db(7), None);
    }

    #[test]
    fn widget_binding_requires_id_and_type() {
        assert!(!WidgetBinding::unbound().is_bound());
        assert!(!WidgetBinding {
            widget_id: 4,
            widget_type: WidgetType::Invalid,
        }
        .is_bound());
        assert!(WidgetBinding {
            widget_id: 4,
            widget_type: WidgetType::Large,
        }
        .is_bound());
        assert_eq!(WidgetType::from_db(42), WidgetType::Invalid);
    }

    #[test]
    fn widget_binding_serializes_with_snake_case_type() {
        let binding = WidgetBinding {
            widget_id: 12,
            widget_type: WidgetType::Large,
        };
        let json = serde_json::to_value(binding).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "widget_id": 12, "widget_type": "large" })
        );
        let decoded: WidgetBinding = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, binding);
    }

    #[test]
    fn system_ids_are_non_positive() {
        assert!(SYSTEM_CONTAINER_IDS
            .iter()
            .all(|id| is_system_container_id(*id)));
        assert!(!is_system_container_id(1));
    }
}
