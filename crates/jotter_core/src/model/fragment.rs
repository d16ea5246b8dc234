//! Fragment domain model (typed sub-content attached to a container).
//!
//! # Responsibility
//! - Define the fragment row and its content-kind tag.
//! - Name the kind-specific meaning of the generic scalar slots.
//!
//! # Invariants
//! - Every fragment references exactly one container via `container_id`.
//! - A container normally holds at most one fragment per kind.

use crate::model::container::ContainerId;
use serde::{Deserialize, Serialize};

/// Store-assigned fragment identifier. `0` means "not created yet".
pub type FragmentId = i64;

/// Fragment id used before the fragment row exists.
pub const UNSET_FRAGMENT_ID: FragmentId = 0;

/// Content-kind tag for fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// Free text body of a note. Mirrored into the owner's snippet.
    Text,
    /// Call-log metadata (call date + phone number).
    Call,
}

impl FragmentKind {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Text => "text_note",
            Self::Call => "call_note",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "text_note" => Some(Self::Text),
            "call_note" => Some(Self::Call),
            _ => None,
        }
    }
}

/// Text fragment display mode, stored in `data1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    #[default]
    Normal,
    CheckList,
}

impl TextMode {
    pub fn to_db(self) -> i64 {
        match self {
            Self::Normal => 0,
            Self::CheckList => 1,
        }
    }

    /// Unknown persisted values fall back to `Normal`.
    pub fn from_db(value: i64) -> Self {
        if value == 1 {
            Self::CheckList
        } else {
            Self::Normal
        }
    }
}

/// Committed fragment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub container_id: ContainerId,
    pub kind: FragmentKind,
    pub content: String,
    pub created_date: i64,
    pub modified_date: i64,
    pub data1: Option<i64>,
    pub data2: Option<i64>,
    pub data3: String,
    pub data4: String,
    pub data5: String,
}

impl Fragment {
    /// Text mode for text fragments, `None` for other kinds.
    pub fn text_mode(&self) -> Option<TextMode> {
        match self.kind {
            FragmentKind::Text => Some(TextMode::from_db(self.data1.unwrap_or(0))),
            FragmentKind::Call => None,
        }
    }

    /// Call date in epoch ms for call fragments.
    pub fn call_date(&self) -> Option<i64> {
        match self.kind {
            FragmentKind::Call => self.data1,
            FragmentKind::Text => None,
        }
    }

    /// Phone number for call fragments.
    pub fn phone_number(&self) -> Option<&str> {
        match self.kind {
            FragmentKind::Call => Some(self.data3.as_str()),
            FragmentKind::Text => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(kind: FragmentKind) -> Fragment {
        Fragment {
            id: 3,
            container_id: 9,
            kind,
            content: String::new(),
            created_date: 0,
            modified_date: 0,
            data1: Some(1),
            data2: None,
            data3: "555-0100".to_string(),
            data4: String::new(),
            data5: String::new(),
        }
    }

    #[test]
    fn slot_accessors_depend_on_kind() {
        let text = fragment(FragmentKind::Text);
        assert_eq!(text.text_mode(), Some(TextMode::CheckList));
        assert_eq!(text.phone_number(), None);

        let call = fragment(FragmentKind::Call);
        assert_eq!(call.call_date(), Some(1));
        assert_eq!(call.phone_number(), Some("555-0100"));
        assert_eq!(call.text_mode(), None);
    }

    #[test]
    fn kind_db_tags_are_stable() {
        assert_eq!(FragmentKind::from_db_str("text_note"), Some(FragmentKind::Text));
        assert_eq!(FragmentKind::from_db_str("call_note"), Some(FragmentKind::Call));
        assert_eq!(FragmentKind::from_db_str("image"), None);
    }
}
