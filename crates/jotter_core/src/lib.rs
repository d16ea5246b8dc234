//! Persistence and change-propagation core for Jotter notes.
//! This crate is the single source of truth for note storage invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod note;
pub mod notify;
pub mod search;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::container::{
    Container, ContainerId, ContainerKind, WidgetBinding, WidgetType, CALL_RECORD_FOLDER_ID,
    ROOT_FOLDER_ID, TEMP_FOLDER_ID, TRASH_FOLDER_ID,
};
pub use model::fragment::{Fragment, FragmentId, FragmentKind, TextMode};
pub use note::commit::CommitError;
pub use note::diff::DiffBuffer;
pub use note::working::{NoteSettingsListener, SaveOutcome, WorkingNote, WorkingNoteError};
pub use notify::{ChangeKey, ChangeObserver};
pub use search::snippet::{format_snippet, search_snippets, SnippetHit, SnippetQuery};
pub use service::call_record_service::CallRecordService;
pub use service::folder_service::{FolderService, FolderServiceError};
pub use store::{FragmentUpdate, RecordStore, StoreError, StoreResult};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
