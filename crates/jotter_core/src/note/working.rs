//! Working projection of one note.
//!
//! # Responsibility
//! - Cache the committed state of one note (container + fragments).
//! - Stage edits into an owned diff buffer and commit them on request.
//! - Notify the attached settings listener about UI-relevant changes.
//!
//! # Invariants
//! - `note_id == 0` until the first successful allocation (New state).
//! - Setters are no-ops, without listener calls, when the value is unchanged.
//! - A note marked deleted is never worth committing.

use super::commit::{allocate_note_id, commit, CommitError};
use super::diff::DiffBuffer;
use super::now_millis;
use crate::model::container::{
    ContainerId, WidgetBinding, WidgetType, CALL_RECORD_FOLDER_ID,
};
use crate::model::fragment::{FragmentKind, TextMode};
use crate::store::fields::{ContainerColumn, FragmentColumn};
use crate::store::filter::{FragmentFilter, FragmentOrder};
use crate::store::{RecordStore, StoreError};
use log::info;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::time::Instant;

/// Callbacks for UI-relevant changes of a working note.
pub trait NoteSettingsListener {
    fn on_background_changed(&mut self);

    fn on_alert_changed(&mut self, date: i64, set: bool);

    /// The widget showing this note needs a refresh.
    fn on_widget_changed(&mut self);

    fn on_check_list_mode_changed(&mut self, old_mode: TextMode, new_mode: TextMode);
}

/// Errors from working note operations.
#[derive(Debug)]
pub enum WorkingNoteError {
    /// No container with this id exists (or the id is reserved).
    NoteNotFound(ContainerId),
    Store(StoreError),
    Commit(CommitError),
}

impl Display for WorkingNoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Commit(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkingNoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoteNotFound(_) => None,
            Self::Store(err) => Some(err),
            Self::Commit(err) => Some(err),
        }
    }
}

impl From<StoreError> for WorkingNoteError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<CommitError> for WorkingNoteError {
    fn from(value: CommitError) -> Self {
        Self::Commit(value)
    }
}

/// Outcome of `WorkingNote::commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(ContainerId),
    /// Deleted, empty new note, or no pending edits.
    NothingToSave,
}

/// Editable in-memory view of one note.
pub struct WorkingNote<'s> {
    store: &'s RecordStore,
    note_id: ContainerId,
    folder_id: ContainerId,
    content: String,
    mode: TextMode,
    alert_date: i64,
    modified_date: i64,
    bg_color_id: i64,
    widget: WidgetBinding,
    call_phone_number: String,
    call_date: i64,
    is_deleted: bool,
    diff: DiffBuffer,
    listener: Option<Box<dyn NoteSettingsListener>>,
}

impl<'s> WorkingNote<'s> {
    /// Starts a new, not yet persisted note in `folder_id`.
    pub fn create_empty(
        store: &'s RecordStore,
        folder_id: ContainerId,
        widget: WidgetBinding,
        default_bg_color_id: i64,
    ) -> Self {
        let mut note = Self {
            store,
            note_id: 0,
            folder_id,
            content: String::new(),
            mode: TextMode::Normal,
            alert_date: 0,
            modified_date: now_millis(),
            bg_color_id: 0,
            widget: WidgetBinding::unbound(),
            call_phone_number: String::new(),
            call_date: 0,
            is_deleted: false,
            diff: DiffBuffer::new(),
            listener: None,
        };
        note.set_bg_color_id(default_bg_color_id);
        note.set_widget_id(widget.widget_id);
        note.set_widget_type(widget.widget_type);
        note
    }

    /// Loads note `note_id` and its fragments from the store.
    pub fn load(store: &'s RecordStore, note_id: ContainerId) -> Result<Self, WorkingNoteError> {
        if note_id <= 0 {
            return Err(WorkingNoteError::NoteNotFound(note_id));
        }
        let container = store
            .get_container(note_id)?
            .ok_or(WorkingNoteError::NoteNotFound(note_id))?;

        let mut note = Self {
            store,
            note_id,
            folder_id: container.parent_id,
            content: String::new(),
            mode: TextMode::Normal,
            alert_date: container.alerted_date,
            modified_date: container.modified_date,
            bg_color_id: container.bg_color_id,
            widget: container.widget,
            call_phone_number: String::new(),
            call_date: 0,
            is_deleted: false,
            diff: DiffBuffer::new(),
            listener: None,
        };

        let fragments =
            store.query_fragments(&FragmentFilter::by_container(note_id), FragmentOrder::IdAsc)?;
        for fragment in fragments {
            match fragment.kind {
                FragmentKind::Text => {
                    note.mode = fragment.text_mode().unwrap_or_default();
                    note.content = fragment.content;
                    note.diff.set_fragment_id(FragmentKind::Text, fragment.id);
                }
                FragmentKind::Call => {
                    note.call_date = fragment.call_date().unwrap_or(0);
                    note.call_phone_number = fragment.data3;
                    note.diff.set_fragment_id(FragmentKind::Call, fragment.id);
                }
            }
        }
        Ok(note)
    }

    pub fn set_listener(&mut self, listener: Box<dyn NoteSettingsListener>) {
        self.listener = Some(listener);
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    pub fn is_worth_committing(&self) -> bool {
        if self.is_deleted {
            return false;
        }
        if self.exists_in_store() {
            self.diff.has_pending_changes()
        } else {
            !self.content.is_empty()
        }
    }

    /// Persists staged edits, allocating an id first for new notes.
    pub fn commit(&mut self) -> Result<SaveOutcome, WorkingNoteError> {
        if !self.is_worth_committing() {
            return Ok(SaveOutcome::NothingToSave);
        }

        let started_at = Instant::now();
        if !self.exists_in_store() {
            self.note_id = allocate_note_id(self.store, self.folder_id)?;
        }
        let note_id = commit(self.store, &mut self.diff, self.note_id)?;

        info!(
            "event=note_commit module=note status=ok note_id={} duration_ms={}",
            note_id,
            started_at.elapsed().as_millis()
        );
        if self.widget.is_bound() {
            if let Some(listener) = self.listener.as_mut() {
                listener.on_widget_changed();
            }
        }
        Ok(SaveOutcome::Saved(note_id))
    }

    pub fn set_bg_color_id(&mut self, bg_color_id: i64) {
        if bg_color_id == self.bg_color_id {
            return;
        }
        self.bg_color_id = bg_color_id;
        if let Some(listener) = self.listener.as_mut() {
            listener.on_background_changed();
        }
        self.diff
            .set_container_field(ContainerColumn::BgColorId, bg_color_id);
    }

    /// Sets or clears (`date == 0`) the alert. `set` is forwarded to the
    /// listener for alarm scheduling.
    pub fn set_alert_date(&mut self, date: i64, set: bool) {
        if date == self.alert_date {
            return;
        }
        self.alert_date = date;
        self.diff
            .set_container_field(ContainerColumn::AlertedDate, date);
        if let Some(listener) = self.listener.as_mut() {
            listener.on_alert_changed(date, set);
        }
    }

    pub fn set_check_list_mode(&mut self, mode: TextMode) {
        if mode == self.mode {
            return;
        }
        let old_mode = self.mode;
        self.mode = mode;
        if let Some(listener) = self.listener.as_mut() {
            listener.on_check_list_mode_changed(old_mode, mode);
        }
        self.diff
            .set_fragment_field(FragmentKind::Text, FragmentColumn::TEXT_MODE, mode.to_db());
    }

    pub fn set_working_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text == self.content {
            return;
        }
        self.content = text.clone();
        self.diff
            .set_fragment_field(FragmentKind::Text, FragmentColumn::Content, text);
    }

    pub fn set_widget_id(&mut self, widget_id: i64) {
        if widget_id == self.widget.widget_id {
            return;
        }
        self.widget.widget_id = widget_id;
        self.diff
            .set_container_field(ContainerColumn::WidgetId, widget_id);
    }

    pub fn set_widget_type(&mut self, widget_type: WidgetType) {
        if widget_type == self.widget.widget_type {
            return;
        }
        self.widget.widget_type = widget_type;
        self.diff
            .set_container_field(ContainerColumn::WidgetType, widget_type.to_db());
    }

    /// Turns this note into a call record note. There is no reverse operation.
    pub fn convert_to_call_note(&mut self, phone_number: impl Into<String>, call_date: i64) {
        let phone_number = phone_number.into();
        if self.is_call_note()
            && phone_number == self.call_phone_number
            && call_date == self.call_date
        {
            return;
        }

        self.call_phone_number = phone_number.clone();
        self.call_date = call_date;
        self.folder_id = CALL_RECORD_FOLDER_ID;
        self.diff
            .set_fragment_field(FragmentKind::Call, FragmentColumn::CALL_DATE, call_date);
        self.diff.set_fragment_field(
            FragmentKind::Call,
            FragmentColumn::PHONE_NUMBER,
            phone_number,
        );
        self.diff
            .set_container_field(ContainerColumn::ParentId, CALL_RECORD_FOLDER_ID);
    }

    /// Marks the note logically deleted (or undeleted). Bound widgets are
    /// told to refresh.
    pub fn mark_deleted(&mut self, deleted: bool) {
        if deleted == self.is_deleted {
            return;
        }
        self.is_deleted = deleted;
        if self.widget.is_bound() {
            if let Some(listener) = self.listener.as_mut() {
                listener.on_widget_changed();
            }
        }
    }

    pub fn note_id(&self) -> ContainerId {
        self.note_id
    }

    pub fn folder_id(&self) -> ContainerId {
        self.folder_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn check_list_mode(&self) -> TextMode {
        self.mode
    }

    pub fn alert_date(&self) -> i64 {
        self.alert_date
    }

    pub fn has_alert(&self) -> bool {
        self.alert_date > 0
    }

    pub fn modified_date(&self) -> i64 {
        self.modified_date
    }

    pub fn bg_color_id(&self) -> i64 {
        self.bg_color_id
    }

    pub fn widget(&self) -> WidgetBinding {
        self.widget
    }

    pub fn call_phone_number(&self) -> &str {
        &self.call_phone_number
    }

    pub fn call_date(&self) -> i64 {
        self.call_date
    }

    pub fn is_call_note(&self) -> bool {
        self.folder_id == CALL_RECORD_FOLDER_ID
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn exists_in_store(&self) -> bool {
        self.note_id > 0
    }

    pub fn diff(&self) -> &DiffBuffer {
        &self.diff
    }
}

impl Debug for WorkingNote<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingNote")
            .field("note_id", &self.note_id)
            .field("folder_id", &self.folder_id)
            .field("mode", &self.mode)
            .field("is_deleted", &self.is_deleted)
            .field("pending", &self.diff.has_pending_changes())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{SaveOutcome, WorkingNote};
    use crate::model::container::{WidgetBinding, ROOT_FOLDER_ID};
    use crate::store::RecordStore;

    #[test]
    fn empty_new_note_is_not_saved() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut note = WorkingNote::create_empty(&store, ROOT_FOLDER_ID, WidgetBinding::unbound(), 2);
        assert!(note.diff().has_pending_changes());
        assert!(!note.is_worth_committing());
        assert_eq!(note.commit().unwrap(), SaveOutcome::NothingToSave);
        assert!(!note.exists_in_store());
    }

    #[test]
    fn deleted_note_is_not_worth_committing() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut note = WorkingNote::create_empty(&store, ROOT_FOLDER_ID, WidgetBinding::unbound(), 0);
        note.set_working_text("draft");
        assert!(note.is_worth_committing());
        note.mark_deleted(true);
        assert!(!note.is_worth_committing());
    }
}
