use jotter_core::store::filter::ContainerFilter;
use jotter_core::{
    ChangeKey, ChangeObserver, NoteSettingsListener, RecordStore, SaveOutcome, TextMode,
    WidgetBinding, WidgetType, WorkingNote, WorkingNoteError, CALL_RECORD_FOLDER_ID,
    ROOT_FOLDER_ID,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Background,
    Alert(i64, bool),
    Widget,
    Mode(TextMode, TextMode),
}

#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl NoteSettingsListener for EventLog {
    fn on_background_changed(&mut self) {
        self.0.lock().unwrap().push(Event::Background);
    }

    fn on_alert_changed(&mut self, date: i64, set: bool) {
        self.0.lock().unwrap().push(Event::Alert(date, set));
    }

    fn on_widget_changed(&mut self) {
        self.0.lock().unwrap().push(Event::Widget);
    }

    fn on_check_list_mode_changed(&mut self, old_mode: TextMode, new_mode: TextMode) {
        self.0.lock().unwrap().push(Event::Mode(old_mode, new_mode));
    }
}

#[derive(Default)]
struct ChangeCounter {
    keys: Mutex<Vec<ChangeKey>>,
}

impl ChangeObserver for ChangeCounter {
    fn on_change(&self, key: ChangeKey) {
        self.keys.lock().unwrap().push(key);
    }
}

fn saved_id(outcome: SaveOutcome) -> i64 {
    match outcome {
        SaveOutcome::Saved(id) => id,
        SaveOutcome::NothingToSave => panic!("expected the note to be saved"),
    }
}

#[test]
fn new_note_commit_allocates_id_and_bumps_root_count() {
    let store = RecordStore::open_in_memory().unwrap();
    let root_before = store.get_container(ROOT_FOLDER_ID).unwrap().unwrap().notes_count;

    let mut note = WorkingNote::create_empty(&store, ROOT_FOLDER_ID, WidgetBinding::unbound(), 2);
    note.set_working_text("buy milk");
    assert!(note.is_worth_committing());

    let note_id = saved_id(note.commit().unwrap());
    assert!(note_id > 0);
    assert_eq!(note.note_id(), note_id);
    assert!(note.exists_in_store());
    assert!(!note.is_worth_committing());
    assert_eq!(
        store.get_container(ROOT_FOLDER_ID).unwrap().unwrap().notes_count,
        root_before + 1
    );
}

#[test]
fn committed_note_round_trips_through_load() {
    let store = RecordStore::open_in_memory().unwrap();
    let widget = WidgetBinding {
        widget_id: 17,
        widget_type: WidgetType::Large,
    };

    let mut note = WorkingNote::create_empty(&store, ROOT_FOLDER_ID, widget, 2);
    note.set_working_text("hello");
    note.set_alert_date(1_800_000_000_000, true);
    note.set_check_list_mode(TextMode::CheckList);
    let note_id = saved_id(note.commit().unwrap());

    let loaded = WorkingNote::load(&store, note_id).unwrap();
    assert_eq!(loaded.content(), "hello");
    assert_eq!(loaded.bg_color_id(), 2);
    assert_eq!(loaded.alert_date(), 1_800_000_000_000);
    assert!(loaded.has_alert());
    assert_eq!(loaded.widget(), widget);
    assert_eq!(loaded.check_list_mode(), TextMode::CheckList);
    assert_eq!(loaded.folder_id(), ROOT_FOLDER_ID);
    assert!(!loaded.diff().has_pending_changes());

    let container = store.get_container(note_id).unwrap().unwrap();
    assert_eq!(container.snippet, "hello");
    assert!(container.local_modified);
}

#[test]
fn unchanged_setter_values_stage_nothing() {
    let store = RecordStore::open_in_memory().unwrap();
    let mut note = WorkingNote::create_empty(&store, ROOT_FOLDER_ID, WidgetBinding::unbound(), 3);
    note.set_working_text("stable");
    let note_id = saved_id(note.commit().unwrap());

    let mut loaded = WorkingNote::load(&store, note_id).unwrap();
    let log = EventLog::default();
    loaded.set_listener(Box::new(log.clone()));

    loaded.set_bg_color_id(3);
    loaded.set_working_text("stable");
    loaded.set_check_list_mode(TextMode::Normal);
    loaded.set_alert_date(0, false);
    loaded.set_widget_type(WidgetType::Invalid);

    assert!(!loaded.diff().has_pending_changes());
    assert!(!loaded.is_worth_committing());
    assert!(log.take().is_empty());
}

#[test]
fn empty_commit_bumps_no_version_and_notifies_nobody() {
    let store = RecordStore::open_in_memory().unwrap();
    let mut note = WorkingNote::create_empty(&store, ROOT_FOLDER_ID, WidgetBinding::unbound(), 0);
    note.set_working_text("idle");
    let note_id = saved_id(note.commit().unwrap());
    let version = store.get_container(note_id).unwrap().unwrap().version;

    let counter = Arc::new(ChangeCounter::default());
    store.subscribe(counter.clone());

    assert_eq!(note.commit().unwrap(), SaveOutcome::NothingToSave);
    assert_eq!(store.get_container(note_id).unwrap().unwrap().version, version);
    assert!(counter.keys.lock().unwrap().is_empty());
}

#[test]
fn listener_hears_each_change_category() {
    let store = RecordStore::open_in_memory().unwrap();
    let widget = WidgetBinding {
        widget_id: 5,
        widget_type: WidgetType::Small,
    };
    let mut note = WorkingNote::create_empty(&store, ROOT_FOLDER_ID, widget, 0);
    let log = EventLog::default();
    note.set_listener(Box::new(log.clone()));

    note.set_bg_color_id(1);
    note.set_alert_date(99, true);
    note.set_check_list_mode(TextMode::CheckList);
    note.set_working_text("□ eggs");
    note.commit().unwrap();

    assert_eq!(
        log.take(),
        vec![
            Event::Background,
            Event::Alert(99, true),
            Event::Mode(TextMode::Normal, TextMode::CheckList),
            Event::Widget,
        ]
    );

    note.mark_deleted(true);
    assert_eq!(log.take(), vec![Event::Widget]);
    assert!(!note.is_worth_committing());
}

#[test]
fn call_note_conversion_moves_note_to_call_records() {
    let store = RecordStore::open_in_memory().unwrap();
    let mut note = WorkingNote::create_empty(&store, ROOT_FOLDER_ID, WidgetBinding::unbound(), 0);
    note.convert_to_call_note("555-0199", 1_650_000_000_000);
    note.set_working_text("missed call");
    assert!(note.is_call_note());
    let note_id = saved_id(note.commit().unwrap());

    let container = store.get_container(note_id).unwrap().unwrap();
    assert_eq!(container.parent_id, CALL_RECORD_FOLDER_ID);

    let loaded = WorkingNote::load(&store, note_id).unwrap();
    assert_eq!(loaded.call_phone_number(), "555-0199");
    assert_eq!(loaded.call_date(), 1_650_000_000_000);
    assert_eq!(loaded.content(), "missed call");
}

#[test]
fn load_reports_missing_notes() {
    let store = RecordStore::open_in_memory().unwrap();
    assert!(matches!(
        WorkingNote::load(&store, 12345),
        Err(WorkingNoteError::NoteNotFound(12345))
    ));
    assert!(matches!(
        WorkingNote::load(&store, ROOT_FOLDER_ID),
        Err(WorkingNoteError::NoteNotFound(0))
    ));
}

#[test]
fn edit_after_external_delete_still_saves_text() {
    let store = RecordStore::open_in_memory().unwrap();
    let mut note = WorkingNote::create_empty(&store, ROOT_FOLDER_ID, WidgetBinding::unbound(), 0);
    note.set_working_text("draft");
    let note_id = saved_id(note.commit().unwrap());

    store
        .delete_containers(&ContainerFilter::by_id(note_id))
        .unwrap();
    note.set_working_text("draft, edited");

    assert!(matches!(
        note.commit(),
        Err(WorkingNoteError::Commit(_))
    ));
    assert!(note.diff().has_pending_changes());
}
