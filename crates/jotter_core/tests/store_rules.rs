use jotter_core::store::fields::{ContainerColumn, ContainerValues, FragmentColumn, FragmentValues};
use jotter_core::store::filter::{ContainerFilter, ContainerOrder, FragmentFilter, FragmentOrder};
use jotter_core::{
    ChangeKey, ChangeObserver, ContainerId, ContainerKind, FragmentKind, RecordStore, StoreError,
    ROOT_FOLDER_ID, TRASH_FOLDER_ID,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorder {
    keys: Mutex<Vec<ChangeKey>>,
}

impl Recorder {
    fn take(&self) -> Vec<ChangeKey> {
        std::mem::take(&mut *self.keys.lock().unwrap())
    }
}

impl ChangeObserver for Recorder {
    fn on_change(&self, key: ChangeKey) {
        self.keys.lock().unwrap().push(key);
    }
}

fn insert(store: &RecordStore, parent_id: ContainerId, kind: ContainerKind) -> ContainerId {
    store
        .insert_container(
            &ContainerValues::new()
                .with(ContainerColumn::ParentId, parent_id)
                .with(ContainerColumn::Kind, kind.to_db()),
        )
        .unwrap()
}

fn insert_text(store: &RecordStore, container_id: ContainerId, content: &str) -> i64 {
    store
        .insert_fragment(
            container_id,
            FragmentKind::Text,
            &FragmentValues::new().with(FragmentColumn::Content, content.to_string()),
        )
        .unwrap()
}

fn assert_counts_match_children(store: &RecordStore) {
    let all = store
        .query_containers(&ContainerFilter::all(), ContainerOrder::IdAsc)
        .unwrap();
    for container in &all {
        let children = all
            .iter()
            .filter(|child| child.parent_id == container.id && child.id != container.id)
            .count() as i64;
        assert_eq!(
            container.notes_count, children,
            "notes_count mismatch for container {}",
            container.id
        );
    }
}

#[test]
fn folder_counts_follow_insert_move_and_delete() {
    let store = RecordStore::open_in_memory().unwrap();
    let work = insert(&store, ROOT_FOLDER_ID, ContainerKind::Folder);
    let home = insert(&store, ROOT_FOLDER_ID, ContainerKind::Folder);
    let first = insert(&store, work, ContainerKind::Note);
    let second = insert(&store, work, ContainerKind::Note);
    insert(&store, home, ContainerKind::Note);
    assert_counts_match_children(&store);
    assert_eq!(store.get_container(work).unwrap().unwrap().notes_count, 2);

    assert_eq!(store.move_containers(&[first, second], home).unwrap(), 2);
    assert_counts_match_children(&store);
    assert_eq!(store.get_container(work).unwrap().unwrap().notes_count, 0);
    assert_eq!(store.get_container(home).unwrap().unwrap().notes_count, 3);

    store
        .update_containers(
            &ContainerFilter::by_id(first),
            &ContainerValues::new().with(ContainerColumn::ParentId, work),
        )
        .unwrap();
    store
        .delete_containers(&ContainerFilter::by_id(second))
        .unwrap();
    assert_counts_match_children(&store);
    assert_eq!(store.get_container(home).unwrap().unwrap().notes_count, 1);
}

#[test]
fn deleting_folder_cascades_to_notes_and_fragments() {
    let store = RecordStore::open_in_memory().unwrap();
    let folder = insert(&store, ROOT_FOLDER_ID, ContainerKind::Folder);
    let nested = insert(&store, folder, ContainerKind::Folder);
    let n1 = insert(&store, folder, ContainerKind::Note);
    let n2 = insert(&store, nested, ContainerKind::Note);
    let f1 = insert_text(&store, n1, "one");
    let f2 = insert_text(&store, n2, "two");
    let root_count = store.get_container(ROOT_FOLDER_ID).unwrap().unwrap().notes_count;

    assert_eq!(store.delete_containers(&ContainerFilter::by_id(folder)).unwrap(), 1);

    for id in [folder, nested, n1, n2] {
        assert!(store.get_container(id).unwrap().is_none(), "container {id} survived");
    }
    assert!(store.get_fragment(f1).unwrap().is_none());
    assert!(store.get_fragment(f2).unwrap().is_none());
    assert_eq!(
        store.get_container(ROOT_FOLDER_ID).unwrap().unwrap().notes_count,
        root_count - 1
    );
    assert_counts_match_children(&store);
}

#[test]
fn trashing_folder_moves_every_descendant_to_trash() {
    let store = RecordStore::open_in_memory().unwrap();
    let folder = insert(&store, ROOT_FOLDER_ID, ContainerKind::Folder);
    let nested = insert(&store, folder, ContainerKind::Folder);
    let note = insert(&store, folder, ContainerKind::Note);
    let deep_note = insert(&store, nested, ContainerKind::Note);

    assert_eq!(store.move_containers(&[folder], TRASH_FOLDER_ID).unwrap(), 1);

    for id in [folder, nested, note, deep_note] {
        let container = store.get_container(id).unwrap().unwrap();
        assert_eq!(container.parent_id, TRASH_FOLDER_ID, "container {id} not in trash");
        assert!(container.local_modified);
    }
    assert_eq!(
        store.get_container(folder).unwrap().unwrap().origin_parent_id,
        ROOT_FOLDER_ID
    );
    assert_eq!(
        store.get_container(deep_note).unwrap().unwrap().origin_parent_id,
        nested
    );
    assert_counts_match_children(&store);
}

#[test]
fn text_fragment_content_is_mirrored_into_snippet() {
    let store = RecordStore::open_in_memory().unwrap();
    let note = insert(&store, ROOT_FOLDER_ID, ContainerKind::Note);
    let text = insert_text(&store, note, "first draft");
    assert_eq!(store.get_container(note).unwrap().unwrap().snippet, "first draft");

    store
        .update_fragments(
            &FragmentFilter::by_id(text),
            &FragmentValues::new().with(FragmentColumn::Content, "final".to_string()),
        )
        .unwrap();
    assert_eq!(store.get_container(note).unwrap().unwrap().snippet, "final");

    store
        .insert_fragment(
            note,
            FragmentKind::Call,
            &FragmentValues::new()
                .with(FragmentColumn::Content, "not a snippet".to_string())
                .with(FragmentColumn::PHONE_NUMBER, "555-0100".to_string()),
        )
        .unwrap();
    assert_eq!(store.get_container(note).unwrap().unwrap().snippet, "final");

    assert_eq!(store.delete_fragments(&FragmentFilter::by_id(text)).unwrap(), 1);
    assert_eq!(store.get_container(note).unwrap().unwrap().snippet, "");
    assert_eq!(
        store
            .query_fragments(&FragmentFilter::by_container(note), FragmentOrder::IdAsc)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn caller_writes_to_system_ids_are_invalid_arguments() {
    let store = RecordStore::open_in_memory().unwrap();
    let values = ContainerValues::new().with(ContainerColumn::BgColorId, 1_i64);

    assert!(matches!(
        store.update_containers(&ContainerFilter::by_id(TRASH_FOLDER_ID), &values),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.delete_containers(&ContainerFilter::by_ids([ROOT_FOLDER_ID])),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.move_containers(&[TRASH_FOLDER_ID], ROOT_FOLDER_ID),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.insert_fragment(ROOT_FOLDER_ID, FragmentKind::Text, &FragmentValues::new()),
        Err(StoreError::InvalidArgument(_))
    ));

    // Predicate deletes silently skip system rows.
    assert_eq!(store.delete_containers(&ContainerFilter::all()).unwrap(), 0);
    assert!(store.get_container(ROOT_FOLDER_ID).unwrap().is_some());
}

#[test]
fn reads_of_missing_rows_are_empty() {
    let store = RecordStore::open_in_memory().unwrap();
    assert!(store.get_container(4242).unwrap().is_none());
    assert!(store.get_fragment(4242).unwrap().is_none());
    assert!(store
        .query_containers(&ContainerFilter::by_parent(4242), ContainerOrder::IdAsc)
        .unwrap()
        .is_empty());
}

#[test]
fn observers_see_rule_side_effects_after_commit() {
    let store = RecordStore::open_in_memory().unwrap();
    let folder = insert(&store, ROOT_FOLDER_ID, ContainerKind::Folder);
    let note = insert(&store, folder, ContainerKind::Note);

    let recorder = Arc::new(Recorder::default());
    store.subscribe(recorder.clone());

    let text = insert_text(&store, note, "hello");
    assert_eq!(
        recorder.take(),
        vec![ChangeKey::Container(note), ChangeKey::Fragment(text)]
    );

    store.move_containers(&[note], ROOT_FOLDER_ID).unwrap();
    assert_eq!(
        recorder.take(),
        vec![
            ChangeKey::Container(ROOT_FOLDER_ID),
            ChangeKey::Container(folder),
            ChangeKey::Container(note)
        ]
    );

    store
        .update_containers(
            &ContainerFilter::by_parent(4242),
            &ContainerValues::new().with(ContainerColumn::BgColorId, 1_i64),
        )
        .unwrap();
    assert!(recorder.take().is_empty());

    let observer: Arc<dyn ChangeObserver> = recorder.clone();
    store.subscribe(observer.clone());
    assert!(store.unsubscribe(&observer));
    store.delete_containers(&ContainerFilter::by_id(note)).unwrap();
    assert!(recorder.take().is_empty());
}

#[test]
fn failed_write_leaves_no_partial_rule_effects() {
    let store = RecordStore::open_in_memory().unwrap();
    let outer = insert(&store, ROOT_FOLDER_ID, ContainerKind::Folder);
    let inner = insert(&store, outer, ContainerKind::Folder);
    let target = insert(&store, ROOT_FOLDER_ID, ContainerKind::Folder);

    let err = store.move_containers(&[target, outer], inner).unwrap_err();
    assert!(matches!(err, StoreError::CycleDetected { .. }));

    assert_eq!(
        store.get_container(target).unwrap().unwrap().parent_id,
        ROOT_FOLDER_ID
    );
    assert_eq!(store.get_container(inner).unwrap().unwrap().notes_count, 0);
    assert_counts_match_children(&store);
}
