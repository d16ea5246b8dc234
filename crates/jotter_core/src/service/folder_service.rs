//! Folder and trash use-case service.
//!
//! # Responsibility
//! - Validate folder names and system-folder rules above the record store.
//! - Provide folder create/rename/list and note move/trash/restore/delete.
//!
//! # Invariants
//! - Folder names are trimmed, non-blank and unique among folders outside
//!   the trash.
//! - System containers are never renamed, moved or deleted through here.
//! - Restored containers go back to their origin folder when it still
//!   exists outside the trash, otherwise to the root folder.

use crate::model::container::{
    Container, ContainerId, ContainerKind, WidgetBinding, CALL_RECORD_FOLDER_ID, ROOT_FOLDER_ID,
    TRASH_FOLDER_ID,
};
use crate::note::now_millis;
use crate::store::fields::{ContainerColumn, ContainerValues};
use crate::store::filter::{ContainerFilter, ContainerOrder};
use crate::store::{RecordStore, StoreError};
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from folder service operations.
#[derive(Debug)]
pub enum FolderServiceError {
    /// Folder name is blank after trim.
    InvalidFolderName,
    /// Another visible folder already uses this name.
    FolderNameTaken(String),
    /// Target folder does not exist or is not a folder.
    FolderNotFound(ContainerId),
    /// Operation targets a reserved system container.
    SystemFolder(ContainerId),
    /// Store-level failure.
    Store(StoreError),
}

impl Display for FolderServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFolderName => write!(f, "folder name must not be blank"),
            Self::FolderNameTaken(name) => write!(f, "folder name already exists: {name}"),
            Self::FolderNotFound(id) => write!(f, "folder not found: {id}"),
            Self::SystemFolder(id) => write!(f, "system folder cannot be modified: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FolderServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for FolderServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Folder and trash service facade.
pub struct FolderService<'s> {
    store: &'s RecordStore,
}

impl<'s> FolderService<'s> {
    pub fn new(store: &'s RecordStore) -> Self {
        Self { store }
    }

    /// Creates one folder under the root folder.
    pub fn create_folder(&self, name: impl Into<String>) -> Result<ContainerId, FolderServiceError> {
        let name = normalize_folder_name(name.into())?;
        self.ensure_name_available(&name, None)?;

        let now = now_millis();
        let id = self.store.insert_container(
            &ContainerValues::new()
                .with(ContainerColumn::ParentId, ROOT_FOLDER_ID)
                .with(ContainerColumn::Kind, ContainerKind::Folder.to_db())
                .with(ContainerColumn::Snippet, name)
                .with(ContainerColumn::CreatedDate, now)
                .with(ContainerColumn::ModifiedDate, now)
                .with(ContainerColumn::LocalModified, 1_i64),
        )?;
        info!("event=folder_create module=service status=ok folder_id={id}");
        Ok(id)
    }

    pub fn rename_folder(
        &self,
        folder_id: ContainerId,
        name: impl Into<String>,
    ) -> Result<(), FolderServiceError> {
        let name = normalize_folder_name(name.into())?;
        self.ensure_user_folder(folder_id)?;
        self.ensure_name_available(&name, Some(folder_id))?;

        self.store.update_containers(
            &ContainerFilter::by_id(folder_id),
            &ContainerValues::new()
                .with(ContainerColumn::Snippet, name)
                .with(ContainerColumn::ModifiedDate, now_millis())
                .with(ContainerColumn::LocalModified, 1_i64),
        )?;
        Ok(())
    }

    /// Deletes a user folder with everything inside it.
    pub fn delete_folder(&self, folder_id: ContainerId) -> Result<(), FolderServiceError> {
        self.ensure_user_folder(folder_id)?;
        self.store
            .delete_containers(&ContainerFilter::by_id(folder_id))?;
        Ok(())
    }

    /// Folders a note in `current_folder_id` can be moved to: every folder
    /// outside the trash except the current one, plus the root folder when
    /// the note is not already there.
    pub fn list_destination_folders(
        &self,
        current_folder_id: ContainerId,
    ) -> Result<Vec<Container>, FolderServiceError> {
        let mut destinations = Vec::new();
        if current_folder_id != ROOT_FOLDER_ID {
            if let Some(root) = self.store.get_container(ROOT_FOLDER_ID)? {
                destinations.push(root);
            }
        }

        let folders = self.store.query_containers(
            &ContainerFilter::all()
                .with_kind(ContainerKind::Folder)
                .excluding_parent(TRASH_FOLDER_ID),
            ContainerOrder::SnippetAsc,
        )?;
        destinations.extend(
            folders
                .into_iter()
                .filter(|folder| folder.id != current_folder_id),
        );
        Ok(destinations)
    }

    /// Moves notes into `folder_id`. Returns the number of notes moved.
    pub fn move_notes(
        &self,
        note_ids: &[ContainerId],
        folder_id: ContainerId,
    ) -> Result<usize, FolderServiceError> {
        ensure_no_system_ids(note_ids)?;
        if folder_id > 0 {
            self.ensure_user_folder(folder_id)?;
        } else if folder_id != ROOT_FOLDER_ID && folder_id != CALL_RECORD_FOLDER_ID {
            return Err(FolderServiceError::SystemFolder(folder_id));
        }
        Ok(self.store.move_containers(note_ids, folder_id)?)
    }

    /// Moves containers to the trash. Children follow automatically.
    pub fn trash_notes(&self, note_ids: &[ContainerId]) -> Result<usize, FolderServiceError> {
        ensure_no_system_ids(note_ids)?;
        let moved = self.store.move_containers(note_ids, TRASH_FOLDER_ID)?;
        info!(
            "event=notes_trash module=service status=ok requested={} moved={}",
            note_ids.len(),
            moved
        );
        Ok(moved)
    }

    /// Deletes containers permanently.
    pub fn delete_notes(&self, note_ids: &[ContainerId]) -> Result<usize, FolderServiceError> {
        ensure_no_system_ids(note_ids)?;
        Ok(self
            .store
            .delete_containers(&ContainerFilter::by_ids(note_ids.iter().copied()))?)
    }

    /// Moves trashed containers back to where they came from.
    ///
    /// Ids not currently in the trash are skipped. Returns the number of
    /// containers restored.
    pub fn restore_from_trash(
        &self,
        note_ids: &[ContainerId],
    ) -> Result<usize, FolderServiceError> {
        ensure_no_system_ids(note_ids)?;

        let trashed = self.store.query_containers(
            &ContainerFilter::by_ids(note_ids.iter().copied()),
            ContainerOrder::IdAsc,
        )?;
        let mut by_target: BTreeMap<ContainerId, Vec<ContainerId>> = BTreeMap::new();
        for container in trashed.iter().filter(|container| container.is_in_trash()) {
            let target = self.restore_target(container.origin_parent_id)?;
            by_target.entry(target).or_default().push(container.id);
        }

        let mut restored = 0;
        for (target, ids) in by_target {
            restored += self.store.update_containers(
                &ContainerFilter::by_ids(ids),
                &ContainerValues::new()
                    .with(ContainerColumn::ParentId, target)
                    .with(ContainerColumn::LocalModified, 1_i64),
            )?;
        }
        Ok(restored)
    }

    /// Widget bindings of the notes directly inside `folder_id`.
    pub fn folder_note_widgets(
        &self,
        folder_id: ContainerId,
    ) -> Result<Vec<WidgetBinding>, FolderServiceError> {
        let notes = self.store.query_containers(
            &ContainerFilter::by_parent(folder_id).with_kind(ContainerKind::Note),
            ContainerOrder::IdAsc,
        )?;
        Ok(notes
            .into_iter()
            .map(|note| note.widget)
            .filter(WidgetBinding::is_bound)
            .collect())
    }

    /// Whether `note_id` is an existing note outside the trash.
    pub fn visible_note_exists(&self, note_id: ContainerId) -> Result<bool, FolderServiceError> {
        Ok(self
            .store
            .get_container(note_id)?
            .is_some_and(|note| note.kind == ContainerKind::Note && !note.is_in_trash()))
    }

    fn restore_target(&self, origin_id: ContainerId) -> Result<ContainerId, FolderServiceError> {
        if origin_id == ROOT_FOLDER_ID || origin_id == CALL_RECORD_FOLDER_ID {
            return Ok(origin_id);
        }
        if origin_id <= 0 {
            return Ok(ROOT_FOLDER_ID);
        }
        let origin_visible = self
            .store
            .get_container(origin_id)?
            .is_some_and(|origin| !origin.is_in_trash());
        Ok(if origin_visible {
            origin_id
        } else {
            ROOT_FOLDER_ID
        })
    }

    fn ensure_user_folder(&self, folder_id: ContainerId) -> Result<Container, FolderServiceError> {
        if folder_id <= 0 {
            return Err(FolderServiceError::SystemFolder(folder_id));
        }
        match self.store.get_container(folder_id)? {
            Some(folder) if folder.kind == ContainerKind::Folder => Ok(folder),
            _ => Err(FolderServiceError::FolderNotFound(folder_id)),
        }
    }

    fn ensure_name_available(
        &self,
        name: &str,
        renaming: Option<ContainerId>,
    ) -> Result<(), FolderServiceError> {
        let clashes = self.store.query_containers(
            &ContainerFilter::all()
                .with_kind(ContainerKind::Folder)
                .excluding_parent(TRASH_FOLDER_ID)
                .with_snippet(name),
            ContainerOrder::IdAsc,
        )?;
        if clashes.iter().any(|folder| Some(folder.id) != renaming) {
            return Err(FolderServiceError::FolderNameTaken(name.to_string()));
        }
        Ok(())
    }
}

fn ensure_no_system_ids(ids: &[ContainerId]) -> Result<(), FolderServiceError> {
    match ids.iter().find(|id| **id <= 0) {
        Some(id) => Err(FolderServiceError::SystemFolder(*id)),
        None => Ok(()),
    }
}

fn normalize_folder_name(value: String) -> Result<String, FolderServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FolderServiceError::InvalidFolderName);
    }
    Ok(trimmed.to_string())
}
