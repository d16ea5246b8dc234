//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `jotter_core` linkage.
//! - Exercise one store round-trip: open, commit a note, read it back.
//!
//! Usage: `jotter_cli [DB_PATH]`. Without a path an in-memory store is used.

use jotter_core::{
    RecordStore, SaveOutcome, WidgetBinding, WorkingNote, ROOT_FOLDER_ID,
};
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("jotter_core ping={}", jotter_core::ping());
    println!("jotter_core version={}", jotter_core::core_version());

    match run(std::env::args().nth(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_probe module=cli status=error error={err}");
            eprintln!("jotter_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let store = match db_path {
        Some(path) => RecordStore::open(path)?,
        None => RecordStore::open_in_memory()?,
    };

    let mut note = WorkingNote::create_empty(&store, ROOT_FOLDER_ID, WidgetBinding::unbound(), 0);
    note.set_working_text("jotter smoke probe");
    let SaveOutcome::Saved(note_id) = note.commit()? else {
        return Err("smoke note was not saved".into());
    };

    let reloaded = WorkingNote::load(&store, note_id)?;
    let root = store
        .get_container(ROOT_FOLDER_ID)?
        .ok_or("root folder missing")?;
    println!("jotter_core note_id={note_id} content_len={}", reloaded.content().len());
    println!("jotter_core root_notes_count={}", root.notes_count);
    Ok(())
}
