// Note Storage
// Backends that persist notes, keyed by guid.

mod file_store;
mod memory_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;

use crate::config::{Config, StoreKind};
use crate::error::Result;
use crate::note::Note;

/// Persistence for notes. Callers never depend on a particular backend.
pub trait NoteStore {
    /// Load the note with `guid`; `NoteError::NotFound` when there is none
    fn load(&self, guid: &str) -> Result<Note>;

    /// Create or replace the stored note
    fn save(&self, note: &Note) -> Result<()>;

    fn delete(&self, note: &Note) -> Result<()>;

    /// All stored notes, most recently changed first
    fn list(&self) -> Result<Vec<Note>>;
}

/// Open the backend selected by the configuration
pub fn open_store(config: &Config) -> Result<Box<dyn NoteStore>> {
    match config.store {
        StoreKind::File => Ok(Box::new(FileStore::open(config.notes_dir())?)),
        StoreKind::Memory => Ok(Box::new(MemoryStore::new())),
    }
}

fn sort_by_last_change(notes: &mut [Note]) {
    notes.sort_by(|a, b| {
        b.last_change_date
            .cmp(&a.last_change_date)
            .then_with(|| a.title.cmp(&b.title))
    });
}
