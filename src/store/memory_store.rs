use std::cell::RefCell;
use std::collections::HashMap;

use super::{NoteStore, sort_by_last_change};
use crate::error::{NoteError, Result};
use crate::note::Note;

/// In-memory storage, for tests and throwaway sessions.
///
/// Uses `RefCell` so the `NoteStore` methods can take `&self`.
#[derive(Default)]
pub struct MemoryStore {
    notes: RefCell<HashMap<String, Note>>,
    simulate_write_error: RefCell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following save fail
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *self.simulate_write_error.borrow_mut() = simulate;
    }

    pub fn len(&self) -> usize {
        self.notes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.borrow().is_empty()
    }
}

impl NoteStore for MemoryStore {
    fn load(&self, guid: &str) -> Result<Note> {
        self.notes
            .borrow()
            .get(guid)
            .cloned()
            .ok_or_else(|| NoteError::NotFound(guid.to_string()))
    }

    fn save(&self, note: &Note) -> Result<()> {
        if *self.simulate_write_error.borrow() {
            return Err(NoteError::Store("Simulated write error".to_string()));
        }
        self.notes
            .borrow_mut()
            .insert(note.guid.clone(), note.clone());
        Ok(())
    }

    fn delete(&self, note: &Note) -> Result<()> {
        self.notes
            .borrow_mut()
            .remove(&note.guid)
            .map(|_| ())
            .ok_or_else(|| NoteError::NotFound(note.guid.clone()))
    }

    fn list(&self) -> Result<Vec<Note>> {
        let mut notes: Vec<Note> = self.notes.borrow().values().cloned().collect();
        sort_by_last_change(&mut notes);
        Ok(notes)
    }
}
