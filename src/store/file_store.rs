use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{NoteStore, sort_by_last_change};
use crate::error::{NoteError, Result};
use crate::note::{NOTE_EXTENSION, Note};
use crate::richtext::xml_reader::read_note;
use crate::richtext::xml_writer::write_note;

/// Stores every note as `<guid>.note` in one directory
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: PathBuf) -> Self {
        FileStore { base_path }
    }

    /// Like `new`, creating the directory if needed
    pub fn open(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)?;
        Ok(FileStore::new(base_path))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the file for `guid`. Guids that would escape the directory are rejected.
    pub fn note_path(&self, guid: &str) -> Result<PathBuf> {
        if guid.is_empty() || guid.starts_with('.') || guid.contains(['/', '\\']) {
            return Err(NoteError::NotFound(guid.to_string()));
        }
        Ok(self.base_path.join(format!("{guid}.{NOTE_EXTENSION}")))
    }

    fn read_file(path: &Path, guid: &str) -> Result<Note> {
        let xml = fs::read_to_string(path)?;
        let mut note = read_note(&xml)?.note;
        note.guid = guid.to_string();
        Ok(note)
    }
}

impl NoteStore for FileStore {
    fn load(&self, guid: &str) -> Result<Note> {
        let path = self.note_path(guid)?;
        if !path.exists() {
            return Err(NoteError::NotFound(guid.to_string()));
        }
        FileStore::read_file(&path, guid)
    }

    /// Written to a temporary file first, then renamed over the old one
    fn save(&self, note: &Note) -> Result<()> {
        let path = self.note_path(&note.guid)?;
        fs::create_dir_all(&self.base_path)?;
        let tmp = path.with_extension(format!("{NOTE_EXTENSION}.tmp"));
        fs::write(&tmp, write_note(note))?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(guid = %note.guid, path = %path.display(), "saved note");
        Ok(())
    }

    fn delete(&self, note: &Note) -> Result<()> {
        let path = self.note_path(&note.guid)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(NoteError::NotFound(note.guid.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Files that cannot be parsed are logged and left out
    fn list(&self) -> Result<Vec<Note>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }
        let mut notes = Vec::new();
        for entry in WalkDir::new(&self.base_path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| NoteError::Store(e.to_string()))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|s| s.to_str()) != Some(NOTE_EXTENSION)
            {
                continue;
            }
            let Some(guid) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match FileStore::read_file(path, guid) {
                Ok(note) => notes.push(note),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable note"),
            }
        }
        sort_by_last_change(&mut notes);
        Ok(notes)
    }
}
