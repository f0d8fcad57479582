// Note
// Metadata of one note together with its serialized content.

use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

use crate::dates;
use crate::error::Result;
use crate::richtext::NoteBuffer;
use crate::richtext::xml_reader::read_note_content;
use crate::richtext::xml_writer::write_note_content;
use crate::store::NoteStore;

/// Topic tag that marks a note as pinned
pub const PINNED_TAG: &str = "system:pinned";
pub const NOTE_VERSION: f64 = 0.3;
pub const CONTENT_VERSION: f64 = 0.1;
pub const NOTE_EXTENSION: &str = "note";
pub const DEFAULT_SIZE: i32 = 400;

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub guid: String,
    pub title: String,
    /// The `<note-content>` fragment
    pub content: String,
    pub note_version: f64,
    pub content_version: f64,
    pub create_date: DateTime<FixedOffset>,
    pub last_change_date: DateTime<FixedOffset>,
    pub last_metadata_change_date: DateTime<FixedOffset>,
    pub cursor_position: i32,
    pub selection_bound_position: Option<i32>,
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
    pub open_on_startup: bool,
    pub pinned: bool,
    /// Free-form topic labels, `system:pinned` excluded
    pub tags: Vec<String>,
}

impl Default for Note {
    fn default() -> Self {
        Note {
            guid: String::new(),
            title: String::new(),
            content: String::new(),
            note_version: NOTE_VERSION,
            content_version: CONTENT_VERSION,
            create_date: dates::epoch(),
            last_change_date: dates::epoch(),
            last_metadata_change_date: dates::epoch(),
            cursor_position: 0,
            selection_bound_position: None,
            width: 0,
            height: 0,
            x: 0,
            y: 0,
            open_on_startup: false,
            pinned: false,
            tags: Vec::new(),
        }
    }
}

impl Note {
    /// A fresh note with a new guid whose text is just the title
    pub fn new(title: &str) -> Self {
        let now = dates::now();
        let buffer = NoteBuffer::with_text(title);
        Note {
            guid: Uuid::new_v4().to_string(),
            title: title.trim().to_string(),
            content: write_note_content(&buffer, CONTENT_VERSION),
            create_date: now,
            last_change_date: now,
            last_metadata_change_date: now,
            cursor_position: buffer.len() as i32,
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            ..Note::default()
        }
    }

    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn file_name(&self) -> String {
        format!("{}.{NOTE_EXTENSION}", self.guid)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        if tag == PINNED_TAG {
            return self.pinned;
        }
        self.tags.iter().any(|t| t == tag)
    }

    /// Returns false if the note already had the tag
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        if tag == PINNED_TAG {
            self.pinned = true;
        } else {
            self.tags.push(tag.to_string());
        }
        self.last_metadata_change_date = dates::now();
        true
    }

    /// Returns false if the note did not have the tag
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        if !self.has_tag(tag) {
            return false;
        }
        if tag == PINNED_TAG {
            self.pinned = false;
        } else {
            self.tags.retain(|t| t != tag);
        }
        self.last_metadata_change_date = dates::now();
        true
    }

    /// Store the buffer's content, title and cursor in the note.
    /// Returns true when the content changed.
    pub fn update_from_buffer(&mut self, buffer: &NoteBuffer) -> bool {
        self.cursor_position = buffer.cursor() as i32;
        self.selection_bound_position = buffer
            .has_selection()
            .then(|| buffer.selection_bound() as i32);

        let content = write_note_content(buffer, self.content_version);
        if content == self.content {
            return false;
        }
        self.content = content;
        self.title = title_of(buffer);
        self.last_change_date = dates::now();
        true
    }
}

/// The first line of the buffer, without a bullet
pub fn title_of(buffer: &NoteBuffer) -> String {
    let start = if buffer.is_bullet_line(0) { 2 } else { 0 };
    let end = buffer.line_end(0);
    buffer.slice(start.min(end), end).trim().to_string()
}

/// A note together with its parsed document
#[derive(Debug, Clone)]
pub struct LoadedNote {
    pub note: Note,
    pub buffer: NoteBuffer,
}

impl LoadedNote {
    /// Parse the note's content into a buffer and restore the cursor
    pub fn from_note(note: Note) -> Result<Self> {
        let mut buffer = NoteBuffer::new();
        read_note_content(&note.content, &mut buffer)?;
        let len = buffer.len();
        let clamp = |position: i32| (position.max(0) as usize).min(len);
        let cursor = clamp(note.cursor_position);
        match note.selection_bound_position {
            Some(bound) => buffer.select_range(clamp(bound), cursor),
            None => buffer.place_cursor(cursor),
        }
        Ok(LoadedNote { note, buffer })
    }

    /// Load a note for editing. Failures are logged and give an empty note
    /// with the requested guid, so the editor always has a document.
    pub fn load_or_default(store: &dyn NoteStore, guid: &str) -> LoadedNote {
        let loaded = store.load(guid).and_then(LoadedNote::from_note);
        match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(guid, error = %e, "could not load note, starting empty");
                let mut note = Note::new("");
                note.guid = guid.to_string();
                LoadedNote {
                    note,
                    buffer: NoteBuffer::new(),
                }
            }
        }
    }
}
