// Auto-save
// Debounced saving of the note being edited.

use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset};

use crate::config::Config;
use crate::dates;
use crate::error::Result;
use crate::note::Note;
use crate::richtext::NoteBuffer;
use crate::richtext::xml_writer::write_note_content;
use crate::store::NoteStore;

/// State management for auto-save functionality
pub struct AutoSaveState {
    /// When the content was last changed
    pub last_change_time: Option<Instant>,
    /// When the content was last successfully saved
    pub last_save_time: Option<DateTime<FixedOffset>>,
    /// Whether a save is pending (for debounce)
    pub pending_save: bool,
    /// Quiet period after the last change before saving
    pub delay: Duration,
    /// Content as last saved, to detect changes
    saved_content: String,
}

impl AutoSaveState {
    pub fn new(delay: Duration) -> Self {
        AutoSaveState {
            last_change_time: None,
            last_save_time: None,
            pending_save: false,
            delay,
            saved_content: String::new(),
        }
    }

    /// Start tracking a freshly loaded note
    pub fn for_note(note: &Note, delay: Duration) -> Self {
        AutoSaveState {
            saved_content: note.content.clone(),
            ..AutoSaveState::new(delay)
        }
    }

    /// Start tracking a note with the configured delay
    pub fn from_config(note: &Note, config: &Config) -> Self {
        AutoSaveState::for_note(note, config.autosave_delay())
    }

    /// Mark that content has changed
    pub fn mark_changed(&mut self) {
        self.mark_changed_at(Instant::now());
    }

    pub fn mark_changed_at(&mut self, at: Instant) {
        self.last_change_time = Some(at);
        self.pending_save = true;
    }

    /// True once a pending change has been left alone for the delay
    pub fn is_due(&self, now: Instant) -> bool {
        self.pending_save
            && self
                .last_change_time
                .is_some_and(|changed| now.duration_since(changed) >= self.delay)
    }

    /// Save the buffer into `note` and the store if its content changed.
    ///
    /// Returns whether anything was written. After a failed save the change
    /// stays pending and the buffer is untouched, so the next call retries.
    pub fn trigger_save(
        &mut self,
        note: &mut Note,
        buffer: &NoteBuffer,
        store: &dyn NoteStore,
    ) -> Result<bool> {
        let content = write_note_content(buffer, note.content_version);
        if content == self.saved_content {
            self.pending_save = false;
            return Ok(false);
        }

        note.update_from_buffer(buffer);
        match store.save(note) {
            Ok(()) => {
                self.saved_content = content;
                self.last_save_time = Some(dates::now());
                self.pending_save = false;
                tracing::debug!(guid = %note.guid, "auto-saved note");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(guid = %note.guid, error = %e, "auto-save failed");
                self.pending_save = true;
                Err(e)
            }
        }
    }

    /// Get the status text for display
    pub fn status_text(&self, now: DateTime<FixedOffset>) -> String {
        if let Some(saved) = self.last_save_time {
            format!("saved {}", format_time_since(saved, now))
        } else if self.last_change_time.is_some() {
            "not saved".to_string()
        } else {
            String::new()
        }
    }
}

/// Format the age of a timestamp as a human-readable string
pub fn format_time_since(time: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> String {
    let secs = now.signed_duration_since(time).num_seconds().max(0);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };

    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        let mins = secs / 60;
        if mins == 1 {
            "1 min ago".to_string()
        } else {
            format!("{mins} min ago")
        }
    } else if secs < 86400 {
        plural(secs / 3600, "hour")
    } else if secs < 604800 {
        plural(secs / 86400, "day")
    } else {
        // A week or more - show date
        time.format("%Y-%m-%d").to_string()
    }
}
