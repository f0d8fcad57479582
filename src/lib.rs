// Library exports for conboy

pub mod autosave;
pub mod config;
pub mod dates;
pub mod error;
pub mod link_handler;
pub mod note;
pub mod richtext;
pub mod store;

pub use error::{NoteError, Result};
pub use note::{LoadedNote, Note};
pub use richtext::{NoteBuffer, TagKind};
