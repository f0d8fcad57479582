// Rich text
// The note document model and its Tomboy XML form.

pub mod lists;
pub mod note_buffer;
pub mod tags;
pub mod xml_reader;
pub mod xml_writer;

pub use note_buffer::{NoteBuffer, TextRun};
pub use tags::{LinkKind, SizeScale, Tag, TagKind, TagSet, TagTable};
