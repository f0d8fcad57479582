// XML Reader
// Streaming reader for Tomboy `.note` files: a pull parser drives an explicit
// state stack that replays the markup into a note buffer and note metadata.

use std::mem;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::note_buffer::NoteBuffer;
use super::tags::{TagKind, TagSet, bullet_glyph};
use super::xml_writer::write_note_content;
use crate::dates::parse_date;
use crate::error::{NoteError, Result};
use crate::note::{LoadedNote, Note, PINNED_TAG, title_of};

/// Metadata leaves directly under `<note>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    LastChangeDate,
    LastMetadataChangeDate,
    CreateDate,
    CursorPosition,
    SelectionBoundPosition,
    Width,
    Height,
    X,
    Y,
    OpenOnStartup,
}

impl Field {
    fn from_name(name: &str) -> Option<Field> {
        Some(match name {
            "last-change-date" => Field::LastChangeDate,
            "last-metadata-change-date" => Field::LastMetadataChangeDate,
            "create-date" => Field::CreateDate,
            "cursor-position" => Field::CursorPosition,
            "selection-bound-position" => Field::SelectionBoundPosition,
            "width" => Field::Width,
            "height" => Field::Height,
            "x" => Field::X,
            "y" => Field::Y,
            "open-on-startup" => Field::OpenOnStartup,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Note,
    Title,
    Text,
    Content,
    List,
    ListItem,
    Field(Field),
    Tags,
    Tag,
    /// Inside an element that is ignored together with its subtree
    Skip,
}

/// One parse in progress. Every call builds its own reader.
struct NoteReader {
    /// State for every open element
    states: Vec<State>,
    /// Formatting tag opened by every open element, in step with `states`
    elements: Vec<Option<TagKind>>,
    /// Number of open `<list>` elements
    depth: u32,
    /// Stack height the document started with
    base: usize,
    /// Whether the innermost open list item has produced a line yet
    item_has_text: bool,
    seen_note: bool,
    note: Note,
    buffer: NoteBuffer,
    field_text: String,
}

fn xml_error(position: usize, message: impl Into<String>) -> NoteError {
    NoteError::Xml {
        position,
        message: message.into(),
    }
}

fn version_attribute(element: &BytesStart) -> Option<f64> {
    let attribute = element.try_get_attribute("version").ok()??;
    attribute.unescape_value().ok()?.trim().parse().ok()
}

impl NoteReader {
    fn new(states: Vec<State>, buffer: NoteBuffer) -> Self {
        let base = states.len();
        NoteReader {
            elements: vec![None; base],
            states,
            depth: 0,
            base,
            item_has_text: false,
            seen_note: false,
            note: Note::default(),
            buffer,
            field_text: String::new(),
        }
    }

    fn current(&self) -> State {
        self.states.last().copied().unwrap_or(State::Start)
    }

    fn parse(&mut self, xml: &str) -> Result<()> {
        let mut reader = Reader::from_str(xml);
        loop {
            let position = reader.buffer_position();
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => return Err(xml_error(reader.buffer_position(), e.to_string())),
            };
            match event {
                Event::Start(element) => self.start(&element, position)?,
                Event::Empty(element) => {
                    self.start(&element, position)?;
                    self.end();
                }
                Event::End(_) => self.end(),
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| xml_error(position, e.to_string()))?;
                    self.text(&text);
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    self.text(&text);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if self.states.len() != self.base {
            return Err(xml_error(xml.len(), "unexpected end of document"));
        }
        Ok(())
    }

    fn start(&mut self, element: &BytesStart, position: usize) -> Result<()> {
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        let mut tag = None;
        let state = match (self.current(), name.as_str()) {
            (State::Start, "note") if !self.seen_note => {
                self.seen_note = true;
                if let Some(version) = version_attribute(element) {
                    self.note.note_version = version;
                }
                State::Note
            }
            (State::Start, _) => {
                return Err(xml_error(position, format!("unexpected root element <{name}>")));
            }
            (State::Note, "title") => State::Title,
            (State::Note, "text") => State::Text,
            (State::Note, "tags") => State::Tags,
            (State::Note, _) => match Field::from_name(&name) {
                Some(field) => State::Field(field),
                None => {
                    tracing::warn!(element = %name, "skipping unknown note element");
                    State::Skip
                }
            },
            (State::Text, "note-content") => {
                if let Some(version) = version_attribute(element) {
                    self.note.content_version = version;
                }
                State::Content
            }
            (State::Content | State::ListItem, "list") => {
                self.depth += 1;
                State::List
            }
            (state @ (State::Content | State::ListItem), _) => {
                let kind = TagKind::from_name(&name);
                match kind {
                    TagKind::Other(_) => {
                        tracing::warn!(element = %name, "keeping unknown formatting element");
                        tag = Some(kind);
                    }
                    _ if kind.is_structural() => {
                        tracing::warn!(element = %name, "ignoring misplaced list element");
                    }
                    _ => tag = Some(kind),
                }
                state
            }
            (State::List, "list-item") => {
                self.item_has_text = false;
                State::ListItem
            }
            (State::List, _) => {
                tracing::error!(element = %name, "<list> may only contain <list-item>");
                State::Skip
            }
            (State::Tags, "tag") => State::Tag,
            (State::Skip, _) => State::Skip,
            (state, _) => {
                tracing::warn!(element = %name, ?state, "skipping unexpected element");
                State::Skip
            }
        };
        if matches!(state, State::Title | State::Tag | State::Field(_)) {
            self.field_text.clear();
        }
        self.states.push(state);
        self.elements.push(tag);
        Ok(())
    }

    fn end(&mut self) {
        if self.states.len() <= self.base {
            return;
        }
        self.elements.pop();
        match self.states.pop() {
            Some(State::Title) => self.note.title = mem::take(&mut self.field_text),
            Some(State::Tag) => {
                let tag = mem::take(&mut self.field_text).trim().to_string();
                if tag == PINNED_TAG {
                    self.note.pinned = true;
                } else if !tag.is_empty() {
                    self.note.tags.push(tag);
                }
            }
            Some(State::Field(field)) => {
                let value = mem::take(&mut self.field_text);
                self.apply_field(field, value.trim());
            }
            Some(State::List) => self.depth = self.depth.saturating_sub(1),
            Some(State::ListItem) => {
                if !self.item_has_text && self.buffer.ends_at_line_start() {
                    self.append_bullet();
                }
                self.item_has_text = true;
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        match self.current() {
            State::Title | State::Tag | State::Field(_) => self.field_text.push_str(text),
            State::Content => {
                let text = text.replace("\r\n", "\n");
                let tags = self.open_tags();
                self.buffer.append_tag_set(&text, tags);
            }
            State::ListItem => self.list_text(&text.replace("\r\n", "\n")),
            _ => {
                if !text.trim().is_empty() {
                    tracing::warn!(text = %text.trim(), "ignoring stray text");
                }
            }
        }
    }

    fn open_tags(&self) -> TagSet {
        self.elements.iter().flatten().cloned().collect()
    }

    fn append_bullet(&mut self) {
        let depth = self.depth.max(1);
        self.buffer.append_tag_set(
            bullet_glyph(depth),
            [TagKind::Depth(depth), TagKind::List].into_iter().collect(),
        );
    }

    /// Text inside a list item gets a bullet at the start of every line
    fn list_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.item_has_text = true;
        let mut tags = self.open_tags();
        tags.insert(TagKind::List);
        tags.insert(TagKind::ListItem);
        for piece in text.split_inclusive('\n') {
            if self.buffer.ends_at_line_start() {
                self.append_bullet();
            }
            self.buffer.append_tag_set(piece, tags.clone());
        }
    }

    fn apply_field(&mut self, field: Field, value: &str) {
        let note = &mut self.note;
        match field {
            Field::LastChangeDate | Field::LastMetadataChangeDate | Field::CreateDate => {
                let date = match parse_date(value) {
                    Ok(date) => date,
                    Err(e) => {
                        tracing::warn!(?field, value, error = %e, "invalid date");
                        return;
                    }
                };
                match field {
                    Field::LastChangeDate => note.last_change_date = date,
                    Field::LastMetadataChangeDate => note.last_metadata_change_date = date,
                    _ => note.create_date = date,
                }
            }
            Field::OpenOnStartup => match value {
                "True" => note.open_on_startup = true,
                "False" => note.open_on_startup = false,
                _ => tracing::error!(value, "open-on-startup must be True or False"),
            },
            _ => {
                let Ok(number) = value.parse::<i32>() else {
                    tracing::warn!(?field, value, "invalid number");
                    return;
                };
                match field {
                    Field::CursorPosition => note.cursor_position = number,
                    Field::SelectionBoundPosition => note.selection_bound_position = Some(number),
                    Field::Width => note.width = number,
                    Field::Height => note.height = number,
                    Field::X => note.x = number,
                    _ => note.y = number,
                }
            }
        }
    }
}

fn clamp_position(position: i32, len: usize) -> usize {
    (position.max(0) as usize).min(len)
}

/// Parse a complete `.note` file.
///
/// The returned note's content is the re-serialized buffer. Its guid is left
/// empty; it is not part of the file.
pub fn read_note(xml: &str) -> Result<LoadedNote> {
    let mut reader = NoteReader::new(Vec::new(), NoteBuffer::new());
    reader.parse(xml)?;
    if !reader.seen_note {
        return Err(xml_error(0, "document has no <note> element"));
    }
    let NoteReader {
        mut note,
        mut buffer,
        ..
    } = reader;

    let last = buffer.line_count() - 1;
    buffer.refresh_list_tags(0, last);
    note.content = write_note_content(&buffer, note.content_version);
    if note.title.trim().is_empty() {
        note.title = title_of(&buffer);
    }

    let len = buffer.len();
    let cursor = clamp_position(note.cursor_position, len);
    match note.selection_bound_position {
        Some(bound) => buffer.select_range(clamp_position(bound, len), cursor),
        None => buffer.place_cursor(cursor),
    }
    Ok(LoadedNote { note, buffer })
}

/// Append the content of a `<note-content>` fragment to `buffer`
pub fn read_note_content(fragment: &str, buffer: &mut NoteBuffer) -> Result<()> {
    let mut reader = NoteReader::new(vec![State::Text], mem::take(buffer));
    let result = reader.parse(fragment);
    *buffer = reader.buffer;
    result?;
    let last = buffer.line_count() - 1;
    buffer.refresh_list_tags(0, last);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(body: &str) -> String {
        format!("<note-content version=\"0.1\">{body}</note-content>")
    }

    fn read(body: &str) -> NoteBuffer {
        let mut buffer = NoteBuffer::new();
        read_note_content(&content(body), &mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_plain_content() {
        let buffer = read("Hello\n\nWorld");
        assert_eq!(buffer.text(), "Hello\n\nWorld");
        assert_eq!(buffer.runs().len(), 1);
        assert!(buffer.runs()[0].tags.is_empty());
    }

    #[test]
    fn test_inline_tags_nest() {
        let buffer = read("<bold>a<italic>b</italic></bold>c");
        assert_eq!(buffer.text(), "abc");
        assert_eq!(buffer.tags_at(0), vec![TagKind::Bold]);
        assert_eq!(buffer.tags_at(1), vec![TagKind::Italic, TagKind::Bold]);
        assert!(buffer.tags_at(2).is_empty());
    }

    #[test]
    fn test_entities_are_unescaped() {
        let buffer = read("a &lt; b &amp;&amp; c");
        assert_eq!(buffer.text(), "a < b && c");
    }

    #[test]
    fn test_list_items_get_bullets() {
        let buffer = read(
            "<list><list-item dir=\"ltr\">one\n<list><list-item dir=\"ltr\">two</list-item></list></list-item></list>",
        );
        assert_eq!(buffer.text(), "\u{2022} one\n\u{2218} two");
        assert_eq!(buffer.line_depth(0), 1);
        assert_eq!(buffer.line_depth(1), 2);
        assert!(buffer.has_tag_at(2, &TagKind::ListItem));
        assert!(!buffer.has_tag_at(0, &TagKind::ListItem));
    }

    #[test]
    fn test_empty_list_items_keep_their_bullets() {
        let buffer = read(
            "Title\n<list><list-item dir=\"ltr\">a\n<list><list-item dir=\"ltr\"></list-item></list></list-item></list>",
        );
        assert_eq!(buffer.text(), "Title\n\u{2022} a\n\u{2218} ");
        assert_eq!(buffer.line_depth(2), 2);

        let buffer = read("<list><list-item dir=\"ltr\"/></list>");
        assert_eq!(buffer.text(), "\u{2022} ");
    }

    #[test]
    fn test_unknown_inline_element_is_kept() {
        let buffer = read("<datetime>today</datetime>");
        assert!(buffer.has_tag_at(0, &TagKind::Other("datetime".into())));
    }

    #[test]
    fn test_bad_nesting_inside_list_is_skipped() {
        let buffer = read("<list><bold>lost</bold><list-item dir=\"ltr\">kept</list-item></list>");
        assert_eq!(buffer.text(), "\u{2022} kept");
    }

    #[test]
    fn test_syntax_error() {
        let mut buffer = NoteBuffer::new();
        let result = read_note_content(&content("<bold>oops</italic>"), &mut buffer);
        assert!(matches!(result, Err(NoteError::Xml { .. })));
    }

    #[test]
    fn test_unexpected_root() {
        let result = read_note("<html><body/></html>");
        assert!(matches!(result, Err(NoteError::Xml { .. })));
    }
}
