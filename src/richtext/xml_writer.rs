// XML Writer
// Serializes a note buffer to the Tomboy note-content dialect by walking the
// positions where tags start or end, and whole notes to `.note` files.

use quick_xml::escape::partial_escape;

use super::note_buffer::NoteBuffer;
use super::tags::{TagKind, TagSet, depth_of, is_depth_tag};
use crate::dates::format_date;
use crate::note::{Note, PINNED_TAG};

pub const TOMBOY_NS: &str = "http://beatniksoftware.com/tomboy";
pub const LINK_NS: &str = "http://beatniksoftware.com/tomboy/link";
pub const SIZE_NS: &str = "http://beatniksoftware.com/tomboy/size";

const LIST_ITEM_OPEN: &str = "<list-item dir=\"ltr\">";
const LIST_ITEM_CLOSE: &str = "</list-item>";

/// Versions are written as "X.Y"
pub fn format_version(version: f64) -> String {
    if version.fract() == 0.0 {
        format!("{version:.1}")
    } else {
        format!("{version}")
    }
}

/// Tags as written out. A bullet glyph only contributes its list tags.
fn written_tags(tags: &TagSet) -> TagSet {
    if tags.iter().any(is_depth_tag) {
        tags.iter().filter(|t| t.is_structural()).cloned().collect()
    } else {
        tags.clone()
    }
}

/// Per-call state of one serialization walk
struct SerializerState<'a> {
    buffer: &'a NoteBuffer,
    out: String,
    /// Number of currently open `<list>` elements
    depth: u32,
    /// Depth announced by a bullet, consumed by the following list item
    pending_depth: Option<u32>,
    /// Open inline elements, outermost first
    open: Vec<TagKind>,
}

impl<'a> SerializerState<'a> {
    fn new(buffer: &'a NoteBuffer) -> Self {
        SerializerState {
            buffer,
            out: String::new(),
            depth: 0,
            pending_depth: None,
            open: Vec::new(),
        }
    }

    fn run(mut self) -> String {
        let buffer = self.buffer;
        let runs = buffer.runs();
        let mut previous = TagSet::new();
        for (i, run) in runs.iter().enumerate() {
            let tags = written_tags(&run.tags);
            self.boundary(&previous, &tags);
            // bullet glyphs are regenerated from depth tags on load
            if tags.iter().any(is_depth_tag) {
                let has_content = runs
                    .get(i + 1)
                    .is_some_and(|next| next.has_tag(&TagKind::ListItem));
                if !has_content {
                    self.empty_item();
                }
            } else {
                self.out.push_str(&partial_escape(&run.text));
            }
            previous = tags;
        }
        self.close_inline_from(0);
        self.close_lists();
        self.out
    }

    fn boundary(&mut self, previous: &TagSet, current: &TagSet) {
        let closing: Vec<TagKind> = previous.difference(current).cloned().collect();
        let opening: Vec<TagKind> = current.difference(previous).cloned().collect();
        let list_closes = closing.contains(&TagKind::List);
        let item_opens = opening.contains(&TagKind::ListItem);

        // List structure may only change with no inline element open
        let cut = if list_closes || item_opens {
            0
        } else {
            self.open
                .iter()
                .position(|tag| closing.contains(tag))
                .unwrap_or(self.open.len())
        };
        let mut to_open: Vec<TagKind> = self
            .close_inline_from(cut)
            .into_iter()
            .filter(|tag| !closing.contains(tag))
            .collect();

        if list_closes {
            self.close_lists();
            self.pending_depth = None;
        }
        if let Some(depth) = opening.iter().find_map(depth_of) {
            self.pending_depth = Some(depth);
        }
        if item_opens {
            let depth = self.pending_depth.take().unwrap_or(self.depth.max(1));
            self.move_to_depth(depth);
        }

        to_open.extend(opening.into_iter().filter(TagKind::is_inline));
        self.buffer.tag_table().sort_by_priority(&mut to_open);
        for tag in to_open {
            self.out.push('<');
            self.out.push_str(&tag.name());
            self.out.push('>');
            self.open.push(tag);
        }
    }

    /// A bullet without text still needs its item, or it is lost on load
    fn empty_item(&mut self) {
        if let Some(depth) = self.pending_depth.take() {
            self.move_to_depth(depth);
        }
    }

    /// Close the open inline elements from index `from` on, innermost first.
    /// Returns them outermost first.
    fn close_inline_from(&mut self, from: usize) -> Vec<TagKind> {
        let popped = self.open.split_off(from);
        for tag in popped.iter().rev() {
            self.out.push_str("</");
            self.out.push_str(&tag.name());
            self.out.push('>');
        }
        popped
    }

    fn move_to_depth(&mut self, depth: u32) {
        if depth > self.depth {
            for _ in self.depth..depth {
                self.out.push_str("<list>");
                self.out.push_str(LIST_ITEM_OPEN);
            }
        } else {
            for _ in depth..self.depth {
                self.out.push_str(LIST_ITEM_CLOSE);
                self.out.push_str("</list>");
            }
            self.out.push_str(LIST_ITEM_CLOSE);
            self.out.push_str(LIST_ITEM_OPEN);
        }
        self.depth = depth;
    }

    fn close_lists(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(LIST_ITEM_CLOSE);
            self.out.push_str("</list>");
        }
        self.depth = 0;
    }
}

/// The inner markup of `<note-content>` for this buffer
pub fn write_content_body(buffer: &NoteBuffer) -> String {
    SerializerState::new(buffer).run()
}

/// A standalone `<note-content>` fragment with its namespaces and a trailing newline
pub fn write_note_content(buffer: &NoteBuffer, version: f64) -> String {
    format!(
        "<note-content version=\"{}\" xmlns:link=\"{LINK_NS}\" xmlns:size=\"{SIZE_NS}\" xmlns=\"{TOMBOY_NS}\">{}</note-content>\n",
        format_version(version),
        write_content_body(buffer),
    )
}

fn push_element(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!("  <{name}>{}</{name}>\n", partial_escape(value)));
}

/// The complete `.note` file for `note`, using its stored content
pub fn write_note(note: &Note) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<note version=\"{}\" xmlns:link=\"{LINK_NS}\" xmlns:size=\"{SIZE_NS}\" xmlns=\"{TOMBOY_NS}\">\n",
        format_version(note.note_version)
    ));
    push_element(&mut out, "title", &note.title);

    let content = if note.content.trim().is_empty() {
        write_note_content(&NoteBuffer::new(), note.content_version)
    } else {
        note.content.clone()
    };
    out.push_str("  <text xml:space=\"preserve\">");
    out.push_str(content.trim_end_matches('\n'));
    out.push_str("</text>\n");

    push_element(&mut out, "last-change-date", &format_date(&note.last_change_date));
    push_element(
        &mut out,
        "last-metadata-change-date",
        &format_date(&note.last_metadata_change_date),
    );
    push_element(&mut out, "create-date", &format_date(&note.create_date));
    push_element(&mut out, "cursor-position", &note.cursor_position.to_string());
    if let Some(bound) = note.selection_bound_position {
        push_element(&mut out, "selection-bound-position", &bound.to_string());
    }
    push_element(&mut out, "width", &note.width.to_string());
    push_element(&mut out, "height", &note.height.to_string());
    push_element(&mut out, "x", &note.x.to_string());
    push_element(&mut out, "y", &note.y.to_string());

    let mut tags: Vec<&str> = note.tags.iter().map(String::as_str).collect();
    if note.pinned && !tags.contains(&PINNED_TAG) {
        tags.push(PINNED_TAG);
    }
    if !tags.is_empty() {
        out.push_str("  <tags>\n");
        for tag in tags {
            out.push_str(&format!("    <tag>{}</tag>\n", partial_escape(tag)));
        }
        out.push_str("  </tags>\n");
    }

    let open = if note.open_on_startup { "True" } else { "False" };
    push_element(&mut out, "open-on-startup", open);
    out.push_str("</note>");
    out
}
