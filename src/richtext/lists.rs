// List Engine
// Bulleted lists on top of the note buffer: bullet glyphs, per-line depth
// tags, indenting and the Enter/Backspace/Delete behaviour at list boundaries.

use unicode_segmentation::UnicodeSegmentation;

use super::note_buffer::NoteBuffer;
use super::tags::{BULLET_LEN, TagKind, TagSet, bullet_glyph, depth_of, is_depth_tag};

fn bullet_tags(depth: u32) -> TagSet {
    [TagKind::Depth(depth), TagKind::List].into_iter().collect()
}

impl NoteBuffer {
    /// Nesting level of a line, 0 for plain lines
    pub fn line_depth(&self, line: usize) -> u32 {
        self.depth_at(self.line_start(line))
    }

    pub fn is_bullet_line(&self, line: usize) -> bool {
        self.line_depth(line) > 0
    }

    fn lines_in(&self, start: usize, end: usize) -> (usize, usize) {
        let (a, b) = (start.min(end), start.max(end));
        (self.line_at(a), self.line_at(b))
    }

    /// Number of characters at the start of `line` that belong to its bullet
    fn bullet_len(&self, line: usize) -> usize {
        let start = self.line_start(line);
        let end = self.line_end(line);
        (start..end)
            .take_while(|pos| self.depth_at(*pos) > 0)
            .count()
    }

    fn insert_bullet(&mut self, line: usize, depth: u32) {
        let start = self.line_start(line);
        self.insert_tag_set(start, bullet_glyph(depth), bullet_tags(depth));
    }

    fn remove_bullet(&mut self, line: usize) {
        let start = self.line_start(line);
        let len = self.bullet_len(line);
        self.delete(start, start + len);
    }

    /// Replace the bullet of `line` with one for `depth`; 0 makes it a plain line
    fn set_line_depth(&mut self, line: usize, depth: u32) {
        if self.is_bullet_line(line) {
            self.remove_bullet(line);
        }
        if depth > 0 {
            self.insert_bullet(line, depth);
        } else {
            let start = self.line_start(line);
            let end = self.line_end_with_newline(line);
            self.remove_tags_matching(start, end, TagKind::is_structural);
        }
    }

    /// Re-establish the list tags on lines `first..=last` and their neighbours.
    ///
    /// On a bullet line the glyph carries exactly its depth tag and `list`,
    /// the rest of the line (newline included) carries `list-item` and `list`.
    /// Plain lines carry no structural tags at all.
    pub(crate) fn refresh_list_tags(&mut self, first: usize, last: usize) {
        let first = first.saturating_sub(1);
        let last = (last + 1).min(self.line_count() - 1);
        for (line, depth) in self.damaged_bullets(first, last).into_iter().rev() {
            tracing::debug!(line, depth, "repairing damaged bullet");
            let start = self.line_start(line);
            let len = self.bullet_len(line);
            self.delete(start, start + len);
            self.insert_tag_set(start, bullet_glyph(depth), bullet_tags(depth));
        }

        let start = self.line_start(first);
        let end = self.line_end_with_newline(last);
        let mut column = 0;
        let mut depth = 0;
        self.restyle(start, end, |c, tags| {
            if column == 0 {
                depth = tags.iter().find_map(depth_of).unwrap_or(0);
            }
            let restyled = if depth == 0 {
                tags.iter().filter(|t| !t.is_structural()).cloned().collect()
            } else if column < BULLET_LEN {
                bullet_tags(depth)
            } else {
                let mut content: TagSet =
                    tags.iter().filter(|t| !is_depth_tag(t)).cloned().collect();
                content.insert(TagKind::ListItem);
                content.insert(TagKind::List);
                content
            };
            column = if c == '\n' { 0 } else { column + 1 };
            restyled
        });
    }

    /// Bullet lines in `first..=last` whose glyph is missing, cut or wrong,
    /// with the depth their first character announces
    fn damaged_bullets(&self, first: usize, last: usize) -> Vec<(usize, u32)> {
        let start = self.line_start(first);
        let end = self.line_end_with_newline(last);
        let mut damaged = Vec::new();
        let mut line = first;
        let mut depth = 0;
        let mut bullet = String::new();
        let mut in_bullet = false;
        let mut at_line_start = true;
        for (c, tags) in self.chars_with_tags(start).take(end - start) {
            if at_line_start {
                depth = tags.iter().find_map(depth_of).unwrap_or(0);
                bullet.clear();
                in_bullet = true;
                at_line_start = false;
            }
            if c == '\n' {
                if depth > 0 && bullet != bullet_glyph(depth) {
                    damaged.push((line, depth));
                }
                line += 1;
                at_line_start = true;
                continue;
            }
            if in_bullet && tags.iter().any(is_depth_tag) {
                bullet.push(c);
            } else {
                in_bullet = false;
            }
        }
        if !at_line_start && depth > 0 && bullet != bullet_glyph(depth) {
            damaged.push((line, depth));
        }
        damaged
    }

    /// Turn every plain line touched by [start..end) into a depth-1 bullet line.
    /// Lines that already have a bullet are left alone.
    pub fn enable_bullets(&mut self, start: usize, end: usize) {
        let (first, last) = self.lines_in(start, end);
        for line in first..=last {
            if !self.is_bullet_line(line) {
                self.insert_bullet(line, 1);
            }
        }
        self.refresh_list_tags(first, last);
        self.update_active_tags();
    }

    /// Remove bullets and list tags from every line touched by [start..end)
    pub fn disable_bullets(&mut self, start: usize, end: usize) {
        let (first, last) = self.lines_in(start, end);
        for line in first..=last {
            self.set_line_depth(line, 0);
        }
        self.refresh_list_tags(first, last);
        self.update_active_tags();
    }

    /// Indent every line touched by [start..end) one level; plain lines become depth 1
    pub fn increase_indent(&mut self, start: usize, end: usize) {
        let (first, last) = self.lines_in(start, end);
        for line in first..=last {
            let depth = self.line_depth(line);
            self.set_line_depth(line, depth + 1);
        }
        self.refresh_list_tags(first, last);
        self.update_active_tags();
    }

    /// Outdent every bullet line touched by [start..end); depth 1 loses its bullet
    pub fn decrease_indent(&mut self, start: usize, end: usize) {
        let (first, last) = self.lines_in(start, end);
        for line in first..=last {
            let depth = self.line_depth(line);
            if depth > 0 {
                self.set_line_depth(line, depth - 1);
            }
        }
        self.refresh_list_tags(first, last);
        self.update_active_tags();
    }

    fn decrease_line(&mut self, line: usize) {
        let start = self.line_start(line);
        self.decrease_indent(start, start);
    }

    /// Enter on a bullet line. Returns false when the cursor is not on one.
    ///
    /// An item with content is continued by a new bullet of the same depth,
    /// carrying the inline tags active at the cursor. Enter on an empty item
    /// leaves the list instead.
    pub fn add_new_line_in_list(&mut self) -> bool {
        let line = self.line_at(self.cursor());
        let depth = self.line_depth(line);
        if depth == 0 {
            return false;
        }
        let start = self.line_start(line);
        if self.line_end(line) <= start + BULLET_LEN {
            tracing::trace!(line, "enter on empty item leaves the list");
            self.set_line_depth(line, 0);
            self.refresh_list_tags(line, line);
            self.update_active_tags();
            return true;
        }

        let mut carried = self.active_tags().clone();
        carried.retain(|tag| tag.is_inline());
        let mut item_tags = carried.clone();
        item_tags.insert(TagKind::List);
        item_tags.insert(TagKind::ListItem);

        let at = self.cursor().max(start + BULLET_LEN);
        self.insert_tag_set(at, "\n", item_tags.clone());
        self.insert_tag_set(at + 1, bullet_glyph(depth), bullet_tags(depth));
        self.refresh_list_tags(line, line + 1);
        self.move_cursor(at + 1 + BULLET_LEN);
        self.set_active_tags(item_tags);
        true
    }

    /// Backspace next to a bullet outdents the line instead of deleting a character.
    /// Returns true when the key was handled.
    pub fn backspace_at_boundary(&mut self) -> bool {
        let cursor = self.cursor();
        if self.has_selection() {
            return false;
        }
        let on_bullet = self.depth_at(cursor) > 0;
        let after_bullet = cursor > 0 && self.depth_at(cursor - 1) > 0;
        if !on_bullet && !after_bullet {
            return false;
        }
        let line = if on_bullet {
            self.line_at(cursor)
        } else {
            self.line_at(cursor - 1)
        };
        self.decrease_line(line);
        true
    }

    /// Delete in front of a bullet (or at the end of the line above one)
    /// outdents that bullet line. Returns true when the key was handled.
    pub fn delete_at_boundary(&mut self) -> bool {
        let cursor = self.cursor();
        if self.has_selection() || cursor >= self.len() {
            return false;
        }
        if self.depth_at(cursor) > 0 {
            let line = self.line_at(cursor);
            self.decrease_line(line);
            return true;
        }
        if self.char_at(cursor) == Some('\n') && self.depth_at(cursor + 1) > 0 {
            let line = self.line_at(cursor) + 1;
            self.decrease_line(line);
            return true;
        }
        false
    }

    /// Move selection endpoints that fall inside a bullet glyph to just after it
    pub fn augment_selection(&self, start: usize, end: usize) -> (usize, usize) {
        (self.step_out_of_bullet(start), self.step_out_of_bullet(end))
    }

    fn step_out_of_bullet(&self, pos: usize) -> usize {
        let line = self.line_at(pos);
        let start = self.line_start(line);
        if pos > start && pos < start + BULLET_LEN && self.is_bullet_line(line) {
            start + BULLET_LEN
        } else {
            pos
        }
    }

    /// Delete the selected text without leaving half a bullet behind.
    /// Returns false when nothing is selected.
    pub fn delete_selection(&mut self) -> bool {
        let Some((start, end)) = self.selection_bounds() else {
            return false;
        };
        let (start, mut end) = self.augment_selection(start, end);
        let end_line = self.line_at(end);
        let start_line = self.line_at(start);
        if end == self.line_start(end_line)
            && end_line != start_line
            && start != self.line_start(start_line)
            && self.is_bullet_line(end_line)
        {
            end += BULLET_LEN;
        }
        self.delete(start, end);
        self.move_cursor(start);
        let line = self.line_at(start);
        self.refresh_list_tags(line, line);
        self.update_active_tags();
        true
    }

    /// Type `text` at the cursor with the active tags, replacing the selection
    pub fn insert_at_cursor(&mut self, text: &str) {
        self.delete_selection();
        let mut at = self.cursor();
        let line = self.line_at(at);
        let start = self.line_start(line);
        if self.is_bullet_line(line) && at < start + BULLET_LEN {
            at = start + BULLET_LEN;
        }
        let tags = self.active_tags().clone();
        let count = text.chars().count();
        self.insert_tag_set(at, text, tags.clone());
        self.move_cursor(at + count);
        let last = self.line_at(at + count);
        self.refresh_list_tags(line, last);
        self.set_active_tags(tags);
    }

    /// The Return key: continue a list, or insert a newline keeping the
    /// inline formatting for the next typed text
    pub fn handle_return(&mut self) {
        self.delete_selection();
        if self.add_new_line_in_list() {
            return;
        }
        let mut carried = self.active_tags().clone();
        carried.retain(|tag| tag.is_inline());
        let at = self.cursor();
        let line = self.line_at(at);
        self.insert_tag_set(at, "\n", carried.clone());
        self.move_cursor(at + 1);
        self.refresh_list_tags(line, line + 1);
        self.set_active_tags(carried);
    }

    /// Type `line` as a new last line. A leading "- " makes it a bullet item.
    pub fn append_line(&mut self, line: &str) {
        let end = self.len();
        self.place_cursor(end);
        if !self.is_empty() {
            self.handle_return();
        }
        let at = self.cursor();
        let text = match line.strip_prefix("- ") {
            Some(text) => {
                self.enable_bullets(at, at);
                text
            }
            None => {
                self.disable_bullets(at, at);
                line
            }
        };
        self.insert_at_cursor(text);
    }

    /// The Backspace key
    pub fn backspace(&mut self) {
        if self.delete_selection() || self.backspace_at_boundary() {
            return;
        }
        let cursor = self.cursor();
        if cursor == 0 {
            return;
        }
        let previous = self
            .slice(0, cursor)
            .graphemes(true)
            .next_back()
            .map(|g| g.chars().count())
            .unwrap_or(1);
        let start = cursor - previous;
        self.delete(start, cursor);
        let line = self.line_at(start);
        self.refresh_list_tags(line, line);
        self.update_active_tags();
    }

    /// The Delete key
    pub fn delete_forward(&mut self) {
        if self.delete_selection() || self.delete_at_boundary() {
            return;
        }
        let cursor = self.cursor();
        if cursor >= self.len() {
            return;
        }
        let line = self.line_at(cursor);
        let next = self
            .slice(cursor, self.line_end_with_newline(line))
            .graphemes(true)
            .next()
            .map(|g| g.chars().count())
            .unwrap_or(1);
        self.delete(cursor, cursor + next);
        self.refresh_list_tags(line, line);
        self.update_active_tags();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet_buffer(text: &str) -> NoteBuffer {
        let mut buffer = NoteBuffer::with_text(text);
        let len = buffer.len();
        buffer.enable_bullets(0, len);
        buffer
    }

    #[test]
    fn test_enable_bullets_tags_lines() {
        let buffer = bullet_buffer("one\ntwo");
        assert_eq!(buffer.text(), "\u{2022} one\n\u{2022} two");
        assert_eq!(
            buffer.tags_at(0).into_iter().collect::<TagSet>(),
            bullet_tags(1)
        );
        assert!(buffer.has_tag_at(2, &TagKind::ListItem));
        assert!(buffer.has_tag_at(5, &TagKind::ListItem));
        assert!(buffer.has_tag_at(5, &TagKind::List));
        assert!(!buffer.has_tag_at(6, &TagKind::ListItem));
        assert_eq!(buffer.line_depth(1), 1);
    }

    #[test]
    fn test_enable_bullets_twice_is_noop() {
        let mut buffer = bullet_buffer("one\ntwo");
        let once = buffer.runs().to_vec();
        let len = buffer.len();
        buffer.enable_bullets(0, len);
        assert_eq!(buffer.runs(), once.as_slice());
    }

    #[test]
    fn test_disable_bullets_on_plain_text_is_noop() {
        let mut buffer = NoteBuffer::with_text("plain\ntext");
        buffer.apply_tag(&TagKind::Bold, 0, 5);
        let before = buffer.runs().to_vec();
        buffer.disable_bullets(0, 10);
        assert_eq!(buffer.runs(), before.as_slice());
    }

    #[test]
    fn test_disable_bullets_restores_text() {
        let mut buffer = bullet_buffer("one\ntwo");
        let len = buffer.len();
        buffer.disable_bullets(0, len);
        assert_eq!(buffer.text(), "one\ntwo");
        assert_eq!(buffer.runs().len(), 1);
    }

    #[test]
    fn test_increase_and_decrease_indent() {
        let mut buffer = bullet_buffer("a\nb");
        buffer.increase_indent(4, 4);
        assert_eq!(buffer.text(), "\u{2022} a\n\u{2218} b");
        assert_eq!(buffer.line_depth(0), 1);
        assert_eq!(buffer.line_depth(1), 2);

        buffer.decrease_indent(4, 4);
        assert_eq!(buffer.line_depth(1), 1);
        buffer.decrease_indent(4, 4);
        assert_eq!(buffer.line_depth(1), 0);
        assert_eq!(buffer.text(), "\u{2022} a\nb");
        assert!(!buffer.has_tag_at(4, &TagKind::List));
    }

    #[test]
    fn test_enter_continues_list() {
        let mut buffer = bullet_buffer("item");
        buffer.place_cursor(6);
        buffer.handle_return();
        assert_eq!(buffer.text(), "\u{2022} item\n\u{2022} ");
        assert_eq!(buffer.cursor(), 9);
        assert!(buffer.active_tags().contains(&TagKind::ListItem));
    }

    #[test]
    fn test_enter_on_empty_item_leaves_list() {
        let mut buffer = bullet_buffer("item");
        buffer.place_cursor(6);
        buffer.handle_return();
        buffer.handle_return();
        assert_eq!(buffer.text(), "\u{2022} item\n");
        assert_eq!(buffer.line_depth(1), 0);
        assert!(!buffer.active_tags().contains(&TagKind::ListItem));
    }

    #[test]
    fn test_enter_keeps_inline_tags() {
        let mut buffer = bullet_buffer("item");
        buffer.apply_tag(&TagKind::Italic, 2, 6);
        buffer.place_cursor(6);
        buffer.handle_return();
        buffer.insert_at_cursor("next");
        assert!(buffer.has_tag_at(9, &TagKind::Italic));
        assert!(buffer.has_tag_at(9, &TagKind::ListItem));
        assert!(!buffer.has_tag_at(7, &TagKind::Italic));
    }

    #[test]
    fn test_backspace_after_bullet_outdents() {
        let mut buffer = bullet_buffer("a\nb");
        buffer.increase_indent(4, 4);
        buffer.place_cursor(6);
        buffer.backspace();
        assert_eq!(buffer.line_depth(1), 1);
        assert_eq!(buffer.text(), "\u{2022} a\n\u{2022} b");
        assert_eq!(buffer.cursor(), 6);
    }

    #[test]
    fn test_backspace_deletes_grapheme() {
        let mut buffer = NoteBuffer::with_text("cafe\u{301}");
        buffer.place_cursor(5);
        buffer.backspace();
        assert_eq!(buffer.text(), "caf");
    }

    #[test]
    fn test_delete_at_line_end_outdents_next_bullet() {
        let mut buffer = NoteBuffer::with_text("plain\nitem");
        buffer.enable_bullets(6, 6);
        buffer.place_cursor(5);
        buffer.delete_forward();
        assert_eq!(buffer.text(), "plain\nitem");
        assert_eq!(buffer.line_depth(1), 0);
    }

    #[test]
    fn test_augment_selection_skips_bullet() {
        let buffer = bullet_buffer("one\ntwo");
        assert_eq!(buffer.augment_selection(1, 7), (2, 8));
        assert_eq!(buffer.augment_selection(0, 3), (0, 3));
    }

    #[test]
    fn test_delete_selection_into_bullet_line() {
        let mut buffer = NoteBuffer::with_text("title\nitem");
        buffer.enable_bullets(6, 6);
        buffer.select_range(3, 7);
        buffer.backspace();
        assert_eq!(buffer.text(), "titem");
        assert_eq!(buffer.line_depth(0), 0);
        assert!(!buffer.has_tag_at(3, &TagKind::ListItem));
    }

    #[test]
    fn test_append_lines() {
        let mut buffer = NoteBuffer::with_text("Todo");
        buffer.append_line("- call home");
        buffer.append_line("- buy milk");
        buffer.append_line("that's it");
        assert_eq!(
            buffer.text(),
            "Todo\n\u{2022} call home\n\u{2022} buy milk\nthat's it"
        );
        assert_eq!(buffer.line_depth(2), 1);
        assert_eq!(buffer.line_depth(3), 0);
        assert!(!buffer.has_tag_at(buffer.line_start(3), &TagKind::ListItem));
    }

    #[test]
    fn test_typing_never_lands_inside_bullet() {
        let mut buffer = bullet_buffer("x");
        buffer.place_cursor(1);
        buffer.insert_at_cursor("y");
        assert_eq!(buffer.text(), "\u{2022} yx");
    }
}
