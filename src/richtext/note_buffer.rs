// Note Buffer
// The rich-text document of one note: an ordered sequence of tagged text runs
// plus the cursor, the selection and the tags that apply to the next typed text.

use std::cmp::{max, min};

use super::tags::{BULLET_LEN, TagKind, TagSet, TagTable, depth_of, is_depth_tag};

/// A maximal piece of text sharing one set of tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub tags: TagSet,
}

impl TextRun {
    pub fn new(text: impl Into<String>, tags: TagSet) -> Self {
        TextRun {
            text: text.into(),
            tags,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, TagSet::new())
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn has_tag(&self, kind: &TagKind) -> bool {
        self.tags.contains(kind)
    }

    /// Split this run at the given character offset
    /// Returns (left_run, right_run)
    pub fn split_at(&self, offset: usize) -> (TextRun, TextRun) {
        let (left, right) = self.text.split_at(byte_offset(&self.text, offset));
        (
            TextRun::new(left, self.tags.clone()),
            TextRun::new(right, self.tags.clone()),
        )
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn shift_on_insert(mark: usize, pos: usize, count: usize) -> usize {
    if mark >= pos { mark + count } else { mark }
}

fn shift_on_delete(mark: usize, start: usize, end: usize) -> usize {
    if mark >= end {
        mark - (end - start)
    } else {
        min(mark, start)
    }
}

/// The document buffer of a note.
///
/// Positions are character offsets in `[0, len]`. Passing anything outside
/// that range is a programming error and panics.
#[derive(Debug, Clone, Default)]
pub struct NoteBuffer {
    runs: Vec<TextRun>,
    /// Total length in characters
    length: usize,
    table: TagTable,
    cursor: usize,
    selection_bound: usize,
    active_tags: TagSet,
}

impl NoteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding plain, untagged text
    pub fn with_text(text: &str) -> Self {
        let mut buffer = Self::new();
        buffer.insert(0, text);
        buffer
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn tag_table(&self) -> &TagTable {
        &self.table
    }

    pub fn tag_table_mut(&mut self) -> &mut TagTable {
        &mut self.table
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.runs.iter().flat_map(|r| r.text.chars())
    }

    /// Characters from `start` on, each with the tags of its run
    pub(crate) fn chars_with_tags(
        &self,
        start: usize,
    ) -> impl Iterator<Item = (char, &TagSet)> + '_ {
        self.runs
            .iter()
            .flat_map(|run| run.text.chars().map(move |c| (c, &run.tags)))
            .skip(start)
    }

    /// Text in [start..end)
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.check_range(start, end);
        self.chars().skip(start).take(end - start).collect()
    }

    pub fn char_at(&self, pos: usize) -> Option<char> {
        let (index, offset) = self.locate(pos)?;
        self.runs[index].text.chars().nth(offset)
    }

    /// Run index and offset inside that run for the character at `pos`
    fn locate(&self, pos: usize) -> Option<(usize, usize)> {
        let mut start = 0;
        for (i, run) in self.runs.iter().enumerate() {
            let len = run.len();
            if pos < start + len {
                return Some((i, pos - start));
            }
            start += len;
        }
        None
    }

    fn run_at(&self, pos: usize) -> Option<&TextRun> {
        self.locate(pos).map(|(index, _)| &self.runs[index])
    }

    fn check_position(&self, pos: usize) {
        let len = self.len();
        assert!(
            pos <= len,
            "position {pos} is outside the buffer (length {len})"
        );
    }

    fn check_range(&self, start: usize, end: usize) {
        assert!(start <= end, "range {start}..{end} is reversed");
        self.check_position(end);
    }

    /// Make sure a run boundary exists at `pos`.
    /// Returns the index of the run starting there (or the run count at the end).
    fn split_at(&mut self, pos: usize) -> usize {
        let mut start = 0;
        for i in 0..self.runs.len() {
            if start == pos {
                return i;
            }
            let len = self.runs[i].len();
            if pos < start + len {
                let (left, right) = self.runs[i].split_at(pos - start);
                self.runs[i] = left;
                self.runs.insert(i + 1, right);
                return i + 1;
            }
            start += len;
        }
        self.runs.len()
    }

    /// Drop empty runs and merge neighbours with identical tags
    fn normalize(&mut self) {
        let mut merged: Vec<TextRun> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.tags == run.tags => last.text.push_str(&run.text),
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }

    /// Insert plain text at `pos`
    pub fn insert(&mut self, pos: usize, text: &str) {
        self.insert_tag_set(pos, text, TagSet::new());
    }

    /// Insert text carrying exactly `tags` at `pos`
    pub fn insert_with_tags(&mut self, pos: usize, text: &str, tags: &[TagKind]) {
        self.insert_tag_set(pos, text, tags.iter().cloned().collect());
    }

    pub(crate) fn insert_tag_set(&mut self, pos: usize, text: &str, tags: TagSet) {
        self.check_position(pos);
        if text.is_empty() {
            return;
        }
        for tag in &tags {
            self.table.get_or_create(tag);
        }
        let count = text.chars().count();
        let index = self.split_at(pos);
        self.runs.insert(index, TextRun::new(text, tags));
        self.normalize();
        self.length += count;
        self.cursor = shift_on_insert(self.cursor, pos, count);
        self.selection_bound = shift_on_insert(self.selection_bound, pos, count);
    }

    /// Insert at the end of the buffer without searching for the position
    pub(crate) fn append_tag_set(&mut self, text: &str, tags: TagSet) {
        if text.is_empty() {
            return;
        }
        for tag in &tags {
            self.table.get_or_create(tag);
        }
        let pos = self.length;
        let count = text.chars().count();
        match self.runs.last_mut() {
            Some(last) if last.tags == tags => last.text.push_str(text),
            _ => self.runs.push(TextRun::new(text, tags)),
        }
        self.length += count;
        self.cursor = shift_on_insert(self.cursor, pos, count);
        self.selection_bound = shift_on_insert(self.selection_bound, pos, count);
    }

    /// True when the buffer is empty or ends with a newline
    pub(crate) fn ends_at_line_start(&self) -> bool {
        self.runs.last().is_none_or(|run| run.text.ends_with('\n'))
    }

    /// Delete the text in [start..end)
    pub fn delete(&mut self, start: usize, end: usize) {
        self.check_range(start, end);
        if start == end {
            return;
        }
        let first = self.split_at(start);
        let last = self.split_at(end);
        self.runs.drain(first..last);
        self.normalize();
        self.length -= end - start;
        self.cursor = shift_on_delete(self.cursor, start, end);
        self.selection_bound = shift_on_delete(self.selection_bound, start, end);
    }

    fn update_runs<F>(&mut self, start: usize, end: usize, mut update: F)
    where
        F: FnMut(&mut TagSet),
    {
        self.check_range(start, end);
        if start == end {
            return;
        }
        let first = self.split_at(start);
        let last = self.split_at(end);
        for run in &mut self.runs[first..last] {
            update(&mut run.tags);
        }
        self.normalize();
    }

    /// Recompute the tags of every character in [start..end), in order.
    /// The text itself is left alone.
    pub(crate) fn restyle<F>(&mut self, start: usize, end: usize, mut style: F)
    where
        F: FnMut(char, &TagSet) -> TagSet,
    {
        self.check_range(start, end);
        if start == end {
            return;
        }
        let first = self.split_at(start);
        let last = self.split_at(end);
        let mut restyled: Vec<TextRun> = Vec::new();
        for run in &self.runs[first..last] {
            for c in run.text.chars() {
                let tags = style(c, &run.tags);
                match restyled.last_mut() {
                    Some(previous) if previous.tags == tags => previous.text.push(c),
                    _ => restyled.push(TextRun::new(c.to_string(), tags)),
                }
            }
        }
        for run in &restyled {
            for tag in &run.tags {
                self.table.get_or_create(tag);
            }
        }
        self.runs.splice(first..last, restyled);
        self.normalize();
    }

    /// Apply `kind` to [start..end). Applying a present tag changes nothing.
    ///
    /// A depth tag replaces any other depth tag in the range. Bullet glyphs
    /// only ever carry list tags, so other tags skip them.
    pub fn apply_tag(&mut self, kind: &TagKind, start: usize, end: usize) {
        self.table.get_or_create(kind);
        let exclusive = is_depth_tag(kind);
        let structural = kind.is_structural();
        self.update_runs(start, end, |tags| {
            if !structural && tags.iter().any(is_depth_tag) {
                return;
            }
            if exclusive {
                tags.retain(|t| !is_depth_tag(t));
            }
            tags.insert(kind.clone());
        });
    }

    /// Remove `kind` from [start..end). Removing an absent tag changes nothing.
    pub fn remove_tag(&mut self, kind: &TagKind, start: usize, end: usize) {
        self.update_runs(start, end, |tags| {
            tags.remove(kind);
        });
    }

    pub fn remove_tags_matching<P>(&mut self, start: usize, end: usize, predicate: P)
    where
        P: Fn(&TagKind) -> bool,
    {
        self.update_runs(start, end, |tags| tags.retain(|t| !predicate(t)));
    }

    pub fn remove_all_tags(&mut self, start: usize, end: usize) {
        self.update_runs(start, end, |tags| tags.clear());
    }

    /// Tags on the character at `pos` (unordered); empty at the end of the buffer
    pub fn tag_set_at(&self, pos: usize) -> TagSet {
        self.run_at(pos).map(|r| r.tags.clone()).unwrap_or_default()
    }

    pub fn has_tag_at(&self, pos: usize, kind: &TagKind) -> bool {
        self.run_at(pos).is_some_and(|r| r.has_tag(kind))
    }

    /// Tags on the character at `pos`, ordered by descending priority
    pub fn tags_at(&self, pos: usize) -> Vec<TagKind> {
        self.check_position(pos);
        let mut tags: Vec<TagKind> = self.tag_set_at(pos).into_iter().collect();
        self.table.sort_by_priority(&mut tags);
        tags
    }

    /// Tags that start (`opening`) or end (`!opening`) exactly at `pos`,
    /// ordered by descending priority
    pub fn toggled_tags(&self, pos: usize, opening: bool) -> Vec<TagKind> {
        self.check_position(pos);
        let before = if pos == 0 {
            TagSet::new()
        } else {
            self.tag_set_at(pos - 1)
        };
        let after = self.tag_set_at(pos);
        let mut tags: Vec<TagKind> = if opening {
            after.difference(&before).cloned().collect()
        } else {
            before.difference(&after).cloned().collect()
        };
        self.table.sort_by_priority(&mut tags);
        tags
    }

    /// The next position after `pos` where some tag starts or ends
    pub fn next_toggle(&self, pos: usize) -> usize {
        let mut start = 0;
        for run in &self.runs {
            let end = start + run.len();
            if pos < end {
                return end;
            }
            start = end;
        }
        start
    }

    /// Nesting level of the depth tag on the character at `pos`, 0 if none
    pub fn depth_at(&self, pos: usize) -> u32 {
        self.run_at(pos)
            .and_then(|r| r.tags.iter().find_map(depth_of))
            .unwrap_or(0)
    }

    /// True when every character of [start..end) carries `kind`.
    /// Bullet glyphs are not counted for tags they cannot carry.
    pub fn range_has_tag(&self, kind: &TagKind, start: usize, end: usize) -> bool {
        self.check_range(start, end);
        let structural = kind.is_structural();
        let mut run_start = 0;
        for run in &self.runs {
            let run_end = run_start + run.len();
            let glyph = !structural && run.tags.iter().any(is_depth_tag);
            if run_end > start && run_start < end && !glyph && !run.has_tag(kind) {
                return false;
            }
            run_start = run_end;
        }
        start < end
    }

    pub fn line_count(&self) -> usize {
        self.runs
            .iter()
            .map(|r| r.text.matches('\n').count())
            .sum::<usize>()
            + 1
    }

    /// Line number (0-based) of the position
    pub fn line_at(&self, pos: usize) -> usize {
        self.check_position(pos);
        self.chars().take(pos).filter(|c| *c == '\n').count()
    }

    /// Position of the first character of `line`
    pub fn line_start(&self, line: usize) -> usize {
        if line == 0 {
            return 0;
        }
        let mut seen = 0;
        for (i, c) in self.chars().enumerate() {
            if c == '\n' {
                seen += 1;
                if seen == line {
                    return i + 1;
                }
            }
        }
        self.len()
    }

    /// Position of the newline ending `line` (or the buffer end)
    pub fn line_end(&self, line: usize) -> usize {
        let start = self.line_start(line);
        self.chars()
            .skip(start)
            .position(|c| c == '\n')
            .map(|offset| start + offset)
            .unwrap_or_else(|| self.len())
    }

    /// Like `line_end`, but past the terminating newline
    pub fn line_end_with_newline(&self, line: usize) -> usize {
        let end = self.line_end(line);
        if end < self.len() { end + 1 } else { end }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The other end of the selection; equals the cursor without a selection
    pub fn selection_bound(&self) -> usize {
        self.selection_bound
    }

    /// Move the cursor, clear the selection and recompute the active tags
    pub fn place_cursor(&mut self, pos: usize) {
        self.check_position(pos);
        self.cursor = pos;
        self.selection_bound = pos;
        self.update_active_tags();
    }

    /// Select [start..end); the cursor ends up at `end`
    pub fn select_range(&mut self, start: usize, end: usize) {
        self.check_position(start);
        self.check_position(end);
        self.selection_bound = start;
        self.cursor = end;
        self.update_active_tags();
    }

    /// Ordered selection bounds, `None` without a selection
    pub fn selection_bounds(&self) -> Option<(usize, usize)> {
        if self.cursor == self.selection_bound {
            None
        } else {
            Some((
                min(self.cursor, self.selection_bound),
                max(self.cursor, self.selection_bound),
            ))
        }
    }

    pub fn has_selection(&self) -> bool {
        self.cursor != self.selection_bound
    }

    /// Move the cursor without touching the active tags
    pub(crate) fn move_cursor(&mut self, pos: usize) {
        self.check_position(pos);
        self.cursor = pos;
        self.selection_bound = pos;
    }

    /// Tags applied to the next text typed at the cursor
    pub fn active_tags(&self) -> &TagSet {
        &self.active_tags
    }

    pub(crate) fn set_active_tags(&mut self, tags: TagSet) {
        self.active_tags = tags;
    }

    /// Recompute the active tags from the text around the cursor.
    ///
    /// These are the tags continuing through or ending at the cursor, minus
    /// the per-line structural tags. `list`/`list-item` are added when the
    /// cursor sits past the bullet of a list line.
    pub fn update_active_tags(&mut self) {
        let cursor = self.cursor;
        let mut active: TagSet = self
            .tags_at(cursor)
            .into_iter()
            .filter(|tag| cursor > 0 && self.has_tag_at(cursor - 1, tag))
            .collect();
        active.extend(self.toggled_tags(cursor, false));
        active.retain(|tag| !tag.is_structural() && !matches!(tag, TagKind::Internal(_)));

        let line_start = self.line_start(self.line_at(cursor));
        if self.depth_at(line_start) > 0 && cursor >= line_start + BULLET_LEN {
            active.insert(TagKind::List);
            active.insert(TagKind::ListItem);
        }
        self.active_tags = active;
    }

    /// Toggle a formatting tag the way a toolbar button does.
    ///
    /// With a selection the tag is applied, or removed when the whole
    /// selection already carries it. Without one only the active tags change.
    pub fn toggle_tag(&mut self, kind: &TagKind) {
        match self.selection_bounds() {
            Some((start, end)) => {
                if self.range_has_tag(kind, start, end) {
                    self.remove_tag(kind, start, end);
                } else {
                    self.apply_tag(kind, start, end);
                }
                let (first, last) = (self.line_at(start), self.line_at(end));
                self.refresh_list_tags(first, last);
            }
            None => {
                if !self.active_tags.remove(kind) {
                    self.table.get_or_create(kind);
                    self.active_tags.insert(kind.clone());
                }
            }
        }
    }
}
