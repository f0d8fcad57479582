// Link Handler
// Finds URLs and titles of other notes in note text and marks them with
// link tags.

use std::sync::LazyLock;

use regex::Regex;

use crate::richtext::{LinkKind, NoteBuffer, TagKind};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:(?:https?|ftp|file)://|mailto:|www\.)[^\s<>"]*[^\s<>"'.,;:!?)]"#)
        .expect("URL pattern is valid")
});

/// A link found in text. Offsets are in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

fn to_char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

fn link_match(text: &str, start: usize, end: usize) -> LinkMatch {
    LinkMatch {
        start: to_char_offset(text, start),
        end: to_char_offset(text, end),
        text: text[start..end].to_string(),
    }
}

/// All URLs in `text`, in order
pub fn find_urls(text: &str) -> Vec<LinkMatch> {
    URL_RE
        .find_iter(text)
        .map(|m| link_match(text, m.start(), m.end()))
        .collect()
}

/// Case-insensitive occurrences of any of `titles` in `text`.
/// Longer titles win where matches overlap.
pub fn find_titles(text: &str, titles: &[&str]) -> Vec<LinkMatch> {
    let mut found = Vec::new();
    for title in titles.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        let pattern = format!("(?i){}", regex::escape(title));
        let Ok(re) = Regex::new(&pattern) else {
            tracing::warn!(title, "cannot search for note title");
            continue;
        };
        found.extend(re.find_iter(text).map(|m| link_match(text, m.start(), m.end())));
    }
    found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut links: Vec<LinkMatch> = Vec::new();
    for link in found {
        if links.last().is_none_or(|last| link.start >= last.end) {
            links.push(link);
        }
    }
    links
}

/// Find link at a specific character position
pub fn find_link_at_position(links: &[LinkMatch], pos: usize) -> Option<&LinkMatch> {
    links.iter().find(|link| pos >= link.start && pos < link.end)
}

impl NoteBuffer {
    /// Re-tag every URL in the buffer with `link:url`
    pub fn highlight_urls(&mut self) {
        let url = TagKind::Link(LinkKind::Url);
        let len = self.len();
        self.remove_tag(&url, 0, len);
        for link in find_urls(&self.text()) {
            self.apply_tag(&url, link.start, link.end);
        }
    }

    /// Re-tag mentions of other notes' titles with `link:internal`.
    /// The first line is this note's own title and is never linked.
    pub fn link_note_titles(&mut self, titles: &[&str]) {
        let internal = TagKind::Link(LinkKind::Internal);
        let url = TagKind::Link(LinkKind::Url);
        let start = self.line_end_with_newline(0);
        let len = self.len();
        self.remove_tag(&internal, start, len);
        let body = self.slice(start, len);
        for link in find_titles(&body, titles) {
            let (a, b) = (start + link.start, start + link.end);
            if (a..b).any(|pos| self.has_tag_at(pos, &url)) {
                continue;
            }
            self.apply_tag(&internal, a, b);
        }
    }

    /// The link covering `pos` and its complete text
    pub fn link_at(&self, pos: usize) -> Option<(LinkKind, String)> {
        let kind = self.tag_set_at(pos).into_iter().find_map(|tag| match tag {
            TagKind::Link(kind) => Some(kind),
            _ => None,
        })?;
        let tag = TagKind::Link(kind);
        let mut start = pos;
        while start > 0 && self.has_tag_at(start - 1, &tag) {
            start -= 1;
        }
        let mut end = pos;
        while end < self.len() && self.has_tag_at(end, &tag) {
            end += 1;
        }
        Some((kind, self.slice(start, end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_urls() {
        let links = find_urls("See https://example.com/a?b=1, or www.tomboy.org.");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text, "https://example.com/a?b=1");
        assert_eq!(links[0].start, 4);
        assert_eq!(links[1].text, "www.tomboy.org");
    }

    #[test]
    fn test_url_offsets_are_characters() {
        let links = find_urls("gr\u{fc}n: mailto:a@b.c");
        assert_eq!(links[0].start, 6);
        assert_eq!(links[0].end, 18);
    }

    #[test]
    fn test_find_titles_prefers_longer() {
        let links = find_titles("the shopping list and SHOPPING", &["Shopping", "Shopping List"]);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text, "shopping list");
        assert_eq!(links[1].text, "SHOPPING");
    }

    #[test]
    fn test_find_link_at_position() {
        let links = find_urls("go to http://a.b now");
        assert!(find_link_at_position(&links, 6).is_some());
        assert!(find_link_at_position(&links, 16).is_none());
    }

    #[test]
    fn test_highlight_urls() {
        let mut buffer = NoteBuffer::with_text("Links\nvisit http://x.org today");
        buffer.highlight_urls();
        assert_eq!(
            buffer.link_at(15),
            Some((LinkKind::Url, "http://x.org".to_string()))
        );
        assert_eq!(buffer.link_at(5), None);
    }

    #[test]
    fn test_link_note_titles_skips_first_line() {
        let mut buffer = NoteBuffer::with_text("Groceries\nsee groceries and Recipes");
        buffer.link_note_titles(&["Groceries", "Recipes"]);
        assert!(!buffer.has_tag_at(0, &TagKind::Link(LinkKind::Internal)));
        assert_eq!(
            buffer.link_at(15),
            Some((LinkKind::Internal, "groceries".to_string()))
        );
        assert_eq!(
            buffer.link_at(30),
            Some((LinkKind::Internal, "Recipes".to_string()))
        );
    }
}
