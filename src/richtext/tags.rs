// Tag Model
// The fixed vocabulary of formatting markers a note can carry and the
// priority table that decides how simultaneously applied markers nest.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Glyphs used for bullets, rotating with the nesting depth.
const BULLETS: [&str; 3] = ["\u{2022} ", "\u{2218} ", "\u{2023} "];

/// Every bullet occupies this many characters at the start of its line.
pub const BULLET_LEN: usize = 2;

/// Left margin hint (in pixels) per nesting level of a depth tag
const MARGIN_PER_DEPTH: u32 = 25;

const DEPTH_PREFIX: &str = "depth:";
const INTERNAL_PREFIX: char = '_';

/// A set of tags applied to one run of text
pub type TagSet = BTreeSet<TagKind>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkKind {
    Internal,
    Url,
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SizeScale {
    Small,
    Large,
    Huge,
}

/// Identity of a formatting tag.
///
/// The XML element names only appear at the boundary (`from_name` / `name`);
/// everything else matches on the variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagKind {
    Bold,
    Italic,
    Strikethrough,
    Underline,
    Monospace,
    Highlight,
    Size(SizeScale),
    Link(LinkKind),
    /// Spans a contiguous block of bullet lines
    List,
    /// Spans the content of one bullet line (never the bullet itself)
    ListItem,
    /// Marks the bullet glyph of a line at nesting level N (N >= 1)
    Depth(u32),
    /// Private marker, never written to XML
    Internal(String),
    /// Unrecognized element read from a note, written back unchanged
    Other(String),
}

impl TagKind {
    pub fn from_name(name: &str) -> TagKind {
        match name {
            "bold" => TagKind::Bold,
            "italic" => TagKind::Italic,
            "strikethrough" => TagKind::Strikethrough,
            "underline" => TagKind::Underline,
            "monospace" => TagKind::Monospace,
            "highlight" => TagKind::Highlight,
            "size:small" => TagKind::Size(SizeScale::Small),
            "size:large" => TagKind::Size(SizeScale::Large),
            "size:huge" => TagKind::Size(SizeScale::Huge),
            "link:internal" => TagKind::Link(LinkKind::Internal),
            "link:url" => TagKind::Link(LinkKind::Url),
            "link:broken" => TagKind::Link(LinkKind::Broken),
            "list" => TagKind::List,
            "list-item" => TagKind::ListItem,
            _ => {
                let depth = name
                    .strip_prefix(DEPTH_PREFIX)
                    .and_then(|n| n.parse::<u32>().ok())
                    .filter(|d| *d > 0);
                match depth {
                    Some(depth) => TagKind::Depth(depth),
                    None if name.starts_with(INTERNAL_PREFIX) => {
                        TagKind::Internal(name.to_string())
                    }
                    None => TagKind::Other(name.to_string()),
                }
            }
        }
    }

    pub fn name(&self) -> Cow<'_, str> {
        let name = match self {
            TagKind::Bold => "bold",
            TagKind::Italic => "italic",
            TagKind::Strikethrough => "strikethrough",
            TagKind::Underline => "underline",
            TagKind::Monospace => "monospace",
            TagKind::Highlight => "highlight",
            TagKind::Size(SizeScale::Small) => "size:small",
            TagKind::Size(SizeScale::Large) => "size:large",
            TagKind::Size(SizeScale::Huge) => "size:huge",
            TagKind::Link(LinkKind::Internal) => "link:internal",
            TagKind::Link(LinkKind::Url) => "link:url",
            TagKind::Link(LinkKind::Broken) => "link:broken",
            TagKind::List => "list",
            TagKind::ListItem => "list-item",
            TagKind::Depth(depth) => return Cow::Owned(format!("{DEPTH_PREFIX}{depth}")),
            TagKind::Internal(name) | TagKind::Other(name) => return Cow::Borrowed(name.as_str()),
        };
        Cow::Borrowed(name)
    }

    /// List, list-item and depth tags
    pub fn is_structural(&self) -> bool {
        matches!(self, TagKind::List | TagKind::ListItem | TagKind::Depth(_))
    }

    /// Tags that become plain nested XML elements inside note-content
    pub fn is_inline(&self) -> bool {
        !self.is_structural() && !matches!(self, TagKind::Internal(_))
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

pub fn is_depth_tag(tag: &TagKind) -> bool {
    matches!(tag, TagKind::Depth(_))
}

/// Nesting level of a depth tag, `None` for every other tag
pub fn depth_of(tag: &TagKind) -> Option<u32> {
    match tag {
        TagKind::Depth(depth) => Some(*depth),
        _ => None,
    }
}

/// The two-character bullet (glyph plus space) drawn for `depth`.
///
/// Panics when `depth` is 0: depth 0 means "not a list line".
pub fn bullet_glyph(depth: u32) -> &'static str {
    assert!(depth >= 1, "bullet requested for depth {depth}");
    BULLETS[((depth - 1) % 3) as usize]
}

/// A registered tag with its rendering attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub kind: TagKind,
    pub priority: u32,
    /// Left margin hint, only set for depth tags
    pub left_margin: Option<u32>,
}

/// Per-document cache of tags keyed by kind.
///
/// Priorities are unique: every new tag gets the next higher priority, and
/// `set_priority` shifts its neighbours the way GTK tag tables do.
#[derive(Debug, Clone)]
pub struct TagTable {
    tags: HashMap<TagKind, Tag>,
}

impl TagTable {
    pub fn new() -> Self {
        let mut table = TagTable {
            tags: HashMap::new(),
        };
        for kind in [
            TagKind::Bold,
            TagKind::Italic,
            TagKind::Strikethrough,
            TagKind::Underline,
            TagKind::Monospace,
            TagKind::Highlight,
            TagKind::Size(SizeScale::Small),
            TagKind::Size(SizeScale::Large),
            TagKind::Size(SizeScale::Huge),
            TagKind::Link(LinkKind::Internal),
            TagKind::Link(LinkKind::Url),
            TagKind::Link(LinkKind::Broken),
            TagKind::ListItem,
            TagKind::List,
        ] {
            table.register(kind, None);
        }
        table
    }

    fn register(&mut self, kind: TagKind, left_margin: Option<u32>) {
        let priority = self.tags.len() as u32;
        self.tags.insert(
            kind.clone(),
            Tag {
                kind,
                priority,
                left_margin,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn lookup(&self, kind: &TagKind) -> Option<&Tag> {
        self.tags.get(kind)
    }

    pub fn priority_of(&self, kind: &TagKind) -> Option<u32> {
        self.tags.get(kind).map(|tag| tag.priority)
    }

    /// Return the cached tag for `kind`, creating it on first use
    pub fn get_or_create(&mut self, kind: &TagKind) -> &Tag {
        if let TagKind::Depth(depth) = kind {
            return self.get_or_create_depth_tag(*depth);
        }
        if !self.tags.contains_key(kind) {
            tracing::trace!(tag = %kind, "creating tag");
            self.register(kind.clone(), None);
        }
        &self.tags[kind]
    }

    /// Return the structural tag for list nesting level `depth` (1-based).
    ///
    /// Creating a new depth tag moves `list` below all other list-related
    /// tags so item content always renders above it.
    pub fn get_or_create_depth_tag(&mut self, depth: u32) -> &Tag {
        assert!(depth >= 1, "depth tags start at 1, got {depth}");
        let kind = TagKind::Depth(depth);
        if !self.tags.contains_key(&kind) {
            tracing::trace!(depth, "creating depth tag");
            self.register(kind.clone(), Some(depth * MARGIN_PER_DEPTH));
            self.lower_list_priority();
        }
        &self.tags[&kind]
    }

    fn lower_list_priority(&mut self) {
        let lowest = self
            .tags
            .values()
            .filter(|tag| tag.kind.is_structural())
            .map(|tag| tag.priority)
            .min();
        if let Some(lowest) = lowest
            && self.priority_of(&TagKind::List) != Some(lowest)
        {
            self.set_priority(&TagKind::List, lowest);
        }
    }

    /// Move `kind` to `priority`, shifting the tags in between by one
    pub fn set_priority(&mut self, kind: &TagKind, priority: u32) {
        let Some(old) = self.priority_of(kind) else {
            return;
        };
        let priority = priority.min(self.tags.len().saturating_sub(1) as u32);
        for tag in self.tags.values_mut() {
            if priority < old && tag.priority >= priority && tag.priority < old {
                tag.priority += 1;
            } else if priority > old && tag.priority > old && tag.priority <= priority {
                tag.priority -= 1;
            }
        }
        if let Some(tag) = self.tags.get_mut(kind) {
            tag.priority = priority;
        }
    }

    /// Sort tags by descending priority.
    ///
    /// Panics when two of them share a priority: the table is inconsistent.
    pub fn sort_by_priority(&self, tags: &mut [TagKind]) {
        tags.sort_by_key(|tag| std::cmp::Reverse(self.priority_of(tag)));
        for pair in tags.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if self.priority_of(a) == self.priority_of(b) {
                tracing::error!(first = %a, second = %b, "tags share a priority");
                panic!("tags {a} and {b} share a priority");
            }
        }
    }
}

impl Default for TagTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for name in [
            "bold",
            "italic",
            "strikethrough",
            "highlight",
            "monospace",
            "size:small",
            "size:huge",
            "link:internal",
            "link:url",
            "list",
            "list-item",
            "depth:3",
            "_title",
            "datetime",
        ] {
            assert_eq!(TagKind::from_name(name).name(), name);
        }
    }

    #[test]
    fn test_name_classification() {
        assert_eq!(TagKind::from_name("depth:2"), TagKind::Depth(2));
        assert_eq!(
            TagKind::from_name("depth:0"),
            TagKind::Other("depth:0".to_string())
        );
        assert_eq!(
            TagKind::from_name("_private"),
            TagKind::Internal("_private".to_string())
        );
        assert!(!TagKind::Internal("_x".into()).is_inline());
        assert!(TagKind::Other("datetime".into()).is_inline());
        assert!(TagKind::Depth(1).is_structural());
    }

    #[test]
    fn test_bullet_glyph_rotates() {
        assert_eq!(bullet_glyph(1), "\u{2022} ");
        assert_eq!(bullet_glyph(2), "\u{2218} ");
        assert_eq!(bullet_glyph(3), "\u{2023} ");
        assert_eq!(bullet_glyph(4), bullet_glyph(1));
        assert_eq!(bullet_glyph(7).chars().count(), BULLET_LEN);
    }

    #[test]
    #[should_panic]
    fn test_bullet_glyph_rejects_depth_zero() {
        bullet_glyph(0);
    }

    #[test]
    fn test_depth_helpers() {
        assert!(is_depth_tag(&TagKind::Depth(4)));
        assert!(!is_depth_tag(&TagKind::List));
        assert_eq!(depth_of(&TagKind::Depth(4)), Some(4));
        assert_eq!(depth_of(&TagKind::Bold), None);
    }

    #[test]
    fn test_depth_tag_is_cached() {
        let mut table = TagTable::new();
        let count = table.len();
        let margin = table.get_or_create_depth_tag(2).left_margin;
        assert_eq!(margin, Some(2 * MARGIN_PER_DEPTH));
        table.get_or_create_depth_tag(2);
        assert_eq!(table.len(), count + 1);
    }

    #[test]
    fn test_list_sinks_below_list_related_tags() {
        let mut table = TagTable::new();
        table.get_or_create_depth_tag(1);
        table.get_or_create_depth_tag(2);
        let list = table.priority_of(&TagKind::List).unwrap();
        let item = table.priority_of(&TagKind::ListItem).unwrap();
        let depth = table.priority_of(&TagKind::Depth(2)).unwrap();
        assert!(list < item);
        assert!(list < depth);
    }

    #[test]
    fn test_priorities_stay_unique() {
        let mut table = TagTable::new();
        table.get_or_create(&TagKind::Other("datetime".into()));
        for depth in 1..5 {
            table.get_or_create_depth_tag(depth);
        }
        table.set_priority(&TagKind::Bold, 9);
        let mut seen: Vec<u32> = table.tags.values().map(|t| t.priority).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), table.len());
        assert_eq!(table.priority_of(&TagKind::Bold), Some(9));
    }

    #[test]
    fn test_sort_by_priority_descending() {
        let table = TagTable::new();
        let mut tags = vec![TagKind::Bold, TagKind::Highlight, TagKind::Italic];
        table.sort_by_priority(&mut tags);
        assert_eq!(
            tags,
            vec![TagKind::Highlight, TagKind::Italic, TagKind::Bold]
        );
    }
}
