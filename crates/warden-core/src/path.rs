//! Dotted paths addressing locations in the state tree.
//!
//! A [`Path`] is an ordered sequence of key segments (`a.b.c`). Paths are
//! the unit of addressing for zone contracts, guard resolution, and
//! merges. The empty path addresses the tree root.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

/// Separator between path segments in the textual form.
pub const SEPARATOR: char = '.';

/// An ordered sequence of key segments identifying a state tree location.
///
/// Paths are cheap to clone for typical depths (the segment list is
/// inline up to four segments). Segment strings are non-empty and never
/// contain the separator; [`Path::parse`] enforces both.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: SmallVec<[String; 4]>,
}

impl Path {
    /// The root path (zero segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path string.
    ///
    /// An empty string parses to the root path. Empty segments (leading,
    /// trailing, or doubled separators) are rejected.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = SmallVec::new();
        for (index, seg) in s.split(SEPARATOR).enumerate() {
            if seg.is_empty() {
                return Err(PathError::EmptySegment {
                    text: s.to_string(),
                    index,
                });
            }
            segments.push(seg.to_string());
        }
        Ok(Self { segments })
    }

    /// Build a path from an iterator of segment strings.
    ///
    /// Intended for programmatic construction; segments are taken as-is.
    pub fn from_segments<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }

    /// The key segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (the path depth).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// This path extended by one child segment.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    /// This path extended by all of `suffix`'s segments.
    pub fn join(&self, suffix: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(suffix.segments.iter().cloned());
        Self { segments }
    }

    /// The path with the last segment removed, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    /// The last segment, or `None` at the root.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Whether `prefix` is a (non-strict) prefix of this path.
    ///
    /// Every path starts with the root path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        prefix.segments.len() <= self.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// The segments remaining after stripping `prefix`, or `None` if
    /// `prefix` is not a prefix of this path.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Self> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(Self {
            segments: self.segments[prefix.segments.len()..]
                .iter()
                .cloned()
                .collect(),
        })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "<root>");
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Errors from parsing a textual path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathError {
    /// The text contains an empty segment (leading, trailing, or doubled
    /// separator).
    EmptySegment {
        /// The offending path text.
        text: String,
        /// Zero-based index of the empty segment.
        index: usize,
    },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySegment { text, index } => {
                write!(f, "empty segment {index} in path '{text}'")
            }
        }
    }
}

impl Error for PathError {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_simple() {
        let p = Path::parse("a.b.c").unwrap();
        assert_eq!(p.depth(), 3);
        assert_eq!(p.segments(), &["a", "b", "c"]);
        assert_eq!(p.leaf(), Some("c"));
    }

    #[test]
    fn empty_string_is_root() {
        let p = Path::parse("").unwrap();
        assert!(p.is_root());
        assert_eq!(p.parent(), None);
    }

    #[test]
    fn empty_segments_rejected() {
        assert!(Path::parse(".a").is_err());
        assert!(Path::parse("a.").is_err());
        assert!(Path::parse("a..b").is_err());
    }

    #[test]
    fn prefix_relations() {
        let p = Path::parse("a.b.c").unwrap();
        assert!(p.starts_with(&Path::root()));
        assert!(p.starts_with(&Path::parse("a.b").unwrap()));
        assert!(!p.starts_with(&Path::parse("a.x").unwrap()));
        assert!(!Path::parse("a").unwrap().starts_with(&p));
    }

    #[test]
    fn strip_prefix_leaves_suffix() {
        let p = Path::parse("a.b.c").unwrap();
        let suffix = p.strip_prefix(&Path::parse("a").unwrap()).unwrap();
        assert_eq!(suffix, Path::parse("b.c").unwrap());
        assert!(p.strip_prefix(&Path::parse("x").unwrap()).is_none());
    }

    fn arb_segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,8}".prop_map(|s| s)
    }

    fn arb_path() -> impl Strategy<Value = Path> {
        prop::collection::vec(arb_segment(), 0..6).prop_map(Path::from_segments)
    }

    proptest! {
        #[test]
        fn display_parse_round_trip(p in arb_path()) {
            prop_assume!(!p.is_root());
            let parsed = Path::parse(&p.to_string()).unwrap();
            prop_assert_eq!(parsed, p);
        }

        #[test]
        fn child_extends_depth(p in arb_path(), seg in arb_segment()) {
            let c = p.child(&seg);
            prop_assert_eq!(c.depth(), p.depth() + 1);
            prop_assert!(c.starts_with(&p));
            prop_assert_eq!(c.parent().unwrap(), p);
        }

        #[test]
        fn join_then_strip(a in arb_path(), b in arb_path()) {
            let joined = a.join(&b);
            prop_assert!(joined.starts_with(&a));
            prop_assert_eq!(joined.strip_prefix(&a).unwrap(), b);
        }

        #[test]
        fn starts_with_reflexive(p in arb_path()) {
            prop_assert!(p.starts_with(&p));
        }
    }
}
