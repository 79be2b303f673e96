use std::fmt;

use serde::{Deserialize, Serialize};

/// One step inside a token's value sub-structure
///
/// Object members are addressed by key, array elements by index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSegment {
    /// Object member key
    Key(String),
    /// Array element index
    Index(usize),
}

impl From<&str> for ValueSegment {
    fn from(key: &str) -> Self {
        ValueSegment::Key(key.to_string())
    }
}

impl From<usize> for ValueSegment {
    fn from(index: usize) -> Self {
        ValueSegment::Index(index)
    }
}

/// ValuePath - a position inside a token's value
///
/// The empty path addresses the whole value; this is how a top-level
/// alias is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValuePath {
    segments: Vec<ValueSegment>,
}

impl ValuePath {
    /// The empty path, addressing the whole value
    pub fn root() -> Self {
        Self::default()
    }

    /// Create a ValuePath from its segments
    pub fn new(segments: Vec<ValueSegment>) -> Self {
        Self { segments }
    }

    /// The path segments, outermost first
    pub fn segments(&self) -> &[ValueSegment] {
        &self.segments
    }

    /// True when the path addresses the whole value
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Extend the path with one more segment
    pub fn join(&self, segment: impl Into<ValueSegment>) -> ValuePath {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        ValuePath { segments }
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                ValueSegment::Key(key) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", key)?;
                }
                ValueSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl From<Vec<ValueSegment>> for ValuePath {
    fn from(segments: Vec<ValueSegment>) -> Self {
        Self { segments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_empty() {
        assert!(ValuePath::root().is_root());
        assert!(!ValuePath::root().join("color").is_root());
    }

    #[test]
    fn test_display_mixed_segments() {
        let path = ValuePath::root().join("shadows").join(0).join("color");
        assert_eq!(path.to_string(), "shadows[0].color");
    }

    #[test]
    fn test_serde_mixed_segments() {
        let path = ValuePath::root().join("a").join(2);
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json, serde_json::json!(["a", 2]));
        let back: ValuePath = serde_json::from_value(json).unwrap();
        assert_eq!(back, path);
    }
}
