use std::fmt;

use crate::StoreError;

/// Characters the remote store refuses inside a single path segment.
const FORBIDDEN: &[char] = &['/', '.', '#', '$', '[', ']'];

/// A validated, slash-free sequence of node names addressing one node in the tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `a/b/c`. Leading, trailing and repeated slashes are ignored.
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(Self::root(), |acc, segment| acc.child(segment))
    }

    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        validate_segment(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    pub fn join(&self, other: &StorePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment, which is also the key of the addressed node.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

fn validate_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty()
        || segment.contains(FORBIDDEN)
        || segment.chars().any(|c| c.is_ascii_control())
    {
        return Err(StoreError::InvalidPath(segment.to_string()));
    }
    Ok(())
}
