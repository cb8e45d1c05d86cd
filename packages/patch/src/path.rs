//! Structured patch paths.
//!
//! A path is an ordered list of segments addressing a location in a
//! tree's JSON state. Segment-wise prefix comparison is what the
//! monitor uses to classify a mutation as belonging to a mounted
//! shared-model region; no string parsing happens at capture time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of a patch target inside a tree's state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchPath {
    segments: Vec<String>,
}

impl PatchPath {
    /// The root of the state tree (empty path).
    pub fn root() -> Self {
        Self { segments: vec![] }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse `/a/b/0` notation. Exists for call-site ergonomics and
    /// tests; runtime classification never parses strings.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Child path with one more segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Segment-wise prefix test: does `self` lie at or under `prefix`?
    pub fn starts_with(&self, prefix: &PatchPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Split into parent path and final segment. `None` at the root.
    pub fn split_last(&self) -> Option<(PatchPath, &str)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            PatchPath {
                segments: parent.to_vec(),
            },
            last.as_str(),
        ))
    }
}

impl fmt::Display for PatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}
