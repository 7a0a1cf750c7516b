//! Scope paths
//!
//! A node id is only unique among its siblings; the scope path (the id
//! sequence from the stack root) is what identifies a node globally.

use serde::{Deserialize, Serialize};

/// Path of ids from the stack root down to a node or composite.
///
/// The root composite has the empty path. Displayed as `a/b/c`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopePath(Vec<String>);

impl ScopePath {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Extend this path with a child id.
    pub fn child(&self, id: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(id.into());
        Self(segments)
    }

    /// Id segments, root first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The final segment, i.e. the node's own id.
    pub fn id(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Parent scope, or `None` for the root.
    pub fn parent(&self) -> Option<ScopePath> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ScopePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for ScopePath {
    fn from(segments: [S; N]) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }
}
