// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

/// Opaque identity of one upstream attempt's output.
///
/// Immutable and cheap to clone: the `path_component` is the only piece of
/// state that matters for equality, so it is kept behind an `Arc<str>`
/// rather than a `String` — a host session may carry the same identifier
/// into several places (the `remaining` list, a put-back call, a scheduler
/// lookup key) without repeated allocation.
#[derive(Debug, Clone)]
pub struct InputAttemptIdentifier {
    /// Stable path component used both in the fetch URL and in local-disk
    /// file paths.
    path_component: Arc<str>,
}

impl InputAttemptIdentifier {
    pub fn new(path_component: impl Into<Arc<str>>) -> Self {
        Self {
            path_component: path_component.into(),
        }
    }

    pub fn path_component(&self) -> &str {
        &self.path_component
    }
}

impl PartialEq for InputAttemptIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.path_component == other.path_component
    }
}
impl Eq for InputAttemptIdentifier {}

impl std::hash::Hash for InputAttemptIdentifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.path_component.hash(state);
    }
}

impl std::fmt::Display for InputAttemptIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path_component)
    }
}
