use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Append-only log that keeps at most `cap` entries, evicting the oldest.
///
/// The capacity is supplied per call rather than stored, so the serialized
/// form is a plain JSON array and a stored record can be re-capped on load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
}

impl<T> Default for BoundedLog<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<T> BoundedLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends `value`, returning the entries evicted to stay within `cap`.
    pub fn push(&mut self, value: T, cap: usize) -> Vec<T> {
        self.entries.push_back(value);
        self.enforce_cap(cap)
    }

    /// Drops the oldest entries until at most `cap` remain.
    pub fn enforce_cap(&mut self, cap: usize) -> Vec<T> {
        let cap = cap.max(1);
        let overflow = self.entries.len().saturating_sub(cap);
        self.entries.drain(..overflow).collect()
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip)
    }
}

impl<T> FromIterator<T> for BoundedLog<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
