//! Immutable results of statement execution.

use std::ops::Index;

/// The values produced by one statement execution.
///
/// A query yields one value per mapped row; an update yields a single
/// count or key. The container is immutable once built and is handed to the
/// caller by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult<T> {
    rows: Vec<T>,
}

impl<T> QueryResult<T> {
    pub(crate) fn new(rows: Vec<T>) -> Self {
        Self { rows }
    }

    pub(crate) fn single(value: T) -> Self {
        Self { rows: vec![value] }
    }

    /// The first value, or `None` if there are none.
    pub fn first(&self) -> Option<&T> {
        self.rows.first()
    }

    /// All values, in statement order.
    pub fn as_slice(&self) -> &[T] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    /// Take the first value, discarding the rest.
    pub fn into_first(self) -> Option<T> {
        self.rows.into_iter().next()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.rows
    }
}

impl<T> Index<usize> for QueryResult<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.rows[index]
    }
}

impl<T> IntoIterator for QueryResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a QueryResult<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
