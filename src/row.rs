//! Row model: a borrowed, callback-scoped view produced by a driver, and an
//! owned, deep-copied form produced when a row must outlive that callback or
//! cross a thread (spec.md §3, §4.1).

use std::sync::Arc;

use crate::value::{Value, ValueKind, ValueRef};

/// A row borrowed from a driver's in-flight result buffer.
///
/// Column names and values here are only valid for the duration of the
/// single [`crate::driver::RowSink::accept`] call that received this row.
/// There is no API to retain a `RowRef` past that call; callers that need
/// the data afterward must call [`RowRef::to_owned`].
pub struct RowRef<'a> {
    names: &'a [Arc<str>],
    values: Vec<ValueRef<'a>>,
}

impl<'a> RowRef<'a> {
    /// Builds a borrowed row. Panics if `names.len() != values.len()`,
    /// enforcing the `len(names) == len(values) == column_count` invariant
    /// (spec.md §3) at construction rather than leaving it to callers.
    pub fn new(names: &'a [Arc<str>], values: Vec<ValueRef<'a>>) -> Self {
        assert_eq!(
            names.len(),
            values.len(),
            "row column count mismatch: {} names, {} values",
            names.len(),
            values.len()
        );
        RowRef { names, values }
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    pub fn column_names(&self) -> &[Arc<str>] {
        self.names
    }

    pub fn get(&self, index: usize) -> Option<ValueRef<'a>> {
        self.values.get(index).copied()
    }

    pub fn get_by_name(&self, name: &str) -> Option<ValueRef<'a>> {
        self.names
            .iter()
            .position(|n| n.as_ref() == name)
            .and_then(|i| self.get(i))
    }

    /// Deep-copies every column into an owned [`Row`]. This is the dispatch
    /// engine's row-crossing-threads step made explicit (spec.md §4.4).
    pub fn to_owned(&self) -> Row {
        Row {
            names: self.names.into(),
            values: self.values.iter().map(|v| (*v).to_owned()).collect(),
        }
    }
}

/// An owned row: deep-copied column names and values.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    names: Arc<[Arc<str>]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(names: Arc<[Arc<str>]>, values: Vec<Value>) -> Self {
        assert_eq!(names.len(), values.len());
        Row { names, values }
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    pub fn column_names(&self) -> &[Arc<str>] {
        &self.names
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n.as_ref() == name)
            .and_then(|i| self.get(i))
    }

    pub fn kind_at(&self, index: usize) -> Option<ValueKind> {
        self.get(index).map(Value::kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Arc<[Arc<str>]> {
        cols.iter().map(|c| Arc::<str>::from(*c)).collect()
    }

    #[test]
    fn row_ref_deep_copy_survives_source_mutation() {
        let cols = names(&["id", "s"]);
        let mut text = String::from("a");
        let row_ref = RowRef::new(&cols, vec![ValueRef::I64(1), ValueRef::Text(&text)]);
        let owned = row_ref.to_owned();
        text.push_str("-mutated-after-capture");
        assert_eq!(owned.get_by_name("s"), Some(&Value::Text("a".into())));
    }

    #[test]
    #[should_panic(expected = "row column count mismatch")]
    fn mismatched_lengths_panic() {
        let cols = names(&["only_one"]);
        RowRef::new(&cols, vec![ValueRef::I64(1), ValueRef::I64(2)]);
    }

    #[test]
    fn get_by_name_misses_return_none() {
        let cols = names(&["a"]);
        let row = Row::new(cols, vec![Value::I64(1)]);
        assert_eq!(row.get_by_name("b"), None);
    }
}
