//! Forward-only iteration over a fetched result set

use crate::Row;
use std::vec::IntoIter;

/// Finite, non-restartable sequence of rows
///
/// Rows are materialised before the cursor is handed out, so no server-side
/// resource is held. [`close`](RowCursor::close) drops whatever is left.
#[derive(Debug)]
pub struct RowCursor {
    rows: IntoIter<Row>,
    closed: bool,
}

impl RowCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
            closed: false,
        }
    }

    /// Rows not yet yielded
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the remaining rows; later `next` calls yield `None`
    pub fn close(&mut self) {
        self.rows = Vec::new().into_iter();
        self.closed = true;
    }
}

impl Iterator for RowCursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.closed {
            return None;
        }
        let row = self.rows.next();
        if row.is_none() {
            self.closed = true;
        }
        row
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for RowCursor {}
