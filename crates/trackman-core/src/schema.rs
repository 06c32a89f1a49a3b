//! Ordered, growing column schema of the combined dataset.

use std::collections::HashMap;

use crate::models::{CellValue, ColumnKind};

/// One schema column. `kind` stays `None` until a non-missing value is seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: Option<ColumnKind>,
}

/// A value disagreed with the column's recorded kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindConflict {
    pub expected: ColumnKind,
    pub found: ColumnKind,
}

/// Union of every column ever observed, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.index
            .get(name)
            .and_then(|&i| self.columns[i].kind)
    }

    /// Add `name` if unseen. Returns `true` when the column was new.
    pub fn ensure_column(&mut self, name: &str) -> bool {
        if self.index.contains_key(name) {
            return false;
        }
        self.index.insert(name.to_string(), self.columns.len());
        self.columns.push(Column {
            name: name.to_string(),
            kind: None,
        });
        true
    }

    /// Register `value` under `name`, fixing the column kind on the first
    /// present value.
    ///
    /// Missing values never conflict. A present value whose kind differs from
    /// the recorded one is rejected and the schema is left unchanged.
    pub fn observe(&mut self, name: &str, value: &CellValue) -> Result<(), KindConflict> {
        self.ensure_column(name);
        let Some(found) = value.kind() else {
            return Ok(());
        };
        let column = &mut self.columns[self.index[name]];
        match column.kind {
            None => {
                column.kind = Some(found);
                Ok(())
            }
            Some(expected) if expected == found => Ok(()),
            Some(expected) => Err(KindConflict { expected, found }),
        }
    }

    /// Union `other` into `self`, returning the names of newly added columns.
    ///
    /// Kinds already fixed here win over `other`'s.
    pub fn union(&mut self, other: &Schema) -> Vec<String> {
        let mut added = Vec::new();
        for column in &other.columns {
            if self.ensure_column(&column.name) {
                added.push(column.name.clone());
            }
            let slot = &mut self.columns[self.index[&column.name]];
            if slot.kind.is_none() {
                slot.kind = column.kind;
            }
        }
        added
    }
}
