// SPDX-License-Identifier: MIT

//! Rule list - the in-memory builder state
//!
//! Rows keep a stable [`RowId`] for their whole life so that late events
//! (fetch responses, timers) can be routed to them or dropped once the row
//! is gone.

use crate::conditions::{dedup_items, ConditionList, ConditionRow, ItemId, Operator};
use std::fmt;

/// Stable identifier of a row within one editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

impl RowId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row-{}", self.0)
    }
}

/// Fields to merge into a row; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialCondition {
    pub operator: Option<Operator>,
    pub source: Option<String>,
    pub items: Option<Vec<ItemId>>,
}

impl PartialCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn items<I, T>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemId>,
    {
        self.items = Some(items.into_iter().map(Into::into).collect());
        self
    }
}

impl From<ConditionRow> for PartialCondition {
    fn from(row: ConditionRow) -> Self {
        Self {
            operator: Some(row.operator),
            source: Some(row.source),
            items: Some(row.items),
        }
    }
}

/// What an update actually changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowUpdate {
    pub operator_changed: bool,
    pub source_changed: bool,
    pub items_changed: bool,
}

impl RowUpdate {
    pub fn any(&self) -> bool {
        self.operator_changed || self.source_changed || self.items_changed
    }
}

/// One row of the builder
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRow {
    id: RowId,
    condition: ConditionRow,
    /// Value the row was hydrated with, restored when its source is reselected
    saved: Option<ConditionRow>,
}

impl RuleRow {
    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn condition(&self) -> &ConditionRow {
        &self.condition
    }

    pub fn operator(&self) -> Operator {
        self.condition.operator
    }

    pub fn source(&self) -> &str {
        &self.condition.source
    }

    pub fn items(&self) -> &[ItemId] {
        &self.condition.items
    }

    pub fn saved(&self) -> Option<&ConditionRow> {
        self.saved.as_ref()
    }
}

/// Ordered collection of rule rows
#[derive(Debug, Clone, Default)]
pub struct RuleList {
    rows: Vec<RuleRow>,
    next_id: u64,
}

impl RuleList {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> RowId {
        self.next_id += 1;
        RowId(self.next_id)
    }

    /// Append a row. Operator defaults to include and source to empty.
    pub fn add_row(&mut self, initial: Option<PartialCondition>) -> RowId {
        let id = self.allocate_id();
        self.rows.push(RuleRow {
            id,
            condition: ConditionRow::default(),
            saved: None,
        });
        if let Some(patch) = initial {
            self.update_row(id, patch);
        }
        id
    }

    /// Merge `patch` into the row. Changing the source clears the items
    /// unless the patch carries items or the new source is the one the row
    /// was hydrated with.
    pub fn update_row(&mut self, id: RowId, patch: PartialCondition) -> Option<RowUpdate> {
        let row = self.rows.iter_mut().find(|r| r.id == id)?;
        let mut update = RowUpdate::default();

        if let Some(operator) = patch.operator {
            if row.condition.operator != operator {
                row.condition.operator = operator;
                update.operator_changed = true;
            }
        }

        if let Some(source) = patch.source {
            if row.condition.source != source {
                let restored = row
                    .saved
                    .as_ref()
                    .filter(|saved| saved.source == source)
                    .map(|saved| saved.items.clone())
                    .unwrap_or_default();
                update.items_changed = row.condition.items != restored;
                row.condition.items = restored;
                row.condition.source = source;
                update.source_changed = true;
            }
        }

        if let Some(items) = patch.items {
            let items = dedup_items(items);
            if row.condition.items != items {
                row.condition.items = items;
                update.items_changed = true;
            }
        }

        Some(update)
    }

    /// Delete a row, keeping the order of the others
    pub fn remove_row(&mut self, id: RowId) -> Option<ConditionRow> {
        let index = self.rows.iter().position(|r| r.id == id)?;
        Some(self.rows.remove(index).condition)
    }

    /// Canonical list without incomplete rows
    pub fn serialize(&self) -> ConditionList {
        ConditionList::new(
            self.rows
                .iter()
                .filter(|r| r.condition.is_complete())
                .map(|r| r.condition.clone())
                .collect(),
        )
    }

    /// Replace all rows with one row per saved entry, in order
    pub fn hydrate(&mut self, saved: &ConditionList) -> Vec<RowId> {
        self.rows.clear();
        saved
            .rows()
            .iter()
            .map(|condition| {
                let id = self.allocate_id();
                self.rows.push(RuleRow {
                    id,
                    condition: condition.clone(),
                    saved: Some(condition.clone()),
                });
                id
            })
            .collect()
    }

    pub fn get(&self, id: RowId) -> Option<&RuleRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.get(id).is_some()
    }

    pub fn rows(&self) -> &[RuleRow] {
        &self.rows
    }

    pub fn ids(&self) -> Vec<RowId> {
        self.rows.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
