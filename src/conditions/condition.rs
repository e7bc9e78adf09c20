// SPDX-License-Identifier: MIT

//! Condition rows and the serialized condition list
//!
//! The persisted form is a JSON array of `{operator, source, items}` objects.
//! Item identifiers are always written back as strings so that numeric and
//! string identifiers compare equal after a round trip.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::error::ValidationError;

/// Whether a matching row grants or denies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[default]
    Include,
    Exclude,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Include => "include",
            Operator::Exclude => "exclude",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "include" => Ok(Operator::Include),
            "exclude" => Ok(Operator::Exclude),
            other => Err(ValidationError::UnknownOperator(other.to_string())),
        }
    }
}

/// Opaque item identifier, compared as a string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl TryFrom<Value> for ItemId {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::String(s) if !s.is_empty() => Ok(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Self(n.to_string())),
            other => Err(format!("invalid item identifier: {}", other)),
        }
    }
}

/// Removes duplicate identifiers, keeping the first occurrence
pub fn dedup_items(items: Vec<ItemId>) -> Vec<ItemId> {
    let mut out: Vec<ItemId> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// One include/exclude rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConditionRow {
    pub operator: Operator,
    pub source: String,
    pub items: Vec<ItemId>,
}

impl ConditionRow {
    pub fn new(operator: Operator, source: impl Into<String>, items: Vec<ItemId>) -> Self {
        Self {
            operator,
            source: source.into(),
            items: dedup_items(items),
        }
    }

    pub fn include(source: impl Into<String>) -> Self {
        Self::new(Operator::Include, source, vec![])
    }

    pub fn exclude(source: impl Into<String>) -> Self {
        Self::new(Operator::Exclude, source, vec![])
    }

    pub fn with_items<I, T>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemId>,
    {
        self.items = dedup_items(items.into_iter().map(Into::into).collect());
        self
    }

    /// A row without a source is still being edited and never persisted or evaluated
    pub fn is_complete(&self) -> bool {
        !self.source.is_empty()
    }
}

/// Condition row as it appears in hydration input, before validation
#[derive(Debug, Deserialize)]
struct RawCondition {
    #[serde(default)]
    operator: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    items: Vec<Value>,
}

impl RawCondition {
    fn into_row(self, index: usize, lenient: bool) -> Result<ConditionRow, ValidationError> {
        let operator = match self.operator.as_deref() {
            None | Some("") => Operator::Include,
            Some(op) => match op.parse::<Operator>() {
                Ok(op) => op,
                Err(e) if lenient => {
                    log::warn!("Row {}: {}, treating as include", index, e);
                    Operator::Include
                }
                Err(e) => return Err(e),
            },
        };

        let mut items = Vec::with_capacity(self.items.len());
        for value in self.items {
            let rendered = value.to_string();
            let id = ItemId::try_from(value).map_err(|_| ValidationError::MalformedItem {
                row: index,
                value: rendered,
            })?;
            items.push(id);
        }

        Ok(ConditionRow::new(
            operator,
            self.source.unwrap_or_default(),
            items,
        ))
    }
}

/// Ordered, first-match-wins list of condition rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConditionList {
    rows: Vec<ConditionRow>,
}

impl ConditionList {
    pub fn new(rows: Vec<ConditionRow>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse saved JSON, rejecting unknown operators
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        Self::parse(raw, false)
    }

    /// Parse saved JSON, coercing unknown operators to include
    pub fn from_json_lenient(raw: &str) -> Result<Self, ValidationError> {
        Self::parse(raw, true)
    }

    /// Validate an already-decoded JSON value
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let raw: Vec<RawCondition> = serde_json::from_value(value)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::from_raw(raw, false)
    }

    fn parse(raw: &str, lenient: bool) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }
        let raw: Vec<RawCondition> =
            serde_json::from_str(trimmed).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::from_raw(raw, lenient)
    }

    fn from_raw(raw: Vec<RawCondition>, lenient: bool) -> Result<Self, ValidationError> {
        let rows = raw
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.into_row(i, lenient))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }

    /// All rows, including incomplete ones
    pub fn rows(&self) -> &[ConditionRow] {
        &self.rows
    }

    /// Rows that take part in evaluation and persistence
    pub fn complete_rows(&self) -> impl Iterator<Item = &ConditionRow> {
        self.rows.iter().filter(|r| r.is_complete())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy without incomplete rows
    pub fn canonical(&self) -> Self {
        Self {
            rows: self.complete_rows().cloned().collect(),
        }
    }

    /// Canonical JSON for the persisted field
    pub fn to_json(&self) -> String {
        // Only strings and enums inside, serialization cannot fail
        serde_json::to_string(&self.canonical()).unwrap_or_else(|_| "[]".to_string())
    }
}

impl From<Vec<ConditionRow>> for ConditionList {
    fn from(rows: Vec<ConditionRow>) -> Self {
        Self::new(rows)
    }
}

impl<'a> IntoIterator for &'a ConditionList {
    type Item = &'a ConditionRow;
    type IntoIter = std::slice::Iter<'a, ConditionRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_parse_and_display() {
        assert_eq!("include".parse::<Operator>().unwrap(), Operator::Include);
        assert_eq!("exclude".parse::<Operator>().unwrap(), Operator::Exclude);
        assert_eq!(format!("{}", Operator::Exclude), "exclude");
        assert_eq!(
            "maybe".parse::<Operator>(),
            Err(ValidationError::UnknownOperator("maybe".to_string()))
        );
    }

    #[test]
    fn test_numeric_ids_become_strings() {
        let raw = r#"[{"operator":"include","source":"post__specific","items":[42,"7"]}]"#;
        let list = ConditionList::from_json(raw).unwrap();
        assert_eq!(
            list.rows()[0].items,
            vec![ItemId::from("42"), ItemId::from("7")]
        );
        assert_eq!(
            list.to_json(),
            r#"[{"operator":"include","source":"post__specific","items":["42","7"]}]"#
        );
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let list = ConditionList::from_json(r#"[{"source":"front_page"},{}]"#).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.rows()[0].operator, Operator::Include);
        assert!(list.rows()[0].items.is_empty());
        assert!(!list.rows()[1].is_complete());
    }

    #[test]
    fn test_unknown_operator_strict_and_lenient() {
        let raw = r#"[{"operator":"only","source":"front_page","items":[]}]"#;
        assert_eq!(
            ConditionList::from_json(raw),
            Err(ValidationError::UnknownOperator("only".to_string()))
        );

        let list = ConditionList::from_json_lenient(raw).unwrap();
        assert_eq!(list.rows()[0].operator, Operator::Include);
    }

    #[test]
    fn test_malformed_items_rejected() {
        for bad in [json!(true), json!(1.5), json!(null), json!(""), json!({"id": 1})] {
            let raw = json!([{ "operator": "include", "source": "x", "items": [bad] }]);
            let result = ConditionList::from_value(raw);
            assert!(
                matches!(result, Err(ValidationError::MalformedItem { row: 0, .. })),
                "expected malformed item for {:?}",
                result
            );
        }
    }

    #[test]
    fn test_malformed_shape_rejected() {
        assert!(matches!(
            ConditionList::from_json(r#"{"operator":"include"}"#),
            Err(ValidationError::Malformed(_))
        ));
        assert!(matches!(
            ConditionList::from_json("not json"),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_blank_input_is_empty_list() {
        assert!(ConditionList::from_json("").unwrap().is_empty());
        assert!(ConditionList::from_json("  ").unwrap().is_empty());
    }

    #[test]
    fn test_incomplete_rows_skipped_in_json() {
        let list = ConditionList::new(vec![
            ConditionRow::exclude("").with_items(["1", "2"]),
            ConditionRow::include("front_page"),
        ]);
        assert_eq!(
            list.to_json(),
            r#"[{"operator":"include","source":"front_page","items":[]}]"#
        );
    }

    #[test]
    fn test_items_are_deduplicated() {
        let row = ConditionRow::include("post__specific").with_items(["3", "1", "3"]);
        assert_eq!(row.items, vec![ItemId::from("3"), ItemId::from("1")]);
    }

    #[test]
    fn test_json_round_trip_is_stable() {
        let raw = r#"[{"operator":"exclude","source":"post__all","items":[]},{"operator":"include","source":"post__tax_category","items":["5","9"]}]"#;
        let first = ConditionList::from_json(raw).unwrap().to_json();
        let second = ConditionList::from_json(&first).unwrap().to_json();
        assert_eq!(first, raw);
        assert_eq!(first, second);
    }

    #[test]
    fn test_item_id_deserialize() {
        let id: ItemId = serde_json::from_value(json!(12)).unwrap();
        assert_eq!(id.as_str(), "12");
        assert!(serde_json::from_value::<ItemId>(json!(false)).is_err());
    }
}
