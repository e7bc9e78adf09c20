// SPDX-License-Identifier: MIT

//! First-match-wins evaluation of a condition list

use super::condition::{ConditionList, ConditionRow, Operator};
use super::error::ValidationError;
use super::matcher::ContextMatcher;

/// Reduce `conditions` to a single decision against the current context.
///
/// No complete rows means no restriction and yields `true`. Otherwise the
/// first row whose source/items match decides: include grants, exclude
/// denies. When nothing matches the result is `false`.
pub fn evaluate<'a, I, M>(conditions: I, matcher: &M) -> bool
where
    I: IntoIterator<Item = &'a ConditionRow>,
    M: ContextMatcher + ?Sized,
{
    let mut saw_row = false;

    for row in conditions.into_iter().filter(|r| r.is_complete()) {
        saw_row = true;
        if matcher.matches(&row.source, &row.items) {
            log::debug!(
                "Condition matched: {} {} {:?}",
                row.operator,
                row.source,
                row.items
            );
            return row.operator == Operator::Include;
        }
    }

    !saw_row
}

/// Parse a persisted blob and evaluate it
pub fn evaluate_json<M>(raw: &str, matcher: &M) -> Result<bool, ValidationError>
where
    M: ContextMatcher + ?Sized,
{
    let list = ConditionList::from_json(raw)?;
    Ok(evaluate(&list, matcher))
}

impl ConditionList {
    pub fn evaluate<M: ContextMatcher + ?Sized>(&self, matcher: &M) -> bool {
        evaluate(self, matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::condition::ItemId;
    use crate::conditions::matcher::NoMatch;
    use std::cell::RefCell;

    fn matches_source(key: &'static str) -> impl Fn(&str, &[ItemId]) -> bool {
        move |source: &str, _items: &[ItemId]| source == key
    }

    #[test]
    fn test_empty_list_is_true() {
        assert!(evaluate(&ConditionList::empty(), &NoMatch));
        assert!(evaluate(&ConditionList::empty(), &|_: &str, _: &[ItemId]| true));
    }

    #[test]
    fn test_only_incomplete_rows_is_true() {
        let list = ConditionList::new(vec![ConditionRow::exclude("")]);
        assert!(list.evaluate(&|_: &str, _: &[ItemId]| true));
    }

    #[test]
    fn test_include_match() {
        let list = ConditionList::new(vec![ConditionRow::include("front_page")]);
        assert!(list.evaluate(&matches_source("front_page")));
    }

    #[test]
    fn test_exclude_match() {
        let list = ConditionList::new(vec![ConditionRow::exclude("article__all")]);
        assert!(!list.evaluate(&matches_source("article__all")));
    }

    #[test]
    fn test_no_match_denies() {
        let list = ConditionList::new(vec![
            ConditionRow::include("front_page"),
            ConditionRow::exclude("404"),
        ]);
        assert!(!list.evaluate(&NoMatch));
    }

    #[test]
    fn test_first_match_wins() {
        let list = ConditionList::new(vec![
            ConditionRow::include("article__specific").with_items(["42"]),
            ConditionRow::exclude("article__all"),
        ]);
        let matcher = |source: &str, items: &[ItemId]| match source {
            "article__specific" => items.iter().any(|i| i.as_str() == "42"),
            "article__all" => true,
            _ => false,
        };
        assert!(list.evaluate(&matcher));

        let reversed = ConditionList::new(vec![
            ConditionRow::exclude("article__all"),
            ConditionRow::include("article__specific").with_items(["42"]),
        ]);
        assert!(!reversed.evaluate(&matcher));
    }

    #[test]
    fn test_short_circuits_and_skips_incomplete() {
        let seen = RefCell::new(Vec::new());
        let matcher = |source: &str, _: &[ItemId]| {
            seen.borrow_mut().push(source.to_string());
            source == "b"
        };
        let list = ConditionList::new(vec![
            ConditionRow::include("a"),
            ConditionRow::include(""),
            ConditionRow::exclude("b"),
            ConditionRow::include("c"),
        ]);

        assert!(!list.evaluate(&matcher));
        assert_eq!(*seen.borrow(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_matcher_receives_items() {
        let list = ConditionList::new(vec![
            ConditionRow::include("post__tax_category").with_items(["3", "8"]),
        ]);
        let matcher = |_: &str, items: &[ItemId]| items == [ItemId::from("3"), ItemId::from("8")];
        assert!(list.evaluate(&matcher));
    }

    #[test]
    fn test_evaluate_json() {
        let raw = r#"[{"operator":"exclude","source":"404","items":[]}]"#;
        assert_eq!(evaluate_json(raw, &matches_source("404")), Ok(false));
        assert_eq!(evaluate_json("[]", &NoMatch), Ok(true));
        assert!(evaluate_json(r#"[{"operator":"never","source":"404"}]"#, &NoMatch).is_err());
    }
}
