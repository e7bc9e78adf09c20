// SPDX-License-Identifier: MIT

use super::condition::ItemId;

/// Decides whether the current context satisfies a source/items pair.
///
/// Implementations must be pure with respect to one evaluation: the same
/// arguments give the same answer and nothing is mutated.
pub trait ContextMatcher {
    fn matches(&self, source: &str, items: &[ItemId]) -> bool;
}

impl<F> ContextMatcher for F
where
    F: Fn(&str, &[ItemId]) -> bool,
{
    fn matches(&self, source: &str, items: &[ItemId]) -> bool {
        self(source, items)
    }
}

/// Matcher that never matches
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMatch;

impl ContextMatcher for NoMatch {
    fn matches(&self, _source: &str, _items: &[ItemId]) -> bool {
        false
    }
}
