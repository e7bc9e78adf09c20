// SPDX-License-Identifier: MIT

//! Condition data model and evaluation
//!
//! A condition list is an ordered set of include/exclude rows such as:
//! - `include post__tax_category [5]` - posts filed under category 5
//! - `exclude front_page` - never on the front page
//!
//! Evaluation is first-match-wins against a host supplied [`ContextMatcher`].

mod catalog;
mod condition;
pub mod error;
mod evaluator;
mod matcher;

pub use catalog::{Item, ItemProvider, Source, SourceCatalog, SourceGroup, SourceProvider};
pub use condition::{dedup_items, ConditionList, ConditionRow, ItemId, Operator};
pub use error::{ConditionsError, ErrorKind, ValidationError};
pub use evaluator::{evaluate, evaluate_json};
pub use matcher::{ContextMatcher, NoMatch};
