// SPDX-License-Identifier: MIT

//! Reference host - a YAML backed site that serves the catalog endpoints
//! and evaluates conditions for a page request

mod catalog;
mod context;
pub mod server;

pub use catalog::{Post, PostStatus, PostType, SiteCatalog, Taxonomy, Term, TAXONOMY_PREFIX};
pub use context::{PageContext, SingularPage};
