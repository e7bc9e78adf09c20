// SPDX-License-Identifier: MIT

//! Visual conditions - ordered include/exclude rules deciding whether a
//! piece of content applies to the current context, plus the builder that
//! edits them against a host catalog.

pub mod builder;
pub mod conditions;
pub mod site;
