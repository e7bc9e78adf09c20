// SPDX-License-Identifier: MIT

//! Condition builder - rule list editing, catalog access and the
//! interactive controller that ties them to a persisted field

pub mod client;
pub mod controller;
pub mod http;
pub mod rules;
pub mod session;

pub use client::{CatalogClient, ClientConfig, DEFAULT_PAGE_SIZE};
pub use controller::{
    Action, Command, Controller, ControllerConfig, Event, ItemsStatus, LabelState, Notice,
    RowState, RowView, Selection, Snapshot, SourcesState, DEFAULT_SEARCH_DEBOUNCE,
};
pub use http::{Envelope, HttpCatalog, ItemsRequest};
pub use rules::{PartialCondition, RowId, RowUpdate, RuleList, RuleRow};
pub use session::{Session, SessionHandle, NOTICE_CAPACITY};
