// SPDX-License-Identifier: MIT

//! Interactive controller - a headless state machine over the rule list
//!
//! The controller never performs I/O. It consumes [`Event`]s (user actions
//! and catalog responses) and answers with [`Command`]s for whoever drives
//! it to execute. Every committed change is serialized and written to the
//! persisted field before `handle` returns.
//!
//! Each row carries a sequence number that is bumped whenever a new search
//! or fetch is issued for it. Timers and responses tagged with an older
//! sequence are dropped, so only the most recently issued query can change
//! a row's options regardless of the order responses arrive in.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;

use super::client::env_number;
use super::rules::{PartialCondition, RowId, RuleList};
use crate::conditions::{
    ConditionList, ConditionsError, ErrorKind, Item, ItemId, Operator, Source, SourceCatalog,
};

/// Default delay between the last keystroke and the search request
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Controller settings
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub search_debounce: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
        }
    }
}

impl ControllerConfig {
    /// Read `VC_SEARCH_DEBOUNCE_MS`, falling back to the default
    pub fn from_env() -> Result<Self, ConditionsError> {
        let mut config = Self::default();
        if let Some(ms) = env_number("VC_SEARCH_DEBOUNCE_MS")? {
            config.search_debounce = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

/// Operator-initiated actions
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddRow,
    SetOperator { row: RowId, operator: Operator },
    SetSource { row: RowId, source: String },
    Search { row: RowId, query: String },
    SetItems { row: RowId, items: Vec<ItemId> },
    RemoveRow { row: RowId },
    ReloadSources,
}

/// Everything the controller reacts to
#[derive(Debug)]
pub enum Event {
    Action(Action),
    SourcesLoaded(Result<SourceCatalog, ConditionsError>),
    SearchDue {
        row: RowId,
        seq: u64,
    },
    ItemsLoaded {
        row: RowId,
        seq: u64,
        result: Result<Vec<Item>, ConditionsError>,
    },
    LabelsResolved {
        row: RowId,
        source: String,
        result: Result<Vec<Item>, ConditionsError>,
    },
}

impl From<Action> for Event {
    fn from(action: Action) -> Self {
        Event::Action(action)
    }
}

/// Work requested from the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    FetchSources,
    FetchItems {
        row: RowId,
        seq: u64,
        source: Source,
        query: String,
    },
    ScheduleSearch {
        row: RowId,
        seq: u64,
        delay: Duration,
    },
    ResolveLabels {
        row: RowId,
        source: Source,
        ids: Vec<ItemId>,
    },
    /// Outstanding work for the row is no longer wanted
    Abandon { row: RowId },
    Notify(Notice),
}

/// Non-fatal, host-visible diagnostics
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    SourcesUnavailable {
        kind: ErrorKind,
        message: String,
    },
    ItemsUnavailable {
        row: RowId,
        kind: ErrorKind,
        message: String,
    },
    /// Saved identifiers the catalog no longer knows; they stay selected
    UnresolvedItems { row: RowId, ids: Vec<ItemId> },
}

/// Row state in the editing state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// No source chosen
    Empty,
    /// Source without items to pick
    Fixed,
    /// Items panel active
    Searchable,
}

/// Progress of the item options of a searchable row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemsStatus {
    Idle,
    Loading,
    Ready,
    Failed(ErrorKind),
}

/// Display label of a selected identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelState {
    /// Render the raw identifier until resolution completes
    Pending,
    Resolved(String),
    Unresolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub id: ItemId,
    pub label: LabelState,
}

/// Whether the sources catalog is usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcesState {
    Loading,
    Ready,
    Unavailable,
}

/// Render model of one row
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: RowId,
    pub operator: Operator,
    pub source: String,
    pub state: RowState,
    pub query: String,
    pub options: Vec<Item>,
    pub status: ItemsStatus,
    pub selected: Vec<Selection>,
}

/// Render model of the whole builder
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub sources: SourcesState,
    pub catalog: SourceCatalog,
    pub rows: Vec<RowView>,
}

#[derive(Debug)]
struct RowSession {
    state: RowState,
    seq: u64,
    query: String,
    options: Vec<Item>,
    status: ItemsStatus,
    labels: HashMap<ItemId, LabelState>,
}

impl RowSession {
    fn new() -> Self {
        Self {
            state: RowState::Empty,
            seq: 0,
            query: String::new(),
            options: vec![],
            status: ItemsStatus::Idle,
            labels: HashMap::new(),
        }
    }

    fn label_from_options(&self, id: &ItemId) -> Option<String> {
        self.options
            .iter()
            .find(|o| &o.id == id)
            .map(|o| o.label.clone())
    }
}

/// Drives the rule list from user actions and catalog responses
pub struct Controller {
    rules: RuleList,
    sessions: HashMap<RowId, RowSession>,
    catalog: SourceCatalog,
    sources_state: SourcesState,
    config: ControllerConfig,
    field: watch::Sender<String>,
}

impl Controller {
    /// Create a controller hydrated from `saved`. An empty list gets one blank row.
    pub fn new(saved: &ConditionList, config: ControllerConfig) -> Self {
        let mut rules = RuleList::new();
        rules.hydrate(saved);
        if rules.is_empty() {
            rules.add_row(None);
        }

        let sessions = rules.ids().into_iter().map(|id| (id, RowSession::new())).collect();
        let (field, _) = watch::channel(rules.serialize().to_json());

        let mut controller = Self {
            rules,
            sessions,
            catalog: SourceCatalog::default(),
            sources_state: SourcesState::Loading,
            config,
            field,
        };
        for id in controller.rules.ids() {
            let state = controller.state_for(&id);
            if let Some(session) = controller.sessions.get_mut(&id) {
                session.state = state;
                for item in controller.rules.get(id).map(|r| r.items()).unwrap_or_default() {
                    session.labels.insert(item.clone(), LabelState::Pending);
                }
            }
        }
        controller
    }

    /// Commands to issue once the driver is ready
    pub fn start(&mut self) -> Vec<Command> {
        self.sources_state = SourcesState::Loading;
        vec![Command::FetchSources]
    }

    /// Watch the persisted field
    pub fn subscribe_field(&self) -> watch::Receiver<String> {
        self.field.subscribe()
    }

    /// Current persisted value
    pub fn persisted(&self) -> String {
        self.field.borrow().clone()
    }

    pub fn serialize(&self) -> ConditionList {
        self.rules.serialize()
    }

    pub fn rules(&self) -> &RuleList {
        &self.rules
    }

    pub fn sources_state(&self) -> SourcesState {
        self.sources_state
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Process one event
    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::Action(action) => self.apply(action),
            Event::SourcesLoaded(result) => self.on_sources(result),
            Event::SearchDue { row, seq } => self.on_search_due(row, seq),
            Event::ItemsLoaded { row, seq, result } => self.on_items(row, seq, result),
            Event::LabelsResolved { row, source, result } => self.on_labels(row, &source, result),
        }
    }

    fn apply(&mut self, action: Action) -> Vec<Command> {
        match action {
            Action::AddRow => {
                self.add_row();
                vec![]
            }
            Action::SetOperator { row, operator } => self.set_operator(row, operator),
            Action::SetSource { row, source } => self.set_source(row, source),
            Action::Search { row, query } => self.search(row, query),
            Action::SetItems { row, items } => self.set_items(row, items),
            Action::RemoveRow { row } => self.remove_row(row),
            Action::ReloadSources => self.start(),
        }
    }

    /// Append a blank row and return its id
    pub fn add_row(&mut self) -> RowId {
        let id = self.rules.add_row(None);
        self.sessions.insert(id, RowSession::new());
        log::debug!("Added {}", id);
        self.persist();
        id
    }

    pub fn set_operator(&mut self, row: RowId, operator: Operator) -> Vec<Command> {
        match self
            .rules
            .update_row(row, PartialCondition::new().operator(operator))
        {
            Some(update) if update.any() => self.persist(),
            Some(_) => {}
            None => log::debug!("Ignoring operator change for unknown {}", row),
        }
        vec![]
    }

    /// Choose the row's source. Only sources of a loaded catalog are accepted;
    /// an empty key clears the row.
    pub fn set_source(&mut self, row: RowId, source: String) -> Vec<Command> {
        if !source.is_empty() && self.catalog.find(&source).is_none() {
            log::debug!("Ignoring unknown source '{}' for {}", source, row);
            return vec![];
        }

        let Some(update) = self
            .rules
            .update_row(row, PartialCondition::new().source(source))
        else {
            log::debug!("Ignoring source change for unknown {}", row);
            return vec![];
        };

        if update.source_changed {
            if let Some(session) = self.sessions.get_mut(&row) {
                session.query.clear();
                session.options.clear();
                session.labels.clear();
                session.status = ItemsStatus::Idle;
            }
            self.persist();
        }

        // Re-entering the same source retries the fetch
        let mut commands = self.enter_state(row);
        if update.source_changed {
            // Items restored from the saved value need their labels again
            commands.extend(self.resolve_labels(row));
        }
        commands
    }

    pub fn search(&mut self, row: RowId, query: String) -> Vec<Command> {
        let delay = self.config.search_debounce;
        let Some(session) = self.sessions.get_mut(&row) else {
            log::debug!("Ignoring search for unknown {}", row);
            return vec![];
        };
        if session.state != RowState::Searchable {
            log::debug!("Ignoring search on {} which has no items panel", row);
            return vec![];
        }

        session.query = query;
        session.seq += 1;
        let seq = session.seq;

        if delay.is_zero() {
            return self.on_search_due(row, seq);
        }
        vec![Command::ScheduleSearch { row, seq, delay }]
    }

    pub fn set_items(&mut self, row: RowId, items: Vec<ItemId>) -> Vec<Command> {
        if self.sessions.get(&row).map(|s| s.state) != Some(RowState::Searchable) {
            log::debug!("Ignoring item selection on {}", row);
            return vec![];
        }

        let Some(update) = self
            .rules
            .update_row(row, PartialCondition::new().items(items))
        else {
            return vec![];
        };

        let selected = self.selected_ids(row);
        if let Some(session) = self.sessions.get_mut(&row) {
            let mut labels = HashMap::new();
            for id in selected {
                let label = match session.label_from_options(&id) {
                    Some(label) => LabelState::Resolved(label),
                    None => session
                        .labels
                        .get(&id)
                        .cloned()
                        .unwrap_or(LabelState::Unresolved),
                };
                labels.insert(id, label);
            }
            session.labels = labels;
        }

        if update.any() {
            self.persist();
        }
        vec![]
    }

    pub fn remove_row(&mut self, row: RowId) -> Vec<Command> {
        if self.rules.remove_row(row).is_none() {
            log::debug!("Ignoring removal of unknown {}", row);
            return vec![];
        }
        self.sessions.remove(&row);
        self.persist();
        vec![Command::Abandon { row }]
    }

    fn on_sources(&mut self, result: Result<SourceCatalog, ConditionsError>) -> Vec<Command> {
        let mut commands = Vec::new();
        match result {
            Ok(catalog) => {
                if catalog.is_empty() {
                    log::warn!("Sources catalog is empty");
                }
                self.catalog = catalog;
                self.sources_state = SourcesState::Ready;
            }
            Err(e) => {
                log::warn!("Failed to load sources: {}", e);
                commands.push(Command::Notify(Notice::SourcesUnavailable {
                    kind: e.kind(),
                    message: e.to_string(),
                }));
                if !self.catalog.is_empty() {
                    // Keep working with the last catalog that loaded
                    self.sources_state = SourcesState::Ready;
                    return commands;
                }
                self.sources_state = SourcesState::Unavailable;
            }
        }

        for id in self.rules.ids() {
            let resolving = self
                .rules
                .get(id)
                .map(|r| !r.items().is_empty())
                .unwrap_or(false);
            commands.extend(self.enter_state(id));
            if resolving {
                commands.extend(self.resolve_labels(id));
            }
        }
        commands
    }

    fn on_search_due(&mut self, row: RowId, seq: u64) -> Vec<Command> {
        let Some(source) = self.searchable_source(row) else {
            return vec![];
        };
        let Some(session) = self.sessions.get_mut(&row) else {
            return vec![];
        };
        if session.seq != seq {
            log::debug!("Search {} on {} superseded by {}", seq, row, session.seq);
            return vec![];
        }

        session.status = ItemsStatus::Loading;
        vec![Command::FetchItems {
            row,
            seq,
            source,
            query: session.query.clone(),
        }]
    }

    fn on_items(
        &mut self,
        row: RowId,
        seq: u64,
        result: Result<Vec<Item>, ConditionsError>,
    ) -> Vec<Command> {
        let Some(session) = self.sessions.get_mut(&row) else {
            log::debug!("Dropping items for removed {}", row);
            return vec![];
        };
        if session.seq != seq {
            log::debug!("Dropping stale items {} for {} (latest {})", seq, row, session.seq);
            return vec![];
        }

        match result {
            Ok(items) => {
                for item in &items {
                    if let Some(label) = session.labels.get_mut(&item.id) {
                        *label = LabelState::Resolved(item.label.clone());
                    }
                }
                session.options = items;
                session.status = ItemsStatus::Ready;
                vec![]
            }
            Err(e) => {
                log::warn!("Failed to load items for {}: {}", row, e);
                session.options.clear();
                session.status = ItemsStatus::Failed(e.kind());
                vec![Command::Notify(Notice::ItemsUnavailable {
                    row,
                    kind: e.kind(),
                    message: e.to_string(),
                })]
            }
        }
    }

    fn on_labels(
        &mut self,
        row: RowId,
        source: &str,
        result: Result<Vec<Item>, ConditionsError>,
    ) -> Vec<Command> {
        if self.rules.get(row).map(|r| r.source()) != Some(source) {
            log::debug!("Dropping labels for {} resolved against '{}'", row, source);
            return vec![];
        }
        let selected = self.selected_ids(row);
        let Some(session) = self.sessions.get_mut(&row) else {
            return vec![];
        };

        match result {
            Ok(found) => {
                let mut unresolved = Vec::new();
                for id in selected {
                    match found.iter().find(|i| i.id == id) {
                        Some(item) => {
                            session
                                .labels
                                .insert(id, LabelState::Resolved(item.label.clone()));
                        }
                        None => {
                            if !matches!(session.labels.get(&id), Some(LabelState::Resolved(_))) {
                                session.labels.insert(id.clone(), LabelState::Unresolved);
                                unresolved.push(id);
                            }
                        }
                    }
                }
                if unresolved.is_empty() {
                    vec![]
                } else {
                    log::info!("{} keeps unresolved items {:?}", row, unresolved);
                    vec![Command::Notify(Notice::UnresolvedItems {
                        row,
                        ids: unresolved,
                    })]
                }
            }
            Err(e) => {
                log::warn!("Failed to resolve labels for {}: {}", row, e);
                for id in selected {
                    let label = session.labels.entry(id).or_insert(LabelState::Unresolved);
                    if *label == LabelState::Pending {
                        *label = LabelState::Unresolved;
                    }
                }
                vec![Command::Notify(Notice::ItemsUnavailable {
                    row,
                    kind: e.kind(),
                    message: e.to_string(),
                })]
            }
        }
    }

    /// Move the row into the state its source calls for
    fn enter_state(&mut self, row: RowId) -> Vec<Command> {
        let state = self.state_for(&row);
        let source = self.searchable_source(row);
        let Some(session) = self.sessions.get_mut(&row) else {
            return vec![];
        };

        session.state = state;
        match (state, source) {
            (RowState::Searchable, Some(source)) => {
                session.seq += 1;
                session.status = ItemsStatus::Loading;
                vec![Command::FetchItems {
                    row,
                    seq: session.seq,
                    source,
                    query: session.query.clone(),
                }]
            }
            _ => {
                // Bump so responses for a previous searchable source are dropped
                session.seq += 1;
                session.options.clear();
                session.status = ItemsStatus::Idle;
                vec![]
            }
        }
    }

    /// Ask for labels of the selected items. Rows without a searchable
    /// source have nothing to look them up in, so their labels settle as
    /// unresolved right away.
    fn resolve_labels(&mut self, row: RowId) -> Vec<Command> {
        let ids = self.selected_ids(row);
        if ids.is_empty() {
            return vec![];
        }
        let source = self.searchable_source(row);
        let Some(session) = self.sessions.get_mut(&row) else {
            return vec![];
        };

        match source {
            Some(source) => {
                for id in &ids {
                    let label = session.labels.entry(id.clone()).or_insert(LabelState::Pending);
                    if *label == LabelState::Unresolved {
                        *label = LabelState::Pending;
                    }
                }
                vec![Command::ResolveLabels { row, source, ids }]
            }
            None => {
                for id in ids {
                    let label = session.labels.entry(id).or_insert(LabelState::Unresolved);
                    if *label == LabelState::Pending {
                        *label = LabelState::Unresolved;
                    }
                }
                vec![]
            }
        }
    }

    fn state_for(&self, row: &RowId) -> RowState {
        let Some(rule) = self.rules.get(*row) else {
            return RowState::Empty;
        };
        if rule.source().is_empty() {
            return RowState::Empty;
        }
        match self.catalog.find(rule.source()) {
            Some(source) if source.searchable => RowState::Searchable,
            _ => RowState::Fixed,
        }
    }

    fn searchable_source(&self, row: RowId) -> Option<Source> {
        let rule = self.rules.get(row)?;
        self.catalog
            .find(rule.source())
            .filter(|s| s.searchable)
            .cloned()
    }

    fn selected_ids(&self, row: RowId) -> Vec<ItemId> {
        self.rules
            .get(row)
            .map(|r| r.items().to_vec())
            .unwrap_or_default()
    }

    fn persist(&self) {
        let serialized = self.rules.serialize().to_json();
        log::debug!("Persisting conditions: {}", serialized);
        self.field.send_replace(serialized);
    }

    /// Render model of one row
    pub fn row_view(&self, row: RowId) -> Option<RowView> {
        let rule = self.rules.get(row)?;
        let session = self.sessions.get(&row)?;
        Some(RowView {
            id: row,
            operator: rule.operator(),
            source: rule.source().to_string(),
            state: session.state,
            query: session.query.clone(),
            options: session.options.clone(),
            status: session.status,
            selected: rule
                .items()
                .iter()
                .map(|id| Selection {
                    id: id.clone(),
                    label: session
                        .labels
                        .get(id)
                        .cloned()
                        .unwrap_or(LabelState::Pending),
                })
                .collect(),
        })
    }

    /// Render model of all rows, in order
    pub fn view(&self) -> Vec<RowView> {
        self.rules
            .ids()
            .into_iter()
            .filter_map(|id| self.row_view(id))
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sources: self.sources_state,
            catalog: self.catalog.clone(),
            rows: self.view(),
        }
    }
}
