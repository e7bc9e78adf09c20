// SPDX-License-Identifier: MIT

//! Session - runs a controller on a tokio task
//!
//! All controller state lives on one task. Fetches and debounce timers run
//! as spawned tasks that only report back through the event channel, so
//! the controller itself is never touched concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::client::CatalogClient;
use super::controller::{Action, Command, Controller, Event, Notice, Snapshot};
use super::rules::RowId;
use crate::conditions::{ConditionList, ItemId, Operator};

/// Notices buffered for the host before newer ones are dropped
pub const NOTICE_CAPACITY: usize = 32;

/// Handle to a running editing session
///
/// Notices queue up to [`NOTICE_CAPACITY`]; once full, new ones are logged
/// and discarded until the host drains the queue.
pub struct SessionHandle {
    actions: mpsc::UnboundedSender<Action>,
    field: watch::Receiver<String>,
    view: watch::Receiver<Snapshot>,
    notices: mpsc::Receiver<Notice>,
    task: JoinHandle<ConditionList>,
}

impl SessionHandle {
    /// Queue an action. Fails once the session has ended.
    pub fn dispatch(&self, action: Action) -> Result<(), mpsc::error::SendError<Action>> {
        self.actions.send(action)
    }

    pub fn add_row(&self) -> Result<(), mpsc::error::SendError<Action>> {
        self.dispatch(Action::AddRow)
    }

    pub fn set_operator(
        &self,
        row: RowId,
        operator: Operator,
    ) -> Result<(), mpsc::error::SendError<Action>> {
        self.dispatch(Action::SetOperator { row, operator })
    }

    pub fn set_source(
        &self,
        row: RowId,
        source: impl Into<String>,
    ) -> Result<(), mpsc::error::SendError<Action>> {
        self.dispatch(Action::SetSource {
            row,
            source: source.into(),
        })
    }

    pub fn search(
        &self,
        row: RowId,
        query: impl Into<String>,
    ) -> Result<(), mpsc::error::SendError<Action>> {
        self.dispatch(Action::Search {
            row,
            query: query.into(),
        })
    }

    pub fn set_items(
        &self,
        row: RowId,
        items: Vec<ItemId>,
    ) -> Result<(), mpsc::error::SendError<Action>> {
        self.dispatch(Action::SetItems { row, items })
    }

    pub fn remove_row(&self, row: RowId) -> Result<(), mpsc::error::SendError<Action>> {
        self.dispatch(Action::RemoveRow { row })
    }

    /// The persisted field
    pub fn field(&self) -> watch::Receiver<String> {
        self.field.clone()
    }

    /// The latest render model
    pub fn snapshot(&self) -> Snapshot {
        self.view.borrow().clone()
    }

    /// Watch the render model
    pub fn view(&self) -> watch::Receiver<Snapshot> {
        self.view.clone()
    }

    /// Wait for the next notice
    pub async fn next_notice(&mut self) -> Option<Notice> {
        self.notices.recv().await
    }

    /// Take a notice if one is queued
    pub fn try_notice(&mut self) -> Option<Notice> {
        self.notices.try_recv().ok()
    }

    /// Stop accepting actions and return the final condition list
    pub async fn close(self) -> Result<ConditionList, tokio::task::JoinError> {
        drop(self.actions);
        self.task.await
    }
}

/// Spawns controllers onto the tokio runtime
pub struct Session;

impl Session {
    /// Start `controller` against `client` and return its handle
    pub fn spawn(controller: Controller, client: Arc<CatalogClient>) -> SessionHandle {
        let (actions_tx, mut actions_rx) = mpsc::unbounded_channel::<Action>();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<Event>();
        let (notices_tx, notices_rx) = mpsc::channel::<Notice>(NOTICE_CAPACITY);
        let (view_tx, view_rx) = watch::channel(controller.snapshot());
        let field = controller.subscribe_field();

        let task = tokio::spawn(async move {
            let mut runner = Runner {
                controller,
                client,
                events: events_tx,
                notices: notices_tx,
                view: view_tx,
                inflight: HashMap::new(),
            };

            let commands = runner.controller.start();
            runner.execute(commands);

            loop {
                let event = tokio::select! {
                    action = actions_rx.recv() => match action {
                        Some(action) => Event::Action(action),
                        None => break,
                    },
                    Some(event) = events_rx.recv() => event,
                };

                let commands = runner.controller.handle(event);
                runner.execute(commands);
                runner.publish();
            }

            runner.shutdown();
            log::info!("Session closed");
            runner.controller.serialize()
        });

        SessionHandle {
            actions: actions_tx,
            field,
            view: view_rx,
            notices: notices_rx,
            task,
        }
    }
}

struct Runner {
    controller: Controller,
    client: Arc<CatalogClient>,
    events: mpsc::UnboundedSender<Event>,
    notices: mpsc::Sender<Notice>,
    view: watch::Sender<Snapshot>,
    /// Outstanding per-row tasks, aborted when the row goes away
    inflight: HashMap<RowId, Vec<JoinHandle<()>>>,
}

impl Runner {
    fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::FetchSources => {
                    let client = self.client.clone();
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        let result = client.list_sources().await;
                        let _ = events.send(Event::SourcesLoaded(result));
                    });
                }
                Command::FetchItems {
                    row,
                    seq,
                    source,
                    query,
                } => {
                    let client = self.client.clone();
                    let events = self.events.clone();
                    let handle = tokio::spawn(async move {
                        let result = client.list_items(&source, &query).await;
                        let _ = events.send(Event::ItemsLoaded { row, seq, result });
                    });
                    self.track(row, handle);
                }
                Command::ScheduleSearch { row, seq, delay } => {
                    let events = self.events.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = events.send(Event::SearchDue { row, seq });
                    });
                    self.track(row, handle);
                }
                Command::ResolveLabels { row, source, ids } => {
                    let client = self.client.clone();
                    let events = self.events.clone();
                    let handle = tokio::spawn(async move {
                        let result = client.resolve_items(&source, &ids).await;
                        let _ = events.send(Event::LabelsResolved {
                            row,
                            source: source.key,
                            result,
                        });
                    });
                    self.track(row, handle);
                }
                Command::Abandon { row } => {
                    if let Some(handles) = self.inflight.remove(&row) {
                        log::debug!("Abandoning {} tasks of {}", handles.len(), row);
                        for handle in handles {
                            handle.abort();
                        }
                    }
                }
                Command::Notify(notice) => {
                    log::info!("Notice: {:?}", notice);
                    if let Err(mpsc::error::TrySendError::Full(notice)) =
                        self.notices.try_send(notice)
                    {
                        log::warn!("Notice queue full, dropping {:?}", notice);
                    }
                }
            }
        }
    }

    fn track(&mut self, row: RowId, handle: JoinHandle<()>) {
        let handles = self.inflight.entry(row).or_default();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    fn publish(&self) {
        self.view.send_replace(self.controller.snapshot());
    }

    fn shutdown(&mut self) {
        for (_, handles) in self.inflight.drain() {
            for handle in handles {
                handle.abort();
            }
        }
    }
}
