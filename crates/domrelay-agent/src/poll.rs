// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The poll loop: classify, snapshot, filter, relay, advance.
//!
//! Each tick takes the page lock once to read everything it needs, releases
//! it, and then works on the captured snapshot. A context that has not been
//! seeded yet (process start, context change, or a reseed that failed) is in
//! [`LoopState::Init`]; once seeded it is [`LoopState::Steady`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use domrelay_config::model::DomRelayConfig;
use domrelay_core::types::{NewMessageEvent, WorkspaceRoster};
use domrelay_core::{
    Context, DomRelayError, Message, OutboundEvent, PageAdapter, RawRecord, RelayAdapter,
};
use domrelay_detect::{
    ContextChange, ContextClassifier, CursorTracker, MessageFilter, SelfIdentity, SenderHasher,
};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::commands::CommandDispatcher;

/// The page handle shared by the poll loop and the command dispatcher.
/// Every scrape and every send holds this lock.
pub type SharedPage = Arc<Mutex<Box<dyn PageAdapter>>>;

/// Wraps a page adapter for sharing.
pub fn shared_page(page: Box<dyn PageAdapter>) -> SharedPage {
    Arc::new(Mutex::new(page))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// The current context still needs seeding.
    Init,
    /// The current context is seeded; ticks relay only what is new.
    Steady,
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub relayed: usize,
    pub reseeded: bool,
    pub context_changed: bool,
    pub workspace_updated: bool,
}

/// Everything read from the page under one lock.
struct PageRead {
    change: ContextChange,
    workspace: Option<(String, Option<WorkspaceRoster>)>,
    records: Option<Result<Vec<RawRecord>, DomRelayError>>,
}

pub struct PollLoop {
    page: SharedPage,
    relay: Arc<dyn RelayAdapter>,
    classifier: ContextClassifier,
    tracker: CursorTracker,
    filter: MessageFilter,
    hasher: Option<SenderHasher>,
    user_id: String,
    fallback_count: usize,
    interval: Duration,
    state: LoopState,
    workspace: Option<String>,
    /// Workspace and context events not yet accepted by the relay.
    pending: VecDeque<OutboundEvent>,
    ticks: u64,
}

impl PollLoop {
    /// Builds a loop from configuration.
    ///
    /// The page's own self labels are added to the configured markers. Fails
    /// when no self markers are configured, or when sender hashing is on
    /// without a pepper.
    pub fn new(
        page: SharedPage,
        relay: Arc<dyn RelayAdapter>,
        config: &DomRelayConfig,
    ) -> Result<Self, DomRelayError> {
        let labels = page
            .try_lock()
            .map_err(|_| DomRelayError::Internal("page is in use during poll loop setup".into()))?
            .self_labels();
        let identity = SelfIdentity::from_config(&config.identity)?.with_exact_labels(labels);
        let hasher = SenderHasher::from_config(&config.identity)?;

        info!(
            client = config.client.name.as_str(),
            markers = identity.markers().len(),
            platform_labels = labels.len(),
            hashing = hasher.is_some(),
            "poll loop initialized"
        );

        Ok(Self {
            page,
            relay,
            classifier: ContextClassifier::new(),
            tracker: CursorTracker::new(),
            filter: MessageFilter::new(identity),
            hasher,
            user_id: config.client.user_id.clone(),
            fallback_count: config.poll.fallback_count.max(1),
            interval: Duration::from_secs(config.poll.interval_secs.max(1)),
            state: LoopState::Init,
            workspace: None,
            pending: VecDeque::new(),
            ticks: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn current_context(&self) -> Option<&Context> {
        self.classifier.last()
    }

    pub fn tracker(&self) -> &CursorTracker {
        &self.tracker
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Polls until `cancel` fires, then shuts both adapters down.
    ///
    /// Inbound commands are served by a [`CommandDispatcher`] task for the
    /// lifetime of the loop. Cancellation is only observed between ticks.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), DomRelayError> {
        info!(interval_secs = self.interval.as_secs(), "poll loop running");

        let dispatcher = CommandDispatcher::new(self.page.clone(), self.relay.clone());
        let dispatch_task = tokio::spawn(dispatcher.run(cancel.clone()));

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping poll loop");
                    break;
                }
            }

            match self.tick().await {
                Ok(report) if report.relayed > 0 || report.context_changed => {
                    info!(
                        tick = self.ticks,
                        relayed = report.relayed,
                        reseeded = report.reseeded,
                        context_changed = report.context_changed,
                        "tick complete"
                    );
                }
                Ok(_) => debug!(tick = self.ticks, "tick complete, nothing new"),
                Err(e) => {
                    error!(
                        error = %e,
                        tick = self.ticks,
                        state = ?self.state,
                        context = ?self.classifier.last(),
                        "tick failed"
                    );
                }
            }
        }

        if let Err(e) = dispatch_task.await {
            warn!(error = %e, "command dispatcher task ended abnormally");
        }
        if let Err(e) = self.page.lock().await.shutdown().await {
            warn!(error = %e, "page shutdown failed");
        }
        if let Err(e) = self.relay.shutdown().await {
            warn!(error = %e, "relay shutdown failed");
        }

        info!(ticks = self.ticks, "poll loop stopped");
        Ok(())
    }

    /// Runs one poll cycle.
    pub async fn tick(&mut self) -> Result<TickReport, DomRelayError> {
        self.ticks += 1;
        let mut report = TickReport::default();

        let read = self.read_page().await;

        // State transitions happen before anything is emitted, so a failed
        // emit cannot leave a new context running on the old cursor.
        if let Some((name, roster)) = read.workspace {
            if let Some(roster) = roster {
                info!(workspace = name.as_str(), "workspace changed");
                self.queue(OutboundEvent::WorkspaceUpdate(roster));
            }
            self.workspace = Some(name);
        }

        let context = match &read.change {
            ContextChange::Unknown { .. } => None,
            ContextChange::Initial(current) => {
                info!(context = %current, "first context observed");
                self.state = LoopState::Init;
                Some(current.clone())
            }
            ContextChange::Changed { previous, current } => {
                info!(from = %previous, to = %current, "context changed");
                self.tracker.reset(current);
                self.state = LoopState::Init;
                self.queue(OutboundEvent::ContextChanged(current.into()));
                Some(current.clone())
            }
            ContextChange::Unchanged(current) => Some(current.clone()),
        };

        self.flush_pending(&mut report).await?;

        let Some(context) = context else {
            return Ok(report);
        };

        let records = match read.records {
            Some(records) => records?,
            None => return Ok(report),
        };

        report.relayed = match self.state {
            LoopState::Init => {
                report.reseeded = true;
                self.reseed(&context, &records).await?
            }
            LoopState::Steady => self.scan(&context, &records).await?,
        };

        Ok(report)
    }

    /// Queues a control event. A newer event of the same kind replaces one
    /// still waiting, since only the latest workspace and context matter.
    fn queue(&mut self, event: OutboundEvent) {
        let kind = std::mem::discriminant(&event);
        self.pending.retain(|e| std::mem::discriminant(e) != kind);
        self.pending.push_back(event);
    }

    /// Emits queued control events in order. On failure the rest stay
    /// queued for the next tick.
    async fn flush_pending(&mut self, report: &mut TickReport) -> Result<(), DomRelayError> {
        while let Some(event) = self.pending.front().cloned() {
            self.relay.emit(event).await?;
            match self.pending.pop_front() {
                Some(OutboundEvent::WorkspaceUpdate(_)) => report.workspace_updated = true,
                Some(OutboundEvent::ContextChanged(_)) => report.context_changed = true,
                _ => {}
            }
        }
        Ok(())
    }

    async fn read_page(&mut self) -> PageRead {
        let page = self.page.lock().await;

        let change = self.classifier.classify(&**page).await;
        let workspace = self.read_workspace(&**page).await;
        let records = match &change {
            ContextChange::Unknown { .. } => None,
            other => match other.current() {
                Some(context) => Some(page.snapshot(context).await),
                None => None,
            },
        };

        PageRead {
            change,
            workspace,
            records,
        }
    }

    /// Returns the workspace name and roster when the name differs from the
    /// last one seen. Failures are logged and retried next tick.
    async fn read_workspace(
        &self,
        page: &dyn PageAdapter,
    ) -> Option<(String, Option<WorkspaceRoster>)> {
        let name = match page.workspace_name().await {
            Ok(Some(name)) => name,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "could not read workspace name");
                return None;
            }
        };
        if self.workspace.as_deref() == Some(name.as_str()) {
            return None;
        }

        match page.workspace_roster().await {
            Ok(roster) => Some((name, roster)),
            Err(e) => {
                warn!(error = %e, workspace = name.as_str(), "could not read workspace roster");
                None
            }
        }
    }

    /// Seeds a context on first contact.
    ///
    /// The operator's last keyed message anchors the scan: in a thread it is
    /// the boundary, elsewhere it is the cursor. Without one, only the most
    /// recent few messages are relayed. A non-thread context with nothing
    /// keyed relayed then jumps its cursor to the newest key on screen.
    async fn reseed(
        &mut self,
        context: &Context,
        records: &[RawRecord],
    ) -> Result<usize, DomRelayError> {
        self.tracker.reset(context);

        let self_key = self.filter.last_self_key(records);
        let batch = match (context.thread_open, self_key) {
            (true, Some(key)) => self.filter.filter_new(context, records, None, Some(key)),
            (false, Some(key)) => self.filter.filter_new(context, records, Some(key), None),
            (_, None) => self
                .filter
                .recent_fallback(context, records, self.fallback_count),
        };
        debug!(
            context = %context,
            self_key = ?self_key,
            candidates = batch.len(),
            "reseeding"
        );

        let result = self.relay_batch(context, batch).await;

        if let Some(key) = self_key {
            self.tracker.advance(context, key);
        }

        // On a failed relay the cursor stays unanchored, so the next tick
        // falls back again instead of skipping what was not delivered.
        if result.is_ok() {
            if !context.thread_open
                && self.tracker.current(context).is_none()
                && let Some(high_water) = self.filter.high_water(records)
            {
                self.tracker.advance(context, high_water);
            }
            let visible = self.filter.candidates(context, records);
            self.tracker.mark_visible(context, &visible);
        }

        self.state = LoopState::Steady;
        result
    }

    /// Relays what is new since the cursor.
    async fn scan(
        &mut self,
        context: &Context,
        records: &[RawRecord],
    ) -> Result<usize, DomRelayError> {
        let cursor = self.tracker.current(context);
        let boundary = if context.thread_open {
            self.filter.last_self_key(records)
        } else {
            None
        };

        let batch = if cursor.is_none() && boundary.is_none() {
            self.filter
                .recent_fallback(context, records, self.fallback_count)
        } else {
            self.filter.filter_new(context, records, cursor, boundary)
        };

        self.relay_batch(context, batch).await
    }

    /// Emits messages in order, recording each one as it goes out.
    ///
    /// The first emit failure ends the batch; messages already emitted stay
    /// recorded and the rest are picked up by a later tick.
    async fn relay_batch(
        &mut self,
        context: &Context,
        batch: Vec<Message>,
    ) -> Result<usize, DomRelayError> {
        let batch = self.tracker.unseen(context, batch);
        let mut relayed = 0;

        for message in batch {
            let event = self.new_message_event(&message)?;
            self.relay.emit(OutboundEvent::NewMessage(event)).await?;
            self.tracker.record_relayed(context, &message);
            relayed += 1;
        }

        Ok(relayed)
    }

    fn new_message_event(&self, message: &Message) -> Result<NewMessageEvent, DomRelayError> {
        let sender_identity = match &self.hasher {
            Some(hasher) => hasher.hash(&message.sender)?,
            None => message.sender.clone(),
        };

        Ok(NewMessageEvent {
            content: message.content.clone(),
            sender_identity,
            ordering_key: message.ordering_key(),
            context_id: message.context_id.clone(),
            message_id: message.key.to_string(),
            user_id: self.user_id.clone(),
        })
    }
}
