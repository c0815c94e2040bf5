//! Live telemetry feed aggregator
//!
//! One aggregator per mounted domain view. It merges two sources into a
//! single bounded, time-ordered window: a push-based live channel (append one
//! sample, evict the oldest) and a one-shot historical backfill (replace the
//! window wholesale). Transport and parse failures are logged and dropped;
//! nothing here propagates an error to the event loop.
//!
//! Lifecycle: `Unstarted → BackfillPending → Live → TornDown`. `Live` is
//! reached once either the backfill completes or the first live message
//! arrives; only `TornDown` is terminal.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info};

use crate::client::{BackfillClient, LiveChannel};
use crate::error::Result;
use crate::sample::{Sample, SampleBuffer};
use crate::schema::{Domain, DomainSchema};

/// Aggregator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    /// Created, not yet initialized
    Unstarted,
    /// Subscribed, waiting for the backfill to resolve
    BackfillPending,
    /// At least one source has delivered data
    Live,
    /// Torn down; terminal
    TornDown,
}

/// Renderer-facing view of one domain's window
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    /// Domain this snapshot belongs to
    pub domain: Domain,

    /// Aggregator state at snapshot time
    pub state: FeedState,

    /// Ordered `{time, ...fields}` rows, oldest first
    pub rows: Vec<Value>,

    /// Most recent sample, if any
    pub latest: Option<Sample>,

    /// Timestamp of the most recent sample
    pub updated_at: Option<DateTime<Utc>>,
}

struct AggregatorInner {
    schema: DomainSchema,
    channel: Arc<dyn LiveChannel>,
    backfill: Arc<BackfillClient>,
    buffer: RwLock<SampleBuffer>,
    state: RwLock<FeedState>,
    mounted: AtomicBool,
    initialized: AtomicBool,
    renders: watch::Sender<FeedSnapshot>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

/// Bounded rolling window over one domain's live feed and backfill
#[derive(Clone)]
pub struct FeedAggregator {
    inner: Arc<AggregatorInner>,
}

impl FeedAggregator {
    /// Create an aggregator for a domain schema with injected transports
    pub fn new(
        schema: DomainSchema,
        channel: Arc<dyn LiveChannel>,
        backfill: Arc<BackfillClient>,
        capacity: usize,
    ) -> Self {
        let initial = FeedSnapshot {
            domain: schema.domain,
            state: FeedState::Unstarted,
            rows: Vec::new(),
            latest: None,
            updated_at: None,
        };
        let (renders, _) = watch::channel(initial);

        Self {
            inner: Arc::new(AggregatorInner {
                schema,
                channel,
                backfill,
                buffer: RwLock::new(SampleBuffer::new(capacity)),
                state: RwLock::new(FeedState::Unstarted),
                mounted: AtomicBool::new(true),
                initialized: AtomicBool::new(false),
                renders,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Domain this aggregator serves
    pub fn domain(&self) -> Domain {
        self.inner.schema.domain
    }

    /// Field schema driving this aggregator
    pub fn schema(&self) -> &DomainSchema {
        &self.inner.schema
    }

    /// Current lifecycle state
    pub async fn state(&self) -> FeedState {
        *self.inner.state.read().await
    }

    /// Subscribe to the live event and issue exactly one backfill fetch.
    ///
    /// Calling this more than once per mount is a no-op; the live
    /// subscription is never duplicated. After teardown the aggregator is
    /// terminal and initialize does nothing.
    pub async fn initialize(&self) -> Result<()> {
        if !self.inner.mounted.load(Ordering::SeqCst) {
            debug!("{}: initialize after teardown, ignoring", self.domain());
            return Ok(());
        }
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            debug!("{}: initialize called twice, ignoring", self.domain());
            return Ok(());
        }

        let mut live_rx = match self.inner.channel.subscribe(&self.inner.schema.event).await {
            Ok(rx) => rx,
            Err(e) => {
                // Failed mount stays retryable
                self.inner.initialized.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        info!(
            "{}: subscribed to live event {:?}",
            self.domain(),
            self.inner.schema.event
        );

        *self.inner.state.write().await = FeedState::BackfillPending;

        let live_agg = self.clone();
        let live_task = tokio::spawn(async move {
            while let Some(payload) = live_rx.recv().await {
                live_agg.on_live_message(&payload).await;
            }
        });

        let backfill_agg = self.clone();
        let backfill_task = tokio::spawn(async move {
            let result = backfill_agg
                .inner
                .backfill
                .fetch(&backfill_agg.inner.schema)
                .await;
            backfill_agg.on_backfill_result(result).await;
        });

        let mut tasks = self.inner.tasks.lock().await;
        tasks.push(live_task);
        tasks.push(backfill_task);
        Ok(())
    }

    /// Apply the outcome of the backfill fetch.
    ///
    /// A successful batch replaces the window wholesale, discarding whatever
    /// live data arrived first. A failed fetch leaves the window untouched.
    /// After teardown the result is ignored entirely.
    pub async fn on_backfill_result(&self, result: Result<Vec<Sample>>) {
        if !self.inner.mounted.load(Ordering::SeqCst) {
            debug!("{}: backfill resolved after teardown, ignoring", self.domain());
            return;
        }

        match result {
            Ok(samples) => {
                debug!("{}: backfill delivered {} samples", self.domain(), samples.len());
                {
                    // Teardown flips `mounted` under this same lock; re-check
                    // while holding it so nothing mutates after teardown
                    // completed
                    let mut buffer = self.inner.buffer.write().await;
                    if !self.inner.mounted.load(Ordering::SeqCst) {
                        return;
                    }
                    buffer.replace(samples);
                }
                self.mark_live().await;
                self.publish_render().await;
            }
            Err(e) => {
                error!("{}: backfill fetch failed: {e}", self.domain());
            }
        }
    }

    /// Apply one raw live payload.
    ///
    /// The payload is parsed as JSON and projected through the domain schema
    /// with the receipt time as timestamp. Payloads missing any required
    /// numeric field are dropped silently.
    pub async fn on_live_message(&self, payload: &str) {
        if !self.inner.mounted.load(Ordering::SeqCst) {
            return;
        }

        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                debug!("{}: unparsable live payload dropped: {e}", self.domain());
                return;
            }
        };

        let fields = match self.inner.schema.project(&value) {
            Some(fields) => fields,
            None => {
                debug!("{}: live payload missing required fields, dropped", self.domain());
                return;
            }
        };

        {
            let mut buffer = self.inner.buffer.write().await;
            if !self.inner.mounted.load(Ordering::SeqCst) {
                return;
            }
            buffer.push(Sample::new(Utc::now(), fields));
        }
        self.mark_live().await;
        self.publish_render().await;
    }

    /// Unsubscribe from the live channel and stop all tasks.
    ///
    /// Safe to call before `initialize` completed, and more than once. Any
    /// in-flight backfill fetch becomes a no-op.
    pub async fn teardown(&self) {
        {
            // Taken so no mutator that already passed its mounted check is
            // still holding the window
            let _buffer = self.inner.buffer.write().await;
            self.inner.mounted.store(false, Ordering::SeqCst);
        }

        for task in self.inner.tasks.lock().await.drain(..) {
            task.abort();
        }

        if let Err(e) = self.inner.channel.unsubscribe(&self.inner.schema.event).await {
            error!("{}: unsubscribe failed: {e}", self.domain());
        }

        *self.inner.state.write().await = FeedState::TornDown;
        info!("{}: torn down", self.domain());
    }

    /// Renderer-facing snapshot of the current window
    pub async fn snapshot(&self) -> FeedSnapshot {
        let buffer = self.inner.buffer.read().await;
        let state = *self.inner.state.read().await;
        FeedSnapshot {
            domain: self.domain(),
            state,
            rows: buffer.as_rows(),
            latest: buffer.latest().cloned(),
            updated_at: buffer.latest().map(|s| s.timestamp),
        }
    }

    /// Watch channel publishing a snapshot on every window change
    pub fn subscribe_renders(&self) -> watch::Receiver<FeedSnapshot> {
        self.inner.renders.subscribe()
    }

    async fn mark_live(&self) {
        let mut state = self.inner.state.write().await;
        if *state != FeedState::TornDown {
            *state = FeedState::Live;
        }
    }

    async fn publish_render(&self) {
        if !self.inner.mounted.load(Ordering::SeqCst) {
            return;
        }
        self.inner.renders.send_replace(self.snapshot().await);
    }
}
