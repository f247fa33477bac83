use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tokio::sync::mpsc;

use crate::{Event, EventHandler, EventType, HandlerRef};

const HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

/// Options controlling how a subscription is dispatched.
#[derive(Debug, Clone, Copy)]
pub struct SubscribeOptions {
    /// Higher priority subscribers are invoked first.
    pub priority: i32,
    /// Retries attempted after a handler errors or times out, with exponential delay.
    pub max_retries: u32,
    /// If true, this handler is awaited in priority order before any async subscriber for the
    /// same event runs, letting it observe the event before the publisher's next step proceeds.
    /// If false (the default), the handler runs concurrently via `tokio::spawn`.
    pub sync: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            max_retries: 0,
            sync: false,
        }
    }
}

struct Subscription {
    types: Vec<EventType>,
    handler: HandlerRef,
    opts: SubscribeOptions,
}

struct Inner {
    subscriptions: Mutex<Vec<Subscription>>,
    dropped: AtomicU64,
    history: Mutex<VecDeque<Event>>,
    history_limit: usize,
}

/// A bounded, multi-subscriber event bus. Cloning shares the same underlying channel and
/// subscriber list.
#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::Sender<Event>,
    inner: Arc<Inner>,
}

impl EventBus {
    /// Start a new bus with the given channel capacity and rolling-history size, spawning its
    /// dispatch worker on the current Tokio runtime.
    pub fn new(capacity: usize, history_limit: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        let inner = Arc::new(Inner {
            subscriptions: Mutex::new(Vec::new()),
            dropped: AtomicU64::new(0),
            history: Mutex::new(VecDeque::with_capacity(history_limit)),
            history_limit,
        });

        tokio::spawn(dispatch_loop(receiver, Arc::clone(&inner)));

        Self { sender, inner }
    }

    /// Register a handler for one or more event types.
    pub fn subscribe(&self, types: Vec<EventType>, handler: HandlerRef, opts: SubscribeOptions) {
        let mut subs = self.inner.subscriptions.lock().expect("subscriptions lock poisoned");
        subs.push(Subscription { types, handler, opts });
        subs.sort_by(|a, b| b.opts.priority.cmp(&a.opts.priority));
    }

    /// Enqueue an event. Returns `false` (and increments the drop counter) if the channel is
    /// full; never blocks.
    pub fn publish(&self, event: Event) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("event bus full, dropping event");
                false
            }
        }
    }

    /// Total events dropped because the channel was full.
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Snapshot of the last `history_limit` published events, oldest first.
    pub fn history(&self) -> Vec<Event> {
        self.inner.history.lock().expect("history lock poisoned").iter().cloned().collect()
    }
}

async fn dispatch_loop(mut receiver: mpsc::Receiver<Event>, inner: Arc<Inner>) {
    while let Some(event) = receiver.recv().await {
        {
            let mut history = inner.history.lock().expect("history lock poisoned");
            if history.len() >= inner.history_limit && inner.history_limit > 0 {
                history.pop_front();
            }
            if inner.history_limit > 0 {
                history.push_back(event.clone());
            }
        }

        // `subscriptions` is kept sorted descending by priority (see `subscribe`), so this
        // preserves priority order for both groups below.
        let matching: Vec<(HandlerRef, SubscribeOptions)> = {
            let subs = inner.subscriptions.lock().expect("subscriptions lock poisoned");
            subs.iter()
                .filter(|s| s.types.contains(&event.event_type))
                .map(|s| (Arc::clone(&s.handler), s.opts))
                .collect()
        };

        let (sync, concurrent): (Vec<_>, Vec<_>) = matching.into_iter().partition(|(_, opts)| opts.sync);

        for (handler, opts) in sync {
            invoke_with_retries(handler, event.clone(), opts).await;
        }

        for (handler, opts) in concurrent {
            let event = event.clone();
            tokio::spawn(async move { invoke_with_retries(handler, event, opts).await });
        }
    }
}

async fn invoke_with_retries(handler: HandlerRef, event: Event, opts: SubscribeOptions) {
    let mut attempt = 0u32;
    loop {
        match tokio::time::timeout(HANDLER_TIMEOUT, handler.handle(&event)).await {
            Ok(Ok(())) => return,
            Ok(Err(err)) => log::warn!("event handler failed on attempt {attempt}: {err}"),
            Err(_) => log::warn!("event handler timed out after {HANDLER_TIMEOUT:?} on attempt {attempt}"),
        }

        if attempt >= opts.max_retries {
            return;
        }

        tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
        attempt += 1;
    }
}
