//! Reconnect/poll state machine for the long-lived event stream.
//!
//! The loop has no terminal state: it connects, polls, and on any failure
//! drops back to disconnected and tries again after a delay, for the
//! lifetime of the process. Both pauses (reconnect delay, poll interval)
//! observe a cancellation token so a deployment can shut down cleanly and
//! tests can step the machine deterministically.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{event::EventDispatcher, ports::EventSource, Result};

/// Where the stream loop currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Streaming,
}

pub struct StreamManager {
    source: Arc<dyn EventSource>,
    dispatcher: Arc<EventDispatcher>,
    poll_interval: Duration,
    reconnect_delay: Duration,
    state: StreamState,
    /// Set after any failure; the next `Disconnected -> Connecting` edge
    /// waits the reconnect delay first. The very first connect is
    /// immediate.
    reconnect_pending: bool,
}

impl StreamManager {
    pub fn new(
        source: Arc<dyn EventSource>,
        dispatcher: Arc<EventDispatcher>,
        poll_interval: Duration,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            source,
            dispatcher,
            poll_interval,
            reconnect_delay,
            state: StreamState::Disconnected,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Run the loop until cancelled. No error escapes: every failure is
    /// logged and converted into a reconnect.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("stream manager starting");
        while !cancel.is_cancelled() {
            self.step(&cancel).await;
        }
        info!("stream manager stopped");
    }

    /// Perform exactly one transition (or one poll cycle while streaming)
    /// and return the resulting state. Cancellation during a pause leaves
    /// the state unchanged.
    pub async fn step(&mut self, cancel: &CancellationToken) -> StreamState {
        match self.state {
            StreamState::Disconnected => {
                if self.reconnect_pending && !pause(cancel, self.reconnect_delay).await {
                    return self.state;
                }
                self.state = StreamState::Connecting;
            }
            StreamState::Connecting => match self.source.connect().await {
                Ok(()) => {
                    info!("event stream connected");
                    self.state = StreamState::Streaming;
                }
                Err(e) => {
                    warn!(error = %e, "connect attempt failed");
                    self.reconnect_pending = true;
                    self.state = StreamState::Disconnected;
                }
            },
            StreamState::Streaming => match self.poll_once().await {
                Ok(count) => {
                    if count > 0 {
                        debug!(count, "dispatched events");
                    }
                    pause(cancel, self.poll_interval).await;
                }
                Err(e) => {
                    warn!(error = %e, "streaming session ended");
                    self.source.disconnect().await;
                    self.reconnect_pending = true;
                    self.state = StreamState::Disconnected;
                }
            },
        }
        self.state
    }

    /// One poll cycle: read a batch and dispatch each event in receipt
    /// order.
    async fn poll_once(&self) -> Result<usize> {
        let events = self.source.poll().await?;
        let count = events.len();
        for event in events {
            self.dispatcher.dispatch(event).await?;
        }
        Ok(count)
    }
}

/// Sleep for `duration` unless cancelled first. Returns false when the
/// pause was interrupted by cancellation.
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    use crate::event::{Event, EventHandler};
    use crate::Error;

    const POLL: Duration = Duration::from_millis(50);
    const RECONNECT: Duration = Duration::from_millis(700);

    struct ScriptedSource {
        connects: Mutex<VecDeque<Result<()>>>,
        polls: Mutex<VecDeque<Result<Vec<Event>>>>,
        disconnects: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(connects: Vec<Result<()>>, polls: Vec<Result<Vec<Event>>>) -> Arc<Self> {
            Arc::new(Self {
                connects: Mutex::new(connects.into()),
                polls: Mutex::new(polls.into()),
                disconnects: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn connect(&self) -> Result<()> {
            self.connects.lock().await.pop_front().unwrap_or(Ok(()))
        }

        async fn poll(&self) -> Result<Vec<Event>> {
            self.polls
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager(source: Arc<ScriptedSource>) -> StreamManager {
        StreamManager::new(
            source,
            Arc::new(EventDispatcher::new()),
            POLL,
            RECONNECT,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failure_reconnects_after_the_delay() {
        let source = ScriptedSource::new(
            vec![Ok(()), Ok(())],
            vec![
                Ok(Vec::new()),
                Err(Error::Transport("stream read failed".to_string())),
            ],
        );
        let mut mgr = manager(source.clone());
        let cancel = CancellationToken::new();

        assert_eq!(mgr.state(), StreamState::Disconnected);
        assert_eq!(mgr.step(&cancel).await, StreamState::Connecting);
        assert_eq!(mgr.step(&cancel).await, StreamState::Streaming);
        assert_eq!(mgr.step(&cancel).await, StreamState::Streaming);
        assert_eq!(mgr.step(&cancel).await, StreamState::Disconnected);
        assert_eq!(source.disconnects.load(Ordering::SeqCst), 1);

        // The failed session must not be reentered before the reconnect
        // delay has passed.
        let before = Instant::now();
        assert_eq!(mgr.step(&cancel).await, StreamState::Connecting);
        assert_eq!(before.elapsed(), RECONNECT);
        assert_eq!(mgr.step(&cancel).await, StreamState::Streaming);
    }

    #[tokio::test(start_paused = true)]
    async fn first_connect_is_immediate_and_failures_retry_forever() {
        let source = ScriptedSource::new(
            vec![
                Err(Error::Transport("no route".to_string())),
                Err(Error::Transport("no route".to_string())),
                Ok(()),
            ],
            Vec::new(),
        );
        let mut mgr = manager(source);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        assert_eq!(mgr.step(&cancel).await, StreamState::Connecting);
        assert_eq!(start.elapsed(), Duration::ZERO);

        assert_eq!(mgr.step(&cancel).await, StreamState::Disconnected);
        assert_eq!(mgr.step(&cancel).await, StreamState::Connecting);
        assert_eq!(start.elapsed(), RECONNECT);

        assert_eq!(mgr.step(&cancel).await, StreamState::Disconnected);
        assert_eq!(mgr.step(&cancel).await, StreamState::Connecting);
        assert_eq!(start.elapsed(), RECONNECT * 2);

        assert_eq!(mgr.step(&cancel).await, StreamState::Streaming);
    }

    #[tokio::test(start_paused = true)]
    async fn events_are_dispatched_in_receipt_order() {
        #[derive(Default)]
        struct Recorder {
            texts: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl EventHandler for Recorder {
            async fn handle(&self, payload: serde_json::Value) -> Result<()> {
                let text = payload["text"].as_str().unwrap_or_default().to_string();
                self.texts.lock().await.push(text);
                Ok(())
            }
        }

        let recorder = Arc::new(Recorder::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register("message", recorder.clone());

        let source = ScriptedSource::new(
            vec![Ok(())],
            vec![Ok(vec![
                Event::new("message", json!({"text": "first"})),
                Event::new("message", json!({"text": "second"})),
            ])],
        );
        let mut mgr = StreamManager::new(source, Arc::new(dispatcher), POLL, RECONNECT);
        let cancel = CancellationToken::new();

        mgr.step(&cancel).await;
        mgr.step(&cancel).await;
        mgr.step(&cancel).await;

        assert_eq!(recorder.texts.lock().await.as_slice(), &["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_failure_ends_the_session() {
        struct Failing;

        #[async_trait]
        impl EventHandler for Failing {
            async fn handle(&self, _payload: serde_json::Value) -> Result<()> {
                Err(Error::External("handler broke".to_string()))
            }
        }

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register("message", Arc::new(Failing));

        let source = ScriptedSource::new(
            vec![Ok(())],
            vec![Ok(vec![Event::new("message", json!({}))])],
        );
        let mut mgr = StreamManager::new(source.clone(), Arc::new(dispatcher), POLL, RECONNECT);
        let cancel = CancellationToken::new();

        mgr.step(&cancel).await;
        mgr.step(&cancel).await;
        assert_eq!(mgr.step(&cancel).await, StreamState::Disconnected);
        assert_eq!(source.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop() {
        let source = ScriptedSource::new(
            vec![Err(Error::Transport("still down".to_string()))],
            Vec::new(),
        );
        let mgr = manager(source);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(mgr.run(cancel.clone()));
        tokio::task::yield_now().await;
        cancel.cancel();

        handle.await.expect("run task should exit cleanly");
    }
}
