//! Slack adapter: a resilient client facade over the Web API and the RTM
//! event stream.
//!
//! The facade owns the lazily-established stream session and the resolved
//! identifier cache, and implements the `slackline-core` ports so the
//! stream manager can drive it. Everything platform-specific (wire
//! shapes, retry classification, websocket handling) stays in this crate.

pub mod api;
pub mod model;
pub mod resolve;
pub mod rtm;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{error, info};

use slackline_core::{
    config::Config,
    domain::{ChannelId, UserId},
    event::Event,
    ports::EventSource,
    Error, Result,
};

use crate::{
    api::{ApiInvoker, ApiTransport, CallOutcome, HttpTransport},
    model::{build_post_params, Channel, MessageOptions, User},
    resolve::{fetch_channels, fetch_users, resolve_identity},
    rtm::{event_from_frame, RtmConnector, StreamConnection, StreamConnector},
};

/// The client facade. One logical instance per process, created
/// explicitly and shared by `Arc`.
pub struct SlackClient {
    cfg: Arc<Config>,
    invoker: ApiInvoker,
    connector: Arc<dyn StreamConnector>,
    session: Mutex<Option<Session>>,
}

/// Everything a live connection consists of. Bundling the stream handle
/// with the resolved identity means a caller can never observe a
/// connection whose identifier cache is only partially built.
struct Session {
    conn: Box<dyn StreamConnection>,
    bot_id: UserId,
    channels: HashMap<String, ChannelId>,
}

impl SlackClient {
    pub fn new(cfg: Arc<Config>) -> Self {
        let transport = Arc::new(HttpTransport::new(cfg.bot_token.clone()));
        Self::with_parts(cfg, transport, Arc::new(RtmConnector))
    }

    /// Assemble a facade from explicit parts (tests, alternate
    /// transports).
    pub fn with_parts(
        cfg: Arc<Config>,
        transport: Arc<dyn ApiTransport>,
        connector: Arc<dyn StreamConnector>,
    ) -> Self {
        Self {
            cfg,
            invoker: ApiInvoker::new(transport),
            connector,
            session: Mutex::new(None),
        }
    }

    fn timeout(&self) -> Duration {
        self.cfg.api_timeout
    }

    /// Establish the connection if there is none, idempotently.
    ///
    /// A fresh attempt opens the stream session, probes the API, then
    /// resolves the configured names. Any failure leaves the handle
    /// absent; there is no partially-initialized state to observe.
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }

        info!("initializing Slack client");
        match self.open_session().await {
            Ok(fresh) => {
                info!(bot_id = %fresh.bot_id, channels = fresh.channels.len(), "Slack client ready");
                *session = Some(fresh);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to initialize Slack client");
                Err(e)
            }
        }
    }

    async fn open_session(&self) -> Result<Session> {
        let body = match self
            .invoker
            .invoke("rtm.connect", json!({}), self.timeout())
            .await
        {
            CallOutcome::Success(body) => body,
            CallOutcome::SoftFailure(e) => {
                return Err(Error::Transport(format!("rtm.connect rejected: {e}")));
            }
            CallOutcome::TransportFailure(e) => return Err(e),
        };
        let url = body
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Transport("rtm.connect returned no stream url".to_string()))?;
        let conn = self.connector.open(url).await?;

        if !self.is_api_working().await {
            return Err(Error::Transport("api.test did not return ok".to_string()));
        }

        let identity = resolve_identity(
            &self.invoker,
            self.timeout(),
            &self.cfg.bot_name,
            &self.cfg.channels,
        )
        .await?;

        Ok(Session {
            conn,
            bot_id: identity.bot_id,
            channels: identity.channels,
        })
    }

    /// Lightweight liveness probe.
    pub async fn is_api_working(&self) -> bool {
        matches!(
            self.invoker.invoke("api.test", json!({}), self.timeout()).await,
            CallOutcome::Success(_)
        )
    }

    /// Read the next batch of events from the stream, possibly empty. A
    /// stream error invalidates the whole session before it is returned;
    /// the next connect rebuilds identity from scratch.
    pub async fn poll(&self) -> Result<Vec<Event>> {
        let mut session = self.session.lock().await;
        let Some(current) = session.as_mut() else {
            return Err(Error::NotConnected);
        };

        match current.conn.read_batch().await {
            Ok(frames) => Ok(frames.into_iter().filter_map(event_from_frame).collect()),
            Err(e) => {
                *session = None;
                Err(e)
            }
        }
    }

    /// Drop the connection, if any.
    pub async fn disconnect(&self) {
        *self.session.lock().await = None;
    }

    /// The resolved bot id, when connected.
    pub async fn bot_id(&self) -> Option<UserId> {
        self.session.lock().await.as_ref().map(|s| s.bot_id.clone())
    }

    /// The resolved id for a configured channel name, when connected.
    /// Lookup is lower-cased, matching how the cache is keyed.
    pub async fn channel_id(&self, name: &str) -> Option<ChannelId> {
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|s| s.channels.get(&name.to_lowercase()).cloned())
    }

    pub async fn get_user(&self, id: &UserId) -> Option<User> {
        let body = self
            .invoker
            .invoke_or_default(
                "users.info",
                json!({"user": id.0}),
                self.timeout(),
                json!({}),
            )
            .await;
        take_object(body, "user")
    }

    pub async fn get_users(&self) -> Vec<User> {
        fetch_users(&self.invoker, self.timeout()).await
    }

    pub async fn get_channel(&self, id: &ChannelId) -> Option<Channel> {
        let body = self
            .invoker
            .invoke_or_default(
                "channels.info",
                json!({"channel": id.0}),
                self.timeout(),
                json!({}),
            )
            .await;
        take_object(body, "channel")
    }

    pub async fn get_channels(&self) -> Vec<Channel> {
        fetch_channels(&self.invoker, self.timeout()).await
    }

    /// Post a message. `channel` may be a configured channel name (it is
    /// resolved through the identifier cache) or a raw id, which passes
    /// through untouched. Returns the posted message payload, or an empty
    /// object when the call fails.
    pub async fn send_message(&self, channel: &str, text: &str, opts: MessageOptions) -> Value {
        let target = match self.channel_id(channel).await {
            Some(id) => id.0,
            None => channel.to_string(),
        };
        let opts = self.with_identity_defaults(opts);
        let params = build_post_params(&target, text, &opts);

        let body = self
            .invoker
            .invoke_or_default("chat.postMessage", params, self.timeout(), json!({}))
            .await;
        body.get("message").cloned().unwrap_or_else(|| json!({}))
    }

    /// Fill unset identity options from the configured send-as-bot
    /// defaults.
    fn with_identity_defaults(&self, mut opts: MessageOptions) -> MessageOptions {
        if opts.as_user.is_none() {
            opts.as_user = Some(self.cfg.send_as_user);
        }
        if opts.as_user == Some(false) {
            if opts.username.is_none() {
                opts.username = Some(self.cfg.send_username.clone());
            }
            if opts.icon_url.is_none() {
                opts.icon_url = self.cfg.send_icon_url.clone();
            }
            if opts.icon_emoji.is_none() {
                opts.icon_emoji = self.cfg.send_icon_emoji.clone();
            }
        }
        opts
    }
}

#[async_trait]
impl EventSource for SlackClient {
    async fn connect(&self) -> Result<()> {
        SlackClient::connect(self).await
    }

    async fn poll(&self) -> Result<Vec<Event>> {
        SlackClient::poll(self).await
    }

    async fn disconnect(&self) {
        SlackClient::disconnect(self).await;
    }
}

fn take_object<T: DeserializeOwned>(mut body: Value, key: &str) -> Option<T> {
    body.get_mut(key)
        .map(Value::take)
        .and_then(|v| serde_json::from_value(v).ok())
}
