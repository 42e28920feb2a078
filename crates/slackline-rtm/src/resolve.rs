//! Startup resource resolution: display names to platform ids.
//!
//! Runs once per connect attempt. Resolution is all-or-nothing; a missing
//! name fails the whole attempt with an error naming the resource, so the
//! identifier cache can never be observed half-built.

use std::{collections::HashMap, time::Duration};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use slackline_core::{
    domain::{ChannelId, ResourceKind, UserId},
    Error, Result,
};

use crate::{
    api::ApiInvoker,
    model::{Channel, User},
};

/// The identity a connect attempt establishes: the bot's own id plus one
/// channel id per configured channel name, keyed lower-cased.
#[derive(Clone, Debug)]
pub struct ResolvedIdentity {
    pub bot_id: UserId,
    pub channels: HashMap<String, ChannelId>,
}

/// Resolve the bot name and every required channel name, or fail.
///
/// Bot names match case-sensitively; channel names match
/// case-insensitively because the platform lower-cases channel names on
/// creation. The asymmetry is platform convention, kept as-is.
pub async fn resolve_identity(
    invoker: &ApiInvoker,
    timeout: Duration,
    bot_name: &str,
    channel_names: &[String],
) -> Result<ResolvedIdentity> {
    let users = fetch_users(invoker, timeout).await;
    let bot_id = users
        .iter()
        .find(|u| u.name == bot_name)
        .map(|u| UserId(u.id.clone()))
        .ok_or_else(|| Error::Unresolved {
            kind: ResourceKind::User,
            name: bot_name.to_string(),
        })?;

    let known = fetch_channels(invoker, timeout).await;
    let mut channels = HashMap::new();
    for name in channel_names {
        let wanted = name.to_lowercase();
        let found = known
            .iter()
            .find(|c| c.name.to_lowercase() == wanted)
            .ok_or_else(|| Error::Unresolved {
                kind: ResourceKind::Channel,
                name: name.clone(),
            })?;
        channels.insert(wanted, ChannelId(found.id.clone()));
    }

    debug!(bot_id = %bot_id, channels = channels.len(), "resolved identity");
    Ok(ResolvedIdentity { bot_id, channels })
}

/// All known users, or empty when the call fails.
pub(crate) async fn fetch_users(invoker: &ApiInvoker, timeout: Duration) -> Vec<User> {
    let body = invoker
        .invoke_or_default("users.list", json!({}), timeout, json!({}))
        .await;
    parse_list(body, "members")
}

/// All known channels, or empty when the call fails.
pub(crate) async fn fetch_channels(invoker: &ApiInvoker, timeout: Duration) -> Vec<Channel> {
    let body = invoker
        .invoke_or_default("channels.list", json!({}), timeout, json!({}))
        .await;
    parse_list(body, "channels")
}

fn parse_list<T: DeserializeOwned>(mut body: Value, key: &str) -> Vec<T> {
    body.get_mut(key)
        .map(Value::take)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}
