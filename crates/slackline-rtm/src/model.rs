//! Wire types for the Web API surface the bot consumes.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A platform user as returned by `users.info` / `users.list`. Only the
/// id and name are interpreted; everything else rides along untyped.
#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

/// A platform channel as returned by `channels.info` / `channels.list`.
#[derive(Clone, Debug, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

/// Options for `chat.postMessage`.
///
/// Identity fields (`username`, icons) only apply when the message is not
/// posted as the authed user; `reply_broadcast` only applies to threaded
/// replies. [`build_post_params`] enforces both rules.
#[derive(Clone, Debug)]
pub struct MessageOptions {
    pub parse: Option<String>,
    pub link_names: bool,
    pub attachments: Option<Value>,
    pub unfurl_links: bool,
    pub unfurl_media: bool,
    pub as_user: Option<bool>,
    pub username: Option<String>,
    pub icon_url: Option<String>,
    pub icon_emoji: Option<String>,
    pub thread_ts: Option<String>,
    pub reply_broadcast: bool,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            parse: None,
            link_names: true,
            attachments: None,
            unfurl_links: true,
            unfurl_media: false,
            as_user: None,
            username: None,
            icon_url: None,
            icon_emoji: None,
            thread_ts: None,
            reply_broadcast: false,
        }
    }
}

/// Shape the `chat.postMessage` parameter object from fully-merged
/// options. `channel` must already be an id.
pub(crate) fn build_post_params(channel: &str, text: &str, opts: &MessageOptions) -> Value {
    let as_user = opts.as_user.unwrap_or(false);

    let mut params = Map::new();
    params.insert("channel".to_string(), Value::from(channel));
    params.insert("text".to_string(), Value::from(text));
    params.insert("link_names".to_string(), Value::from(opts.link_names));
    params.insert("unfurl_links".to_string(), Value::from(opts.unfurl_links));
    params.insert("unfurl_media".to_string(), Value::from(opts.unfurl_media));
    params.insert("as_user".to_string(), Value::from(as_user));

    if let Some(parse) = &opts.parse {
        params.insert("parse".to_string(), Value::from(parse.as_str()));
    }
    if let Some(attachments) = &opts.attachments {
        params.insert("attachments".to_string(), attachments.clone());
    }

    if !as_user {
        if let Some(username) = &opts.username {
            params.insert("username".to_string(), Value::from(username.as_str()));
        }
        if let Some(icon_url) = &opts.icon_url {
            params.insert("icon_url".to_string(), Value::from(icon_url.as_str()));
        }
        if let Some(icon_emoji) = &opts.icon_emoji {
            params.insert("icon_emoji".to_string(), Value::from(icon_emoji.as_str()));
        }
    }

    if let Some(thread_ts) = &opts.thread_ts {
        params.insert("thread_ts".to_string(), Value::from(thread_ts.as_str()));
        if opts.reply_broadcast {
            params.insert("reply_broadcast".to_string(), Value::from(true));
        }
    }

    Value::Object(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn resources_keep_unknown_attributes() {
        let user: User = serde_json::from_value(json!({
            "id": "U1",
            "name": "arbiter",
            "is_bot": true,
            "tz": "Europe/Paris",
        }))
        .unwrap();

        assert_eq!(user.id, "U1");
        assert_eq!(user.attrs["is_bot"], json!(true));
        assert_eq!(user.attrs["tz"], json!("Europe/Paris"));
    }

    #[test]
    fn identity_fields_are_dropped_when_posting_as_user() {
        let opts = MessageOptions {
            as_user: Some(true),
            username: Some("bot".to_string()),
            icon_url: Some("https://example.com/icon.png".to_string()),
            icon_emoji: Some(":robot_face:".to_string()),
            ..MessageOptions::default()
        };
        let params = build_post_params("C1", "hello", &opts);

        assert_eq!(params["as_user"], json!(true));
        assert!(params.get("username").is_none());
        assert!(params.get("icon_url").is_none());
        assert!(params.get("icon_emoji").is_none());
    }

    #[test]
    fn identity_fields_are_sent_for_bot_identity_posts() {
        let opts = MessageOptions {
            as_user: Some(false),
            username: Some("arbiter".to_string()),
            icon_url: Some("https://example.com/icon.png".to_string()),
            ..MessageOptions::default()
        };
        let params = build_post_params("C1", "hello", &opts);

        assert_eq!(params["username"], json!("arbiter"));
        assert_eq!(params["icon_url"], json!("https://example.com/icon.png"));
    }

    #[test]
    fn reply_broadcast_requires_a_thread() {
        let no_thread = MessageOptions {
            reply_broadcast: true,
            ..MessageOptions::default()
        };
        let params = build_post_params("C1", "hello", &no_thread);
        assert!(params.get("thread_ts").is_none());
        assert!(params.get("reply_broadcast").is_none());

        let threaded = MessageOptions {
            thread_ts: Some("1700000000.000100".to_string()),
            reply_broadcast: true,
            ..MessageOptions::default()
        };
        let params = build_post_params("C1", "hello", &threaded);
        assert_eq!(params["thread_ts"], json!("1700000000.000100"));
        assert_eq!(params["reply_broadcast"], json!(true));
    }

    #[test]
    fn defaults_match_the_send_surface() {
        let params = build_post_params("C1", "hello", &MessageOptions::default());

        assert_eq!(params["channel"], json!("C1"));
        assert_eq!(params["text"], json!("hello"));
        assert_eq!(params["link_names"], json!(true));
        assert_eq!(params["unfurl_links"], json!(true));
        assert_eq!(params["unfurl_media"], json!(false));
        assert_eq!(params["as_user"], json!(false));
        assert!(params.get("parse").is_none());
    }
}
