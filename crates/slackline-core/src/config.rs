use std::{
    env, fs,
    path::Path,
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the bot.
///
/// Everything is read from the environment (with an optional `.env` file
/// for local runs). Values arrive as strings; the coercion helpers below
/// turn them into the typed fields explicitly rather than at use sites.
#[derive(Clone, Debug)]
pub struct Config {
    // Platform credentials / identity
    pub bot_token: String,
    pub bot_name: String,
    pub channels: Vec<String>,

    // Remote call behavior
    pub api_timeout: Duration,

    // Stream loop pacing
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,

    // Default send-as-bot identity
    pub send_as_user: bool,
    pub send_username: String,
    pub send_icon_url: Option<String>,
    pub send_icon_emoji: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("SLACK_BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "SLACK_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let bot_name = env_str("SLACK_BOT_NAME").unwrap_or_default();
        if bot_name.trim().is_empty() {
            return Err(Error::Config(
                "SLACK_BOT_NAME environment variable is required".to_string(),
            ));
        }

        let channels = parse_csv(&env_str("SLACK_CHANNELS").unwrap_or_default());
        if channels.is_empty() {
            return Err(Error::Config(
                "SLACK_CHANNELS environment variable is required".to_string(),
            ));
        }

        let api_timeout = Duration::from_millis(env_u64("SLACK_API_TIMEOUT_MS").unwrap_or(20_000));
        let poll_interval = Duration::from_millis(env_u64("RTM_POLL_INTERVAL_MS").unwrap_or(1_000));
        let reconnect_delay =
            Duration::from_millis(env_u64("RTM_RECONNECT_DELAY_MS").unwrap_or(5_000));

        let send_as_user = env_bool("BOT_SEND_AS_USER").unwrap_or(false);
        let send_username = env_str("BOT_USERNAME")
            .and_then(non_empty)
            .unwrap_or_else(|| bot_name.clone());
        let send_icon_url = env_str("BOT_ICON_URL").and_then(non_empty);
        let send_icon_emoji = env_str("BOT_ICON_EMOJI").and_then(non_empty);

        Ok(Self {
            bot_token,
            bot_name,
            channels,
            api_timeout,
            poll_interval,
            reconnect_delay,
            send_as_user,
            send_username,
            send_icon_url,
            send_icon_emoji,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| strip_quotes(s.trim()))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Strip one matching pair of surrounding quotes, if present.
fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let Some((key, val)) = parse_env_line(raw) else {
            continue;
        };
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_env_line(raw: &str) -> Option<(&str, String)> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (k, v) = line.split_once('=')?;
    let key = k.trim();
    if key.is_empty() {
        return None;
    }

    Some((key, strip_quotes(v.trim()).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_splits_trims_and_unquotes() {
        assert_eq!(
            parse_csv("general, random ,'dev-ops'"),
            vec!["general", "random", "dev-ops"]
        );
        assert!(parse_csv("").is_empty());
        assert!(parse_csv(" , ,").is_empty());
    }

    #[test]
    fn bool_coercion_accepts_common_spellings() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool(" yes "));
        assert!(parse_bool("on"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn quote_stripping_requires_a_matching_pair() {
        assert_eq!(strip_quotes("\"general\""), "general");
        assert_eq!(strip_quotes("'general'"), "general");
        assert_eq!(strip_quotes("\"general'"), "\"general'");
        assert_eq!(strip_quotes("'"), "'");
    }

    #[test]
    fn env_lines_skip_comments_and_keep_separators_in_values() {
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line("   "), None);
        assert_eq!(parse_env_line("=nope"), None);
        assert_eq!(
            parse_env_line("SLACK_BOT_TOKEN=xoxb-123=456"),
            Some(("SLACK_BOT_TOKEN", "xoxb-123=456".to_string()))
        );
        assert_eq!(
            parse_env_line("SLACK_BOT_NAME='free space'"),
            Some(("SLACK_BOT_NAME", "free space".to_string()))
        );
    }
}
