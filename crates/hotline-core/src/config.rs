use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::{domain::UserId, errors::Error, Result};

/// Sessions without customer activity for this long are closed by the sweeper.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
/// How often the sweeper looks for idle sessions.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_STOP_TOKEN: &str = "/stop";
pub const DEFAULT_CHAT_TOKEN: &str = "/chat";

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub manager_id: UserId,

    // Operator directives (`<stop>_<id>`, `<chat>_<id> text`)
    pub stop_token: String,
    pub chat_token: String,

    // Session lifecycle
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = lookup("BOT_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("BOT_TOKEN environment variable is required".to_string())
        })?;

        let manager_raw = lookup("MANAGER_ID").and_then(non_empty).ok_or_else(|| {
            Error::Config("MANAGER_ID environment variable is required".to_string())
        })?;
        let manager_id = match manager_raw.trim().parse::<i64>() {
            Ok(0) | Err(_) => {
                return Err(Error::Config(format!(
                    "MANAGER_ID must be a non-zero numeric chat id, got {manager_raw:?}"
                )))
            }
            Ok(id) => UserId(id),
        };

        let stop_token = directive_token(&lookup, "HOTLINE_STOP_TOKEN", DEFAULT_STOP_TOKEN)?;
        let chat_token = directive_token(&lookup, "HOTLINE_CHAT_TOKEN", DEFAULT_CHAT_TOKEN)?;
        if stop_token == chat_token {
            return Err(Error::Config(
                "HOTLINE_STOP_TOKEN and HOTLINE_CHAT_TOKEN must differ".to_string(),
            ));
        }

        let audit_log_path = PathBuf::from(
            lookup("AUDIT_LOG_PATH")
                .and_then(non_empty)
                .unwrap_or_else(|| "/tmp/hotline-audit.log".to_string()),
        );
        let audit_log_json = lookup("AUDIT_LOG_JSON")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);

        Ok(Self {
            bot_token,
            manager_id,
            stop_token,
            chat_token,
            idle_timeout: IDLE_TIMEOUT,
            sweep_interval: SWEEP_INTERVAL,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn directive_token(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<String> {
    let Some(raw) = lookup(key).and_then(non_empty) else {
        return Ok(default.to_string());
    };
    let token = raw.trim().to_string();
    if token.chars().any(|c| c.is_whitespace() || c == '_') {
        return Err(Error::Config(format!(
            "{key} must not contain whitespace or '_', got {raw:?}"
        )));
    }
    Ok(token)
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_required_values_and_defaults() {
        let cfg =
            Config::from_lookup(lookup_from(&[("BOT_TOKEN", "123:abc"), ("MANAGER_ID", "42")]))
                .unwrap();
        assert_eq!(cfg.bot_token, "123:abc");
        assert_eq!(cfg.manager_id, UserId(42));
        assert_eq!(cfg.stop_token, "/stop");
        assert_eq!(cfg.chat_token, "/chat");
        assert_eq!(cfg.idle_timeout, Duration::from_secs(3600));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(300));
        assert!(!cfg.audit_log_json);
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[("MANAGER_ID", "42")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("BOT_TOKEN")));
    }

    #[test]
    fn missing_or_zero_manager_id_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("MANAGER_ID")));

        let err =
            Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t"), ("MANAGER_ID", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t"), ("MANAGER_ID", "abc")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn directive_tokens_are_overridable_and_validated() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("MANAGER_ID", "7"),
            ("HOTLINE_STOP_TOKEN", "/стоп"),
            ("HOTLINE_CHAT_TOKEN", "/чат"),
        ]))
        .unwrap();
        assert_eq!(cfg.stop_token, "/стоп");
        assert_eq!(cfg.chat_token, "/чат");

        let err = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("MANAGER_ID", "7"),
            ("HOTLINE_STOP_TOKEN", "/end_now"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
