use std::time::Duration;

use url::Url;

use crate::{channel::ChannelOptions, AppResult};

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub socket_path: String,
    pub session_cookie: Option<String>,
    pub search_debounce: Duration,
    pub compact_width: u32,
    pub viewport_width: u32,
    pub connect_timeout: Duration,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: Url::parse("http://127.0.0.1:5000").expect("static url"),
            socket_path: "/socket.io/".to_owned(),
            session_cookie: None,
            search_debounce: Duration::from_millis(250),
            compact_width: 768,
            viewport_width: 1024,
            connect_timeout: Duration::from_secs(10),
            reconnect_base: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Reads `CHAT_*` variables from the environment and `.env`.
    pub fn from_env() -> AppResult<Config> {
        Config::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Config> {
        let mut config = Config::default();
        let millis = |key: &str, default: Duration| -> AppResult<Duration> {
            match lookup(key) {
                Some(raw) => Ok(Duration::from_millis(raw.trim().parse()?)),
                None => Ok(default),
            }
        };

        config.search_debounce = millis("CHAT_SEARCH_DEBOUNCE_MS", config.search_debounce)?;
        config.connect_timeout = millis("CHAT_CONNECT_TIMEOUT_MS", config.connect_timeout)?;
        config.reconnect_base = millis("CHAT_RECONNECT_BASE_MS", config.reconnect_base)?;
        config.reconnect_max = millis("CHAT_RECONNECT_MAX_MS", config.reconnect_max)?;

        if let Some(raw) = lookup("CHAT_BASE_URL") {
            config.base_url = Url::parse(raw.trim())?;
        }
        if let Some(path) = lookup("CHAT_SOCKET_PATH") {
            config.socket_path = path;
        }
        config.session_cookie = lookup("CHAT_SESSION_COOKIE").filter(|c| !c.trim().is_empty());
        if let Some(raw) = lookup("CHAT_COMPACT_WIDTH") {
            config.compact_width = raw.trim().parse()?;
        }
        if let Some(raw) = lookup("CHAT_VIEWPORT_WIDTH") {
            config.viewport_width = raw.trim().parse()?;
        }

        if config.reconnect_max < config.reconnect_base {
            return Err("CHAT_RECONNECT_MAX_MS must not be below CHAT_RECONNECT_BASE_MS".into());
        }

        Ok(config)
    }

    pub fn channel_options(&self) -> AppResult<ChannelOptions> {
        Ok(ChannelOptions {
            url: crate::channel::socket_url(&self.base_url, &self.socket_path)?,
            session_cookie: self.session_cookie.clone(),
            connect_timeout: self.connect_timeout,
            reconnect_base: self.reconnect_base,
            reconnect_max: self.reconnect_max,
        })
    }
}
