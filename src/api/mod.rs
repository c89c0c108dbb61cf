mod directory;
mod history;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use url::Url;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    model::{HistoryMessage, User, UserId},
    AppResult,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("server responded with {0}")]
    Server(StatusCode),
    #[error("no matching user")]
    NotFound,
    #[error("malformed response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("cannot build request url from {0}")]
    InvalidUrl(Url),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err)
        } else {
            ClientError::Network(err)
        }
    }
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, ClientError>;
    async fn search_user(&self, query: &str) -> Result<User, ClientError>;
}

#[async_trait]
pub trait History: Send + Sync {
    async fn fetch_history(&self, peer: &UserId) -> Result<Vec<HistoryMessage>, ClientError>;
}

/// REST client for the chat backend.
#[derive(Clone)]
pub struct Api {
    http: reqwest::Client,
    base: Url,
}

impl Api {
    pub fn new(base: Url, session_cookie: Option<&str>) -> AppResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(cookie) = session_cookie {
            let value = header::HeaderValue::from_str(cookie)
                .map_err(|err| format!("invalid session cookie: {err}"))?;
            headers.insert(header::COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Api { http, base })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        tracing::debug!(%url, "GET");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Server(status));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> Api {
        Api::new(Url::parse(base).unwrap(), None).unwrap()
    }

    #[test]
    fn endpoints_join_under_base_path() {
        assert_eq!(
            api("http://chat.local").endpoint(["api", "users"]).unwrap().as_str(),
            "http://chat.local/api/users",
        );
        assert_eq!(
            api("http://chat.local/app/").endpoint(["api", "messages", "7"]).unwrap().as_str(),
            "http://chat.local/app/api/messages/7",
        );
    }

    #[test]
    fn segments_are_percent_encoded() {
        let url = api("http://chat.local").endpoint(["api", "search", "a b/c?d#e"]).unwrap();
        assert_eq!(url.as_str(), "http://chat.local/api/search/a%20b%2Fc%3Fd%23e");
    }

    #[test]
    fn rejects_bad_cookie() {
        assert!(Api::new(Url::parse("http://chat.local").unwrap(), Some("bad\ncookie")).is_err());
    }
}
