use async_trait::async_trait;
use reqwest::StatusCode;

use crate::model::User;

use super::{Api, ClientError, Directory};

#[async_trait]
impl Directory for Api {
    async fn list_users(&self) -> Result<Vec<User>, ClientError> {
        let url = self.endpoint(["api", "users"])?;
        self.get_json(url).await
    }

    async fn search_user(&self, query: &str) -> Result<User, ClientError> {
        let url = self.endpoint(["api", "search", query])?;
        match self.get_json(url).await {
            Err(ClientError::Server(StatusCode::NOT_FOUND)) => Err(ClientError::NotFound),
            result => result,
        }
    }
}
