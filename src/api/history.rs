use async_trait::async_trait;

use crate::model::{HistoryMessage, UserId};

use super::{Api, ClientError, History};

#[async_trait]
impl History for Api {
    async fn fetch_history(&self, peer: &UserId) -> Result<Vec<HistoryMessage>, ClientError> {
        let peer = peer.to_string();
        let url = self.endpoint(["api", "messages", peer.as_str()])?;
        self.get_json(url).await
    }
}
