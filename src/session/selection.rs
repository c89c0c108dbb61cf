use crate::model::{ChatMessage, User, UserId};

/// The open conversation. Every history fetch is tagged with the ticket current
/// when it was issued; only the latest ticket may touch the view.
#[derive(Debug, Default)]
pub struct Selection {
    peer: Option<User>,
    ticket: u64,
    loading: bool,
    buffered: Vec<ChatMessage>,
}

impl Selection {
    pub fn select(&mut self, peer: User) -> u64 {
        self.peer = Some(peer);
        self.buffered.clear();
        self.begin_fetch()
    }

    /// Starts a full re-fetch of the open conversation, superseding any fetch
    /// in flight. Messages buffered for a superseded fetch carry over.
    pub fn resync(&mut self) -> Option<(u64, UserId)> {
        let id = self.peer.as_ref()?.id.clone();
        Some((self.begin_fetch(), id))
    }

    fn begin_fetch(&mut self) -> u64 {
        self.ticket += 1;
        self.loading = true;
        self.ticket
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.peer.is_some() && self.ticket == ticket
    }

    /// Ends the fetch for `ticket`, handing back what arrived meanwhile.
    pub fn finish(&mut self, ticket: u64) -> Option<Vec<ChatMessage>> {
        if !self.is_current(ticket) {
            return None;
        }
        self.loading = false;
        Some(std::mem::take(&mut self.buffered))
    }

    pub fn peer(&self) -> Option<&User> {
        self.peer.as_ref()
    }

    pub fn is_active(&self, id: &UserId) -> bool {
        self.peer.as_ref().is_some_and(|peer| &peer.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn buffer(&mut self, message: ChatMessage) {
        self.buffered.push(message);
    }
}
