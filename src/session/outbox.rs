use std::collections::VecDeque;

use uuid::Uuid;

use crate::model::{SentAck, UserId};

const CAPACITY: usize = 256;

#[derive(Debug)]
struct Pending {
    client_id: Uuid,
    receiver_id: UserId,
    body: String,
}

/// Optimistic sends not yet acknowledged by the relay. Acknowledgements are
/// only logged; a resync asks which echoes are still pending.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: VecDeque<Pending>,
}

impl Outbox {
    pub fn track(&mut self, client_id: Uuid, receiver_id: &UserId, body: &str) {
        if self.pending.len() == CAPACITY {
            self.pending.pop_front();
        }
        self.pending.push_back(Pending {
            client_id,
            receiver_id: receiver_id.clone(),
            body: body.to_owned(),
        });
    }

    /// Matches by correlation id when the relay echoes it, else the oldest send with the same receiver and body.
    pub fn acknowledge(&mut self, ack: &SentAck) -> Option<Uuid> {
        let index = match ack.client_id {
            Some(id) => self.pending.iter().position(|p| p.client_id == id),
            None => self
                .pending
                .iter()
                .position(|p| p.receiver_id == ack.receiver_id && p.body == ack.message),
        }?;
        self.pending.remove(index).map(|p| p.client_id)
    }

    pub fn is_pending(&self, client_id: Uuid) -> bool {
        self.pending.iter().any(|p| p.client_id == client_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(receiver: i64, message: &str, client_id: Option<Uuid>) -> SentAck {
        SentAck {
            message: message.to_owned(),
            receiver_id: UserId::Int(receiver),
            timestamp: None,
            client_id,
        }
    }

    #[test]
    fn matches_by_client_id() {
        let mut outbox = Outbox::default();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        outbox.track(a, &UserId::Int(1), "same");
        outbox.track(b, &UserId::Int(1), "same");

        assert_eq!(outbox.acknowledge(&ack(1, "same", Some(b))), Some(b));
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn falls_back_to_oldest_matching_send() {
        let mut outbox = Outbox::default();
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        outbox.track(a, &UserId::Int(1), "hi");
        outbox.track(b, &UserId::Int(2), "hi");
        outbox.track(c, &UserId::Int(1), "hi");

        assert_eq!(outbox.acknowledge(&ack(1, "hi", None)), Some(a));
        assert_eq!(outbox.acknowledge(&ack(1, "hi", None)), Some(c));
        assert_eq!(outbox.acknowledge(&ack(1, "hi", None)), None);
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn pending_until_acknowledged() {
        let mut outbox = Outbox::default();
        let id = Uuid::now_v7();
        outbox.track(id, &UserId::Int(1), "hi");
        assert!(outbox.is_pending(id));

        outbox.acknowledge(&ack(1, "hi", Some(id)));
        assert!(!outbox.is_pending(id));
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut outbox = Outbox::default();
        let first = Uuid::now_v7();
        outbox.track(first, &UserId::Int(1), "0");
        for i in 1..=CAPACITY {
            outbox.track(Uuid::now_v7(), &UserId::Int(1), &i.to_string());
        }

        assert_eq!(outbox.len(), CAPACITY);
        assert_eq!(outbox.acknowledge(&ack(1, "0", Some(first))), None);
    }
}
