use time::UtcOffset;

use crate::{
    include_res,
    model::ChatMessage,
    res::{avatar_letter, escape_html, fill},
    views::clock,
};

#[derive(Debug, Default)]
struct Scroll {
    requested: bool,
    top: usize,
}

/// The message pane. Every node is built from escaped text at append time.
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    nodes: Vec<String>,
    notice: Option<String>,
    offset: UtcOffset,
    scroll: Scroll,
    revision: u64,
}

impl Conversation {
    pub fn new(offset: UtcOffset) -> Self {
        Conversation {
            messages: Vec::new(),
            nodes: Vec::new(),
            notice: None,
            offset,
            scroll: Scroll::default(),
            revision: 0,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.nodes.clear();
        self.notice = None;
        self.scroll = Scroll::default();
        self.revision += 1;
    }

    pub fn replace_history(&mut self, messages: Vec<ChatMessage>) {
        self.clear();
        for message in messages {
            self.append_message(message);
        }
    }

    pub fn append_message(&mut self, message: ChatMessage) {
        self.notice = None;
        self.nodes.push(self.render_node(&message));
        self.messages.push(message);
        self.revision += 1;
    }

    pub fn show_notice(&mut self, text: impl Into<String>) {
        self.messages.clear();
        self.nodes.clear();
        self.notice = Some(text.into());
        self.revision += 1;
    }

    /// Takes effect at the next `commit`, once the render pass is over.
    pub fn scroll_to_latest(&mut self) {
        self.scroll.requested = true;
    }

    /// Post-render hook: applies a pending scroll request against the settled content height.
    pub fn commit(&mut self) {
        if std::mem::take(&mut self.scroll.requested) {
            self.scroll.top = self.nodes.len();
        }
    }

    pub fn is_scrolled_to_latest(&self) -> bool {
        self.scroll.top == self.nodes.len()
    }

    pub fn scroll_pending(&self) -> bool {
        self.scroll.requested
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn contains(&self, message: &ChatMessage) -> bool {
        self.messages.iter().any(|m| {
            m.body == message.body && m.author == message.author && m.sent_at == message.sent_at
        })
    }

    /// Filters out buffered messages the loaded history already shows.
    ///
    /// Own messages carry the local clock while history carries the server's,
    /// so they are matched by body against own rows instead. Matching walks
    /// both lists from the end and claims each row at most once.
    pub fn unshown(&self, buffered: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let mut cursor = self.messages.len();
        let mut shown = vec![false; buffered.len()];
        for (i, message) in buffered.iter().enumerate().rev() {
            if !message.is_own() {
                shown[i] = self.contains(message);
                continue;
            }
            if let Some(at) = self.messages[..cursor]
                .iter()
                .rposition(|m| m.is_own() && m.body == message.body)
            {
                shown[i] = true;
                cursor = at;
            }
        }

        buffered
            .into_iter()
            .zip(shown)
            .filter_map(|(message, shown)| (!shown).then_some(message))
            .collect()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn html(&self) -> String {
        match &self.notice {
            Some(text) => fill(
                include_res!(str, "/pages/no_messages.html"),
                &[("text", escape_html(text).as_str())],
            ),
            None => self.nodes.concat(),
        }
    }

    fn render_node(&self, message: &ChatMessage) -> String {
        let own = if message.is_own() { " own" } else { "" };
        let avatar = escape_html(&avatar_letter(message.author.display_name()));
        let text = escape_html(&message.body);
        let time = message
            .sent_at
            .map(|ts| clock::hour_minute(ts, self.offset))
            .unwrap_or_default();
        let client_id = message
            .correlation
            .map(|id| id.to_string())
            .unwrap_or_default();

        fill(
            include_res!(str, "/pages/message.html"),
            &[
                ("own", own),
                ("client_id", client_id.as_str()),
                ("avatar", avatar.as_str()),
                ("text", text.as_str()),
                ("time", time.as_str()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use crate::model::Author;

    use super::*;

    fn from_peer(name: &str, body: &str) -> ChatMessage {
        ChatMessage {
            body: body.to_owned(),
            author: Author::Peer { name: name.to_owned() },
            sent_at: Some(datetime!(2024-01-01 10:00 UTC)),
            correlation: None,
        }
    }

    #[test]
    fn inbound_bubble_has_avatar_and_time() {
        let mut view = Conversation::new(UtcOffset::UTC);
        view.append_message(from_peer("Alice A", "hi"));

        let html = view.html();
        assert!(html.contains(r#"<div class="message" "#));
        assert!(html.contains("<span>A</span>"));
        assert!(html.contains(r#"<div class="message-text">hi</div>"#));
        assert!(html.contains(r#"<div class="message-time">10:00</div>"#));
    }

    #[test]
    fn own_bubble_uses_you_avatar() {
        let mut view = Conversation::new(UtcOffset::UTC);
        let id = Uuid::now_v7();
        view.append_message(ChatMessage::own("hello", datetime!(2024-01-01 09:15 UTC), id));

        let html = view.html();
        assert!(html.contains(r#"<div class="message own""#));
        assert!(html.contains("<span>Y</span>"));
        assert!(html.contains(&id.to_string()));
    }

    #[test]
    fn bodies_are_always_escaped() {
        let mut view = Conversation::new(UtcOffset::UTC);
        view.append_message(from_peer("Mallory", "<script>alert(1)</script>"));
        view.append_message(ChatMessage::own(r#"a & "b" <i>"#, datetime!(2024-01-01 10:00 UTC), Uuid::now_v7()));

        let html = view.html();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<i>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("a &amp; &quot;b&quot; &lt;i&gt;"));
    }

    #[test]
    fn replace_history_does_not_merge() {
        let mut view = Conversation::new(UtcOffset::UTC);
        view.append_message(from_peer("Alice", "old"));
        view.replace_history(vec![from_peer("Bob", "one"), from_peer("Bob", "two")]);

        let bodies: Vec<_> = view.messages().iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["one", "two"]);
        assert_eq!(view.nodes().len(), 2);
    }

    #[test]
    fn scroll_waits_for_commit() {
        let mut view = Conversation::new(UtcOffset::UTC);
        view.append_message(from_peer("Alice", "one"));
        view.scroll_to_latest();

        assert!(view.scroll_pending());
        assert!(!view.is_scrolled_to_latest());

        view.append_message(from_peer("Alice", "two"));
        view.commit();
        assert!(!view.scroll_pending());
        assert!(view.is_scrolled_to_latest());
    }

    #[test]
    fn missing_timestamp_renders_empty_time() {
        let mut view = Conversation::new(UtcOffset::UTC);
        view.append_message(ChatMessage { sent_at: None, ..from_peer("Alice", "x") });

        assert!(view.html().contains(r#"<div class="message-time"></div>"#));
    }

    #[test]
    fn own_messages_match_history_by_body() {
        let mut view = Conversation::new(UtcOffset::UTC);
        let server_clock = datetime!(2024-01-01 10:05 UTC);
        view.replace_history(vec![
            from_peer("Alice", "hi"),
            ChatMessage { correlation: None, ..ChatMessage::own("ok", server_clock, Uuid::nil()) },
        ]);

        let local_clock = datetime!(2024-01-01 10:04:58 UTC);
        let unshown = view.unshown(vec![
            ChatMessage::own("ok", local_clock, Uuid::now_v7()),
            ChatMessage::own("ok", local_clock, Uuid::now_v7()),
            from_peer("Alice", "hi"),
            from_peer("Alice", "later"),
        ]);

        let bodies: Vec<_> = unshown.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["ok", "later"]);
    }

    #[test]
    fn notice_replaces_messages() {
        let mut view = Conversation::new(UtcOffset::UTC);
        view.append_message(from_peer("Alice", "x"));
        view.show_notice("Could not load messages");

        assert!(view.messages().is_empty());
        assert!(view.html().contains("Could not load messages"));
    }
}
