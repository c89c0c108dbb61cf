mod outbox;
mod selection;

pub use outbox::Outbox;
pub use selection::Selection;

use std::{sync::Arc, time::Duration};

use time::{OffsetDateTime, UtcOffset};
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    api::{ClientError, Directory, History},
    channel::{Channel, ChannelEvent},
    model::{ChatMessage, HistoryMessage, IncomingMessage, User, UserId},
    views::Widget,
    Config,
};

/// Input from whatever is presenting the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    SearchInput(String),
    SelectPeer(User),
    /// A click on a rendered contact entry.
    ClickContact(UserId),
    Submit(String),
    Resize(u32),
    OpenSidebar,
    CloseSidebar,
    ReloadDirectory,
    Teardown,
}

#[derive(Debug, Clone)]
pub struct UiHandle(mpsc::UnboundedSender<UiEvent>);

impl UiHandle {
    /// Returns false once the session has stopped listening.
    pub fn send(&self, event: UiEvent) -> bool {
        self.0.send(event).is_ok()
    }
}

#[derive(Clone)]
pub struct Backend {
    pub directory: Arc<dyn Directory>,
    pub history: Arc<dyn History>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub search_debounce: Duration,
    pub offset: UtcOffset,
    pub viewport_width: u32,
    pub compact_width: u32,
}

impl Settings {
    pub fn from_config(config: &Config, offset: UtcOffset) -> Self {
        Settings {
            search_debounce: config.search_debounce,
            offset,
            viewport_width: config.viewport_width,
            compact_width: config.compact_width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Open,
    Resync,
}

enum Completion {
    Directory(Result<Vec<User>, ClientError>),
    Search {
        ticket: u64,
        query: String,
        result: Result<User, ClientError>,
    },
    History {
        ticket: u64,
        kind: FetchKind,
        peer: UserId,
        result: Result<Vec<HistoryMessage>, ClientError>,
    },
}

#[derive(Debug, Default)]
struct Search {
    ticket: u64,
    pending: Option<(String, Instant)>,
    active: bool,
}

/// Owns the open conversation and is the only writer of it. Views are updated
/// from here and nowhere else.
pub struct Session {
    backend: Backend,
    channel: Channel,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    ui: mpsc::UnboundedReceiver<UiEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    widget: Widget,
    users: Vec<User>,
    directory_failure: Option<&'static str>,
    selection: Selection,
    search: Search,
    outbox: Outbox,
    search_debounce: Duration,
    relay_online: bool,
    closed: bool,
}

impl Session {
    pub fn new(
        backend: Backend,
        channel: Channel,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
        settings: Settings,
    ) -> (Session, UiHandle) {
        let (ui_tx, ui) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();

        let session = Session {
            backend,
            channel,
            events,
            ui,
            completions_tx,
            completions,
            widget: Widget::new(settings.offset, settings.viewport_width, settings.compact_width),
            users: Vec::new(),
            directory_failure: None,
            selection: Selection::default(),
            search: Search::default(),
            outbox: Outbox::default(),
            search_debounce: settings.search_debounce,
            relay_online: false,
            closed: false,
        };

        (session, UiHandle(ui_tx))
    }

    pub async fn run(mut self) {
        self.start();
        while self.step().await {}
        info!("session ended");
    }

    /// Kicks off the initial directory load.
    pub fn start(&mut self) {
        self.load_directory();
    }

    /// Handles one event from any source, then runs the post-render hook.
    /// Returns false once the session is torn down.
    pub async fn step(&mut self) -> bool {
        if self.closed {
            return false;
        }

        let search_deadline = self.search.pending.as_ref().map(|(_, at)| *at);
        tokio::select! {
            Some(event) = self.ui.recv() => self.handle_ui(event),
            Some(completion) = self.completions.recv() => self.handle_completion(completion),
            Some(event) = self.events.recv() => self.handle_channel(event),
            _ = sleep_until(search_deadline.unwrap_or_else(Instant::now)), if search_deadline.is_some() => {
                self.fire_search();
            }
        }

        self.widget.commit();
        !self.closed
    }

    pub fn widget(&self) -> &Widget {
        &self.widget
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn relay_online(&self) -> bool {
        self.relay_online
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn handle_ui(&mut self, event: UiEvent) {
        match event {
            UiEvent::SearchInput(text) => self.search_input(&text),
            UiEvent::SelectPeer(user) => self.select_peer(user),
            UiEvent::ClickContact(id) => match self.widget.contacts.find(&id).cloned() {
                Some(user) => self.select_peer(user),
                None => debug!(%id, "click on a contact that is not listed"),
            },
            UiEvent::Submit(text) => self.submit_message(&text),
            UiEvent::Resize(width) => self.widget.chrome.resize(width),
            UiEvent::OpenSidebar => self.widget.chrome.open_sidebar(),
            UiEvent::CloseSidebar => self.widget.chrome.close_sidebar(),
            UiEvent::ReloadDirectory => self.load_directory(),
            UiEvent::Teardown => self.teardown(),
        }
    }

    pub fn select_peer(&mut self, peer: User) {
        info!(peer = %peer.id, username = %peer.username, "opening conversation");

        self.widget.contacts.highlight_selected(&peer.id);
        self.widget.chrome.show_peer(&peer);
        self.widget.conversation.clear();

        let id = peer.id.clone();
        let ticket = self.selection.select(peer);
        self.fetch_history(ticket, FetchKind::Open, id);

        self.widget.chrome.composer_focused = true;
        if self.widget.chrome.is_compact() {
            self.widget.chrome.close_sidebar();
        }
    }

    pub fn submit_message(&mut self, text: &str) {
        let body = text.trim();
        if body.is_empty() {
            return;
        }
        let Some(peer) = self.selection.peer() else {
            return;
        };

        let client_id = Uuid::now_v7();
        let peer_id = peer.id.clone();
        self.channel.send(&peer_id, body, client_id);
        self.outbox.track(client_id, &peer_id, body);
        debug!(peer = %peer_id, %client_id, "message sent optimistically");

        let message = ChatMessage::own(body, OffsetDateTime::now_utc(), client_id);
        if self.selection.is_loading() {
            self.selection.buffer(message.clone());
        }
        self.widget.conversation.append_message(message);
        self.widget.chrome.composer.clear();
        self.widget.conversation.scroll_to_latest();
    }

    pub fn search_input(&mut self, text: &str) {
        let query = text.trim();
        self.search.ticket += 1;

        if query.is_empty() {
            self.search.pending = None;
            self.search.active = false;
            self.show_directory();
            return;
        }

        self.search.active = true;
        self.search.pending = Some((query.to_owned(), Instant::now() + self.search_debounce));
    }

    fn fire_search(&mut self) {
        let Some((query, _)) = self.search.pending.take() else {
            return;
        };
        let ticket = self.search.ticket;
        let directory = self.backend.directory.clone();
        let tx = self.completions_tx.clone();

        debug!(%query, "searching directory");
        tokio::spawn(async move {
            let result = directory.search_user(&query).await;
            let _ = tx.send(Completion::Search { ticket, query, result });
        });
    }

    fn load_directory(&mut self) {
        let directory = self.backend.directory.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(Completion::Directory(directory.list_users().await));
        });
    }

    fn fetch_history(&self, ticket: u64, kind: FetchKind, peer: UserId) {
        let history = self.backend.history.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = history.fetch_history(&peer).await;
            let _ = tx.send(Completion::History { ticket, kind, peer, result });
        });
    }

    fn show_directory(&mut self) {
        match self.directory_failure {
            Some(text) => self.widget.contacts.show_placeholder(text),
            None => self.widget.contacts.render(&self.users),
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Directory(result) => self.directory_loaded(result),
            Completion::Search { ticket, query, result } => {
                if ticket != self.search.ticket {
                    debug!(%query, "discarding superseded search");
                    return;
                }
                match result {
                    Ok(user) => self.widget.contacts.render(&[user]),
                    Err(ClientError::NotFound) => self.widget.contacts.show_placeholder("No user found"),
                    Err(err) => {
                        warn!(%query, "search failed: {err}");
                        self.widget.contacts.show_placeholder("Search error");
                    }
                }
            }
            Completion::History { ticket, kind, peer, result } => {
                self.history_loaded(ticket, kind, &peer, result);
            }
        }
    }

    fn directory_loaded(&mut self, result: Result<Vec<User>, ClientError>) {
        match result {
            Ok(users) => {
                info!(count = users.len(), "directory loaded");
                self.users = users;
                self.directory_failure = None;
            }
            Err(err) => {
                warn!("failed to load users: {err}");
                self.directory_failure = Some(match err {
                    ClientError::Server(_) => "Failed to load users",
                    _ => "Error loading users",
                });
            }
        }

        if !self.search.active {
            self.show_directory();
        }
    }

    fn history_loaded(
        &mut self,
        ticket: u64,
        kind: FetchKind,
        peer: &UserId,
        result: Result<Vec<HistoryMessage>, ClientError>,
    ) {
        let Some(buffered) = self.selection.finish(ticket) else {
            debug!(%peer, ticket, "discarding history for a superseded selection");
            return;
        };

        match result {
            Ok(rows) => {
                debug!(%peer, count = rows.len(), ?kind, "history loaded");
                self.widget
                    .conversation
                    .replace_history(rows.into_iter().map(ChatMessage::from).collect());
            }
            Err(err) if kind == FetchKind::Resync => {
                warn!(%peer, "history resync failed, keeping what is shown: {err}");
            }
            Err(err) => {
                warn!(%peer, "failed to load history: {err}");
                self.widget.conversation.show_notice("Could not load messages");
            }
        }

        for message in self.widget.conversation.unshown(buffered) {
            self.widget.conversation.append_message(message);
        }
        self.widget.conversation.scroll_to_latest();
    }

    fn handle_channel(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                info!("relay connected");
                self.relay_online = true;
                self.resync();
            }
            ChannelEvent::Reconnected => {
                info!("relay reconnected");
                self.relay_online = true;
                self.resync();
            }
            ChannelEvent::Disconnected { reason } => {
                info!(%reason, "relay disconnected");
                self.relay_online = false;
            }
            ChannelEvent::ConnectError { message } => error!(%message, "relay connection error"),
            ChannelEvent::Message(message) => self.receive_message(message),
            ChannelEvent::MessageSent(ack) => match self.outbox.acknowledge(&ack) {
                Some(client_id) => debug!(%client_id, "message delivered to relay"),
                None => debug!(receiver = %ack.receiver_id, "acknowledgement for an untracked message"),
            },
        }
    }

    fn resync(&mut self) {
        // A resync that supersedes a first load has to report failures like one.
        let kind = if self.selection.is_loading() { FetchKind::Open } else { FetchKind::Resync };
        if let Some((ticket, peer)) = self.selection.resync() {
            debug!(%peer, "resyncing open conversation");
            if kind == FetchKind::Resync {
                // Echoes the relay has not acknowledged may be missing from the refetch.
                let pending: Vec<_> = self
                    .widget
                    .conversation
                    .messages()
                    .iter()
                    .filter(|m| m.correlation.is_some_and(|id| self.outbox.is_pending(id)))
                    .cloned()
                    .collect();
                for message in pending {
                    self.selection.buffer(message);
                }
            }
            self.fetch_history(ticket, kind, peer);
        }
    }

    fn receive_message(&mut self, incoming: IncomingMessage) {
        if !self.selection.is_active(&incoming.sender_id) {
            debug!(sender = %incoming.sender_id, "dropping message for an inactive conversation");
            return;
        }

        let message = ChatMessage::from(incoming);
        if self.selection.is_loading() {
            self.selection.buffer(message);
            return;
        }
        self.widget.conversation.append_message(message);
        self.widget.conversation.scroll_to_latest();
    }

    fn teardown(&mut self) {
        info!("tearing down session");
        self.channel.disconnect();
        self.closed = true;
    }
}
