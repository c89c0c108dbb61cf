pub mod clock;
mod contacts;
mod conversation;

pub use contacts::ContactList;
pub use conversation::Conversation;

use time::UtcOffset;

use crate::{
    include_res,
    model::User,
    res::{avatar_letter, escape_html, fill},
};

/// Everything around the two lists: header, welcome placeholder, composer and sidebar.
#[derive(Debug)]
pub struct Chrome {
    pub peer_name: Option<String>,
    pub welcome_visible: bool,
    pub composer: String,
    pub composer_focused: bool,
    pub sidebar_open: bool,
    viewport_width: u32,
    compact_width: u32,
}

impl Chrome {
    pub fn new(viewport_width: u32, compact_width: u32) -> Self {
        Chrome {
            peer_name: None,
            welcome_visible: true,
            composer: String::new(),
            composer_focused: false,
            sidebar_open: false,
            viewport_width,
            compact_width,
        }
    }

    pub fn is_compact(&self) -> bool {
        self.viewport_width <= self.compact_width
    }

    pub fn show_peer(&mut self, peer: &User) {
        self.peer_name = Some(peer.name.clone());
        self.welcome_visible = false;
    }

    pub fn resize(&mut self, width: u32) {
        self.viewport_width = width;
        if !self.is_compact() {
            self.sidebar_open = false;
        }
    }

    pub fn open_sidebar(&mut self) {
        self.sidebar_open = true;
    }

    pub fn close_sidebar(&mut self) {
        self.sidebar_open = false;
    }

    pub fn header_html(&self) -> Option<String> {
        let name = self.peer_name.as_deref()?;
        let avatar = escape_html(&avatar_letter(name));
        let name = escape_html(name);
        Some(fill(
            include_res!(str, "/pages/chat_header.html"),
            &[("avatar", avatar.as_str()), ("name", name.as_str())],
        ))
    }
}

pub struct Widget {
    pub contacts: ContactList,
    pub conversation: Conversation,
    pub chrome: Chrome,
}

impl Widget {
    pub fn new(offset: UtcOffset, viewport_width: u32, compact_width: u32) -> Self {
        Widget {
            contacts: ContactList::default(),
            conversation: Conversation::new(offset),
            chrome: Chrome::new(viewport_width, compact_width),
        }
    }

    /// Runs after every handled event.
    pub fn commit(&mut self) {
        self.conversation.commit();
    }
}
