use crate::{
    include_res,
    model::{User, UserId},
    res::{avatar_letter, escape_html, fill},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Listing {
    Users(Vec<User>),
    Placeholder(String),
}

/// The sidebar directory. Selection flows back as `UiEvent::SelectPeer`.
#[derive(Debug)]
pub struct ContactList {
    listing: Listing,
    active: Option<UserId>,
    revision: u64,
}

impl Default for ContactList {
    fn default() -> Self {
        ContactList {
            listing: Listing::Users(Vec::new()),
            active: None,
            revision: 0,
        }
    }
}

impl ContactList {
    pub fn render(&mut self, users: &[User]) {
        self.listing = if users.is_empty() {
            Listing::Placeholder("No users found".to_owned())
        } else {
            Listing::Users(users.to_vec())
        };
        self.revision += 1;
    }

    pub fn show_placeholder(&mut self, text: impl Into<String>) {
        self.listing = Listing::Placeholder(text.into());
        self.revision += 1;
    }

    pub fn highlight_selected(&mut self, id: &UserId) {
        self.active = Some(id.clone());
        self.revision += 1;
    }

    pub fn active(&self) -> Option<&UserId> {
        self.active.as_ref()
    }

    pub fn users(&self) -> &[User] {
        match &self.listing {
            Listing::Users(users) => users,
            Listing::Placeholder(_) => &[],
        }
    }

    pub fn placeholder(&self) -> Option<&str> {
        match &self.listing {
            Listing::Placeholder(text) => Some(text),
            Listing::Users(_) => None,
        }
    }

    pub fn find(&self, id: &UserId) -> Option<&User> {
        self.users().iter().find(|user| &user.id == id)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn html(&self) -> String {
        match &self.listing {
            Listing::Placeholder(text) => fill(
                include_res!(str, "/pages/no_users.html"),
                &[("text", escape_html(text).as_str())],
            ),
            Listing::Users(users) => users
                .iter()
                .map(|user| {
                    let active = if self.active.as_ref() == Some(&user.id) { " active" } else { "" };
                    let id = escape_html(&user.id.to_string());
                    let username = escape_html(&user.username);
                    let name = escape_html(&user.name);
                    let avatar = escape_html(&avatar_letter(&user.name));
                    fill(
                        include_res!(str, "/pages/contact_item.html"),
                        &[
                            ("active", active),
                            ("id", id.as_str()),
                            ("username", username.as_str()),
                            ("name", name.as_str()),
                            ("avatar", avatar.as_str()),
                        ],
                    )
                })
                .collect(),
        }
    }
}
