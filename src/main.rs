use std::sync::Arc;

use silentchat::{
    api::Api,
    channel::Channel,
    model::UserId,
    session::{Backend, Settings},
    views::{clock, Widget},
    AppResult, Config, Session, UiEvent, UiHandle,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> AppResult<()> {
    let offset = clock::local_offset();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("silentchat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let api = Arc::new(Api::new(config.base_url.clone(), config.session_cookie.as_deref())?);
    let (channel, events) = Channel::connect(config.channel_options()?);

    let (mut session, ui) = Session::new(
        Backend { directory: api.clone(), history: api },
        channel,
        events,
        Settings::from_config(&config, offset),
    );

    tokio::spawn(read_commands(ui));

    session.start();
    let mut seen = (0, 0);
    while session.step().await {
        print_changes(session.widget(), &mut seen);
    }

    Ok(())
}

async fn read_commands(ui: UiHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::error!("failed to read stdin: {err}");
                break;
            }
        };

        let event = match line.split_once(' ').unwrap_or((line.as_str(), "")) {
            ("/quit", _) => break,
            ("/search", query) => UiEvent::SearchInput(query.to_owned()),
            ("/open", id) => UiEvent::ClickContact(UserId::from(id.trim())),
            ("/reload", _) => UiEvent::ReloadDirectory,
            ("/width", width) => match width.trim().parse() {
                Ok(width) => UiEvent::Resize(width),
                Err(_) => {
                    eprintln!("usage: /width <pixels>");
                    continue;
                }
            },
            ("/sidebar", _) => UiEvent::OpenSidebar,
            _ => UiEvent::Submit(line.clone()),
        };

        if !ui.send(event) {
            return;
        }
    }

    ui.send(UiEvent::Teardown);
}

fn print_changes(widget: &Widget, seen: &mut (u64, u64)) {
    if widget.contacts.revision() != seen.0 {
        seen.0 = widget.contacts.revision();
        println!("-- contacts");
        match widget.contacts.placeholder() {
            Some(text) => println!("   {text}"),
            None => {
                for user in widget.contacts.users() {
                    let marker = if widget.contacts.active() == Some(&user.id) { '*' } else { ' ' };
                    println!(" {marker} [{}] {} @{}", user.id, user.name, user.username);
                }
            }
        }
    }

    if widget.conversation.revision() != seen.1 {
        seen.1 = widget.conversation.revision();
        if let Some(name) = &widget.chrome.peer_name {
            println!("-- {name}");
        }
        match widget.conversation.notice() {
            Some(text) => println!("   {text}"),
            None => {
                for message in widget.conversation.messages() {
                    let time = message
                        .sent_at
                        .map(|ts| clock::hour_minute(ts, widget.conversation.offset()))
                        .unwrap_or_default();
                    println!("   [{time}] {}: {}", message.author.display_name(), message.body);
                }
            }
        }
    }
}
