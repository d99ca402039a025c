use std::sync::Arc;

use ivybot::{
    client::{ClientEvent, Command},
    config::Value,
    ircmsg::Message,
    notify::Interest,
    plugin::HandlerTable,
    Client, Config, Plugin, Session,
};

/// Repeats every message addressed to it by name.
struct Echo {
    session: Session,
}

impl Echo {
    fn privmsg(&mut self, msg: &Message) {
        let (Some(target), Some(text), Some(nick)) =
            (msg.param(0), msg.trailing(), self.session.state.nick())
        else {
            return;
        };
        let Some(rest) = text.strip_prefix(&nick).and_then(|r| r.strip_prefix(':')) else {
            return;
        };
        // Reply to the channel, or to the sender if this was a private message.
        let target = if target == nick { msg.sender().unwrap_or(target) } else { target };
        self.session
            .send(Command::Privmsg { target: target.to_owned(), text: rest.trim().to_owned() });
    }
}

impl Plugin for Echo {
    fn new(session: Session) -> Self {
        Echo { session }
    }
    fn handlers(table: &mut HandlerTable<Self>) {
        table.on("PRIVMSG", Self::privmsg);
    }
    fn name() -> &'static str {
        "echo"
    }
}

fn main() -> Result<(), ivybot::Error> {
    // Let's get some logging.
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).compact().init();
    // Usage: echo <host> [port] [channel]
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_owned());
    let port: u16 = args.next().and_then(|p| p.parse().ok()).unwrap_or(6667);
    let channel = args.next().unwrap_or_else(|| "#ivybot".to_owned());
    let config = Config::new();
    config.merge([
        ("host", Value::from(host)),
        ("port", Value::from(port)),
        ("nick", Value::from("ivybot")),
    ])?;
    let client = Client::new(config)?;
    client.register_plugin::<Echo, _>(["PRIVMSG"]);
    // Join the channel once the server has accepted us.
    let queue = client.queue().clone();
    client.subscribe(
        Interest::only(["registered_with_server"]),
        Arc::new(move |_: &ClientEvent| queue.push(Command::Join(channel.clone()))),
    );
    client.subscribe(
        Interest::only(["channel_name_list"]),
        Arc::new(|event: &ClientEvent| {
            if let ClientEvent::ChannelNameList { channel, names } = event {
                tracing::info!("{channel}: {}", names.join(" "));
            }
        }),
    );
    client.start()?;
    client.wait_for_quit()
}
