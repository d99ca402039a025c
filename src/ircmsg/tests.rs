use super::{format_line, handler_name, Message, Prefix, User};
use crate::error::ParseError;

macro_rules! irc_msg {
    ($lit:expr) => {
        Message::parse($lit).unwrap()
    };
}

#[test]
pub fn parse_cmd() {
    assert_eq!(irc_msg!("PING").command, "PING");
    assert_eq!(irc_msg!("  NOTICE\r\n").command, "NOTICE");
}

#[test]
pub fn parse_source_server() {
    let msg = irc_msg!(":server.com 001 rbot :Welcome");
    assert_eq!(msg.command, "001");
    assert_eq!(msg.prefix, Prefix::Server("server.com".into()));
    assert_eq!(msg.sender(), Some("server.com"));
    assert_eq!(msg.params, ["rbot", "Welcome"]);
}

#[test]
pub fn parse_source_full() {
    let msg = irc_msg!(":nick!user@host QUIT :gone fishing");
    assert_eq!(msg.command, "QUIT");
    assert_eq!(msg.user(), Some(&User::new("nick", "user", "host")));
    assert_eq!(msg.sender(), Some("nick"));
    assert_eq!(msg.trailing(), Some("gone fishing"));
}

#[test]
pub fn parse_source_unrecognized() {
    // Neither a server name nor a full nick!user@host.
    let msg = irc_msg!(":nick@host PRIVMSG #chan :hi");
    assert_eq!(msg.prefix, Prefix::None);
    assert_eq!(msg.sender(), Some("#chan"));
    assert_eq!(msg.params, ["#chan", "hi"]);
}

#[test]
pub fn parse_no_prefix() {
    let msg = irc_msg!("PING :server.com");
    assert_eq!(msg.prefix, Prefix::None);
    assert_eq!(msg.params, ["server.com"]);
    assert_eq!(msg.sender(), Some("server.com"));
}

#[test]
pub fn parse_args_long() {
    let msg = irc_msg!(":a!b@c PRIVMSG #foo #bar :Hello world: again");
    assert_eq!(msg.params, ["#foo", "#bar", "Hello world: again"]);
}

#[test]
pub fn parse_empty_trailing() {
    let msg = irc_msg!("TOPIC #foo :");
    assert_eq!(msg.params, ["#foo", ""]);
}

#[test]
pub fn parse_names_reply() {
    let msg = irc_msg!(":server.com 353 rbot = #chan :@one two");
    assert_eq!(msg.params, ["rbot", "=", "#chan", "@one two"]);
}

#[test]
pub fn parse_extra_spaces() {
    let msg = irc_msg!(":server.com  PRIVMSG   #c :x");
    assert_eq!(msg.prefix, Prefix::Server("server.com".into()));
    assert_eq!(msg.command, "PRIVMSG");
    assert_eq!(msg.params, ["#c", "x"]);
}

#[test]
pub fn parse_failures() {
    assert_eq!(Message::parse(""), Err(ParseError::Empty));
    assert_eq!(Message::parse("   \r\n"), Err(ParseError::Empty));
    assert_eq!(Message::parse(":server.com"), Err(ParseError::MissingCommand));
    assert_eq!(Message::parse(":"), Err(ParseError::MissingCommand));
}

#[test]
pub fn raw_is_kept() {
    let msg = irc_msg!(":server.com 001 rbot :Welcome\r\n");
    assert_eq!(msg.raw, ":server.com 001 rbot :Welcome");
}

#[test]
pub fn to_string() {
    let cases = [
        "CMD",
        "CMD word :some words",
        ":src CMD word",
        ":server.com 001",
        ":nick!user@host CMD",
        "CMD :",
        "CMD ::colon",
    ];
    for case in cases {
        let looped = irc_msg!(case).to_string();
        assert_eq!(looped, case);
    }
}

#[test]
pub fn reparse_is_stable() {
    let cases = [
        ":server.com 433 rbot rbot :Nickname is already in use",
        ":nick!user@host PRIVMSG #chan :hi there",
        "PING :irc.example.net",
        ":server.com 353 rbot = #chan :@one +two three",
        ":weird@prefix NOTICE * :anonymous",
    ];
    for case in cases {
        let first = irc_msg!(case);
        let second = irc_msg!(&first.to_string());
        assert_eq!(first.prefix, second.prefix, "prefix mismatch for {case}");
        assert_eq!(first.command, second.command, "command mismatch for {case}");
        assert_eq!(first.params, second.params, "params mismatch for {case}");
    }
}

#[test]
pub fn handler_names() {
    assert_eq!(handler_name("001"), "m001");
    assert_eq!(handler_name("433"), "m433");
    assert_eq!(handler_name("PRIVMSG"), "privmsg");
    assert_eq!(handler_name("Notice"), "notice");
    assert_eq!(irc_msg!(":s 366 a #b :End").handler_name(), "m366");
}

#[test]
pub fn format_lines() {
    assert_eq!(format_line("PRIVMSG", ["#chan"], Some("hi")), "PRIVMSG #chan :hi");
    assert_eq!(format_line("NICK", ["rbot"], None), "NICK rbot");
    assert_eq!(
        format_line("USER", ["rbot", "0", "*"], Some("ruby irc bot")),
        "USER rbot 0 * :ruby irc bot"
    );
    assert_eq!(format_line("QUIT", [], None), "QUIT");
}
