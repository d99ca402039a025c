//! Well-known command tokens and numeric reply codes.
//!
//! Only the names the client's dispatch table and built-in plugins care about live here.

/// Commands.
pub mod cmd {
    macro_rules! defn_cmd {
        ($($cmd:ident),+ $(,)?) => {
            $(
                #[doc = concat!("The `", stringify!($cmd), "` message type.")]
                pub const $cmd: &str = stringify!($cmd);
            )+
        };
    }

    defn_cmd!(ERROR, JOIN, NICK, NOTICE, PART, PING, PONG, PRIVMSG, QUIT, TOPIC, USER);
}

/// Numeric replies.
pub mod rpl {
    macro_rules! defn_num {
        ($($name:ident = $num:literal),+ $(,)?) => {
            $(
                #[doc = concat!("The `", stringify!($name), "` (", $num, ") numeric reply.")]
                pub const $name: &str = $num;
            )+
        };
    }

    defn_num! {
        RPL_WELCOME = "001",
        RPL_TOPIC = "332",
        RPL_NAMREPLY = "353",
        RPL_ENDOFNAMES = "366",
        ERR_NONICKNAMEGIVEN = "431",
        ERR_ERRONEUSNICKNAME = "432",
        ERR_NICKNAMEINUSE = "433",
    }
}

/// Channel membership prefixes that may precede a nick in a NAMES reply.
pub const MEMBERSHIP_PREFIXES: &[char] = &['~', '&', '@', '%', '+'];
