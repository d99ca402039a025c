//! A threaded IRC client engine with plugin dispatch.
//!
//! A [`Client`][client::Client] owns one connection to one server.
//! Lines from the server are parsed into [`Message`][ircmsg::Message]s,
//! translated into high-level [`ClientEvent`][client::ClientEvent]s,
//! and handed to [plugins][plugin::Plugin], each on its own task but
//! never concurrently with itself.
#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]
#![deny(clippy::redundant_else)]
#![deny(clippy::semicolon_if_nothing_returned)]
#![deny(rustdoc::bare_urls)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_html_tags)]
#![deny(rustdoc::invalid_rust_codeblocks)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod client;
pub mod config;
pub mod error;
pub mod ircmsg;
pub mod names;
pub mod notify;
pub mod plugin;
pub mod state;
mod util;

pub use client::{Client, ClientEvent, Command};
pub use config::Config;
pub use error::Error;
pub use ircmsg::Message;
pub use plugin::{Plugin, PluginRegistry, Session};
