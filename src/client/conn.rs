//! The socket side of a client: connecting, sending, and the background read loop.

use crate::notify::{Dispatcher, Event};
use crate::util::lock;
use std::borrow::Cow;
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Smallest power of two larger than the largest IRCv3 message.
const BUFSIZE: usize = 16384;

/// Lifecycle and data events of a [`Connection`].
#[derive(Clone, Debug)]
pub enum ConnectionEvent {
    /// The socket is open. Published before any [`Data`][ConnectionEvent::Data].
    Connected,
    /// The read loop has ended and the socket is closed.
    Disconnected,
    /// One non-empty line from the server, without its line terminator.
    Data(String),
    /// Connecting or sending failed.
    Error(Arc<std::io::Error>),
}

impl Event for ConnectionEvent {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(match self {
            ConnectionEvent::Connected => "connected",
            ConnectionEvent::Disconnected => "disconnected",
            ConnectionEvent::Data(_) => "data",
            ConnectionEvent::Error(_) => "connection_error",
        })
    }
}

struct Live {
    stream: Arc<TcpStream>,
    reader: Option<JoinHandle<()>>,
}

/// A line-oriented TCP connection to an IRC server.
///
/// Every non-empty line received is published as [`ConnectionEvent::Data`]
/// from a dedicated reader thread, in the order it arrived.
/// I/O failures are published as [`ConnectionEvent::Error`] and never returned.
#[derive(Default)]
pub struct Connection {
    events: Dispatcher<ConnectionEvent>,
    live: Mutex<Option<Live>>,
    // Held for the duration of one write. Never held together with `live`.
    writing: Mutex<()>,
    connected: AtomicBool,
    disconnecting: AtomicBool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a new disconnected `Connection`.
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the dispatcher this connection publishes its events through.
    pub fn events(&self) -> &Dispatcher<ConnectionEvent> {
        &self.events
    }
    /// Returns `true` if the socket is open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
    /// Opens a connection and starts the read loop.
    ///
    /// Any previous connection is closed first.
    /// Returns `false` if the connection could not be established,
    /// after publishing a [`ConnectionEvent::Error`].
    pub fn connect(self: &Arc<Self>, host: &str, port: u16) -> bool {
        self.disconnect();
        tracing::info!(target: "ivybot", "connecting to {host}:{port}");
        let streams = TcpStream::connect((host, port)).and_then(|s| {
            let reader = s.try_clone()?;
            Ok((s, reader))
        });
        let (stream, reader_stream) = match streams {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "ivybot", "could not connect to {host}:{port}: {e}");
                self.events.publish(&ConnectionEvent::Error(Arc::new(e)));
                return false;
            }
        };
        self.disconnecting.store(false, Ordering::Release);
        self.connected.store(true, Ordering::Release);
        *lock(&self.live) = Some(Live { stream: Arc::new(stream), reader: None });
        self.events.publish(&ConnectionEvent::Connected);
        let this = self.clone();
        let spawned = std::thread::Builder::new()
            .name("ivybot-reader".to_owned())
            .spawn(move || this.read_loop(reader_stream));
        let reader = match spawned {
            Ok(reader) => reader,
            Err(e) => {
                tracing::error!(target: "ivybot", "could not start the read loop: {e}");
                self.disconnect();
                self.connected.store(false, Ordering::Release);
                self.events.publish(&ConnectionEvent::Error(Arc::new(e)));
                self.events.publish(&ConnectionEvent::Disconnected);
                return false;
            }
        };
        let orphan = match lock(&self.live).as_mut() {
            Some(live) => {
                live.reader = Some(reader);
                None
            }
            None => Some(reader),
        };
        // Disconnected while the Connected observers ran.
        if let Some(reader) = orphan {
            join_reader(reader);
        }
        true
    }
    /// Writes one line, appending CRLF.
    ///
    /// Anything from the first CR or LF in `line` onwards is dropped.
    /// Returns `false` if not connected or if the write failed,
    /// in which case a [`ConnectionEvent::Error`] is published.
    /// A write blocked on a full socket buffer is released by [`disconnect`][Self::disconnect].
    pub fn send(&self, line: &str) -> bool {
        let line = first_line(line);
        let Some(stream) = self.stream() else {
            tracing::debug!(target: "ivybot", "not connected, dropping: {line}");
            return false;
        };
        let _writing = lock(&self.writing);
        if self.disconnecting.load(Ordering::Acquire) {
            return false;
        }
        match write_line(&stream, line) {
            Ok(()) => true,
            Err(e) if self.disconnecting.load(Ordering::Acquire) => {
                tracing::debug!(target: "ivybot", "send interrupted by disconnect: {e}");
                false
            }
            Err(e) => {
                tracing::warn!(target: "ivybot", "send failed: {e}");
                self.events.publish(&ConnectionEvent::Error(Arc::new(e)));
                false
            }
        }
    }
    /// Writes one line if no other write is in progress, waiting at most `timeout` for it.
    ///
    /// Failures are not published. Used for lines sent right before disconnecting.
    pub fn try_send(&self, line: &str, timeout: Duration) -> bool {
        let line = first_line(line);
        let Some(stream) = self.stream() else {
            return false;
        };
        let _writing = match self.writing.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => {
                tracing::debug!(target: "ivybot", "socket busy, dropping: {line}");
                return false;
            }
        };
        if stream.set_write_timeout(Some(timeout)).is_err() {
            return false;
        }
        let result = write_line(&stream, line);
        let _ = stream.set_write_timeout(None);
        if let Err(e) = &result {
            tracing::debug!(target: "ivybot", "could not send {line}: {e}");
        }
        result.is_ok()
    }
    fn stream(&self) -> Option<Arc<TcpStream>> {
        lock(&self.live).as_ref().map(|live| live.stream.clone())
    }
    /// Closes the socket and waits for the read loop to exit.
    ///
    /// When called from the reader thread itself, returns without waiting;
    /// the loop exits once the current event has been handled.
    pub fn disconnect(&self) {
        self.disconnecting.store(true, Ordering::Release);
        let Some(live) = lock(&self.live).take() else {
            return;
        };
        tracing::debug!(target: "ivybot", "disconnecting");
        let _ = live.stream.shutdown(Shutdown::Both);
        if let Some(reader) = live.reader {
            join_reader(reader);
        }
    }

    fn read_loop(&self, stream: TcpStream) {
        let mut reader = BufReader::with_capacity(BUFSIZE, stream);
        let mut buf = Vec::with_capacity(512);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    tracing::debug!(target: "ivybot", "server closed the connection");
                    break;
                }
                Ok(_) => {
                    if self.disconnecting.load(Ordering::Acquire) {
                        break;
                    }
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();
                    if line.trim_start().is_empty() {
                        continue;
                    }
                    tracing::trace!(target: "ivybot", "-> {line}");
                    self.events.publish(&ConnectionEvent::Data(line.to_owned()));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => (),
                Err(e) => {
                    if !self.disconnecting.load(Ordering::Acquire) {
                        tracing::warn!(target: "ivybot", "read failed: {e}");
                    }
                    break;
                }
            }
        }
        let _ = reader.get_ref().shutdown(Shutdown::Both);
        {
            let mut live = lock(&self.live);
            let me = std::thread::current().id();
            if live.as_ref().and_then(|l| l.reader.as_ref()).is_some_and(|r| r.thread().id() == me)
            {
                // Detaches this thread's own handle.
                live.take();
            }
        }
        self.connected.store(false, Ordering::Release);
        self.events.publish(&ConnectionEvent::Disconnected);
    }
}

fn first_line(line: &str) -> &str {
    line.find(['\r', '\n']).map_or(line, |idx| &line[..idx])
}

fn write_line(mut stream: &TcpStream, line: &str) -> std::io::Result<()> {
    let mut buf = String::with_capacity(line.len() + 2);
    buf.push_str(line);
    buf.push_str("\r\n");
    stream.write_all(buf.as_bytes())?;
    tracing::trace!(target: "ivybot", "<- {line}");
    Ok(())
}

fn join_reader(reader: JoinHandle<()>) {
    if reader.thread().id() == std::thread::current().id() {
        return;
    }
    if reader.join().is_err() {
        tracing::error!(target: "ivybot", "read loop panicked");
    }
}
