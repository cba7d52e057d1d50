//! WebSocket transport to the hgdb runtime.
//!
//! One background thread owns the socket. Outbound frames travel through an
//! unbounded channel, so payloads produced before the connection is
//! established are buffered and flushed in FIFO order right after the
//! `Connected` event; the thread is the sole writer to the socket.

use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Poll period of the socket thread. Bounds the latency of outbound frames
/// queued while the thread is blocked in a read.
const READ_TIMEOUT: Duration = Duration::from_millis(20);

#[derive(Debug)]
pub enum TransportEvent {
    /// The socket is open, queued frames are about to flush. Emitted once.
    Connected,
    /// One inbound text frame.
    Message(String),
    /// The peer closed the connection or the socket died mid-session.
    Closed,
    /// Connecting failed, the session never started.
    Failed(String),
}

enum Outbound {
    Frame(String),
    Close,
}

/// Handle to the socket thread. Cheap to clone, safe to drop: the thread
/// shuts down once the peer closes or `close` is called.
#[derive(Clone)]
pub struct Transport {
    outbound: Sender<Outbound>,
}

impl Transport {
    /// Spawn the socket thread connecting to `ws://{addr}`. Events are
    /// delivered through `events`; the caller must wait for `Connected` or
    /// `Failed` before assuming anything about the session.
    pub fn connect(addr: &str, events: Sender<TransportEvent>) -> Transport {
        let (out_tx, out_rx) = mpsc::channel();
        let url = format!("ws://{addr}");

        thread::spawn(move || socket_loop(url, out_rx, events));

        Transport { outbound: out_tx }
    }

    /// Queue one text frame. Frames sent before the connection is up are
    /// delivered in order right after it opens.
    pub fn send(&self, frame: String) {
        _ = self.outbound.send(Outbound::Frame(frame));
    }

    /// Close the connection. Idempotent, subsequent frames are discarded.
    pub fn close(&self) {
        _ = self.outbound.send(Outbound::Close);
    }
}

fn socket_loop(url: String, outbound: Receiver<Outbound>, events: Sender<TransportEvent>) {
    let mut socket = match tungstenite::connect(url.as_str()) {
        Ok((socket, _response)) => socket,
        Err(e) => {
            _ = events.send(TransportEvent::Failed(e.to_string()));
            return;
        }
    };

    if let Err(e) = set_read_timeout(&socket) {
        _ = events.send(TransportEvent::Failed(e.to_string()));
        return;
    }

    _ = events.send(TransportEvent::Connected);

    loop {
        // Flush everything queued by the session side before the next read.
        loop {
            match outbound.try_recv() {
                Ok(Outbound::Frame(frame)) => {
                    if let Err(e) = socket.send(Message::Text(frame.into())) {
                        log::error!(target: "transport", "send failed: {e}");
                        _ = events.send(TransportEvent::Closed);
                        return;
                    }
                }
                Ok(Outbound::Close) => {
                    _ = socket.close(None);
                    // Keep reading, the close handshake completes below.
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    _ = socket.close(None);
                    break;
                }
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                _ = events.send(TransportEvent::Message(text.to_string()));
            }
            Ok(Message::Close(_)) => {
                _ = events.send(TransportEvent::Closed);
                return;
            }
            // Binary, ping and pong frames carry no protocol payload.
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                _ = events.send(TransportEvent::Closed);
                return;
            }
            Err(e) => {
                log::error!(target: "transport", "socket error: {e}");
                _ = events.send(TransportEvent::Closed);
                return;
            }
        }
    }
}

fn set_read_timeout(socket: &WebSocket<MaybeTlsStream<TcpStream>>) -> std::io::Result<()> {
    if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
    }
    Ok(())
}
