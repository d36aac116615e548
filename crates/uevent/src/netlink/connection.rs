//! Uevent connection: one bound kernel socket with exactly-one-datagram reads.
//!
//! # Example
//!
//! ```ignore
//! use uevent::netlink::{Connection, Mode};
//!
//! let conn = Connection::open(Mode::Udev)?;
//!
//! loop {
//!     let event = conn.read_event().await?;
//!     println!("[{}] {}", event.action, event.kobject_path);
//! }
//! ```

use std::fmt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::str::FromStr;

use bytes::{Bytes, BytesMut};

use super::error::{Error, Result};
use super::parse::parse_uevent;
use super::socket::UeventSocket;
use super::uevent::Uevent;

/// Which uevent source to listen to.
///
/// The value is the multicast group bitmask the socket binds to, and it
/// also selects the wire encoding of every datagram that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum Mode {
    /// Raw kernel events, native encoding.
    Kernel = 1,
    /// Events re-broadcast by udevd after rule processing, enriched
    /// encoding with more properties (vendor, serial, filesystem...).
    #[default]
    Udev = 2,
}

impl Mode {
    /// Multicast group bitmask for bind.
    pub const fn groups(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Kernel => f.write_str("kernel"),
            Mode::Udev => f.write_str("udev"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kernel" => Ok(Mode::Kernel),
            "udev" => Ok(Mode::Udev),
            _ => Err(Error::Config(format!(
                "unknown mode {s:?} (expected \"kernel\" or \"udev\")"
            ))),
        }
    }
}

/// A bound `NETLINK_KOBJECT_UEVENT` socket.
///
/// Reads are not safe to interleave: a peek sizes the datagram at the head
/// of the queue, and only the read that follows it may consume it. Every
/// read method takes `&self` but a connection should have one reader.
#[derive(Debug)]
pub struct Connection {
    socket: UeventSocket,
    mode: Mode,
}

impl Connection {
    /// Open a socket and join the multicast group for `mode`.
    pub fn open(mode: Mode) -> Result<Self> {
        Ok(Self::from_socket(UeventSocket::bind(mode.groups())?, mode))
    }

    pub(crate) fn from_socket(socket: UeventSocket, mode: Mode) -> Self {
        Self { socket, mode }
    }

    /// Get the mode this connection was opened with.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Get the underlying socket.
    pub fn socket(&self) -> &UeventSocket {
        &self.socket
    }

    /// Close the socket.
    ///
    /// Consuming `self` makes a double close impossible. Dropping the
    /// connection has the same effect.
    pub fn close(self) {
        drop(self);
    }

    /// Wait until a datagram is pending, without reading it.
    pub async fn ready(&self) -> Result<()> {
        self.socket.ready().await
    }

    /// Size the pending datagram without consuming it.
    ///
    /// Blocks until a datagram arrives. Returns the peeked byte count and
    /// an empty buffer whose capacity holds the whole datagram.
    pub async fn peek_size(&self) -> Result<(usize, BytesMut)> {
        self.socket.peek().await
    }

    /// Consume the pending datagram into `buf`.
    ///
    /// Previous contents are discarded and the whole capacity of `buf` is
    /// offered to the kernel; afterwards `buf` holds exactly the bytes
    /// received. `buf` should come from [`peek_size`](Self::peek_size). A
    /// buffer without capacity is rejected before the socket is touched.
    pub async fn read_exact(&self, buf: &mut BytesMut) -> Result<()> {
        if buf.capacity() == 0 {
            return Err(Error::Config("read into an empty buffer".into()));
        }

        buf.clear();
        let n = self.socket.recv_into(buf).await?;
        buf.truncate(n);
        Ok(())
    }

    /// Read exactly one complete datagram.
    pub async fn read_datagram(&self) -> Result<Bytes> {
        let (_, mut buf) = self.peek_size().await?;
        self.read_exact(&mut buf).await?;
        Ok(buf.freeze())
    }

    /// Read and parse one uevent.
    pub async fn read_event(&self) -> Result<Uevent> {
        let data = self.read_datagram().await?;
        parse_uevent(&data)
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::Action;
    use crate::netlink::fixtures::{connection_pair, enriched, native};

    #[test]
    fn mode_groups() {
        assert_eq!(Mode::Kernel.groups(), 1);
        assert_eq!(Mode::Udev.groups(), 2);
        assert_eq!(Mode::default(), Mode::Udev);
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("kernel".parse::<Mode>().unwrap(), Mode::Kernel);
        assert_eq!("udev".parse::<Mode>().unwrap(), Mode::Udev);

        let err = "both".parse::<Mode>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn mode_display_round_trips() {
        for mode in [Mode::Kernel, Mode::Udev] {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
    }

    #[tokio::test]
    async fn read_event_back_to_back() {
        let (tx, conn) = connection_pair(Mode::Kernel);
        tx.send(&native("add", "/devices/foo", &[("SEQNUM", "1")]))
            .unwrap();
        tx.send(&native("remove", "/devices/foo", &[("SEQNUM", "2")]))
            .unwrap();

        let first = conn.read_event().await.unwrap();
        assert_eq!(first.action, Action::Add);
        assert_eq!(first.seqnum(), Some(1));

        let second = conn.read_event().await.unwrap();
        assert_eq!(second.action, Action::Remove);
        assert_eq!(second.seqnum(), Some(2));
    }

    #[tokio::test]
    async fn read_event_enriched() {
        let (tx, conn) = connection_pair(Mode::Udev);
        tx.send(&enriched(&[("ACTION", "bind"), ("DEVPATH", "/devices/bar")]))
            .unwrap();

        let event = conn.read_event().await.unwrap();
        assert_eq!(event.action, Action::Bind);
        assert_eq!(event.kobject_path, "/devices/bar");
    }

    #[tokio::test]
    async fn peek_size_then_read_exact() {
        let (tx, conn) = connection_pair(Mode::Kernel);
        let payload = native("change", "/devices/big", &[("BLOB", &"z".repeat(9000))]);
        tx.send(&payload).unwrap();

        let (n, mut buf) = conn.peek_size().await.unwrap();
        assert_eq!(n, payload.len());
        assert!(buf.capacity() > n);

        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..], &payload[..]);
    }

    #[tokio::test]
    async fn read_exact_truncates_to_datagram() {
        let (tx, conn) = connection_pair(Mode::Kernel);
        let payload = native("add", "/devices/foo", &[]);
        tx.send(&payload).unwrap();

        let page = crate::netlink::page_size();
        let mut buf = BytesMut::zeroed(2 * page);
        conn.read_exact(&mut buf).await.unwrap();

        assert_eq!(buf.len(), payload.len());
        assert_eq!(&buf[..], &payload[..]);
    }

    #[tokio::test]
    async fn read_exact_rejects_buffer_without_capacity() {
        let (tx, conn) = connection_pair(Mode::Kernel);
        tx.send(b"add@/devices/foo\0").unwrap();

        let err = conn.read_exact(&mut BytesMut::new()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        // The datagram is still queued.
        let event = conn.read_event().await.unwrap();
        assert_eq!(event.kobject_path, "/devices/foo");
    }

    #[tokio::test]
    async fn read_datagram_returns_raw_bytes() {
        let (tx, conn) = connection_pair(Mode::Kernel);
        tx.send(b"garbage").unwrap();

        let data = conn.read_datagram().await.unwrap();
        assert_eq!(&data[..], b"garbage");
    }
}
