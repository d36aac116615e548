//! Low-level async `NETLINK_KOBJECT_UEVENT` socket operations.
//!
//! Uevent sockets deliver each message as one atomic datagram. A read
//! into a buffer that is too small silently drops the rest, so the size
//! has to be discovered with `MSG_PEEK` before the consuming read.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use bytes::{BufMut, BytesMut};
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::unix::AsyncFd;

use super::error::{Error, Result};

/// Size of one virtual-memory page, the probe buffer's growth step.
pub fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

/// `Socket::recv` into the spare capacity of `buf`, retrying on `EINTR`.
fn recv<B: BufMut>(socket: &Socket, buf: &mut B, flags: libc::c_int) -> io::Result<usize> {
    loop {
        match socket.recv(buf, flags) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

/// Peek at the pending datagram without consuming it.
///
/// Starts with one page and grows by `page` bytes while the peek fills the
/// whole buffer. A count equal to the capacity means the datagram may have
/// been cut; a shorter count means it fit. Returns the count together with
/// an empty buffer whose capacity holds the whole datagram.
pub(crate) fn probe_datagram(socket: &Socket, page: usize) -> io::Result<(usize, BytesMut)> {
    let mut capacity = page;
    loop {
        let mut buf = BytesMut::with_capacity(capacity);
        let room = buf.capacity();

        let n = recv(socket, &mut buf, libc::MSG_PEEK)?;
        if n < room {
            buf.clear();
            return Ok((n, buf));
        }
        capacity = room + page;
    }
}

/// Async uevent socket bound to a multicast group bitmask.
pub struct UeventSocket {
    /// The underlying async file descriptor.
    fd: AsyncFd<Socket>,
    /// Multicast groups passed to bind.
    groups: u32,
    /// Probe growth step.
    page_size: usize,
}

impl UeventSocket {
    /// Create a raw `NETLINK_KOBJECT_UEVENT` socket and bind it to `groups`.
    ///
    /// If bind fails the socket is closed before the error is returned.
    pub fn bind(groups: u32) -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_KOBJECT_UEVENT)
            .map_err(|e| Error::transport("socket", e))?;

        // Port 0 lets the kernel pick the port ID.
        let addr = SocketAddr::new(0, groups);
        socket
            .bind(&addr)
            .map_err(|e| Error::transport("bind", e))?;

        Self::from_socket(socket, groups)
    }

    /// Wrap an already bound socket and register it with the runtime.
    pub(crate) fn from_socket(socket: Socket, groups: u32) -> Result<Self> {
        socket
            .set_non_blocking(true)
            .map_err(|e| Error::transport("set non-blocking", e))?;

        let fd = AsyncFd::new(socket).map_err(|e| Error::transport("register", e))?;

        Ok(Self {
            fd,
            groups,
            page_size: page_size(),
        })
    }

    /// Get the multicast groups this socket is bound to.
    pub fn groups(&self) -> u32 {
        self.groups
    }

    /// Wait until a datagram is pending.
    ///
    /// Readiness left over from an earlier read is cleared first, so this
    /// only returns once the kernel has queued something.
    pub async fn ready(&self) -> Result<()> {
        loop {
            let mut guard = self
                .fd
                .readable()
                .await
                .map_err(|e| Error::transport("poll", e))?;

            let mut byte = [0u8; 1];
            let mut probe = &mut byte[..];
            match guard.try_io(|inner| recv(inner.get_ref(), &mut probe, libc::MSG_PEEK)) {
                Ok(result) => {
                    return result.map(|_| ()).map_err(|e| Error::transport("peek", e));
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Wait for a datagram and size it without consuming it.
    pub async fn peek(&self) -> Result<(usize, BytesMut)> {
        loop {
            let mut guard = self
                .fd
                .readable()
                .await
                .map_err(|e| Error::transport("poll", e))?;

            match guard.try_io(|inner| probe_datagram(inner.get_ref(), self.page_size)) {
                Ok(result) => return result.map_err(|e| Error::transport("peek", e)),
                Err(_would_block) => continue,
            }
        }
    }

    /// Consume the pending datagram into the spare capacity of `buf`.
    ///
    /// Returns the datagram length; `buf` grows by the bytes that fit.
    pub async fn recv_into(&self, buf: &mut BytesMut) -> Result<usize> {
        loop {
            let mut guard = self
                .fd
                .readable()
                .await
                .map_err(|e| Error::transport("poll", e))?;

            match guard.try_io(|inner| recv(inner.get_ref(), buf, 0)) {
                Ok(result) => return result.map_err(|e| Error::transport("recv", e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsRawFd for UeventSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}

impl std::fmt::Debug for UeventSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UeventSocket")
            .field("fd", &self.as_raw_fd())
            .field("groups", &self.groups)
            .finish()
    }
}
