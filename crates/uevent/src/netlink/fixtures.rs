//! Datagram builders shared by the unit tests.

use std::os::unix::io::{FromRawFd, IntoRawFd};
use std::os::unix::net::UnixDatagram;

use netlink_sys::Socket;
use zerocopy::IntoBytes;
use zerocopy::byteorder::U32;

use super::connection::{Connection, Mode};
use super::parse::{UDEV_MONITOR_HEADER_LEN, UDEV_MONITOR_MAGIC, UDEV_MONITOR_PREFIX, UdevMonitorHeader};
use super::socket::UeventSocket;

/// Kernel-format datagram: `action@path\0K=V\0...`.
pub fn native(action: &str, path: &str, env: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = format!("{action}@{path}\0").into_bytes();
    for (key, value) in env {
        buf.extend_from_slice(format!("{key}={value}\0").as_bytes());
    }
    buf
}

/// udev-format datagram with a complete 40-byte header.
pub fn enriched(env: &[(&str, &str)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (key, value) in env {
        payload.extend_from_slice(format!("{key}={value}\0").as_bytes());
    }

    let header = UdevMonitorHeader {
        prefix: UDEV_MONITOR_PREFIX,
        magic: U32::new(UDEV_MONITOR_MAGIC),
        header_size: UDEV_MONITOR_HEADER_LEN as u32,
        properties_off: UDEV_MONITOR_HEADER_LEN as u32,
        properties_len: payload.len() as u32,
        filter_subsystem_hash: U32::new(0),
        filter_devtype_hash: U32::new(0),
        filter_tag_bloom_hi: U32::new(0),
        filter_tag_bloom_lo: U32::new(0),
    };

    let mut buf = header.as_bytes().to_vec();
    buf.extend_from_slice(&payload);
    buf
}

/// udev-format datagram laid out by hand: prefix, big-endian `magic`,
/// host-order `offset` at bytes 16..20, then `payload` at `offset` (or
/// right after the header when `offset` points past it).
pub fn enriched_with_offset(magic: u32, offset: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 20];
    buf[..8].copy_from_slice(&UDEV_MONITOR_PREFIX);
    buf[8..12].copy_from_slice(&magic.to_be_bytes());
    buf[16..20].copy_from_slice(&offset.to_ne_bytes());

    let start = (offset as usize).clamp(20, UDEV_MONITOR_HEADER_LEN);
    buf.resize(start, 0);
    buf.extend_from_slice(payload);
    buf
}

/// A `UeventSocket` reading from a Unix datagram pair, plus the sending end.
///
/// Must be called inside a tokio runtime.
pub fn uevent_socket_pair() -> (UnixDatagram, UeventSocket) {
    let (tx, rx) = UnixDatagram::pair().unwrap();
    // SAFETY: the descriptor moves out of rx; the Socket closes it.
    let rx = unsafe { Socket::from_raw_fd(rx.into_raw_fd()) };
    (tx, UeventSocket::from_socket(rx, 0).unwrap())
}

/// A `Connection` over [`uevent_socket_pair`].
pub fn connection_pair(mode: Mode) -> (UnixDatagram, Connection) {
    let (tx, socket) = uevent_socket_pair();
    (tx, Connection::from_socket(socket, mode))
}
