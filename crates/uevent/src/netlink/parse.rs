//! Uevent wire format parsing.
//!
//! Two encodings arrive on a `NETLINK_KOBJECT_UEVENT` socket depending on
//! the multicast group it joined:
//!
//! - **Native** (group 1, sent by the kernel):
//!   `action@devpath\0KEY=VALUE\0...KEY=VALUE\0`
//! - **Enriched** (group 2, re-broadcast by udevd): a 40-byte
//!   [`UdevMonitorHeader`] followed, at `properties_off`, by
//!   `KEY=VALUE\0` fields that include `ACTION` and `DEVPATH`.
//!
//! The udev header mixes byte orders: the magic and filter hashes are
//! big-endian, the size and offset fields use host order.

use std::borrow::Cow;
use std::collections::HashMap;

use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::{FormatError, Result};
use super::uevent::{Action, Uevent};

/// Prefix identifying a datagram re-broadcast by udevd.
pub const UDEV_MONITOR_PREFIX: [u8; 8] = *b"libudev\0";

/// Magic stored big-endian at bytes 8..12 of the udev header.
pub const UDEV_MONITOR_MAGIC: u32 = 0xfeed_cafe;

/// Size of [`UdevMonitorHeader`] on the wire.
pub const UDEV_MONITOR_HEADER_LEN: usize = std::mem::size_of::<UdevMonitorHeader>();

/// udev monitor netlink header (`struct monitor_netlink_header` in libudev).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct UdevMonitorHeader {
    /// Always `"libudev\0"`.
    pub prefix: [u8; 8],
    /// [`UDEV_MONITOR_MAGIC`], network byte order.
    pub magic: U32<BigEndian>,
    /// Size of this header, host byte order.
    pub header_size: u32,
    /// Offset of the properties payload, host byte order.
    pub properties_off: u32,
    /// Length of the properties payload, host byte order.
    pub properties_len: u32,
    /// MurmurHash2 of the subsystem, for socket filters.
    pub filter_subsystem_hash: U32<BigEndian>,
    /// MurmurHash2 of the devtype, for socket filters.
    pub filter_devtype_hash: U32<BigEndian>,
    /// Tag bloom filter, high word.
    pub filter_tag_bloom_hi: U32<BigEndian>,
    /// Tag bloom filter, low word.
    pub filter_tag_bloom_lo: U32<BigEndian>,
}

/// Check whether `data` uses the udev-enriched encoding.
///
/// Anything not longer than the udev header, or not starting with
/// [`UDEV_MONITOR_PREFIX`], is treated as native.
pub fn is_enriched(data: &[u8]) -> bool {
    data.len() > UDEV_MONITOR_HEADER_LEN && data.starts_with(&UDEV_MONITOR_PREFIX)
}

/// Parse one raw datagram into a [`Uevent`], dispatching on its encoding.
pub fn parse_uevent(data: &[u8]) -> Result<Uevent> {
    let event = if is_enriched(data) {
        parse_enriched(data)?
    } else {
        parse_native(data)?
    };
    Ok(event)
}

/// Parse the kernel's native `action@devpath` encoding.
pub fn parse_native(data: &[u8]) -> std::result::Result<Uevent, FormatError> {
    let mut fields = data.split(|&b| b == 0);
    // split() always yields at least one item
    let header = fields.next().unwrap_or_default();

    let mut parts = header.split(|&b| b == b'@');
    let (Some(action), Some(kobject_path), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(FormatError::MalformedHeader(lossy(header).into_owned()));
    };

    let action: Action = lossy(action).parse()?;
    let env = parse_env(fields)?;

    Ok(Uevent {
        action,
        kobject_path: lossy(kobject_path).into_owned(),
        env,
    })
}

/// Parse the udev-enriched encoding.
pub fn parse_enriched(data: &[u8]) -> std::result::Result<Uevent, FormatError> {
    let (header, _) = UdevMonitorHeader::read_from_prefix(data)
        .map_err(|_| FormatError::MalformedHeader("short udev monitor header".into()))?;

    let magic = header.magic.get();
    if magic != UDEV_MONITOR_MAGIC {
        return Err(FormatError::MagicMismatch { found: magic });
    }

    let offset = header.properties_off;
    let start = offset as usize;
    if start >= data.len() {
        return Err(FormatError::InvalidOffset {
            offset,
            len: data.len(),
        });
    }

    let env = parse_env(data[start..].split(|&b| b == 0))?;

    let action: Action = env
        .get("ACTION")
        .map(|a| a.to_lowercase())
        .unwrap_or_default()
        .parse()?;
    let kobject_path = env.get("DEVPATH").cloned().unwrap_or_default();

    Ok(Uevent {
        action,
        kobject_path,
        env,
    })
}

/// Collect `KEY=VALUE` fields, ignoring the piece after the last NUL.
fn parse_env<'a, I>(fields: I) -> std::result::Result<HashMap<String, String>, FormatError>
where
    I: Iterator<Item = &'a [u8]>,
{
    let mut fields: Vec<&[u8]> = fields.collect();
    fields.pop();

    let mut env = HashMap::with_capacity(fields.len());
    for field in fields {
        let mut parts = field.split(|&b| b == b'=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(FormatError::MalformedField(lossy(field).into_owned()));
        };
        env.insert(lossy(key).into_owned(), lossy(value).into_owned());
    }
    Ok(env)
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}
