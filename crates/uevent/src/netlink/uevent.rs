//! Kernel object events and their textual encoding.
//!
//! A [`Uevent`] is produced by the wire parser (see [`parse`](super::parse))
//! and is immutable afterwards. The [`Uevent::to_bytes`] encoding is the
//! kernel's native datagram layout and is used for diagnostics and tests,
//! never written back to the socket.
//!
//! # Example
//!
//! ```ignore
//! use uevent::netlink::{Action, Uevent};
//!
//! let event = Uevent::parse(b"add@/devices/foo\0DEVPATH=/devices/foo\0")?;
//! assert_eq!(event.action, Action::Add);
//! assert_eq!(event.kobject_path, "/devices/foo");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::error::{FormatError, Result};

/// Kobject action carried by a uevent.
///
/// These are the actions the kernel emits from `lib/kobject_uevent.c`.
/// There is no catch-all variant: anything else fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Action {
    Add,
    Remove,
    Change,
    Move,
    Online,
    Offline,
    Bind,
    Unbind,
}

impl Action {
    /// Every action, in kernel declaration order.
    pub const ALL: [Action; 8] = [
        Action::Add,
        Action::Remove,
        Action::Change,
        Action::Move,
        Action::Online,
        Action::Offline,
        Action::Bind,
        Action::Unbind,
    ];

    /// The wire spelling of this action.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Remove => "remove",
            Action::Change => "change",
            Action::Move => "move",
            Action::Online => "online",
            Action::Offline => "offline",
            Action::Bind => "bind",
            Action::Unbind => "unbind",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = FormatError;

    /// Case-sensitive: `"ADD"` is rejected.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| FormatError::UnknownAction(s.to_string()))
    }
}

/// A kernel object event.
///
/// Events from the udev-enriched source also carry `DEVPATH` in `env`
/// with the same value as `kobject_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Uevent {
    /// What happened to the object.
    pub action: Action,
    /// Kernel object path in sysfs (e.g. "/devices/virtual/block/loop0").
    pub kobject_path: String,
    /// Environment variables as key-value pairs.
    ///
    /// Common keys include:
    /// - `SUBSYSTEM`: Subsystem name (e.g. "usb", "block", "net")
    /// - `DEVNAME`: Device node name (e.g. "sda", "ttyUSB0")
    /// - `DEVTYPE`: Device type (e.g. "disk", "partition", "usb_device")
    /// - `MAJOR`/`MINOR`: Device numbers
    /// - `SEQNUM`: Event sequence number
    pub env: HashMap<String, String>,
}

/// First difference found by [`Uevent::compare`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UeventMismatch {
    #[error("wrong action (got: {got}, wanted: {wanted})")]
    Action { got: Action, wanted: Action },

    #[error("wrong kobject path (got: {got}, wanted: {wanted})")]
    KobjectPath { got: String, wanted: String },

    #[error("wrong length of env (got: {got}, wanted: {wanted})")]
    EnvLength { got: usize, wanted: usize },

    #[error("{key}={value} missing from other uevent")]
    MissingKey { key: String, value: String },

    #[error("wrong value for {key} (got: {got}, wanted: {wanted})")]
    IncorrectValue {
        key: String,
        got: String,
        wanted: String,
    },
}

impl Uevent {
    /// Parse a uevent from one raw datagram.
    ///
    /// See [`parse_uevent`](super::parse::parse_uevent).
    pub fn parse(data: &[u8]) -> Result<Self> {
        super::parse::parse_uevent(data)
    }

    /// Get an environment variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(|s| s.as_str())
    }

    /// Get the subsystem if available (e.g. "usb", "block").
    pub fn subsystem(&self) -> Option<&str> {
        self.get("SUBSYSTEM")
    }

    /// Get the device name if available (e.g. "sda1", "ttyUSB0").
    pub fn devname(&self) -> Option<&str> {
        self.get("DEVNAME")
    }

    /// Get the device type if available (e.g. "disk", "partition").
    pub fn devtype(&self) -> Option<&str> {
        self.get("DEVTYPE")
    }

    /// Get the driver name if available.
    pub fn driver(&self) -> Option<&str> {
        self.get("DRIVER")
    }

    /// Get the major device number if available.
    pub fn major(&self) -> Option<u32> {
        self.get("MAJOR").and_then(|s| s.parse().ok())
    }

    /// Get the minor device number if available.
    pub fn minor(&self) -> Option<u32> {
        self.get("MINOR").and_then(|s| s.parse().ok())
    }

    /// Get the event sequence number.
    pub fn seqnum(&self) -> Option<u64> {
        self.get("SEQNUM").and_then(|s| s.parse().ok())
    }

    /// Check if this is an "add" event.
    pub fn is_add(&self) -> bool {
        self.action == Action::Add
    }

    /// Check if this is a "remove" event.
    pub fn is_remove(&self) -> bool {
        self.action == Action::Remove
    }

    /// Check if this is a "change" event.
    pub fn is_change(&self) -> bool {
        self.action == Action::Change
    }

    /// Append the native encoding to `buf`.
    ///
    /// Layout: `action@kobject_path\0` then `key=value\0` per variable.
    /// Keys are written in sorted order so the output is reproducible.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.action.as_str().as_bytes());
        buf.push(b'@');
        buf.extend_from_slice(self.kobject_path.as_bytes());
        buf.push(0);

        let mut keys: Vec<&String> = self.env.keys().collect();
        keys.sort();
        for key in keys {
            buf.extend_from_slice(key.as_bytes());
            buf.push(b'=');
            buf.extend_from_slice(self.env[key].as_bytes());
            buf.push(0);
        }
    }

    /// Encode into a new buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }

    /// Compare with `other`, reporting the first difference.
    ///
    /// Checks action, kobject path, env size, then looks every variable of
    /// `self` up in `other`. Which key is reported when several differ
    /// depends on map iteration order.
    pub fn compare(&self, other: &Uevent) -> std::result::Result<(), UeventMismatch> {
        if self.action != other.action {
            return Err(UeventMismatch::Action {
                got: self.action,
                wanted: other.action,
            });
        }

        if self.kobject_path != other.kobject_path {
            return Err(UeventMismatch::KobjectPath {
                got: self.kobject_path.clone(),
                wanted: other.kobject_path.clone(),
            });
        }

        if self.env.len() != other.env.len() {
            return Err(UeventMismatch::EnvLength {
                got: self.env.len(),
                wanted: other.env.len(),
            });
        }

        for (key, value) in &self.env {
            match other.env.get(key) {
                None => {
                    return Err(UeventMismatch::MissingKey {
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
                Some(wanted) if wanted != value => {
                    return Err(UeventMismatch::IncorrectValue {
                        key: key.clone(),
                        got: value.clone(),
                        wanted: wanted.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
