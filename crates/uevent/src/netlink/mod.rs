//! Async kernel uevent (`NETLINK_KOBJECT_UEVENT`) implementation.
//!
//! The kernel broadcasts a datagram whenever a device is added, removed or
//! changes state. Two sources exist, selected by [`Mode`]: raw kernel
//! events and events re-broadcast by udevd after rule processing. Both
//! wire encodings decode to the same [`Uevent`].
//!
//! # Quick Start
//!
//! ```ignore
//! use uevent::netlink::{Connection, Mode};
//!
//! let conn = Connection::open(Mode::Kernel)?;
//! let event = conn.read_event().await?;
//! println!("{} {}", event.action, event.kobject_path);
//! ```
//!
//! # Monitoring
//!
//! ```ignore
//! use uevent::netlink::{Action, Connection, Mode, MonitorBuilder, PropertyMatcher};
//! use tokio_stream::StreamExt;
//!
//! let mut monitor = MonitorBuilder::new()
//!     .matcher(PropertyMatcher::new().action(Action::Add))
//!     .spawn(Connection::open(Mode::Udev)?);
//!
//! while let Some(event) = monitor.events.next().await {
//!     println!("{:?}", event.subsystem());
//! }
//! ```

pub mod connection;
mod error;
#[cfg(test)]
mod fixtures;
pub mod matcher;
pub mod monitor;
pub mod parse;
mod socket;
pub mod uevent;

pub use connection::{Connection, Mode};
pub use error::{Error, FormatError, Result};
pub use matcher::{FnMatcher, Matcher, PropertyMatcher, match_fn};
pub use monitor::{
    CancelHandle, DatagramSource, Monitor, MonitorBuilder, MonitorState, MonitorTask,
    start_monitor,
};
pub use parse::{UdevMonitorHeader, is_enriched, parse_uevent};
pub use socket::{UeventSocket, page_size};
pub use uevent::{Action, Uevent, UeventMismatch};
