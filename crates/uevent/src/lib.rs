//! Async Linux kernel uevent listener.
//!
//! Opens a `NETLINK_KOBJECT_UEVENT` socket, reads whole datagrams without
//! truncation, decodes both the kernel and the udev wire encodings, and
//! runs a cancellable monitor that filters events through a [`Matcher`].
//!
//! # Features
//!
//! - `serde` - `Serialize` for [`Uevent`] and [`Action`]
//! - `integration` - tests that open real kernel sockets
//!
//! # Example
//!
//! ```ignore
//! use uevent::{Connection, Mode};
//!
//! #[tokio::main]
//! async fn main() -> uevent::Result<()> {
//!     let conn = Connection::open(Mode::Udev)?;
//!
//!     loop {
//!         let event = conn.read_event().await?;
//!         println!("{} {}", event.action, event.kobject_path);
//!     }
//! }
//! ```
//!
//! [`Matcher`]: netlink::Matcher

pub mod netlink;

// Re-export common types at crate root for convenience
pub use netlink::{Action, Connection, Error, Mode, Result, Uevent};
