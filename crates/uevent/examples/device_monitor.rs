//! Monitor device hotplug events.
//!
//! Receives the uevents udevd re-broadcasts after rule processing, so the
//! properties include what udev rules added (vendor, model, filesystem...).
//!
//! Run with: cargo run -p uevent --example device_monitor
//!
//! Try plugging in a USB device to see events.

use tokio_stream::StreamExt;
use uevent::netlink::{Action, Connection, Mode, MonitorBuilder, PropertyMatcher, Uevent};

#[tokio::main]
async fn main() -> uevent::Result<()> {
    let conn = Connection::open(Mode::Udev)?;

    let mut monitor = MonitorBuilder::new()
        .matcher(PropertyMatcher::new().action(Action::Add).action(Action::Remove))
        .spawn(conn);

    println!("Monitoring device add/remove events...");
    println!("Press Ctrl+C to exit.\n");

    let cancel = monitor.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    loop {
        tokio::select! {
            event = monitor.events.next() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
            Some(err) = monitor.errors.next() => eprintln!("warning: {}", err),
        }
    }

    println!("monitor ended: {:?}", monitor.task.join().await);
    Ok(())
}

fn print_event(event: &Uevent) {
    println!(
        "[{}] {} ({})",
        event.action.as_str().to_uppercase(),
        event.kobject_path,
        event.subsystem().unwrap_or("?")
    );

    if let Some(devname) = event.devname() {
        println!("  Device: /dev/{}", devname);
    }

    if let (Some(major), Some(minor)) = (event.major(), event.minor()) {
        println!("  Major:Minor: {}:{}", major, minor);
    }

    if let Some(seqnum) = event.seqnum() {
        println!("  Seqnum: {}", seqnum);
    }

    println!();
}
