//! udevmon - watch kernel and udev device events.

mod output;

use clap::Parser;
use tokio_stream::StreamExt;
use uevent::netlink::{
    Action, Connection, Mode, Monitor, MonitorBuilder, MonitorState, PropertyMatcher,
};

#[derive(Parser)]
#[command(name = "udevmon", version, about = "Watch kernel and udev device events")]
struct Cli {
    /// Event source: kernel or udev.
    #[arg(short, long, default_value_t = Mode::Udev)]
    mode: Mode,

    /// Exit after this many matching events (0 = never).
    #[arg(short = 'n', long, default_value_t = 0)]
    limit: usize,

    /// Only show this action (repeatable).
    #[arg(short, long = "action", value_name = "ACTION")]
    actions: Vec<Action>,

    /// Only show events from this subsystem.
    #[arg(short, long, value_name = "NAME")]
    subsystem: Option<String>,

    /// Only show events carrying KEY=VALUE (repeatable).
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    env: Vec<(String, String)>,

    /// Output JSON, one event per line.
    #[arg(short, long)]
    json: bool,

    /// Log monitor activity to stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Build a matcher from the filter flags, if any were given.
    fn matcher(&self) -> Option<PropertyMatcher> {
        let mut matcher = PropertyMatcher::new();
        for action in &self.actions {
            matcher = matcher.action(*action);
        }
        if let Some(subsystem) = &self.subsystem {
            matcher = matcher.subsystem(subsystem.clone());
        }
        for (key, value) in &self.env {
            matcher = matcher.property(key.clone(), value.clone());
        }

        (!matcher.is_empty()).then_some(matcher)
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let conn = Connection::open(cli.mode)?;

    let mut builder = MonitorBuilder::new().limit(cli.limit);
    if let Some(matcher) = cli.matcher() {
        builder = builder.matcher(matcher);
    }

    let Monitor {
        mut events,
        mut errors,
        cancel,
        task,
    } = builder.spawn(conn);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => output::print_event(&event, cli.json)?,
                None => break,
            },
            Some(err) = errors.next() => output::print_error(&err),
        }
    }

    // The error stream closes once the worker has ended.
    while let Some(err) = errors.next().await {
        output::print_error(&err);
    }

    if task.join().await == MonitorState::Failed {
        eprintln!("Error: monitor failed");
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use uevent::netlink::Matcher;

    use super::*;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["udevmon"]).unwrap();
        assert_eq!(cli.mode, Mode::Udev);
        assert_eq!(cli.limit, 0);
        assert!(!cli.json);
        assert!(cli.matcher().is_none());
    }

    #[test]
    fn filters_build_matcher() {
        let cli = Cli::try_parse_from([
            "udevmon", "-m", "kernel", "-n", "3", "-a", "add", "-a", "remove", "-s", "block",
            "-e", "DEVTYPE=disk",
        ])
        .unwrap();
        assert_eq!(cli.mode, Mode::Kernel);
        assert_eq!(cli.limit, 3);
        assert_eq!(cli.actions, vec![Action::Add, Action::Remove]);

        let mut matcher = cli.matcher().unwrap();
        matcher.compile().unwrap();

        let disk = uevent::Uevent::parse(b"add@/devices/sda\0SUBSYSTEM=block\0DEVTYPE=disk\0").unwrap();
        let part =
            uevent::Uevent::parse(b"add@/devices/sda1\0SUBSYSTEM=block\0DEVTYPE=partition\0").unwrap();
        assert!(matcher.evaluate(&disk));
        assert!(!matcher.evaluate(&part));
    }

    #[test]
    fn key_value_keeps_equals_in_value() {
        assert_eq!(
            parse_key_value("ID_FS_LABEL=a=b").unwrap(),
            ("ID_FS_LABEL".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("NOVALUE").is_err());
    }
}
