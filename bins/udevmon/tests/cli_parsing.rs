//! CLI argument parsing tests for udevmon.
//!
//! These tests only exercise argument parsing; none of them reaches the
//! point of opening a uevent socket.

use assert_cmd::Command;
use predicates::prelude::*;

fn udevmon_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_udevmon"))
}

mod global_flags {
    use super::*;

    #[test]
    fn test_help() {
        udevmon_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Watch kernel and udev device events"))
            .stdout(predicate::str::contains("--mode"))
            .stdout(predicate::str::contains("--limit"));
    }

    #[test]
    fn test_version() {
        udevmon_cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("udevmon"));
    }

    #[test]
    fn test_unknown_flag() {
        udevmon_cmd()
            .arg("--bogus")
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn test_unexpected_positional() {
        udevmon_cmd().arg("extra").assert().failure();
    }
}

mod mode_flag {
    use super::*;

    #[test]
    fn test_invalid_mode() {
        udevmon_cmd()
            .args(["--mode", "both"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("both"));
    }

    #[test]
    fn test_mode_requires_value() {
        udevmon_cmd().arg("-m").assert().failure();
    }
}

mod filter_flags {
    use super::*;

    #[test]
    fn test_invalid_action() {
        udevmon_cmd()
            .args(["--action", "explode"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("explode"));
    }

    #[test]
    fn test_action_is_case_sensitive() {
        udevmon_cmd().args(["-a", "ADD"]).assert().failure();
    }

    #[test]
    fn test_env_without_equals() {
        udevmon_cmd()
            .args(["--env", "SUBSYSTEM"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("KEY=VALUE"));
    }

    #[test]
    fn test_env_with_empty_key() {
        udevmon_cmd()
            .args(["-e", "=usb"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("KEY=VALUE"));
    }

    #[test]
    fn test_limit_must_be_number() {
        udevmon_cmd()
            .args(["--limit", "many"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid value"));
    }

    #[test]
    fn test_negative_limit() {
        udevmon_cmd().args(["-n", "-1"]).assert().failure();
    }
}
