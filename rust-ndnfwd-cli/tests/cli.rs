use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const INTEREST_A_NONCE_1: &str = "050703080161000000010000000fa00000000000000000";

fn ndnfwd() -> Command {
    Command::cargo_bin("ndnfwd").unwrap()
}

fn routes_file() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[[routes]]
prefix = "/a"
face = 1
cost = 5

[[routes]]
prefix = "/a/b"
face = 2
cost = 1

[[routes]]
prefix = "/a/b"
face = 3
cost = 2
"#
    )
    .unwrap();
    file
}

#[test]
fn test_interest_encode() {
    ndnfwd()
        .args(["interest", "encode", "/a", "--nonce", "1"])
        .assert()
        .success()
        .stdout(format!("{}\n", INTEREST_A_NONCE_1));
}

#[test]
fn test_interest_encode_rejects_bad_name() {
    ndnfwd()
        .args(["interest", "encode", "a//b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid name"));
}

#[test]
fn test_packet_decode() {
    ndnfwd()
        .args(["packet", "decode", INTEREST_A_NONCE_1])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "/a""#))
        .stdout(predicate::str::contains(r#""lifetime_ms": 4000"#));
}

#[test]
fn test_packet_decode_wire_form() {
    let output = ndnfwd()
        .args(["interest", "encode", "/x/y", "--nonce", "9", "--wire"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let hex = String::from_utf8(output.stdout).unwrap();

    ndnfwd()
        .args(["packet", "decode", hex.trim()])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "/x/y""#))
        .stdout(predicate::str::contains(r#""nonce": 9"#));
}

#[test]
fn test_packet_decode_rejects_truncated_input() {
    ndnfwd()
        .args(["packet", "decode", &INTEREST_A_NONCE_1[..20]])
        .assert()
        .failure();
}

#[test]
fn test_fib_lookup() {
    let routes = routes_file();
    ndnfwd()
        .arg("--config")
        .arg(routes.path())
        .args(["fib", "lookup", "/a/b/c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/a/b/c matches /a/b"))
        .stdout(predicate::str::contains("1. face2 cost=1 status=GREEN"))
        .stdout(predicate::str::contains("2. face3 cost=2 status=GREEN"));
}

#[test]
fn test_fib_lookup_without_route() {
    let routes = routes_file();
    ndnfwd()
        .arg("--config")
        .arg(routes.path())
        .args(["fib", "lookup", "/zzz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No route for /zzz"));
}

#[test]
fn test_fib_show() {
    let routes = routes_file();
    ndnfwd()
        .arg("--config")
        .arg(routes.path())
        .args(["fib", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FIB (2 entries)"))
        .stdout(predicate::str::contains("/a face1(cost=5, GREEN)"));

    ndnfwd()
        .arg("--config")
        .arg(routes.path())
        .args(["fib", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""prefix": "/a/b""#));
}

#[test]
fn test_simulate() {
    ndnfwd()
        .args(["simulate", "-n", "5", "--producers", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Satisfied:  5"))
        .stdout(predicate::str::contains("Unanswered: 0"))
        .stdout(predicate::str::contains("Content Store hits:  0"));
}

#[test]
fn test_simulate_with_lossy_producer() {
    ndnfwd()
        .args(["simulate", "-n", "4", "--producers", "2", "--drop-every", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Simulation results"));
}
