//! Runs the real `pingsvc` binary and checks the exit hook.
//!
//! SIGTERM must leave a readable artifact behind; SIGKILL must not.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use covrig_coverage::artifact::CoverageData;
use covrig_runtime::readiness::{WaitStrategy, wait_until_ready};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr")
}

fn spawn(addr: SocketAddr, out: &Path, extra: &[&str]) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_pingsvc"))
        .arg("--bind")
        .arg(addr.to_string())
        .arg("--coverage-out")
        .arg(out)
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn pingsvc");
    let strategy =
        WaitStrategy::tcp(Duration::from_secs(10)).with_interval(Duration::from_millis(20));
    let _ = wait_until_ready(addr, &strategy).expect("pingsvc ready");
    child
}

fn send(child: &Child, signal: Signal) {
    let pid = Pid::from_raw(i32::try_from(child.id()).expect("pid"));
    kill(pid, signal).expect("signal");
}

fn wait_exit(child: &mut Child, within: Duration) -> std::process::ExitStatus {
    let deadline = Instant::now() + within;
    loop {
        if let Some(status) = child.try_wait().expect("try_wait") {
            return status;
        }
        assert!(Instant::now() < deadline, "pingsvc did not exit in {within:?}");
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn sigterm_flushes_coverage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("covrig.exec");
    let addr = free_addr();
    let mut child = spawn(addr, &out, &[]);

    let body = reqwest::blocking::get(format!("http://{addr}/ping"))
        .expect("GET /ping")
        .text()
        .expect("body");
    assert_eq!(body, "pong");
    assert!(!out.exists(), "nothing is written before exit");

    send(&child, Signal::SIGTERM);
    let status = wait_exit(&mut child, Duration::from_secs(10));
    assert!(status.success());

    let data = CoverageData::read(&out).expect("artifact");
    assert_eq!(data.probes.get("GET /ping"), Some(&1));
    assert_eq!(data.probes.get("GET /unused"), Some(&0));
}

#[test]
fn sigkill_leaves_no_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("covrig.exec");
    let addr = free_addr();
    let mut child = spawn(addr, &out, &[]);

    let _ = reqwest::blocking::get(format!("http://{addr}/ping")).expect("GET /ping");
    send(&child, Signal::SIGKILL);
    let status = wait_exit(&mut child, Duration::from_secs(10));
    assert!(!status.success());
    assert!(!out.exists());
    assert!(std::fs::read_dir(dir.path()).expect("read_dir").next().is_none());
}

#[test]
fn slow_flush_still_completes_after_sigterm() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("covrig.exec");
    let addr = free_addr();
    let mut child = spawn(addr, &out, &["--flush-delay-ms", "300"]);

    let started = Instant::now();
    send(&child, Signal::SIGTERM);
    let status = wait_exit(&mut child, Duration::from_secs(10));
    assert!(status.success());
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(CoverageData::read(&out).is_ok());
}
