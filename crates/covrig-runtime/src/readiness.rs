//! Readiness waiting: poll a port until the service answers or time runs out.

use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use covrig_common::constants;
use covrig_common::error::{CovrigError, Result};

/// How long a TCP probe waits for the peer to hang up before calling it ready.
const TCP_SETTLE: Duration = Duration::from_millis(50);

/// What counts as "ready".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessProbe {
    /// The port accepts a connection and keeps it open.
    Tcp,
    /// `GET path` answers with the expected status.
    Http {
        /// Request path, starting with `/`.
        path: String,
        /// Expected status code.
        expect_status: u16,
    },
}

/// Probe plus polling bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitStrategy {
    /// Readiness criterion.
    pub probe: ReadinessProbe,
    /// Total time budget.
    pub timeout: Duration,
    /// Pause between attempts.
    pub interval: Duration,
}

impl WaitStrategy {
    /// TCP listen-readiness with the given timeout.
    #[must_use]
    pub const fn tcp(timeout: Duration) -> Self {
        Self {
            probe: ReadinessProbe::Tcp,
            timeout,
            interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// `GET path` returning `200` with the given timeout.
    #[must_use]
    pub fn http(path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            probe: ReadinessProbe::Http {
                path: path.into(),
                expect_status: 200,
            },
            timeout,
            interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Overrides the poll interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Result of a single readiness attempt.
#[derive(Debug)]
pub enum Attempt {
    /// The target is ready.
    Ready,
    /// Not ready yet; the string says why.
    NotReady(String),
    /// Stop polling and fail with this error.
    Abort(CovrigError),
}

/// Polls `attempt` until it reports ready, aborts, or the timeout elapses.
///
/// `attempt` receives the remaining budget so no single try overruns the
/// timeout. Returns the elapsed wait on success.
///
/// # Errors
///
/// Returns `CovrigError::ReadinessTimeout` with the elapsed wait on timeout,
/// or the error carried by [`Attempt::Abort`].
pub fn poll_until<F>(target: &str, strategy: &WaitStrategy, mut attempt: F) -> Result<Duration>
where
    F: FnMut(Duration) -> Attempt,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last_reason = String::from("no attempt made");

    loop {
        let remaining = strategy.timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        attempts += 1;
        match attempt(remaining) {
            Attempt::Ready => {
                let elapsed = start.elapsed();
                tracing::info!(
                    probe = target,
                    attempts,
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "target is ready"
                );
                return Ok(elapsed);
            }
            Attempt::NotReady(reason) => {
                tracing::debug!(probe = target, attempts, %reason, "not ready yet");
                last_reason = reason;
            }
            Attempt::Abort(err) => return Err(err),
        }
        let remaining = strategy.timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(strategy.interval.min(remaining));
    }

    let elapsed = start.elapsed();
    tracing::warn!(probe = target, attempts, reason = %last_reason, "readiness timeout");
    Err(CovrigError::ReadinessTimeout {
        target: target.to_string(),
        elapsed,
        timeout: strategy.timeout,
    })
}

/// Blocks until `addr` satisfies the strategy's probe.
///
/// # Errors
///
/// Returns `CovrigError::ReadinessTimeout` if the probe never succeeds
/// within the timeout.
pub fn wait_until_ready(addr: SocketAddr, strategy: &WaitStrategy) -> Result<Duration> {
    let prober = Prober::new(addr, &strategy.probe)?;
    poll_until(&prober.target(), strategy, |budget| prober.probe(budget))
}

/// Executes single probe attempts against one address.
#[derive(Debug)]
pub struct Prober {
    addr: SocketAddr,
    probe: ReadinessProbe,
    client: Option<reqwest::blocking::Client>,
}

impl Prober {
    /// Prepares a prober, building the HTTP client once if needed.
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::Config` if the HTTP client cannot be built.
    pub fn new(addr: SocketAddr, probe: &ReadinessProbe) -> Result<Self> {
        let client = match probe {
            ReadinessProbe::Tcp => None,
            ReadinessProbe::Http { .. } => Some(
                reqwest::blocking::Client::builder()
                    .build()
                    .map_err(|e| CovrigError::Config {
                        message: format!("failed to build HTTP client: {e}"),
                    })?,
            ),
        };
        Ok(Self {
            addr,
            probe: probe.clone(),
            client,
        })
    }

    /// Human-readable probe target.
    #[must_use]
    pub fn target(&self) -> String {
        match &self.probe {
            ReadinessProbe::Tcp => format!("tcp://{}", self.addr),
            ReadinessProbe::Http { path, .. } => format!("http://{}{path}", self.addr),
        }
    }

    /// Runs one attempt bounded by `budget`.
    pub fn probe(&self, budget: Duration) -> Attempt {
        match (&self.probe, &self.client) {
            (ReadinessProbe::Http { expect_status, .. }, Some(client)) => {
                match client.get(self.target()).timeout(budget).send() {
                    Ok(resp) if resp.status().as_u16() == *expect_status => Attempt::Ready,
                    Ok(resp) => Attempt::NotReady(format!("status {}", resp.status())),
                    Err(e) => Attempt::NotReady(e.to_string()),
                }
            }
            _ => probe_tcp(self.addr, budget),
        }
    }
}

/// Connects and checks the peer does not hang up straight away.
///
/// Port proxies accept connections before anything listens behind them and
/// then close; only a connection that stays open counts as ready.
fn probe_tcp(addr: SocketAddr, budget: Duration) -> Attempt {
    let mut stream = match TcpStream::connect_timeout(&addr, budget) {
        Ok(stream) => stream,
        Err(e) => return Attempt::NotReady(e.to_string()),
    };
    if stream.set_read_timeout(Some(TCP_SETTLE.min(budget))).is_err() {
        return Attempt::Ready;
    }
    let mut buf = [0u8; 1];
    match stream.read(&mut buf) {
        Ok(0) => Attempt::NotReady("connection closed by peer".into()),
        Ok(_) => Attempt::Ready,
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Attempt::Ready,
        Err(e) => Attempt::NotReady(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(timeout_ms: u64) -> WaitStrategy {
        WaitStrategy::tcp(Duration::from_millis(timeout_ms)).with_interval(Duration::from_millis(10))
    }

    #[test]
    fn poll_until_returns_after_first_ready_attempt() {
        let mut calls = 0;
        let elapsed = poll_until("t", &fast(1_000), |_| {
            calls += 1;
            if calls < 3 {
                Attempt::NotReady("warming up".into())
            } else {
                Attempt::Ready
            }
        })
        .expect("ready");
        assert_eq!(calls, 3);
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn poll_until_times_out_with_elapsed() {
        let err = poll_until("t", &fast(100), |_| Attempt::NotReady("closed".into()))
            .expect_err("should time out");
        match err {
            CovrigError::ReadinessTimeout {
                elapsed, timeout, ..
            } => {
                assert_eq!(timeout, Duration::from_millis(100));
                assert!(elapsed >= timeout);
                assert!(elapsed < Duration::from_secs(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn poll_until_stops_on_abort() {
        let mut calls = 0;
        let err = poll_until("t", &fast(5_000), |_| {
            calls += 1;
            Attempt::Abort(CovrigError::Config {
                message: "exited".into(),
            })
        })
        .expect_err("abort");
        assert_eq!(calls, 1);
        assert!(matches!(err, CovrigError::Config { .. }));
    }

    #[test]
    fn attempt_budget_never_exceeds_timeout() {
        let timeout = Duration::from_millis(200);
        let _ = poll_until("t", &fast(200), |budget| {
            assert!(budget <= timeout);
            Attempt::NotReady("no".into())
        });
    }

    #[test]
    fn targets_render_scheme() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().expect("addr");
        let tcp = Prober::new(addr, &ReadinessProbe::Tcp).expect("prober");
        assert_eq!(tcp.target(), "tcp://127.0.0.1:8080");
        let http = Prober::new(
            addr,
            &ReadinessProbe::Http {
                path: "/health".into(),
                expect_status: 200,
            },
        )
        .expect("prober");
        assert_eq!(http.target(), "http://127.0.0.1:8080/health");
    }
}
