//! In-memory runtime used by the lifecycle unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use covrig_common::error::{CovrigError, Result};
use covrig_common::types::{ContainerId, ProcessStatus, StopSignal};

use super::{ContainerRuntime, RunRequest};

/// How a fake container reacts to SIGTERM.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TermBehavior {
    /// Exits with code 0 once the flush delay has passed.
    ExitAfter(Duration),
    /// Keeps running until killed.
    Ignore,
}

/// A call recorded by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Run(String),
    HostPort(u16),
    Signal(StopSignal),
    Remove,
}

#[derive(Debug)]
struct FakeContainer {
    running: bool,
    exit_code: i32,
    term_at: Option<Instant>,
    ports: BTreeMap<u16, u16>,
}

#[derive(Debug)]
struct FakeState {
    next_id: u32,
    containers: HashMap<String, FakeContainer>,
    calls: Vec<Call>,
    term: TermBehavior,
    fail_run: Option<String>,
    fail_signal: bool,
    unmapped_ports: bool,
    ignore_kill: bool,
    latency: Duration,
    requests: Vec<RunRequest>,
}

#[derive(Debug)]
pub(crate) struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_id: 1,
                containers: HashMap::new(),
                calls: Vec::new(),
                term: TermBehavior::ExitAfter(Duration::ZERO),
                fail_run: None,
                fail_signal: false,
                unmapped_ports: false,
                ignore_kill: false,
                latency: Duration::ZERO,
                requests: Vec::new(),
            }),
        }
    }

    pub(crate) fn with_term(self, term: TermBehavior) -> Self {
        self.state.lock().unwrap().term = term;
        self
    }

    pub(crate) fn failing_run(self, message: &str) -> Self {
        self.state.lock().unwrap().fail_run = Some(message.to_string());
        self
    }

    pub(crate) fn failing_signal(self) -> Self {
        self.state.lock().unwrap().fail_signal = true;
        self
    }

    pub(crate) fn unmapped_ports(self) -> Self {
        self.state.lock().unwrap().unmapped_ports = true;
        self
    }

    /// SIGKILL is recorded but the container keeps running.
    pub(crate) fn ignoring_kill(self) -> Self {
        self.state.lock().unwrap().ignore_kill = true;
        self
    }

    /// Every `signal` and `status` call takes this long, like a slow daemon.
    pub(crate) fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().latency = latency;
        self
    }

    fn delay(&self) {
        let latency = self.state.lock().unwrap().latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn signals(&self) -> Vec<StopSignal> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Signal(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn last_request(&self) -> Option<RunRequest> {
        self.state.lock().unwrap().requests.last().cloned()
    }

    /// Simulates the main process exiting on its own.
    pub(crate) fn exit(&self, id: &ContainerId, code: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.containers.get_mut(id.as_str()) {
            c.running = false;
            c.exit_code = code;
        }
    }

    fn refresh(container: &mut FakeContainer, term: TermBehavior) {
        if let (true, Some(at), TermBehavior::ExitAfter(delay)) =
            (container.running, container.term_at, term)
        {
            if at.elapsed() >= delay {
                container.running = false;
                container.exit_code = 0;
            }
        }
    }
}

fn unknown(id: &ContainerId) -> CovrigError {
    CovrigError::NotFound {
        kind: "container",
        id: id.to_string(),
    }
}

impl ContainerRuntime for FakeRuntime {
    fn run(&self, request: &RunRequest) -> Result<ContainerId> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Run(request.image.to_string()));
        state.requests.push(request.clone());
        if let Some(message) = state.fail_run.clone() {
            return Err(CovrigError::Launch {
                image: request.image.to_string(),
                message,
            });
        }
        let id = format!("fake{:08}", state.next_id);
        state.next_id += 1;
        let ports = request
            .exposed_ports
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, 40_000 + u16::try_from(i).unwrap()))
            .collect();
        let _ = state.containers.insert(
            id.clone(),
            FakeContainer {
                running: true,
                exit_code: 0,
                term_at: None,
                ports,
            },
        );
        Ok(ContainerId::new(id))
    }

    fn host_port(&self, id: &ContainerId, container_port: u16) -> Result<u16> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::HostPort(container_port));
        if state.unmapped_ports {
            return Err(CovrigError::NotFound {
                kind: "port mapping",
                id: container_port.to_string(),
            });
        }
        let c = state.containers.get(id.as_str()).ok_or_else(|| unknown(id))?;
        c.ports.get(&container_port).copied().ok_or_else(|| CovrigError::NotFound {
            kind: "port mapping",
            id: container_port.to_string(),
        })
    }

    fn signal(&self, id: &ContainerId, signal: StopSignal) -> Result<()> {
        self.delay();
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Signal(signal));
        if state.fail_signal {
            return Err(CovrigError::Runtime {
                command: format!("fake kill --signal {signal}"),
                message: "cannot connect to the container daemon".into(),
            });
        }
        let term = state.term;
        let ignore_kill = state.ignore_kill;
        let c = state.containers.get_mut(id.as_str()).ok_or_else(|| unknown(id))?;
        Self::refresh(c, term);
        if !c.running {
            return Err(CovrigError::Runtime {
                command: format!("fake kill --signal {signal}"),
                message: "container is not running".into(),
            });
        }
        match signal {
            StopSignal::Term => {
                c.term_at = Some(Instant::now());
                Self::refresh(c, term);
            }
            StopSignal::Kill if ignore_kill => {}
            StopSignal::Kill => {
                c.running = false;
                c.exit_code = 137;
            }
        }
        Ok(())
    }

    fn status(&self, id: &ContainerId) -> Result<ProcessStatus> {
        self.delay();
        let mut state = self.state.lock().unwrap();
        let term = state.term;
        let c = state.containers.get_mut(id.as_str()).ok_or_else(|| unknown(id))?;
        Self::refresh(c, term);
        Ok(if c.running {
            ProcessStatus::Running
        } else {
            ProcessStatus::Exited { code: c.exit_code }
        })
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Remove);
        let _ = state.containers.remove(id.as_str());
        Ok(())
    }

    fn logs(&self, _id: &ContainerId) -> Result<String> {
        Ok("listening on 0.0.0.0:8080\n".into())
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }
}
