//! End-to-end coverage of the launch sequence over a real Unix socket.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use tether_config::{Config, SocketEndpoint};
use tether_protocol::{RelayMessage, Request, decode_concatenated, write_request};

use crate::bootstrap::StaticConfigLoader;
use crate::health::StructuredHealthReporter;
use crate::operations::{self, ServiceState};
use crate::process::{LaunchError, LaunchPlan, ShutdownReason, SignalMode, run_service_with};
use crate::tests::support::EnvSnapshot;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct RunningService {
    socket: Utf8PathBuf,
    handle: JoinHandle<Result<ShutdownReason, LaunchError>>,
    _dir: TempDir,
    _snapshot: EnvSnapshot,
}

impl RunningService {
    fn connect(&self) -> UnixStream {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            match UnixStream::connect(self.socket.as_std_path()) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(WAIT_TIMEOUT))
                        .expect("set read timeout");
                    return stream;
                }
                Err(error) if Instant::now() >= deadline => {
                    panic!("service never accepted connections: {error}")
                }
                Err(_) => thread::sleep(POLL_INTERVAL),
            }
        }
    }

    fn stop(self) -> (ShutdownReason, Utf8PathBuf) {
        let reason = self
            .handle
            .join()
            .expect("service thread panicked")
            .expect("service run failed");
        (reason, self.socket)
    }
}

#[fixture]
fn service() -> RunningService {
    let snapshot = EnvSnapshot::capture();
    let dir = TempDir::new().expect("create temp dir");
    let socket = Utf8PathBuf::from_path_buf(dir.path().join("run").join("tetherd.sock"))
        .expect("utf8 temp path");
    let config = Config {
        daemon_socket: SocketEndpoint::unix(socket.clone()),
        log_filter: String::from("off"),
        ..Config::default()
    };
    let plan = LaunchPlan {
        loader: StaticConfigLoader::new(config),
        reporter: Arc::new(StructuredHealthReporter::new()),
        signals: SignalMode::Ignore,
    };
    let registry = operations::registry().expect("build registry");
    let handle = thread::spawn(move || run_service_with(plan, registry, ServiceState::default()));
    RunningService {
        socket,
        handle,
        _dir: dir,
        _snapshot: snapshot,
    }
}

fn call(stream: &mut UnixStream, operation: &str, arguments: &[&str]) -> Vec<RelayMessage> {
    let request = Request::new(
        operation,
        arguments.iter().map(|arg| (*arg).to_owned()).collect(),
        BTreeMap::new(),
    );
    write_request(stream, &request).expect("send request");
    read_until_terminate(stream)
}

fn read_until_terminate(stream: &mut UnixStream) -> Vec<RelayMessage> {
    let mut received = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let messages: Vec<RelayMessage> = decode_concatenated(&received)
            .collect::<Result<_, _>>()
            .unwrap_or_default();
        if messages.last().is_some_and(RelayMessage::is_terminate) {
            return messages;
        }
        let read = stream.read(&mut chunk).expect("read relay");
        assert!(read > 0, "connection closed before terminate");
        received.extend_from_slice(&chunk[..read]);
    }
}

fn socket_removed(path: &Path) -> bool {
    !path.exists()
}

#[rstest]
fn exit_control_stops_service_and_removes_socket(service: RunningService) {
    let mut stream = service.connect();
    let set = call(&mut stream, "set-thing", &["kept"]);
    assert_eq!(set.last(), Some(&RelayMessage::terminate(0)));

    let get = call(&mut stream, "get-thing", &[]);
    assert_eq!(
        get.first(),
        Some(&RelayMessage::emit(
            tether_protocol::EmitTarget::Stdout,
            "thing = \"kept\"\n"
        ))
    );

    let exit = call(&mut stream, "exit", &[]);
    assert_eq!(exit.last(), Some(&RelayMessage::terminate(0)));
    stream.flush().expect("flush");

    let (reason, socket) = service.stop();
    assert_eq!(reason, ShutdownReason::Requested { exit_code: 0 });
    assert!(socket_removed(socket.as_std_path()));
}

#[rstest]
fn malformed_request_stops_service_with_failure(service: RunningService) {
    let mut stream = service.connect();
    stream.write_all(b"not json\n").expect("send garbage");
    let relays = read_until_terminate(&mut stream);
    assert_eq!(relays.last(), Some(&RelayMessage::terminate(1)));

    let (reason, _) = service.stop();
    assert_eq!(reason.exit_code(), 1);
}
