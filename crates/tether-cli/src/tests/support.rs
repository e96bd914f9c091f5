//! Fake service used by the client behaviour suite.
//!
//! Accepts a single TCP connection, records the request line, and answers
//! with canned relay bytes before hanging up.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};

use tether_protocol::{RelayMessage, Request, write_relay};

pub(crate) struct FakeService {
    port: u16,
    handle: Option<thread::JoinHandle<Result<Option<Request>>>>,
}

impl FakeService {
    pub(crate) fn spawn(replies: Vec<RelayMessage>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake service")?;
        listener
            .set_nonblocking(true)
            .context("fake service nonblocking")?;
        let port = listener.local_addr().context("local addr")?.port();
        let handle = thread::spawn(move || serve(&listener, &replies));
        Ok(Self {
            port,
            handle: Some(handle),
        })
    }

    pub(crate) const fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the service thread and returns the request it received.
    pub(crate) fn take_request(&mut self) -> Result<Option<Request>> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };
        handle
            .join()
            .map_err(|_| anyhow!("fake service thread panicked"))?
    }
}

fn serve(listener: &TcpListener, replies: &[RelayMessage]) -> Result<Option<Request>> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let stream = loop {
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(error) => return Err(error).context("accept connection"),
        }
    };
    stream
        .set_nonblocking(false)
        .context("blocking client stream")?;
    let request = read_request(&stream)?;
    answer(stream, replies)?;
    Ok(Some(request))
}

fn read_request(stream: &TcpStream) -> Result<Request> {
    let mut line = String::new();
    BufReader::new(stream.try_clone().context("clone stream")?)
        .read_line(&mut line)
        .context("read request line")?;
    serde_json::from_str(&line).context("parse request")
}

fn answer(mut stream: TcpStream, replies: &[RelayMessage]) -> Result<()> {
    for reply in replies {
        write_relay(&mut stream, reply).context("write relay")?;
    }
    stream.flush().context("flush relays")
}

/// Returns a local TCP port with nothing listening on it.
pub(crate) fn unused_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind throwaway listener")?;
    Ok(listener.local_addr().context("throwaway listener address")?.port())
}
