//! Socket transport for the client.
//!
//! [`connect_with_retry`] keeps knocking while nothing listens at the
//! endpoint yet, sleeping a little longer after each failed attempt, and
//! gives up after a fixed number of attempts.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tether_config::SocketEndpoint;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};

use crate::{AppError, CLIENT_NAME};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// How often and how patiently to retry a refused connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) attempts: u32,
    pub(crate) step: Duration,
}

impl RetryPolicy {
    /// Ten attempts, sleeping `n × 100ms` after the n-th failure.
    pub(crate) const STANDARD: Self = Self {
        attempts: 10,
        step: Duration::from_millis(100),
    };

    fn delay_after(self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }
}

/// Connects via `connect`, retrying while nothing listens at `endpoint`.
///
/// A waiting notice is written to `notices` before every sleep. Failures
/// other than "not listening" are returned at once.
pub(crate) fn connect_with_retry<C, F, S>(
    endpoint: &SocketEndpoint,
    policy: RetryPolicy,
    mut connect: F,
    mut sleep: S,
    notices: &mut dyn Write,
) -> Result<C, AppError>
where
    F: FnMut(&SocketEndpoint) -> Result<C, AppError>,
    S: FnMut(Duration),
{
    let mut attempts = 0_u32;
    loop {
        match connect(endpoint) {
            Ok(connection) => return Ok(connection),
            Err(error) if error.is_not_listening() => {
                attempts += 1;
                if attempts >= policy.attempts {
                    return Err(AppError::ConnectionUnavailable { attempts });
                }
                writeln!(notices, "[{CLIENT_NAME}]: Waiting for {endpoint}")
                    .and_then(|()| notices.flush())
                    .map_err(AppError::ForwardOutput)?;
                sleep(policy.delay_after(attempts));
            }
            Err(error) => return Err(error),
        }
    }
}

pub(crate) fn connect(endpoint: &SocketEndpoint) -> Result<Connection, AppError> {
    match endpoint {
        SocketEndpoint::Tcp { host, port } => {
            let address = resolve_tcp_address(host, *port).map_err(|source| AppError::Resolve {
                endpoint: endpoint.to_string(),
                source,
            })?;
            TcpStream::connect_timeout(&address, CONNECTION_TIMEOUT)
                .map(Connection::Tcp)
                .map_err(|source| AppError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })
        }
        SocketEndpoint::Unix { path } => {
            #[cfg(unix)]
            {
                connect_unix(path.as_str()).map_err(|source| AppError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })
            }

            #[cfg(not(unix))]
            {
                let _ = path;
                Err(AppError::UnsupportedUnixTransport(endpoint.to_string()))
            }
        }
    }
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

#[cfg(unix)]
fn connect_unix(path: &str) -> io::Result<Connection> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, CONNECTION_TIMEOUT)?;
    Ok(Connection::Unix(socket.into()))
}
