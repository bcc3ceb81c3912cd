//! Blocking TCP client that delivers one request to the controller.
//!
//! Opens a single connection, writes the request line by line and closes
//! the connection. There is no retry; the first failure is returned.

use crate::protocol;
use crate::request::{RequestError, TestRequest};
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

/// Where to deliver a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    /// Bound on connection establishment. `None` blocks as the OS does.
    pub connect_timeout: Option<Duration>,
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendSummary {
    pub peer: SocketAddr,
    pub records: usize,
    pub bytes_written: usize,
}

/// Send errors
#[derive(Debug)]
pub enum SendError {
    /// Request could not be encoded
    Request(RequestError),
    /// Host name lookup failed
    Resolve(String, io::Error),
    /// Host name resolved to no addresses
    NoAddress(String),
    /// Every resolved address refused or timed out; holds the last attempt
    Connect(SocketAddr, io::Error),
    /// Writing to or closing the connection failed
    Write(io::Error),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Request(e) => write!(f, "Invalid request: {}", e),
            SendError::Resolve(host, e) => write!(f, "Failed to resolve '{}': {}", host, e),
            SendError::NoAddress(host) => write!(f, "No addresses found for '{}'", host),
            SendError::Connect(addr, e) => write!(f, "Failed to connect to {}: {}", addr, e),
            SendError::Write(e) => write!(f, "Failed to send request: {}", e),
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SendError::Request(e) => Some(e),
            SendError::Resolve(_, e) | SendError::Connect(_, e) | SendError::Write(e) => Some(e),
            SendError::NoAddress(_) => None,
        }
    }
}

impl From<RequestError> for SendError {
    fn from(e: RequestError) -> Self {
        SendError::Request(e)
    }
}

/// Deliver `request` to `target`.
///
/// The request is validated before any connection is made. The socket is
/// closed when this returns, on success or failure.
pub fn send(target: &Target, request: &TestRequest) -> Result<SendSummary, SendError> {
    request.validate()?;

    let mut stream = connect(target)?;
    let peer = stream.peer_addr().map_err(SendError::Write)?;
    info!(peer = %peer, "Connected to controller");

    let mut bytes_written = 0;
    for line in protocol::lines(request) {
        debug!(line = %line, "Sending");
        stream
            .write_all(line.as_bytes())
            .and_then(|_| stream.write_all(b"\n"))
            .map_err(SendError::Write)?;
        bytes_written += line.len() + 1;
    }

    stream.flush().map_err(SendError::Write)?;
    drop(stream);

    Ok(SendSummary {
        peer,
        records: request.test_count(),
        bytes_written,
    })
}

/// Connect to the first resolved address that accepts.
fn connect(target: &Target) -> Result<TcpStream, SendError> {
    let addrs: Vec<SocketAddr> = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|e| SendError::Resolve(target.host.clone(), e))?
        .collect();

    let mut last_err = None;
    for addr in addrs {
        match connect_addr(addr, target.connect_timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(address = %addr, error = %e, "Connect attempt failed");
                last_err = Some(SendError::Connect(addr, e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| SendError::NoAddress(target.host.clone())))
}

fn connect_addr(addr: SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    // Lines are written individually; don't let Nagle hold them back.
    socket.set_nodelay(true)?;

    match timeout {
        Some(timeout) => socket.connect_timeout(&addr.into(), timeout)?,
        None => socket.connect(&addr.into())?,
    }

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{RequestKind, TestRecord};
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    fn request(records: usize) -> TestRequest {
        let records = (0..records)
            .map(|i| {
                TestRecord::for_document(
                    &format!("doi:10.5063/F{i}"),
                    "./src/test/resources/test-docs",
                    "test.suite",
                    "urn:node:ARCTIC",
                )
            })
            .collect();
        TestRequest::new(RequestKind::Quality, records)
    }

    /// Accept one connection and return everything the client wrote.
    fn capture_one(listener: TcpListener) -> thread::JoinHandle<Vec<u8>> {
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        })
    }

    fn loopback_target(listener: &TcpListener) -> Target {
        Target {
            host: "127.0.0.1".to_string(),
            port: listener.local_addr().unwrap().port(),
            connect_timeout: Some(Duration::from_secs(5)),
        }
    }

    #[test]
    fn test_send_writes_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let target = loopback_target(&listener);
        let server = capture_one(listener);

        let request = request(1);
        let summary = send(&target, &request).unwrap();
        let received = server.join().unwrap();

        assert_eq!(summary.records, 1);
        assert_eq!(summary.peer.port(), target.port);
        assert_eq!(summary.bytes_written, received.len());

        let text = String::from_utf8(received).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "quality");
        assert_eq!(lines[1], "1");
        assert_eq!(lines[2], request.records[0].csv_line());
        assert_eq!(lines[3], "Done");
    }

    #[test]
    fn test_send_matches_encoding() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let target = loopback_target(&listener);
        let server = capture_one(listener);

        let request = request(3);
        send(&target, &request).unwrap();
        let received = server.join().unwrap();

        assert_eq!(received, protocol::encode(&request).unwrap().to_vec());
    }

    #[test]
    fn test_send_connection_refused() {
        // Reserve a port, then release it so nothing is listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let target = Target {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout: Some(Duration::from_secs(2)),
        };

        match send(&target, &request(1)) {
            Err(SendError::Connect(addr, _)) => assert_eq!(addr.port(), port),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_send_rejects_invalid_request_before_connecting() {
        // Port 9 on loopback is never contacted because validation fails first.
        let target = Target {
            host: "127.0.0.1".to_string(),
            port: 9,
            connect_timeout: None,
        };

        match send(&target, &request(0)) {
            Err(SendError::Request(RequestError::Empty)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
