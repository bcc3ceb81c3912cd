//! Client for the metadig controller's line-oriented test request protocol.
//!
//! - `request`: request model, identifier sanitization, record lines
//! - `protocol`: wire encoding and decoding
//! - `sender`: blocking TCP delivery
//! - `config`: CLI and TOML configuration

pub mod config;
pub mod protocol;
pub mod request;
pub mod sender;

use config::Config;
use sender::SendSummary;
use std::io::Write;
use tracing::info;

/// Build the configured request and deliver it.
///
/// With `dry_run` set the encoded request is written to `out` and no
/// connection is made; the result is then `None`.
pub fn run(
    config: &Config,
    out: &mut impl Write,
) -> Result<Option<SendSummary>, Box<dyn std::error::Error>> {
    let request = config.request();

    info!(
        host = %config.host,
        port = config.port,
        kind = %request.kind,
        tests = request.test_count(),
        "Sending assessment request to metadig controller (test mode)"
    );

    for record in &request.records {
        info!(record = %record.csv_line(), "Test record");
    }

    if config.dry_run {
        let wire = protocol::encode(&request)?;
        out.write_all(&wire)?;
        out.flush()?;
        return Ok(None);
    }

    let summary = sender::send(&config.target(), &request)?;

    info!(
        peer = %summary.peer,
        records = summary.records,
        bytes = summary.bytes_written,
        "Request sent"
    );

    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use crate::config::CliArgs;
    use std::io::{self, Read};
    use std::net::TcpListener;
    use std::thread;

    fn config_for(args: &[&str]) -> Config {
        let args = std::iter::once("send-assessment-test").chain(args.iter().copied());
        let cli = CliArgs::try_parse_from(args).unwrap();
        Config::from_args(cli).unwrap()
    }

    #[test]
    fn test_dry_run_writes_encoding_without_connecting() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port().to_string();

        let config = config_for(&[port.as_str(), "--host", "127.0.0.1", "--dry-run"]);
        let mut out = Vec::new();
        let summary = run(&config, &mut out).unwrap();

        assert!(summary.is_none());
        assert_eq!(out, protocol::encode(&config.request()).unwrap().to_vec());

        match listener.accept() {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            other => panic!("unexpected connection: {:?}", other),
        }
    }

    #[test]
    fn test_run_sends_to_controller() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port().to_string();
        let controller = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        });

        let config = config_for(&[port.as_str(), "--host", "127.0.0.1"]);
        let mut out = Vec::new();
        let summary = run(&config, &mut out).unwrap().unwrap();
        let received = controller.join().unwrap();

        assert!(out.is_empty());
        assert_eq!(summary.records, 1);
        assert_eq!(received, protocol::encode(&config.request()).unwrap().to_vec());
    }
}
