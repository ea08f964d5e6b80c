//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

const CONFIG_ENV: [&str; 7] = [
    "MULTIPLEX_COMMAND",
    "MULTIPLEX_COMMON_ARGUMENTS",
    "MULTIPLEX_ANNOTATION_PREFIX",
    "MULTIPLEX_CHECK_NAME_PREFIX",
    "MULTIPLEX_EVENT_ENTITY",
    "MULTIPLEX_EVENT_CHECK",
    "MULTIPLEX_ARGUMENT_SPLITTING",
];

/// Probe script that echoes its arguments and exits with `--exit <code>`.
const PROBE_SCRIPT: &str = r#"#!/bin/sh
echo "probe $*"
echo "probe stderr" >&2
code=0
prev=""
for arg in "$@"; do
  if [ "$prev" = "--exit" ]; then code="$arg"; fi
  prev="$arg"
done
exit "$code"
"#;

/// A temp directory holding the probe script.
pub struct Probe {
    _dir: TempDir,
    pub script: PathBuf,
}

impl Probe {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let script = dir.path().join("probe.sh");
        std::fs::write(&script, PROBE_SCRIPT).expect("write probe script");
        Self { _dir: dir, script }
    }

    /// `--command` value; runs the script through `sh` so it never needs exec permission.
    pub fn command(&self) -> String {
        format!("sh {}", self.script.display())
    }
}

/// Run the multiplexer with `event` on stdin.
pub fn run_multiplexer(args: &[&str], event: &str) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_check-multiplexer"));
    for var in CONFIG_ENV {
        command.env_remove(var);
    }
    let mut child = command
        .args(args)
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn check-multiplexer");
    child
        .stdin
        .take()
        .expect("stdin pipe")
        .write_all(event.as_bytes())
        .expect("write event");
    child.wait_with_output().expect("wait for check-multiplexer")
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Event with check and entity annotations.
pub fn event_json(check: &[(&str, &str)], entity: &[(&str, &str)]) -> String {
    let map = |pairs: &[(&str, &str)]| {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), serde_json::Value::from(*value)))
            .collect::<serde_json::Map<_, _>>()
    };
    serde_json::json!({
        "timestamp": 1_700_000_000,
        "entity": {
            "entity_class": "agent",
            "metadata": {"name": "web-01", "namespace": "default", "annotations": map(entity)}
        },
        "check": {
            "command": "check-multiplexer",
            "status": 0,
            "output": "",
            "metadata": {"name": "multiplex", "namespace": "default", "annotations": map(check)}
        }
    })
    .to_string()
}

/// A request captured by [`EventsApi`].
#[derive(Debug)]
pub struct CapturedRequest {
    pub request_line: String,
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

/// Minimal HTTP endpoint standing in for the events API.
pub struct EventsApi {
    pub url: String,
    handle: JoinHandle<Vec<CapturedRequest>>,
}

impl EventsApi {
    /// Accept exactly `expected` requests, answering each with `status`.
    pub fn start(expected: usize, status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind events api");
        let url = format!(
            "http://{}/events",
            listener.local_addr().expect("local addr")
        );
        let handle = thread::spawn(move || {
            let mut requests = Vec::with_capacity(expected);
            for _ in 0..expected {
                let (stream, _) = listener.accept().expect("accept connection");
                requests.push(handle_connection(stream, status));
            }
            requests
        });
        Self { url, handle }
    }

    pub fn requests(self) -> Vec<CapturedRequest> {
        self.handle.join().expect("events api thread")
    }
}

fn handle_connection(mut stream: TcpStream, status: u16) -> CapturedRequest {
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .expect("set read timeout");
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    reader.read_line(&mut request_line).expect("read request line");
    let mut content_length = 0;
    let mut content_type = None;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read header");
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().expect("length"),
                "content-type" => content_type = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).expect("read body");
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    );
    stream
        .write_all(response.as_bytes())
        .expect("write response");
    CapturedRequest {
        request_line: request_line.trim_end().to_string(),
        content_type,
        body: serde_json::from_slice(&body).expect("request body is JSON"),
    }
}
