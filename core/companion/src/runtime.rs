//! The `run` loop.
//!
//! A reader thread turns input lines into messages on a channel. The loop
//! waits on that channel until the tracker's next timer deadline, handles at
//! most one request per wakeup, fires due timers, and writes every buffered
//! notification followed by the response, one JSON document per line.

use chrono::Utc;
use companion_protocol::{Response, MAX_REQUEST_BYTES};
use serde::Serialize;
use std::io::{self, BufRead, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::host::Host;

#[derive(Debug)]
pub enum Input {
    Line(String),
    /// A line that never reached the parser; answered with this error.
    Rejected {
        code: &'static str,
        message: String,
    },
    Closed,
}

pub fn spawn_reader<R>(mut reader: R) -> Receiver<Input>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        loop {
            match read_input(&mut reader) {
                Ok(Some(input)) => {
                    if tx.send(input).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "Failed to read input");
                    break;
                }
            }
        }
        let _ = tx.send(Input::Closed);
    });
    rx
}

/// Reads one newline-terminated line, buffering at most one byte past
/// `MAX_REQUEST_BYTES`. Returns `None` at end of input.
fn read_input<R: BufRead>(reader: &mut R) -> io::Result<Option<Input>> {
    let mut buffer = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_REQUEST_BYTES as u64 + 1)
        .read_until(b'\n', &mut buffer)?;
    if read == 0 {
        return Ok(None);
    }

    if buffer.last() != Some(&b'\n') && buffer.len() > MAX_REQUEST_BYTES {
        skip_line(reader)?;
        return Ok(Some(Input::Rejected {
            code: "request_too_large",
            message: "request exceeded maximum size".to_string(),
        }));
    }

    if buffer.last() == Some(&b'\n') {
        buffer.pop();
        if buffer.last() == Some(&b'\r') {
            buffer.pop();
        }
    }

    Ok(Some(match String::from_utf8(buffer) {
        Ok(line) => Input::Line(line),
        Err(_) => Input::Rejected {
            code: "invalid_json",
            message: "request is not valid UTF-8".to_string(),
        },
    }))
}

/// Discards input up to and including the next newline.
fn skip_line<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|byte| *byte == b'\n') {
            Some(index) => {
                reader.consume(index + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

/// Connects the tracker, then serves requests until input closes.
pub fn serve<W: Write>(host: &mut Host, input: &Receiver<Input>, out: &mut W) -> io::Result<()> {
    host.tracker_mut().initialize();
    write_notifications(host, out)?;

    loop {
        match next_input(host, input) {
            Some(Input::Line(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let response = host.handle_line(&line);
                respond(host, out, &response)?;
            }
            Some(Input::Rejected { code, message }) => {
                warn!(code, message = %message, "Rejected input line");
                respond(host, out, &Response::error(None, code, message))?;
            }
            Some(Input::Closed) => {
                info!("Input closed; shutting down");
                break;
            }
            None => {
                host.tracker_mut().run_due();
                write_notifications(host, out)?;
            }
        }
    }

    host.tracker_mut().disconnect();
    write_notifications(host, out)
}

/// Blocks until input arrives or the next timer is due (`None`).
fn next_input(host: &Host, input: &Receiver<Input>) -> Option<Input> {
    let Some(deadline) = host.tracker().next_deadline() else {
        return Some(input.recv().unwrap_or(Input::Closed));
    };

    let wait = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    match input.recv_timeout(wait) {
        Ok(message) => Some(message),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Input::Closed),
    }
}

fn respond<W: Write>(host: &mut Host, out: &mut W, response: &Response) -> io::Result<()> {
    host.tracker_mut().run_due();
    write_notifications(host, out)?;
    write_line(out, response)
}

fn write_notifications<W: Write>(host: &mut Host, out: &mut W) -> io::Result<()> {
    for notification in host.drain_notifications() {
        debug!(notification = %notification.notification, "Notification");
        write_line(out, &notification)?;
    }
    out.flush()
}

fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    out.flush()
}
