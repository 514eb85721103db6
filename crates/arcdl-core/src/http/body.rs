//! Streamed response body exposed as `std::io::Read`.
//!
//! libcurl pushes data through a write callback; the pipeline wants to pull
//! fixed-size chunks and check for cancellation between them. The transfer
//! runs on its own thread and hands chunks over a bounded channel, so a slow
//! reader stalls the callback and, through it, the socket.

use std::cell::{Cell, RefCell};
use std::io::{self, Read};
use std::str;
use std::sync::mpsc::{self, Receiver, SyncSender};

use super::status::{parse_status_line, StatusLine};
use crate::config::ArchiveEndpoints;

/// Callback chunks buffered between the transfer thread and the reader.
const BODY_QUEUE_DEPTH: usize = 64;

enum BodyEvent {
    Status(StatusLine),
    Data(Vec<u8>),
    Failed(curl::Error),
}

/// Why a body could not be opened.
#[derive(Debug)]
pub enum OpenError {
    /// Transport failure before any response (DNS, connect, TLS, ...).
    Transport(curl::Error),
    /// Server answered with a non-2xx status.
    Status(StatusLine),
    /// The transfer thread went away without reporting a status.
    Disconnected,
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::Transport(e) => write!(f, "{}", e),
            OpenError::Status(s) => write!(f, "HTTP error: {}", s),
            OpenError::Disconnected => write!(f, "connection closed before a response was received"),
        }
    }
}

impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OpenError::Transport(e) => Some(e),
            OpenError::Status(_) | OpenError::Disconnected => None,
        }
    }
}

/// Body of a successful GET, read in order until end of stream.
/// Dropping it early aborts the transfer.
pub struct HttpBody {
    rx: Receiver<BodyEvent>,
    pending: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl HttpBody {
    /// Starts the GET and waits for the response status.
    /// Returns an error for transport failures and non-2xx answers.
    pub fn open(url: &str, endpoints: &ArchiveEndpoints) -> Result<Self, OpenError> {
        let (tx, rx) = mpsc::sync_channel(BODY_QUEUE_DEPTH);
        let url = url.to_string();
        let endpoints = endpoints.clone();
        std::thread::Builder::new()
            .name("arcdl-http".to_string())
            .spawn(move || run_transfer(&url, &endpoints, tx))
            .map_err(|_| OpenError::Disconnected)?;

        let mut body = HttpBody {
            rx,
            pending: Vec::new(),
            pos: 0,
            finished: false,
        };
        match body.rx.recv() {
            Ok(BodyEvent::Status(status)) if status.is_success() => Ok(body),
            Ok(BodyEvent::Status(status)) => Err(OpenError::Status(status)),
            Ok(BodyEvent::Failed(e)) => Err(OpenError::Transport(e)),
            Ok(BodyEvent::Data(data)) => {
                body.pending = data;
                Ok(body)
            }
            Err(_) => Err(OpenError::Disconnected),
        }
    }
}

impl Read for HttpBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.pending.len() {
            if self.finished {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(BodyEvent::Data(data)) => {
                    self.pending = data;
                    self.pos = 0;
                }
                Ok(BodyEvent::Status(_)) => {}
                Ok(BodyEvent::Failed(e)) => {
                    self.finished = true;
                    return Err(io::Error::new(io::ErrorKind::Other, e));
                }
                // Sender dropped after a clean perform(): end of stream.
                Err(_) => {
                    self.finished = true;
                    return Ok(0);
                }
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn run_transfer(url: &str, endpoints: &ArchiveEndpoints, tx: SyncSender<BodyEvent>) {
    let mut easy = curl::easy::Easy::new();
    if let Err(e) = super::configure(&mut easy, url, endpoints) {
        let _ = tx.send(BodyEvent::Failed(e));
        return;
    }

    let last_status: RefCell<Option<StatusLine>> = RefCell::new(None);
    let status_sent = Cell::new(false);
    let reader_gone = Cell::new(false);

    let result = perform(&mut easy, &tx, &last_status, &status_sent, &reader_gone);

    match result {
        Ok(()) => {
            if !status_sent.get() {
                // Empty body: no write callback ran, report the final status now.
                let code = easy.response_code().unwrap_or(0);
                let status = match last_status.into_inner() {
                    Some(s) if s.code == code => s,
                    _ => StatusLine {
                        code,
                        reason: String::new(),
                    },
                };
                let _ = tx.send(BodyEvent::Status(status));
            }
        }
        Err(e) => {
            if !reader_gone.get() {
                let _ = tx.send(BodyEvent::Failed(e));
            }
        }
    }
}

fn perform(
    easy: &mut curl::easy::Easy,
    tx: &SyncSender<BodyEvent>,
    last_status: &RefCell<Option<StatusLine>>,
    status_sent: &Cell<bool>,
    reader_gone: &Cell<bool>,
) -> Result<(), curl::Error> {
    let mut transfer = easy.transfer();
    transfer.header_function(|data| {
        if let Some(status) = str::from_utf8(data).ok().and_then(parse_status_line) {
            *last_status.borrow_mut() = Some(status);
        }
        true
    })?;
    transfer.write_function(|data| {
        if !status_sent.get() {
            let status = last_status.borrow().clone().unwrap_or(StatusLine {
                code: 200,
                reason: String::new(),
            });
            status_sent.set(true);
            if tx.send(BodyEvent::Status(status)).is_err() {
                reader_gone.set(true);
                return Ok(0);
            }
        }
        if tx.send(BodyEvent::Data(data.to_vec())).is_err() {
            // Reader dropped the body: returning short aborts the transfer.
            reader_gone.set(true);
            return Ok(0);
        }
        Ok(data.len())
    })?;
    transfer.perform()
}
