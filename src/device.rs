// CPUMon - CPU state monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Device abstraction module
//!
//! A [`Device`] yields one text line per reading. A [`DeviceConnector`]
//! opens a fresh device handle; the session keeps at most one handle and
//! drops it after any read failure.
//!
//! A read that times out yields whatever arrived before the deadline,
//! like a serial port with a read timeout: usually an empty line, and
//! therefore an empty (incomplete) reading rather than an error.
//!
//! Character devices and FIFOs ignore read timeouts, so [`FileConnector`]
//! reads them on a dedicated thread and waits on a channel instead
//! (see [`TimedLineDevice`]).

use crate::error::DeviceError;
use log::debug;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

/// Lines buffered between the reader thread and the session
const READ_AHEAD_LINES: usize = 64;

/// Trait for line-oriented sensor devices
pub trait Device: Send {
    /// Read one line, without the trailing newline
    fn read_line(&mut self) -> Result<String, DeviceError>;

    /// Release the device
    fn close(&mut self) {}
}

/// Trait for opening devices
pub trait DeviceConnector: Send {
    /// Open a new device handle
    fn connect(&self) -> Result<Box<dyn Device>, DeviceError>;

    /// Human-readable target, for logs
    fn describe(&self) -> String;
}

/// A device over any buffered reader
#[derive(Debug)]
pub struct LineDevice<R> {
    reader: R,
}

impl<R: BufRead + Send> LineDevice<R> {
    /// Wrap a buffered reader
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send> Device for LineDevice<R> {
    fn read_line(&mut self) -> Result<String, DeviceError> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => return Err(DeviceError::Closed),
            Ok(_) => {}
            // `buf` keeps the bytes read before the timeout
            Err(e) if is_timeout(&e) => {}
            Err(e) => return Err(DeviceError::Read(e.to_string())),
        }
        decode_line(buf)
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

fn decode_line(buf: Vec<u8>) -> Result<String, DeviceError> {
    let line = String::from_utf8(buf).map_err(|e| DeviceError::Decode(e.to_string()))?;
    Ok(line.trim().to_string())
}

/// What the reader thread hands to [`TimedLineDevice`]
#[derive(Debug)]
enum ReaderEvent {
    Line(Vec<u8>),
    Closed,
    Failed(String),
}

/// A device over a blocking reader, with a read deadline
///
/// A background thread runs the blocking reads and forwards complete
/// lines over a bounded channel; [`Device::read_line`] waits at most
/// `timeout` for the next one and returns an empty line otherwise. Bytes
/// of a line still in flight stay with the thread and complete on a later
/// read.
///
/// After [`Device::close`] the thread exits on its next read, since a
/// blocked read cannot be interrupted.
#[derive(Debug)]
pub struct TimedLineDevice {
    events: Option<Receiver<ReaderEvent>>,
    timeout: Duration,
}

impl TimedLineDevice {
    /// Start reading `reader` on a background thread
    pub fn spawn<R>(reader: R, timeout: Duration) -> std::io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(READ_AHEAD_LINES);
        thread::Builder::new()
            .name(String::from("cpumon-device-reader"))
            .spawn(move || pump_lines(reader, tx))?;
        Ok(Self {
            events: Some(rx),
            timeout,
        })
    }
}

fn pump_lines<R: BufRead>(mut reader: R, tx: SyncSender<ReaderEvent>) {
    let mut buf = Vec::new();
    loop {
        let event = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => ReaderEvent::Closed,
            Ok(_) => ReaderEvent::Line(std::mem::take(&mut buf)),
            Err(e) if is_timeout(&e) => continue,
            Err(e) => ReaderEvent::Failed(e.to_string()),
        };
        let done = !matches!(event, ReaderEvent::Line(_));
        if tx.send(event).is_err() || done {
            debug!("Device reader thread exiting");
            return;
        }
    }
}

impl Device for TimedLineDevice {
    fn read_line(&mut self) -> Result<String, DeviceError> {
        let events = self.events.as_ref().ok_or(DeviceError::NotConnected)?;
        match events.recv_timeout(self.timeout) {
            Ok(ReaderEvent::Line(buf)) => decode_line(buf),
            Ok(ReaderEvent::Closed) => Err(DeviceError::Closed),
            Ok(ReaderEvent::Failed(reason)) => Err(DeviceError::Read(reason)),
            Err(RecvTimeoutError::Timeout) => Ok(String::new()),
            Err(RecvTimeoutError::Disconnected) => Err(DeviceError::Closed),
        }
    }

    fn close(&mut self) {
        self.events = None;
    }
}

/// A device serving queued lines, for testing
#[derive(Debug)]
pub struct MemoryDevice {
    lines: VecDeque<Result<String, DeviceError>>,
    is_open: bool,
}

impl MemoryDevice {
    /// Create a device with queued lines
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(|l| Ok(l.into())).collect(),
            is_open: true,
        }
    }

    /// Queue a line
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push_back(Ok(line.into()));
    }

    /// Queue a read failure
    pub fn push_error(&mut self, error: DeviceError) {
        self.lines.push_back(Err(error));
    }

    /// Number of queued items
    pub fn pending(&self) -> usize {
        self.lines.len()
    }
}

impl Device for MemoryDevice {
    fn read_line(&mut self) -> Result<String, DeviceError> {
        if !self.is_open {
            return Err(DeviceError::NotConnected);
        }
        // An empty queue behaves like a read timeout
        self.lines.pop_front().unwrap_or_else(|| Ok(String::new()))
    }

    fn close(&mut self) {
        self.is_open = false;
    }
}

/// Opens a file or character device (e.g. `/dev/ttyACM0`)
///
/// Line settings such as baud rate are expected to be configured on the
/// device beforehand. With a read timeout the device is a
/// [`TimedLineDevice`]; without one, reads block until a line arrives.
#[derive(Debug, Clone)]
pub struct FileConnector {
    path: PathBuf,
    read_timeout: Option<Duration>,
}

impl FileConnector {
    /// Create a connector for a path
    pub fn new(path: impl Into<PathBuf>, read_timeout: Option<Duration>) -> Self {
        Self {
            path: path.into(),
            read_timeout,
        }
    }
}

impl DeviceConnector for FileConnector {
    fn connect(&self) -> Result<Box<dyn Device>, DeviceError> {
        let open_err = |e: std::io::Error| DeviceError::Open {
            target: self.describe(),
            reason: e.to_string(),
        };
        let reader = BufReader::new(File::open(&self.path).map_err(open_err)?);
        match self.read_timeout {
            Some(timeout) => Ok(Box::new(
                TimedLineDevice::spawn(reader, timeout).map_err(open_err)?,
            )),
            None => Ok(Box::new(LineDevice::new(reader))),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Opens a TCP stream to a serial bridge
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    read_timeout: Option<Duration>,
}

impl TcpConnector {
    /// Create a connector for `host:port`
    pub fn new(addr: impl Into<String>, read_timeout: Option<Duration>) -> Self {
        Self {
            addr: addr.into(),
            read_timeout,
        }
    }
}

impl DeviceConnector for TcpConnector {
    fn connect(&self) -> Result<Box<dyn Device>, DeviceError> {
        let open_err = |e: std::io::Error| DeviceError::Open {
            target: self.describe(),
            reason: e.to_string(),
        };
        let stream = TcpStream::connect(&self.addr).map_err(open_err)?;
        stream.set_read_timeout(self.read_timeout).map_err(open_err)?;
        Ok(Box::new(LineDevice::new(BufReader::new(stream))))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

impl<F> DeviceConnector for F
where
    F: Fn() -> Result<Box<dyn Device>, DeviceError> + Send,
{
    fn connect(&self) -> Result<Box<dyn Device>, DeviceError> {
        self()
    }

    fn describe(&self) -> String {
        String::from("custom")
    }
}
