// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::fmt;
use std::io::{self, Read};
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::crc::checksum;
use crate::protocol::*;
use crate::serial::{Connector, Transport};
use crate::source::{file_name, FileSource, Source};

// ============================================================================
// Error Types
// ============================================================================

/// Identifies the frame an error occurred on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Header,
    /// Zero-based chunk index
    Chunk(usize),
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Header => write!(f, "header"),
            Frame::Chunk(index) => write!(f, "chunk {}", index),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("File name {0:?} is too long, maximum length is {max}", max = MAX_BASE_LEN)]
    NameTooLong(String),

    #[error("File extension of {0:?} is too long, maximum length is {max}", max = MAX_EXTENSION_LEN - 1)]
    ExtensionTooLong(String),

    #[error("Invalid file name {0:?}")]
    InvalidName(String),

    #[error("No destination name given and the source has no file name")]
    MissingName,

    #[error("File is too large ({0} bytes), maximum is {max} bytes", max = u32::MAX)]
    FileTooLarge(u64),

    #[error("Too many checksum errors sending {0}")]
    TooManyChecksumErrors(Frame),

    #[error("Peer closed connection with code {0}")]
    PeerError(u8),

    #[error("Timed out waiting for acknowledgment of {0}")]
    Timeout(Frame),

    #[error("Serial I/O error sending {frame}: {source}")]
    Transport {
        frame: Frame,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open serial port: {0}")]
    Open(#[source] io::Error),

    #[error("Error reading source: {0}")]
    Source(#[source] io::Error),
}

// ============================================================================
// Progress Observer
// ============================================================================

/// Receives progress events synchronously from the send loop: one
/// `header_sent`, then one `chunk_sent` per acknowledged chunk.
pub trait Observer {
    fn header_sent(&mut self, _length: u32, _name: &str) {}

    /// `frame_len` includes the two checksum bytes
    fn chunk_sent(&mut self, _frame_len: usize) {}
}

impl Observer for () {}

// ============================================================================
// States
// ============================================================================

pub struct SendHeader;
pub struct SendChunk;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct SenderFsm<State> {
    state: PhantomData<State>,
    transport: Box<dyn Transport>,
    source: Box<dyn Source>,
    name: String,
    length: u32,
    remaining: u32,
    chunk_index: usize,
    buffer: Vec<u8>,
    ack_timeout: Duration,
}

// ============================================================================
// Trait
// ============================================================================

pub enum Step {
    Next(Box<dyn SenderState>),
    Complete,
}

pub trait SenderState: Send {
    fn step(self: Box<Self>, observer: &mut dyn Observer) -> Result<Step, SendError>;
}

// ============================================================================
// Helper to transition states
// ============================================================================

impl<S> SenderFsm<S> {
    fn transition<T>(self) -> Box<SenderFsm<T>> {
        Box::new(SenderFsm {
            state: PhantomData,
            transport: self.transport,
            source: self.source,
            name: self.name,
            length: self.length,
            remaining: self.remaining,
            chunk_index: self.chunk_index,
            buffer: self.buffer,
            ack_timeout: self.ack_timeout,
        })
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl SenderState for SenderFsm<SendHeader> {
    fn step(self: Box<Self>, observer: &mut dyn Observer) -> Result<Step, SendError> {
        let mut fsm = *self;

        let header = build_header(&fsm.name, fsm.length);
        send_frame(fsm.transport.as_mut(), &header, fsm.ack_timeout, Frame::Header)?;
        observer.header_sent(fsm.length, &fsm.name);

        let next = fsm.transition::<SendChunk>();
        Ok(Step::Next(next))
    }
}

impl SenderState for SenderFsm<SendChunk> {
    fn step(self: Box<Self>, observer: &mut dyn Observer) -> Result<Step, SendError> {
        let mut fsm = *self;

        let want = CHUNK_SIZE.min(fsm.remaining as usize);
        fsm.buffer.resize(want, 0);
        let bytes_read = read_chunk(fsm.source.as_mut(), &mut fsm.buffer).map_err(SendError::Source)?;

        if bytes_read == 0 {
            if fsm.remaining > 0 {
                return Err(SendError::Source(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source ended {} bytes short of its declared length", fsm.remaining),
                )));
            }
            return Ok(Step::Complete);
        }

        let crc = checksum(&fsm.buffer[..bytes_read]);
        fsm.buffer.truncate(bytes_read);
        fsm.buffer.extend_from_slice(&crc.to_le_bytes());

        let frame = Frame::Chunk(fsm.chunk_index);
        send_frame(fsm.transport.as_mut(), &fsm.buffer, fsm.ack_timeout, frame)?;
        observer.chunk_sent(fsm.buffer.len());

        fsm.remaining -= bytes_read as u32;
        fsm.chunk_index += 1;
        Ok(Step::Next(Box::new(fsm)))
    }
}

// ============================================================================
// Constructor
// ============================================================================

impl SenderFsm<SendHeader> {
    pub fn new(
        transport: Box<dyn Transport>,
        source: Box<dyn Source>,
        name: String,
        length: u32,
        ack_timeout: Duration,
    ) -> Box<dyn SenderState> {
        Box::new(SenderFsm {
            state: PhantomData::<SendHeader>,
            transport,
            source,
            name,
            length,
            remaining: length,
            chunk_index: 0,
            buffer: Vec::with_capacity(CHUNK_SIZE + CHECKSUM_LEN),
            ack_timeout,
        })
    }
}

// ============================================================================
// Sender
// ============================================================================

/// Sends one file per call over a transport opened from `C`
pub struct Sender<C> {
    connector: C,
}

impl<C: Connector> Sender<C> {
    pub fn new(connector: C) -> Self {
        Sender { connector }
    }

    /// Sends the file at `path`, as `name` or else as its own name upper-cased.
    ///
    /// The name is checked before the file or the port is opened.
    pub fn send_file(&self, path: &Path, name: Option<&str>, observer: &mut dyn Observer) -> Result<(), SendError> {
        let name = resolve_name(name, file_name(path).as_deref())?;
        let source = FileSource::open(path).map_err(SendError::Source)?;
        self.send(source, Some(&name), observer)
    }

    /// Sends `source` as `name`, or as the source's own name upper-cased.
    pub fn send<S: Source + 'static>(&self, source: S, name: Option<&str>, observer: &mut dyn Observer) -> Result<(), SendError> {
        let name = resolve_name(name, source.name())?;
        let length = u32::try_from(source.length()).map_err(|_| SendError::FileTooLarge(source.length()))?;

        let transport = self.connector.connect().map_err(SendError::Open)?;
        info!(name = %name, length, "Starting transfer");

        // Transport and source are dropped with the last state, on success or error
        let mut state = SenderFsm::<SendHeader>::new(transport, Box::new(source), name, length, self.connector.read_timeout());
        loop {
            match state.step(observer)? {
                Step::Next(next) => state = next,
                Step::Complete => break,
            }
        }

        info!("Transfer complete");
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn resolve_name(name: Option<&str>, source_name: Option<&str>) -> Result<String, SendError> {
    let name = match name {
        Some(name) => name.to_string(),
        None => source_name
            .map(str::to_uppercase)
            .ok_or(SendError::MissingName)?,
    };

    validate_name(&name)?;
    Ok(name)
}

/// Writes `frame` until the peer accepts it, resending on checksum errors
fn send_frame(transport: &mut dyn Transport, frame: &[u8], ack_timeout: Duration, id: Frame) -> Result<(), SendError> {
    let mut retries = 0;

    loop {
        transport.write_all(frame)
            .map_err(|source| SendError::Transport { frame: id, source })?;
        debug!(frame = %id, len = frame.len(), "Sent frame");

        let ack = transport.read_byte(ack_timeout).map_err(|source| match source.kind() {
            io::ErrorKind::TimedOut => SendError::Timeout(id),
            _ => SendError::Transport { frame: id, source },
        })?;

        match ack {
            ACK_OK => {
                debug!(frame = %id, "Frame accepted");
                return Ok(());
            }
            ACK_CHECKSUM_ERROR => {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(SendError::TooManyChecksumErrors(id));
                }
                warn!(frame = %id, retries, "Peer reported checksum error, resending");
            }
            code => return Err(SendError::PeerError(code)),
        }
    }
}

/// Fills `buf` from `source`, stopping early only at end of stream
fn read_chunk(source: &mut dyn Source, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ============================================================================
// Tests
// ============================================================================
