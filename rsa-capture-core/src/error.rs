// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `error` module defines the common error type.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// `CaptureError` enumerates every fatal condition the reader and DSP pipeline can report.
#[derive(Debug)]
pub enum CaptureError {
    /// The path did not end in `.r3f`, `.r3a`, or `.r3h`.
    InvalidExtension,
    /// A `.r3a`/`.r3h` pair was incomplete (the sibling file is missing).
    MissingSibling(String),
    /// An I/O error occurred while reading or seeking, at the given byte position.
    Io { pos: u64, source: io::Error },
    /// The 16 KiB header block was short, malformed, or violated a documented invariant.
    MalformedHeader(&'static str),
    /// A frame was truncated mid-read.
    MalformedFrame(&'static str),
    /// A pipeline stage was misconfigured by its caller.
    ConfigError(&'static str),
    /// The FIR designer was asked for an edge or transition band outside `[0, Fs/2]`.
    DomainError(&'static str),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::InvalidExtension => {
                write!(f, "unrecognized file extension, expected .r3f, .r3a, or .r3h")
            }
            CaptureError::MissingSibling(path) => {
                write!(f, "missing sibling file: {}", path)
            }
            CaptureError::Io { pos, source } => {
                write!(f, "io error at byte {}: {}", pos, source)
            }
            CaptureError::MalformedHeader(msg) => write!(f, "malformed header: {}", msg),
            CaptureError::MalformedFrame(msg) => write!(f, "malformed frame: {}", msg),
            CaptureError::ConfigError(msg) => write!(f, "invalid pipeline configuration: {}", msg),
            CaptureError::DomainError(msg) => write!(f, "invalid filter design parameters: {}", msg),
        }
    }
}

impl StdError for CaptureError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            CaptureError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience function to create a malformed-header error.
pub fn header_error<T>(desc: &'static str) -> Result<T> {
    Err(CaptureError::MalformedHeader(desc))
}

/// Convenience function to create a malformed-frame error.
pub fn frame_error<T>(desc: &'static str) -> Result<T> {
    Err(CaptureError::MalformedFrame(desc))
}

/// Convenience function to create a pipeline configuration error.
pub fn config_error<T>(desc: &'static str) -> Result<T> {
    Err(CaptureError::ConfigError(desc))
}

/// Convenience function to create a FIR design domain error.
pub fn domain_error<T>(desc: &'static str) -> Result<T> {
    Err(CaptureError::DomainError(desc))
}

/// Maps an I/O error observed while reading a header block: a truncated read
/// (`io::ErrorKind::UnexpectedEof`) becomes a [`CaptureError::MalformedHeader`], since a short
/// header means a corrupt or truncated capture rather than an underlying I/O failure. Every
/// other `io::Error` kind (permission denied, device error, etc.) is reported as
/// [`CaptureError::Io`] with `pos` for context.
pub fn io_or_header_error<T>(pos: u64, e: io::Error) -> Result<T> {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        header_error("truncated header: short read")
    }
    else {
        Err(CaptureError::Io { pos, source: e })
    }
}

/// As [`io_or_header_error`], but for a read mid-frame: a truncated read becomes a
/// [`CaptureError::MalformedFrame`] instead of a [`CaptureError::MalformedHeader`].
pub fn io_or_frame_error<T>(pos: u64, e: io::Error) -> Result<T> {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        frame_error("truncated frame: short read")
    }
    else {
        Err(CaptureError::Io { pos, source: e })
    }
}
