//! Error types for the `tomp4` crate.
//!
//! This module defines [`ConvertError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry the file paths, stream
//! indices, and upstream messages needed to diagnose a failed plan or
//! transcoder launch.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `tomp4` operations.
///
/// Planning ambiguities (no default stream, unmatched languages) are not
/// errors: they are logged and resolved. Only structural problems with the
/// input and failures to reach the external tools surface here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// The media file could not be opened for probing.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::MediaProbe::probe`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// Probe output could not be parsed at all.
    #[error("Invalid probe data: {0}")]
    InvalidProbeData(String),

    /// A stream descriptor lacks an attribute the planner cannot do without.
    #[error("Malformed stream descriptor (index {}): missing required attribute `{attribute}`", describe_index(.index))]
    MalformedStream {
        /// Index of the offending stream, if it could be read.
        index: Option<usize>,
        /// Name of the missing attribute.
        attribute: &'static str,
    },

    /// The container holds no video stream to anchor output index 0.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A language identifier could not be recognised.
    #[error("Unknown language: {0:?}")]
    UnknownLanguage(String),

    /// An error originating from the FFmpeg libraries while probing.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading files or talking to a child process.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// The external transcoder could not be started.
    #[error("Failed to start transcoder {program}: {reason}")]
    TranscoderSpawn {
        /// Program that was executed.
        program: PathBuf,
        /// Underlying reason the spawn failed.
        reason: String,
    },

    /// The transcoder's codec table could not be obtained or read.
    #[error("Failed to query encoder capabilities: {0}")]
    CapabilityQuery(String),
}

fn describe_index(index: &Option<usize>) -> String {
    match index {
        Some(index) => index.to_string(),
        None => "?".to_string(),
    }
}

impl From<FfmpegError> for ConvertError {
    fn from(error: FfmpegError) -> Self {
        ConvertError::FfmpegError(error.to_string())
    }
}
