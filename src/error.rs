//! Error handling for pdsman
//!
//! This module provides structured error types for the Telnet session, the
//! HTTP backend, the value converters and the synchronization engine, with
//! a single top-level error that operations surface to the caller.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Top-level error type for pdsman operations
#[derive(Debug)]
pub enum PdsError {
    /// Telnet session errors
    Telnet(TelnetError),
    /// HTTP backend errors
    Http(HttpError),
    /// Value converter errors
    Convert(ConvertError),
    /// MAC lookup errors
    Network(NetworkError),
    /// Snapshot persistence errors
    Snapshot(SnapshotError),
}

/// Telnet session errors
#[derive(Debug)]
pub enum TelnetError {
    /// Operation attempted while the session is not in the Ready state
    NotConnected,
    /// Socket-level I/O failure
    Transport { operation: &'static str, error: io::Error },
}

/// HTTP backend errors
#[derive(Debug)]
pub enum HttpError {
    /// Non-success status on a request that required one
    StatusFailure { url: String, status: u16 },
    /// Request could not be executed at all
    Transport { url: String, message: String },
}

/// Value converter errors
#[derive(Debug)]
pub enum ConvertError {
    /// The schema references a converter name that is not registered
    UnknownConverter { name: String },
    /// A strict converter was handed a token outside its value set
    UnrecognizedValue { converter: &'static str, token: String },
}

/// MAC lookup errors
#[derive(Debug)]
pub enum NetworkError {
    /// The ARP table has no entry for the target address
    MacNotFound { ip: String },
    /// The ARP table could not be read on this platform
    ArpTableUnavailable { reason: String },
}

/// Snapshot persistence errors
#[derive(Debug)]
pub enum SnapshotError {
    /// Snapshot file could not be read or written
    FileError { path: String, error: io::Error },
    /// Snapshot document does not deserialize to a configuration
    FormatError { path: String, message: String },
}

impl fmt::Display for PdsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdsError::Telnet(err) => write!(f, "Telnet error: {err}"),
            PdsError::Http(err) => write!(f, "HTTP error: {err}"),
            PdsError::Convert(err) => write!(f, "Converter error: {err}"),
            PdsError::Network(err) => write!(f, "Network error: {err}"),
            PdsError::Snapshot(err) => write!(f, "Snapshot error: {err}"),
        }
    }
}

impl fmt::Display for TelnetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelnetError::NotConnected =>
                write!(f, "Session is not connected"),
            TelnetError::Transport { operation, error } =>
                write!(f, "Transport failure during {operation}: {error}"),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::StatusFailure { url, status } =>
                write!(f, "Request to {url} returned status {status}"),
            HttpError::Transport { url, message } =>
                write!(f, "Request to {url} failed: {message}"),
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::UnknownConverter { name } =>
                write!(f, "No converter registered under the name '{name}'"),
            ConvertError::UnrecognizedValue { converter, token } =>
                write!(f, "Converter '{converter}' cannot interpret the value '{token}'"),
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::MacNotFound { ip } =>
                write!(f, "No MAC address found for {ip}"),
            NetworkError::ArpTableUnavailable { reason } =>
                write!(f, "ARP table unavailable: {reason}"),
        }
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::FileError { path, error } =>
                write!(f, "Snapshot file error '{path}': {error}"),
            SnapshotError::FormatError { path, message } =>
                write!(f, "Snapshot format error '{path}': {message}"),
        }
    }
}

impl StdError for PdsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PdsError::Telnet(err) => Some(err),
            PdsError::Http(err) => Some(err),
            PdsError::Convert(err) => Some(err),
            PdsError::Network(err) => Some(err),
            PdsError::Snapshot(err) => Some(err),
        }
    }
}

impl StdError for TelnetError {}
impl StdError for HttpError {}
impl StdError for ConvertError {}
impl StdError for NetworkError {}
impl StdError for SnapshotError {}

impl From<TelnetError> for PdsError {
    fn from(err: TelnetError) -> Self {
        PdsError::Telnet(err)
    }
}

impl From<HttpError> for PdsError {
    fn from(err: HttpError) -> Self {
        PdsError::Http(err)
    }
}

impl From<ConvertError> for PdsError {
    fn from(err: ConvertError) -> Self {
        PdsError::Convert(err)
    }
}

impl From<NetworkError> for PdsError {
    fn from(err: NetworkError) -> Self {
        PdsError::Network(err)
    }
}

impl From<SnapshotError> for PdsError {
    fn from(err: SnapshotError) -> Self {
        PdsError::Snapshot(err)
    }
}

/// Result type alias for pdsman operations
pub type PdsResult<T> = Result<T, PdsError>;

/// Specialized result types for individual subsystems
pub type TelnetResult<T> = Result<T, TelnetError>;
pub type HttpResult<T> = Result<T, HttpError>;
pub type ConvertResult<T> = Result<T, ConvertError>;
pub type NetworkResult<T> = Result<T, NetworkError>;
pub type SnapshotResult<T> = Result<T, SnapshotError>;
