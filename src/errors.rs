// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the depthmesh library and CLI

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Sensor/capture loading errors
    Sensor(SensorError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Sensor-capture specific errors
#[derive(Debug, Clone)]
pub enum SensorError {
    /// No capture files found at the given path
    NoCaptureFound(String),
    /// Capture file format is not supported
    UnsupportedFormat(String),
    /// Decoding a depth/color/body-index file failed
    DecodeFailed(String),
    /// A grid file does not match the expected pixel count
    GridSizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Sensor(e) => write!(f, "Sensor error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::NoCaptureFound(path) => write!(f, "No capture found at {}", path),
            SensorError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            SensorError::DecodeFailed(msg) => write!(f, "Decode failed: {}", msg),
            SensorError::GridSizeMismatch { expected, actual } => write!(
                f,
                "Grid size mismatch: expected {} pixels, got {}",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SensorError {}

// Conversions from sub-errors to AppError
impl From<SensorError> for AppError {
    fn from(err: SensorError) -> Self {
        AppError::Sensor(err)
    }
}

// Conversion from String for backward compatibility
impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::DecodeFailed(err.to_string())
    }
}
