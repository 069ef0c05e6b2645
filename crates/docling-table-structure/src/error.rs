//! Error types for table structure decoding
//!
//! Every fallible API in this crate returns [`Result<T>`], which wraps
//! [`TableStructureError`]. Errors are fatal and never retried here; a caller
//! that wants to retry (for example by re-running the model) owns that policy.
//!
//! # Examples
//!
//! ```
//! use docling_table_structure::{SequenceDecoder, TableStructureError, WordMap};
//!
//! let decoder = SequenceDecoder::new(WordMap::otsl_default());
//! match decoder.map_to_tags(&[2, 5, 99, 3]) {
//!     Ok(tags) => println!("{} tags", tags.len()),
//!     Err(TableStructureError::DataFormatError { reason }) => {
//!         log::warn!("Model output rejected: {}", reason);
//!     }
//!     Err(e) => log::warn!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// Errors that can occur while decoding a table structure prediction
///
/// # Error Categories
///
/// - **Data format errors** ([`DataFormatError`]): the model output cannot be
///   interpreted (unknown tag id, malformed box tensor)
/// - **Configuration errors** ([`ConfigError`]): a required setting is absent or
///   invalid, surfaced when the configuration is built
/// - **I/O and JSON errors**: reading a `tm_config.json` file failed
///
/// [`DataFormatError`]: TableStructureError::DataFormatError
/// [`ConfigError`]: TableStructureError::ConfigError
#[derive(Debug, Error)]
pub enum TableStructureError {
    /// Model output does not match the expected vocabulary or tensor layout
    #[error("Invalid model output: {reason}")]
    DataFormatError {
        /// Description of what is malformed
        reason: String,
    },

    /// Invalid or incomplete configuration
    #[error("Invalid configuration: {reason}")]
    ConfigError {
        /// Description of what is invalid in the configuration
        reason: String,
    },

    /// IO error while reading a configuration file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration file is not valid JSON (or does not match the schema)
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<ndarray::ShapeError> for TableStructureError {
    #[inline]
    fn from(err: ndarray::ShapeError) -> Self {
        Self::DataFormatError {
            reason: format!("tensor shape error: {err}"),
        }
    }
}

impl TableStructureError {
    /// Shorthand for [`TableStructureError::DataFormatError`]
    #[inline]
    pub fn data_format(reason: impl Into<String>) -> Self {
        Self::DataFormatError {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`TableStructureError::ConfigError`]
    #[inline]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// Returns true if the model output was rejected
    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_data_format_error(&self) -> bool {
        matches!(self, Self::DataFormatError { .. })
    }

    /// Returns true if this error is a configuration error (user-fixable)
    #[inline]
    #[must_use = "this method returns a boolean, not modifying the error"]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }
}

/// Type alias for Result with [`TableStructureError`]
pub type Result<T> = std::result::Result<T, TableStructureError>;
