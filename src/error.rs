//! Error types for the DFXML object layer.

use std::process::ExitStatus;
use thiserror::Error;

/// Errors that can occur when working with DFXML data.
#[derive(Error, Debug)]
pub enum Error {
    /// XML parsing error
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    /// XML attribute parsing error
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// A value could not be read as a boolean
    #[error("Invalid boolean value: {0:?}")]
    InvalidBool(String),

    /// A value could not be read as an integer of the target type
    #[error("Invalid integer value: {0:?}")]
    InvalidInteger(String),

    /// Invalid timestamp format
    #[error("Invalid timestamp format: {0}")]
    InvalidTimestamp(String),

    /// Invalid hash value
    #[error("Invalid hash value for {hash_type}: {message}")]
    InvalidHash {
        /// The hash algorithm type that was invalid
        hash_type: String,
        /// Description of why the hash was invalid
        message: String,
    },

    /// Invalid byte run
    #[error("Invalid byte run: {0}")]
    InvalidByteRun(String),

    /// Invalid name type code
    #[error("Invalid name type: {0:?}")]
    InvalidNameType(String),

    /// A registry cell violates the key/value invariants
    #[error("Invalid cell: {0}")]
    InvalidCell(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid precision format
    #[error("Invalid precision format: {0}")]
    InvalidPrecision(String),

    /// Two timestamps without time values cannot be ordered
    #[error("Cannot order two timestamps that both lack a time value")]
    IncomparableTimestamps,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Integer parsing error
    #[error("Integer parsing error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// Unexpected XML element
    #[error("Unexpected XML element: {0}")]
    UnexpectedElement(String),

    /// The token stream does not describe a well-formed document
    #[error("Malformed DFXML stream: {0}")]
    MalformedStream(String),

    /// Invalid facet value
    #[error("Invalid facet value: {0}")]
    InvalidFacet(String),

    /// The external content extraction tool exited unsuccessfully
    #[error("Content extraction failed: `{command}` exited with {status}")]
    ContentExtraction {
        /// The command line that was run
        command: String,
        /// Exit status reported by the tool
        status: ExitStatus,
    },

    /// The process producing the DFXML stream exited unsuccessfully
    #[error("DFXML producer `{program}` exited with {status}")]
    ProducerFailed {
        /// The program that produced the stream
        program: String,
        /// Exit status reported by the producer
        status: ExitStatus,
    },
}

/// Result type alias for DFXML operations.
pub type Result<T> = std::result::Result<T, Error>;
