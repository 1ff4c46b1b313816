//! Typed Digital Forensics XML (DFXML) and RegXML objects for Rust.
//!
//! This crate provides validated types for the entities of a forensic
//! metadata document (volumes, files, registry hives and cells, byte runs,
//! timestamps) together with streaming XML I/O and differential annotation.
//!
//! # Features
//!
//! - **Core Types**: Validated representation of DFXML and RegXML entities.
//! - **Streaming Reader**: Emits each object as soon as its element closes,
//!   from a file or from a running producer's output.
//! - **Streaming Writer**: Prints a document one object at a time.
//! - **Differential Annotation**: Computes changed properties against an
//!   original snapshot and marks them in the XML.
//! - **Content Extraction**: Reads the bytes behind byte runs through an
//!   external sector reader.
//! - **Serde Support**: Optional serialization with the `serde` feature.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dfxml_objects::reader::parse;
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! // Parse a complete DFXML file
//! let file = File::open("forensic_output.xml").unwrap();
//! let dfxml = parse(BufReader::new(file)).unwrap();
//!
//! // Iterate over all files
//! for file in dfxml.iter_files() {
//!     println!("File: {:?}, Size: {:?}", file.filename, file.filesize);
//! }
//! ```
//!
//! # Streaming API
//!
//! For large DFXML files, use the streaming reader:
//!
//! ```rust,no_run
//! use dfxml_objects::reader::{DFXMLReader, Event};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = File::open("large_forensic_output.xml").unwrap();
//! let reader = DFXMLReader::from_reader(BufReader::new(file));
//!
//! for result in reader {
//!     match result {
//!         Ok(Event::FileObject(file)) => {
//!             println!("File: {:?}", file.filename);
//!         }
//!         Ok(_) => {}
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Module Structure
//!
//! - [`objects`] - Core DFXML and RegXML data structures
//! - [`reader`] - Token reader, stream state machine and parsers
//! - [`writer`] - Streaming and whole-tree printers
//! - [`element`] - Owned element tree used for entity conversion
//! - [`casts`] - Validated scalar conversions
//! - [`diagnostics`] - Unknown-markup collector
//! - [`error`] - Error types
//!
//! # Optional Features
//!
//! - `serde` - Enable serde serialization/deserialization support
//! - `cli` - Build the `cat_fileobjects` binary

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod casts;
pub mod diagnostics;
pub mod element;
pub mod error;
pub mod objects;
pub mod reader;
pub mod writer;

// Re-export commonly used types at the crate root
pub use diagnostics::Diagnostics;
pub use element::Element;
pub use error::{Error, Result};
pub use objects::{
    Annotation, ByteRun, ByteRuns, CellObject, DFXMLObject, FileObject, HashType, Hashes,
    HiveObject, RegXMLObject, TimestampObject, VolumeObject,
};
pub use reader::{parse, parse_file_objects, parse_regxml, DFXMLReader, Event, ProcessReader};
pub use writer::{DFXMLWriter, StreamWriter, WriterConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
