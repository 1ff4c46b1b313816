//! DFXML and RegXML object types.
//!
//! - [`DFXMLObject`] - The root document container
//! - [`VolumeObject`] - A file system volume
//! - [`FileObject`] - A file with metadata and hashes
//! - [`RegXMLObject`], [`HiveObject`], [`CellObject`] - Registry hives
//!
//! Also provides common types:
//! - [`ByteRun`] and [`ByteRuns`] - Disk/file location information
//! - [`TimestampObject`] - Forensic timestamps with precision
//! - [`Hashes`] - Cryptographic hash values
//! - [`Annotation`] - Differential annotations

mod byte_run;
mod common;
mod delta;
mod dfxml;
mod fileobject;
mod regxml;
mod volume;

pub use byte_run::{ByteRun, ByteRunFacet, ByteRunType, ByteRuns, ContentIter, ExtractConfig};
pub use common::{
    HashType, Hashes, Precision, TimeUnit, TimestampName, TimestampObject, CHANGED_PROPERTY,
    DFXML_VERSION, REGXML_VERSION, XMLNS_DC, XMLNS_DELTA, XMLNS_DFXML, XMLNS_DFXML_EXT,
    XMLNS_REGXML,
};
pub use delta::Annotation;

pub use dfxml::{DFXMLChild, DFXMLIterator, DFXMLObject, LibraryObject};
pub use fileobject::{AllocStatus, FileObject, MetaType, NameType, UsageStatus};
pub use regxml::{CellNameType, CellObject, HiveObject, RegXMLObject};
pub use volume::VolumeObject;
