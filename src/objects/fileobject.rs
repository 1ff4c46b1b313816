//! FileObject - represents a file in DFXML.
//!
//! This is the most commonly used DFXML object, representing a single file
//! with its metadata, timestamps, hashes, and byte run locations.

use crate::casts::{bool_cast, int_cast};
use crate::diagnostics::Diagnostics;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::objects::byte_run::{ByteRunFacet, ByteRuns};
use crate::objects::common::{HashType, Hashes, TimestampName, TimestampObject, CHANGED_PROPERTY};
use crate::objects::delta::{
    is_absent_marker, is_marked_changed, write_annotations, Annotation, DiffMarker,
};
use crate::objects::volume::VolumeObject;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Root tags a file object may be read from.
const ACCEPTED_ROOTS: [&str; 3] = ["fileobject", "delta:original_fileobject", "parent_object"];

/// Allocation status of a file.
///
/// Replaces the legacy `alloc`/`unalloc` flag pair, which were always
/// complements of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AllocStatus {
    /// Allocation status is unknown
    #[default]
    Unknown,
    /// File is allocated
    Allocated,
    /// File is unallocated/deleted
    Unallocated,
}

impl AllocStatus {
    /// Builds the status from an `alloc` flag.
    pub fn from_flag(alloc: Option<bool>) -> Self {
        match alloc {
            Some(true) => AllocStatus::Allocated,
            Some(false) => AllocStatus::Unallocated,
            None => AllocStatus::Unknown,
        }
    }

    /// The `alloc` flag view.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AllocStatus::Allocated => Some(true),
            AllocStatus::Unallocated => Some(false),
            AllocStatus::Unknown => None,
        }
    }
}

/// Usage status of a file, replacing the `used`/`unused` flag pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UsageStatus {
    /// Not recorded
    #[default]
    Unknown,
    /// In use
    Used,
    /// Not in use
    Unused,
}

impl UsageStatus {
    /// Builds the status from a `used` flag.
    pub fn from_flag(used: Option<bool>) -> Self {
        match used {
            Some(true) => UsageStatus::Used,
            Some(false) => UsageStatus::Unused,
            None => UsageStatus::Unknown,
        }
    }

    /// The `used` flag view.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            UsageStatus::Used => Some(true),
            UsageStatus::Unused => Some(false),
            UsageStatus::Unknown => None,
        }
    }
}

/// File system name type (regular file, directory, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NameType {
    /// Unknown type
    Unknown,
    /// Named pipe (FIFO)
    Fifo,
    /// Character device
    CharacterDevice,
    /// Directory
    Directory,
    /// Block device
    BlockDevice,
    /// Regular file
    Regular,
    /// Symbolic link
    SymbolicLink,
    /// Socket
    Socket,
    /// Shadow entry
    Shadow,
    /// Whiteout entry
    Whiteout,
    /// Virtual file
    Virtual,
}

impl NameType {
    /// Returns the single-character string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            NameType::Unknown => "-",
            NameType::Fifo => "p",
            NameType::CharacterDevice => "c",
            NameType::Directory => "d",
            NameType::BlockDevice => "b",
            NameType::Regular => "r",
            NameType::SymbolicLink => "l",
            NameType::Socket => "s",
            NameType::Shadow => "h",
            NameType::Whiteout => "w",
            NameType::Virtual => "v",
        }
    }
}

impl std::str::FromStr for NameType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "-" => Ok(NameType::Unknown),
            "p" => Ok(NameType::Fifo),
            "c" => Ok(NameType::CharacterDevice),
            "d" => Ok(NameType::Directory),
            "b" => Ok(NameType::BlockDevice),
            "r" => Ok(NameType::Regular),
            "l" => Ok(NameType::SymbolicLink),
            "s" => Ok(NameType::Socket),
            "h" => Ok(NameType::Shadow),
            "w" => Ok(NameType::Whiteout),
            "v" => Ok(NameType::Virtual),
            _ => Err(Error::InvalidNameType(s.to_string())),
        }
    }
}

impl std::fmt::Display for NameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Meta type (inode type), serialized as its TSK numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetaType {
    /// Undefined
    Undefined,
    /// Regular file
    Regular,
    /// Directory
    Directory,
    /// Named pipe (FIFO)
    Fifo,
    /// Character device
    CharacterDevice,
    /// Block device
    BlockDevice,
    /// Symbolic link
    SymbolicLink,
    /// Shadow entry
    Shadow,
    /// Socket
    Socket,
    /// Whiteout entry
    Whiteout,
    /// Virtual file
    Virtual,
    /// Virtual directory
    VirtualDirectory,
    /// A code this crate has no name for
    Other(u32),
}

impl MetaType {
    /// Creates a MetaType from a TSK meta type code.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => MetaType::Undefined,
            1 => MetaType::Regular,
            2 => MetaType::Directory,
            3 => MetaType::Fifo,
            4 => MetaType::CharacterDevice,
            5 => MetaType::BlockDevice,
            6 => MetaType::SymbolicLink,
            7 => MetaType::Shadow,
            8 => MetaType::Socket,
            9 => MetaType::Whiteout,
            10 => MetaType::Virtual,
            11 => MetaType::VirtualDirectory,
            other => MetaType::Other(other),
        }
    }

    /// The TSK meta type code.
    pub fn code(&self) -> u32 {
        match self {
            MetaType::Undefined => 0,
            MetaType::Regular => 1,
            MetaType::Directory => 2,
            MetaType::Fifo => 3,
            MetaType::CharacterDevice => 4,
            MetaType::BlockDevice => 5,
            MetaType::SymbolicLink => 6,
            MetaType::Shadow => 7,
            MetaType::Socket => 8,
            MetaType::Whiteout => 9,
            MetaType::Virtual => 10,
            MetaType::VirtualDirectory => 11,
            MetaType::Other(code) => *code,
        }
    }
}

/// Represents a file object in DFXML.
///
/// FileObject is the core type for representing files discovered during
/// forensic analysis. It contains:
/// - File identification (filename, inode, partition)
/// - Timestamps (mtime, atime, ctime, crtime)
/// - Size and hash information
/// - Byte run locations for content, metadata and directory entry
/// - Ownership and permissions
///
/// Equality ignores `id`, the differential marks, the volume back-reference,
/// `parent_object` and `original_fileobject`.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileObject {
    // === Identification ===
    /// Sparse record of the containing directory
    pub parent_object: Option<Box<FileObject>>,
    /// File path/name
    pub filename: Option<String>,
    /// Error message if processing failed
    pub error: Option<String>,
    /// Partition number
    pub partition: Option<u32>,
    /// Unique identifier within the DFXML document
    pub id: Option<u64>,
    /// Name type (file, directory, etc.)
    pub name_type: Option<NameType>,
    /// Logical file size in bytes
    pub filesize: Option<u64>,

    // === Allocation ===
    /// Combined allocation status (`alloc`/`unalloc`)
    pub alloc_status: AllocStatus,
    /// Inode allocation status
    pub alloc_inode: Option<bool>,
    /// Name allocation status
    pub alloc_name: Option<bool>,
    /// Usage status (`used`/`unused`)
    pub usage: UsageStatus,
    /// Orphan flag
    pub orphan: Option<bool>,
    /// Name of an orphaned file
    pub orphan_name: Option<String>,
    /// Compressed flag
    pub compressed: Option<bool>,

    // === Metadata ===
    /// Inode number
    pub inode: Option<u64>,
    /// Meta/inode type
    pub meta_type: Option<MetaType>,
    /// File mode/permissions
    pub mode: Option<u32>,
    /// Number of hard links
    pub nlink: Option<u32>,
    /// User ID
    pub uid: Option<u32>,
    /// Group ID
    pub gid: Option<u32>,

    // === Timestamps ===
    /// Modification time
    pub mtime: Option<TimestampObject>,
    /// Change time (inode change on Unix)
    pub ctime: Option<TimestampObject>,
    /// Access time
    pub atime: Option<TimestampObject>,
    /// Creation time
    pub crtime: Option<TimestampObject>,
    /// Sequence number (for NTFS)
    pub seq: Option<u64>,
    /// Deletion time
    pub dtime: Option<TimestampObject>,
    /// Backup time
    pub bkup_time: Option<TimestampObject>,

    /// Target path for symbolic links
    pub link_target: Option<String>,
    /// File type from libmagic
    pub libmagic: Option<String>,

    // === Byte Runs ===
    /// Inode/metadata byte runs
    pub inode_brs: Option<ByteRuns>,
    /// Name entry byte runs
    pub name_brs: Option<ByteRuns>,
    /// Data content byte runs
    pub data_brs: Option<ByteRuns>,

    /// Cryptographic hashes of file content
    pub hashes: Hashes,

    // === Differential Analysis ===
    /// Baseline copy of this file from an earlier scan
    pub original_fileobject: Option<Box<FileObject>>,
    /// Whole-file differential annotations
    pub annos: BTreeSet<Annotation>,
    /// Properties that differ from `original_fileobject`
    pub diffs: BTreeSet<String>,

    /// Volume this file was read from (never serialized)
    #[cfg_attr(feature = "serde", serde(skip))]
    pub volume_object: Option<Arc<VolumeObject>>,
}

impl FileObject {
    /// Creates a new empty FileObject.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a FileObject with a filename.
    pub fn with_filename(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..Default::default()
        }
    }

    /// The legacy `alloc` flag.
    pub fn alloc(&self) -> Option<bool> {
        self.alloc_status.as_flag()
    }

    /// The legacy `unalloc` flag, always the complement of `alloc`.
    pub fn unalloc(&self) -> Option<bool> {
        self.alloc().map(|a| !a)
    }

    /// Sets the `alloc` flag.
    pub fn set_alloc(&mut self, alloc: Option<bool>) {
        self.alloc_status = AllocStatus::from_flag(alloc);
    }

    /// Sets the `unalloc` flag.
    pub fn set_unalloc(&mut self, unalloc: Option<bool>) {
        self.alloc_status = AllocStatus::from_flag(unalloc.map(|u| !u));
    }

    /// The legacy `used` flag.
    pub fn used(&self) -> Option<bool> {
        self.usage.as_flag()
    }

    /// The legacy `unused` flag, always the complement of `used`.
    pub fn unused(&self) -> Option<bool> {
        self.used().map(|u| !u)
    }

    /// Sets the `used` flag.
    pub fn set_used(&mut self, used: Option<bool>) {
        self.usage = UsageStatus::from_flag(used);
    }

    /// Sets the `unused` flag.
    pub fn set_unused(&mut self, unused: Option<bool>) {
        self.usage = UsageStatus::from_flag(unused.map(|u| !u));
    }

    /// Returns true if the file is allocated.
    ///
    /// Collapses potentially partial allocation information into a single answer.
    pub fn is_allocated(&self) -> Option<bool> {
        if self.alloc_inode == Some(true) && self.alloc_name == Some(true) {
            return Some(true);
        }

        if self.alloc_inode.is_none() && self.alloc_name.is_none() {
            return self.alloc();
        }

        // Partial allocation information - assume unallocated
        Some(false)
    }

    /// Returns the primary byte runs (data content).
    pub fn byte_runs(&self) -> Option<&ByteRuns> {
        self.data_brs.as_ref()
    }

    /// Stores byte runs in the slot matching their facet.
    pub fn set_byte_runs(&mut self, runs: ByteRuns) {
        match runs.facet.unwrap_or_default() {
            ByteRunFacet::Data => self.data_brs = Some(runs),
            ByteRunFacet::Inode => self.inode_brs = Some(runs),
            ByteRunFacet::Name => self.name_brs = Some(runs),
        }
    }

    /// Sets a timestamp by name.
    pub fn set_timestamp(&mut self, name: TimestampName, mut ts: TimestampObject) {
        ts.name = Some(name);
        *self.timestamp_slot(name) = Some(ts);
    }

    /// Gets a timestamp by name.
    pub fn get_timestamp(&self, name: TimestampName) -> Option<&TimestampObject> {
        match name {
            TimestampName::Mtime => self.mtime.as_ref(),
            TimestampName::Atime => self.atime.as_ref(),
            TimestampName::Ctime => self.ctime.as_ref(),
            TimestampName::Crtime => self.crtime.as_ref(),
            TimestampName::Dtime => self.dtime.as_ref(),
            TimestampName::BkupTime => self.bkup_time.as_ref(),
        }
    }

    fn timestamp_slot(&mut self, name: TimestampName) -> &mut Option<TimestampObject> {
        match name {
            TimestampName::Mtime => &mut self.mtime,
            TimestampName::Atime => &mut self.atime,
            TimestampName::Ctime => &mut self.ctime,
            TimestampName::Crtime => &mut self.crtime,
            TimestampName::Dtime => &mut self.dtime,
            TimestampName::BkupTime => &mut self.bkup_time,
        }
    }

    /// Sets a scalar property from text, routing it through the matching cast.
    ///
    /// Returns `Ok(false)` for names that are not scalar file properties.
    pub fn set_property(&mut self, name: &str, value: Option<&str>) -> Result<bool> {
        match name {
            "filename" => self.filename = value.map(str::to_string),
            "error" => self.error = value.map(str::to_string),
            "orphan_name" => self.orphan_name = value.map(str::to_string),
            "link_target" => self.link_target = value.map(str::to_string),
            "libmagic" => self.libmagic = value.map(str::to_string),
            "partition" => self.partition = int_cast(value)?,
            "id" => self.id = int_cast(value)?,
            "filesize" => self.filesize = int_cast(value)?,
            "inode" => self.inode = int_cast(value)?,
            "mode" => self.mode = int_cast(value)?,
            "nlink" => self.nlink = int_cast(value)?,
            "uid" => self.uid = int_cast(value)?,
            "gid" => self.gid = int_cast(value)?,
            "seq" => self.seq = int_cast(value)?,
            "name_type" => self.name_type = value.map(str::parse).transpose()?,
            "meta_type" => self.meta_type = int_cast::<u32>(value)?.map(MetaType::from_code),
            "alloc" => self.set_alloc(bool_cast(value)?),
            "unalloc" => self.set_unalloc(bool_cast(value)?),
            "alloc_inode" => self.alloc_inode = bool_cast(value)?,
            "alloc_name" => self.alloc_name = bool_cast(value)?,
            "used" => self.set_used(bool_cast(value)?),
            "unused" => self.set_unused(bool_cast(value)?),
            "orphan" => self.orphan = bool_cast(value)?,
            "compressed" => self.compressed = bool_cast(value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Compares this file object to another, returning the set of differing
    /// property names.
    ///
    /// `original_fileobject` is compared too unless `ignore_original` is set.
    pub fn compare_to_other(&self, other: &FileObject, ignore_original: bool) -> BTreeSet<String> {
        let mut diffs = BTreeSet::new();

        macro_rules! compare_field {
            ($field:ident) => {
                if self.$field != other.$field {
                    diffs.insert(stringify!($field).to_string());
                }
            };
            ($field:ident, $name:literal) => {
                if self.$field != other.$field {
                    diffs.insert($name.to_string());
                }
            };
        }

        compare_field!(filename);
        compare_field!(error);
        compare_field!(partition);
        compare_field!(name_type);
        compare_field!(filesize);
        compare_field!(alloc_status, "alloc");
        compare_field!(alloc_inode);
        compare_field!(alloc_name);
        compare_field!(usage, "used");
        compare_field!(orphan);
        compare_field!(orphan_name);
        compare_field!(compressed);
        compare_field!(inode);
        compare_field!(meta_type);
        compare_field!(mode);
        compare_field!(nlink);
        compare_field!(uid);
        compare_field!(gid);
        compare_field!(mtime);
        compare_field!(ctime);
        compare_field!(atime);
        compare_field!(crtime);
        compare_field!(seq);
        compare_field!(dtime);
        compare_field!(bkup_time);
        compare_field!(link_target);
        compare_field!(libmagic);
        compare_field!(inode_brs);
        compare_field!(name_brs);
        compare_field!(data_brs);

        for hash_type in HashType::ALL {
            if self.hashes.get(hash_type) != other.hashes.get(hash_type) {
                diffs.insert(hash_type.as_str().to_string());
            }
        }

        if !ignore_original && self.original_fileobject != other.original_fileobject {
            diffs.insert("original_fileobject".to_string());
        }

        diffs
    }

    /// Recomputes `diffs` against `original_fileobject`.
    ///
    /// Without an original the set is cleared.
    pub fn compare_to_original(&mut self) {
        self.diffs = match self.original_fileobject {
            Some(ref original) => self.compare_to_other(original, true),
            None => BTreeSet::new(),
        };
    }

    /// Populates from a `fileobject` element or one of its aliases.
    pub fn populate_from_element(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        if !ACCEPTED_ROOTS.contains(&el.name.as_str()) {
            return Err(Error::UnexpectedElement(el.name.clone()));
        }

        for (key, _) in &el.attributes {
            if key == CHANGED_PROPERTY {
                continue;
            }
            match Annotation::from_attr(key, "file") {
                Some(anno) => {
                    self.annos.insert(anno);
                }
                None => {
                    diag.unknown_attribute("fileobject", None, key);
                }
            }
        }

        for child in &el.children {
            let property = match child.name.as_str() {
                "parent_object" => {
                    self.parent_object = Some(Box::new(FileObject::from_element(child, diag)?));
                    "parent_object".to_string()
                }
                "delta:original_fileobject" => {
                    self.original_fileobject =
                        Some(Box::new(FileObject::from_element(child, diag)?));
                    "original_fileobject".to_string()
                }
                "mtime" | "ctime" | "atime" | "crtime" | "dtime" | "bkup_time" => {
                    let ts = TimestampObject::from_element(child, diag)?;
                    let name = ts.name.unwrap_or(TimestampName::Mtime);
                    *self.timestamp_slot(name) = if ts.is_empty() { None } else { Some(ts) };
                    child.name.clone()
                }
                "byte_runs" => {
                    let runs = ByteRuns::from_element(child, diag)?;
                    let facet = runs.facet.unwrap_or_default();
                    let slot = match facet {
                        ByteRunFacet::Data => &mut self.data_brs,
                        ByteRunFacet::Inode => &mut self.inode_brs,
                        ByteRunFacet::Name => &mut self.name_brs,
                    };
                    *slot = if is_absent_marker(child) {
                        None
                    } else {
                        Some(runs)
                    };
                    format!("{}_brs", facet.as_str())
                }
                "hashdigest" => {
                    if !self.hashes.read_hashdigest(child, diag)? {
                        continue;
                    }
                    child.attr("type").unwrap_or_default().to_lowercase()
                }
                name => {
                    if !self.set_property(name, child.text())? {
                        diag.unknown_element(
                            "fileobject",
                            child.namespace.as_deref(),
                            child.local_name(),
                        );
                        continue;
                    }
                    // The legacy complements share their partner's diff name
                    match name {
                        "unalloc" => "alloc".to_string(),
                        "unused" => "used".to_string(),
                        other => other.to_string(),
                    }
                }
            };

            if is_marked_changed(child) {
                self.diffs.insert(property);
            }
        }
        Ok(())
    }

    /// Builds a file object from a `fileobject` element.
    pub fn from_element(el: &Element, diag: &mut Diagnostics) -> Result<Self> {
        let mut fo = Self::new();
        fo.populate_from_element(el, diag)?;
        Ok(fo)
    }

    /// Serializes as a `fileobject` element in schema order.
    pub fn to_element(&self) -> Element {
        self.to_element_named("fileobject")
    }

    /// Serializes under a different root tag (`parent_object`,
    /// `delta:original_fileobject`).
    pub fn to_element_named(&self, root: &str) -> Element {
        let mut el = Element::new(root);
        write_annotations(&mut el, &self.annos, "file");

        let mut marker = DiffMarker::new("fileobject", &self.diffs);
        marker.emit(
            &mut el,
            "parent_object",
            self.parent_object.as_ref().map(|p| p.to_element_named("parent_object")),
        );
        marker.emit(&mut el, "filename", Element::optional("filename", self.filename.as_deref()));
        marker.emit(&mut el, "error", Element::optional("error", self.error.as_deref()));
        marker.emit(&mut el, "partition", Element::optional("partition", self.partition));
        marker.emit(&mut el, "id", Element::optional("id", self.id));
        marker.emit(&mut el, "name_type", Element::optional("name_type", self.name_type));
        marker.emit(&mut el, "filesize", Element::optional("filesize", self.filesize));

        if self.alloc_inode.is_some() || self.alloc_name.is_some() {
            marker.emit(&mut el, "alloc_inode", Element::flag("alloc_inode", self.alloc_inode));
            marker.emit(&mut el, "alloc_name", Element::flag("alloc_name", self.alloc_name));
            if self.diffs.contains("alloc") {
                marker.emit(&mut el, "alloc", Element::flag("alloc", self.alloc()));
            }
        } else {
            marker.emit(&mut el, "alloc", Element::flag("alloc", self.alloc()));
        }

        marker.emit(&mut el, "used", Element::flag("used", self.used()));
        marker.emit(&mut el, "orphan", Element::flag("orphan", self.orphan));
        marker.emit(
            &mut el,
            "orphan_name",
            Element::optional("orphan_name", self.orphan_name.as_deref()),
        );
        marker.emit(&mut el, "compressed", Element::flag("compressed", self.compressed));
        marker.emit(&mut el, "inode", Element::optional("inode", self.inode));
        marker.emit(
            &mut el,
            "meta_type",
            Element::optional("meta_type", self.meta_type.map(|m| m.code())),
        );
        marker.emit(&mut el, "mode", Element::optional("mode", self.mode));
        marker.emit(&mut el, "nlink", Element::optional("nlink", self.nlink));
        marker.emit(&mut el, "uid", Element::optional("uid", self.uid));
        marker.emit(&mut el, "gid", Element::optional("gid", self.gid));

        let timestamp = |name: TimestampName, ts: &Option<TimestampObject>| {
            ts.as_ref().map(|t| t.to_element_named(name))
        };
        marker.emit(&mut el, "mtime", timestamp(TimestampName::Mtime, &self.mtime));
        marker.emit(&mut el, "ctime", timestamp(TimestampName::Ctime, &self.ctime));
        marker.emit(&mut el, "atime", timestamp(TimestampName::Atime, &self.atime));
        marker.emit(&mut el, "crtime", timestamp(TimestampName::Crtime, &self.crtime));
        marker.emit(&mut el, "seq", Element::optional("seq", self.seq));
        marker.emit(&mut el, "dtime", timestamp(TimestampName::Dtime, &self.dtime));
        marker.emit(&mut el, "bkup_time", timestamp(TimestampName::BkupTime, &self.bkup_time));
        marker.emit(
            &mut el,
            "link_target",
            Element::optional("link_target", self.link_target.as_deref()),
        );
        marker.emit(&mut el, "libmagic", Element::optional("libmagic", self.libmagic.as_deref()));

        for (property, facet, runs) in [
            ("inode_brs", ByteRunFacet::Inode, &self.inode_brs),
            ("name_brs", ByteRunFacet::Name, &self.name_brs),
            ("data_brs", ByteRunFacet::Data, &self.data_brs),
        ] {
            let child = runs.as_ref().map(|r| {
                let mut runs_el = r.to_element();
                if facet != ByteRunFacet::Data {
                    runs_el.set_attr("facet", facet.as_str());
                }
                runs_el
            });
            marker.emit_with(&mut el, property, child, || {
                let mut placeholder = Element::new("byte_runs");
                placeholder.set_attr("facet", facet.as_str());
                placeholder
            });
        }

        for hash_type in HashType::ALL {
            marker.emit_with(
                &mut el,
                hash_type.as_str(),
                self.hashes.hashdigest_element(hash_type),
                || {
                    let mut placeholder = Element::new("hashdigest");
                    placeholder.set_attr("type", hash_type.as_str());
                    placeholder
                },
            );
        }

        if let Some(ref original) = self.original_fileobject {
            el.push(original.to_element_named("delta:original_fileobject"));
        }
        marker.skip("original_fileobject");
        marker.finish();
        el
    }
}

impl PartialEq for FileObject {
    fn eq(&self, other: &Self) -> bool {
        self.compare_to_other(other, true).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::byte_run::ByteRun;

    fn readme() -> FileObject {
        let mut fo = FileObject::with_filename("readme.txt");
        fo.alloc_inode = Some(true);
        fo.alloc_name = Some(true);
        fo.set_timestamp(
            TimestampName::Mtime,
            TimestampObject::parse(TimestampName::Mtime, "2020-01-01T00:00:00Z").unwrap(),
        );
        let mut runs = ByteRuns::new();
        runs.push(ByteRun::with_img_offset(1024, 512));
        fo.set_byte_runs(runs);
        fo
    }

    #[test]
    fn test_file_object_new() {
        let fo = FileObject::new();
        assert!(fo.filename.is_none());
        assert!(fo.is_allocated().is_none());
    }

    #[test]
    fn test_alloc_views_stay_complementary() {
        let mut fo = FileObject::new();
        assert_eq!(fo.alloc(), None);
        assert_eq!(fo.unalloc(), None);

        fo.set_alloc(Some(true));
        assert_eq!(fo.unalloc(), Some(false));

        fo.set_unalloc(Some(true));
        assert_eq!(fo.alloc(), Some(false));
        assert_eq!(fo.alloc_status, AllocStatus::Unallocated);

        fo.set_unused(Some(false));
        assert_eq!(fo.used(), Some(true));
        assert_eq!(fo.usage, UsageStatus::Used);
    }

    #[test]
    fn test_is_allocated() {
        let mut fo = FileObject::new();
        assert!(fo.is_allocated().is_none());

        fo.alloc_inode = Some(true);
        fo.alloc_name = Some(true);
        assert_eq!(fo.is_allocated(), Some(true));

        fo.alloc_inode = Some(false);
        assert_eq!(fo.is_allocated(), Some(false));
    }

    #[test]
    fn test_setters_validate() {
        let mut fo = FileObject::new();
        assert!(fo.set_property("filesize", Some("12")).unwrap());
        assert_eq!(fo.filesize, Some(12));
        assert!(matches!(
            fo.set_property("filesize", Some("twelve")),
            Err(Error::InvalidInteger(_))
        ));
        assert!(matches!(
            fo.set_property("alloc", Some("yes")),
            Err(Error::InvalidBool(_))
        ));
        assert!(matches!(
            fo.set_property("name_type", Some("x")),
            Err(Error::InvalidNameType(_))
        ));
        assert!(!fo.set_property("colour", Some("blue")).unwrap());
    }

    #[test]
    fn test_meta_type_codes() {
        for code in 0..14 {
            assert_eq!(MetaType::from_code(code).code(), code);
        }
        assert_eq!(MetaType::from_code(2), MetaType::Directory);
    }

    #[test]
    fn test_readme_element_order() {
        let el = readme().to_element();
        let names: Vec<&str> = el.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["filename", "alloc_inode", "alloc_name", "mtime", "byte_runs"]
        );
        assert_eq!(el.children[3].text(), Some("2020-01-01T00:00:00Z"));
        assert_eq!(el.children[4].children[0].attr("img_offset"), Some("1024"));
    }

    #[test]
    fn test_round_trip() {
        let mut fo = readme();
        fo.partition = Some(1);
        fo.name_type = Some(NameType::Regular);
        fo.meta_type = Some(MetaType::Regular);
        fo.filesize = Some(512);
        fo.mode = Some(420);
        fo.set_used(Some(true));
        fo.hashes
            .set(HashType::Sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709")
            .unwrap();
        let mut inode_runs = ByteRuns::with_facet(ByteRunFacet::Inode);
        inode_runs.push(ByteRun::with_img_offset(4096, 256));
        fo.set_byte_runs(inode_runs);

        let mut diag = Diagnostics::new();
        let back = FileObject::from_element(&fo.to_element(), &mut diag).unwrap();
        assert_eq!(back, fo);
        assert!(back.inode_brs.is_some());
        assert!(diag.is_empty());
    }

    #[test]
    fn test_unknown_child_tolerated() {
        let mut el = readme().to_element();
        el.push(Element::with_text("favorite_color", "blue"));
        el.push(Element::with_text("favorite_color", "green"));

        let mut diag = Diagnostics::new();
        let fo = FileObject::from_element(&el, &mut diag).unwrap();
        assert_eq!(fo.filename.as_deref(), Some("readme.txt"));
        assert_eq!(diag.distinct_count(), 1);
        assert_eq!(diag.element_count(None, "favorite_color"), 2);
    }

    #[test]
    fn test_wrong_root_rejected() {
        let mut diag = Diagnostics::new();
        let result = FileObject::from_element(&Element::new("volume"), &mut diag);
        assert!(matches!(result, Err(Error::UnexpectedElement(_))));
    }

    #[test]
    fn test_diffs_survive_serialization() {
        let original = readme();
        let mut fo = readme();
        fo.filesize = Some(2048);
        fo.mtime = None;
        fo.hashes
            .set(HashType::Md5, "d41d8cd98f00b204e9800998ecf8427e")
            .unwrap();
        fo.annos.insert(Annotation::Modified);
        fo.original_fileobject = Some(Box::new(original));
        fo.compare_to_original();

        let expected: BTreeSet<String> = ["filesize", "md5", "mtime"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(fo.diffs, expected);

        let el = fo.to_element();
        assert_eq!(el.attr("delta:modified_file"), Some("1"));
        let mtime = el.child("mtime").unwrap();
        assert_eq!(mtime.attr(CHANGED_PROPERTY), Some("1"));
        assert!(mtime.text.is_none());

        let mut diag = Diagnostics::new();
        let back = FileObject::from_element(&el, &mut diag).unwrap();
        assert_eq!(back.diffs, expected);
        assert!(back.mtime.is_none());
        assert!(back.annos.contains(&Annotation::Modified));
        assert!(back.original_fileobject.is_some());
    }

    #[test]
    fn test_changed_empty_byte_runs_survive_reread() {
        let mut fo = readme();
        fo.data_brs = Some(ByteRuns::new());
        fo.inode_brs = None;
        fo.diffs = ["data_brs", "inode_brs"].iter().map(|s| s.to_string()).collect();

        let xml = fo.to_element().to_xml_string().unwrap();
        let el = crate::reader::read_element(xml.as_bytes()).unwrap();
        let mut diag = Diagnostics::new();
        let back = FileObject::from_element(&el, &mut diag).unwrap();
        assert_eq!(back.data_brs, Some(ByteRuns::new()));
        assert!(back.inode_brs.is_none());
        assert_eq!(back.diffs, fo.diffs);
    }

    #[test]
    fn test_compare_to_original_without_original() {
        let mut fo = readme();
        fo.diffs.insert("stale".to_string());
        fo.compare_to_original();
        assert!(fo.diffs.is_empty());
    }
}
