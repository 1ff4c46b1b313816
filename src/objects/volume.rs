//! VolumeObject - a file system volume and the files found in it.

use crate::casts::{bool_cast, int_cast};
use crate::diagnostics::Diagnostics;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::objects::byte_run::ByteRuns;
use crate::objects::common::CHANGED_PROPERTY;
use crate::objects::delta::{
    is_absent_marker, is_marked_changed, write_annotations, Annotation, DiffMarker,
};
use crate::objects::fileobject::FileObject;
use std::collections::BTreeSet;

/// Root tags a volume may be read from.
const ACCEPTED_ROOTS: [&str; 2] = ["volume", "delta:original_volume"];

/// Represents a file system volume in DFXML.
///
/// A volume owns its files in document order. Equality ignores the files,
/// the differential marks and `original_volume`.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolumeObject {
    // === Location ===
    /// Offset from the start of the disk image (bytes)
    pub partition_offset: Option<u64>,

    // === Geometry ===
    /// Sector size (bytes)
    pub sector_size: Option<u32>,
    /// Block/cluster size (bytes)
    pub block_size: Option<u32>,

    // === File System Type ===
    /// File system type code (numeric)
    pub ftype: Option<i32>,
    /// File system type string (e.g., "ntfs", "ext4")
    pub ftype_str: Option<String>,

    /// Total number of blocks
    pub block_count: Option<u64>,
    /// First block number
    pub first_block: Option<u64>,
    /// Last block number
    pub last_block: Option<u64>,

    /// Only allocated files were processed
    pub allocated_only: Option<bool>,
    /// Error message if volume processing failed
    pub error: Option<String>,
    /// Byte runs for the volume
    pub byte_runs: Option<ByteRuns>,

    // === Differential Analysis ===
    /// Baseline copy of this volume from an earlier scan
    pub original_volume: Option<Box<VolumeObject>>,
    /// Whole-volume differential annotations
    pub annos: BTreeSet<Annotation>,
    /// Properties that differ from `original_volume`
    pub diffs: BTreeSet<String>,

    /// Files contained in this volume
    files: Vec<FileObject>,
}

impl VolumeObject {
    /// Creates a new empty VolumeObject.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a VolumeObject with a file system type string.
    pub fn with_ftype(ftype_str: impl Into<String>) -> Self {
        Self {
            ftype_str: Some(ftype_str.into()),
            ..Default::default()
        }
    }

    /// Appends a FileObject to this volume.
    pub fn append_file(&mut self, file: FileObject) {
        self.files.push(file);
    }

    /// Returns an iterator over the files in this volume.
    pub fn files(&self) -> impl Iterator<Item = &FileObject> {
        self.files.iter()
    }

    /// Returns a mutable iterator over the files in this volume.
    pub fn files_mut(&mut self) -> impl Iterator<Item = &mut FileObject> {
        self.files.iter_mut()
    }

    /// Returns the number of files in this volume.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// A copy of the volume's own properties without its files.
    pub fn header(&self) -> VolumeObject {
        VolumeObject {
            partition_offset: self.partition_offset,
            sector_size: self.sector_size,
            block_size: self.block_size,
            ftype: self.ftype,
            ftype_str: self.ftype_str.clone(),
            block_count: self.block_count,
            first_block: self.first_block,
            last_block: self.last_block,
            allocated_only: self.allocated_only,
            error: self.error.clone(),
            byte_runs: self.byte_runs.clone(),
            original_volume: self.original_volume.clone(),
            annos: self.annos.clone(),
            diffs: self.diffs.clone(),
            files: Vec::new(),
        }
    }

    /// Sets a scalar property from text, routing it through the matching cast.
    ///
    /// Returns `Ok(false)` for names that are not scalar volume properties.
    pub fn set_property(&mut self, name: &str, value: Option<&str>) -> Result<bool> {
        match name {
            "partition_offset" => self.partition_offset = int_cast(value)?,
            "sector_size" => self.sector_size = int_cast(value)?,
            "block_size" => self.block_size = int_cast(value)?,
            "ftype" => self.ftype = int_cast(value)?,
            "ftype_str" => self.ftype_str = value.map(str::to_string),
            "block_count" => self.block_count = int_cast(value)?,
            "first_block" => self.first_block = int_cast(value)?,
            "last_block" => self.last_block = int_cast(value)?,
            "allocated_only" => self.allocated_only = bool_cast(value)?,
            "error" => self.error = value.map(str::to_string),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Compares this volume to another, returning the set of differing
    /// property names. File system type names compare case-insensitively.
    pub fn compare_to_other(
        &self,
        other: &VolumeObject,
        ignore_original: bool,
    ) -> BTreeSet<String> {
        let mut diffs = BTreeSet::new();

        macro_rules! compare_field {
            ($field:ident) => {
                if self.$field != other.$field {
                    diffs.insert(stringify!($field).to_string());
                }
            };
        }

        compare_field!(partition_offset);
        compare_field!(sector_size);
        compare_field!(block_size);
        compare_field!(ftype);
        compare_field!(block_count);
        compare_field!(first_block);
        compare_field!(last_block);
        compare_field!(allocated_only);
        compare_field!(error);
        compare_field!(byte_runs);

        let ftype_str_eq = match (&self.ftype_str, &other.ftype_str) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        };
        if !ftype_str_eq {
            diffs.insert("ftype_str".to_string());
        }

        if !ignore_original && self.original_volume != other.original_volume {
            diffs.insert("original_volume".to_string());
        }

        diffs
    }

    /// Recomputes `diffs` against `original_volume`.
    pub fn compare_to_original(&mut self) {
        self.diffs = match self.original_volume {
            Some(ref original) => self.compare_to_other(original, true),
            None => BTreeSet::new(),
        };
    }

    /// Populates from a `volume` element, including any nested files.
    pub fn populate_from_element(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        if !ACCEPTED_ROOTS.contains(&el.name.as_str()) {
            return Err(Error::UnexpectedElement(el.name.clone()));
        }

        for (key, value) in &el.attributes {
            if key == CHANGED_PROPERTY {
                continue;
            }
            if let Some(anno) = Annotation::from_attr(key, "volume") {
                self.annos.insert(anno);
                continue;
            }
            // Older producers put a few properties on the volume tag itself
            let key = if key == "offset" { "partition_offset" } else { key.as_str() };
            if !self.set_property(key, Some(value))? {
                diag.unknown_attribute("volume", None, key);
            }
        }

        for child in &el.children {
            let property = match child.name.as_str() {
                "fileobject" => {
                    self.append_file(FileObject::from_element(child, diag)?);
                    continue;
                }
                "byte_runs" => {
                    let runs = ByteRuns::from_element(child, diag)?;
                    self.byte_runs = if is_absent_marker(child) {
                        None
                    } else {
                        Some(runs)
                    };
                    "byte_runs"
                }
                "delta:original_volume" => {
                    self.original_volume = Some(Box::new(VolumeObject::from_element(child, diag)?));
                    "original_volume"
                }
                name => {
                    if !self.set_property(name, child.text())? {
                        diag.unknown_element(
                            "volume",
                            child.namespace.as_deref(),
                            child.local_name(),
                        );
                        continue;
                    }
                    name
                }
            };
            if is_marked_changed(child) {
                self.diffs.insert(property.to_string());
            }
        }
        Ok(())
    }

    /// Builds a volume from a `volume` element.
    pub fn from_element(el: &Element, diag: &mut Diagnostics) -> Result<Self> {
        let mut volume = Self::new();
        volume.populate_from_element(el, diag)?;
        Ok(volume)
    }

    /// Serializes the volume's attributes and header properties, without files.
    pub fn to_partial_element(&self) -> Element {
        self.partial_element_named("volume")
    }

    fn partial_element_named(&self, root: &str) -> Element {
        let mut el = Element::new(root);
        write_annotations(&mut el, &self.annos, "volume");

        let mut marker = DiffMarker::new("volume", &self.diffs);
        marker.emit(
            &mut el,
            "partition_offset",
            Element::optional("partition_offset", self.partition_offset),
        );
        marker.emit(&mut el, "sector_size", Element::optional("sector_size", self.sector_size));
        marker.emit(&mut el, "block_size", Element::optional("block_size", self.block_size));
        marker.emit(&mut el, "ftype", Element::optional("ftype", self.ftype));
        marker.emit(
            &mut el,
            "ftype_str",
            Element::optional("ftype_str", self.ftype_str.as_deref()),
        );
        marker.emit(&mut el, "block_count", Element::optional("block_count", self.block_count));
        marker.emit(&mut el, "first_block", Element::optional("first_block", self.first_block));
        marker.emit(&mut el, "last_block", Element::optional("last_block", self.last_block));
        marker.emit(
            &mut el,
            "allocated_only",
            Element::flag("allocated_only", self.allocated_only),
        );
        marker.emit(&mut el, "error", Element::optional("error", self.error.as_deref()));
        marker.emit_with(
            &mut el,
            "byte_runs",
            self.byte_runs.as_ref().map(ByteRuns::to_element),
            || Element::new("byte_runs"),
        );
        if let Some(ref original) = self.original_volume {
            el.push(original.partial_element_named("delta:original_volume"));
        }
        marker.skip("original_volume");
        marker.finish();
        el
    }

    /// Serializes the whole volume, files included.
    pub fn to_element(&self) -> Element {
        let mut el = self.to_partial_element();
        for file in &self.files {
            el.push(file.to_element());
        }
        el
    }
}

impl PartialEq for VolumeObject {
    fn eq(&self, other: &Self) -> bool {
        self.compare_to_other(other, true).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::byte_run::ByteRun;

    #[test]
    fn test_volume_object_new() {
        let vol = VolumeObject::new();
        assert!(vol.ftype_str.is_none());
        assert_eq!(vol.file_count(), 0);
    }

    #[test]
    fn test_volume_with_files() {
        let mut vol = VolumeObject::with_ftype("ntfs");
        vol.append_file(FileObject::with_filename("file1.txt"));
        vol.append_file(FileObject::with_filename("file2.txt"));
        assert_eq!(vol.file_count(), 2);
        assert_eq!(vol.header().file_count(), 0);
        assert_eq!(vol.header(), vol);
    }

    #[test]
    fn test_ftype_str_case_insensitive() {
        let a = VolumeObject::with_ftype("NTFS");
        let b = VolumeObject::with_ftype("ntfs");
        assert!(a.compare_to_other(&b, true).is_empty());

        let c = VolumeObject::with_ftype("fat32");
        assert!(a.compare_to_other(&c, true).contains("ftype_str"));
    }

    #[test]
    fn test_partial_element_has_no_files() {
        let mut vol = VolumeObject::new();
        vol.block_size = Some(512);
        vol.block_count = Some(1000);
        vol.append_file(FileObject::with_filename("readme.txt"));

        let partial = vol.to_partial_element();
        assert!(partial.child("fileobject").is_none());
        assert_eq!(partial.child("block_size").and_then(Element::text), Some("512"));

        let full = vol.to_element();
        assert_eq!(full.children.last().map(|c| c.name.as_str()), Some("fileobject"));
    }

    #[test]
    fn test_round_trip_with_diffs() {
        let mut original = VolumeObject::with_ftype("ext4");
        original.block_size = Some(4096);
        let mut runs = ByteRuns::new();
        runs.push(ByteRun::with_img_offset(32256, 1 << 20));
        original.byte_runs = Some(runs);

        let mut vol = original.clone();
        vol.block_size = Some(1024);
        vol.byte_runs = None;
        vol.annos.insert(Annotation::Changed);
        vol.original_volume = Some(Box::new(original));
        vol.compare_to_original();

        let expected: BTreeSet<String> =
            ["block_size", "byte_runs"].iter().map(|s| s.to_string()).collect();
        assert_eq!(vol.diffs, expected);

        let mut diag = Diagnostics::new();
        let back = VolumeObject::from_element(&vol.to_element(), &mut diag).unwrap();
        assert_eq!(back, vol);
        assert_eq!(back.diffs, expected);
        assert!(back.annos.contains(&Annotation::Changed));
        assert!(back.byte_runs.is_none());
        assert!(back.original_volume.is_some());
    }

    #[test]
    fn test_legacy_attributes_and_unknown_children() {
        let mut el = Element::new("volume");
        el.set_attr("offset", "7");
        el.set_attr("block_size", "512");
        el.push(Element::with_text("volume_label", "DATA"));

        let mut diag = Diagnostics::new();
        let vol = VolumeObject::from_element(&el, &mut diag).unwrap();
        assert_eq!(vol.partition_offset, Some(7));
        assert_eq!(vol.block_size, Some(512));
        assert_eq!(diag.distinct_count(), 1);
        assert_eq!(diag.element_count(None, "volume_label"), 1);
    }
}
