//! DFXMLObject - the root document container for DFXML.
//!
//! This is the top-level object that contains all other DFXML elements,
//! including metadata about the creator, source images, and child objects.

use crate::diagnostics::Diagnostics;
use crate::element::{local_part, Element};
use crate::error::{Error, Result};
use crate::objects::common::{DFXML_VERSION, XMLNS_DC, XMLNS_DELTA, XMLNS_DFXML, XMLNS_DFXML_EXT};
use crate::objects::fileobject::FileObject;
use crate::objects::volume::VolumeObject;
use std::collections::{BTreeMap, BTreeSet};

/// Information about a library used to create or build the DFXML.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryObject {
    /// Library name
    pub name: Option<String>,
    /// Library version
    pub version: Option<String>,
}

impl LibraryObject {
    /// Creates a new LibraryObject with name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
        }
    }

    /// Creates an empty LibraryObject.
    pub fn empty() -> Self {
        Self {
            name: None,
            version: None,
        }
    }

    /// Returns true if the libraries match, allowing for missing versions.
    pub fn relaxed_eq(&self, other: &LibraryObject) -> bool {
        if self.name != other.name {
            return false;
        }
        if self.version.is_none() || other.version.is_none() {
            return true;
        }
        self.version == other.version
    }

    /// Reads a `library` element.
    pub fn from_element(el: &Element, diag: &mut Diagnostics) -> Result<Self> {
        if el.name != "library" {
            return Err(Error::UnexpectedElement(el.name.clone()));
        }
        let mut lib = Self::empty();
        for (key, value) in &el.attributes {
            match key.as_str() {
                "name" => lib.name = Some(value.clone()),
                "version" => lib.version = Some(value.clone()),
                other => {
                    diag.unknown_attribute("library", None, other);
                }
            }
        }
        Ok(lib)
    }

    /// Serializes as an empty `library` element.
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("library");
        if let Some(ref name) = self.name {
            el.set_attr("name", name.as_str());
        }
        if let Some(ref version) = self.version {
            el.set_attr("version", version.as_str());
        }
        el
    }
}

impl Default for LibraryObject {
    fn default() -> Self {
        Self::empty()
    }
}

/// The root DFXML document object.
///
/// DFXMLObject is the top-level container that holds:
/// - Document metadata (version, creator info, command line)
/// - Source image filenames and Dublin Core metadata
/// - Namespaces
/// - Volumes and the files outside any volume
/// - Trailing resource-usage records
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DFXMLObject {
    // === Document Metadata ===
    /// DFXML schema version
    pub version: String,
    /// Program that created this DFXML
    pub program: Option<String>,
    /// Version of the creating program
    pub program_version: Option<String>,
    /// Command line used to create this DFXML
    pub command_line: Option<String>,

    // === Sources ===
    /// Source image filenames
    pub sources: Vec<String>,

    // === Dublin Core Metadata ===
    /// Dublin Core metadata, keyed by local name (`type`, `publisher`, ...)
    pub dc: BTreeMap<String, String>,

    // === Namespaces ===
    /// XML namespaces (prefix -> URI); the empty prefix is the default namespace
    namespaces: BTreeMap<String, String>,

    // === Libraries ===
    /// Libraries used to create this DFXML
    creator_libraries: Vec<LibraryObject>,
    /// Libraries used in the build environment
    build_libraries: Vec<LibraryObject>,

    /// Resource usage records written after the object stream, in order
    pub rusage: Vec<(String, String)>,

    // === Differential Analysis ===
    /// File properties to ignore when diffing
    pub diff_file_ignores: BTreeSet<String>,

    // === Child Objects ===
    volumes: Vec<VolumeObject>,
    files: Vec<FileObject>,
}

impl DFXMLObject {
    /// Creates a new DFXMLObject with default settings.
    pub fn new() -> Self {
        let mut obj = Self {
            version: DFXML_VERSION.to_string(),
            ..Default::default()
        };

        obj.add_namespace("", XMLNS_DFXML);
        obj.add_namespace("dc", XMLNS_DC);
        obj.add_namespace("delta", XMLNS_DELTA);
        obj.add_namespace("dfxmlext", XMLNS_DFXML_EXT);

        obj
    }

    /// Creates a DFXMLObject with a specific version.
    pub fn with_version(version: impl Into<String>) -> Self {
        let mut obj = Self::new();
        obj.version = version.into();
        obj
    }

    // === Namespace Management ===

    /// Adds a namespace to the document.
    ///
    /// If the prefix already exists, the existing mapping is preserved.
    pub fn add_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.namespaces.entry(prefix.into()).or_insert_with(|| uri.into());
    }

    /// Returns an iterator over namespaces (prefix, uri).
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.namespaces.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // === Library Management ===

    /// Adds a creator library.
    pub fn add_creator_library(&mut self, library: LibraryObject) {
        self.creator_libraries.push(library);
    }

    /// Adds a build library.
    pub fn add_build_library(&mut self, library: LibraryObject) {
        self.build_libraries.push(library);
    }

    /// Returns an iterator over creator libraries.
    pub fn creator_libraries(&self) -> impl Iterator<Item = &LibraryObject> {
        self.creator_libraries.iter()
    }

    /// Returns an iterator over build libraries.
    pub fn build_libraries(&self) -> impl Iterator<Item = &LibraryObject> {
        self.build_libraries.iter()
    }

    // === Child Object Management ===

    /// Appends a volume to the document.
    pub fn append_volume(&mut self, volume: VolumeObject) {
        self.volumes.push(volume);
    }

    /// Appends a file to the document (not attached to a volume).
    pub fn append_file(&mut self, file: FileObject) {
        self.files.push(file);
    }

    /// Returns an iterator over volumes.
    pub fn volumes(&self) -> impl Iterator<Item = &VolumeObject> {
        self.volumes.iter()
    }

    /// Returns a mutable iterator over volumes.
    pub fn volumes_mut(&mut self) -> impl Iterator<Item = &mut VolumeObject> {
        self.volumes.iter_mut()
    }

    /// Returns the number of volumes.
    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    /// Returns an iterator over files directly attached to the document.
    pub fn files(&self) -> impl Iterator<Item = &FileObject> {
        self.files.iter()
    }

    /// Returns a mutable iterator over files.
    pub fn files_mut(&mut self) -> impl Iterator<Item = &mut FileObject> {
        self.files.iter_mut()
    }

    /// Returns the number of files directly attached to the document.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    // === Iteration ===

    /// Yields each volume followed by its files, then the files outside
    /// any volume.
    pub fn iter(&self) -> DFXMLIterator<'_> {
        DFXMLIterator::new(self)
    }

    /// Returns an iterator over all files in the document, in document order.
    pub fn iter_files(&self) -> impl Iterator<Item = &FileObject> {
        self.volumes
            .iter()
            .flat_map(|v| v.files())
            .chain(self.files.iter())
    }

    // === XML ===

    /// Populates from a `dfxml` element.
    ///
    /// Accepts both the nested header layout (`metadata`, `creator` with
    /// `execution_environment`, `source`) and the flat layout some producers
    /// write (`image_filename` and `build_environment` directly under the root).
    pub fn populate_from_element(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        if el.name != "dfxml" {
            return Err(Error::UnexpectedElement(el.name.clone()));
        }
        self.read_root_attributes(&el.attributes, diag);
        for child in &el.children {
            self.read_child(child, diag)?;
        }
        Ok(())
    }

    /// Builds a document from a `dfxml` element.
    pub fn from_element(el: &Element, diag: &mut Diagnostics) -> Result<Self> {
        let mut doc = Self::new();
        doc.populate_from_element(el, diag)?;
        Ok(doc)
    }

    pub(crate) fn read_root_attributes(
        &mut self,
        attributes: &[(String, String)],
        diag: &mut Diagnostics,
    ) {
        for (key, value) in attributes {
            if key == "version" {
                self.version = value.clone();
            } else if key == "xmlns" {
                self.namespaces.insert(String::new(), value.clone());
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.namespaces.insert(prefix.to_string(), value.clone());
            } else {
                diag.unknown_attribute("dfxml", None, key);
            }
        }
    }

    /// Reads one direct child of the `dfxml` root.
    pub(crate) fn read_child(&mut self, child: &Element, diag: &mut Diagnostics) -> Result<()> {
        match child.name.as_str() {
            "metadata" => {
                for item in &child.children {
                    match (item.namespace.as_deref(), item.text()) {
                        (Some(XMLNS_DC), Some(text)) => {
                            self.dc.insert(item.local_name().to_string(), text.to_string());
                        }
                        (Some(XMLNS_DC), None) => {}
                        _ => {
                            diag.unknown_element(
                                "metadata",
                                item.namespace.as_deref(),
                                item.local_name(),
                            );
                        }
                    }
                }
            }
            "creator" => self.read_creator(child, diag)?,
            "build_environment" => self.read_build_environment(child, diag)?,
            "source" => {
                for item in &child.children {
                    match (item.name.as_str(), item.text()) {
                        ("image_filename", Some(text)) => self.sources.push(text.to_string()),
                        ("image_filename", None) => {}
                        _ => {
                            diag.unknown_element(
                                "source",
                                item.namespace.as_deref(),
                                item.local_name(),
                            );
                        }
                    }
                }
            }
            "image_filename" => {
                if let Some(text) = child.text() {
                    self.sources.push(text.to_string());
                }
            }
            "delta:diff_file_ignores" => {
                for item in &child.children {
                    if let Some(text) = item.text() {
                        self.diff_file_ignores.insert(text.to_string());
                    }
                }
            }
            "volume" => self.append_volume(VolumeObject::from_element(child, diag)?),
            "fileobject" => self.append_file(FileObject::from_element(child, diag)?),
            "rusage" => {
                for item in &child.children {
                    self.rusage.push((
                        local_part(&item.name).to_string(),
                        item.text().unwrap_or_default().to_string(),
                    ));
                }
            }
            _ => {
                diag.unknown_element("dfxml", child.namespace.as_deref(), child.local_name());
            }
        }
        Ok(())
    }

    fn read_creator(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        for item in &el.children {
            match item.name.as_str() {
                "program" => self.program = item.text().map(str::to_string),
                "version" => self.program_version = item.text().map(str::to_string),
                "command_line" => self.command_line = item.text().map(str::to_string),
                "library" => self.add_creator_library(LibraryObject::from_element(item, diag)?),
                "build_environment" => self.read_build_environment(item, diag)?,
                "execution_environment" => {
                    for env in &item.children {
                        match env.name.as_str() {
                            "command_line" => self.command_line = env.text().map(str::to_string),
                            _ => {
                                diag.unknown_element(
                                    "execution_environment",
                                    env.namespace.as_deref(),
                                    env.local_name(),
                                );
                            }
                        }
                    }
                }
                _ => {
                    diag.unknown_element("creator", item.namespace.as_deref(), item.local_name());
                }
            }
        }
        Ok(())
    }

    fn read_build_environment(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        for item in &el.children {
            if item.name == "library" {
                self.add_build_library(LibraryObject::from_element(item, diag)?);
            } else {
                diag.unknown_element(
                    "build_environment",
                    item.namespace.as_deref(),
                    item.local_name(),
                );
            }
        }
        Ok(())
    }

    /// Serializes the root element with its attributes and header children
    /// only: no volumes, files or resource usage.
    pub fn to_partial_element(&self) -> Element {
        let mut el = Element::new("dfxml");
        el.set_attr("version", self.version.as_str());
        for (prefix, uri) in &self.namespaces {
            if prefix.is_empty() {
                el.set_attr("xmlns", uri.as_str());
            } else {
                el.set_attr(format!("xmlns:{prefix}"), uri.as_str());
            }
        }

        if !self.dc.is_empty() {
            let mut metadata = Element::new("metadata");
            for (key, value) in &self.dc {
                let mut item = Element::with_text(format!("dc:{key}"), value.as_str());
                item.namespace = Some(XMLNS_DC.to_string());
                metadata.push(item);
            }
            el.push(metadata);
        }

        let has_creator = self.program.is_some()
            || self.program_version.is_some()
            || self.command_line.is_some()
            || !self.creator_libraries.is_empty()
            || !self.build_libraries.is_empty();
        if has_creator {
            let mut creator = Element::new("creator");
            creator.set_attr("version", "1.0");
            if let Some(program) = Element::optional("program", self.program.as_deref()) {
                creator.push(program);
            }
            if let Some(version) = Element::optional("version", self.program_version.as_deref()) {
                creator.push(version);
            }
            if !self.build_libraries.is_empty() {
                let mut build = Element::new("build_environment");
                for lib in &self.build_libraries {
                    build.push(lib.to_element());
                }
                creator.push(build);
            }
            if let Some(cmd) = Element::optional("command_line", self.command_line.as_deref()) {
                let mut exec = Element::new("execution_environment");
                exec.push(cmd);
                creator.push(exec);
            }
            for lib in &self.creator_libraries {
                creator.push(lib.to_element());
            }
            el.push(creator);
        }

        if !self.sources.is_empty() {
            let mut source = Element::new("source");
            for image in &self.sources {
                source.push(Element::with_text("image_filename", image.as_str()));
            }
            el.push(source);
        }

        if !self.diff_file_ignores.is_empty() {
            let mut ignores = Element::new("delta:diff_file_ignores");
            for name in &self.diff_file_ignores {
                ignores.push(Element::with_text("delta:diff_file_ignore", name.as_str()));
            }
            el.push(ignores);
        }

        el
    }

    /// The trailing `rusage` element, if any records are present.
    pub fn rusage_element(&self) -> Option<Element> {
        if self.rusage.is_empty() {
            return None;
        }
        let mut el = Element::new("rusage");
        for (key, value) in &self.rusage {
            el.push(Element::with_text(key.as_str(), value.as_str()));
        }
        Some(el)
    }

    /// Serializes the whole document tree.
    pub fn to_element(&self) -> Element {
        let mut el = self.to_partial_element();
        for volume in &self.volumes {
            el.push(volume.to_element());
        }
        for file in &self.files {
            el.push(file.to_element());
        }
        if let Some(rusage) = self.rusage_element() {
            el.push(rusage);
        }
        el
    }
}

/// Documents are equal when their headers, namespaces and libraries match
/// and their volumes (each with its files) and top-level files are equal in
/// order.
impl PartialEq for DFXMLObject {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.program == other.program
            && self.program_version == other.program_version
            && self.command_line == other.command_line
            && self.sources == other.sources
            && self.dc == other.dc
            && self.namespaces == other.namespaces
            && self.creator_libraries == other.creator_libraries
            && self.build_libraries == other.build_libraries
            && self.rusage == other.rusage
            && self.diff_file_ignores == other.diff_file_ignores
            && self.volumes.len() == other.volumes.len()
            && self
                .volumes
                .iter()
                .zip(&other.volumes)
                .all(|(a, b)| a == b && a.files().eq(b.files()))
            && self.files == other.files
    }
}

/// An enum representing any child object in a DFXML document.
#[derive(Debug)]
pub enum DFXMLChild<'a> {
    /// A volume object
    Volume(&'a VolumeObject),
    /// A file object
    File(&'a FileObject),
}

/// Depth-first iterator over the volumes and files of a [`DFXMLObject`].
pub struct DFXMLIterator<'a> {
    volumes: std::slice::Iter<'a, VolumeObject>,
    volume_files: Option<Box<dyn Iterator<Item = &'a FileObject> + 'a>>,
    files: std::slice::Iter<'a, FileObject>,
}

impl<'a> DFXMLIterator<'a> {
    fn new(doc: &'a DFXMLObject) -> Self {
        Self {
            volumes: doc.volumes.iter(),
            volume_files: None,
            files: doc.files.iter(),
        }
    }
}

impl<'a> Iterator for DFXMLIterator<'a> {
    type Item = DFXMLChild<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(ref mut files) = self.volume_files {
            if let Some(f) = files.next() {
                return Some(DFXMLChild::File(f));
            }
            self.volume_files = None;
        }

        if let Some(v) = self.volumes.next() {
            self.volume_files = Some(Box::new(v.files()));
            return Some(DFXMLChild::Volume(v));
        }

        self.files.next().map(DFXMLChild::File)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dfxml_object_new() {
        let doc = DFXMLObject::new();
        assert_eq!(doc.version, DFXML_VERSION);
        assert!(doc.namespaces.contains_key(""));
        assert!(doc.namespaces.contains_key("dc"));
        assert!(doc.namespaces.contains_key("delta"));
    }

    #[test]
    fn test_dfxml_add_namespace() {
        let mut doc = DFXMLObject::new();
        doc.add_namespace("custom", "http://example.com/custom");
        doc.add_namespace("dc", "http://example.com/not-dc");

        let ns: BTreeMap<_, _> = doc.namespaces().collect();
        assert_eq!(ns.get("custom"), Some(&"http://example.com/custom"));
        assert_eq!(ns.get("dc"), Some(&XMLNS_DC));
    }

    #[test]
    fn test_library_relaxed_eq() {
        let lib1 = LibraryObject::new("test", "1.0");
        let lib2 = LibraryObject::new("test", "1.0");
        let lib3 = LibraryObject {
            name: Some("test".to_string()),
            version: None,
        };

        assert!(lib1.relaxed_eq(&lib2));
        assert!(lib1.relaxed_eq(&lib3));
        assert_ne!(lib1, lib3);
        assert!(!lib1.relaxed_eq(&LibraryObject::new("other", "1.0")));
    }

    #[test]
    fn test_dfxml_iteration_is_depth_first() {
        let mut doc = DFXMLObject::new();
        for (ftype, names) in [("ntfs", ["a", "b"]), ("fat", ["c", "d"])] {
            let mut vol = VolumeObject::with_ftype(ftype);
            for name in names {
                vol.append_file(FileObject::with_filename(name));
            }
            doc.append_volume(vol);
        }
        doc.append_file(FileObject::with_filename("e"));

        let labels: Vec<String> = doc
            .iter()
            .map(|child| match child {
                DFXMLChild::Volume(v) => v.ftype_str.clone().unwrap_or_default(),
                DFXMLChild::File(f) => f.filename.clone().unwrap_or_default(),
            })
            .collect();
        assert_eq!(labels, ["ntfs", "a", "b", "fat", "c", "d", "e"]);
        assert_eq!(doc.iter_files().count(), 5);
    }

    #[test]
    fn test_header_round_trip() {
        let mut doc = DFXMLObject::new();
        doc.program = Some("fiwalk".to_string());
        doc.program_version = Some("4.12".to_string());
        doc.command_line = Some("fiwalk -X out.xml image.raw".to_string());
        doc.sources.push("image.raw".to_string());
        doc.dc.insert("type".to_string(), "Disk image".to_string());
        doc.add_creator_library(LibraryObject::new("libewf", "20140608"));
        doc.add_build_library(LibraryObject::new("libtsk", "4.6.0"));
        doc.diff_file_ignores.insert("atime".to_string());
        doc.rusage.push(("utime".to_string(), "1.5".to_string()));
        doc.append_file(FileObject::with_filename("loose.txt"));

        let partial = doc.to_partial_element();
        let header: Vec<&str> = partial.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(header, ["metadata", "creator", "source", "delta:diff_file_ignores"]);

        let mut diag = Diagnostics::new();
        let back = DFXMLObject::from_element(&doc.to_element(), &mut diag).unwrap();
        assert_eq!(back.program, doc.program);
        assert_eq!(back.program_version, doc.program_version);
        assert_eq!(back.command_line, doc.command_line);
        assert_eq!(back.sources, doc.sources);
        assert_eq!(back.dc, doc.dc);
        assert_eq!(back.creator_libraries, doc.creator_libraries);
        assert_eq!(back.build_libraries, doc.build_libraries);
        assert_eq!(back.diff_file_ignores, doc.diff_file_ignores);
        assert_eq!(back.rusage, doc.rusage);
        assert_eq!(back.file_count(), 1);
        assert_eq!(back, doc);
        assert!(diag.is_empty());
    }

    #[test]
    fn test_document_equality() {
        let mut doc = DFXMLObject::new();
        let mut vol = VolumeObject::with_ftype("ntfs");
        vol.append_file(FileObject::with_filename("a"));
        doc.append_volume(vol);
        doc.append_file(FileObject::with_filename("b"));
        assert_eq!(doc, doc.clone());

        let mut other_files = doc.clone();
        other_files.volumes_mut().next().unwrap().append_file(FileObject::with_filename("c"));
        assert_ne!(other_files, doc);

        let mut other_ns = doc.clone();
        other_ns.add_namespace("custom", "urn:example");
        assert_ne!(other_ns, doc);

        let mut other_header = doc.clone();
        other_header.rusage.push(("utime".to_string(), "1".to_string()));
        assert_ne!(other_header, doc);
    }

    #[test]
    fn test_flat_header_layout() {
        let mut el = Element::new("dfxml");
        el.set_attr("version", "1.0");
        let mut creator = Element::new("creator");
        creator.push(Element::with_text("program", "walker"));
        creator.push(Element::with_text("command_line", "walker /data"));
        el.push(creator);
        let mut build = Element::new("build_environment");
        build.push(LibraryObject::new("rustc", "1.80").to_element());
        el.push(build);
        el.push(Element::with_text("image_filename", "disk.dd"));

        let mut diag = Diagnostics::new();
        let doc = DFXMLObject::from_element(&el, &mut diag).unwrap();
        assert_eq!(doc.version, "1.0");
        assert_eq!(doc.program.as_deref(), Some("walker"));
        assert_eq!(doc.command_line.as_deref(), Some("walker /data"));
        assert_eq!(doc.build_libraries().count(), 1);
        assert_eq!(doc.sources, ["disk.dd"]);
    }
}
