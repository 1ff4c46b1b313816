//! RegXML objects: Windows registry hives and the cells (keys and values)
//! found in them.

use crate::casts::bool_cast;
use crate::diagnostics::Diagnostics;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::objects::byte_run::ByteRuns;
use crate::objects::common::{
    TimestampName, TimestampObject, CHANGED_PROPERTY, REGXML_VERSION, XMLNS_DELTA, XMLNS_REGXML,
};
use crate::objects::delta::{
    is_absent_marker, is_marked_changed, write_annotations, Annotation, DiffMarker,
};
use crate::objects::fileobject::FileObject;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Root tags a cell may be read from.
const CELL_ROOTS: [&str; 3] = ["cellobject", "delta:original_cellobject", "parent_object"];

/// Root tags a hive may be read from.
const HIVE_ROOTS: [&str; 2] = ["hive", "delta:original_hive"];

/// Whether a cell is a registry key or a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellNameType {
    /// Registry key (`k`)
    Key,
    /// Registry value (`v`)
    Value,
}

impl CellNameType {
    /// Returns the single-character string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CellNameType::Key => "k",
            CellNameType::Value => "v",
        }
    }
}

impl FromStr for CellNameType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "k" => Ok(CellNameType::Key),
            "v" => Ok(CellNameType::Value),
            other => Err(Error::InvalidNameType(other.to_string())),
        }
    }
}

impl fmt::Display for CellNameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registry key or value.
///
/// Only keys may carry an `mtime` or be the hive root; the setters reject
/// any assignment that would break this. A value may say `root` is false.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellObject {
    /// Sparse record of the enclosing key
    pub parent_object: Option<Box<CellObject>>,
    /// Full path of the cell within the hive
    pub cellpath: Option<String>,
    /// Key or value name
    pub name: Option<String>,
    name_type: Option<CellNameType>,
    /// Cell is allocated
    pub alloc: Option<bool>,
    mtime: Option<TimestampObject>,
    root: Option<bool>,
    /// Registry data type (`REG_SZ`, `REG_DWORD`, ...)
    pub data_type: Option<String>,
    /// Value data as text
    pub data: Option<String>,
    /// Location of the cell in the hive file
    pub byte_runs: Option<ByteRuns>,
    /// Error encountered while reading the cell
    pub error: Option<String>,

    /// Baseline copy of this cell from an earlier scan
    pub original_cellobject: Option<Box<CellObject>>,
    /// Whole-cell differential annotations
    pub annos: BTreeSet<Annotation>,
    /// Properties that differ from `original_cellobject`
    pub diffs: BTreeSet<String>,
}

impl CellObject {
    /// Creates a new empty CellObject.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a key cell at the given path.
    pub fn key(cellpath: impl Into<String>) -> Self {
        Self {
            cellpath: Some(cellpath.into()),
            name_type: Some(CellNameType::Key),
            ..Default::default()
        }
    }

    /// Creates a value cell at the given path.
    pub fn value(cellpath: impl Into<String>) -> Self {
        Self {
            cellpath: Some(cellpath.into()),
            name_type: Some(CellNameType::Value),
            ..Default::default()
        }
    }

    /// Key or value.
    pub fn name_type(&self) -> Option<CellNameType> {
        self.name_type
    }

    /// Last-written time (keys only).
    pub fn mtime(&self) -> Option<&TimestampObject> {
        self.mtime.as_ref()
    }

    /// Hive root flag (keys only).
    pub fn root(&self) -> Option<bool> {
        self.root
    }

    fn is_value(&self) -> bool {
        self.name_type == Some(CellNameType::Value)
    }

    /// Sets the name type; a value may not already carry a time or be the root.
    pub fn set_name_type(&mut self, name_type: Option<CellNameType>) -> Result<()> {
        if name_type == Some(CellNameType::Value)
            && (self.mtime.is_some() || self.root == Some(true))
        {
            return Err(Error::InvalidCell(
                "a value cell cannot carry mtime or root".to_string(),
            ));
        }
        self.name_type = name_type;
        Ok(())
    }

    /// Sets the last-written time.
    pub fn set_mtime(&mut self, mtime: Option<TimestampObject>) -> Result<()> {
        if mtime.is_some() && self.is_value() {
            return Err(Error::InvalidCell("only a key cell may carry mtime".to_string()));
        }
        self.mtime = mtime.map(|mut ts| {
            ts.name = Some(TimestampName::Mtime);
            ts
        });
        Ok(())
    }

    /// Sets the root flag.
    pub fn set_root(&mut self, root: Option<bool>) -> Result<()> {
        if root == Some(true) && self.is_value() {
            return Err(Error::InvalidCell("only a key cell may be the root".to_string()));
        }
        self.root = root;
        Ok(())
    }

    /// Sets a scalar property from text.
    ///
    /// Returns `Ok(false)` for names that are not scalar cell properties.
    pub fn set_property(&mut self, name: &str, value: Option<&str>) -> Result<bool> {
        match name {
            "cellpath" => self.cellpath = value.map(str::to_string),
            "name" => self.name = value.map(str::to_string),
            "data_type" => self.data_type = value.map(str::to_string),
            "data" => self.data = value.map(str::to_string),
            "error" => self.error = value.map(str::to_string),
            "alloc" => self.alloc = bool_cast(value)?,
            "root" => self.set_root(bool_cast(value)?)?,
            "name_type" => self.set_name_type(value.map(str::parse).transpose()?)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Returns the set of property names whose values differ.
    pub fn compare_to_other(&self, other: &CellObject, ignore_original: bool) -> BTreeSet<String> {
        let mut diffs = BTreeSet::new();

        macro_rules! compare_field {
            ($field:ident) => {
                if self.$field != other.$field {
                    diffs.insert(stringify!($field).to_string());
                }
            };
        }

        compare_field!(cellpath);
        compare_field!(name);
        compare_field!(name_type);
        compare_field!(alloc);
        compare_field!(mtime);
        compare_field!(root);
        compare_field!(data_type);
        compare_field!(data);
        compare_field!(byte_runs);
        compare_field!(error);

        if !ignore_original && self.original_cellobject != other.original_cellobject {
            diffs.insert("original_cellobject".to_string());
        }
        diffs
    }

    /// Recomputes `diffs` against `original_cellobject`.
    pub fn compare_to_original(&mut self) {
        self.diffs = match self.original_cellobject {
            Some(ref original) => self.compare_to_other(original, true),
            None => BTreeSet::new(),
        };
    }

    /// Populates from a `cellobject` element or one of its aliases.
    pub fn populate_from_element(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        if !CELL_ROOTS.contains(&el.name.as_str()) {
            return Err(Error::UnexpectedElement(el.name.clone()));
        }

        for (key, value) in &el.attributes {
            if key == CHANGED_PROPERTY {
                continue;
            }
            if let Some(anno) = Annotation::from_attr(key, "cell") {
                self.annos.insert(anno);
            } else if key == "root" {
                self.set_root(bool_cast(Some(value))?)?;
            } else {
                diag.unknown_attribute("cellobject", None, key);
            }
        }

        for child in &el.children {
            let property = match child.name.as_str() {
                "parent_object" => {
                    self.parent_object = Some(Box::new(CellObject::from_element(child, diag)?));
                    "parent_object"
                }
                "delta:original_cellobject" => {
                    self.original_cellobject =
                        Some(Box::new(CellObject::from_element(child, diag)?));
                    "original_cellobject"
                }
                "mtime" => {
                    let ts = TimestampObject::from_element(child, diag)?;
                    self.set_mtime(if ts.is_empty() { None } else { Some(ts) })?;
                    "mtime"
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
                name => {
                    if !self.set_property(name, child.text())? {
                        diag.unknown_element(
                            "cellobject",
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

    /// Builds a cell from a `cellobject` element.
    pub fn from_element(el: &Element, diag: &mut Diagnostics) -> Result<Self> {
        let mut cell = Self::new();
        cell.populate_from_element(el, diag)?;
        Ok(cell)
    }

    /// Serializes as a `cellobject` element in schema order.
    pub fn to_element(&self) -> Element {
        self.to_element_named("cellobject")
    }

    fn to_element_named(&self, root: &str) -> Element {
        let mut el = Element::new(root);
        write_annotations(&mut el, &self.annos, "cell");

        let mut marker = DiffMarker::new("cellobject", &self.diffs);
        marker.emit(
            &mut el,
            "parent_object",
            self.parent_object.as_ref().map(|p| p.to_element_named("parent_object")),
        );
        marker.emit(&mut el, "cellpath", Element::optional("cellpath", self.cellpath.as_deref()));
        marker.emit(&mut el, "name", Element::optional("name", self.name.as_deref()));
        marker.emit(&mut el, "name_type", Element::optional("name_type", self.name_type));
        marker.emit(&mut el, "alloc", Element::flag("alloc", self.alloc));
        marker.emit(
            &mut el,
            "mtime",
            self.mtime.as_ref().map(|t| t.to_element_named(TimestampName::Mtime)),
        );
        marker.emit(&mut el, "root", Element::flag("root", self.root));
        marker.emit(
            &mut el,
            "data_type",
            Element::optional("data_type", self.data_type.as_deref()),
        );
        marker.emit(&mut el, "data", Element::optional("data", self.data.as_deref()));
        marker.emit_with(
            &mut el,
            "byte_runs",
            self.byte_runs.as_ref().map(ByteRuns::to_element),
            || Element::new("byte_runs"),
        );
        marker.emit(&mut el, "error", Element::optional("error", self.error.as_deref()));
        if let Some(ref original) = self.original_cellobject {
            el.push(original.to_element_named("delta:original_cellobject"));
        }
        marker.skip("original_cellobject");
        marker.finish();
        el
    }
}

impl PartialEq for CellObject {
    fn eq(&self, other: &Self) -> bool {
        self.compare_to_other(other, true).is_empty()
    }
}

/// A registry hive file and its cells.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HiveObject {
    /// Hive file name
    pub filename: Option<String>,
    /// Hive header last-written time
    pub mtime: Option<TimestampObject>,
    /// File record of the hive file itself
    pub original_fileobject: Option<Box<FileObject>>,
    /// Baseline header of this hive from an earlier scan
    pub original_hive: Option<Box<HiveObject>>,
    /// Whole-hive differential annotations
    pub annos: BTreeSet<Annotation>,
    /// Header properties that differ from `original_hive`
    pub diffs: BTreeSet<String>,
    cells: Vec<CellObject>,
}

impl HiveObject {
    /// Creates a new empty HiveObject.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a hive for the given file name.
    pub fn with_filename(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..Default::default()
        }
    }

    /// Appends a cell.
    pub fn append_cell(&mut self, cell: CellObject) {
        self.cells.push(cell);
    }

    /// Cells in document order.
    pub fn cells(&self) -> impl Iterator<Item = &CellObject> {
        self.cells.iter()
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Returns the set of header property names whose values differ.
    /// Cells are not compared.
    pub fn compare_to_other(&self, other: &HiveObject, ignore_original: bool) -> BTreeSet<String> {
        let mut diffs = BTreeSet::new();
        if self.filename != other.filename {
            diffs.insert("filename".to_string());
        }
        if self.mtime != other.mtime {
            diffs.insert("mtime".to_string());
        }
        if self.original_fileobject != other.original_fileobject {
            diffs.insert("original_fileobject".to_string());
        }
        if !ignore_original && self.original_hive != other.original_hive {
            diffs.insert("original_hive".to_string());
        }
        diffs
    }

    /// Recomputes `diffs` against `original_hive`.
    pub fn compare_to_original(&mut self) {
        self.diffs = match self.original_hive {
            Some(ref original) => self.compare_to_other(original, true),
            None => BTreeSet::new(),
        };
    }

    /// Populates from a `hive` element, cells included.
    pub fn populate_from_element(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        if !HIVE_ROOTS.contains(&el.name.as_str()) {
            return Err(Error::UnexpectedElement(el.name.clone()));
        }
        for (key, _) in &el.attributes {
            if key == CHANGED_PROPERTY {
                continue;
            }
            match Annotation::from_attr(key, "hive") {
                Some(anno) => {
                    self.annos.insert(anno);
                }
                None => {
                    diag.unknown_attribute("hive", None, key);
                }
            }
        }
        for child in &el.children {
            let property = match child.name.as_str() {
                "filename" => {
                    self.filename = child.text().map(str::to_string);
                    "filename"
                }
                "mtime" => {
                    let ts = TimestampObject::from_element(child, diag)?;
                    self.mtime = if ts.is_empty() { None } else { Some(ts) };
                    "mtime"
                }
                "delta:original_fileobject" => {
                    self.original_fileobject = if is_absent_marker(child) {
                        None
                    } else {
                        Some(Box::new(FileObject::from_element(child, diag)?))
                    };
                    "original_fileobject"
                }
                "delta:original_hive" => {
                    self.original_hive = Some(Box::new(HiveObject::from_element(child, diag)?));
                    "original_hive"
                }
                "cellobject" => {
                    self.append_cell(CellObject::from_element(child, diag)?);
                    continue;
                }
                _ => {
                    diag.unknown_element("hive", child.namespace.as_deref(), child.local_name());
                    continue;
                }
            };
            if is_marked_changed(child) {
                self.diffs.insert(property.to_string());
            }
        }
        Ok(())
    }

    /// Builds a hive from a `hive` element.
    pub fn from_element(el: &Element, diag: &mut Diagnostics) -> Result<Self> {
        let mut hive = Self::new();
        hive.populate_from_element(el, diag)?;
        Ok(hive)
    }

    /// Serializes the hive header without its cells.
    pub fn to_partial_element(&self) -> Element {
        self.partial_element_named("hive")
    }

    fn partial_element_named(&self, root: &str) -> Element {
        let mut el = Element::new(root);
        write_annotations(&mut el, &self.annos, "hive");

        let mut marker = DiffMarker::new("hive", &self.diffs);
        marker.emit(&mut el, "filename", Element::optional("filename", self.filename.as_deref()));
        marker.emit(
            &mut el,
            "mtime",
            self.mtime.as_ref().map(|t| t.to_element_named(TimestampName::Mtime)),
        );
        marker.emit_with(
            &mut el,
            "original_fileobject",
            self.original_fileobject
                .as_ref()
                .map(|f| f.to_element_named("delta:original_fileobject")),
            || Element::new("delta:original_fileobject"),
        );
        if let Some(ref original) = self.original_hive {
            el.push(original.partial_element_named("delta:original_hive"));
        }
        marker.skip("original_hive");
        marker.finish();
        el
    }

    /// Serializes the whole hive.
    pub fn to_element(&self) -> Element {
        let mut el = self.to_partial_element();
        for cell in &self.cells {
            el.push(cell.to_element());
        }
        el
    }
}

impl PartialEq for HiveObject {
    fn eq(&self, other: &Self) -> bool {
        self.compare_to_other(other, true).is_empty() && self.cells == other.cells
    }
}

/// The root RegXML document.
///
/// Two documents are equal when their headers match and their hives are
/// pairwise equal in order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegXMLObject {
    /// RegXML schema version
    pub version: String,
    /// Program that created this document
    pub program: Option<String>,
    /// Version of the creating program
    pub program_version: Option<String>,
    /// Command line used to create this document
    pub command_line: Option<String>,
    /// Source image filenames
    pub sources: Vec<String>,
    hives: Vec<HiveObject>,
}

impl Default for RegXMLObject {
    fn default() -> Self {
        Self {
            version: REGXML_VERSION.to_string(),
            program: None,
            program_version: None,
            command_line: None,
            sources: Vec::new(),
            hives: Vec::new(),
        }
    }
}

impl RegXMLObject {
    /// Creates an empty document at the current schema version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hive.
    pub fn append_hive(&mut self, hive: HiveObject) {
        self.hives.push(hive);
    }

    /// Hives in document order.
    pub fn hives(&self) -> impl Iterator<Item = &HiveObject> {
        self.hives.iter()
    }

    /// Every cell of every hive, in document order.
    pub fn iter_cells(&self) -> impl Iterator<Item = &CellObject> {
        self.hives.iter().flat_map(HiveObject::cells)
    }

    /// Populates from a `regxml` element.
    pub fn populate_from_element(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        if el.name != "regxml" {
            return Err(Error::UnexpectedElement(el.name.clone()));
        }
        for (key, value) in &el.attributes {
            if key == "version" {
                self.version = value.clone();
            } else if key != "xmlns" && !key.starts_with("xmlns:") {
                diag.unknown_attribute("regxml", None, key);
            }
        }
        for child in &el.children {
            match child.name.as_str() {
                "creator" => {
                    for item in &child.children {
                        match item.name.as_str() {
                            "program" => self.program = item.text().map(str::to_string),
                            "version" => self.program_version = item.text().map(str::to_string),
                            "execution_environment" => {
                                self.command_line = item
                                    .child("command_line")
                                    .and_then(Element::text)
                                    .map(str::to_string);
                            }
                            _ => {
                                diag.unknown_element(
                                    "creator",
                                    item.namespace.as_deref(),
                                    item.local_name(),
                                );
                            }
                        }
                    }
                }
                "source" => {
                    self.sources.extend(
                        child
                            .children
                            .iter()
                            .filter(|c| c.name == "image_filename")
                            .filter_map(|c| c.text().map(str::to_string)),
                    );
                }
                "hive" => self.append_hive(HiveObject::from_element(child, diag)?),
                _ => {
                    diag.unknown_element("regxml", child.namespace.as_deref(), child.local_name());
                }
            }
        }
        Ok(())
    }

    /// Builds a document from a `regxml` element.
    pub fn from_element(el: &Element, diag: &mut Diagnostics) -> Result<Self> {
        let mut doc = Self::new();
        doc.populate_from_element(el, diag)?;
        Ok(doc)
    }

    /// Serializes the root with its header children only.
    pub fn to_partial_element(&self) -> Element {
        let mut el = Element::new("regxml");
        el.set_attr("version", self.version.as_str());
        el.set_attr("xmlns", XMLNS_REGXML);
        el.set_attr("xmlns:delta", XMLNS_DELTA);

        if self.program.is_some() || self.program_version.is_some() || self.command_line.is_some() {
            let mut creator = Element::new("creator");
            if let Some(program) = Element::optional("program", self.program.as_deref()) {
                creator.push(program);
            }
            if let Some(version) = Element::optional("version", self.program_version.as_deref()) {
                creator.push(version);
            }
            if let Some(cmd) = Element::optional("command_line", self.command_line.as_deref()) {
                let mut exec = Element::new("execution_environment");
                exec.push(cmd);
                creator.push(exec);
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
        el
    }

    /// Serializes the whole document.
    pub fn to_element(&self) -> Element {
        let mut el = self.to_partial_element();
        for hive in &self.hives {
            el.push(hive.to_element());
        }
        el
    }
}
