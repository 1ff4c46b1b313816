//! DFXML and RegXML writers.
//!
//! [`DFXMLWriter`] prints a document one object at a time: the root and
//! header first, then each volume followed by its files, then the files
//! outside any volume. Only a single file's element tree exists at any
//! moment. [`StreamWriter`] exposes the same protocol to producers that
//! discover files incrementally and never hold a whole document.
//!
//! # Example
//!
//! ```rust
//! use dfxml_objects::objects::{DFXMLObject, FileObject, HashType, VolumeObject};
//! use dfxml_objects::writer::DFXMLWriter;
//!
//! let mut doc = DFXMLObject::new();
//! doc.program = Some("my-tool".to_string());
//! doc.program_version = Some("1.0.0".to_string());
//!
//! let mut volume = VolumeObject::with_ftype("ntfs");
//! let mut file = FileObject::with_filename("test.txt");
//! file.filesize = Some(1024);
//! file.hashes.set(HashType::Md5, "d41d8cd98f00b204e9800998ecf8427e").unwrap();
//! volume.append_file(file);
//! doc.append_volume(volume);
//!
//! let xml = DFXMLWriter::new().write_to_string(&doc).unwrap();
//! println!("{}", xml);
//! ```

use crate::element::Element;
use crate::error::{Error, Result};
use crate::objects::{DFXMLObject, FileObject, RegXMLObject, VolumeObject};
use quick_xml::events::{BytesDecl, Event};
use quick_xml::Writer;
use std::io::Write;

/// Configuration options for the DFXML writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Whether to indent the output for readability
    pub indent: bool,
    /// Indentation string (default: two spaces)
    pub indent_string: String,
    /// Whether to include the XML declaration
    pub xml_declaration: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            indent: true,
            indent_string: "  ".to_string(),
            xml_declaration: true,
        }
    }
}

impl WriterConfig {
    /// Creates a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a compact configuration (no indentation).
    pub fn compact() -> Self {
        Self {
            indent: false,
            indent_string: String::new(),
            xml_declaration: true,
        }
    }

    /// Sets whether to indent the output.
    pub fn with_indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation string.
    pub fn with_indent_string(mut self, s: impl Into<String>) -> Self {
        self.indent_string = s.into();
        self
    }

    /// Sets whether the XML declaration is written.
    pub fn with_xml_declaration(mut self, enabled: bool) -> Self {
        self.xml_declaration = enabled;
        self
    }

    fn xml_writer<W: Write>(&self, inner: W) -> Writer<W> {
        if self.indent && !self.indent_string.is_empty() {
            let indent_char = self.indent_string.bytes().next().unwrap_or(b' ');
            Writer::new_with_indent(inner, indent_char, self.indent_string.len())
        } else {
            Writer::new(inner)
        }
    }

    fn write_declaration<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        if self.xml_declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
            if self.indent {
                writer.get_mut().write_all(b"\n")?;
            }
        }
        Ok(())
    }
}

/// Writes an element's opening tag followed by its current children.
///
/// The caller closes it with [`Element::write_close`] once the streamed
/// children are written.
fn write_partial<W: Write>(writer: &mut Writer<W>, el: &Element) -> Result<()> {
    el.write_open(writer)?;
    for child in &el.children {
        child.write_to(writer)?;
    }
    Ok(())
}

/// DFXML XML writer.
///
/// Serializes DFXML and RegXML documents object by object.
#[derive(Debug, Clone, Default)]
pub struct DFXMLWriter {
    config: WriterConfig,
}

impl DFXMLWriter {
    /// Creates a new writer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new writer with the specified configuration.
    pub fn with_config(config: WriterConfig) -> Self {
        Self { config }
    }

    /// Writes a DFXMLObject to a string.
    pub fn write_to_string(&self, doc: &DFXMLObject) -> Result<String> {
        let mut buffer = Vec::new();
        self.write(doc, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Utf8(e.utf8_error()))
    }

    /// Writes a DFXMLObject to any Write implementation.
    pub fn write<W: Write>(&self, doc: &DFXMLObject, writer: W) -> Result<()> {
        let mut stream = StreamWriter::with_config(writer, self.config.clone());
        stream.begin(doc)?;
        for volume in doc.volumes() {
            stream.begin_volume(volume)?;
            for file in volume.files() {
                stream.write_file(file)?;
            }
            stream.end_volume()?;
        }
        for file in doc.files() {
            stream.write_file(file)?;
        }
        stream.finish(doc)?;
        Ok(())
    }

    /// Writes a RegXMLObject to a string.
    pub fn write_regxml_to_string(&self, doc: &RegXMLObject) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_regxml(doc, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Utf8(e.utf8_error()))
    }

    /// Writes a RegXMLObject hive by hive.
    pub fn write_regxml<W: Write>(&self, doc: &RegXMLObject, writer: W) -> Result<()> {
        let mut xml_writer = self.config.xml_writer(writer);
        self.config.write_declaration(&mut xml_writer)?;

        let root = doc.to_partial_element();
        write_partial(&mut xml_writer, &root)?;
        for hive in doc.hives() {
            let hive_el = hive.to_partial_element();
            write_partial(&mut xml_writer, &hive_el)?;
            for cell in hive.cells() {
                cell.to_element().write_to(&mut xml_writer)?;
            }
            hive_el.write_close(&mut xml_writer)?;
        }
        root.write_close(&mut xml_writer)?;
        xml_writer.get_mut().flush()?;
        Ok(())
    }
}

/// Incremental DFXML printer.
///
/// Call [`begin`](Self::begin) once, then any sequence of
/// [`write_file`](Self::write_file) calls, optionally grouped between
/// [`begin_volume`](Self::begin_volume) and [`end_volume`](Self::end_volume),
/// then [`finish`](Self::finish).
pub struct StreamWriter<W: Write> {
    config: WriterConfig,
    writer: Writer<W>,
    root: Option<Element>,
    volume: Option<Element>,
}

impl<W: Write> StreamWriter<W> {
    /// Creates a stream writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, WriterConfig::default())
    }

    /// Creates a stream writer with the specified configuration.
    pub fn with_config(inner: W, config: WriterConfig) -> Self {
        let writer = config.xml_writer(inner);
        Self {
            config,
            writer,
            root: None,
            volume: None,
        }
    }

    /// Writes the declaration, the `dfxml` open tag and the document header.
    pub fn begin(&mut self, doc: &DFXMLObject) -> Result<()> {
        if self.root.is_some() {
            return Err(Error::MalformedStream("document already begun".to_string()));
        }
        self.config.write_declaration(&mut self.writer)?;
        let root = doc.to_partial_element();
        write_partial(&mut self.writer, &root)?;
        self.root = Some(root);
        Ok(())
    }

    /// Opens a volume and writes its header properties.
    pub fn begin_volume(&mut self, volume: &VolumeObject) -> Result<()> {
        if self.root.is_none() {
            return Err(Error::MalformedStream("volume before document start".to_string()));
        }
        if self.volume.is_some() {
            return Err(Error::MalformedStream("volume already open".to_string()));
        }
        let el = volume.to_partial_element();
        write_partial(&mut self.writer, &el)?;
        self.volume = Some(el);
        Ok(())
    }

    /// Writes one complete file object.
    pub fn write_file(&mut self, file: &FileObject) -> Result<()> {
        if self.root.is_none() {
            return Err(Error::MalformedStream("file before document start".to_string()));
        }
        file.to_element().write_to(&mut self.writer)
    }

    /// Closes the open volume.
    pub fn end_volume(&mut self) -> Result<()> {
        let el = self
            .volume
            .take()
            .ok_or_else(|| Error::MalformedStream("no volume open".to_string()))?;
        el.write_close(&mut self.writer)
    }

    /// Writes the document's trailing resource usage, closes the root and
    /// returns the underlying writer.
    pub fn finish(mut self, doc: &DFXMLObject) -> Result<W> {
        if self.volume.is_some() {
            self.end_volume()?;
        }
        let root = self
            .root
            .take()
            .ok_or_else(|| Error::MalformedStream("document never begun".to_string()))?;
        if let Some(rusage) = doc.rusage_element() {
            rusage.write_to(&mut self.writer)?;
        }
        root.write_close(&mut self.writer)?;
        let mut inner = self.writer.into_inner();
        inner.flush()?;
        Ok(inner)
    }
}

/// Convenience function to write a DFXMLObject to a string.
pub fn to_string(doc: &DFXMLObject) -> Result<String> {
    DFXMLWriter::new().write_to_string(doc)
}

/// Convenience function to write a DFXMLObject to a string without indentation.
pub fn to_string_compact(doc: &DFXMLObject) -> Result<String> {
    DFXMLWriter::with_config(WriterConfig::compact()).write_to_string(doc)
}

/// Convenience function to write a DFXMLObject to a writer.
pub fn write<W: Write>(doc: &DFXMLObject, writer: W) -> Result<()> {
    DFXMLWriter::new().write(doc, writer)
}

fn materialize(el: &Element, config: &WriterConfig) -> Result<String> {
    let mut xml_writer = config.xml_writer(Vec::new());
    config.write_declaration(&mut xml_writer)?;
    el.write_to(&mut xml_writer)?;
    String::from_utf8(xml_writer.into_inner()).map_err(|e| Error::Utf8(e.utf8_error()))
}

/// Builds the whole DFXML tree in memory and prints it.
pub fn to_dfxml(doc: &DFXMLObject, config: &WriterConfig) -> Result<String> {
    materialize(&doc.to_element(), config)
}

/// Builds the whole RegXML tree in memory and prints it.
pub fn to_regxml(doc: &RegXMLObject, config: &WriterConfig) -> Result<String> {
    materialize(&doc.to_element(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{
        ByteRun, ByteRuns, CellObject, HashType, HiveObject, TimestampName, TimestampObject,
    };

    fn sample() -> DFXMLObject {
        let mut doc = DFXMLObject::new();
        doc.program = Some("test".to_string());

        let mut vol = VolumeObject::with_ftype("ntfs");
        vol.block_size = Some(4096);

        let mut file = FileObject::with_filename("test.txt");
        file.filesize = Some(1024);
        file.hashes
            .set(HashType::Md5, "d41d8cd98f00b204e9800998ecf8427e")
            .unwrap();

        let mut brs = ByteRuns::new();
        brs.push(ByteRun::with_img_offset(0, 512));
        brs.push(ByteRun::with_img_offset(8192, 512));
        file.set_byte_runs(brs);

        vol.append_file(file);
        doc.append_volume(vol);
        doc.append_file(FileObject::with_filename("loose.bin"));
        doc.rusage.push(("maxrss".to_string(), "2048".to_string()));
        doc
    }

    #[test]
    fn test_write_simple_dfxml() {
        let mut doc = DFXMLObject::new();
        doc.program = Some("test-program".to_string());
        doc.program_version = Some("1.0.0".to_string());

        let xml = to_string(&doc).unwrap();

        assert!(xml.contains("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<dfxml"));
        assert!(xml.contains("xmlns="));
        assert!(xml.contains("xmlns:delta="));
        assert!(xml.contains("<program>test-program</program>"));
        assert!(xml.contains("<version>1.0.0</version>"));
        assert!(xml.contains("</dfxml>"));
    }

    #[test]
    fn test_write_with_volume_and_file() {
        let xml = to_string(&sample()).unwrap();

        assert!(xml.contains("<volume>"));
        assert!(xml.contains("<ftype_str>ntfs</ftype_str>"));
        assert!(xml.contains("<block_size>4096</block_size>"));
        assert!(xml.contains("<filename>test.txt</filename>"));
        assert!(xml.contains("<hashdigest type=\"md5\">"));
        assert!(xml.contains("img_offset=\"8192\""));

        let volume_end = xml.find("</volume>").unwrap();
        let loose = xml.find("loose.bin").unwrap();
        let rusage = xml.find("<rusage>").unwrap();
        assert!(volume_end < loose && loose < rusage);
    }

    #[test]
    fn test_write_compact() {
        let xml = to_string_compact(&sample()).unwrap();
        let content_start = xml.find("<dfxml").unwrap();
        assert!(!xml[content_start..].contains('\n'));
    }

    #[test]
    fn test_streaming_matches_materialized() {
        let doc = sample();
        let config = WriterConfig::compact();
        let streamed = DFXMLWriter::with_config(config.clone())
            .write_to_string(&doc)
            .unwrap();
        let whole = to_dfxml(&doc, &config).unwrap();
        assert_eq!(streamed, whole);
    }

    #[test]
    fn test_stream_writer_protocol() {
        let mut doc = DFXMLObject::new();
        doc.program = Some("walker".to_string());

        let mut stream = StreamWriter::with_config(Vec::new(), WriterConfig::compact());
        assert!(stream.end_volume().is_err());
        stream.begin(&doc).unwrap();
        stream.begin_volume(&VolumeObject::with_ftype("ext4")).unwrap();
        assert!(stream.begin_volume(&VolumeObject::new()).is_err());
        stream.write_file(&FileObject::with_filename("a")).unwrap();
        stream.end_volume().unwrap();
        stream.write_file(&FileObject::with_filename("b")).unwrap();
        doc.rusage.push(("utime".to_string(), "1".to_string()));
        let bytes = stream.finish(&doc).unwrap();

        let parsed = crate::reader::parse(bytes.as_slice()).unwrap();
        assert_eq!(parsed.volume_count(), 1);
        assert_eq!(parsed.file_count(), 1);
        assert_eq!(parsed.iter_files().count(), 2);
        assert_eq!(parsed.rusage.len(), 1);
    }

    #[test]
    fn test_roundtrip() {
        let mut doc = sample();
        let file = doc.files_mut().next().unwrap();
        file.set_timestamp(
            TimestampName::Crtime,
            TimestampObject::parse(TimestampName::Crtime, "2024-01-15T10:30:00.25Z").unwrap(),
        );

        let xml = to_string(&doc).unwrap();
        let parsed = crate::reader::parse(xml.as_bytes()).unwrap();

        assert_eq!(parsed.program, doc.program);
        let original: Vec<&FileObject> = doc.iter_files().collect();
        let back: Vec<&FileObject> = parsed.iter_files().collect();
        assert_eq!(original, back);
        assert_eq!(
            parsed.volumes().next().unwrap(),
            doc.volumes().next().unwrap()
        );
        assert!(xml.contains("2024-01-15T10:30:00.25Z"));
    }

    #[test]
    fn test_document_round_trip_is_equal() {
        let mut doc = sample();
        doc.sources.push("image.raw".to_string());
        doc.dc.insert("type".to_string(), "Disk image".to_string());
        doc.diff_file_ignores.insert("atime".to_string());

        for xml in [to_string(&doc).unwrap(), to_string_compact(&doc).unwrap()] {
            let parsed = crate::reader::parse(xml.as_bytes()).unwrap();
            assert_eq!(parsed, doc);
        }
    }

    #[test]
    fn test_text_survives_untrimmed() {
        let mut doc = DFXMLObject::new();
        doc.append_file(FileObject::with_filename(" a.txt "));
        doc.append_file(FileObject::with_filename(""));
        let mut padded = FileObject::with_filename("b");
        padded.link_target = Some("\n  target\n".to_string());
        doc.append_file(padded);
        doc.append_file(FileObject::new());

        let xml = to_string(&doc).unwrap();
        let parsed = crate::reader::parse(xml.as_bytes()).unwrap();
        let names: Vec<Option<&str>> = parsed.files().map(|f| f.filename.as_deref()).collect();
        assert_eq!(names, [Some(" a.txt "), Some(""), Some("b"), None]);
        assert_eq!(
            parsed.files().nth(2).unwrap().link_target.as_deref(),
            Some("\n  target\n")
        );
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_diff_annotations_survive_round_trip() {
        let mut original = FileObject::with_filename("report.doc");
        original.filesize = Some(10);
        let mut file = original.clone();
        file.filesize = Some(20);
        file.mtime = None;
        file.original_fileobject = Some(Box::new(original));
        file.annos.insert(crate::objects::Annotation::Modified);
        file.compare_to_original();

        let mut doc = DFXMLObject::new();
        doc.append_file(file.clone());
        let xml = to_string(&doc).unwrap();
        assert!(xml.contains("delta:modified_file=\"1\""));
        assert!(xml.contains("delta:changed_property=\"1\""));

        let parsed = crate::reader::parse(xml.as_bytes()).unwrap();
        let back = parsed.files().next().unwrap();
        assert_eq!(back.diffs, file.diffs);
        assert_eq!(back.annos, file.annos);
        assert_eq!(back.original_fileobject, file.original_fileobject);
    }

    #[test]
    fn test_regxml_writers_agree() {
        let mut doc = RegXMLObject::new();
        let mut hive = HiveObject::with_filename("SYSTEM");
        hive.append_cell(CellObject::key("\\Select"));
        doc.append_hive(hive);

        let config = WriterConfig::compact();
        let streamed = DFXMLWriter::with_config(config.clone())
            .write_regxml_to_string(&doc)
            .unwrap();
        assert_eq!(streamed, to_regxml(&doc, &config).unwrap());

        let parsed = crate::reader::parse_regxml(streamed.as_bytes()).unwrap();
        assert_eq!(parsed.iter_cells().count(), 1);
        assert_eq!(parsed, doc);

        let pretty = to_regxml(&doc, &WriterConfig::default()).unwrap();
        assert_eq!(crate::reader::parse_regxml(pretty.as_bytes()).unwrap(), doc);
    }
}
