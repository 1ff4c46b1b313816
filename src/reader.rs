//! DFXML streaming reader.
//!
//! Parsing happens in two layers. [`TokenReader`] turns `quick-xml` events
//! into owned [`Token`]s with canonical names. [`StreamMachine`] consumes
//! tokens and emits an [`Event`] as soon as an object is complete, so a
//! document with millions of files never sits in memory at once.
//!
//! # Example
//!
//! ```rust,no_run
//! use dfxml_objects::reader::{DFXMLReader, Event};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = File::open("forensic_output.xml").unwrap();
//! let reader = DFXMLReader::from_reader(BufReader::new(file));
//!
//! for result in reader {
//!     match result {
//!         Ok(Event::FileObject(file)) => {
//!             println!("File: {:?}", file.filename);
//!         }
//!         Ok(Event::VolumeStart(vol)) => {
//!             println!("Volume: {:?}", vol.ftype_str);
//!         }
//!         Ok(_) => {}
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```

use crate::diagnostics::Diagnostics;
use crate::element::{canonical_name, Element, ElementStack};
use crate::error::{Error, Result};
use crate::objects::{DFXMLObject, FileObject, RegXMLObject, VolumeObject};
use quick_xml::events::BytesStart;
use quick_xml::events::Event as XmlEvent;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::io::{self, BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::str;
use std::sync::Arc;
use tracing::debug;

/// An owned XML token with canonical names (see [`crate::element`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Opening tag; self-closing tags produce a `Start` then an `End`
    Start {
        /// Canonical qualified name
        name: String,
        /// Namespace URI outside the default namespaces
        namespace: Option<String>,
        /// Attributes; `xmlns` declarations are kept verbatim
        attributes: Vec<(String, String)>,
    },
    /// Closing tag
    End {
        /// Canonical qualified name
        name: String,
    },
    /// Unescaped character data, untrimmed
    ///
    /// An element written as an open and close tag with nothing between
    /// them yields an empty `Text`; a self-closing one yields none.
    Text(String),
}

impl Token {
    /// Convenience constructor for an opening tag without attributes.
    pub fn start(name: impl Into<String>) -> Self {
        Token::Start {
            name: name.into(),
            namespace: None,
            attributes: Vec::new(),
        }
    }

    /// Convenience constructor for a closing tag.
    pub fn end(name: impl Into<String>) -> Self {
        Token::End { name: name.into() }
    }
}

/// Reads [`Token`]s from XML text.
pub struct TokenReader<R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    pending_end: Option<String>,
    just_opened: bool,
}

impl<R: BufRead> TokenReader<R> {
    /// Creates a token reader over a buffered source.
    pub fn new(reader: R) -> Self {
        let mut xml_reader = NsReader::from_reader(reader);
        xml_reader.config_mut().trim_text(false);
        Self {
            reader: xml_reader,
            buf: Vec::with_capacity(4096),
            pending_end: None,
            just_opened: false,
        }
    }

    /// Returns the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(Token::End { name }));
        }

        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf)?;
            match event {
                XmlEvent::Start(ref e) => {
                    self.just_opened = true;
                    return Ok(Some(Self::start_token(&self.reader, e)?));
                }
                XmlEvent::Empty(ref e) => {
                    self.just_opened = false;
                    let token = Self::start_token(&self.reader, e)?;
                    if let Token::Start { ref name, .. } = token {
                        self.pending_end = Some(name.clone());
                    }
                    return Ok(Some(token));
                }
                XmlEvent::End(ref e) => {
                    let (ns, local) = self.reader.resolve_element(e.name());
                    let namespace = resolved_uri(ns)?;
                    let local = str::from_utf8(local.as_ref())?;
                    let (name, _) = canonical_name(namespace.as_deref(), local);
                    if std::mem::take(&mut self.just_opened) {
                        self.pending_end = Some(name);
                        return Ok(Some(Token::Text(String::new())));
                    }
                    return Ok(Some(Token::End { name }));
                }
                XmlEvent::Text(ref e) => {
                    self.just_opened = false;
                    let text = e.unescape()?;
                    return Ok(Some(Token::Text(text.into_owned())));
                }
                XmlEvent::CData(ref e) => {
                    self.just_opened = false;
                    let text = str::from_utf8(e.as_ref())?;
                    return Ok(Some(Token::Text(text.to_string())));
                }
                XmlEvent::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    /// The underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        self.reader.get_mut()
    }

    fn start_token(reader: &NsReader<R>, e: &BytesStart<'_>) -> Result<Token> {
        let (ns, local) = reader.resolve_element(e.name());
        let namespace = resolved_uri(ns)?;
        let local = str::from_utf8(local.as_ref())?;
        let (name, namespace) = canonical_name(namespace.as_deref(), local);

        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?.into_owned();
            let raw_key = str::from_utf8(attr.key.as_ref())?;
            if raw_key == "xmlns" || raw_key.starts_with("xmlns:") {
                attributes.push((raw_key.to_string(), value));
                continue;
            }
            let (ns, local) = reader.resolve_attribute(attr.key);
            let ns = resolved_uri(ns)?;
            let local = str::from_utf8(local.as_ref())?;
            attributes.push((canonical_name(ns.as_deref(), local).0, value));
        }

        Ok(Token::Start {
            name,
            namespace,
            attributes,
        })
    }
}

fn resolved_uri(ns: ResolveResult<'_>) -> Result<Option<String>> {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => Ok(Some(str::from_utf8(uri)?.to_string())),
        _ => Ok(None),
    }
}

/// Reads a whole document into an [`Element`] tree.
pub fn read_element<R: BufRead>(reader: R) -> Result<Element> {
    let mut tokens = TokenReader::new(reader);
    let mut stack = ElementStack::new();
    while let Some(token) = tokens.next_token()? {
        match token {
            Token::Start {
                name,
                namespace,
                attributes,
            } => stack.open(Element {
                name,
                namespace,
                attributes,
                ..Default::default()
            }),
            Token::Text(text) => stack.text(&text),
            Token::End { name } => {
                let el = stack.close().ok_or_else(|| {
                    Error::MalformedStream(format!("unbalanced closing tag {name}"))
                })?;
                if let Some(root) = stack.attach(el) {
                    return Ok(root);
                }
            }
        }
    }
    Err(Error::MalformedStream("document has no root element".to_string()))
}

/// Events emitted by the DFXML reader.
///
/// Start events carry the container's header as known when its first child
/// object opens; end events carry it again including any trailing
/// properties. File objects are emitted whole when their closing tag is seen.
#[derive(Debug)]
pub enum Event {
    /// Start of the DFXML document (header only)
    DFXMLStart(DFXMLObject),
    /// Start of a volume (header only)
    VolumeStart(VolumeObject),
    /// A complete file object
    FileObject(FileObject),
    /// End of a volume
    VolumeEnd(VolumeObject),
    /// End of the DFXML document, including trailing metadata such as rusage
    DFXMLEnd(DFXMLObject),
}

/// States of the stream machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Before the `dfxml` root
    Start,
    /// Reading document metadata before any volume or file
    Prestream,
    /// Reading a volume's own properties before its first file
    VolumeHeader,
    /// Emitting files as they complete
    FileStream,
    /// Trailing document metadata after a volume or the file stream
    Poststream,
    /// The root element has closed
    Done,
}

/// Which container events a reader emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Emit `DFXMLStart` and `VolumeStart`
    pub start_events: bool,
    /// Emit `VolumeEnd` and `DFXMLEnd`
    pub end_events: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            start_events: true,
            end_events: true,
        }
    }
}

impl ReaderConfig {
    /// Creates a config emitting every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits only file objects.
    pub fn files_only() -> Self {
        Self {
            start_events: false,
            end_events: false,
        }
    }

    /// Sets whether start events are emitted.
    pub fn with_start_events(mut self, enabled: bool) -> Self {
        self.start_events = enabled;
        self
    }

    /// Sets whether end events are emitted.
    pub fn with_end_events(mut self, enabled: bool) -> Self {
        self.end_events = enabled;
        self
    }
}

/// The DFXML stream state machine.
///
/// Feed it tokens with [`StreamMachine::feed`] and drain completed events
/// with [`StreamMachine::next_event`]. It does no I/O of its own.
#[derive(Debug)]
pub struct StreamMachine {
    state: StreamState,
    config: ReaderConfig,
    diag: Diagnostics,
    /// Document root with its header children
    document: Element,
    /// Header buffer of the open volume
    volume: Option<Element>,
    /// Header of the open volume as handed to its files
    volume_header: Option<Arc<VolumeObject>>,
    /// Elements open below the current container
    stack: ElementStack,
    events: VecDeque<Event>,
}

impl Default for StreamMachine {
    fn default() -> Self {
        Self::new(ReaderConfig::default())
    }
}

impl StreamMachine {
    /// Creates a machine in the `Start` state.
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            state: StreamState::Start,
            config,
            diag: Diagnostics::new(),
            document: Element::new("dfxml"),
            volume: None,
            volume_header: None,
            stack: ElementStack::new(),
            events: VecDeque::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Diagnostics collected so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    /// Pops the next completed event.
    pub fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Advances the machine by one token.
    pub fn feed(&mut self, token: Token) -> Result<()> {
        match token {
            Token::Start {
                name,
                namespace,
                attributes,
            } => self.on_start(Element {
                name,
                namespace,
                attributes,
                ..Default::default()
            }),
            Token::Text(text) => {
                self.stack.text(&text);
                Ok(())
            }
            Token::End { name } => self.on_end(&name),
        }
    }

    fn transition(&mut self, next: StreamState) {
        debug!(from = ?self.state, to = ?next, "Stream state change");
        self.state = next;
    }

    fn on_start(&mut self, el: Element) -> Result<()> {
        if self.stack.depth() > 0 {
            self.stack.open(el);
            return Ok(());
        }

        match (self.state, el.name.as_str()) {
            (StreamState::Start, "dfxml") => {
                self.document.attributes = el.attributes;
                self.transition(StreamState::Prestream);
            }
            (StreamState::Start, other) => {
                return Err(Error::MalformedStream(format!("expected dfxml root, found {other}")));
            }
            (StreamState::Done, other) => {
                return Err(Error::MalformedStream(format!("element {other} after document end")));
            }
            (_, "dfxml") => {
                return Err(Error::MalformedStream("nested dfxml element".to_string()));
            }
            (StreamState::Prestream, "volume") => {
                self.emit_document_start()?;
                self.volume = Some(el);
                self.transition(StreamState::VolumeHeader);
            }
            (StreamState::Poststream, "volume") | (StreamState::FileStream, "volume")
                if self.volume.is_none() =>
            {
                self.volume = Some(el);
                self.transition(StreamState::VolumeHeader);
            }
            (StreamState::VolumeHeader | StreamState::FileStream, "volume") => {
                return Err(Error::MalformedStream("nested volume element".to_string()));
            }
            (StreamState::Prestream, "fileobject") => {
                self.emit_document_start()?;
                self.stack.open(el);
                self.transition(StreamState::FileStream);
            }
            (StreamState::VolumeHeader, "fileobject") => {
                self.emit_volume_start()?;
                self.stack.open(el);
                self.transition(StreamState::FileStream);
            }
            (StreamState::Poststream, "fileobject") => {
                self.stack.open(el);
                self.transition(StreamState::FileStream);
            }
            _ => self.stack.open(el),
        }
        Ok(())
    }

    fn on_end(&mut self, name: &str) -> Result<()> {
        if let Some(el) = self.stack.close() {
            if self.stack.depth() > 0 {
                self.stack.attach(el);
                return Ok(());
            }
            return self.on_child_complete(el);
        }

        match (self.state, name) {
            (StreamState::VolumeHeader, "volume") => {
                self.emit_volume_start()?;
                self.emit_volume_end()?;
                self.transition(StreamState::Poststream);
            }
            (StreamState::FileStream, "volume") if self.volume.is_some() => {
                self.emit_volume_end()?;
                self.transition(StreamState::Poststream);
            }
            (StreamState::Prestream, "dfxml") => {
                self.emit_document_start()?;
                self.emit_document_end()?;
                self.transition(StreamState::Done);
            }
            (StreamState::FileStream | StreamState::Poststream, "dfxml")
                if self.volume.is_none() =>
            {
                self.emit_document_end()?;
                self.transition(StreamState::Done);
            }
            (state, other) => {
                return Err(Error::MalformedStream(format!(
                    "unexpected closing tag {other} in state {state:?}"
                )));
            }
        }
        Ok(())
    }

    /// Handles an element that closed directly under the current container.
    fn on_child_complete(&mut self, el: Element) -> Result<()> {
        if el.name == "fileobject" {
            let mut file = FileObject::from_element(&el, &mut self.diag)?;
            file.volume_object = self.volume_header.clone();
            self.events.push_back(Event::FileObject(file));
            return Ok(());
        }
        match (self.state, self.volume.as_mut()) {
            (StreamState::VolumeHeader | StreamState::FileStream, Some(volume)) => volume.push(el),
            _ => self.document.push(el),
        }
        Ok(())
    }

    fn emit_document_start(&mut self) -> Result<()> {
        if self.config.start_events {
            let doc = DFXMLObject::from_element(&self.document, &mut self.diag)?;
            self.events.push_back(Event::DFXMLStart(doc));
        }
        Ok(())
    }

    fn emit_document_end(&mut self) -> Result<()> {
        if self.config.end_events {
            let doc = DFXMLObject::from_element(&self.document, &mut self.diag)?;
            self.events.push_back(Event::DFXMLEnd(doc));
        }
        Ok(())
    }

    fn emit_volume_start(&mut self) -> Result<()> {
        let el = self
            .volume
            .as_ref()
            .ok_or_else(|| Error::MalformedStream("no open volume".to_string()))?;
        let volume = VolumeObject::from_element(el, &mut self.diag)?;
        self.volume_header = Some(Arc::new(volume.clone()));
        if self.config.start_events {
            self.events.push_back(Event::VolumeStart(volume));
        }
        Ok(())
    }

    fn emit_volume_end(&mut self) -> Result<()> {
        let el = self
            .volume
            .take()
            .ok_or_else(|| Error::MalformedStream("no open volume".to_string()))?;
        self.volume_header = None;
        if self.config.end_events {
            let volume = VolumeObject::from_element(&el, &mut self.diag)?;
            self.events.push_back(Event::VolumeEnd(volume));
        }
        Ok(())
    }
}

/// A streaming DFXML parser.
///
/// Reads DFXML from any `BufRead` source and yields [`Event`]s as objects
/// are parsed. Input that ends before the root element closes yields
/// [`Error::MalformedStream`].
pub struct DFXMLReader<R: BufRead> {
    tokens: TokenReader<R>,
    machine: StreamMachine,
    finished: bool,
}

impl<R: BufRead> DFXMLReader<R> {
    /// Creates a new DFXML reader from a buffered reader.
    pub fn from_reader(reader: R) -> Self {
        Self::with_config(reader, ReaderConfig::default())
    }

    /// Creates a reader with a specific configuration.
    pub fn with_config(reader: R, config: ReaderConfig) -> Self {
        Self {
            tokens: TokenReader::new(reader),
            machine: StreamMachine::new(config),
            finished: false,
        }
    }

    /// Diagnostics collected so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        self.machine.diagnostics()
    }

    /// The underlying source. Anything after the root element is left unread.
    pub fn get_mut(&mut self) -> &mut R {
        self.tokens.get_mut()
    }

    fn parse_next(&mut self) -> Result<Option<Event>> {
        loop {
            if let Some(event) = self.machine.next_event() {
                return Ok(Some(event));
            }
            if self.finished || self.machine.state() == StreamState::Done {
                return Ok(None);
            }
            match self.tokens.next_token()? {
                Some(token) => self.machine.feed(token)?,
                None => {
                    self.finished = true;
                    return Err(Error::MalformedStream(format!(
                        "input ended in state {:?}",
                        self.machine.state()
                    )));
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for DFXMLReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.parse_next() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Streams DFXML from a running producer's standard output.
///
/// When the stream ends the child is reaped; a nonzero exit yields
/// [`Error::ProducerFailed`] in place of whatever the parser reported.
pub struct ProcessReader {
    program: String,
    child: Option<Child>,
    reader: DFXMLReader<BufReader<ChildStdout>>,
    finished: bool,
}

impl ProcessReader {
    /// Spawns `program` with `args` and reads DFXML from its stdout.
    pub fn spawn<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program.as_ref());
        command.args(args);
        Self::from_command(command, ReaderConfig::default())
    }

    /// Spawns a prepared command.
    pub fn from_command(mut command: Command, config: ReaderConfig) -> Result<Self> {
        let program = command.get_program().to_string_lossy().into_owned();
        let mut child = command.stdout(Stdio::piped()).spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::MalformedStream(format!("{program} has no stdout")))?;
        debug!(program = %program, pid = child.id(), "Spawned DFXML producer");
        Ok(Self {
            program,
            child: Some(child),
            reader: DFXMLReader::with_config(BufReader::new(stdout), config),
            finished: false,
        })
    }

    /// Diagnostics collected so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        self.reader.diagnostics()
    }

    /// Reads whatever the producer writes after the document so it cannot
    /// block on a full pipe, then waits for it to exit.
    fn drain_and_reap(&mut self) -> Result<()> {
        let drained = io::copy(self.reader.get_mut(), &mut io::sink())?;
        if drained > 0 {
            debug!(
                program = %self.program,
                bytes = drained,
                "Discarded output after document end"
            );
        }
        self.check_child(true)
    }

    /// Reaps the child after the stream ended. `waited` blocks until exit;
    /// otherwise only an already exited child is checked.
    fn check_child(&mut self, waited: bool) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = if waited {
            Some(child.wait()?)
        } else {
            match child.try_wait()? {
                Some(status) => Some(status),
                None => {
                    self.child = Some(child);
                    None
                }
            }
        };
        match status {
            Some(status) if !status.success() => Err(Error::ProducerFailed {
                program: self.program.clone(),
                status,
            }),
            _ => Ok(()),
        }
    }
}

impl Iterator for ProcessReader {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.reader.next() {
            Some(Ok(event)) => Some(Ok(event)),
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(self.check_child(false).err().unwrap_or(e)))
            }
            None => {
                self.finished = true;
                self.drain_and_reap().err().map(Err)
            }
        }
    }
}

impl Drop for ProcessReader {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Collects every file object in a DFXML document.
pub fn parse_file_objects<R: BufRead>(reader: R) -> Result<Vec<FileObject>> {
    DFXMLReader::with_config(reader, ReaderConfig::files_only())
        .filter_map(|event| match event {
            Ok(Event::FileObject(file)) => Some(Ok(file)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect()
}

/// Parses a complete DFXML document into a [`DFXMLObject`] tree.
pub fn parse<R: BufRead>(reader: R) -> Result<DFXMLObject> {
    let mut doc = DFXMLObject::new();
    let mut volumes = Vec::new();
    let mut volume_files = Vec::new();
    let mut loose_files = Vec::new();
    let mut in_volume = false;

    for event in DFXMLReader::from_reader(reader) {
        match event? {
            Event::DFXMLStart(_) => {}
            Event::VolumeStart(_) => in_volume = true,
            Event::FileObject(file) if in_volume => volume_files.push(file),
            Event::FileObject(file) => loose_files.push(file),
            Event::VolumeEnd(mut volume) => {
                for file in volume_files.drain(..) {
                    volume.append_file(file);
                }
                volumes.push(volume);
                in_volume = false;
            }
            Event::DFXMLEnd(end) => doc = end,
        }
    }

    for volume in volumes {
        doc.append_volume(volume);
    }
    for file in loose_files {
        doc.append_file(file);
    }
    Ok(doc)
}

/// Parses a complete RegXML document.
pub fn parse_regxml<R: BufRead>(reader: R) -> Result<RegXMLObject> {
    let root = read_element(reader)?;
    let mut diag = Diagnostics::new();
    RegXMLObject::from_element(&root, &mut diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::TimestampName;

    const TWO_VOLUMES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<dfxml xmlns="http://www.forensicswiki.org/wiki/Category:Digital_Forensics_XML" version="1.2.0">
  <creator>
    <program>fiwalk</program>
  </creator>
  <volume>
    <ftype_str>ntfs</ftype_str>
    <fileobject><filename>a</filename></fileobject>
    <fileobject><filename>b</filename></fileobject>
  </volume>
  <volume>
    <ftype_str>fat32</ftype_str>
    <fileobject><filename>c</filename></fileobject>
    <fileobject><filename>d</filename></fileobject>
  </volume>
  <rusage><utime>0.25</utime></rusage>
</dfxml>"#;

    fn label(event: &Event) -> String {
        match event {
            Event::DFXMLStart(_) => "dfxml-start".to_string(),
            Event::VolumeStart(v) => {
                format!("volume-start:{}", v.ftype_str.as_deref().unwrap_or(""))
            }
            Event::FileObject(f) => format!("file:{}", f.filename.as_deref().unwrap_or("")),
            Event::VolumeEnd(v) => format!("volume-end:{}", v.ftype_str.as_deref().unwrap_or("")),
            Event::DFXMLEnd(_) => "dfxml-end".to_string(),
        }
    }

    fn feed_all(machine: &mut StreamMachine, tokens: Vec<Token>) -> Vec<String> {
        let mut labels = Vec::new();
        for token in tokens {
            machine.feed(token).unwrap();
            while let Some(event) = machine.next_event() {
                labels.push(label(&event));
            }
        }
        labels
    }

    fn file_tokens(name: &str) -> Vec<Token> {
        vec![
            Token::start("fileobject"),
            Token::start("filename"),
            Token::Text(name.to_string()),
            Token::end("filename"),
            Token::end("fileobject"),
        ]
    }

    #[test]
    fn test_event_order_two_volumes() {
        let events: Vec<String> = DFXMLReader::from_reader(TWO_VOLUMES.as_bytes())
            .map(|e| label(&e.unwrap()))
            .collect();
        assert_eq!(
            events,
            [
                "dfxml-start",
                "volume-start:ntfs",
                "file:a",
                "file:b",
                "volume-end:ntfs",
                "volume-start:fat32",
                "file:c",
                "file:d",
                "volume-end:fat32",
                "dfxml-end",
            ]
        );
    }

    #[test]
    fn test_machine_with_synthetic_tokens() {
        let mut machine = StreamMachine::default();
        let mut tokens = vec![Token::start("dfxml")];
        tokens.extend(file_tokens("loose"));
        tokens.push(Token::start("volume"));
        tokens.push(Token::start("block_size"));
        tokens.push(Token::Text("512".to_string()));
        tokens.push(Token::end("block_size"));
        tokens.push(Token::end("volume"));
        tokens.push(Token::end("dfxml"));

        let labels = feed_all(&mut machine, tokens);
        assert_eq!(
            labels,
            ["dfxml-start", "file:loose", "volume-start:", "volume-end:", "dfxml-end"]
        );
        assert_eq!(machine.state(), StreamState::Done);
    }

    #[test]
    fn test_machine_states() {
        let mut machine = StreamMachine::default();
        assert_eq!(machine.state(), StreamState::Start);
        machine.feed(Token::start("dfxml")).unwrap();
        assert_eq!(machine.state(), StreamState::Prestream);
        machine.feed(Token::start("volume")).unwrap();
        assert_eq!(machine.state(), StreamState::VolumeHeader);
        machine.feed(Token::start("fileobject")).unwrap();
        assert_eq!(machine.state(), StreamState::FileStream);
        machine.feed(Token::end("fileobject")).unwrap();
        machine.feed(Token::end("volume")).unwrap();
        assert_eq!(machine.state(), StreamState::Poststream);
        machine.feed(Token::end("dfxml")).unwrap();
        assert_eq!(machine.state(), StreamState::Done);
        assert!(matches!(
            machine.feed(Token::start("volume")),
            Err(Error::MalformedStream(_))
        ));
    }

    #[test]
    fn test_files_attach_volume_header() {
        let files = parse_file_objects(TWO_VOLUMES.as_bytes()).unwrap();
        assert_eq!(files.len(), 4);
        let volume = files[2].volume_object.as_ref().unwrap();
        assert_eq!(volume.ftype_str.as_deref(), Some("fat32"));
        assert_eq!(volume.file_count(), 0);
    }

    #[test]
    fn test_start_events_disabled() {
        let config = ReaderConfig::new().with_start_events(false);
        let events: Vec<String> = DFXMLReader::with_config(TWO_VOLUMES.as_bytes(), config)
            .map(|e| label(&e.unwrap()))
            .collect();
        assert_eq!(events.first().map(String::as_str), Some("file:a"));
        assert_eq!(events.last().map(String::as_str), Some("dfxml-end"));
    }

    #[test]
    fn test_parse_builds_tree() {
        let doc = parse(TWO_VOLUMES.as_bytes()).unwrap();
        assert_eq!(doc.program.as_deref(), Some("fiwalk"));
        assert_eq!(doc.volume_count(), 2);
        assert_eq!(doc.iter_files().count(), 4);
        assert_eq!(doc.rusage, [("utime".to_string(), "0.25".to_string())]);
    }

    #[test]
    fn test_readme_scenario() {
        let xml = r#"<dfxml version="1.2.0">
  <volume>
    <block_size>512</block_size>
    <block_count>1000</block_count>
    <fileobject>
      <filename>readme.txt</filename>
      <alloc_inode>1</alloc_inode>
      <alloc_name>1</alloc_name>
      <mtime>2020-01-01T00:00:00Z</mtime>
      <byte_runs>
        <byte_run img_offset="1024" len="512"/>
      </byte_runs>
    </fileobject>
  </volume>
</dfxml>"#;
        let doc = parse(xml.as_bytes()).unwrap();
        let volume = doc.volumes().next().unwrap();
        assert_eq!(volume.block_size, Some(512));
        assert_eq!(volume.block_count, Some(1000));

        let file = volume.files().next().unwrap();
        assert_eq!(file.filename.as_deref(), Some("readme.txt"));
        assert_eq!(file.alloc_inode, Some(true));
        assert_eq!(file.alloc_name, Some(true));
        let mtime = file.get_timestamp(TimestampName::Mtime).unwrap();
        assert_eq!(mtime.time_text().as_deref(), Some("2020-01-01T00:00:00Z"));
        let run = file.byte_runs().unwrap().get(0).unwrap();
        assert_eq!((run.img_offset, run.len), (Some(1024), Some(512)));

        let el = file.to_element();
        let names: Vec<&str> = el.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            ["filename", "alloc_inode", "alloc_name", "mtime", "byte_runs"]
        );
    }

    #[test]
    fn test_unknown_element_warns_once() {
        let xml = r#"<dfxml>
  <fileobject><filename>a</filename><foo>1</foo></fileobject>
  <fileobject><filename>b</filename><foo>2</foo></fileobject>
</dfxml>"#;
        let mut reader = DFXMLReader::from_reader(xml.as_bytes());
        let files: Vec<Event> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(files.len(), 4);
        assert_eq!(reader.diagnostics().distinct_count(), 1);
        assert_eq!(reader.diagnostics().element_count(None, "foo"), 2);
    }

    #[test]
    fn test_namespaced_names_are_canonical() {
        let xml = r#"<dfxml xmlns="http://www.forensicswiki.org/wiki/Category:Digital_Forensics_XML"
       xmlns:d="http://www.forensicswiki.org/wiki/Forensic_Disk_Differencing">
  <fileobject d:new_file="1"><filename d:changed_property="1">a</filename></fileobject>
</dfxml>"#;
        let files = parse_file_objects(xml.as_bytes()).unwrap();
        assert!(files[0].annos.contains(&crate::objects::Annotation::New));
        assert!(files[0].diffs.contains("filename"));
    }

    #[test]
    fn test_truncated_input() {
        let xml = "<dfxml><volume><fileobject><filename>a</filename></fileobject>";
        let results: Vec<Result<Event>> = DFXMLReader::from_reader(xml.as_bytes()).collect();
        assert!(matches!(results.last(), Some(Err(Error::MalformedStream(_)))));
    }

    #[test]
    fn test_read_element_tree() {
        let root = read_element(r#"<a x="1"><b>text</b><c/></a>"#.as_bytes()).unwrap();
        assert_eq!(root.attr("x"), Some("1"));
        assert_eq!(root.child("b").and_then(Element::text), Some("text"));
        assert!(root.child("c").is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_reader_reports_failure() {
        let script = "printf '<dfxml><fileobject><filename>x</filename></fileobject></dfxml>'; exit 3";
        let events: Vec<Result<Event>> =
            ProcessReader::spawn("sh", ["-c", script]).unwrap().collect();
        assert!(matches!(
            events.last(),
            Some(Err(Error::ProducerFailed { .. }))
        ));
        assert!(events.iter().any(|e| matches!(e, Ok(Event::FileObject(_)))));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_reader_drains_trailing_output() {
        // Far more trailing output than a pipe buffer holds
        let script = "printf '<dfxml><fileobject><filename>x</filename></fileobject></dfxml>'; \
                      head -c 1000000 /dev/zero; exit 4";
        let events: Vec<Result<Event>> =
            ProcessReader::spawn("sh", ["-c", script]).unwrap().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[1], Ok(Event::FileObject(_))));
        assert!(matches!(
            events.last(),
            Some(Err(Error::ProducerFailed { .. }))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_reader_success() {
        let script = "printf '<dfxml><fileobject><filename>x</filename></fileobject></dfxml>'";
        let events: Vec<Event> = ProcessReader::spawn("sh", ["-c", script])
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(events.len(), 3);
    }
}
