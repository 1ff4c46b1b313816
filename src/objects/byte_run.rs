//! Byte runs: contiguous extents of a file's content, metadata or name.
//!
//! - [`ByteRun`] - A contiguous run of bytes on disk/in file
//! - [`ByteRuns`] - A collection of byte runs with an optional facet
//! - [`ContentIter`] - Lazy reconstruction of the bytes a collection refers to

use crate::casts::{bytes_cast, int_cast};
use crate::diagnostics::Diagnostics;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::objects::common::{HashType, Hashes};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::str::FromStr;

/// The facet (aspect) of a file that byte runs describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteRunFacet {
    /// Data content byte runs (default)
    #[default]
    Data,
    /// Inode/metadata byte runs
    Inode,
    /// Filename byte runs
    Name,
}

impl ByteRunFacet {
    /// Returns the XML attribute value for this facet.
    pub fn as_str(&self) -> &'static str {
        match self {
            ByteRunFacet::Data => "data",
            ByteRunFacet::Inode => "inode",
            ByteRunFacet::Name => "name",
        }
    }
}

impl FromStr for ByteRunFacet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "data" => Ok(ByteRunFacet::Data),
            "inode" => Ok(ByteRunFacet::Inode),
            "name" => Ok(ByteRunFacet::Name),
            _ => Err(Error::InvalidFacet(s.to_string())),
        }
    }
}

impl fmt::Display for ByteRunFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The type of a byte run (e.g., "resident" for NTFS resident data).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteRunType {
    /// Resident data (stored in MFT for NTFS)
    Resident,
    /// Other/custom type
    Other(String),
}

impl FromStr for ByteRunType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "resident" => Ok(ByteRunType::Resident),
            other => Ok(ByteRunType::Other(other.to_string())),
        }
    }
}

impl fmt::Display for ByteRunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteRunType::Resident => write!(f, "resident"),
            ByteRunType::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A contiguous run of bytes representing data location.
///
/// Byte runs can specify locations in multiple coordinate systems:
/// - `img_offset`: Offset from the start of the disk image
/// - `fs_offset`: Offset from the start of the file system
/// - `file_offset`: Offset from the start of the logical file
///
/// A run with `fill` set stands for fabricated content: `len` bytes of the
/// fill pattern repeated. The pattern is written literally as attribute
/// text, so [`ByteRun::set_fill`] only accepts non-empty UTF-8 that XML can
/// carry.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteRun {
    /// Offset from image start (bytes)
    pub img_offset: Option<u64>,
    /// Offset from file system start (bytes)
    pub fs_offset: Option<u64>,
    /// Offset from file start (bytes)
    pub file_offset: Option<u64>,
    /// Length of the run (bytes)
    pub len: Option<u64>,
    fill: Option<Vec<u8>>,
    /// Run type (e.g., "resident")
    pub run_type: Option<ByteRunType>,
    /// Uncompressed length (if compressed)
    pub uncompressed_len: Option<u64>,
    /// Hash values for this specific run
    pub hashes: Hashes,
}

/// Characters an attribute value can hold literally and read back unchanged.
fn is_attribute_char(c: char) -> bool {
    c >= ' ' && c != '\u{fffe}' && c != '\u{ffff}'
}

impl PartialEq for ByteRun {
    fn eq(&self, other: &Self) -> bool {
        self.img_offset == other.img_offset
            && self.fs_offset == other.fs_offset
            && self.file_offset == other.file_offset
            && self.len == other.len
            && self.fill == other.fill
            && self.run_type == other.run_type
            && self.uncompressed_len == other.uncompressed_len
    }
}

impl Eq for ByteRun {}

impl ByteRun {
    /// Creates a new empty byte run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a byte run with image offset and length.
    pub fn with_img_offset(img_offset: u64, len: u64) -> Self {
        Self {
            img_offset: Some(img_offset),
            len: Some(len),
            ..Default::default()
        }
    }

    /// Creates a fill run of `len` bytes.
    pub fn with_fill(fill: impl Into<Vec<u8>>, len: u64) -> Result<Self> {
        let mut run = Self {
            len: Some(len),
            ..Default::default()
        };
        run.set_fill(Some(fill.into()))?;
        Ok(run)
    }

    /// Fill pattern for sparse or fabricated regions.
    pub fn fill(&self) -> Option<&[u8]> {
        self.fill.as_deref()
    }

    /// Returns true if this run has any hash values.
    pub fn has_hashes(&self) -> bool {
        self.hashes.has_any()
    }

    /// Sets the fill pattern.
    pub fn set_fill(&mut self, fill: Option<Vec<u8>>) -> Result<()> {
        if let Some(ref bytes) = fill {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                Error::InvalidByteRun(format!("fill pattern is not UTF-8: {bytes:?}"))
            })?;
            if text.is_empty() || !text.chars().all(is_attribute_char) {
                return Err(Error::InvalidByteRun(format!(
                    "fill pattern cannot be written as XML: {text:?}"
                )));
            }
        }
        self.fill = fill;
        Ok(())
    }

    /// Sets the fill pattern from attribute text.
    pub fn set_fill_str(&mut self, text: Option<&str>) -> Result<()> {
        self.set_fill(bytes_cast(text))
    }

    /// Attempts to concatenate two contiguous byte runs.
    ///
    /// Returns `Some(combined)` if the runs are contiguous and compatible,
    /// `None` otherwise. Every offset known on both sides must continue
    /// across the boundary, and at least one must be known.
    pub fn try_concat(&self, other: &ByteRun) -> Option<ByteRun> {
        if self.fill != other.fill {
            return None;
        }

        // Typed, compressed or hashed runs lose information when merged
        if self.run_type.is_some() || other.run_type.is_some() {
            return None;
        }
        if self.uncompressed_len.is_some() || other.uncompressed_len.is_some() {
            return None;
        }
        if self.has_hashes() || other.has_hashes() {
            return None;
        }

        let self_len = self.len?;
        let other_len = other.len?;

        let mut is_contiguous = false;
        let mut join = |a: Option<u64>, b: Option<u64>| -> std::result::Result<Option<u64>, ()> {
            match (a, b) {
                (Some(s), Some(o)) if s.checked_add(self_len) == Some(o) => {
                    is_contiguous = true;
                    Ok(Some(s))
                }
                (None, None) => Ok(None),
                _ => Err(()),
            }
        };

        let img_offset = join(self.img_offset, other.img_offset).ok()?;
        let fs_offset = join(self.fs_offset, other.fs_offset).ok()?;
        let file_offset = join(self.file_offset, other.file_offset).ok()?;

        if !is_contiguous {
            return None;
        }

        Some(ByteRun {
            img_offset,
            fs_offset,
            file_offset,
            len: Some(self_len.checked_add(other_len)?),
            fill: self.fill.clone(),
            ..Default::default()
        })
    }

    /// Populates from a `byte_run` element.
    pub fn populate_from_element(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        if el.name != "byte_run" {
            return Err(Error::UnexpectedElement(el.name.clone()));
        }
        for (key, value) in &el.attributes {
            let value = Some(value.as_str());
            match key.as_str() {
                "img_offset" => self.img_offset = int_cast(value)?,
                "fs_offset" => self.fs_offset = int_cast(value)?,
                "file_offset" => self.file_offset = int_cast(value)?,
                "len" => self.len = int_cast(value)?,
                "fill" => self.set_fill_str(value)?,
                "type" => self.run_type = value.map(str::parse).transpose()?,
                "uncompressed_len" => self.uncompressed_len = int_cast(value)?,
                other => {
                    diag.unknown_attribute("byte_run", None, other);
                }
            }
        }
        for child in &el.children {
            match child.name.as_str() {
                "hashdigest" => {
                    self.hashes.read_hashdigest(child, diag)?;
                }
                _ => {
                    diag.unknown_element(
                        "byte_run",
                        child.namespace.as_deref(),
                        child.local_name(),
                    );
                }
            }
        }
        Ok(())
    }

    /// Builds a run from a `byte_run` element.
    pub fn from_element(el: &Element, diag: &mut Diagnostics) -> Result<Self> {
        let mut run = Self::new();
        run.populate_from_element(el, diag)?;
        Ok(run)
    }

    /// Serializes the run as a `byte_run` element.
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("byte_run");
        if let Some(v) = self.img_offset {
            el.set_attr("img_offset", v.to_string());
        }
        if let Some(v) = self.fs_offset {
            el.set_attr("fs_offset", v.to_string());
        }
        if let Some(v) = self.file_offset {
            el.set_attr("file_offset", v.to_string());
        }
        if let Some(v) = self.len {
            el.set_attr("len", v.to_string());
        }
        if let Some(fill) = self.fill.as_deref().and_then(|f| std::str::from_utf8(f).ok()) {
            el.set_attr("fill", fill);
        }
        if let Some(ref t) = self.run_type {
            el.set_attr("type", t.to_string());
        }
        if let Some(v) = self.uncompressed_len {
            el.set_attr("uncompressed_len", v.to_string());
        }
        for hash_type in [HashType::Md5, HashType::Sha1] {
            if let Some(digest) = self.hashes.hashdigest_element(hash_type) {
                el.push(digest);
            }
        }
        el
    }
}

impl std::ops::Add for &ByteRun {
    type Output = Option<ByteRun>;

    fn add(self, other: &ByteRun) -> Option<ByteRun> {
        self.try_concat(other)
    }
}

/// A collection of byte runs with an optional facet.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteRuns {
    /// The facet these runs describe
    pub facet: Option<ByteRunFacet>,
    /// The byte runs in this collection
    runs: Vec<ByteRun>,
}

impl PartialEq for ByteRuns {
    fn eq(&self, other: &Self) -> bool {
        self.facet.unwrap_or_default() == other.facet.unwrap_or_default() && self.runs == other.runs
    }
}

impl Eq for ByteRuns {}

impl ByteRuns {
    /// Creates a new empty ByteRuns collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ByteRuns collection with a specific facet.
    pub fn with_facet(facet: ByteRunFacet) -> Self {
        Self {
            facet: Some(facet),
            runs: Vec::new(),
        }
    }

    /// Sets the facet from attribute text. Unknown facets are rejected.
    pub fn set_facet_str(&mut self, text: Option<&str>) -> Result<()> {
        self.facet = text.map(str::parse).transpose()?;
        Ok(())
    }

    /// Returns the number of byte runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if there are no byte runs.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Appends a byte run to the collection.
    pub fn push(&mut self, run: ByteRun) {
        self.runs.push(run);
    }

    /// Appends a byte run, attempting to merge with the last run if contiguous.
    pub fn glom(&mut self, run: ByteRun) {
        if let Some(last) = self.runs.last_mut() {
            if let Some(merged) = last.try_concat(&run) {
                *last = merged;
                return;
            }
        }
        self.runs.push(run);
    }

    /// Returns an iterator over the byte runs.
    pub fn iter(&self) -> impl Iterator<Item = &ByteRun> {
        self.runs.iter()
    }

    /// Returns the total length of all byte runs.
    pub fn total_len(&self) -> Option<u64> {
        self.runs.iter().try_fold(0u64, |acc, run| acc.checked_add(run.len?))
    }

    /// Gets a byte run by index.
    pub fn get(&self, index: usize) -> Option<&ByteRun> {
        self.runs.get(index)
    }

    /// Lazily reconstructs the content these runs describe.
    ///
    /// Fill runs produce their pattern; image runs are read from `image`
    /// through the configured sector-range extraction program.
    pub fn iter_contents(
        &self,
        image: impl AsRef<Path>,
        config: &ExtractConfig,
    ) -> ContentIter<'_> {
        ContentIter {
            runs: self.runs.iter(),
            image: image.as_ref().to_path_buf(),
            config: config.clone(),
            current: None,
            finished: false,
        }
    }

    /// Populates from a `byte_runs` element.
    pub fn populate_from_element(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        for (key, value) in &el.attributes {
            match key.as_str() {
                "facet" => self.set_facet_str(Some(value))?,
                crate::objects::common::CHANGED_PROPERTY => {}
                other => {
                    diag.unknown_attribute("byte_runs", None, other);
                }
            }
        }
        for child in &el.children {
            if child.name == "byte_run" {
                self.push(ByteRun::from_element(child, diag)?);
            } else {
                diag.unknown_element("byte_runs", child.namespace.as_deref(), child.local_name());
            }
        }
        Ok(())
    }

    /// Builds a collection from a `byte_runs` element.
    pub fn from_element(el: &Element, diag: &mut Diagnostics) -> Result<Self> {
        let mut runs = Self::new();
        runs.populate_from_element(el, diag)?;
        Ok(runs)
    }

    /// Serializes the collection as a `byte_runs` element.
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("byte_runs");
        if let Some(facet) = self.facet {
            el.set_attr("facet", facet.as_str());
        }
        // Written as an open/close pair so it reads back as present
        if self.runs.is_empty() {
            el.text = Some(String::new());
        }
        for run in &self.runs {
            el.push(run.to_element());
        }
        el
    }
}

impl IntoIterator for ByteRuns {
    type Item = ByteRun;
    type IntoIter = std::vec::IntoIter<ByteRun>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.into_iter()
    }
}

impl<'a> IntoIterator for &'a ByteRuns {
    type Item = &'a ByteRun;
    type IntoIter = std::slice::Iter<'a, ByteRun>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.iter()
    }
}

impl FromIterator<ByteRun> for ByteRuns {
    fn from_iter<I: IntoIterator<Item = ByteRun>>(iter: I) -> Self {
        Self {
            facet: None,
            runs: iter.into_iter().collect(),
        }
    }
}

impl std::ops::Index<usize> for ByteRuns {
    type Output = ByteRun;

    fn index(&self, index: usize) -> &Self::Output {
        &self.runs[index]
    }
}

// ============================================================================
// Content extraction
// ============================================================================

/// Configuration for [`ByteRuns::iter_contents`].
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Largest chunk yielded at a time
    pub buffer_size: usize,
    /// Sector size passed to the extraction program
    pub sector_size: u64,
    /// Sector-range extraction program (`img_cat`-compatible arguments)
    pub program: PathBuf,
    /// File that receives the program's stderr; discarded when unset
    pub stderr_log: Option<PathBuf>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1 << 20,
            sector_size: 512,
            program: PathBuf::from("img_cat"),
            stderr_log: None,
        }
    }
}

impl ExtractConfig {
    /// Creates a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chunk size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Sets the sector size.
    pub fn with_sector_size(mut self, sector_size: u64) -> Self {
        self.sector_size = sector_size.max(1);
        self
    }

    /// Sets the extraction program.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Appends the extraction program's stderr to a file.
    pub fn with_stderr_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_log = Some(path.into());
        self
    }
}

enum RunSource {
    Fill {
        pattern: Vec<u8>,
        pos: usize,
        remaining: u64,
    },
    Image {
        child: Child,
        stdout: ChildStdout,
        remaining: u64,
        command: String,
    },
}

/// Lazy iterator over the content of a [`ByteRuns`] collection.
///
/// Yields chunks of at most `buffer_size` bytes. An extraction failure is
/// yielded as an error and ends the iteration. Dropping the iterator kills
/// and reaps any extraction process still running.
pub struct ContentIter<'a> {
    runs: std::slice::Iter<'a, ByteRun>,
    image: PathBuf,
    config: ExtractConfig,
    current: Option<RunSource>,
    finished: bool,
}

impl ContentIter<'_> {
    fn start(&self, run: &ByteRun) -> Result<RunSource> {
        let len = run
            .len
            .ok_or_else(|| Error::InvalidByteRun("run has no length".to_string()))?;

        if let Some(ref pattern) = run.fill {
            return Ok(RunSource::Fill {
                pattern: pattern.clone(),
                pos: 0,
                remaining: len,
            });
        }

        let offset = run.img_offset.ok_or_else(|| {
            Error::InvalidByteRun("run has neither fill nor img_offset".to_string())
        })?;

        let ss = self.config.sector_size;
        if ss == 0 {
            return Err(Error::InvalidByteRun("sector size must be nonzero".to_string()));
        }
        let first = offset / ss;
        let lead = offset % ss;
        let end = offset.checked_add(len.saturating_sub(1)).ok_or_else(|| {
            Error::InvalidByteRun(format!("run at {offset} of length {len} overflows"))
        })?;
        let last = end / ss;

        let mut cmd = Command::new(&self.config.program);
        cmd.arg("-b")
            .arg(ss.to_string())
            .arg("-s")
            .arg(first.to_string())
            .arg("-e")
            .arg(last.to_string())
            .arg(&self.image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped());
        match self.config.stderr_log {
            Some(ref path) => {
                let log = OpenOptions::new().create(true).append(true).open(path)?;
                cmd.stderr(Stdio::from(log));
            }
            None => {
                cmd.stderr(Stdio::null());
            }
        }

        let command = format!(
            "{} -b {} -s {} -e {} {}",
            self.config.program.display(),
            ss,
            first,
            last,
            self.image.display()
        );
        tracing::debug!(command = %command, "Spawning content extraction");

        let mut child = cmd.spawn()?;
        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "extraction program has no stdout",
            )));
        };

        let skipped = io::copy(&mut (&mut stdout).take(lead), &mut io::sink())?;
        let remaining = if skipped < lead {
            tracing::warn!(
                command = %command,
                lead,
                skipped,
                "Extraction output ended inside sector lead"
            );
            0
        } else {
            len
        };

        Ok(RunSource::Image {
            child,
            stdout,
            remaining,
            command,
        })
    }

    fn finish_image(mut child: Child, mut stdout: ChildStdout, command: String) -> Result<()> {
        io::copy(&mut stdout, &mut io::sink())?;
        drop(stdout);
        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::ContentExtraction { command, status })
        }
    }

    fn step(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let source = match self.current.take() {
                Some(source) => source,
                None => match self.runs.next() {
                    Some(run) => self.start(run)?,
                    None => return Ok(None),
                },
            };

            match source {
                RunSource::Fill {
                    pattern,
                    pos,
                    remaining,
                } => {
                    if remaining == 0 {
                        continue;
                    }
                    let n = remaining.min(self.config.buffer_size as u64) as usize;
                    let chunk: Vec<u8> =
                        pattern.iter().copied().cycle().skip(pos).take(n).collect();
                    self.current = Some(RunSource::Fill {
                        pos: (pos + n) % pattern.len(),
                        remaining: remaining - n as u64,
                        pattern,
                    });
                    return Ok(Some(chunk));
                }
                RunSource::Image {
                    child,
                    mut stdout,
                    remaining,
                    command,
                } => {
                    if remaining == 0 {
                        Self::finish_image(child, stdout, command)?;
                        continue;
                    }
                    let want = remaining.min(self.config.buffer_size as u64) as usize;
                    let mut buf = vec![0u8; want];
                    let n = match stdout.read(&mut buf) {
                        Ok(n) => n,
                        Err(e) => {
                            self.current = Some(RunSource::Image {
                                child,
                                stdout,
                                remaining,
                                command,
                            });
                            return Err(e.into());
                        }
                    };
                    if n == 0 {
                        tracing::warn!(
                            command = %command,
                            remaining,
                            "Extraction output ended before run length"
                        );
                        Self::finish_image(child, stdout, command)?;
                        continue;
                    }
                    buf.truncate(n);
                    self.current = Some(RunSource::Image {
                        child,
                        stdout,
                        remaining: remaining - n as u64,
                        command,
                    });
                    return Ok(Some(buf));
                }
            }
        }
    }
}

impl Iterator for ContentIter<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.step() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
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

impl Drop for ContentIter<'_> {
    fn drop(&mut self) {
        if let Some(RunSource::Image { mut child, .. }) = self.current.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_run_concat() {
        let run1 = ByteRun::with_img_offset(0, 100);
        let run2 = ByteRun::with_img_offset(100, 50);

        let merged = (&run1 + &run2).unwrap();
        assert_eq!(merged.img_offset, Some(0));
        assert_eq!(merged.len, Some(150));

        let gap = ByteRun::with_img_offset(200, 10);
        assert!((&run1 + &gap).is_none());
    }

    #[test]
    fn test_concat_requires_matching_fill() {
        let mut a = ByteRun::with_img_offset(0, 10);
        let mut b = ByteRun::with_img_offset(10, 10);
        a.fill = Some(b"\0".to_vec());
        assert!(a.try_concat(&b).is_none());
        b.fill = Some(b"\0".to_vec());
        assert!(a.try_concat(&b).is_some());
    }

    #[test]
    fn test_concat_checks_every_shared_offset() {
        let a = ByteRun {
            img_offset: Some(0),
            fs_offset: Some(1000),
            len: Some(10),
            ..Default::default()
        };
        let b = ByteRun {
            img_offset: Some(10),
            fs_offset: Some(5000),
            len: Some(10),
            ..Default::default()
        };
        assert!(a.try_concat(&b).is_none());
    }

    #[test]
    fn test_merge_associativity() {
        let a = ByteRun::with_img_offset(0, 100);
        let b = ByteRun::with_img_offset(100, 50);
        let c = ByteRun::with_img_offset(150, 25);

        let ab_c = (&(&a + &b).unwrap() + &c).unwrap();

        let mut runs = ByteRuns::new();
        runs.glom(a);
        runs.glom(b);
        runs.glom(c);

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0], ab_c);
        assert_eq!(runs[0].len, Some(175));
    }

    #[test]
    fn test_facet_equality() {
        let runs = [ByteRun::with_img_offset(0, 512)];
        let unset: ByteRuns = runs.iter().cloned().collect();
        let mut data = ByteRuns::with_facet(ByteRunFacet::Data);
        let mut inode = ByteRuns::with_facet(ByteRunFacet::Inode);
        let mut name = ByteRuns::with_facet(ByteRunFacet::Name);
        for run in &runs {
            data.push(run.clone());
            inode.push(run.clone());
            name.push(run.clone());
        }

        assert_eq!(unset, data);
        assert_ne!(unset, inode);
        assert_ne!(data, name);
    }

    #[test]
    fn test_invalid_facet_rejected() {
        let mut runs = ByteRuns::new();
        assert!(matches!(
            runs.set_facet_str(Some("blocks")),
            Err(Error::InvalidFacet(_))
        ));
        runs.set_facet_str(Some("inode")).unwrap();
        assert_eq!(runs.facet, Some(ByteRunFacet::Inode));
    }

    #[test]
    fn test_byte_runs_element_round_trip() {
        let mut runs = ByteRuns::with_facet(ByteRunFacet::Name);
        runs.push(ByteRun::with_img_offset(1024, 512));
        let mut filled = ByteRun::with_fill(b"0".to_vec(), 16).unwrap();
        filled.file_offset = Some(512);
        runs.push(filled);

        let el = runs.to_element();
        assert_eq!(el.attr("facet"), Some("name"));
        assert_eq!(el.children[1].attr("fill"), Some("0"));
        assert_eq!(el.children[0].attributes[0].0, "img_offset");

        let mut diag = Diagnostics::new();
        let back = ByteRuns::from_element(&el, &mut diag).unwrap();
        assert_eq!(back, runs);
        assert!(diag.is_empty());
    }

    #[test]
    fn test_fill_contents() {
        let mut runs = ByteRuns::new();
        runs.push(ByteRun::with_fill(b"ab".to_vec(), 5).unwrap());
        runs.push(ByteRun::with_fill(b"-".to_vec(), 3).unwrap());

        let config = ExtractConfig::new().with_buffer_size(2);
        let chunks: Vec<Vec<u8>> = runs
            .iter_contents("unused.raw", &config)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(chunks[0], b"ab");
        assert_eq!(chunks.concat(), b"ababa---");
        assert!(chunks.iter().all(|c| c.len() <= 2));
    }

    #[test]
    fn test_fill_must_be_writable_as_xml() {
        assert!(matches!(
            ByteRun::with_fill(b"\0".to_vec(), 8),
            Err(Error::InvalidByteRun(_))
        ));
        assert!(ByteRun::with_fill(vec![0xff, 0xfe], 8).is_err());
        assert!(ByteRun::with_fill(Vec::new(), 8).is_err());

        let mut run = ByteRun::with_fill("é".as_bytes().to_vec(), 8).unwrap();
        assert!(run.set_fill(Some(vec![0x80])).is_err());
        assert_eq!(run.fill(), Some("é".as_bytes()));

        let mut el = Element::new("byte_run");
        el.set_attr("len", "4");
        el.set_attr("fill", "\u{1}");
        let mut diag = Diagnostics::new();
        assert!(ByteRun::from_element(&el, &mut diag).is_err());
    }

    #[test]
    fn test_run_past_end_of_address_space_is_invalid() {
        let mut runs = ByteRuns::new();
        runs.push(ByteRun::with_img_offset(u64::MAX - 1, 4));
        let mut iter = runs.iter_contents("unused.raw", &ExtractConfig::new());
        assert!(matches!(iter.next(), Some(Err(Error::InvalidByteRun(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_run_without_source_is_invalid() {
        let mut runs = ByteRuns::new();
        runs.push(ByteRun {
            len: Some(4),
            ..Default::default()
        });
        let mut iter = runs.iter_contents("unused.raw", &ExtractConfig::new());
        assert!(matches!(iter.next(), Some(Err(Error::InvalidByteRun(_)))));
        assert!(iter.next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_extraction_failure_surfaces() {
        let mut runs = ByteRuns::new();
        runs.push(ByteRun::with_img_offset(0, 512));
        let config = ExtractConfig::new().with_program("false");
        let results: Vec<Result<Vec<u8>>> = runs.iter_contents("image.raw", &config).collect();
        assert!(matches!(
            results.last(),
            Some(Err(Error::ContentExtraction { .. }))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_image_contents_skip_sector_lead() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("image.raw");
        let data: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&image, &data).unwrap();

        // Emits the image from the first requested sector onward
        let script = dir.path().join("sector_cat.sh");
        std::fs::write(&script, "#!/bin/sh\ntail -c +$(( $4 * $2 + 1 )) \"$7\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut runs = ByteRuns::new();
        runs.push(ByteRun::with_img_offset(700, 600));
        let config = ExtractConfig::new()
            .with_program(&script)
            .with_buffer_size(256);

        let chunks: Vec<Vec<u8>> = runs
            .iter_contents(&image, &config)
            .collect::<Result<_>>()
            .unwrap();
        assert!(chunks.iter().all(|c| c.len() <= 256));
        assert_eq!(chunks.concat(), &data[700..1300]);
    }
}
