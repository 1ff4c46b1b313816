//! Common types shared across DFXML objects.
//!
//! This module contains foundational types used throughout DFXML:
//! - Namespace constants
//! - [`Hashes`] - Cryptographic hash values
//! - [`TimestampObject`] - Forensic timestamps with precision

use crate::casts::int_cast;
use crate::diagnostics::Diagnostics;
use crate::element::Element;
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DFXML Namespaces and Constants
// ============================================================================

/// DFXML schema version
pub const DFXML_VERSION: &str = "1.2.0";

/// RegXML schema version
pub const REGXML_VERSION: &str = "0.2";

/// Dublin Core namespace
pub const XMLNS_DC: &str = "http://purl.org/dc/elements/1.1/";

/// DFXML namespace
pub const XMLNS_DFXML: &str = "http://www.forensicswiki.org/wiki/Category:Digital_Forensics_XML";

/// Delta (differencing) namespace
pub const XMLNS_DELTA: &str = "http://www.forensicswiki.org/wiki/Forensic_Disk_Differencing";

/// DFXML extensions namespace
pub const XMLNS_DFXML_EXT: &str =
    "http://www.forensicswiki.org/wiki/Category:Digital_Forensics_XML#extensions";

/// RegXML namespace
pub const XMLNS_REGXML: &str = "http://www.forensicswiki.org/wiki/RegXML";

/// Attribute carried by a child element whose property changed.
pub const CHANGED_PROPERTY: &str = "delta:changed_property";

// ============================================================================
// Hash Types
// ============================================================================

/// Supported hash algorithms in DFXML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HashType {
    /// MD5 (128-bit)
    Md5,
    /// SHA-1 (160-bit)
    Sha1,
    /// SHA-224 (224-bit)
    Sha224,
    /// SHA-256 (256-bit)
    Sha256,
    /// SHA-384 (384-bit)
    Sha384,
    /// SHA-512 (512-bit)
    Sha512,
}

impl HashType {
    /// All hash types in serialization order.
    pub const ALL: [HashType; 6] = [
        HashType::Md5,
        HashType::Sha1,
        HashType::Sha224,
        HashType::Sha256,
        HashType::Sha384,
        HashType::Sha512,
    ];

    /// Returns the expected length of the hash in hexadecimal characters.
    pub fn expected_hex_len(&self) -> usize {
        match self {
            HashType::Md5 => 32,
            HashType::Sha1 => 40,
            HashType::Sha224 => 56,
            HashType::Sha256 => 64,
            HashType::Sha384 => 96,
            HashType::Sha512 => 128,
        }
    }

    /// Returns the `type` attribute value, which is also the property name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashType::Md5 => "md5",
            HashType::Sha1 => "sha1",
            HashType::Sha224 => "sha224",
            HashType::Sha256 => "sha256",
            HashType::Sha384 => "sha384",
            HashType::Sha512 => "sha512",
        }
    }
}

impl FromStr for HashType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(HashType::Md5),
            "sha1" => Ok(HashType::Sha1),
            "sha224" => Ok(HashType::Sha224),
            "sha256" => Ok(HashType::Sha256),
            "sha384" => Ok(HashType::Sha384),
            "sha512" => Ok(HashType::Sha512),
            _ => Err(Error::InvalidHash {
                hash_type: s.to_string(),
                message: "Unknown hash type".to_string(),
            }),
        }
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A collection of cryptographic hash values.
///
/// All hashes are stored as lowercase hexadecimal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hashes {
    /// MD5 hash (32 hex characters)
    pub md5: Option<String>,
    /// SHA-1 hash (40 hex characters)
    pub sha1: Option<String>,
    /// SHA-224 hash (56 hex characters)
    pub sha224: Option<String>,
    /// SHA-256 hash (64 hex characters)
    pub sha256: Option<String>,
    /// SHA-384 hash (96 hex characters)
    pub sha384: Option<String>,
    /// SHA-512 hash (128 hex characters)
    pub sha512: Option<String>,
}

impl Hashes {
    /// Creates a new empty Hashes collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if any hash is set.
    pub fn has_any(&self) -> bool {
        HashType::ALL.iter().any(|t| self.get(*t).is_some())
    }

    /// Sets a hash value by type.
    ///
    /// The value must be hexadecimal; it is stored lowercased.
    pub fn set(&mut self, hash_type: HashType, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidHash {
                hash_type: hash_type.to_string(),
                message: format!("not a hexadecimal digest: {value:?}"),
            });
        }
        *self.slot_mut(hash_type) = Some(value.to_lowercase());
        Ok(())
    }

    /// Clears a hash value.
    pub fn clear(&mut self, hash_type: HashType) {
        *self.slot_mut(hash_type) = None;
    }

    /// Gets a hash value by type.
    pub fn get(&self, hash_type: HashType) -> Option<&str> {
        match hash_type {
            HashType::Md5 => self.md5.as_deref(),
            HashType::Sha1 => self.sha1.as_deref(),
            HashType::Sha224 => self.sha224.as_deref(),
            HashType::Sha256 => self.sha256.as_deref(),
            HashType::Sha384 => self.sha384.as_deref(),
            HashType::Sha512 => self.sha512.as_deref(),
        }
    }

    fn slot_mut(&mut self, hash_type: HashType) -> &mut Option<String> {
        match hash_type {
            HashType::Md5 => &mut self.md5,
            HashType::Sha1 => &mut self.sha1,
            HashType::Sha224 => &mut self.sha224,
            HashType::Sha256 => &mut self.sha256,
            HashType::Sha384 => &mut self.sha384,
            HashType::Sha512 => &mut self.sha512,
        }
    }

    /// Iterates over all set hashes.
    pub fn iter(&self) -> impl Iterator<Item = (HashType, &str)> {
        HashType::ALL
            .into_iter()
            .filter_map(move |t| self.get(t).map(|v| (t, v)))
    }

    /// Reads a `hashdigest` element into this collection.
    ///
    /// Returns `false` if the digest type is not one this crate models.
    pub(crate) fn read_hashdigest(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<bool> {
        let type_str = el.attr("type").unwrap_or("");
        let Ok(hash_type) = type_str.parse::<HashType>() else {
            diag.unknown_attribute("hashdigest", None, &format!("type={type_str}"));
            return Ok(false);
        };
        match el.text().map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => self.set(hash_type, text)?,
            None => self.clear(hash_type),
        }
        Ok(true)
    }

    /// Builds the `hashdigest` element for one hash type, if set.
    pub(crate) fn hashdigest_element(&self, hash_type: HashType) -> Option<Element> {
        self.get(hash_type).map(|value| {
            let mut el = Element::with_text("hashdigest", value);
            el.set_attr("type", hash_type.as_str());
            el
        })
    }
}

// ============================================================================
// Timestamp Types
// ============================================================================

/// Time unit for precision specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeUnit {
    /// Days
    Day,
    /// Seconds
    #[default]
    Second,
    /// Milliseconds
    Millisecond,
    /// Nanoseconds
    Nanosecond,
}

impl TimeUnit {
    /// Returns the string representation of this time unit.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Day => "d",
            TimeUnit::Second => "s",
            TimeUnit::Millisecond => "ms",
            TimeUnit::Nanosecond => "ns",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "d" => Ok(TimeUnit::Day),
            "s" | "" => Ok(TimeUnit::Second),
            "ms" => Ok(TimeUnit::Millisecond),
            "ns" => Ok(TimeUnit::Nanosecond),
            _ => Err(Error::InvalidPrecision(format!("Unknown time unit: {}", s))),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Timestamp precision as (resolution, unit).
///
/// For example, `Precision { resolution: 100, unit: TimeUnit::Nanosecond }`
/// represents 100ns precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Precision {
    /// The numeric resolution value
    pub resolution: u32,
    /// The time unit (seconds, milliseconds, etc.)
    pub unit: TimeUnit,
}

impl Precision {
    /// Creates a new Precision with the given resolution and unit.
    pub fn new(resolution: u32, unit: TimeUnit) -> Self {
        Self { resolution, unit }
    }
}

impl From<(u32, TimeUnit)> for Precision {
    fn from((resolution, unit): (u32, TimeUnit)) -> Self {
        Self { resolution, unit }
    }
}

impl FromStr for Precision {
    type Err = Error;

    /// Parses `<digits>[unit]`, e.g. `"100ns"`, `"2"`, `"1d"`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digit_end = s
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(s.len());

        if digit_end == 0 {
            return Err(Error::InvalidPrecision(format!(
                "No numeric value in precision: {:?}",
                s
            )));
        }

        let resolution = int_cast::<u32>(Some(&s[..digit_end]))
            .map_err(|_| Error::InvalidPrecision(s.to_string()))?
            .unwrap_or_default();
        let unit = s[digit_end..].parse()?;

        Ok(Precision { resolution, unit })
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.resolution, self.unit)
    }
}

/// The type/name of a timestamp (mtime, atime, ctime, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimestampName {
    /// Modification time
    Mtime,
    /// Access time
    Atime,
    /// Change time (inode change on Unix)
    Ctime,
    /// Creation time
    Crtime,
    /// Deletion time
    Dtime,
    /// Backup time
    BkupTime,
}

impl TimestampName {
    /// Returns the XML element name for this timestamp type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampName::Mtime => "mtime",
            TimestampName::Atime => "atime",
            TimestampName::Ctime => "ctime",
            TimestampName::Crtime => "crtime",
            TimestampName::Dtime => "dtime",
            TimestampName::BkupTime => "bkup_time",
        }
    }
}

impl FromStr for TimestampName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mtime" => Ok(TimestampName::Mtime),
            "atime" => Ok(TimestampName::Atime),
            "ctime" => Ok(TimestampName::Ctime),
            "crtime" => Ok(TimestampName::Crtime),
            "dtime" => Ok(TimestampName::Dtime),
            "bkup_time" => Ok(TimestampName::BkupTime),
            _ => Err(Error::InvalidTimestamp(format!(
                "Unknown timestamp name: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for TimestampName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A forensic timestamp with optional precision and name.
///
/// Equality compares the time value and the precision; the name only says
/// which slot the timestamp occupies. Ordering puts a timestamp without a
/// time value below every timestamp that has one. Two timestamps that both
/// lack a time value are only ever equal or unordered.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimestampObject {
    /// The timestamp type (mtime, atime, etc.)
    pub name: Option<TimestampName>,
    time: Option<DateTime<FixedOffset>>,
    /// Precision information
    pub prec: Option<Precision>,
}

impl TimestampObject {
    /// Creates a new empty timestamp.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a timestamp with a specific name and time.
    pub fn with_name_and_time(name: TimestampName, time: DateTime<FixedOffset>) -> Self {
        Self {
            name: Some(name),
            time: Some(time),
            prec: None,
        }
    }

    /// Creates a named timestamp from ISO 8601 text.
    pub fn parse(name: TimestampName, text: &str) -> Result<Self> {
        let mut ts = Self {
            name: Some(name),
            ..Default::default()
        };
        ts.set_time_str(Some(text))?;
        Ok(ts)
    }

    /// The canonical time value.
    pub fn time(&self) -> Option<&DateTime<FixedOffset>> {
        self.time.as_ref()
    }

    /// Sets the time value directly.
    pub fn set_time(&mut self, time: Option<DateTime<FixedOffset>>) {
        self.time = time;
    }

    /// Sets the time value from ISO 8601 text.
    pub fn set_time_str(&mut self, text: Option<&str>) -> Result<()> {
        self.time = match text {
            Some(t) => Some(Self::parse_iso8601(t)?),
            None => None,
        };
        Ok(())
    }

    /// Sets the time value from seconds since the Unix epoch (UTC).
    pub fn set_time_epoch(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            return Err(Error::InvalidTimestamp(format!("{seconds}")));
        }
        let secs = seconds.floor();
        let nanos = ((seconds - secs) * 1_000_000_000.0).round() as u32;
        let dt = DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
            .ok_or_else(|| Error::InvalidTimestamp(format!("{seconds}")))?;
        self.time = Some(dt.fixed_offset());
        Ok(())
    }

    /// Sets the precision from its compact text form.
    pub fn set_prec_str(&mut self, text: Option<&str>) -> Result<()> {
        self.prec = match text {
            Some(t) => Some(t.parse()?),
            None => None,
        };
        Ok(())
    }

    /// Parses an ISO 8601 timestamp string.
    pub fn parse_iso8601(s: &str) -> Result<DateTime<FixedOffset>> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt);
        }

        let formats = [
            "%Y-%m-%dT%H:%M:%S%.f%:z",
            "%Y-%m-%dT%H:%M:%S%:z",
            "%Y-%m-%dT%H:%M:%S%.f%z",
            "%Y-%m-%dT%H:%M:%S%z",
        ];
        for fmt in formats {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Ok(dt);
            }
        }

        // Timestamps without a zone are taken as UTC
        let naive_formats = [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];
        for fmt in naive_formats {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Utc.from_utc_datetime(&naive).fixed_offset());
            }
        }

        Err(Error::InvalidTimestamp(format!(
            "Cannot parse timestamp: {}",
            s
        )))
    }

    /// Seconds since the Unix epoch, with fractional part.
    pub fn timestamp(&self) -> Option<f64> {
        self.time
            .map(|t| t.timestamp() as f64 + (t.timestamp_subsec_nanos() as f64 / 1_000_000_000.0))
    }

    /// Text form used in XML: RFC 3339, `Z` for UTC, minimal fraction digits.
    pub fn time_text(&self) -> Option<String> {
        self.time.map(|t| {
            if t.timestamp_subsec_nanos() == 0 {
                return t.to_rfc3339_opts(SecondsFormat::Secs, true);
            }
            let text = t.to_rfc3339_opts(SecondsFormat::Nanos, true);
            let Some(dot) = text.find('.') else {
                return text;
            };
            let digits = text[dot + 1..].bytes().take_while(u8::is_ascii_digit).count();
            let fraction = text[dot + 1..dot + 1 + digits].trim_end_matches('0');
            format!("{}.{}{}", &text[..dot], fraction, &text[dot + 1 + digits..])
        })
    }

    /// Orders two timestamps, failing when both lack a time value and are
    /// not equal.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering> {
        self.partial_cmp(other).ok_or(Error::IncomparableTimestamps)
    }

    /// Populates from a timestamp element (`mtime`, `atime`, ...).
    pub fn populate_from_element(&mut self, el: &Element, diag: &mut Diagnostics) -> Result<()> {
        self.name = Some(el.name.parse()?);
        for (key, value) in &el.attributes {
            match key.as_str() {
                "prec" => self.set_prec_str(Some(value))?,
                CHANGED_PROPERTY => {}
                other => {
                    diag.unknown_attribute(&el.name, None, other);
                }
            }
        }
        self.set_time_str(el.text().filter(|t| !t.trim().is_empty()))?;
        Ok(())
    }

    /// Builds a timestamp from a timestamp element.
    pub fn from_element(el: &Element, diag: &mut Diagnostics) -> Result<Self> {
        let mut ts = Self::new();
        ts.populate_from_element(el, diag)?;
        Ok(ts)
    }

    /// Serializes the timestamp.
    ///
    /// Fails when no name is set, since the name is the element tag.
    pub fn to_element(&self) -> Result<Element> {
        let name = self
            .name
            .ok_or_else(|| Error::MissingField("timestamp name".to_string()))?;
        Ok(self.to_element_named(name))
    }

    /// Serializes the timestamp into the slot `name`, whatever its own
    /// name says.
    pub fn to_element_named(&self, name: TimestampName) -> Element {
        let mut el = Element::new(name.as_str());
        if let Some(prec) = self.prec {
            el.set_attr("prec", prec.to_string());
        }
        el.text = self.time_text();
        el
    }

    /// True when neither a time nor a precision is set.
    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.prec.is_none()
    }
}

impl PartialEq for TimestampObject {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.prec == other.prec
    }
}

/// Earlier times order first and a null time orders before any time. Two
/// timestamps at the same instant, or two nulls, are `Equal` only when their
/// precisions agree and are otherwise unordered.
impl PartialOrd for TimestampObject {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (&self.time, &other.time) {
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Equal if self.prec != other.prec => None,
                ordering => Some(ordering),
            },
            (None, Some(_)) => Some(Ordering::Less),
            (Some(_), None) => Some(Ordering::Greater),
            (None, None) if self == other => Some(Ordering::Equal),
            (None, None) => None,
        }
    }
}

impl fmt::Display for TimestampObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time_text() {
            Some(t) => write!(f, "{}", t),
            None => write!(f, ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_type_from_str() {
        assert_eq!("md5".parse::<HashType>().unwrap(), HashType::Md5);
        assert_eq!("SHA256".parse::<HashType>().unwrap(), HashType::Sha256);
        assert!("crc32".parse::<HashType>().is_err());
    }

    #[test]
    fn test_hashes() {
        let mut hashes = Hashes::new();
        assert!(!hashes.has_any());

        hashes
            .set(HashType::Md5, "D41D8CD98F00B204E9800998ECF8427E")
            .unwrap();
        assert!(hashes.has_any());
        assert_eq!(
            hashes.get(HashType::Md5),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
        assert!(hashes.set(HashType::Sha1, "not-hex").is_err());
        assert_eq!(hashes.iter().count(), 1);
    }

    #[test]
    fn test_precision_parse() {
        let p: Precision = "100ns".parse().unwrap();
        assert_eq!(p, Precision::new(100, TimeUnit::Nanosecond));

        let p: Precision = "2".parse().unwrap();
        assert_eq!(p, Precision::new(2, TimeUnit::Second));

        let p: Precision = "1d".parse().unwrap();
        assert_eq!(p.unit, TimeUnit::Day);
        assert_eq!(p.to_string(), "1d");

        assert!("ns".parse::<Precision>().is_err());
        assert!("5years".parse::<Precision>().is_err());
        assert!("-1s".parse::<Precision>().is_err());
    }

    #[test]
    fn test_timestamp_parse() {
        let ts = TimestampObject::parse(TimestampName::Mtime, "2024-01-15T10:30:00Z").unwrap();
        assert_eq!(ts.timestamp(), Some(1705314600.0));
        assert_eq!(ts.time_text().as_deref(), Some("2024-01-15T10:30:00Z"));

        let dt = TimestampObject::parse_iso8601("2024-01-15T10:30:00.123456Z").unwrap();
        assert_eq!(dt.timestamp_subsec_nanos(), 123456000);

        let ts =
            TimestampObject::parse(TimestampName::Mtime, "2024-01-15T10:30:00.25+02:00").unwrap();
        assert_eq!(ts.time_text().as_deref(), Some("2024-01-15T10:30:00.25+02:00"));

        assert!(TimestampObject::parse(TimestampName::Atime, "yesterday").is_err());
    }

    #[test]
    fn test_timestamp_epoch() {
        let mut ts = TimestampObject::new();
        ts.set_time_epoch(1232673825.0).unwrap();
        assert_eq!(ts.time_text().as_deref(), Some("2009-01-23T01:23:45Z"));
    }

    #[test]
    fn test_null_timestamp_ordering() {
        let null = TimestampObject::new();
        let set = TimestampObject::parse(TimestampName::Mtime, "2009-01-23T01:23:45Z").unwrap();
        assert!(null < set);
        assert!(set > null);

        let other_null = TimestampObject::new();
        assert!(!(null < other_null));
        assert!(!(null > other_null));
        assert_eq!(null.try_cmp(&other_null).unwrap(), Ordering::Equal);

        let mut prec_null = TimestampObject::new();
        prec_null.prec = Some(Precision::new(1, TimeUnit::Second));
        assert!(!(null < prec_null));
        assert!(!(null > prec_null));
        assert!(matches!(
            null.try_cmp(&prec_null),
            Err(Error::IncomparableTimestamps)
        ));
    }

    #[test]
    fn test_same_instant_ordering_follows_precision() {
        let mtime = TimestampObject::parse(TimestampName::Mtime, "2009-01-01T00:00:00Z").unwrap();
        let mut coarse = mtime.clone();
        coarse.set_prec_str(Some("2s")).unwrap();
        assert_ne!(mtime, coarse);
        assert_eq!(mtime.partial_cmp(&coarse), None);
        assert!(matches!(mtime.try_cmp(&coarse), Err(Error::IncomparableTimestamps)));

        let later = TimestampObject::parse(TimestampName::Mtime, "2009-01-01T00:00:01Z").unwrap();
        assert!(coarse < later);
        assert_eq!(mtime.partial_cmp(&mtime.clone()), Some(Ordering::Equal));
    }

    #[test]
    fn test_timestamp_element_round_trip() {
        let mut ts = TimestampObject::parse(TimestampName::Crtime, "2020-01-01T00:00:00Z").unwrap();
        ts.prec = Some(Precision::new(100, TimeUnit::Nanosecond));
        let el = ts.to_element().unwrap();
        assert_eq!(el.name, "crtime");
        assert_eq!(el.attr("prec"), Some("100ns"));

        let mut diag = Diagnostics::new();
        let back = TimestampObject::from_element(&el, &mut diag).unwrap();
        assert_eq!(back, ts);
        assert_eq!(back.name, Some(TimestampName::Crtime));
    }
}
