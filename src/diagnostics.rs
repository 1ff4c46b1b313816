//! Parse diagnostics.
//!
//! Unknown elements and attributes are tolerated while populating entities.
//! Each distinct (namespace, local name) pair is reported once per
//! [`Diagnostics`] value; later sightings are counted but stay quiet. A
//! collector lives as long as one parse operation (for example one
//! [`DFXMLReader`](crate::reader::DFXMLReader)), so warning behavior is
//! reproducible per call. It is not meant to be shared between threads.

use std::collections::BTreeMap;

/// What kind of markup a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkupKind {
    /// A child element
    Element,
    /// An attribute
    Attribute,
}

/// Identity of an unrecognized piece of markup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnknownName {
    /// Element or attribute
    pub kind: MarkupKind,
    /// Namespace URI, if the name was qualified
    pub namespace: Option<String>,
    /// Local name
    pub local_name: String,
}

/// Collector for structural-parse warnings.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    seen: BTreeMap<UnknownName, usize>,
}

impl Diagnostics {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an unrecognized child element of `context`.
    ///
    /// Returns `true` if this is the first time the name was seen, in which
    /// case a warning has been logged.
    pub fn unknown_element(
        &mut self,
        context: &str,
        namespace: Option<&str>,
        local_name: &str,
    ) -> bool {
        self.record(MarkupKind::Element, context, namespace, local_name)
    }

    /// Records an unrecognized attribute on `context`.
    pub fn unknown_attribute(
        &mut self,
        context: &str,
        namespace: Option<&str>,
        local_name: &str,
    ) -> bool {
        self.record(MarkupKind::Attribute, context, namespace, local_name)
    }

    fn record(
        &mut self,
        kind: MarkupKind,
        context: &str,
        namespace: Option<&str>,
        local_name: &str,
    ) -> bool {
        let key = UnknownName {
            kind,
            namespace: namespace.map(str::to_string),
            local_name: local_name.to_string(),
        };
        let count = self.seen.entry(key).or_insert(0);
        *count += 1;
        if *count == 1 {
            tracing::warn!(
                kind = ?kind,
                namespace = namespace.unwrap_or(""),
                name = local_name,
                context,
                "Ignoring unrecognized markup"
            );
            true
        } else {
            false
        }
    }

    /// Number of distinct unknown names seen so far.
    pub fn distinct_count(&self) -> usize {
        self.seen.len()
    }

    /// Number of times a given element name was encountered.
    pub fn element_count(&self, namespace: Option<&str>, local_name: &str) -> usize {
        let key = UnknownName {
            kind: MarkupKind::Element,
            namespace: namespace.map(str::to_string),
            local_name: local_name.to_string(),
        };
        self.seen.get(&key).copied().unwrap_or(0)
    }

    /// Iterates over the distinct unknown names.
    pub fn iter(&self) -> impl Iterator<Item = &UnknownName> {
        self.seen.keys()
    }

    /// Returns true if nothing unknown was encountered.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warns_once_per_name() {
        let mut diag = Diagnostics::new();
        assert!(diag.unknown_element("fileobject", None, "foo"));
        assert!(!diag.unknown_element("fileobject", None, "foo"));
        assert!(diag.unknown_element("fileobject", Some("urn:x"), "foo"));
        assert!(diag.unknown_attribute("fileobject", None, "foo"));

        assert_eq!(diag.distinct_count(), 3);
        assert_eq!(diag.element_count(None, "foo"), 2);
    }
}
