//! Differential annotations.
//!
//! An entity compared against an earlier scan of the same media carries two
//! kinds of marks: whole-entity [`Annotation`]s written as root attributes
//! (`delta:new_file="1"`) and a set of changed property names written as
//! `delta:changed_property="1"` on the matching child elements.

use crate::element::Element;
use crate::objects::common::CHANGED_PROPERTY;
use std::collections::BTreeSet;
use std::fmt;

/// A whole-entity differential annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Annotation {
    /// Present only in the newer scan
    New,
    /// Present only in the older scan
    Deleted,
    /// Same entity under a different name
    Renamed,
    /// Metadata changed
    Changed,
    /// Content changed
    Modified,
    /// Matched an entity of the older scan
    Matched,
    /// Matched by a heuristic rather than an exact key
    MatchedSoft,
}

impl Annotation {
    /// All annotations, in attribute order.
    pub const ALL: [Annotation; 7] = [
        Annotation::New,
        Annotation::Deleted,
        Annotation::Renamed,
        Annotation::Changed,
        Annotation::Modified,
        Annotation::Matched,
        Annotation::MatchedSoft,
    ];

    /// Attribute name for an entity of the given kind (`file`, `volume`,
    /// `cell`, `hive`).
    pub fn attr_name(&self, kind: &str) -> String {
        match self {
            Annotation::New => format!("delta:new_{kind}"),
            Annotation::Deleted => format!("delta:deleted_{kind}"),
            Annotation::Renamed => format!("delta:renamed_{kind}"),
            Annotation::Changed => format!("delta:changed_{kind}"),
            Annotation::Modified => format!("delta:modified_{kind}"),
            Annotation::Matched => "delta:matched".to_string(),
            Annotation::MatchedSoft => "delta:matched_soft".to_string(),
        }
    }

    /// Recognizes an annotation attribute name.
    pub fn from_attr(name: &str, kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.attr_name(kind) == name)
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Annotation::New => "new",
            Annotation::Deleted => "deleted",
            Annotation::Renamed => "renamed",
            Annotation::Changed => "changed",
            Annotation::Modified => "modified",
            Annotation::Matched => "matched",
            Annotation::MatchedSoft => "matched_soft",
        };
        write!(f, "{}", s)
    }
}

/// Writes annotations onto an entity's root element.
pub(crate) fn write_annotations(el: &mut Element, annos: &BTreeSet<Annotation>, kind: &str) {
    for anno in annos {
        el.set_attr(anno.attr_name(kind), "1");
    }
}

/// Returns true if the child element carries the changed-property marker.
pub(crate) fn is_marked_changed(el: &Element) -> bool {
    matches!(el.attr(CHANGED_PROPERTY), Some("1") | Some("true"))
}

/// True for the self-closing marker element written for a changed property
/// whose new value is absent.
pub(crate) fn is_absent_marker(el: &Element) -> bool {
    el.children.is_empty() && el.text.is_none() && is_marked_changed(el)
}

/// Tracks which changed properties still need a marker while an entity
/// emits its children.
pub(crate) struct DiffMarker<'a> {
    context: &'static str,
    pending: BTreeSet<&'a str>,
}

impl<'a> DiffMarker<'a> {
    pub(crate) fn new(context: &'static str, diffs: &'a BTreeSet<String>) -> Self {
        Self {
            context,
            pending: diffs.iter().map(String::as_str).collect(),
        }
    }

    /// Appends `child` for `property`, marking it when the property changed.
    ///
    /// A changed property with no value gets an empty placeholder element
    /// named after the property.
    pub(crate) fn emit(&mut self, parent: &mut Element, property: &str, child: Option<Element>) {
        self.emit_with(parent, property, child, || Element::new(property));
    }

    /// Like [`DiffMarker::emit`] with a custom placeholder.
    pub(crate) fn emit_with(
        &mut self,
        parent: &mut Element,
        property: &str,
        child: Option<Element>,
        placeholder: impl FnOnce() -> Element,
    ) {
        let changed = self.pending.remove(property);
        match (child, changed) {
            (Some(mut el), true) => {
                el.set_attr(CHANGED_PROPERTY, "1");
                parent.push(el);
            }
            (Some(el), false) => parent.push(el),
            (None, true) => {
                let mut el = placeholder();
                el.set_attr(CHANGED_PROPERTY, "1");
                parent.push(el);
            }
            (None, false) => {}
        }
    }

    /// Drops a property from the pending set without emitting anything.
    pub(crate) fn skip(&mut self, property: &str) {
        self.pending.remove(property);
    }

    /// Logs any changed property that no emitted element accounted for.
    pub(crate) fn finish(self) {
        for property in self.pending {
            tracing::warn!(
                entity = self.context,
                property,
                "Changed property has no element to annotate"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_attr_names() {
        assert_eq!(Annotation::New.attr_name("file"), "delta:new_file");
        assert_eq!(Annotation::Deleted.attr_name("volume"), "delta:deleted_volume");
        assert_eq!(Annotation::Matched.attr_name("cell"), "delta:matched");
        assert_eq!(
            Annotation::from_attr("delta:modified_file", "file"),
            Some(Annotation::Modified)
        );
        assert_eq!(Annotation::from_attr("delta:modified_file", "cell"), None);
        assert_eq!(
            Annotation::from_attr("delta:matched_soft", "hive"),
            Some(Annotation::MatchedSoft)
        );
    }

    #[test]
    fn test_diff_marker() {
        let diffs: BTreeSet<String> =
            ["filesize", "mtime", "md5"].iter().map(|s| s.to_string()).collect();
        let mut parent = Element::new("fileobject");
        let mut marker = DiffMarker::new("fileobject", &diffs);

        marker.emit(&mut parent, "filename", Some(Element::with_text("filename", "a")));
        marker.emit(&mut parent, "filesize", Some(Element::with_text("filesize", "3")));
        marker.emit(&mut parent, "mtime", None);
        marker.finish();

        assert_eq!(parent.children.len(), 3);
        assert!(!is_marked_changed(&parent.children[0]));
        assert!(is_marked_changed(&parent.children[1]));
        assert_eq!(parent.children[2].name, "mtime");
        assert!(parent.children[2].text.is_none());
        assert!(is_marked_changed(&parent.children[2]));
    }
}
