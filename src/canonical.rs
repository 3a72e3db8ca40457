//! Canonicalization of target markup for structural comparison.
//!
//! Both the compiler's output and the recorded expectation are XML fragments,
//! possibly with several top-level elements. Each is wrapped in the same
//! synthetic `<Map>` root and parsed with `roxmltree` into a [`CanonicalNode`]
//! tree in which
//!
//! - attributes are keyed and ordered by name,
//! - text is trimmed, and whitespace-only text disappears,
//! - comments and processing instructions are dropped,
//! - adjacent text and CDATA sections are merged.
//!
//! Two fragments are structurally equivalent iff their canonical trees are equal.

use std::{collections::BTreeMap, fmt};

use roxmltree::{Document, Node};

use crate::{OracleError, Result};

/// Name of the synthetic root both sides are wrapped in.
pub const SYNTHETIC_ROOT: &str = "Map";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalNode {
    Element {
        name: String,
        attributes: BTreeMap<String, String>,
        children: Vec<CanonicalNode>,
    },
    Text(String),
}

/// Canonicalizes a markup fragment after wrapping it in the synthetic root.
///
/// A leading XML declaration and DOCTYPE are stripped first, so complete
/// documents and bare fragments canonicalize the same way.
pub fn canonicalize(text: &str) -> Result<CanonicalNode> {
    let body = strip_prolog(text);
    canonicalize_document(&format!("<{root}>{body}</{root}>", root = SYNTHETIC_ROOT))
}

/// Canonicalizes a complete document without wrapping it.
pub fn canonicalize_document(xml: &str) -> Result<CanonicalNode> {
    let doc = Document::parse(xml).map_err(|e| OracleError::UnparsableArtifact {
        message: e.to_string(),
    })?;
    Ok(element_from_xml(doc.root_element()))
}

fn element_from_xml(node: Node<'_, '_>) -> CanonicalNode {
    let attributes = node
        .attributes()
        .map(|a| (qualified_name(a.namespace(), a.name()), a.value().to_string()))
        .collect();

    let mut children = Vec::new();
    let mut pending_text = String::new();
    for child in node.children() {
        if child.is_text() {
            pending_text.push_str(child.text().unwrap_or_default());
        } else if child.is_element() {
            flush_text(&mut pending_text, &mut children);
            children.push(element_from_xml(child));
        }
    }
    flush_text(&mut pending_text, &mut children);

    CanonicalNode::Element {
        name: qualified_name(node.tag_name().namespace(), node.tag_name().name()),
        attributes,
        children,
    }
}

fn flush_text(pending: &mut String, children: &mut Vec<CanonicalNode>) {
    let trimmed = pending.trim();
    if !trimmed.is_empty() {
        children.push(CanonicalNode::Text(trimmed.to_string()));
    }
    pending.clear();
}

fn qualified_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{{{}}}{}", ns, name),
        None => name.to_string(),
    }
}

/// Drops an XML declaration and a DOCTYPE (including an internal subset).
fn strip_prolog(text: &str) -> &str {
    let mut rest = text.trim_start();
    if rest.starts_with("<?xml") {
        rest = match rest.find("?>") {
            Some(end) => rest[end + 2..].trim_start(),
            None => return rest,
        };
    }
    if rest.starts_with("<!DOCTYPE") {
        let mut depth = 0usize;
        for (i, c) in rest.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '>' if depth == 0 => return rest[i + 1..].trim_start(),
                _ => {}
            }
        }
    }
    rest
}

// =============================================================================
// RENDERING
// =============================================================================

impl CanonicalNode {
    /// Serializes the tree back to compact XML.
    ///
    /// Canonicalizing the result yields an equal tree.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        match self {
            CanonicalNode::Text(text) => out.push_str(&escape(text, false)),
            CanonicalNode::Element {
                name,
                attributes,
                children,
            } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attributes {
                    out.push_str(&format!(" {}=\"{}\"", key, escape(value, true)));
                }
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for child in children {
                    child.write_xml(out);
                }
                out.push_str(&format!("</{}>", name));
            }
        }
    }

    fn write_pretty(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match self {
            CanonicalNode::Text(text) => writeln!(f, "{}{:?}", indent, text),
            CanonicalNode::Element {
                name,
                attributes,
                children,
            } => {
                write!(f, "{}<{}", indent, name)?;
                for (key, value) in attributes {
                    write!(f, " {}={:?}", key, value)?;
                }
                if children.is_empty() {
                    return writeln!(f, "/>");
                }
                writeln!(f, ">")?;
                for child in children {
                    child.write_pretty(f, depth + 1)?;
                }
                writeln!(f, "{}</{}>", indent, name)
            }
        }
    }
}

/// Indented, one node per line. Deterministic for equal trees.
impl fmt::Display for CanonicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_pretty(f, 0)
    }
}

fn escape(text: &str, in_attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_order_is_insignificant() {
        let a = canonicalize(r#"<Style name="road" filter-mode="first"/>"#).unwrap();
        let b = canonicalize(r#"<Style filter-mode="first" name="road"/>"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn insignificant_whitespace_is_ignored() {
        let a = canonicalize("<Style><Rule><Filter>[type] = 'primary'</Filter></Rule></Style>").unwrap();
        let b = canonicalize(
            "\n<Style>\n  <Rule>\n    <Filter>\n      [type] = 'primary'\n    </Filter>\n  </Rule>\n</Style>\n",
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn element_order_is_significant() {
        let a = canonicalize("<Style name=\"a\"/><Style name=\"b\"/>").unwrap();
        let b = canonicalize("<Style name=\"b\"/><Style name=\"a\"/>").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn multi_root_fragments_share_the_synthetic_root() {
        let tree = canonicalize("<Style/><Layer/>").unwrap();
        match tree {
            CanonicalNode::Element { name, children, .. } => {
                assert_eq!(name, SYNTHETIC_ROOT);
                assert_eq!(children.len(), 2);
            }
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn cdata_and_text_merge() {
        let a = canonicalize("<Filter><![CDATA[[a] > 1]]></Filter>").unwrap();
        let b = canonicalize("<Filter>[a] &gt; 1</Filter>").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn prolog_is_stripped() {
        let a = canonicalize(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!DOCTYPE Map[\n  <!ENTITY x \"y\">\n]>\n<Style/>",
        )
        .unwrap();
        let b = canonicalize("<Style/>").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let text = r##"<Style name="a&amp;b"><Rule>  x &lt; y  <PolygonSymbolizer fill="#fff"/></Rule></Style>"##;
        let once = canonicalize(text).unwrap();
        let twice = canonicalize_document(&once.to_xml()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unparsable_markup_is_reported() {
        let err = canonicalize("<Style><Rule></Style>").unwrap_err();
        assert!(matches!(err, OracleError::UnparsableArtifact { .. }));
    }

    #[test]
    fn display_is_deterministic() {
        let tree = canonicalize(r#"<Style name="a" b="2">hi</Style>"#).unwrap();
        assert_eq!(
            tree.to_string(),
            "<Map>\n  <Style b=\"2\" name=\"a\">\n    \"hi\"\n  </Style>\n</Map>\n"
        );
    }
}
