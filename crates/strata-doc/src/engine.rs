use tracing::debug;

use crate::error::{DocError, DocResult};
use crate::path::TreePath;
use crate::tree::{Document, Element, Node};

/// A mutation applied to a document by [`DocumentEngine::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Append `element` as the last child of every element matched by
    /// `parent`. An empty `parent` installs `element` as the root of an empty
    /// document.
    Append { parent: String, element: Element },
    /// Remove every matched element.
    Remove { path: String },
    /// Set an attribute on every matched element.
    SetAttribute {
        path: String,
        name: String,
        value: String,
    },
    /// Replace the text of every matched element.
    SetText { path: String, text: String },
}

/// Parse/render/query/patch contract for tree-shaped payloads.
///
/// Implementations must be thread-safe. `render` of an empty document yields
/// no bytes, and `parse` of empty (or whitespace-only) input yields an empty
/// document, so "written empty" means the same thing for both payload forms.
pub trait DocumentEngine: Send + Sync {
    fn parse(&self, data: &[u8]) -> DocResult<Document>;

    fn render(&self, doc: &Document) -> Vec<u8>;

    /// Evaluate a path expression and return the selected string values.
    fn query(&self, doc: &Document, path: &str) -> DocResult<Vec<String>> {
        Ok(TreePath::parse(path)?.values(doc))
    }

    /// Apply directives in order. Returns the number of elements touched.
    fn apply(&self, doc: &mut Document, directives: &[Directive]) -> DocResult<usize> {
        let mut touched = 0;
        for directive in directives {
            touched += apply_one(doc, directive)?;
        }
        debug!(directives = directives.len(), touched, "applied directives");
        Ok(touched)
    }
}

fn apply_one(doc: &mut Document, directive: &Directive) -> DocResult<usize> {
    match directive {
        Directive::Append { parent, element } if parent.is_empty() => {
            if !doc.is_empty() {
                return Err(DocError::Directive {
                    path: parent.clone(),
                    reason: "document already has a root".into(),
                });
            }
            doc.set_root(Some(element.clone()));
            Ok(1)
        }
        Directive::Append { parent, element } => Ok(TreePath::parse(parent)?
            .for_each_mut(doc, &mut |el: &mut Element| el.push(element.clone()))),
        Directive::Remove { path } => Ok(TreePath::parse(path)?.remove(doc)),
        Directive::SetAttribute { path, name, value } => Ok(TreePath::parse(path)?
            .for_each_mut(doc, &mut |el: &mut Element| el.set_attr(name.clone(), value.clone()))),
        Directive::SetText { path, text } => Ok(TreePath::parse(path)?
            .for_each_mut(doc, &mut |el: &mut Element| el.set_text(text.clone()))),
    }
}

/// XML engine: parses with `roxmltree`, renders compact UTF-8 XML.
///
/// Comments, processing instructions and whitespace-only text nodes are not
/// preserved. Namespace prefixes are dropped; local names are kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlEngine;

impl XmlEngine {
    pub fn new() -> Self {
        Self
    }
}

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>";

impl DocumentEngine for XmlEngine {
    fn parse(&self, data: &[u8]) -> DocResult<Document> {
        let text = std::str::from_utf8(data).map_err(|e| DocError::Parse(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Document::empty());
        }
        let parsed = roxmltree::Document::parse(text).map_err(|e| DocError::Parse(e.to_string()))?;
        Ok(Document::new(convert(parsed.root_element())))
    }

    fn render(&self, doc: &Document) -> Vec<u8> {
        let Some(root) = doc.root() else {
            return Vec::new();
        };
        let mut out = String::from(XML_DECLARATION);
        write_element(root, &mut out);
        out.into_bytes()
    }
}

fn convert(node: roxmltree::Node<'_, '_>) -> Element {
    let mut el = Element::new(node.tag_name().name());
    for attr in node.attributes() {
        el.attributes.push((attr.name().to_string(), attr.value().to_string()));
    }
    for child in node.children() {
        if child.is_element() {
            el.children.push(Node::Element(convert(child)));
        } else if child.is_text() {
            if let Some(text) = child.text().filter(|t| !t.trim().is_empty()) {
                el.children.push(Node::Text(text.to_string()));
            }
        }
    }
    el
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        match child {
            Node::Element(child) => write_element(child, out),
            Node::Text(text) => escape_into(text, false, out),
        }
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

fn escape_into(raw: &str, attribute: bool, out: &mut String) {
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' if attribute => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
}
