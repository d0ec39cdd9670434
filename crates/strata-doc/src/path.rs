//! A small path language over element trees.
//!
//! ```text
//! path      := step ("/" step)* ("/" selection)?
//! step      := (name | "*") ("[@" attr "=" quoted "]")?
//! selection := "@" attr | "text()"
//! ```
//!
//! The first step matches the root element. A path without a trailing
//! selection selects elements; when values are requested, their text is used.

use crate::error::{DocError, DocResult};
use crate::tree::{Document, Element, Node};

/// What a path yields once its steps have matched elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Elements,
    Attribute(String),
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Step {
    name: Option<String>,
    predicate: Option<(String, String)>,
}

impl Step {
    fn matches(&self, el: &Element) -> bool {
        self.name.as_ref().map_or(true, |n| *n == el.name)
            && self
                .predicate
                .as_ref()
                .map_or(true, |(k, v)| el.attr(k) == Some(v.as_str()))
    }
}

/// A parsed path expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreePath {
    raw: String,
    steps: Vec<Step>,
    selection: Selection,
}

impl TreePath {
    pub fn parse(raw: &str) -> DocResult<Self> {
        let err = |reason: &str| DocError::Query {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let parts = split_steps(raw.trim_start_matches('/')).ok_or_else(|| err("unbalanced brackets or quotes"))?;
        if parts.is_empty() {
            return Err(err("path is empty"));
        }

        let mut steps = Vec::new();
        let mut selection = Selection::Elements;
        let last = parts.len() - 1;
        for (i, part) in parts.iter().enumerate() {
            if i == last && i > 0 {
                if let Some(attr) = part.strip_prefix('@') {
                    if attr.is_empty() {
                        return Err(err("empty attribute name"));
                    }
                    selection = Selection::Attribute(attr.to_string());
                    continue;
                }
                if *part == "text()" {
                    selection = Selection::Text;
                    continue;
                }
            }
            steps.push(parse_step(part).ok_or_else(|| err("malformed step"))?);
        }

        Ok(Self {
            raw: raw.to_string(),
            steps,
            selection,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Elements matched by the steps, in document order.
    pub fn select<'a>(&self, doc: &'a Document) -> Vec<&'a Element> {
        let mut out = Vec::new();
        if let Some(root) = doc.root() {
            if self.steps[0].matches(root) {
                collect(root, &self.steps, &mut out);
            }
        }
        out
    }

    /// String values of the selection.
    pub fn values(&self, doc: &Document) -> Vec<String> {
        let elements = self.select(doc);
        match &self.selection {
            Selection::Attribute(attr) => elements
                .into_iter()
                .filter_map(|el| el.attr(attr).map(str::to_string))
                .collect(),
            Selection::Elements | Selection::Text => {
                elements.into_iter().map(Element::text).collect()
            }
        }
    }

    /// Apply `f` to every matched element. Returns the number of matches.
    pub fn for_each_mut(&self, doc: &mut Document, f: &mut dyn FnMut(&mut Element)) -> usize {
        match doc.root_mut() {
            Some(root) if self.steps[0].matches(root) => visit_mut(root, &self.steps, f),
            _ => 0,
        }
    }

    /// Remove every matched element. Removing the root empties the document.
    pub fn remove(&self, doc: &mut Document) -> usize {
        let root_matches = doc.root().map_or(false, |root| self.steps[0].matches(root));
        if !root_matches {
            return 0;
        }
        if self.steps.len() == 1 {
            doc.set_root(None);
            return 1;
        }
        match doc.root_mut() {
            Some(root) => remove_in(root, &self.steps),
            None => 0,
        }
    }
}

fn collect<'a>(el: &'a Element, steps: &[Step], out: &mut Vec<&'a Element>) {
    if steps.len() == 1 {
        out.push(el);
        return;
    }
    for child in el.elements().filter(|c| steps[1].matches(c)) {
        collect(child, &steps[1..], out);
    }
}

fn visit_mut(el: &mut Element, steps: &[Step], f: &mut dyn FnMut(&mut Element)) -> usize {
    if steps.len() == 1 {
        f(el);
        return 1;
    }
    let mut count = 0;
    for child in el.elements_mut() {
        if steps[1].matches(child) {
            count += visit_mut(child, &steps[1..], f);
        }
    }
    count
}

fn remove_in(el: &mut Element, steps: &[Step]) -> usize {
    if steps.len() == 2 {
        let before = el.children.len();
        el.children
            .retain(|node| !matches!(node, Node::Element(child) if steps[1].matches(child)));
        return before - el.children.len();
    }
    let mut count = 0;
    for child in el.elements_mut() {
        if steps[1].matches(child) {
            count += remove_in(child, &steps[1..]);
        }
    }
    count
}

/// Split on `/` outside of brackets and quotes.
fn split_steps(raw: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in raw.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.checked_sub(1)?,
            (None, '/') if depth == 0 => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || quote.is_some() {
        return None;
    }
    if start < raw.len() {
        parts.push(&raw[start..]);
    }
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}

fn parse_step(part: &str) -> Option<Step> {
    let (name, predicate) = match part.find('[') {
        Some(open) => {
            let inner = part[open..].strip_prefix("[@")?.strip_suffix(']')?;
            let (attr, value) = inner.split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))?;
            (&part[..open], Some((attr.trim().to_string(), value.to_string())))
        }
        None => (part, None),
    };
    if name.is_empty() || name.contains(['@', ']', '\'', '"']) {
        return None;
    }
    Some(Step {
        name: (name != "*").then(|| name.to_string()),
        predicate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet() -> Document {
        Document::new(
            Element::new("fleet")
                .with_child(Element::new("entity").with_attr("id", "t1").with_text("first"))
                .with_child(Element::new("entity").with_attr("id", "t2").with_text("second"))
                .with_child(Element::new("note").with_text("n")),
        )
    }

    #[test]
    fn selects_children_by_name() {
        let path = TreePath::parse("fleet/entity").unwrap();
        assert_eq!(path.values(&fleet()), vec!["first", "second"]);
    }

    #[test]
    fn attribute_selection() {
        let path = TreePath::parse("/fleet/entity/@id").unwrap();
        assert_eq!(path.selection(), &Selection::Attribute("id".into()));
        assert_eq!(path.values(&fleet()), vec!["t1", "t2"]);
    }

    #[test]
    fn predicate_filters_by_attribute() {
        let path = TreePath::parse("fleet/entity[@id='t2']/text()").unwrap();
        assert_eq!(path.values(&fleet()), vec!["second"]);
        let path = TreePath::parse("fleet/entity[@id=\"a/b\"]").unwrap();
        assert!(path.values(&fleet()).is_empty());
    }

    #[test]
    fn wildcard_matches_any_name() {
        let path = TreePath::parse("*/*").unwrap();
        assert_eq!(path.select(&fleet()).len(), 3);
    }

    #[test]
    fn root_mismatch_selects_nothing() {
        let path = TreePath::parse("garage/entity").unwrap();
        assert!(path.select(&fleet()).is_empty());
        assert!(path.select(&Document::empty()).is_empty());
    }

    #[test]
    fn malformed_paths_are_rejected() {
        for raw in ["", "/", "a//b", "a[@id='x'", "a[id='x']", "a/@", "@id", "a[@id=x]"] {
            assert!(TreePath::parse(raw).is_err(), "expected error for {raw:?}");
        }
    }

    #[test]
    fn remove_children_and_root() {
        let mut doc = fleet();
        let removed = TreePath::parse("fleet/entity[@id='t1']").unwrap().remove(&mut doc);
        assert_eq!(removed, 1);
        assert_eq!(TreePath::parse("fleet/entity/@id").unwrap().values(&doc), vec!["t2"]);

        assert_eq!(TreePath::parse("fleet").unwrap().remove(&mut doc), 1);
        assert!(doc.is_empty());
    }

    #[test]
    fn for_each_mut_visits_matches() {
        let mut doc = fleet();
        let path = TreePath::parse("fleet/entity").unwrap();
        let n = path.for_each_mut(&mut doc, &mut |el: &mut Element| el.set_attr("seen", "yes"));
        assert_eq!(n, 2);
        let seen = TreePath::parse("fleet/*/@seen").unwrap().values(&doc);
        assert_eq!(seen, vec!["yes", "yes"]);
    }
}
