//! Mutable XML tree for the decoded, textual resources of an APK.
//!
//! Parsing goes through `quick_xml`'s event reader; serialization is a small pretty printer
//! that keeps text-bearing elements on one line so string values never pick up indentation.

use super::write_atomically;
use crate::core::error::{Error, IoContext, Result};
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt::Write as _;
use std::path::Path;

const INDENT: &str = "    ";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
    DocType(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute lookup by its serialized, prefixed name such as `android:label`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Mutable access to attribute values, in document order.
    pub fn attribute_values_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.attributes.iter_mut().map(|(_, value)| value)
    }

    /// Updates the attribute in place, or appends it when missing.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, current)) => *current = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(index).1)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// Direct children named `name`.
    pub fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().filter(move |el| el.name == name)
    }

    pub fn elements_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.child_elements_mut().filter(move |el| el.name == name)
    }

    pub fn first_element(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|el| el.name == name)
    }

    pub fn first_element_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.child_elements_mut().find(|el| el.name == name)
    }

    /// Concatenated character data of the direct children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) | Node::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replaces every child with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Calls `f` on this element and all of its descendants, parents first.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        f(self);
        for child in self.child_elements_mut() {
            child.walk_mut(f);
        }
    }

    fn has_element_children(&self) -> bool {
        self.children.iter().any(|node| node.as_element().is_some())
    }

    /// Element children separated by nothing but line-broken indentation.
    ///
    /// `<string>` and `<item>` hold styled text where a lone space between tags is content.
    fn is_layout_only(&self) -> bool {
        !matches!(self.name.as_str(), "string" | "item")
            && self.has_element_children()
            && self.children.iter().all(|node| match node {
                Node::Text(text) => text.trim().is_empty() && text.contains('\n'),
                Node::CData(_) => false,
                _ => true,
            })
    }

    fn is_mixed(&self) -> bool {
        self.children
            .iter()
            .any(|node| matches!(node, Node::Text(_) | Node::CData(_)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Declaration {
    version: String,
    encoding: Option<String>,
    standalone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlDocument {
    declaration: Option<Declaration>,
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl XmlDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)
            .io_context(|| format!("Reading `{}`", path.display()))?;
        let content = String::from_utf8(content).map_err(|err| Error::MalformedXml {
            path: path.to_path_buf(),
            reason: format!("not UTF-8: {}", err),
        })?;
        Self::parse(&content).map_err(|reason| Error::MalformedXml {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut reader = Reader::from_str(content);
        let mut declaration = None;
        let mut prolog = vec![];
        let mut epilog = vec![];
        let mut stack: Vec<Element> = vec![];
        let mut root = None;

        fn attach(
            stack: &mut [Element],
            root: &mut Option<Element>,
            el: Element,
        ) -> std::result::Result<(), String> {
            match stack.last_mut() {
                Some(parent) => parent.children.push(Node::Element(el)),
                None if root.is_none() => *root = Some(el),
                None => return Err(format!("second root element `{}`", el.name)),
            }
            Ok(())
        }

        loop {
            let event = reader
                .read_event()
                .map_err(|err| format!("{} at byte {}", err, reader.buffer_position()))?;
            match event {
                Event::Decl(decl) => {
                    let field =
                        |value: std::borrow::Cow<[u8]>| String::from_utf8_lossy(&value).into_owned();
                    declaration = Some(Declaration {
                        version: decl.version().map(field).map_err(|err| err.to_string())?,
                        encoding: decl.encoding().and_then(|v| v.ok()).map(field),
                        standalone: decl.standalone().and_then(|v| v.ok()).map(field),
                    });
                }
                Event::Start(start) => {
                    stack.push(element_from(&start)?);
                }
                Event::Empty(start) => {
                    let el = element_from(&start)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::End(_) => {
                    let mut el = stack.pop().ok_or("unexpected closing tag")?;
                    if el.is_layout_only() {
                        el.children.retain(|node| !node.is_blank_text());
                    }
                    attach(&mut stack, &mut root, el)?;
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = text.unescape().map_err(|err| err.to_string())?;
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    let data = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::CData(data)),
                        None => return Err("character data outside the root element".into()),
                    }
                }
                Event::Comment(comment) => {
                    let comment =
                        Node::Comment(String::from_utf8_lossy(&comment.into_inner()).into_owned());
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(comment),
                        None if root.is_none() => prolog.push(comment),
                        None => epilog.push(comment),
                    }
                }
                Event::PI(pi) => {
                    let pi = Node::ProcessingInstruction(
                        String::from_utf8_lossy(&pi.into_inner()).into_owned(),
                    );
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(pi),
                        None if root.is_none() => prolog.push(pi),
                        None => epilog.push(pi),
                    }
                }
                Event::DocType(doctype) => {
                    if !stack.is_empty() || root.is_some() {
                        return Err("DOCTYPE after the root element".into());
                    }
                    prolog.push(Node::DocType(
                        String::from_utf8_lossy(&doctype.into_inner()).into_owned(),
                    ));
                }
                Event::Eof => break,
            }
        }

        if let Some(open) = stack.last() {
            return Err(format!("unclosed element `{}`", open.name));
        }
        let root = root.ok_or("missing root element")?;
        Ok(Self {
            declaration,
            prolog,
            root,
            epilog,
        })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Elements matching a location path such as `//activity/intent-filter/data`,
    /// `/manifest/application` or `//meta-data[@android:name='KEY']`.
    pub fn nodes(&self, path: &str) -> Result<Vec<&Element>, PathError> {
        let steps = parse_path(path)?;
        let mut found = vec![];
        select(std::iter::once(&self.root), &steps, &mut found);
        Ok(found)
    }

    /// Calls `f` on every element matching `path` and returns how many matched.
    pub fn update_nodes(
        &mut self,
        path: &str,
        mut f: impl FnMut(&mut Element),
    ) -> Result<usize, PathError> {
        let steps = parse_path(path)?;
        let mut count = 0;
        select_mut(std::iter::once(&mut self.root), &steps, &mut |el| {
            count += 1;
            f(el)
        });
        Ok(count)
    }

    pub fn to_pretty_string(&self) -> String {
        let mut out = String::new();
        if let Some(decl) = &self.declaration {
            let _ = write!(out, "<?xml version=\"{}\"", decl.version);
            if let Some(encoding) = &decl.encoding {
                let _ = write!(out, " encoding=\"{}\"", encoding);
            }
            if let Some(standalone) = &decl.standalone {
                let _ = write!(out, " standalone=\"{}\"", standalone);
            }
            out.push_str("?>\n");
        }
        for node in &self.prolog {
            write_node(&mut out, node, 0);
            out.push('\n');
        }
        write_element(&mut out, &self.root, 0);
        out.push('\n');
        for node in &self.epilog {
            write_node(&mut out, node, 0);
            out.push('\n');
        }
        out
    }

    /// Writes the pretty-printed document next to `path` and renames it into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomically(path, self.to_pretty_string().as_bytes())
    }
}

fn element_from(start: &quick_xml::events::BytesStart) -> std::result::Result<Element, String> {
    let mut el = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        el.attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(el)
}

fn write_node(out: &mut String, node: &Node, depth: usize) {
    match node {
        Node::Element(el) => write_element(out, el, depth),
        _ => {
            out.push_str(&INDENT.repeat(depth));
            write_inline(out, node);
        }
    }
}

fn write_open_tag(out: &mut String, el: &Element) {
    out.push('<');
    out.push_str(&el.name);
    for (key, value) in &el.attributes {
        let _ = write!(out, " {}=\"{}\"", key, escape(value));
    }
}

fn write_element(out: &mut String, el: &Element, depth: usize) {
    out.push_str(&INDENT.repeat(depth));
    write_open_tag(out, el);
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if el.is_mixed() {
        // Text is significant here, so nothing gets reindented.
        for child in &el.children {
            write_inline(out, child);
        }
    } else {
        for child in &el.children {
            out.push('\n');
            write_node(out, child, depth + 1);
        }
        out.push('\n');
        out.push_str(&INDENT.repeat(depth));
    }
    let _ = write!(out, "</{}>", el.name);
}

fn write_inline(out: &mut String, node: &Node) {
    match node {
        Node::Element(el) => {
            write_open_tag(out, el);
            if el.children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for child in &el.children {
                    write_inline(out, child);
                }
                let _ = write!(out, "</{}>", el.name);
            }
        }
        Node::Text(text) => out.push_str(&partial_escape(text)),
        Node::CData(data) => {
            let _ = write!(out, "<![CDATA[{}]]>", data);
        }
        Node::Comment(comment) => {
            let _ = write!(out, "<!--{}-->", comment);
        }
        Node::ProcessingInstruction(pi) => {
            let _ = write!(out, "<?{}?>", pi);
        }
        Node::DocType(doctype) => {
            let _ = write!(out, "<!DOCTYPE {}>", doctype);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path `{path}`: {reason}")]
pub struct PathError {
    path: String,
    reason: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug)]
struct Step {
    axis: Axis,
    name: String,
    predicate: Option<(String, String)>,
}

impl Step {
    fn matches(&self, el: &Element) -> bool {
        if self.name != "*" && self.name != el.name {
            return false;
        }
        match &self.predicate {
            Some((attr, value)) => el.attribute(attr) == Some(value.as_str()),
            None => true,
        }
    }
}

fn parse_path(path: &str) -> Result<Vec<Step>, PathError> {
    let error = |reason| PathError {
        path: path.to_string(),
        reason,
    };
    let mut rest = path.trim();
    if !rest.starts_with('/') {
        return Err(error("path must be absolute"));
    }
    let mut steps = vec![];
    while !rest.is_empty() {
        let axis = if let Some(r) = rest.strip_prefix("//") {
            rest = r;
            Axis::Descendant
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
            Axis::Child
        } else {
            return Err(error("expected `/`"));
        };
        let end = rest.find('/').unwrap_or(rest.len());
        let (token, tail) = rest.split_at(end);
        rest = tail;
        let (name, predicate) = match token.split_once('[') {
            Some((name, predicate)) => {
                let predicate = predicate
                    .strip_suffix(']')
                    .and_then(|p| p.strip_prefix('@'))
                    .and_then(|p| p.split_once('='))
                    .ok_or_else(|| error("only `[@attr='value']` predicates are supported"))?;
                let value = predicate.1.trim();
                let value = value
                    .strip_prefix('\'')
                    .and_then(|v| v.strip_suffix('\''))
                    .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                    .ok_or_else(|| error("predicate value must be quoted"))?;
                (name, Some((predicate.0.trim().to_string(), value.to_string())))
            }
            None => (token, None),
        };
        if name.is_empty() {
            return Err(error("empty step"));
        }
        steps.push(Step {
            axis,
            name: name.to_string(),
            predicate,
        });
    }
    if steps.is_empty() {
        return Err(error("empty path"));
    }
    Ok(steps)
}

fn select<'a, I>(candidates: I, steps: &[Step], found: &mut Vec<&'a Element>)
where
    I: Iterator<Item = &'a Element>,
{
    let Some((step, rest)) = steps.split_first() else {
        return;
    };
    for el in candidates {
        if step.matches(el) {
            if rest.is_empty() {
                found.push(el);
            } else {
                select(el.child_elements(), rest, found);
            }
        }
        if step.axis == Axis::Descendant {
            select(el.child_elements(), steps, found);
        }
    }
}

fn select_mut<'a, I>(candidates: I, steps: &[Step], f: &mut dyn FnMut(&mut Element))
where
    I: Iterator<Item = &'a mut Element>,
{
    let Some((step, rest)) = steps.split_first() else {
        return;
    };
    for el in candidates {
        if step.matches(el) {
            if rest.is_empty() {
                f(el);
            } else {
                select_mut(el.child_elements_mut(), rest, f);
            }
        }
        if step.axis == Axis::Descendant {
            select_mut(el.child_elements_mut(), steps, f);
        }
    }
}
