//! XML element tree used for URDF templates and override documents
//!
//! Parsing and serialization go through `quick-xml`; the tree itself is a plain
//! owned structure so a template can be deep-cloned per object and patched in
//! place. Paths use a small subset of the ElementTree syntax:
//! `.//visual/geometry/mesh` (any descendant) or `link/visual` (direct children).

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A single XML element with ordered attributes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Tag name
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Text content, if any
    pub text: Option<String>,
    /// Child elements in document order
    pub children: Vec<Element>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Get an attribute value
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing the value in place if it already exists
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// First direct child with the given tag
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Remove the first direct child with the given tag
    pub fn remove_child(&mut self, name: &str) -> Option<Element> {
        let index = self.children.iter().position(|c| c.name == name)?;
        Some(self.children.remove(index))
    }

    /// First element matching `path`, in document order
    pub fn find(&self, path: &str) -> Option<&Element> {
        let path = ElementPath::parse(path);
        self.locate(&path).first().map(|index| self.at(index))
    }

    /// Mutable access to the first element matching `path`
    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        let path = ElementPath::parse(path);
        let index = self.locate(&path).into_iter().next()?;
        Some(self.at_mut(&index))
    }

    /// All elements matching `path`, in document order
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let path = ElementPath::parse(path);
        self.locate(&path).iter().map(|index| self.at(index)).collect()
    }

    /// Apply `f` to every element matching `path` and return the match count.
    ///
    /// Matches are visited last-to-first so that edits to one match never
    /// invalidate the position of another.
    pub fn update_all(&mut self, path: &str, mut f: impl FnMut(&mut Element)) -> usize {
        let path = ElementPath::parse(path);
        let matches = self.locate(&path);
        for index in matches.iter().rev() {
            f(self.at_mut(index));
        }
        matches.len()
    }

    /// Return the element at `path`, creating any missing elements on the way.
    ///
    /// When the full path does not resolve, the last segment is dropped and the
    /// shorter path is resolved (recursively) instead; the dropped segments are
    /// then created as a chain of new children under whatever was found. An
    /// empty path resolves to `self`.
    pub fn ensure_path(&mut self, path: &str) -> &mut Element {
        let path = ElementPath::parse(path);
        self.ensure(&path)
    }

    /// Set several attributes on the element at `path`, creating it if needed
    pub fn set_attributes(&mut self, path: &str, attributes: &[(&str, &str)]) {
        let target = self.ensure_path(path);
        for (key, value) in attributes {
            target.set_attr(*key, *value);
        }
    }

    /// Set one attribute on the element at `path`, creating it if needed
    pub fn set_attribute(&mut self, path: &str, key: &str, value: &str) {
        self.set_attributes(path, &[(key, value)]);
    }

    fn ensure(&mut self, path: &ElementPath<'_>) -> &mut Element {
        if let Some(index) = self.locate(path).into_iter().next() {
            return self.at_mut(&index);
        }

        let Some((last, parent_path)) = path.split_last() else {
            return self;
        };

        let parent = self.ensure(&parent_path);
        let index = parent.children.len();
        parent.children.push(Element::new(last));
        &mut parent.children[index]
    }

    /// Resolve a path to child-index chains relative to `self`
    fn locate(&self, path: &ElementPath<'_>) -> Vec<Vec<usize>> {
        let Some((first, rest)) = path.segments.split_first() else {
            return Vec::new();
        };

        let mut matches = Vec::new();
        if path.descendant {
            collect_descendants(self, first, &mut Vec::new(), &mut matches);
        } else {
            for (i, child) in self.children.iter().enumerate() {
                if child.name == *first {
                    matches.push(vec![i]);
                }
            }
        }

        for segment in rest {
            let mut next = Vec::new();
            for index in &matches {
                for (i, child) in self.at(index).children.iter().enumerate() {
                    if child.name == *segment {
                        let mut extended = index.clone();
                        extended.push(i);
                        next.push(extended);
                    }
                }
            }
            matches = next;
        }

        matches
    }

    fn at(&self, index: &[usize]) -> &Element {
        index.iter().fold(self, |element, &i| &element.children[i])
    }

    fn at_mut(&mut self, index: &[usize]) -> &mut Element {
        let mut element = self;
        for &i in index {
            element = &mut element.children[i];
        }
        element
    }

    /// Parse a document and return its root element
    pub fn parse_str(xml: &str) -> Result<Element, XmlError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(element_from_start(e)?),
                Ok(Event::Empty(ref e)) => {
                    let element = element_from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Parse("unexpected closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(ref t)) => {
                    let text = t.unescape().map_err(|e| XmlError::Parse(e.to_string()))?;
                    append_text(&mut stack, &text);
                }
                Ok(Event::CData(ref c)) => {
                    let text = String::from_utf8_lossy(c).into_owned();
                    append_text(&mut stack, &text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(XmlError::Parse(format!(
                        "at position {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Parse(format!(
                "unexpected end of document inside <{}>",
                open.name
            )));
        }

        root.ok_or(XmlError::EmptyDocument)
    }

    /// Read and parse a document from a file
    pub fn read_file(path: impl AsRef<Path>) -> Result<Element, XmlError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| XmlError::Io(format!("{}: {}", path.display(), e)))?;
        Self::parse_str(&content)
            .map_err(|e| XmlError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Serialize as a document with an XML declaration and two-space indentation
    pub fn to_xml_string(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        self.write_into(&mut writer)?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| XmlError::Write(e.to_string()))
    }

    fn write_into<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_none() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| XmlError::Write(e.to_string()));
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        if let Some(ref text) = self.text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| XmlError::Write(e.to_string()))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| XmlError::Write(e.to_string()))
    }
}

/// Parsed form of a path expression
#[derive(Debug, Clone, PartialEq, Eq)]
struct ElementPath<'a> {
    descendant: bool,
    segments: Vec<&'a str>,
}

impl<'a> ElementPath<'a> {
    fn parse(path: &'a str) -> Self {
        let (descendant, rest) = match path.strip_prefix(".//") {
            Some(rest) => (true, rest),
            None => (false, path.strip_prefix("./").unwrap_or(path)),
        };
        Self {
            descendant,
            segments: rest.split('/').filter(|s| !s.is_empty() && *s != ".").collect(),
        }
    }

    fn split_last(&self) -> Option<(&'a str, ElementPath<'a>)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            last,
            ElementPath {
                descendant: self.descendant,
                segments: parent.to_vec(),
            },
        ))
    }
}

fn collect_descendants(
    element: &Element,
    name: &str,
    prefix: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    for (i, child) in element.children.iter().enumerate() {
        prefix.push(i);
        if child.name == name {
            out.push(prefix.clone());
        }
        collect_descendants(child, name, prefix, out);
        prefix.pop();
    }
}

fn element_from_start(start: &BytesStart) -> Result<Element, XmlError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(XmlError::MultipleRoots(element.name))
    }
}

fn append_text(stack: &mut [Element], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(current) = stack.last_mut() {
        current.text.get_or_insert_with(String::new).push_str(text);
    }
}

/// XML-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum XmlError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Empty document: no root element")]
    EmptyDocument,
    #[error("Multiple root elements (second root: <{0}>)")]
    MultipleRoots(String),
    #[error("Write error: {0}")]
    Write(String),
}
