//! Reading XML documents.
//!
//! [`parse`] loads a document into memory and returns an [`Xml`] selection
//! holding the root element. Selections are narrowed by element name with
//! [`Xml::filter`] (any depth) or [`Xml::children`] (direct children only).
//!
//! # Examples
//!
//! ```
//! use cms_utils::xml;
//!
//! let doc = xml::parse("<feed><entry id='a'><title>First</title></entry></feed>").unwrap();
//! assert_eq!(doc.filter("title").value(), Some("First"));
//! assert_eq!(doc.children("entry").attrs().unwrap()["id"], "a");
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Errors raised while reading a document.
#[derive(Error, Debug)]
pub enum XmlError {
    /// The source could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not well-formed.
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax {
        /// Byte offset the reader had reached.
        position: u64,
        message: String,
    },

    /// The document has no root element.
    #[error("XML document has no root element")]
    NoRoot,
}

/// A parsed element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    /// Text directly inside the element, trimmed.
    pub text: String,
    pub children: Vec<Arc<Element>>,
}

impl Element {
    fn collect_descendants(&self, name: &str, out: &mut Vec<Arc<Self>>) {
        for child in &self.children {
            if child.name == name {
                out.push(Arc::clone(child));
            }
            child.collect_descendants(name, out);
        }
    }
}

/// An ordered selection of elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Xml {
    elements: Vec<Arc<Element>>,
}

impl Xml {
    /// All descendants of the selection named `name`, in document order.
    pub fn filter(&self, name: &str) -> Self {
        let mut elements = Vec::new();
        for element in &self.elements {
            element.collect_descendants(name, &mut elements);
        }
        Self { elements }
    }

    /// Direct children of the selection named `name`.
    pub fn children(&self, name: &str) -> Self {
        let elements = self
            .elements
            .iter()
            .flat_map(|e| e.children.iter())
            .filter(|child| child.name == name)
            .cloned()
            .collect();
        Self { elements }
    }

    /// The text of the first element.
    pub fn value(&self) -> Option<&str> {
        self.elements.first().map(|e| e.text.as_str())
    }

    /// The attributes of the first element.
    pub fn attrs(&self) -> Option<&BTreeMap<String, String>> {
        self.elements.first().map(|e| &e.attrs)
    }

    /// The name of the first element.
    pub fn name(&self) -> Option<&str> {
        self.elements.first().map(|e| e.name.as_str())
    }

    /// A selection of the `index`-th element alone.
    pub fn get(&self, index: usize) -> Option<Self> {
        self.elements.get(index).map(|e| Self {
            elements: vec![Arc::clone(e)],
        })
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterates over single-element selections.
    pub fn iter(&self) -> impl Iterator<Item = Self> + '_ {
        self.elements.iter().map(|e| Self {
            elements: vec![Arc::clone(e)],
        })
    }

    /// The underlying elements.
    pub fn elements(&self) -> &[Arc<Element>] {
        &self.elements
    }
}

impl<'a> IntoIterator for &'a Xml {
    type Item = Xml;
    type IntoIter = Box<dyn Iterator<Item = Xml> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Parses a document held in a string.
pub fn parse(source: &str) -> Result<Xml, XmlError> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        let event = reader.read_event().map_err(|e| syntax(&reader, e))?;
        match event {
            Event::Start(start) => stack.push(open_element(&reader, &start)?),
            Event::Empty(start) => {
                let element = open_element(&reader, &start)?;
                close_element(element, &mut stack, &mut root);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    close_element(element, &mut stack, &mut root);
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| syntax(&reader, e))?;
                push_text(&mut stack, &text);
            }
            Event::CData(data) => {
                let data = String::from_utf8_lossy(&data.into_inner()).into_owned();
                push_text(&mut stack, &data);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Syntax {
            position: reader.buffer_position() as u64,
            message: format!("unclosed element <{}>", stack.last().map_or("", |e| e.name.as_str())),
        });
    }
    root.map(|element| Xml {
        elements: vec![Arc::new(element)],
    })
    .ok_or(XmlError::NoRoot)
}

/// Parses a document from any reader.
pub fn parse_reader(mut source: impl Read) -> Result<Xml, XmlError> {
    let mut buffer = String::new();
    source.read_to_string(&mut buffer)?;
    parse(&buffer)
}

fn syntax(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> XmlError {
    XmlError::Syntax {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}

fn open_element(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| syntax(reader, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| syntax(reader, e))?.into_owned();
        attrs.insert(key, value);
    }
    Ok(Element {
        name,
        attrs,
        ..Element::default()
    })
}

fn close_element(element: Element, stack: &mut [Element], root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Arc::new(element)),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if let Some(current) = stack.last_mut() {
        current.text.push_str(text);
    }
}
