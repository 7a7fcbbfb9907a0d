//! The tasklist document codec
//!
//! Maps between the task tree and its wire/file form:
//!
//! ```xml
//! <tasklist>
//!   <tasks>
//!     <task label="...">
//!       <task label="..."/>
//!     </task>
//!   </tasks>
//! </tasklist>
//! ```
//!
//! Parsing goes through a small raw document model (`XmlElement` /
//! `XmlNode`) so the sync engine can compare what a server echoed back
//! against what was sent without caring how either side was indented.

use std::io;
use std::path::PathBuf;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::tree::{TaskNode, TaskTree};

pub const ROOT_ELEMENT: &str = "tasklist";
pub const CONTAINER_ELEMENT: &str = "tasks";
pub const TASK_ELEMENT: &str = "task";
pub const LABEL_ATTRIBUTE: &str = "label";

/// Errors raised while reading or writing persisted documents
#[derive(Error, Debug)]
pub enum FormatError {
    /// The text is not well-formed XML
    #[error("malformed document: {0}")]
    Syntax(String),

    /// A different element was found where a known one was required
    #[error("expected element \"{expected}\", found \"{found}\"")]
    UnexpectedElement {
        expected: &'static str,
        found: String,
    },

    /// A required element is absent
    #[error("missing element \"{0}\"")]
    MissingElement(&'static str),

    /// A task element without a usable label
    #[error("no label attribute for task")]
    MissingLabel,

    /// The config file is not valid TOML
    #[error("invalid config file: {0}")]
    Config(String),

    /// Filesystem failure while reading or writing a document
    #[error("failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FormatError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FormatError::Io {
            path: path.into(),
            source,
        }
    }
}

/// One node of a parsed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    Comment(String),
}

/// A parsed element: name, attributes in document order, ordered children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The value of the named attribute, if present
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The element children, skipping text and comments
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// A copy with whitespace-only text nodes and comments removed,
    /// recursively. Two documents that differ only in indentation
    /// normalize to the same value.
    fn normalized(&self) -> XmlElement {
        XmlElement {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children: self
                .children
                .iter()
                .filter_map(|child| match child {
                    XmlNode::Element(element) => {
                        Some(XmlNode::Element(element.normalized()))
                    }
                    XmlNode::Text(text) if text.trim().is_empty() => None,
                    XmlNode::Text(text) => Some(XmlNode::Text(text.clone())),
                    XmlNode::Comment(_) => None,
                })
                .collect(),
        }
    }
}

/// Parse raw XML text into the document model
///
/// Keeps text nodes, including insignificant whitespace, exactly as they
/// appear; normalization is the comparator's concern.
pub fn parse_document(text: &str) -> Result<XmlElement, FormatError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().expand_empty_elements = true;

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    loop {
        match reader.read_event() {
            Err(e) => return Err(FormatError::Syntax(e.to_string())),
            Ok(Event::Start(start)) => {
                stack.push(read_element(&start)?);
            }
            Ok(Event::Empty(start)) => {
                attach(&mut stack, &mut root, read_element(&start)?)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| FormatError::Syntax("unmatched closing tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| FormatError::Syntax(e.to_string()))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(data)) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Ok(Event::Comment(comment)) => {
                let text = comment
                    .unescape()
                    .map_err(|e| FormatError::Syntax(e.to_string()))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Comment(text.into_owned()));
                }
            }
            Ok(Event::Eof) => break,
            // declarations, processing instructions, doctypes
            Ok(_) => {}
        }
    }
    root.ok_or_else(|| FormatError::Syntax("document has no root element".into()))
}

fn read_element(start: &BytesStart) -> Result<XmlElement, FormatError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| FormatError::Syntax(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| FormatError::Syntax(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), FormatError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => {
            if root.is_some() {
                return Err(FormatError::Syntax("multiple root elements".into()));
            }
            *root = Some(element);
        }
    }
    Ok(())
}

/// Render a document with an XML prolog and tab indentation
pub fn write_document(document: &XmlElement) -> Result<String, FormatError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| FormatError::Syntax(e.to_string()))?;
    write_element(&mut writer, document)?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| FormatError::Syntax(e.to_string()))
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &XmlElement,
) -> Result<(), FormatError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(|e| FormatError::Syntax(e.to_string()))?;
        return Ok(());
    }
    writer
        .write_event(Event::Start(start))
        .map_err(|e| FormatError::Syntax(e.to_string()))?;
    for child in &element.children {
        match child {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| FormatError::Syntax(e.to_string()))?,
            XmlNode::Comment(text) => writer
                .write_event(Event::Comment(BytesText::new(text)))
                .map_err(|e| FormatError::Syntax(e.to_string()))?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| FormatError::Syntax(e.to_string()))
}

/// Build the document form of a tree
///
/// The tree root is skipped; its children become the top-level `task`
/// elements inside the `tasks` container.
pub fn to_document(tree: &TaskTree) -> XmlElement {
    let mut tasks = XmlElement::new(CONTAINER_ELEMENT);
    for child in tree.root().children() {
        tasks.children.push(XmlNode::Element(task_element(child)));
    }
    let mut document = XmlElement::new(ROOT_ELEMENT);
    document.children.push(XmlNode::Element(tasks));
    document
}

fn task_element(node: &TaskNode) -> XmlElement {
    let mut element = XmlElement::new(TASK_ELEMENT);
    element
        .attributes
        .push((LABEL_ATTRIBUTE.to_string(), node.label().to_string()));
    for child in node.children() {
        element.children.push(XmlNode::Element(task_element(child)));
    }
    element
}

/// Serialize a tree to tasklist XML text
pub fn serialize(tree: &TaskTree) -> Result<String, FormatError> {
    write_document(&to_document(tree))
}

/// Interpret a parsed document as a task tree
///
/// The outermost element must be `tasklist` with exactly one `tasks`
/// container child; every nested element must be a `task` with a
/// non-empty `label` attribute. Nesting depth and child counts are
/// unrestricted.
pub fn from_document(document: &XmlElement) -> Result<TaskTree, FormatError> {
    if document.name != ROOT_ELEMENT {
        return Err(FormatError::UnexpectedElement {
            expected: ROOT_ELEMENT,
            found: document.name.clone(),
        });
    }
    let mut containers = document.child_elements();
    let tasks = containers
        .next()
        .ok_or(FormatError::MissingElement(CONTAINER_ELEMENT))?;
    if tasks.name != CONTAINER_ELEMENT {
        return Err(FormatError::UnexpectedElement {
            expected: CONTAINER_ELEMENT,
            found: tasks.name.clone(),
        });
    }
    if let Some(extra) = containers.next() {
        return Err(FormatError::UnexpectedElement {
            expected: ROOT_ELEMENT,
            found: extra.name.clone(),
        });
    }

    let mut tree = TaskTree::new();
    collect_tasks(tasks, tree.root_mut())?;
    Ok(tree)
}

fn collect_tasks(element: &XmlElement, parent: &mut TaskNode) -> Result<(), FormatError> {
    for child in element.child_elements() {
        if child.name != TASK_ELEMENT {
            return Err(FormatError::UnexpectedElement {
                expected: TASK_ELEMENT,
                found: child.name.clone(),
            });
        }
        let label = match child.attribute(LABEL_ATTRIBUTE) {
            Some(label) if !label.is_empty() => label,
            _ => return Err(FormatError::MissingLabel),
        };
        let mut node = TaskNode::new(label);
        collect_tasks(child, &mut node)?;
        parent.add_child(node);
    }
    Ok(())
}

/// Parse tasklist XML text into a task tree
pub fn parse(text: &str) -> Result<TaskTree, FormatError> {
    from_document(&parse_document(text)?)
}

/// Deep structural equality of two parsed documents
///
/// Attribute sets compare as unordered (name, value) pairs; children
/// compare pairwise in document order with equal counts. Both sides are
/// normalized first, so indentation and comments do not count as
/// content. A server that re-indents its echo still passes; one that
/// drops or reorders a task does not.
pub fn documents_equal(a: &XmlElement, b: &XmlElement) -> bool {
    elements_equal(&a.normalized(), &b.normalized())
}

fn elements_equal(a: &XmlElement, b: &XmlElement) -> bool {
    if a.name != b.name || a.children.len() != b.children.len() {
        return false;
    }
    let mut attrs_a = a.attributes.clone();
    let mut attrs_b = b.attributes.clone();
    attrs_a.sort();
    attrs_b.sort();
    if attrs_a != attrs_b {
        return false;
    }
    a.children
        .iter()
        .zip(&b.children)
        .all(|(a, b)| nodes_equal(a, b))
}

fn nodes_equal(a: &XmlNode, b: &XmlNode) -> bool {
    match (a, b) {
        (XmlNode::Element(a), XmlNode::Element(b)) => elements_equal(a, b),
        (XmlNode::Text(a), XmlNode::Text(b)) => a == b,
        (XmlNode::Comment(a), XmlNode::Comment(b)) => a == b,
        _ => false,
    }
}
