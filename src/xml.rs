//! Order-preserving XML tree model.
//!
//! Salesforce metadata files are edited in place, so the parse/serialize cycle
//! must keep element order, attribute order, comments and CDATA intact; the
//! only acceptable difference after a round trip is indentation. Tokenization
//! is delegated to quick-xml; this module owns the tree shape and the
//! deterministic serializer.

use indexmap::IndexMap;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};

const INDENT_WIDTH: usize = 4;

/// A single XML element with ordered attributes and ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<XmlNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Concatenated text content of the element's direct text/CDATA children,
    /// or `None` if the element has no text children at all.
    ///
    /// Removal rules compare this against the target identifier, so it must be
    /// the exact decoded text, with no trimming or case folding here beyond what
    /// the parser already applied to surrounding whitespace.
    pub fn text(&self) -> Option<String> {
        let mut out = String::new();
        let mut found = false;
        for child in &self.children {
            match child {
                XmlNode::Text(t) | XmlNode::CData(t) => {
                    out.push_str(t);
                    found = true;
                }
                _ => {}
            }
        }
        found.then_some(out)
    }

    /// First direct child element with the given tag name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            XmlNode::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }
}

/// Tagged node variant so traversal code can match exhaustively instead of
/// probing for properties.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(Element),
    /// Entity-decoded character data between tags.
    Text(String),
    /// Comment body, kept verbatim (entities inside comments are not decoded).
    Comment(String),
    /// CDATA section body, kept verbatim.
    CData(String),
    /// Processing instruction content after `<?`, kept verbatim.
    Pi(String),
    /// DOCTYPE content, kept verbatim.
    Doctype(String),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// The `<?xml ...?>` declaration, re-emitted on serialization when present.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDecl {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// One parsed file: optional declaration plus the ordered top-level node
/// sequence (root element and any surrounding comments).
///
/// A document is private to one parse/modify/serialize cycle; it is never
/// shared across files or retained between operations.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub decl: Option<XmlDecl>,
    pub nodes: Vec<XmlNode>,
}

impl XmlDocument {
    /// Parse raw XML text into an order-preserving tree.
    ///
    /// Fails on malformed input: mismatched or unterminated tags, invalid
    /// entities, documents without a root element.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut decl = None;
        let mut nodes: Vec<XmlNode> = Vec::new();
        let mut stack: Vec<Element> = Vec::new();

        loop {
            let pos = reader.buffer_position();
            match reader.read_event() {
                Err(e) => return Err(Error::parse(reader.buffer_position(), e)),
                Ok(Event::Decl(d)) => {
                    let version = d
                        .version()
                        .map_err(|e| Error::parse(pos, e))
                        .map(|v| String::from_utf8_lossy(&v).into_owned())?;
                    let encoding = match d.encoding() {
                        Some(Ok(v)) => Some(String::from_utf8_lossy(&v).into_owned()),
                        Some(Err(e)) => return Err(Error::parse(pos, e)),
                        None => None,
                    };
                    let standalone = match d.standalone() {
                        Some(Ok(v)) => Some(String::from_utf8_lossy(&v).into_owned()),
                        Some(Err(e)) => return Err(Error::parse(pos, e)),
                        None => None,
                    };
                    decl = Some(XmlDecl {
                        version,
                        encoding,
                        standalone,
                    });
                }
                Ok(Event::Start(e)) => {
                    let element = read_element(&e, pos)?;
                    stack.push(element);
                }
                Ok(Event::Empty(e)) => {
                    let element = read_element(&e, pos)?;
                    append(&mut nodes, &mut stack, XmlNode::Element(element));
                }
                Ok(Event::End(_)) => match stack.pop() {
                    Some(element) => append(&mut nodes, &mut stack, XmlNode::Element(element)),
                    None => return Err(Error::parse(pos, "unexpected closing tag")),
                },
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(|e| Error::parse(pos, e))?;
                    if !text.is_empty() {
                        append(&mut nodes, &mut stack, XmlNode::Text(text.into_owned()));
                    }
                }
                Ok(Event::CData(c)) => {
                    let raw = String::from_utf8_lossy(&c).into_owned();
                    append(&mut nodes, &mut stack, XmlNode::CData(raw));
                }
                Ok(Event::Comment(c)) => {
                    let raw = String::from_utf8_lossy(&c).into_owned();
                    append(&mut nodes, &mut stack, XmlNode::Comment(raw));
                }
                Ok(Event::PI(pi)) => {
                    let raw = String::from_utf8_lossy(&pi).into_owned();
                    append(&mut nodes, &mut stack, XmlNode::Pi(raw));
                }
                Ok(Event::DocType(d)) => {
                    let raw = String::from_utf8_lossy(&d).into_owned();
                    append(&mut nodes, &mut stack, XmlNode::Doctype(raw));
                }
                Ok(Event::Eof) => break,
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::parse(
                reader.buffer_position(),
                format!("unterminated element <{}>", open.name),
            ));
        }
        if !nodes.iter().any(|n| matches!(n, XmlNode::Element(_))) {
            return Err(Error::parse(0, "document has no root element"));
        }

        Ok(Self { decl, nodes })
    }

    /// Rebuild XML text from the tree.
    ///
    /// Deterministic for a given document. Output is re-indented with four
    /// spaces per level; tag names, attributes and text content of every
    /// surviving node are written back unchanged.
    pub fn serialize(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH);

        if let Some(decl) = &self.decl {
            writer
                .write_event(Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )))
                .map_err(|e| Error::Serialize(e.to_string()))?;
        }
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }

        let mut out = String::from_utf8(writer.into_inner())
            .map_err(|e| Error::Serialize(e.to_string()))?;
        out.push('\n');
        Ok(out)
    }
}

fn read_element(start: &BytesStart<'_>, pos: u64) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = IndexMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::parse(pos, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::parse(pos, e))?
            .into_owned();
        attributes.insert(key, value);
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn append(nodes: &mut Vec<XmlNode>, stack: &mut Vec<Element>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => nodes.push(node),
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Element(el) => {
            let mut start = BytesStart::new(el.name.as_str());
            for (key, value) in &el.attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            if el.children.is_empty() {
                written(writer.write_event(Event::Empty(start)))?;
            } else {
                written(writer.write_event(Event::Start(start)))?;
                for child in &el.children {
                    write_node(writer, child)?;
                }
                written(writer.write_event(Event::End(BytesEnd::new(el.name.as_str()))))?;
            }
        }
        XmlNode::Text(t) => written(writer.write_event(Event::Text(BytesText::new(t))))?,
        XmlNode::Comment(c) => {
            written(writer.write_event(Event::Comment(BytesText::from_escaped(c.as_str()))))?
        }
        XmlNode::CData(c) => written(writer.write_event(Event::CData(BytesCData::new(c.as_str()))))?,
        XmlNode::Pi(p) => written(writer.write_event(Event::PI(BytesPI::new(p.as_str()))))?,
        XmlNode::Doctype(d) => {
            written(writer.write_event(Event::DocType(BytesText::from_escaped(d.as_str()))))?
        }
    }
    Ok(())
}

fn written<E: std::fmt::Display>(result: std::result::Result<(), E>) -> Result<()> {
    result.map_err(|e| Error::Serialize(e.to_string()))
}
