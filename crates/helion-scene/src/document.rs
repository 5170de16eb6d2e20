//! In-memory XML document tree with byte-offset tracking.
//!
//! The loader needs an owned, mutable tree rather than a streaming view:
//! version upgrades rewrite elements, parameter substitution edits attribute
//! values in place, and write-back serializes the modified tree. Parsing is
//! built on quick-xml events; every element remembers the byte offset of its
//! opening `<` so diagnostics can point at a line and column.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A regular element.
    Element,
    /// A comment (preserved for write-back, skipped by the parser).
    Comment,
    /// Non-whitespace character data (rejected by the parser).
    Text,
}

/// A node of the document tree.
#[derive(Debug, Clone)]
pub struct XmlNode {
    /// Node kind.
    pub kind: NodeKind,
    /// Element name (empty for comments and text).
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
    /// Comment or text content.
    pub text: String,
    /// Byte offset of this node's `<` (or text start) in the source.
    pub offset: usize,
}

impl XmlNode {
    fn element(name: String, offset: usize) -> Self {
        Self {
            kind: NodeKind::Element,
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            text: String::new(),
            offset,
        }
    }

    /// Value of the attribute `name`, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set (or replace) an attribute value.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_owned(), value)),
        }
    }

    /// Insert an attribute at the front (used to put `version` first on
    /// write-back).
    pub fn prepend_attr(&mut self, name: &str, value: impl Into<String>) {
        self.remove_attr(name);
        self.attributes.insert(0, (name.to_owned(), value.into()));
    }

    /// Remove an attribute if present.
    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(k, _)| k != name);
    }

    /// Iterate over child elements only.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter(|c| c.kind == NodeKind::Element)
    }
}

/// A parsed document: the root element plus any surrounding comments.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    /// Top-level nodes in document order (exactly one is an element).
    pub nodes: Vec<XmlNode>,
}

impl XmlDocument {
    /// The document element.
    pub fn root_element(&self) -> &XmlNode {
        // parse() guarantees exactly one top-level element
        self.nodes
            .iter()
            .find(|n| n.kind == NodeKind::Element)
            .unwrap()
    }

    /// Mutable access to the document element.
    pub fn root_element_mut(&mut self) -> &mut XmlNode {
        self.nodes
            .iter_mut()
            .find(|n| n.kind == NodeKind::Element)
            .unwrap()
    }
}

/// A document-level syntax error with the byte offset it occurred at.
#[derive(Debug)]
pub struct SyntaxError {
    /// Byte offset into the source text.
    pub offset: usize,
    /// Parser message.
    pub message: String,
}

/// Parse `text` into an owned document tree.
pub fn parse(text: &str) -> Result<XmlDocument, SyntaxError> {
    let mut reader = Reader::from_reader(text.as_bytes());
    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut top_level: Vec<XmlNode> = Vec::new();

    loop {
        let offset = reader.buffer_position() as usize;
        let event = reader.read_event_into(&mut buf).map_err(|e| SyntaxError {
            offset: reader.buffer_position() as usize,
            message: e.to_string(),
        })?;
        match event {
            Event::Start(ref e) => {
                let node = element_from(e, offset)?;
                stack.push(node);
            }
            Event::Empty(ref e) => {
                let node = element_from(e, offset)?;
                attach(&mut stack, &mut top_level, node);
            }
            Event::End(_) => {
                // Mismatched tags are caught by the reader itself
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut top_level, node);
                }
            }
            Event::Text(ref t) => {
                let text = t.unescape().map_err(|e| SyntaxError {
                    offset,
                    message: e.to_string(),
                })?;
                push_text(&mut stack, &mut top_level, text.as_ref(), offset);
            }
            Event::CData(ref t) => {
                let text = String::from_utf8_lossy(t).into_owned();
                push_text(&mut stack, &mut top_level, &text, offset);
            }
            Event::Comment(ref t) => {
                let node = XmlNode {
                    kind: NodeKind::Comment,
                    name: String::new(),
                    attributes: Vec::new(),
                    children: Vec::new(),
                    text: String::from_utf8_lossy(t).into_owned(),
                    offset,
                };
                attach(&mut stack, &mut top_level, node);
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
        buf.clear();
    }

    let element_count = top_level
        .iter()
        .filter(|n| n.kind == NodeKind::Element)
        .count();
    if element_count != 1 {
        return Err(SyntaxError {
            offset: 0,
            message: if element_count == 0 {
                "no document element found".to_owned()
            } else {
                "multiple document elements found".to_owned()
            },
        });
    }

    Ok(XmlDocument { nodes: top_level })
}

fn element_from(start: &BytesStart<'_>, offset: usize) -> Result<XmlNode, SyntaxError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut node = XmlNode::element(name, offset);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| SyntaxError {
            offset,
            message: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| SyntaxError {
                offset,
                message: e.to_string(),
            })?
            .into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut [XmlNode], top_level: &mut Vec<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top_level.push(node),
    }
}

fn push_text(stack: &mut [XmlNode], top_level: &mut Vec<XmlNode>, text: &str, offset: usize) {
    if text.trim().is_empty() {
        return;
    }
    let node = XmlNode {
        kind: NodeKind::Text,
        name: String::new(),
        attributes: Vec::new(),
        children: Vec::new(),
        text: text.trim().to_owned(),
        offset,
    };
    attach(stack, top_level, node);
}

/// Map a byte offset to a human-readable position.
///
/// Returns `line N, col C` for offsets covered by a newline-terminated line,
/// and falls back to `byte offset N` past the last newline.
pub fn offset_to_location(text: &str, pos: usize) -> String {
    let mut line = 0usize;
    let mut line_start = 0usize;
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            if i >= pos {
                return format!("line {}, col {}", line + 1, pos - line_start);
            }
            line += 1;
            line_start = i;
        }
    }
    format!("byte offset {pos}")
}

/// Serialize a document tree back to XML with 4-space indentation.
pub fn write(doc: &XmlDocument) -> Result<String, std::io::Error> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    for node in &doc.nodes {
        write_node(&mut writer, node)?;
    }
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<(), std::io::Error> {
    match node.kind {
        NodeKind::Element => {
            let mut start = BytesStart::new(node.name.as_str());
            for (k, v) in &node.attributes {
                start.push_attribute((k.as_str(), v.as_str()));
            }
            if node.children.is_empty() {
                writer
                    .write_event(Event::Empty(start))
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            } else {
                writer
                    .write_event(Event::Start(start))
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                for child in &node.children {
                    write_node(writer, child)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(node.name.as_str())))
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            }
        }
        NodeKind::Comment => {
            writer
                .write_event(Event::Comment(BytesText::from_escaped(node.text.as_str())))
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        }
        NodeKind::Text => {
            writer
                .write_event(Event::Text(BytesText::new(node.text.as_str())))
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_tree() {
        let doc = parse(r#"<scene version="2.0.0"><bsdf type="diffuse"/></scene>"#).unwrap();
        let root = doc.root_element();
        assert_eq!(root.name, "scene");
        assert_eq!(root.attr("version"), Some("2.0.0"));
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "bsdf");
        assert_eq!(root.children[0].attr("type"), Some("diffuse"));
    }

    #[test]
    fn test_offsets_point_at_elements() {
        let text = "<scene version=\"2.0.0\">\n    <shape type=\"sphere\"/>\n</scene>";
        let doc = parse(text).unwrap();
        let root = doc.root_element();
        assert_eq!(root.offset, 0);
        let shape = &root.children[0];
        assert_eq!(&text[shape.offset..shape.offset + 6], "<shape");
    }

    #[test]
    fn test_comments_preserved() {
        let doc = parse("<scene version=\"2.0.0\"><!-- lens setup --></scene>").unwrap();
        let root = doc.root_element();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].kind, NodeKind::Comment);
        assert_eq!(root.children[0].text, " lens setup ");
    }

    #[test]
    fn test_mismatched_tags_rejected() {
        assert!(parse("<scene><shape></scene>").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_attribute_entities_unescaped() {
        let doc = parse(r#"<scene version="2.0.0" note="a &amp; b"/>"#).unwrap();
        assert_eq!(doc.root_element().attr("note"), Some("a & b"));
    }

    #[test]
    fn test_offset_to_location() {
        let text = "first\nsecond\nthird\n";
        // offset 8 is inside "second"
        assert_eq!(offset_to_location(text, 8), "line 2, col 3");
        // first line columns count from the start of the text
        assert_eq!(offset_to_location(text, 2), "line 1, col 2");
        // past the last newline
        assert_eq!(offset_to_location("no newline here", 7), "byte offset 7");
    }

    #[test]
    fn test_write_round_trips() {
        let text = r#"<scene version="2.0.0"><shape type="sphere"><float name="radius" value="2"/></shape></scene>"#;
        let doc = parse(text).unwrap();
        let written = write(&doc).unwrap();
        let reparsed = parse(&written).unwrap();
        let a = doc.root_element();
        let b = reparsed.root_element();
        assert_eq!(a.name, b.name);
        assert_eq!(a.attributes, b.attributes);
        assert_eq!(a.children[0].children[0].attributes, b.children[0].children[0].attributes);
    }
}
