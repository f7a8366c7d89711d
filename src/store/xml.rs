//! Minimal document tree used by the stores. It understands elements, attributes, text and
//! comments, which is everything squirrel files contain. Comments are kept, so a
//! parse/write cycle leaves them in place.

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};

use super::StoreError;

const INDENT_SIZE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// First text node of the element.
    pub fn text(&self) -> Option<&str> {
        self.children.iter().find_map(|child| match child {
            Node::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Replaces all text nodes with a single one placed before the other children.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|child| !matches!(child, Node::Text(_)));
        self.children.insert(0, Node::Text(text.into()));
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|child| match child {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }
}

/// Parses a document and returns its root element. Comments and text outside of the root are
/// dropped, so is indentation. Text of leaf elements is kept verbatim.
pub fn parse(input: &str) -> Result<Element, StoreError> {
    let mut reader = Reader::from_str(input);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| StoreError::Malformed("unexpected closing tag".into()))?;
                drop_indentation(&mut element);
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(text.unescape()?.into_owned()));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::Text(String::from_utf8_lossy(&data).into_owned()));
                }
            }
            Event::Comment(comment) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::Comment(String::from_utf8_lossy(&comment).into_owned()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = stack.last() {
        return Err(StoreError::Malformed(format!(
            "element {} is never closed",
            unclosed.name
        )));
    }

    root.ok_or_else(|| StoreError::Malformed("document has no root element".into()))
}

fn element_from(start: &BytesStart) -> Result<Element, StoreError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute?;
        element.attributes.push((
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            attribute.unescape_value()?.into_owned(),
        ));
    }
    Ok(element)
}

/// Whitespace between child nodes is layout, not content.
fn drop_indentation(element: &mut Element) {
    if element
        .children
        .iter()
        .any(|child| !matches!(child, Node::Text(_)))
    {
        element
            .children
            .retain(|child| !matches!(child, Node::Text(text) if text.trim().is_empty()));
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), StoreError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(StoreError::Malformed("more than one root element".into())),
    }
    Ok(())
}

/// Serializes a document with an XML declaration, indented.
pub fn to_bytes(root: &Element) -> Result<Vec<u8>, StoreError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_SIZE);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    write_element(&mut writer, root)?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), StoreError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            Node::Comment(comment) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<squirrel name="Novel &amp; notes">
  <!--keep me-->
  <path src="/home/writer/novel" />
  <description>A story</description>
  <goal>1000</goal>
</squirrel>
"#;

    #[test]
    fn parses_elements_attributes_text_and_comments() {
        let root = parse(DOCUMENT).unwrap();
        assert_eq!(root.name, "squirrel");
        assert_eq!(root.attribute("name"), Some("Novel & notes"));
        assert_eq!(root.children[0], Node::Comment("keep me".into()));
        assert_eq!(
            root.find("path").and_then(|p| p.attribute("src")),
            Some("/home/writer/novel")
        );
        assert_eq!(root.find("goal").and_then(Element::text), Some("1000"));
        assert!(root.find("due-date").is_none());
    }

    #[test]
    fn written_document_parses_back_to_the_same_tree() {
        let root = parse(DOCUMENT).unwrap();
        let bytes = to_bytes(&root).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(text.contains("<!--keep me-->"));
        assert!(text.contains("  <goal>1000</goal>"));
        assert_eq!(parse(&text).unwrap(), root);
    }

    #[test]
    fn leaf_text_is_kept_verbatim() {
        let root = Element::new("squirrel")
            .with_child(Element::new("description").with_text("  Part one\n"))
            .with_child(Element::new("goal").with_text(" "));
        let text = String::from_utf8(to_bytes(&root).unwrap()).unwrap();

        let parsed = parse(&text).unwrap();
        assert_eq!(parsed, root);
        assert_eq!(
            parsed.find("description").and_then(Element::text),
            Some("  Part one\n")
        );
    }

    #[test]
    fn set_text_replaces_previous_text() {
        let mut goal = Element::new("goal").with_text("10");
        goal.set_text("20");
        assert_eq!(goal.text(), Some("20"));
        assert_eq!(goal.children.len(), 1);
    }

    #[test]
    fn rejects_documents_without_a_single_root() {
        assert!(matches!(parse(""), Err(StoreError::Malformed(_))));
        assert!(matches!(
            parse("<a></a><b></b>"),
            Err(StoreError::Malformed(_))
        ));
        assert!(parse("<squirrel><watches></squirrel>").is_err());
    }
}
