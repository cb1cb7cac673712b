// crates/mtp-sim-aml/src/document.rs

//! A minimal owned element tree built from `quick-xml` events.
//!
//! Only what the extraction strategies look at is kept: local element names,
//! attributes by local name, and text content with references resolved.

use crate::error::AmlError;
use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Default)]
pub(crate) struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>, decoder: Decoder) -> Result<Self, AmlError> {
        let mut element = Element {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Default::default()
        };
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.decode_and_unescape_value(decoder)?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    /// Value of the attribute with local name `name` (case-sensitive).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct children with local name `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text content of this element and all its descendants.
    pub fn text(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.text());
        }
        out
    }

    /// This element and every descendant in document order, each paired with
    /// its parent (`None` for `self`).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![(None, self)],
        }
    }
}

pub(crate) struct Descendants<'a> {
    stack: Vec<(Option<&'a Element>, &'a Element)>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = (Option<&'a Element>, &'a Element);

    fn next(&mut self) -> Option<Self::Item> {
        let (parent, element) = self.stack.pop()?;
        self.stack
            .extend(element.children.iter().rev().map(|c| (Some(element), c)));
        Some((parent, element))
    }
}

/// Builds the element tree of `xml`, returning its root element.
pub(crate) fn parse_document(xml: &str) -> Result<Element, AmlError> {
    let xml = xml.trim_start_matches('\u{feff}');
    if xml.trim().is_empty() {
        return Err(AmlError::malformed("empty document"));
    }

    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            AmlError::malformed(format!("{} (at byte {})", e, reader.error_position()))
        })?;
        match event {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(AmlError::malformed("multiple root elements"));
                }
                stack.push(Element::from_start(&start, reader.decoder())?);
            }
            Event::Empty(start) => {
                let element = Element::from_start(&start, reader.decoder())?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                // End names are checked by the reader.
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element)?;
                }
            }
            Event::Text(text) => push_text(&mut stack, &String::from_utf8_lossy(&text))?,
            Event::CData(cdata) => push_text(&mut stack, &String::from_utf8_lossy(&cdata))?,
            Event::GeneralRef(reference) => {
                let resolved = match reference.resolve_char_ref()? {
                    Some(ch) => ch.to_string(),
                    None => {
                        let name = String::from_utf8_lossy(&reference);
                        resolve_predefined_entity(&name)
                            .ok_or_else(|| {
                                AmlError::malformed(format!("unknown entity '&{};'", name))
                            })?
                            .to_string()
                    }
                };
                push_text(&mut stack, &resolved)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(AmlError::malformed(format!(
            "unexpected end of document, <{}> is not closed",
            open.name
        )));
    }
    root.ok_or_else(|| AmlError::malformed("no root element"))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), AmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(AmlError::malformed("multiple root elements")),
        None => *root = Some(element),
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), AmlError> {
    match stack.last_mut() {
        Some(element) => element.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err(AmlError::malformed("text outside the root element")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_shape_and_local_names() {
        let root = parse_document(
            r#"<?xml version="1.0"?>
            <caex:CAEXFile xmlns:caex="urn:caex">
              <caex:InstanceHierarchy Name="IH">
                <Attribute Name="A"><Value>1</Value></Attribute>
                <Attribute Name="B"/>
              </caex:InstanceHierarchy>
            </caex:CAEXFile>"#,
        )
        .unwrap();

        assert_eq!(root.name, "CAEXFile");
        let ih = &root.children[0];
        assert_eq!(ih.name, "InstanceHierarchy");
        assert_eq!(ih.attr("Name"), Some("IH"));
        let names: Vec<_> = ih.children_named("Attribute").filter_map(|a| a.attr("Name")).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn test_descendants_in_document_order_with_parents() {
        let root = parse_document("<a><b><c/></b><d/></a>").unwrap();
        let seen: Vec<_> = root
            .descendants()
            .map(|(p, e)| (p.map(|p| p.name.as_str()), e.name.as_str()))
            .collect();
        assert_eq!(
            seen,
            [(None, "a"), (Some("a"), "b"), (Some("b"), "c"), (Some("a"), "d")]
        );
    }

    #[test]
    fn test_references_are_resolved() {
        let root =
            parse_document(r#"<v Name="a &amp; b">x &lt; y &#65;<![CDATA[<raw>]]></v>"#).unwrap();
        assert_eq!(root.attr("Name"), Some("a & b"));
        assert_eq!(root.text(), "x < y A<raw>");
    }

    #[test]
    fn test_malformed_inputs() {
        for xml in [
            "",
            "   ",
            "<a>",
            "<a></b>",
            "<a/><b/>",
            "just text",
            "<!-- only a comment -->",
            "<a>&bogus;</a>",
        ] {
            assert!(
                matches!(parse_document(xml), Err(AmlError::MalformedDocument { .. })),
                "expected {xml:?} to be rejected"
            );
        }
    }
}
