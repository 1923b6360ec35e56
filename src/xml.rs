//! Minimal in-memory XML tree for TMX/TSX documents.
//!
//! The whole document is read into [`Element`]s with quick-xml before any map
//! construction starts.

use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::properties::Properties;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated text and CDATA content
    pub text: String,
}

impl Element {
    /// Parse a document and return its root element.
    pub fn parse_document(src: &str) -> Result<Element> {
        let mut reader = Reader::from_str(src);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(Element::from_start(&e)?),
                Event::Empty(e) => {
                    let element = Element::from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::structure("unexpected closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::structure(format!("element <{}> is never closed", open.name)));
        }
        root.ok_or_else(|| Error::structure("document has no root element"))
    }

    fn from_start(e: &BytesStart<'_>) -> Result<Element> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Element {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parse an optional attribute; a present but unparsable value is an error.
    pub fn parse_attr<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.attr(name) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                Error::structure(format!(
                    "<{}> attribute {name}=\"{raw}\" is not a valid value",
                    self.name
                ))
            }),
        }
    }

    pub fn attr_or<T: FromStr>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.parse_attr(name)?.unwrap_or(default))
    }

    pub fn required_attr<T: FromStr>(&self, name: &str) -> Result<T> {
        self.parse_attr(name)?.ok_or_else(|| {
            Error::structure(format!("<{}> is missing attribute '{name}'", self.name))
        })
    }

    /// `visible`-style flags stored as `0`/`1`.
    pub fn flag_or(&self, name: &str, default: bool) -> Result<bool> {
        Ok(self.parse_attr::<u8>(name)?.map_or(default, |v| v != 0))
    }

    pub fn string_attr(&self, name: &str) -> Option<String> {
        self.attr(name).map(str::to_owned)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Collect `<properties><property name=".." value=".."/></properties>`.
    ///
    /// Multi-line properties carry their value as text content instead of an attribute.
    pub fn properties(&self) -> Properties {
        self.children_named("properties")
            .flat_map(|p| p.children_named("property"))
            .filter_map(|p| {
                let name = p.attr("name")?;
                let value = p.attr("value").unwrap_or(p.text.as_str());
                Some((name, value))
            })
            .collect()
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(Error::structure("document has more than one root element")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_tree() {
        let doc = r#"<?xml version="1.0" encoding="UTF-8"?>
<map width="2" name="a &amp; b">
  <layer name="one"><data encoding="csv">
1,2
</data></layer>
  <layer name="two"/>
</map>"#;
        let root = Element::parse_document(doc).unwrap();
        assert_eq!(root.name, "map");
        assert_eq!(root.attr("name"), Some("a & b"));
        assert_eq!(root.required_attr::<u32>("width").unwrap(), 2);
        assert_eq!(root.children_named("layer").count(), 2);

        let data = root.child("layer").and_then(|l| l.child("data")).unwrap();
        assert_eq!(data.attr("encoding"), Some("csv"));
        assert_eq!(data.text, "1,2");
    }

    #[test]
    fn attribute_helpers() {
        let root = Element::parse_document(r#"<layer width="x" visible="0" opacity="0.5"/>"#)
            .unwrap();
        assert!(matches!(root.parse_attr::<u32>("width"), Err(Error::Structure(_))));
        assert!(matches!(root.required_attr::<u32>("height"), Err(Error::Structure(_))));
        assert_eq!(root.attr_or("height", 7u32).unwrap(), 7);
        assert_eq!(root.attr_or("opacity", 1.0f32).unwrap(), 0.5);
        assert!(!root.flag_or("visible", true).unwrap());
        assert!(root.flag_or("locked", true).unwrap());
    }

    #[test]
    fn reads_properties_including_text_values() {
        let root = Element::parse_document(
            r#"<tile id="1"><properties>
                 <property name="color" value="azul"/>
                 <property name="story">once upon</property>
               </properties></tile>"#,
        )
        .unwrap();
        let props = root.properties();
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("color"), Some("azul"));
        assert_eq!(props.get("story"), Some("once upon"));
    }

    #[test]
    fn cdata_is_text() {
        let root = Element::parse_document("<data><![CDATA[1,2,3]]></data>").unwrap();
        assert_eq!(root.text, "1,2,3");
    }

    #[test]
    fn unclosed_or_mismatched_documents_fail() {
        assert!(Element::parse_document("<map><layer></map>").is_err());
        assert!(Element::parse_document("<map>").is_err());
        assert!(Element::parse_document("").is_err());
    }
}
