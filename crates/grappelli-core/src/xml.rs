//! Owned XML element tree, read through `quick-xml`.
//!
//! Mapper and configuration documents are small, so they are materialized
//! into a tree once and walked freely by the builders; dynamic tags nest
//! arbitrarily, which a streaming read would make painful.

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::Event;

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
	#[error("malformed XML: {0}")]
	Malformed(String),
	#[error("unexpected closing tag </{found}>, expected </{expected}>")]
	MismatchedTag { expected: String, found: String },
	#[error("document has no root element")]
	NoRoot,
	#[error("invalid text encoding: {0}")]
	Encoding(String),
}

impl From<quick_xml::Error> for XmlError {
	fn from(e: quick_xml::Error) -> Self {
		XmlError::Malformed(e.to_string())
	}
}

/// One element with attributes and mixed children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
	pub name: String,
	pub attributes: IndexMap<String, String>,
	pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
	Element(XmlElement),
	Text(String),
}

impl XmlElement {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), attributes: IndexMap::new(), children: Vec::new() }
	}

	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(String::as_str)
	}

	pub fn attr_or(&self, name: &str, default: &'static str) -> String {
		self.attr(name).unwrap_or(default).to_string()
	}

	pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
		self.children.iter().filter_map(|c| match c {
			XmlNode::Element(e) => Some(e),
			XmlNode::Text(_) => None,
		})
	}

	pub fn element(&self, name: &str) -> Option<&XmlElement> {
		self.elements().find(|e| e.name == name)
	}

	/// Concatenated text and CDATA of direct children, untrimmed.
	pub fn text(&self) -> String {
		let mut out = String::new();
		for child in &self.children {
			if let XmlNode::Text(t) = child {
				out.push_str(t);
			}
		}
		out
	}

	/// Full text of the subtree, dynamic tags flattened away.
	pub fn deep_text(&self) -> String {
		let mut out = String::new();
		for child in &self.children {
			match child {
				XmlNode::Text(t) => out.push_str(t),
				XmlNode::Element(e) => out.push_str(&e.deep_text()),
			}
		}
		out
	}
}

/// Parses a document into its root element.
pub fn parse_document(text: &str) -> Result<XmlElement, XmlError> {
	let mut reader = Reader::from_str(text);
	let mut stack: Vec<XmlElement> = Vec::new();
	let mut root: Option<XmlElement> = None;
	loop {
		match reader.read_event()? {
			Event::Start(start) => {
				let element = element_from_start(&start)?;
				stack.push(element);
			}
			Event::Empty(start) => {
				let element = element_from_start(&start)?;
				attach(&mut stack, &mut root, element)?;
			}
			Event::End(end) => {
				let name = String::from_utf8_lossy(end.name().as_ref()).to_string();
				let element = stack.pop().ok_or(XmlError::MismatchedTag {
					expected: "nothing".into(),
					found: name.clone(),
				})?;
				if element.name != name {
					return Err(XmlError::MismatchedTag { expected: element.name, found: name });
				}
				attach(&mut stack, &mut root, element)?;
			}
			Event::Text(text) => {
				let decoded = text
					.unescape()
					.map_err(|e| XmlError::Encoding(e.to_string()))?
					.to_string();
				push_text(&mut stack, decoded);
			}
			Event::CData(cdata) => {
				let decoded = String::from_utf8_lossy(cdata.into_inner().as_ref()).to_string();
				push_text(&mut stack, decoded);
			}
			Event::Eof => break,
			// declarations, comments, doctypes, PIs carry no mapping content
			_ => {}
		}
	}
	if let Some(open) = stack.pop() {
		return Err(XmlError::Malformed(format!("unclosed element <{}>", open.name)));
	}
	root.ok_or(XmlError::NoRoot)
}

fn element_from_start(
	start: &quick_xml::events::BytesStart<'_>,
) -> Result<XmlElement, XmlError> {
	let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
	let mut element = XmlElement::new(name);
	for attr in start.attributes() {
		let attr = attr.map_err(|e| XmlError::Malformed(e.to_string()))?;
		let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
		let value = attr
			.unescape_value()
			.map_err(|e| XmlError::Encoding(e.to_string()))?
			.to_string();
		element.attributes.insert(key, value);
	}
	Ok(element)
}

fn attach(
	stack: &mut [XmlElement],
	root: &mut Option<XmlElement>,
	element: XmlElement,
) -> Result<(), XmlError> {
	match stack.last_mut() {
		Some(parent) => {
			parent.children.push(XmlNode::Element(element));
			Ok(())
		}
		None => {
			if root.is_some() {
				return Err(XmlError::Malformed("multiple root elements".into()));
			}
			*root = Some(element);
			Ok(())
		}
	}
}

fn push_text(stack: &mut [XmlElement], text: String) {
	if let Some(parent) = stack.last_mut() {
		parent.children.push(XmlNode::Text(text));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_nested_elements() {
		let root = parse_document(
			r#"<mapper namespace="blog"><select id="find">SELECT * FROM blog</select></mapper>"#,
		)
		.unwrap();
		assert_eq!(root.name, "mapper");
		assert_eq!(root.attr("namespace"), Some("blog"));
		let select = root.element("select").unwrap();
		assert_eq!(select.attr("id"), Some("find"));
		assert_eq!(select.text(), "SELECT * FROM blog");
	}

	#[test]
	fn test_mixed_content_preserved_in_order() {
		let root = parse_document("<sql>a <if test=\"x\">b</if> c</sql>").unwrap();
		assert_eq!(root.children.len(), 3);
		assert!(matches!(&root.children[1], XmlNode::Element(e) if e.name == "if"));
	}

	#[test]
	fn test_cdata_kept_verbatim() {
		let root = parse_document("<select><![CDATA[a < b]]></select>").unwrap();
		assert_eq!(root.text(), "a < b");
	}

	#[test]
	fn test_self_closing_element() {
		let root = parse_document(r#"<cache type="lru"/>"#).unwrap();
		assert_eq!(root.attr("type"), Some("lru"));
	}

	#[test]
	fn test_mismatched_tags_rejected() {
		assert!(parse_document("<a><b></a></b>").is_err());
		assert!(parse_document("<a>").is_err());
	}
}
