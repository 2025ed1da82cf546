//! Dotted/indexed property path parsing.
//!
//! A path like `orders[0].lines[2].sku` splits into segments, each with an
//! optional index. Map keys use the same bracket form: `scores[math]`.

/// One step of a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySegment {
	pub name: String,
	pub index: Option<PropertyIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyIndex {
	Position(usize),
	Key(String),
}

/// Splits a property path into segments. Malformed brackets are treated as
/// part of the name so misconfigurations surface as missing properties
/// rather than panics.
pub fn parse_path(path: &str) -> Vec<PropertySegment> {
	path.split('.').map(parse_segment).collect()
}

fn parse_segment(raw: &str) -> PropertySegment {
	if let Some(open) = raw.find('[') {
		if let Some(close) = raw.rfind(']') {
			if close > open {
				let name = raw[..open].to_string();
				let inner = &raw[open + 1..close];
				let index = match inner.parse::<usize>() {
					Ok(n) => PropertyIndex::Position(n),
					Err(_) => PropertyIndex::Key(inner.trim_matches(['\'', '"']).to_string()),
				};
				return PropertySegment { name, index: Some(index) };
			}
		}
	}
	PropertySegment { name: raw.to_string(), index: None }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_simple_path() {
		let segs = parse_path("a.b.c");
		assert_eq!(segs.len(), 3);
		assert_eq!(segs[1].name, "b");
		assert!(segs[1].index.is_none());
	}

	#[test]
	fn test_positional_index() {
		let segs = parse_path("items[3].name");
		assert_eq!(segs[0].index, Some(PropertyIndex::Position(3)));
		assert_eq!(segs[1].name, "name");
	}

	#[test]
	fn test_key_index() {
		let segs = parse_path("scores[math]");
		assert_eq!(segs[0].index, Some(PropertyIndex::Key("math".into())));
	}

	#[test]
	fn test_quoted_key_index() {
		let segs = parse_path("scores['math']");
		assert_eq!(segs[0].index, Some(PropertyIndex::Key("math".into())));
	}
}
