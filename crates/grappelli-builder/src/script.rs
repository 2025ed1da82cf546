//! The dynamic-script compiler: a statement body's element tree becomes a
//! [`SqlNode`] tree, and the tree becomes a raw or dynamic SQL source.

use std::sync::Arc;

use grappelli_core::expr::Expr;
use grappelli_core::xml::{XmlElement, XmlNode};
use grappelli_mapping::{
	BuildError, Configuration, DynamicSqlSource, RawSqlSource, SqlNode, SqlSource,
};

/// Parses the body and picks the source kind: dynamic when any dynamic tag
/// or `${…}` substitution is present, raw (compiled once) otherwise.
pub fn build_sql_source(
	configuration: &Configuration,
	body: &XmlElement,
) -> Result<Arc<dyn SqlSource>, BuildError> {
	let (root, dynamic) = parse_dynamic_tags(body)?;
	if dynamic {
		Ok(Arc::new(DynamicSqlSource::new(root)))
	} else {
		Ok(Arc::new(RawSqlSource::new(configuration, &root)?))
	}
}

/// Parses mixed text and dynamic elements into a node tree. Returns the
/// tree and whether anything dynamic was seen.
pub fn parse_dynamic_tags(element: &XmlElement) -> Result<(SqlNode, bool), BuildError> {
	let mut contents = Vec::new();
	let mut dynamic = false;
	for child in &element.children {
		match child {
			XmlNode::Text(text) => {
				if text.trim().is_empty() {
					continue;
				}
				if contains_substitution(text) {
					dynamic = true;
					contents.push(SqlNode::Text(text.clone()));
				} else {
					contents.push(SqlNode::StaticText(text.clone()));
				}
			}
			XmlNode::Element(child) => {
				dynamic = true;
				contents.push(parse_element(child)?);
			}
		}
	}
	Ok((SqlNode::Mixed(contents), dynamic))
}

fn contains_substitution(text: &str) -> bool {
	// an escaped \${ does not make the text dynamic on its own
	let mut rest = text;
	while let Some(pos) = rest.find("${") {
		if pos == 0 || rest.as_bytes()[pos - 1] != b'\\' {
			return true;
		}
		rest = &rest[pos + 2..];
	}
	false
}

fn parse_element(element: &XmlElement) -> Result<SqlNode, BuildError> {
	match element.name.as_str() {
		"if" => {
			let test = required_attr(element, "test")?;
			let (contents, _) = parse_dynamic_tags(element)?;
			Ok(SqlNode::If { test: Expr::parse(&test)?, contents: Box::new(contents) })
		}
		"where" => {
			let (contents, _) = parse_dynamic_tags(element)?;
			Ok(SqlNode::where_node(contents))
		}
		"set" => {
			let (contents, _) = parse_dynamic_tags(element)?;
			Ok(SqlNode::set_node(contents))
		}
		"trim" => {
			let (contents, _) = parse_dynamic_tags(element)?;
			Ok(SqlNode::Trim {
				contents: Box::new(contents),
				prefix: element.attr("prefix").map(String::from),
				suffix: element.attr("suffix").map(String::from),
				prefix_overrides: parse_overrides(element.attr("prefixOverrides")),
				suffix_overrides: parse_overrides(element.attr("suffixOverrides")),
			})
		}
		"foreach" => {
			let collection = required_attr(element, "collection")?;
			let (contents, _) = parse_dynamic_tags(element)?;
			Ok(SqlNode::Foreach {
				collection: Expr::parse(&collection)?,
				item: element.attr("item").map(String::from),
				index: element.attr("index").map(String::from),
				open: element.attr("open").map(String::from),
				close: element.attr("close").map(String::from),
				separator: element.attr("separator").map(String::from),
				contents: Box::new(contents),
			})
		}
		"choose" => parse_choose(element),
		"bind" => {
			let name = required_attr(element, "name")?;
			let value = required_attr(element, "value")?;
			Ok(SqlNode::Bind { name, expression: Expr::parse(&value)? })
		}
		other => Err(BuildError::message(format!(
			"unknown element <{other}> in SQL statement"
		))),
	}
}

fn parse_choose(element: &XmlElement) -> Result<SqlNode, BuildError> {
	let mut whens = Vec::new();
	let mut otherwise = None;
	for child in element.elements() {
		match child.name.as_str() {
			"when" => {
				let test = required_attr(child, "test")?;
				let (contents, _) = parse_dynamic_tags(child)?;
				whens.push((Expr::parse(&test)?, contents));
			}
			"otherwise" => {
				if otherwise.is_some() {
					return Err(BuildError::message(
						"too many <otherwise> elements in <choose>",
					));
				}
				let (contents, _) = parse_dynamic_tags(child)?;
				otherwise = Some(Box::new(contents));
			}
			other => {
				return Err(BuildError::message(format!(
					"unexpected element <{other}> in <choose>"
				)));
			}
		}
	}
	Ok(SqlNode::Choose { whens, otherwise })
}

fn parse_overrides(spec: Option<&str>) -> Vec<String> {
	spec.map(|s| s.split('|').map(|part| part.trim().to_string()).filter(|p| !p.is_empty()).collect())
		.unwrap_or_default()
}

fn required_attr(element: &XmlElement, name: &str) -> Result<String, BuildError> {
	element
		.attr(name)
		.map(String::from)
		.ok_or_else(|| {
			BuildError::message(format!("<{}> requires a '{name}' attribute", element.name))
		})
}

#[cfg(test)]
mod tests {
	use super::*;
	use grappelli_core::value::Value;
	use grappelli_core::xml::parse_document;
	use grappelli_mapping::DynamicContext;

	fn render(xml: &str, parameter: Value) -> String {
		let element = parse_document(xml).unwrap();
		let (node, _) = parse_dynamic_tags(&element).unwrap();
		let mut ctx = DynamicContext::new(&parameter, None);
		node.apply(&mut ctx).unwrap();
		ctx.sql()
	}

	fn object(entries: &[(&str, Value)]) -> Value {
		Value::Object(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
	}

	#[test]
	fn test_static_body_is_not_dynamic() {
		let element = parse_document("<select>SELECT 1</select>").unwrap();
		let (_, dynamic) = parse_dynamic_tags(&element).unwrap();
		assert!(!dynamic);
	}

	#[test]
	fn test_substitution_marks_dynamic() {
		let element = parse_document("<select>SELECT * FROM ${table}</select>").unwrap();
		let (_, dynamic) = parse_dynamic_tags(&element).unwrap();
		assert!(dynamic);
		let escaped = parse_document(r"<select>SELECT '\${literal}'</select>").unwrap();
		let (_, dynamic) = parse_dynamic_tags(&escaped).unwrap();
		assert!(!dynamic);
	}

	#[test]
	fn test_where_if_script() {
		let sql = render(
			r#"<select>SELECT * FROM t
				<where>
					<if test="a != null">AND a = #{a}</if>
					<if test="b != null">AND b = #{b}</if>
				</where>
			</select>"#,
			object(&[("a", Value::Int(1)), ("b", Value::Null)]),
		);
		assert_eq!(sql, "SELECT * FROM t WHERE a = #{a}");
	}

	#[test]
	fn test_choose_script() {
		let sql = render(
			r#"<select>
				<choose>
					<when test="kind == 'a'">1</when>
					<otherwise>2</otherwise>
				</choose>
			</select>"#,
			object(&[("kind", Value::from("z"))]),
		);
		assert_eq!(sql, "2");
	}

	#[test]
	fn test_trim_overrides_parse() {
		let sql = render(
			r#"<select><trim prefix="WHERE" prefixOverrides="AND |OR ">AND x = 1</trim></select>"#,
			object(&[]),
		);
		assert_eq!(sql, "WHERE x = 1");
	}

	#[test]
	fn test_unknown_element_rejected() {
		let element = parse_document("<select><loop>x</loop></select>").unwrap();
		assert!(parse_dynamic_tags(&element).is_err());
	}

	#[test]
	fn test_two_otherwise_rejected() {
		let element = parse_document(
			"<select><choose><otherwise>1</otherwise><otherwise>2</otherwise></choose></select>",
		)
		.unwrap();
		assert!(parse_dynamic_tags(&element).is_err());
	}
}
