//! The dynamic SQL node tree.
//!
//! A statement body parses once into a [`SqlNode`] tree; each invocation
//! walks the tree against a [`DynamicContext`] seeded with the parameter
//! object, appending SQL fragments and introducing bindings as it goes.

use grappelli_core::expr::{Expr, Scope};
use grappelli_core::meta::MetaValue;
use grappelli_core::token::TokenParser;
use grappelli_core::value::Value;
use indexmap::IndexMap;

use crate::error::BuildError;

pub const PARAMETER_BINDING: &str = "_parameter";
pub const DATABASE_ID_BINDING: &str = "_databaseId";

/// Render-time state: the bindings map (case-insensitive lookups, seeded
/// with `_parameter` and `_databaseId`), the SQL accumulator, and a counter
/// for unique `foreach` binding names.
pub struct DynamicContext {
	bindings: IndexMap<String, Value>,
	fragments: Vec<String>,
	unique_number: u32,
}

impl DynamicContext {
	pub fn new(parameter: &Value, database_id: Option<&str>) -> Self {
		let mut bindings = IndexMap::new();
		bindings.insert(PARAMETER_BINDING.to_string(), parameter.clone());
		bindings.insert(
			DATABASE_ID_BINDING.to_string(),
			database_id.map(Value::from).unwrap_or(Value::Null),
		);
		Self { bindings, fragments: Vec::new(), unique_number: 0 }
	}

	pub fn bind(&mut self, name: impl Into<String>, value: Value) {
		self.bindings.insert(name.into(), value);
	}

	pub fn bindings(&self) -> &IndexMap<String, Value> {
		&self.bindings
	}

	pub fn append(&mut self, fragment: &str) {
		let fragment = fragment.trim();
		if !fragment.is_empty() {
			self.fragments.push(fragment.to_string());
		}
	}

	pub fn sql(&self) -> String {
		self.fragments.join(" ")
	}

	pub fn next_unique(&mut self) -> u32 {
		let n = self.unique_number;
		self.unique_number += 1;
		n
	}

	/// Renders a subtree into its own buffer while sharing bindings and the
	/// unique counter with the parent.
	fn capture(
		&mut self,
		f: impl FnOnce(&mut Self) -> Result<(), BuildError>,
	) -> Result<String, BuildError> {
		let saved = std::mem::take(&mut self.fragments);
		let result = f(self);
		let rendered = self.sql();
		self.fragments = saved;
		result?;
		Ok(rendered)
	}
}

impl Scope for DynamicContext {
	fn resolve(&self, name: &str) -> Option<Value> {
		if let Some(found) = self.bindings.get(name) {
			return Some(found.clone());
		}
		if let Some((_, found)) = self.bindings.iter().find(|(k, _)| k.eq_ignore_ascii_case(name))
		{
			return Some(found.clone());
		}
		let parameter = self.bindings.get(PARAMETER_BINDING)?;
		MetaValue::new(parameter).get(name).cloned()
	}
}

/// One node of a parsed statement body.
#[derive(Debug, Clone)]
pub enum SqlNode {
	/// Literal text with no substitutions.
	StaticText(String),
	/// Text containing `${…}` substitutions, expanded per invocation.
	Text(String),
	Mixed(Vec<SqlNode>),
	If { test: Expr, contents: Box<SqlNode> },
	Choose { whens: Vec<(Expr, SqlNode)>, otherwise: Option<Box<SqlNode>> },
	Trim {
		contents: Box<SqlNode>,
		prefix: Option<String>,
		suffix: Option<String>,
		prefix_overrides: Vec<String>,
		suffix_overrides: Vec<String>,
	},
	Foreach {
		collection: Expr,
		item: Option<String>,
		index: Option<String>,
		open: Option<String>,
		close: Option<String>,
		separator: Option<String>,
		contents: Box<SqlNode>,
	},
	Bind { name: String, expression: Expr },
}

impl SqlNode {
	/// `where` is trim with a WHERE prefix stripping leading conjunctions.
	pub fn where_node(contents: SqlNode) -> SqlNode {
		SqlNode::Trim {
			contents: Box::new(contents),
			prefix: Some("WHERE".to_string()),
			suffix: None,
			prefix_overrides: vec!["AND".to_string(), "OR".to_string()],
			suffix_overrides: Vec::new(),
		}
	}

	/// `set` is trim with a SET prefix stripping stray commas on both ends.
	pub fn set_node(contents: SqlNode) -> SqlNode {
		SqlNode::Trim {
			contents: Box::new(contents),
			prefix: Some("SET".to_string()),
			suffix: None,
			prefix_overrides: vec![",".to_string()],
			suffix_overrides: vec![",".to_string()],
		}
	}

	/// Applies this node, appending SQL and bindings into the context.
	/// Returns whether the node contributed anything, which `choose` and
	/// `trim` rely on.
	pub fn apply(&self, ctx: &mut DynamicContext) -> Result<bool, BuildError> {
		match self {
			SqlNode::StaticText(text) => {
				ctx.append(text);
				Ok(true)
			}
			SqlNode::Text(text) => {
				let expanded = TokenParser::new("${", "}").parse(text, |expr| {
					let value = Expr::parse(expr)?.eval(ctx)?;
					Ok::<String, BuildError>(match value {
						Value::Null => String::new(),
						other => other.to_string(),
					})
				})?;
				ctx.append(&expanded);
				Ok(true)
			}
			SqlNode::Mixed(children) => {
				for child in children {
					child.apply(ctx)?;
				}
				Ok(true)
			}
			SqlNode::If { test, contents } => {
				if test.test(ctx)? {
					contents.apply(ctx)?;
					Ok(true)
				} else {
					Ok(false)
				}
			}
			SqlNode::Choose { whens, otherwise } => {
				for (test, contents) in whens {
					if test.test(ctx)? {
						contents.apply(ctx)?;
						return Ok(true);
					}
				}
				if let Some(fallback) = otherwise {
					fallback.apply(ctx)?;
					return Ok(true);
				}
				Ok(false)
			}
			SqlNode::Trim { contents, prefix, suffix, prefix_overrides, suffix_overrides } => {
				apply_trim(ctx, contents, prefix, suffix, prefix_overrides, suffix_overrides)
			}
			SqlNode::Foreach { collection, item, index, open, close, separator, contents } => {
				apply_foreach(ctx, collection, item, index, open, close, separator, contents)
			}
			SqlNode::Bind { name, expression } => {
				let value = expression.eval(ctx)?;
				ctx.bind(name.clone(), value);
				Ok(true)
			}
		}
	}
}

fn apply_trim(
	ctx: &mut DynamicContext,
	contents: &SqlNode,
	prefix: &Option<String>,
	suffix: &Option<String>,
	prefix_overrides: &[String],
	suffix_overrides: &[String],
) -> Result<bool, BuildError> {
	let rendered = ctx.capture(|ctx| contents.apply(ctx).map(|_| ()))?;
	let mut body = rendered.trim().to_string();
	if body.is_empty() {
		return Ok(false);
	}
	for over in prefix_overrides {
		if starts_with_override(&body, over) {
			body = body[over.len()..].trim_start().to_string();
			break;
		}
	}
	for over in suffix_overrides {
		if ends_with_override(&body, over) {
			body.truncate(body.len() - over.len());
			body = body.trim_end().to_string();
			break;
		}
	}
	if body.is_empty() {
		return Ok(false);
	}
	let mut out = String::new();
	if let Some(prefix) = prefix {
		out.push_str(prefix);
		out.push(' ');
	}
	out.push_str(&body);
	if let Some(suffix) = suffix {
		out.push(' ');
		out.push_str(suffix);
	}
	ctx.append(&out);
	Ok(true)
}

/// Case-insensitive and whitespace-tolerant: a word override must end at a
/// word boundary so `AND` never eats into `ANDERSON`.
fn starts_with_override(body: &str, over: &str) -> bool {
	if body.len() < over.len() || !body[..over.len()].eq_ignore_ascii_case(over) {
		return false;
	}
	let boundary_needed = over.chars().last().is_some_and(|c| c.is_alphanumeric());
	!boundary_needed
		|| body[over.len()..].chars().next().is_none_or(|c| c.is_whitespace())
}

fn ends_with_override(body: &str, over: &str) -> bool {
	if body.len() < over.len() {
		return false;
	}
	let tail = &body[body.len() - over.len()..];
	if !tail.eq_ignore_ascii_case(over) {
		return false;
	}
	let boundary_needed = over.chars().next().is_some_and(|c| c.is_alphanumeric());
	!boundary_needed
		|| body[..body.len() - over.len()].chars().last().is_none_or(|c| c.is_whitespace())
}

#[allow(clippy::too_many_arguments)]
fn apply_foreach(
	ctx: &mut DynamicContext,
	collection: &Expr,
	item: &Option<String>,
	index: &Option<String>,
	open: &Option<String>,
	close: &Option<String>,
	separator: &Option<String>,
	contents: &SqlNode,
) -> Result<bool, BuildError> {
	let evaluated = collection.eval(ctx)?;
	let entries: Vec<(Value, Value)> = match &evaluated {
		Value::Array(items) => items
			.iter()
			.enumerate()
			.map(|(i, v)| (Value::Int(i as i64), v.clone()))
			.collect(),
		Value::Object(map) => map
			.iter()
			.map(|(k, v)| (Value::String(k.clone()), v.clone()))
			.collect(),
		Value::Null => {
			return Err(BuildError::message(
				"foreach collection expression evaluated to null",
			));
		}
		other => {
			return Err(BuildError::message(format!(
				"foreach collection must be an array or map, found {}",
				other.type_name()
			)));
		}
	};
	if entries.is_empty() {
		return Ok(true);
	}
	let mut parts = Vec::with_capacity(entries.len());
	for (key, value) in entries {
		let unique = ctx.next_unique();
		let item_alias = item.as_ref().map(|name| synthetic_name(name, unique));
		let index_alias = index.as_ref().map(|name| synthetic_name(name, unique));
		if let (Some(name), Some(alias)) = (item, &item_alias) {
			ctx.bind(name.clone(), value.clone());
			ctx.bind(alias.clone(), value);
		}
		if let (Some(name), Some(alias)) = (index, &index_alias) {
			ctx.bind(name.clone(), key.clone());
			ctx.bind(alias.clone(), key);
		}
		let rendered = ctx.capture(|ctx| contents.apply(ctx).map(|_| ()))?;
		let itemized = itemize(
			&rendered,
			item.as_deref().zip(item_alias.as_deref()),
			index.as_deref().zip(index_alias.as_deref()),
		)?;
		parts.push(itemized);
	}
	let mut out = String::new();
	if let Some(open) = open {
		out.push_str(open);
	}
	out.push_str(&parts.join(separator.as_deref().unwrap_or("")));
	if let Some(close) = close {
		out.push_str(close);
	}
	ctx.append(&out);
	Ok(true)
}

fn synthetic_name(name: &str, unique: u32) -> String {
	format!("__frch_{name}_{unique}")
}

/// Rewrites `#{item…}` placeholders inside one iteration's SQL so each
/// iteration binds through its own unique name.
fn itemize(
	sql: &str,
	item: Option<(&str, &str)>,
	index: Option<(&str, &str)>,
) -> Result<String, BuildError> {
	TokenParser::new("#{", "}").parse(sql, |content| {
		let head_len = content
			.find(|c: char| !c.is_alphanumeric() && c != '_')
			.unwrap_or(content.len());
		let (head, tail) = content.split_at(head_len);
		let replaced = [item, index]
			.into_iter()
			.flatten()
			.find(|(name, _)| *name == head)
			.map(|(_, alias)| format!("#{{{alias}{tail}}}"));
		Ok::<String, BuildError>(replaced.unwrap_or_else(|| format!("#{{{content}}}")))
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn object(entries: &[(&str, Value)]) -> Value {
		Value::Object(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
	}

	fn where_with_ifs() -> SqlNode {
		SqlNode::Mixed(vec![
			SqlNode::StaticText("SELECT * FROM t".into()),
			SqlNode::where_node(SqlNode::Mixed(vec![
				SqlNode::If {
					test: Expr::parse("a != null").unwrap(),
					contents: Box::new(SqlNode::StaticText("AND a = #{a}".into())),
				},
				SqlNode::If {
					test: Expr::parse("b != null").unwrap(),
					contents: Box::new(SqlNode::StaticText("AND b = #{b}".into())),
				},
			])),
		])
	}

	#[test]
	fn test_where_strips_leading_conjunction() {
		let param = object(&[("a", Value::Int(1)), ("b", Value::Null)]);
		let mut ctx = DynamicContext::new(&param, None);
		where_with_ifs().apply(&mut ctx).unwrap();
		assert_eq!(ctx.sql(), "SELECT * FROM t WHERE a = #{a}");
	}

	#[test]
	fn test_where_vanishes_when_all_tests_fail() {
		let param = object(&[("a", Value::Null), ("b", Value::Null)]);
		let mut ctx = DynamicContext::new(&param, None);
		where_with_ifs().apply(&mut ctx).unwrap();
		assert_eq!(ctx.sql(), "SELECT * FROM t");
	}

	#[test]
	fn test_where_is_idempotent_on_empty_children() {
		let param = object(&[]);
		let node = SqlNode::where_node(SqlNode::StaticText("   ".into()));
		let mut ctx = DynamicContext::new(&param, None);
		assert!(!node.apply(&mut ctx).unwrap());
		assert_eq!(ctx.sql(), "");
	}

	#[test]
	fn test_set_strips_trailing_comma() {
		let param = object(&[("name", Value::from("x"))]);
		let node = SqlNode::Mixed(vec![
			SqlNode::StaticText("UPDATE t".into()),
			SqlNode::set_node(SqlNode::StaticText("name = #{name},".into())),
		]);
		let mut ctx = DynamicContext::new(&param, None);
		node.apply(&mut ctx).unwrap();
		assert_eq!(ctx.sql(), "UPDATE t SET name = #{name}");
	}

	#[test]
	fn test_trim_does_not_eat_words_sharing_a_prefix() {
		let param = object(&[]);
		let node = SqlNode::where_node(SqlNode::StaticText("ANDERSON = 1".into()));
		let mut ctx = DynamicContext::new(&param, None);
		node.apply(&mut ctx).unwrap();
		assert_eq!(ctx.sql(), "WHERE ANDERSON = 1");
	}

	#[test]
	fn test_choose_picks_first_truthy_when() {
		let param = object(&[("kind", Value::from("b"))]);
		let node = SqlNode::Choose {
			whens: vec![
				(
					Expr::parse("kind == 'a'").unwrap(),
					SqlNode::StaticText("first".into()),
				),
				(
					Expr::parse("kind == 'b'").unwrap(),
					SqlNode::StaticText("second".into()),
				),
			],
			otherwise: Some(Box::new(SqlNode::StaticText("fallback".into()))),
		};
		let mut ctx = DynamicContext::new(&param, None);
		node.apply(&mut ctx).unwrap();
		assert_eq!(ctx.sql(), "second");
	}

	#[test]
	fn test_foreach_produces_unique_placeholders() {
		let param = object(&[("ids", Value::from(vec![10i64, 20, 30]))]);
		let node = SqlNode::Foreach {
			collection: Expr::parse("ids").unwrap(),
			item: Some("i".into()),
			index: None,
			open: Some("(".into()),
			close: Some(")".into()),
			separator: Some(",".into()),
			contents: Box::new(SqlNode::Text("#{i}".into())),
		};
		let mut ctx = DynamicContext::new(&param, None);
		node.apply(&mut ctx).unwrap();
		assert_eq!(ctx.sql(), "(#{__frch_i_0},#{__frch_i_1},#{__frch_i_2})");
		assert_eq!(ctx.bindings().get("__frch_i_1"), Some(&Value::Int(20)));
	}

	#[test]
	fn test_foreach_over_empty_collection_renders_nothing() {
		let param = object(&[("ids", Value::Array(vec![]))]);
		let node = SqlNode::Foreach {
			collection: Expr::parse("ids").unwrap(),
			item: Some("i".into()),
			index: None,
			open: Some("(".into()),
			close: Some(")".into()),
			separator: Some(",".into()),
			contents: Box::new(SqlNode::Text("#{i}".into())),
		};
		let mut ctx = DynamicContext::new(&param, None);
		node.apply(&mut ctx).unwrap();
		assert_eq!(ctx.sql(), "");
	}

	#[test]
	fn test_foreach_over_null_collection_is_an_error() {
		let param = object(&[]);
		let node = SqlNode::Foreach {
			collection: Expr::parse("ids").unwrap(),
			item: Some("i".into()),
			index: None,
			open: None,
			close: None,
			separator: None,
			contents: Box::new(SqlNode::Text("#{i}".into())),
		};
		let mut ctx = DynamicContext::new(&param, None);
		assert!(node.apply(&mut ctx).is_err());
	}

	#[test]
	fn test_bind_introduces_a_binding() {
		let param = object(&[("name", Value::from("dj"))]);
		let node = SqlNode::Mixed(vec![
			SqlNode::Bind {
				name: "pattern".into(),
				expression: Expr::parse("name + '%'").unwrap(),
			},
			SqlNode::Text("LIKE #{pattern}".into()),
		]);
		let mut ctx = DynamicContext::new(&param, None);
		node.apply(&mut ctx).unwrap();
		assert_eq!(ctx.bindings().get("pattern"), Some(&Value::from("dj%")));
	}

	#[test]
	fn test_text_substitution_reads_bindings() {
		let param = object(&[("table", Value::from("blog"))]);
		let node = SqlNode::Text("SELECT * FROM ${table}".into());
		let mut ctx = DynamicContext::new(&param, None);
		node.apply(&mut ctx).unwrap();
		assert_eq!(ctx.sql(), "SELECT * FROM blog");
	}

	#[test]
	fn test_database_id_binding_visible() {
		let param = object(&[]);
		let node = SqlNode::If {
			test: Expr::parse("_databaseId == 'mysql'").unwrap(),
			contents: Box::new(SqlNode::StaticText("LIMIT 1".into())),
		};
		let mut ctx = DynamicContext::new(&param, Some("mysql"));
		node.apply(&mut ctx).unwrap();
		assert_eq!(ctx.sql(), "LIMIT 1");
	}
}
