//! The expression language used by dynamic SQL `test`, `bind`, and
//! `foreach` attributes.
//!
//! A small object-navigation language: property paths with `.` and
//! `[index]`/`[key]` steps, literals, arithmetic and comparison with numeric
//! promotion, `&&`/`||`/`!` (also spelled `and`/`or`/`not`), and the
//! pseudo-calls `.size()`, `.length()`, `.isEmpty()` on paths. Expressions
//! are parsed once at build time; syntax errors surface as build errors.
//! Navigation is null-safe: an unresolved step evaluates to null, which
//! renders tests false.

use crate::meta::MetaValue;
use crate::property::{self, PropertySegment};
use crate::value::Value;

/// Variable resolution seam: the dynamic context implements this over its
/// bindings map and the current parameter object.
pub trait Scope {
	fn resolve(&self, name: &str) -> Option<Value>;
}

impl Scope for Value {
	fn resolve(&self, name: &str) -> Option<Value> {
		MetaValue::new(self).get(name).cloned()
	}
}

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
	#[error("expression syntax error at offset {offset}: {message} in {source_text:?}")]
	Syntax { offset: usize, message: String, source_text: String },
	#[error("cannot compare {left} with {right}")]
	Incomparable { left: &'static str, right: &'static str },
	#[error("arithmetic on non-numeric operand {0}")]
	NonNumeric(&'static str),
	#[error("division by zero")]
	DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	And,
	Or,
	Add,
	Sub,
	Mul,
	Div,
	Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCall {
	Size,
	Length,
	IsEmpty,
}

/// A parsed expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
	Literal(Value),
	Path { segments: Vec<PropertySegment>, call: Option<PathCall> },
	Not(Box<Expr>),
	Neg(Box<Expr>),
	Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
}

impl Expr {
	/// Parses the expression text. Called at configuration build time.
	pub fn parse(text: &str) -> Result<Expr, EvalError> {
		let tokens = lex(text)?;
		let mut parser = Parser { text, tokens, pos: 0 };
		let expr = parser.expression(0)?;
		if parser.pos != parser.tokens.len() {
			return Err(parser.error("unexpected trailing input"));
		}
		Ok(expr)
	}

	/// Evaluates against the given scope, returning an owned value.
	pub fn eval(&self, scope: &dyn Scope) -> Result<Value, EvalError> {
		match self {
			Expr::Literal(v) => Ok(v.clone()),
			Expr::Path { segments, call } => Ok(eval_path(segments, *call, scope)),
			Expr::Not(inner) => Ok(Value::Bool(!inner.eval(scope)?.is_truthy())),
			Expr::Neg(inner) => match inner.eval(scope)? {
				Value::Int(i) => Ok(Value::Int(-i)),
				Value::Double(d) => Ok(Value::Double(-d)),
				other => Err(EvalError::NonNumeric(other.type_name())),
			},
			Expr::Binary { op, left, right } => eval_binary(*op, left, right, scope),
		}
	}

	/// Convenience truthiness evaluation for `test` attributes.
	pub fn test(&self, scope: &dyn Scope) -> Result<bool, EvalError> {
		Ok(self.eval(scope)?.is_truthy())
	}
}

fn eval_path(segments: &[PropertySegment], call: Option<PathCall>, scope: &dyn Scope) -> Value {
	let Some((root, rest)) = segments.split_first() else {
		return Value::Null;
	};
	let mut current = match scope.resolve(&root.name) {
		Some(v) => v,
		None => return call_result(call, &Value::Null),
	};
	if let Some(index) = &root.index {
		match MetaValue::new(&current).index(index) {
			Some(v) => current = v.clone(),
			None => return call_result(call, &Value::Null),
		}
	}
	for seg in rest {
		match MetaValue::new(&current).segment(seg) {
			Some(v) => current = v.clone(),
			None => return call_result(call, &Value::Null),
		}
	}
	call_result(call, &current)
}

fn call_result(call: Option<PathCall>, value: &Value) -> Value {
	match call {
		None => value.clone(),
		Some(PathCall::Size) | Some(PathCall::Length) => {
			Value::Int(value.len().unwrap_or(0) as i64)
		}
		Some(PathCall::IsEmpty) => Value::Bool(value.len().unwrap_or(0) == 0),
	}
}

fn eval_binary(op: BinOp, left: &Expr, right: &Expr, scope: &dyn Scope) -> Result<Value, EvalError> {
	match op {
		BinOp::And => {
			let l = left.eval(scope)?;
			if !l.is_truthy() {
				return Ok(Value::Bool(false));
			}
			Ok(Value::Bool(right.eval(scope)?.is_truthy()))
		}
		BinOp::Or => {
			let l = left.eval(scope)?;
			if l.is_truthy() {
				return Ok(Value::Bool(true));
			}
			Ok(Value::Bool(right.eval(scope)?.is_truthy()))
		}
		BinOp::Eq => Ok(Value::Bool(loose_eq(&left.eval(scope)?, &right.eval(scope)?))),
		BinOp::Ne => Ok(Value::Bool(!loose_eq(&left.eval(scope)?, &right.eval(scope)?))),
		BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
			let l = left.eval(scope)?;
			let r = right.eval(scope)?;
			let ordering = compare(&l, &r)?;
			Ok(Value::Bool(match op {
				BinOp::Lt => ordering.is_lt(),
				BinOp::Le => ordering.is_le(),
				BinOp::Gt => ordering.is_gt(),
				_ => ordering.is_ge(),
			}))
		}
		BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
			arithmetic(op, &left.eval(scope)?, &right.eval(scope)?)
		}
	}
}

/// Equality with numeric promotion; mismatched kinds are unequal, never an
/// error, so tests stay total.
fn loose_eq(left: &Value, right: &Value) -> bool {
	match (left.as_f64(), right.as_f64()) {
		(Some(l), Some(r)) => l == r,
		_ => left == right,
	}
}

fn compare(left: &Value, right: &Value) -> Result<std::cmp::Ordering, EvalError> {
	if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
		return l.partial_cmp(&r).ok_or(EvalError::Incomparable {
			left: left.type_name(),
			right: right.type_name(),
		});
	}
	match (left, right) {
		(Value::String(l), Value::String(r)) => Ok(l.cmp(r)),
		_ => Err(EvalError::Incomparable { left: left.type_name(), right: right.type_name() }),
	}
}

fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
	if op == BinOp::Add {
		if let (Value::String(l), r) = (left, right) {
			return Ok(Value::String(format!("{l}{r}")));
		}
	}
	match (left, right) {
		(Value::Int(l), Value::Int(r)) => match op {
			BinOp::Add => Ok(Value::Int(l + r)),
			BinOp::Sub => Ok(Value::Int(l - r)),
			BinOp::Mul => Ok(Value::Int(l * r)),
			BinOp::Div if *r == 0 => Err(EvalError::DivisionByZero),
			BinOp::Div => Ok(Value::Int(l / r)),
			BinOp::Rem if *r == 0 => Err(EvalError::DivisionByZero),
			_ => Ok(Value::Int(l % r)),
		},
		_ => {
			let l = left.as_f64().ok_or(EvalError::NonNumeric(left.type_name()))?;
			let r = right.as_f64().ok_or(EvalError::NonNumeric(right.type_name()))?;
			match op {
				BinOp::Add => Ok(Value::Double(l + r)),
				BinOp::Sub => Ok(Value::Double(l - r)),
				BinOp::Mul => Ok(Value::Double(l * r)),
				BinOp::Div => Ok(Value::Double(l / r)),
				_ => Ok(Value::Double(l % r)),
			}
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
	Ident(String),
	Number(String),
	Str(String),
	Op(&'static str),
	LParen,
	RParen,
}

fn lex(text: &str) -> Result<Vec<(usize, Token)>, EvalError> {
	let bytes = text.as_bytes();
	let mut tokens = Vec::new();
	let mut i = 0usize;
	while i < bytes.len() {
		let c = bytes[i] as char;
		match c {
			' ' | '\t' | '\r' | '\n' => i += 1,
			'(' => {
				tokens.push((i, Token::LParen));
				i += 1;
			}
			')' => {
				tokens.push((i, Token::RParen));
				i += 1;
			}
			'\'' | '"' => {
				let quote = c;
				let start = i + 1;
				let mut j = start;
				while j < bytes.len() && bytes[j] as char != quote {
					j += 1;
				}
				if j == bytes.len() {
					return Err(EvalError::Syntax {
						offset: i,
						message: "unterminated string literal".into(),
						source_text: text.into(),
					});
				}
				tokens.push((i, Token::Str(text[start..j].to_string())));
				i = j + 1;
			}
			'0'..='9' => {
				let start = i;
				while i < bytes.len() && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'.') {
					// a digit followed by an identifier char ends the number (e.g. `1and`)
					if bytes[i] == b'.'
						&& i + 1 < bytes.len() && !(bytes[i + 1] as char).is_ascii_digit()
					{
						break;
					}
					i += 1;
				}
				tokens.push((start, Token::Number(text[start..i].to_string())));
			}
			'=' | '!' | '<' | '>' | '&' | '|' | '+' | '-' | '*' | '/' | '%' => {
				let two = &text[i..(i + 2).min(text.len())];
				let op = match two {
					"==" | "!=" | "<=" | ">=" | "&&" | "||" => {
						i += 2;
						match two {
							"==" => "==",
							"!=" => "!=",
							"<=" => "<=",
							">=" => ">=",
							"&&" => "&&",
							_ => "||",
						}
					}
					_ => {
						i += 1;
						match c {
							'=' => {
								return Err(EvalError::Syntax {
									offset: i - 1,
									message: "single '=' is not an operator, use '=='".into(),
									source_text: text.into(),
								});
							}
							'!' => "!",
							'<' => "<",
							'>' => ">",
							'+' => "+",
							'-' => "-",
							'*' => "*",
							'/' => "/",
							'%' => "%",
							_ => {
								return Err(EvalError::Syntax {
									offset: i - 1,
									message: format!("dangling '{c}'"),
									source_text: text.into(),
								});
							}
						}
					}
				};
				tokens.push((i, Token::Op(op)));
			}
			_ if c.is_alphabetic() || c == '_' => {
				let start = i;
				while i < bytes.len() {
					let ch = bytes[i] as char;
					if ch.is_alphanumeric() || ch == '_' || ch == '.' || ch == '[' || ch == ']' {
						if ch == '[' {
							// consume through the matching bracket, allowing quoted keys
							while i < bytes.len() && bytes[i] != b']' {
								i += 1;
							}
						}
						i += 1;
					} else {
						break;
					}
				}
				// a trailing `(` marks a pseudo-call, keep it with the path
				if i + 1 < bytes.len() && bytes[i] as char == '(' && bytes[i + 1] as char == ')' {
					i += 2;
					tokens.push((start, Token::Ident(text[start..i].to_string())));
				} else {
					tokens.push((start, Token::Ident(text[start..i].to_string())));
				}
			}
			_ => {
				return Err(EvalError::Syntax {
					offset: i,
					message: format!("unexpected character '{c}'"),
					source_text: text.into(),
				});
			}
		}
	}
	Ok(tokens)
}

struct Parser<'a> {
	text: &'a str,
	tokens: Vec<(usize, Token)>,
	pos: usize,
}

impl Parser<'_> {
	fn error(&self, message: &str) -> EvalError {
		let offset = self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(self.text.len());
		EvalError::Syntax { offset, message: message.into(), source_text: self.text.into() }
	}

	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.pos).map(|(_, t)| t)
	}

	fn binding_power(token: &Token) -> Option<(BinOp, u8)> {
		let op = match token {
			Token::Op("||") => (BinOp::Or, 1),
			Token::Ident(s) if s == "or" => (BinOp::Or, 1),
			Token::Op("&&") => (BinOp::And, 2),
			Token::Ident(s) if s == "and" => (BinOp::And, 2),
			Token::Op("==") => (BinOp::Eq, 3),
			Token::Op("!=") => (BinOp::Ne, 3),
			Token::Op("<") => (BinOp::Lt, 4),
			Token::Op("<=") => (BinOp::Le, 4),
			Token::Op(">") => (BinOp::Gt, 4),
			Token::Op(">=") => (BinOp::Ge, 4),
			Token::Op("+") => (BinOp::Add, 5),
			Token::Op("-") => (BinOp::Sub, 5),
			Token::Op("*") => (BinOp::Mul, 6),
			Token::Op("/") => (BinOp::Div, 6),
			Token::Op("%") => (BinOp::Rem, 6),
			_ => return None,
		};
		Some(op)
	}

	fn expression(&mut self, min_power: u8) -> Result<Expr, EvalError> {
		let mut left = self.unary()?;
		while let Some(token) = self.peek() {
			let Some((op, power)) = Self::binding_power(token) else {
				break;
			};
			if power < min_power {
				break;
			}
			self.pos += 1;
			let right = self.expression(power + 1)?;
			left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
		}
		Ok(left)
	}

	fn unary(&mut self) -> Result<Expr, EvalError> {
		match self.peek() {
			Some(Token::Op("!")) => {
				self.pos += 1;
				Ok(Expr::Not(Box::new(self.unary()?)))
			}
			Some(Token::Ident(s)) if s == "not" => {
				self.pos += 1;
				Ok(Expr::Not(Box::new(self.unary()?)))
			}
			Some(Token::Op("-")) => {
				self.pos += 1;
				Ok(Expr::Neg(Box::new(self.unary()?)))
			}
			_ => self.primary(),
		}
	}

	fn primary(&mut self) -> Result<Expr, EvalError> {
		let token = self.peek().cloned().ok_or_else(|| self.error("expected expression"))?;
		match token {
			Token::LParen => {
				self.pos += 1;
				let inner = self.expression(0)?;
				match self.peek() {
					Some(Token::RParen) => {
						self.pos += 1;
						Ok(inner)
					}
					_ => Err(self.error("expected ')'")),
				}
			}
			Token::Number(raw) => {
				self.pos += 1;
				if raw.contains('.') {
					raw.parse::<f64>()
						.map(|d| Expr::Literal(Value::Double(d)))
						.map_err(|_| self.error("malformed number"))
				} else {
					raw.parse::<i64>()
						.map(|i| Expr::Literal(Value::Int(i)))
						.map_err(|_| self.error("malformed number"))
				}
			}
			Token::Str(s) => {
				self.pos += 1;
				Ok(Expr::Literal(Value::String(s)))
			}
			Token::Ident(raw) => {
				self.pos += 1;
				Ok(match raw.as_str() {
					"null" => Expr::Literal(Value::Null),
					"true" => Expr::Literal(Value::Bool(true)),
					"false" => Expr::Literal(Value::Bool(false)),
					_ => parse_path_expr(&raw),
				})
			}
			Token::RParen | Token::Op(_) => Err(self.error("expected expression")),
		}
	}
}

fn parse_path_expr(raw: &str) -> Expr {
	let (path, call) = if let Some(stripped) = raw.strip_suffix("()") {
		match stripped.rsplit_once('.') {
			Some((head, "size")) => (head, Some(PathCall::Size)),
			Some((head, "length")) => (head, Some(PathCall::Length)),
			Some((head, "isEmpty")) => (head, Some(PathCall::IsEmpty)),
			_ => (raw, None),
		}
	} else {
		(raw, None)
	};
	Expr::Path { segments: property::parse_path(path), call }
}

#[cfg(test)]
mod tests {
	use super::*;
	use indexmap::IndexMap;
	use rstest::rstest;

	fn scope(entries: &[(&str, Value)]) -> Value {
		let map: IndexMap<String, Value> =
			entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
		Value::Object(map)
	}

	fn eval(text: &str, scope_value: &Value) -> Value {
		Expr::parse(text).unwrap().eval(scope_value).unwrap()
	}

	#[rstest]
	#[case("a != null", true)]
	#[case("b != null", false)]
	#[case("a == 1", true)]
	#[case("a == '1'", false)]
	#[case("a > 0 and a < 10", true)]
	#[case("a > 5 or name == 'django'", true)]
	#[case("!(a == 1)", false)]
	#[case("name != null and name != ''", true)]
	fn test_truth_cases(#[case] text: &str, #[case] expected: bool) {
		let scope_value = scope(&[
			("a", Value::Int(1)),
			("b", Value::Null),
			("name", Value::from("django")),
		]);
		assert_eq!(eval(text, &scope_value), Value::Bool(expected));
	}

	#[test]
	fn test_numeric_promotion() {
		let s = scope(&[("x", Value::Int(2)), ("y", Value::Double(2.0))]);
		assert_eq!(eval("x == y", &s), Value::Bool(true));
		assert_eq!(eval("x + 1", &s), Value::Int(3));
		assert_eq!(eval("y / 4", &s), Value::Double(0.5));
	}

	#[test]
	fn test_path_navigation_is_null_safe() {
		let s = scope(&[("user", scope(&[("name", Value::from("kent"))]))]);
		assert_eq!(eval("user.name", &s), Value::from("kent"));
		assert_eq!(eval("user.missing.deeper", &s), Value::Null);
		assert_eq!(eval("ghost.name != null", &s), Value::Bool(false));
	}

	#[test]
	fn test_size_pseudo_call() {
		let s = scope(&[("ids", Value::from(vec![10i64, 20, 30]))]);
		assert_eq!(eval("ids.size()", &s), Value::Int(3));
		assert_eq!(eval("ids != null and ids.size() > 0", &s), Value::Bool(true));
		assert_eq!(eval("ids.isEmpty()", &s), Value::Bool(false));
		assert_eq!(eval("missing.size()", &s), Value::Int(0));
	}

	#[test]
	fn test_indexed_access() {
		let s = scope(&[("ids", Value::from(vec![10i64, 20, 30]))]);
		assert_eq!(eval("ids[1]", &s), Value::Int(20));
	}

	#[test]
	fn test_syntax_errors_reported() {
		assert!(Expr::parse("a = 1").is_err());
		assert!(Expr::parse("a ==").is_err());
		assert!(Expr::parse("(a == 1").is_err());
		assert!(Expr::parse("'open").is_err());
	}

	#[test]
	fn test_string_concat() {
		let s = scope(&[("name", Value::from("dj"))]);
		assert_eq!(eval("name + '%'", &s), Value::from("dj%"));
	}
}
