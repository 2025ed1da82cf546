//! Generic open/close token scanner.
//!
//! Reused for `${…}` substitution and `#{…}` parameter parsing. The scanner
//! does not interpret the enclosed expression; it hands it to the supplied
//! handler and splices the handler's output into the result.

/// Scans a text for balanced open/close tokens with backslash escaping.
pub struct TokenParser<'a> {
	open: &'a str,
	close: &'a str,
}

impl<'a> TokenParser<'a> {
	pub fn new(open: &'a str, close: &'a str) -> Self {
		Self { open, close }
	}

	/// Replaces each enclosed expression with the handler's output.
	///
	/// A backslash before the open token keeps it literal (`\${` stays
	/// `${`), and likewise before the close token inside an expression. An
	/// open token without a matching close token is copied through verbatim.
	pub fn parse<E>(
		&self,
		text: &str,
		mut handler: impl FnMut(&str) -> Result<String, E>,
	) -> Result<String, E> {
		if text.is_empty() {
			return Ok(String::new());
		}
		let Some(mut start) = text.find(self.open) else {
			return Ok(text.to_string());
		};
		let bytes = text.as_bytes();
		let mut offset = 0usize;
		let mut out = String::with_capacity(text.len());
		let mut expression = String::new();
		loop {
			if start > 0 && bytes[start - 1] == b'\\' {
				// escaped open token: drop the backslash, keep the token
				out.push_str(&text[offset..start - 1]);
				out.push_str(self.open);
				offset = start + self.open.len();
			} else {
				expression.clear();
				out.push_str(&text[offset..start]);
				offset = start + self.open.len();
				let mut end = text[offset..].find(self.close).map(|i| i + offset);
				while let Some(e) = end {
					if e > offset && bytes[e - 1] == b'\\' {
						expression.push_str(&text[offset..e - 1]);
						expression.push_str(self.close);
						offset = e + self.close.len();
						end = text[offset..].find(self.close).map(|i| i + offset);
					} else {
						expression.push_str(&text[offset..e]);
						break;
					}
				}
				match end {
					None => {
						// close token was not found
						out.push_str(&text[start..]);
						offset = text.len();
					}
					Some(e) => {
						out.push_str(&handler(&expression)?);
						offset = e + self.close.len();
					}
				}
			}
			match text[offset..].find(self.open) {
				Some(i) => start = i + offset,
				None => break,
			}
		}
		if offset < text.len() {
			out.push_str(&text[offset..]);
		}
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::convert::Infallible;

	fn sub(text: &str) -> String {
		TokenParser::new("${", "}")
			.parse(text, |expr| Ok::<String, Infallible>(format!("<{expr}>")))
			.unwrap()
	}

	#[test]
	fn test_plain_text_passes_through() {
		assert_eq!(sub("SELECT 1"), "SELECT 1");
		assert_eq!(sub(""), "");
	}

	#[test]
	fn test_single_and_multiple_tokens() {
		assert_eq!(sub("a ${x} b"), "a <x> b");
		assert_eq!(sub("${x}${y}"), "<x><y>");
	}

	#[test]
	fn test_escaped_open_token_stays_literal() {
		assert_eq!(sub(r"cost \${x}"), "cost ${x}");
	}

	#[test]
	fn test_escaped_close_inside_expression() {
		assert_eq!(sub(r"${a\}b}"), "<a}b>");
	}

	#[test]
	fn test_unclosed_token_copied_verbatim() {
		assert_eq!(sub("a ${x"), "a ${x");
	}
}
