//! A deliberately small HTML fragment parser for [`MemoryDocument`](`crate::memory::MemoryDocument`).
//!
//! Supported: elements, quoted/unquoted/boolean attributes, void elements, `/>`, text, and a handful of
//! entities. Comments, doctypes and processing instructions are skipped. Unmatched end tags are ignored,
//! and open elements are closed implicitly at the end of the input.
//!
//! Tag and attribute names are ASCII `[A-Za-z0-9:_-]` and are lowercased.

use memchr::memchr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
	Start { name: String, attributes: Vec<(String, String)>, self_closing: bool },
	End { name: String },
	Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedNode {
	Element { name: String, attributes: Vec<(String, String)>, children: Vec<ParsedNode> },
	Text(String),
}

fn is_name_byte(b: u8) -> bool {
	b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'-')
}

pub(crate) fn is_void_element(name: &str) -> bool {
	matches!(
		name,
		"area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "param" | "source" | "track" | "wbr"
	)
}

pub(crate) fn tokenize(input: &str) -> Vec<Token> {
	let bytes = input.as_bytes();
	let mut out = Vec::new();
	let mut i = 0;
	// Slices are only ever cut at ASCII bytes, so they stay on char boundaries.
	while i < bytes.len() {
		if bytes[i] != b'<' {
			let end = memchr(b'<', &bytes[i..]).map_or(bytes.len(), |rel| i + rel);
			push_text(&mut out, &input[i..end]);
			i = end;
			continue;
		}

		let rest = &input[i..];
		if rest.starts_with("<!--") {
			i = rest[4..].find("-->").map_or(bytes.len(), |rel| i + 4 + rel + 3);
			continue;
		}
		if rest.starts_with("<!") || rest.starts_with("<?") {
			i = memchr(b'>', &bytes[i..]).map_or(bytes.len(), |rel| i + rel + 1);
			continue;
		}
		if rest.starts_with("</") {
			let start = i + 2;
			let mut j = start;
			while j < bytes.len() && is_name_byte(bytes[j]) {
				j += 1;
			}
			if j > start {
				out.push(Token::End { name: input[start..j].to_ascii_lowercase() });
			}
			i = memchr(b'>', &bytes[j..]).map_or(bytes.len(), |rel| j + rel + 1);
			continue;
		}
		if bytes.get(i + 1).map_or(false, u8::is_ascii_alphabetic) {
			i = start_tag(input, i + 1, &mut out);
			continue;
		}

		// A lone `<` is text.
		push_text(&mut out, "<");
		i += 1;
	}
	out
}

fn push_text(out: &mut Vec<Token>, raw: &str) {
	if raw.is_empty() {
		return;
	}
	let decoded = decode_entities(raw);
	if let Some(Token::Text(previous)) = out.last_mut() {
		previous.push_str(&decoded);
	} else {
		out.push(Token::Text(decoded));
	}
}

/// Parses a start tag whose name begins at `i`. Returns the index after the closing `>`.
fn start_tag(input: &str, mut i: usize, out: &mut Vec<Token>) -> usize {
	let bytes = input.as_bytes();
	let name_start = i;
	while i < bytes.len() && is_name_byte(bytes[i]) {
		i += 1;
	}
	let name = input[name_start..i].to_ascii_lowercase();
	let mut attributes = Vec::new();
	let mut self_closing = false;

	loop {
		while i < bytes.len() && bytes[i].is_ascii_whitespace() {
			i += 1;
		}
		match bytes.get(i) {
			None => break,
			Some(b'>') => {
				i += 1;
				break;
			}
			Some(b'/') => {
				i += 1;
				if bytes.get(i) == Some(&b'>') {
					self_closing = true;
					i += 1;
					break;
				}
				continue;
			}
			Some(_) => {}
		}

		let attribute_start = i;
		while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'>' | b'/') {
			i += 1;
		}
		if i == attribute_start {
			// Stray `=`.
			i += 1;
			continue;
		}
		let attribute_name = input[attribute_start..i].to_ascii_lowercase();

		let mut j = i;
		while j < bytes.len() && bytes[j].is_ascii_whitespace() {
			j += 1;
		}
		if bytes.get(j) != Some(&b'=') {
			attributes.push((attribute_name, String::new()));
			continue;
		}
		j += 1;
		while j < bytes.len() && bytes[j].is_ascii_whitespace() {
			j += 1;
		}

		let value = match bytes.get(j) {
			Some(&quote @ (b'"' | b'\'')) => {
				let value_start = j + 1;
				let value_end = memchr(quote, &bytes[value_start..]).map_or(bytes.len(), |rel| value_start + rel);
				i = (value_end + 1).min(bytes.len());
				&input[value_start..value_end]
			}
			_ => {
				let value_start = j;
				while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
					j += 1;
				}
				i = j;
				&input[value_start..j]
			}
		};
		attributes.push((attribute_name, decode_entities(value)));
	}

	out.push(Token::Start { name, attributes, self_closing });
	i
}

/// Decodes `&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`, `&nbsp;` and well-formed numeric references.
/// Anything else is left unchanged.
pub(crate) fn decode_entities(s: &str) -> String {
	let Some(first) = memchr(b'&', s.as_bytes()) else {
		return s.to_owned();
	};

	let mut out = String::with_capacity(s.len());
	out.push_str(&s[..first]);
	let mut rest = &s[first..];
	while let Some(amp) = rest.find('&') {
		out.push_str(&rest[..amp]);
		rest = &rest[amp..];
		let decoded = rest.find(';').filter(|&semicolon| semicolon <= 10).and_then(|semicolon| {
			let c = match &rest[1..semicolon] {
				"amp" => '&',
				"lt" => '<',
				"gt" => '>',
				"quot" => '"',
				"apos" => '\'',
				"nbsp" => '\u{a0}',
				numeric => {
					let code = if let Some(hex) = numeric.strip_prefix("#x").or_else(|| numeric.strip_prefix("#X")) {
						u32::from_str_radix(hex, 16).ok()?
					} else {
						numeric.strip_prefix('#')?.parse().ok()?
					};
					char::from_u32(code)?
				}
			};
			Some((c, semicolon + 1))
		});
		match decoded {
			Some((c, consumed)) => {
				out.push(c);
				rest = &rest[consumed..];
			}
			None => {
				out.push('&');
				rest = &rest[1..];
			}
		}
	}
	out.push_str(rest);
	out
}

/// Builds a node forest from `input`.
pub(crate) fn parse_fragment(input: &str) -> Vec<ParsedNode> {
	// Each frame: (name, attributes, children). Frame 0 is the fragment root.
	let mut stack: Vec<(String, Vec<(String, String)>, Vec<ParsedNode>)> = vec![(String::new(), Vec::new(), Vec::new())];

	fn close(stack: &mut Vec<(String, Vec<(String, String)>, Vec<ParsedNode>)>) {
		if let Some((name, attributes, children)) = stack.pop() {
			if let Some((_, _, parent_children)) = stack.last_mut() {
				parent_children.push(ParsedNode::Element { name, attributes, children });
			}
		}
	}

	for token in tokenize(input) {
		match token {
			Token::Text(text) => {
				if let Some((_, _, children)) = stack.last_mut() {
					children.push(ParsedNode::Text(text));
				}
			}
			Token::Start { name, attributes, self_closing } => {
				if self_closing || is_void_element(&name) {
					if let Some((_, _, children)) = stack.last_mut() {
						children.push(ParsedNode::Element {
							name,
							attributes,
							children: Vec::new(),
						});
					}
				} else {
					stack.push((name, attributes, Vec::new()));
				}
			}
			Token::End { name } => {
				if let Some(depth) = stack.iter().skip(1).rposition(|(open, _, _)| *open == name) {
					// `skip(1)` shifts positions by one.
					while stack.len() > depth + 1 {
						close(&mut stack);
					}
				}
			}
		}
	}
	while stack.len() > 1 {
		close(&mut stack);
	}
	stack.pop().map(|(_, _, children)| children).unwrap_or_default()
}
