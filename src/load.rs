//! Loads HTML fragments into [`Document`]s.
//!
//! The markup comes from a trusted renderer, so this is a lenient tokenizer pass rather than a full HTML5 tree builder:
//! void elements need no end tag, end tags close up to the matching open element, stray end tags are dropped
//! and elements still open at the end of input are closed implicitly.
//!
//! Before tokenizing, markup that is valid HTML but not XML is rewritten: `script` and `style` content is escaped as
//! raw text, and ampersands or `<` that don't start a reference or tag are escaped as literal characters.

use crate::{
	dom::{Document, Element, NodeData, NodeId, VOID_ELEMENTS},
	error::LoadError,
};
use quick_xml::{
	escape::{resolve_html5_entity, unescape_with},
	events::{BytesStart, Event},
	Reader,
};
use regex::{Captures, Regex};
use std::{borrow::Cow, sync::LazyLock};
use tracing::{instrument, trace, warn};

/// Parses root-level sibling nodes into the root of a fresh [`Document`].
///
/// # Errors
///
/// Iff the tokenizer fails, for example on an unterminated tag or comment.
/// The error position refers to the markup after the rewrite described in the [module docs](self).
#[instrument(skip(markup), fields(len = markup.len()))]
pub fn parse_fragment(markup: &str) -> Result<Document, LoadError> {
	let mut document = Document::new();
	let root = document.root();

	let raw_text = escape_raw_text(markup);
	let markup = LOOSE_MARKUP.replace_all(&raw_text, loosen);
	let mut reader = Reader::from_str(&markup);
	let config = reader.config_mut();
	config.trim_text(false);
	config.check_end_names = false;
	config.allow_unmatched_ends = true;

	let mut open: Vec<NodeId> = Vec::new();
	loop {
		let parent = open.last().copied().unwrap_or(root);
		match reader.read_event() {
			Ok(Event::Start(start)) => {
				let element = load_element(&reader, &start);
				let is_void = VOID_ELEMENTS.contains(&element.name());
				let node = document.create_element(element);
				document.append_child(parent, node);
				if !is_void {
					open.push(node);
				}
			}
			Ok(Event::Empty(start)) => {
				let node = document.create_element(load_element(&reader, &start));
				document.append_child(parent, node);
			}
			Ok(Event::End(end)) => {
				let name = decode_name(end.name().as_ref());
				if VOID_ELEMENTS.contains(&name.as_str()) {
					continue;
				}
				match open.iter().rposition(|&node| document.element(node).is_some_and(|e| e.name() == name)) {
					Some(position) => open.truncate(position),
					None => trace!("Dropping unmatched end tag </{}>.", name),
				}
			}
			Ok(Event::Text(text)) => {
				let text = text.decode().map_err(|error| syntax_error(&reader, error))?;
				append_text(&mut document, parent, &text);
			}
			Ok(Event::CData(cdata)) => {
				let text = reader.decoder().decode(&cdata).map_err(|error| syntax_error(&reader, error))?;
				append_text(&mut document, parent, &text);
			}
			Ok(Event::GeneralRef(reference)) => {
				let name = reference.decode().map_err(|error| syntax_error(&reader, error))?;
				let raw = format!("&{};", name);
				match unescape_with(&raw, resolve_html5_entity) {
					Ok(resolved) => append_text(&mut document, parent, &resolved),
					Err(_) => {
						trace!("Keeping unknown character reference {:?} literally.", raw);
						append_text(&mut document, parent, &raw);
					}
				}
			}
			Ok(Event::Comment(comment)) => {
				let comment = comment.decode().map_err(|error| syntax_error(&reader, error))?;
				let node = document.create_comment(comment);
				document.append_child(parent, node);
			}
			Ok(Event::Eof) => break,
			Ok(_) => (),
			Err(error) => return Err(syntax_error(&reader, error)),
		}
	}

	if !open.is_empty() {
		trace!("Implicitly closed {} element(s) at end of input.", open.len());
	}
	Ok(document)
}

static RAW_TEXT_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<(script|style)(?:\s[^>]*)?>").expect("valid regex"));
static RAW_TEXT_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(script|style)\s*>").expect("valid regex"));

/// Comments and CDATA sections (kept as they are), then any `&` or `<` that may need escaping.
static LOOSE_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)<!--.*?-->|<!\[CDATA\[.*?\]\]>|&(?:#[0-9]+;|#[xX][0-9a-fA-F]+;|[A-Za-z][A-Za-z0-9]*;)?|<(?:[^A-Za-z/!?]|$)").expect("valid regex")
});

/// Escapes the content of `script` and `style` elements up to their end tag.
fn escape_raw_text(markup: &str) -> Cow<'_, str> {
	let mut escaped = String::new();
	let mut copied = 0;
	let mut search = 0;
	while let Some(start) = RAW_TEXT_START.captures_at(markup, search) {
		let (Some(tag), Some(name)) = (start.get(0), start.get(1)) else { break };
		search = tag.end();
		if tag.as_str().ends_with("/>") {
			continue;
		}

		let content_end = RAW_TEXT_END
			.captures_iter(&markup[tag.end()..])
			.find(|end| end.get(1).is_some_and(|end_name| end_name.as_str().eq_ignore_ascii_case(name.as_str())))
			.and_then(|end| end.get(0))
			.map_or(markup.len(), |end| tag.end() + end.start());

		escaped.push_str(&markup[copied..tag.end()]);
		for c in markup[tag.end()..content_end].chars() {
			match c {
				'&' => escaped.push_str("&amp;"),
				'<' => escaped.push_str("&lt;"),
				c => escaped.push(c),
			}
		}
		copied = content_end;
		search = content_end;
	}

	if copied == 0 {
		return Cow::Borrowed(markup);
	}
	trace!("Escaped raw text content.");
	escaped.push_str(&markup[copied..]);
	Cow::Owned(escaped)
}

/// Bare `&` and `<` become literal text, as in HTML.
fn loosen(captures: &Captures<'_>) -> String {
	let matched = &captures[0];
	if matched.starts_with("<!") || (matched.starts_with('&') && matched.len() > 1) {
		matched.to_owned()
	} else if matched == "&" {
		"&amp;".to_owned()
	} else {
		format!("&lt;{}", &matched[1..])
	}
}

fn syntax_error(reader: &Reader<&[u8]>, error: impl ToString) -> LoadError {
	LoadError::Syntax {
		position: u64::try_from(reader.error_position()).unwrap_or(u64::MAX),
		message: error.to_string(),
	}
}

fn decode_name(name: &[u8]) -> String {
	String::from_utf8_lossy(name).to_ascii_lowercase()
}

fn load_element(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Element {
	let mut element = Element::new(&decode_name(start.name().as_ref()));
	for attribute in start.html_attributes() {
		let attribute = match attribute {
			Ok(attribute) => attribute,
			Err(error) => {
				warn!("Skipping malformed attribute on <{}>: {}", element.name(), error);
				continue;
			}
		};
		let name = decode_name(attribute.key.as_ref());
		let raw = reader.decoder().decode(&attribute.value).unwrap_or_default();
		let value = unescape_with(&raw, resolve_html5_entity).unwrap_or(Cow::Borrowed(raw.as_ref()));
		element.set_attribute(&name, &value);
	}
	element
}

/// Adjacent text runs (split around character references) end up in one text node.
fn append_text(document: &mut Document, parent: NodeId, text: &str) {
	if text.is_empty() {
		return;
	}
	if let Some(&last) = document.children(parent).last() {
		if let Some(NodeData::Text(existing)) = document.data(last) {
			let joined = format!("{}{}", existing, text);
			document.set_character_data(last, &joined);
			return;
		}
	}
	let node = document.create_text(text);
	document.append_child(parent, node);
}
