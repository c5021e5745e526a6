//! Markup round-tripping for the arena tree.
//!
//! A small hand-written fragment parser (enough for well-formed editing
//! content: elements with attributes, text, comments, void elements) and a
//! serializer that escapes through `html-escape`. The parser is lenient the
//! way innerHTML assignment is lenient: an unmatched close tag is dropped,
//! and unclosed elements are closed at end of input.

use std::borrow::Cow;

use crate::dom::{Document, NodeId, NodeKind};
use crate::error::DomResult;

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Parse `markup` into a new detached fragment node.
pub fn parse_fragment(doc: &mut Document, markup: &str) -> DomResult<NodeId> {
    let fragment = doc.create_fragment();
    let mut parser = Parser {
        input: markup,
        pos: 0,
    };
    let mut stack = vec![fragment];
    while let Some(event) = parser.next_event() {
        let top = *stack.last().unwrap_or(&fragment);
        match event {
            Event::Text(text) => {
                let decoded = decode(&text);
                let node = doc.create_text(&decoded);
                doc.append_child(top, node)?;
            }
            Event::Comment(text) => {
                let node = doc.create_comment(&text);
                doc.append_child(top, node)?;
            }
            Event::Open { tag, attrs, self_closing } => {
                let node = doc.create_element(&tag);
                for (name, value) in attrs {
                    doc.set_attribute(node, &name, &decode(&value));
                }
                doc.append_child(top, node)?;
                if !self_closing && !is_void_tag(&tag) {
                    stack.push(node);
                }
            }
            Event::Close(tag) => {
                // Pop to the matching open element; ignore strays.
                if let Some(depth) = stack
                    .iter()
                    .rposition(|&n| doc.tag_name(n) == Some(tag.as_str()))
                {
                    if depth > 0 {
                        stack.truncate(depth);
                    }
                }
            }
        }
    }
    Ok(fragment)
}

fn decode(text: &str) -> String {
    match html_escape::decode_html_entities(text) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}

enum Event {
    Text(String),
    Comment(String),
    Open {
        tag: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.bump();
        }
        self.input[start..self.pos].to_string()
    }

    fn skip_whitespace(&mut self) {
        self.take_while(|c| c.is_whitespace());
    }

    fn next_event(&mut self) -> Option<Event> {
        if self.pos >= self.input.len() {
            return None;
        }
        if self.eat("<!--") {
            let end = self.rest().find("-->").unwrap_or(self.rest().len());
            let text = self.rest()[..end].to_string();
            self.pos += end;
            self.eat("-->");
            return Some(Event::Comment(text));
        }
        if self.rest().starts_with("</") {
            self.pos += 2;
            let tag = self
                .take_while(|c| c.is_ascii_alphanumeric())
                .to_ascii_lowercase();
            self.take_while(|c| c != '>');
            self.eat(">");
            return Some(Event::Close(tag));
        }
        if self.peek() == Some('<')
            && self
                .rest()
                .chars()
                .nth(1)
                .is_some_and(|c| c.is_ascii_alphabetic())
        {
            self.bump();
            let tag = self
                .take_while(|c| c.is_ascii_alphanumeric())
                .to_ascii_lowercase();
            let mut attrs = Vec::new();
            let mut self_closing = false;
            loop {
                self.skip_whitespace();
                match self.peek() {
                    None | Some('>') => {
                        self.eat(">");
                        break;
                    }
                    Some('/') => {
                        self.bump();
                        if self.eat(">") {
                            self_closing = true;
                            break;
                        }
                    }
                    _ => {
                        let name = self
                            .take_while(|c| {
                                c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'
                            })
                            .to_ascii_lowercase();
                        if name.is_empty() {
                            self.bump();
                            continue;
                        }
                        self.skip_whitespace();
                        let value = if self.eat("=") {
                            self.skip_whitespace();
                            match self.peek() {
                                Some(quote @ ('"' | '\'')) => {
                                    self.bump();
                                    let v = self.take_while(|c| c != quote);
                                    self.bump();
                                    v
                                }
                                _ => self.take_while(|c| !c.is_whitespace() && c != '>' && c != '/'),
                            }
                        } else {
                            String::new()
                        };
                        attrs.push((name, value));
                    }
                }
            }
            return Some(Event::Open {
                tag,
                attrs,
                self_closing,
            });
        }
        // Text run up to the next markup delimiter.
        let start = self.pos;
        self.bump();
        while let Some(c) = self.peek() {
            if c == '<' {
                break;
            }
            self.bump();
        }
        Some(Event::Text(self.input[start..self.pos].to_string()))
    }
}

/// Serialize a node's children (innerHTML).
pub fn serialize_inner(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    for &child in doc.children(node) {
        write_node(doc, child, &mut out);
    }
    out
}

/// Serialize a node including its own markup (outerHTML).
pub fn serialize_node(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, node, &mut out);
    out
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.kind(node) {
        NodeKind::Text | NodeKind::CData => {
            if let Some(data) = doc.data(node) {
                out.push_str(&html_escape::encode_text(data));
            }
        }
        NodeKind::Comment => {
            out.push_str("<!--");
            out.push_str(doc.data(node).unwrap_or_default());
            out.push_str("-->");
        }
        NodeKind::Element => {
            let tag = doc.tag_name(node).unwrap_or_default();
            out.push('<');
            out.push_str(tag);
            for (name, value) in doc.attributes(node) {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&html_escape::encode_double_quoted_attribute(value));
                out.push('"');
            }
            out.push('>');
            if !is_void_tag(tag) {
                for &child in doc.children(node) {
                    write_node(doc, child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        NodeKind::DocumentType => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doc.data(node).unwrap_or_default());
            out.push('>');
        }
        NodeKind::Document | NodeKind::Fragment => {
            for &child in doc.children(node) {
                write_node(doc, child, out);
            }
        }
    }
}
