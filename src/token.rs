//! Token model: immutable labeled spans over the input.
//!
//! Three kinds of token flow through the engine: character tokens (one input
//! code point), sentinel tokens marking the buffer boundaries, and composite
//! tokens built by the rewrite loop. A token never changes after
//! construction; rewriting replaces tokens instead of mutating them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name carried by every character token.
pub const CHAR: &str = "CHAR";
/// Name of the start-of-input sentinel.
pub const SOF: &str = "SOF";
/// Name of the end-of-input sentinel.
pub const EOF: &str = "EOF";

/// A half-open span over the input, measured in code points.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub length: usize,
}

impl Span {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// A property value stored on a token.
///
/// Property bags are constrained to this closed set: a captured token
/// sequence, the explicit marker for a capture that ran but did not match, a
/// string, or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
    Tokens(Vec<Token>),
    Unmatched,
    Str(String),
    Num(f64),
}

impl PropValue {
    /// The captured token sequence, if this value holds one.
    pub fn tokens(&self) -> Option<&[Token]> {
        match self {
            PropValue::Tokens(tokens) => Some(tokens),
            _ => None,
        }
    }

    /// Concatenated raw value of the captured token sequence; empty for
    /// every other kind of value.
    pub fn raw_value(&self) -> String {
        match self {
            PropValue::Tokens(tokens) => tokens.iter().map(Token::raw_value).collect(),
            _ => String::new(),
        }
    }
}

/// Optional parts of a composite token, passed to [`Token::new`].
#[derive(Debug, Clone, Default)]
pub struct TokenArgs {
    pub tags: Vec<String>,
    pub props: BTreeMap<String, PropValue>,
    pub children: Vec<Token>,
}

impl TokenArgs {
    pub fn with_children(children: Vec<Token>) -> Self {
        Self {
            children,
            ..Self::default()
        }
    }
}

/// An immutable labeled span over the input with tags, key/value properties,
/// and optional ordered children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    name: String,
    span: Span,
    tags: Vec<String>,
    props: BTreeMap<String, PropValue>,
    children: Vec<Token>,
    /// Textual value; present only on character tokens.
    text: Option<String>,
}

impl Token {
    /// A composite token.
    pub fn new(name: impl Into<String>, span: Span, args: TokenArgs) -> Self {
        Self {
            name: name.into(),
            span,
            tags: args.tags,
            props: args.props,
            children: args.children,
            text: None,
        }
    }

    /// A character token holding one input code point (or one grapheme when
    /// seeding through the grapheme splitter).
    pub fn character(value: impl Into<String>, span: Span) -> Self {
        Self {
            name: CHAR.to_string(),
            span,
            tags: Vec::new(),
            props: BTreeMap::new(),
            children: Vec::new(),
            text: Some(value.into()),
        }
    }

    /// The start-of-input sentinel.
    pub fn start_of_input() -> Self {
        Self::new(SOF, Span::new(0, 0), TokenArgs::default())
    }

    /// The end-of-input sentinel, positioned just past the last code point.
    pub fn end_of_input(at: usize) -> Self {
        Self::new(EOF, Span::new(at, 0), TokenArgs::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn start(&self) -> usize {
        self.span.start
    }

    pub fn length(&self) -> usize {
        self.span.length
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_prop(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.props.get(name)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn children(&self) -> &[Token] {
        &self.children
    }

    /// True for character tokens.
    pub fn is_char(&self) -> bool {
        self.text.is_some()
    }

    /// The character token's value; `None` on composite and sentinel tokens.
    pub fn char_value(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Recursively concatenates the textual value of all character-token
    /// descendants. Sentinels and composites without character descendants
    /// yield the empty string.
    pub fn raw_value(&self) -> String {
        match &self.text {
            Some(text) => text.clone(),
            None => self.children.iter().map(Token::raw_value).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_token_raw_value() {
        let t = Token::character("a", Span::new(0, 1));
        assert!(t.is_char());
        assert_eq!(t.name(), CHAR);
        assert_eq!(t.raw_value(), "a");
    }

    #[test]
    fn test_sentinels_have_no_value() {
        assert_eq!(Token::start_of_input().raw_value(), "");
        let eof = Token::end_of_input(7);
        assert_eq!(eof.raw_value(), "");
        assert_eq!(eof.start(), 7);
        assert_eq!(eof.length(), 0);
    }

    #[test]
    fn test_composite_raw_value_recurses() {
        let inner = Token::new(
            "word",
            Span::new(0, 2),
            TokenArgs::with_children(vec![
                Token::character("h", Span::new(0, 1)),
                Token::character("i", Span::new(1, 1)),
            ]),
        );
        let outer = Token::new(
            "line",
            Span::new(0, 3),
            TokenArgs::with_children(vec![inner, Token::character("!", Span::new(2, 1))]),
        );
        assert_eq!(outer.raw_value(), "hi!");
    }

    #[test]
    fn test_token_round_trips_through_serde() {
        let token = Token::new(
            "pair",
            Span::new(0, 2),
            TokenArgs::with_children(vec![
                Token::character("a", Span::new(0, 1)),
                Token::character("b", Span::new(1, 1)),
            ]),
        );
        let json = serde_json::to_string(&token).unwrap();
        assert!(json.contains("\"pair\""));
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn test_absent_props_and_tags_are_not_faults() {
        let t = Token::new("x", Span::new(0, 0), TokenArgs::default());
        assert!(!t.has_tag("missing"));
        assert!(!t.has_prop("missing"));
        assert!(t.prop("missing").is_none());
        assert!(!t.has_children());
    }
}
