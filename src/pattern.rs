//! Pattern engine: combinators over a token stream.
//!
//! A [`Pattern`] attempts to match a prefix of a token list and reports how
//! many tokens it consumed. Combinators are pure over
//! `(tokens, captures, preceding)` — captures are write-only, outward, and
//! scoped to a single evaluation. Constructors live in [`matchers`] and
//! return [`PatternRef`] handles that compose freely and are safe to share
//! across threads.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::TesseraError;
use crate::token::{PropValue, Span, Token};

/// Outcome of a pattern attempt: either no match, or a match consuming the
/// first `n` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    NoMatch,
    Matched(usize),
}

impl MatchOutcome {
    pub fn is_match(self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }

    pub fn consumed(self) -> Option<usize> {
        match self {
            MatchOutcome::Matched(n) => Some(n),
            MatchOutcome::NoMatch => None,
        }
    }
}

/// Outcome of a single-token pattern attempt. Single-token patterns can only
/// fail, match without consuming, or consume exactly one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleOutcome {
    NoMatch,
    MatchedZero,
    MatchedOne,
}

impl From<SingleOutcome> for MatchOutcome {
    fn from(outcome: SingleOutcome) -> Self {
        match outcome {
            SingleOutcome::NoMatch => MatchOutcome::NoMatch,
            SingleOutcome::MatchedZero => MatchOutcome::Matched(0),
            SingleOutcome::MatchedOne => MatchOutcome::Matched(1),
        }
    }
}

pub type MatchResult = Result<MatchOutcome, TesseraError>;

/// A named binding produced by a [`matchers::capture`] pattern: either the
/// matched token span, or the explicit marker that the matcher ran and did
/// not match. The marker is distinct from "not captured at all".
#[derive(Debug, Clone, PartialEq)]
pub enum Capture {
    Matched(Vec<Token>),
    Unmatched,
}

/// Capture set for one pattern evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Captures {
    slots: BTreeMap<String, Capture>,
}

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, tokens: Vec<Token>) {
        self.slots.insert(name.into(), Capture::Matched(tokens));
    }

    pub fn miss(&mut self, name: impl Into<String>) {
        self.slots.insert(name.into(), Capture::Unmatched);
    }

    pub fn get(&self, name: &str) -> Option<&Capture> {
        self.slots.get(name)
    }

    /// The captured token span, or `None` when the capture is absent or
    /// explicitly unmatched.
    pub fn tokens(&self, name: &str) -> Option<&[Token]> {
        match self.slots.get(name) {
            Some(Capture::Matched(tokens)) => Some(tokens),
            _ => None,
        }
    }

    /// Concatenated raw value of a captured span; empty when absent or
    /// unmatched.
    pub fn raw_value(&self, name: &str) -> String {
        self.tokens(name)
            .map(|tokens| tokens.iter().map(Token::raw_value).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Capture)> {
        self.slots.iter()
    }

    /// Converts the capture set into token properties, preserving the
    /// matched/unmatched distinction.
    pub fn to_props(&self) -> BTreeMap<String, PropValue> {
        self.slots
            .iter()
            .map(|(name, capture)| {
                let value = match capture {
                    Capture::Matched(tokens) => PropValue::Tokens(tokens.clone()),
                    Capture::Unmatched => PropValue::Unmatched,
                };
                (name.clone(), value)
            })
            .collect()
    }
}

/// A pattern over a token stream.
///
/// `tokens` is the remaining input, `preceding` everything before the match
/// point in original order. The contract is prefix-only: a pattern may
/// examine `tokens` freely but consumption is always counted from the front.
pub trait Pattern: Send + Sync {
    fn matches(
        &self,
        tokens: &[Token],
        captures: &mut Captures,
        preceding: &[Token],
    ) -> MatchResult;

    /// The single-token view of this pattern, when it honors the
    /// single-token contract. Negation uses this to skip the runtime arity
    /// probe.
    fn single(&self) -> Option<&dyn SingleTokenPattern> {
        None
    }
}

impl std::fmt::Debug for dyn Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<pattern>")
    }
}

/// A pattern restricted to the single-token contract
/// (`NoMatch | MatchedZero | MatchedOne`).
pub trait SingleTokenPattern: Pattern {
    fn matches_one(
        &self,
        token: Option<&Token>,
        captures: &mut Captures,
        preceding: &[Token],
    ) -> Result<SingleOutcome, TesseraError>;
}

/// Shared handle to a pattern.
pub type PatternRef = Arc<dyn Pattern>;

/// Pattern constructors.
pub mod matchers {
    use super::*;
    use crate::tokenizer::ITERATION_CEILING;
    use regex::RegexBuilder;

    /// Single-token predicate adapter.
    struct Single<F>(F);

    impl<F> Pattern for Single<F>
    where
        F: Fn(Option<&Token>) -> bool + Send + Sync,
    {
        fn matches(
            &self,
            tokens: &[Token],
            _captures: &mut Captures,
            _preceding: &[Token],
        ) -> MatchResult {
            Ok(if (self.0)(tokens.first()) {
                MatchOutcome::Matched(1)
            } else {
                MatchOutcome::NoMatch
            })
        }

        fn single(&self) -> Option<&dyn SingleTokenPattern> {
            Some(self)
        }
    }

    impl<F> SingleTokenPattern for Single<F>
    where
        F: Fn(Option<&Token>) -> bool + Send + Sync,
    {
        fn matches_one(
            &self,
            token: Option<&Token>,
            _captures: &mut Captures,
            _preceding: &[Token],
        ) -> Result<SingleOutcome, TesseraError> {
            Ok(if (self.0)(token) {
                SingleOutcome::MatchedOne
            } else {
                SingleOutcome::NoMatch
            })
        }
    }

    /// Matches a token by name.
    pub fn token_name(name: impl Into<String>) -> PatternRef {
        let name = name.into();
        Arc::new(Single(move |token: Option<&Token>| {
            token.map_or(false, |t| t.name() == name)
        }))
    }

    /// Matches a character token with exactly this value.
    pub fn literal_char(value: impl Into<String>) -> PatternRef {
        let value = value.into();
        Arc::new(Single(move |token: Option<&Token>| {
            token.and_then(Token::char_value) == Some(value.as_str())
        }))
    }

    /// Matches a token whose raw value equals `value`.
    pub fn raw_equals(value: impl Into<String>) -> PatternRef {
        let value = value.into();
        Arc::new(Single(move |token: Option<&Token>| {
            token.map_or(false, |t| t.raw_value() == value)
        }))
    }

    /// Matches a token carrying the tag.
    pub fn has_tag(tag: impl Into<String>) -> PatternRef {
        let tag = tag.into();
        Arc::new(Single(move |token: Option<&Token>| {
            token.map_or(false, |t| t.has_tag(&tag))
        }))
    }

    /// Matches a token carrying the property, whatever its value.
    pub fn has_prop(name: impl Into<String>) -> PatternRef {
        let name = name.into();
        Arc::new(Single(move |token: Option<&Token>| {
            token.map_or(false, |t| t.has_prop(&name))
        }))
    }

    /// Matches a token whose property equals the given value.
    pub fn prop_equals(name: impl Into<String>, value: PropValue) -> PatternRef {
        let name = name.into();
        Arc::new(Single(move |token: Option<&Token>| {
            token.map_or(false, |t| t.prop(&name) == Some(&value))
        }))
    }

    /// Matches a single token by arbitrary predicate.
    pub fn predicate<F>(test: F) -> PatternRef
    where
        F: Fn(&Token) -> bool + Send + Sync + 'static,
    {
        Arc::new(Single(move |token: Option<&Token>| {
            token.map_or(false, |t| test(t))
        }))
    }

    /// Character class tested by the wildcard combinator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Wildcard {
        Any,
        Whitespace,
        Digit,
    }

    /// Matches one character token of the given class.
    pub fn wildcard(kind: Wildcard) -> PatternRef {
        Arc::new(Single(move |token: Option<&Token>| {
            let value = match token.and_then(Token::char_value) {
                Some(value) => value,
                None => return false,
            };
            match kind {
                Wildcard::Any => true,
                Wildcard::Whitespace => value.chars().all(char::is_whitespace),
                Wildcard::Digit => value.chars().all(|c| c.is_ascii_digit()),
            }
        }))
    }

    struct StringLiteral {
        value: String,
    }

    impl Pattern for StringLiteral {
        fn matches(
            &self,
            tokens: &[Token],
            _captures: &mut Captures,
            _preceding: &[Token],
        ) -> MatchResult {
            let mut consumed = 0;
            for expected in self.value.chars() {
                let matches = tokens
                    .get(consumed)
                    .and_then(Token::char_value)
                    .map_or(false, |v| {
                        v.chars().eq(std::iter::once(expected))
                    });
                if !matches {
                    return Ok(MatchOutcome::NoMatch);
                }
                consumed += 1;
            }
            Ok(MatchOutcome::Matched(consumed))
        }
    }

    /// Consumes one character token per code point of `value`, each equal
    /// positionally; fails atomically otherwise.
    pub fn string_literal(value: impl Into<String>) -> PatternRef {
        Arc::new(StringLiteral {
            value: value.into(),
        })
    }

    struct Sequence {
        patterns: Vec<PatternRef>,
    }

    impl Pattern for Sequence {
        fn matches(
            &self,
            tokens: &[Token],
            captures: &mut Captures,
            preceding: &[Token],
        ) -> MatchResult {
            let mut consumed = 0;
            let mut before = preceding.to_vec();
            for pattern in &self.patterns {
                match pattern.matches(&tokens[consumed..], captures, &before)? {
                    MatchOutcome::Matched(n) => {
                        before.extend_from_slice(&tokens[consumed..consumed + n]);
                        consumed += n;
                    }
                    MatchOutcome::NoMatch => return Ok(MatchOutcome::NoMatch),
                }
            }
            Ok(MatchOutcome::Matched(consumed))
        }
    }

    /// Juxtaposition: every sub-pattern must match in turn. Each sub-pattern
    /// sees the already-consumed prefix appended to `preceding`, so
    /// lookbehind works across sub-pattern boundaries.
    pub fn sequence(patterns: Vec<PatternRef>) -> PatternRef {
        Arc::new(Sequence { patterns })
    }

    struct Repeat {
        pattern: PatternRef,
        min: usize,
        max: Option<usize>,
    }

    impl Pattern for Repeat {
        fn matches(
            &self,
            tokens: &[Token],
            captures: &mut Captures,
            preceding: &[Token],
        ) -> MatchResult {
            let mut reps = 0;
            let mut consumed = 0;
            let mut before = preceding.to_vec();
            let mut ticks = 0usize;
            loop {
                if self.max.map_or(false, |max| reps >= max) {
                    break;
                }
                ticks += 1;
                if ticks > ITERATION_CEILING {
                    return Err(TesseraError::RunawayLoop {
                        context: "repeat combinator",
                    });
                }
                match self.pattern.matches(&tokens[consumed..], captures, &before)? {
                    MatchOutcome::Matched(n) => {
                        before.extend_from_slice(&tokens[consumed..consumed + n]);
                        consumed += n;
                        reps += 1;
                    }
                    MatchOutcome::NoMatch => break,
                }
            }
            if reps >= self.min {
                Ok(MatchOutcome::Matched(consumed))
            } else {
                Ok(MatchOutcome::NoMatch)
            }
        }
    }

    /// Greedy counted repetition: applies `pattern` until it fails or `max`
    /// repetitions are reached (unbounded when `max` is `None`); succeeds if
    /// at least `min` repetitions matched. `min == 0` always succeeds,
    /// consuming zero when nothing matched.
    pub fn repeat(pattern: PatternRef, min: usize, max: Option<usize>) -> PatternRef {
        Arc::new(Repeat { pattern, min, max })
    }

    /// Zero-or-more.
    pub fn any(pattern: PatternRef) -> PatternRef {
        repeat(pattern, 0, None)
    }

    /// Zero-or-one.
    pub fn optional(pattern: PatternRef) -> PatternRef {
        repeat(pattern, 0, Some(1))
    }

    /// One-or-more.
    pub fn one_or_more(pattern: PatternRef) -> PatternRef {
        repeat(pattern, 1, None)
    }

    struct Alternation {
        patterns: Vec<PatternRef>,
    }

    impl Pattern for Alternation {
        fn matches(
            &self,
            tokens: &[Token],
            captures: &mut Captures,
            preceding: &[Token],
        ) -> MatchResult {
            for pattern in &self.patterns {
                if let MatchOutcome::Matched(n) = pattern.matches(tokens, captures, preceding)? {
                    return Ok(MatchOutcome::Matched(n));
                }
            }
            Ok(MatchOutcome::NoMatch)
        }
    }

    /// Ordered choice: the first matching pattern wins, not the longest.
    pub fn alternation(patterns: Vec<PatternRef>) -> PatternRef {
        Arc::new(Alternation { patterns })
    }

    struct Conjunction {
        patterns: Vec<PatternRef>,
    }

    impl Pattern for Conjunction {
        fn matches(
            &self,
            tokens: &[Token],
            captures: &mut Captures,
            preceding: &[Token],
        ) -> MatchResult {
            let mut shortest: Option<usize> = None;
            for pattern in &self.patterns {
                match pattern.matches(tokens, captures, preceding)? {
                    MatchOutcome::Matched(n) => {
                        shortest = Some(shortest.map_or(n, |s| s.min(n)));
                    }
                    MatchOutcome::NoMatch => return Ok(MatchOutcome::NoMatch),
                }
            }
            match shortest {
                Some(n) => Ok(MatchOutcome::Matched(n)),
                None => Ok(MatchOutcome::NoMatch),
            }
        }
    }

    /// All patterns must match at the same starting point; the result is the
    /// minimum of their consumed counts. Sub-patterns that disagree on
    /// consumption are not rejected — the shorter count wins.
    pub fn conjunction(patterns: Vec<PatternRef>) -> PatternRef {
        Arc::new(Conjunction { patterns })
    }

    struct Negate {
        inner: PatternRef,
    }

    fn invert(outcome: SingleOutcome) -> SingleOutcome {
        match outcome {
            SingleOutcome::NoMatch => SingleOutcome::MatchedOne,
            SingleOutcome::MatchedZero | SingleOutcome::MatchedOne => SingleOutcome::NoMatch,
        }
    }

    fn as_single_outcome(outcome: MatchOutcome) -> Result<SingleOutcome, TesseraError> {
        match outcome {
            MatchOutcome::Matched(n) if n > 1 => Err(TesseraError::NegationArity { consumed: n }),
            MatchOutcome::Matched(0) => Ok(SingleOutcome::MatchedZero),
            MatchOutcome::Matched(_) => Ok(SingleOutcome::MatchedOne),
            MatchOutcome::NoMatch => Ok(SingleOutcome::NoMatch),
        }
    }

    impl Pattern for Negate {
        fn matches(
            &self,
            tokens: &[Token],
            captures: &mut Captures,
            preceding: &[Token],
        ) -> MatchResult {
            if tokens.is_empty() {
                return Ok(MatchOutcome::NoMatch);
            }
            if self.inner.single().is_some() {
                return Ok(self.matches_one(tokens.first(), captures, preceding)?.into());
            }
            // No single-token view: evaluate over the full window so a
            // pattern that consumes more than one token is caught here.
            let inner = as_single_outcome(self.inner.matches(tokens, captures, preceding)?)?;
            Ok(invert(inner).into())
        }

        fn single(&self) -> Option<&dyn SingleTokenPattern> {
            Some(self)
        }
    }

    impl SingleTokenPattern for Negate {
        fn matches_one(
            &self,
            token: Option<&Token>,
            captures: &mut Captures,
            preceding: &[Token],
        ) -> Result<SingleOutcome, TesseraError> {
            let token = match token {
                Some(token) => token,
                None => return Ok(SingleOutcome::NoMatch),
            };
            let inner = if let Some(single) = self.inner.single() {
                single.matches_one(Some(token), captures, preceding)?
            } else {
                let head = std::slice::from_ref(token);
                as_single_outcome(self.inner.matches(head, captures, preceding)?)?
            };
            Ok(invert(inner))
        }
    }

    /// Consumes the one token `inner` would examine, succeeding iff `inner`
    /// fails on it. Negating a pattern that consumes more than one token is
    /// a fatal [`TesseraError::NegationArity`] error, raised when the
    /// negated pattern is evaluated.
    pub fn negate(inner: PatternRef) -> PatternRef {
        Arc::new(Negate { inner })
    }

    struct CaptureAs {
        name: String,
        inner: PatternRef,
    }

    impl Pattern for CaptureAs {
        fn matches(
            &self,
            tokens: &[Token],
            captures: &mut Captures,
            preceding: &[Token],
        ) -> MatchResult {
            match self.inner.matches(tokens, captures, preceding)? {
                MatchOutcome::Matched(n) => {
                    captures.bind(&self.name, tokens[..n].to_vec());
                    Ok(MatchOutcome::Matched(n))
                }
                MatchOutcome::NoMatch => {
                    captures.miss(&self.name);
                    Ok(MatchOutcome::NoMatch)
                }
            }
        }
    }

    /// Forwards `inner`'s outcome; on success records the consumed span
    /// under `name`, on failure records the explicit unmatched marker.
    pub fn capture(name: impl Into<String>, inner: PatternRef) -> PatternRef {
        Arc::new(CaptureAs {
            name: name.into(),
            inner,
        })
    }

    struct Lookahead {
        inner: PatternRef,
    }

    impl Pattern for Lookahead {
        fn matches(
            &self,
            tokens: &[Token],
            captures: &mut Captures,
            preceding: &[Token],
        ) -> MatchResult {
            Ok(match self.inner.matches(tokens, captures, preceding)? {
                MatchOutcome::Matched(_) => MatchOutcome::Matched(0),
                MatchOutcome::NoMatch => MatchOutcome::NoMatch,
            })
        }
    }

    /// Non-consuming: succeeds iff `inner` matches the upcoming tokens.
    pub fn lookahead(inner: PatternRef) -> PatternRef {
        Arc::new(Lookahead { inner })
    }

    struct Lookbehind {
        inner: PatternRef,
    }

    impl Pattern for Lookbehind {
        fn matches(
            &self,
            _tokens: &[Token],
            captures: &mut Captures,
            preceding: &[Token],
        ) -> MatchResult {
            let reversed: Vec<Token> = preceding.iter().rev().cloned().collect();
            Ok(match self.inner.matches(&reversed, captures, &[])? {
                MatchOutcome::Matched(_) => MatchOutcome::Matched(0),
                MatchOutcome::NoMatch => MatchOutcome::NoMatch,
            })
        }
    }

    /// Non-consuming: succeeds iff `inner` matches the preceding tokens
    /// scanned in reverse order (nearest first).
    pub fn lookbehind(inner: PatternRef) -> PatternRef {
        Arc::new(Lookbehind { inner })
    }

    struct RegexMatcher {
        re: regex::Regex,
    }

    impl Pattern for RegexMatcher {
        fn matches(
            &self,
            tokens: &[Token],
            captures: &mut Captures,
            preceding: &[Token],
        ) -> MatchResult {
            // Haystack: contiguous preceding character run, then the
            // contiguous leading character run. `offsets` maps each
            // contributing token's byte offset to its input position.
            let mut hay = String::new();
            let mut offsets: Vec<(usize, usize)> = Vec::new();
            let lead: Vec<&Token> = preceding
                .iter()
                .rev()
                .take_while(|t| t.is_char())
                .collect();
            for token in lead.into_iter().rev() {
                if let Some(value) = token.char_value() {
                    offsets.push((hay.len(), token.start()));
                    hay.push_str(value);
                }
            }
            let anchor = hay.len();
            for token in tokens {
                match token.char_value() {
                    Some(value) => {
                        offsets.push((hay.len(), token.start()));
                        hay.push_str(value);
                    }
                    None => break,
                }
            }

            let found = match self.re.captures_at(&hay, anchor) {
                Some(found) => found,
                None => return Ok(MatchOutcome::NoMatch),
            };
            let whole = match found.get(0) {
                Some(whole) if whole.start() == anchor => whole,
                _ => return Ok(MatchOutcome::NoMatch),
            };

            let position_of = |byte_offset: usize| -> usize {
                match offsets.binary_search_by_key(&byte_offset, |&(ofs, _)| ofs) {
                    Ok(i) => offsets[i].1,
                    Err(0) => 0,
                    Err(i) => offsets[i - 1].1,
                }
            };

            for name in self.re.capture_names().flatten() {
                match found.name(name) {
                    Some(group) => {
                        let mut synthetic = Vec::new();
                        let mut offset = group.start();
                        for c in group.as_str().chars() {
                            synthetic
                                .push(Token::character(c, Span::new(position_of(offset), 1)));
                            offset += c.len_utf8();
                        }
                        captures.bind(name, synthetic);
                    }
                    None => captures.miss(name),
                }
            }

            let consumed = offsets
                .iter()
                .filter(|&&(ofs, _)| ofs >= anchor && ofs < whole.end())
                .count();
            Ok(MatchOutcome::Matched(consumed))
        }
    }

    /// Runs a regular expression over the contiguous character-token run at
    /// the current position, anchored exactly there. Preceding characters
    /// are part of the haystack so anchors can see immediately preceding
    /// text. Named groups bind as captures of synthetic character tokens
    /// positioned at their offsets in the original input.
    pub fn regex(pattern: &str, ignore_case: bool) -> Result<PatternRef, TesseraError> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|source| TesseraError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Arc::new(RegexMatcher { re }))
    }
}
