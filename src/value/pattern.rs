//! Value patterns such as `"95{digit:1}"`, `"room-{number:10:99}"` or `"{hash:6}"`.
//!
//! A pattern compiles into a list of components. Generation walks them like a
//! mixed-radix counter: the rightmost generated component advances first and
//! carries leftward when it runs out. Random tokens never run out.

use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;

use crate::config::RequestedValuePolicy;
use crate::limits::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    Empty,
    UnclosedComponent(String),
    UnknownComponent(String),
    InvalidDigitWidth(u32),
    InvalidRange { min: String, max: String },
    InvalidTokenLength(usize),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::Empty => write!(f, "pattern is empty"),
            PatternError::UnclosedComponent(rest) => {
                write!(f, "component starting at '{rest}' is not closed")
            }
            PatternError::UnknownComponent(c) => write!(f, "component '{{{c}}}' is in wrong format"),
            PatternError::InvalidDigitWidth(w) => write!(
                f,
                "digit width {w} out of range {MIN_DIGIT_WIDTH}..={MAX_DIGIT_WIDTH}"
            ),
            PatternError::InvalidRange { min, max } => {
                write!(f, "number range {min}:{max} is invalid")
            }
            PatternError::InvalidTokenLength(len) => {
                write!(f, "token length {len} out of range 1..={MAX_TOKEN_LEN}")
            }
        }
    }
}

impl std::error::Error for PatternError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Constant(String),
    /// `{digit:N}`: `0..10^N` zero-padded to N.
    Digit { width: u32, max: u64, current: u64 },
    /// `{number:MIN:MAX}`: zero-padded to MIN's textual width.
    NumberRange { min: u64, max: u64, width: usize, current: u64 },
    /// `{hash}`, `{hash:N}`, `{string}`: random lowercase token led by a letter.
    Token { len: usize, current: String },
}

impl Component {
    fn parse(body: &str) -> Result<Component, PatternError> {
        let parts: Vec<&str> = body.split(':').collect();
        match parts.as_slice() {
            ["digit", width] => {
                let width: u32 = width
                    .parse()
                    .map_err(|_| PatternError::UnknownComponent(body.to_string()))?;
                if !(MIN_DIGIT_WIDTH..=MAX_DIGIT_WIDTH).contains(&width) {
                    return Err(PatternError::InvalidDigitWidth(width));
                }
                Ok(Component::Digit {
                    width,
                    max: 10u64.pow(width) - 1,
                    current: 0,
                })
            }
            ["number", min_text, max_text] => {
                let invalid = || PatternError::InvalidRange {
                    min: min_text.to_string(),
                    max: max_text.to_string(),
                };
                let min: u64 = min_text.parse().map_err(|_| invalid())?;
                let max: u64 = max_text.parse().map_err(|_| invalid())?;
                if min > max {
                    return Err(invalid());
                }
                Ok(Component::NumberRange {
                    min,
                    max,
                    width: min_text.len(),
                    current: min,
                })
            }
            ["hash"] => Self::token(DEFAULT_HASH_LEN),
            ["hash", len] => {
                let len: usize = len
                    .parse()
                    .map_err(|_| PatternError::UnknownComponent(body.to_string()))?;
                Self::token(len)
            }
            ["string"] => Self::token(STRING_TOKEN_LEN),
            _ => Err(PatternError::UnknownComponent(body.to_string())),
        }
    }

    fn token(len: usize) -> Result<Component, PatternError> {
        if len == 0 || len > MAX_TOKEN_LEN {
            return Err(PatternError::InvalidTokenLength(len));
        }
        Ok(Component::Token {
            len,
            current: String::new(),
        })
    }

    fn is_generated(&self) -> bool {
        !matches!(self, Component::Constant(_))
    }

    fn reset<R: Rng>(&mut self, rng: &mut R) {
        match self {
            Component::Constant(_) => {}
            Component::Digit { current, .. } => *current = 0,
            Component::NumberRange { min, current, .. } => *current = *min,
            Component::Token { len, current } => *current = random_token(rng, *len),
        }
    }

    /// Step to the next value; `false` once the component has run out.
    fn advance<R: Rng>(&mut self, rng: &mut R) -> bool {
        match self {
            Component::Constant(_) => false,
            Component::Digit { max, current, .. } | Component::NumberRange { max, current, .. } => {
                if *current >= *max {
                    return false;
                }
                *current += 1;
                true
            }
            Component::Token { len, current } => {
                *current = random_token(rng, *len);
                true
            }
        }
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Component::Constant(s) => out.push_str(s),
            Component::Digit { width, current, .. } => {
                out.push_str(&format!("{current:0w$}", w = *width as usize));
            }
            Component::NumberRange { width, current, .. } => {
                out.push_str(&format!("{current:0width$}", width = *width));
            }
            Component::Token { current, .. } => out.push_str(current),
        }
    }

    fn regex_into(&self, out: &mut String) {
        match self {
            Component::Constant(s) => out.push_str(&regex::escape(s)),
            Component::Digit { width, .. } => out.push_str(&format!("[0-9]{{{width}}}")),
            Component::NumberRange { max, width, .. } => {
                let max_width = max.to_string().len().max(*width);
                out.push_str(&format!("[0-9]{{{width},{max_width}}}"));
            }
            Component::Token { .. } => out.push_str("[A-Za-z][A-Za-z0-9_-]*"),
        }
    }

    /// Byte lengths of the prefixes of `text` this component could have
    /// rendered.
    fn prefix_lens(&self, text: &str) -> Vec<usize> {
        let digits = text.bytes().take_while(u8::is_ascii_digit).count();
        match self {
            Component::Constant(s) => {
                if text.starts_with(s.as_str()) {
                    vec![s.len()]
                } else {
                    vec![]
                }
            }
            Component::Digit { width, .. } => {
                let width = *width as usize;
                if digits >= width { vec![width] } else { vec![] }
            }
            Component::NumberRange { min, max, width, .. } => {
                let max_width = max.to_string().len().max(*width);
                (*width..=max_width.min(digits))
                    .filter(|&len| {
                        let part = &text[..len];
                        part.parse::<u64>().is_ok_and(|n| {
                            (*min..=*max).contains(&n) && format!("{n:0w$}", w = *width) == part
                        })
                    })
                    .collect()
            }
            Component::Token { len, .. } => {
                let mut chars = text.chars();
                let lead = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
                let tail = chars
                    .take(len - 1)
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
                    .count();
                if lead && tail == len - 1 { vec![*len] } else { vec![] }
            }
        }
    }
}

fn random_token<R: Rng>(rng: &mut R, len: usize) -> String {
    let mut token = String::with_capacity(len);
    token.push(char::from(rng.gen_range(b'a'..=b'z')));
    for _ in 1..len {
        token.push(char::from(rng.sample(Alphanumeric)).to_ascii_lowercase());
    }
    token
}

/// A compiled pattern together with its generation state.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    components: Vec<Component>,
    lenient: Regex,
    started: bool,
    exhausted: bool,
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Pattern, PatternError> {
        if source.is_empty() {
            return Err(PatternError::Empty);
        }
        let mut components = Vec::new();
        let mut rest = source;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                components.push(Component::Constant(rest[..open].to_string()));
            }
            let close = rest[open..]
                .find('}')
                .map(|i| open + i)
                .ok_or_else(|| PatternError::UnclosedComponent(rest[open..].to_string()))?;
            components.push(Component::parse(&rest[open + 1..close])?);
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            components.push(Component::Constant(rest.to_string()));
        }

        let lenient = Self::compile_regex(&components)?;
        Ok(Pattern {
            source: source.to_string(),
            components,
            lenient,
            started: false,
            exhausted: false,
        })
    }

    fn compile_regex(components: &[Component]) -> Result<Regex, PatternError> {
        let mut text = String::from("^");
        for c in components {
            c.regex_into(&mut text);
        }
        text.push('$');
        Regex::new(&text).map_err(|_| PatternError::UnknownComponent(text))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn is_single_constant(&self) -> bool {
        matches!(self.components.as_slice(), [Component::Constant(_)])
    }

    pub fn is_sole_token(&self) -> bool {
        matches!(self.components.as_slice(), [Component::Token { .. }])
    }

    /// Whether generation can go on forever.
    pub fn has_token(&self) -> bool {
        self.components
            .iter()
            .any(|c| matches!(c, Component::Token { .. }))
    }

    /// Restart generation from the first candidate.
    pub fn reset(&mut self) {
        self.started = false;
        self.exhausted = false;
    }

    /// Next candidate, or `None` once every combination has been produced.
    pub fn generate<R: Rng>(&mut self, rng: &mut R) -> Option<String> {
        if self.exhausted {
            return None;
        }
        if !self.started {
            self.started = true;
            for c in &mut self.components {
                c.reset(rng);
            }
            return Some(self.render());
        }

        let mut carry = true;
        for c in self.components.iter_mut().rev().filter(|c| c.is_generated()) {
            if c.advance(rng) {
                carry = false;
                break;
            }
            c.reset(rng);
        }
        if carry {
            self.exhausted = true;
            return None;
        }
        Some(self.render())
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for c in &self.components {
            c.render_into(&mut out);
        }
        out
    }

    /// Whether `value` could have come from this pattern.
    pub fn accepts(&self, value: &str, policy: RequestedValuePolicy) -> bool {
        // A lone token's lenient regex is the plain identifier shape.
        if self.is_sole_token() {
            return self.lenient.is_match(value);
        }
        match policy {
            RequestedValuePolicy::Lenient => self.lenient.is_match(value),
            RequestedValuePolicy::Strict => matches_from(&self.components, value),
        }
    }
}

/// Split `text` across `components`, trying every width a range could take.
fn matches_from(components: &[Component], text: &str) -> bool {
    let Some((first, rest)) = components.split_first() else {
        return text.is_empty();
    };
    first
        .prefix_lens(text)
        .into_iter()
        .any(|len| matches_from(rest, &text[len..]))
}

/// Ordered patterns of one value-space, tried one after another.
#[derive(Debug, Clone)]
pub struct ValueGenerator {
    patterns: Vec<Pattern>,
    max_attempts: usize,
}

impl ValueGenerator {
    pub fn new(patterns: Vec<Pattern>, max_attempts: usize) -> Self {
        Self {
            patterns,
            max_attempts,
        }
    }

    /// First candidate not rejected by `is_used`, walking every pattern in
    /// priority order. Counter patterns run until exhausted; a pattern with a
    /// random token gives up after `max_attempts` skipped candidates and the
    /// next pattern is tried. `None` when no pattern yields a free value.
    pub fn next_free<R: Rng>(
        &mut self,
        rng: &mut R,
        mut is_used: impl FnMut(&str) -> bool,
    ) -> Option<String> {
        for pattern in &mut self.patterns {
            pattern.reset();
            let bounded = pattern.has_token();
            let mut skipped = 0usize;
            while let Some(candidate) = pattern.generate(rng) {
                if !is_used(&candidate) {
                    return Some(candidate);
                }
                skipped += 1;
                if bounded && skipped >= self.max_attempts {
                    tracing::debug!(
                        pattern = pattern.source(),
                        skipped,
                        "giving up after skipping used candidates"
                    );
                    break;
                }
            }
        }
        None
    }

    pub fn accepts(&self, value: &str, policy: RequestedValuePolicy) -> bool {
        self.patterns.iter().any(|p| p.accepts(value, policy))
    }
}
