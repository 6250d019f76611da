use thiserror::Error;

use crate::dom::document::{Document, NodeId};

// ============================================================================
// Minimal selector engine over the snapshot arena
// ============================================================================
//
// Supported: type, `*`, `#id`, `.class`, `[a]`, `[a=v]`, `[a~=v]`, `[a^=v]`,
// `[a$=v]`, `[a*=v]` (optional ` i` flag), `:not(<compound>)`, descendant and
// child combinators, comma-separated lists.

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected {found:?} at offset {offset} in selector {selector:?}")]
    Unexpected {
        selector: String,
        offset: usize,
        found: String,
    },

    #[error("unterminated string in selector {0:?}")]
    UnterminatedString(String),

    #[error("unsupported pseudo-class :{0}")]
    UnsupportedPseudo(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

#[derive(Debug, Clone, PartialEq)]
struct Complex {
    /// Compounds left to right; `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    parts: Vec<Simple>,
}

#[derive(Debug, Clone, PartialEq)]
enum Simple {
    Id(String),
    Class(String),
    Attr {
        name: String,
        op: Option<AttrOp>,
        value: String,
        ignore_case: bool,
    },
    Not(Box<Compound>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AttrOp {
    Equals,
    Includes,
    Prefix,
    Suffix,
    Substring,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        Parser::new(input).parse_list()
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.alternatives.iter().any(|c| c.matches(doc, node))
    }
}

impl Complex {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        match self.compounds.len() {
            0 => false,
            n => self.matches_at(doc, node, n - 1),
        }
    }

    fn matches_at(&self, doc: &Document, node: NodeId, idx: usize) -> bool {
        if !self.compounds[idx].matches(doc, node) {
            return false;
        }
        if idx == 0 {
            return true;
        }

        match self.combinators[idx - 1] {
            Combinator::Child => doc
                .parent(node)
                .is_some_and(|p| self.matches_at(doc, p, idx - 1)),
            Combinator::Descendant => doc.ancestors(node).any(|a| self.matches_at(doc, a, idx - 1)),
        }
    }
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if !doc.tag(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.parts.iter().all(|p| p.matches(doc, node))
    }
}

impl Simple {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        match self {
            Simple::Id(id) => doc.attr(node, "id") == Some(id.as_str()),
            Simple::Class(class) => doc.classes(node).any(|c| c == class),
            Simple::Not(inner) => !inner.matches(doc, node),
            Simple::Attr {
                name,
                op,
                value,
                ignore_case,
            } => {
                let Some(actual) = doc.attr(node, name) else {
                    return false;
                };
                let Some(op) = op else {
                    return true;
                };

                let (actual, value) = if *ignore_case {
                    (actual.to_lowercase(), value.to_lowercase())
                } else {
                    (actual.to_string(), value.clone())
                };

                match op {
                    AttrOp::Equals => actual == value,
                    AttrOp::Includes => actual.split_whitespace().any(|t| t == value),
                    AttrOp::Prefix => !value.is_empty() && actual.starts_with(&value),
                    AttrOp::Suffix => !value.is_empty() && actual.ends_with(&value),
                    AttrOp::Substring => !value.is_empty() && actual.contains(&value),
                }
            }
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self) -> SelectorError {
        SelectorError::Unexpected {
            selector: self.source.to_string(),
            offset: self.pos,
            found: self
                .peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".into()),
        }
    }

    fn parse_list(&mut self) -> Result<Selector, SelectorError> {
        let mut alternatives = Vec::new();
        loop {
            self.skip_ws();
            if self.peek().is_none() {
                return Err(if alternatives.is_empty() {
                    SelectorError::Empty
                } else {
                    self.unexpected()
                });
            }
            alternatives.push(self.parse_complex()?);
            match self.peek() {
                Some(',') => self.pos += 1,
                None => break,
                Some(_) => return Err(self.unexpected()),
            }
        }
        Ok(Selector { alternatives })
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    combinators.push(Combinator::Child);
                }
                Some(_) if had_ws => combinators.push(Combinator::Descendant),
                Some(_) => return Err(self.unexpected()),
            }
            compounds.push(self.parse_compound()?);
        }

        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut universal = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                universal = true;
            }
            Some(c) if is_ident_char(c) => compound.tag = Some(self.parse_ident()?),
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.parts.push(Simple::Id(self.parse_ident()?));
                }
                Some('.') => {
                    self.pos += 1;
                    compound.parts.push(Simple::Class(self.parse_ident()?));
                }
                Some('[') => {
                    self.pos += 1;
                    compound.parts.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.parts.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if !universal && compound.tag.is_none() && compound.parts.is_empty() {
            return Err(self.unexpected());
        }

        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attr(&mut self) -> Result<Simple, SelectorError> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(Simple::Attr {
                    name,
                    op: None,
                    value: String::new(),
                    ignore_case: false,
                });
            }
            Some('=') => {
                self.pos += 1;
                AttrOp::Equals
            }
            Some(c @ ('~' | '^' | '$' | '*')) if self.chars.get(self.pos + 1) == Some(&'=') => {
                self.pos += 2;
                match c {
                    '~' => AttrOp::Includes,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Substring,
                }
            }
            _ => return Err(self.unexpected()),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => self.parse_quoted(q)?,
            _ => self.parse_ident()?,
        };
        self.skip_ws();

        let mut ignore_case = false;
        if matches!(self.peek(), Some('i' | 'I')) {
            self.pos += 1;
            ignore_case = true;
            self.skip_ws();
        }

        if self.peek() != Some(']') {
            return Err(self.unexpected());
        }
        self.pos += 1;

        Ok(Simple::Attr {
            name,
            op: Some(op),
            value,
            ignore_case,
        })
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(SelectorError::UnterminatedString(self.source.to_string())),
                Some('\\') => {
                    self.pos += 1;
                    if let Some(c) = self.peek() {
                        value.push(c);
                        self.pos += 1;
                    }
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_pseudo(&mut self) -> Result<Simple, SelectorError> {
        let name = self.parse_ident()?;
        if !name.eq_ignore_ascii_case("not") {
            return Err(SelectorError::UnsupportedPseudo(name));
        }
        if self.peek() != Some('(') {
            return Err(self.unexpected());
        }
        self.pos += 1;
        self.skip_ws();
        let inner = self.parse_compound()?;
        self.skip_ws();
        if self.peek() != Some(')') {
            return Err(self.unexpected());
        }
        self.pos += 1;
        Ok(Simple::Not(Box::new(inner)))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Quote a value for use inside an attribute selector.
pub fn quote_attr(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
