//! Hierarchical tag construction.
//!
//! A tag template is a format string whose formatted text reads as a nested
//! literal: mappings, sequences and scalars. Mapping braces are doubled the
//! way format strings escape them, and `{}` / `{N}` slots take values
//! resolved from each record:
//!
//! ```text
//! {{'漢字': ['{}', {{'級': '{}'}}]}}   with ["{rank}", "{reference_idx}"]
//! ```
//!
//! The template is parsed once into a [`TagTemplate`]. Each record's values
//! are substituted straight into its slots to give a [`TagValue`], which is
//! flattened depth first into `::`-separated paths:
//!
//! - a mapping key extends the path; a scalar or mapping value is entered
//!   with the delimiter appended, a sequence value without it, and an empty
//!   container emits the key path alone;
//! - a sequence never extends the path, each item continues from it;
//! - a scalar ends the path.
//!
//! So `{'A': ['x', {'B': 'y'}]}` yields `Ax AB::y`.

use hanjadeck_shared::{HanjaDeckError, Record, Result};
use tracing::{debug, instrument, warn};

/// Field receiving the generated tags.
pub const TAGS_FIELD: &str = "tags";

/// Default path separator.
pub const DEFAULT_TAG_DELIMITER: &str = "::";

// ---------------------------------------------------------------------------
// TagValue
// ---------------------------------------------------------------------------

/// A nested value to derive tag paths from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Scalar(String),
    Sequence(Vec<TagValue>),
    Mapping(Vec<(String, TagValue)>),
}

impl TagValue {
    /// Flatten into hierarchical paths, depth first.
    pub fn paths(&self, delimiter: &str) -> Vec<String> {
        let mut out = Vec::new();
        collect_paths(self, "", delimiter, &mut out);
        out
    }
}

fn collect_paths(value: &TagValue, path: &str, delimiter: &str, out: &mut Vec<String>) {
    match value {
        TagValue::Scalar(s) => out.push(format!("{path}{s}")),
        TagValue::Sequence(items) => {
            for item in items {
                collect_paths(item, path, delimiter, out);
            }
        }
        TagValue::Mapping(entries) => {
            for (key, value) in entries {
                let key_path = format!("{path}{key}");
                match value {
                    TagValue::Sequence(items) if items.is_empty() => out.push(key_path),
                    TagValue::Mapping(entries) if entries.is_empty() => out.push(key_path),
                    TagValue::Sequence(_) => collect_paths(value, &key_path, delimiter, out),
                    _ => collect_paths(value, &format!("{key_path}{delimiter}"), delimiter, out),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TagTemplate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextPart {
    Literal(String),
    Slot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(Vec<TextPart>),
    Sequence(Vec<Node>),
    Mapping(Vec<(Node, Node)>),
}

/// A parsed tag template with numbered value slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTemplate {
    root: Node,
    slots: usize,
}

impl TagTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let (pieces, slots) = lex(template)?;
        let mut parser = Parser { pieces: &pieces, pos: 0 };

        let root = parser.value()?;
        parser.skip_whitespace();
        if parser.pos != pieces.len() {
            return Err(parser.error("unexpected trailing input"));
        }

        Ok(Self { root, slots })
    }

    /// Number of values the template consumes.
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Substitute `values` into the slots. Extra values are ignored.
    pub fn render(&self, values: &[String]) -> Result<TagValue> {
        if values.len() < self.slots {
            return Err(HanjaDeckError::template(format!(
                "template needs {} values, got {}",
                self.slots,
                values.len()
            )));
        }
        Ok(build(&self.root, values))
    }
}

fn build(node: &Node, values: &[String]) -> TagValue {
    match node {
        Node::Text(parts) => TagValue::Scalar(render_text(parts, values)),
        Node::Sequence(items) => TagValue::Sequence(items.iter().map(|n| build(n, values)).collect()),
        Node::Mapping(entries) => {
            let mut out: Vec<(String, TagValue)> = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match key {
                    Node::Text(parts) => render_text(parts, values),
                    _ => continue,
                };
                let value = build(value, values);
                match out.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => out.push((key, value)),
                }
            }
            TagValue::Mapping(out)
        }
    }
}

fn render_text(parts: &[TextPart], values: &[String]) -> String {
    parts
        .iter()
        .map(|part| match part {
            TextPart::Literal(s) => s.as_str(),
            TextPart::Slot(i) => values.get(*i).map(String::as_str).unwrap_or_default(),
        })
        .collect()
}

// ----- Format-string layer -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Char(char),
    Slot(usize),
}

/// Resolve `{{`, `}}` and `{}`/`{N}` slots. Returns the pieces and the slot count.
fn lex(template: &str) -> Result<(Vec<Piece>, usize)> {
    let mut pieces = Vec::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0usize;
    let mut numbering: Option<bool> = None; // Some(true) = automatic
    let mut slots = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                pieces.push(Piece::Char('{'));
            }
            '{' => {
                let mut spec = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(HanjaDeckError::template("unmatched '{' in template"));
                        }
                        Some(ch) => spec.push(ch),
                    }
                }

                let automatic = spec.is_empty();
                if numbering.is_some_and(|auto| auto != automatic) {
                    return Err(HanjaDeckError::template(
                        "cannot mix automatic and numbered slots",
                    ));
                }
                numbering = Some(automatic);

                let index = if automatic {
                    next_auto += 1;
                    next_auto - 1
                } else {
                    spec.trim().parse::<usize>().map_err(|_| {
                        HanjaDeckError::template(format!("unsupported slot '{{{spec}}}'"))
                    })?
                };
                slots = slots.max(index + 1);
                pieces.push(Piece::Slot(index));
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                pieces.push(Piece::Char('}'));
            }
            '}' => return Err(HanjaDeckError::template("single '}' in template")),
            other => pieces.push(Piece::Char(other)),
        }
    }

    Ok((pieces, slots))
}

// ----- Literal layer -----

struct Parser<'a> {
    pieces: &'a [Piece],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Piece> {
        self.pieces.get(self.pos).copied()
    }

    fn peek_char(&self) -> Option<char> {
        match self.peek() {
            Some(Piece::Char(c)) => Some(c),
            _ => None,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> HanjaDeckError {
        HanjaDeckError::template(format!("{message} at position {}", self.pos))
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_whitespace();
        if self.peek_char() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn value(&mut self) -> Result<Node> {
        self.skip_whitespace();
        match self.peek() {
            Some(Piece::Slot(index)) => {
                self.pos += 1;
                Ok(Node::Text(vec![TextPart::Slot(index)]))
            }
            Some(Piece::Char('{')) => {
                self.pos += 1;
                self.mapping()
            }
            Some(Piece::Char('[')) => {
                self.pos += 1;
                let (items, _) = self.items(']')?;
                Ok(Node::Sequence(items))
            }
            Some(Piece::Char('(')) => {
                self.pos += 1;
                let (mut items, had_comma) = self.items(')')?;
                if items.len() == 1 && !had_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Node::Sequence(items))
                }
            }
            Some(Piece::Char(quote @ ('\'' | '"'))) => {
                self.pos += 1;
                self.string(quote)
            }
            Some(Piece::Char(c)) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(Piece::Char(c)) if c.is_ascii_alphabetic() => self.constant(),
            Some(Piece::Char(c)) => Err(self.error(&format!("unexpected '{c}'"))),
            None => Err(self.error("unexpected end of template")),
        }
    }

    /// Comma-separated values up to `close`. Also reports whether a comma was seen.
    fn items(&mut self, close: char) -> Result<(Vec<Node>, bool)> {
        let mut items = Vec::new();
        let mut had_comma = false;

        loop {
            self.skip_whitespace();
            if self.peek_char() == Some(close) {
                self.pos += 1;
                return Ok((items, had_comma));
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.peek_char() {
                Some(',') => {
                    self.pos += 1;
                    had_comma = true;
                }
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok((items, had_comma));
                }
                _ => return Err(self.error(&format!("expected ',' or '{close}'"))),
            }
        }
    }

    fn mapping(&mut self) -> Result<Node> {
        let mut entries = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek_char() == Some('}') {
                self.pos += 1;
                return Ok(Node::Mapping(entries));
            }

            let key = self.value()?;
            if !matches!(key, Node::Text(_)) {
                return Err(self.error("mapping keys must be scalars"));
            }
            self.expect(':')?;
            let value = self.value()?;
            entries.push((key, value));

            self.skip_whitespace();
            match self.peek_char() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    return Ok(Node::Mapping(entries));
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<Node> {
        let mut parts = Vec::new();
        let mut literal = String::new();

        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(Piece::Slot(index)) => {
                    if !literal.is_empty() {
                        parts.push(TextPart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(TextPart::Slot(index));
                }
                Some(Piece::Char(c)) if c == quote => {
                    self.pos += 1;
                    break;
                }
                Some(Piece::Char('\\')) => {
                    self.pos += 1;
                    match self.peek() {
                        Some(Piece::Char('n')) => literal.push('\n'),
                        Some(Piece::Char('t')) => literal.push('\t'),
                        Some(Piece::Char(c @ ('\\' | '\'' | '"'))) => literal.push(c),
                        Some(Piece::Char(c)) => {
                            literal.push('\\');
                            literal.push(c);
                        }
                        _ => return Err(self.error("dangling escape")),
                    }
                }
                Some(Piece::Char(c)) => literal.push(c),
            }
            self.pos += 1;
        }

        if !literal.is_empty() || parts.is_empty() {
            parts.push(TextPart::Literal(literal));
        }
        Ok(Node::Text(parts))
    }

    fn number(&mut self) -> Result<Node> {
        let start = self.pos;
        let mut text = String::new();
        if self.peek_char() == Some('-') {
            text.push('-');
            self.pos += 1;
        }
        while let Some(c) = self.peek_char().filter(|c| c.is_ascii_digit() || *c == '.') {
            text.push(c);
            self.pos += 1;
        }
        if !text.chars().any(|c| c.is_ascii_digit()) {
            self.pos = start;
            return Err(self.error("malformed number"));
        }
        Ok(Node::Text(vec![TextPart::Literal(text)]))
    }

    fn constant(&mut self) -> Result<Node> {
        let start = self.pos;
        let mut word = String::new();
        while let Some(c) = self.peek_char().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
            word.push(c);
            self.pos += 1;
        }
        match word.as_str() {
            "True" | "False" | "None" => Ok(Node::Text(vec![TextPart::Literal(word)])),
            _ => {
                self.pos = start;
                Err(self.error(&format!("unknown name '{word}'")))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Resolve slot values for one record.
///
/// An entry containing braces names a field (`{rank}` reads `rank`); other
/// entries are used as they are.
pub fn resolve_field_refs(record: &Record, field_refs: &[String]) -> Result<Vec<String>> {
    field_refs
        .iter()
        .map(|entry| {
            if entry.contains('{') && entry.contains('}') {
                let name = entry.trim_matches(|c| c == '{' || c == '}');
                record
                    .get(name)
                    .map(|value| value.render())
                    .ok_or_else(|| HanjaDeckError::missing_field(name))
            } else {
                Ok(entry.clone())
            }
        })
        .collect()
}

/// Tags string of a single record.
pub fn tags_for(
    record: &Record,
    template: &TagTemplate,
    field_refs: &[String],
    delimiter: &str,
) -> Result<String> {
    let values = resolve_field_refs(record, field_refs)?;
    let value = template.render(&values)?;
    Ok(value.paths(delimiter).join(" "))
}

/// Add a `tags` field to every record.
///
/// A record missing a referenced field is logged and left without tags. An
/// unparsable template is logged once and every record gets empty tags.
#[instrument(skip_all, fields(records = records.len(), delimiter = %delimiter))]
pub fn build_tags(
    records: Vec<Record>,
    template: &str,
    field_refs: &[String],
    delimiter: &str,
) -> Vec<Record> {
    let template = match TagTemplate::parse(template) {
        Ok(template) => Some(template),
        Err(e) => {
            warn!(error = %e, template, "invalid tag template, tags will be empty");
            None
        }
    };

    let mut missing = 0usize;
    let tagged: Vec<Record> = records
        .into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            let values = match resolve_field_refs(&record, field_refs) {
                Ok(values) => values,
                Err(e) => {
                    missing += 1;
                    warn!(record = index, error = %e, entry = ?record, "cannot build tags");
                    return record;
                }
            };

            let tags = match template.as_ref().map(|t| t.render(&values)) {
                Some(Ok(value)) => value.paths(delimiter).join(" "),
                Some(Err(e)) => {
                    warn!(record = index, error = %e, "tag template rendering failed");
                    String::new()
                }
                None => String::new(),
            };
            record.insert(TAGS_FIELD, tags);
            record
        })
        .collect();

    debug!(records = tagged.len(), missing, "tags built");
    tagged
}
