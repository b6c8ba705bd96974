//! Expression renderer for scope templates.
//!
//! Templates are plain text with `{{ ... }}` actions evaluated against the
//! generic value tree of the target object. The accepted syntax is the
//! subset of Go templates that scope templates use in practice:
//!
//! - `{{ .metadata.name }}`: dot path from the root of the object
//! - `{{ name }}`: bare path, looked up at the root first and then under `.metadata`
//! - `{{ .spec.containers.0.image }}`: numeric segments index arrays
//! - `{{ index .metadata.labels "app.kubernetes.io/name" }}`: keys that are not identifiers
//! - `{{ "literal" }}`, `{{/* comment */}}`
//! - `{{-` and `-}}` trim the whitespace next to the action
//!
//! A missing final field renders as the empty string; walking through a
//! missing value or into a scalar is an evaluation error.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors raised while compiling or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("error evaluating {expression}: {message}")]
    Evaluation { expression: String, message: String },
}

impl TemplateError {
    fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    fn evaluation(expression: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Evaluation {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}

/// Capability to render template text against an object's value tree.
pub trait ExpressionEvaluator: Send + Sync {
    /// Renders `template` with `context` as the root value.
    fn evaluate(&self, template: &str, context: &Value) -> Result<String, TemplateError>;
}

/// Evaluator for the dot-path template syntax described in the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotPathEvaluator;

impl ExpressionEvaluator for DotPathEvaluator {
    fn evaluate(&self, template: &str, context: &Value) -> Result<String, TemplateError> {
        Template::parse(template)?.render(context)
    }
}

/// A compiled template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Action(Expr),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(String),
    Path(FieldPath),
    Index { target: FieldPath, args: Vec<IndexArg> },
}

#[derive(Debug, Clone, PartialEq)]
struct FieldPath {
    rooted: bool,
    segments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum IndexArg {
    Key(String),
    Position(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
}

impl Template {
    /// Compiles template text.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Syntax` for unclosed or empty actions,
    /// malformed paths, bad string literals and unknown functions.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut offset = 0;
        let mut trim_leading = false;

        while let Some(found) = text[offset..].find("{{") {
            let open = offset + found;
            let after_open = &text[open + 2..];

            let trim_before = after_open
                .strip_prefix('-')
                .is_some_and(|rest| rest.starts_with(char::is_whitespace));
            let body_start = if trim_before { open + 3 } else { open + 2 };

            let close = find_action_end(text, body_start)
                .ok_or_else(|| TemplateError::syntax(open, "unclosed action"))?;

            let mut body = &text[body_start..close];
            let trim_after = body
                .strip_suffix('-')
                .is_some_and(|rest| rest.ends_with(char::is_whitespace));
            if trim_after {
                body = &body[..body.len() - 1];
            }

            let mut literal = &text[offset..open];
            if trim_leading {
                literal = literal.trim_start();
            }
            if trim_before {
                literal = literal.trim_end();
            }
            if !literal.is_empty() {
                segments.push(Segment::Text(literal.to_string()));
            }

            if let Some(expr) = parse_action(body.trim(), open)? {
                segments.push(Segment::Action(expr));
            }

            trim_leading = trim_after;
            offset = close + 2;
        }

        let mut tail = &text[offset..];
        if trim_leading {
            tail = tail.trim_start();
        }
        if !tail.is_empty() {
            segments.push(Segment::Text(tail.to_string()));
        }

        Ok(Self { segments })
    }

    /// Renders the template with `context` as the root value.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Evaluation` when a path walks through a
    /// missing value, into a scalar, or past the end of an array.
    pub fn render(&self, context: &Value) -> Result<String, TemplateError> {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Action(expr) => output.push_str(&expr.evaluate(context)?),
            }
        }
        Ok(output)
    }
}

/// Finds the `}}` closing the action that starts at `from`, skipping
/// anything inside string literals.
fn find_action_end(text: &str, from: usize) -> Option<usize> {
    let body = &text[from..];
    if body.trim_start().starts_with("/*") {
        let comment_end = body.find("*/")?;
        return body[comment_end..].find("}}").map(|pos| from + comment_end + pos);
    }

    let bytes = text.as_bytes();
    let mut in_string = false;
    let mut position = from;
    while position < bytes.len() {
        match bytes[position] {
            b'\\' if in_string => position += 1,
            b'"' => in_string = !in_string,
            b'}' if !in_string && bytes.get(position + 1) == Some(&b'}') => {
                return Some(position);
            }
            _ => {}
        }
        position += 1;
    }
    None
}

/// Parses the trimmed body of one action. Comments yield `None`.
fn parse_action(body: &str, offset: usize) -> Result<Option<Expr>, TemplateError> {
    if let Some(comment) = body.strip_prefix("/*") {
        if comment.ends_with("*/") {
            return Ok(None);
        }
        return Err(TemplateError::syntax(offset, "unclosed comment"));
    }

    let tokens = tokenize(body, offset)?;
    let Some((first, rest)) = tokens.split_first() else {
        return Err(TemplateError::syntax(offset, "missing value for command"));
    };

    match first {
        Token::Str(value) if rest.is_empty() => Ok(Some(Expr::Literal(value.clone()))),
        Token::Str(_) => Err(TemplateError::syntax(
            offset,
            "unexpected arguments after string literal",
        )),
        Token::Word(word) if word == "index" => parse_index(rest, offset).map(Some),
        Token::Word(word) if rest.is_empty() => parse_path(word, offset).map(|p| Some(Expr::Path(p))),
        Token::Word(word) => Err(TemplateError::syntax(
            offset,
            format!("function {word:?} not defined"),
        )),
    }
}

fn parse_index(args: &[Token], offset: usize) -> Result<Expr, TemplateError> {
    let Some((Token::Word(target), keys)) = args.split_first() else {
        return Err(TemplateError::syntax(
            offset,
            "index requires a field path as its first argument",
        ));
    };
    let target = parse_path(target, offset)?;

    let args = keys
        .iter()
        .map(|token| match token {
            Token::Str(key) => Ok(IndexArg::Key(key.clone())),
            Token::Word(word) => word.parse::<usize>().map(IndexArg::Position).map_err(|_| {
                TemplateError::syntax(offset, format!("invalid index argument {word:?}"))
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Expr::Index { target, args })
}

fn parse_path(word: &str, offset: usize) -> Result<FieldPath, TemplateError> {
    if word == "." {
        return Ok(FieldPath {
            rooted: true,
            segments: Vec::new(),
        });
    }

    let (rooted, path) = match word.strip_prefix('.') {
        Some(path) => (true, path),
        None => (false, word),
    };

    if !rooted && !path.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return Err(TemplateError::syntax(
            offset,
            format!("malformed field path {word:?}"),
        ));
    }

    let segments = path
        .split('.')
        .map(|segment| {
            let valid = !segment.is_empty()
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if valid {
                Ok(segment.to_string())
            } else {
                Err(TemplateError::syntax(
                    offset,
                    format!("malformed field path {word:?}"),
                ))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FieldPath { rooted, segments })
}

fn tokenize(body: &str, offset: usize) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some(escaped @ ('"' | '\\')) => value.push(escaped),
                        _ => return Err(TemplateError::syntax(offset, "invalid escape sequence")),
                    },
                    other => value.push(other),
                }
            }
            if !closed {
                return Err(TemplateError::syntax(offset, "unterminated quoted string"));
            }
            tokens.push(Token::Str(value));
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            word.push(c);
            chars.next();
        }
        tokens.push(Token::Word(word));
    }

    Ok(tokens)
}

impl Expr {
    fn evaluate(&self, context: &Value) -> Result<String, TemplateError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Path(path) => Ok(format_value(path.resolve(context)?)),
            Self::Index { target, args } => {
                let target_value = target.resolve(context)?.ok_or_else(|| {
                    TemplateError::evaluation(self, "index of a missing value")
                })?;
                Ok(format_value(index_into(self, target_value, args)?))
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value:?}"),
            Self::Path(path) => write!(f, "{path}"),
            Self::Index { target, args } => {
                write!(f, "index {target}")?;
                for arg in args {
                    match arg {
                        IndexArg::Key(key) => write!(f, " {key:?}")?,
                        IndexArg::Position(position) => write!(f, " {position}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl FieldPath {
    /// Resolves the path. `Ok(None)` means only the final field is absent.
    fn resolve<'a>(&self, context: &'a Value) -> Result<Option<&'a Value>, TemplateError> {
        let base = match self.segments.first() {
            Some(first) if !self.rooted && context.get(first).is_none() => context
                .get("metadata")
                .filter(|metadata| metadata.is_object())
                .unwrap_or(context),
            _ => context,
        };

        let mut current = base;
        let last = self.segments.len().saturating_sub(1);
        for (position, segment) in self.segments.iter().enumerate() {
            let next = match current {
                Value::Object(fields) => fields.get(segment),
                Value::Array(items) => {
                    let index = segment.parse::<usize>().map_err(|_| {
                        TemplateError::evaluation(
                            self,
                            format!("can't evaluate field {segment} in an array"),
                        )
                    })?;
                    Some(items.get(index).ok_or_else(|| {
                        TemplateError::evaluation(
                            self,
                            format!("index {index} out of range for array of length {}", items.len()),
                        )
                    })?)
                }
                other => {
                    return Err(TemplateError::evaluation(
                        self,
                        format!("can't evaluate field {segment} in {}", type_name(other)),
                    ));
                }
            };

            match next {
                Some(value) => current = value,
                None if position == last => return Ok(None),
                None => {
                    return Err(TemplateError::evaluation(
                        self,
                        format!("field {segment} is missing"),
                    ));
                }
            }
        }

        Ok(Some(current))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rooted {
            write!(f, ".")?;
        }
        write!(f, "{}", self.segments.join("."))
    }
}

fn index_into<'a>(
    expr: &Expr,
    target: &'a Value,
    args: &[IndexArg],
) -> Result<Option<&'a Value>, TemplateError> {
    let mut current = target;
    let last = args.len().saturating_sub(1);
    for (position, arg) in args.iter().enumerate() {
        let next = match (current, arg) {
            (Value::Object(fields), IndexArg::Key(key)) => fields.get(key),
            (Value::Array(items), IndexArg::Position(index)) => {
                Some(items.get(*index).ok_or_else(|| {
                    TemplateError::evaluation(
                        expr,
                        format!("index {index} out of range for array of length {}", items.len()),
                    )
                })?)
            }
            (other, _) => {
                return Err(TemplateError::evaluation(
                    expr,
                    format!("can't index item of type {}", type_name(other)),
                ));
            }
        };

        match next {
            Some(value) => current = value,
            None if position == last => return Ok(None),
            None => return Err(TemplateError::evaluation(expr, "index of a missing value")),
        }
    }
    Ok(Some(current))
}

fn format_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(value) => {
            let mut output = String::new();
            write_value(&mut output, value);
            output
        }
    }
}

/// Writes `value` the way Go's `fmt` prints decoded JSON: `map[a:1 b:2]`
/// with sorted keys and `[x y]` for arrays. The output never contains the
/// `,` that separates annotation pairs.
fn write_value(output: &mut String, value: &Value) {
    match value {
        Value::Null => output.push_str("<nil>"),
        Value::String(s) => output.push_str(s),
        Value::Number(n) => output.push_str(&n.to_string()),
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        Value::Array(items) => {
            output.push('[');
            for (position, item) in items.iter().enumerate() {
                if position > 0 {
                    output.push(' ');
                }
                write_value(output, item);
            }
            output.push(']');
        }
        Value::Object(fields) => {
            let mut entries: Vec<_> = fields.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            output.push_str("map[");
            for (position, (key, item)) in entries.into_iter().enumerate() {
                if position > 0 {
                    output.push(' ');
                }
                output.push_str(key);
                output.push(':');
                write_value(output, item);
            }
            output.push(']');
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "a missing value",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
