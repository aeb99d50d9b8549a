//! Static reader for `setup.py`.
//!
//! The build script is never executed. Instead the source is tokenized and
//! the keyword arguments of the `setup(...)` call (`version_config=`,
//! `setuptools_git_versioning=`, `name=`) are parsed as Python literals.
//! Keywords of any other call, or default values of a `def`, are ignored.
//! A bare name is resolved against module-level `NAME = <literal>`
//! assignments, which covers the common
//!
//! ```python
//! config = {"enabled": True}
//! setup(name="pkg", setuptools_git_versioning=config)
//! ```
//!
//! layout. Anything that is not a literal is kept as
//! [`RawValue::Unparsable`] so that the resolver can reject it with a proper
//! error once it knows the value is actually used.

use std::collections::HashMap;

use super::RawValue;

/// Function whose keyword arguments carry the configuration, called either
/// bare or as `setuptools.setup`.
const SETUP_FUNCTION: &str = "setup";

/// Name lookups allowed while converting one keyword value.
const MAX_NAME_LOOKUPS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
enum TokKind {
    Ident(String),
    Number(String),
    Str { value: String, literal: bool },
    Op(String),
    Newline,
}

#[derive(Debug, Clone)]
struct Tok {
    kind: TokKind,
    /// First token of a logical line with no indentation.
    module_level: bool,
}

/// A Python literal as written in the build script.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PyValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PyValue>),
    Tuple(Vec<PyValue>),
    Dict(Vec<(PyValue, PyValue)>),
    Name(String),
}

/// Keyword arguments and module-level literal bindings of a build script.
#[derive(Debug, Default)]
pub(crate) struct SetupScript {
    keywords: HashMap<String, Result<PyValue, String>>,
    bindings: HashMap<String, PyValue>,
}

impl SetupScript {
    /// Parse `source`, recording the first occurrence of every keyword
    /// argument passed to `setup()`.
    ///
    /// Fails only when the source cannot be tokenized (e.g. an unterminated
    /// string).
    pub fn parse(source: &str) -> Result<Self, String> {
        let tokens = tokenize(source)?;
        let depths = bracket_depths(&tokens);
        let calls = enclosing_calls(&tokens);
        let mut script = Self::default();

        let mut i = 0;
        while i < tokens.len() {
            let TokKind::Ident(name) = &tokens[i].kind else {
                i += 1;
                continue;
            };
            if !matches!(tokens.get(i + 1), Some(Tok { kind: TokKind::Op(op), .. }) if op == "=")
            {
                i += 1;
                continue;
            }

            let value_start = i + 2;
            if depths[i] > 0 {
                if calls[i] == Some(SETUP_FUNCTION) {
                    let mut parser = LiteralParser::new(&tokens, value_start);
                    let value = parser.parse_argument();
                    script.keywords.entry(name.clone()).or_insert(value);
                }
                i = skip_expression(&tokens, value_start);
            } else if tokens[i].module_level {
                let mut parser = LiteralParser::new(&tokens, value_start);
                if let Ok(value) = parser.parse_statement() {
                    script.bindings.insert(name.clone(), value);
                }
                i = skip_statement(&tokens, value_start);
            } else {
                i = value_start;
            }
        }

        Ok(script)
    }

    /// Value of keyword argument `name`, or `None` when it is not passed.
    pub fn keyword(&self, name: &str) -> Option<RawValue> {
        let value = self.keywords.get(name)?;
        Some(match value {
            Ok(value) => self.to_raw(value),
            Err(reason) => RawValue::Unparsable(reason.clone()),
        })
    }

    /// The `name=` keyword when it is a plain string.
    pub fn package_name(&self) -> Option<String> {
        match self.resolve(self.keywords.get("name")?.as_ref().ok()?) {
            Ok(PyValue::Str(name)) => Some(name.clone()),
            _ => None,
        }
    }

    fn to_raw<'s>(&'s self, value: &'s PyValue) -> RawValue {
        match self.resolve(value) {
            Ok(PyValue::None) => RawValue::Null,
            Ok(_) => match self.to_toml(value, &mut Expansion::default()) {
                Ok(value) => RawValue::Literal(value),
                Err(reason) => RawValue::Unparsable(reason),
            },
            Err(reason) => RawValue::Unparsable(reason),
        }
    }

    /// Follow a chain of names to the literal it ends in.
    fn resolve<'s>(&'s self, mut value: &'s PyValue) -> Result<&'s PyValue, String> {
        let mut seen: Vec<&str> = Vec::new();
        while let PyValue::Name(name) = value {
            if seen.contains(&name.as_str()) {
                return Err(format!("`{name}` refers to itself"));
            }
            seen.push(name);
            value = self
                .bindings
                .get(name)
                .ok_or_else(|| format!("`{name}` is not bound to a literal"))?;
        }
        Ok(value)
    }

    fn to_toml<'s>(
        &'s self,
        value: &'s PyValue,
        expansion: &mut Expansion<'s>,
    ) -> Result<toml::Value, String> {
        let outer = expansion.active.len();
        let mut value = value;
        while let PyValue::Name(name) = value {
            if expansion.active.contains(&name.as_str()) {
                return Err(format!("`{name}` refers to itself"));
            }
            expansion.lookups += 1;
            if expansion.lookups > MAX_NAME_LOOKUPS {
                return Err(format!("more than {MAX_NAME_LOOKUPS} name lookups"));
            }
            expansion.active.push(name);
            value = self
                .bindings
                .get(name)
                .ok_or_else(|| format!("`{name}` is not bound to a literal"))?;
        }

        let converted = match value {
            PyValue::None => Err("`None` is only allowed as an option value".to_string()),
            PyValue::Bool(b) => Ok(toml::Value::Boolean(*b)),
            PyValue::Int(n) => Ok(toml::Value::Integer(*n)),
            PyValue::Float(f) => Ok(toml::Value::Float(*f)),
            PyValue::Str(s) => Ok(toml::Value::String(s.clone())),
            PyValue::List(items) | PyValue::Tuple(items) => items
                .iter()
                .map(|item| self.to_toml(item, expansion))
                .collect::<Result<Vec<_>, _>>()
                .map(toml::Value::Array),
            PyValue::Dict(pairs) => self.dict_to_toml(pairs, expansion),
            PyValue::Name(name) => Err(format!("`{name}` is not bound to a literal")),
        };
        expansion.active.truncate(outer);
        converted
    }

    fn dict_to_toml<'s>(
        &'s self,
        pairs: &'s [(PyValue, PyValue)],
        expansion: &mut Expansion<'s>,
    ) -> Result<toml::Value, String> {
        let mut table = toml::Table::new();
        for (key, value) in pairs {
            let PyValue::Str(key) = self.resolve(key)? else {
                return Err("dict keys must be strings".to_string());
            };
            // `None` options fall back to their defaults.
            if *self.resolve(value)? == PyValue::None {
                continue;
            }
            table.insert(key.clone(), self.to_toml(value, expansion)?);
        }
        Ok(toml::Value::Table(table))
    }
}

/// Names being expanded while converting one value, outermost first.
#[derive(Debug, Default)]
struct Expansion<'s> {
    active: Vec<&'s str>,
    lookups: usize,
}

struct LiteralParser<'a> {
    tokens: &'a [Tok],
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(tokens: &'a [Tok], pos: usize) -> Self {
        Self { tokens, pos }
    }

    fn peek(&self) -> Option<&'a TokKind> {
        self.tokens.get(self.pos).map(|tok| &tok.kind)
    }

    fn next(&mut self) -> Option<&'a TokKind> {
        let kind = self.peek();
        self.pos += 1;
        kind
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(TokKind::Op(o)) if o == op)
    }

    /// A keyword argument value: a literal followed by `,` or `)`.
    fn parse_argument(&mut self) -> Result<PyValue, String> {
        let value = self.parse_value()?;
        if self.at_op(",") || self.at_op(")") {
            Ok(value)
        } else {
            Err(self.not_literal())
        }
    }

    /// The right-hand side of a module-level assignment.
    fn parse_statement(&mut self) -> Result<PyValue, String> {
        let value = self.parse_value()?;
        match self.peek() {
            None | Some(TokKind::Newline) => Ok(value),
            Some(TokKind::Op(op)) if op == ";" => Ok(value),
            _ => Err(self.not_literal()),
        }
    }

    fn not_literal(&self) -> String {
        match self.peek() {
            Some(TokKind::Ident(name)) => format!("expected a literal, found `{name}`"),
            Some(TokKind::Op(op)) => format!("expected a literal, found `{op}`"),
            _ => "expected a literal".to_string(),
        }
    }

    fn parse_value(&mut self) -> Result<PyValue, String> {
        let value = match self.next() {
            Some(TokKind::Ident(name)) => match name.as_str() {
                "True" => PyValue::Bool(true),
                "False" => PyValue::Bool(false),
                "None" => PyValue::None,
                _ => PyValue::Name(name.clone()),
            },
            Some(TokKind::Str { value, literal }) => {
                if !literal {
                    return Err("formatted and bytes strings are not supported".to_string());
                }
                let mut joined = value.clone();
                // Implicit concatenation of adjacent string literals.
                while let Some(TokKind::Str { value, literal: true }) = self.peek() {
                    joined.push_str(value);
                    self.pos += 1;
                }
                PyValue::Str(joined)
            }
            Some(TokKind::Number(text)) => parse_number(text)?,
            Some(TokKind::Op(op)) => match op.as_str() {
                "-" | "+" => {
                    let negate = op == "-";
                    match self.parse_value()? {
                        PyValue::Int(n) if negate => PyValue::Int(-n),
                        PyValue::Float(f) if negate => PyValue::Float(-f),
                        value @ (PyValue::Int(_) | PyValue::Float(_)) => value,
                        _ => return Err("unary sign on a non-number".to_string()),
                    }
                }
                "[" => PyValue::List(self.parse_sequence("]")?.0),
                "(" => {
                    let (items, trailing_comma) = self.parse_sequence(")")?;
                    if items.len() == 1 && !trailing_comma {
                        items.into_iter().next().unwrap_or(PyValue::None)
                    } else {
                        PyValue::Tuple(items)
                    }
                }
                "{" => self.parse_dict()?,
                other => return Err(format!("expected a literal, found `{other}`")),
            },
            Some(TokKind::Newline) | None => return Err("missing value".to_string()),
        };

        // Calls, attribute access and subscripts are expressions, not literals.
        if let PyValue::Name(name) = &value
            && (self.at_op("(") || self.at_op(".") || self.at_op("["))
        {
            return Err(format!("`{name}` is not a literal"));
        }
        Ok(value)
    }

    fn parse_sequence(&mut self, close: &str) -> Result<(Vec<PyValue>, bool), String> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.at_op(close) {
                self.pos += 1;
                return Ok((items, trailing_comma));
            }
            items.push(self.parse_value()?);
            trailing_comma = false;
            if self.at_op(",") {
                self.pos += 1;
                trailing_comma = true;
            } else if !self.at_op(close) {
                return Err(self.not_literal());
            }
        }
    }

    fn parse_dict(&mut self) -> Result<PyValue, String> {
        let mut pairs = Vec::new();
        loop {
            if self.at_op("}") {
                self.pos += 1;
                return Ok(PyValue::Dict(pairs));
            }
            let key = self.parse_value()?;
            if !self.at_op(":") {
                return Err("sets are not supported, expected `key: value`".to_string());
            }
            self.pos += 1;
            let value = self.parse_value()?;
            pairs.push((key, value));
            if self.at_op(",") {
                self.pos += 1;
            } else if !self.at_op("}") {
                return Err(self.not_literal());
            }
        }
    }
}

fn parse_number(text: &str) -> Result<PyValue, String> {
    let clean = text.replace('_', "");
    let lower = clean.to_ascii_lowercase();
    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return i64::from_str_radix(&lower[2..], radix)
            .map(PyValue::Int)
            .map_err(|e| format!("invalid number `{text}`: {e}"));
    }
    if let Ok(n) = lower.parse::<i64>() {
        return Ok(PyValue::Int(n));
    }
    lower
        .parse::<f64>()
        .map(PyValue::Float)
        .map_err(|_| format!("unsupported number `{text}`"))
}

/// Index of the token that ends the expression starting at `start`: the
/// first `,` or closing bracket at the starting depth.
fn skip_expression(tokens: &[Tok], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < tokens.len() {
        if let TokKind::Op(op) = &tokens[i].kind {
            match op.as_str() {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" if depth == 0 => return i,
                ")" | "]" | "}" => depth -= 1,
                "," if depth == 0 => return i,
                _ => {}
            }
        }
        i += 1;
    }
    i
}

/// Index of the newline that ends the module-level statement at `start`.
fn skip_statement(tokens: &[Tok], start: usize) -> usize {
    tokens[start..]
        .iter()
        .position(|tok| tok.kind == TokKind::Newline)
        .map_or(tokens.len(), |offset| start + offset)
}

/// Bracket depth in effect at every token.
fn bracket_depths(tokens: &[Tok]) -> Vec<usize> {
    let mut depth = 0usize;
    tokens
        .iter()
        .map(|tok| {
            let current = depth;
            if let TokKind::Op(op) = &tok.kind {
                match op.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            current
        })
        .collect()
}

/// For every token, the name of the function whose call parentheses
/// directly enclose it. `None` at module level, inside `[]`/`{}`, inside
/// parentheses that are not a call, and inside a `def` parameter list.
fn enclosing_calls(tokens: &[Tok]) -> Vec<Option<&str>> {
    let mut open: Vec<Option<&str>> = Vec::new();
    tokens
        .iter()
        .enumerate()
        .map(|(i, tok)| {
            let current = open.last().copied().flatten();
            if let TokKind::Op(op) = &tok.kind {
                match op.as_str() {
                    "(" => open.push(callee(tokens, i)),
                    "[" | "{" => open.push(None),
                    ")" | "]" | "}" => {
                        open.pop();
                    }
                    _ => {}
                }
            }
            current
        })
        .collect()
}

/// Name called by the `(` at `paren`: the last segment of `a.b.name(`.
fn callee(tokens: &[Tok], paren: usize) -> Option<&str> {
    let TokKind::Ident(name) = &tokens.get(paren.checked_sub(1)?)?.kind else {
        return None;
    };
    let defined = paren >= 2
        && matches!(
            &tokens[paren - 2].kind,
            TokKind::Ident(keyword) if keyword == "def" || keyword == "class"
        );
    (!defined).then_some(name.as_str())
}

fn is_string_prefix(ident: &str) -> bool {
    ident.len() <= 2
        && !ident.is_empty()
        && ident
            .chars()
            .all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'b' | 'u' | 'f'))
}

fn tokenize(source: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut line = 1usize;
    let mut line_start = true;
    let mut indented = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            line += 1;
            if depth == 0 && !matches!(tokens.last(), None | Some(Tok { kind: TokKind::Newline, .. }))
            {
                tokens.push(Tok {
                    kind: TokKind::Newline,
                    module_level: false,
                });
            }
            line_start = true;
            indented = false;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            if line_start {
                indented = true;
            }
            i += 1;
            continue;
        }
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '\\' && chars.get(i + 1) == Some(&'\n') {
            line += 1;
            i += 2;
            continue;
        }

        let module_level = line_start && !indented && depth == 0;
        line_start = false;

        let kind = if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            if is_string_prefix(&ident) && matches!(chars.get(i), Some('"' | '\'')) {
                let prefix = ident.to_ascii_lowercase();
                let (value, consumed, newlines) =
                    scan_string(&chars[i..], prefix.contains('r')).map_err(|e| format!("line {line}: {e}"))?;
                i += consumed;
                line += newlines;
                let literal = !prefix.contains('b') && !(prefix.contains('f') && value.contains('{'));
                TokKind::Str { value, literal }
            } else {
                TokKind::Ident(ident)
            }
        } else if c == '"' || c == '\'' {
            let (value, consumed, newlines) =
                scan_string(&chars[i..], false).map_err(|e| format!("line {line}: {e}"))?;
            i += consumed;
            line += newlines;
            TokKind::Str {
                value,
                literal: true,
            }
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric()
                    || chars[i] == '_'
                    || chars[i] == '.'
                    || ((chars[i] == '-' || chars[i] == '+')
                        && matches!(chars[i - 1], 'e' | 'E')
                        && !chars[start..i].iter().any(|c| matches!(c, 'x' | 'X'))))
            {
                i += 1;
            }
            TokKind::Number(chars[start..i].iter().collect())
        } else {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            let compound = "=!<>+-*/%&|^@:".contains(c) && chars.get(i + 1) == Some(&'=');
            if compound {
                i += 2;
                TokKind::Op(format!("{c}="))
            } else {
                i += 1;
                TokKind::Op(c.to_string())
            }
        };

        tokens.push(Tok { kind, module_level });
    }

    Ok(tokens)
}

/// Scan a quoted string starting at `chars[0]`. Returns the decoded value,
/// the number of chars consumed and the number of newlines crossed.
fn scan_string(chars: &[char], raw: bool) -> Result<(String, usize, usize), String> {
    let quote = chars[0];
    let triple = chars.len() >= 3 && chars[1] == quote && chars[2] == quote;
    let mut i = if triple { 3 } else { 1 };
    let mut value = String::new();
    let mut newlines = 0;

    loop {
        let Some(&c) = chars.get(i) else {
            return Err("unterminated string literal".to_string());
        };
        if c == quote {
            if !triple {
                return Ok((value, i + 1, newlines));
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Ok((value, i + 3, newlines));
            }
        }
        if c == '\n' {
            if !triple {
                return Err("unterminated string literal".to_string());
            }
            newlines += 1;
        }
        if c == '\\' {
            let Some(&escaped) = chars.get(i + 1) else {
                return Err("unterminated string literal".to_string());
            };
            if escaped == '\n' {
                newlines += 1;
                if raw {
                    value.push('\\');
                    value.push('\n');
                }
                i += 2;
                continue;
            }
            if raw {
                value.push('\\');
                value.push(escaped);
            } else {
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' | '\'' | '"' => value.push(escaped),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            }
            i += 2;
            continue;
        }
        value.push(c);
        i += 1;
    }
}
