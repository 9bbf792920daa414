use itertools::Itertools;

use crate::domain::Language;

/// Tagged literal value tree. Test assertions are translated by rewriting
/// this structure per target language instead of pattern-matching assertion
/// text, which keeps literal translation a structural rewrite.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    None,
    List(Vec<Literal>),
    Dict(Vec<(Literal, Literal)>),
}

/// Parses one canonical literal expression. The whole input must be
/// consumed; trailing garbage is an error.
pub fn parse_literal(text: &str) -> Result<Literal, String> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos != parser.chars.len() {
        return Err(format!(
            "unexpected trailing input at offset {} in `{text}`",
            parser.pos
        ));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn parse_value(&mut self) -> Result<Literal, String> {
        self.skip_whitespace();
        match self.peek() {
            Some('[') => self.parse_list(),
            Some('{') => self.parse_dict(),
            Some('"') | Some('\'') => self.parse_string(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.parse_keyword(),
            Some(c) => Err(format!("unexpected character `{c}` at offset {}", self.pos)),
            None => Err("unexpected end of literal".to_string()),
        }
    }

    fn parse_list(&mut self) -> Result<Literal, String> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.consume(']') {
                return Ok(Literal::List(items));
            }
            if !items.is_empty() && !self.consume(',') {
                return Err(format!("expected `,` or `]` at offset {}", self.pos));
            }
            self.skip_whitespace();
            // Tolerate a trailing comma before the closing bracket.
            if self.consume(']') {
                return Ok(Literal::List(items));
            }
            items.push(self.parse_value()?);
        }
    }

    fn parse_dict(&mut self) -> Result<Literal, String> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            if self.consume('}') {
                return Ok(Literal::Dict(entries));
            }
            if !entries.is_empty() && !self.consume(',') {
                return Err(format!("expected `,` or `}}` at offset {}", self.pos));
            }
            self.skip_whitespace();
            if self.consume('}') {
                return Ok(Literal::Dict(entries));
            }
            let key = self.parse_value()?;
            self.skip_whitespace();
            if !self.consume(':') {
                return Err(format!("expected `:` after dict key at offset {}", self.pos));
            }
            let value = self.parse_value()?;
            entries.push((key, value));
        }
    }

    fn parse_string(&mut self) -> Result<Literal, String> {
        let quote = self.next().ok_or("unexpected end of literal")?;
        let mut out = String::new();
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some(other) => return Err(format!("unknown escape `\\{other}`")),
                    None => return Err("unterminated string literal".to_string()),
                },
                Some(c) if c == quote => return Ok(Literal::Str(out)),
                Some(c) => out.push(c),
                None => return Err("unterminated string literal".to_string()),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Literal, String> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => self.pos += 1,
                '.' | 'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                }
                '-' | '+' if is_float => self.pos += 1,
                _ => break,
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            text.parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| format!("invalid float literal `{text}`"))
        } else {
            text.parse::<i64>()
                .map(Literal::Int)
                .map_err(|_| format!("invalid integer literal `{text}`"))
        }
    }

    fn parse_keyword(&mut self) -> Result<Literal, String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            "None" => Ok(Literal::None),
            _ => Err(format!("unknown literal keyword `{word}`")),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        if self.consume(c) {
            Ok(())
        } else {
            Err(format!("expected `{c}` at offset {}", self.pos))
        }
    }

    fn consume(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

/// Renders a literal in the target language's literal syntax.
pub fn render_literal(value: &Literal, language: Language) -> String {
    match value {
        Literal::Int(n) => n.to_string(),
        // `{:?}` keeps the decimal point so the target parses it as a float.
        Literal::Float(x) => format!("{x:?}"),
        Literal::Bool(b) => match (language, b) {
            (Language::Python, true) => "True".to_string(),
            (Language::Python, false) => "False".to_string(),
            (Language::TypeScript, true) => "true".to_string(),
            (Language::TypeScript, false) => "false".to_string(),
        },
        Literal::Str(s) => quote(s),
        Literal::None => match language {
            Language::Python => "None".to_string(),
            Language::TypeScript => "null".to_string(),
        },
        Literal::List(items) => format!(
            "[{}]",
            items
                .iter()
                .map(|item| render_literal(item, language))
                .join(", ")
        ),
        Literal::Dict(entries) => format!(
            "{{{}}}",
            entries
                .iter()
                .map(|(key, val)| format!(
                    "{}: {}",
                    render_literal(key, language),
                    render_literal(val, language)
                ))
                .join(", ")
        ),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
