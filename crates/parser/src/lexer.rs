use crate::ParseError;
use std::fmt::Display;
use std::ops::Range;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    Ident(String),
    Int(String),
    Float(String),
    Str(String),
    Char(char),
    Keyword(&'static str),
    Punct(&'static str),
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier `{s}`"),
            Token::Int(s) | Token::Float(s) => write!(f, "number `{s}`"),
            Token::Str(_) => write!(f, "string literal"),
            Token::Char(_) => write!(f, "rune literal"),
            Token::Keyword(k) => write!(f, "`{k}`"),
            Token::Punct(";") => write!(f, "`;` or newline"),
            Token::Punct(p) => write!(f, "`{p}`"),
        }
    }
}

const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

// Longest first, so that a prefix never shadows a longer operator.
const PUNCTS: &[&str] = &[
    "&^=", "<<=", ">>=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "*", "/", "%", "&", "|",
    "^", "<", ">", "=", "!", "~", "(", ")", "[", "]", "{", "}", ",", ";", ".", ":",
];

pub type Spans = Vec<Range<usize>>;

pub fn lex(src: &str) -> Result<(Vec<Token>, Spans), ParseError> {
    let mut l = Lexer {
        src,
        pos: 0,
        tokens: Vec::new(),
        spans: Vec::new(),
    };
    l.run()?;
    Ok((l.tokens, l.spans))
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    spans: Spans,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, start: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            span: start..self.pos.max(start + 1).min(self.src.len().max(start)),
            message: message.into(),
        }
    }

    fn push(&mut self, t: Token, start: usize) {
        self.tokens.push(t);
        self.spans.push(start..self.pos);
    }

    /// Go's automatic semicolon rule: a line ending after one of these
    /// tokens terminates the statement.
    fn needs_semicolon(&self) -> bool {
        match self.tokens.last() {
            Some(
                Token::Ident(_) | Token::Int(_) | Token::Float(_) | Token::Str(_) | Token::Char(_),
            ) => true,
            Some(Token::Keyword(k)) => matches!(*k, "break" | "continue" | "fallthrough" | "return"),
            Some(Token::Punct(p)) => matches!(*p, "++" | "--" | ")" | "]" | "}"),
            _ => false,
        }
    }

    fn insert_semicolon(&mut self) {
        if self.needs_semicolon() {
            self.tokens.push(Token::Punct(";"));
            self.spans.push(self.pos..self.pos);
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                '\n' => {
                    self.insert_semicolon();
                    self.bump();
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_second() == Some('/') => {
                    while !matches!(self.peek(), Some('\n') | None) {
                        self.bump();
                    }
                }
                '/' if self.peek_second() == Some('*') => {
                    let end = self.src[self.pos + 2..]
                        .find("*/")
                        .ok_or_else(|| self.error(start, "comment not terminated"))?;
                    let body = &self.src[self.pos + 2..self.pos + 2 + end];
                    if body.contains('\n') {
                        self.insert_semicolon();
                    }
                    self.pos += end + 4;
                }
                c if c.is_alphabetic() || c == '_' => {
                    while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
                        self.bump();
                    }
                    let word = &self.src[start..self.pos];
                    let t = match KEYWORDS.iter().find(|k| **k == word) {
                        Some(k) => Token::Keyword(k),
                        None => Token::Ident(word.to_string()),
                    };
                    self.push(t, start);
                }
                c if c.is_ascii_digit()
                    || (c == '.' && matches!(self.peek_second(), Some(d) if d.is_ascii_digit())) =>
                {
                    let t = self.number();
                    self.push(t, start);
                }
                '"' => {
                    self.bump();
                    let s = self.interpreted(start, '"')?;
                    self.push(Token::Str(s), start);
                }
                '`' => {
                    self.bump();
                    let end = self.src[self.pos..]
                        .find('`')
                        .ok_or_else(|| self.error(start, "raw string literal not terminated"))?;
                    let s = self.src[self.pos..self.pos + end].replace('\r', "");
                    self.pos += end + 1;
                    self.push(Token::Str(s), start);
                }
                '\'' => {
                    self.bump();
                    let s = self.interpreted(start, '\'')?;
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => self.push(Token::Char(c), start),
                        _ => return Err(self.error(start, "rune literal must hold one character")),
                    }
                }
                _ => {
                    let rest = &self.src[self.pos..];
                    let p = PUNCTS
                        .iter()
                        .find(|p| rest.starts_with(**p))
                        .ok_or_else(|| self.error(start, format!("unexpected character `{c}`")))?;
                    self.pos += p.len();
                    self.push(Token::Punct(p), start);
                }
            }
        }
        self.insert_semicolon();
        Ok(())
    }

    fn number(&mut self) -> Token {
        let start = self.pos;
        let hex = self.src[start..].starts_with("0x") || self.src[start..].starts_with("0X");
        let mut float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                if !hex && matches!(c, 'e' | 'E') || hex && matches!(c, 'p' | 'P') {
                    float = true;
                    self.bump();
                    if matches!(self.peek(), Some('+' | '-')) {
                        self.bump();
                    }
                    continue;
                }
            } else if c == '.' {
                float = true;
            } else {
                break;
            }
            self.bump();
        }
        let s = self.src[start..self.pos].to_string();
        if float {
            Token::Float(s)
        } else {
            Token::Int(s)
        }
    }

    fn interpreted(&mut self, start: usize, quote: char) -> Result<String, ParseError> {
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error(start, "literal not terminated"));
                }
                Some(c) if c == quote => return Ok(s),
                Some('\\') => s.push(self.escape(start)?),
                Some(c) => s.push(c),
            }
        }
    }

    fn escape(&mut self, start: usize) -> Result<char, ParseError> {
        let c = self
            .bump()
            .ok_or_else(|| self.error(start, "literal not terminated"))?;
        let (radix, len) = match c {
            'a' => return Ok('\x07'),
            'b' => return Ok('\x08'),
            'f' => return Ok('\x0C'),
            'n' => return Ok('\n'),
            'r' => return Ok('\r'),
            't' => return Ok('\t'),
            'v' => return Ok('\x0B'),
            '\\' | '\'' | '"' => return Ok(c),
            '0'..='7' => {
                self.pos -= 1;
                (8, 3)
            }
            'x' => (16, 2),
            'u' => (16, 4),
            'U' => (16, 8),
            _ => return Err(self.error(start, format!("unknown escape sequence `\\{c}`"))),
        };
        let digits = self
            .src
            .get(self.pos..self.pos + len)
            .ok_or_else(|| self.error(start, "escape sequence too short"))?;
        self.pos += len;
        let v = u32::from_str_radix(digits, radix)
            .map_err(|_| self.error(start, format!("invalid escape sequence `{digits}`")))?;
        if matches!(c, '0'..='7' | 'x') && v > 0x7F {
            return Err(self.error(
                start,
                "byte escapes above 0x7f are not supported",
            ));
        }
        char::from_u32(v).ok_or_else(|| self.error(start, "invalid unicode code point"))
    }
}
