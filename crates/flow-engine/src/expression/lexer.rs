//! Tokenizer for the expression language.

use std::iter::Peekable;
use std::str::CharIndices;

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals and names
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    BangEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    // Assignment
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,

    /// `;` or a newline outside brackets
    Separator,
    Eof,
}

impl TokenKind {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        let text = match self {
            TokenKind::Number(n) => return format!("number {}", n),
            TokenKind::Str(s) => return format!("string '{}'", s),
            TokenKind::Ident(name) => return format!("'{}'", name),
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Dot => ".",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::Separator => return "end of statement".to_string(),
            TokenKind::Eof => return "end of input".to_string(),
        };
        format!("'{}'", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the source
    pub offset: usize,
}

/// Split source text into tokens, ending with `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    /// Open parentheses/brackets; newlines inside them are whitespace
    bracket_depth: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            bracket_depth: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ExprError> {
        while let Some((offset, ch)) = self.chars.next() {
            let kind = match ch {
                '\n' if self.bracket_depth == 0 => TokenKind::Separator,
                ';' => TokenKind::Separator,
                c if c.is_whitespace() => continue,
                '/' if self.eat('/') => {
                    self.skip_line();
                    continue;
                }
                '0'..='9' => self.number(offset)?,
                '"' | '\'' => self.string(ch, offset)?,
                c if is_ident_start(c) => self.ident(offset),
                '(' => self.open(TokenKind::LParen),
                '[' => self.open(TokenKind::LBracket),
                ')' => self.close(TokenKind::RParen),
                ']' => self.close(TokenKind::RBracket),
                '.' => TokenKind::Dot,
                '%' => TokenKind::Percent,
                '+' => self.with_assign(TokenKind::Plus, TokenKind::PlusAssign),
                '-' => self.with_assign(TokenKind::Minus, TokenKind::MinusAssign),
                '*' => self.with_assign(TokenKind::Star, TokenKind::StarAssign),
                '/' => self.with_assign(TokenKind::Slash, TokenKind::SlashAssign),
                '=' if self.eat('=') => {
                    self.eat('=');
                    TokenKind::EqEq
                }
                '=' => TokenKind::Assign,
                '!' if self.eat('=') => {
                    self.eat('=');
                    TokenKind::BangEq
                }
                '!' => TokenKind::Bang,
                '<' if self.eat('=') => TokenKind::Le,
                '<' => TokenKind::Lt,
                '>' if self.eat('=') => TokenKind::Ge,
                '>' => TokenKind::Gt,
                '&' if self.eat('&') => TokenKind::AndAnd,
                '|' if self.eat('|') => TokenKind::OrOr,
                other => return Err(ExprError::UnexpectedChar { ch: other, offset }),
            };
            self.tokens.push(Token { kind, offset });
        }

        self.tokens.push(Token {
            kind: TokenKind::Eof,
            offset: self.source.len(),
        });
        Ok(self.tokens)
    }

    /// Consume the next character if it equals `expected`.
    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn with_assign(&mut self, plain: TokenKind, compound: TokenKind) -> TokenKind {
        if self.eat('=') {
            compound
        } else {
            plain
        }
    }

    fn open(&mut self, kind: TokenKind) -> TokenKind {
        self.bracket_depth += 1;
        kind
    }

    fn close(&mut self, kind: TokenKind) -> TokenKind {
        self.bracket_depth = self.bracket_depth.saturating_sub(1);
        kind
    }

    fn skip_line(&mut self) {
        while self.chars.next_if(|&(_, c)| c != '\n').is_some() {}
    }

    fn number(&mut self, start: usize) -> Result<TokenKind, ExprError> {
        let mut end = start + 1;
        while let Some((i, c)) = self.chars.next_if(|&(_, c)| c.is_ascii_digit()) {
            end = i + c.len_utf8();
        }

        // Fraction only when a digit follows the dot, so `items.0` style
        // access never swallows the member dot of a following identifier.
        let mut lookahead = self.chars.clone();
        if let (Some((_, '.')), Some((_, d))) = (lookahead.next(), lookahead.next()) {
            if d.is_ascii_digit() {
                self.chars.next();
                while let Some((i, c)) = self.chars.next_if(|&(_, c)| c.is_ascii_digit()) {
                    end = i + c.len_utf8();
                }
            }
        }

        let text = &self.source[start..end];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| ExprError::InvalidNumber {
                text: text.to_string(),
                offset: start,
            })
    }

    fn string(&mut self, quote: char, start: usize) -> Result<TokenKind, ExprError> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => return Err(ExprError::UnterminatedString { offset: start }),
                Some((_, c)) if c == quote => return Ok(TokenKind::Str(value)),
                Some((_, '\\')) => match self.chars.next() {
                    None => return Err(ExprError::UnterminatedString { offset: start }),
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, other)) => value.push(other),
                },
                Some((_, c)) => value.push(c),
            }
        }
    }

    fn ident(&mut self, start: usize) -> TokenKind {
        let mut end = start + 1;
        while let Some((i, c)) = self.chars.next_if(|&(_, c)| is_ident_continue(c)) {
            end = i + c.len_utf8();
        }

        match &self.source[start..end] {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            name => TokenKind::Ident(name.to_string()),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}
