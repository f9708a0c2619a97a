use std::fmt;

use crate::EvalError;

/// Operator and punctuation tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Symbol {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Tilde,
    Bang,
    Shl,
    Shr,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
}

impl Symbol {
    const fn text(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Amp => "&",
            Self::AmpAmp => "&&",
            Self::Pipe => "|",
            Self::PipePipe => "||",
            Self::Caret => "^",
            Self::Tilde => "~",
            Self::Bang => "!",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Number(i32),
    Ident(String),
    Symbol(Symbol),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Ident(name) => f.write_str(name),
            Self::Symbol(symbol) => f.write_str(symbol.text()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) offset: usize,
}

/// Splits expression text into tokens.
///
/// Numbers are decimal, `$`-prefixed hex or `0x`-prefixed hex, and must fit
/// in 32 bits; they are reinterpreted as signed. Identifiers are lowercased.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, EvalError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos];
        if ch.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let offset = pos;

        if ch.is_ascii_digit() || ch == b'$' {
            let (value, next) = lex_number(text, pos)?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                offset,
            });
            pos = next;
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == b'_' {
            let end = scan_while(bytes, pos, |b| b.is_ascii_alphanumeric() || b == b'_');
            tokens.push(Token {
                kind: TokenKind::Ident(text[pos..end].to_ascii_lowercase()),
                offset,
            });
            pos = end;
            continue;
        }

        let next = bytes.get(pos + 1).copied();
        let (symbol, width) = match (ch, next) {
            (b'&', Some(b'&')) => (Symbol::AmpAmp, 2),
            (b'|', Some(b'|')) => (Symbol::PipePipe, 2),
            (b'<', Some(b'<')) => (Symbol::Shl, 2),
            (b'>', Some(b'>')) => (Symbol::Shr, 2),
            (b'=', Some(b'=')) => (Symbol::EqEq, 2),
            (b'!', Some(b'=')) => (Symbol::NotEq, 2),
            (b'<', Some(b'=')) => (Symbol::LtEq, 2),
            (b'>', Some(b'=')) => (Symbol::GtEq, 2),
            (b'+', _) => (Symbol::Plus, 1),
            (b'-', _) => (Symbol::Minus, 1),
            (b'*', _) => (Symbol::Star, 1),
            (b'/', _) => (Symbol::Slash, 1),
            (b'%', _) => (Symbol::Percent, 1),
            (b'&', _) => (Symbol::Amp, 1),
            (b'|', _) => (Symbol::Pipe, 1),
            (b'^', _) => (Symbol::Caret, 1),
            (b'~', _) => (Symbol::Tilde, 1),
            (b'!', _) => (Symbol::Bang, 1),
            (b'<', _) => (Symbol::Lt, 1),
            (b'>', _) => (Symbol::Gt, 1),
            (b'(', _) => (Symbol::LParen, 1),
            (b')', _) => (Symbol::RParen, 1),
            (b'[', _) => (Symbol::LBracket, 1),
            (b']', _) => (Symbol::RBracket, 1),
            (b'{', _) => (Symbol::LBrace, 1),
            (b'}', _) => (Symbol::RBrace, 1),
            _ => {
                let ch = text[pos..].chars().next().unwrap_or('\u{FFFD}');
                return Err(EvalError::UnexpectedChar { ch, offset });
            }
        };
        tokens.push(Token {
            kind: TokenKind::Symbol(symbol),
            offset,
        });
        pos += width;
    }

    Ok(tokens)
}

fn scan_while(bytes: &[u8], start: usize, pred: impl Fn(u8) -> bool) -> usize {
    let mut end = start;
    while end < bytes.len() && pred(bytes[end]) {
        end += 1;
    }
    end
}

#[allow(clippy::cast_possible_wrap)]
fn lex_number(text: &str, start: usize) -> Result<(i32, usize), EvalError> {
    let bytes = text.as_bytes();
    let (digits_start, radix) = if bytes[start] == b'$' {
        (start + 1, 16)
    } else if bytes[start] == b'0' && matches!(bytes.get(start + 1), Some(b'x' | b'X')) {
        (start + 2, 16)
    } else {
        (start, 10)
    };
    let end = scan_while(bytes, digits_start, |b| b.is_ascii_alphanumeric());
    let literal = &text[start..end];
    let digits = &text[digits_start..end];
    if digits.is_empty() {
        return Err(EvalError::InvalidLiteral(literal.to_owned()));
    }
    u32::from_str_radix(digits, radix)
        .map(|value| (value as i32, end))
        .map_err(|_| EvalError::InvalidLiteral(literal.to_owned()))
}
