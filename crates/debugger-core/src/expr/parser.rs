use super::lexer::{tokenize, Symbol, Token, TokenKind};
use crate::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinaryOp {
    const fn from_symbol(symbol: Symbol) -> Option<Self> {
        Some(match symbol {
            Symbol::Star => Self::Mul,
            Symbol::Slash => Self::Div,
            Symbol::Percent => Self::Rem,
            Symbol::Plus => Self::Add,
            Symbol::Minus => Self::Sub,
            Symbol::Shl => Self::Shl,
            Symbol::Shr => Self::Shr,
            Symbol::Lt => Self::Lt,
            Symbol::LtEq => Self::LtEq,
            Symbol::Gt => Self::Gt,
            Symbol::GtEq => Self::GtEq,
            Symbol::EqEq => Self::Eq,
            Symbol::NotEq => Self::NotEq,
            Symbol::Amp => Self::BitAnd,
            Symbol::Caret => Self::BitXor,
            Symbol::Pipe => Self::BitOr,
            Symbol::AmpAmp => Self::And,
            Symbol::PipePipe => Self::Or,
            Symbol::Tilde
            | Symbol::Bang
            | Symbol::LParen
            | Symbol::RParen
            | Symbol::LBracket
            | Symbol::RBracket
            | Symbol::LBrace
            | Symbol::RBrace => return None,
        })
    }

    /// Binding strength; higher binds tighter.
    const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::BitOr => 3,
            Self::BitXor => 4,
            Self::BitAnd => 5,
            Self::Eq | Self::NotEq => 6,
            Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 7,
            Self::Shl | Self::Shr => 8,
            Self::Add | Self::Sub => 9,
            Self::Mul | Self::Div | Self::Rem => 10,
        }
    }

    /// Returns `true` when the operator yields a boolean result.
    pub(crate) const fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::Lt
                | Self::LtEq
                | Self::Gt
                | Self::GtEq
                | Self::Eq
                | Self::NotEq
                | Self::And
                | Self::Or
        )
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expr {
    Number(i32),
    Ident(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `[address]`: one byte of CPU memory.
    ReadByte(Box<Expr>),
    /// `{address}`: little-endian word of CPU memory.
    ReadWord(Box<Expr>),
}

/// Parses `text` into an expression tree by precedence climbing.
pub(crate) fn parse(text: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression(0)?;
    match parser.next() {
        None => Ok(expr),
        Some(token) => Err(unexpected(&token)),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_binary(&self) -> Option<BinaryOp> {
        match self.tokens.get(self.pos)?.kind {
            TokenKind::Symbol(symbol) => BinaryOp::from_symbol(symbol),
            TokenKind::Number(_) | TokenKind::Ident(_) => None,
        }
    }

    fn expression(&mut self, min_precedence: u8) -> Result<Expr, EvalError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek_binary() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(precedence + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        let token = self.next().ok_or(EvalError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::Ident(name) => Ok(Expr::Ident(name)),
            TokenKind::Symbol(Symbol::Plus) => self.unary(),
            TokenKind::Symbol(Symbol::Minus) => {
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)))
            }
            TokenKind::Symbol(Symbol::Bang) => {
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)))
            }
            TokenKind::Symbol(Symbol::Tilde) => {
                Ok(Expr::Unary(UnaryOp::BitNot, Box::new(self.unary()?)))
            }
            TokenKind::Symbol(Symbol::LParen) => self.enclosed(Symbol::RParen),
            TokenKind::Symbol(Symbol::LBracket) => {
                Ok(Expr::ReadByte(Box::new(self.enclosed(Symbol::RBracket)?)))
            }
            TokenKind::Symbol(Symbol::LBrace) => {
                Ok(Expr::ReadWord(Box::new(self.enclosed(Symbol::RBrace)?)))
            }
            TokenKind::Symbol(_) => Err(unexpected(&token)),
        }
    }

    fn enclosed(&mut self, close: Symbol) -> Result<Expr, EvalError> {
        let inner = self.expression(0)?;
        match self.next() {
            Some(Token {
                kind: TokenKind::Symbol(symbol),
                ..
            }) if symbol == close => Ok(inner),
            Some(token) => Err(unexpected(&token)),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

fn unexpected(token: &Token) -> EvalError {
    EvalError::UnexpectedToken {
        token: token.kind.to_string(),
        offset: token.offset,
    }
}
