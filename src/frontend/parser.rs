use crate::error::Result;
use crate::frontend::parse_error;
use crate::frontend::tokenizer::{Lexeme, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    Greater,
}

impl BinaryOp {
    /// Operation type the lowering emits.
    pub fn op_type(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "real_div",
            BinaryOp::Less => "less",
            BinaryOp::Greater => "greater",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, BinaryOp::Less | BinaryOp::Greater)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Call {
        callee: String,
        args: Vec<Expr>,
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign { name: String, value: Expr },
    Expr(Expr),
}

/// Recursive descent parser. Precedence, lowest first: comparisons, `+ -`,
/// `* /`. All binary operators are left associative.
pub struct Parser<'t> {
    lexemes: &'t [Lexeme],
    current: usize,
}

impl<'t> Parser<'t> {
    pub fn parse(lexemes: &'t [Lexeme]) -> Result<Vec<Stmt>> {
        let mut parser = Parser {
            lexemes,
            current: 0,
        };
        parser.program()
    }

    fn program(&mut self) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();
        let mut last_start;

        loop {
            last_start = self.position();
            statements.push(self.statement()?);
            if self.is_at_end() {
                break;
            }
            self.expect(&Token::Semicolon, "expected ';' between statements")?;
            if self.is_at_end() {
                break;
            }
        }

        match statements.last() {
            Some(Stmt::Expr(_)) => Ok(statements),
            _ => Err(parse_error("program must end with an expression", last_start)),
        }
    }

    fn statement(&mut self) -> Result<Stmt> {
        if let (Some(Token::Identifier(name)), Some(Token::Equal)) =
            (self.peek(), self.peek_at(1))
        {
            let name = name.clone();
            self.current += 2;
            let value = self.expression()?;
            return Ok(Stmt::Assign { name, value });
        }
        Ok(Stmt::Expr(self.expression()?))
    }

    fn expression(&mut self) -> Result<Expr> {
        let mut expr = self.additive()?;
        const COMPARISONS: [(Token, BinaryOp); 2] = [
            (Token::Less, BinaryOp::Less),
            (Token::Greater, BinaryOp::Greater),
        ];
        while let Some(op) = self.match_op(&COMPARISONS) {
            let right = self.additive()?;
            expr = Expr::Binary(Box::new(expr), op, Box::new(right));
        }
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;
        const ADDITIVE: [(Token, BinaryOp); 2] =
            [(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)];
        while let Some(op) = self.match_op(&ADDITIVE) {
            let right = self.term()?;
            expr = Expr::Binary(Box::new(expr), op, Box::new(right));
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        const MULTIPLICATIVE: [(Token, BinaryOp); 2] =
            [(Token::Multiply, BinaryOp::Mul), (Token::Divide, BinaryOp::Div)];
        while let Some(op) = self.match_op(&MULTIPLICATIVE) {
            let right = self.primary()?;
            expr = Expr::Binary(Box::new(expr), op, Box::new(right));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        let position = self.position();
        let Some(token) = self.peek().cloned() else {
            return Err(parse_error("expected expression", position));
        };
        self.current += 1;

        match token {
            Token::Number(value) => Ok(Expr::Num(value)),
            Token::Minus => match self.peek() {
                Some(Token::Number(value)) => {
                    let value = -*value;
                    self.current += 1;
                    Ok(Expr::Num(value))
                }
                _ => Err(parse_error("'-' only negates number literals", position)),
            },
            Token::Identifier(name) => {
                if self.peek() != Some(&Token::LeftParen) {
                    return Ok(Expr::Var(name));
                }
                self.current += 1;
                let args = self.arguments()?;
                Ok(Expr::Call {
                    callee: name,
                    args,
                    position,
                })
            }
            Token::LeftParen => {
                let expr = self.expression()?;
                self.expect(&Token::RightParen, "expected ')'")?;
                Ok(expr)
            }
            _ => Err(parse_error("expected expression", position)),
        }
    }

    // Arguments after the opening parenthesis, consuming the closing one
    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RightParen) {
            self.current += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.peek() == Some(&Token::Comma) {
                self.current += 1;
                continue;
            }
            self.expect(&Token::RightParen, "expected ',' or ')' in argument list")?;
            return Ok(args);
        }
    }

    fn match_op(&mut self, candidates: &[(Token, BinaryOp)]) -> Option<BinaryOp> {
        let token = self.peek()?;
        let (_, op) = candidates.iter().find(|(candidate, _)| candidate == token)?;
        self.current += 1;
        Some(*op)
    }

    fn expect(&mut self, token: &Token, message: &str) -> Result<()> {
        if self.peek() == Some(token) {
            self.current += 1;
            Ok(())
        } else {
            Err(parse_error(message, self.position()))
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.lexemes.get(self.current + offset).map(|l| &l.token)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.lexemes.len()
    }

    // Byte offset of the current token, or just past the last one
    fn position(&self) -> usize {
        match self.lexemes.get(self.current) {
            Some(lexeme) => lexeme.position,
            None => self.lexemes.last().map_or(0, |l| l.position + 1),
        }
    }
}
