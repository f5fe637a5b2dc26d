//! Recursive-descent parser for rule expressions.
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, equality, relational,
//! additive, multiplicative, unary, postfix (member, call, index).
//! `and`, `or` and `not` are keyword spellings of the logical operators.
//! Chains of `||` or `&&` parse into one flat node; everything else that
//! nests counts towards `MAX_DEPTH`.

use crate::ast::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
use crate::error::CompileError;
use crate::lexer::{tokenize, Token, TokenKind};

/// Parse a complete expression.
///
/// # Examples
///
/// ```rust
/// use itemfilter::ast::{ExprKind, LogicalOp};
/// use itemfilter::parser::parse;
///
/// let expr = parse("ItemLevel >= 80 and IsIdentified").unwrap();
/// assert!(matches!(expr.kind, ExprKind::Logical { op: LogicalOp::And, .. }));
/// ```
pub fn parse(source: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(CompileError::at("Syntax error: unexpected token", trailing.pos));
    }
    Ok(expr)
}

/// Deepest nesting a rule may use. The compiler and the interpreter recurse
/// once per level.
pub const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

fn keyword(token: &Token, word: &str) -> bool {
    matches!(&token.kind, TokenKind::Ident(name) if name.eq_ignore_ascii_case(word))
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof, which is never consumed.
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        let i = (self.index + offset).min(self.tokens.len() - 1);
        &self.tokens[i].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, CompileError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(CompileError::at(format!("'{}' expected", what), self.peek().pos))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, usize), CompileError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(name) => Ok((name, token.pos)),
            _ => Err(CompileError::at("Identifier expected", token.pos)),
        }
    }

    /// Count one level of nesting; restored by the caller on the way out.
    fn descend(&mut self, pos: usize) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CompileError::at("Expression nested too deeply", pos));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, CompileError> {
        let depth = self.depth;
        self.descend(self.peek().pos)?;
        let expr = self.conditional()?;
        self.depth = depth;
        Ok(expr)
    }

    fn conditional(&mut self) -> Result<Expr, CompileError> {
        let cond = self.or()?;
        if self.peek().kind != TokenKind::Question {
            return Ok(cond);
        }
        self.advance();
        let then = self.expression()?;
        self.expect(TokenKind::Colon, ":")?;
        let otherwise = self.expression()?;
        Ok(Expr {
            pos: cond.pos,
            kind: ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        })
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr {
            pos: lhs.pos,
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    fn at_logical(&self, op: LogicalOp) -> bool {
        let token = self.peek();
        match op {
            LogicalOp::Or => token.kind == TokenKind::OrOr || keyword(token, "or"),
            LogicalOp::And => token.kind == TokenKind::AndAnd || keyword(token, "and"),
        }
    }

    /// A run of operands joined by one logical operator, collected into a
    /// single flat node however long it is.
    fn logical(&mut self, op: LogicalOp, next: fn(&mut Self) -> Result<Expr, CompileError>) -> Result<Expr, CompileError> {
        let first = next(self)?;
        if !self.at_logical(op) {
            return Ok(first);
        }
        let pos = first.pos;
        let mut operands = vec![first];
        while self.at_logical(op) {
            self.advance();
            operands.push(next(self)?);
        }
        Ok(Expr {
            kind: ExprKind::Logical { op, operands },
            pos,
        })
    }

    fn or(&mut self) -> Result<Expr, CompileError> {
        self.logical(LogicalOp::Or, Self::and)
    }

    fn and(&mut self) -> Result<Expr, CompileError> {
        self.logical(LogicalOp::And, Self::equality)
    }

    /// Left-associative chain; every link is one more level of nesting.
    fn chain(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, CompileError>,
        operator: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Result<Expr, CompileError> {
        let depth = self.depth;
        let mut lhs = next(self)?;
        while let Some(op) = operator(&self.peek().kind) {
            let pos = self.advance().pos;
            self.descend(pos)?;
            let rhs = next(self)?;
            lhs = Self::binary(op, lhs, rhs);
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, CompileError> {
        self.chain(Self::relational, |kind| match kind {
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::Ne),
            _ => None,
        })
    }

    fn relational(&mut self) -> Result<Expr, CompileError> {
        self.chain(Self::additive, |kind| match kind {
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Le => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Ge => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<Expr, CompileError> {
        self.chain(Self::multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> Result<Expr, CompileError> {
        self.chain(Self::unary, |kind| match kind {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let token = self.peek();
        let pos = token.pos;
        let op = if token.kind == TokenKind::Bang || keyword(token, "not") {
            UnaryOp::Not
        } else if token.kind == TokenKind::Minus {
            UnaryOp::Neg
        } else {
            return self.postfix();
        };
        self.advance();
        let depth = self.depth;
        self.descend(pos)?;
        let operand = self.unary()?;
        self.depth = depth;

        // Negative literals stay literals.
        if op == UnaryOp::Neg {
            match operand.kind {
                ExprKind::Int(i) => return Ok(Expr { kind: ExprKind::Int(-i), pos }),
                ExprKind::Float(f) => return Ok(Expr { kind: ExprKind::Float(-f), pos }),
                _ => {}
            }
        }
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            pos,
        })
    }

    fn postfix(&mut self) -> Result<Expr, CompileError> {
        let depth = self.depth;
        let mut expr = self.primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    let pos = self.advance().pos;
                    self.descend(pos)?;
                    let (name, _) = self.expect_ident()?;
                    if self.peek().kind == TokenKind::LParen {
                        let args = self.arguments()?;
                        expr = Expr {
                            pos: expr.pos,
                            kind: ExprKind::Call {
                                target: Some(Box::new(expr)),
                                name,
                                args,
                            },
                        };
                    } else {
                        expr = Expr {
                            pos: expr.pos,
                            kind: ExprKind::Member {
                                target: Box::new(expr),
                                name,
                            },
                        };
                    }
                }
                TokenKind::LBracket => {
                    let pos = self.advance().pos;
                    self.descend(pos)?;
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket, "]")?;
                    expr = Expr {
                        pos: expr.pos,
                        kind: ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                _ => {
                    self.depth = depth;
                    return Ok(expr);
                }
            }
        }
    }

    /// `( arg, ... )`, where each argument may be a lambda `x => body`.
    fn arguments(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect(TokenKind::LParen, "(")?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.argument()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen, ")")?;
            return Ok(args);
        }
    }

    fn argument(&mut self) -> Result<Expr, CompileError> {
        let is_lambda = matches!(self.peek().kind, TokenKind::Ident(_))
            && *self.peek_kind_at(1) == TokenKind::Arrow;
        if !is_lambda {
            return self.expression();
        }
        let (param, pos) = self.expect_ident()?;
        self.advance();
        let body = self.expression()?;
        Ok(Expr {
            kind: ExprKind::Lambda {
                param,
                body: Box::new(body),
            },
            pos,
        })
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let token = self.advance();
        let pos = token.pos;
        let kind = match token.kind {
            TokenKind::Int(i) => ExprKind::Int(i),
            TokenKind::Float(f) => ExprKind::Float(f),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, ")")?;
                return Ok(inner);
            }
            TokenKind::Ident(name) => match name.as_str() {
                "true" => ExprKind::Bool(true),
                "false" => ExprKind::Bool(false),
                "new" => return self.array(pos),
                _ if self.peek().kind == TokenKind::LParen => {
                    let args = self.arguments()?;
                    ExprKind::Call {
                        target: None,
                        name,
                        args,
                    }
                }
                _ => ExprKind::Ident(name),
            },
            TokenKind::Eof => return Err(CompileError::at("Expression expected", pos)),
            _ => return Err(CompileError::at("Syntax error: unexpected token", pos)),
        };
        Ok(Expr { kind, pos })
    }

    /// `new[] { e1, e2, ... }`, with `new` already consumed.
    fn array(&mut self, pos: usize) -> Result<Expr, CompileError> {
        self.expect(TokenKind::LBracket, "[")?;
        self.expect(TokenKind::RBracket, "]")?;
        self.expect(TokenKind::LBrace, "{")?;
        let mut items = Vec::new();
        if !self.eat(&TokenKind::RBrace) {
            loop {
                items.push(self.expression()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RBrace, "}")?;
                break;
            }
        }
        Ok(Expr {
            kind: ExprKind::Array(items),
            pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let expr = parse("a || b && c").unwrap();
        match expr.kind {
            ExprKind::Logical { op: LogicalOp::Or, operands } => {
                assert_eq!(operands.len(), 2);
                assert!(matches!(operands[1].kind, ExprKind::Logical { op: LogicalOp::And, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }

        let expr = parse("1 + 2 * 3 > 6").unwrap();
        match expr.kind {
            ExprKind::Binary { op: BinaryOp::Gt, lhs, .. } => {
                assert!(matches!(lhs.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_member_chain_and_call() {
        let expr = parse("ModsInfo.ExplicitMods.Any(m => m.Name == \"X\")").unwrap();
        match expr.kind {
            ExprKind::Call { target: Some(target), name, args } => {
                assert_eq!(name, "Any");
                assert!(matches!(target.kind, ExprKind::Member { .. }));
                assert!(matches!(args[0].kind, ExprKind::Lambda { ref param, .. } if param == "m"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_free_call_and_array() {
        let expr = parse("HasMods(new[] { \"a\", \"b\" })").unwrap();
        match expr.kind {
            ExprKind::Call { target: None, args, .. } => {
                assert!(matches!(&args[0].kind, ExprKind::Array(items) if items.len() == 2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_keywords() {
        let expr = parse("not a and b or c").unwrap();
        assert!(matches!(expr.kind, ExprKind::Logical { op: LogicalOp::Or, .. }));
    }

    #[test]
    fn test_long_chains_stay_flat() {
        let text = vec!["x == 1"; 3000].join(" || ");
        match parse(&text).unwrap().kind {
            ExprKind::Logical { op: LogicalOp::Or, operands } => {
                assert_eq!(operands.len(), 3000);
                assert!(operands.iter().all(|o| matches!(o.kind, ExprKind::Binary { op: BinaryOp::Eq, .. })));
            }
            other => panic!("unexpected {:?}", other),
        }

        let text = vec!["a"; 500].join(" and ");
        match parse(&text).unwrap().kind {
            ExprKind::Logical { op: LogicalOp::And, operands } => assert_eq!(operands.len(), 500),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nesting_limit() {
        let within = format!("{}a{}", "(".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
        assert!(parse(&within).is_ok());

        let text = format!("{}a{}", "(".repeat(5000), ")".repeat(5000));
        let err = parse(&text).unwrap_err();
        assert_eq!(err.message, "Expression nested too deeply");
        assert_eq!(err.position, Some(MAX_DEPTH));

        assert!(parse(&"!".repeat(5000)).is_err());
        assert!(parse(&vec!["1"; 5000].join(" + ")).is_err());
    }

    #[test]
    fn test_conditional_and_index() {
        let expr = parse("x ? ItemStats[\"life\"] : 0").unwrap();
        match expr.kind {
            ExprKind::Conditional { then, .. } => {
                assert!(matches!(then.kind, ExprKind::Index { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_negative_literal_folds() {
        assert_eq!(parse("-5").unwrap().kind, ExprKind::Int(-5));
    }

    #[test]
    fn test_errors_carry_position() {
        let err = parse("ItemLevel >= ").unwrap_err();
        assert_eq!(err.position, Some(13));
        let err = parse("a b").unwrap_err();
        assert_eq!(err.position, Some(2));
        let err = parse("(a").unwrap_err();
        assert!(err.message.contains(")"));
    }
}
