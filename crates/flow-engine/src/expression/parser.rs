//! Recursive-descent parser for scripts and conditions.

use serde_json::Value;

use super::ast::{AssignOp, BinaryOp, Expr, LogicalOp, PathSegment, Place, Stmt, UnaryOp};
use super::lexer::{tokenize, Token, TokenKind};
use super::{ExprError, MAX_DEPTH};

/// Parse a single expression (a DECISION condition).
///
/// Trailing separators are allowed; anything else after the expression is an
/// error.
pub fn parse_expression(source: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser::new(tokenize(source)?);
    parser.skip_separators();
    let expr = parser.expression()?;
    parser.skip_separators();
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse a sequence of statements (a SCRIPT body).
pub fn parse_script(source: &str) -> Result<Vec<Stmt>, ExprError> {
    let mut parser = Parser::new(tokenize(source)?);
    let mut statements = Vec::new();

    parser.skip_separators();
    while !parser.at(&TokenKind::Eof) {
        statements.push(parser.statement()?);
        if !parser.at(&TokenKind::Eof) && !parser.at(&TokenKind::Separator) {
            return Err(parser.unexpected("';' or newline"));
        }
        parser.skip_separators();
    }

    Ok(statements)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        // tokenize always ends with Eof and the parser never advances past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    /// Consume the next token if it is `kind`.
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &'static str) -> Result<(), ExprError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_eof(&self) -> Result<(), ExprError> {
        if self.at(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    fn unexpected(&self, expected: &'static str) -> ExprError {
        let token = self.peek();
        ExprError::UnexpectedToken {
            found: token.kind.describe(),
            expected,
            offset: token.offset,
        }
    }

    fn skip_separators(&mut self) {
        while self.eat(&TokenKind::Separator) {}
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Reject trees taller than the nesting limit. Operator chains grow the
    /// tree without recursing in the parser, so the two are checked apart.
    fn bounded(&self, expr: Expr) -> Result<Expr, ExprError> {
        if expr.height() > MAX_DEPTH {
            return Err(ExprError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(expr)
    }

    // ------------------------------------------------------------------
    // Grammar
    // ------------------------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, ExprError> {
        let offset = self.peek().offset;
        let expr = self.expression()?;

        let op = match self.peek().kind {
            TokenKind::Assign => AssignOp::Set,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Sub,
            TokenKind::StarAssign => AssignOp::Mul,
            TokenKind::SlashAssign => AssignOp::Div,
            _ => return Ok(Stmt::Expr(expr)),
        };
        self.advance();

        let target = into_place(expr, offset)?;
        let value = self.expression()?;
        Ok(Stmt::Assign { target, op, value })
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.enter()?;
        let expr = self.or();
        self.leave();
        expr
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.and()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.and()?;
            left = self.bounded(Expr::Logical(LogicalOp::Or, left.into(), right.into()))?;
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.equality()?;
            left = self.bounded(Expr::Logical(LogicalOp::And, left.into(), right.into()))?;
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::Ne,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.comparison()?;
            left = self.bounded(Expr::Binary(op, left.into(), right.into()))?;
        }
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = self.bounded(Expr::Binary(op, left.into(), right.into()))?;
        }
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = self.bounded(Expr::Binary(op, left.into(), right.into()))?;
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = self.bounded(Expr::Binary(op, left.into(), right.into()))?;
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        self.advance();

        self.enter()?;
        let operand = self.unary();
        self.leave();
        self.bounded(Expr::Unary(op, Box::new(operand?)))
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let token = self.advance();
                let TokenKind::Ident(name) = token.kind else {
                    return Err(ExprError::UnexpectedToken {
                        found: token.kind.describe(),
                        expected: "property name",
                        offset: token.offset,
                    });
                };
                expr = self.bounded(Expr::Member(Box::new(expr), name))?;
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = self.bounded(Expr::Index(Box::new(expr), Box::new(index)))?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let token = self.advance();
        let expr = match token.kind {
            TokenKind::Number(n) => Expr::Literal(number_literal(n)),
            TokenKind::Str(s) => Expr::Literal(Value::String(s)),
            TokenKind::True => Expr::Literal(Value::Bool(true)),
            TokenKind::False => Expr::Literal(Value::Bool(false)),
            TokenKind::Null => Expr::Literal(Value::Null),
            TokenKind::Ident(name) => Expr::Variable(name),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                inner
            }
            other => {
                return Err(ExprError::UnexpectedToken {
                    found: other.describe(),
                    expected: "expression",
                    offset: token.offset,
                })
            }
        };
        Ok(expr)
    }
}

/// Integral literals become JSON integers so they compare and print as such.
fn number_literal(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn into_place(expr: Expr, offset: usize) -> Result<Place, ExprError> {
    match expr {
        Expr::Variable(root) => Ok(Place {
            root,
            path: Vec::new(),
        }),
        Expr::Member(base, field) => {
            let mut place = into_place(*base, offset)?;
            place.path.push(PathSegment::Field(field));
            Ok(place)
        }
        Expr::Index(base, index) => {
            let mut place = into_place(*base, offset)?;
            place.path.push(PathSegment::Index(*index));
            Ok(place)
        }
        _ => Err(ExprError::InvalidAssignmentTarget { offset }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Variable(name.to_string()))
    }

    fn lit(value: Value) -> Box<Expr> {
        Box::new(Expr::Literal(value))
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a + 2 * 3 > 4 || !b").unwrap();
        let expected = Expr::Logical(
            LogicalOp::Or,
            Box::new(Expr::Binary(
                BinaryOp::Gt,
                Box::new(Expr::Binary(
                    BinaryOp::Add,
                    var("a"),
                    Box::new(Expr::Binary(BinaryOp::Mul, lit(json!(2)), lit(json!(3)))),
                )),
                lit(json!(4)),
            )),
            Box::new(Expr::Unary(UnaryOp::Not, var("b"))),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_left_associative() {
        let expr = parse_expression("10 - 4 - 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(BinaryOp::Sub, lit(json!(10)), lit(json!(4)))),
                lit(json!(3)),
            )
        );
    }

    #[test]
    fn test_member_and_index_chain() {
        let expr = parse_expression("responses['api-1'].items[0]").unwrap();
        assert_eq!(
            expr,
            Expr::Index(
                Box::new(Expr::Member(
                    Box::new(Expr::Index(var("responses"), lit(json!("api-1")))),
                    "items".to_string(),
                )),
                lit(json!(0)),
            )
        );
    }

    #[test]
    fn test_script_statements() {
        let statements = parse_script("\n a = 1; b.c += a\n\n total\n").unwrap();
        assert_eq!(statements.len(), 3);
        assert!(matches!(
            &statements[1],
            Stmt::Assign { target, op: AssignOp::Add, .. }
                if target.root == "b" && target.path == vec![PathSegment::Field("c".to_string())]
        ));
        assert_eq!(statements[2], Stmt::Expr(Expr::Variable("total".to_string())));
    }

    #[test]
    fn test_empty_script() {
        assert!(parse_script("  ;\n").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(
            parse_script("x = 1; a + b = 2").unwrap_err(),
            ExprError::InvalidAssignmentTarget { offset: 7 }
        );
    }

    #[test]
    fn test_missing_separator() {
        assert!(matches!(
            parse_script("a = 1 b = 2").unwrap_err(),
            ExprError::UnexpectedToken { expected: "';' or newline", offset: 6, .. }
        ));
    }

    #[test]
    fn test_condition_rejects_trailing_tokens() {
        assert!(matches!(
            parse_expression("x > 0 y").unwrap_err(),
            ExprError::UnexpectedToken { expected: "end of input", .. }
        ));
        assert!(parse_expression("x > 0;").is_ok());
        assert!(matches!(
            parse_expression("").unwrap_err(),
            ExprError::UnexpectedToken { expected: "expression", .. }
        ));
    }

    #[test]
    fn test_unclosed_paren() {
        assert!(matches!(
            parse_expression("(1 + 2").unwrap_err(),
            ExprError::UnexpectedToken { expected: "')'", .. }
        ));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(
            parse_expression(&deep).unwrap_err(),
            ExprError::TooDeep { limit: MAX_DEPTH }
        );

        let negations = format!("{}x", "!".repeat(MAX_DEPTH * 2));
        assert_eq!(
            parse_expression(&negations).unwrap_err(),
            ExprError::TooDeep { limit: MAX_DEPTH }
        );
    }

    #[test]
    fn test_long_chains_are_bounded() {
        let sum = format!("x = 1{}", " + 1".repeat(10_000));
        assert_eq!(
            parse_script(&sum).unwrap_err(),
            ExprError::TooDeep { limit: MAX_DEPTH }
        );

        let members = format!("a{}", ".b".repeat(10_000));
        assert_eq!(
            parse_expression(&members).unwrap_err(),
            ExprError::TooDeep { limit: MAX_DEPTH }
        );

        let conditions = format!("x{}", " && x".repeat(10_000));
        assert_eq!(
            parse_expression(&conditions).unwrap_err(),
            ExprError::TooDeep { limit: MAX_DEPTH }
        );

        let indexes = format!("a{}", "[0]".repeat(10_000));
        assert_eq!(
            parse_expression(&indexes).unwrap_err(),
            ExprError::TooDeep { limit: MAX_DEPTH }
        );
    }

    #[test]
    fn test_chain_at_limit_parses() {
        // 63 operators over 64 terms gives a tree of height 64
        let sum = format!("1{}", " + 1".repeat(MAX_DEPTH - 1));
        let expr = parse_expression(&sum).unwrap();
        assert_eq!(expr.height(), MAX_DEPTH);

        let over = format!("1{}", " + 1".repeat(MAX_DEPTH));
        assert!(parse_expression(&over).is_err());
    }
}
