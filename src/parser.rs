//! Recursive-descent parser for declarations/statements, Pratt-style
//! precedence climbing for expressions.

use crate::ast::{BinOp, Decl, Expr, FunDecl, Literal, Param, Program, Stmt, Type, UnOp};
use crate::error::{CompileError, DiagKind, Diagnostic};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

pub struct Parser {
    lexer: Lexer,
    pub has_error: bool,
    diagnostics: Vec<Diagnostic>,
}

/// An infix operator recognized by the Pratt loop, with its binding powers.
enum Infix {
    Assign,
    Bin(BinOp),
}

fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8, Infix)> {
    use TokenKind::*;
    Some(match kind {
        Equal => (2, 1, Infix::Assign),
        Or => (3, 4, Infix::Bin(BinOp::Or)),
        And => (5, 6, Infix::Bin(BinOp::And)),
        EqualEqual => (7, 8, Infix::Bin(BinOp::Eq)),
        BangEqual => (7, 8, Infix::Bin(BinOp::Ne)),
        Less => (9, 10, Infix::Bin(BinOp::Lt)),
        LessEqual => (9, 10, Infix::Bin(BinOp::Le)),
        Greater => (9, 10, Infix::Bin(BinOp::Gt)),
        GreaterEqual => (9, 10, Infix::Bin(BinOp::Ge)),
        Plus => (11, 12, Infix::Bin(BinOp::Add)),
        Minus => (11, 12, Infix::Bin(BinOp::Sub)),
        Star => (13, 14, Infix::Bin(BinOp::Mul)),
        Slash => (13, 14, Infix::Bin(BinOp::Div)),
        _ => return None,
    })
}

const PREFIX_BP: u8 = 15;
const POSTFIX_CALL_BP: u8 = 16;

impl Parser {
    pub fn new(source: &str) -> Self {
        Parser {
            lexer: Lexer::new(source),
            has_error: false,
            diagnostics: Vec::new(),
        }
    }

    pub fn parse(&mut self) -> Result<Program, CompileError> {
        let mut program = Program::new();
        while self.peek_kind() != TokenKind::Eof {
            match self.parse_fun_decl() {
                Some(fun) => program.funs.push(fun),
                None => self.synchronize(),
            }
        }
        if self.has_error || self.lexer.has_error {
            Err(CompileError::new(self.diagnostics.clone()))
        } else {
            Ok(program)
        }
    }

    // ---- token helpers -----------------------------------------------

    fn peek(&mut self) -> Token {
        self.lexer.peek()
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.lexer.peek().kind
    }

    fn advance(&mut self) -> Token {
        self.lexer.next()
    }

    fn check(&mut self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn match_tok(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_at(&mut self, line: usize, message: impl Into<String>) {
        self.has_error = true;
        self.diagnostics
            .push(Diagnostic::new(DiagKind::Parse, line, message));
    }

    fn consume(&mut self, kind: TokenKind, context: &str) -> Option<Token> {
        let tok = self.peek();
        if tok.kind == kind {
            Some(self.advance())
        } else {
            self.error_at(
                tok.line,
                format!(
                    "expect {} got {} ({})",
                    kind.describe(),
                    tok.text(),
                    context
                ),
            );
            None
        }
    }

    fn consume_ident(&mut self, context: &str) -> Option<Token> {
        let tok = self.peek();
        if tok.kind == TokenKind::Ident {
            Some(self.advance())
        } else {
            self.error_at(
                tok.line,
                format!("expect identifier got {} ({})", tok.text(), context),
            );
            None
        }
    }

    /// Consume tokens until `{` or EOF, then resume at top-level parsing.
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::LBrace => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ---- declarations ---------------------------------------------------

    fn parse_type(&mut self) -> Option<Type> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Int => {
                self.advance();
                Some(Type::Int)
            }
            TokenKind::Void => {
                self.advance();
                Some(Type::Void)
            }
            _ => {
                self.error_at(tok.line, format!("expect type got {}", tok.text()));
                None
            }
        }
    }

    fn parse_param(&mut self) -> Option<Param> {
        let ty = self.parse_type()?;
        let name_tok = self.consume_ident("parameter name")?;
        Some(Param {
            ty,
            name: name_tok.text().to_string(),
            line: name_tok.line,
        })
    }

    fn parse_fun_decl(&mut self) -> Option<FunDecl> {
        let ret_ty = self.parse_type()?;
        let name_tok = self.consume_ident("function name")?;
        self.consume(TokenKind::LParen, "after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if !self.match_tok(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "after parameter list")?;
        self.consume(TokenKind::LBrace, "to start function body")?;
        let body = self.parse_block_contents()?;
        Some(FunDecl {
            ret_ty,
            name: name_tok.text().to_string(),
            params,
            body,
            line: name_tok.line,
        })
    }

    /// Parse declarations up to (and consuming) the closing `}`.
    fn parse_block_contents(&mut self) -> Option<Vec<Decl>> {
        let mut decls = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            decls.push(self.parse_decl()?);
        }
        self.consume(TokenKind::RBrace, "to close block")?;
        Some(decls)
    }

    fn parse_decl(&mut self) -> Option<Decl> {
        if self.check(TokenKind::Int) || self.check(TokenKind::Void) {
            self.parse_var_decl()
        } else {
            Some(Decl::Stmt(self.parse_stmt()?))
        }
    }

    fn parse_var_decl(&mut self) -> Option<Decl> {
        let ty = self.parse_type()?;
        let name_tok = self.consume_ident("variable name")?;
        let init = if self.match_tok(TokenKind::Equal) {
            Some(self.parse_expr(1)?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "after variable declaration")?;
        Some(Decl::Var {
            ty,
            name: name_tok.text().to_string(),
            init,
            line: name_tok.line,
        })
    }

    // ---- statements -------------------------------------------------------

    fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.peek_kind() {
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Print => self.parse_print_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::LBrace => {
                self.advance();
                Some(Stmt::Block(self.parse_block_contents()?))
            }
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_if_stmt(&mut self) -> Option<Stmt> {
        let line = self.advance().line; // 'if'
        self.consume(TokenKind::LParen, "after 'if'")?;
        let cond = self.parse_expr(1)?;
        self.consume(TokenKind::RParen, "after if condition")?;
        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.match_tok(TokenKind::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Some(Stmt::If {
            cond,
            then_branch,
            else_branch,
            line,
        })
    }

    fn parse_while_stmt(&mut self) -> Option<Stmt> {
        let line = self.advance().line; // 'while'
        self.consume(TokenKind::LParen, "after 'while'")?;
        let cond = self.parse_expr(1)?;
        self.consume(TokenKind::RParen, "after while condition")?;
        let body = Box::new(self.parse_stmt()?);
        Some(Stmt::While { cond, body, line })
    }

    fn parse_print_stmt(&mut self) -> Option<Stmt> {
        let line = self.advance().line; // 'print'
        self.consume(TokenKind::LParen, "after 'print'")?;
        let expr = self.parse_expr(1)?;
        self.consume(TokenKind::RParen, "after print argument")?;
        self.consume(TokenKind::Semicolon, "after print statement")?;
        Some(Stmt::Print { expr, line })
    }

    /// `return;` and `return <expr>;` are mutually exclusive: a bare
    /// semicolon right after `return` means no value, anything else is
    /// parsed as the returned expression.
    fn parse_return_stmt(&mut self) -> Option<Stmt> {
        let line = self.advance().line; // 'return'
        let expr = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr(1)?)
        };
        self.consume(TokenKind::Semicolon, "after return statement")?;
        Some(Stmt::Return { expr, line })
    }

    fn parse_expr_stmt(&mut self) -> Option<Stmt> {
        let expr = self.parse_expr(1)?;
        self.consume(TokenKind::Semicolon, "after expression statement")?;
        Some(Stmt::Expr(expr))
    }

    // ---- expressions (Pratt precedence climbing) ---------------------------

    fn parse_expr(&mut self, min_bp: u8) -> Option<Expr> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let tok = self.peek();

            if tok.kind == TokenKind::LParen {
                if POSTFIX_CALL_BP < min_bp {
                    break;
                }
                lhs = self.parse_call(lhs)?;
                continue;
            }

            let (left_bp, right_bp, op) = match infix_binding_power(tok.kind) {
                Some(x) => x,
                None => break,
            };
            if left_bp < min_bp {
                break;
            }
            self.advance();

            match op {
                Infix::Assign => {
                    let target = match lhs {
                        Expr::Literal {
                            lit: Literal::Ident(name),
                            ..
                        } => name,
                        _ => {
                            self.error_at(tok.line, "invalid assignment target");
                            return None;
                        }
                    };
                    let value = Box::new(self.parse_expr(right_bp)?);
                    lhs = Expr::Assign {
                        target,
                        value,
                        line: tok.line,
                        ty: None,
                    };
                }
                Infix::Bin(bin_op) => {
                    let right = Box::new(self.parse_expr(right_bp)?);
                    lhs = Expr::Binary {
                        op: bin_op,
                        left: Box::new(lhs),
                        right,
                        line: tok.line,
                        ty: None,
                    };
                }
            }
        }

        Some(lhs)
    }

    fn parse_call(&mut self, callee: Expr) -> Option<Expr> {
        let callee_name = match callee {
            Expr::Literal {
                lit: Literal::Ident(name),
                line,
                ..
            } => (name, line),
            _ => {
                let line = callee.line();
                self.error_at(line, "can only call a function name");
                return None;
            }
        };
        let (name, line) = callee_name;
        self.advance(); // '('
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr(1)?);
                if !self.match_tok(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "after call arguments")?;
        Some(Expr::Call {
            callee: name,
            args,
            line,
            ty: None,
        })
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::IntLit => {
                self.advance();
                let text = tok.text();
                let value: i64 = text.parse().ok().or_else(|| {
                    self.error_at(tok.line, format!("invalid integer literal '{}'", text));
                    None
                })?;
                Some(Expr::Literal {
                    lit: Literal::Int(value),
                    line: tok.line,
                    ty: None,
                })
            }
            TokenKind::Ident => {
                self.advance();
                Some(Expr::Literal {
                    lit: Literal::Ident(tok.text().to_string()),
                    line: tok.line,
                    ty: None,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = Box::new(self.parse_expr(1)?);
                self.consume(TokenKind::RParen, "after grouped expression")?;
                Some(Expr::Grouping { inner, ty: None })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = Box::new(self.parse_expr(PREFIX_BP)?);
                Some(Expr::Unary {
                    op: UnOp::Neg,
                    operand,
                    line: tok.line,
                    ty: None,
                })
            }
            TokenKind::Bang => {
                self.advance();
                let operand = Box::new(self.parse_expr(PREFIX_BP)?);
                Some(Expr::Unary {
                    op: UnOp::Not,
                    operand,
                    line: tok.line,
                    ty: None,
                })
            }
            _ => {
                self.error_at(
                    tok.line,
                    format!("expect expression got {}", tok.text()),
                );
                None
            }
        }
    }
}
