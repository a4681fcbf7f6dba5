use std::fmt::Write as _;
use std::rc::Rc;

use crate::token::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Grouping(Box<Expr>),
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    /// Short-circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Variable {
        name: Token,
    },
    Assign {
        name: Token,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        /// Closing parenthesis, used to locate runtime errors.
        paren: Token,
        arguments: Vec<Expr>,
    },
    Get {
        object: Box<Expr>,
        name: Token,
    },
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },
    This {
        keyword: Token,
    },
    Super {
        keyword: Token,
        method: Token,
    },
}

/// A named function or method. Shared so that function values created at
/// runtime point at the declaration instead of copying its body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expr),
    Print {
        keyword: Token,
        value: Expr,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Function(Rc<FunctionDecl>),
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Class {
        name: Token,
        /// Always an `Expr::Variable` when present.
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
    },
}

/// Renders the tree in a parenthesized prefix form, e.g. `(+ 1 (* 2 3))`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print_program(statements: &[Stmt]) -> String {
        let mut output = String::new();
        for statement in statements {
            output.push_str(&Self::print_stmt(statement));
            output.push('\n');
        }
        output
    }

    pub fn print_stmt(statement: &Stmt) -> String {
        match statement {
            Stmt::Expression(expr) => format!("(; {})", Self::print_expr(expr)),
            Stmt::Print { value, .. } => format!("(print {})", Self::print_expr(value)),
            Stmt::Var { name, initializer } => match initializer {
                Some(init) => format!("(var {} {})", name.lexeme, Self::print_expr(init)),
                None => format!("(var {})", name.lexeme),
            },
            Stmt::Block(statements) => {
                let mut output = String::from("(block");
                for inner in statements {
                    let _ = write!(output, " {}", Self::print_stmt(inner));
                }
                output.push(')');
                output
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    Self::print_expr(condition),
                    Self::print_stmt(then_branch),
                    Self::print_stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    Self::print_expr(condition),
                    Self::print_stmt(then_branch)
                ),
            },
            Stmt::While { condition, body } => format!(
                "(while {} {})",
                Self::print_expr(condition),
                Self::print_stmt(body)
            ),
            Stmt::Function(decl) => Self::print_function("fun", decl),
            Stmt::Return { value, .. } => match value {
                Some(value) => format!("(return {})", Self::print_expr(value)),
                None => "(return)".to_string(),
            },
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let mut output = format!("(class {}", name.lexeme);
                if let Some(superclass) = superclass {
                    let _ = write!(output, " < {}", Self::print_expr(superclass));
                }
                for method in methods {
                    let _ = write!(output, " {}", Self::print_function("method", method));
                }
                output.push(')');
                output
            }
        }
    }

    fn print_function(tag: &str, decl: &FunctionDecl) -> String {
        let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
        let mut output = format!("({} {}({})", tag, decl.name.lexeme, params.join(" "));
        for statement in &decl.body {
            let _ = write!(output, " {}", Self::print_stmt(statement));
        }
        output.push(')');
        output
    }

    pub fn print_expr(expr: &Expr) -> String {
        match expr {
            Expr::Literal(literal) => match literal {
                Literal::Nil => "nil".to_string(),
                Literal::Bool(b) => b.to_string(),
                Literal::Number(n) => format!("{:?}", n),
                Literal::String(s) => format!("\"{}\"", s),
            },
            Expr::Grouping(inner) => format!("(group {})", Self::print_expr(inner)),
            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, Self::print_expr(right))
            }
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                Self::print_expr(left),
                Self::print_expr(right)
            ),
            Expr::Variable { name } => name.lexeme.clone(),
            Expr::Assign { name, value } => {
                format!("(= {} {})", name.lexeme, Self::print_expr(value))
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                let mut output = format!("(call {}", Self::print_expr(callee));
                for argument in arguments {
                    let _ = write!(output, " {}", Self::print_expr(argument));
                }
                output.push(')');
                output
            }
            Expr::Get { object, name } => {
                format!("(. {} {})", Self::print_expr(object), name.lexeme)
            }
            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                Self::print_expr(object),
                name.lexeme,
                Self::print_expr(value)
            ),
            Expr::This { .. } => "this".to_string(),
            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }
}
