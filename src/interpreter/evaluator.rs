use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::config::InterpreterConfig;
use crate::token::{Token, TokenKind};
use crate::value::{Class, Function, Instance, Value, INITIALIZER};
use super::builtins;
use super::control_flow::ControlFlow;
use super::environment::{Environment, ScopeId};
use super::error::RuntimeError;
use super::stack::ensure_sufficient_stack;
use indexmap::IndexMap;
use std::io::{self, Write};
use std::rc::Rc;

/// Name under which a method call frame sees its receiver.
pub const THIS: &str = "this";

/// Name under which methods of a subclass see the superclass.
pub const SUPER: &str = "super";

/// Live scope count below which no collection is attempted.
const MIN_COLLECT_THRESHOLD: usize = 256;

/// Tree-walking evaluator. Globals persist across calls to [`Interpreter::interpret`],
/// so one interpreter can serve a whole REPL session.
pub struct Interpreter {
    env: Environment,
    current: ScopeId,
    /// Scopes suspended by enclosing blocks and calls.
    active: Vec<ScopeId>,
    /// Values held across a nested evaluation (callees, arguments, assignment
    /// targets), so a collection never frees the scopes they refer to.
    temps: Vec<Value>,
    collect_threshold: usize,
    out: Box<dyn Write>,
    config: InterpreterConfig,
    call_depth: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()), InterpreterConfig::default())
    }

    pub fn with_output(out: Box<dyn Write>, config: InterpreterConfig) -> Self {
        let mut env = Environment::new();
        let global = env.global();
        builtins::install(&mut env, global);
        Self {
            env,
            current: global,
            active: Vec::new(),
            temps: Vec::new(),
            collect_threshold: MIN_COLLECT_THRESHOLD,
            out,
            config,
            call_depth: 0,
        }
    }

    /// Look a name up in the global scope.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.env.get(self.env.global(), name)
    }

    /// Execute top-level statements in order, stopping at the first runtime error.
    /// Whatever the statements before the error defined stays defined.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        tracing::debug!(statements = statements.len(), "interpreting");
        for statement in statements {
            if let Err(error) = self.execute(statement) {
                tracing::debug!(line = error.line(), %error, "runtime error");
                self.current = self.env.global();
                self.active.clear();
                self.temps.clear();
                self.call_depth = 0;
                return Err(error);
            }
        }
        Ok(())
    }

    fn execute(&mut self, statement: &Stmt) -> Result<ControlFlow, RuntimeError> {
        ensure_sufficient_stack(|| self.execute_stmt(statement))
    }

    fn execute_stmt(&mut self, statement: &Stmt) -> Result<ControlFlow, RuntimeError> {
        match statement {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(ControlFlow::Next)
            }
            Stmt::Print { keyword, value } => {
                let value = self.evaluate(value)?;
                writeln!(self.out, "{}", value)
                    .map_err(|source| RuntimeError::output(keyword.line, source))?;
                Ok(ControlFlow::Next)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.env.define(self.current, name.lexeme.clone(), value);
                Ok(ControlFlow::Next)
            }
            Stmt::Block(statements) => {
                let scope = self.env.push(self.current);
                self.execute_block(statements, scope)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(ControlFlow::Next)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let ControlFlow::Return(value) = self.execute(body)? {
                        return Ok(ControlFlow::Return(value));
                    }
                }
                Ok(ControlFlow::Next)
            }
            Stmt::Function(declaration) => {
                self.env.capture(self.current);
                let function = Function::new(Rc::clone(declaration), self.current, false);
                tracing::trace!(name = function.name(), "defined function");
                self.env.define(
                    self.current,
                    declaration.name.lexeme.clone(),
                    Value::Function(Rc::new(function)),
                );
                Ok(ControlFlow::Next)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(ControlFlow::Return(value))
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.declare_class(name, superclass.as_ref(), methods),
        }
    }

    /// Run `statements` with `scope` as the current scope. The previous scope is
    /// restored and `scope` released however the block exits.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        scope: ScopeId,
    ) -> Result<ControlFlow, RuntimeError> {
        let previous = std::mem::replace(&mut self.current, scope);
        self.active.push(previous);
        let result = self.execute_all(statements);
        self.active.pop();
        self.current = previous;
        self.env.release(scope);
        self.maybe_collect(&result);
        result
    }

    /// Reclaim captured scopes that nothing can reach any more. Runs only at
    /// block exits, where every value still in use is in a scope, in `temps`,
    /// or being returned.
    fn maybe_collect(&mut self, result: &Result<ControlFlow, RuntimeError>) {
        if self.env.live() < self.collect_threshold {
            return;
        }
        let returning = match result {
            Ok(ControlFlow::Return(value)) => Some(value),
            _ => None,
        };
        let mut roots = self.active.clone();
        roots.push(self.current);
        let freed = self.env.collect(&roots, self.temps.iter().chain(returning));
        let live = self.env.live();
        self.collect_threshold = (live * 2).max(MIN_COLLECT_THRESHOLD);
        tracing::trace!(freed, live, "collected scopes");
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<ControlFlow, RuntimeError> {
        for statement in statements {
            if let ControlFlow::Return(value) = self.execute(statement)? {
                return Ok(ControlFlow::Return(value));
            }
        }
        Ok(ControlFlow::Next)
    }

    fn declare_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        declarations: &[Rc<FunctionDecl>],
    ) -> Result<ControlFlow, RuntimeError> {
        let superclass = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let token = match expr {
                        Expr::Variable { name } => name,
                        _ => name,
                    };
                    return Err(RuntimeError::superclass_not_class(token));
                }
            },
            None => None,
        };

        // Defined first so methods can refer to their own class.
        self.env.define(self.current, name.lexeme.clone(), Value::Nil);

        let method_scope = match &superclass {
            Some(superclass) => {
                let scope = self.env.push(self.current);
                self.env.define(scope, SUPER, Value::Class(Rc::clone(superclass)));
                scope
            }
            None => self.current,
        };
        self.env.capture(method_scope);

        let methods: IndexMap<String, Rc<Function>> = declarations
            .iter()
            .map(|declaration| {
                let is_initializer = declaration.name.lexeme == INITIALIZER;
                let method = Function::new(Rc::clone(declaration), method_scope, is_initializer);
                (declaration.name.lexeme.clone(), Rc::new(method))
            })
            .collect();

        let class = Class {
            name: name.lexeme.clone(),
            superclass,
            methods,
        };
        tracing::trace!(class = ?class, "defined class");
        self.env
            .assign(self.current, &name.lexeme, Value::Class(Rc::new(class)));
        Ok(ControlFlow::Next)
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from(literal)),
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.kind {
                    TokenKind::Minus => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::operand_not_number(operator)),
                    },
                    _ => Ok(Value::Bool(!right.is_truthy())),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Self::eval_binary_op(operator, left, right)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let decided = match operator.kind {
                    TokenKind::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if decided {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expr::Variable { name } => self.lookup(name),
            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;
                if self.env.assign(self.current, &name.lexeme, value.clone()) {
                    Ok(value)
                } else {
                    Err(RuntimeError::undefined_variable(name))
                }
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;
                let arity = match &callee {
                    Value::Function(function) => function.arity(),
                    Value::Native(native) => native.arity,
                    Value::Class(class) => class.arity(),
                    _ => return Err(RuntimeError::not_callable(paren)),
                };
                if arguments.len() != arity {
                    return Err(RuntimeError::arity_mismatch(paren, arity, arguments.len()));
                }

                let base = self.temps.len();
                self.temps.push(callee);
                for argument in arguments {
                    match self.evaluate(argument) {
                        Ok(value) => self.temps.push(value),
                        Err(error) => {
                            self.temps.truncate(base);
                            return Err(error);
                        }
                    }
                }
                let mut args = self.temps.split_off(base);
                let callee = args.remove(0);
                self.call_value(callee, args, paren)
            }
            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Self::get_property(&instance, name),
                _ => Err(RuntimeError::property_on_non_instance(name)),
            },
            Expr::Set {
                object,
                name,
                value,
            } => {
                let instance = match self.evaluate(object)? {
                    Value::Instance(instance) => instance,
                    _ => return Err(RuntimeError::field_on_non_instance(name)),
                };
                self.temps.push(Value::Instance(Rc::clone(&instance)));
                let value = self.evaluate(value);
                self.temps.pop();
                let value = value?;
                instance.set_field(&name.lexeme, value.clone());
                Ok(value)
            }
            Expr::This { keyword } => self.lookup(keyword),
            Expr::Super { keyword, method } => self.eval_super(keyword, method),
        }
    }

    fn lookup(&self, name: &Token) -> Result<Value, RuntimeError> {
        self.env
            .get(self.current, &name.lexeme)
            .ok_or_else(|| RuntimeError::undefined_variable(name))
    }

    fn eval_binary_op(operator: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
        match operator.kind {
            TokenKind::EqualEqual => return Ok(Value::Bool(left == right)),
            TokenKind::BangEqual => return Ok(Value::Bool(left != right)),
            TokenKind::Plus => {
                return match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                    (Value::String(a), Value::String(b)) => {
                        let mut joined = String::with_capacity(a.len() + b.len());
                        joined.push_str(a);
                        joined.push_str(b);
                        Ok(Value::string(joined))
                    }
                    _ => Err(RuntimeError::invalid_addition(operator)),
                };
            }
            _ => {}
        }

        let (a, b) = match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ => return Err(RuntimeError::operands_not_numbers(operator)),
        };

        let value = match operator.kind {
            TokenKind::Minus => Value::Number(a - b),
            TokenKind::Star => Value::Number(a * b),
            TokenKind::Slash => Value::Number(a / b),
            TokenKind::Greater => Value::Bool(a > b),
            TokenKind::GreaterEqual => Value::Bool(a >= b),
            TokenKind::Less => Value::Bool(a < b),
            TokenKind::LessEqual => Value::Bool(a <= b),
            _ => return Err(RuntimeError::operands_not_numbers(operator)),
        };
        Ok(value)
    }

    fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(RuntimeError::stack_overflow(paren));
        }

        self.call_depth += 1;
        let result = match callee {
            Value::Function(function) => self.call_function(&function, args),
            Value::Native(native) => {
                (native.function)(&args).map_err(|message| RuntimeError::native(paren, message))
            }
            Value::Class(class) => self.instantiate(class, args),
            _ => Err(RuntimeError::not_callable(paren)),
        };
        self.call_depth -= 1;
        result
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let frame = self.env.push(function.closure);
        if let Some(receiver) = &function.receiver {
            self.env
                .define(frame, THIS, Value::Instance(Rc::clone(receiver)));
        }
        for (param, arg) in function.declaration.params.iter().zip(args) {
            self.env.define(frame, param.lexeme.clone(), arg);
        }

        let flow = self.execute_block(&function.declaration.body, frame)?;

        if function.is_initializer {
            return Ok(function
                .receiver
                .as_ref()
                .map(|receiver| Value::Instance(Rc::clone(receiver)))
                .unwrap_or(Value::Nil));
        }
        match flow {
            ControlFlow::Return(value) => Ok(value),
            ControlFlow::Next => Ok(Value::Nil),
        }
    }

    fn instantiate(&mut self, class: Rc<Class>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let instance = Rc::new(Instance::new(Rc::clone(&class)));
        if let Some(initializer) = class.find_method(INITIALIZER) {
            let bound = initializer.bind(Rc::clone(&instance));
            self.call_function(&bound, args)?;
        }
        Ok(Value::Instance(instance))
    }

    /// Fields shadow methods; methods come back bound to the instance.
    fn get_property(instance: &Rc<Instance>, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = instance.field(&name.lexeme) {
            return Ok(value);
        }
        match instance.class.find_method(&name.lexeme) {
            Some(method) => Ok(Value::Function(Rc::new(method.bind(Rc::clone(instance))))),
            None => Err(RuntimeError::undefined_property(name)),
        }
    }

    fn eval_super(&mut self, keyword: &Token, method: &Token) -> Result<Value, RuntimeError> {
        let superclass = match self.env.get(self.current, SUPER) {
            Some(Value::Class(class)) => class,
            _ => return Err(RuntimeError::undefined_variable(keyword)),
        };
        let instance = match self.env.get(self.current, THIS) {
            Some(Value::Instance(instance)) => instance,
            _ => {
                return Err(RuntimeError::UndefinedVariable {
                    name: THIS.to_string(),
                    line: keyword.line,
                })
            }
        };
        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(RuntimeError::undefined_property(method)),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
