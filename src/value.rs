use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{FunctionDecl, Literal};
use crate::interpreter::environment::ScopeId;

/// Name the initializer method must have.
pub const INITIALIZER: &str = "init";

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Function(Rc<Function>),
    Native(Rc<NativeFunction>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(left_bool), Value::Bool(right_bool)) => left_bool == right_bool,
            (Value::Number(left_num), Value::Number(right_num)) => left_num == right_num,
            (Value::String(left_str), Value::String(right_str)) => left_str == right_str,
            (Value::Function(left_fn), Value::Function(right_fn)) => Rc::ptr_eq(left_fn, right_fn),
            (Value::Native(left_fn), Value::Native(right_fn)) => Rc::ptr_eq(left_fn, right_fn),
            (Value::Class(left_class), Value::Class(right_class)) => {
                Rc::ptr_eq(left_class, right_class)
            }
            (Value::Instance(left_obj), Value::Instance(right_obj)) => {
                Rc::ptr_eq(left_obj, right_obj)
            }
            _ => false,
        }
    }
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::String(Rc::from(text.as_ref()))
    }

    /// `nil` and `false` are falsy; everything else, `0` and `""` included, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Nil => false,
            _ => true,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Nil => Value::Nil,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::String(Rc::clone(s)),
        }
    }
}

/// Plain decimals between 1e-3 and 1e7, scientific notation outside that
/// range (`1.0E7`, `1.2345E-5`).
fn format_number(number: f64) -> String {
    if number.is_infinite() {
        return if number > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = number.abs();
    if number.is_nan() || magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        // f64's Display already drops the fractional part of integral values.
        return number.to_string();
    }

    let scientific = format!("{:e}", number);
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => {
            format!("{}E{}", mantissa, exponent)
        }
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => scientific,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Function(function) => write!(f, "<fn {}>", function.name()),
            Value::Native(_) => write!(f, "<native fn>"),
            Value::Class(class) => f.write_str(&class.name),
            Value::Instance(instance) => write!(f, "{} instance", instance.class.name),
        }
    }
}

/// A user-defined function or method together with the scope it closes over.
/// Methods retrieved from an instance carry that instance as their receiver,
/// which becomes `this` in every call frame.
#[derive(Debug)]
pub struct Function {
    pub declaration: Rc<FunctionDecl>,
    pub closure: ScopeId,
    pub is_initializer: bool,
    pub receiver: Option<Rc<Instance>>,
}

impl Function {
    pub fn new(declaration: Rc<FunctionDecl>, closure: ScopeId, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
            receiver: None,
        }
    }

    /// A copy of this method bound to `instance`.
    pub fn bind(&self, instance: Rc<Instance>) -> Function {
        Function {
            declaration: Rc::clone(&self.declaration),
            closure: self.closure,
            is_initializer: self.is_initializer,
            receiver: Some(instance),
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }
}

pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub function: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    pub methods: IndexMap<String, Rc<Function>>,
}

impl Class {
    /// Looks the method up on this class, then along the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        match self.methods.get(name) {
            Some(method) => Some(Rc::clone(method)),
            None => self
                .superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name)),
        }
    }

    /// A class is called with the arguments of its initializer, if it has one.
    pub fn arity(&self) -> usize {
        self.find_method(INITIALIZER)
            .map(|initializer| initializer.arity())
            .unwrap_or(0)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|s| s.name.as_str()))
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    fields: RefCell<IndexMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(IndexMap::new()),
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.borrow().keys().cloned().collect()
    }

    pub fn field_values(&self) -> Vec<Value> {
        self.fields.borrow().values().cloned().collect()
    }
}

// Fields may point back at the instance, so only the class name is shown.
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .field("fields", &self.field_names())
            .finish()
    }
}
