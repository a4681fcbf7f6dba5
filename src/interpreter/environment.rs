use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Index of a scope record inside an [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Represents a single scope level in the environment.
#[derive(Debug, Default)]
struct Scope {
    values: HashMap<String, Value>,
    parent: Option<ScopeId>,
    /// Set once a closure may still refer to this scope.
    captured: bool,
    free: bool,
}

/// Environment keeps every scope in one arena and links them by parent index.
///
/// Scopes never point at their children, so closures only need to remember a
/// `ScopeId`. Scopes that were never captured are recycled through a free list
/// when the block or call that created them exits. Captured scopes are
/// reclaimed by [`Environment::collect`] once no root reaches them.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
    free: Vec<ScopeId>,
}

impl Environment {
    const GLOBAL: ScopeId = ScopeId(0);

    pub fn new() -> Self {
        let mut scopes = Vec::with_capacity(16);
        scopes.push(Scope {
            captured: true,
            ..Scope::default()
        });
        Self {
            scopes,
            free: Vec::new(),
        }
    }

    /// The program-lifetime scope holding globals and natives.
    pub fn global(&self) -> ScopeId {
        Self::GLOBAL
    }

    /// Create a fresh, empty scope whose parent is `parent`.
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        if let Some(id) = self.free.pop() {
            let scope = &mut self.scopes[id.0];
            scope.parent = Some(parent);
            scope.captured = false;
            scope.free = false;
            return id;
        }
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Scope::default()
        });
        ScopeId(self.scopes.len() - 1)
    }

    /// Bind `name` in `scope`, replacing any earlier binding there.
    pub fn define(&mut self, scope: ScopeId, name: impl Into<String>, value: Value) {
        self.scopes[scope.0].values.insert(name.into(), value);
    }

    /// Get a variable, searching from `scope` outwards.
    pub fn get(&self, scope: ScopeId, name: &str) -> Option<Value> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = &self.scopes[id.0];
            if let Some(value) = scope.values.get(name) {
                return Some(value.clone());
            }
            cursor = scope.parent;
        }
        None
    }

    /// Update the nearest existing binding of `name`.
    /// Returns true if the variable was found and updated.
    pub fn assign(&mut self, scope: ScopeId, name: &str, value: Value) -> bool {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = &mut self.scopes[id.0];
            if let Some(slot) = scope.values.get_mut(name) {
                *slot = value;
                return true;
            }
            cursor = scope.parent;
        }
        false
    }

    /// Keep `scope` and all of its ancestors alive for the rest of the session.
    pub fn capture(&mut self, scope: ScopeId) {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = &mut self.scopes[id.0];
            if scope.captured {
                break;
            }
            scope.captured = true;
            cursor = scope.parent;
        }
    }

    /// Hand an exited scope back for reuse unless something captured it.
    pub fn release(&mut self, scope: ScopeId) {
        let record = &mut self.scopes[scope.0];
        if record.captured || record.free {
            return;
        }
        record.values.clear();
        record.parent = None;
        record.free = true;
        self.free.push(scope);
    }

    /// Number of scope records ever allocated, live or free.
    pub fn allocated(&self) -> usize {
        self.scopes.len()
    }

    /// Number of scope records currently in use.
    pub fn live(&self) -> usize {
        self.scopes.len() - self.free.len()
    }

    /// Free every scope not reachable from the globals, `scope_roots` or
    /// `value_roots`. Values reach scopes through function closures, bound
    /// receivers, class methods and instance fields. Returns how many scopes
    /// were freed.
    pub fn collect<'a>(
        &mut self,
        scope_roots: &[ScopeId],
        value_roots: impl IntoIterator<Item = &'a Value>,
    ) -> usize {
        let mut marked = vec![false; self.scopes.len()];
        let mut tracer = Tracer::default();
        tracer.scopes.push(Self::GLOBAL);
        tracer.scopes.extend_from_slice(scope_roots);
        tracer.values.extend(value_roots.into_iter().cloned());

        loop {
            if let Some(value) = tracer.values.pop() {
                tracer.visit(value);
            } else if let Some(id) = tracer.scopes.pop() {
                if marked[id.0] {
                    continue;
                }
                marked[id.0] = true;
                let scope = &self.scopes[id.0];
                tracer.scopes.extend(scope.parent);
                tracer.values.extend(scope.values.values().cloned());
            } else {
                break;
            }
        }

        let Self { scopes, free } = self;
        let mut freed = 0;
        for (index, scope) in scopes.iter_mut().enumerate() {
            if marked[index] || scope.free {
                continue;
            }
            scope.values.clear();
            scope.parent = None;
            scope.captured = false;
            scope.free = true;
            free.push(ScopeId(index));
            freed += 1;
        }
        freed
    }
}

/// Worklists for [`Environment::collect`]. Kept iterative so long chains of
/// instances or scopes cannot exhaust the native stack.
#[derive(Default)]
struct Tracer {
    scopes: Vec<ScopeId>,
    values: Vec<Value>,
    seen: HashSet<usize>,
}

impl Tracer {
    fn first_visit<T>(&mut self, object: &Rc<T>) -> bool {
        self.seen.insert(Rc::as_ptr(object) as *const () as usize)
    }

    fn visit(&mut self, value: Value) {
        match value {
            Value::Function(function) => {
                if self.first_visit(&function) {
                    self.scopes.push(function.closure);
                    if let Some(receiver) = &function.receiver {
                        self.values.push(Value::Instance(Rc::clone(receiver)));
                    }
                }
            }
            Value::Class(class) => {
                if self.first_visit(&class) {
                    self.values
                        .extend(class.methods.values().cloned().map(Value::Function));
                    if let Some(superclass) = &class.superclass {
                        self.values.push(Value::Class(Rc::clone(superclass)));
                    }
                }
            }
            Value::Instance(instance) => {
                if self.first_visit(&instance) {
                    self.values.push(Value::Class(Rc::clone(&instance.class)));
                    self.values.extend(instance.field_values());
                }
            }
            Value::Nil | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Native(_) => {}
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_define_get() {
        let mut env = Environment::new();
        let global = env.global();
        env.define(global, "x", Value::Number(42.0));
        assert_eq!(env.get(global, "x"), Some(Value::Number(42.0)));
        assert_eq!(env.get(global, "y"), None);
    }

    #[test]
    fn test_shadowing_in_child_scope() {
        let mut env = Environment::new();
        let global = env.global();
        env.define(global, "x", Value::Number(1.0));

        let inner = env.push(global);
        env.define(inner, "x", Value::Number(2.0));
        assert_eq!(env.get(inner, "x"), Some(Value::Number(2.0)));
        assert_eq!(env.get(global, "x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let mut env = Environment::new();
        let global = env.global();
        env.define(global, "x", Value::Number(1.0));

        let inner = env.push(global);
        assert!(env.assign(inner, "x", Value::Number(2.0)));
        env.release(inner);
        assert_eq!(env.get(global, "x"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_assign_never_creates_binding() {
        let mut env = Environment::new();
        let global = env.global();
        assert!(!env.assign(global, "missing", Value::Nil));
        assert_eq!(env.get(global, "missing"), None);
    }

    #[test]
    fn test_released_scopes_are_reused() {
        let mut env = Environment::new();
        let global = env.global();
        for _ in 0..100 {
            let scope = env.push(global);
            env.define(scope, "i", Value::Nil);
            env.release(scope);
        }
        assert_eq!(env.allocated(), 2);
    }

    #[test]
    fn test_captured_scopes_survive_release() {
        let mut env = Environment::new();
        let global = env.global();
        let outer = env.push(global);
        let inner = env.push(outer);
        env.define(outer, "count", Value::Number(0.0));
        env.capture(inner);

        env.release(inner);
        env.release(outer);
        assert_eq!(env.get(inner, "count"), Some(Value::Number(0.0)));

        let fresh = env.push(global);
        assert_ne!(fresh, outer);
        assert_ne!(fresh, inner);
    }

    #[test]
    fn test_global_is_never_recycled() {
        let mut env = Environment::new();
        let global = env.global();
        env.define(global, "keep", Value::Bool(true));
        env.release(global);
        assert_eq!(env.get(global, "keep"), Some(Value::Bool(true)));
    }

    fn closure_over(env: &mut Environment, scope: ScopeId) -> Value {
        use crate::ast::FunctionDecl;
        use crate::token::{Token, TokenKind};
        use crate::value::Function;

        env.capture(scope);
        let declaration = Rc::new(FunctionDecl {
            name: Token::new(TokenKind::Identifier, "f", 1),
            params: Vec::new(),
            body: Vec::new(),
        });
        Value::Function(Rc::new(Function::new(declaration, scope, false)))
    }

    #[test]
    fn test_collect_frees_unreachable_captured_scopes() {
        let mut env = Environment::new();
        let global = env.global();
        for _ in 0..50 {
            let frame = env.push(global);
            let closure = closure_over(&mut env, frame);
            env.define(frame, "f", closure);
            env.release(frame);
        }
        assert_eq!(env.live(), 51);

        assert_eq!(env.collect(&[], Vec::<&Value>::new()), 50);
        assert_eq!(env.live(), 1);

        let reused = env.push(global);
        assert!(reused != global);
        assert_eq!(env.allocated(), 51);
    }

    #[test]
    fn test_collect_keeps_scopes_reachable_from_roots() {
        let mut env = Environment::new();
        let global = env.global();

        let outer = env.push(global);
        env.define(outer, "n", Value::Number(1.0));
        let inner = env.push(outer);
        let kept = closure_over(&mut env, inner);
        env.release(inner);
        env.release(outer);

        let stored = env.push(global);
        let stored_closure = closure_over(&mut env, stored);
        env.define(global, "g", stored_closure);

        let active = env.push(global);
        env.define(active, "local", Value::Bool(true));

        assert_eq!(env.collect(&[active], [&kept]), 0);
        assert_eq!(env.get(inner, "n"), Some(Value::Number(1.0)));
        assert_eq!(env.get(active, "local"), Some(Value::Bool(true)));

        env.define(global, "g", Value::Nil);
        assert_eq!(env.collect(&[active], [&kept]), 1);
        assert_eq!(env.collect(&[], Vec::<&Value>::new()), 3);
        assert_eq!(env.live(), 1);
    }
}
