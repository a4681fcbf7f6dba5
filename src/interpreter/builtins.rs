use super::environment::{Environment, ScopeId};
use crate::value::{NativeFunction, Value};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Natives available to every program.
const NATIVES: &[NativeFunction] = &[NativeFunction {
    name: "clock",
    arity: 0,
    function: builtin_clock,
}];

/// Define every native in `scope`, normally the global scope.
pub fn install(env: &mut Environment, scope: ScopeId) {
    for native in NATIVES {
        env.define(
            scope,
            native.name,
            Value::Native(Rc::new(native.clone())),
        );
    }
}

/// Seconds since the Unix epoch, with sub-second precision.
pub fn builtin_clock(_args: &[Value]) -> Result<Value, String> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| Value::Number(elapsed.as_secs_f64()))
        .map_err(|e| format!("clock error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_positive_and_monotonic_enough() {
        match (builtin_clock(&[]), builtin_clock(&[])) {
            (Ok(Value::Number(first)), Ok(Value::Number(second))) => {
                assert!(first > 0.0);
                assert!(second >= first);
            }
            other => panic!("clock returned {:?}", other),
        }
    }

    #[test]
    fn test_install_defines_clock() {
        let mut env = Environment::new();
        let global = env.global();
        install(&mut env, global);
        match env.get(global, "clock") {
            Some(Value::Native(native)) => assert_eq!(native.arity, 0),
            other => panic!("expected native clock, got {:?}", other),
        }
    }
}
