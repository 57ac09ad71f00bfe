//! Lua evaluation of the data-construction script.
//!
//! Each evaluation runs in a fresh, sandboxed interpreter: the script sees
//! the Lua standard facilities minus anything that reaches outside the
//! process (`os`, `io`, `require`, ...), and nothing of the pipeline's own
//! state. The script communicates exactly one value back by assigning the
//! global `data`; everything else it does is discarded with the scope.
//!
//! The interpreter that produced the context is kept alive inside
//! [`RenderContext`] so the context can hold callables and nested tables
//! without a lossy conversion step. It is dropped wholesale on the next
//! recompute.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use mlua::{HookTriggers, Lua, MultiValue, Value as LuaValue};

use crate::error::EvalError;

/// The global identifier the script must bind its result to.
pub const DATA_GLOBAL: &str = "data";

/// Maximum number of Lua instructions per script or template execution.
/// A script that burns through this aborts with an error instead of hanging
/// the session forever.
pub const INSTRUCTION_LIMIT: i64 = 50_000_000;

/// How often to check the instruction budget (every N instructions).
pub const INSTRUCTION_HOOK_INTERVAL: u32 = 10_000;

/// The result of evaluating a script: a live, exclusively-owned scope whose
/// `data` global is the render context for the current cycle.
#[derive(Debug)]
pub struct RenderContext {
    lua: Lua,
    output: Rc<RefCell<Vec<String>>>,
}

impl RenderContext {
    /// The value the script bound to `data`. Non-nil by construction.
    pub fn data(&self) -> mlua::Result<LuaValue> {
        self.lua.globals().get(DATA_GLOBAL)
    }

    /// Lines the script wrote via `print()`. Template execution appends here
    /// too; the buffer never reaches the host transport.
    pub fn output(&self) -> Vec<String> {
        self.output.borrow().clone()
    }

    pub(crate) fn lua(&self) -> &Lua {
        &self.lua
    }
}

/// Execute `script` in a fresh scope and capture the `data` global.
///
/// Every failure mode (load error, runtime error, missing binding) comes
/// back as an [`EvalError`] with a printable message; this function never
/// panics on user input.
pub fn evaluate(script: &str) -> Result<RenderContext, EvalError> {
    let lua = sandboxed_lua().map_err(|e| EvalError::Script(e.to_string()))?;

    // Capture print() instead of letting scripts write to the process
    // stdout, which belongs to the host transport.
    let output = Rc::new(RefCell::new(Vec::new()));
    {
        let sink = output.clone();
        let print_fn = lua
            .create_function(move |_, args: MultiValue| {
                let parts: Vec<String> =
                    args.iter().map(lua_value_to_string).collect();
                sink.borrow_mut().push(parts.join("\t"));
                Ok(())
            })
            .map_err(|e| EvalError::Script(e.to_string()))?;
        lua.globals()
            .set("print", print_fn)
            .map_err(|e| EvalError::Script(e.to_string()))?;
    }

    run_with_budget(&lua, || lua.load(script).set_name("script").exec())
        .map_err(EvalError::from_lua)?;

    let data: LuaValue = lua
        .globals()
        .get(DATA_GLOBAL)
        .map_err(EvalError::from_lua)?;
    if data.is_nil() {
        return Err(EvalError::MissingBinding);
    }

    Ok(RenderContext { lua, output })
}

/// Run `body` under the instruction budget hook, then clear the hook.
pub(crate) fn run_with_budget<T>(
    lua: &Lua,
    body: impl FnOnce() -> mlua::Result<T>,
) -> mlua::Result<T> {
    let budget = Arc::new(AtomicI64::new(INSTRUCTION_LIMIT));
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(INSTRUCTION_HOOK_INTERVAL),
        move |_lua, _debug| {
            let remaining = budget
                .fetch_sub(INSTRUCTION_HOOK_INTERVAL as i64, Ordering::Relaxed);
            if remaining <= 0 {
                return Err(mlua::Error::RuntimeError(format!(
                    "instruction budget exhausted ({} instruction limit)",
                    INSTRUCTION_LIMIT
                )));
            }
            Ok(mlua::VmState::Continue)
        },
    );
    let result = body();
    lua.remove_hook();
    result
}

/// A fresh interpreter with the outward-reaching globals removed.
/// Kept: basic, string, table, math, utf8.
fn sandboxed_lua() -> mlua::Result<Lua> {
    let lua = Lua::new();
    let globals = lua.globals();
    globals.set("os", LuaValue::Nil)?;
    globals.set("io", LuaValue::Nil)?;
    globals.set("debug", LuaValue::Nil)?;
    globals.set("package", LuaValue::Nil)?;
    globals.set("require", LuaValue::Nil)?;
    globals.set("loadfile", LuaValue::Nil)?;
    globals.set("dofile", LuaValue::Nil)?;
    globals.set("load", LuaValue::Nil)?;
    drop(globals);
    Ok(lua)
}

/// Render a Lua value the way output should read: nil is empty, numbers
/// print without a trailing `.0`, strings pass through untouched.
pub(crate) fn lua_value_to_string(value: &LuaValue) -> String {
    match value {
        LuaValue::Nil => String::new(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(n) => n.to_string(),
        LuaValue::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{:.0}", n)
            } else {
                format!("{}", n)
            }
        }
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_table_binding() {
        let ctx = evaluate(r#"data = { name = "Alice" }"#).unwrap();
        let LuaValue::Table(t) = ctx.data().unwrap() else {
            panic!("expected table");
        };
        assert_eq!(t.get::<String>("name").unwrap(), "Alice");
    }

    #[test]
    fn test_evaluate_missing_binding() {
        let err = evaluate("local x = 1 + 1").unwrap_err();
        assert!(matches!(err, EvalError::MissingBinding));
        assert!(err.to_string().contains("data"));
    }

    #[test]
    fn test_evaluate_empty_script_fails() {
        // An empty script runs fine but binds nothing.
        let err = evaluate("").unwrap_err();
        assert!(matches!(err, EvalError::MissingBinding));
    }

    #[test]
    fn test_evaluate_syntax_error() {
        let err = evaluate("data = = 1").unwrap_err();
        let msg = err.to_string();
        assert!(!msg.is_empty());
        assert!(matches!(err, EvalError::Script(_)));
    }

    #[test]
    fn test_evaluate_runtime_error() {
        let err = evaluate(r#"error("boom")"#).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_fresh_scope_per_evaluation() {
        evaluate("leak = 42; data = 1").unwrap();
        let ctx = evaluate("data = leak or 0").unwrap();
        // `leak` from the previous run is gone.
        assert!(matches!(ctx.data().unwrap(), LuaValue::Integer(0)));
    }

    #[test]
    fn test_sandbox_removes_os() {
        let err = evaluate(r#"data = os.time()"#).unwrap_err();
        assert!(matches!(err, EvalError::Script(_)));
    }

    #[test]
    fn test_print_is_captured_not_leaked() {
        let ctx = evaluate(r#"print("hello", 42); data = {}"#).unwrap();
        assert_eq!(ctx.output(), vec!["hello\t42".to_string()]);
    }

    #[test]
    fn test_context_may_hold_callables() {
        let ctx = evaluate(
            r#"data = { greet = function() return "hi" end }"#,
        )
        .unwrap();
        let LuaValue::Table(t) = ctx.data().unwrap() else {
            panic!("expected table");
        };
        let f: mlua::Function = t.get("greet").unwrap();
        assert_eq!(f.call::<String>(()).unwrap(), "hi");
    }

    #[test]
    fn test_runaway_script_aborts() {
        let err = evaluate("while true do end").unwrap_err();
        assert!(err.to_string().contains("instruction budget"));
    }

    #[test]
    fn test_scalar_binding_is_accepted() {
        // The evaluator does not type-check shape; a scalar is a valid context.
        let ctx = evaluate("data = 7").unwrap();
        assert!(matches!(ctx.data().unwrap(), LuaValue::Integer(7)));
    }
}
