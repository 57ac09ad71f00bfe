//! EJS-tag template engine.
//!
//! The tag grammar is the frozen surface:
//!
//! - `<%= expr %>` escaped output
//! - `<%- expr %>` raw output
//! - `<% code %>`  statement block (control flow)
//! - `<%# ... %>`  comment, emits nothing
//! - `include(name[, data])` renders a named partial, optionally against
//!   override data
//!
//! A template compiles to a Lua chunk that appends segments to an output
//! buffer; the chunk executes inside the interpreter that produced the
//! render context, so context callables and nested tables work unmodified.
//! Name lookup in the chunk goes template-assigned names → context fields →
//! script globals; a reference that resolves nowhere raises an error naming
//! the identifier, which is surfaced verbatim as the render failure.

use std::collections::HashMap;
use std::rc::Rc;

use mlua::{Lua, Table, Value as LuaValue};

use crate::error::RenderError;
use crate::evaluator::{lua_value_to_string, run_with_budget, RenderContext};

/// Includes nested deeper than this fail rather than recurse forever.
const MAX_INCLUDE_DEPTH: usize = 16;

/// Stateless renderer apart from its registry of named partials.
#[derive(Default)]
pub struct TemplateEngine {
    partials: Rc<HashMap<String, String>>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named partial. Must happen before rendering; the engine is
    /// immutable during a render pass.
    pub fn add_partial(&mut self, name: &str, template: &str) {
        Rc::make_mut(&mut self.partials).insert(name.to_string(), template.to_string());
    }

    /// Expand `template` against `ctx`. Pure function of its inputs: the
    /// same pair always yields the same output or the same failure.
    pub fn render(&self, template: &str, ctx: &RenderContext) -> Result<String, RenderError> {
        let source = compile(template)?;
        let lua = ctx.lua();
        let data = ctx.data().map_err(RenderError::from_lua)?;
        let depth = Rc::new(std::cell::Cell::new(0usize));
        run_with_budget(lua, || {
            render_chunk(lua, &source, &data, &self.partials, &depth)
        })
        .map_err(RenderError::from_lua)
    }
}

/// Execute one compiled chunk against a fresh environment. Re-entered by
/// `include()` for partials, which is why the registry and depth counter
/// travel alongside the data value.
fn render_chunk(
    lua: &Lua,
    chunk_source: &str,
    data: &LuaValue,
    partials: &Rc<HashMap<String, String>>,
    depth: &Rc<std::cell::Cell<usize>>,
) -> mlua::Result<String> {
    let env = build_env(lua, data, partials, depth)?;
    lua.load(chunk_source)
        .set_name("template")
        .set_environment(env)
        .eval::<String>()
}

/// Environment for a template chunk: helper functions plus a lookup chain
/// over context fields and script globals.
fn build_env(
    lua: &Lua,
    data: &LuaValue,
    partials: &Rc<HashMap<String, String>>,
    depth: &Rc<std::cell::Cell<usize>>,
) -> mlua::Result<Table> {
    let env = lua.create_table()?;

    let escape_fn = lua.create_function(|_, value: LuaValue| {
        Ok(escape_html(&lua_value_to_string(&value)))
    })?;
    env.set("__escape", escape_fn)?;

    let text_fn =
        lua.create_function(|_, value: LuaValue| Ok(lua_value_to_string(&value)))?;
    env.set("__text", text_fn)?;

    {
        let partials = partials.clone();
        let depth = depth.clone();
        let outer_data = data.clone();
        let include_fn = lua.create_function(
            move |lua, (name, override_data): (String, Option<Table>)| {
                let fragment = partials.get(&name).ok_or_else(|| {
                    mlua::Error::RuntimeError(format!("include: unknown partial '{}'", name))
                })?;
                if depth.get() >= MAX_INCLUDE_DEPTH {
                    return Err(mlua::Error::RuntimeError(format!(
                        "include: depth limit ({}) exceeded at '{}'",
                        MAX_INCLUDE_DEPTH, name
                    )));
                }
                let source = compile(fragment).map_err(|e| {
                    mlua::Error::RuntimeError(format!("include '{}': {}", name, e))
                })?;
                let data = match override_data {
                    Some(t) => LuaValue::Table(t),
                    None => outer_data.clone(),
                };
                depth.set(depth.get() + 1);
                let result = render_chunk(lua, &source, &data, &partials, &depth);
                depth.set(depth.get() - 1);
                result
            },
        )?;
        env.set("include", include_fn)?;
    }

    // Missing-key chain: context field, then script global, then a hard
    // error naming the identifier (the EJS "x is not defined" contract).
    let meta = lua.create_table()?;
    {
        let data = data.clone();
        let index_fn = lua.create_function(
            move |lua, (_env, key): (Table, LuaValue)| {
                if let LuaValue::Table(fields) = &data {
                    let found: LuaValue = fields.get(key.clone())?;
                    if !found.is_nil() {
                        return Ok(found);
                    }
                }
                let global: LuaValue = lua.globals().raw_get(key.clone())?;
                if !global.is_nil() {
                    return Ok(global);
                }
                Err(mlua::Error::RuntimeError(format!(
                    "'{}' is not defined",
                    key_name(&key)
                )))
            },
        )?;
        meta.set("__index", index_fn)?;
    }
    env.set_metatable(Some(meta));

    Ok(env)
}

fn key_name(key: &LuaValue) -> String {
    match key {
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        other => lua_value_to_string(other),
    }
}

/// Escape the EJS set: `& < > " '`.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// =============================================================================
// Compiler: template text -> Lua chunk source
// =============================================================================

/// Translate the tag stream into a Lua chunk. Text and output tags become
/// buffer appends; code blocks pass through verbatim so they can open and
/// close control structures around the appends.
fn compile(template: &str) -> Result<String, RenderError> {
    let mut code = String::with_capacity(template.len() + 64);
    code.push_str("local __out, __n = {}, 0\n");

    let mut rest = template;
    let mut consumed = 0usize;
    while let Some(open) = rest.find("<%") {
        if open > 0 {
            push_text(&mut code, &rest[..open]);
        }
        let after_open = &rest[open + 2..];
        let (kind, body_start) = match after_open.as_bytes().first() {
            Some(b'=') => (TagKind::Escaped, 1),
            Some(b'-') => (TagKind::Raw, 1),
            Some(b'#') => (TagKind::Comment, 1),
            _ => (TagKind::Code, 0),
        };
        let body_rest = &after_open[body_start..];
        let close = body_rest.find("%>").ok_or_else(|| {
            RenderError::Compile(format!(
                "unclosed `<%` tag on line {}",
                line_of(template, consumed + open)
            ))
        })?;
        let body = &body_rest[..close];
        match kind {
            TagKind::Escaped => {
                code.push_str("__n = __n + 1; __out[__n] = __escape((");
                code.push_str(body);
                code.push_str("))\n");
            }
            TagKind::Raw => {
                code.push_str("__n = __n + 1; __out[__n] = __text((");
                code.push_str(body);
                code.push_str("))\n");
            }
            TagKind::Code => {
                code.push_str(body);
                code.push('\n');
            }
            TagKind::Comment => {}
        }
        let advance = open + 2 + body_start + close + 2;
        consumed += advance;
        rest = &rest[advance..];
    }
    if !rest.is_empty() {
        push_text(&mut code, rest);
    }

    code.push_str("return table.concat(__out)\n");
    Ok(code)
}

enum TagKind {
    Escaped,
    Raw,
    Code,
    Comment,
}

fn push_text(code: &mut String, text: &str) {
    code.push_str("__n = __n + 1; __out[__n] = ");
    code.push_str(&lua_quote(text));
    code.push('\n');
}

/// Quote arbitrary text as a Lua string literal.
fn lua_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\{}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;

    fn render_with(script: &str, template: &str) -> Result<String, RenderError> {
        let ctx = evaluate(script).expect("script must evaluate");
        TemplateEngine::new().render(template, &ctx)
    }

    #[test]
    fn test_escaped_output() {
        let html = render_with(r#"data = { name = "Alice" }"#, "<%= name %>").unwrap();
        assert_eq!(html, "Alice");
    }

    #[test]
    fn test_escaped_output_escapes_html() {
        let html = render_with(
            r#"data = { snippet = "<b>\"bold\" & 'loud'</b>" }"#,
            "<%= snippet %>",
        )
        .unwrap();
        assert_eq!(html, "&lt;b&gt;&#34;bold&#34; &amp; &#39;loud&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_raw_output_does_not_escape() {
        let html = render_with(r#"data = { markup = "<em>hi</em>" }"#, "<%- markup %>").unwrap();
        assert_eq!(html, "<em>hi</em>");
    }

    #[test]
    fn test_comment_emits_nothing() {
        let html = render_with("data = {}", "a<%# anything, even <%= tags %>b").unwrap();
        assert_eq!(html, "ab");
    }

    #[test]
    fn test_code_block_loop() {
        let html = render_with(
            r#"data = { items = { "x", "y", "z" } }"#,
            "<% for _, item in ipairs(items) do %><li><%= item %></li><% end %>",
        )
        .unwrap();
        assert_eq!(html, "<li>x</li><li>y</li><li>z</li>");
    }

    #[test]
    fn test_code_block_conditional() {
        let template = "<% if age >= 30 then %>senior<% else %>junior<% end %>";
        assert_eq!(render_with("data = { age = 31 }", template).unwrap(), "senior");
        assert_eq!(render_with("data = { age = 20 }", template).unwrap(), "junior");
    }

    #[test]
    fn test_undefined_reference_names_identifier() {
        let err = render_with("data = {}", "<%= nickname %>").unwrap_err();
        assert!(err.to_string().contains("'nickname' is not defined"), "{}", err);
    }

    #[test]
    fn test_loop_over_missing_sequence_fails() {
        let err = render_with(
            r#"data = { title = "t" }"#,
            "<% for _, u in ipairs(users) do %><%= u %><% end %>",
        )
        .unwrap_err();
        assert!(err.to_string().contains("'users' is not defined"), "{}", err);
    }

    #[test]
    fn test_nil_valued_field_renders_empty() {
        // A present-but-nil expression is empty output, not an error.
        let html = render_with(r#"data = { user = { name = nil } }"#, "[<%= user.name %>]").unwrap();
        assert_eq!(html, "[]");
    }

    #[test]
    fn test_context_callable_invoked_from_template() {
        let html = render_with(
            r#"data = { greet = function() return "hi there" end }"#,
            "<%= greet() %>",
        )
        .unwrap();
        assert_eq!(html, "hi there");
    }

    #[test]
    fn test_script_global_visible_to_template() {
        let html = render_with(
            r#"
            function shout(s) return string.upper(s) end
            data = { word = "quiet" }
            "#,
            "<%= shout(word) %>",
        )
        .unwrap();
        assert_eq!(html, "QUIET");
    }

    #[test]
    fn test_template_assignment_shadows_context() {
        let html = render_with(
            r#"data = { n = 1 }"#,
            "<% n = 2 %><%= n %>",
        )
        .unwrap();
        assert_eq!(html, "2");
    }

    #[test]
    fn test_unclosed_tag_is_compile_error() {
        let err = render_with("data = {}", "before\n<%= name").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unclosed"), "{}", msg);
        assert!(msg.contains("line 2"), "{}", msg);
    }

    #[test]
    fn test_bad_embedded_code_is_compile_error() {
        let err = render_with("data = {}", "<% if then %>x<% end %>").unwrap_err();
        assert!(matches!(err, RenderError::Compile(_)));
    }

    #[test]
    fn test_include_inherits_context() {
        let mut engine = TemplateEngine::new();
        engine.add_partial("badge", "<span><%= name %></span>");
        let ctx = evaluate(r#"data = { name = "Bob" }"#).unwrap();
        let html = engine.render("<%- include('badge') %>", &ctx).unwrap();
        assert_eq!(html, "<span>Bob</span>");
    }

    #[test]
    fn test_include_with_data_override() {
        let mut engine = TemplateEngine::new();
        engine.add_partial("badge", "<span><%= name %></span>");
        let ctx = evaluate(r#"data = { name = "Bob" }"#).unwrap();
        let html = engine
            .render("<%- include('badge', { name = 'Carol' }) %>", &ctx)
            .unwrap();
        assert_eq!(html, "<span>Carol</span>");
    }

    #[test]
    fn test_include_unknown_partial_fails() {
        let ctx = evaluate("data = {}").unwrap();
        let err = TemplateEngine::new()
            .render("<%- include('missing') %>", &ctx)
            .unwrap_err();
        assert!(err.to_string().contains("unknown partial 'missing'"), "{}", err);
    }

    #[test]
    fn test_include_depth_capped() {
        let mut engine = TemplateEngine::new();
        engine.add_partial("loop", "<%- include('loop') %>");
        let ctx = evaluate("data = {}").unwrap();
        let err = engine.render("<%- include('loop') %>", &ctx).unwrap_err();
        assert!(err.to_string().contains("depth limit"), "{}", err);
    }

    #[test]
    fn test_plain_text_passthrough() {
        let html = render_with("data = {}", "no tags\nat \"all\"\t<div></div>").unwrap();
        assert_eq!(html, "no tags\nat \"all\"\t<div></div>");
    }

    #[test]
    fn test_number_formatting() {
        let html = render_with(
            "data = { whole = 30.0, frac = 2.5, count = 3 }",
            "<%= whole %>/<%= frac %>/<%= count %>",
        )
        .unwrap();
        assert_eq!(html, "30/2.5/3");
    }

    #[test]
    fn test_render_is_deterministic() {
        let script = r#"data = { users = { { name = "A" }, { name = "B" } } }"#;
        let template = "<% for _, u in ipairs(users) do %><%= u.name %>;<% end %>";
        let first = render_with(script, template).unwrap();
        let second = render_with(script, template).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "A;B;");
    }
}
