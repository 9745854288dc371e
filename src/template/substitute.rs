use crate::orchestrator::RenderContext;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

// First `{{/if}}` closes the block, so nested blocks are not supported.
static CONDITIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{\{#if ([A-Za-z0-9_]+)\}\}(.*?)\{\{/if\}\}").expect("valid conditional pattern")
});

static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("valid variable pattern"));

/// Fill a template with values from `ctx`.
///
/// Conditional blocks are resolved first and their bodies kept as-is, so a
/// variable inside a dropped block is never looked up. Variables are replaced
/// afterwards; unknown keys stay verbatim.
pub fn substitute(template: &str, ctx: &RenderContext) -> String {
    let kept = CONDITIONAL.replace_all(template, |caps: &Captures<'_>| {
        if ctx.get(&caps[1]).is_some_and(is_truthy) {
            caps[2].to_string()
        } else {
            String::new()
        }
    });

    VARIABLE
        .replace_all(&kept, |caps: &Captures<'_>| match ctx.get(&caps[1]) {
            Some(value) => render_value(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Truthiness used by `{{#if}}`: null, false, zero, NaN and "" are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.replace('\n', "<br>"),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
