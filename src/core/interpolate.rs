//! # Variable Interpolation / 变量插值
//!
//! Textual substitution of `${{ matrix.<key> }}` placeholders with an entry's
//! bindings. Runs before any command is executed; an unknown key is a
//! configuration error.
//!
//! 使用条目的绑定对 `${{ matrix.<key> }}` 占位符进行文本替换。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::matrix::Bindings;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{\{\s*([^{}]*?)\s*\}\}").expect("placeholder pattern is a valid regex")
});

const OPEN: &str = "${{";

/// Replaces every placeholder in `template` with its bound value.
///
/// # Errors
/// - [`ConfigError::UnsupportedPlaceholder`] for expressions other than `matrix.<key>`
/// - [`ConfigError::UnboundKey`] when the key is not bound in this entry
/// - [`ConfigError::UnterminatedPlaceholder`] for a `${{` without a matching `}}`
pub fn interpolate(template: &str, bindings: &Bindings) -> ConfigResult<String> {
    if !template.contains(OPEN) {
        return Ok(template.to_string());
    }

    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_literal(&mut out, &template[last..whole.start()], template)?;

        let expr = expr.as_str();
        let key = expr
            .strip_prefix("matrix.")
            .filter(|key| !key.is_empty() && !key.contains('.'))
            .ok_or_else(|| ConfigError::UnsupportedPlaceholder(expr.to_string()))?;
        let value = bindings.get(key).ok_or_else(|| ConfigError::UnboundKey {
            key: key.to_string(),
        })?;

        out.push_str(value);
        last = whole.end();
    }

    push_literal(&mut out, &template[last..], template)?;
    Ok(out)
}

/// Interpolates every value of an environment map.
pub fn interpolate_map<'a, I>(vars: I, bindings: &Bindings) -> ConfigResult<Vec<(String, String)>>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    vars.into_iter()
        .map(|(k, v)| Ok((k.clone(), interpolate(v, bindings)?)))
        .collect()
}

fn push_literal(out: &mut String, literal: &str, template: &str) -> ConfigResult<()> {
    if literal.contains(OPEN) {
        return Err(ConfigError::UnterminatedPlaceholder(template.to_string()));
    }
    out.push_str(literal);
    Ok(())
}
