//! Query parameter binding.

use std::collections::BTreeMap;

use crate::error::{ExtractError, Result};

/// Bind `{name}` placeholders in `template` from `params`.
///
/// Names are ASCII letters, digits and `_`. `{{` and `}}` produce literal
/// braces. A placeholder with no value, or an unbalanced brace, is a
/// [`ExtractError::QueryParameter`] error. Values are inserted verbatim.
pub fn prepare_query(template: &str, params: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed || !is_placeholder_name(&name) {
                    return Err(ExtractError::QueryParameter(format!(
                        "malformed placeholder at offset {}: '{{{}'",
                        pos, name
                    )));
                }
                let value = params.get(&name).ok_or_else(|| {
                    ExtractError::QueryParameter(format!("no value for placeholder '{{{}}}'", name))
                })?;
                out.push_str(value);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(ExtractError::QueryParameter(format!(
                        "unmatched '}}' at offset {}",
                        pos
                    )));
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
