use itertools::Itertools;

use crate::domain::Language;
use crate::errors::TranslateError;
use crate::translator::types::{CanonType, parse_type, render_type};

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: CanonType,
}

/// Parsed canonical function signature.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionSig {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: CanonType,
}

/// Parses the canonical signature text.
///
/// Core form is `name(param: type, ...) -> type`. Authored specs sometimes
/// carry a Python-flavoured `def ` prefix and trailing `:`; both are
/// tolerated and stripped.
pub fn parse_signature(text: &str) -> Result<FunctionSig, TranslateError> {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("def ") {
        text = rest.trim_start();
    }
    if let Some(rest) = text.strip_suffix(':') {
        text = rest.trim_end();
    }

    let open = text
        .find('(')
        .ok_or_else(|| malformed("missing `(`", text))?;
    let name = text[..open].trim();
    if !is_identifier(name) {
        return Err(malformed(&format!("invalid function name `{name}`"), text));
    }

    let close = matching_paren(text, open).ok_or_else(|| malformed("unbalanced parens", text))?;
    let params_text = &text[open + 1..close];
    let rest = text[close + 1..].trim();

    let ret = if rest.is_empty() {
        CanonType::Unit
    } else if let Some(ret_text) = rest.strip_prefix("->") {
        parse_type(ret_text).map_err(|reason| malformed(&reason, text))?
    } else {
        return Err(malformed(
            &format!("unexpected trailing tokens `{rest}`"),
            text,
        ));
    };

    let mut params = Vec::new();
    for part in split_params(params_text) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (param_name, ty_text) = part
            .split_once(':')
            .ok_or_else(|| malformed(&format!("parameter `{part}` has no type"), text))?;
        let param_name = param_name.trim();
        if !is_identifier(param_name) {
            return Err(malformed(
                &format!("invalid parameter name `{param_name}`"),
                text,
            ));
        }
        let ty = parse_type(ty_text).map_err(|reason| malformed(&reason, text))?;
        params.push(Param {
            name: param_name.to_string(),
            ty,
        });
    }

    Ok(FunctionSig {
        name: name.to_string(),
        params,
        ret,
    })
}

/// Renders the signature as a target-language declaration header, used by
/// callers for starter-code display.
pub fn render_signature(sig: &FunctionSig, language: Language) -> String {
    match language {
        Language::Python => {
            let params = sig
                .params
                .iter()
                .map(|p| format!("{}: {}", p.name, render_type(&p.ty, language)))
                .join(", ");
            format!(
                "def {}({}) -> {}:",
                sig.name,
                params,
                render_type(&sig.ret, language)
            )
        }
        Language::TypeScript => {
            let params = sig
                .params
                .iter()
                .map(|p| format!("{}: {}", p.name, render_type(&p.ty, language)))
                .join(", ");
            format!(
                "function {}({}): {}",
                sig.name,
                params,
                render_type(&sig.ret, language)
            )
        }
    }
}

fn malformed(reason: &str, signature: &str) -> TranslateError {
    TranslateError::MalformedSignature {
        reason: format!("{reason} (in `{signature}`)"),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Index of the `)` matching the `(` at `open`, honoring nested brackets.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (pos, ch) in text.char_indices().skip_while(|(pos, _)| *pos < open) {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 && ch == ')' {
                    return Some(pos);
                }
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits the parameter list on commas outside nested brackets.
fn split_params(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (pos, ch) in text.char_indices() {
        match ch {
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
