use crate::domain::Language;

/// The fixed canonical type vocabulary. The per-language renders below are
/// exhaustive matches, so the mapping table is total by construction: a new
/// canonical type fails to compile until every target language maps it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CanonType {
    Int,
    Float,
    Bool,
    Str,
    List(Box<CanonType>),
    Dict(Box<CanonType>, Box<CanonType>),
    Optional(Box<CanonType>),
    /// Return-position only: the function yields nothing meaningful.
    Unit,
}

/// Parses canonical type syntax: `int`, `float`, `bool`, `str`, `None`,
/// `list[T]`, `dict[K, V]`, `optional[T]`, arbitrarily nested.
pub fn parse_type(text: &str) -> Result<CanonType, String> {
    let text = text.trim();
    match text {
        "int" => return Ok(CanonType::Int),
        "float" => return Ok(CanonType::Float),
        "bool" => return Ok(CanonType::Bool),
        "str" => return Ok(CanonType::Str),
        "None" => return Ok(CanonType::Unit),
        _ => {}
    }

    if let Some(inner) = bracketed(text, "list") {
        return Ok(CanonType::List(Box::new(parse_type(inner)?)));
    }
    if let Some(inner) = bracketed(text, "optional") {
        return Ok(CanonType::Optional(Box::new(parse_type(inner)?)));
    }
    if let Some(inner) = bracketed(text, "dict") {
        let (key, value) = split_top_level(inner)
            .ok_or_else(|| format!("dict takes two type arguments, got `{inner}`"))?;
        return Ok(CanonType::Dict(
            Box::new(parse_type(key)?),
            Box::new(parse_type(value)?),
        ));
    }

    Err(format!("unknown canonical type `{text}`"))
}

/// `list[int]` + `"list"` -> `int`; rejects trailing garbage after `]`.
fn bracketed<'a>(text: &'a str, head: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(head)?.trim_start();
    let rest = rest.strip_prefix('[')?;
    let rest = rest.strip_suffix(']')?;
    Some(rest)
}

/// Splits `K, V` on the single comma outside any nested brackets.
fn split_top_level(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (pos, ch) in text.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => return Some((&text[..pos], &text[pos + 1..])),
            _ => {}
        }
    }
    None
}

/// Renders a canonical type in the target language's type syntax.
pub fn render_type(ty: &CanonType, language: Language) -> String {
    match language {
        Language::Python => render_python(ty),
        Language::TypeScript => render_typescript(ty),
    }
}

fn render_python(ty: &CanonType) -> String {
    match ty {
        CanonType::Int => "int".to_string(),
        CanonType::Float => "float".to_string(),
        CanonType::Bool => "bool".to_string(),
        CanonType::Str => "str".to_string(),
        CanonType::List(inner) => format!("list[{}]", render_python(inner)),
        CanonType::Dict(key, value) => {
            format!("dict[{}, {}]", render_python(key), render_python(value))
        }
        CanonType::Optional(inner) => format!("{} | None", render_python(inner)),
        CanonType::Unit => "None".to_string(),
    }
}

fn render_typescript(ty: &CanonType) -> String {
    match ty {
        CanonType::Int | CanonType::Float => "number".to_string(),
        CanonType::Bool => "boolean".to_string(),
        CanonType::Str => "string".to_string(),
        CanonType::List(inner) => match inner.as_ref() {
            // Union element types need grouping: (number | null)[]
            CanonType::Optional(_) => format!("({})[]", render_typescript(inner)),
            _ => format!("{}[]", render_typescript(inner)),
        },
        CanonType::Dict(key, value) => format!(
            "Record<{}, {}>",
            render_typescript(key),
            render_typescript(value)
        ),
        CanonType::Optional(inner) => format!("{} | null", render_typescript(inner)),
        CanonType::Unit => "void".to_string(),
    }
}
