use itertools::Itertools;

use crate::constants::{REPORT_DELIMITER, SOLUTION_ALIAS};
use crate::domain::{Assertion, Language, TestCase};
use crate::errors::TranslateError;
use crate::translator::literals::{parse_literal, render_literal};

/// Finds the declaration the alias shim should bind to.
///
/// Preference order: a declaration matching the canonical name (tolerating
/// extra whitespace, `async`, typing annotations and `export`/`const`
/// forms); else the sole function declaration whatever the learner named
/// it; else `SignatureNotFound`.
pub fn find_binding(
    code: &str,
    language: Language,
    canonical: &str,
) -> Result<String, TranslateError> {
    let declared = match language {
        Language::Python => python_declarations(code),
        Language::TypeScript => typescript_declarations(code),
    };

    if declared.iter().any(|name| name == canonical) {
        return Ok(canonical.to_string());
    }
    let unique: Vec<&String> = declared.iter().unique().collect();
    if let [only] = unique.as_slice() {
        return Ok((*only).to_string());
    }
    Err(TranslateError::SignatureNotFound {
        name: canonical.to_string(),
    })
}

/// Top-level `def name(` / `async def name(` declarations.
fn python_declarations(code: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in code.lines() {
        if line.starts_with(char::is_whitespace) {
            continue; // nested defs are helpers, not the solution entry point
        }
        let rest = line.strip_prefix("async ").unwrap_or(line).trim_start();
        if let Some(rest) = rest.strip_prefix("def") {
            if let Some(name) = leading_identifier(rest.trim_start()) {
                if rest.starts_with(char::is_whitespace)
                    && rest.trim_start()[name.len()..].trim_start().starts_with('(')
                {
                    names.push(name);
                }
            }
        }
    }
    names
}

/// `function name(`, `const/let/var name =`, each optionally `export`ed.
fn typescript_declarations(code: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in code.lines() {
        let mut rest = line.trim_start();
        for prefix in ["export ", "default ", "async "] {
            rest = rest.strip_prefix(prefix).unwrap_or(rest).trim_start();
        }
        if let Some(tail) = rest.strip_prefix("function") {
            if tail.starts_with(char::is_whitespace) {
                if let Some(name) = leading_identifier(tail.trim_start()) {
                    names.push(name);
                }
            }
            continue;
        }
        for keyword in ["const", "let", "var"] {
            if let Some(tail) = rest.strip_prefix(keyword) {
                if tail.starts_with(char::is_whitespace) && tail.contains('=') {
                    if let Some(name) = leading_identifier(tail.trim_start()) {
                        names.push(name);
                    }
                }
            }
        }
    }
    names
}

fn leading_identifier(text: &str) -> Option<String> {
    let mut out = String::new();
    for (pos, c) in text.char_indices() {
        let valid = if pos == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if valid {
            out.push(c);
        } else {
            break;
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Token-level rewrite of a free-form canonical assertion expression:
/// boolean/none literal names, equality operators and the canonical
/// function name are mapped; string literal contents are left untouched.
pub fn rewrite_expr(code: &str, language: Language, canonical: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut pos = 0usize;
    let mut in_string: Option<char> = None;

    while pos < chars.len() {
        let c = chars[pos];

        if let Some(quote) = in_string {
            out.push(c);
            if c == '\\' && pos + 1 < chars.len() {
                out.push(chars[pos + 1]);
                pos += 2;
                continue;
            }
            if c == quote {
                in_string = None;
            }
            pos += 1;
            continue;
        }

        match c {
            '"' | '\'' => {
                in_string = Some(c);
                out.push(c);
                pos += 1;
            }
            '=' | '!' if chars.get(pos + 1) == Some(&'=') => {
                match language {
                    Language::Python => {
                        out.push(c);
                        out.push('=');
                    }
                    Language::TypeScript => {
                        out.push(c);
                        out.push_str("==");
                    }
                }
                pos += 2;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = pos;
                while pos < chars.len()
                    && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_')
                {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                out.push_str(&map_word(&word, language, canonical));
            }
            _ => {
                out.push(c);
                pos += 1;
            }
        }
    }
    out
}

fn map_word(word: &str, language: Language, canonical: &str) -> String {
    if word == canonical {
        return SOLUTION_ALIAS.to_string();
    }
    match (language, word) {
        (Language::TypeScript, "True") => "true".to_string(),
        (Language::TypeScript, "False") => "false".to_string(),
        (Language::TypeScript, "None") => "null".to_string(),
        _ => word.to_string(),
    }
}

/// Target-language boolean expression for one test's assertion.
pub fn check_expression(
    index: usize,
    assertion: &Assertion,
    language: Language,
    canonical: &str,
) -> Result<String, TranslateError> {
    match assertion {
        Assertion::Call { args, expected } => {
            let mut rendered_args = Vec::with_capacity(args.len());
            for arg in args {
                let value = parse_literal(arg).map_err(|reason| {
                    TranslateError::MalformedAssertion { index, reason }
                })?;
                rendered_args.push(render_literal(&value, language));
            }
            let expected_value = parse_literal(expected)
                .map_err(|reason| TranslateError::MalformedAssertion { index, reason })?;
            let expected = render_literal(&expected_value, language);
            let call = format!("{}({})", SOLUTION_ALIAS, rendered_args.join(", "));
            Ok(match language {
                Language::Python => format!("{call} == {expected}"),
                // Structural equality: `===` would compare arrays by identity.
                Language::TypeScript => format!("__structEq({call}, {expected})"),
            })
        }
        Assertion::Expr { code } => Ok(rewrite_expr(code.trim(), language, canonical)),
    }
}

/// Canonical display text of an assertion, shown for public tests only.
pub fn describe_assertion(canonical: &str, assertion: &Assertion) -> String {
    match assertion {
        Assertion::Call { args, expected } => format!(
            "{canonical}({}) == {}",
            args.iter().map(|a| a.trim()).join(", "),
            expected.trim()
        ),
        Assertion::Expr { code } => code.trim().to_string(),
    }
}

/// Assembles the runnable harness: submitted code, rebinding shim, one
/// check function per test, reporting epilogue.
pub fn emit(
    language: Language,
    user_code: &str,
    bound_name: &str,
    tests: &[TestCase],
    canonical: &str,
) -> Result<String, TranslateError> {
    let mut checks = Vec::with_capacity(tests.len());
    for (index, test) in tests.iter().enumerate() {
        checks.push((
            &test.setup,
            check_expression(index, &test.assertion, language, canonical)?,
        ));
    }
    Ok(match language {
        Language::Python => emit_python(user_code, bound_name, &checks),
        Language::TypeScript => emit_typescript(user_code, bound_name, &checks),
    })
}

fn emit_python(user_code: &str, bound_name: &str, checks: &[(&Vec<String>, String)]) -> String {
    let mut out = String::with_capacity(user_code.len() + 512);
    out.push_str(user_code);
    out.push_str("\n\n");
    out.push_str(&format!("{SOLUTION_ALIAS} = {bound_name}\n\n"));

    for (index, (setup, expr)) in checks.iter().enumerate() {
        out.push_str(&format!("def __check_{index}():\n"));
        for line in setup.iter() {
            out.push_str("    ");
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out.push_str(&format!("    return ({expr})\n\n"));
    }

    out.push_str("def __run_checks():\n");
    out.push_str(&format!(
        "    __checks = [{}]\n",
        (0..checks.len()).map(|i| format!("__check_{i}")).join(", ")
    ));
    out.push_str("    __failed = 0\n");
    out.push_str("    for __index, __check in enumerate(__checks):\n");
    out.push_str("        try:\n");
    out.push_str("            __ok = bool(__check())\n");
    // BaseException: a submission raising SystemExit must not skip the
    // remaining verdicts and walk away with a clean exit code.
    out.push_str("        except BaseException:\n");
    out.push_str("            __ok = False\n");
    out.push_str("        if not __ok:\n");
    out.push_str("            __failed += 1\n");
    out.push_str(&format!(
        "        print(\"{REPORT_DELIMITER}:%d:%s\" % (__index, \"PASS\" if __ok else \"FAIL\"), flush=True)\n"
    ));
    out.push_str("    raise SystemExit(1 if __failed else 0)\n\n");
    out.push_str("__run_checks()\n");
    out
}

fn emit_typescript(user_code: &str, bound_name: &str, checks: &[(&Vec<String>, String)]) -> String {
    let mut out = String::with_capacity(user_code.len() + 512);
    out.push_str(user_code);
    out.push_str("\n\n");
    out.push_str(&format!("const {SOLUTION_ALIAS} = {bound_name};\n"));
    out.push_str(
        "const __structEq = (a: unknown, b: unknown): boolean => JSON.stringify(a) === JSON.stringify(b);\n",
    );

    out.push_str("const __checks: Array<() => boolean> = [\n");
    for (setup, expr) in checks.iter() {
        out.push_str("    () => {\n");
        for line in setup.iter() {
            out.push_str("        ");
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out.push_str(&format!("        return ({expr});\n"));
        out.push_str("    },\n");
    }
    out.push_str("];\n");

    out.push_str("let __failed = 0;\n");
    out.push_str("__checks.forEach((__check, __index) => {\n");
    out.push_str("    let __ok = false;\n");
    out.push_str("    try {\n");
    out.push_str("        __ok = __check();\n");
    out.push_str("    } catch {\n");
    out.push_str("        __ok = false;\n");
    out.push_str("    }\n");
    out.push_str("    if (!__ok) {\n");
    out.push_str("        __failed += 1;\n");
    out.push_str("    }\n");
    out.push_str(&format!(
        "    console.log(`{REPORT_DELIMITER}:${{__index}}:${{__ok ? \"PASS\" : \"FAIL\"}}`);\n"
    ));
    out.push_str("});\n");
    out.push_str("process.exit(__failed === 0 ? 0 : 1);\n");
    out
}
