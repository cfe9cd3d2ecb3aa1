//! Heuristic side-effect detection on interceptor bodies
//!
//! Interceptors follow a naming convention: `before<Method>`, `around<Method>`
//! and `after<Method>`. Their bodies are scanned with text heuristics for the
//! four effects that change what a caller of the intercepted method observes.
//!
//! | Effect              | Around                         | Before  | After   |
//! |---------------------|--------------------------------|---------|---------|
//! | skips wrapped call  | critical                       |         |         |
//! | modifies arguments  | high                           | medium  |         |
//! | modifies return     | medium                         |         | medium  |
//! | mutates state       | high                           | high    | high    |

use crate::models::Severity;
use crate::parsers::MethodOutline;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterceptorKind {
    Before,
    Around,
    After,
}

impl InterceptorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterceptorKind::Before => "before",
            InterceptorKind::Around => "around",
            InterceptorKind::After => "after",
        }
    }

    /// Split an interceptor method name into its kind and the intercepted
    /// method (`aroundGetPrice` → `(Around, "getPrice")`).
    pub fn from_method_name(name: &str) -> Option<(Self, String)> {
        let (kind, rest) = [
            (InterceptorKind::Before, "before"),
            (InterceptorKind::Around, "around"),
            (InterceptorKind::After, "after"),
        ]
        .into_iter()
        .find_map(|(kind, prefix)| name.strip_prefix(prefix).map(|rest| (kind, rest)))?;

        let mut chars = rest.chars();
        let first = chars.next()?;
        if !first.is_ascii_uppercase() {
            return None;
        }
        Some((kind, first.to_ascii_lowercase().to_string() + chars.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectKind {
    SkipsWrappedCall,
    ModifiesArguments,
    ModifiesReturn,
    MutatesState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffect {
    pub kind: SideEffectKind,
    pub severity: Severity,
    pub description: String,
    /// Line the pattern was found on, when it points at one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Strategy for detecting interceptor side effects.
///
/// Each method inspects one interceptor method and returns the effect it
/// found, if any. [`SideEffectHeuristics::detect`] applies the checks that
/// make sense for the interceptor kind.
pub trait SideEffectHeuristics: Send + Sync {
    /// Around only: the wrapped callable is never invoked.
    fn skips_wrapped_call(&self, method: &MethodOutline) -> Option<SideEffect>;

    fn modifies_arguments(&self, method: &MethodOutline, kind: InterceptorKind) -> Option<SideEffect>;

    fn modifies_return(&self, method: &MethodOutline, kind: InterceptorKind) -> Option<SideEffect>;

    fn mutates_state(&self, method: &MethodOutline) -> Option<SideEffect>;

    fn detect(&self, method: &MethodOutline, kind: InterceptorKind) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        if kind == InterceptorKind::Around {
            effects.extend(self.skips_wrapped_call(method));
        }
        if kind != InterceptorKind::After {
            effects.extend(self.modifies_arguments(method, kind));
        }
        if kind != InterceptorKind::Before {
            effects.extend(self.modifies_return(method, kind));
        }
        effects.extend(self.mutates_state(method));
        effects
    }
}

static CLOSURE: OnceLock<Regex> = OnceLock::new();
static VARIABLE_CALL: OnceLock<Regex> = OnceLock::new();
static CALL_USER_FUNC: OnceLock<Regex> = OnceLock::new();
static ASSIGNED_CALL: OnceLock<Regex> = OnceLock::new();
static ASSIGNMENT: OnceLock<Regex> = OnceLock::new();
static RETURN: OnceLock<Regex> = OnceLock::new();
static STATE_CALL: OnceLock<Regex> = OnceLock::new();
static PROPERTY_WRITE: OnceLock<Regex> = OnceLock::new();

fn closure() -> &'static Regex {
    CLOSURE.get_or_init(|| Regex::new(r"\bfunction\s*&?\s*\(").expect("valid regex"))
}

fn variable_call() -> &'static Regex {
    VARIABLE_CALL.get_or_init(|| Regex::new(r"\$(\w+)\s*\(").expect("valid regex"))
}

fn call_user_func() -> &'static Regex {
    CALL_USER_FUNC
        .get_or_init(|| Regex::new(r"call_user_func(?:_array)?\s*\(\s*\$(\w+)").expect("valid regex"))
}

fn assigned_call() -> &'static Regex {
    ASSIGNED_CALL.get_or_init(|| Regex::new(r"\$(\w+)\s*=\s*\$(\w+)\s*\(").expect("valid regex"))
}

fn assignment() -> &'static Regex {
    ASSIGNMENT.get_or_init(|| {
        Regex::new(r"(?:^|[^>\w$])\$(\w+)\s*(?:[.+\-*/?]{0,2})=(?:[^=>]|$)").expect("valid regex")
    })
}

fn return_statement() -> &'static Regex {
    RETURN.get_or_init(|| Regex::new(r"\breturn\b\s*([^;]*);").expect("valid regex"))
}

fn state_call() -> &'static Regex {
    STATE_CALL.get_or_init(|| {
        Regex::new(
            r"->(save|delete|insert\w*|update\w*|setData|unsetData|addData|query|beginTransaction|commit|set[A-Z]\w*)\s*\(",
        )
        .expect("valid regex")
    })
}

fn property_write() -> &'static Regex {
    PROPERTY_WRITE.get_or_init(|| {
        Regex::new(r"\$this->(\w+)\s*(?:[.+\-*/?]{0,2})=(?:[^=>]|$)").expect("valid regex")
    })
}

fn blank(c: char) -> char {
    if c == '\n' {
        '\n'
    } else {
        ' '
    }
}

fn blank_line_comment(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    out.push(' ');
    while let Some(&c) = chars.peek() {
        if c == '\n' {
            break;
        }
        out.push(' ');
        chars.next();
    }
}

/// Method body with comments blanked out, newlines preserved so offsets
/// still map to lines. Quoted strings are copied as-is, so `//` inside a
/// URL literal does not start a comment.
fn code_of(method: &MethodOutline) -> String {
    let mut out = String::with_capacity(method.body.len());
    let mut chars = method.body.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str("  ");
                let mut prev = ' ';
                for inner in chars.by_ref() {
                    out.push(blank(inner));
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            '/' if chars.peek() == Some(&'/') => blank_line_comment(&mut chars, &mut out),
            '#' if chars.peek() != Some(&'[') => blank_line_comment(&mut chars, &mut out),
            _ => out.push(c),
        }
    }
    out
}

/// Byte index of the brace closing the one at `open`, skipping quoted text.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// `code` with the bodies of nested anonymous functions blanked, so only
/// the method's own statements remain. Arrow functions have no statements
/// and are left alone.
fn without_closures(code: &str) -> String {
    let mut bytes = code.as_bytes().to_vec();
    let mut covered = 0usize;
    for m in closure().find_iter(code) {
        if m.start() < covered {
            continue;
        }
        let mut parens = 1usize;
        let mut open = None;
        for (i, b) in code.bytes().enumerate().skip(m.end()) {
            match b {
                b'(' => parens += 1,
                b')' => parens = parens.saturating_sub(1),
                b'{' if parens == 0 => {
                    open = Some(i);
                    break;
                }
                b';' if parens == 0 => break,
                _ => {}
            }
        }
        let Some(open) = open else { continue };
        let close = matching_brace(code.as_bytes(), open).unwrap_or(code.len() - 1);
        for b in &mut bytes[open..=close] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
        covered = close + 1;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Line of a byte offset in the body; the body ends on the method's last line.
fn line_at(method: &MethodOutline, code: &str, offset: usize) -> u32 {
    let after = code[offset..].matches('\n').count() as u32;
    method.line_end.saturating_sub(after)
}

fn param_name(method: &MethodOutline, index: usize, default: &str) -> String {
    method
        .params
        .get(index)
        .map(|p| p.name.trim_start_matches("...").trim_start_matches('$').to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Parameters passed through to the intercepted method (after `$subject`
/// and, for around/after, `$proceed` / `$result`).
fn pass_through_params(method: &MethodOutline, kind: InterceptorKind) -> BTreeSet<String> {
    let skip = if kind == InterceptorKind::Before { 1 } else { 2 };
    method
        .params
        .iter()
        .skip(skip)
        .map(|p| p.name.trim_start_matches("...").trim_start_matches('$').to_string())
        .collect()
}

/// Argument list text of the call whose opening parenthesis is at `open`.
fn call_arguments(code: &str, open: usize) -> Vec<String> {
    let mut depth = 0usize;
    let mut args = Vec::new();
    let mut current = String::new();
    for c in code[open..].chars() {
        match c {
            '(' | '[' | '{' => {
                if depth > 0 {
                    current.push(c);
                }
                depth += 1;
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
                current.push(c);
            }
            ',' if depth == 1 => args.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        args.push(current);
    }
    args.into_iter().map(|a| a.trim().to_string()).collect()
}

/// Regex heuristics over method bodies.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexHeuristics;

impl RegexHeuristics {
    fn proceed_calls<'a>(&self, code: &'a str, proceed: &str) -> Vec<regex::Match<'a>> {
        variable_call()
            .captures_iter(code)
            .filter(|c| &c[1] == proceed)
            .filter_map(|c| c.get(0))
            .collect()
    }

    fn reassigned_param(&self, code: &str, params: &BTreeSet<String>) -> Option<(String, usize)> {
        assignment().captures_iter(code).find_map(|c| {
            let name = c.get(1)?;
            params
                .contains(name.as_str())
                .then(|| (name.as_str().to_string(), name.start()))
        })
    }
}

impl SideEffectHeuristics for RegexHeuristics {
    fn skips_wrapped_call(&self, method: &MethodOutline) -> Option<SideEffect> {
        let code = code_of(method);
        let proceed = param_name(method, 1, "proceed");
        let invoked = !self.proceed_calls(&code, &proceed).is_empty()
            || call_user_func()
                .captures_iter(&code)
                .any(|c| c[1] == *proceed);
        (!invoked).then(|| SideEffect {
            kind: SideEffectKind::SkipsWrappedCall,
            severity: Severity::Critical,
            description: format!(
                "`{}` never calls ${}: the original method and every inner plugin are skipped",
                method.name, proceed
            ),
            line: Some(method.line_start),
        })
    }

    fn modifies_arguments(&self, method: &MethodOutline, kind: InterceptorKind) -> Option<SideEffect> {
        let code = code_of(method);
        let params = pass_through_params(method, kind);

        if let Some((param, offset)) = self.reassigned_param(&code, &params) {
            let severity = if kind == InterceptorKind::Around {
                Severity::High
            } else {
                Severity::Medium
            };
            return Some(SideEffect {
                kind: SideEffectKind::ModifiesArguments,
                severity,
                description: format!("`{}` reassigns argument ${} before it reaches the original method", method.name, param),
                line: Some(line_at(method, &code, offset)),
            });
        }

        match kind {
            InterceptorKind::Around => {
                let proceed = param_name(method, 1, "proceed");
                self.proceed_calls(&code, &proceed).into_iter().find_map(|call| {
                    let args = call_arguments(&code, call.end() - 1);
                    let altered = args.iter().any(|arg| {
                        let name = arg.trim_start_matches("...").trim_start_matches('$');
                        !(arg.trim_start_matches("...").starts_with('$') && params.contains(name))
                    });
                    altered.then(|| SideEffect {
                        kind: SideEffectKind::ModifiesArguments,
                        severity: Severity::High,
                        description: format!(
                            "`{}` calls ${} with arguments other than the ones it received",
                            method.name, proceed
                        ),
                        line: Some(line_at(method, &code, call.start())),
                    })
                })
            }
            InterceptorKind::Before => {
                let top = without_closures(&code);
                return_statement().captures_iter(&top).find_map(|c| {
                    let expr = c[1].trim();
                    let rewrites = !expr.is_empty() && !expr.eq_ignore_ascii_case("null");
                    rewrites.then(|| SideEffect {
                        kind: SideEffectKind::ModifiesArguments,
                        severity: Severity::Medium,
                        description: format!("`{}` returns replacement arguments", method.name),
                        line: c.get(0).map(|m| line_at(method, &top, m.start())),
                    })
                })
            }
            InterceptorKind::After => None,
        }
    }

    fn modifies_return(&self, method: &MethodOutline, kind: InterceptorKind) -> Option<SideEffect> {
        let code = code_of(method);
        let untouched: BTreeSet<String> = match kind {
            InterceptorKind::Before => return None,
            InterceptorKind::After => [param_name(method, 1, "result")].into_iter().collect(),
            InterceptorKind::Around => {
                let proceed = param_name(method, 1, "proceed");
                assigned_call()
                    .captures_iter(&code)
                    .filter(|c| c[2] == *proceed)
                    .map(|c| c[1].to_string())
                    .collect()
            }
        };
        let proceed = param_name(method, 1, "proceed");
        let top = without_closures(&code);

        return_statement().captures_iter(&top).find_map(|c| {
            let expr = c[1].trim();
            let passes_through = expr
                .strip_prefix('$')
                .map(|rest| {
                    let name: String = rest.chars().take_while(|ch| ch.is_alphanumeric() || *ch == '_').collect();
                    let tail = rest[name.len()..].trim_start();
                    (untouched.contains(&name) && tail.is_empty())
                        || (kind == InterceptorKind::Around && name == proceed && tail.starts_with('('))
                })
                .unwrap_or(false);
            (!passes_through).then(|| SideEffect {
                kind: SideEffectKind::ModifiesReturn,
                severity: Severity::Medium,
                description: format!(
                    "`{}` returns `{}` instead of the original result",
                    method.name,
                    if expr.is_empty() { "nothing" } else { expr }
                ),
                line: c.get(0).map(|m| line_at(method, &top, m.start())),
            })
        })
    }

    fn mutates_state(&self, method: &MethodOutline) -> Option<SideEffect> {
        let code = code_of(method);
        let (what, offset) = state_call()
            .captures_iter(&code)
            .filter_map(|c| Some((format!("->{}()", c.get(1)?.as_str()), c.get(0)?.start())))
            .chain(
                property_write()
                    .captures_iter(&code)
                    .filter_map(|c| Some((format!("$this->{}", c.get(1)?.as_str()), c.get(0)?.start()))),
            )
            .min_by_key(|(_, offset)| *offset)?;

        Some(SideEffect {
            kind: SideEffectKind::MutatesState,
            severity: Severity::High,
            description: format!("`{}` mutates state through {}", method.name, what),
            line: Some(line_at(method, &code, offset)),
        })
    }
}
