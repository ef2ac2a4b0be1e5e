// src/less/value.rs

//! Value evaluation: `@{}` interpolation, `~"..."` escapes, variable
//! substitution and arithmetic.
//!
//! Arithmetic follows lessc's default math mode: `+ - *` apply anywhere
//! between numbers, `/` only divides inside parentheses, and the first unit
//! seen wins. Anything that is not a well-formed numeric expression is passed
//! through verbatim.

use std::sync::LazyLock;

use regex::Regex;

use crate::less::parser::{skip_string, skip_url, starts_with_ignore_case};

static INTERPOLATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\{([A-Za-z0-9_-]+)\}").expect("static regex"));

/// A fully evaluated value.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub text: String,
    /// The value came from a single `~"..."` escape and must not be
    /// re-tokenized when substituted elsewhere.
    pub opaque: bool,
}

/// Resolves a variable name (without `@`) to its evaluated value.
pub type Lookup<'a> = dyn FnMut(&str) -> Result<Evaluated, String> + 'a;

/// Evaluate a declaration or variable value.
pub fn evaluate(raw: &str, lookup: &mut Lookup<'_>) -> Result<Evaluated, String> {
    let text = interpolate(raw, lookup)?;
    let tokens = tokenize(&text);

    let significant: Vec<&Tok> = tokens.iter().filter(|t| **t != Tok::Ws).collect();
    let opaque = matches!(significant.as_slice(), [Tok::Escaped(_)]);

    let expanded = expand(tokens, lookup)?;
    let mut i = 0;
    let rendered = render(&expanded, &mut i, true, false)?;

    Ok(Evaluated {
        text: rendered.trim().to_string(),
        opaque,
    })
}

/// Replace every `@{name}` with the variable's value, unquoted.
pub fn interpolate(text: &str, lookup: &mut Lookup<'_>) -> Result<String, String> {
    if !text.contains("@{") {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in INTERPOLATION.captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let name = caps.get(1).map_or("", |m| m.as_str());
        out.push_str(&text[last..whole.start]);
        out.push_str(unquote(&lookup(name)?.text));
        last = whole.end;
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Strip one pair of matching surrounding quotes.
pub fn unquote(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Format a number the way lessc prints it: no trailing zeros, at most eight
/// decimals, and no negative zero.
pub fn format_number(value: f64) -> String {
    let rounded = (value * 1e8).round() / 1e8;
    if rounded == rounded.trunc() && rounded.abs() < 1e15 {
        return format!("{}", rounded as i64);
    }
    let text = format!("{rounded:.8}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num { value: f64, unit: String, raw: String },
    Op(char),
    /// `-` with whitespace before and an operand right after (`0 -@x`):
    /// negates its operand and never subtracts.
    Neg,
    Open,
    Close,
    Ws,
    Comma,
    Text(String),
    Var(String),
    VarVar(String),
    Escaped(String),
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn tokenize(text: &str) -> Vec<Tok> {
    let bytes = text.as_bytes();
    let mut toks: Vec<Tok> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        if b.is_ascii_whitespace() {
            while matches!(bytes.get(i), Some(c) if c.is_ascii_whitespace()) {
                i += 1;
            }
            toks.push(Tok::Ws);
            continue;
        }

        if starts_number(bytes, i, toks.last()) {
            let start = i;
            if b == b'+' || b == b'-' {
                i += 1;
            }
            while matches!(bytes.get(i), Some(c) if c.is_ascii_digit() || *c == b'.') {
                i += 1;
            }
            let number_end = i;
            if bytes.get(i) == Some(&b'%') {
                i += 1;
            } else {
                while matches!(bytes.get(i), Some(c) if c.is_ascii_alphabetic()) {
                    i += 1;
                }
            }
            match text[start..number_end].parse::<f64>() {
                Ok(value) => toks.push(Tok::Num {
                    value,
                    unit: text[number_end..i].to_string(),
                    raw: text[start..i].to_string(),
                }),
                Err(_) => toks.push(Tok::Text(text[start..i].to_string())),
            }
            continue;
        }

        match b {
            b',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            b'"' | b'\'' => {
                let end = skip_string(bytes, i);
                toks.push(Tok::Text(text[i..end].to_string()));
                i = end;
            }
            b'~' if matches!(next, Some(b'"') | Some(b'\'')) => {
                let end = skip_string(bytes, i + 1);
                let inner_end = if end > i + 2 && bytes[end - 1] == bytes[i + 1] {
                    end - 1
                } else {
                    end
                };
                toks.push(Tok::Escaped(text[i + 2..inner_end].to_string()));
                i = end;
            }
            b'@' => {
                let double = next == Some(b'@');
                let name_start = if double { i + 2 } else { i + 1 };
                let mut end = name_start;
                while matches!(bytes.get(end), Some(c) if is_ident_byte(*c)) {
                    end += 1;
                }
                let name = text[name_start..end].to_string();
                toks.push(match (name.is_empty(), double) {
                    (true, _) => Tok::Text(text[i..end].to_string()),
                    (false, true) => Tok::VarVar(name),
                    (false, false) => Tok::Var(name),
                });
                i = end;
            }
            b'u' | b'U' if starts_with_ignore_case(&bytes[i..], b"url(") => {
                let end = skip_url(bytes, i + 4);
                toks.push(Tok::Text(text[i..end].to_string()));
                i = end;
            }
            b'(' => {
                toks.push(Tok::Open);
                i += 1;
            }
            b')' => {
                toks.push(Tok::Close);
                i += 1;
            }
            b'+' | b'*' | b'/' => {
                toks.push(Tok::Op(b as char));
                i += 1;
            }
            b'-' if !matches!(next, Some(c) if c.is_ascii_alphabetic() || c == b'_' || c == b'-') => {
                let sign = toks.last() == Some(&Tok::Ws) && matches!(next, Some(c) if !c.is_ascii_whitespace());
                toks.push(if sign { Tok::Neg } else { Tok::Op('-') });
                i += 1;
            }
            _ if b == b'#' || is_ident_byte(b) => {
                let start = i;
                i += 1;
                while matches!(bytes.get(i), Some(c) if is_ident_byte(*c)) {
                    i += 1;
                }
                toks.push(Tok::Text(text[start..i].to_string()));
            }
            _ => {
                let len = text[i..].chars().next().map_or(1, char::len_utf8);
                toks.push(Tok::Text(text[i..i + len].to_string()));
                i += len;
            }
        }
    }

    toks
}

fn starts_number(bytes: &[u8], i: usize, prev: Option<&Tok>) -> bool {
    let digit_at = |j: usize| matches!(bytes.get(j), Some(c) if c.is_ascii_digit());
    let unsigned_at = |j: usize| digit_at(j) || (bytes.get(j) == Some(&b'.') && digit_at(j + 1));

    match bytes[i] {
        b'+' | b'-' => {
            let sign_allowed = matches!(
                prev,
                None | Some(Tok::Ws) | Some(Tok::Open) | Some(Tok::Comma) | Some(Tok::Op(_))
            );
            sign_allowed && unsigned_at(i + 1)
        }
        _ => {
            // Digits inside an identifier (`h1`, `translate3d`) are not numbers.
            let after_ident = i > 0 && is_ident_byte(bytes[i - 1]) && !matches!(prev, Some(Tok::Num { .. }));
            !after_ident && unsigned_at(i)
        }
    }
}

/// Replace variable references and escapes with their values.
fn expand(tokens: Vec<Tok>, lookup: &mut Lookup<'_>) -> Result<Vec<Tok>, String> {
    let mut out = Vec::with_capacity(tokens.len());
    for tok in tokens {
        match tok {
            Tok::Var(name) => push_value(&mut out, lookup(&name)?),
            Tok::VarVar(name) => {
                return Err(format!("variable-variable @@{name} is not supported"));
            }
            Tok::Escaped(content) => out.push(Tok::Text(content)),
            other => out.push(other),
        }
    }
    Ok(out)
}

fn push_value(out: &mut Vec<Tok>, value: Evaluated) {
    if value.opaque {
        out.push(Tok::Text(value.text));
    } else {
        out.extend(tokenize(&value.text));
    }
}

/// Render tokens back to text, folding arithmetic. Stops before an unmatched
/// `)` when `nested`.
fn render(toks: &[Tok], i: &mut usize, math: bool, nested: bool) -> Result<String, String> {
    let mut out = String::new();

    while let Some(tok) = toks.get(*i) {
        match tok {
            Tok::Close if nested => break,
            Tok::Text(name) if toks.get(*i + 1) == Some(&Tok::Open) => {
                *i += 2;
                let inner_math = math && !name.eq_ignore_ascii_case("calc");
                let inner = render(toks, i, inner_math, true)?;
                if toks.get(*i) != Some(&Tok::Close) {
                    return Err(format!("missing ')' after {name}("));
                }
                *i += 1;
                out.push_str(name);
                out.push('(');
                out.push_str(inner.trim());
                out.push(')');
            }
            Tok::Num { .. } | Tok::Open | Tok::Op('-') | Tok::Neg if math => {
                if let Some(expr) = parse_sum(toks, *i, false).filter(|e| e.folded) {
                    out.push_str(&expr.number.to_string());
                    *i = expr.next;
                    continue;
                }
                if *tok == Tok::Open {
                    *i += 1;
                    let inner = render(toks, i, math, true)?;
                    if toks.get(*i) != Some(&Tok::Close) {
                        return Err("missing ')'".to_string());
                    }
                    *i += 1;
                    out.push('(');
                    out.push_str(inner.trim());
                    out.push(')');
                    continue;
                }
                push_literal(&mut out, tok);
                *i += 1;
            }
            Tok::Open => {
                *i += 1;
                let inner = render(toks, i, math, true)?;
                if toks.get(*i) != Some(&Tok::Close) {
                    return Err("missing ')'".to_string());
                }
                *i += 1;
                out.push('(');
                out.push_str(inner.trim());
                out.push(')');
            }
            other => {
                push_literal(&mut out, other);
                *i += 1;
            }
        }
    }

    Ok(out)
}

fn push_literal(out: &mut String, tok: &Tok) {
    match tok {
        Tok::Num { raw, .. } => out.push_str(raw),
        Tok::Op(c) => out.push(*c),
        Tok::Neg => out.push('-'),
        Tok::Open => out.push('('),
        Tok::Close => out.push(')'),
        Tok::Ws => {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
        }
        Tok::Comma => out.push(','),
        Tok::Text(t) | Tok::Escaped(t) => out.push_str(t),
        Tok::Var(name) => {
            out.push('@');
            out.push_str(name);
        }
        Tok::VarVar(name) => {
            out.push_str("@@");
            out.push_str(name);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Number {
    value: f64,
    unit: String,
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", format_number(self.value), self.unit)
    }
}

struct Expr {
    number: Number,
    next: usize,
    /// An operator or grouping was applied, so the text must be replaced.
    folded: bool,
}

fn skip_ws(toks: &[Tok], mut i: usize) -> usize {
    while toks.get(i) == Some(&Tok::Ws) {
        i += 1;
    }
    i
}

fn combine(lhs: Number, rhs: Number, op: char) -> Option<Number> {
    let unit = if lhs.unit.is_empty() { rhs.unit } else { lhs.unit };
    let value = match op {
        '+' => lhs.value + rhs.value,
        '-' => lhs.value - rhs.value,
        '*' => lhs.value * rhs.value,
        '/' if rhs.value != 0.0 => lhs.value / rhs.value,
        _ => return None,
    };
    Some(Number { value, unit })
}

fn parse_sum(toks: &[Tok], i: usize, in_parens: bool) -> Option<Expr> {
    let mut acc = parse_product(toks, i, in_parens)?;
    loop {
        let k = skip_ws(toks, acc.next);
        let Some(Tok::Op(op @ ('+' | '-'))) = toks.get(k) else {
            break;
        };
        let Some(rhs) = parse_product(toks, skip_ws(toks, k + 1), in_parens) else {
            break;
        };
        acc = Expr {
            number: combine(acc.number, rhs.number, *op)?,
            next: rhs.next,
            folded: true,
        };
    }
    Some(acc)
}

fn parse_product(toks: &[Tok], i: usize, in_parens: bool) -> Option<Expr> {
    let mut acc = parse_factor(toks, i)?;
    loop {
        let k = skip_ws(toks, acc.next);
        let op = match toks.get(k) {
            Some(Tok::Op('*')) => '*',
            Some(Tok::Op('/')) if in_parens => '/',
            _ => break,
        };
        let Some(rhs) = parse_factor(toks, skip_ws(toks, k + 1)) else {
            break;
        };
        acc = Expr {
            number: combine(acc.number, rhs.number, op)?,
            next: rhs.next,
            folded: true,
        };
    }
    Some(acc)
}

fn parse_factor(toks: &[Tok], i: usize) -> Option<Expr> {
    match toks.get(i)? {
        Tok::Num { value, unit, .. } => Some(Expr {
            number: Number {
                value: *value,
                unit: unit.clone(),
            },
            next: i + 1,
            folded: false,
        }),
        Tok::Open => {
            let inner = parse_sum(toks, skip_ws(toks, i + 1), true)?;
            let close = skip_ws(toks, inner.next);
            (toks.get(close) == Some(&Tok::Close)).then(|| Expr {
                number: inner.number,
                next: close + 1,
                folded: true,
            })
        }
        Tok::Op('-') | Tok::Neg => {
            let inner = parse_factor(toks, i + 1)?;
            Some(Expr {
                number: Number {
                    value: -inner.number.value,
                    unit: inner.number.unit,
                },
                next: inner.next,
                folded: true,
            })
        }
        _ => None,
    }
}
