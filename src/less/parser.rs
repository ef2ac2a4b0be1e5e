// src/less/parser.rs

//! Recursive-descent parser from LESS source text to [`Node`]s.
//!
//! Comments are blanked out first (byte-for-byte, so offsets stay valid for
//! error reporting); the parser then works on statement boundaries
//! (`;`, `{`, `}`) found at bracket depth zero.

use crate::less::Fault;
use crate::less::ast::{MixinArg, MixinParam, Node, Pos, RuleSet, is_mixin_name};

/// Parse a whole stylesheet.
pub fn parse(source: &str, source_id: usize) -> Result<Vec<Node>, Fault> {
    let stripped = strip_comments(source, source_id)?;
    let mut parser = Parser {
        src: &stripped,
        pos: 0,
        source_id,
    };
    parser.parse_block(None)
}

/// Replace `/* */` and `//` comments with spaces, keeping newlines and byte
/// offsets. Strings and `url(...)` bodies are left untouched.
pub fn strip_comments(source: &str, source_id: usize) -> Result<String, Fault> {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let Some(close) = find(bytes, i + 2, b"*/") else {
                    return Err(Fault::new(source_id, i, "unterminated comment"));
                };
                blank(&mut out, i, close + 2);
                i = close + 2;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = find(bytes, i, b"\n").unwrap_or(bytes.len());
                blank(&mut out, i, end);
                i = end;
            }
            b'u' | b'U' if starts_with_ignore_case(&bytes[i..], b"url(") => {
                i = skip_url(bytes, i + 4);
            }
            _ => i += 1,
        }
    }

    // Only ASCII bytes were written, so the result is valid UTF-8.
    String::from_utf8(out).map_err(|_| Fault::new(source_id, 0, "invalid UTF-8 in source"))
}

fn blank(out: &mut [u8], from: usize, to: usize) {
    for b in &mut out[from..to] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

pub(crate) fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

pub(crate) fn starts_with_ignore_case(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Index just past the string starting at `start` (or the end of input).
pub(crate) fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            b'\n' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Index just past the `)` closing a `url(` whose body starts at `from`.
pub(crate) fn skip_url(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b')' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    source_id: usize,
}

impl<'a> Parser<'a> {
    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn here(&self, offset: usize) -> Pos {
        Pos {
            source: self.source_id,
            offset,
        }
    }

    fn fault(&self, offset: usize, message: impl Into<String>) -> Fault {
        Fault::new(self.source_id, offset, message)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Parse statements until the closing `}` of the block opened at `open`
    /// (or end of input for the top level).
    fn parse_block(&mut self, open: Option<usize>) -> Result<Vec<Node>, Fault> {
        let mut nodes = Vec::new();

        loop {
            self.skip_ws();
            match self.peek() {
                None => {
                    return match open {
                        None => Ok(nodes),
                        Some(at) => Err(self.fault(at, "missing closing '}'")),
                    };
                }
                Some(b'}') => {
                    if open.is_none() {
                        return Err(self.fault(self.pos, "unexpected '}'"));
                    }
                    self.pos += 1;
                    return Ok(nodes);
                }
                Some(b';') => self.pos += 1,
                Some(b'@') if self.bytes().get(self.pos + 1) != Some(&b'{') => {
                    nodes.push(self.parse_at_rule()?);
                }
                Some(_) => {
                    if let Some(node) = self.parse_rule_or_declaration()? {
                        nodes.push(node);
                    }
                }
            }
        }
    }

    /// Scan forward from the current position to the first of `stops` at
    /// bracket depth zero, skipping strings and `@{...}` interpolations.
    /// Returns the index of the stop byte (or end of input) and the byte.
    fn scan_until(&self, stops: &[u8]) -> Result<(usize, Option<u8>), Fault> {
        let bytes = self.bytes();
        let mut depth: Vec<(u8, usize)> = Vec::new();
        let mut i = self.pos;

        while i < bytes.len() {
            let b = bytes[i];
            match b {
                b'"' | b'\'' => {
                    let end = skip_string(bytes, i);
                    if end > bytes.len() || bytes.get(end - 1) != Some(&b) || end == i + 1 {
                        return Err(self.fault(i, "unterminated string"));
                    }
                    i = end;
                    continue;
                }
                b'@' if bytes.get(i + 1) == Some(&b'{') => {
                    match bytes[i..].iter().position(|&c| c == b'}') {
                        Some(close) => i += close + 1,
                        None => return Err(self.fault(i, "unterminated interpolation")),
                    }
                    continue;
                }
                b'(' | b'[' => depth.push((b, i)),
                b')' | b']' => {
                    let expected = if b == b')' { b'(' } else { b'[' };
                    match depth.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => return Err(self.fault(i, format!("unexpected '{}'", b as char))),
                    }
                }
                _ if depth.is_empty() && stops.contains(&b) => return Ok((i, Some(b))),
                _ => {}
            }
            i += 1;
        }

        if let Some((open, at)) = depth.pop() {
            let close = if open == b'(' { ')' } else { ']' };
            return Err(self.fault(at, format!("missing closing '{close}'")));
        }
        Ok((bytes.len(), None))
    }

    fn parse_at_rule(&mut self) -> Result<Node, Fault> {
        let start = self.pos;
        self.pos += 1;
        let name_start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            self.pos += 1;
        }
        let name = self.src[name_start..self.pos].to_string();
        if name.is_empty() {
            return Err(self.fault(start, "expected an identifier after '@'"));
        }

        self.skip_ws();
        if self.peek() == Some(b':') {
            self.pos += 1;
            return self.parse_variable(name, start);
        }

        let (end, stop) = self.scan_until(b";{}")?;
        let prelude = normalize_ws(&self.src[self.pos..end]);

        match stop {
            Some(b'{') => {
                if name == "import" {
                    return Err(self.fault(start, "@import must end with ';'"));
                }
                self.pos = end + 1;
                let body = self.parse_block(Some(end))?;
                Ok(Node::AtBlock {
                    name,
                    prelude,
                    body,
                    pos: self.here(start),
                })
            }
            stop => {
                self.pos = if stop == Some(b';') { end + 1 } else { end };
                if name == "import" {
                    self.import_node(prelude, start)
                } else {
                    Ok(Node::AtStatement {
                        name,
                        prelude,
                        pos: self.here(start),
                    })
                }
            }
        }
    }

    fn parse_variable(&mut self, name: String, start: usize) -> Result<Node, Fault> {
        self.skip_ws();
        if self.peek() == Some(b'{') {
            return Err(self.fault(start, "detached rulesets are not supported"));
        }
        let (end, stop) = self.scan_until(b";}")?;
        let value = self.src[self.pos..end].trim().to_string();
        self.pos = if stop == Some(b';') { end + 1 } else { end };
        if value.is_empty() {
            return Err(self.fault(start, format!("variable @{name} has no value")));
        }
        Ok(Node::Variable {
            name,
            value,
            pos: self.here(start),
        })
    }

    /// Decide between a LESS import (inlined) and a plain CSS import (kept).
    fn import_node(&self, prelude: String, start: usize) -> Result<Node, Fault> {
        let pos = self.here(start);
        let mut rest = prelude.as_str();
        let mut options: Vec<String> = Vec::new();

        if rest.starts_with('(') {
            let Some(close) = rest.find(')') else {
                return Err(self.fault(start, "unterminated @import options"));
            };
            options = rest[1..close]
                .split(',')
                .map(|o| o.trim().to_ascii_lowercase())
                .collect();
            rest = rest[close + 1..].trim_start();
        }

        // Imports are inlined once each, so `once` is already the behaviour.
        if let Some(unknown) = options.iter().find(|o| !matches!(o.as_str(), "css" | "less" | "once")) {
            return Err(self.fault(start, format!("@import option ({unknown}) is not supported")));
        }

        let force_css = options.iter().any(|o| o == "css");
        let force_less = options.iter().any(|o| o == "less");

        let (target, tail) = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => match rest[1..].find(q) {
                Some(close) => (&rest[1..close + 1], rest[close + 2..].trim()),
                None => return Err(self.fault(start, "unterminated @import path")),
            },
            _ => {
                return Ok(Node::AtStatement {
                    name: "import".to_string(),
                    prelude,
                    pos,
                });
            }
        };

        let looks_css = target.ends_with(".css")
            || target.starts_with("http://")
            || target.starts_with("https://")
            || target.starts_with("//")
            || !tail.is_empty();

        if force_css || (looks_css && !force_less) {
            let prelude = if options.is_empty() {
                prelude
            } else {
                rest.to_string()
            };
            Ok(Node::AtStatement {
                name: "import".to_string(),
                prelude,
                pos,
            })
        } else {
            Ok(Node::Import {
                path: target.to_string(),
                pos,
            })
        }
    }

    fn parse_rule_or_declaration(&mut self) -> Result<Option<Node>, Fault> {
        let start = self.pos;
        let (end, stop) = self.scan_until(b";{}")?;
        let text = self.src[start..end].trim();

        if stop == Some(b'{') {
            self.pos = end + 1;
            let body = self.parse_block(Some(end))?;
            return self.rule_set(text, body, start).map(|r| Some(Node::Rule(r)));
        }

        self.pos = if stop == Some(b';') { end + 1 } else { end };
        if text.is_empty() {
            return Ok(None);
        }

        if let Some(call) = self.mixin_call(text, start)? {
            return Ok(Some(call));
        }

        self.declaration(text, start).map(Some)
    }

    fn rule_set(&self, text: &str, body: Vec<Node>, start: usize) -> Result<RuleSet, Fault> {
        if text.is_empty() {
            return Err(self.fault(start, "missing selector before '{'"));
        }

        if let Some((name, inner)) = split_call(text) {
            if inner.1.starts_with("when") {
                return Err(self.fault(start, "mixin guards are not supported"));
            }
            if !inner.1.is_empty() {
                return Err(self.fault(start, format!("unexpected '{}' after mixin parameters", inner.1)));
            }
            let params = self.mixin_params(inner.0, start)?;
            return Ok(RuleSet {
                selectors: vec![name.to_string()],
                params: Some(params),
                body,
                pos: self.here(start),
            });
        }

        let selectors: Vec<String> = split_top_level(text, b',')
            .into_iter()
            .map(normalize_ws)
            .collect();
        if selectors.iter().any(|s| s.is_empty()) {
            return Err(self.fault(start, "empty selector in selector list"));
        }
        if selectors.iter().any(|s| s.contains(":extend(")) {
            return Err(self.fault(start, ":extend is not supported"));
        }

        Ok(RuleSet {
            selectors,
            params: None,
            body,
            pos: self.here(start),
        })
    }

    fn mixin_params(&self, inner: &str, start: usize) -> Result<Vec<MixinParam>, Fault> {
        split_args(inner)
            .into_iter()
            .map(|raw| {
                let Some(stripped) = raw.strip_prefix('@') else {
                    return Err(self.fault(
                        start,
                        format!("mixin parameter '{raw}' must be a variable"),
                    ));
                };
                Ok(match stripped.split_once(':') {
                    Some((name, default)) => MixinParam {
                        name: name.trim().to_string(),
                        default: Some(default.trim().to_string()),
                    },
                    None => MixinParam {
                        name: stripped.trim().to_string(),
                        default: None,
                    },
                })
            })
            .collect()
    }

    fn mixin_call(&self, text: &str, start: usize) -> Result<Option<Node>, Fault> {
        let (body, important) = strip_important(text);

        if is_mixin_name(body) {
            return Ok(Some(Node::MixinCall {
                name: body.to_string(),
                args: Vec::new(),
                important,
                pos: self.here(start),
            }));
        }

        let Some((name, (inner, tail))) = split_call(body) else {
            return Ok(None);
        };
        if !tail.is_empty() {
            return Ok(None);
        }

        let args = split_args(inner)
            .into_iter()
            .map(|raw| match raw.strip_prefix('@').and_then(|r| r.split_once(':')) {
                Some((n, v)) if is_identifier(n.trim()) => MixinArg {
                    name: Some(n.trim().to_string()),
                    value: v.trim().to_string(),
                },
                _ => MixinArg {
                    name: None,
                    value: raw,
                },
            })
            .collect();

        Ok(Some(Node::MixinCall {
            name: name.to_string(),
            args,
            important,
            pos: self.here(start),
        }))
    }

    fn declaration(&self, text: &str, start: usize) -> Result<Node, Fault> {
        let colon = split_top_level(text, b':')[0].len();
        if colon >= text.len() {
            return Err(self.fault(start, format!("expected ':' in '{text}'")));
        }

        let name = text[..colon].trim();
        let (value, important) = strip_important(text[colon + 1..].trim());
        if name.is_empty() {
            return Err(self.fault(start, "missing property name"));
        }
        if name.starts_with('&') {
            let feature = if text.contains(":extend(") { ":extend" } else { "a '&' property name" };
            return Err(self.fault(start, format!("{feature} is not supported")));
        }
        if name.ends_with('+') || name.ends_with("+_") {
            return Err(self.fault(
                start,
                format!("property merge '{name}:' is not supported"),
            ));
        }
        if value.is_empty() {
            return Err(self.fault(start, format!("missing value for property '{name}'")));
        }

        Ok(Node::Declaration {
            name: name.to_string(),
            value: value.to_string(),
            important,
            pos: self.here(start),
        })
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Strip a trailing `!important`.
fn strip_important(text: &str) -> (&str, bool) {
    let trimmed = text.trim_end();
    match trimmed.strip_suffix("!important") {
        Some(rest) => (rest.trim_end(), true),
        None => (trimmed, false),
    }
}

/// `.name(args) tail` -> (`.name`, (`args`, `tail`)).
fn split_call(text: &str) -> Option<(&str, (&str, &str))> {
    let open = text.find('(')?;
    let name = text[..open].trim_end();
    if !is_mixin_name(name) {
        return None;
    }

    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((name, (&text[open + 1..i], text[i + 1..].trim())));
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split mixin arguments on `;` when present, otherwise on `,`.
fn split_args(inner: &str) -> Vec<String> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    let sep = if split_top_level(inner, b';').len() > 1 {
        b';'
    } else {
        b','
    };
    split_top_level(inner, sep)
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

/// Split on `sep` outside strings and brackets. The separator is not
/// included; the first element always exists.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'@' if bytes.get(i + 1) == Some(&b'{') => {
                if let Some(close) = bytes[i..].iter().position(|&c| c == b'}') {
                    i += close + 1;
                    continue;
                }
            }
            b if b == sep && depth == 0 => {
                parts.push(&text[last..i]);
                last = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[last..]);
    parts
}

/// Collapse whitespace runs outside strings to single spaces and trim.
pub fn normalize_ws(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut pending_space = false;

    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            pending_space = !out.is_empty();
            i += 1;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        let next = if b == b'"' || b == b'\'' {
            skip_string(bytes, i)
        } else {
            i + text[i..].chars().next().map_or(1, char::len_utf8)
        };
        out.push_str(&text[i..next]);
        i = next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Vec<Node> {
        parse(src, 0).expect("parse failed")
    }

    #[test]
    fn comments_are_blanked_but_urls_survive() {
        let out = strip_comments("a{b:url(http://x/y.png); /* c */ d:e;} // f", 0).unwrap();
        assert!(out.contains("url(http://x/y.png)"));
        assert!(!out.contains("/*"));
        assert!(!out.contains("// f"));
        assert_eq!(out.len(), "a{b:url(http://x/y.png); /* c */ d:e;} // f".len());
    }

    #[test]
    fn nested_rule_is_parsed() {
        let nodes = parse_ok(".a{.b{color:red;}}");
        let Node::Rule(outer) = &nodes[0] else {
            panic!("expected rule, got {:?}", nodes[0]);
        };
        assert_eq!(outer.selectors, vec![".a"]);
        let Node::Rule(inner) = &outer.body[0] else {
            panic!("expected nested rule");
        };
        assert_eq!(inner.selectors, vec![".b"]);
        assert!(matches!(
            &inner.body[0],
            Node::Declaration { name, value, important: false, .. } if name == "color" && value == "red"
        ));
    }

    #[test]
    fn pseudo_selectors_are_not_declarations() {
        let nodes = parse_ok("a:hover, a:focus { color: red }");
        let Node::Rule(rule) = &nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.selectors, vec!["a:hover", "a:focus"]);
    }

    #[test]
    fn variables_imports_and_mixins() {
        let nodes = parse_ok(
            "@import \"base\";\n@import url(reset.css);\n@c: #fff;\n.m(@a; @b: 2px) { x: @a }\n.x { .m(1px); .plain; }",
        );
        assert!(matches!(&nodes[0], Node::Import { path, .. } if path == "base"));
        assert!(matches!(&nodes[1], Node::AtStatement { name, .. } if name == "import"));
        assert!(matches!(&nodes[2], Node::Variable { name, value, .. } if name == "c" && value == "#fff"));
        let Node::Rule(mixin) = &nodes[3] else {
            panic!("expected mixin definition");
        };
        let params = mixin.params.as_ref().unwrap();
        assert_eq!(params[1].default.as_deref(), Some("2px"));
        let Node::Rule(caller) = &nodes[4] else {
            panic!("expected caller rule");
        };
        assert!(matches!(&caller.body[0], Node::MixinCall { name, args, .. } if name == ".m" && args.len() == 1));
        assert!(matches!(&caller.body[1], Node::MixinCall { name, args, .. } if name == ".plain" && args.is_empty()));
    }

    #[test]
    fn interpolated_selector_is_not_a_block_start() {
        let nodes = parse_ok(".icon-@{name} { width: 1px; }");
        let Node::Rule(rule) = &nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.selectors, vec![".icon-@{name}"]);
    }

    #[test]
    fn unclosed_block_is_an_error() {
        let err = parse(".a { color: red;", 0).unwrap_err();
        assert_eq!(err.offset, 3);
        assert!(err.message.contains("missing closing"));
    }

    #[test]
    fn declaration_without_colon_is_an_error() {
        let err = parse(".a { color red; }", 0).unwrap_err();
        assert!(err.message.contains("expected ':'"));
    }

    #[test]
    fn unsupported_syntax_is_rejected() {
        let err = parse(".a { &:extend(.b); }", 0).unwrap_err();
        assert_eq!(err.message, ":extend is not supported");
        assert_eq!(err.offset, 5);

        let err = parse(".a:extend(.b) { x: y; }", 0).unwrap_err();
        assert_eq!(err.message, ":extend is not supported");

        let err = parse(".a { background+: url(1.png); }", 0).unwrap_err();
        assert!(err.message.contains("property merge 'background+:'"));
        let err = parse(".a { transform+_: scale(2); }", 0).unwrap_err();
        assert!(err.message.contains("property merge 'transform+_:'"));

        let err = parse("@import (reference) \"x.less\";", 0).unwrap_err();
        assert_eq!(err.message, "@import option (reference) is not supported");
        assert!(parse("@import (css) \"x.less\";", 0).is_ok());
    }

    #[test]
    fn important_flag_is_split_off() {
        let nodes = parse_ok("a { color: red !important; }");
        let Node::Rule(rule) = &nodes[0] else {
            panic!("expected rule");
        };
        assert!(matches!(&rule.body[0], Node::Declaration { value, important: true, .. } if value == "red"));
    }
}
