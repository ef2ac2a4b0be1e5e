// src/less/eval.rs

//! Evaluation of the syntax tree into flat CSS items.
//!
//! Each block opens a scope [`Frame`]; variables and mixin definitions are
//! hoisted into it so later definitions are visible to earlier uses. Variable
//! values are evaluated lazily against the scopes visible where they are
//! used, so an inner block can rebind a variable another variable refers to.

use std::collections::HashMap;

use crate::less::Fault;
use crate::less::ast::{MixinArg, Node, Pos, RuleSet};
use crate::less::parser::normalize_ws;
use crate::less::value::{self, Evaluated};

const MAX_MIXIN_DEPTH: usize = 64;

/// An at-rule that wraps emitted items (`@media`, `@keyframes`, ...). Each
/// occurrence in the source gets its own `id`, so adjacent blocks are never
/// merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Wrapper {
    pub id: usize,
    pub name: String,
    pub prelude: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub name: String,
    pub value: String,
    pub important: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlatItem {
    /// Declarations under a selector list. `selectors` is empty for
    /// declarations sitting directly in an at-rule such as `@font-face`.
    Rule {
        wrappers: Vec<Wrapper>,
        selectors: Vec<String>,
        decls: Vec<Decl>,
    },
    Statement {
        wrappers: Vec<Wrapper>,
        name: String,
        prelude: String,
    },
}

impl FlatItem {
    pub fn wrappers(&self) -> &[Wrapper] {
        match self {
            FlatItem::Rule { wrappers, .. } | FlatItem::Statement { wrappers, .. } => wrappers,
        }
    }
}

/// Result of evaluating a stylesheet.
#[derive(Debug, Default)]
pub struct Output {
    pub charset: Option<String>,
    /// Preludes of plain CSS `@import`s, in source order.
    pub imports: Vec<String>,
    pub items: Vec<FlatItem>,
}

/// Evaluate a parsed stylesheet whose LESS imports are already inlined.
pub fn evaluate(nodes: &[Node]) -> Result<Output, Fault> {
    let mut evaluator = Evaluator::default();
    let ctx = Ctx::default();
    let mut decls = Vec::new();
    let mut items = Vec::new();

    evaluator.frames.push(Frame::hoist(nodes));
    evaluator.eval_nodes(nodes, &ctx, &mut decls, &mut items)?;

    Ok(Output {
        charset: evaluator.charset,
        imports: evaluator.imports,
        items,
    })
}

/// Join a child selector list onto its parents: `&` is replaced by the
/// parent, otherwise a descendant combinator is used. Parent-major order.
pub fn join_selectors(parents: &[String], children: &[String]) -> Vec<String> {
    if parents.is_empty() {
        return children
            .iter()
            .map(|c| normalize_ws(&c.replace('&', "")))
            .collect();
    }

    let mut joined = Vec::with_capacity(parents.len() * children.len());
    for parent in parents {
        for child in children {
            let selector = if child.contains('&') {
                child.replace('&', parent)
            } else {
                format!("{parent} {child}")
            };
            joined.push(normalize_ws(&selector));
        }
    }
    joined
}

#[derive(Debug, Clone, Default)]
struct Ctx {
    selectors: Vec<String>,
    wrappers: Vec<Wrapper>,
    important: bool,
    /// Declarations may appear without a selector (inside `@font-face`).
    bare_decls: bool,
}

#[derive(Debug, Clone)]
enum VarEntry<'a> {
    Raw(&'a str),
    Bound(Evaluated),
}

#[derive(Debug, Default)]
struct Frame<'a> {
    vars: HashMap<&'a str, VarEntry<'a>>,
    mixins: HashMap<&'a str, Vec<&'a RuleSet>>,
}

impl<'a> Frame<'a> {
    fn hoist(nodes: &'a [Node]) -> Self {
        let mut frame = Frame::default();
        for node in nodes {
            match node {
                Node::Variable { name, value, .. } => {
                    frame.vars.insert(name.as_str(), VarEntry::Raw(value.as_str()));
                }
                Node::Rule(rule) => {
                    let key = match rule.params {
                        Some(_) => rule.selectors.first().map(String::as_str),
                        None => rule.mixin_name(),
                    };
                    if let Some(key) = key {
                        frame.mixins.entry(key).or_default().push(rule);
                    }
                }
                _ => {}
            }
        }
        frame
    }
}

#[derive(Default)]
struct Evaluator<'a> {
    frames: Vec<Frame<'a>>,
    resolving: Vec<(usize, String)>,
    next_wrapper_id: usize,
    mixin_depth: usize,
    charset: Option<String>,
    imports: Vec<String>,
}

impl<'a> Evaluator<'a> {
    fn scoped<R>(
        &mut self,
        frame: Frame<'a>,
        f: impl FnOnce(&mut Self) -> Result<R, Fault>,
    ) -> Result<R, Fault> {
        self.frames.push(frame);
        let result = f(self);
        self.frames.pop();
        result
    }

    fn resolve_var(&mut self, name: &str, visible: usize) -> Result<Evaluated, String> {
        let found = self.frames[..visible]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(idx, frame)| frame.vars.get(name).map(|entry| (idx, entry.clone())));

        let Some((idx, entry)) = found else {
            return Err(format!("variable @{name} is undefined"));
        };

        match entry {
            VarEntry::Bound(value) => Ok(value),
            VarEntry::Raw(raw) => {
                let key = (idx, name.to_string());
                if self.resolving.contains(&key) {
                    return Err(format!("recursive variable definition for @{name}"));
                }
                self.resolving.push(key);
                let result = value::evaluate(raw, &mut |n: &str| self.resolve_var(n, visible));
                self.resolving.pop();
                result
            }
        }
    }

    fn eval_value(&mut self, raw: &str, pos: Pos) -> Result<Evaluated, Fault> {
        let visible = self.frames.len();
        value::evaluate(raw, &mut |n: &str| self.resolve_var(n, visible))
            .map_err(|message| Fault::at(pos, message))
    }

    fn interpolate(&mut self, raw: &str, pos: Pos) -> Result<String, Fault> {
        let visible = self.frames.len();
        value::interpolate(raw, &mut |n: &str| self.resolve_var(n, visible))
            .map_err(|message| Fault::at(pos, message))
    }

    fn eval_nodes(
        &mut self,
        nodes: &'a [Node],
        ctx: &Ctx,
        decls: &mut Vec<Decl>,
        items: &mut Vec<FlatItem>,
    ) -> Result<(), Fault> {
        for node in nodes {
            match node {
                Node::Variable { .. } => {}
                Node::Declaration {
                    name,
                    value,
                    important,
                    pos,
                } => {
                    if ctx.selectors.is_empty() && !ctx.bare_decls {
                        return Err(Fault::at(
                            *pos,
                            format!("declaration '{name}' must be inside a rule set"),
                        ));
                    }
                    let name = self.interpolate(name, *pos)?;
                    let value = self.eval_value(value, *pos)?;
                    decls.push(Decl {
                        name,
                        value: value.text,
                        important: *important || ctx.important,
                    });
                }
                Node::Rule(rule) => {
                    if rule.params.is_none() {
                        self.eval_rule(rule, ctx, items)?;
                    }
                }
                Node::MixinCall {
                    name,
                    args,
                    important,
                    pos,
                } => {
                    let inner = Ctx {
                        important: ctx.important || *important,
                        ..ctx.clone()
                    };
                    self.call_mixin(name, args, *pos, &inner, decls, items)?;
                }
                Node::AtBlock {
                    name,
                    prelude,
                    body,
                    pos,
                } => self.eval_at_block(name, prelude, body, *pos, ctx, items)?,
                Node::AtStatement { name, prelude, pos } => {
                    let prelude = self.interpolate(prelude, *pos)?;
                    match name.to_ascii_lowercase().as_str() {
                        "charset" => {
                            if self.charset.is_none() {
                                self.charset = Some(prelude);
                            }
                        }
                        "import" => self.imports.push(prelude),
                        _ => items.push(FlatItem::Statement {
                            wrappers: ctx.wrappers.clone(),
                            name: name.clone(),
                            prelude,
                        }),
                    }
                }
                Node::Import { path, pos } => {
                    return Err(Fault::at(*pos, format!("@import \"{path}\" was not resolved")));
                }
            }
        }
        Ok(())
    }

    /// Evaluate `body` in a fresh scope under `ctx`, emitting the block's own
    /// declarations (as a rule on `ctx.selectors`) ahead of nested items.
    fn eval_body(
        &mut self,
        body: &'a [Node],
        ctx: &Ctx,
        items: &mut Vec<FlatItem>,
    ) -> Result<(), Fault> {
        let mut own = Vec::new();
        let mut children = Vec::new();
        self.scoped(Frame::hoist(body), |this| {
            this.eval_nodes(body, ctx, &mut own, &mut children)
        })?;

        if !own.is_empty() {
            items.push(FlatItem::Rule {
                wrappers: ctx.wrappers.clone(),
                selectors: ctx.selectors.clone(),
                decls: own,
            });
        }
        items.extend(children);
        Ok(())
    }

    fn eval_rule(&mut self, rule: &'a RuleSet, ctx: &Ctx, items: &mut Vec<FlatItem>) -> Result<(), Fault> {
        let mut own = Vec::with_capacity(rule.selectors.len());
        for selector in &rule.selectors {
            own.push(self.interpolate(selector, rule.pos)?);
        }

        let inner = Ctx {
            selectors: join_selectors(&ctx.selectors, &own),
            bare_decls: false,
            ..ctx.clone()
        };
        self.eval_body(&rule.body, &inner, items)
    }

    fn eval_at_block(
        &mut self,
        name: &str,
        prelude: &str,
        body: &'a [Node],
        pos: Pos,
        ctx: &Ctx,
        items: &mut Vec<FlatItem>,
    ) -> Result<(), Fault> {
        let mut prelude = self.eval_value(prelude, pos)?.text;
        let lower = name.to_ascii_lowercase();
        let bubbles = lower == "media" || lower == "supports";

        let mut wrappers = ctx.wrappers.clone();
        if lower == "media" {
            if let Some(outer) = wrappers.last().filter(|w| w.name.eq_ignore_ascii_case("media")) {
                prelude = format!("{} and {}", outer.prelude, prelude);
                wrappers.pop();
            }
        }
        self.next_wrapper_id += 1;
        wrappers.push(Wrapper {
            id: self.next_wrapper_id,
            name: name.to_string(),
            prelude,
        });

        let inner = Ctx {
            selectors: if bubbles { ctx.selectors.clone() } else { Vec::new() },
            wrappers,
            important: ctx.important,
            bare_decls: !bubbles,
        };
        self.eval_body(body, &inner, items)
    }

    fn find_mixins(&self, name: &str, args: &[MixinArg], pos: Pos) -> Result<Vec<&'a RuleSet>, Fault> {
        let mut known = false;
        for frame in self.frames.iter().rev() {
            let Some(defs) = frame.mixins.get(name) else {
                continue;
            };
            known = true;
            let matching: Vec<&'a RuleSet> =
                defs.iter().copied().filter(|def| accepts(def, args)).collect();
            if !matching.is_empty() {
                return Ok(matching);
            }
        }

        if known {
            Err(Fault::at(
                pos,
                format!(
                    "no definition of mixin {name} accepts {} argument(s); a parameter without default is missing or unknown",
                    args.len()
                ),
            ))
        } else {
            Err(Fault::at(pos, format!("mixin {name} is undefined")))
        }
    }

    fn bind_args(&mut self, def: &'a RuleSet, args: &[MixinArg], pos: Pos) -> Result<Frame<'a>, Fault> {
        let mut frame = Frame::default();
        let Some(params) = def.params.as_deref() else {
            return Ok(frame);
        };

        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push((arg.name.as_deref(), self.eval_value(&arg.value, pos)?));
        }

        let mut positional = evaluated.iter().filter(|(name, _)| name.is_none());
        for param in params {
            let bound = evaluated
                .iter()
                .find(|(name, _)| *name == Some(param.name.as_str()))
                .or_else(|| positional.next());

            let entry = match (bound, &param.default) {
                (Some((_, value)), _) => VarEntry::Bound(value.clone()),
                (None, Some(default)) => VarEntry::Raw(default.as_str()),
                (None, None) => {
                    return Err(Fault::at(
                        pos,
                        format!("missing argument @{} for mixin {}", param.name, def.selectors[0]),
                    ));
                }
            };
            frame.vars.insert(param.name.as_str(), entry);
        }

        let all: Vec<&str> = evaluated.iter().map(|(_, v)| v.text.as_str()).collect();
        frame.vars.insert(
            "arguments",
            VarEntry::Bound(Evaluated {
                text: all.join(" "),
                opaque: true,
            }),
        );
        Ok(frame)
    }

    fn call_mixin(
        &mut self,
        name: &str,
        args: &[MixinArg],
        pos: Pos,
        ctx: &Ctx,
        decls: &mut Vec<Decl>,
        items: &mut Vec<FlatItem>,
    ) -> Result<(), Fault> {
        if self.mixin_depth >= MAX_MIXIN_DEPTH {
            return Err(Fault::at(pos, format!("mixin {name} nests too deeply (recursive call?)")));
        }

        for def in self.find_mixins(name, args, pos)? {
            let bound = self.bind_args(def, args, pos)?;
            self.mixin_depth += 1;
            let result = self.scoped(bound, |this| {
                this.scoped(Frame::hoist(&def.body), |this| {
                    this.eval_nodes(&def.body, ctx, decls, items)
                })
            });
            self.mixin_depth -= 1;
            result?;
        }
        Ok(())
    }
}

fn accepts(def: &RuleSet, args: &[MixinArg]) -> bool {
    let Some(params) = def.params.as_deref() else {
        return args.is_empty();
    };

    let positional = args.iter().filter(|a| a.name.is_none()).count();
    let named: Vec<&str> = args.iter().filter_map(|a| a.name.as_deref()).collect();

    if positional > params.len() || named.iter().any(|n| !params.iter().any(|p| p.name == *n)) {
        return false;
    }

    let mut remaining = positional;
    params.iter().all(|param| {
        if named.contains(&param.name.as_str()) {
            true
        } else if remaining > 0 {
            remaining -= 1;
            true
        } else {
            param.default.is_some()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn descendant_join_is_parent_major() {
        let joined = join_selectors(&strings(&[".a", ".b"]), &strings(&[".c", ".d"]));
        assert_eq!(joined, strings(&[".a .c", ".a .d", ".b .c", ".b .d"]));
    }

    #[test]
    fn ampersand_replaces_parent() {
        let parents = strings(&[".btn"]);
        assert_eq!(join_selectors(&parents, &strings(&["&:hover"])), strings(&[".btn:hover"]));
        assert_eq!(join_selectors(&parents, &strings(&["&-primary"])), strings(&[".btn-primary"]));
        assert_eq!(join_selectors(&parents, &strings(&["& + &"])), strings(&[".btn + .btn"]));
        assert_eq!(join_selectors(&parents, &strings(&["> li"])), strings(&[".btn > li"]));
    }

    #[test]
    fn top_level_selectors_are_kept() {
        assert_eq!(join_selectors(&[], &strings(&["h1", "h2"])), strings(&["h1", "h2"]));
    }
}
