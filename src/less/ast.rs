// src/less/ast.rs

//! Syntax tree produced by the parser.

/// Location of a node: which loaded source it came from and the byte offset
/// into that source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub source: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `name: value;` inside a block. `name` may contain `@{var}`.
    Declaration {
        name: String,
        value: String,
        important: bool,
        pos: Pos,
    },
    /// `@name: value;`
    Variable { name: String, value: String, pos: Pos },
    /// A rule set or mixin definition.
    Rule(RuleSet),
    /// `.name;`, `.name();` or `.name(args) !important;`
    MixinCall {
        name: String,
        args: Vec<MixinArg>,
        important: bool,
        pos: Pos,
    },
    /// `@media ... { }`, `@keyframes ... { }`, `@font-face { }` ...
    AtBlock {
        name: String,
        prelude: String,
        body: Vec<Node>,
        pos: Pos,
    },
    /// `@charset "x";`, `@namespace ...;`, CSS `@import ...;`
    AtStatement { name: String, prelude: String, pos: Pos },
    /// LESS `@import "file";` to be inlined.
    Import { path: String, pos: Pos },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    /// Selector list, split on top-level commas and whitespace-normalised.
    pub selectors: Vec<String>,
    /// `Some` for parametric mixin definitions (`.m(@a; @b: 1) { }`), which
    /// are never output.
    pub params: Option<Vec<MixinParam>>,
    pub body: Vec<Node>,
    pub pos: Pos,
}

impl RuleSet {
    /// Name under which this rule set can be called as a mixin: a single
    /// class or id selector such as `.bordered` or `#theme`.
    pub fn mixin_name(&self) -> Option<&str> {
        match self.selectors.as_slice() {
            [single] if is_mixin_name(single) => Some(single.as_str()),
            _ => None,
        }
    }
}

/// `.name` or `#name` with identifier characters only.
pub fn is_mixin_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some('.') | Some('#'))
        && s.len() > 1
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixinParam {
    /// Variable name without the leading `@`.
    pub name: String,
    pub default: Option<String>,
}

/// One argument of a mixin call; `@name: value` binds by name.
#[derive(Debug, Clone, PartialEq)]
pub struct MixinArg {
    pub name: Option<String>,
    pub value: String,
}
