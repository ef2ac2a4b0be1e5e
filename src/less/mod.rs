// src/less/mod.rs

//! A LESS-to-CSS compiler covering the language subset used by typical
//! project stylesheets: variables, interpolation, escapes, nesting with `&`,
//! bubbling `@media`, `@import` inlining, mixins and arithmetic.
//!
//! Pipeline: [`parser`] -> import inlining -> [`eval`] -> [`printer`].

pub mod ast;
pub mod eval;
pub mod parser;
pub mod printer;
pub mod value;

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::fs::FileSystem;
use crate::less::ast::{Node, Pos};

/// A compile error with a 1-based source location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{line}:{column}: {message}", file_prefix(.file))]
pub struct LessError {
    pub file: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

fn file_prefix(file: &Option<PathBuf>) -> String {
    file.as_ref()
        .map(|f| format!("{}:", f.display()))
        .unwrap_or_default()
}

/// Internal error carrying a byte offset into one of the loaded sources.
/// Converted to a [`LessError`] once the source text is at hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub source: usize,
    pub offset: usize,
    pub message: String,
}

impl Fault {
    pub fn new(source: usize, offset: usize, message: impl Into<String>) -> Self {
        Self {
            source,
            offset,
            message: message.into(),
        }
    }

    pub fn at(pos: Pos, message: impl Into<String>) -> Self {
        Self::new(pos.source, pos.offset, message)
    }
}

/// Compile a stylesheet held in memory. `@import` of LESS files is an error
/// since there is nothing to resolve it against.
pub fn compile_str(source: &str) -> Result<String, LessError> {
    Compiler::new(None).compile(None, source.to_string())
}

/// Compile the stylesheet at `path`, inlining LESS imports relative to the
/// importing file.
pub fn compile_file(fs: &dyn FileSystem, path: &Path) -> anyhow::Result<String> {
    let text = fs.read_to_string(path)?;
    let css = Compiler::new(Some(fs)).compile(Some(path.to_path_buf()), text)?;
    Ok(css)
}

struct Source {
    path: Option<PathBuf>,
    text: String,
}

struct Compiler<'f> {
    fs: Option<&'f dyn FileSystem>,
    sources: Vec<Source>,
    imported: HashSet<PathBuf>,
}

impl<'f> Compiler<'f> {
    fn new(fs: Option<&'f dyn FileSystem>) -> Self {
        Self {
            fs,
            sources: Vec::new(),
            imported: HashSet::new(),
        }
    }

    fn compile(&mut self, path: Option<PathBuf>, text: String) -> Result<String, LessError> {
        let dir = parent_dir(path.as_deref());
        if let Some(path) = &path {
            self.imported.insert(normalize(path));
        }

        let root = self.add_source(path, text);
        let nodes = parser::parse(&self.sources[root].text, root).map_err(|f| self.error(&f))?;
        let nodes = self.inline_imports(nodes, &dir)?;
        let output = eval::evaluate(&nodes).map_err(|f| self.error(&f))?;
        Ok(printer::print(&output))
    }

    fn add_source(&mut self, path: Option<PathBuf>, text: String) -> usize {
        self.sources.push(Source { path, text });
        self.sources.len() - 1
    }

    /// Replace `Import` nodes (at any depth) with the parsed contents of the
    /// imported file. A file already imported contributes nothing.
    fn inline_imports(&mut self, nodes: Vec<Node>, dir: &Path) -> Result<Vec<Node>, LessError> {
        let mut out = Vec::with_capacity(nodes.len());

        for node in nodes {
            match node {
                Node::Import { path, pos } => {
                    let target = resolve_import(dir, &path);
                    if !self.imported.insert(target.clone()) {
                        continue;
                    }
                    let Some(fs) = self.fs else {
                        return Err(self.error(&Fault::at(
                            pos,
                            format!("cannot resolve @import \"{path}\" without a source file"),
                        )));
                    };
                    let text = fs.read_to_string(&target).map_err(|e| {
                        self.error(&Fault::at(pos, format!("cannot import \"{path}\": {e:#}")))
                    })?;

                    let id = self.add_source(Some(target.clone()), text);
                    let parsed = parser::parse(&self.sources[id].text, id).map_err(|f| self.error(&f))?;
                    out.extend(self.inline_imports(parsed, &parent_dir(Some(&target)))?);
                }
                Node::Rule(mut rule) => {
                    rule.body = self.inline_imports(rule.body, dir)?;
                    out.push(Node::Rule(rule));
                }
                Node::AtBlock {
                    name,
                    prelude,
                    body,
                    pos,
                } => {
                    let body = self.inline_imports(body, dir)?;
                    out.push(Node::AtBlock {
                        name,
                        prelude,
                        body,
                        pos,
                    });
                }
                other => out.push(other),
            }
        }

        Ok(out)
    }

    fn error(&self, fault: &Fault) -> LessError {
        let Some(source) = self.sources.get(fault.source) else {
            return LessError {
                file: None,
                line: 1,
                column: 1,
                message: fault.message.clone(),
            };
        };
        let (line, column) = line_column(&source.text, fault.offset);
        LessError {
            file: source.path.clone(),
            line,
            column,
            message: fault.message.clone(),
        }
    }
}

/// 1-based line and column (in characters) of a byte offset.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

fn parent_dir(path: Option<&Path>) -> PathBuf {
    path.and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

fn resolve_import(dir: &Path, target: &str) -> PathBuf {
    let mut path = dir.join(target);
    if path.extension().is_none() {
        path.set_extension("less");
    }
    normalize(&path)
}

/// Lexically resolve `.` and `..` so the same file is recognised whichever
/// way it was reached.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn nested_rule_compiles_to_descendant_selector() {
        assert_eq!(compile_str(".a{.b{color:red;}}").unwrap(), ".a .b {\n  color: red;\n}\n");
    }

    #[test]
    fn own_declarations_come_before_nested_rules() {
        let css = compile_str(".a { color: red; .b { color: blue; } background: white; }").unwrap();
        assert_eq!(
            css,
            ".a {\n  color: red;\n  background: white;\n}\n.a .b {\n  color: blue;\n}\n"
        );
    }

    #[test]
    fn error_reports_line_and_column() {
        let err = compile_str("// header\n.a {\n  color red;\n}\n").unwrap_err();
        assert_eq!((err.line, err.column), (3, 3));
        assert!(err.message.contains("expected ':'"), "{err}");
        assert_eq!(err.file, None);
    }

    #[test]
    fn undefined_variable_is_named() {
        let err = compile_str(".a { color: @nope; }").unwrap_err();
        assert!(err.message.contains("@nope"), "{err}");
    }

    #[test]
    fn column_counts_characters() {
        assert_eq!(line_column("é{\nab", 4), (2, 1));
        assert_eq!(line_column("ab", 1), (1, 2));
    }

    #[test]
    fn imports_are_inlined_once_and_relative_to_importer() {
        let fs = MockFileSystem::new();
        fs.add_file("app/less/style.less", "@import \"parts/vars\";\n@import \"parts/vars.less\";\n.a { color: @brand; }\n");
        fs.add_file("app/less/parts/vars.less", "@import \"../style\";\n@brand: #f00;\n");

        let css = compile_file(&fs, Path::new("app/less/style.less")).unwrap();
        assert_eq!(css, ".a {\n  color: #f00;\n}\n");
    }

    #[test]
    fn missing_import_points_at_the_import() {
        let fs = MockFileSystem::new();
        fs.add_file("main.less", "\n@import \"missing\";\n");

        let err = compile_file(&fs, Path::new("main.less")).unwrap_err();
        let less = err.downcast_ref::<LessError>().expect("LessError");
        assert_eq!(less.line, 2);
        assert_eq!(less.file.as_deref(), Some(Path::new("main.less")));
    }

    #[test]
    fn normalize_collapses_parent_components() {
        assert_eq!(normalize(Path::new("a/b/../c/./d.less")), PathBuf::from("a/c/d.less"));
    }
}
