// src/less/printer.rs

//! CSS output in lessc's default (non-compressed) layout.

use crate::less::eval::{Decl, FlatItem, Output};

#[derive(Debug)]
enum CssNode<'a> {
    Rule {
        selectors: &'a [String],
        decls: &'a [Decl],
    },
    Statement {
        name: &'a str,
        prelude: &'a str,
    },
    Block {
        name: &'a str,
        prelude: &'a str,
        children: Vec<CssNode<'a>>,
    },
}

/// Render evaluated output: `@charset` first, then CSS imports, then rules.
pub fn print(output: &Output) -> String {
    let mut css = String::new();

    if let Some(charset) = &output.charset {
        css.push_str(&format!("@charset {charset};\n"));
    }
    for import in &output.imports {
        css.push_str(&format!("@import {import};\n"));
    }

    for node in build(&output.items, 0) {
        write_node(&mut css, &node, 0);
    }
    css
}

/// Group consecutive items that share the wrapper at `depth` into one block.
fn build(items: &[FlatItem], depth: usize) -> Vec<CssNode<'_>> {
    let mut nodes = Vec::new();
    let mut i = 0;

    while i < items.len() {
        let Some(wrapper) = items[i].wrappers().get(depth) else {
            nodes.push(leaf(&items[i]));
            i += 1;
            continue;
        };

        let mut end = i + 1;
        while end < items.len() && items[end].wrappers().get(depth).map(|w| w.id) == Some(wrapper.id) {
            end += 1;
        }
        nodes.push(CssNode::Block {
            name: &wrapper.name,
            prelude: &wrapper.prelude,
            children: build(&items[i..end], depth + 1),
        });
        i = end;
    }

    nodes
}

fn leaf(item: &FlatItem) -> CssNode<'_> {
    match item {
        FlatItem::Rule { selectors, decls, .. } => CssNode::Rule { selectors, decls },
        FlatItem::Statement { name, prelude, .. } => CssNode::Statement { name, prelude },
    }
}

fn indent(css: &mut String, level: usize) {
    for _ in 0..level {
        css.push_str("  ");
    }
}

fn write_decls(css: &mut String, decls: &[Decl], level: usize) {
    for decl in decls {
        indent(css, level);
        css.push_str(&decl.name);
        css.push_str(": ");
        css.push_str(&decl.value);
        if decl.important {
            css.push_str(" !important");
        }
        css.push_str(";\n");
    }
}

fn write_node(css: &mut String, node: &CssNode<'_>, level: usize) {
    match node {
        CssNode::Rule { selectors, decls } if selectors.is_empty() => {
            write_decls(css, decls, level);
        }
        CssNode::Rule { selectors, decls } => {
            for (i, selector) in selectors.iter().enumerate() {
                indent(css, level);
                css.push_str(selector);
                css.push_str(if i + 1 == selectors.len() { " {\n" } else { ",\n" });
            }
            write_decls(css, decls, level + 1);
            indent(css, level);
            css.push_str("}\n");
        }
        CssNode::Statement { name, prelude } => {
            indent(css, level);
            css.push('@');
            css.push_str(name);
            if !prelude.is_empty() {
                css.push(' ');
                css.push_str(prelude);
            }
            css.push_str(";\n");
        }
        CssNode::Block {
            name,
            prelude,
            children,
        } => {
            indent(css, level);
            css.push('@');
            css.push_str(name);
            if !prelude.is_empty() {
                css.push(' ');
                css.push_str(prelude);
            }
            css.push_str(" {\n");
            for child in children {
                write_node(css, child, level + 1);
            }
            indent(css, level);
            css.push_str("}\n");
        }
    }
}
