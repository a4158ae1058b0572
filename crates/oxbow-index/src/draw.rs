//! Debug rendering: stdout dump, Graphviz export, and a printable tree.

use crate::node::{self, InternalPage, LeafPage};
use crate::tree::BPlusTree;
use oxbow_common::page::{PageId, PageType};
use oxbow_common::{OxbowError, Result};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// One node of the printable rendering.
struct PrintableNode {
    label: String,
    children: Vec<PrintableNode>,
}

impl PrintableNode {
    fn render(&self, indent: usize, out: &mut String) {
        out.push_str(&"  ".repeat(indent));
        out.push_str(&self.label);
        out.push('\n');
        for child in &self.children {
            child.render(indent + 1, out);
        }
    }
}

impl BPlusTree {
    /// Dumps the tree to stdout.
    pub fn print(&self) -> Result<()> {
        println!("{}", self.draw_string()?);
        Ok(())
    }

    /// Writes the tree as a Graphviz digraph to `path`.
    pub fn draw(&self, path: impl AsRef<Path>) -> Result<()> {
        if self.is_empty()? {
            warn!(index = %self.name(), "drawing an empty tree");
            return Ok(());
        }

        let mut out = std::fs::File::create(path)?;
        writeln!(out, "digraph G {{")?;
        self.draw_page(self.get_root_page_id()?, &mut out)?;
        writeln!(out, "}}")?;
        Ok(())
    }

    /// Renders the tree as an indented string; `"()"` for the empty tree.
    pub fn draw_string(&self) -> Result<String> {
        if self.is_empty()? {
            return Ok("()".to_string());
        }
        let root = self.build_printable(self.get_root_page_id()?)?;
        let mut out = String::new();
        root.render(0, &mut out);
        Ok(out)
    }

    fn build_printable(&self, page_id: PageId) -> Result<PrintableNode> {
        let guard = self.pool().fetch_basic(page_id)?;
        let (label, child_ids) = {
            let data = guard.data();
            match node::page_type(&**data) {
                PageType::Leaf => {
                    let leaf = LeafPage::new(&**data);
                    let keys: Vec<String> = (0..leaf.size())
                        .map(|i| self.comparator().format_key(leaf.key_at(i)))
                        .collect();
                    (
                        format!(
                            "Leaf {} next={} [{}]",
                            page_id,
                            leaf.next_page_id(),
                            keys.join(",")
                        ),
                        Vec::new(),
                    )
                }
                PageType::Internal => {
                    let internal = InternalPage::new(&**data);
                    let keys: Vec<String> = (1..internal.size())
                        .map(|i| self.comparator().format_key(internal.key_at(i)))
                        .collect();
                    let children: Vec<PageId> =
                        (0..internal.size()).map(|i| internal.child_at(i)).collect();
                    (
                        format!("Internal {} [{}]", page_id, keys.join(",")),
                        children,
                    )
                }
                PageType::Invalid => return Err(OxbowError::InvalidNodeType),
            }
        };
        drop(guard);

        let mut children = Vec::with_capacity(child_ids.len());
        for child_id in child_ids {
            children.push(self.build_printable(child_id)?);
        }
        Ok(PrintableNode { label, children })
    }

    fn draw_page(&self, page_id: PageId, out: &mut std::fs::File) -> Result<()> {
        let guard = self.pool().fetch_basic(page_id)?;
        enum Drawn {
            Leaf { next: PageId, cells: Vec<String> },
            Internal { children: Vec<PageId>, cells: Vec<String> },
        }
        let drawn = {
            let data = guard.data();
            match node::page_type(&**data) {
                PageType::Leaf => {
                    let leaf = LeafPage::new(&**data);
                    Drawn::Leaf {
                        next: leaf.next_page_id(),
                        cells: (0..leaf.size())
                            .map(|i| self.comparator().format_key(leaf.key_at(i)))
                            .collect(),
                    }
                }
                PageType::Internal => {
                    let internal = InternalPage::new(&**data);
                    Drawn::Internal {
                        children: (0..internal.size()).map(|i| internal.child_at(i)).collect(),
                        cells: (0..internal.size())
                            .map(|i| {
                                if i == 0 {
                                    String::new()
                                } else {
                                    self.comparator().format_key(internal.key_at(i))
                                }
                            })
                            .collect(),
                    }
                }
                PageType::Invalid => return Err(OxbowError::InvalidNodeType),
            }
        };
        drop(guard);

        match drawn {
            Drawn::Leaf { next, cells } => {
                writeln!(
                    out,
                    "  LEAF_{} [shape=plain color=green label=<<TABLE BORDER=\"0\" \
                     CELLBORDER=\"1\" CELLSPACING=\"0\"><TR>{}</TR></TABLE>>];",
                    page_id.0,
                    cells
                        .iter()
                        .map(|k| format!("<TD>{}</TD>", k))
                        .collect::<String>()
                )?;
                if next.is_valid() {
                    writeln!(out, "  LEAF_{} -> LEAF_{};", page_id.0, next.0)?;
                    writeln!(out, "  {{rank=same LEAF_{} LEAF_{}}};", page_id.0, next.0)?;
                }
            }
            Drawn::Internal { children, cells } => {
                writeln!(
                    out,
                    "  INT_{} [shape=plain color=pink label=<<TABLE BORDER=\"0\" \
                     CELLBORDER=\"1\" CELLSPACING=\"0\"><TR>{}</TR></TABLE>>];",
                    page_id.0,
                    cells
                        .iter()
                        .enumerate()
                        .map(|(i, k)| format!("<TD PORT=\"p{}\">{}</TD>", children[i].0, k))
                        .collect::<String>()
                )?;
                for child_id in &children {
                    self.draw_page(*child_id, out)?;
                    let child_guard = self.pool().fetch_basic(*child_id)?;
                    let child_is_leaf = {
                        let data = child_guard.data();
                        node::page_type(&**data) == PageType::Leaf
                    };
                    let prefix = if child_is_leaf { "LEAF" } else { "INT" };
                    writeln!(
                        out,
                        "  INT_{}:p{} -> {}_{};",
                        page_id.0, child_id.0, prefix, child_id.0
                    )?;
                }
            }
        }
        Ok(())
    }
}
