// ABOUTME: Host picker over the inventory tree.
// ABOUTME: Navigation is an explicit stack of frames; going back pops a frame.

mod live;
mod prompt;

pub use live::{Key, LiveSelect, PAGE_SIZE, Step, pick_live};
pub use prompt::{Command, pick};

use crate::config::HostDescriptor;
use std::io::{self, IsTerminal};

/// Run the picker on the process's terminal.
///
/// The key-driven picker needs a terminal on both ends; piped input falls
/// back to the line prompt.
pub fn pick_from_terminal(roots: &[HostDescriptor]) -> io::Result<Option<&HostDescriptor>> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    if !roots.is_empty() && stdin.is_terminal() && stdout.is_terminal() {
        return pick_live(roots);
    }
    pick(roots, &mut stdin.lock(), &mut stdout.lock())
}

/// Outcome of selecting a row.
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    /// The row had children and is now the current level.
    Descended,
    /// The row is a connection target.
    Chosen(&'a HostDescriptor),
}

#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    nodes: &'a [HostDescriptor],
    selected: usize,
}

/// Cursor into the inventory tree.
#[derive(Debug, Clone)]
pub struct Navigator<'a> {
    frames: Vec<Frame<'a>>,
}

impl<'a> Navigator<'a> {
    pub fn new(roots: &'a [HostDescriptor]) -> Self {
        Self {
            frames: vec![Frame {
                nodes: roots,
                selected: 0,
            }],
        }
    }

    fn top(&self) -> Frame<'a> {
        // frames is never empty: back() refuses to pop the root frame
        self.frames[self.frames.len() - 1]
    }

    /// Nodes at the current level.
    pub fn nodes(&self) -> &'a [HostDescriptor] {
        self.top().nodes
    }

    /// Index of the last row selected at the current level.
    pub fn selected(&self) -> usize {
        self.top().selected
    }

    /// Number of levels below the roots.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Names of the nodes descended into, outermost first.
    pub fn path(&self) -> Vec<&'a str> {
        self.frames[..self.frames.len() - 1]
            .iter()
            .map(|frame| frame.nodes[frame.selected].name.as_str())
            .collect()
    }

    /// Select row `index`: descend into a node with children, or choose a leaf.
    pub fn select(&mut self, index: usize) -> Option<Selection<'a>> {
        let frame = self.frames.last_mut()?;
        let nodes = frame.nodes;
        let node = nodes.get(index)?;
        frame.selected = index;

        if node.is_leaf() {
            Some(Selection::Chosen(node))
        } else {
            self.frames.push(Frame {
                nodes: &node.children,
                selected: 0,
            });
            Some(Selection::Descended)
        }
    }

    /// Choose row `index` as the target even if it has children.
    pub fn choose(&mut self, index: usize) -> Option<&'a HostDescriptor> {
        let frame = self.frames.last_mut()?;
        let nodes = frame.nodes;
        let node = nodes.get(index)?;
        frame.selected = index;
        Some(node)
    }

    /// Return to the parent level. False at the top level.
    pub fn back(&mut self) -> bool {
        if self.frames.len() > 1 {
            self.frames.pop();
            true
        } else {
            false
        }
    }
}

/// Whether `node` matches a search query.
///
/// A query with spaces matches when every keyword occurs in the node's
/// name, user or host; otherwise the whole query must occur.
pub fn matches(node: &HostDescriptor, query: &str) -> bool {
    let content = node.search_text();
    if query.contains(' ') {
        query
            .split(' ')
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .all(|keyword| content.contains(keyword))
    } else {
        content.contains(query)
    }
}

/// Indices of `nodes` matching `query`, in order.
pub fn filter(nodes: &[HostDescriptor], query: &str) -> Vec<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| matches(node, query))
        .map(|(i, _)| i)
        .collect()
}

/// One picker row: `name user@host`, marked when active.
pub fn render_row(node: &HostDescriptor, active: bool) -> String {
    let marker = if active { "➤" } else { " " };
    let mut row = format!("{marker} {}", node.name);
    if !node.host.is_empty() {
        row.push(' ');
        if !node.user.is_empty() {
            row.push_str(&node.user);
            row.push('@');
        }
        row.push_str(&node.host);
    }
    if !node.is_leaf() {
        row.push_str(" ›");
    }
    row
}
