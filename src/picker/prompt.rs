// ABOUTME: Line-oriented front end for the host picker.
// ABOUTME: Reads row numbers, filters and navigation commands when input is not a terminal.

use super::{Navigator, Selection, filter, render_row};
use crate::config::HostDescriptor;
use std::io::{self, BufRead, Write};

/// One line of picker input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `<n>`: select the n-th visible row (1-based).
    Select(usize),
    /// `!<n>`: choose the n-th visible row even if it has children.
    ChooseHere(usize),
    /// `/<text>`: show only matching rows; `/` alone clears the filter.
    Filter(String),
    /// `..`: go back to the parent level.
    Back,
    /// `q`: leave without choosing.
    Quit,
    /// Blank line: redraw.
    Redraw,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => Command::Redraw,
            ".." => Command::Back,
            "q" | "quit" => Command::Quit,
            _ => {
                if let Some(query) = line.strip_prefix('/') {
                    return Command::Filter(query.to_string());
                }
                if let Some(n) = line.strip_prefix('!').and_then(|n| n.parse().ok()) {
                    return Command::ChooseHere(n);
                }
                match line.parse() {
                    Ok(n) => Command::Select(n),
                    Err(_) => Command::Unknown(line.to_string()),
                }
            }
        }
    }
}

/// Let the operator walk the tree and pick a host.
///
/// Returns None when the operator quits or input ends.
pub fn pick<'a, R, W>(
    roots: &'a [HostDescriptor],
    input: &mut R,
    output: &mut W,
) -> io::Result<Option<&'a HostDescriptor>>
where
    R: BufRead,
    W: Write,
{
    if roots.is_empty() {
        writeln!(output, "no hosts configured")?;
        return Ok(None);
    }

    let mut nav = Navigator::new(roots);
    let mut query = String::new();

    loop {
        let visible = filter(nav.nodes(), &query);
        draw(output, &nav, &visible, &query)?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let row = |n: usize| n.checked_sub(1).and_then(|i| visible.get(i).copied());

        match Command::parse(&line) {
            Command::Quit => return Ok(None),
            Command::Redraw => {}
            Command::Back => {
                if nav.back() {
                    query.clear();
                } else {
                    writeln!(output, "already at the top level")?;
                }
            }
            Command::Filter(q) => query = q,
            Command::Select(n) => match row(n).and_then(|i| nav.select(i)) {
                Some(Selection::Chosen(host)) => return Ok(Some(host)),
                Some(Selection::Descended) => query.clear(),
                None => writeln!(output, "no such entry: {n}")?,
            },
            Command::ChooseHere(n) => match row(n).and_then(|i| nav.choose(i)) {
                Some(host) => return Ok(Some(host)),
                None => writeln!(output, "no such entry: {n}")?,
            },
            Command::Unknown(text) => writeln!(output, "unrecognized input: {text}")?,
        }
    }
}

fn draw<W: Write>(output: &mut W, nav: &Navigator<'_>, visible: &[usize], query: &str) -> io::Result<()> {
    let path = nav.path();
    if path.is_empty() {
        writeln!(output, "✨ select host")?;
    } else {
        writeln!(output, "✨ select host ({})", path.join(" / "))?;
    }
    if !query.is_empty() {
        writeln!(output, "   filter: {query}")?;
    }

    let nodes = nav.nodes();
    for (position, &index) in visible.iter().enumerate() {
        let row = render_row(&nodes[index], index == nav.selected());
        writeln!(output, "{:>3} {row}", position + 1)?;
    }

    let back = if nav.depth() > 0 { ", .. back" } else { "" };
    write!(output, "number, !number, /filter{back}, q> ")?;
    output.flush()
}
