//! ratatui drawing for the browser shell.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::image_panel::{ImageCell, ImagePanel};
use crate::palette::Rgb;
use crate::shell::{BrowserShell, LoadPhase};
use crate::tree_view::clamp_scroll;

pub const HELP: &str =
    "↑/↓ move  →/← expand/collapse  x/y/z axis  +/- coord  [/] coord x10  p palette  l/u lock/unlock range  q quit";

fn fmt_dims(dims: &[usize]) -> String {
    let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
    format!("[{}]", parts.join("x"))
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

pub fn draw(f: &mut Frame<'_>, shell: &BrowserShell) {
    let size = f.area();

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(size);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(outer[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(3)])
        .split(chunks[1]);

    draw_tree_panel(f, chunks[0], shell);
    draw_details_panel(f, right[0], shell);
    draw_image_panel(f, right[1], shell);
    draw_status_line(f, outer[1], shell);
}

fn draw_tree_panel(f: &mut Frame<'_>, area: Rect, shell: &BrowserShell) {
    let title = format!("Grid Hierarchy  {}", shell.title());
    let block = Block::default().title(title).borders(Borders::ALL);

    let mut lines: Vec<Line> = vec![];
    match shell.phase() {
        LoadPhase::Projecting => lines.push(Line::from("Building hierarchy…")),
        LoadPhase::Failed(msg) => {
            lines.push(Line::from(Span::styled(
                "Hierarchy could not be built:",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(msg.clone()));
        }
        LoadPhase::Ready if shell.tree().rows().is_empty() => lines.push(Line::from("No grids.")),
        LoadPhase::Ready => {
            let tree = shell.tree();
            for (i, row) in tree.rows().iter().enumerate() {
                let selected = i == tree.selected();

                let indent = "  ".repeat(row.depth);
                let glyph = if row.is_leaf() {
                    "•"
                } else if row.expanded {
                    "▾"
                } else {
                    "▸"
                };

                let name_style = if selected {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else if row.is_leaf() {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                };

                let glyph_style = if row.is_leaf() {
                    Style::default().fg(Color::Magenta)
                } else {
                    Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)
                };

                let hint = if row.is_leaf() {
                    format!("L{} {}", row.node.level, fmt_dims(&row.node.dims))
                } else {
                    format!("L{} [{} children]", row.node.level, row.node.children.len())
                };

                lines.push(Line::from(vec![
                    Span::raw(indent),
                    Span::styled(format!("{glyph} "), glyph_style),
                    Span::styled(row.node.label.clone(), name_style),
                    Span::raw(" "),
                    Span::styled(hint, Style::default().fg(Color::DarkGray)),
                ]));
            }
        }
    }

    let inner_h = area.height.saturating_sub(2);
    let scroll = if *shell.phase() == LoadPhase::Ready {
        shell.tree().visible_scroll(inner_h)
    } else {
        clamp_scroll(0, lines.len(), inner_h)
    };

    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    f.render_widget(paragraph, area);
}

fn draw_details_panel(f: &mut Frame<'_>, area: Rect, shell: &BrowserShell) {
    let block = Block::default().title("Grid").borders(Borders::ALL);
    let lines: Vec<Line> = shell
        .details_lines()
        .iter()
        .map(|s| match s.split_once(" = ") {
            Some((k, v)) => Line::from(vec![
                Span::styled(k.to_string(), Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                Span::raw(" = "),
                Span::styled(v.to_string(), Style::default().fg(Color::Green)),
            ]),
            None => Line::from(Span::raw(s.clone())),
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn image_title(shell: &BrowserShell) -> String {
    let image = shell.image();
    let range = image.range();
    let coord = match image.axis_len() {
        Some(len) => format!("{}/{}", image.coord(), len.saturating_sub(1)),
        None => image.coord().to_string(),
    };
    let lock = if image.range_override().is_some() { " locked" } else { "" };
    format!(
        "{}  axis={} coord={}  range=[{:.4e}, {:.4e}]{}  palette={}",
        shell.field_name(),
        image.axis(),
        coord,
        range.min,
        range.max,
        lock,
        image.palette()
    )
}

/// One styled line per scanline, cropped to the viewport.
pub fn image_lines(image: &ImagePanel, height: u16, width: u16) -> Vec<Line<'static>> {
    (0..height as usize)
        .map(|y| {
            let cells: Vec<ImageCell> = image.render_line(y);
            let spans: Vec<Span> = cells
                .into_iter()
                .take(width as usize)
                .map(|c| Span::styled(c.glyph.to_string(), Style::default().fg(to_color(c.fg))))
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn draw_image_panel(f: &mut Frame<'_>, area: Rect, shell: &BrowserShell) {
    let block = Block::default().title(image_title(shell)).borders(Borders::ALL);
    let inner = block.inner(area);
    let lines = if shell.image().data().is_some() {
        image_lines(shell.image(), inner.height, inner.width)
    } else {
        vec![Line::from(Span::styled("No slice.", Style::default().fg(Color::DarkGray)))]
    };
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status_line(f: &mut Frame<'_>, area: Rect, shell: &BrowserShell) {
    let line = match shell.status() {
        Some(msg) => Line::from(Span::styled(
            format!("error: {msg}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        None => Line::from(Span::styled(HELP, Style::default().fg(Color::DarkGray))),
    };
    f.render_widget(Paragraph::new(line), area);
}
