use std::fmt::Write as _;

use ratatui::buffer::{Buffer, Cell};
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::widgets::{Block, Gauge, Row, Table, Widget as _};

use crate::error::AppResult;
use crate::presenter::widget::{Widget, WidgetKind};

/// Draw surface for registered widgets. Called after every plot and update.
pub trait Renderer {
    /// # Errors
    ///
    /// Implementations return `AppError::Render` when drawing fails.
    fn redraw(&mut self, widget: &Widget) -> AppResult<()>;
}

/// Discards redraw requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn redraw(&mut self, _widget: &Widget) -> AppResult<()> {
        Ok(())
    }
}

/// Writes a text rendition of each redrawn widget to the log.
#[derive(Debug, Clone, Copy)]
pub struct TracingRenderer {
    /// Table rows shown per redraw
    pub max_rows: usize,
}

impl Default for TracingRenderer {
    fn default() -> Self {
        Self { max_rows: 5 }
    }
}

impl Renderer for TracingRenderer {
    fn redraw(&mut self, widget: &Widget) -> AppResult<()> {
        let text = render_text(widget, self.max_rows);
        tracing::info!(widget = %widget.id, "\n{text}");
        Ok(())
    }
}

const GAUGE_WIDTH: u16 = 40;
const TABLE_WIDTH: u16 = 80;

/// Plain-text rendition of a widget.
///
/// Gauges and tables are drawn with ratatui into an off-screen buffer and
/// read back cell by cell, so styling is lost but layout is kept.
#[must_use]
pub fn render_text(widget: &Widget, max_rows: usize) -> String {
    match &widget.kind {
        WidgetKind::Gauge(gauge) => {
            let ratio = gauge
                .segments()
                .map(|[filled, _]| filled / gauge.channel.gauge_max())
                .filter(|r| r.is_finite())
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);
            let label = match gauge.reading {
                Some(_) => format!("{} ({:.0}%)", gauge.label(), ratio * 100.0),
                None => gauge.label(),
            };
            let area = Rect::new(0, 0, GAUGE_WIDTH, 3);
            let mut buf = Buffer::empty(area);
            Gauge::default()
                .block(Block::bordered().title(gauge.channel.name()))
                .gauge_style(Style::default().fg(Color::Blue))
                .ratio(ratio)
                .label(label)
                .render(area, &mut buf);
            buffer_lines(&buf).join("\n")
        }
        WidgetKind::Line(chart) => {
            let mut out = chart.title.clone();
            for series in &chart.series {
                let _ = match series.points.last() {
                    Some((_, v)) => write!(out, "\n  {} ({} points, last {v:.3})", series.name, series.len()),
                    None => write!(out, "\n  {} (no points)", series.name),
                };
            }
            out
        }
        WidgetKind::Table(table) => {
            let width = table
                .columns
                .len()
                .max(table.rows.first().map_or(0, Vec::len));
            if width == 0 {
                return String::new();
            }
            let shown = table.rows.len().min(max_rows);
            let rows = table.rows[..shown].iter().map(|row| Row::new(row.clone()));
            let height = u16::try_from(shown + 1).unwrap_or(u16::MAX);
            let area = Rect::new(0, 0, TABLE_WIDTH, height);
            let mut buf = Buffer::empty(area);
            Table::new(rows, vec![Constraint::Fill(1); width])
                .header(Row::new(table.columns.clone()).style(Style::default().bold()))
                .render(area, &mut buf);

            let mut lines = buffer_lines(&buf);
            if table.rows.len() > shown {
                lines.push(format!("... {} more", table.rows.len() - shown));
            }
            lines.join("\n")
        }
    }
}

fn buffer_lines(buf: &Buffer) -> Vec<String> {
    buf.content
        .chunks(usize::from(buf.area.width).max(1))
        .map(|row| row.iter().map(Cell::symbol).collect::<String>().trim_end().to_string())
        .collect()
}
