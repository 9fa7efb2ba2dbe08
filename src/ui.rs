use ratatui::{
    prelude::*,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Wrap},
};
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use crate::{
    app::{App, Focus, InputMode},
    columns::LayoutStore,
    model::Record,
};

const MIN_COL_WIDTH: u16 = 4;
const MAX_COL_WIDTH: u16 = 40;
const COL_SPACING: u16 = 1;
const WIDTH_SAMPLE_ROWS: usize = 50;

pub fn render<S: LayoutStore>(f: &mut Frame, app: &mut App<S>) {
    let full_area = f.size();
    f.render_widget(Clear, full_area);

    let show_status = !matches!(app.input_mode, InputMode::Normal)
        || app.filter_error.is_some()
        || !app.filter_query.is_empty()
        || app.manager.persistence_error().is_some();

    let status_lines = if show_status {
        Some(status_lines(app))
    } else {
        None
    };

    let vertical = match &status_lines {
        Some(lines) => {
            let needed_height = (lines.len() as u16).saturating_add(2).max(3);
            Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(needed_height)])
                .split(full_area)
        }
        None => Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3)])
            .split(full_area),
    };

    let area = vertical[0];
    let chunks = match app.zoom {
        Some(Focus::Table) => vec![area, Rect::new(0, 0, 0, 0)],
        Some(Focus::Detail) => vec![Rect::new(0, 0, 0, 0), area],
        None => Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area)
            .to_vec(),
    };

    render_table(f, chunks[0], app);

    if chunks[1].width > 0 && chunks[1].height > 0 {
        render_detail(f, chunks[1], app);
    }

    if app.show_help {
        render_help(f, full_area);
    } else if let Some(lines) = status_lines {
        render_status(f, vertical[vertical.len() - 1], lines);
    }

    if matches!(app.input_mode, InputMode::ColumnSelect) {
        render_column_selector(f, full_area, app);
    }
}

fn render_table<S: LayoutStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    // borders plus the header row
    app.last_table_height = area.height.saturating_sub(3) as usize;
    let inner_width = area.width.saturating_sub(2);

    let visible = app.visible_columns();
    app.clamp_col_offset(visible.len());

    let sample: Vec<&Record> = app
        .filtered_indices
        .iter()
        .rev()
        .take(WIDTH_SAMPLE_ROWS)
        .filter_map(|&idx| app.records.get(idx))
        .collect();
    let desired: Vec<u16> = visible
        .iter()
        .map(|id| desired_width(id, &sample))
        .collect();
    let count = fit_count(&desired, app.col_offset, inner_width);
    let window = &visible[app.col_offset..app.col_offset + count];
    let widths: Vec<Constraint> = desired[app.col_offset..app.col_offset + count]
        .iter()
        .map(|&w| Constraint::Length(w))
        .collect();

    let header = Row::new(
        window
            .iter()
            .map(|id| Cell::from(id.clone()))
            .collect::<Vec<_>>(),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = app
        .filtered_indices
        .iter()
        .filter_map(|&idx| app.records.get(idx))
        .map(|record| {
            Row::new(
                window
                    .iter()
                    .map(|id| Cell::from(record.cell_text(id)))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    let mut title = format!("Table: {}", app.manager.table_id());
    if !app.filter_query.is_empty() {
        title.push_str(&format!(" [/{}]", app.filter_query));
    }
    if app.col_offset > 0 || app.col_offset + count < visible.len() {
        title.push_str(&format!(
            " [cols {}-{}/{}]",
            app.col_offset + 1,
            app.col_offset + count,
            visible.len()
        ));
    }

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(match app.focus {
            Focus::Table => Style::default().fg(Color::Cyan),
            Focus::Detail => Style::default(),
        });

    if window.is_empty() {
        let hint = if app.records.is_empty() {
            "Waiting for records..."
        } else {
            "[no visible columns]"
        };
        f.render_widget(Paragraph::new(hint).block(block), area);
        return;
    }

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .column_spacing(COL_SPACING)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▸ ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_detail<S: LayoutStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    app.last_detail_height = area.height.saturating_sub(2) as usize;
    let detail_text = record_details(app.current_record());
    let inner_width = area.width.saturating_sub(2) as usize;
    app.detail_total_lines = if app.detail_wrap {
        wrapped_height(&detail_text, inner_width)
    } else {
        detail_text.lines.len()
    };
    let max_offset = app
        .detail_total_lines
        .saturating_sub(app.last_detail_height.max(1));
    if app.detail_scroll as usize > max_offset {
        app.detail_scroll = max_offset as u16;
    }

    let block = Block::default()
        .title("Record")
        .borders(Borders::ALL)
        .border_style(match app.focus {
            Focus::Detail => Style::default().fg(Color::Cyan),
            Focus::Table => Style::default(),
        });

    let mut detail = Paragraph::new(detail_text)
        .block(block)
        .scroll((app.detail_scroll, 0));
    if app.detail_wrap {
        detail = detail.wrap(Wrap { trim: false });
    }
    f.render_widget(detail, area);
}

fn record_details(record: Option<Record>) -> Text<'static> {
    let Some(record) = record else {
        return Text::from("Waiting for records...");
    };
    let mut lines: Vec<Line<'static>> = Vec::new();
    flatten_value("", &record.raw, &mut lines);
    if lines.is_empty() {
        lines.push(Line::from("(empty record)"));
    }
    Text::from(lines)
}

fn flatten_value(prefix: &str, value: &Value, out: &mut Vec<Line<'static>>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_value(&path, child, out);
            }
        }
        Value::Array(arr) => {
            if arr.is_empty() {
                out.push(leaf_line(prefix, Span::raw("[]")));
                return;
            }
            for (idx, child) in arr.iter().enumerate() {
                flatten_value(&format!("{prefix}[{idx}]"), child, out);
            }
        }
        _ => out.push(leaf_line(prefix, value_span(value))),
    }
}

fn leaf_line(path: &str, value: Span<'static>) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{path}: "), Style::default().fg(Color::Cyan)),
        value,
    ])
}

fn value_span(value: &Value) -> Span<'static> {
    match value {
        Value::String(s) => Span::styled(s.clone(), Style::default().fg(Color::Green)),
        Value::Number(n) => Span::styled(n.to_string(), Style::default().fg(Color::Yellow)),
        Value::Bool(b) => Span::styled(b.to_string(), Style::default().fg(Color::Magenta)),
        Value::Null => Span::styled("null".to_string(), Style::default().fg(Color::Gray)),
        other => Span::raw(other.to_string()),
    }
}

fn desired_width(id: &str, sample: &[&Record]) -> u16 {
    let mut width = UnicodeWidthStr::width(id);
    for record in sample {
        width = width.max(UnicodeWidthStr::width(record.cell_text(id).as_str()));
    }
    (width as u16).clamp(MIN_COL_WIDTH, MAX_COL_WIDTH)
}

/// How many columns fit from `offset` into `available` cells. The column at
/// the offset is always taken so scrolling cannot get stuck.
fn fit_count(widths: &[u16], offset: usize, available: u16) -> usize {
    let mut used = 0u16;
    let mut count = 0usize;
    for &width in widths.iter().skip(offset) {
        let needed = if count > 0 {
            width.saturating_add(COL_SPACING)
        } else {
            width
        };
        if count > 0 && used.saturating_add(needed) > available {
            break;
        }
        used = used.saturating_add(needed);
        count += 1;
    }
    count
}

fn render_column_selector<S: LayoutStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let width = (area.width.saturating_sub(10)).min(90).max(40);
    let height = (app.manager.columns().len() as u16 + 4)
        .min(area.height.saturating_sub(2))
        .max(6);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let popup = Rect::new(x, y, width, height);

    let items: Vec<ListItem> = app
        .manager
        .columns()
        .iter()
        .map(|col| {
            let marker = if col.visible { "[x]" } else { "[ ]" };
            let mut text = format!("{marker} {}", col.id);
            if col.locked {
                text.push_str(" (locked)");
            }
            if !app.discovered.contains(&col.id) {
                text.push_str(" (not in data)");
            }
            ListItem::new(text)
        })
        .collect();

    let title = format!(
        "Columns: {} (space toggle, J/K move, r reset, Esc close)",
        app.manager.table_id()
    );
    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▸ ");

    f.render_widget(Clear, popup);
    f.render_stateful_widget(list, popup, &mut app.column_select_state);
}

fn status_lines<S: LayoutStore>(app: &App<S>) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();
    if matches!(app.input_mode, InputMode::ColumnSelect) {
        lines.push(Line::from(
            "Columns: j/k move cursor, space/enter toggle, J/K move column, r reset, Esc close",
        ));
    } else if matches!(app.input_mode, InputMode::FilterInput) {
        lines.push(Line::from(format!(
            "Filter (regex): {}_",
            app.filter_buffer
        )));
    } else if !app.filter_query.is_empty() {
        lines.push(Line::from(format!(
            "Filter: /{}/ ({})",
            app.filter_query,
            app.filtered_indices.len()
        )));
    } else {
        lines.push(Line::from("Filter: (none)"));
    }

    if let Some(err) = &app.filter_error {
        lines.push(Line::styled(
            format!("Filter error: {err}"),
            Style::default().fg(Color::Red),
        ));
    }
    if let Some(err) = app.manager.persistence_error() {
        lines.push(Line::styled(
            format!("Layout not saved: {err}"),
            Style::default().fg(Color::Red),
        ));
    }
    lines
}

fn render_status(f: &mut Frame, area: Rect, lines: Vec<Line<'static>>) {
    let block = Block::default().borders(Borders::ALL);
    let status = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(status, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    let mut entries = all_shortcuts();
    entries.sort_by(|a, b| a.context.cmp(b.context));
    let mut current_context: Option<&str> = None;
    for sc in entries {
        if current_context != Some(sc.context) {
            if current_context.is_some() {
                lines.push(Line::from(""));
            }
            current_context = Some(sc.context);
            lines.push(Line::styled(
                sc.context,
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:20}", sc.keys),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(sc.description),
        ]));
    }

    let width = (area.width.saturating_sub(10)).min(90).max(50);
    let needed_height = (lines.len() as u16).saturating_add(2);
    let max_allowed = area.height.saturating_sub(2);
    let height = needed_height.min(max_allowed).max(8);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let popup = Rect::new(x, y, width, height);

    let block = Block::default().title("Shortcuts").borders(Borders::ALL);
    let help = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, popup);
    f.render_widget(help, popup);
}

fn wrapped_height(text: &Text<'_>, width: usize) -> usize {
    let effective_width = width.max(1);
    let mut total = 0usize;
    for line in &text.lines {
        let line_width: usize = line
            .spans
            .iter()
            .map(|s| UnicodeWidthStr::width(s.content.as_ref()))
            .sum();
        let wrapped = if line_width == 0 {
            1
        } else {
            line_width.div_ceil(effective_width)
        };
        total += wrapped.max(1);
    }
    total
}

#[derive(Clone, Copy)]
struct Shortcut {
    context: &'static str,
    keys: &'static str,
    description: &'static str,
}

fn all_shortcuts() -> Vec<Shortcut> {
    vec![
        Shortcut {
            context: "Global",
            keys: "q",
            description: "Quit",
        },
        Shortcut {
            context: "Global",
            keys: "Ctrl+C",
            description: "Quit",
        },
        Shortcut {
            context: "Global",
            keys: "?",
            description: "Toggle help",
        },
        Shortcut {
            context: "Global",
            keys: "/",
            description: "Filter records (regex)",
        },
        Shortcut {
            context: "Global",
            keys: "c",
            description: "Open column selector",
        },
        Shortcut {
            context: "Global",
            keys: "Ctrl+L",
            description: "Force redraw",
        },
        Shortcut {
            context: "Global",
            keys: "Ctrl+N",
            description: "Next record (any pane)",
        },
        Shortcut {
            context: "Global",
            keys: "Ctrl+P",
            description: "Previous record (any pane)",
        },
        Shortcut {
            context: "Table",
            keys: "j/k, Up/Down",
            description: "Move selection",
        },
        Shortcut {
            context: "Table",
            keys: "h/l",
            description: "Scroll columns",
        },
        Shortcut {
            context: "Table",
            keys: "0",
            description: "First column",
        },
        Shortcut {
            context: "Table",
            keys: "a",
            description: "Toggle autoscroll",
        },
        Shortcut {
            context: "Table",
            keys: "Ctrl+d / Ctrl+u",
            description: "Half-page down/up",
        },
        Shortcut {
            context: "Table",
            keys: "g / G",
            description: "Jump to top/bottom",
        },
        Shortcut {
            context: "Table",
            keys: "Enter, Tab, Right",
            description: "Focus record detail",
        },
        Shortcut {
            context: "Table",
            keys: "z",
            description: "Toggle zoom (table)",
        },
        Shortcut {
            context: "Detail",
            keys: "j/k, Up/Down",
            description: "Scroll detail",
        },
        Shortcut {
            context: "Detail",
            keys: "Ctrl+d / Ctrl+u",
            description: "Half-page down/up",
        },
        Shortcut {
            context: "Detail",
            keys: "g / G",
            description: "Jump to top/bottom",
        },
        Shortcut {
            context: "Detail",
            keys: "w",
            description: "Toggle line wrap",
        },
        Shortcut {
            context: "Detail",
            keys: "z",
            description: "Toggle zoom (detail)",
        },
        Shortcut {
            context: "Detail",
            keys: "Tab, Left, Esc",
            description: "Back to table",
        },
        Shortcut {
            context: "Columns",
            keys: "j/k, g/G",
            description: "Move cursor",
        },
        Shortcut {
            context: "Columns",
            keys: "Space, Enter",
            description: "Toggle visibility",
        },
        Shortcut {
            context: "Columns",
            keys: "J / K",
            description: "Move column down/up",
        },
        Shortcut {
            context: "Columns",
            keys: "r",
            description: "Reset layout",
        },
        Shortcut {
            context: "Columns",
            keys: "Esc, c",
            description: "Close selector",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fit_count_takes_columns_until_the_width_runs_out() {
        // 10 + 1 + 10 fits in 21, the third column does not
        assert_eq!(fit_count(&[10, 10, 10], 0, 21), 2);
        assert_eq!(fit_count(&[10, 10, 10], 0, 32), 3);
    }

    #[test]
    fn fit_count_always_takes_the_offset_column() {
        assert_eq!(fit_count(&[50], 0, 10), 1);
        assert_eq!(fit_count(&[10, 50], 1, 10), 1);
    }

    #[test]
    fn fit_count_respects_the_offset() {
        assert_eq!(fit_count(&[10, 10, 10], 2, 80), 1);
        assert_eq!(fit_count(&[], 0, 80), 0);
    }

    #[test]
    fn desired_width_is_clamped() {
        let record = Record::new(json!({
            "long": "x".repeat(200),
            "s": "y",
        }));
        let sample = vec![&record];
        assert_eq!(desired_width("long", &sample), MAX_COL_WIDTH);
        assert_eq!(desired_width("s", &sample), MIN_COL_WIDTH);
    }

    #[test]
    fn wrapped_height_counts_wrapped_lines() {
        let text = Text::from(vec![
            Line::from("1234567890"),
            Line::from(""),
            Line::from("12345"),
        ]);
        assert_eq!(wrapped_height(&text, 5), 4);
    }

    #[test]
    fn record_details_flattens_nested_paths() {
        let text = record_details(Some(Record::new(json!({
            "a": { "b": [1, 2] },
            "c": null,
        }))));
        let rendered: Vec<String> = text
            .lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|s| s.content.as_ref())
                    .collect::<String>()
            })
            .collect();
        assert_eq!(rendered, vec!["a.b[0]: 1", "a.b[1]: 2", "c: null"]);
    }
}
