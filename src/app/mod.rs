use std::{sync::mpsc, time::Duration};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::Backend};

use crate::{columns::LayoutStore, model::Record, ui};

mod state;

pub use state::{App, Focus, InputMode};

pub fn run_app<B: Backend, S: LayoutStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
    rx: mpsc::Receiver<Record>,
) -> Result<()> {
    loop {
        for record in rx.try_iter() {
            app.push(record);
        }

        if app.force_redraw {
            terminal.clear().ok();
            app.force_redraw = false;
        }

        terminal
            .draw(|f| ui::render(f, app))
            .context("drawing frame")?;

        if event::poll(Duration::from_millis(100)).context("polling for events")? {
            match event::read().context("reading event")? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if matches!(app.input_mode, InputMode::FilterInput) {
                        match key.code {
                            KeyCode::Char('c')
                                if key.modifiers.contains(KeyModifiers::CONTROL) =>
                            {
                                break;
                            }
                            KeyCode::Esc => {
                                app.input_mode = InputMode::Normal;
                                app.filter_buffer.clear();
                                app.filter_error = None;
                            }
                            KeyCode::Enter => {
                                let pattern = app.filter_buffer.clone();
                                app.input_mode = InputMode::Normal;
                                app.apply_filter(&pattern);
                            }
                            KeyCode::Backspace => {
                                app.filter_buffer.pop();
                            }
                            KeyCode::Char('u')
                                if key.modifiers.contains(KeyModifiers::CONTROL) =>
                            {
                                app.filter_buffer.clear();
                            }
                            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                                app.filter_buffer.push(c);
                            }
                            _ => {}
                        }
                        continue;
                    }

                    if key.code == KeyCode::Char('q')
                        || (key.code == KeyCode::Char('c')
                            && key.modifiers.contains(KeyModifiers::CONTROL))
                    {
                        break;
                    }
                    if key.modifiers.contains(KeyModifiers::CONTROL) {
                        match key.code {
                            KeyCode::Char('n') => {
                                app.next();
                                continue;
                            }
                            KeyCode::Char('p') => {
                                app.previous();
                                continue;
                            }
                            KeyCode::Char('l') => {
                                app.force_redraw = true;
                                continue;
                            }
                            _ => {}
                        }
                    }
                    if key.code == KeyCode::Char('?') {
                        app.show_help = !app.show_help;
                        continue;
                    }

                    if app.show_help {
                        match key.code {
                            KeyCode::Esc | KeyCode::Char('?') => app.show_help = false,
                            _ => {}
                        }
                        continue;
                    }

                    if matches!(app.input_mode, InputMode::ColumnSelect) {
                        match key.code {
                            KeyCode::Esc | KeyCode::Char('c') => {
                                app.input_mode = InputMode::Normal;
                            }
                            KeyCode::Char(' ') | KeyCode::Enter => {
                                app.toggle_selected_column();
                            }
                            KeyCode::Char('J') => {
                                app.move_column(1);
                            }
                            KeyCode::Char('K') => {
                                app.move_column(-1);
                            }
                            KeyCode::Char('r') => {
                                app.reset_columns();
                            }
                            KeyCode::Down | KeyCode::Char('j') => {
                                let len = app.manager.columns().len();
                                let next = app
                                    .column_select_state
                                    .selected()
                                    .map(|i| (i + 1).min(len.saturating_sub(1)))
                                    .or(Some(0));
                                app.column_select_state.select(next);
                            }
                            KeyCode::Up | KeyCode::Char('k') => {
                                let prev = app
                                    .column_select_state
                                    .selected()
                                    .map(|i| i.saturating_sub(1))
                                    .or(Some(0));
                                app.column_select_state.select(prev);
                            }
                            KeyCode::Char('g') => app.column_select_state.select(Some(0)),
                            KeyCode::Char('G') => {
                                let len = app.manager.columns().len();
                                if len > 0 {
                                    app.column_select_state.select(Some(len - 1));
                                }
                            }
                            _ => {}
                        }
                        continue;
                    }

                    match app.focus {
                        Focus::Table => match key.code {
                            KeyCode::Char('j') | KeyCode::Down => app.next(),
                            KeyCode::Char('k') | KeyCode::Up => app.previous(),
                            KeyCode::Char('h') => app.scroll_columns_left(),
                            KeyCode::Char('l') => app.scroll_columns_right(),
                            KeyCode::Char('0') => {
                                app.col_offset = 0;
                                app.force_redraw = true;
                            }
                            KeyCode::Char('c') => app.open_column_selector(),
                            KeyCode::Char('a') => app.toggle_autoscroll(),
                            KeyCode::Char('/') => {
                                app.input_mode = InputMode::FilterInput;
                                app.filter_buffer = app.filter_query.clone();
                                app.filter_error = None;
                            }
                            KeyCode::Char('z') => {
                                app.zoom = match app.zoom {
                                    Some(Focus::Table) => None,
                                    _ => Some(Focus::Table),
                                }
                            }
                            KeyCode::Char('w') => {
                                app.detail_wrap = !app.detail_wrap;
                                app.detail_scroll = 0;
                                app.force_redraw = true;
                            }
                            KeyCode::Char('g') => app.select_first(),
                            KeyCode::Char('G') => app.select_last(),
                            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                                app.page_down()
                            }
                            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                                app.page_up()
                            }
                            KeyCode::Enter | KeyCode::Tab | KeyCode::Right => {
                                app.focus = Focus::Detail;
                            }
                            _ => {}
                        },
                        Focus::Detail => match key.code {
                            KeyCode::Char('j') | KeyCode::Down => app.detail_down(1),
                            KeyCode::Char('k') | KeyCode::Up => app.detail_up(1),
                            KeyCode::Char('c') => app.open_column_selector(),
                            KeyCode::Char('/') => {
                                app.input_mode = InputMode::FilterInput;
                                app.filter_buffer = app.filter_query.clone();
                                app.filter_error = None;
                            }
                            KeyCode::Char('z') => {
                                app.zoom = match app.zoom {
                                    Some(Focus::Detail) => None,
                                    _ => Some(Focus::Detail),
                                }
                            }
                            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                                let half = (app.last_detail_height.max(1) / 2).max(1);
                                app.detail_down(half);
                            }
                            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                                let half = (app.last_detail_height.max(1) / 2).max(1);
                                app.detail_up(half);
                            }
                            KeyCode::Char('w') => {
                                app.detail_wrap = !app.detail_wrap;
                                app.detail_scroll = 0;
                                app.force_redraw = true;
                            }
                            KeyCode::Char('g') => app.detail_top(),
                            KeyCode::Char('G') => app.detail_bottom(),
                            KeyCode::Tab | KeyCode::Esc | KeyCode::Left => {
                                app.focus = Focus::Table;
                            }
                            _ => {}
                        },
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    Ok(())
}
