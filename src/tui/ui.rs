use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::browser;

use super::app::{ACTIONS, App, Mode};
use super::form::{self, FormField};

struct BodyLayout {
    title: Rect,
    list: Rect,
    detail: Rect,
    output: Rect,
    status: Rect,
}

fn body_layout(area: Rect) -> BodyLayout {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(outer[1]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(main[1]);

    BodyLayout {
        title: outer[0],
        list: main[0],
        detail: right[0],
        output: right[1],
        status: outer[2],
    }
}

/// Text area of the output panel for a terminal of the given size.
pub fn output_inner(area: Rect) -> Rect {
    Block::default()
        .borders(Borders::ALL)
        .inner(body_layout(area).output)
}

fn border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn label(text: &str) -> Span<'_> {
    Span::styled(text, Style::default().fg(Color::DarkGray))
}

fn value(text: impl Into<String>) -> Span<'static> {
    Span::styled(text.into(), Style::default().fg(Color::White))
}

pub fn draw(frame: &mut Frame, app: &App) {
    let layout = body_layout(frame.area());

    draw_title(frame, app, layout.title);
    if app.showing_browser() {
        draw_files(frame, app, layout.list);
        draw_file_detail(frame, app, layout.detail);
    } else {
        draw_commands(frame, app, layout.list);
        draw_command_detail(frame, app, layout.detail);
    }
    draw_output(frame, app, layout.output);
    draw_status(frame, app, layout.status);

    match app.mode {
        Mode::AddCommand => draw_form(frame, app, " Add Command "),
        Mode::EditCommand => draw_form(frame, app, " Edit Command "),
        Mode::ConfirmDelete => {
            let name = app.pending_delete.as_ref().map_or("", |c| c.name.as_str());
            draw_confirm(frame, " Delete ", &format!("Delete '{name}'?"), Color::Red);
        }
        Mode::ConfirmDiscard => {
            draw_confirm(frame, " Discard ", "Discard unsaved changes?", Color::Yellow);
        }
        Mode::Help => draw_help(frame, app),
        Mode::ActionsPanel => draw_actions(frame, app),
        Mode::PasteIntoRunBuffer => draw_paste_picker(frame, app),
        _ => {}
    }
}

fn draw_title(frame: &mut Frame, app: &App, area: Rect) {
    let title = Line::from(vec![
        Span::styled(
            " cmd-vault ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", app.browser.path().display()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(title), area);
}

fn draw_commands(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.mode == Mode::Normal;
    let block = Block::default()
        .title(format!(" Commands ({}) ", app.commands.len()))
        .borders(Borders::ALL)
        .border_style(border(focused));

    if app.commands.is_empty() {
        let msg = Paragraph::new("  No saved commands. Press 'a' to add one.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(msg, area);
        return;
    }

    let items: Vec<ListItem> = app
        .commands
        .iter()
        .enumerate()
        .map(|(i, cmd)| {
            let selected = i == app.selected;
            let style = if selected {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::styled(if selected { "▸ " } else { "  " }, style),
                Span::styled(&cmd.name, style),
                Span::styled(
                    format!("  ×{}", cmd.usage_count),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let mut state = ListState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(List::new(items).block(block), area, &mut state);
}

fn draw_command_detail(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Detail ")
        .borders(Borders::ALL)
        .border_style(border(false));

    let Some(cmd) = app.selected_command() else {
        frame.render_widget(Paragraph::new("").block(block), area);
        return;
    };

    let lines = vec![
        Line::from(vec![label("  Name: "), value(&cmd.name)]),
        Line::from(vec![
            label("  Cmd: "),
            Span::styled(&cmd.command_line, Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            label("  Used: "),
            value(format!("{} times", cmd.usage_count)),
        ]),
        Line::from(vec![
            label("  Created: "),
            value(format!(
                "{} ({})",
                cmd.created_at.format("%Y-%m-%d %H:%M"),
                cmd.age(Utc::now())
            )),
        ]),
        Line::from(vec![label("  Note: "), value(&cmd.note)]),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_files(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.mode == Mode::FileBrowser;
    let block = Block::default()
        .title(format!(" {} ", app.browser.path().display()))
        .borders(Borders::ALL)
        .border_style(border(focused));

    let entries = app.browser.entries();
    if entries.is_empty() {
        let msg = Paragraph::new("  (empty)")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(msg, area);
        return;
    }

    let items: Vec<ListItem> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let selected = i == app.browser.index();
            let color = if entry.is_dir { Color::Blue } else { Color::White };
            let mut style = Style::default().fg(color);
            if selected {
                style = style.add_modifier(Modifier::BOLD);
            }
            let name = if entry.is_dir {
                format!("{}/", entry.name)
            } else {
                entry.name.clone()
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    if selected { "▸ " } else { "  " },
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(name, style),
            ]))
        })
        .collect();

    let mut state = ListState::default().with_selected(Some(app.browser.index()));
    frame.render_stateful_widget(List::new(items).block(block), area, &mut state);
}

fn draw_file_detail(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Detail ")
        .borders(Borders::ALL)
        .border_style(border(false));

    let (Some(entry), Some(path)) = (app.browser.selected(), app.browser.selected_path()) else {
        frame.render_widget(Paragraph::new("").block(block), area);
        return;
    };

    let mut lines = vec![Line::from(vec![label("  Name: "), value(&entry.name)])];
    match browser::entry_meta(&path) {
        Ok(meta) => {
            lines.push(Line::from(vec![
                label("  Size: "),
                value(format!("{} bytes", meta.size)),
            ]));
            lines.push(Line::from(vec![
                label("  Mode: "),
                value(meta.permissions),
            ]));
            if let Some(modified) = meta.modified {
                lines.push(Line::from(vec![
                    label("  Modified: "),
                    value(modified.format("%Y-%m-%d %H:%M").to_string()),
                ]));
            }
        }
        Err(e) => lines.push(Line::from(Span::styled(
            format!("  {e}"),
            Style::default().fg(Color::Red),
        ))),
    }
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_output(frame: &mut Frame, app: &App, area: Rect) {
    let total = app.output.lines().len();
    let title = if total > 0 {
        format!(" Output [{}/{}] ", (app.output.scroll() + 1).min(total), total)
    } else {
        " Output ".to_string()
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border(app.mode == Mode::OutputFocus));

    let lines: Vec<Line> = app
        .output
        .visible()
        .iter()
        .map(|l| {
            if l.starts_with("Error: ") {
                Line::styled(l.as_str(), Style::default().fg(Color::Red))
            } else if l.starts_with("> ") {
                Line::styled(l.as_str(), Style::default().fg(Color::Cyan))
            } else {
                Line::raw(l.as_str())
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let line = match app.mode {
        Mode::RunInDirectory | Mode::PasteIntoRunBuffer => Line::from(vec![
            Span::styled(" $ ", Style::default().fg(Color::Yellow)),
            Span::raw(app.run_input.with_cursor()),
        ]),
        Mode::Executing => Line::from(vec![
            Span::styled(" ⏳ ", Style::default().fg(Color::Yellow)),
            Span::styled(
                format!("Running: {}", app.running.as_deref().unwrap_or("")),
                Style::default().fg(Color::Yellow),
            ),
        ]),
        _ => {
            let hints = if app.showing_browser() {
                "r:run here  R:run saved  s:back  ?:help"
            } else {
                "a:add  e:edit  d:delete  r:run  s:browse  ?:help  q:quit"
            };
            Line::from(vec![
                Span::styled(format!(" {} ", app.status), Style::default().fg(Color::White)),
                Span::styled(hints, Style::default().fg(Color::DarkGray)),
            ])
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_form(frame: &mut Frame, app: &App, title: &str) {
    let inner = form::render_modal(frame, title, Style::default().fg(Color::Cyan), 70, 9);
    if inner.height < 4 {
        return;
    }

    let focus = app.form.focus();
    for (row, field) in FormField::ORDER.into_iter().enumerate() {
        let input = app.form.field(field);
        let focused = field == focus;
        let text = if focused {
            input.with_cursor()
        } else {
            input.value().to_string()
        };
        let line = Line::from(vec![
            Span::styled(
                format!(" {:<6}", format!("{}:", field.label())),
                if focused {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::DarkGray)
                },
            ),
            Span::raw(text),
        ]);
        let area = Rect::new(inner.x, inner.y + row as u16 * 2, inner.width, 1);
        frame.render_widget(Paragraph::new(line), area);
    }

    let hints_area = Rect::new(inner.x, inner.y + inner.height - 1, inner.width, 1);
    form::render_hints(
        frame,
        hints_area,
        &[(" Tab", " next  "), ("Enter", " save  "), ("Esc", " cancel")],
        Style::default().fg(Color::Cyan),
        Style::default().fg(Color::DarkGray),
    );
}

fn draw_confirm(frame: &mut Frame, title: &str, question: &str, color: Color) {
    let inner = form::render_modal(frame, title, Style::default().fg(color), 44, 5);
    let lines = vec![
        Line::from(Span::styled(
            format!(" {question}"),
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        form::hint_line(
            &[(" y", " yes  "), ("n", " no")],
            Style::default().fg(color),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_help(frame: &mut Frame, app: &App) {
    let sections = app.keymap.help_entries();
    let rows: usize = sections.iter().map(|(_, e)| e.len() + 2).sum();
    let inner = form::render_modal(
        frame,
        " Help ",
        Style::default().fg(Color::Cyan),
        60,
        rows as u16 + 2,
    );

    let mut lines = Vec::new();
    for (title, entries) in sections {
        lines.push(Line::from(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));
        for entry in entries {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<18}", entry.label), Style::default().fg(Color::Yellow)),
                Span::styled(entry.description, Style::default().fg(Color::White)),
            ]));
        }
        lines.push(Line::from(""));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_actions(frame: &mut Frame, app: &App) {
    let inner = form::render_modal(
        frame,
        " Actions ",
        Style::default().fg(Color::Cyan),
        30,
        ACTIONS.len() as u16 + 2,
    );
    let items: Vec<ListItem> = ACTIONS
        .iter()
        .enumerate()
        .map(|(i, (title, _))| {
            let selected = i == app.actions_index;
            let style = if selected {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::styled(if selected { "▸ " } else { "  " }, style),
                Span::styled(*title, style),
            ]))
        })
        .collect();
    frame.render_widget(List::new(items), inner);
}

fn draw_paste_picker(frame: &mut Frame, app: &App) {
    let height = (app.commands.len() as u16 + 2).min(16);
    let inner = form::render_modal(
        frame,
        " Paste command ",
        Style::default().fg(Color::Yellow),
        60,
        height,
    );
    let items: Vec<ListItem> = app
        .commands
        .iter()
        .enumerate()
        .map(|(i, cmd)| {
            let selected = i == app.selected;
            let style = if selected {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::styled(if selected { "▸ " } else { "  " }, style),
                Span::styled(format!("{:<16}", cmd.name), style),
                Span::styled(&cmd.command_line, Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();
    let mut state = ListState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(List::new(items), inner, &mut state);
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{Terminal, backend::TestBackend};

    use super::*;
    use crate::runner::ExecOutcome;
    use crate::runner::testing::ScriptedRunner;
    use crate::store::{NewCommand, Store};

    fn test_app(cwd: &Path) -> App {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_command(&NewCommand::new("build", "cargo build", "compile it"))
            .unwrap();
        let runner = Arc::new(ScriptedRunner::new(ExecOutcome::default()));
        let mut app = App::new(store, runner, cwd.to_path_buf(), Duration::from_millis(10));
        app.resize(100, 30);
        app
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn output_area_matches_panel_geometry() {
        let inner = output_inner(Rect::new(0, 0, 100, 30));
        assert_eq!(inner.x, 41);
        assert_eq!(inner.width, 58);
        assert_eq!(inner.height, 28 - 8 - 2);
    }

    #[test]
    fn normal_screen_lists_commands_and_detail() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        let screen = render(&app);
        assert!(screen.contains("Commands (1)"));
        assert!(screen.contains("▸ build"));
        assert!(screen.contains("cargo build"));
        assert!(screen.contains("compile it"));
    }

    #[test]
    fn browser_screen_lists_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "abc").unwrap();
        let mut app = test_app(dir.path());
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::NONE));
        let screen = render(&app);
        assert!(screen.contains("src/"));
        assert!(screen.contains("notes.txt"));
        assert!(screen.contains("Size:"));
    }

    #[test]
    fn form_and_help_overlays_render() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE));
        let screen = render(&app);
        assert!(screen.contains("Add Command"));
        assert!(screen.contains("Note:"));

        app.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert!(render(&app).contains("Discard unsaved changes?"));
        app.handle_key(KeyEvent::new(KeyCode::Char('y'), KeyModifiers::NONE));

        app.handle_key(KeyEvent::new(KeyCode::Char('?'), KeyModifiers::NONE));
        assert!(render(&app).contains("Saved Commands"));
    }
}
