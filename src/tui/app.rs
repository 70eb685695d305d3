use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;

use crate::browser::FileBrowser;
use crate::runner::{Completion, Dispatcher, Job, JobOrigin, Runner};
use crate::store::{NewCommand, SavedCommand, Store};

use super::event::{self, AppEvent};
use super::form::{CommandForm, TextInput};
use super::keymap::{Action, KeyMap};
use super::output::OutputPanel;
use super::ui;

/// Exactly one of these is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    AddCommand,
    EditCommand,
    ConfirmDelete,
    ConfirmDiscard,
    Help,
    ActionsPanel,
    FileBrowser,
    RunInDirectory,
    PasteIntoRunBuffer,
    OutputFocus,
    Executing,
}

/// Entries of the actions menu, in display order.
pub const ACTIONS: [(&str, Action); 3] = [
    ("Add command", Action::AddCommand),
    ("Edit command", Action::EditCommand),
    ("Delete command", Action::DeleteCommand),
];

pub struct App {
    pub store: Store,
    pub should_quit: bool,
    pub mode: Mode,
    /// Where `Executing`, `ConfirmDiscard`, `Help` and `OutputFocus` go back to.
    return_to: Mode,
    pub keymap: KeyMap,
    dispatcher: Dispatcher,
    tick_rate: Duration,

    // Saved commands
    pub commands: Vec<SavedCommand>,
    pub selected: usize,

    // Add / edit form
    pub form: CommandForm,
    edit_target: Option<SavedCommand>,
    pub pending_delete: Option<SavedCommand>,

    pub browser: FileBrowser,
    pub run_input: TextInput,
    pub output: OutputPanel,
    pub actions_index: usize,
    /// Command line of the job in flight, for the status bar.
    pub running: Option<String>,
    pub status: String,

    clipboard: Option<arboard::Clipboard>,
}

impl App {
    pub fn new(store: Store, runner: Arc<dyn Runner>, cwd: PathBuf, tick_rate: Duration) -> Self {
        let mut app = App {
            store,
            should_quit: false,
            mode: Mode::Normal,
            return_to: Mode::Normal,
            keymap: KeyMap::default_keymap(),
            dispatcher: Dispatcher::new(runner),
            tick_rate,
            commands: Vec::new(),
            selected: 0,
            form: CommandForm::blank(),
            edit_target: None,
            pending_delete: None,
            browser: FileBrowser::new(cwd),
            run_input: TextInput::default(),
            output: OutputPanel::default(),
            actions_index: 0,
            running: None,
            status: String::new(),
            clipboard: None,
        };
        app.reload_commands();
        if let Err(e) = app.browser.reload() {
            app.report("Cannot list directory", &e);
        }
        app
    }

    pub fn selected_command(&self) -> Option<&SavedCommand> {
        self.commands.get(self.selected)
    }

    /// Whether the left pane shows the file browser rather than the command list.
    pub fn showing_browser(&self) -> bool {
        let base = match self.mode {
            Mode::Executing | Mode::Help | Mode::OutputFocus => self.return_to,
            mode => mode,
        };
        matches!(
            base,
            Mode::FileBrowser | Mode::RunInDirectory | Mode::PasteIntoRunBuffer
        )
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let size = terminal.size()?;
        self.resize(size.width, size.height);

        loop {
            terminal.draw(|frame| ui::draw(frame, self))?;

            if let Some(done) = self.dispatcher.try_complete() {
                self.on_completion(done);
                continue;
            }

            match event::poll(self.tick_rate)? {
                AppEvent::Key(key) => self.handle_key(key),
                AppEvent::Resize(cols, rows) => self.resize(cols, rows),
                AppEvent::Tick => {}
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    /// Keep the output panel's wrap width in step with the terminal.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let area = ui::output_inner(Rect::new(0, 0, cols, rows));
        self.output
            .resize(usize::from(area.width), usize::from(area.height));
    }

    // ── Input ────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent) {
        let (code, modifiers) = (key.code, key.modifiers);
        // No cancellation: everything, quit included, waits for the completion.
        if self.mode == Mode::Executing {
            return;
        }

        let before = self.mode;
        match self.mode {
            Mode::Normal => {
                if let Some(action) = self.keymap.lookup_normal(code, modifiers) {
                    self.apply_normal_action(action);
                }
            }
            Mode::FileBrowser => {
                if let Some(action) = self.keymap.lookup_browser(code, modifiers) {
                    self.apply_browser_action(action);
                }
            }
            Mode::AddCommand | Mode::EditCommand => self.handle_form_key(code, modifiers),
            Mode::ConfirmDelete => self.handle_confirm_delete_key(code),
            Mode::ConfirmDiscard => self.handle_confirm_discard_key(code),
            Mode::Help => {
                if matches!(code, KeyCode::Esc | KeyCode::Char('?' | 'q')) {
                    self.set_mode(self.return_to);
                }
            }
            Mode::ActionsPanel => self.handle_actions_key(code),
            Mode::RunInDirectory => self.handle_run_input_key(code, modifiers),
            Mode::PasteIntoRunBuffer => self.handle_paste_key(code),
            Mode::OutputFocus => self.handle_output_key(code),
            Mode::Executing => {}
        }

        if self.mode != before {
            tracing::debug!(from = ?before, to = ?self.mode, "mode change");
        }
    }

    /// Normal-mode intents. The actions panel calls this directly.
    fn apply_normal_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::ShowHelp => self.enter_overlay(Mode::Help),
            Action::FocusOutput => self.enter_overlay(Mode::OutputFocus),
            Action::MoveUp => self.selected = self.selected.saturating_sub(1),
            Action::MoveDown => {
                if !self.commands.is_empty() {
                    self.selected = (self.selected + 1).min(self.commands.len() - 1);
                }
            }
            Action::Copy => match self.selected_command() {
                Some(cmd) => {
                    let line = cmd.command_line.clone();
                    self.copy_to_clipboard(line, "command line");
                }
                None => self.status = "No command selected".into(),
            },
            Action::AddCommand => {
                self.form = CommandForm::blank();
                self.edit_target = None;
                self.set_mode(Mode::AddCommand);
            }
            Action::EditCommand => match self.selected_command().cloned() {
                Some(cmd) => {
                    self.form = CommandForm::prefilled(&cmd);
                    self.edit_target = Some(cmd);
                    self.set_mode(Mode::EditCommand);
                }
                None => self.status = "No command selected".into(),
            },
            Action::DeleteCommand => match self.selected_command().cloned() {
                Some(cmd) => {
                    self.pending_delete = Some(cmd);
                    self.set_mode(Mode::ConfirmDelete);
                }
                None => self.status = "No command selected".into(),
            },
            Action::OpenActions => {
                self.actions_index = 0;
                self.set_mode(Mode::ActionsPanel);
            }
            Action::RunSelected => self.run_selected(Mode::Normal),
            Action::ToggleBrowser => {
                self.browser.reset_cursor();
                self.set_mode(Mode::FileBrowser);
                if let Err(e) = self.browser.reload() {
                    self.report("Cannot list directory", &e);
                }
            }
            Action::EnterDir | Action::ParentDir | Action::RunInDirectory | Action::RunSavedHere => {}
        }
    }

    fn apply_browser_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::ShowHelp => self.enter_overlay(Mode::Help),
            Action::FocusOutput => self.enter_overlay(Mode::OutputFocus),
            Action::MoveUp => self.browser.move_up(),
            Action::MoveDown => self.browser.move_down(),
            Action::Copy => {
                let path = self.browser.path().display().to_string();
                self.copy_to_clipboard(path, "path");
            }
            Action::EnterDir => {
                if let Err(e) = self.browser.enter_selected() {
                    self.report("Cannot open directory", &e);
                }
            }
            Action::ParentDir => {
                if let Err(e) = self.browser.go_up() {
                    self.report("Cannot open parent directory", &e);
                }
            }
            Action::RunInDirectory => {
                self.run_input.clear();
                self.set_mode(Mode::RunInDirectory);
            }
            Action::RunSavedHere => self.run_selected(Mode::FileBrowser),
            Action::ToggleBrowser => self.set_mode(Mode::Normal),
            Action::AddCommand
            | Action::EditCommand
            | Action::DeleteCommand
            | Action::OpenActions
            | Action::RunSelected => {}
        }
    }

    fn enter_overlay(&mut self, overlay: Mode) {
        self.return_to = self.mode;
        self.set_mode(overlay);
    }

    fn set_mode(&mut self, mode: Mode) {
        let status = self.arrival_status(mode);
        self.set_mode_with(mode, status);
    }

    /// Every mode change rewrites the status line.
    fn set_mode_with(&mut self, mode: Mode, status: impl Into<String>) {
        self.mode = mode;
        self.status = status.into();
    }

    fn arrival_status(&self, mode: Mode) -> String {
        match mode {
            Mode::Normal => "Saved commands".into(),
            Mode::AddCommand => "Add mode: fill in the fields, Enter to save, Esc to cancel".into(),
            Mode::EditCommand => "Edit mode: change the fields, Enter to save, Esc to cancel".into(),
            Mode::ConfirmDelete => match &self.pending_delete {
                Some(cmd) => format!("Delete '{}'? (y)es / (n)o", cmd.name),
                None => "Delete? (y)es / (n)o".into(),
            },
            Mode::ConfirmDiscard => "Discard changes? (y)es / (n)o".into(),
            Mode::Help => "Help: ? or Esc to close".into(),
            Mode::ActionsPanel => "Choose an action".into(),
            Mode::FileBrowser => format!("File browser: {}", self.browser.path().display()),
            Mode::RunInDirectory => {
                format!("Enter a command to run in {}", self.browser.path().display())
            }
            Mode::PasteIntoRunBuffer => "Pick a saved command to paste".into(),
            Mode::OutputFocus => "Output: j/k to scroll, Esc to leave".into(),
            Mode::Executing => format!("Running: {}", self.running.as_deref().unwrap_or("")),
        }
    }

    fn handle_form_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Enter => self.commit_form(),
            KeyCode::Esc => {
                self.return_to = self.mode;
                self.set_mode(Mode::ConfirmDiscard);
            }
            _ => {
                self.form.handle_key(code, modifiers);
            }
        }
    }

    fn handle_confirm_delete_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('y' | 'Y') => {
                self.set_mode(Mode::Normal);
                let Some(target) = self.pending_delete.take() else {
                    return;
                };
                match self.store.delete_command(target.id) {
                    Ok(()) => {
                        self.reload_commands();
                        self.status = format!("Deleted '{}'", target.name);
                    }
                    Err(e) => self.report("Delete failed", &e),
                }
            }
            KeyCode::Char('n' | 'N' | 'q') | KeyCode::Esc => {
                self.pending_delete = None;
                self.set_mode_with(Mode::Normal, "Delete cancelled");
            }
            _ => {}
        }
    }

    fn handle_confirm_discard_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('y' | 'Y') => {
                self.form = CommandForm::blank();
                self.edit_target = None;
                self.set_mode_with(Mode::Normal, "Changes discarded");
            }
            KeyCode::Char('n' | 'N') | KeyCode::Esc => {
                self.set_mode_with(self.return_to, "Continuing...");
            }
            _ => {}
        }
    }

    fn handle_actions_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.actions_index = (self.actions_index + 1).min(ACTIONS.len() - 1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.actions_index = self.actions_index.saturating_sub(1);
            }
            KeyCode::Enter => {
                self.set_mode(Mode::Normal);
                if let Some(&(_, action)) = ACTIONS.get(self.actions_index) {
                    self.apply_normal_action(action);
                }
            }
            KeyCode::Esc | KeyCode::Char('q' | 'x') => self.set_mode(Mode::Normal),
            _ => {}
        }
    }

    fn handle_run_input_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Enter => {
                let line = self.run_input.value().trim().to_string();
                if line.is_empty() {
                    self.set_mode_with(Mode::FileBrowser, "Run cancelled");
                    return;
                }
                let job = Job {
                    command_line: line,
                    cwd: self.browser.path().to_path_buf(),
                    origin: JobOrigin::AdHoc,
                };
                self.dispatch(job, Mode::RunInDirectory);
            }
            KeyCode::Esc => self.set_mode(Mode::FileBrowser),
            KeyCode::Char('p') if modifiers.contains(KeyModifiers::CONTROL) => {
                if self.commands.is_empty() {
                    self.status = "No saved commands".into();
                } else {
                    self.set_mode(Mode::PasteIntoRunBuffer);
                }
            }
            _ => {
                self.run_input.handle_key(code, modifiers);
            }
        }
    }

    fn handle_paste_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('j') | KeyCode::Down => self.apply_normal_action(Action::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => self.apply_normal_action(Action::MoveUp),
            KeyCode::Enter => match self.selected_command().cloned() {
                Some(cmd) => {
                    self.run_input.append(&cmd.command_line);
                    self.set_mode_with(Mode::RunInDirectory, format!("Pasted '{}'", cmd.name));
                }
                None => self.set_mode(Mode::RunInDirectory),
            },
            KeyCode::Esc | KeyCode::Char('q') => self.set_mode(Mode::RunInDirectory),
            _ => {}
        }
    }

    fn handle_output_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('j') | KeyCode::Down => self.output.scroll_down(1),
            KeyCode::Char('k') | KeyCode::Up => self.output.scroll_up(1),
            KeyCode::PageDown | KeyCode::Char(' ') => self.output.page_down(),
            KeyCode::PageUp => self.output.page_up(),
            KeyCode::Home | KeyCode::Char('g') => self.output.scroll_to_top(),
            KeyCode::End | KeyCode::Char('G') => self.output.scroll_to_bottom(),
            KeyCode::Esc | KeyCode::Char('o' | 'q') => self.set_mode(self.return_to),
            _ => {}
        }
    }

    // ── Add / edit ───────────────────────────────────────────────────

    fn commit_form(&mut self) {
        let values = self.form.values();
        if values.name.is_empty() {
            self.status = "Name is required".into();
            return;
        }
        if values.note.is_empty() {
            self.status = "Note is required".into();
            return;
        }

        let name_changed = self
            .edit_target
            .as_ref()
            .is_none_or(|target| target.name != values.name);
        if name_changed {
            match self.store.get_command_by_name(&values.name) {
                Ok(Some(_)) => {
                    self.status = format!("A command named '{}' already exists", values.name);
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    self.report("Save failed", &e);
                    return;
                }
            }
        }

        let saved = match self.edit_target.clone() {
            None => self
                .store
                .insert_command(&NewCommand::new(
                    &values.name,
                    &values.command_line,
                    &values.note,
                ))
                .map(|id| (id, "Added")),
            Some(mut target) => {
                target.name = values.name;
                target.command_line = values.command_line;
                target.note = values.note;
                self.store
                    .update_command(&target)
                    .map(|()| (target.id, "Saved"))
            }
        };

        match saved {
            Ok((id, verb)) => {
                self.edit_target = None;
                self.reload_commands();
                if let Some(idx) = self.commands.iter().position(|c| c.id == id) {
                    self.selected = idx;
                }
                self.set_mode_with(Mode::Normal, format!("{verb} '{}'", self.form.values().name));
            }
            Err(e) => self.report("Save failed", &e),
        }
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Run the highlighted saved command in the browser's current directory.
    fn run_selected(&mut self, return_to: Mode) {
        if self.refuse_while_busy() {
            return;
        }
        let Some(cmd) = self.selected_command().cloned() else {
            self.status = "No command selected".into();
            return;
        };
        // Usage counts attempts, so it is recorded before the outcome is known.
        if let Err(e) = self.store.increment_usage(cmd.id) {
            self.report("Cannot record usage", &e);
            return;
        }
        let job = Job {
            command_line: cmd.command_line,
            cwd: self.browser.path().to_path_buf(),
            origin: JobOrigin::Saved {
                id: cmd.id,
                name: cmd.name,
            },
        };
        self.dispatch(job, return_to);
    }

    fn dispatch(&mut self, job: Job, return_to: Mode) {
        if self.refuse_while_busy() {
            return;
        }
        let line = job.command_line.clone();
        tracing::info!(command = %line, cwd = %job.cwd.display(), origin = ?job.origin, "dispatching");
        match self.dispatcher.dispatch(job) {
            Ok(()) => {
                self.return_to = return_to;
                self.output.set_text(&format!("> {line}\n"));
                self.running = Some(line);
                self.set_mode(Mode::Executing);
            }
            Err(e) => self.report("Cannot run command", &e),
        }
    }

    /// One job at a time; a second request is dropped, not queued.
    fn refuse_while_busy(&mut self) -> bool {
        if self.dispatcher.is_busy() {
            tracing::debug!("run request while busy");
            self.status = "A command is already running".into();
            return true;
        }
        false
    }

    /// Fold a finished job back into the session.
    pub fn on_completion(&mut self, done: Completion) {
        let Completion { job, outcome } = done;

        let mut text = format!("> {}\n", job.command_line);
        text.push_str(&String::from_utf8_lossy(&outcome.output));
        let status = match &outcome.failure {
            Some(reason) => {
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str("Error: ");
                text.push_str(reason);
                tracing::warn!(command = %job.command_line, %reason, "command failed");
                format!("Failed: {reason}")
            }
            None => {
                tracing::info!(command = %job.command_line, bytes = outcome.output.len(), "command finished");
                match &job.origin {
                    JobOrigin::Saved { name, .. } => format!("Finished '{name}'"),
                    JobOrigin::AdHoc => "Finished".into(),
                }
            }
        };
        self.output.set_text(&text);

        self.running = None;
        if self.return_to == Mode::RunInDirectory {
            self.run_input.clear();
        }
        self.set_mode_with(self.return_to, status);
        self.reload_commands();
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn reload_commands(&mut self) {
        match self.store.list_commands() {
            Ok(commands) => self.commands = commands,
            Err(e) => self.report("Cannot load commands", &e),
        }
        self.selected = self.selected.min(self.commands.len().saturating_sub(1));
    }

    fn copy_to_clipboard(&mut self, text: String, what: &str) {
        // Held for the session so X11 selections outlive the call.
        if self.clipboard.is_none() {
            match arboard::Clipboard::new() {
                Ok(cb) => self.clipboard = Some(cb),
                Err(e) => {
                    self.report("Clipboard unavailable", &e);
                    return;
                }
            }
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            return;
        };
        match clipboard.set_text(text) {
            Ok(()) => self.status = format!("Copied {what}"),
            Err(e) => self.report("Copy failed", &e),
        }
    }

    fn report(&mut self, context: &str, err: &dyn Display) {
        tracing::warn!(error = %err, "{context}");
        self.status = format!("{context}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::runner::ExecOutcome;
    use crate::runner::testing::{GatedRunner, ScriptedRunner};

    const WAIT: Duration = Duration::from_secs(10);

    fn app_with(runner: Arc<dyn Runner>, cwd: &Path) -> App {
        let store = Store::open_in_memory().unwrap();
        let mut app = App::new(store, runner, cwd.to_path_buf(), Duration::from_millis(10));
        app.resize(120, 40);
        app
    }

    fn scripted(outcome: ExecOutcome) -> (Arc<ScriptedRunner>, tempfile::TempDir) {
        (Arc::new(ScriptedRunner::new(outcome)), tempfile::tempdir().unwrap())
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn ctrl(app: &mut App, c: char) {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL));
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn seed(app: &mut App, name: &str, line: &str) -> i64 {
        let id = app
            .store
            .insert_command(&NewCommand::new(name, line, "note"))
            .unwrap();
        app.reload_commands();
        id
    }

    fn add_through_form(app: &mut App, name: &str, line: &str, note: &str) {
        press(app, KeyCode::Char('a'));
        type_str(app, name);
        press(app, KeyCode::Tab);
        type_str(app, line);
        press(app, KeyCode::Tab);
        type_str(app, note);
        press(app, KeyCode::Enter);
    }

    fn settle(app: &mut App) {
        let done = app.dispatcher.wait_complete(WAIT).unwrap();
        app.on_completion(done);
    }

    fn usage(app: &App, id: i64) -> i64 {
        app.store.get_command(id).unwrap().unwrap().usage_count
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.selected, 0);

        for name in ["a", "b", "c"] {
            seed(&mut app, name, "true");
        }
        for _ in 0..10 {
            press(&mut app, KeyCode::Char('j'));
        }
        assert_eq!(app.selected, 2);
        for _ in 0..10 {
            press(&mut app, KeyCode::Char('k'));
        }
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn add_flow_creates_command() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        add_through_form(&mut app, "  build ", "cargo build", "compile");

        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.commands.len(), 1);
        assert_eq!(app.commands[0].name, "build");
        assert_eq!(app.commands[0].usage_count, 0);
        assert_eq!(app.status, "Added 'build'");
    }

    #[test]
    fn add_requires_name_then_note() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        press(&mut app, KeyCode::Char('a'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::AddCommand);
        assert_eq!(app.status, "Name is required");

        type_str(&mut app, "x");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::AddCommand);
        assert_eq!(app.status, "Note is required");
        assert_eq!(app.form.values().name, "x");
        assert!(app.commands.is_empty());
    }

    #[test]
    fn duplicate_name_rejected_in_form() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        seed(&mut app, "build", "make");

        add_through_form(&mut app, "build", "cargo build", "again");
        assert_eq!(app.mode, Mode::AddCommand);
        assert!(app.status.contains("already exists"));
        assert_eq!(app.commands.len(), 1);
        assert_eq!(app.commands[0].command_line, "make");
    }

    #[test]
    fn rename_to_taken_name_rejected() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        seed(&mut app, "a", "echo a");
        seed(&mut app, "b", "echo b");
        // newest first: "b" is at index 0
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.mode, Mode::EditCommand);
        ctrl(&mut app, 'u');
        type_str(&mut app, "a");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::EditCommand);
        assert!(app.status.contains("already exists"));
        let names: Vec<&str> = app.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn edit_keeps_name_or_takes_free_one() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        let id = seed(&mut app, "build", "make");

        // Unchanged name is not a conflict with itself.
        press(&mut app, KeyCode::Char('e'));
        press(&mut app, KeyCode::Tab);
        ctrl(&mut app, 'u');
        type_str(&mut app, "cargo build");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.commands[0].command_line, "cargo build");

        press(&mut app, KeyCode::Char('e'));
        ctrl(&mut app, 'u');
        type_str(&mut app, "compile");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.store.get_command(id).unwrap().unwrap().name, "compile");
        assert_eq!(app.status, "Saved 'compile'");
    }

    #[test]
    fn escape_from_form_asks_before_discarding() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        seed(&mut app, "build", "make");

        press(&mut app, KeyCode::Char('e'));
        type_str(&mut app, "-x");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::ConfirmDiscard);

        // "n" resumes the same form with the typed text intact.
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.mode, Mode::EditCommand);
        assert_eq!(app.form.values().name, "build-x");

        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.commands[0].name, "build");

        press(&mut app, KeyCode::Char('a'));
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::AddCommand);
    }

    #[test]
    fn delete_requires_confirmation() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        seed(&mut app, "a", "true");
        seed(&mut app, "b", "true");
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.selected, 1);

        let before = app.commands.clone();
        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.mode, Mode::ConfirmDelete);
        assert_eq!(app.status, "Delete 'a'? (y)es / (n)o");
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.commands, before);
        assert_eq!(app.store.list_commands().unwrap(), before);
        assert_eq!(app.selected, 1);
        assert_eq!(app.status, "Delete cancelled");

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.mode, Mode::Normal);
        let names: Vec<&str> = app.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn actions_panel_reuses_normal_intents() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        seed(&mut app, "a", "true");

        press(&mut app, KeyCode::Char('x'));
        assert_eq!(app.mode, Mode::ActionsPanel);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.actions_index, 2);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::ConfirmDelete);
        assert_eq!(app.pending_delete.as_ref().map(|c| c.name.as_str()), Some("a"));

        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('x'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::AddCommand);
    }

    #[test]
    fn help_and_output_focus_return_to_origin() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.mode, Mode::Help);
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.mode, Mode::Normal);

        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Char('o'));
        assert_eq!(app.mode, Mode::OutputFocus);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::FileBrowser);
    }

    #[test]
    fn run_increments_usage_once_even_on_failure() {
        let (runner, dir) = scripted(ExecOutcome::failed(b"partial\n".to_vec(), "exit status: 2"));
        let mut app = app_with(runner.clone(), dir.path());
        let id = seed(&mut app, "flaky", "make test");

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.mode, Mode::Executing);
        assert_eq!(usage(&app, id), 1);
        settle(&mut app);

        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(usage(&app, id), 1);
        assert_eq!(app.commands[0].usage_count, 1);
        assert_eq!(
            app.output.text(),
            "> make test\npartial\nError: exit status: 2"
        );
        assert_eq!(app.output.scroll(), 0);
        assert!(app.status.starts_with("Failed"));

        let jobs = runner.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].cwd, dir.path());
        assert_eq!(
            jobs[0].origin,
            JobOrigin::Saved {
                id,
                name: "flaky".into()
            }
        );
    }

    #[test]
    fn executing_swallows_every_key() {
        let (runner, release) = GatedRunner::new();
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(runner), dir.path());
        let id = seed(&mut app, "slow", "sleep 1");

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.mode, Mode::Executing);
        assert_eq!(app.running.as_deref(), Some("sleep 1"));

        for code in [
            KeyCode::Char('r'),
            KeyCode::Char('q'),
            KeyCode::Char('a'),
            KeyCode::Char('d'),
            KeyCode::Esc,
        ] {
            press(&mut app, code);
        }
        ctrl(&mut app, 'c');
        assert_eq!(app.mode, Mode::Executing);
        assert!(!app.should_quit);
        assert_eq!(usage(&app, id), 1);

        release.send(()).unwrap();
        settle(&mut app);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(usage(&app, id), 1);
        assert!(app.output.text().contains("released"));
        assert!(app.running.is_none());
    }

    #[test]
    fn saved_command_run_from_browser_returns_to_browser() {
        let (runner, dir) = scripted(ExecOutcome::succeeded(b"ok\n".to_vec()));
        fs::create_dir(dir.path().join("sub")).unwrap();
        let mut app = app_with(runner.clone(), dir.path());
        seed(&mut app, "ls", "ls");

        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.browser.path(), dir.path().join("sub"));
        app.handle_key(KeyEvent::new(KeyCode::Char('R'), KeyModifiers::SHIFT));
        settle(&mut app);

        assert_eq!(app.mode, Mode::FileBrowser);
        assert_eq!(runner.jobs()[0].cwd, dir.path().join("sub"));
        assert_eq!(app.status, "Finished 'ls'");
    }

    #[test]
    fn ad_hoc_run_keeps_prompt_open_and_skips_usage() {
        let (runner, dir) = scripted(ExecOutcome::succeeded(b"hi\n".to_vec()));
        let mut app = app_with(runner.clone(), dir.path());
        let id = seed(&mut app, "greet", "echo hi");

        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.mode, Mode::RunInDirectory);
        type_str(&mut app, "echo hi");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Executing);
        settle(&mut app);

        assert_eq!(app.mode, Mode::RunInDirectory);
        assert!(app.run_input.is_empty());
        assert_eq!(app.output.text(), "> echo hi\nhi\n");
        assert_eq!(runner.jobs()[0].origin, JobOrigin::AdHoc);
        assert_eq!(usage(&app, id), 0);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::FileBrowser);
        assert_eq!(app.status, "Run cancelled");
    }

    #[test]
    fn paste_appends_saved_command_line() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        seed(&mut app, "first", "cargo fmt");
        seed(&mut app, "second", "cargo test");

        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Char('r'));
        type_str(&mut app, "time ");
        ctrl(&mut app, 'p');
        assert_eq!(app.mode, Mode::PasteIntoRunBuffer);
        assert_eq!(app.status, "Pick a saved command to paste");
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::RunInDirectory);
        assert_eq!(app.status, "Pasted 'first'");
        assert_eq!(app.run_input.value(), "time cargo fmt");
        assert_eq!(app.run_input.cursor(), app.run_input.value().len());
    }

    #[test]
    fn browser_go_up_at_root_is_noop() {
        let (runner, _dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, Path::new("/"));
        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.browser.path(), Path::new("/"));
        assert_eq!(app.mode, Mode::FileBrowser);
    }

    #[test]
    fn every_mode_change_rewrites_status() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner, dir.path());
        seed(&mut app, "a", "true");
        seed(&mut app, "b", "true");
        let browsing = format!("File browser: {}", dir.path().display());

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.status, "Delete 'b'? (y)es / (n)o");
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.status, "Deleted 'b'");

        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.mode, Mode::AddCommand);
        assert!(app.status.starts_with("Add mode"));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.status, "Discard changes? (y)es / (n)o");
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.mode, Mode::AddCommand);
        assert_eq!(app.status, "Continuing...");
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.status, "Changes discarded");

        press(&mut app, KeyCode::Char('e'));
        assert!(app.status.starts_with("Edit mode"));
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('y'));

        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.status, browsing);
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(
            app.status,
            format!("Enter a command to run in {}", dir.path().display())
        );
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::FileBrowser);
        assert_eq!(app.status, browsing);

        press(&mut app, KeyCode::Char('?'));
        assert!(app.status.starts_with("Help"));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.status, browsing);
        press(&mut app, KeyCode::Char('o'));
        assert!(app.status.starts_with("Output"));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.status, browsing);

        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.status, "Saved commands");
        press(&mut app, KeyCode::Char('x'));
        assert_eq!(app.status, "Choose an action");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.status, "Saved commands");
    }

    #[test]
    fn reopening_browser_puts_cursor_on_first_entry() {
        let (runner, dir) = scripted(ExecOutcome::default());
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let mut app = app_with(runner, dir.path());

        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.browser.index(), 2);
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.mode, Mode::Normal);
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.mode, Mode::FileBrowser);
        assert_eq!(app.browser.index(), 0);
    }

    #[test]
    fn unreadable_directory_keeps_listing_and_reports() {
        let (runner, dir) = scripted(ExecOutcome::default());
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("z.txt"), "").unwrap();
        let mut app = app_with(runner, dir.path());

        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.browser.selected().map(|e| e.name.as_str()), Some("sub"));
        fs::remove_dir_all(dir.path().join("sub")).unwrap();
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::FileBrowser);
        assert_eq!(app.browser.path(), dir.path());
        let names: Vec<&str> = app.browser.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["sub", "z.txt"]);
        assert!(
            app.status.starts_with("Cannot open directory"),
            "status: {}",
            app.status
        );
    }

    #[test]
    fn usage_failure_aborts_the_run() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner.clone(), dir.path());
        let id = seed(&mut app, "gone", "echo gone");
        // Removed behind the cached list.
        app.store.delete_command(id).unwrap();
        assert_eq!(app.commands.len(), 1);

        press(&mut app, KeyCode::Char('r'));
        assert!(runner.jobs().is_empty());
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.running.is_none());
        assert!(
            app.status.starts_with("Cannot record usage"),
            "status: {}",
            app.status
        );
    }

    #[test]
    fn second_run_request_is_refused_while_busy() {
        let (runner, release) = GatedRunner::new();
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(Arc::new(runner), dir.path());
        let id = seed(&mut app, "slow", "sleep 1");

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.mode, Mode::Executing);
        assert_eq!(app.status, "Running: sleep 1");

        app.run_selected(Mode::Normal);
        assert_eq!(app.status, "A command is already running");
        assert_eq!(usage(&app, id), 1);
        app.dispatch(
            Job {
                command_line: "echo other".into(),
                cwd: dir.path().to_path_buf(),
                origin: JobOrigin::AdHoc,
            },
            Mode::RunInDirectory,
        );
        assert_eq!(app.mode, Mode::Executing);
        assert_eq!(app.running.as_deref(), Some("sleep 1"));

        release.send(()).unwrap();
        settle(&mut app);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.status, "Finished 'slow'");
        assert_eq!(usage(&app, id), 1);
    }

    #[test]
    fn run_without_selection_reports() {
        let (runner, dir) = scripted(ExecOutcome::default());
        let mut app = app_with(runner.clone(), dir.path());
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.status, "No command selected");
        assert!(runner.jobs().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn end_to_end_with_real_shell() {
        use crate::config::ShellConfig;
        use crate::runner::ShellRunner;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), "").unwrap();
        let shell = ShellRunner::new(&ShellConfig {
            program: "sh".into(),
            args: vec!["-c".into()],
        });
        let mut app = app_with(Arc::new(shell), dir.path());

        add_through_form(&mut app, "list", "ls", "dir");
        press(&mut app, KeyCode::Char('r'));
        settle(&mut app);

        assert_eq!(app.commands[0].usage_count, 1);
        assert!(app.output.text().contains("hello.txt"));
        assert_eq!(app.mode, Mode::Normal);
    }
}
