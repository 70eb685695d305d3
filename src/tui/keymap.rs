use crossterm::event::{KeyCode, KeyModifiers};

// ── Actions ──────────────────────────────────────────────────────────

/// A user intent. Key presses map onto these through the tables below; the
/// actions panel produces them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Global
    Quit,
    ShowHelp,
    MoveUp,
    MoveDown,
    FocusOutput,
    Copy,

    // Saved commands
    AddCommand,
    EditCommand,
    DeleteCommand,
    RunSelected,
    OpenActions,

    // File browser
    ToggleBrowser,
    EnterDir,
    ParentDir,
    RunInDirectory,
    RunSavedHere,
}

// ── Help categories ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelpCategory {
    Navigation,
    Commands,
    Browser,
    RunPrompt,
    Output,
}

impl HelpCategory {
    fn label(self) -> &'static str {
        match self {
            Self::Navigation => "Navigation",
            Self::Commands => "Saved Commands",
            Self::Browser => "File Browser (s)",
            Self::RunPrompt => "Run Prompt (r in browser)",
            Self::Output => "Output Panel (o)",
        }
    }

    const ORDERED: &[Self] = &[
        Self::Navigation,
        Self::Commands,
        Self::Browser,
        Self::RunPrompt,
        Self::Output,
    ];
}

// ── Keybinding ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
    pub action: Action,
    /// Key label shown in help (e.g. `"Ctrl+C"`). Empty hides the row.
    pub label: &'static str,
    pub description: &'static str,
    pub category: HelpCategory,
}

#[derive(Debug, Clone)]
pub struct HelpEntry {
    pub label: &'static str,
    pub description: &'static str,
}

// ── KeyMap ────────────────────────────────────────────────────────────

/// Key tables for the two list-browsing modes. Text-entry modes handle
/// their keys directly.
pub struct KeyMap {
    pub normal: Vec<KeyBinding>,
    pub browser: Vec<KeyBinding>,
}

impl KeyMap {
    pub fn default_keymap() -> Self {
        Self {
            normal: default_normal_bindings(),
            browser: default_browser_bindings(),
        }
    }

    pub fn lookup_normal(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
        lookup(&self.normal, code, modifiers)
    }

    pub fn lookup_browser(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
        lookup(&self.browser, code, modifiers)
    }

    /// Grouped help rows in display order.
    pub fn help_entries(&self) -> Vec<(&'static str, Vec<HelpEntry>)> {
        let mut out = Vec::new();

        for &cat in HelpCategory::ORDERED {
            let mut entries: Vec<HelpEntry> = Vec::new();

            for kb in self.normal.iter().chain(&self.browser) {
                if kb.category == cat
                    && !kb.label.is_empty()
                    && !entries.iter().any(|e| e.label == kb.label)
                {
                    entries.push(HelpEntry {
                        label: kb.label,
                        description: kb.description,
                    });
                }
            }

            // Text-entry and scroll modes are not table driven.
            match cat {
                HelpCategory::RunPrompt => entries.extend([
                    HelpEntry {
                        label: "  Enter",
                        description: "Run line here (empty line leaves)",
                    },
                    HelpEntry {
                        label: "  Ctrl+P",
                        description: "Paste a saved command",
                    },
                    HelpEntry {
                        label: "  Esc",
                        description: "Back to the browser",
                    },
                ]),
                HelpCategory::Output => entries.extend([
                    HelpEntry {
                        label: "  j/k PgUp/PgDn",
                        description: "Scroll",
                    },
                    HelpEntry {
                        label: "  g/G",
                        description: "Top / bottom",
                    },
                    HelpEntry {
                        label: "  Esc",
                        description: "Leave the output panel",
                    },
                ]),
                _ => {}
            }

            if !entries.is_empty() {
                out.push((cat.label(), entries));
            }
        }

        out
    }
}

fn lookup(bindings: &[KeyBinding], code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    bindings
        .iter()
        .find(|kb| kb.code == code && kb.modifiers == modifiers)
        .map(|kb| kb.action)
}

fn bind(
    code: KeyCode,
    modifiers: KeyModifiers,
    action: Action,
    label: &'static str,
    description: &'static str,
    category: HelpCategory,
) -> KeyBinding {
    KeyBinding {
        code,
        modifiers,
        action,
        label,
        description,
        category,
    }
}

fn hidden(code: KeyCode, modifiers: KeyModifiers, action: Action) -> KeyBinding {
    bind(code, modifiers, action, "", "", HelpCategory::Navigation)
}

// ── Default bindings ─────────────────────────────────────────────────

#[allow(clippy::enum_glob_use)]
fn default_normal_bindings() -> Vec<KeyBinding> {
    use Action::*;
    use HelpCategory::*;
    const NONE: KeyModifiers = KeyModifiers::NONE;

    vec![
        bind(KeyCode::Char('j'), NONE, MoveDown, "  j/k", "Move selection", Navigation),
        hidden(KeyCode::Char('k'), NONE, MoveUp),
        hidden(KeyCode::Down, NONE, MoveDown),
        hidden(KeyCode::Up, NONE, MoveUp),
        bind(KeyCode::Char('o'), NONE, FocusOutput, "  o", "Focus output panel", Navigation),
        bind(KeyCode::Char('?'), NONE, ShowHelp, "  ?", "This help screen", Navigation),
        bind(KeyCode::Char('q'), NONE, Quit, "  q", "Quit", Navigation),
        bind(KeyCode::Char('c'), KeyModifiers::CONTROL, Quit, "  Ctrl+C", "Quit", Navigation),
        bind(KeyCode::Char('r'), NONE, RunSelected, "  r", "Run selected command", Commands),
        hidden(KeyCode::Enter, NONE, RunSelected),
        bind(KeyCode::Char('a'), NONE, AddCommand, "  a", "Add command", Commands),
        bind(KeyCode::Char('e'), NONE, EditCommand, "  e", "Edit command", Commands),
        bind(KeyCode::Char('d'), NONE, DeleteCommand, "  d", "Delete command", Commands),
        bind(KeyCode::Char('x'), NONE, OpenActions, "  x", "Actions menu", Commands),
        bind(KeyCode::Char('c'), NONE, Copy, "  c", "Copy command line / path", Commands),
        bind(KeyCode::Char('s'), NONE, ToggleBrowser, "  s", "Open / close file browser", Browser),
    ]
}

#[allow(clippy::enum_glob_use)]
fn default_browser_bindings() -> Vec<KeyBinding> {
    use Action::*;
    use HelpCategory::*;
    const NONE: KeyModifiers = KeyModifiers::NONE;

    vec![
        hidden(KeyCode::Char('j'), NONE, MoveDown),
        hidden(KeyCode::Char('k'), NONE, MoveUp),
        hidden(KeyCode::Down, NONE, MoveDown),
        hidden(KeyCode::Up, NONE, MoveUp),
        bind(KeyCode::Enter, NONE, EnterDir, "  Enter/l", "Open directory", Browser),
        hidden(KeyCode::Right, NONE, EnterDir),
        hidden(KeyCode::Char('l'), NONE, EnterDir),
        bind(KeyCode::Backspace, NONE, ParentDir, "  Bksp/h", "Parent directory", Browser),
        hidden(KeyCode::Left, NONE, ParentDir),
        hidden(KeyCode::Char('h'), NONE, ParentDir),
        bind(KeyCode::Char('r'), NONE, RunInDirectory, "  r", "Type a command to run here", Browser),
        bind(KeyCode::Char('R'), KeyModifiers::SHIFT, RunSavedHere, "  R", "Run selected saved command here", Browser),
        hidden(KeyCode::Char('R'), NONE, RunSavedHere),
        hidden(KeyCode::Char('s'), NONE, ToggleBrowser),
        hidden(KeyCode::Esc, NONE, ToggleBrowser),
        hidden(KeyCode::Char('o'), NONE, FocusOutput),
        hidden(KeyCode::Char('c'), NONE, Copy),
        hidden(KeyCode::Char('?'), NONE, ShowHelp),
        hidden(KeyCode::Char('q'), NONE, Quit),
        hidden(KeyCode::Char('c'), KeyModifiers::CONTROL, Quit),
    ]
}
