mod app;
mod event;
mod form;
mod keymap;
mod output;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::runner::Runner;
use crate::store::Store;

pub use app::{App, Mode};

pub fn run(store: Store, runner: Arc<dyn Runner>, cwd: PathBuf, tick_rate: Duration) -> Result<()> {
    let mut terminal = ratatui::init();
    let mut app = App::new(store, runner, cwd, tick_rate);
    let result = app.run(&mut terminal);
    ratatui::restore();
    result
}
