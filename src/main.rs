use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use cmd_vault::config::{self, Config};
use cmd_vault::runner::ShellRunner;
use cmd_vault::store::{NewCommand, SavedCommand, Store};

#[derive(Parser)]
#[command(
    name = "cmd-vault",
    version = env!("CMD_VAULT_VERSION"),
    about = "Store, browse and re-run named shell commands"
)]
struct Cli {
    /// Database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the interactive browser (default)
    Tui,
    /// Run a saved command in the current directory
    Run {
        /// Name of the saved command
        name: String,
    },
    /// List saved commands, newest first
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a new command
    Add {
        /// Unique name
        name: String,
        /// Shell command line
        command: String,
        /// What the command is for
        #[arg(short, long)]
        note: String,
    },
    /// Delete a saved command
    Remove {
        /// Name of the saved command
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    config::ensure_dirs()?;
    let cfg = config::load()?;
    init_logging(&cfg);

    let db_path = cfg.database_path(cli.db.as_deref())?;
    let store = Store::open(&db_path)?;
    store.migrate()?;

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let runner = Arc::new(ShellRunner::new(&cfg.shell));
            cmd_vault::tui::run(store, runner, cwd, cfg.tick_rate())
        }
        Commands::Run { name } => {
            let cmd = find_command_by_name(&store, &name)?;
            store.increment_usage(cmd.id)?;
            let cwd = std::env::current_dir().context("cannot determine working directory")?;
            tracing::info!(name = %cmd.name, cwd = %cwd.display(), "running from command line");
            let status = ShellRunner::new(&cfg.shell).run_inherited(&cmd.command_line, &cwd)?;
            if !status.success() {
                bail!("'{}' failed: {status}", cmd.name);
            }
            Ok(())
        }
        Commands::List { json } => {
            let commands = store.list_commands()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&commands)?);
            } else if commands.is_empty() {
                println!("No saved commands. Use `cmd-vault add <name> <command> --note <note>` to add one.");
            } else {
                let now = chrono::Utc::now();
                for c in &commands {
                    println!(
                        "  {} — {} (used {}×, {})\n      {}",
                        c.name,
                        c.command_line,
                        c.usage_count,
                        c.age(now),
                        c.note,
                    );
                }
            }
            Ok(())
        }
        Commands::Add {
            name,
            command,
            note,
        } => {
            let new = NewCommand::new(name.trim(), command.trim(), note.trim());
            store.insert_command(&new)?;
            println!("Added '{}'", new.name);
            Ok(())
        }
        Commands::Remove { name } => {
            let cmd = find_command_by_name(&store, &name)?;
            store.delete_command(cmd.id)?;
            println!("Removed '{}'", cmd.name);
            Ok(())
        }
    }
}

fn find_command_by_name(store: &Store, name: &str) -> Result<SavedCommand> {
    store
        .get_command_by_name(name)?
        .with_context(|| format!("command '{name}' not found"))
}

/// Log to a file; the terminal belongs to the UI. Failure only loses logs.
fn init_logging(cfg: &Config) {
    use tracing_subscriber::EnvFilter;

    let Ok(path) = config::log_path() else {
        return;
    };
    let Ok(file) = fs::OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let filter = EnvFilter::try_from_env("CMD_VAULT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_ansi(false)
        .try_init();
}
