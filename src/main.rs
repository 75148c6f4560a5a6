use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use tasklist::{Backend, Config, KvStore, Task, TaskFilter, TaskStore, ValidationError};
use tracing_subscriber::EnvFilter;

type Store = TaskStore<Box<dyn KvStore>>;

#[derive(Parser)]
#[command(name = "tasklist")]
#[command(about = "tasklist CLI - Add, edit, toggle, delete and filter tasks")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file (default: <config dir>/tasklist/config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the store (overrides config)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Persistence backend (overrides config)
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Prefix for the persisted keys (overrides config)
    #[arg(short, long)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Mark a task done, or not done again
    Toggle { id: u64 },

    /// Replace the text of a task
    Edit {
        id: u64,
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Delete a task
    Remove {
        id: u64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List tasks
    List {
        /// all, active or completed (default from config)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Show task counts
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Setup tracing
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let store_path = cli.store_path.clone().unwrap_or_else(|| config.resolved_store_path());
    let backend = cli.backend.unwrap_or(config.backend);
    let namespace = cli.namespace.clone().or_else(|| config.namespace.clone());

    let kv = backend.open(&store_path)?;
    let mut store = TaskStore::open_namespaced(kv, namespace)?;

    if let Err(e) = run(&mut store, &config, cli.command) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }

    Ok(())
}

fn run(store: &mut Store, config: &Config, command: Commands) -> Result<(), ValidationError> {
    match command {
        Commands::Add { text } => {
            let task = store.add(&text.join(" "))?;
            println!("{} #{} {}", "Task added:".green(), task.id, task.text);
        }
        Commands::Toggle { id } => match store.toggle(id) {
            Some(true) => println!("{}", "Task completed!".green()),
            Some(false) => println!("{}", "Task marked as not done".yellow()),
            None => not_found(id),
        },
        Commands::Edit { id, text } => match store.edit(id, &text.join(" "))? {
            Some(task) => println!("{} #{} {}", "Task updated:".green(), task.id, task.text),
            None => not_found(id),
        },
        Commands::Remove { id, yes } => {
            let Some(task) = store.get(id) else {
                not_found(id);
                return Ok(());
            };
            println!("#{} {}", task.id, task.text);
            if !yes && !confirm("Delete this task?") {
                println!("Cancelled");
                return Ok(());
            }
            match store.remove(id) {
                Some(task) => println!("{} #{} {}", "Task deleted:".green(), task.id, task.text),
                None => not_found(id),
            }
        }
        Commands::List { filter } => {
            let filter = match filter {
                Some(f) => f.parse::<TaskFilter>()?,
                None => config.default_filter,
            };
            store.set_filter(filter);
            print_list(store);
        }
        Commands::Stats => print_stats(store),
    }

    Ok(())
}

fn not_found(id: u64) {
    println!("{}", format!("No task with id {}", id).dimmed());
}

/// Ask on stdin; anything but y/yes declines
fn confirm(question: &str) -> bool {
    print!("{} [y/N] ", question);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_list(store: &Store) {
    let tasks = store.list_filtered();
    if tasks.is_empty() {
        println!("{}", "No tasks".dimmed());
    } else {
        for task in tasks {
            println!("{}", format_task(task));
        }
    }
    println!();
    print_stats(store);
}

fn format_task(task: &Task) -> String {
    let line = format!("{:>4}  {}", task.id, task.text);
    if task.completed {
        format!("{} {}", "[x]".green(), line.green().strikethrough())
    } else {
        format!("[ ] {}", line)
    }
}

fn print_stats(store: &Store) {
    let stats = store.stats();
    println!(
        "Total: {}  Completed: {}  Pending: {}",
        stats.total.to_string().bold(),
        stats.completed.to_string().green(),
        stats.pending.to_string().yellow()
    );
}
