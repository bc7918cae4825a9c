use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use sage_core::events::{AI_RESPONSE_READY, VFS_WRITE};
use sage_core::{
    AutonomousAgent, ConfigService, Dispatcher, DuckDuckGoSearch, EventBus, LocalVfs, Memory,
    ProviderGateway, ReasoningOrchestrator, ToolArgs, ToolRegistry, config, memory,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use termimad::MadSkin;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod onboard;

#[derive(Parser)]
#[command(name = "sage")]
#[command(about = "sage - reasoning, memory and tool use from the terminal", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory the file and shell tools operate in.
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Onboard,
    Chat {
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Let the agent work towards a goal using the workspace tools
    Agent { goal: String },
    /// Run a single tool directly, e.g. `sage tool read_file path=notes.txt`
    Tool {
        name: String,
        #[arg(value_name = "KEY=VALUE")]
        args: Vec<String>,
    },
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum MemoryCommands {
    Search { query: String },
    List,
}

#[derive(Subcommand)]
enum ConfigCommands {
    Get { key: String },
    Set { key: String, value: String },
}

struct App {
    bus: Arc<EventBus>,
    config: Arc<ConfigService>,
    gateway: Arc<ProviderGateway>,
    memory: Arc<dyn Memory>,
    workspace: PathBuf,
}

impl App {
    fn build(workspace: Option<PathBuf>) -> Result<Self> {
        let bus = Arc::new(EventBus::new());
        let config =
            Arc::new(ConfigService::load(config::get_config_path())?.with_bus(bus.clone()));
        let snapshot = config.snapshot();

        let workspace = workspace.unwrap_or(snapshot.workspace_dir.clone());
        std::fs::create_dir_all(&workspace).with_context(|| {
            format!("Could not create workspace at {}", workspace.display())
        })?;

        Ok(Self {
            gateway: Arc::new(ProviderGateway::new(config.clone())),
            memory: memory::create_memory(&snapshot),
            bus,
            config,
            workspace,
        })
    }

    fn registry(&self) -> Arc<ToolRegistry> {
        let vfs = LocalVfs::new(&self.workspace).with_bus(self.bus.clone());
        let timeout = Duration::from_secs(self.config.snapshot().command_timeout_secs);
        Arc::new(ToolRegistry::with_defaults(
            Arc::new(vfs),
            self.memory.clone(),
            timeout,
        ))
    }

    fn orchestrator(&self) -> Arc<ReasoningOrchestrator> {
        Arc::new(ReasoningOrchestrator::from_config(
            self.gateway.clone(),
            self.memory.clone(),
            Arc::new(DuckDuckGoSearch::new()),
            &self.config.snapshot(),
        ))
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Chat { message: None }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().context("Onboarding failed")?;
            config::save_config(&onboard_config)?;
        }
        Commands::Chat { message } => {
            let app = App::build(cli.workspace)?;
            chat(&app, message).await?;
        }
        Commands::Agent { goal } => {
            let app = App::build(cli.workspace)?;
            app.bus.subscribe(VFS_WRITE, |event| {
                if let Some(path) = event.payload_text() {
                    eprintln!("  {} wrote {}", style("✓").green(), style(path).cyan());
                }
            });

            let snapshot = app.config.snapshot();
            let agent = AutonomousAgent::new(app.gateway.clone(), app.registry())
                .with_max_steps(snapshot.max_agent_steps);

            println!("\n🤔 Working on it...\n");
            let answer = agent.think_and_act(&goal).await;
            MadSkin::default().print_text(&answer);
        }
        Commands::Tool { name, args } => {
            let app = App::build(cli.workspace)?;
            let args = parse_tool_args(&args)?;
            let result = app.registry().execute(&name, &args).await;
            println!("{}", result.to_text());
            if !result.success {
                anyhow::bail!("Tool '{}' failed", name);
            }
        }
        Commands::Memory { command } => {
            let app = App::build(cli.workspace)?;
            let entries = match command {
                MemoryCommands::Search { query } => {
                    sage_core::traits::memory::rank_by_recency(app.memory.search(&query).await)
                }
                MemoryCommands::List => app.memory.entries().await,
            };
            if entries.is_empty() {
                println!("{}", style("No memories found.").dim());
            }
            for entry in entries {
                println!(
                    "{} {} => {} {}",
                    style(entry.timestamp.format("%Y-%m-%d %H:%M:%S")).dim(),
                    style(&entry.query).bold(),
                    entry.answer,
                    style(format!("({})", entry.source)).dim()
                );
            }
        }
        Commands::Config { command } => {
            let service = ConfigService::load(config::get_config_path())?;
            match command {
                ConfigCommands::Get { key } => match service.get(&key) {
                    Some(value) => println!("{}", value),
                    None => anyhow::bail!("Unknown config key: {}", key),
                },
                ConfigCommands::Set { key, value } => {
                    config::ensure_sage_dir()?;
                    service.set(&key, &value)?;
                    println!("  {} {} updated", style("✓").green(), style(&key).cyan());
                }
            }
        }
    }

    Ok(())
}

/// Prompts go through the dispatcher and answers come back on the bus.
async fn chat(app: &App, message: Option<String>) -> Result<()> {
    let snapshot = app.config.snapshot();
    let dispatcher = Dispatcher::start(
        app.orchestrator(),
        app.bus.clone(),
        snapshot.dispatch_workers,
        snapshot.dispatch_queue_capacity,
    );

    let (tx, mut answers) = mpsc::unbounded_channel::<String>();
    app.bus.subscribe(AI_RESPONSE_READY, move |event| {
        let _ = tx.send(event.payload_text().unwrap_or_default().to_string());
    });

    let skin = MadSkin::default();

    if let Some(msg) = message {
        println!("\n🤔 Processing...\n");
        dispatcher.submit(msg)?;
        if let Some(answer) = answers.recv().await {
            skin.print_text(&answer);
        }
        dispatcher.shutdown().await;
        return Ok(());
    }

    println!(
        "{} {}",
        style("sage").cyan().bold(),
        style(format!("({})", app.gateway.active_provider().display_name())).dim()
    );
    println!("Type your message (Ctrl+D to exit):\n");

    let history = config::get_sage_dir().join("history.txt");
    let mut editor = DefaultEditor::new()?;
    let _ = editor.load_history(&history);

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(input);

                if let Err(e) = dispatcher.submit(input) {
                    eprintln!("{} {}", style("❌").red(), e);
                    continue;
                }

                println!("\n🤔 Processing...\n");
                match answers.recv().await {
                    Some(answer) => skin.print_text(&answer),
                    None => break,
                }
                println!();
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\n👋 Goodbye!");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Err(e) = editor.save_history(&history) {
        tracing::debug!(error = %e, "could not save chat history");
    }
    dispatcher.shutdown().await;
    Ok(())
}

fn parse_tool_args(pairs: &[String]) -> Result<ToolArgs> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected KEY=VALUE, got '{}'", pair))?;
            Ok((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_args_split_on_first_equals() {
        let args = parse_tool_args(&["path=a.txt".into(), "content=x=1".into()]).unwrap();
        assert_eq!(args["path"], "a.txt");
        assert_eq!(args["content"], "x=1");
    }

    #[test]
    fn tool_args_reject_bare_words() {
        assert!(parse_tool_args(&["oops".into()]).is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::parse_from(["sage", "-vv", "memory", "search", "paris"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Some(Commands::Memory {
                command: MemoryCommands::Search { .. }
            })
        ));
    }
}
