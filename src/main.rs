//! onelm - natural language to shell commands.
//!
//! Describe a task, pick one of the proposed commands, and get it on the
//! clipboard, on stdout, or straight into your shell prompt.

mod commands;
mod config;
mod environment;
mod llm;
mod output;
mod safety;
mod ui;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command as ProcessCommand, ExitCode};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use commands::{Generator, SafetyMode};
use environment::ShellEnvironment;
use output::{Dispatcher, OutputMode};
use ui::{InputStage, Outcome, ProgressStage, Stage, TerminalTarget};

/// Environment variable enabling the log file, with `RUST_LOG` syntax.
const LOG_ENV: &str = "ONELM_LOG";
const DEFAULT_LOG_DIRECTIVES: &str = "onelm=info,reqwest=warn";

#[derive(Parser)]
#[command(name = "onelm")]
#[command(author, version, about = "Turn a plain-English request into a shell command")]
#[command(long_about = "Turn a plain-English request into a shell command.\n\nPass the request as arguments, or run without arguments to type it in.")]
struct Cli {
    /// What you want to do, e.g. "find large files in this directory"
    #[arg(value_name = "QUERY")]
    query: Vec<String>,

    /// Output mode: clipboard, shell-function or stdout
    #[arg(short = 'o', long, value_name = "MODE", global = true)]
    output: Option<String>,

    /// Override the model from config
    #[arg(short = 'm', long, value_name = "MODEL", global = true)]
    model: Option<String>,

    /// Override the provider from config
    #[arg(long, value_name = "NAME", global = true)]
    provider: Option<String>,

    /// When to run the safety pass
    #[arg(long, value_enum, value_name = "MODE", global = true)]
    safety: Option<SafetyMode>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Each subcommand also accepts trailing words. A request that merely
/// starts with a subcommand name ("install docker on ubuntu") is a query.
#[derive(Subcommand)]
enum Commands {
    /// Open configuration file in $EDITOR
    Config {
        #[arg(hide = true)]
        rest: Vec<String>,
    },
    /// Print shell integration for your shell
    Install {
        #[arg(hide = true)]
        rest: Vec<String>,
    },
    /// List supported providers
    Providers {
        #[arg(hide = true)]
        rest: Vec<String>,
    },
}

/// What a command line asks for once subcommand words are sorted out.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Config,
    Install,
    Providers,
    Query(String),
}

impl Cli {
    fn action(&self) -> Action {
        let (name, rest, action) = match &self.command {
            None => return Action::Query(self.query.join(" ")),
            Some(Commands::Config { rest }) => ("config", rest, Action::Config),
            Some(Commands::Install { rest }) => ("install", rest, Action::Install),
            Some(Commands::Providers { rest }) => ("providers", rest, Action::Providers),
        };
        if rest.is_empty() {
            action
        } else {
            let words: Vec<&str> = std::iter::once(name)
                .chain(rest.iter().map(String::as_str))
                .collect();
            Action::Query(words.join(" "))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.action() {
        Action::Config => handle_config(),
        Action::Install => handle_install(),
        Action::Providers => handle_providers(),
        Action::Query(query) => handle_query(cli, query).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Log to a file when `ONELM_LOG` is set. The terminal belongs to the UI,
/// so nothing is ever logged to stdout or stderr.
fn init_logging() {
    let Ok(directives) = std::env::var(LOG_ENV) else {
        return;
    };
    let Some(path) = log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let filter = match directives.trim() {
        "" => EnvFilter::new(DEFAULT_LOG_DIRECTIVES),
        custom => {
            EnvFilter::try_new(custom).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

fn log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("onelm").join("onelm.log"))
}

/// Handle the config subcommand.
fn handle_config() -> Result<()> {
    let config_path = config::Config::config_path()?;

    // Create default config if it doesn't exist
    if !config_path.exists() {
        config::Config::default().save()?;
        println!("Created default config at {}", config_path.display());
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = ProcessCommand::new(&editor)
        .arg(&config_path)
        .status()
        .with_context(|| format!("failed to open editor '{}'", editor))?;

    if !status.success() {
        eprintln!("Editor exited with non-zero status");
    }

    Ok(())
}

/// How `--output shell-function` splits the terminal from the result.
const SHELL_FUNCTION_NOTE: &str = "\
With --output shell-function the interface is drawn on /dev/tty and only the
chosen command is printed to stdout, so $(onelm --output shell-function)
captures just that command. Nothing is printed if you cancel or quit.";

/// Handle the install subcommand.
fn handle_install() -> Result<()> {
    println!("Shell Integration Setup");
    println!("=======================\n");

    let shell = std::env::var("SHELL").unwrap_or_default();

    if shell.contains("zsh") {
        println!("Add to ~/.zshrc:\n");
        println!(
            r#"function _onelm_widget() {{
    local cmd
    cmd=$(onelm --output shell-function)
    if [[ -n "$cmd" ]]; then
        LBUFFER+="$cmd"
    fi
    zle redisplay
}}
zle -N _onelm_widget
bindkey '^k' _onelm_widget"#
        );
    } else if shell.contains("bash") {
        println!("Add to ~/.bashrc:\n");
        println!(
            r#"_onelm_readline() {{
    local cmd
    cmd=$(onelm --output shell-function)
    READLINE_LINE="${{READLINE_LINE}}${{cmd}}"
    READLINE_POINT=${{#READLINE_LINE}}
}}
bind -x '"\C-k": _onelm_readline'"#
        );
    } else if shell.contains("fish") {
        println!("Add to ~/.config/fish/config.fish:\n");
        println!(
            r#"function _onelm_fish
    set -l cmd (onelm --output shell-function)
    commandline -i $cmd
end
bind \ck _onelm_fish"#
        );
    } else {
        println!("Unknown shell: {}", shell);
        println!("\nRun `onelm --output shell-function` from a shell function and insert what it prints.");
    }

    println!("\n{}", SHELL_FUNCTION_NOTE);
    println!("\nAfter adding the integration, restart your shell or run:");
    println!("  source ~/.zshrc  # or your shell's config file");

    Ok(())
}

/// Handle the providers subcommand.
fn handle_providers() -> Result<()> {
    let configured = config::Config::load()
        .map(|c| c.provider)
        .unwrap_or_default();

    println!("Supported Providers");
    println!("===================\n");

    for provider in config::supported_providers() {
        let marker = if provider.name == configured {
            " (configured)"
        } else {
            ""
        };
        println!(
            "  {}{}\n    default model: {}\n    api key env: {}\n",
            provider.name, marker, provider.default_model, provider.api_key_env
        );
    }

    println!("Usage:");
    println!("  onelm --provider openai \"query\"        # Use a different provider");
    println!("  onelm --model gpt-4o \"query\"           # Override the model directly");

    Ok(())
}

/// Run the interactive flow: stages, then output.
async fn handle_query(cli: Cli, query: String) -> Result<()> {
    let mut config = config::Config::load().context("failed to load config")?;
    if let Some(provider) = cli.provider {
        config.select_provider(&provider);
    }
    if let Some(model) = cli.model {
        config.model = Some(model);
    }
    let safety = cli.safety.unwrap_or(config.safety);
    let mode = OutputMode::parse(cli.output.as_deref().unwrap_or(&config.output));

    // Fail on a missing key before drawing anything.
    let resolved = config.resolve()?;
    info!(
        provider = resolved.provider.name,
        model = %resolved.model,
        %mode,
        ?safety,
        "starting"
    );

    let client = llm::create_client(&resolved, ShellEnvironment::detect())
        .context("failed to create LLM client")?;
    let generator = Arc::new(Generator::new(Arc::new(client), safety));

    let (stage, tasks) = if query.trim().is_empty() {
        (Stage::Input(InputStage::new(safety)), Vec::new())
    } else {
        ProgressStage::start(query.trim().to_string(), safety)
    };

    let target = if mode == OutputMode::ShellFunction {
        TerminalTarget::Tty
    } else {
        TerminalTarget::Stdout
    };

    let outcome = ui::run(stage, tasks, generator, target)
        .await
        .context("error running UI")?;

    finish(outcome, &Dispatcher::new(mode), &mut io::stdout().lock())
}

/// Act on how the interface ended. In shell-function mode `out` receives
/// the selected command and nothing else.
fn finish<W: Write>(outcome: Outcome, dispatcher: &Dispatcher, out: &mut W) -> Result<()> {
    match outcome {
        Outcome::Cancelled => {
            debug!("cancelled before selection");
            Ok(())
        }
        Outcome::Failed(e) => Err(anyhow::Error::new(e).context("failed to generate options")),
        Outcome::NoSelection => {
            if dispatcher.mode() != OutputMode::ShellFunction {
                writeln!(out, "No option selected")?;
            }
            Ok(())
        }
        Outcome::Selected(option) => {
            info!(command = %option.command, "command selected");
            dispatcher
                .dispatch(&option.command, out)
                .context("failed to output command")
        }
    }
}
