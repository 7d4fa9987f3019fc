//! `lovelaice`: an AI engineering agent for the terminal.
//!
//! `ask` runs a single turn, `chat` a REPL; both stream the reply to stdout.
//! Permissions are granted per invocation with `-r`, `-w`, `-x` and `--allow`.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use lovelaice::cancel::CancelToken;
use lovelaice::core::message::Message;
use lovelaice::core::scope::{ExecutePolicy, SecurityScope};
use lovelaice::engine::{Engine, Session, TurnRequest};
use lovelaice::error::EngineError;
use lovelaice::exit_codes;
use lovelaice::io::completion::OpenAiClient;
use lovelaice::io::config::{LovelaiceConfig, load_discovered};
use lovelaice::io::init::{InitOptions, init_config};
use lovelaice::io::interaction::TerminalInteraction;
use lovelaice::logging;
use lovelaice::security::SecurityGate;

#[derive(Parser)]
#[command(
    name = "lovelaice",
    version,
    about = "An AI engineering agent for the terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter `.lovelaice.toml` in the current directory.
    Init {
        /// Model identifier for the default model.
        #[arg(long)]
        model: Option<String>,
        /// Base URL of the OpenAI-compatible endpoint.
        #[arg(long)]
        base_url: Option<String>,
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Run a single instruction and stream the reply.
    Ask {
        #[command(flatten)]
        agent: AgentArgs,
        /// The instruction; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Start an interactive session.
    Chat {
        #[command(flatten)]
        agent: AgentArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct AgentArgs {
    /// Run this skill instead of letting the agent choose.
    #[arg(short, long)]
    skill: Option<String>,
    /// Model alias from the config.
    #[arg(short, long)]
    model: Option<String>,
    /// Path the agent may read (repeatable).
    #[arg(short, long = "read", value_name = "PATH", default_value = ".")]
    read: Vec<PathBuf>,
    /// Path the agent may write (repeatable).
    #[arg(short, long = "write", value_name = "PATH")]
    write: Vec<PathBuf>,
    /// Allow executing any command.
    #[arg(short = 'x', long)]
    execute: bool,
    /// Allow executing this command (repeatable).
    #[arg(long = "allow", value_name = "CMD", conflicts_with = "execute")]
    allow: Vec<String>,
    /// File whose contents are added to the conversation (repeatable).
    #[arg(short, long = "input", value_name = "FILE")]
    input: Vec<PathBuf>,
}

impl AgentArgs {
    fn scope(&self) -> SecurityScope {
        let execute = if self.execute {
            ExecutePolicy::AllowAll
        } else if !self.allow.is_empty() {
            ExecutePolicy::allow_list(self.allow.iter().cloned())
        } else {
            ExecutePolicy::Deny
        };
        SecurityScope {
            read_paths: self.read.clone(),
            write_paths: self.write.clone(),
            execute,
        }
    }
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) if EngineError::is_cancelled(&err) => {
            eprintln!("\ncancelled");
            exit_codes::CANCELLED
        }
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init {
            model,
            base_url,
            force,
        } => cmd_init(InitOptions {
            model,
            base_url,
            force,
        }),
        Command::Ask { agent, prompt } => cmd_ask(&agent, prompt.join(" ")),
        Command::Chat { agent } => cmd_chat(&agent),
    }
}

fn cmd_init(options: InitOptions) -> Result<i32> {
    let cwd = std::env::current_dir().context("read working directory")?;
    let path = init_config(&cwd, &options)?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_ask(agent: &AgentArgs, prompt: String) -> Result<i32> {
    let (engine, cfg) = build_engine(agent)?;
    let mut session = Session::with_history(read_inputs(&engine, &agent.input, &cfg)?);
    let mut request = TurnRequest::new(prompt);
    request.skill = agent.skill.clone();

    let mut stdout = std::io::stdout();
    let mut sink = |piece: &str| {
        let _ = stdout.write_all(piece.as_bytes());
        let _ = stdout.flush();
    };
    engine.run_turn(&mut session, request, &mut sink)?;
    println!();
    Ok(exit_codes::OK)
}

fn cmd_chat(agent: &AgentArgs) -> Result<i32> {
    let (engine, cfg) = build_engine(agent)?;
    let mut session = Session::with_history(read_inputs(&engine, &agent.input, &cfg)?);
    println!(
        "Lovelaice | {} | {}",
        cfg.model(agent.model.as_deref())?.model,
        Local::now().format("%A, %B %-d, %Y")
    );
    println!("Type 'exit' or press Ctrl-D to quit. Ctrl-C cancels the running turn.");

    let stdin = std::io::stdin();
    loop {
        print!("\n> ");
        std::io::stdout().flush().context("flush prompt")?;
        let mut line = String::new();
        if stdin.read_line(&mut line).context("read instruction")? == 0 {
            println!();
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let mut request = TurnRequest::new(line);
        request.skill = agent.skill.clone();
        let mut stdout = std::io::stdout();
        let mut sink = |piece: &str| {
            let _ = stdout.write_all(piece.as_bytes());
            let _ = stdout.flush();
        };
        match engine.run_turn(&mut session, request, &mut sink) {
            Ok(_) => println!(),
            Err(err) if EngineError::is_cancelled(&err) => eprintln!("\n[cancelled]"),
            Err(err) => eprintln!("\nerror: {:#}", err),
        }
        engine.cancel_token().reset();
    }
    Ok(exit_codes::OK)
}

fn build_engine(agent: &AgentArgs) -> Result<(Engine, LovelaiceConfig)> {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => return Err(err).context("load .env"),
    }
    let cwd = std::env::current_dir().context("read working directory")?;
    let (config_path, cfg) = load_discovered(&cwd)?;
    debug!(config = ?config_path, "configuration loaded");

    let model = cfg.model(agent.model.as_deref())?;
    let client = OpenAiClient::new(model, cfg.limits.request_timeout());

    let cancel = CancelToken::new();
    cancel.install_sigint_handler()?;

    let mut builder = Engine::builder()
        .completion(client)
        .interaction(TerminalInteraction::stdin())
        .gate(SecurityGate::new(agent.scope()))
        .cancel_token(cancel)
        .with_builtins(&cfg.limits);
    if let Some(prompt) = &cfg.system_prompt {
        builder = builder.system_prompt(prompt.clone());
    }
    let engine = builder.build()?;
    let unknown_skill = agent
        .skill
        .as_ref()
        .filter(|name| engine.skills().get(name).is_none());
    if let Some(name) = unknown_skill {
        return Err(EngineError::UnknownSkill { name: name.clone() }.into());
    }
    Ok((engine, cfg))
}

/// Read `--input` files through the gate and turn them into system messages.
fn read_inputs(engine: &Engine, files: &[PathBuf], cfg: &LovelaiceConfig) -> Result<Vec<Message>> {
    files
        .iter()
        .map(|path| read_input(engine.gate(), path, cfg.limits.read_limit_bytes))
        .collect()
}

fn read_input(gate: &SecurityGate, path: &Path, limit_bytes: usize) -> Result<Message> {
    if !gate.can_read(path) {
        bail!(
            "Permission Denied: Cannot read input file '{}' (grant it with -r).",
            path.display()
        );
    }
    let file = fs::File::open(path).with_context(|| format!("open input {}", path.display()))?;
    let mut buf = Vec::new();
    file.take(limit_bytes as u64)
        .read_to_end(&mut buf)
        .with_context(|| format!("read input {}", path.display()))?;
    Ok(Message::system(format!(
        "Contents of file '{}':\n{}",
        path.display(),
        String::from_utf8_lossy(&buf)
    )))
}
