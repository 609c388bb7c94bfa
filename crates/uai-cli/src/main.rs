//! Headless console driver for UAI engines.
//!
//! Exercises the full protocol stack from the command line:
//!
//! ```text
//! uai-cli probe ./engine
//! uai-cli bestmove ./engine --fen "x5o/7/7/7/7/7/o5x x 0 1" --depth 4
//! ```
//!
//! Logging goes through `env_logger`; set `RUST_LOG=uai_core=debug` to
//! watch the protocol exchange, or `--log-dir` to keep wire logs on disk.

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use std::time::Duration;
use uai_core::{EngineConfig, SearchConstraints, Session};

#[derive(Parser)]
#[command(name = "uai-cli", about = "Console driver for UAI engines", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Flags shared by every subcommand that talks to an engine.
#[derive(Args)]
struct EngineArgs {
    /// Path to the engine binary.
    engine: String,

    /// Extra engine arguments, quoted as one string (e.g. "--threads 2").
    #[arg(long)]
    engine_args: Option<String>,

    /// Working directory for the engine process.
    #[arg(long)]
    working_dir: Option<String>,

    /// Directory for wire logs (one file per session).
    #[arg(long)]
    log_dir: Option<String>,

    /// Handshake deadline in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    handshake_timeout_ms: u64,
}

impl EngineArgs {
    fn to_config(&self) -> Result<EngineConfig, String> {
        let mut config = EngineConfig::new(&self.engine)
            .handshake_timeout(Duration::from_millis(self.handshake_timeout_ms));
        if let Some(ref raw) = self.engine_args {
            let args = shlex::split(raw)
                .ok_or_else(|| format!("unbalanced quoting in --engine-args: {:?}", raw))?;
            config = config.args(args);
        }
        if let Some(ref dir) = self.working_dir {
            config = config.working_dir(dir.clone());
        }
        if let Some(ref dir) = self.log_dir {
            config = config.log_dir(dir.clone());
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Identify the engine and print what it declared.
    Probe {
        #[command(flatten)]
        engine: EngineArgs,

        /// Print the identity as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Request one move for a position.
    Bestmove {
        #[command(flatten)]
        engine: EngineArgs,

        /// Position as a FEN-like string.
        #[arg(long)]
        fen: String,

        /// Search depth limit in plies.
        #[arg(long)]
        depth: Option<u32>,

        /// Search time limit in milliseconds.
        #[arg(long)]
        movetime: Option<u64>,

        /// Overall deadline for the reply in milliseconds.
        #[arg(long, default_value_t = 120_000)]
        move_timeout_ms: u64,

        /// Print engine `info` lines as they arrive.
        #[arg(long)]
        show_info: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Probe { engine, json } => probe(&engine, json),
        Command::Bestmove {
            engine,
            fen,
            depth,
            movetime,
            move_timeout_ms,
            show_info,
        } => bestmove(
            &engine,
            &fen,
            depth,
            movetime,
            Duration::from_millis(move_timeout_ms),
            show_info,
        ),
    }
}

fn probe(args: &EngineArgs, json: bool) -> Result<(), String> {
    let mut session = Session::start(args.to_config()?).map_err(|e| e.to_string())?;
    log::info!("probing {}", args.engine);
    let identity = session.identify().map_err(|e| e.to_string())?;

    if json {
        let rendered =
            serde_json::to_string_pretty(identity).map_err(|e| e.to_string())?;
        println!("{}", rendered);
    } else {
        println!("name:   {}", identity.name().unwrap_or("<not declared>"));
        println!("author: {}", identity.author().unwrap_or("<not declared>"));
        if identity.option_count() > 0 {
            println!("options:");
            for (name, value) in identity.options() {
                println!("  {} = {}", name, value);
            }
        }
    }

    session.shutdown();
    Ok(())
}

fn bestmove(
    args: &EngineArgs,
    fen: &str,
    depth: Option<u32>,
    movetime: Option<u64>,
    move_timeout: Duration,
    show_info: bool,
) -> Result<(), String> {
    let config = args.to_config()?.move_timeout(move_timeout);
    let mut session = Session::start(config).map_err(|e| e.to_string())?;
    session.identify().map_err(|e| e.to_string())?;

    if show_info {
        session.set_info_handler(|raw| eprintln!("info {}", raw));
    }

    let mut constraints = SearchConstraints::new();
    if let Some(depth) = depth {
        constraints = constraints.depth(depth);
    }
    if let Some(ms) = movetime {
        constraints = constraints.movetime(ms);
    }

    log::info!("requesting move for position: {}", fen);
    let mv = session
        .request_move(fen, &constraints)
        .map_err(|e| e.to_string())?;
    println!("{}", mv);

    session.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn engine_args_split_with_shlex() {
        let args = EngineArgs {
            engine: "./engine".to_string(),
            engine_args: Some("--threads 2 --book 'my book.bin'".to_string()),
            working_dir: None,
            log_dir: None,
            handshake_timeout_ms: 10_000,
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.args, vec!["--threads", "2", "--book", "my book.bin"]);
    }

    #[test]
    fn unbalanced_engine_args_are_rejected() {
        let args = EngineArgs {
            engine: "./engine".to_string(),
            engine_args: Some("--book 'unterminated".to_string()),
            working_dir: None,
            log_dir: None,
            handshake_timeout_ms: 10_000,
        };
        assert!(args.to_config().is_err());
    }
}
