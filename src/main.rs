use clap::{Parser, Subcommand};
use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use comment_guesser::client::{HttpBackend, HttpBackendConfig, RoundSource};
use comment_guesser::error::GameResult;
use comment_guesser::oracle::{self, Catalog, OracleConfig, OracleState};
use comment_guesser::present;
use comment_guesser::session::{SessionConfig, SessionController, SessionHandle, SessionNotice};
use comment_guesser::types::{Choice, RoundPhase, SessionPhase};

#[derive(Parser, Debug)]
#[command(name = "comment-guesser", about = "Guess which comment got the most likes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play in the terminal against a scoring service
    Play {
        /// Overrides API_BASE_URL
        #[arg(long)]
        api_base_url: Option<String>,
        /// One round per session instead of a daily path
        #[arg(long)]
        single: bool,
    },
    /// Run the development scoring service
    Serve {
        /// Overrides ORACLE_PORT
        #[arg(long)]
        port: Option<u16>,
        /// Overrides ROUND_CATALOG
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Logs go to stderr so they stay out of the game screen
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comment_guesser=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Play {
        api_base_url: None,
        single: false,
    }) {
        Command::Play {
            api_base_url,
            single,
        } => {
            let mut backend_config = HttpBackendConfig::from_env();
            if let Some(url) = api_base_url {
                backend_config.base_url = url.trim_end_matches('/').to_string();
            }
            if single {
                backend_config.round_source = RoundSource::SingleRound;
            }
            play(backend_config, SessionConfig::from_env()).await
        }
        Command::Serve { port, catalog } => {
            let mut config = OracleConfig::from_env();
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(catalog) = catalog {
                config.catalog_path = catalog;
            }
            serve(config).await
        }
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn serve(config: OracleConfig) -> Result<(), Box<dyn Error>> {
    tracing::info!("Starting scoring oracle ({:?} mode)...", config.mode);

    let catalog = Catalog::load(&config.catalog_path)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = oracle::router(Arc::new(OracleState::new(catalog, config)));

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn play(
    backend_config: HttpBackendConfig,
    session_config: SessionConfig,
) -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(HttpBackend::new(backend_config)?);
    tracing::info!(
        "Playing against {} ({:?})",
        backend.config().base_url,
        backend.config().round_source
    );

    let handle = SessionController::spawn(backend, session_config);
    let mut notices = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("{}", present::render_briefing(&handle.snapshot()));
    print_help();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !run_command(&handle, line.trim())? {
                    break;
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => render_notice(&handle, notice),
                Err(RecvError::Lagged(n)) => tracing::warn!("Skipped {} session updates", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    let _ = handle.shutdown();
    Ok(())
}

/// Returns false when the player wants to quit
fn run_command(handle: &SessionHandle, input: &str) -> GameResult<bool> {
    match input.to_lowercase().as_str() {
        "" => {}
        "start" | "s" => handle.start()?,
        "restart" | "r" => handle.restart()?,
        "retry" => handle.retry_submission()?,
        "quit" | "q" | "exit" => return Ok(false),
        "help" | "?" => print_help(),
        other => match other.parse::<usize>() {
            Ok(pick) if pick > 0 => {
                let session = handle.snapshot();
                match session
                    .current_round()
                    .and_then(|round| round.options.get(pick - 1))
                {
                    Some(option) => handle.select(option.comment_id.clone())?,
                    None => println!("No option {} in this round.", pick),
                }
            }
            _ => print_help(),
        },
    }
    Ok(true)
}

fn render_notice(handle: &SessionHandle, notice: SessionNotice) {
    let session = handle.snapshot();
    match notice {
        SessionNotice::RoundStarted { .. } => print!("\n{}", present::render_round(&session)),
        SessionNotice::Tick { remaining, .. } => {
            if remaining > 0 && (remaining <= 5 || remaining % 5 == 0) {
                println!("  {}s left", remaining);
            }
        }
        SessionNotice::GuessLocked { choice, .. } => match choice {
            Choice::NoAnswer => println!("Time's up! Scoring..."),
            Choice::Comment(_) => println!("Locked in. Scoring..."),
        },
        SessionNotice::VerdictRevealed { verdict, .. } => {
            if verdict.is_correct {
                println!("Correct!");
            } else {
                println!("Wrong.");
            }
        }
        SessionNotice::Phase { phase, .. } => match phase {
            SessionPhase::Briefing => print!("\n{}", present::render_briefing(&session)),
            SessionPhase::Won | SessionPhase::Lost => {
                let today = chrono::Local::now().date_naive();
                print!("\n{}", present::render_report(&session, today));
            }
            SessionPhase::Playing { .. } => {}
        },
        SessionNotice::Error { msg, retryable, .. } => {
            println!("! {}", msg);
            let holding = session.phase
                == SessionPhase::Playing {
                    round_phase: RoundPhase::AwaitingVerdict,
                };
            if retryable && holding {
                println!("Type 'retry' to resend your guess.");
            } else if retryable && session.phase == SessionPhase::Briefing {
                println!("Type 'start' to try again.");
            } else if session.phase == SessionPhase::Briefing {
                println!("The server sent rounds that cannot be played.");
            }
        }
    }
}

fn print_help() {
    println!("Commands: start | 1-4 to pick a comment | retry | restart | quit");
}
