use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

#[derive(Parser)]
#[command(name = "pomotune", version, about = "Pomodoro timer that switches Spotify playlists")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Session lengths
    Durations {
        #[command(subcommand)]
        action: commands::durations::DurationsAction,
    },
    /// Playlist bindings per session kind
    Playlist {
        #[command(subcommand)]
        action: commands::playlist::PlaylistAction,
    },
    /// Spotify authorization
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Direct playback control
    Player {
        #[command(subcommand)]
        action: commands::player::PlayerAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions { shell: Shell },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action).await,
        Commands::Durations { action } => commands::durations::run(action).await,
        Commands::Playlist { action } => commands::playlist::run(action).await,
        Commands::Auth { action } => commands::auth::run(action).await,
        Commands::Player { action } => commands::player::run(action).await,
        Commands::Config { action } => commands::config::run(action).await,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pomotune", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
