use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "produceroom", version, about = "Produceroom CLI")]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Today's items: add, list, complete, undo, edit
    Item {
        #[command(subcommand)]
        action: commands::item::ItemAction,
    },
    /// Per-item timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Per-SKU timing history
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Shared priority labels
    Priority {
        #[command(subcommand)]
        action: commands::priority::PriorityAction,
    },
    /// Daily worklist import and day rollover
    Worklist {
        #[command(subcommand)]
        action: commands::worklist::WorklistAction,
    },
    /// Per-SKU completion photos
    Photo {
        #[command(subcommand)]
        action: commands::photo::PhotoAction,
    },
    /// Per-SKU instructional videos
    Video {
        #[command(subcommand)]
        action: commands::video::VideoAction,
    },
    /// Processing focus stopwatch
    Focus {
        #[command(subcommand)]
        action: commands::focus::FocusAction,
    },
    /// Retention purge and cache migration
    Maintenance {
        #[command(subcommand)]
        action: commands::maintenance::MaintenanceAction,
    },
    /// Follow the store and run periodic chores until interrupted
    Watch(commands::watch::WatchArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print a shell completion script
    Completions(commands::completions::CompletionsArgs),
}

fn init_tracing() {
    let fallback = produceroom_core::Config::load_or_default().logging.filter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Item { action } => commands::item::run(action),
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Priority { action } => commands::priority::run(action),
        Commands::Worklist { action } => commands::worklist::run(action),
        Commands::Photo { action } => commands::photo::run(action),
        Commands::Video { action } => commands::video::run(action),
        Commands::Focus { action } => commands::focus::run(action),
        Commands::Maintenance { action } => commands::maintenance::run(action),
        Commands::Watch(args) => commands::watch::run(args),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions(args) => commands::completions::run(args.shell, &mut Cli::command()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
