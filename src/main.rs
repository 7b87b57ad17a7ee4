use clap::Parser;
use indexq::Settings;
use indexq::cli::commands::{expand, init, run, work};
use indexq::cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Init writes the settings file; everything else reads it
    if let Commands::Init { force } = cli.command {
        exit_on_error(init::run_init(force));
        return;
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    indexq::logging::init_with_config(&settings.logging);

    let result = match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Config => init::run_config(&settings),
        Commands::Expand { root, summary } => expand::run(root, summary, &settings),
        Commands::Run {
            root,
            snapshot,
            workers,
            max_bytes,
        } => run::run(
            run::RunArgs {
                root,
                snapshot,
                workers,
                max_bytes,
            },
            &settings,
        ),
        Commands::Replay { snapshot, workers } => run::replay(snapshot, workers, &settings),
        Commands::Work => work::run(),
    };
    exit_on_error(result);
}

fn exit_on_error(result: anyhow::Result<()>) {
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
