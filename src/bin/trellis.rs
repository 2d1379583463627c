use std::io::BufRead;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tracing::warn;
use trellis_wm::actor::reactor::{self, Event, Query, Reactor};
use trellis_wm::common::config::{Config, config_file};
use trellis_wm::common::log;
use trellis_wm::model::snapshot::NodeSnapshot;

/// Drives the window manager core from a stream of backend events.
///
/// Events are read from stdin, one RON value per line; requests for the
/// backend are printed to stdout.
#[derive(Parser)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Check whether the config file can be loaded without running anything.
    #[arg(long)]
    validate: bool,

    /// Record reactor events to the specified file path. Overwrites the file if
    /// exists.
    #[arg(long, value_name = "PATH")]
    record: Option<PathBuf>,

    /// Replay a recording made with --record instead of reading stdin.
    #[arg(long, value_name = "PATH", conflicts_with = "record")]
    replay: Option<PathBuf>,

    /// Print the final tree as JSON when input ends.
    #[arg(long)]
    dump_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default configuration file.
    PrintDefaultConfig,
}

fn main() {
    sigpipe::reset();
    let opt = Cli::parse();

    if let Some(Commands::PrintDefaultConfig) = opt.command {
        print!("{}", Config::default_toml());
        return;
    }

    log::init_logging();
    install_panic_hook();

    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let config = if config_path.exists() {
        match Config::read(&config_path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err:#}");
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let issues = config.validate();
    if opt.validate || !issues.is_empty() {
        if issues.is_empty() {
            println!("Config validation passed");
            return;
        }
        for issue in issues {
            eprintln!("{issue}");
        }
        process::exit(1);
    }

    let result = match &opt.replay {
        Some(path) => replay(path.clone(), opt.dump_json),
        None => run(config, &opt),
    };
    if let Err(err) = result {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn replay(path: PathBuf, dump_json: bool) -> anyhow::Result<()> {
    let reactor = reactor::replay(&path, |request| println!("{request:?}"))?;
    if dump_json {
        let store = reactor.store();
        if let Some(snapshot) = NodeSnapshot::capture(store, store.root()) {
            println!("{}", snapshot.to_json()?);
        }
    }
    Ok(())
}

fn run(config: Config, opt: &Cli) -> anyhow::Result<()> {
    let record = reactor::Record::new(opt.record.as_deref())?;
    let (events_tx, events_rx) = trellis_wm::actor::channel();
    let (requests_tx, mut requests_rx) = trellis_wm::actor::channel();
    let reactor = Reactor::new(config, record, requests_tx);

    let printer = std::thread::spawn(move || {
        while let Some((_span, request)) = requests_rx.blocking_recv() {
            println!("{request:?}");
        }
    });

    let dump_json = opt.dump_json;
    let reader = std::thread::spawn(move || -> Option<NodeSnapshot> {
        for (number, line) in std::io::stdin().lock().lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(%err, "stdin closed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match ron::de::from_str::<Event>(&line) {
                Ok(event) => events_tx.send(event),
                Err(err) => warn!(line = number + 1, %err, "skipping malformed event"),
            }
        }
        if !dump_json {
            return None;
        }
        let (response, tree) = oneshot::channel();
        events_tx.send(Event::Query(Query::Tree(response)));
        drop(events_tx);
        tree.blocking_recv().ok().flatten()
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building runtime")?;
    runtime.block_on(reactor.run(events_rx));

    if let Ok(Some(snapshot)) = reader.join() {
        println!("{}", snapshot.to_json()?);
    }
    _ = printer.join();
    Ok(())
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // Abort on panic instead of propagating panics to the main thread.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        std::process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}
