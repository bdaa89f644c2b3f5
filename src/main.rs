use anyhow::Result;
use cerberus::cli::{Cli, Command, DetectArgs, ExpiringArgs};
use cerberus::config::AppConfig;
use cerberus::notify::{LogNotifier, Notifier, OutboxNotifier};
use cerberus::pipeline::{self, DetectOptions, ExpiryOptions};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Log messages unless an outbox directory is given
fn make_notifier(outbox: Option<&Path>) -> Result<Box<dyn Notifier>> {
    Ok(match outbox {
        Some(dir) => Box::new(OutboxNotifier::new(dir)?),
        None => Box::new(LogNotifier::new()),
    })
}

fn run_detect(args: DetectArgs, mut config: AppConfig) -> Result<()> {
    if let Some(days) = args.ref_days {
        config.detector.nr_ref_days = days;
    }
    if let Some(days) = args.future_days {
        config.detector.nr_future_days = days;
    }

    let options = DetectOptions {
        histograms_dir: args.histograms,
        store_path: args.store,
        probes_path: args.probes,
        ignored_path: args.ignored,
        jobs: args.jobs,
        config,
    };

    let mut notifier = make_notifier(args.outbox.as_deref())?;
    let report = pipeline::run_detection(&options, notifier.as_mut())?;

    for line in report.summary_lines() {
        println!("{}", line);
    }
    if !report.skipped_files.is_empty() {
        eprintln!("Skipped {} unreadable dump(s)", report.skipped_files.len());
    }
    Ok(())
}

fn run_expiring(args: ExpiringArgs, config: AppConfig) -> Result<()> {
    let options = ExpiryOptions {
        probes_path: args.probes,
        calendar_path: args.calendar,
        today: args
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        notified_path: args.notified,
        send: args.notify,
        config,
    };

    let mut notifier = make_notifier(args.outbox.as_deref())?;
    let report = pipeline::run_expiry(&options, notifier.as_mut())?;

    for line in &report.lines {
        println!("{}", line);
    }
    if args.notify {
        eprintln!("Sent {} expiry digest(s)", report.messages_sent);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = AppConfig::load_or_default(args.config.as_deref())?;

    match args.command {
        Command::Detect(detect) => run_detect(detect, config),
        Command::Expiring(expiring) => run_expiring(expiring, config),
    }
}
