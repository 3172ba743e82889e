mod config;
mod systemd;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flatwatch_client::{HtmlTextCleaner, ReqwestFetcher};
use flatwatch_core::{
    Catalog, CrawlConfig, CrawlResult, Language, Ledger, RetryPolicy, RunOptions, RunReport,
    RunService, SiteCrawler, TracingCrawlReporter,
};

use crate::config::MailConfig;
use crate::systemd::UnitPaths;

#[derive(Parser)]
#[command(
    name = "flatwatch",
    version,
    about = "Watch rental listing sites and mail a digest of new flat offers"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Args)]
struct RunArgs {
    /// JSON file with the site catalog
    #[arg(long, env = "FLATWATCH_SITES", default_value = "sites.json")]
    sites: PathBuf,

    /// Ledger of already reported offers
    #[arg(long, env = "FLATWATCH_KNOWN_FILE", default_value = "known.txt")]
    known_file: PathBuf,

    /// Digest language (de, en)
    #[arg(long, env = "FLATWATCH_LANGUAGE", default_value = "de")]
    language: Language,

    /// Request timeout in seconds
    #[arg(long, env = "FLATWATCH_TIMEOUT_SECS", default_value_t = 30)]
    timeout: u64,

    /// Retries per site after a failed attempt
    #[arg(long, env = "FLATWATCH_RETRIES", default_value_t = 2)]
    retries: u32,

    /// Wait before the first retry, in seconds
    #[arg(long, env = "FLATWATCH_BACKOFF_SECS", default_value_t = 1.0)]
    backoff: f64,

    /// Write the raw listing HTML of every matched site into this directory
    #[arg(long, env = "FLATWATCH_DUMP_DIR")]
    dump_dir: Option<PathBuf>,

    /// Print the digest instead of mailing it
    #[arg(long, default_value_t = false)]
    no_email: bool,

    /// Report offers even if they are already in the ledger
    #[arg(long, default_value_t = false)]
    include_known: bool,

    /// Print the per-site results after the run
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print or install systemd units for hourly runs
    Systemd {
        #[command(subcommand)]
        action: SystemdAction,
    },
}

#[derive(Subcommand)]
enum SystemdAction {
    /// Print the service unit
    Service,
    /// Print a service template that runs as the instance user
    ServiceUser,
    /// Print the timer unit
    Timer,
    /// Write service and timer to ~/.local/share/systemd/user
    Install {
        /// Also reload systemd and start the timer
        #[arg(long, default_value_t = false)]
        enable: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    match cli.command {
        Some(Commands::Systemd { action }) => cmd_systemd(action).await,
        None => {
            tokio::select! {
                code = cmd_run(cli.run) => code,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, no digest sent");
                    Ok(ExitCode::SUCCESS)
                }
            }
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("flatwatch={level}").parse()?)
        .add_directive(format!("flatwatch_core={level}").parse()?)
        .add_directive(format!("flatwatch_client={level}").parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let mail = MailConfig::from_env(!args.no_email).map_err(|e| anyhow::anyhow!(e))?;

    let catalog = Catalog::load(&args.sites).map_err(|e| anyhow::anyhow!(e))?;
    tracing::debug!(sites = catalog.len(), path = %args.sites.display(), "Loaded site catalog");

    let mut ledger = Ledger::open(&args.known_file)
        .await
        .map_err(|e| anyhow::anyhow!(e))?
        .with_include_known(args.include_known);

    let backoff = Duration::try_from_secs_f64(args.backoff)
        .with_context(|| format!("Invalid --backoff value: {}", args.backoff))?;
    let mut config = CrawlConfig::default().with_retry(RetryPolicy::new(args.retries, backoff));
    if let Some(dir) = &args.dump_dir {
        config = config.with_dump_dir(dir);
    }

    let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(args.timeout))
        .context("Failed to create HTTP client")?;
    let crawler = SiteCrawler::new(fetcher, HtmlTextCleaner::new(), config);

    let options = RunOptions {
        no_email: args.no_email,
        language: args.language,
        recipient: mail.to.clone(),
        bcc: mail.bcc.clone(),
    };
    let notifier = mail.notifier().map_err(|e| anyhow::anyhow!(e))?;
    let service = RunService::new(crawler, notifier, options);

    let report = service
        .run(&catalog, &mut ledger, &TracingCrawlReporter)
        .await;

    if args.no_email {
        print_digest(&report);
    }
    if args.debug {
        print_results(&report.results);
    }

    Ok(ExitCode::from(report.exit_code()))
}

fn print_digest(report: &RunReport) {
    if let Some(digest) = &report.digest {
        println!("{}\n", digest.subject);
        println!("{}", digest.body);
    }
}

fn print_results(results: &[CrawlResult]) {
    for result in results {
        match &result.error {
            Some(error) => println!("{}: {error}", result.site),
            None => {
                let urls: Vec<&str> = result.offers.iter().map(|o| o.url.as_str()).collect();
                println!("{}: [{}]", result.site, urls.join(", "));
            }
        }
    }
}

async fn cmd_systemd(action: SystemdAction) -> Result<ExitCode> {
    let paths = UnitPaths::current()?;
    match action {
        SystemdAction::Service => print!("{}", systemd::service_file(&paths, false)),
        SystemdAction::ServiceUser => print!("{}", systemd::service_file(&paths, true)),
        SystemdAction::Timer => print!("{}", systemd::timer_file(systemd::CHECK_INTERVAL)),
        SystemdAction::Install { enable } => {
            let dir = systemd::user_unit_dir()?;
            if let Err(e) = systemd::write_units(&dir, &paths) {
                tracing::error!(dir = %dir.display(), error = %e, "Failed to install systemd units");
                return Ok(ExitCode::from(2));
            }
            tracing::info!(dir = %dir.display(), "Installed systemd units");

            if enable {
                let code = systemd::enable_timer().await?;
                return Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
