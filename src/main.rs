//! Cadence CLI

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cadence::config::Config;
use cadence::generate::{self, DatasetParams};
use cadence::publish::{LinePublisher, MqttPublisher, Publisher};
use cadence::replay::{ReplayController, ReplaySession};
use cadence::source::{CsvSource, RecordSource};

#[derive(Debug, Parser)]
#[command(name = "cadence", version, about = "Timed CSV-to-MQTT event replayer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a CSV capture onto an MQTT broker
    Replay(ReplayArgs),
    /// Generate a synthetic 24h machine dataset
    Generate(GenerateArgs),
}

#[derive(Debug, Args)]
struct ReplayArgs {
    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Path to CSV (ts_iso,topic,payload_json)
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Broker host
    #[arg(long)]
    host: Option<String>,
    /// Broker port
    #[arg(long)]
    port: Option<u16>,
    /// Broker username
    #[arg(long)]
    username: Option<String>,
    /// Broker password
    #[arg(long, env = "CADENCE_MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// MQTT client identifier
    #[arg(long)]
    client_id: Option<String>,
    /// Quality of service (0, 1, 2)
    #[arg(long)]
    qos: Option<u8>,
    /// Publish with the retain flag
    #[arg(long)]
    retain: bool,
    /// Force TLS on
    #[arg(long, conflicts_with = "no_tls")]
    tls: bool,
    /// Force TLS off
    #[arg(long)]
    no_tls: bool,
    /// Time acceleration (1.0 = real time)
    #[arg(long)]
    speed: Option<f64>,
    /// Restart from the first record after the last one
    #[arg(long = "loop")]
    loop_forever: bool,
    /// Stop looping after this many cycles
    #[arg(long)]
    max_cycles: Option<u64>,
    /// Log progress every N records
    #[arg(long)]
    progress_every: Option<u64>,
    /// Print records to stdout instead of publishing
    #[arg(long)]
    dry_run: bool,
}

impl ReplayArgs {
    /// Layer command-line flags over file configuration
    fn apply(self, config: &mut Config) {
        if let Some(csv) = self.csv {
            config.source.path = csv;
        }
        if let Some(host) = self.host {
            config.broker.host = host;
        }
        if let Some(port) = self.port {
            config.broker.port = port;
        }
        if self.username.is_some() {
            config.broker.username = self.username;
        }
        if self.password.is_some() {
            config.broker.password = self.password;
        }
        if let Some(client_id) = self.client_id {
            config.broker.client_id = client_id;
        }
        if let Some(qos) = self.qos {
            config.broker.qos = qos;
        }
        if self.tls {
            config.broker.tls = Some(true);
        } else if self.no_tls {
            config.broker.tls = Some(false);
        }
        if let Some(speed) = self.speed {
            config.replay.speed = speed;
        }
        if let Some(max_cycles) = self.max_cycles {
            config.replay.max_cycles = Some(max_cycles);
        }
        if let Some(every) = self.progress_every {
            config.replay.progress_every = every;
        }
        config.broker.retain |= self.retain;
        config.replay.loop_forever |= self.loop_forever;
        config.replay.dry_run |= self.dry_run;
    }
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long, default_value = "blr")]
    site: String,
    #[arg(long, default_value = "line1")]
    line: String,
    #[arg(long, default_value = "SF-01")]
    machine: String,
    /// Local day to simulate (YYYY-MM-DD)
    #[arg(long, default_value = "2025-09-17")]
    date: NaiveDate,
    /// Local UTC offset in minutes
    #[arg(long, default_value_t = 330, allow_hyphen_values = true)]
    utc_offset_minutes: i32,
    /// Sampling interval (seconds)
    #[arg(long, default_value_t = 10)]
    interval_sec: u32,
    /// Ideal cycle time per part (seconds)
    #[arg(long, default_value_t = 12.0)]
    ideal_ct_s: f64,
    /// Reject probability (0..1)
    #[arg(long, default_value_t = 0.02)]
    reject_rate: f64,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    #[arg(long, default_value = "simple_day.csv")]
    outfile: PathBuf,
}

impl From<GenerateArgs> for DatasetParams {
    fn from(args: GenerateArgs) -> Self {
        Self {
            site: args.site,
            line: args.line,
            machine: args.machine,
            date: args.date,
            utc_offset_minutes: args.utc_offset_minutes,
            interval_secs: args.interval_sec,
            ideal_cycle_secs: args.ideal_ct_s,
            reject_rate: args.reject_rate,
            seed: args.seed,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Replay(args) => replay(args).await,
        Command::Generate(args) => run_generate(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadence=info"));

    // Logs go to stderr so dry-run output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

async fn replay(args: ReplayArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let session = ReplaySession::from_config(&config.replay)?;
    let records = CsvSource::from_config(&config.source)
        .load()
        .with_context(|| format!("loading {}", config.source.path.display()))?;

    let publisher: Arc<dyn Publisher> = if config.replay.dry_run {
        Arc::new(LinePublisher::stdout())
    } else {
        Arc::new(MqttPublisher::connect(&config.broker)?)
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping replay");
            interrupt.cancel();
        }
    });

    let mut controller = ReplayController::new(session, Arc::clone(&publisher));
    let summary = controller.run(&records, &cancel).await;

    if let Err(e) = publisher.close().await {
        warn!(error = %e, "Publisher did not shut down cleanly");
    }

    info!(
        cycles = summary.cycles,
        published = summary.stats.published,
        failed = summary.stats.failed,
        cancelled = summary.cancelled,
        "Replay finished: {summary}"
    );

    Ok(())
}

fn run_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let path = args.outfile.clone();
    let params = DatasetParams::from(args);
    let rows = generate::generate_to_file(&params, &path)
        .with_context(|| format!("writing {}", path.display()))?;

    println!("Generated {rows} rows: {}", path.display());
    println!();
    println!("Next steps:");
    println!(
        "  cadence replay --csv {} --host <broker> --port 8883 --username <user> --speed 1",
        path.display()
    );

    Ok(())
}
