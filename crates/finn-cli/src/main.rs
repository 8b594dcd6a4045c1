// SPDX-License-Identifier: AGPL-3.0-only

//! `finn`: host-side consistency checks against a FINN accelerator endpoint.
//!
//! ```text
//! USAGE:
//!   finn verify                      One round: local vs remote prediction
//!   finn rounds --count N            Repeated rounds with a summary line
//!   finn serve                       Answer requests with a software model
//!   finn init-model --width N        Write a seeded logistic model file
//!   finn show-config                 Print the resolved configuration
//! ```
//!
//! Exit status for `verify` and `rounds`: 0 match, 1 mismatch, 2 no response,
//! 3 round failure. Any command exits 4 when it cannot start (bad flags or
//! configuration, unresolvable host, unreadable model).

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use finn_host::{
    select_engine, EngineSelection, FileSource, Harness, HarnessConfig, LogisticEngine,
    RandomSource, ReportSink, RoundSummary, SampleSource, SoftwarePeer, UdpTransport,
};
use finn_wire::{ByteOrder, Framing, ModelContract};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "finn", about = "FINN accelerator inference consistency harness", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run one verification round.
    Verify {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        engine: EngineArgs,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Run repeated rounds and print a summary.
    Rounds {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        engine: EngineArgs,
        #[command(flatten)]
        source: SourceArgs,
        /// Number of rounds.
        #[arg(long, default_value_t = 10)]
        count: u64,
        /// Pause between rounds in milliseconds.
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
    },
    /// Act as the remote endpoint using a software model.
    Serve {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        engine: EngineArgs,
        /// Listen address.
        #[arg(long, default_value = "0.0.0.0:12345")]
        listen: SocketAddr,
        /// Stop after answering this many requests.
        #[arg(long)]
        max_requests: Option<u64>,
    },
    /// Write a seeded logistic model file.
    InitModel {
        /// Input width.
        #[arg(long)]
        width: usize,
        /// Weight seed.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Override the seeded bias.
        #[arg(long)]
        bias: Option<f32>,
        /// Output path.
        #[arg(long, default_value = "model.bin")]
        out: PathBuf,
    },
    /// Print the configuration after flags and environment are applied.
    ShowConfig {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// YAML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Endpoint host.
    #[arg(long, env = "FINN_PEER_HOST")]
    host: Option<String>,
    /// Endpoint UDP port.
    #[arg(long, env = "FINN_PEER_PORT")]
    port: Option<u16>,
    /// Reply timeout in milliseconds.
    #[arg(long, env = "FINN_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
    /// Input width (required without a config file).
    #[arg(long)]
    width: Option<usize>,
    /// Decision threshold.
    #[arg(long)]
    threshold: Option<f32>,
    /// Wire byte order (required without a config file).
    #[arg(long, value_enum)]
    byte_order: Option<WireOrder>,
    /// Datagram framing.
    #[arg(long, value_enum)]
    framing: Option<WireFraming>,
    /// File receiving the local label.
    #[arg(long, conflicts_with = "no_pred_file")]
    pred_file: Option<PathBuf>,
    /// Do not write a prediction file.
    #[arg(long)]
    no_pred_file: bool,
}

#[derive(Args)]
struct EngineArgs {
    /// Logistic model file.
    #[arg(long, conflicts_with_all = ["constant", "model_seed"])]
    model: Option<PathBuf>,
    /// Constant confidence stub.
    #[arg(long, conflicts_with = "model_seed")]
    constant: Option<f32>,
    /// Seed for a generated logistic model.
    #[arg(long)]
    model_seed: Option<u64>,
}

#[derive(Args)]
struct SourceArgs {
    /// Feature file (one vector per line).
    #[arg(long, conflicts_with = "seed")]
    input: Option<PathBuf>,
    /// Seed for random inputs; time-derived when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum WireOrder {
    Little,
    Big,
    Native,
}

impl From<WireOrder> for ByteOrder {
    fn from(o: WireOrder) -> Self {
        match o {
            WireOrder::Little => Self::Little,
            WireOrder::Big => Self::Big,
            WireOrder::Native => Self::Native,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum WireFraming {
    Raw,
    Correlated,
}

impl From<WireFraming> for Framing {
    fn from(f: WireFraming) -> Self {
        match f {
            WireFraming::Raw => Self::Raw,
            WireFraming::Correlated => Self::Correlated,
        }
    }
}

const EXIT_MATCH: u8 = 0;
const EXIT_MISMATCH: u8 = 1;
const EXIT_NO_RESPONSE: u8 = 2;
const EXIT_ROUND_FAILED: u8 = 3;
const EXIT_STARTUP: u8 = 4;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    ExitCode::from(run(Cli::parse()))
}

/// Run a command; errors that stop it from starting map to `EXIT_STARTUP`
fn run(cli: Cli) -> u8 {
    match dispatch(cli) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_STARTUP
        }
    }
}

fn dispatch(cli: Cli) -> Result<u8> {
    match cli.command {
        Cmd::Verify {
            common,
            engine,
            source,
        } => cmd_verify(&common, &engine, &source),
        Cmd::Rounds {
            common,
            engine,
            source,
            count,
            interval_ms,
        } => cmd_rounds(&common, &engine, &source, count, interval_ms),
        Cmd::Serve {
            common,
            engine,
            listen,
            max_requests,
        } => cmd_serve(&common, &engine, listen, max_requests),
        Cmd::InitModel {
            width,
            seed,
            bias,
            out,
        } => cmd_init_model(width, seed, bias, &out),
        Cmd::ShowConfig { common } => cmd_show_config(&common),
    }
}

impl CommonArgs {
    /// Config file (if any) with flag and environment overrides applied
    fn resolve(&self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => {
                let Some(width) = self.width else {
                    bail!("input width is undeclared: pass --width or --config");
                };
                let Some(order) = self.byte_order else {
                    bail!("wire byte order is undeclared: pass --byte-order or --config");
                };
                HarnessConfig::new(ModelContract::new(width, order.into()))
            }
        };

        if self.config.is_some() {
            if let Some(width) = self.width {
                config.contract.input_width = width;
            }
            if let Some(order) = self.byte_order {
                config.contract.byte_order = order.into();
            }
        }
        if let Some(t) = self.threshold {
            config.contract = config.contract.with_threshold(t);
        }
        if let Some(f) = self.framing {
            config.contract = config.contract.with_framing(f.into());
        }
        if let Some(host) = &self.host {
            config.transport.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.transport.port = port;
        }
        if let Some(ms) = self.timeout_ms {
            config.transport.timeout_ms = ms;
        }
        if self.no_pred_file {
            config.output.prediction_file = None;
        } else if let Some(p) = &self.pred_file {
            config.output.prediction_file = Some(p.clone());
        }

        config.contract.validate()?;
        Ok(config)
    }
}

impl EngineArgs {
    fn selection(&self) -> EngineSelection {
        if let Some(path) = &self.model {
            EngineSelection::LogisticFile(path.clone())
        } else if let Some(c) = self.constant {
            EngineSelection::Constant(c)
        } else {
            EngineSelection::LogisticSeeded(self.model_seed.unwrap_or(0))
        }
    }
}

impl SourceArgs {
    fn open(&self, width: usize) -> Result<Box<dyn SampleSource>> {
        if let Some(path) = &self.input {
            return Ok(Box::new(FileSource::open(path, width)?));
        }
        let seed = self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs())
        });
        info!("Random inputs, seed {seed}");
        Ok(Box::new(RandomSource::new(width, seed)))
    }
}

fn build_harness(config: &HarnessConfig, engine: &EngineArgs) -> Result<Harness> {
    let engine = select_engine(&engine.selection(), config.contract.input_width)?;
    let transport = UdpTransport::new(config.transport.resolve()?)?;
    info!(
        "Peer {} (timeout {:?}, {:?} order, {:?} framing)",
        transport.config().peer,
        transport.config().timeout,
        config.contract.byte_order,
        config.contract.framing
    );
    Ok(Harness::new(config.contract.clone(), engine, transport)?)
}

fn cmd_verify(common: &CommonArgs, engine: &EngineArgs, source: &SourceArgs) -> Result<u8> {
    let config = common.resolve()?;
    let mut harness = build_harness(&config, engine)?;
    let mut source = source.open(config.contract.input_width)?;
    let mut sink = ReportSink::stdout(config.output.prediction_file.clone());

    let mut summary = RoundSummary::default();
    summary.record(&harness.verify(source.as_mut(), &mut sink));
    Ok(exit_status(&summary))
}

fn cmd_rounds(
    common: &CommonArgs,
    engine: &EngineArgs,
    source: &SourceArgs,
    count: u64,
    interval_ms: u64,
) -> Result<u8> {
    if count == 0 {
        bail!("--count must be at least 1");
    }
    let config = common.resolve()?;
    let mut harness = build_harness(&config, engine)?;
    let mut source = source.open(config.contract.input_width)?;
    let mut sink = ReportSink::stdout(config.output.prediction_file.clone()).tag_rounds(true);
    let interval = Duration::from_millis(interval_ms);

    let mut summary = RoundSummary::default();
    for i in 0..count {
        if i > 0 && !interval.is_zero() {
            std::thread::sleep(interval);
        }
        summary.record(&harness.verify(source.as_mut(), &mut sink));
    }
    println!("{summary}");
    Ok(exit_status(&summary))
}

fn cmd_serve(
    common: &CommonArgs,
    engine: &EngineArgs,
    listen: SocketAddr,
    max_requests: Option<u64>,
) -> Result<u8> {
    let config = common.resolve()?;
    let engine = select_engine(&engine.selection(), config.contract.input_width)?;
    let mut peer = SoftwarePeer::bind(listen, config.contract, engine)?;
    println!("listening on {}", peer.local_addr()?);
    let answered = peer.serve(max_requests)?;
    println!("answered {answered} requests");
    Ok(EXIT_MATCH)
}

fn cmd_init_model(width: usize, seed: u64, bias: Option<f32>, out: &Path) -> Result<u8> {
    if width == 0 {
        bail!("--width must be at least 1");
    }
    let mut model = LogisticEngine::seeded(width, seed);
    if let Some(b) = bias {
        model = LogisticEngine::new(model.weights().to_vec(), b);
    }
    std::fs::write(out, model.to_bytes()).with_context(|| format!("writing {}", out.display()))?;
    println!(
        "wrote {} ({} inputs, bias {:.4})",
        out.display(),
        width,
        model.bias()
    );
    Ok(EXIT_MATCH)
}

fn cmd_show_config(common: &CommonArgs) -> Result<u8> {
    let config = common.resolve()?;
    config.transport.resolve()?;
    print!("{}", config.to_yaml()?);
    Ok(EXIT_MATCH)
}

/// Worst outcome wins: failure, then mismatch, then no response
fn exit_status(summary: &RoundSummary) -> u8 {
    if summary.failures > 0 {
        EXIT_ROUND_FAILED
    } else if summary.mismatches > 0 {
        EXIT_MISMATCH
    } else if summary.no_response > 0 {
        EXIT_NO_RESPONSE
    } else {
        EXIT_MATCH
    }
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
    fn undeclared_byte_order_is_rejected() {
        let cli = Cli::try_parse_from(["finn", "show-config", "--width", "10"]).unwrap();
        let Cmd::ShowConfig { common } = cli.command else {
            panic!("wrong subcommand");
        };
        let err = common.resolve().unwrap_err();
        assert!(err.to_string().contains("byte order"));
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finn.yaml");
        std::fs::write(&path, "contract:\n  input_width: 10\n  byte_order: big\n").unwrap();
        let cli = Cli::try_parse_from([
            "finn",
            "show-config",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "4000",
            "--framing",
            "correlated",
            "--no-pred-file",
        ])
        .unwrap();
        let Cmd::ShowConfig { common } = cli.command else {
            panic!("wrong subcommand");
        };
        let config = common.resolve().unwrap();
        assert_eq!(config.contract.byte_order, ByteOrder::Big);
        assert_eq!(config.contract.framing, Framing::Correlated);
        assert_eq!(config.transport.port, 4000);
        assert_eq!(config.output.prediction_file, None);
    }

    #[test]
    fn exit_code_prefers_worst_outcome() {
        let s = RoundSummary {
            matches: 3,
            mismatches: 1,
            no_response: 1,
            failures: 0,
        };
        assert_eq!(exit_status(&s), EXIT_MISMATCH);
        assert_eq!(exit_status(&RoundSummary { failures: 1, ..s }), EXIT_ROUND_FAILED);
        assert_eq!(
            exit_status(&RoundSummary { matches: 1, ..Default::default() }),
            EXIT_MATCH
        );
        assert_eq!(
            exit_status(&RoundSummary { no_response: 2, ..Default::default() }),
            EXIT_NO_RESPONSE
        );
    }

    fn run_args(args: &[&str]) -> u8 {
        run(Cli::try_parse_from(args).unwrap())
    }

    #[test]
    fn startup_failures_have_their_own_status() {
        assert_ne!(EXIT_STARTUP, EXIT_MISMATCH);
        assert_eq!(run_args(&["finn", "verify", "--width", "10"]), EXIT_STARTUP);
        assert_eq!(
            run_args(&["finn", "verify", "--byte-order", "little"]),
            EXIT_STARTUP
        );
        assert_eq!(
            run_args(&[
                "finn",
                "verify",
                "--width",
                "10",
                "--byte-order",
                "little",
                "--model",
                "/nonexistent/model.bin",
            ]),
            EXIT_STARTUP
        );
        assert_eq!(
            run_args(&["finn", "init-model", "--width", "0", "--out", "/nonexistent/m.bin"]),
            EXIT_STARTUP
        );
    }

    #[test]
    fn show_config_rejects_unresolvable_transport() {
        let args = [
            "finn",
            "show-config",
            "--width",
            "10",
            "--byte-order",
            "little",
            "--host",
            "127.0.0.1",
            "--timeout-ms",
            "0",
        ];
        assert_eq!(run_args(&args), EXIT_STARTUP);

        let cli = Cli::try_parse_from(args).unwrap();
        let Cmd::ShowConfig { common } = cli.command else {
            panic!("wrong subcommand");
        };
        assert!(common.resolve().is_ok());
        let err = cmd_show_config(&common).unwrap_err();
        assert!(err.to_string().contains("timeout"), "{err:#}");
    }

    #[test]
    fn show_config_succeeds_for_valid_flags() {
        let status = run_args(&[
            "finn",
            "show-config",
            "--width",
            "10",
            "--byte-order",
            "big",
            "--host",
            "127.0.0.1",
            "--port",
            "4000",
            "--timeout-ms",
            "250",
        ]);
        assert_eq!(status, EXIT_MATCH);
    }
}
