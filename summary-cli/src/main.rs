use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use summary_core::{
    Language, Phase, SummaryClient, SummaryRequest,
    config::{Config, EndpointCfg, HttpCfg},
    telemetry::{SessionTrace, TelemetrySink},
    transport::HttpSummaryTransport,
};

#[derive(Parser)]
#[command(author, version, about = "AI summary streaming smoke tool", long_about = None)]
struct Cli {
    /// Config file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the endpoint base URL from the config file
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a summary (prints content live)
    Stream {
        #[arg(long, help = "Subject (country/region) id")]
        subject: String,
        #[arg(long, help = "Year the summary is about")]
        period: i32,
        #[arg(long, default_value = "zh")]
        language: Language,
        /// Also print the reasoning channel (to stderr)
        #[arg(long)]
        show_reasoning: bool,
        /// Print session telemetry attributes when done
        #[arg(long)]
        trace: bool,
    },
}

struct StderrSink;

impl TelemetrySink for StderrSink {
    fn record(&self, trace: SessionTrace) {
        for (k, v) in trace.attributes() {
            eprintln!("[{k}={v}]");
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config {
            endpoint: EndpointCfg {
                token_env: Some("SUMMARY_API_TOKEN".into()),
                ..EndpointCfg::new("http://localhost:3000")
            },
            http: HttpCfg::default(),
        },
    };
    if let Some(url) = &cli.base_url {
        cfg.endpoint.base_url = url.clone();
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    let transport = Arc::new(HttpSummaryTransport::from_config(&cfg)?);

    match cli.command {
        Commands::Stream {
            subject,
            period,
            language,
            show_reasoning,
            trace,
        } => {
            let mut client = SummaryClient::new(transport);
            if trace {
                client = client.with_telemetry(Arc::new(StderrSink));
            }
            let mut watch = client.start(SummaryRequest::new(subject, period, language))?;

            // Print only what arrived since the last change.
            let (mut content_at, mut reasoning_at) = (0usize, 0usize);
            loop {
                let snap = watch.snapshot();
                if show_reasoning && snap.reasoning.len() > reasoning_at {
                    eprint!("{}", &snap.reasoning[reasoning_at..]);
                    reasoning_at = snap.reasoning.len();
                }
                if snap.content.len() > content_at {
                    print!("{}", &snap.content[content_at..]);
                    io::stdout().flush().ok();
                    content_at = snap.content.len();
                }
                if snap.phase.is_terminal() {
                    break;
                }
                tokio::select! {
                    alive = watch.changed() => {
                        if !alive {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => client.cancel(),
                }
            }

            client.join().await;
            let last = watch.snapshot();
            if content_at > 0 {
                println!();
            }
            if let Some(elapsed) = last.reasoning_duration() {
                eprintln!("[reasoned for {:.1}s]", elapsed.num_milliseconds() as f64 / 1000.0);
            }
            match last.phase {
                Phase::Completed => {}
                Phase::Cancelled => eprintln!("[cancelled]"),
                _ => {
                    anyhow::bail!(
                        "summary failed: {}",
                        last.error_message.unwrap_or_else(|| "unknown error".into())
                    );
                }
            }
        }
    }

    Ok(())
}
