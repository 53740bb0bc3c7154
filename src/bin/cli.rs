use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use arib_captions::captioner::{Options, run};
use arib_captions::CaptionsConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[clap(about = "Extracts ARIB closed captions from a live MPEG-TS feed")]
struct Opt {
    /// UDP socket to bind + listen (IPv4, unicast or multicast)
    #[clap(long, conflicts_with = "input")]
    addr: Option<String>,

    /// Read TS from a file instead; "-" reads stdin
    #[clap(long)]
    input: Option<PathBuf>,

    /// Seconds between JSON report lines
    #[clap(long, default_value_t = 2)]
    refresh: u64,

    /// Empty the stocked captions after every report
    #[clap(long, default_value_t = false)]
    clear_after_report: bool,

    /// JSON file with caption session settings
    #[clap(long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<CaptionsConfig> {
    match path {
        Some(p) => Ok(serde_json::from_str(&std::fs::read_to_string(p)?)?),
        None => Ok(CaptionsConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the JSON reports
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arib_captions=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let opt = Opt::parse();
    let addr = match (&opt.addr, &opt.input) {
        (Some(a), _) => Some(a.parse::<SocketAddr>()?),
        (None, None) => Some("239.1.1.2:1234".parse::<SocketAddr>()?),
        (None, Some(_)) => None,
    };

    run(Options {
        addr,
        input: opt.input.clone(),
        refresh_secs: opt.refresh,
        clear_after_report: opt.clear_after_report,
        config: load_config(opt.config.as_ref())?,
    })
    .await
}
