//! Command-line session: feeds TS from UDP, a file or stdin into a
//! caption session and prints a JSON report line every refresh period.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::captions::Captions;
use crate::constants::TS_PACKET_SIZE;
use crate::network::create_udp_socket;
use crate::report::Reporter;
use crate::types::{Options, PipelineState};

/// Datagrams carry 7 packets; file reads use a larger batch
const UDP_BUF_SIZE: usize = 2048;
const READ_BUF_SIZE: usize = TS_PACKET_SIZE * 512;

enum Ingest {
    Udp(UdpSocket),
    Reader(Box<dyn AsyncRead + Unpin + Send>),
}

impl Ingest {
    async fn open(opts: &Options) -> anyhow::Result<Self> {
        match (&opts.input, opts.addr) {
            (Some(path), _) if path.as_os_str() == "-" => {
                info!("reading TS from stdin");
                Ok(Ingest::Reader(Box::new(tokio::io::stdin())))
            }
            (Some(path), _) => {
                info!(path = %path.display(), "reading TS from file");
                Ok(Ingest::Reader(Box::new(tokio::fs::File::open(path).await?)))
            }
            (None, Some(addr)) => Ok(Ingest::Udp(create_udp_socket(addr)?)),
            (None, None) => anyhow::bail!("either an address or an input is required"),
        }
    }

    /// Ok(0) means end of input
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Ingest::Udp(sock) => loop {
                // empty datagrams are not end of input
                let n = sock.recv(buf).await?;
                if n > 0 {
                    return Ok(n);
                }
            },
            Ingest::Reader(r) => r.read(buf).await,
        }
    }

    fn is_live(&self) -> bool {
        matches!(self, Ingest::Udp(_))
    }
}

fn feed(captions: &Captions, data: &[u8]) {
    for packet in data.chunks(TS_PACKET_SIZE) {
        captions.feed_packet(packet);
    }
}

fn report(captions: &Captions, clear_after: bool) {
    let rep = Reporter::create_report(captions);
    match Reporter::to_json_line(&rep) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("failed to serialise report: {e}"),
    }
    if clear_after {
        captions.clear_stocked_captions();
    }
}

/// Lets the pipeline catch up with a non-live input instead of evicting it
async fn wait_for_drain(captions: &Captions, threshold: usize, poll: Duration) {
    if captions.state() != PipelineState::Streaming {
        if let Err(e) = captions.process_pending() {
            warn!("failed to process buffered input: {e}");
        }
        return;
    }
    while captions.buffered_bytes() > threshold {
        tokio::time::sleep(poll).await;
    }
}

pub async fn run(opts: Options) -> anyhow::Result<()> {
    let mut captions = Captions::with_config("", opts.config.clone());
    if let Some(err) = captions.last_error() {
        anyhow::bail!("caption pipeline failed to start: {err}");
    }

    let mut ingest = Ingest::open(&opts).await?;
    let live = ingest.is_live();
    let poll = Duration::from_millis(opts.config.poll_interval_ms.max(1));
    let high_water = captions.buffer_capacity() / 2;

    let mut ticker = tokio::time::interval(Duration::from_secs(opts.refresh_secs.max(1)));
    ticker.tick().await;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut buf = vec![0u8; if live { UDP_BUF_SIZE } else { READ_BUF_SIZE }];
    loop {
        tokio::select! {
            n = ingest.read(&mut buf) => {
                let n = n?;
                if n == 0 {
                    debug!("end of input");
                    break;
                }
                feed(&captions, &buf[..n]);
                if !live {
                    wait_for_drain(&captions, high_water, poll).await;
                }
            }
            _ = ticker.tick() => report(&captions, opts.clear_after_report),
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
    }

    if let Err(e) = captions.flush() {
        warn!("final drain failed: {e}");
    }
    report(&captions, false);
    Ok(())
}
