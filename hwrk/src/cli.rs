use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub(crate) fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "us" | "µs" | "usec" | "usecs" | "microsecond" | "microseconds" => {
            Ok(Duration::from_micros(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60 * 60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Progress bar while running, then a text summary.
    HumanReadable,
    /// A single JSON summary line on stdout.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectMode {
    /// Count every redirect as an error.
    Refuse,
    /// Follow redirects up to --max-redirects hops.
    Follow,
    /// Don't follow; 301/307 count as successes, other 3xx as errors.
    Accept,
}

/// Every option is optional here so a `--config` file can fill the gaps;
/// defaults are applied when settings are resolved.
#[derive(Debug, Parser)]
#[command(
    name = "hwrk",
    author,
    version,
    about = "Small, fast HTTP benchmarking tool",
    long_about = "hwrk keeps a fixed number of connections busy sending the same request for a fixed duration, then reports throughput, latency and an error breakdown.\n\nFlags override values from --config.",
    after_help = "Examples:\n  hwrk http://localhost:8080/\n  hwrk -c 50 -d 30s http://localhost:8080/api\n  hwrk -M POST --body-file a.json --body-file b.json -H 'Content-Type: application/json' http://localhost:8080/items\n  hwrk --config bench.yaml --output json"
)]
pub struct Cli {
    /// Target URL (http:// or https://)
    pub url: Option<String>,

    /// Number of concurrent connections [default: 10]
    #[arg(short = 'c', long)]
    pub connections: Option<u64>,

    /// Test duration (e.g. 10s, 250ms, 1m; bare numbers are seconds) [default: 10s]
    #[arg(short = 'd', long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Per-request timeout, 0 disables it [default: 1s]
    #[arg(short = 'T', long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// HTTP method [default: GET]
    #[arg(short = 'M', long)]
    pub method: Option<String>,

    /// Request header (repeatable, "Name: value")
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Override the Host header
    #[arg(long)]
    pub host: Option<String>,

    /// Request body
    #[arg(long, conflicts_with = "body_files")]
    pub body: Option<String>,

    /// Read the request body from a file; repeat to let each connection pick one at random
    #[arg(long = "body-file", value_name = "FILE")]
    pub body_files: Vec<PathBuf>,

    /// What to do with 3xx responses [default: refuse]
    #[arg(long, value_enum)]
    pub redirects: Option<RedirectMode>,

    /// Hop limit for --redirects follow [default: 10]
    #[arg(long)]
    pub max_redirects: Option<usize>,

    /// Don't send "Accept-Encoding: gzip"
    #[arg(long)]
    pub no_compression: bool,

    /// Open a new connection for every request
    #[arg(long = "no-keepalive")]
    pub no_keepalive: bool,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Client certificate (PEM)
    #[arg(long, requires = "key")]
    pub cert: Option<PathBuf>,

    /// Client private key (PEM)
    #[arg(long, requires = "cert")]
    pub key: Option<PathBuf>,

    /// CA certificate(s) to trust instead of the bundled roots (PEM)
    #[arg(long)]
    pub ca: Option<PathBuf>,

    /// Offer HTTP/2 via ALPN on TLS connections
    #[arg(long)]
    pub http2: bool,

    /// Send requests through an HTTP proxy (http://host:port)
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Latency histogram significant figures, 1-5 [default: 3]
    #[arg(long)]
    pub sigfig: Option<u8>,

    /// Output format [default: human-readable]
    #[arg(long, value_enum)]
    pub output: Option<OutputFormat>,

    /// YAML file with default settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
