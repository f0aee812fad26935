use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use bytes::Bytes;
use hwrk_core::{
    DEFAULT_SIGFIG, HistogramConfig, LoadPlan, RequestBody, RequestTemplate, escape_query_values,
};
use hwrk_http::{
    DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, HttpClientOptions, RedirectPolicy,
};
use serde::Deserialize;

use crate::cli::{Cli, OutputFormat, RedirectMode};

pub(crate) const DEFAULT_CONNECTIONS: u64 = 10;
pub(crate) const DEFAULT_DURATION: Duration = Duration::from_secs(10);

/// Settings file passed with `--config`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub url: Option<String>,
    pub connections: Option<u64>,
    #[serde(default)]
    pub duration: Option<YamlDuration>,
    #[serde(default)]
    pub timeout: Option<YamlDuration>,
    pub method: Option<String>,
    /// `Name: value` lines, same as `-H`.
    #[serde(default)]
    pub headers: Vec<String>,
    pub host: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub body_files: Vec<PathBuf>,
    pub redirects: Option<RedirectMode>,
    pub max_redirects: Option<usize>,
    pub compression: Option<bool>,
    pub keep_alive: Option<bool>,
    pub insecure: Option<bool>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub ca: Option<PathBuf>,
    pub http2: Option<bool>,
    pub proxy: Option<String>,
    pub sigfig: Option<u8>,
    pub output: Option<OutputFormat>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|secs| YamlDuration(Duration::from_secs(secs)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Duration::try_from_secs_f64(v)
                    .map(YamlDuration)
                    .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let v = v.trim();
                if v == "0" {
                    return Ok(YamlDuration(Duration::ZERO));
                }
                humantime::parse_duration(v)
                    .map(YamlDuration)
                    .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
            }
        }

        deserializer.deserialize_any(V)
    }
}

pub(crate) async fn load_file(path: &Path) -> anyhow::Result<FileConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_file(&raw).with_context(|| format!("invalid config file: {}", path.display()))
}

fn parse_file(raw: &str) -> anyhow::Result<FileConfig> {
    // An empty document deserializes as null.
    if raw.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

/// Fully resolved run settings: flag, then config file, then built-in default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub url: String,
    pub connections: u64,
    pub duration: Duration,
    pub timeout: Option<Duration>,
    pub method: http::Method,
    pub headers: Vec<(String, String)>,
    pub host: Option<String>,
    pub body: Option<String>,
    pub body_files: Vec<PathBuf>,
    pub redirects: RedirectPolicy,
    pub compression: bool,
    pub keep_alive: bool,
    pub insecure: bool,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub ca: Option<PathBuf>,
    pub http2: bool,
    pub proxy: Option<url::Url>,
    pub sigfig: u8,
    pub output: OutputFormat,
}

impl Settings {
    pub(crate) fn resolve(cli: &Cli, file: FileConfig) -> anyhow::Result<Self> {
        let raw_url = cli
            .url
            .clone()
            .or(file.url)
            .context("missing target URL (pass it as an argument or set `url` in --config)")?;
        let url = validate_url(&escape_query_values(&raw_url))?;

        let connections = cli
            .connections
            .or(file.connections)
            .unwrap_or(DEFAULT_CONNECTIONS);
        if connections == 0 {
            anyhow::bail!("`connections` must be a positive integer");
        }

        let duration = cli
            .duration
            .or(file.duration.map(YamlDuration::into_inner))
            .unwrap_or(DEFAULT_DURATION);
        if tokio::time::Instant::now().checked_add(duration).is_none() {
            anyhow::bail!("duration {duration:?} is too large");
        }

        let timeout = cli
            .timeout
            .or(file.timeout.map(YamlDuration::into_inner))
            .unwrap_or(DEFAULT_TIMEOUT);
        let timeout = (!timeout.is_zero()).then_some(timeout);

        let method = match cli.method.as_deref().or(file.method.as_deref()) {
            Some(m) => http::Method::from_bytes(m.trim().as_bytes())
                .with_context(|| format!("invalid HTTP method '{m}'"))?,
            None => http::Method::GET,
        };

        let header_lines = if cli.headers.is_empty() {
            &file.headers
        } else {
            &cli.headers
        };
        let headers = header_lines
            .iter()
            .map(|line| parse_header(line))
            .collect::<anyhow::Result<Vec<_>>>()?;

        // A body given on the command line replaces whatever the file configured.
        let cli_has_body = cli.body.is_some() || !cli.body_files.is_empty();
        let (body, body_files) = if cli_has_body {
            (cli.body.clone(), cli.body_files.clone())
        } else {
            (file.body, file.body_files)
        };
        if body.is_some() && !body_files.is_empty() {
            anyhow::bail!("`body` and `bodyFiles` are mutually exclusive");
        }

        let max_redirects = cli
            .max_redirects
            .or(file.max_redirects)
            .unwrap_or(DEFAULT_MAX_REDIRECTS);
        let redirects = match cli.redirects.or(file.redirects).unwrap_or(RedirectMode::Refuse) {
            RedirectMode::Refuse => RedirectPolicy::Refuse,
            RedirectMode::Follow => RedirectPolicy::Follow { max: max_redirects },
            RedirectMode::Accept => RedirectPolicy::Accept,
        };

        let cert = cli.cert.clone().or(file.cert);
        let key = cli.key.clone().or(file.key);
        if cert.is_some() != key.is_some() {
            anyhow::bail!("client certificate and key must be given together");
        }

        let proxy = match cli.proxy.as_deref().or(file.proxy.as_deref()) {
            Some(raw) => Some(validate_proxy(raw)?),
            None => None,
        };

        let sigfig = cli.sigfig.or(file.sigfig).unwrap_or(DEFAULT_SIGFIG);
        if !(1..=5).contains(&sigfig) {
            anyhow::bail!("`sigfig` must be between 1 and 5, got {sigfig}");
        }

        Ok(Self {
            url,
            connections,
            duration,
            timeout,
            method,
            headers,
            host: cli.host.clone().or(file.host),
            body,
            body_files,
            redirects,
            compression: !cli.no_compression && file.compression.unwrap_or(true),
            keep_alive: !cli.no_keepalive && file.keep_alive.unwrap_or(true),
            insecure: cli.insecure || file.insecure.unwrap_or(false),
            cert,
            key,
            ca: cli.ca.clone().or(file.ca),
            http2: cli.http2 || file.http2.unwrap_or(false),
            proxy,
            sigfig,
            output: cli
                .output
                .or(file.output)
                .unwrap_or(OutputFormat::HumanReadable),
        })
    }

    pub(crate) fn client_options(&self) -> HttpClientOptions {
        HttpClientOptions {
            timeout: self.timeout,
            redirects: self.redirects,
            keep_alive: self.keep_alive,
            compression: self.compression,
            insecure: self.insecure,
            client_cert: self.cert.clone(),
            client_key: self.key.clone(),
            ca_cert: self.ca.clone(),
            http2: self.http2,
            proxy: self.proxy.clone(),
            ..HttpClientOptions::default()
        }
    }

    /// Reads body files, so this is where an unreadable `--body-file` surfaces.
    pub(crate) async fn load_plan(&self) -> anyhow::Result<LoadPlan> {
        let body = if let Some(body) = &self.body {
            RequestBody::Static(Bytes::from(body.clone()))
        } else if self.body_files.is_empty() {
            RequestBody::Empty
        } else {
            let mut pool = Vec::with_capacity(self.body_files.len());
            for path in &self.body_files {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("failed to read body file: {}", path.display()))?;
                pool.push(Bytes::from(bytes));
            }
            match pool.len() {
                1 => RequestBody::Static(pool.remove(0)),
                _ => RequestBody::Pool(Arc::from(pool)),
            }
        };

        Ok(LoadPlan {
            workers: self.connections,
            duration: self.duration,
            request: RequestTemplate {
                method: self.method.clone(),
                url: self.url.clone(),
                headers: self.headers.clone(),
                host: self.host.clone(),
                body,
            },
            histogram: HistogramConfig::for_run(self.duration, self.sigfig),
        })
    }
}

fn validate_url(raw: &str) -> anyhow::Result<String> {
    let parsed = url::Url::parse(raw).with_context(|| format!("invalid URL '{raw}'"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.to_string()),
        other => anyhow::bail!("unsupported URL scheme '{other}' (expected http or https)"),
    }
}

/// Only plain `http://` proxies are supported; HTTPS targets are tunneled through them.
fn validate_proxy(raw: &str) -> anyhow::Result<url::Url> {
    let parsed = url::Url::parse(raw.trim()).with_context(|| format!("invalid proxy URL '{raw}'"))?;
    if parsed.scheme() != "http" {
        anyhow::bail!("unsupported proxy scheme '{}' (expected http)", parsed.scheme());
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        anyhow::bail!("invalid proxy URL '{raw}': missing host");
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        anyhow::bail!("invalid proxy URL '{raw}': credentials are not supported");
    }
    Ok(parsed)
}

pub(crate) fn parse_header(line: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = line
        .split_once(':')
        .with_context(|| format!("invalid header '{line}' (expected 'Name: value')"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("invalid header '{line}': empty name");
    }
    http::header::HeaderName::from_bytes(name.as_bytes())
        .with_context(|| format!("invalid header name '{name}'"))?;
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["hwrk"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        }
    }

    fn resolve(args: &[&str], file: FileConfig) -> Settings {
        match Settings::resolve(&cli(args), file) {
            Ok(v) => v,
            Err(err) => panic!("failed to resolve settings: {err:#}"),
        }
    }

    fn file(raw: &str) -> FileConfig {
        match parse_file(raw) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse config: {err:#}"),
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let s = resolve(&["http://localhost:8080/"], FileConfig::default());
        assert_eq!(s.connections, DEFAULT_CONNECTIONS);
        assert_eq!(s.duration, DEFAULT_DURATION);
        assert_eq!(s.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(s.method, http::Method::GET);
        assert_eq!(s.redirects, RedirectPolicy::Refuse);
        assert!(s.compression);
        assert!(s.keep_alive);
        assert!(!s.insecure);
        assert_eq!(s.sigfig, DEFAULT_SIGFIG);
        assert_eq!(s.output, OutputFormat::HumanReadable);
    }

    #[test]
    fn flags_override_the_file() {
        let f = file(concat!(
            "url: http://from-file/\nconnections: 3\nduration: 2s\ntimeout: 500ms\n",
            "method: PUT\nheaders:\n  - 'X-File: 1'\nkeepAlive: false\noutput: json\n",
        ));
        let s = resolve(&["-c", "7", "-H", "X-Cli: 2", "http://from-cli/"], f);

        assert_eq!(s.url, "http://from-cli/");
        assert_eq!(s.connections, 7);
        assert_eq!(s.duration, Duration::from_secs(2));
        assert_eq!(s.timeout, Some(Duration::from_millis(500)));
        assert_eq!(s.method, http::Method::PUT);
        assert_eq!(s.headers, vec![("X-Cli".to_string(), "2".to_string())]);
        assert!(!s.keep_alive);
        assert_eq!(s.output, OutputFormat::Json);
    }

    #[test]
    fn file_fills_in_missing_flags() {
        let f = file("url: http://from-file/\nredirects: follow\nmaxRedirects: 3\nduration: 5\n");
        let s = resolve(&[], f);
        assert_eq!(s.url, "http://from-file/");
        assert_eq!(s.redirects, RedirectPolicy::Follow { max: 3 });
        assert_eq!(s.duration, Duration::from_secs(5));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let s = resolve(&["-T", "0", "http://localhost/"], FileConfig::default());
        assert_eq!(s.timeout, None);
        assert_eq!(s.client_options().timeout, None);
    }

    #[test]
    fn proxy_comes_from_flag_or_file() {
        let s = resolve(&["http://localhost/"], file("proxy: http://127.0.0.1:3128\n"));
        assert_eq!(
            s.proxy.as_ref().map(url::Url::as_str),
            Some("http://127.0.0.1:3128/")
        );
        assert_eq!(s.client_options().proxy, s.proxy);

        let s = resolve(
            &["--proxy", "http://proxy.local:8080", "http://localhost/"],
            file("proxy: http://127.0.0.1:3128\n"),
        );
        assert_eq!(s.proxy.as_ref().and_then(url::Url::host_str), Some("proxy.local"));

        let s = resolve(&["http://localhost/"], FileConfig::default());
        assert_eq!(s.proxy, None);
    }

    #[test]
    fn query_values_are_escaped() {
        let s = resolve(&["http://localhost/qp?q=hello world"], FileConfig::default());
        assert_eq!(s.url, "http://localhost/qp?q=hello+world");
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let cases: &[&[&str]] = &[
            &[],
            &["-c", "0", "http://localhost/"],
            &["ftp://localhost/"],
            &["not a url"],
            &["-H", "no-colon", "http://localhost/"],
            &["-M", "BAD METHOD", "http://localhost/"],
            &["--sigfig", "6", "http://localhost/"],
            &["-d", "10000000000000000000", "http://localhost/"],
            &["--proxy", "not a url", "http://localhost/"],
            &["--proxy", "socks5://127.0.0.1:1080", "http://localhost/"],
            &["--proxy", "http://user:pw@127.0.0.1:3128", "http://localhost/"],
        ];
        for args in cases {
            assert!(
                Settings::resolve(&cli(args), FileConfig::default()).is_err(),
                "expected {args:?} to be rejected"
            );
        }
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(parse_file("connectoins: 3\n").is_err());
        assert!(parse_file("duration: -1\n").is_err());
        assert!(parse_file("duration: 1e300\n").is_err());
        assert!(parse_file("").is_ok());
    }

    #[test]
    fn header_parsing_trims_name_and_value() {
        match parse_header("  Content-Type :  application/json ") {
            Ok((name, value)) => {
                assert_eq!(name, "Content-Type");
                assert_eq!(value, "application/json");
            }
            Err(err) => panic!("unexpected error: {err:#}"),
        }
        assert!(parse_header(": x").is_err());
    }

    #[tokio::test]
    async fn body_files_become_a_pool() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        std::fs::write(&a, b"{\"a\":1}")?;
        std::fs::write(&b, b"{\"b\":2}")?;

        let a_arg = a.to_string_lossy().into_owned();
        let b_arg = b.to_string_lossy().into_owned();
        let s = resolve(
            &["--body-file", &a_arg, "--body-file", &b_arg, "http://localhost/"],
            FileConfig::default(),
        );
        let plan = s.load_plan().await?;
        match plan.request.body {
            RequestBody::Pool(pool) => anyhow::ensure!(pool.len() == 2),
            other => anyhow::bail!("expected a body pool, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn missing_body_file_fails_plan() {
        let s = resolve(
            &["--body-file", "/definitely/not/here.json", "http://localhost/"],
            FileConfig::default(),
        );
        assert!(s.load_plan().await.is_err());
    }

    #[tokio::test]
    async fn config_file_is_loaded_from_disk() -> anyhow::Result<()> {
        let mut f = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut f, b"url: http://localhost/\nconnections: 2\n")?;
        let loaded = load_file(f.path()).await?;
        anyhow::ensure!(loaded.connections == Some(2));
        anyhow::ensure!(load_file(Path::new("/definitely/not/here.yaml")).await.is_err());
        Ok(())
    }
}
