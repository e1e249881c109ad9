use crate::config::{FetchConfig, FetchMode};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Skip {
    #[error("malformed url {0:?}")]
    MalformedUrl(String),
    #[error("status {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("no snapshot for {url} at {}", .path.display())]
    NotFound { url: String, path: PathBuf },
}

pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String, Skip>;
}

pub fn build_fetcher(config: &FetchConfig) -> Result<Box<dyn PageFetcher>> {
    match config.mode {
        FetchMode::Http => Ok(Box::new(HttpFetcher::new(config)?)),
        FetchMode::Snapshot => {
            let dir = config
                .snapshot_dir
                .as_ref()
                .context("fetch.snapshot_dir missing for snapshot mode")?;
            Ok(Box::new(SnapshotFetcher::new(dir)))
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    record_dir: Option<PathBuf>,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()
            .context("failed to build reqwest client")?;

        if let Some(dir) = &config.record_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create record dir {}", dir.display()))?;
        }

        Ok(Self {
            client,
            record_dir: config.record_dir.clone(),
        })
    }

    fn record(&self, url: &str, body: &str) {
        let Some(dir) = &self.record_dir else {
            return;
        };
        let path = dir.join(snapshot_file_name(url));
        match std::fs::write(&path, body) {
            Ok(()) => debug!(%url, file = %path.display(), "recorded snapshot"),
            Err(err) => warn!(%url, file = %path.display(), error = %err, "failed to record snapshot"),
        }
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, Skip> {
        let parsed = parse_fetchable(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .map_err(|err| Skip::Transport {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Skip::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(|err| Skip::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        debug!(%url, bytes = body.len(), "fetched page");

        self.record(url, &body);
        Ok(body)
    }
}

pub struct SnapshotFetcher {
    dir: PathBuf,
}

impl SnapshotFetcher {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

impl PageFetcher for SnapshotFetcher {
    fn fetch(&self, url: &str) -> Result<String, Skip> {
        parse_fetchable(url)?;
        let path = self.dir.join(snapshot_file_name(url));
        std::fs::read_to_string(&path).map_err(|_| Skip::NotFound {
            url: url.to_string(),
            path,
        })
    }
}

pub fn snapshot_file_name(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{}.html", &hex::encode(digest)[..24])
}

fn parse_fetchable(url: &str) -> Result<Url, Skip> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
            Ok(parsed)
        }
        _ => Err(Skip::MalformedUrl(url.to_string())),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    delay: Duration,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn pause(&self) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}
