use crate::extract::CompiledRule;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub selectors: SelectorSet,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.site.events_url.trim().is_empty() {
            bail!("site.events_url must not be empty");
        }
        if self.site.countries_url.trim().is_empty() {
            bail!("site.countries_url must not be empty");
        }

        if self.fetch.mode == FetchMode::Snapshot && self.fetch.snapshot_dir.is_none() {
            bail!("fetch.snapshot_dir is required for snapshot mode");
        }

        if self.output.path.as_os_str().is_empty() {
            bail!("output.path must not be empty");
        }
        self.output.delimiter_byte()?;

        for (name, rule) in self.selectors.named_rules() {
            CompiledRule::compile(rule).with_context(|| format!("invalid selector {name}"))?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_events_url")]
    pub events_url: String,
    #[serde(default = "default_countries_url")]
    pub countries_url: String,
    #[serde(default = "default_participants_suffix")]
    pub participants_suffix: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            events_url: default_events_url(),
            countries_url: default_countries_url(),
            participants_suffix: default_participants_suffix(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    #[default]
    Http,
    Snapshot,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub mode: FetchMode,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
    #[serde(default)]
    pub record_dir: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::Http,
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            delay_ms: default_delay_ms(),
            snapshot_dir: None,
            record_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueRule {
    Attr { name: String },
    Text,
    /// Trimmed text, split on line breaks, final segment.
    LastLine,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FieldRule {
    pub tag: String,
    #[serde(default)]
    pub match_attr: Option<String>,
    pub pattern: String,
    #[serde(default)]
    pub child: Option<String>,
    pub value: ValueRule,
    #[serde(default)]
    pub require_contains: Option<String>,
}

impl FieldRule {
    pub fn attr_match(tag: &str, attr: &str, pattern: &str, value: ValueRule) -> Self {
        Self {
            tag: tag.to_string(),
            match_attr: Some(attr.to_string()),
            pattern: pattern.to_string(),
            child: None,
            value,
            require_contains: None,
        }
    }

    pub fn text_match(tag: &str, pattern: &str, value: ValueRule) -> Self {
        Self {
            tag: tag.to_string(),
            match_attr: None,
            pattern: pattern.to_string(),
            child: None,
            value,
            require_contains: None,
        }
    }

    pub fn with_child(mut self, child: &str) -> Self {
        self.child = Some(child.to_string());
        self
    }

    pub fn with_required(mut self, keyword: &str) -> Self {
        self.require_contains = Some(keyword.to_string());
        self
    }
}

fn href() -> ValueRule {
    ValueRule::Attr {
        name: "href".to_string(),
    }
}

fn attr(name: &str) -> ValueRule {
    ValueRule::Attr {
        name: name.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorSet {
    #[serde(default = "default_event_links")]
    pub event_links: FieldRule,
    #[serde(default = "default_event_names")]
    pub event_names: FieldRule,
    #[serde(default = "default_event_logos")]
    pub event_logos: FieldRule,
    #[serde(default = "default_country_links")]
    pub country_links: FieldRule,
    #[serde(default = "default_country_names")]
    pub country_names: FieldRule,
    #[serde(default = "default_country_logos")]
    pub country_logos: FieldRule,
    #[serde(default = "default_participant_countries")]
    pub participant_countries: FieldRule,
    #[serde(default = "default_participant_artists")]
    pub participant_artists: FieldRule,
    #[serde(default = "default_participant_artist_links")]
    pub participant_artist_links: FieldRule,
    #[serde(default = "default_participant_songs")]
    pub participant_songs: FieldRule,
    #[serde(default = "default_song_links")]
    pub song_links: FieldRule,
}

impl SelectorSet {
    pub fn named_rules(&self) -> [(&'static str, &FieldRule); 11] {
        [
            ("event_links", &self.event_links),
            ("event_names", &self.event_names),
            ("event_logos", &self.event_logos),
            ("country_links", &self.country_links),
            ("country_names", &self.country_names),
            ("country_logos", &self.country_logos),
            ("participant_countries", &self.participant_countries),
            ("participant_artists", &self.participant_artists),
            ("participant_artist_links", &self.participant_artist_links),
            ("participant_songs", &self.participant_songs),
            ("song_links", &self.song_links),
        ]
    }
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            event_links: default_event_links(),
            event_names: default_event_names(),
            event_logos: default_event_logos(),
            country_links: default_country_links(),
            country_names: default_country_names(),
            country_logos: default_country_logos(),
            participant_countries: default_participant_countries(),
            participant_artists: default_participant_artists(),
            participant_artist_links: default_participant_artist_links(),
            participant_songs: default_participant_songs(),
            song_links: default_song_links(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Strict,
    Truncate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub alignment: Alignment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl OutputConfig {
    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => bail!(
                "output.delimiter must be a single ascii character, got {:?}",
                self.delimiter
            ),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            delimiter: default_delimiter(),
        }
    }
}

/// Parses a config file without validating it; `None` gives the built-in defaults.
pub fn read_config(path: Option<&Path>) -> Result<ScrapeConfig> {
    let Some(path) = path else {
        return Ok(ScrapeConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<ScrapeConfig>(&text)
        .with_context(|| format!("failed to parse toml in {}", path.display()))
}

pub fn load_config(path: Option<&Path>) -> Result<ScrapeConfig> {
    let config = read_config(path)?;
    config.validate().with_context(|| describe_origin(path))?;
    Ok(config)
}

pub fn describe_origin(path: Option<&Path>) -> String {
    match path {
        Some(path) => format!("invalid config {}", path.display()),
        None => "invalid built-in config".to_string(),
    }
}

fn default_events_url() -> String {
    "https://eurovision.tv/events".to_string()
}

fn default_countries_url() -> String {
    "https://eurovision.tv/countries".to_string()
}

fn default_participants_suffix() -> String {
    "/participants/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64)AppleWebKit/537.36 (KHTML, like Gecko) Chrome/70.0.3538.77 Safari/537.36".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_output_path() -> PathBuf {
    PathBuf::from("vision.csv")
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_event_links() -> FieldRule {
    FieldRule::attr_match("a", "href", "^https://eurovision.tv/event/", href())
}

fn default_event_names() -> FieldRule {
    FieldRule::attr_match("img", "class", "h-full m-auto", attr("alt"))
}

fn default_event_logos() -> FieldRule {
    FieldRule::attr_match("img", "class", "h-full m-auto", attr("src"))
}

fn default_country_links() -> FieldRule {
    FieldRule::attr_match("a", "href", "https://eurovision.tv/country/", href())
}

fn default_country_names() -> FieldRule {
    FieldRule::attr_match("h4", "class", "^font-bold", ValueRule::Text)
}

fn default_country_logos() -> FieldRule {
    FieldRule::attr_match(
        "img",
        "src",
        r"^https://static.eurovision.tv/hb-cgi/images/.*\.svg$",
        attr("src"),
    )
}

fn default_participant_countries() -> FieldRule {
    FieldRule::attr_match("a", "href", "^https://eurovision.tv/country/", ValueRule::Text)
}

fn default_participant_artists() -> FieldRule {
    FieldRule::attr_match("h4", "class", "^text-xl", ValueRule::Text)
}

fn default_participant_artist_links() -> FieldRule {
    FieldRule::attr_match("div", "class", "w-full md:w-1/3 lg:w-1/4 flex", href())
        .with_child("a")
        .with_required("participant")
}

fn default_participant_songs() -> FieldRule {
    FieldRule::attr_match(
        "div",
        "class",
        "w-full md:w-1/3 lg:w-1/4 flex",
        ValueRule::LastLine,
    )
}

fn default_song_links() -> FieldRule {
    FieldRule::attr_match("a", "href", "https://youtube.com/watch", href())
}
