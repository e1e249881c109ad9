use crate::config::{FetchMode, ScrapeConfig, describe_origin, load_config, read_config};
use crate::extract::{CompiledSelectors, extract, extract_first, extract_text, parse_document};
use crate::fetch::{PageFetcher, Skip, Throttle, build_fetcher};
use crate::model::{EventRecord, ListingRecord, LookupTable, ParticipationRow, RunReport};
use crate::output::write_table;
use crate::reconcile::{
    MisalignedFields, backfill_countries, backfill_events, build_listing, build_rows,
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub config_path: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub snapshot_dir: Option<PathBuf>,
    pub record_dir: Option<PathBuf>,
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub config_path: Option<PathBuf>,
}

/// Overrides are applied before validation so a flag can complete a file.
pub fn resolve_config(options: &ScrapeOptions) -> Result<ScrapeConfig> {
    let path = options.config_path.as_deref();
    let mut config = read_config(path)?;

    if let Some(output) = &options.output {
        config.output.path = output.clone();
    }
    if let Some(dir) = &options.snapshot_dir {
        config.fetch.mode = FetchMode::Snapshot;
        config.fetch.snapshot_dir = Some(dir.clone());
    }
    if let Some(dir) = &options.record_dir {
        config.fetch.record_dir = Some(dir.clone());
    }
    if let Some(delay_ms) = options.delay_ms {
        config.fetch.delay_ms = delay_ms;
    }

    config.validate().with_context(|| describe_origin(path))?;
    Ok(config)
}

pub fn run_scrape(options: &ScrapeOptions) -> Result<RunReport> {
    let config = resolve_config(options)?;
    let fetcher = build_fetcher(&config.fetch)?;
    run_with_fetcher(&config, fetcher.as_ref())
}

pub fn run_with_fetcher(config: &ScrapeConfig, fetcher: &dyn PageFetcher) -> Result<RunReport> {
    let mut pipeline = Pipeline::new(config, fetcher)?;
    pipeline.load_listings()?;
    pipeline.collect_participants();
    pipeline.backfill();
    pipeline.sweep_song_links();
    pipeline.write_output()?;
    Ok(pipeline.finish())
}

pub fn validate_config(options: &ValidateOptions) -> Result<Vec<String>> {
    let config = load_config(options.config_path.as_deref())?;
    let origin = options
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in defaults".to_string());

    let mut messages = vec![format!("OK: {origin}")];
    for (name, rule) in config.selectors.named_rules() {
        messages.push(format!("OK: selector {name} ({} /{}/)", rule.tag, rule.pattern));
    }
    Ok(messages)
}

#[derive(Debug, Error)]
enum PageFailure {
    #[error(transparent)]
    Skip(#[from] Skip),
    #[error(transparent)]
    Misaligned(#[from] MisalignedFields),
}

/// State carried through one run: lookup tables, accumulated rows and the shared fetcher.
pub struct Pipeline<'a> {
    config: &'a ScrapeConfig,
    selectors: CompiledSelectors,
    fetcher: &'a dyn PageFetcher,
    throttle: Throttle,
    pub events: Vec<EventRecord>,
    pub event_table: LookupTable,
    pub country_table: LookupTable,
    pub rows: Vec<ParticipationRow>,
    pub report: RunReport,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ScrapeConfig, fetcher: &'a dyn PageFetcher) -> Result<Self> {
        let selectors = CompiledSelectors::compile(&config.selectors)?;
        let throttle = match config.fetch.mode {
            FetchMode::Http => Throttle::from_millis(config.fetch.delay_ms),
            FetchMode::Snapshot => Throttle::from_millis(0),
        };

        Ok(Self {
            config,
            selectors,
            fetcher,
            throttle,
            events: Vec::new(),
            event_table: LookupTable::default(),
            country_table: LookupTable::default(),
            rows: Vec::new(),
            report: RunReport::start(),
        })
    }

    pub fn load_listings(&mut self) -> Result<()> {
        let config = self.config;
        let site = &config.site;

        let body = self
            .fetcher
            .fetch(&site.events_url)
            .with_context(|| format!("failed to fetch events index {}", site.events_url))?;
        self.events = self.listing_records(&site.events_url, &body, ListingSelectors::Events)?;
        self.event_table = LookupTable::from_records(&self.events);

        let countries = match self.fetcher.fetch(&site.countries_url) {
            Ok(body) => {
                self.listing_records(&site.countries_url, &body, ListingSelectors::Countries)?
            }
            Err(skip) => {
                warn!(
                    url = %site.countries_url,
                    reason = %skip,
                    "countries index unavailable; country fields stay empty"
                );
                Vec::new()
            }
        };
        self.country_table = LookupTable::from_records(&countries);

        self.report.events_listed = self.events.len();
        self.report.countries_listed = countries.len();
        info!(
            events = self.events.len(),
            countries = self.country_table.len(),
            "listings loaded"
        );
        Ok(())
    }

    fn listing_records(
        &self,
        url: &str,
        body: &str,
        which: ListingSelectors,
    ) -> Result<Vec<ListingRecord>> {
        let doc = parse_document(body);
        let (names, links, logos) = match which {
            ListingSelectors::Events => (
                &self.selectors.event_names,
                &self.selectors.event_links,
                &self.selectors.event_logos,
            ),
            ListingSelectors::Countries => (
                &self.selectors.country_names,
                &self.selectors.country_links,
                &self.selectors.country_logos,
            ),
        };

        let records = build_listing(
            url,
            self.config.reconcile.alignment,
            extract_text(&doc, names),
            extract_text(&doc, links),
            extract_text(&doc, logos),
        )?;
        Ok(records)
    }

    pub fn collect_participants(&mut self) {
        let total = self.events.len();
        for index in 0..total {
            let event = self.events[index].clone();
            self.throttle.pause();

            let url = format!("{}{}", event.detail_link, self.config.site.participants_suffix);
            match self.participant_rows(&event, &url) {
                Ok(rows) => {
                    let count = rows.len();
                    self.rows.extend(rows);
                    self.report.events_completed += 1;
                    info!(
                        "event {} of {total} completed: {} ({count} rows)",
                        index + 1,
                        event.name
                    );
                }
                Err(reason) => {
                    self.report.events_skipped += 1;
                    warn!("event {} of {total} skipped: {reason}", index + 1);
                }
            }
        }
        self.report.rows = self.rows.len();
    }

    fn participant_rows(
        &self,
        event: &EventRecord,
        url: &str,
    ) -> Result<Vec<ParticipationRow>, PageFailure> {
        let body = self.fetcher.fetch(url)?;
        let doc = parse_document(&body);
        let rows = build_rows(
            url,
            self.config.reconcile.alignment,
            &event.name,
            extract_text(&doc, &self.selectors.participant_countries),
            extract_text(&doc, &self.selectors.participant_artists),
            extract(&doc, &self.selectors.participant_artist_links),
            extract_text(&doc, &self.selectors.participant_songs),
        )?;
        Ok(rows)
    }

    pub fn backfill(&mut self) {
        let by_event = backfill_events(&mut self.rows, &self.event_table);
        let by_country = backfill_countries(&mut self.rows, &self.country_table);
        self.report.event_backfilled += by_event;
        self.report.country_backfilled += by_country;
        info!(rows = self.rows.len(), by_event, by_country, "back-fill complete");
    }

    /// Looks up a video link on each artist page. Rows without an artist
    /// link, or that already have a song link, are not fetched.
    pub fn sweep_song_links(&mut self) {
        let total = self.rows.len();
        for index in 0..total {
            let Some(artist_link) = self.rows[index].artist_link.clone() else {
                self.report.songs_skipped += 1;
                warn!("song {} of {total} skipped: no artist link", index + 1);
                continue;
            };
            if self.rows[index].song_link.is_some() {
                continue;
            }

            self.throttle.pause();
            match self.fetcher.fetch(&artist_link) {
                Ok(body) => {
                    let doc = parse_document(&body);
                    let row = &mut self.rows[index];
                    if let Some(link) = extract_first(&doc, &self.selectors.song_links) {
                        row.song_link = Some(link);
                        self.report.songs_linked += 1;
                    }
                    info!("song {} of {total} completed: {}", index + 1, row.song);
                }
                Err(skip) => {
                    self.report.songs_skipped += 1;
                    warn!("song {} of {total} skipped: {skip}", index + 1);
                }
            }
        }
    }

    pub fn write_output(&mut self) -> Result<()> {
        let config = self.config;
        let output = &config.output;
        write_table(&output.path, output.delimiter_byte()?, &self.rows)?;
        self.report.output_path = Some(output.path.clone());
        info!(rows = self.rows.len(), file = %output.path.display(), "table written");
        Ok(())
    }

    pub fn finish(mut self) -> RunReport {
        self.report.rows = self.rows.len();
        self.report.finished_at = Some(Utc::now());
        self.report
    }
}

#[derive(Clone, Copy)]
enum ListingSelectors {
    Events,
    Countries,
}
