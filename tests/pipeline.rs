use anyhow::Result;
use evscrape::config::{Alignment, FetchMode, ScrapeConfig, load_config};
use evscrape::fetch::{PageFetcher, Skip, snapshot_file_name};
use evscrape::pipeline::{
    Pipeline, ScrapeOptions, resolve_config, run_scrape, run_with_fetcher,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const EVENTS_URL: &str = "https://example.test/events";
const COUNTRIES_URL: &str = "https://example.test/countries";
const EVENT_1_URL: &str = "https://example.test/event/1/participants/";
const EVENT_2_URL: &str = "https://example.test/event/2/participants/";
const ARTIST_URL: &str = "https://example.test/participant/9";

const HEADER: &str =
    "Event,Event Link,Event Logo,Country,Country Link,Country Logo,Artist,Artist Link,Song,Song Link";

/// Serves fixture pages from memory and remembers every URL it was asked for.
struct StaticFetcher {
    pages: HashMap<String, String>,
    requests: RefCell<Vec<String>>,
}

impl StaticFetcher {
    fn new(pages: &[(&str, &str)]) -> Result<Self> {
        let mut map = HashMap::new();
        for (url, fixture) in pages {
            map.insert(url.to_string(), read_fixture(fixture)?);
        }
        Ok(Self {
            pages: map,
            requests: RefCell::new(Vec::new()),
        })
    }

    fn requested(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|u| *u == url).count()
    }

    fn total_requests(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl PageFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<String, Skip> {
        self.requests.borrow_mut().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| Skip::HttpStatus {
            url: url.to_string(),
            status: 404,
        })
    }
}

fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> Result<String> {
    Ok(fs::read_to_string(fixture_root().join("pages").join(name))?)
}

fn site_config(output: &Path) -> Result<ScrapeConfig> {
    let path = fixture_root().join("site.toml");
    let mut config = load_config(Some(path.as_path()))?;
    config.output.path = output.to_path_buf();
    Ok(config)
}

fn write_snapshots(dir: &Path, pages: &[(&str, &str)]) -> Result<()> {
    fs::create_dir_all(dir)?;
    for (url, fixture) in pages {
        fs::write(dir.join(snapshot_file_name(url)), read_fixture(fixture)?)?;
    }
    Ok(())
}

fn edited_site_config(dir: &Path, edits: &[(&str, &str)]) -> Result<PathBuf> {
    let mut text = fs::read_to_string(fixture_root().join("site.toml"))?;
    for (from, to) in edits {
        text = text.replace(from, to);
    }
    let path = dir.join("site.toml");
    fs::write(&path, text)?;
    Ok(path)
}

fn output_lines(path: &Path) -> Result<Vec<String>> {
    Ok(fs::read_to_string(path)?
        .lines()
        .map(ToString::to_string)
        .collect())
}

#[test]
fn single_event_produces_one_fully_reconciled_row() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("vision.csv");
    let config = site_config(&output)?;
    let fetcher = StaticFetcher::new(&[
        (EVENTS_URL, "events.html"),
        (COUNTRIES_URL, "countries.html"),
        (EVENT_1_URL, "event-1-participants.html"),
        (ARTIST_URL, "participant-9.html"),
    ])?;

    let report = run_with_fetcher(&config, &fetcher)?;

    assert_eq!(report.events_listed, 2);
    assert_eq!(report.events_completed, 1);
    assert_eq!(report.events_skipped, 1);
    assert_eq!(report.countries_listed, 2);
    assert_eq!(report.rows, 1);
    assert_eq!(report.songs_linked, 1);
    assert_eq!(fetcher.requested(EVENT_2_URL), 1);

    assert_eq!(
        output_lines(&output)?,
        vec![
            HEADER.to_string(),
            "Test 2024,https://example.test/event/1,https://example.test/logos/test-2024.png,\
             Testland,https://example.test/country/5,https://example.test/flags/testland.svg,\
             Test Artist,https://example.test/participant/9,Test Song,\
             https://youtube.com/watch?v=test-song"
                .to_string(),
        ]
    );
    Ok(())
}

#[test]
fn placeholder_artist_link_is_never_fetched_and_unmatched_country_stays_empty() -> Result<()> {
    let dir = tempdir()?;
    let config = site_config(&dir.path().join("out.csv"))?;
    let fetcher = StaticFetcher::new(&[
        (EVENTS_URL, "events.html"),
        (COUNTRIES_URL, "countries.html"),
        (EVENT_1_URL, "event-1-mixed.html"),
        (ARTIST_URL, "participant-9.html"),
    ])?;

    let mut pipeline = Pipeline::new(&config, &fetcher)?;
    pipeline.load_listings()?;
    pipeline.collect_participants();
    pipeline.backfill();
    pipeline.sweep_song_links();

    let rows = &pipeline.rows;
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].country, "Testland");
    assert_eq!(rows[0].country_link.as_deref(), Some("https://example.test/country/5"));
    assert_eq!(
        rows[0].song_link.as_deref(),
        Some("https://youtube.com/watch?v=test-song")
    );

    assert_eq!(rows[1].country, "Atlantis");
    assert_eq!(rows[1].artist, "Sunken Choir");
    assert_eq!(rows[1].song, "Deep Water");
    assert_eq!(rows[1].artist_link, None);
    assert_eq!(rows[1].song_link, None);
    assert_eq!(rows[1].country_link, None);
    assert_eq!(rows[1].country_logo, None);
    assert_eq!(rows[1].event_link.as_deref(), Some("https://example.test/event/1"));

    assert_eq!(fetcher.requested(ARTIST_URL), 1);
    assert_eq!(fetcher.requested("https://example.test/news/sunken-choir"), 0);
    assert_eq!(pipeline.report.songs_skipped, 1);
    Ok(())
}

#[test]
fn rerunning_song_sweep_and_backfill_changes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let config = site_config(&dir.path().join("out.csv"))?;
    let fetcher = StaticFetcher::new(&[
        (EVENTS_URL, "events.html"),
        (COUNTRIES_URL, "countries.html"),
        (EVENT_1_URL, "event-1-participants.html"),
        (ARTIST_URL, "participant-9.html"),
    ])?;

    let mut pipeline = Pipeline::new(&config, &fetcher)?;
    pipeline.load_listings()?;
    pipeline.collect_participants();
    pipeline.backfill();
    pipeline.sweep_song_links();
    let first = pipeline.rows.clone();
    let requests = fetcher.total_requests();

    pipeline.backfill();
    pipeline.sweep_song_links();

    assert_eq!(pipeline.rows, first);
    assert_eq!(fetcher.total_requests(), requests);
    assert_eq!(fetcher.requested(ARTIST_URL), 1);
    Ok(())
}

#[test]
fn misaligned_participant_page_is_skipped_when_strict() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("out.csv");
    let config = site_config(&output)?;
    assert_eq!(config.reconcile.alignment, Alignment::Strict);
    let fetcher = StaticFetcher::new(&[
        (EVENTS_URL, "events.html"),
        (COUNTRIES_URL, "countries.html"),
        (EVENT_1_URL, "event-1-misaligned.html"),
        (ARTIST_URL, "participant-9.html"),
    ])?;

    let report = run_with_fetcher(&config, &fetcher)?;

    assert_eq!(report.rows, 0);
    assert_eq!(report.events_skipped, 2);
    assert_eq!(fetcher.requested(ARTIST_URL), 0);
    assert_eq!(output_lines(&output)?, vec![HEADER.to_string()]);
    Ok(())
}

#[test]
fn misaligned_participant_page_truncates_when_configured() -> Result<()> {
    let dir = tempdir()?;
    let mut config = site_config(&dir.path().join("out.csv"))?;
    config.reconcile.alignment = Alignment::Truncate;
    let fetcher = StaticFetcher::new(&[
        (EVENTS_URL, "events.html"),
        (COUNTRIES_URL, "countries.html"),
        (EVENT_1_URL, "event-1-misaligned.html"),
        (ARTIST_URL, "participant-9.html"),
    ])?;

    let report = run_with_fetcher(&config, &fetcher)?;

    assert_eq!(report.rows, 1);
    assert_eq!(report.events_completed, 1);
    Ok(())
}

#[test]
fn missing_events_index_is_fatal_but_missing_countries_index_is_not() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("out.csv");
    let config = site_config(&output)?;

    let no_events = StaticFetcher::new(&[(COUNTRIES_URL, "countries.html")])?;
    let err = run_with_fetcher(&config, &no_events).expect_err("events index is required");
    assert!(format!("{err:#}").contains("events index"));
    assert!(!output.exists());

    let no_countries = StaticFetcher::new(&[
        (EVENTS_URL, "events.html"),
        (EVENT_1_URL, "event-1-participants.html"),
        (ARTIST_URL, "participant-9.html"),
    ])?;
    let report = run_with_fetcher(&config, &no_countries)?;
    assert_eq!(report.countries_listed, 0);
    assert_eq!(report.rows, 1);

    let lines = output_lines(&output)?;
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with(
        "Test 2024,https://example.test/event/1,https://example.test/logos/test-2024.png,Testland,,,"
    ));
    Ok(())
}

#[test]
fn snapshot_replay_runs_offline_from_recorded_pages() -> Result<()> {
    let dir = tempdir()?;
    let snapshots = dir.path().join("snapshots");
    write_snapshots(
        &snapshots,
        &[
            (EVENTS_URL, "events.html"),
            (COUNTRIES_URL, "countries.html"),
            (EVENT_1_URL, "event-1-participants.html"),
            (ARTIST_URL, "participant-9.html"),
        ],
    )?;

    let output = dir.path().join("out/replay.csv");
    let report = run_scrape(&ScrapeOptions {
        config_path: Some(fixture_root().join("site.toml")),
        output: Some(output.clone()),
        snapshot_dir: Some(snapshots),
        record_dir: None,
        delay_ms: None,
    })?;

    assert_eq!(report.rows, 1);
    assert_eq!(report.events_skipped, 1);
    assert_eq!(report.output_path.as_deref(), Some(output.as_path()));
    assert!(report.finished_at.is_some());

    let lines = output_lines(&output)?;
    assert_eq!(lines[0], HEADER);
    assert!(lines[1].ends_with("Test Song,https://youtube.com/watch?v=test-song"));
    Ok(())
}

#[test]
fn snapshot_mode_in_file_is_completed_by_snapshot_dir_flag() -> Result<()> {
    let dir = tempdir()?;
    let config_path = edited_site_config(
        dir.path(),
        &[("[fetch]\n", "[fetch]\nmode = \"snapshot\"\n")],
    )?;
    let snapshots = dir.path().join("snapshots");

    let without_dir = resolve_config(&ScrapeOptions {
        config_path: Some(config_path.clone()),
        ..ScrapeOptions::default()
    })
    .expect_err("snapshot mode needs a directory");
    assert!(format!("{without_dir:#}").contains("snapshot_dir"));
    assert!(load_config(Some(config_path.as_path())).is_err());

    let config = resolve_config(&ScrapeOptions {
        config_path: Some(config_path),
        snapshot_dir: Some(snapshots.clone()),
        ..ScrapeOptions::default()
    })?;
    assert_eq!(config.fetch.mode, FetchMode::Snapshot);
    assert_eq!(config.fetch.snapshot_dir.as_deref(), Some(snapshots.as_path()));
    Ok(())
}

#[test]
fn relative_event_link_is_skipped_during_snapshot_replay() -> Result<()> {
    let dir = tempdir()?;
    let config_path = edited_site_config(
        dir.path(),
        &[("\"^https://example.test/event/\"", "\"/event/\"")],
    )?;
    let snapshots = dir.path().join("snapshots");
    write_snapshots(
        &snapshots,
        &[
            (EVENTS_URL, "events-relative.html"),
            (COUNTRIES_URL, "countries.html"),
            (EVENT_1_URL, "event-1-participants.html"),
            (ARTIST_URL, "participant-9.html"),
        ],
    )?;

    let output = dir.path().join("relative.csv");
    let report = run_scrape(&ScrapeOptions {
        config_path: Some(config_path),
        output: Some(output.clone()),
        snapshot_dir: Some(snapshots),
        ..ScrapeOptions::default()
    })?;

    assert_eq!(report.events_listed, 2);
    assert_eq!(report.events_completed, 1);
    assert_eq!(report.events_skipped, 1);
    assert_eq!(report.rows, 1);

    let lines = output_lines(&output)?;
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("Test 2024,https://example.test/event/1,"));
    assert!(lines.iter().all(|line| !line.contains("Relative 2022")));
    Ok(())
}
