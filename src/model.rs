use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub name: String,
    pub detail_link: String,
    pub logo_link: String,
}

pub type EventRecord = ListingRecord;
pub type CountryRecord = ListingRecord;

#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    records: HashMap<String, ListingRecord>,
}

impl LookupTable {
    pub fn from_records(records: &[ListingRecord]) -> Self {
        let mut table = Self::default();
        for record in records {
            table.records.insert(record.name.clone(), record.clone());
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&ListingRecord> {
        self.records.get(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParticipationRow {
    #[serde(rename = "Event")]
    pub event: String,
    #[serde(rename = "Event Link")]
    pub event_link: Option<String>,
    #[serde(rename = "Event Logo")]
    pub event_logo: Option<String>,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Country Link")]
    pub country_link: Option<String>,
    #[serde(rename = "Country Logo")]
    pub country_logo: Option<String>,
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "Artist Link")]
    pub artist_link: Option<String>,
    #[serde(rename = "Song")]
    pub song: String,
    #[serde(rename = "Song Link")]
    pub song_link: Option<String>,
}

impl ParticipationRow {
    pub fn new(
        event: &str,
        country: String,
        artist: String,
        artist_link: Option<String>,
        song: String,
    ) -> Self {
        Self {
            event: event.to_string(),
            country,
            artist,
            artist_link,
            song,
            ..Self::default()
        }
    }
}

pub const OUTPUT_COLUMNS: [&str; 10] = [
    "Event",
    "Event Link",
    "Event Logo",
    "Country",
    "Country Link",
    "Country Logo",
    "Artist",
    "Artist Link",
    "Song",
    "Song Link",
];

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub events_listed: usize,
    pub events_completed: usize,
    pub events_skipped: usize,
    pub countries_listed: usize,
    pub rows: usize,
    pub event_backfilled: usize,
    pub country_backfilled: usize,
    pub songs_linked: usize,
    pub songs_skipped: usize,
    pub output_path: Option<PathBuf>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            events_listed: 0,
            events_completed: 0,
            events_skipped: 0,
            countries_listed: 0,
            rows: 0,
            event_backfilled: 0,
            country_backfilled: 0,
            songs_linked: 0,
            songs_skipped: 0,
            output_path: None,
        }
    }
}
