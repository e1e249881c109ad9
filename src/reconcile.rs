use crate::config::Alignment;
use crate::model::{ListingRecord, LookupTable, ParticipationRow};
use thiserror::Error;
use tracing::warn;

/// Position-aligned extractions over one page came back with different lengths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("misaligned fields on {page}: {}", describe_lengths(.lengths))]
pub struct MisalignedFields {
    pub page: String,
    pub lengths: Vec<(&'static str, usize)>,
}

fn describe_lengths(lengths: &[(&'static str, usize)]) -> String {
    lengths
        .iter()
        .map(|(field, len)| format!("{field}={len}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn aligned_len(
    page: &str,
    alignment: Alignment,
    lengths: &[(&'static str, usize)],
) -> Result<usize, MisalignedFields> {
    let shortest = lengths.iter().map(|(_, len)| *len).min().unwrap_or(0);
    let longest = lengths.iter().map(|(_, len)| *len).max().unwrap_or(0);
    if shortest == longest {
        return Ok(shortest);
    }

    let err = MisalignedFields {
        page: page.to_string(),
        lengths: lengths.to_vec(),
    };
    match alignment {
        Alignment::Strict => Err(err),
        Alignment::Truncate => {
            warn!(%page, lengths = %describe_lengths(&err.lengths), kept = shortest, "truncating misaligned fields");
            Ok(shortest)
        }
    }
}

pub fn build_listing(
    page: &str,
    alignment: Alignment,
    names: Vec<String>,
    links: Vec<String>,
    logos: Vec<String>,
) -> Result<Vec<ListingRecord>, MisalignedFields> {
    let count = aligned_len(
        page,
        alignment,
        &[
            ("name", names.len()),
            ("link", links.len()),
            ("logo", logos.len()),
        ],
    )?;

    Ok(names
        .into_iter()
        .zip(links)
        .zip(logos)
        .take(count)
        .map(|((name, detail_link), logo_link)| ListingRecord {
            name,
            detail_link,
            logo_link,
        })
        .collect())
}

pub fn build_rows(
    page: &str,
    alignment: Alignment,
    event: &str,
    countries: Vec<String>,
    artists: Vec<String>,
    artist_links: Vec<Option<String>>,
    songs: Vec<String>,
) -> Result<Vec<ParticipationRow>, MisalignedFields> {
    let count = aligned_len(
        page,
        alignment,
        &[
            ("country", countries.len()),
            ("artist", artists.len()),
            ("artist_link", artist_links.len()),
            ("song", songs.len()),
        ],
    )?;

    Ok(countries
        .into_iter()
        .zip(artists)
        .zip(artist_links)
        .zip(songs)
        .take(count)
        .map(|(((country, artist), artist_link), song)| {
            ParticipationRow::new(event, country, artist, artist_link, song)
        })
        .collect())
}

/// Fills event link/logo from the event table. Returns rows that changed.
pub fn backfill_events(rows: &mut [ParticipationRow], events: &LookupTable) -> usize {
    let mut changed = 0;
    for row in rows.iter_mut() {
        let Some(record) = events.get(&row.event) else {
            continue;
        };
        let link = fill_if_absent(&mut row.event_link, &record.detail_link);
        let logo = fill_if_absent(&mut row.event_logo, &record.logo_link);
        if link || logo {
            changed += 1;
        }
    }
    changed
}

/// Fills country link/logo from the country table. Returns rows that changed.
pub fn backfill_countries(rows: &mut [ParticipationRow], countries: &LookupTable) -> usize {
    let mut changed = 0;
    for row in rows.iter_mut() {
        let Some(record) = countries.get(&row.country) else {
            continue;
        };
        let link = fill_if_absent(&mut row.country_link, &record.detail_link);
        let logo = fill_if_absent(&mut row.country_logo, &record.logo_link);
        if link || logo {
            changed += 1;
        }
    }
    changed
}

fn fill_if_absent(slot: &mut Option<String>, value: &str) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value.to_string());
    true
}
