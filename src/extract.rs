use crate::config::{FieldRule, SelectorSet, ValueRule};
use anyhow::{Context, Result, anyhow};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

pub fn parse_document(text: &str) -> Html {
    Html::parse_document(text)
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    elements: Selector,
    match_attr: Option<String>,
    pattern: Regex,
    child: Option<Selector>,
    value: ValueRule,
    require_contains: Option<String>,
}

impl CompiledRule {
    pub fn compile(rule: &FieldRule) -> Result<Self> {
        let elements = Selector::parse(&rule.tag)
            .map_err(|err| anyhow!("invalid tag selector {}: {err:?}", rule.tag))?;
        let pattern = Regex::new(&rule.pattern)
            .with_context(|| format!("invalid match pattern {}", rule.pattern))?;
        let child = match &rule.child {
            Some(child) => Some(
                Selector::parse(child)
                    .map_err(|err| anyhow!("invalid child selector {child}: {err:?}"))?,
            ),
            None => None,
        };

        Ok(Self {
            elements,
            match_attr: rule.match_attr.clone(),
            pattern,
            child,
            value: rule.value.clone(),
            require_contains: rule.require_contains.clone(),
        })
    }

    fn matches(&self, element: ElementRef<'_>) -> bool {
        match &self.match_attr {
            Some(attr) => element.value().attr(attr).is_some_and(|value| {
                self.pattern.is_match(value)
                    || (attr == "class"
                        && value
                            .split_ascii_whitespace()
                            .any(|token| self.pattern.is_match(token)))
            }),
            None => self.pattern.is_match(&element_text(element)),
        }
    }

    /// `None` is the placeholder for an element that is not a genuine record.
    fn read(&self, element: ElementRef<'_>) -> Option<String> {
        let target = match &self.child {
            Some(child) => element.select(child).next()?,
            None => element,
        };

        let value = match &self.value {
            ValueRule::Attr { name } => target.value().attr(name)?.to_string(),
            ValueRule::Text => element_text(target).trim().to_string(),
            ValueRule::LastLine => last_line(&element_text(target)),
        };

        if let Some(keyword) = &self.require_contains
            && !value.contains(keyword.as_str())
        {
            return None;
        }

        Some(value)
    }
}

pub fn extract(document: &Html, rule: &CompiledRule) -> Vec<Option<String>> {
    document
        .select(&rule.elements)
        .filter(|element| rule.matches(*element))
        .map(|element| rule.read(element))
        .collect()
}

pub fn extract_first(document: &Html, rule: &CompiledRule) -> Option<String> {
    document
        .select(&rule.elements)
        .filter(|element| rule.matches(*element))
        .find_map(|element| rule.read(element))
}

pub fn extract_text(document: &Html, rule: &CompiledRule) -> Vec<String> {
    extract(document, rule)
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn last_line(text: &str) -> String {
    text.trim()
        .split('\n')
        .next_back()
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub event_links: CompiledRule,
    pub event_names: CompiledRule,
    pub event_logos: CompiledRule,
    pub country_links: CompiledRule,
    pub country_names: CompiledRule,
    pub country_logos: CompiledRule,
    pub participant_countries: CompiledRule,
    pub participant_artists: CompiledRule,
    pub participant_artist_links: CompiledRule,
    pub participant_songs: CompiledRule,
    pub song_links: CompiledRule,
}

impl CompiledSelectors {
    pub fn compile(set: &SelectorSet) -> Result<Self> {
        let compile = |name: &str, rule: &FieldRule| {
            CompiledRule::compile(rule).with_context(|| format!("invalid selector {name}"))
        };

        Ok(Self {
            event_links: compile("event_links", &set.event_links)?,
            event_names: compile("event_names", &set.event_names)?,
            event_logos: compile("event_logos", &set.event_logos)?,
            country_links: compile("country_links", &set.country_links)?,
            country_names: compile("country_names", &set.country_names)?,
            country_logos: compile("country_logos", &set.country_logos)?,
            participant_countries: compile("participant_countries", &set.participant_countries)?,
            participant_artists: compile("participant_artists", &set.participant_artists)?,
            participant_artist_links: compile(
                "participant_artist_links",
                &set.participant_artist_links,
            )?,
            participant_songs: compile("participant_songs", &set.participant_songs)?,
            song_links: compile("song_links", &set.song_links)?,
        })
    }
}
