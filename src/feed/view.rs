//! Filtered, sorted and paginated projection of the authoritative collection.
//!
//! [`project`] is a pure function of the records and a [`ViewConfig`]; it is
//! recomputed from scratch on every change.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};
use crate::feed::classify::ExperienceLevel;
use crate::feed::record::{JobRecord, JobStatus};

pub const PAGE_SIZE_OPTIONS: [usize; 4] = [10, 20, 50, 100];
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExperienceFilter {
    /// No classification filter; `UNKNOWN` records are kept.
    #[default]
    All,
    Fresher,
    Experienced,
}

impl ExperienceFilter {
    fn admits(&self, level: ExperienceLevel) -> bool {
        match self {
            ExperienceFilter::All => true,
            ExperienceFilter::Fresher => level == ExperienceLevel::Fresher,
            ExperienceFilter::Experienced => level == ExperienceLevel::Experienced,
        }
    }
}

impl std::str::FromStr for ExperienceFilter {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(ExperienceFilter::All),
            "FRESHER" => Ok(ExperienceFilter::Fresher),
            "EXPERIENCED" => Ok(ExperienceFilter::Experienced),
            _ => Err(FeedError::InvalidValue {
                field: "experience",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "date-desc")]
    DateDesc,
    #[serde(rename = "date-asc")]
    DateAsc,
    #[serde(rename = "company")]
    Company,
}

impl std::str::FromStr for SortOrder {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "date-desc" => Ok(SortOrder::DateDesc),
            "date-asc" => Ok(SortOrder::DateAsc),
            "company" => Ok(SortOrder::Company),
            _ => Err(FeedError::InvalidValue {
                field: "sort",
                value: s.to_string(),
            }),
        }
    }
}

/// Everything that parameterizes a projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub tab: JobStatus,
    pub experience: ExperienceFilter,
    pub search: String,
    /// Empty means no source filter.
    pub sources: BTreeSet<String>,
    pub sort: SortOrder,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            tab: JobStatus::New,
            experience: ExperienceFilter::All,
            search: String::new(),
            sources: BTreeSet::new(),
            sort: SortOrder::DateDesc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ViewConfig {
    pub fn with_tab(mut self, tab: JobStatus) -> Self {
        self.tab = tab;
        self
    }

    pub fn with_experience(mut self, experience: ExperienceFilter) -> Self {
        self.experience = experience;
        self
    }

    pub fn with_search(mut self, search: &str) -> Self {
        self.search = search.to_string();
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.sources.insert(source.to_string());
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Filters leave the page alone; see [`View::past_end`].
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    /// Change the page size and go back to the first page.
    pub fn with_page_size(mut self, page_size: usize) -> Result<Self> {
        if !PAGE_SIZE_OPTIONS.contains(&page_size) {
            return Err(FeedError::InvalidPageSize(page_size));
        }
        self.page_size = page_size;
        self.page = 1;
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TabCounts {
    pub new: usize,
    pub applied: usize,
    pub draft: usize,
}

impl TabCounts {
    pub fn tally(records: &[JobRecord]) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.status {
                JobStatus::New => counts.new += 1,
                JobStatus::Applied => counts.applied += 1,
                JobStatus::Draft => counts.draft += 1,
            }
        }
        counts
    }

    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::New => self.new,
            JobStatus::Applied => self.applied,
            JobStatus::Draft => self.draft,
        }
    }
}

/// One page of the projection plus the aggregates needed to render it.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub items: Vec<JobRecord>,
    pub total_matching: usize,
    pub total_records: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    /// The requested page starts beyond `total_matching`; `items` is empty.
    pub past_end: bool,
    pub tab_counts: TabCounts,
}

fn matches(record: &JobRecord, config: &ViewConfig, needle: &str) -> bool {
    if record.status != config.tab {
        return false;
    }
    if !config.experience.admits(record.experience()) {
        return false;
    }
    if !needle.is_empty()
        && !record.title.to_lowercase().contains(needle)
        && !record.company.to_lowercase().contains(needle)
    {
        return false;
    }
    config.sources.is_empty() || config.sources.contains(&record.source)
}

/// Newest first, ties to the higher id.
///
/// Dated and undated records are sorted separately, then merged. An undated
/// record is placed ahead of the next dated record whenever its id is higher.
fn sort_date_desc(records: Vec<&JobRecord>) -> Vec<&JobRecord> {
    let (mut dated, mut undated): (Vec<_>, Vec<_>) = records
        .into_iter()
        .map(|r| (r.posted_at_millis(), r))
        .partition(|(millis, _)| millis.is_some());
    dated.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.id.cmp(&a.1.id)));
    undated.sort_by(|a, b| b.1.id.cmp(&a.1.id));

    let mut merged = Vec::with_capacity(dated.len() + undated.len());
    let mut dated = dated.into_iter().map(|(_, r)| r).peekable();
    let mut undated = undated.into_iter().map(|(_, r)| r).peekable();
    loop {
        let next = match (dated.peek(), undated.peek()) {
            (Some(d), Some(u)) if u.id > d.id => undated.next(),
            (Some(_), _) => dated.next(),
            (None, _) => undated.next(),
        };
        match next {
            Some(record) => merged.push(record),
            None => break,
        }
    }
    merged
}

fn cmp_company(a: &JobRecord, b: &JobRecord) -> Ordering {
    a.company
        .to_lowercase()
        .cmp(&b.company.to_lowercase())
        .then_with(|| a.company.cmp(&b.company))
}

fn sort_records(records: &mut Vec<&JobRecord>, order: SortOrder) {
    match order {
        SortOrder::DateDesc => {
            *records = sort_date_desc(std::mem::take(records));
        }
        SortOrder::DateAsc => {
            records.sort_by_cached_key(|r| r.posted_at_millis().unwrap_or(0));
        }
        SortOrder::Company => records.sort_by(|a, b| cmp_company(a, b)),
    }
}

/// Derive the page described by `config` from `records`.
pub fn project(records: &[JobRecord], config: &ViewConfig) -> View {
    let needle = config.search.to_lowercase();
    let mut matching: Vec<&JobRecord> = records
        .iter()
        .filter(|r| matches(r, config, &needle))
        .collect();
    sort_records(&mut matching, config.sort);

    let total_matching = matching.len();
    let page_size = config.page_size.max(1);
    let page = config.page.max(1);
    let start = (page - 1).saturating_mul(page_size);
    let past_end = start > 0 && start >= total_matching;

    let items = matching
        .into_iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect();

    View {
        items,
        total_matching,
        total_records: records.len(),
        page,
        page_size,
        page_count: total_matching.div_ceil(page_size),
        past_end,
        tab_counts: TabCounts::tally(records),
    }
}
