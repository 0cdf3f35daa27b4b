//! Canonical lifecycle records.
//!
//! Wire records carry loosely-typed fields: nullable flags, empty strings,
//! and "...From" dates that the service sometimes sends for milestones that
//! have not been reached yet. [`normalize`] folds those into records with
//! one meaning per field. It is pure; same input, same output.

use chrono::NaiveDate;

use crate::api::{RawCycle, RawDetails};

/// A support milestone (LTS, end of active support, end of life, end of
/// extended support) together with the date it took effect.
///
/// `date` is only ever `Some` when `reached` is true. A reached milestone
/// without a date stays dateless; no date is invented for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Milestone {
    pub reached: bool,
    pub date: Option<NaiveDate>,
}

impl Milestone {
    pub fn new(reached: bool, date: Option<NaiveDate>) -> Self {
        Self {
            reached,
            date: date.filter(|_| reached),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRelease {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub link: Option<String>,
}

/// One release cycle of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleRecord {
    pub name: String,
    pub codename: Option<String>,
    pub label: Option<String>,
    pub release_date: NaiveDate,
    pub lts: Milestone,
    pub eoas: Milestone,
    pub eol: Milestone,
    pub eoes: Milestone,
    pub maintained: bool,
    pub latest: Option<LatestRelease>,
}

/// Product-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailsRecord {
    pub name: String,
    pub label: Option<String>,
    pub category: Option<String>,
    pub version_command: Option<String>,
    pub docs_link: Option<String>,
    pub release_policy_link: Option<String>,
}

/// Fold a raw cycle and raw details into canonical records.
pub fn normalize(raw_cycle: &RawCycle, raw_details: &RawDetails) -> (CycleRecord, DetailsRecord) {
    (normalize_cycle(raw_cycle), normalize_details(raw_details))
}

pub fn normalize_cycle(raw: &RawCycle) -> CycleRecord {
    CycleRecord {
        name: raw.name.clone(),
        codename: text(&raw.codename),
        label: text(&raw.label),
        release_date: raw.release_date,
        lts: Milestone::new(raw.is_lts, raw.lts_from),
        eoas: Milestone::new(raw.is_eoas.unwrap_or(false), raw.eoas_from),
        eol: Milestone::new(raw.is_eol, raw.eol_from),
        eoes: Milestone::new(raw.is_eoes.unwrap_or(false), raw.eoes_from),
        maintained: raw.is_maintained,
        latest: raw.latest.as_ref().map(|l| LatestRelease {
            name: l.name.clone(),
            date: l.date,
            link: text(&l.link),
        }),
    }
}

pub fn normalize_details(raw: &RawDetails) -> DetailsRecord {
    let links = raw.links.as_ref();
    DetailsRecord {
        name: raw.name.clone(),
        label: text(&raw.label),
        category: text(&raw.category),
        version_command: text(&raw.version_command),
        docs_link: links.and_then(|l| text(&l.html)),
        release_policy_link: links.and_then(|l| text(&l.release_policy)),
    }
}

/// Empty strings carry no information; treat them like `null`.
fn text(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}
