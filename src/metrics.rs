//! Metric schema: the fixed catalogue of gauges the exporter publishes.
//!
//! All gauges live in one owned [`MetricSchema`] wrapping a
//! `prometheus::Registry`. Every refresh task shares it through an `Arc`;
//! the `GaugeVec`s serialize concurrent sets internally.
//!
//! Label values are strings: booleans render as `"true"`/`"false"` and
//! absent optional text renders as `""`. Date gauges hold seconds since the
//! Unix epoch at 00:00:00 UTC and exist only while the source date is known.

use chrono::NaiveDate;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::api::date::unix_seconds;
use crate::error::Result;
use crate::normalize::{CycleRecord, DetailsRecord};

const RELEASE_INFO_LABELS: &[&str] = &[
    "host",
    "name",
    "product",
    "codename",
    "label",
    "isLts",
    "isEol",
    "isEoas",
    "isEoes",
    "isMaintained",
    "latest_name",
    "latest_link",
];

const DETAILS_INFO_LABELS: &[&str] = &["host", "name", "product", "label", "category", "versionCommand"];

const DATE_LABELS: &[&str] = &["host", "name", "product", "codename", "label"];

/// Everything needed to publish one target's refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSample {
    /// Host identity label.
    pub host: String,
    /// Product slug the target was looked up with.
    pub product: String,
    pub cycle: CycleRecord,
    pub details: DetailsRecord,
}

pub struct MetricSchema {
    registry: Registry,
    release_info: GaugeVec,
    details_info: GaugeVec,
    release_date: GaugeVec,
    eol_date: GaugeVec,
    eoas_date: GaugeVec,
    eoes_date: GaugeVec,
}

impl MetricSchema {
    /// Schema registered into a fresh, isolated registry.
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Schema registered into a caller-supplied registry.
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let schema = Self {
            release_info: gauge(
                "product_release_info",
                "Full information about a product release cycle.",
                RELEASE_INFO_LABELS,
            )?,
            details_info: gauge(
                "product_details_info",
                "Full details of a product.",
                DETAILS_INFO_LABELS,
            )?,
            release_date: gauge(
                "release_date",
                "Release date of the product release cycle. Expressed in seconds since Unix epoch (Unix Timestamp).",
                DATE_LABELS,
            )?,
            eol_date: gauge(
                "eol_date",
                "End of life date for the product release cycle. Expressed in seconds since Unix epoch (Unix Timestamp).",
                DATE_LABELS,
            )?,
            eoas_date: gauge(
                "eoas_date",
                "End of active support date for the release cycle. Expressed in seconds since Unix epoch (Unix Timestamp).",
                DATE_LABELS,
            )?,
            eoes_date: gauge(
                "eoes_date",
                "End of extended support date for the release cycle. Expressed in seconds since Unix epoch (Unix Timestamp).",
                DATE_LABELS,
            )?,
            registry,
        };

        for g in [
            &schema.release_info,
            &schema.details_info,
            &schema.release_date,
            &schema.eol_date,
            &schema.eoas_date,
            &schema.eoes_date,
        ] {
            schema.registry.register(Box::new(g.clone()))?;
        }
        Ok(schema)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Write one sample. Values for the exact same label combination are
    /// overwritten; a date gauge whose date is absent is removed for that
    /// combination instead of being set.
    pub fn publish(&self, sample: &MetricSample) {
        let series = Series::of(sample);
        let c = &sample.cycle;

        self.release_info.with_label_values(&series.release_info).set(1.0);
        self.details_info.with_label_values(&series.details_info).set(1.0);
        self.release_date
            .with_label_values(&series.dated)
            .set(unix_seconds(c.release_date) as f64);
        set_or_clear(&self.eol_date, &series.dated, c.eol.date);
        set_or_clear(&self.eoas_date, &series.dated, c.eoas.date);
        set_or_clear(&self.eoes_date, &series.dated, c.eoes.date);
    }

    /// Publish `next` as the successor of `previous` for the same target.
    ///
    /// Any series of `previous` whose label combination differs from the
    /// one `next` writes is removed, so a flag or text change never leaves
    /// the old combination behind.
    pub fn replace(&self, previous: Option<&MetricSample>, next: &MetricSample) {
        self.publish(next);

        let Some(previous) = previous else { return };
        let old = Series::of(previous);
        let new = Series::of(next);

        if old.release_info != new.release_info {
            let _ = self.release_info.remove_label_values(&old.release_info);
        }
        if old.details_info != new.details_info {
            let _ = self.details_info.remove_label_values(&old.details_info);
        }
        if old.dated != new.dated {
            for g in [&self.release_date, &self.eol_date, &self.eoas_date, &self.eoes_date] {
                let _ = g.remove_label_values(&old.dated);
            }
        }
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Label values one sample writes, per gauge family.
struct Series<'a> {
    release_info: [&'a str; 12],
    details_info: [&'a str; 6],
    dated: [&'a str; 5],
}

impl<'a> Series<'a> {
    fn of(sample: &'a MetricSample) -> Self {
        let host = sample.host.as_str();
        let product = sample.product.as_str();
        let c = &sample.cycle;
        let d = &sample.details;

        let codename = c.codename.as_deref().unwrap_or("");
        let label = c.label.as_deref().unwrap_or("");
        let (latest_name, latest_link) = match &c.latest {
            Some(l) => (l.name.as_str(), l.link.as_deref().unwrap_or("")),
            None => ("", ""),
        };

        Self {
            release_info: [
                host,
                c.name.as_str(),
                product,
                codename,
                label,
                flag(c.lts.reached),
                flag(c.eol.reached),
                flag(c.eoas.reached),
                flag(c.eoes.reached),
                flag(c.maintained),
                latest_name,
                latest_link,
            ],
            details_info: [
                host,
                d.name.as_str(),
                product,
                d.label.as_deref().unwrap_or(""),
                d.category.as_deref().unwrap_or(""),
                d.version_command.as_deref().unwrap_or(""),
            ],
            dated: [host, c.name.as_str(), product, codename, label],
        }
    }
}

fn gauge(name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
    Ok(GaugeVec::new(Opts::new(name, help), labels)?)
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn set_or_clear(gauge: &GaugeVec, labels: &[&str], date: Option<NaiveDate>) {
    match date {
        Some(d) => gauge.with_label_values(labels).set(unix_seconds(d) as f64),
        // Nothing to remove is fine.
        None => {
            let _ = gauge.remove_label_values(labels);
        }
    }
}
