//! Data models for extracted transaction mentions and the batches they form.
//!
//! - [`ExtractionRecord`]: one candidate transaction mention parsed from a page
//! - [`ExtractionBatch`]: the normalized output of one orchestrator run
//! - [`Informed`]: optional field with an explicit "not informed" state
//! - [`DealValue`] / [`DealMultiple`]: structured deal economics

use crate::error::SourceError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Text stored in place of a field the source did not report.
pub const NOT_INFORMED: &str = "Não informado";

/// Identity of a source adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    PipelineValor,
    ValorEconomico,
    FusoesAquisicoes,
}

impl SourceId {
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceId::PipelineValor => "Pipeline Valor",
            SourceId::ValorEconomico => "Valor Econômico",
            SourceId::FusoesAquisicoes => "Fusões e Aquisições",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// An optional record field.
///
/// `Unset` is what a parser produces when it found nothing. The normalizer
/// turns every `Unset` into `NotInformed`, so consumers of a normalized batch
/// only ever see `NotInformed` or `Known`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Informed<T> {
    #[default]
    Unset,
    NotInformed,
    Known(T),
}

impl<T> Informed<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Informed::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Informed::Unset)
    }

    /// Replace `Unset` with `NotInformed`; other states are kept.
    pub fn or_not_informed(self) -> Self {
        match self {
            Informed::Unset => Informed::NotInformed,
            other => other,
        }
    }
}

impl<T> From<Option<T>> for Informed<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Informed::Known(v),
            None => Informed::Unset,
        }
    }
}

impl<T: Serialize> Serialize for Informed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Informed::Unset => serializer.serialize_none(),
            Informed::NotInformed => serializer.serialize_str(NOT_INFORMED),
            Informed::Known(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Informed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Sentinel(String),
            Value(T),
        }

        match Option::<Repr<T>>::deserialize(deserializer)? {
            None => Ok(Informed::Unset),
            Some(Repr::Sentinel(s)) if s == NOT_INFORMED => Ok(Informed::NotInformed),
            Some(Repr::Sentinel(s)) => {
                use serde::de::IntoDeserializer;
                let de: serde::de::value::StringDeserializer<serde::de::value::Error> =
                    s.into_deserializer();
                T::deserialize(de)
                    .map(Informed::Known)
                    .map_err(serde::de::Error::custom)
            }
            Some(Repr::Value(v)) => Ok(Informed::Known(v)),
        }
    }
}

/// Order of magnitude a deal amount is quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Magnitude {
    Million,
    Billion,
}

impl Magnitude {
    /// Parse the Portuguese unit word used in deal announcements.
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "milhão" | "milhões" | "mi" => Some(Magnitude::Million),
            "bilhão" | "bilhões" | "bi" => Some(Magnitude::Billion),
            _ => None,
        }
    }
}

/// Reported transaction value, e.g. `R$ 1.500,5 milhões`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealValue {
    pub currency: String,
    pub amount: f64,
    pub magnitude: Magnitude,
}

impl fmt::Display for DealValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.magnitude {
            Magnitude::Million => "milhões",
            Magnitude::Billion => "bilhões",
        };
        write!(f, "{} {} {}", self.currency, self.amount, unit)
    }
}

/// Valuation multiple, e.g. `8.5x EBITDA`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealMultiple {
    pub ratio: f64,
    pub basis: Option<String>,
}

impl fmt::Display for DealMultiple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.basis {
            Some(basis) => write!(f, "{}x {}", self.ratio, basis),
            None => write!(f, "{}x", self.ratio),
        }
    }
}

/// One candidate transaction mention.
///
/// `url` identifies the record inside a batch. `source` is provenance only
/// and is ignored by `PartialEq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub url: String,
    pub title: String,
    /// Date text exactly as the source printed it.
    pub raw_date: String,
    pub normalized_date: Option<NaiveDate>,
    pub buyer: Informed<String>,
    pub acquired: Informed<String>,
    pub value: Informed<DealValue>,
    pub multiple: Informed<DealMultiple>,
    pub source: SourceId,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionRecord {
    /// A record with only its identity filled in, as parsers start out.
    pub fn new(
        source: SourceId,
        url: impl Into<String>,
        title: impl Into<String>,
        raw_date: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            raw_date: raw_date.into(),
            normalized_date: None,
            buyer: Informed::Unset,
            acquired: Informed::Unset,
            value: Informed::Unset,
            multiple: Informed::Unset,
            source,
            extracted_at: Utc::now(),
        }
    }
}

impl PartialEq for ExtractionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
            && self.title == other.title
            && self.raw_date == other.raw_date
            && self.normalized_date == other.normalized_date
            && self.buyer == other.buyer
            && self.acquired == other.acquired
            && self.value == other.value
            && self.multiple == other.multiple
            && self.extracted_at == other.extracted_at
    }
}

/// Normalized output of one orchestrator run.
///
/// Built once by [`ExtractionBatch::build`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionBatch {
    extracted_at: DateTime<Utc>,
    records: Vec<ExtractionRecord>,
    source_counts: BTreeMap<SourceId, usize>,
    errors: Vec<SourceError>,
}

impl ExtractionBatch {
    /// Normalize `raw` and attach the run's per-source bookkeeping.
    pub fn build(
        raw: Vec<ExtractionRecord>,
        source_counts: BTreeMap<SourceId, usize>,
        errors: Vec<SourceError>,
        extracted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            records: crate::normalize::normalize(raw, extracted_at),
            extracted_at,
            source_counts,
            errors,
        }
    }

    pub fn records(&self) -> &[ExtractionRecord] {
        &self.records
    }

    /// Raw record counts each source contributed before deduplication.
    pub fn source_counts(&self) -> &BTreeMap<SourceId, usize> {
        &self.source_counts
    }

    pub fn errors(&self) -> &[SourceError] {
        &self.errors
    }

    pub fn extracted_at(&self) -> DateTime<Utc> {
        self.extracted_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
