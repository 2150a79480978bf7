//! The customer record: an installation lead moving through the pipeline.
//!
//! Natural key: phone (digits). Buckets: pipeline stage and the active
//! flag. The `active` flag is an independent soft-disable, orthogonal to the
//! stage: a deactivated customer keeps its stage and history.

use crate::codec;
use crate::error::Result;
use crate::lifecycle::{Stage, StageChange};
use crate::model::Record;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MIN_PHONE_DIGITS: usize = 10;

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub district: String,
    /// Digits only; the phone natural key.
    pub phone: String,
    /// Normalized lowercase, or empty when not provided.
    #[serde(default)]
    pub email: String,
    /// Referring record id, if the lead came through a referrer.
    #[serde(default)]
    pub referrer: Option<u64>,
    /// Responsible party assigned when work begins.
    #[serde(default)]
    pub assignee: Option<u64>,
    /// Planned system size in kWp.
    #[serde(default)]
    pub system_kwp: Option<f64>,
    #[serde(default)]
    pub handover_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub stage: Stage,
    /// Append-only transition history; never truncated.
    #[serde(default)]
    pub stage_history: Vec<StageChange>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Derived: holds exactly while the customer is installed.
    #[serde(default)]
    pub support_eligible: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Customer {
    const KIND: &'static str = "customers";
    const KEYS: &'static [&'static str] = &["phone", "email"];
    const BUCKETS: &'static [&'static str] = &["stage", "active"];

    fn id(&self) -> u64 {
        self.id
    }

    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    fn stamp_updated(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn natural_keys(&self) -> BTreeMap<&'static str, String> {
        let mut keys = BTreeMap::new();
        if !self.phone.is_empty() {
            keys.insert("phone", self.phone.clone());
        }
        if !self.email.is_empty() {
            keys.insert("email", self.email.clone());
        }
        keys
    }

    fn buckets(&self) -> BTreeMap<&'static str, String> {
        let mut buckets = BTreeMap::new();
        buckets.insert("stage", self.stage.name().to_string());
        buckets.insert("active", self.active.to_string());
        buckets
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn search_text(&self) -> String {
        format!("{} {} {}", self.name, self.district, self.notes)
    }

    fn normalize_key(key: &str, raw: &str) -> String {
        match key {
            "phone" => codec::digits(raw),
            "email" => raw.trim().to_lowercase(),
            _ => raw.trim().to_string(),
        }
    }
}

/// Loosely-shaped customer input, as it arrives from an intake form or a
/// legacy import. [`CustomerDraft::validate`] is the only way to turn it
/// into a [`Customer`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDraft {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub referrer: Option<u64>,
    #[serde(default)]
    pub assignee: Option<u64>,
    /// Numeric-looking string, coerced ("5", "5.5").
    #[serde(default)]
    pub system_kwp: Option<String>,
    #[serde(default)]
    pub handover_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    /// Raw stage value; unrecognized values fall back to `lead`.
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl CustomerDraft {
    /// Normalize and validate into a canonical [`Customer`], or fail naming
    /// the offending field. Runs no I/O.
    pub fn validate(self) -> Result<Customer> {
        let name = codec::required("name", &self.name)?;
        let district = codec::required("district", &self.district)?;
        let phone = codec::phone("phone", &self.phone, MIN_PHONE_DIGITS)?;
        let email = codec::optional_email("email", &self.email)?;
        let system_kwp = match self.system_kwp.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(raw) => Some(codec::positive_decimal("system_kwp", raw)?),
        };

        Ok(Customer {
            id: self.id.unwrap_or(0),
            name,
            district,
            phone,
            email,
            referrer: self.referrer,
            assignee: self.assignee,
            system_kwp,
            handover_date: self.handover_date,
            notes: self.notes.trim().to_string(),
            stage: self
                .stage
                .as_deref()
                .map(Stage::from_raw)
                .unwrap_or_default(),
            stage_history: Vec::new(),
            active: self.active.unwrap_or(true),
            support_eligible: false,
            created_at: self.created_at,
            updated_at: None,
        })
    }
}
