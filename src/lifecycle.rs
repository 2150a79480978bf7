//! # Lifecycle State Machine
//!
//! Customers move through ordered stages: `lead` → `ongoing` → `installed`.
//! The machine is a thin layer over the generic store: it reads the current
//! record with `get`, computes the next record value, and hands it back to
//! `save`. It never bypasses the lock or the index update.
//!
//! ## Rules
//!
//! - A transition to the current stage is a no-op returning the record
//!   unchanged.
//! - Moving backwards is rejected unless the caller passes
//!   [`Actor::Privileged`]. The asymmetry is an explicit parameter of every
//!   call, never inferred from record data.
//! - Each forward target has a field gate: entering `ongoing` requires an
//!   assigned responsible party and a positive system size; entering
//!   `installed` requires a handover date. A failed gate rejects the whole
//!   transition with an error naming the missing requirement, and no partial
//!   update is applied; payload fields are only persisted on success.
//! - Every successful transition appends one immutable `{from, to,
//!   changed_at}` entry to the record's history. The history is never
//!   truncated or rewritten.
//! - `support_eligible` is derived from the stage: it holds exactly while
//!   the customer is installed.

use crate::audit::AuditEvent;
use crate::error::{Result, StoreError};
use crate::records::customer::Customer;
use crate::store::Collection;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Ordered pipeline stages. The derived `Ord` follows declaration order,
/// which is the forward direction of the pipeline.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Lead,
    Ongoing,
    Installed,
}

impl Stage {
    pub fn rank(self) -> u8 {
        match self {
            Stage::Lead => 1,
            Stage::Ongoing => 2,
            Stage::Installed => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Lead => "lead",
            Stage::Ongoing => "ongoing",
            Stage::Installed => "installed",
        }
    }

    /// Parse a raw stage value, tolerating legacy data: anything
    /// unrecognized falls back to `lead` instead of failing.
    pub fn from_raw(raw: &str) -> Stage {
        match raw.trim().to_lowercase().as_str() {
            "ongoing" => Stage::Ongoing,
            "installed" => Stage::Installed,
            _ => Stage::Lead,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One immutable history entry. Appended on every successful transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageChange {
    pub from: Stage,
    pub to: Stage,
    pub changed_at: DateTime<Utc>,
}

/// Who is asking for the transition. Backwards moves need `Privileged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Standard,
    Privileged,
}

/// Fields a transition may carry. Applied to the record only if the
/// transition succeeds; a rejected gate leaves the record untouched.
#[derive(Debug, Clone, Default)]
pub struct StagePayload {
    pub assignee: Option<u64>,
    pub system_kwp: Option<f64>,
    pub handover_date: Option<NaiveDate>,
}

/// The stage machine over a customer collection.
pub struct Pipeline<'a> {
    store: &'a Collection<Customer>,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a Collection<Customer>) -> Self {
        Self { store }
    }

    /// Move customer `id` to `target`, applying `payload` on success.
    pub fn change_stage(
        &self,
        id: u64,
        target: Stage,
        payload: StagePayload,
        actor: Actor,
    ) -> Result<Customer> {
        let mut customer = self.store.get(id)?.ok_or(StoreError::NotFound(id))?;
        let current = customer.stage;

        if target == current {
            return Ok(customer);
        }
        if target.rank() < current.rank() && actor != Actor::Privileged {
            return Err(StoreError::BackwardTransition {
                from: current.name(),
                to: target.name(),
            });
        }

        // Work on the local copy; nothing is persisted until the gate passes.
        if let Some(assignee) = payload.assignee {
            customer.assignee = Some(assignee);
        }
        if let Some(kwp) = payload.system_kwp {
            customer.system_kwp = Some(kwp);
        }
        if let Some(date) = payload.handover_date {
            customer.handover_date = Some(date);
        }

        match target {
            Stage::Lead => {}
            Stage::Ongoing => {
                if customer.assignee.is_none() {
                    return Err(StoreError::TransitionGate {
                        stage: "ongoing",
                        requirement: "an assigned responsible party",
                    });
                }
                if !customer.system_kwp.map(|kwp| kwp > 0.0).unwrap_or(false) {
                    return Err(StoreError::TransitionGate {
                        stage: "ongoing",
                        requirement: "a positive system size",
                    });
                }
            }
            Stage::Installed => {
                if customer.handover_date.is_none() {
                    return Err(StoreError::TransitionGate {
                        stage: "installed",
                        requirement: "a handover date",
                    });
                }
            }
        }

        let now = Utc::now();
        customer.stage_history.push(StageChange {
            from: current,
            to: target,
            changed_at: now,
        });
        customer.stage = target;
        customer.support_eligible = customer.stage == Stage::Installed;

        let saved = self.store.save(customer)?;
        if let Some(audit) = self.store.audit() {
            audit.append(&AuditEvent::StageChanged {
                id: saved.id,
                from: current.name().to_string(),
                to: target.name().to_string(),
                at: now,
            })?;
        }
        Ok(saved)
    }
}
