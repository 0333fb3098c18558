//! Per-run generation state: recall tracking and open treatment plans.
//!
//! RULE: one VisitState per appointment run. It is created by the
//! caller, threaded through generation, and dropped afterwards. It is
//! never written to any table.

use crate::{config::ProcedureCategory, rng::StageRng, types::PatientId};
use chrono::{Months, NaiveDate};
use std::collections::HashMap;

/// Minimum spacing between two cleanings for the same patient.
pub const RECALL_INTERVAL_MONTHS: u32 = 5;
/// Chance that a qualifying completed procedure opens a plan.
pub const PLAN_OPEN_PROBABILITY: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStatus {
    InProgress,
    Completed,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreatmentPlan {
    pub plan_id: String,
    pub created: NaiveDate,
    pub total_procedures: u32,
    pub completed_procedures: u32,
    pub estimated_total_cost: f64,
}

impl TreatmentPlan {
    pub fn completion_rate(&self) -> f64 {
        self.completed_procedures as f64 / self.total_procedures as f64 * 100.0
    }
}

/// What a procedure row records about the plan it advanced.
#[derive(Debug, Clone)]
pub struct PlanLink {
    pub plan_id: String,
    pub status: PlanStatus,
    pub created: NaiveDate,
    pub completed_on: Option<NaiveDate>,
    pub completion_rate: f64,
    pub estimated_total_cost: f64,
}

#[derive(Debug, Default)]
pub struct VisitState {
    last_cleaning: HashMap<PatientId, NaiveDate>,
    open_plans: HashMap<PatientId, TreatmentPlan>,
    plans_opened: u64,
    plans_closed: u64,
}

impl VisitState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_cleaning(&self, patient_id: &str) -> Option<NaiveDate> {
        self.last_cleaning.get(patient_id).copied()
    }

    /// A first cleaning is always allowed; later ones need the recall
    /// interval to have elapsed since the last recorded cleaning.
    pub fn cleaning_allowed(&self, patient_id: &str, date: NaiveDate) -> bool {
        match self.last_cleaning(patient_id) {
            None => true,
            Some(last) => last
                .checked_add_months(Months::new(RECALL_INTERVAL_MONTHS))
                .is_some_and(|due| date >= due),
        }
    }

    /// Recorded whenever a cleaning is emitted, whatever the visit status.
    pub fn record_cleaning(&mut self, patient_id: &str, date: NaiveDate) {
        self.last_cleaning.insert(patient_id.to_string(), date);
    }

    pub fn open_plan(&self, patient_id: &str) -> Option<&TreatmentPlan> {
        self.open_plans.get(patient_id)
    }

    pub fn plans_opened(&self) -> u64 {
        self.plans_opened
    }

    pub fn plans_closed(&self) -> u64 {
        self.plans_closed
    }

    /// Advance (or open) the patient's treatment plan for one procedure.
    ///
    /// Only completed procedures in plan-bearing categories take part.
    /// The procedure that opens a plan counts as its first completed
    /// step; the one that reaches 100% closes and clears it.
    pub fn accrue_plan(
        &mut self,
        patient_id: &str,
        category: ProcedureCategory,
        completed: bool,
        date: NaiveDate,
        fee: f64,
        rng: &mut StageRng,
    ) -> Option<PlanLink> {
        if !completed || !category.opens_treatment_plan() {
            return None;
        }

        if let Some(plan) = self.open_plans.get_mut(patient_id) {
            plan.completed_procedures += 1;
            let rate = plan.completion_rate();
            let mut link = PlanLink {
                plan_id: plan.plan_id.clone(),
                status: PlanStatus::InProgress,
                created: plan.created,
                completed_on: None,
                completion_rate: rate,
                estimated_total_cost: plan.estimated_total_cost,
            };
            if plan.completed_procedures >= plan.total_procedures {
                link.status = PlanStatus::Completed;
                link.completed_on = Some(date);
                link.completion_rate = 100.0;
                self.open_plans.remove(patient_id);
                self.plans_closed += 1;
            }
            return Some(link);
        }

        if !rng.chance(PLAN_OPEN_PROBABILITY) {
            return None;
        }

        self.plans_opened += 1;
        let total = rng.int_between(2, 5) as u32;
        let plan = TreatmentPlan {
            plan_id: format!("TP{:06}", self.plans_opened),
            created: date,
            total_procedures: total,
            completed_procedures: 1,
            estimated_total_cost: fee * total as f64 * rng.uniform(0.9, 1.2),
        };
        let link = PlanLink {
            plan_id: plan.plan_id.clone(),
            status: PlanStatus::InProgress,
            created: date,
            completed_on: None,
            completion_rate: plan.completion_rate(),
            estimated_total_cost: plan.estimated_total_cost,
        };
        self.open_plans.insert(patient_id.to_string(), plan);
        Some(link)
    }
}
