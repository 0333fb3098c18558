//! Aggregation indices rebuilt from upstream tables.
//!
//! RULE: an index entry exists only if the source held at least one
//! row for its key. A missing entry means "no data", never "zero
//! activity". Every downstream metric asks `has_index_entry` first
//! and synthesizes when the answer is no.

use crate::{
    appointment_generator::{AppointmentRecord, AppointmentStatus, ClaimStatus},
    config::{PayorClass, PipelineConfig, ProcedureCategory},
    operations_generator::OperationsRecord,
    types::{DayKey, MonthKey},
};
use chrono::Datelike;
use std::collections::{BTreeMap, HashSet};

// ── Derive-or-synthesize ───────────────────────────────────────────

/// Which arm of a derive-or-synthesize decision produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Derived,
    Synthetic,
}

/// A metric value tagged with the arm that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Sourced<T> {
    pub fn derived(value: T) -> Self {
        Self { value, source: Source::Derived }
    }

    pub fn synthetic(value: T) -> Self {
        Self { value, source: Source::Synthetic }
    }

    pub fn is_derived(&self) -> bool {
        self.source == Source::Derived
    }
}

/// Use `derived` when present, otherwise call `synthesize`.
/// The synthesis closure only runs (and only consumes randomness)
/// on the fallback arm.
pub fn derive_or_synthesize<T>(derived: Option<T>, synthesize: impl FnOnce() -> T) -> Sourced<T> {
    match derived {
        Some(value) => Sourced::derived(value),
        None => Sourced::synthetic(synthesize()),
    }
}

/// Counts of derived vs synthesized metric values over a run.
#[derive(Debug, Default, Clone)]
pub struct SourceTally {
    pub derived: u64,
    pub synthetic: u64,
}

impl SourceTally {
    pub fn record<T>(&mut self, metric: &Sourced<T>) {
        match metric.source {
            Source::Derived => self.derived += 1,
            Source::Synthetic => self.synthetic += 1,
        }
    }
}

// ── Generic keyed index ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AggregationIndex<K: Ord, B> {
    buckets: BTreeMap<K, B>,
}

impl<K: Ord, B> Default for AggregationIndex<K, B> {
    fn default() -> Self {
        Self { buckets: BTreeMap::new() }
    }
}

impl<K: Ord, B: Default> AggregationIndex<K, B> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_index_entry(&self, key: &K) -> bool {
        self.buckets.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&B> {
        self.buckets.get(key)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.buckets.keys()
    }

    fn bucket_mut(&mut self, key: K) -> &mut B {
        self.buckets.entry(key).or_default()
    }
}

// ── Appointment buckets ────────────────────────────────────────────

/// Running sums over appointment rows sharing one key.
#[derive(Debug, Default, Clone)]
pub struct AppointmentBucket {
    pub total_rows: u32,
    pub completed_rows: u32,
    visits: HashSet<String>,
    completed_visits: HashSet<String>,
    canceled_visits: HashSet<String>,
    no_show_visits: HashSet<String>,
    rescheduled_visits: HashSet<String>,
    patients_seen: HashSet<String>,
    new_patients: HashSet<String>,
    pub completed_duration_minutes: f64,
    pub charged: f64,
    pub covered: f64,
    pub out_of_pocket: f64,
    pub paid: f64,
    pub collected: f64,
    pub claims_submitted: u32,
    pub claims_paid: u32,
    pub claims_denied: u32,
    pub plan_rows: u32,
    pub plans_completed: u32,
    pub category_counts: BTreeMap<ProcedureCategory, u32>,
    pub payor_counts: BTreeMap<PayorClass, u32>,
}

impl AppointmentBucket {
    fn add(&mut self, row: &AppointmentRecord, payor: PayorClass) {
        self.total_rows += 1;
        self.visits.insert(row.visit_id.clone());
        match row.appointment_status {
            AppointmentStatus::Completed => {
                self.completed_rows += 1;
                self.completed_visits.insert(row.visit_id.clone());
                self.patients_seen.insert(row.patient_id.clone());
                if row.is_new_patient == 1 {
                    self.new_patients.insert(row.patient_id.clone());
                }
                self.completed_duration_minutes += row.appointment_duration as f64;
                self.charged += row.charged_amount;
                self.covered += row.insurance_covered_amount;
                self.out_of_pocket += row.out_of_pocket;
                self.paid += row.amount_paid;
                self.collected += row.collected_amount();
                *self.category_counts.entry(row.procedure_category).or_default() += 1;
                *self.payor_counts.entry(payor).or_default() += 1;
            }
            AppointmentStatus::Canceled => {
                self.canceled_visits.insert(row.visit_id.clone());
            }
            AppointmentStatus::NoShow => {
                self.no_show_visits.insert(row.visit_id.clone());
            }
            AppointmentStatus::Rescheduled => {
                self.rescheduled_visits.insert(row.visit_id.clone());
            }
        }
        if let Some(status) = row.insurance_claim_status {
            self.claims_submitted += 1;
            match status {
                ClaimStatus::Paid => self.claims_paid += 1,
                ClaimStatus::Denied => self.claims_denied += 1,
                ClaimStatus::Pending => {}
            }
        }
        if row.treatment_plan_id.is_some() {
            self.plan_rows += 1;
            if row.treatment_plan_completion_date.is_some() {
                self.plans_completed += 1;
            }
        }
    }

    pub fn visit_count(&self) -> u32 {
        self.visits.len() as u32
    }

    pub fn completed_visit_count(&self) -> u32 {
        self.completed_visits.len() as u32
    }

    pub fn canceled_visit_count(&self) -> u32 {
        self.canceled_visits.len() as u32
    }

    pub fn no_show_visit_count(&self) -> u32 {
        self.no_show_visits.len() as u32
    }

    pub fn rescheduled_visit_count(&self) -> u32 {
        self.rescheduled_visits.len() as u32
    }

    pub fn patients_seen_count(&self) -> u32 {
        self.patients_seen.len() as u32
    }

    pub fn new_patient_count(&self) -> u32 {
        self.new_patients.len() as u32
    }

    pub fn category_total(&self) -> u32 {
        self.category_counts.values().sum()
    }

    pub fn payor_total(&self) -> u32 {
        self.payor_counts.values().sum()
    }
}

pub type AppointmentDayIndex = AggregationIndex<DayKey, AppointmentBucket>;
pub type AppointmentMonthIndex = AggregationIndex<MonthKey, AppointmentBucket>;

/// Per-(location, date) buckets for the operations stage.
pub fn build_day_index(rows: &[AppointmentRecord], config: &PipelineConfig) -> AppointmentDayIndex {
    let mut index = AppointmentDayIndex::empty();
    for row in rows {
        let key = (row.location_id.clone(), row.date_of_service);
        index
            .bucket_mut(key)
            .add(row, config.payor_class(&row.insurance_provider));
    }
    log::debug!("day index: {} (location, date) buckets from {} rows", index.len(), rows.len());
    index
}

/// Per-(location, year, month) buckets for the financial stage.
pub fn build_appointment_month_index(
    rows: &[AppointmentRecord],
    config: &PipelineConfig,
) -> AppointmentMonthIndex {
    let mut index = AppointmentMonthIndex::empty();
    for row in rows {
        let d = row.date_of_service;
        let key = (row.location_id.clone(), d.year(), d.month());
        index
            .bucket_mut(key)
            .add(row, config.payor_class(&row.insurance_provider));
    }
    log::debug!("appointment month index: {} buckets from {} rows", index.len(), rows.len());
    index
}

// ── Operations buckets ─────────────────────────────────────────────

/// Monthly sums and averages over daily operations rows.
#[derive(Debug, Default, Clone)]
pub struct OperationsBucket {
    pub days: u32,
    pub labor_cost: f64,
    pub clinical_labor_cost: f64,
    pub admin_labor_cost: f64,
    pub labor_hours: f64,
    pub actual_appointments: u32,
    pub patients_seen: u32,
    pub new_patients: u32,
    pub claims_submitted: u32,
    pub claims_denied: u32,
    pub revenue: f64,
    pub collections: f64,
    chair_utilization_sum: f64,
    collection_rate_sum: f64,
    plan_completion_rate_sum: f64,
}

impl OperationsBucket {
    fn add(&mut self, row: &OperationsRecord) {
        self.days += 1;
        self.labor_cost += row.labor_cost;
        self.clinical_labor_cost += row.clinical_labor_cost;
        self.admin_labor_cost += row.admin_labor_cost;
        self.labor_hours += row.total_labor_hours;
        self.actual_appointments += row.actual_appointments;
        self.patients_seen += row.total_patients_seen;
        self.new_patients += row.new_patient_count;
        self.claims_submitted += row.insurance_claims_submitted;
        self.claims_denied += row.insurance_claims_denied;
        self.revenue += row.revenue;
        self.collections += row.collections;
        self.chair_utilization_sum += row.chair_utilization;
        self.collection_rate_sum += row.actual_collection_rate;
        self.plan_completion_rate_sum += row.treatment_plan_completion_rate;
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.days == 0 {
            0.0
        } else {
            sum / self.days as f64
        }
    }

    pub fn avg_chair_utilization(&self) -> f64 {
        self.mean(self.chair_utilization_sum)
    }

    pub fn avg_collection_rate(&self) -> f64 {
        self.mean(self.collection_rate_sum)
    }

    pub fn avg_plan_completion_rate(&self) -> f64 {
        self.mean(self.plan_completion_rate_sum)
    }
}

pub type OperationsMonthIndex = AggregationIndex<MonthKey, OperationsBucket>;

pub fn build_operations_month_index(rows: &[OperationsRecord]) -> OperationsMonthIndex {
    let mut index = OperationsMonthIndex::empty();
    for row in rows {
        let key = (row.location_id.clone(), row.date.year(), row.date.month());
        index.bucket_mut(key).add(row);
    }
    log::debug!("operations month index: {} buckets from {} rows", index.len(), rows.len());
    index
}
