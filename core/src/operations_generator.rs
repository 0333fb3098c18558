//! Operations generator: daily staffing, equipment and practice metrics.
//!
//! One row per (location, business day). Reads the appointment table
//! through a per-(location, date) index. Each metric decides on its
//! own whether to derive from the index or to synthesize, so a single
//! day can mix both.
//!
//! Claims are split: the count submitted comes from the index when it
//! has one, while processing time, denial rate and plan completion
//! follow their 2020→2025 trend lines regardless of the index.
//!
//! Depends on: Pat_App_Data (optional; absent ⇒ all synthetic).

use crate::{
    calendar,
    config::{LocationConfig, PipelineConfig, StaffRole},
    equipment::{self, EquipmentUsageRecord},
    error::PipelineResult,
    index::{derive_or_synthesize, AppointmentBucket, AppointmentDayIndex, SourceTally, Sourced},
    rng::StageRng,
    staffing::{self, Rosters, StaffHoursRecord},
    types::{round_cents, round_ratio},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Treatment plan completion rate: 2020 baseline → 2025 target.
pub const PLAN_COMPLETION_TREND: (f64, f64) = (0.65, 0.85);
/// Days from claim submission to payment: 2020 baseline → 2025 target.
pub const CLAIM_PROCESSING_TREND: (f64, f64) = (30.0, 15.0);
/// Claim denial rate: 2020 baseline → 2025 target.
pub const DENIAL_RATE_TREND: (f64, f64) = (0.10, 0.05);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationsRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Location_ID")]
    pub location_id: String,
    #[serde(rename = "Location_Name")]
    pub location_name: String,
    #[serde(rename = "Day_of_Week")]
    pub day_of_week: String,
    #[serde(rename = "Month_Name")]
    pub month_name: String,
    #[serde(rename = "Is_Saturday")]
    pub is_saturday: u8,
    #[serde(rename = "Scheduled_Appointments")]
    pub scheduled_appointments: u32,
    #[serde(rename = "Actual_Appointments")]
    pub actual_appointments: u32,
    #[serde(rename = "Appointment_Capacity")]
    pub appointment_capacity: u32,
    #[serde(rename = "Cancellation_Count")]
    pub cancellation_count: u32,
    #[serde(rename = "No_Show_Count")]
    pub no_show_count: u32,
    #[serde(rename = "Rescheduled_Count")]
    pub rescheduled_count: u32,
    #[serde(rename = "Cancellation_Rate")]
    pub cancellation_rate: f64,
    #[serde(rename = "No_Show_Rate")]
    pub no_show_rate: f64,
    #[serde(rename = "Total_Patients_Seen")]
    pub total_patients_seen: u32,
    #[serde(rename = "New_Patient_Count")]
    pub new_patient_count: u32,
    #[serde(rename = "Returning_Patient_Count")]
    pub returning_patient_count: u32,
    #[serde(rename = "Target_New_Patients")]
    pub target_new_patients: u32,
    #[serde(rename = "Chair_Count")]
    pub chair_count: u32,
    #[serde(rename = "Chair_Capacity_Hours")]
    pub chair_capacity_hours: f64,
    #[serde(rename = "Used_Chair_Hours")]
    pub used_chair_hours: f64,
    #[serde(rename = "Chair_Utilization")]
    pub chair_utilization: f64,
    #[serde(rename = "Target_Chair_Utilization")]
    pub target_chair_utilization: f64,
    #[serde(rename = "Staff_On_Duty")]
    pub staff_on_duty: u32,
    #[serde(rename = "Total_Labor_Hours")]
    pub total_labor_hours: f64,
    #[serde(rename = "Clinical_Labor_Cost")]
    pub clinical_labor_cost: f64,
    #[serde(rename = "Admin_Labor_Cost")]
    pub admin_labor_cost: f64,
    #[serde(rename = "Total_Labor_Cost")]
    pub labor_cost: f64,
    #[serde(rename = "Patients_Per_Labor_Hour")]
    pub patients_per_labor_hour: f64,
    #[serde(rename = "Revenue")]
    pub revenue: f64,
    #[serde(rename = "Collections")]
    pub collections: f64,
    #[serde(rename = "Actual_Collection_Rate")]
    pub actual_collection_rate: f64,
    #[serde(rename = "Target_Collection_Rate")]
    pub target_collection_rate: f64,
    #[serde(rename = "Revenue_Per_Hour")]
    pub revenue_per_hour: f64,
    #[serde(rename = "Avg_Wait_Time")]
    pub avg_wait_time: f64,
    #[serde(rename = "Equipment_Utilization")]
    pub equipment_utilization: f64,
    #[serde(rename = "Insurance_Claims_Submitted")]
    pub insurance_claims_submitted: u32,
    #[serde(rename = "Insurance_Claims_Processed")]
    pub insurance_claims_processed: u32,
    #[serde(rename = "Insurance_Claims_Paid")]
    pub insurance_claims_paid: u32,
    #[serde(rename = "Insurance_Claims_Denied")]
    pub insurance_claims_denied: u32,
    #[serde(rename = "Avg_Days_To_Payment")]
    pub avg_days_to_payment: f64,
    #[serde(rename = "Claims_Aging_0_30")]
    pub claims_aging_0_30: u32,
    #[serde(rename = "Claims_Aging_31_60")]
    pub claims_aging_31_60: u32,
    #[serde(rename = "Claims_Aging_61_90")]
    pub claims_aging_61_90: u32,
    #[serde(rename = "Claims_Aging_90_Plus")]
    pub claims_aging_90_plus: u32,
    #[serde(rename = "Treatment_Plans_Not_Started")]
    pub treatment_plans_not_started: u32,
    #[serde(rename = "Treatment_Plans_In_Progress")]
    pub treatment_plans_in_progress: u32,
    #[serde(rename = "Treatment_Plans_Completed")]
    pub treatment_plans_completed: u32,
    #[serde(rename = "Treatment_Plans_Delayed")]
    pub treatment_plans_delayed: u32,
    #[serde(rename = "Treatment_Plan_Completion_Rate")]
    pub treatment_plan_completion_rate: f64,
}

/// Appointment volume for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume {
    pub scheduled: u32,
    pub completed: u32,
    pub canceled: u32,
    pub no_show: u32,
    pub rescheduled: u32,
}

/// Patients seen and how many were new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatientMix {
    pub seen: u32,
    pub new: u32,
}

/// The index-sensitive metrics of one day, each tagged with its arm.
#[derive(Debug, Clone)]
pub struct DayMetrics {
    pub volume: Sourced<Volume>,
    pub patients: Sourced<PatientMix>,
    pub chair_minutes: Sourced<f64>,
    pub revenue: Sourced<f64>,
    pub collections: Sourced<f64>,
    pub claims_submitted: Sourced<u32>,
}

impl DayMetrics {
    fn tally(&self, tally: &mut SourceTally) {
        tally.record(&self.volume);
        tally.record(&self.patients);
        tally.record(&self.chair_minutes);
        tally.record(&self.revenue);
        tally.record(&self.collections);
        tally.record(&self.claims_submitted);
    }
}

/// Everything the operations stage writes.
#[derive(Debug, Default, Clone)]
pub struct OperationsOutput {
    pub operations: Vec<OperationsRecord>,
    pub staff_hours: Vec<StaffHoursRecord>,
    pub equipment_usage: Vec<EquipmentUsageRecord>,
}

pub struct OperationsGenerator<'a> {
    config: &'a PipelineConfig,
    index: &'a AppointmentDayIndex,
    avg_visit_value: f64,
    pub tally: SourceTally,
}

impl<'a> OperationsGenerator<'a> {
    pub fn new(config: &'a PipelineConfig, index: &'a AppointmentDayIndex) -> Self {
        // Mean fee over the catalog times the usual procedures per visit.
        let avg_fee = if config.procedures.is_empty() {
            0.0
        } else {
            config.procedures.iter().map(|p| p.fee).sum::<f64>() / config.procedures.len() as f64
        };
        Self {
            config,
            index,
            avg_visit_value: avg_fee * 0.6 * 1.5,
            tally: SourceTally::default(),
        }
    }

    pub fn generate(&mut self, rng: &mut StageRng) -> PipelineResult<OperationsOutput> {
        let config = self.config;
        let g = &config.generation;
        let rosters = Rosters::build(config, rng);
        let mut out = OperationsOutput::default();

        for location in &config.locations {
            let start = g.start_date.max(location.opened_date);
            let days = calendar::business_days(start, g.end_date, &config.holidays);
            let items = equipment::inventory(location);
            let roster = rosters.for_location(&location.location_id);
            let before = out.operations.len();

            for date in days {
                let record = self.generate_day(location, date, roster, &items, rng, &mut out);
                out.operations.push(record);
            }
            log::debug!(
                "operations {}: {} business days",
                location.location_id,
                out.operations.len() - before
            );
        }

        log::info!(
            "operations: {} daily rows, {} staff shifts, {} equipment rows; metrics derived={} synthetic={}",
            out.operations.len(),
            out.staff_hours.len(),
            out.equipment_usage.len(),
            self.tally.derived,
            self.tally.synthetic
        );
        Ok(out)
    }

    /// Decide each index-sensitive metric for one (location, date).
    pub fn day_metrics(
        &self,
        location: &LocationConfig,
        date: NaiveDate,
        rng: &mut StageRng,
    ) -> DayMetrics {
        let key = (location.location_id.clone(), date);
        let bucket: Option<&AppointmentBucket> = if self.index.has_index_entry(&key) {
            self.index.get(&key)
        } else {
            None
        };
        let saturday = calendar::is_saturday(date);
        let day_scale = if saturday { 0.5 } else { 1.0 };
        let capacity_minutes = location.open_minutes(saturday) * location.chairs as f64;

        let volume = derive_or_synthesize(
            bucket.filter(|b| b.visit_count() > 0).map(|b| Volume {
                scheduled: b.visit_count(),
                completed: b.completed_visit_count(),
                canceled: b.canceled_visit_count(),
                no_show: b.no_show_visit_count(),
                rescheduled: b.rescheduled_visit_count(),
            }),
            || {
                let expected = location.expected_daily_appointments * day_scale;
                let scheduled = (expected * rng.uniform(0.85, 1.15)).round().max(1.0) as u32;
                let no_show = (scheduled as f64 * rng.uniform(0.03, 0.07)).round() as u32;
                let canceled = (scheduled as f64 * rng.uniform(0.05, 0.09)).round() as u32;
                let rescheduled = (scheduled as f64 * rng.uniform(0.01, 0.04)).round() as u32;
                let completed = scheduled.saturating_sub(no_show + canceled + rescheduled);
                Volume { scheduled, completed, canceled, no_show, rescheduled }
            },
        );

        let completed = volume.value.completed;
        let patients = derive_or_synthesize(
            bucket.filter(|b| b.patients_seen_count() > 0).map(|b| PatientMix {
                seen: b.patients_seen_count(),
                new: b.new_patient_count(),
            }),
            || {
                let target = location.target_new_patients as f64 * day_scale;
                let new = ((target * rng.uniform(0.6, 1.4)).round() as u32).min(completed);
                PatientMix { seen: completed, new }
            },
        );

        let chair_minutes = derive_or_synthesize(
            bucket
                .map(|b| b.completed_duration_minutes)
                .filter(|m| *m > 0.0),
            || capacity_minutes * location.target_chair_utilization * rng.uniform(0.9, 1.05),
        );

        let avg_visit_value = self.avg_visit_value;
        let revenue = derive_or_synthesize(
            bucket.map(|b| b.charged).filter(|c| *c > 0.0),
            || completed as f64 * avg_visit_value * rng.uniform(0.9, 1.1),
        );

        let revenue_value = revenue.value;
        let collections = derive_or_synthesize(
            bucket.filter(|b| b.charged > 0.0).map(|b| b.collected),
            || {
                let rate = (location.target_collection_rate * rng.uniform(0.93, 1.03)).min(1.0);
                revenue_value * rate
            },
        );

        let claims_submitted = derive_or_synthesize(
            bucket.map(|b| b.claims_submitted).filter(|c| *c > 0),
            || (completed as f64 * 0.8 * rng.uniform(0.9, 1.1)).round() as u32,
        );

        DayMetrics { volume, patients, chair_minutes, revenue, collections, claims_submitted }
    }

    fn generate_day(
        &mut self,
        location: &LocationConfig,
        date: NaiveDate,
        roster: &[staffing::StaffMember],
        items: &[equipment::EquipmentItem],
        rng: &mut StageRng,
        out: &mut OperationsOutput,
    ) -> OperationsRecord {
        let saturday = calendar::is_saturday(date);
        let day_scale = if saturday { 0.5 } else { 1.0 };
        let open_minutes = location.open_minutes(saturday);
        let capacity_minutes = open_minutes * location.chairs as f64;

        let metrics = self.day_metrics(location, date, rng);
        metrics.tally(&mut self.tally);
        let volume = metrics.volume.value;
        let patients = metrics.patients.value;

        // Staffing
        let shifts = staffing::simulate_day(self.config, roster, saturday, rng);
        let labor_hours: f64 = shifts.iter().map(|s| s.hours).sum();
        let clinical_cost: f64 = shifts
            .iter()
            .filter(|s| s.member.role.is_clinical())
            .map(|s| s.labor_cost)
            .sum();
        let admin_cost: f64 = shifts
            .iter()
            .filter(|s| s.member.role == StaffRole::Admin)
            .map(|s| s.labor_cost)
            .sum();
        out.staff_hours
            .extend(staffing::shift_records(location, date, &shifts));

        // Equipment
        let expected = location.expected_daily_appointments * day_scale;
        let volume_ratio = if expected > 0.0 {
            volume.completed as f64 / expected
        } else {
            1.0
        };
        let usage: Vec<EquipmentUsageRecord> = items
            .iter()
            .map(|item| equipment::daily_usage(item, location, date, open_minutes, volume_ratio, rng))
            .collect();
        let equipment_utilization = if usage.is_empty() {
            0.0
        } else {
            usage.iter().map(|u| u.utilization_rate).sum::<f64>() / usage.len() as f64
        };
        out.equipment_usage.extend(usage);

        // Chairs
        let chair_utilization = if capacity_minutes > 0.0 {
            (metrics.chair_minutes.value / capacity_minutes).min(1.0)
        } else {
            0.0
        };
        let avg_wait_time = (8.0 + 14.0 * chair_utilization) * rng.uniform(0.8, 1.2);

        // Money
        let revenue = round_cents(metrics.revenue.value);
        let collections = round_cents(metrics.collections.value);
        let collection_rate = if revenue > 0.0 { collections / revenue } else { 0.0 };

        // Claims: submitted count may come from the index; processing
        // performance follows the trend line.
        let submitted = metrics.claims_submitted.value;
        let processing_days = calendar::interpolate(
            date,
            CLAIM_PROCESSING_TREND.0,
            CLAIM_PROCESSING_TREND.1,
        ) * rng.uniform(0.9, 1.1);
        let denial_rate =
            calendar::interpolate(date, DENIAL_RATE_TREND.0, DENIAL_RATE_TREND.1) * rng.uniform(0.85, 1.15);
        let processed = (submitted as f64 * rng.uniform(0.85, 1.0)).round() as u32;
        let denied = (processed as f64 * denial_rate).round() as u32;
        let aging = claims_aging(submitted, date, rng);

        // Treatment plans
        let plan_rate = (calendar::interpolate(date, PLAN_COMPLETION_TREND.0, PLAN_COMPLETION_TREND.1)
            + rng.uniform(-0.03, 0.03))
        .clamp(0.0, 1.0);
        let plans = plan_stages(location.chairs, plan_rate, rng);

        let capacity_appointments =
            (location.expected_daily_appointments * day_scale * 1.25).round() as u32;
        let rate_of = |n: u32| {
            if volume.scheduled > 0 {
                round_ratio(n as f64 / volume.scheduled as f64)
            } else {
                0.0
            }
        };

        OperationsRecord {
            date,
            location_id: location.location_id.clone(),
            location_name: location.name.clone(),
            day_of_week: calendar::weekday_name(date).to_string(),
            month_name: calendar::month_name(date.month()).to_string(),
            is_saturday: u8::from(saturday),
            scheduled_appointments: volume.scheduled,
            actual_appointments: volume.completed,
            appointment_capacity: capacity_appointments.max(volume.scheduled),
            cancellation_count: volume.canceled,
            no_show_count: volume.no_show,
            rescheduled_count: volume.rescheduled,
            cancellation_rate: rate_of(volume.canceled),
            no_show_rate: rate_of(volume.no_show),
            total_patients_seen: patients.seen,
            new_patient_count: patients.new,
            returning_patient_count: patients.seen.saturating_sub(patients.new),
            target_new_patients: (location.target_new_patients as f64 * day_scale).round() as u32,
            chair_count: location.chairs,
            chair_capacity_hours: round_cents(capacity_minutes / 60.0),
            used_chair_hours: round_cents(metrics.chair_minutes.value / 60.0),
            chair_utilization: round_ratio(chair_utilization),
            target_chair_utilization: location.target_chair_utilization,
            staff_on_duty: shifts.len() as u32,
            total_labor_hours: labor_hours,
            clinical_labor_cost: round_cents(clinical_cost),
            admin_labor_cost: round_cents(admin_cost),
            labor_cost: round_cents(clinical_cost + admin_cost),
            patients_per_labor_hour: if labor_hours > 0.0 {
                round_ratio(patients.seen as f64 / labor_hours)
            } else {
                0.0
            },
            revenue,
            collections,
            actual_collection_rate: round_ratio(collection_rate),
            target_collection_rate: location.target_collection_rate,
            revenue_per_hour: if open_minutes > 0.0 {
                round_cents(revenue / (open_minutes / 60.0))
            } else {
                0.0
            },
            avg_wait_time: (avg_wait_time * 10.0).round() / 10.0,
            equipment_utilization: round_ratio(equipment_utilization),
            insurance_claims_submitted: submitted,
            insurance_claims_processed: processed,
            insurance_claims_paid: processed.saturating_sub(denied),
            insurance_claims_denied: denied,
            avg_days_to_payment: (processing_days * 10.0).round() / 10.0,
            claims_aging_0_30: aging[0],
            claims_aging_31_60: aging[1],
            claims_aging_61_90: aging[2],
            claims_aging_90_plus: aging[3],
            treatment_plans_not_started: plans.not_started,
            treatment_plans_in_progress: plans.in_progress,
            treatment_plans_completed: plans.completed,
            treatment_plans_delayed: plans.delayed,
            treatment_plan_completion_rate: round_ratio(plan_rate),
        }
    }
}

/// Outstanding claims split into 0-30 / 31-60 / 61-90 / 90+ day buckets.
/// The book shifts toward the young bucket as processing speeds up.
fn claims_aging(submitted_today: u32, date: NaiveDate, rng: &mut StageRng) -> [u32; 4] {
    let p = calendar::trend_progress(date);
    let outstanding = submitted_today as f64 * rng.uniform(2.5, 4.0);
    let shares = [0.50 + 0.20 * p, 0.25 - 0.05 * p, 0.15 - 0.08 * p, 0.10 - 0.07 * p];
    shares.map(|s| (outstanding * s).round() as u32)
}

#[derive(Debug, Clone, Copy)]
struct PlanStages {
    not_started: u32,
    in_progress: u32,
    completed: u32,
    delayed: u32,
}

fn plan_stages(chairs: u32, completion_rate: f64, rng: &mut StageRng) -> PlanStages {
    let total = (chairs as f64 * rng.uniform(5.0, 8.0)).round() as u32;
    let in_progress = (total as f64 * rng.uniform(0.35, 0.45)).round() as u32;
    let completed = (total as f64 * completion_rate * rng.uniform(0.25, 0.35)).round() as u32;
    let delayed = (total as f64 * (1.0 - completion_rate) * rng.uniform(0.2, 0.4)).round() as u32;
    PlanStages {
        not_started: total.saturating_sub(in_progress + completed + delayed),
        in_progress,
        completed,
        delayed,
    }
}
