//! Appointment generator: the leaf stage of the pipeline.
//!
//! Produces one row per (visit, procedure) from the patient population
//! and the static catalog. Reads nothing upstream.
//!
//! Visit skeletons (patient, date, time, location, provider, status)
//! are drawn first and then processed in chronological order, so the
//! recall and treatment-plan state only ever moves forward in time.

use crate::{
    config::{LocationConfig, PipelineConfig, ProcedureCategory, ProcedureConfig, ProviderConfig},
    error::{PipelineError, PipelineResult},
    patient::{AgeBand, Patient},
    rng::StageRng,
    types::round_cents,
    visit_state::VisitState,
    calendar,
};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Exponent of the frequent-visitor bias: index = floor(U^1.5 * N).
pub const PATIENT_BIAS_EXPONENT: f64 = 1.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Completed,
    #[serde(rename = "No-Show")]
    NoShow,
    Canceled,
    Rescheduled,
}

impl AppointmentStatus {
    const ALL: [AppointmentStatus; 4] = [Self::Completed, Self::NoShow, Self::Canceled, Self::Rescheduled];
    const WEIGHTS: [f64; 4] = [0.85, 0.05, 0.07, 0.03];

    fn draw(rng: &mut StageRng) -> Self {
        Self::ALL[rng.weighted_index(&Self::WEIGHTS)]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Pending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ClaimStatus {
    Paid,
    Pending,
    Denied,
}

const PAYMENT_METHODS: [&str; 5] = ["Credit Card", "Debit Card", "Cash", "Check", "HSA/FSA"];
const DISCOUNT_RATES: [f64; 3] = [0.10, 0.20, 0.30];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRecord {
    #[serde(rename = "Visit_ID")]
    pub visit_id: String,
    #[serde(rename = "Patient_ID")]
    pub patient_id: String,
    #[serde(rename = "Patient_Name")]
    pub patient_name: String,
    #[serde(rename = "Patient_Age")]
    pub patient_age: u32,
    #[serde(rename = "Age_Segment")]
    pub age_segment: String,
    #[serde(rename = "Patient_Gender")]
    pub patient_gender: String,
    #[serde(rename = "Insurance_Provider")]
    pub insurance_provider: String,
    #[serde(rename = "Is_New_Patient")]
    pub is_new_patient: u8,
    #[serde(rename = "Location_ID")]
    pub location_id: String,
    #[serde(rename = "Location_Name")]
    pub location_name: String,
    #[serde(rename = "Google_Rating")]
    pub google_rating: f64,
    #[serde(rename = "Provider_ID")]
    pub provider_id: String,
    #[serde(rename = "Provider_Name")]
    pub provider_name: String,
    #[serde(rename = "Provider_Specialty")]
    pub provider_specialty: String,
    #[serde(rename = "Date_of_Service")]
    pub date_of_service: NaiveDate,
    #[serde(rename = "Appointment_Time")]
    pub appointment_time: NaiveTime,
    #[serde(rename = "Day_of_Week")]
    pub day_of_week: String,
    #[serde(rename = "Appointment_Status")]
    pub appointment_status: AppointmentStatus,
    #[serde(rename = "Procedure_Code")]
    pub procedure_code: String,
    #[serde(rename = "Procedure_Description")]
    pub procedure_description: String,
    #[serde(rename = "Procedure_Category")]
    pub procedure_category: ProcedureCategory,
    #[serde(rename = "Appointment_Duration")]
    pub appointment_duration: u32,
    #[serde(rename = "Charged_Amount")]
    pub charged_amount: f64,
    #[serde(rename = "Insurance_Covered_Amount")]
    pub insurance_covered_amount: f64,
    #[serde(rename = "Patient_Responsibility")]
    pub patient_responsibility: f64,
    #[serde(rename = "Discount_Applied")]
    pub discount_applied: f64,
    #[serde(rename = "Out_of_Pocket")]
    pub out_of_pocket: f64,
    #[serde(rename = "Amount_Paid")]
    pub amount_paid: f64,
    #[serde(rename = "Payment_Status")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(rename = "Payment_Method")]
    pub payment_method: Option<String>,
    #[serde(rename = "Treatment_Plan_ID")]
    pub treatment_plan_id: Option<String>,
    #[serde(rename = "Treatment_Plan_Status")]
    pub treatment_plan_status: Option<String>,
    #[serde(rename = "Treatment_Plan_Creation_Date")]
    pub treatment_plan_creation_date: Option<NaiveDate>,
    #[serde(rename = "Treatment_Plan_Completion_Date")]
    pub treatment_plan_completion_date: Option<NaiveDate>,
    #[serde(rename = "Treatment_Plan_Completion_Rate")]
    pub treatment_plan_completion_rate: Option<f64>,
    #[serde(rename = "Estimated_Total_Cost")]
    pub estimated_total_cost: Option<f64>,
    #[serde(rename = "Insurance_Claim_ID")]
    pub insurance_claim_id: Option<String>,
    #[serde(rename = "Insurance_Claim_Submission_Date")]
    pub insurance_claim_submission_date: Option<NaiveDate>,
    #[serde(rename = "Insurance_Claim_Status")]
    pub insurance_claim_status: Option<ClaimStatus>,
    #[serde(rename = "Insurance_Claim_Status_Date")]
    pub insurance_claim_status_date: Option<NaiveDate>,
}

impl AppointmentRecord {
    pub fn is_completed(&self) -> bool {
        self.appointment_status == AppointmentStatus::Completed
    }

    /// Money actually received for the row: patient payment plus the
    /// insurer's share once the claim is paid.
    pub fn collected_amount(&self) -> f64 {
        let insurer = match self.insurance_claim_status {
            Some(ClaimStatus::Paid) => self.insurance_covered_amount,
            _ => 0.0,
        };
        self.amount_paid + insurer
    }
}

/// A drawn visit before procedures are attached.
#[derive(Debug, Clone)]
struct VisitSkeleton {
    patient_idx: usize,
    date: NaiveDate,
    time: NaiveTime,
    location_idx: usize,
    provider_idx: usize,
    status: AppointmentStatus,
}

/// The financial columns of one row.
#[derive(Debug, Clone, Default)]
struct RowFinancials {
    charged: f64,
    covered: f64,
    responsibility: f64,
    discount: f64,
    out_of_pocket: f64,
    paid: f64,
    payment_status: Option<PaymentStatus>,
    payment_method: Option<String>,
    claim_id: Option<String>,
    claim_submitted: Option<NaiveDate>,
    claim_status: Option<ClaimStatus>,
    claim_status_date: Option<NaiveDate>,
}

pub struct AppointmentGenerator<'a> {
    config: &'a PipelineConfig,
    claims_filed: u64,
}

impl<'a> AppointmentGenerator<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config, claims_filed: 0 }
    }

    /// Generate the full appointment table for one run.
    pub fn generate(
        &mut self,
        patients: &[Patient],
        state: &mut VisitState,
        rng: &mut StageRng,
    ) -> PipelineResult<Vec<AppointmentRecord>> {
        let config: &'a PipelineConfig = self.config;
        let g = &config.generation;
        if g.start_date > g.end_date {
            return Err(PipelineError::InvalidDateRange { start: g.start_date, end: g.end_date });
        }
        if patients.is_empty() {
            return Err(PipelineError::EmptyCatalog { what: "patients" });
        }
        if config.locations.is_empty() {
            return Err(PipelineError::EmptyCatalog { what: "locations" });
        }
        if config.providers.is_empty() {
            return Err(PipelineError::EmptyCatalog { what: "providers" });
        }
        if config.procedures.is_empty() {
            return Err(PipelineError::EmptyCatalog { what: "procedures" });
        }

        let mut skeletons: Vec<VisitSkeleton> =
            (0..g.num_records).map(|_| self.draw_visit(patients, rng)).collect();
        skeletons.sort_by_key(|s| (s.date, s.time));

        let mut seen_patients: HashSet<usize> = HashSet::new();
        let mut records = Vec::with_capacity(g.num_records * 2);
        for (n, visit) in skeletons.iter().enumerate() {
            let visit_id = format!("V{:07}", n + 1);
            let is_new = seen_patients.insert(visit.patient_idx);
            self.emit_visit(&visit_id, visit, &patients[visit.patient_idx], is_new, state, rng, &mut records);
        }

        records.sort_by_key(|r| (r.date_of_service, r.appointment_time));

        let completed = records.iter().filter(|r| r.is_completed()).count();
        log::info!(
            "appointments: {} visits, {} procedure rows ({} completed), {} plans opened, {} closed",
            skeletons.len(),
            records.len(),
            completed,
            state.plans_opened(),
            state.plans_closed()
        );
        Ok(records)
    }

    fn draw_visit(&self, patients: &[Patient], rng: &mut StageRng) -> VisitSkeleton {
        let g = &self.config.generation;
        let n = patients.len();
        let patient_idx =
            ((rng.next_f64().powf(PATIENT_BIAS_EXPONENT) * n as f64).floor() as usize).min(n - 1);
        let patient = &patients[patient_idx];

        let earliest = patient.registration_date.max(g.start_date).min(g.end_date);
        let span = (g.end_date - earliest).num_days();
        let date = earliest + Days::new(rng.int_between(0, span) as u64);

        let location_idx = rng.index(self.config.locations.len());
        let location = &self.config.locations[location_idx];
        let provider_idx = self.pick_provider(location, rng);
        let time = self.pick_time(location, date, rng);
        let status = AppointmentStatus::draw(rng);

        VisitSkeleton { patient_idx, date, time, location_idx, provider_idx, status }
    }

    /// Providers based at the location first, then anyone who covers it,
    /// then anyone at all.
    fn pick_provider(&self, location: &LocationConfig, rng: &mut StageRng) -> usize {
        let providers = &self.config.providers;
        let primary: Vec<usize> = (0..providers.len())
            .filter(|&i| providers[i].primary_location == location.location_id)
            .collect();
        if !primary.is_empty() {
            return *rng.pick(&primary);
        }
        let covering: Vec<usize> = (0..providers.len())
            .filter(|&i| providers[i].works_at(&location.location_id))
            .collect();
        if !covering.is_empty() {
            return *rng.pick(&covering);
        }
        rng.index(providers.len())
    }

    /// A 15-minute slot that starts at least an hour before closing.
    fn pick_time(&self, location: &LocationConfig, date: NaiveDate, rng: &mut StageRng) -> NaiveTime {
        let close = if calendar::is_saturday(date) {
            location.saturday_close_hour
        } else {
            location.close_hour
        };
        let first = location.open_hour * 4;
        let last = (close.saturating_sub(1) * 4).max(first);
        let slot = rng.int_between(first as i64, last as i64) as u32;
        NaiveTime::from_hms_opt(slot / 4, (slot % 4) * 15, 0).unwrap_or(NaiveTime::MIN)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_visit(
        &mut self,
        visit_id: &str,
        visit: &VisitSkeleton,
        patient: &Patient,
        is_new: bool,
        state: &mut VisitState,
        rng: &mut StageRng,
        out: &mut Vec<AppointmentRecord>,
    ) {
        let config: &'a PipelineConfig = self.config;
        let count = 1 + rng.weighted_index(&[0.6, 0.3, 0.1]);
        let mut chosen: Vec<&ProcedureConfig> = Vec::with_capacity(count);

        for _ in 0..count {
            let mut pick = None;
            for _attempt in 0..5 {
                let Some(candidate) = self.select_procedure(patient, visit.date, state, rng) else {
                    break;
                };
                if chosen.iter().all(|p| p.code != candidate.code) {
                    pick = Some(candidate);
                    break;
                }
            }
            let Some(procedure) = pick else { continue };
            if procedure.is_cleaning {
                state.record_cleaning(&patient.patient_id, visit.date);
            }
            chosen.push(procedure);
        }

        let location = &config.locations[visit.location_idx];
        let provider: &ProviderConfig = &config.providers[visit.provider_idx];
        let completed = visit.status == AppointmentStatus::Completed;

        for procedure in chosen {
            let fin = if completed {
                self.derive_financials(procedure, patient, visit.date, rng)
            } else {
                RowFinancials::default()
            };
            let plan = state.accrue_plan(
                &patient.patient_id,
                procedure.category,
                completed,
                visit.date,
                procedure.fee,
                rng,
            );

            out.push(AppointmentRecord {
                visit_id: visit_id.to_string(),
                patient_id: patient.patient_id.clone(),
                patient_name: patient.name.clone(),
                patient_age: patient.age,
                age_segment: patient.age_segment().to_string(),
                patient_gender: patient.gender.as_str().to_string(),
                insurance_provider: patient.insurance_provider.clone(),
                is_new_patient: u8::from(is_new),
                location_id: location.location_id.clone(),
                location_name: location.name.clone(),
                google_rating: location.google_rating,
                provider_id: provider.provider_id.clone(),
                provider_name: provider.name.clone(),
                provider_specialty: provider.specialty.clone(),
                date_of_service: visit.date,
                appointment_time: visit.time,
                day_of_week: calendar::weekday_name(visit.date).to_string(),
                appointment_status: visit.status,
                procedure_code: procedure.code.clone(),
                procedure_description: procedure.description.clone(),
                procedure_category: procedure.category,
                appointment_duration: procedure.duration_minutes,
                charged_amount: fin.charged,
                insurance_covered_amount: fin.covered,
                patient_responsibility: fin.responsibility,
                discount_applied: fin.discount,
                out_of_pocket: fin.out_of_pocket,
                amount_paid: fin.paid,
                payment_status: fin.payment_status,
                payment_method: fin.payment_method,
                treatment_plan_id: plan.as_ref().map(|p| p.plan_id.clone()),
                treatment_plan_status: plan.as_ref().map(|p| p.status.as_str().to_string()),
                treatment_plan_creation_date: plan.as_ref().map(|p| p.created),
                treatment_plan_completion_date: plan.as_ref().and_then(|p| p.completed_on),
                treatment_plan_completion_rate: plan
                    .as_ref()
                    .map(|p| (p.completion_rate * 100.0).round() / 100.0),
                estimated_total_cost: plan.as_ref().map(|p| round_cents(p.estimated_total_cost)),
                insurance_claim_id: fin.claim_id,
                insurance_claim_submission_date: fin.claim_submitted,
                insurance_claim_status: fin.claim_status,
                insurance_claim_status_date: fin.claim_status_date,
            });
        }
    }

    /// Age-banded procedure draw followed by the recall gate.
    /// Returns None only when the gate rejects and no non-cleaning
    /// procedure exists in the catalog.
    fn select_procedure(
        &self,
        patient: &Patient,
        date: NaiveDate,
        state: &VisitState,
        rng: &mut StageRng,
    ) -> Option<&'a ProcedureConfig> {
        let config: &'a PipelineConfig = self.config;
        let catalog: &'a [ProcedureConfig] = &config.procedures;
        let from_codes = |codes: &[String], rng: &mut StageRng| -> Option<&'a ProcedureConfig> {
            if codes.is_empty() {
                return None;
            }
            let code = rng.pick(codes);
            catalog.iter().find(|p| &p.code == code)
        };

        let biased = match patient.age_band() {
            AgeBand::Child if rng.chance(0.70) => from_codes(&config.pediatric_codes, rng),
            AgeBand::Senior if rng.chance(0.60) => from_codes(&config.senior_codes, rng),
            AgeBand::Adult if rng.chance(0.60) => {
                let common = &catalog[..catalog.len().min(10)];
                Some(rng.pick(common))
            }
            _ => None,
        };
        let procedure = match biased {
            Some(p) => p,
            None => rng.pick(catalog),
        };

        if procedure.is_cleaning && !state.cleaning_allowed(&patient.patient_id, date) {
            let others: Vec<&'a ProcedureConfig> = catalog.iter().filter(|p| !p.is_cleaning).collect();
            if others.is_empty() {
                return None;
            }
            return Some(*rng.pick(&others));
        }
        Some(procedure)
    }

    fn derive_financials(
        &mut self,
        procedure: &ProcedureConfig,
        patient: &Patient,
        date: NaiveDate,
        rng: &mut StageRng,
    ) -> RowFinancials {
        let charged = round_cents(procedure.fee * rng.uniform(0.9, 1.1));

        let carrier = if patient.is_insured() {
            self.config.carrier(&patient.insurance_provider)
        } else {
            None
        };
        let covered = match carrier {
            Some(c) => {
                let rate = (c.coverage_rate * rng.uniform(0.9, 1.1)).clamp(0.5, 0.95);
                round_cents(charged * rate)
            }
            None => 0.0,
        };
        let responsibility = round_cents(charged - covered);

        let discount = if rng.chance(0.15) {
            round_cents(responsibility * *rng.pick(&DISCOUNT_RATES))
        } else {
            0.0
        };
        let out_of_pocket = round_cents(responsibility - discount);

        let (paid, payment_status, payment_method) = if rng.chance(0.95) {
            (out_of_pocket, PaymentStatus::Paid, Some(rng.pick(&PAYMENT_METHODS).to_string()))
        } else {
            (0.0, PaymentStatus::Pending, None)
        };

        let mut fin = RowFinancials {
            charged,
            covered,
            responsibility,
            discount,
            out_of_pocket,
            paid,
            payment_status: Some(payment_status),
            payment_method,
            ..RowFinancials::default()
        };

        if carrier.is_some() {
            self.claims_filed += 1;
            let submitted = date + Days::new(rng.int_between(0, 3) as u64);
            let status = [ClaimStatus::Paid, ClaimStatus::Pending, ClaimStatus::Denied]
                [rng.weighted_index(&[0.95, 0.03, 0.02])];
            let status_date = match status {
                ClaimStatus::Paid => date + Days::new(rng.int_between(15, 45) as u64),
                ClaimStatus::Denied => date + Days::new(rng.int_between(10, 30) as u64),
                ClaimStatus::Pending => submitted,
            };
            fin.claim_id = Some(format!("CLM{:07}", self.claims_filed));
            fin.claim_submitted = Some(submitted);
            fin.claim_status = Some(status);
            fin.claim_status_date = Some(status_date);
        }
        fin
    }
}
