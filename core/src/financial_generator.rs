//! Financial generator: monthly P&L, AR and ratio roll-ups.
//!
//! One row per (location, month) from the later of the location's
//! opening and the run start. Two month indices feed it: appointments
//! (revenue, mix, visit counts) and operations (labor, utilization,
//! plan completion). Each metric derives from whichever index holds
//! data for its key and synthesizes otherwise. A second pass fills
//! month-over-month and year-over-year deltas.
//!
//! Depends on: Pat_App_Data, Operations_Data (both optional).

use crate::{
    calendar::{self, MonthMix},
    config::{LocationConfig, PayorClass, PipelineConfig, ProcedureCategory},
    error::PipelineResult,
    index::{
        derive_or_synthesize, AppointmentBucket, AppointmentMonthIndex, OperationsBucket,
        OperationsMonthIndex, SourceTally, Sourced,
    },
    rng::StageRng,
    types::{round_cents, round_ratio, MonthKey},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Spread applied to the default revenue split weights.
pub const REVENUE_SPLIT_JITTER: f64 = 0.15;
/// Case acceptance: 2020 baseline → 2025 target.
pub const CASE_ACCEPTANCE_TREND: (f64, f64) = (0.60, 0.75);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Month_Name")]
    pub month_name: String,
    #[serde(rename = "Quarter")]
    pub quarter: u32,
    #[serde(rename = "Location_ID")]
    pub location_id: String,
    #[serde(rename = "Location_Name")]
    pub location_name: String,

    #[serde(rename = "Billed_Revenue")]
    pub billed_revenue: f64,
    #[serde(rename = "Collected_Revenue")]
    pub collected_revenue: f64,
    #[serde(rename = "Total_Revenue")]
    pub total_revenue: f64,
    #[serde(rename = "Collection_Rate")]
    pub collection_rate: f64,

    #[serde(rename = "Revenue_Preventive")]
    pub revenue_preventive: f64,
    #[serde(rename = "Revenue_Diagnostic")]
    pub revenue_diagnostic: f64,
    #[serde(rename = "Revenue_Restorative")]
    pub revenue_restorative: f64,
    #[serde(rename = "Revenue_Endodontic")]
    pub revenue_endodontic: f64,
    #[serde(rename = "Revenue_Periodontic")]
    pub revenue_periodontic: f64,
    #[serde(rename = "Revenue_Prosthodontic")]
    pub revenue_prosthodontic: f64,
    #[serde(rename = "Revenue_Oral_Surgery")]
    pub revenue_oral_surgery: f64,
    #[serde(rename = "Revenue_Orthodontic")]
    pub revenue_orthodontic: f64,
    #[serde(rename = "Revenue_Implant")]
    pub revenue_implant: f64,
    #[serde(rename = "Revenue_Adjunctive")]
    pub revenue_adjunctive: f64,

    #[serde(rename = "Payor_PPO")]
    pub revenue_ppo: f64,
    #[serde(rename = "Payor_DMO")]
    pub revenue_dmo: f64,
    #[serde(rename = "Payor_Government")]
    pub revenue_government: f64,
    #[serde(rename = "Payor_Self_Pay")]
    pub revenue_self_pay: f64,

    #[serde(rename = "Labor_Clinical")]
    pub expense_clinical_labor: f64,
    #[serde(rename = "Labor_Admin")]
    pub expense_admin_labor: f64,
    #[serde(rename = "Supplies_Dental")]
    pub expense_dental_supplies: f64,
    #[serde(rename = "Lab_Fees")]
    pub expense_lab_fees: f64,
    #[serde(rename = "Rent_Lease")]
    pub expense_rent: f64,
    #[serde(rename = "Utilities")]
    pub expense_utilities: f64,
    #[serde(rename = "Equipment_Costs")]
    pub expense_equipment_lease: f64,
    #[serde(rename = "Equipment_Maintenance")]
    pub expense_equipment_maintenance: f64,
    #[serde(rename = "Marketing")]
    pub expense_marketing: f64,
    #[serde(rename = "Insurance")]
    pub expense_insurance: f64,
    #[serde(rename = "Software_IT")]
    pub expense_software_it: f64,
    #[serde(rename = "Professional_Fees")]
    pub expense_professional_fees: f64,
    #[serde(rename = "Supplies_Office")]
    pub expense_office_supplies: f64,
    #[serde(rename = "Continuing_Education")]
    pub expense_continuing_education: f64,
    #[serde(rename = "Depreciation")]
    pub expense_depreciation: f64,
    #[serde(rename = "Merchant_Fees")]
    pub expense_merchant_fees: f64,
    #[serde(rename = "Total_Expenses")]
    pub total_expenses: f64,

    #[serde(rename = "EBITDA")]
    pub ebitda: f64,
    #[serde(rename = "EBITDA_Margin")]
    pub ebitda_margin: f64,
    #[serde(rename = "Cash_Flow")]
    pub cash_flow: f64,

    #[serde(rename = "AR_Current")]
    pub ar_current: f64,
    #[serde(rename = "AR_31_60")]
    pub ar_31_60: f64,
    #[serde(rename = "AR_61_90")]
    pub ar_61_90: f64,
    #[serde(rename = "AR_91_Plus")]
    pub ar_91_plus: f64,
    #[serde(rename = "Total_AR")]
    pub total_ar: f64,
    #[serde(rename = "DSO")]
    pub dso: f64,

    #[serde(rename = "Total_Patient_Visits")]
    pub total_patient_visits: u32,
    #[serde(rename = "New_Patients")]
    pub new_patients: u32,
    #[serde(rename = "Revenue_Per_Patient")]
    pub revenue_per_patient: f64,
    #[serde(rename = "Revenue_Per_Square_Foot")]
    pub revenue_per_square_foot: f64,
    #[serde(rename = "Chair_Capacity")]
    pub chair_capacity: u32,
    #[serde(rename = "Labor_Cost_Percentage")]
    pub labor_cost_percentage: f64,
    #[serde(rename = "Supply_Cost_Percentage")]
    pub supply_cost_percentage: f64,
    #[serde(rename = "Marketing_ROI")]
    pub marketing_roi: f64,
    #[serde(rename = "Case_Acceptance_Rate")]
    pub case_acceptance_rate: f64,
    #[serde(rename = "Treatment_Completion_Rate")]
    pub treatment_completion_rate: f64,
    #[serde(rename = "Chair_Utilization")]
    pub chair_utilization: f64,
    #[serde(rename = "Total_Claims_Submitted")]
    pub total_claims_submitted: u32,
    #[serde(rename = "Claims_Denied")]
    pub claims_denied: u32,
    #[serde(rename = "Denial_Rate")]
    pub denial_rate: f64,

    #[serde(rename = "Revenue_MoM_Change")]
    pub revenue_mom_change: f64,
    #[serde(rename = "Revenue_YoY_Change")]
    pub revenue_yoy_change: f64,
    #[serde(rename = "EBITDA_MoM_Change")]
    pub ebitda_mom_change: f64,
    #[serde(rename = "EBITDA_YoY_Change")]
    pub ebitda_yoy_change: f64,
}

impl FinancialRecord {
    pub fn key(&self) -> MonthKey {
        (self.location_id.clone(), self.year, self.month)
    }

    pub fn category_revenue(&self) -> [f64; 10] {
        [
            self.revenue_preventive,
            self.revenue_diagnostic,
            self.revenue_restorative,
            self.revenue_endodontic,
            self.revenue_periodontic,
            self.revenue_prosthodontic,
            self.revenue_oral_surgery,
            self.revenue_orthodontic,
            self.revenue_implant,
            self.revenue_adjunctive,
        ]
    }

    pub fn payor_revenue(&self) -> [f64; 4] {
        [self.revenue_ppo, self.revenue_dmo, self.revenue_government, self.revenue_self_pay]
    }

    pub fn expense_lines(&self) -> [f64; 16] {
        [
            self.expense_clinical_labor,
            self.expense_admin_labor,
            self.expense_dental_supplies,
            self.expense_lab_fees,
            self.expense_rent,
            self.expense_utilities,
            self.expense_equipment_lease,
            self.expense_equipment_maintenance,
            self.expense_marketing,
            self.expense_insurance,
            self.expense_software_it,
            self.expense_professional_fees,
            self.expense_office_supplies,
            self.expense_continuing_education,
            self.expense_depreciation,
            self.expense_merchant_fees,
        ]
    }
}

/// Annual growth rates for one location, one per age bracket.
#[derive(Debug, Clone, Copy)]
struct GrowthRates {
    young: f64,
    maturing: f64,
    mature: f64,
}

impl GrowthRates {
    fn draw(rng: &mut StageRng) -> Self {
        Self {
            young: rng.uniform(0.15, 0.25),
            maturing: rng.uniform(0.08, 0.15),
            mature: rng.uniform(0.03, 0.08),
        }
    }

    /// Under 2 years open grows fast, 2 to 4 moderately, older slowly.
    const BRACKETS: [(f64, f64); 3] = [(0.0, 2.0), (2.0, 4.0), (4.0, f64::INFINITY)];

    fn rates(&self) -> [f64; 3] {
        [self.young, self.maturing, self.mature]
    }

    /// Compounded growth between two ages (years open). Each bracket's
    /// rate applies only to the time spent inside it, so the factor never
    /// falls as a location moves into a slower bracket.
    fn factor(&self, from_age: f64, to_age: f64) -> f64 {
        Self::BRACKETS
            .iter()
            .zip(self.rates())
            .map(|(&(lo, hi), rate)| {
                let span = (to_age.min(hi) - from_age.max(lo)).max(0.0);
                (1.0 + rate).powf(span)
            })
            .product()
    }
}

/// Split `total` proportionally to `weights`, rounded to cents. Rounding
/// drift lands on the largest part so the parts sum to `total`.
pub fn split_total(total: f64, weights: &[f64]) -> Vec<f64> {
    if weights.is_empty() {
        return Vec::new();
    }
    let sum: f64 = weights.iter().sum();
    let mut parts: Vec<f64> = if sum > 0.0 {
        weights.iter().map(|w| round_cents(total * w / sum)).collect()
    } else {
        vec![round_cents(total / weights.len() as f64); weights.len()]
    };
    let drift = round_cents(total - parts.iter().sum::<f64>());
    if drift != 0.0 {
        let largest = parts
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        parts[largest] = round_cents(parts[largest] + drift);
    }
    parts
}

/// Percentage change, 0 when there is no base to compare against.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        ((current - previous) / previous.abs() * 10_000.0).round() / 100.0
    }
}

fn take<T>(tally: &mut SourceTally, metric: Sourced<T>) -> T {
    tally.record(&metric);
    metric.value
}

pub struct FinancialGenerator<'a> {
    config: &'a PipelineConfig,
    appointments: &'a AppointmentMonthIndex,
    operations: &'a OperationsMonthIndex,
    pub tally: SourceTally,
}

impl<'a> FinancialGenerator<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        appointments: &'a AppointmentMonthIndex,
        operations: &'a OperationsMonthIndex,
    ) -> Self {
        Self { config, appointments, operations, tally: SourceTally::default() }
    }

    pub fn generate(&mut self, rng: &mut StageRng) -> PipelineResult<Vec<FinancialRecord>> {
        let config = self.config;
        let g = &config.generation;
        let mut rows = Vec::new();

        for location in &config.locations {
            let first = g.start_date.max(location.opened_date);
            if first > g.end_date {
                log::debug!("financials {}: opens after the run window", location.location_id);
                continue;
            }
            let growth = GrowthRates::draw(rng);
            let months = calendar::month_starts(first, g.end_date);
            for month_start in &months {
                rows.push(self.generate_month(location, *month_start, first, growth, rng));
            }
            log::debug!("financials {}: {} months", location.location_id, months.len());
        }

        apply_comparatives(&mut rows);

        log::info!(
            "financials: {} monthly rows; metrics derived={} synthetic={}",
            rows.len(),
            self.tally.derived,
            self.tally.synthetic
        );
        Ok(rows)
    }

    fn generate_month(
        &mut self,
        location: &LocationConfig,
        month_start: NaiveDate,
        synthesis_start: NaiveDate,
        growth: GrowthRates,
        rng: &mut StageRng,
    ) -> FinancialRecord {
        let config = self.config;
        let (appointments, operations) = (self.appointments, self.operations);
        let key: MonthKey = (location.location_id.clone(), month_start.year(), month_start.month());
        let appt: Option<&AppointmentBucket> = if appointments.has_index_entry(&key) {
            appointments.get(&key)
        } else {
            None
        };
        let ops: Option<&OperationsBucket> = if operations.has_index_entry(&key) {
            operations.get(&key)
        } else {
            None
        };
        let ops_days = ops.filter(|o| o.days > 0);
        let mix = MonthMix::for_month(month_start, &config.holidays);
        let tally = &mut self.tally;

        // Revenue
        let billed = take(
            tally,
            derive_or_synthesize(appt.map(|a| a.charged).filter(|c| *c > 0.0), || {
                let (lo, hi) = location.tier.base_monthly_revenue();
                let age_at = |date| calendar::years_between(location.opened_date, date).max(0.0);
                rng.uniform(lo, hi)
                    * calendar::seasonal_factor(month_start, &config.holidays)
                    * growth.factor(age_at(synthesis_start), age_at(month_start))
            }),
        );
        let billed = round_cents(billed);

        let collected = take(
            tally,
            derive_or_synthesize(
                appt.filter(|a| a.charged > 0.0).map(|a| a.collected),
                || match ops_days.filter(|o| o.avg_collection_rate() > 0.0) {
                    Some(o) => billed * o.avg_collection_rate(),
                    None => {
                        billed * (location.target_collection_rate * rng.uniform(0.95, 1.02)).min(1.0)
                    }
                },
            ),
        );
        let collected = round_cents(collected);
        let total_revenue = billed;
        let collection_rate = if billed > 0.0 { collected / billed } else { 0.0 };

        // Category and payor mix
        let category_weights = take(
            tally,
            derive_or_synthesize(
                appt.filter(|a| a.category_total() > 0).map(|a| {
                    ProcedureCategory::ALL
                        .iter()
                        .map(|c| a.category_counts.get(c).copied().unwrap_or(0) as f64)
                        .collect::<Vec<_>>()
                }),
                || {
                    ProcedureCategory::ALL
                        .iter()
                        .map(|c| rng.jitter(c.default_revenue_weight(), REVENUE_SPLIT_JITTER))
                        .collect()
                },
            ),
        );
        let categories = split_total(total_revenue, &category_weights);

        let payor_weights = take(
            tally,
            derive_or_synthesize(
                appt.filter(|a| a.payor_total() > 0).map(|a| {
                    PayorClass::ALL
                        .iter()
                        .map(|p| a.payor_counts.get(p).copied().unwrap_or(0) as f64)
                        .collect::<Vec<_>>()
                }),
                || {
                    PayorClass::ALL
                        .iter()
                        .map(|p| rng.jitter(p.default_revenue_weight(), REVENUE_SPLIT_JITTER))
                        .collect()
                },
            ),
        );
        let payors = split_total(total_revenue, &payor_weights);

        // Expenses
        let clinical_labor = round_cents(take(
            tally,
            derive_or_synthesize(
                ops_days.map(|o| o.clinical_labor_cost).filter(|c| *c > 0.0),
                || total_revenue * rng.uniform(0.18, 0.22),
            ),
        ));
        let admin_labor = round_cents(take(
            tally,
            derive_or_synthesize(
                ops_days.map(|o| o.admin_labor_cost).filter(|c| *c > 0.0),
                || total_revenue * rng.uniform(0.06, 0.08),
            ),
        ));
        let chairs = location.chairs as f64;
        let dental_supplies = round_cents(total_revenue * rng.uniform(0.05, 0.07));
        let lab_fees = round_cents(total_revenue * rng.uniform(0.04, 0.06));
        let rent = round_cents(rng.jitter(location.monthly_rent, 0.02));
        let utilities = round_cents(location.square_feet * rng.uniform(0.25, 0.35));
        let equipment_lease = round_cents(chairs * rng.uniform(450.0, 650.0));
        let equipment_maintenance = round_cents(chairs * rng.uniform(120.0, 220.0));
        let marketing = round_cents(rng.jitter(location.monthly_marketing_budget, 0.15));
        let insurance = round_cents(total_revenue * rng.uniform(0.015, 0.025));
        let software_it = round_cents(800.0 + chairs * rng.uniform(150.0, 250.0));
        let professional_fees = round_cents(total_revenue * rng.uniform(0.01, 0.02));
        let office_supplies = round_cents(total_revenue * rng.uniform(0.005, 0.01));
        let continuing_education = round_cents(rng.uniform(500.0, 2_000.0));
        let depreciation = round_cents(chairs * rng.uniform(300.0, 450.0));
        let merchant_fees = round_cents(collected * rng.uniform(0.02, 0.03));

        let expenses = [
            clinical_labor,
            admin_labor,
            dental_supplies,
            lab_fees,
            rent,
            utilities,
            equipment_lease,
            equipment_maintenance,
            marketing,
            insurance,
            software_it,
            professional_fees,
            office_supplies,
            continuing_education,
            depreciation,
            merchant_fees,
        ];
        let total_expenses = round_cents(expenses.iter().sum());
        let ebitda = round_cents(total_revenue - total_expenses);
        let cash_flow = round_cents(collected - (total_expenses - depreciation));

        // Receivables
        let total_ar = round_cents(
            (billed - collected).max(0.0) + billed * rng.uniform(0.25, 0.40),
        );
        let progress = calendar::trend_progress(month_start);
        let ar_shares = [
            rng.jitter(0.55 + 0.10 * progress, 0.05),
            rng.jitter(0.22 - 0.03 * progress, 0.10),
            rng.jitter(0.13 - 0.04 * progress, 0.10),
            rng.jitter(0.10 - 0.03 * progress, 0.10),
        ];
        let ar = split_total(total_ar, &ar_shares);
        let days_in_month = calendar::last_of_month(month_start).day() as f64;
        let dso = if billed > 0.0 { total_ar / (billed / days_in_month) } else { 0.0 };

        // Volume
        let visits = take(
            tally,
            derive_or_synthesize(
                appt.map(|a| a.completed_visit_count())
                    .filter(|v| *v > 0)
                    .or_else(|| ops_days.map(|o| o.actual_appointments).filter(|v| *v > 0)),
                || {
                    (mix.effective_days() * location.expected_daily_appointments * 0.85 * rng.uniform(0.9, 1.1))
                        .round() as u32
                },
            ),
        );
        let new_patients = take(
            tally,
            derive_or_synthesize(
                appt.filter(|a| a.completed_visit_count() > 0)
                    .map(|a| a.new_patient_count())
                    .or_else(|| ops_days.map(|o| o.new_patients)),
                || {
                    (mix.effective_days() * location.target_new_patients as f64 * rng.uniform(0.8, 1.2))
                        .round() as u32
                },
            ),
        );
        let revenue_per_patient = if visits > 0 { total_revenue / visits as f64 } else { 0.0 };

        // Rates
        let case_acceptance = (calendar::interpolate(
            month_start,
            CASE_ACCEPTANCE_TREND.0,
            CASE_ACCEPTANCE_TREND.1,
        ) + rng.uniform(-0.03, 0.03))
        .clamp(0.0, 1.0);
        let treatment_completion = take(
            tally,
            derive_or_synthesize(
                ops_days.map(|o| o.avg_plan_completion_rate()).filter(|r| *r > 0.0),
                || (calendar::interpolate(month_start, 0.65, 0.85) + rng.uniform(-0.03, 0.03)).clamp(0.0, 1.0),
            ),
        );
        let chair_utilization = take(
            tally,
            derive_or_synthesize(
                ops_days.map(|o| o.avg_chair_utilization()).filter(|u| *u > 0.0),
                || (location.target_chair_utilization * rng.uniform(0.9, 1.05)).min(1.0),
            ),
        );
        let claims_submitted = take(
            tally,
            derive_or_synthesize(
                appt.map(|a| a.claims_submitted)
                    .filter(|c| *c > 0)
                    .or_else(|| ops_days.map(|o| o.claims_submitted).filter(|c| *c > 0)),
                || (visits as f64 * 0.8 * rng.uniform(0.9, 1.1)).round() as u32,
            ),
        );
        let claims_denied = take(
            tally,
            derive_or_synthesize(
                appt.filter(|a| a.claims_submitted > 0)
                    .map(|a| a.claims_denied)
                    .or_else(|| ops_days.filter(|o| o.claims_submitted > 0).map(|o| o.claims_denied)),
                || {
                    (claims_submitted as f64 * calendar::interpolate(month_start, 0.10, 0.05) * rng.uniform(0.85, 1.15))
                        .round() as u32
                },
            ),
        );

        let share = |part: f64| if total_revenue > 0.0 { round_ratio(part / total_revenue) } else { 0.0 };

        FinancialRecord {
            date: month_start,
            year: month_start.year(),
            month: month_start.month(),
            month_name: calendar::month_name(month_start.month()).to_string(),
            quarter: calendar::quarter(month_start.month()),
            location_id: location.location_id.clone(),
            location_name: location.name.clone(),
            billed_revenue: billed,
            collected_revenue: collected,
            total_revenue,
            collection_rate: round_ratio(collection_rate),
            revenue_preventive: categories[0],
            revenue_diagnostic: categories[1],
            revenue_restorative: categories[2],
            revenue_endodontic: categories[3],
            revenue_periodontic: categories[4],
            revenue_prosthodontic: categories[5],
            revenue_oral_surgery: categories[6],
            revenue_orthodontic: categories[7],
            revenue_implant: categories[8],
            revenue_adjunctive: categories[9],
            revenue_ppo: payors[0],
            revenue_dmo: payors[1],
            revenue_government: payors[2],
            revenue_self_pay: payors[3],
            expense_clinical_labor: clinical_labor,
            expense_admin_labor: admin_labor,
            expense_dental_supplies: dental_supplies,
            expense_lab_fees: lab_fees,
            expense_rent: rent,
            expense_utilities: utilities,
            expense_equipment_lease: equipment_lease,
            expense_equipment_maintenance: equipment_maintenance,
            expense_marketing: marketing,
            expense_insurance: insurance,
            expense_software_it: software_it,
            expense_professional_fees: professional_fees,
            expense_office_supplies: office_supplies,
            expense_continuing_education: continuing_education,
            expense_depreciation: depreciation,
            expense_merchant_fees: merchant_fees,
            total_expenses,
            ebitda,
            ebitda_margin: share(ebitda),
            cash_flow,
            ar_current: ar[0],
            ar_31_60: ar[1],
            ar_61_90: ar[2],
            ar_91_plus: ar[3],
            total_ar,
            dso: (dso * 10.0).round() / 10.0,
            total_patient_visits: visits,
            new_patients,
            revenue_per_patient: round_cents(revenue_per_patient),
            revenue_per_square_foot: if location.square_feet > 0.0 {
                round_cents(total_revenue / location.square_feet)
            } else {
                0.0
            },
            chair_capacity: location.chairs,
            labor_cost_percentage: share(clinical_labor + admin_labor),
            supply_cost_percentage: share(dental_supplies + lab_fees),
            marketing_roi: if marketing > 0.0 {
                round_ratio((new_patients as f64 * revenue_per_patient - marketing) / marketing)
            } else {
                0.0
            },
            case_acceptance_rate: round_ratio(case_acceptance),
            treatment_completion_rate: round_ratio(treatment_completion),
            chair_utilization: round_ratio(chair_utilization),
            total_claims_submitted: claims_submitted,
            claims_denied,
            denial_rate: if claims_submitted > 0 {
                round_ratio(claims_denied as f64 / claims_submitted as f64)
            } else {
                0.0
            },
            revenue_mom_change: 0.0,
            revenue_yoy_change: 0.0,
            ebitda_mom_change: 0.0,
            ebitda_yoy_change: 0.0,
        }
    }
}

/// Fill MoM and YoY deltas by locating, for each row, the row of the
/// same location one month and one year earlier. Rows without a
/// counterpart keep 0.
pub fn apply_comparatives(rows: &mut [FinancialRecord]) {
    let by_key: HashMap<MonthKey, (f64, f64)> = rows
        .iter()
        .map(|r| (r.key(), (r.total_revenue, r.ebitda)))
        .collect();

    for row in rows.iter_mut() {
        let (py, pm) = calendar::previous_month(row.year, row.month);
        let location = row.location_id.clone();
        if let Some(&(revenue, ebitda)) = by_key.get(&(location.clone(), py, pm)) {
            row.revenue_mom_change = percent_change(row.total_revenue, revenue);
            row.ebitda_mom_change = percent_change(row.ebitda, ebitda);
        }
        if let Some(&(revenue, ebitda)) = by_key.get(&(location, row.year - 1, row.month)) {
            row.revenue_yoy_change = percent_change(row.total_revenue, revenue);
            row.ebitda_yoy_change = percent_change(row.ebitda, ebitda);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_total_sums_exactly() {
        let parts = split_total(1_000.01, &[1.0, 1.0, 1.0]);
        assert_eq!(parts.len(), 3);
        assert!((parts.iter().sum::<f64>() - 1_000.01).abs() < 1e-6);
    }

    #[test]
    fn split_total_with_zero_weights_is_even() {
        let parts = split_total(90.0, &[0.0, 0.0, 0.0]);
        assert_eq!(parts, vec![30.0, 30.0, 30.0]);
    }

    #[test]
    fn percent_change_handles_zero_base() {
        assert_eq!(percent_change(120.0, 100.0), 20.0);
        assert_eq!(percent_change(50.0, 0.0), 0.0);
        assert_eq!(percent_change(-50.0, -100.0), 50.0);
    }

    #[test]
    fn growth_factor_never_falls_across_brackets() {
        let growth = GrowthRates { young: 0.25, maturing: 0.08, mature: 0.03 };
        let mut previous = 1.0;
        for month in 0..96 {
            let factor = growth.factor(0.0, month as f64 / 12.0);
            assert!(factor >= previous, "factor fell at month {month}");
            previous = factor;
        }
        let expected = 1.25f64.powi(2) * 1.08f64.powi(2) * 1.03;
        assert!((growth.factor(0.0, 5.0) - expected).abs() < 1e-9);
        assert!((growth.factor(3.0, 5.0) - 1.08 * 1.03).abs() < 1e-9);
    }
}
