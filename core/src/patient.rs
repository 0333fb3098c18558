//! Synthetic patient population.

use crate::{
    config::{PipelineConfig, SELF_PAY},
    name_generator::{Gender, NameGenerator},
    rng::StageRng,
    types::PatientId,
};
use chrono::{Days, Months, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBand {
    Child,
    Adult,
    Senior,
}

#[derive(Debug, Clone)]
pub struct Patient {
    pub patient_id: PatientId,
    pub name: String,
    pub gender: Gender,
    pub age: u32,
    pub insurance_provider: String,
    pub registration_date: NaiveDate,
    pub active: bool,
}

impl Patient {
    pub fn is_insured(&self) -> bool {
        self.insurance_provider != SELF_PAY
    }

    /// Band driving procedure-selection bias.
    pub fn age_band(&self) -> AgeBand {
        if self.age < 18 {
            AgeBand::Child
        } else if self.age > 55 {
            AgeBand::Senior
        } else {
            AgeBand::Adult
        }
    }

    pub fn age_segment(&self) -> &'static str {
        match self.age {
            0..=17 => "Under 18",
            18..=34 => "18-34",
            35..=54 => "35-54",
            _ => "55+",
        }
    }
}

/// (min age, max age, share of population)
const AGE_BANDS: [(u32, u32, f64); 4] = [(3, 17, 0.20), (18, 34, 0.25), (35, 54, 0.30), (55, 88, 0.25)];

/// Generate the patient population for one run.
///
/// Registration dates fall between two years before the generation
/// window and 30 days before its end, so every patient has at least
/// a month in which to be seen.
pub fn generate_population(config: &PipelineConfig, rng: &mut StageRng) -> Vec<Patient> {
    let g = &config.generation;
    let reg_start = g
        .start_date
        .checked_sub_months(Months::new(24))
        .unwrap_or(g.start_date);
    let reg_end = g
        .end_date
        .checked_sub_days(Days::new(30))
        .unwrap_or(g.end_date)
        .max(reg_start);
    let reg_span = (reg_end - reg_start).num_days();

    let carrier_weights: Vec<f64> = config.carriers.iter().map(|c| c.weight).collect();
    let band_weights: Vec<f64> = AGE_BANDS.iter().map(|b| b.2).collect();

    let mut patients = Vec::with_capacity(g.num_patients);
    for i in 0..g.num_patients {
        let (gender, name) = NameGenerator::person(rng);
        let (lo, hi, _) = AGE_BANDS[rng.weighted_index(&band_weights)];
        let age = rng.int_between(lo as i64, hi as i64) as u32;

        let insurance_provider = if rng.chance(g.self_pay_share) {
            SELF_PAY.to_string()
        } else {
            config.carriers[rng.weighted_index(&carrier_weights)].name.clone()
        };

        let offset = rng.int_between(0, reg_span) as u64;
        let registration_date = reg_start + Days::new(offset);

        patients.push(Patient {
            patient_id: format!("P{:05}", i + 1),
            name,
            gender,
            age,
            insurance_provider,
            registration_date,
            active: rng.chance(0.95),
        });
    }
    log::info!("population: generated {} patients", patients.len());
    patients
}
