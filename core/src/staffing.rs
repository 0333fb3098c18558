//! Staff rosters and daily shift simulation.

use crate::{
    config::{LocationConfig, PipelineConfig, RoleConfig, StaffRole},
    name_generator::NameGenerator,
    rng::StageRng,
    types::{round_cents, EntityId, LocationId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmploymentType {
    #[serde(rename = "Full-Time")]
    FullTime,
    #[serde(rename = "Part-Time")]
    PartTime,
}

impl EmploymentType {
    /// Daily hour range before the Saturday adjustment.
    pub fn hour_range(&self) -> (f64, f64) {
        match self {
            Self::FullTime => (7.0, 9.0),
            Self::PartTime => (4.0, 6.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaffMember {
    pub staff_id: EntityId,
    pub name: String,
    pub role: StaffRole,
    pub employment: EmploymentType,
    pub hourly_rate: f64,
}

/// One staff member's worked day.
#[derive(Debug, Clone)]
pub struct Shift<'a> {
    pub member: &'a StaffMember,
    pub hours: f64,
    pub labor_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffHoursRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Location_ID")]
    pub location_id: String,
    #[serde(rename = "Location_Name")]
    pub location_name: String,
    #[serde(rename = "Staff_ID")]
    pub staff_id: String,
    #[serde(rename = "Staff_Name")]
    pub staff_name: String,
    #[serde(rename = "Staff_Role")]
    pub staff_role: StaffRole,
    #[serde(rename = "Employment_Type")]
    pub employment_type: EmploymentType,
    #[serde(rename = "Hours_Worked")]
    pub hours_worked: f64,
    #[serde(rename = "Hourly_Rate")]
    pub hourly_rate: f64,
    #[serde(rename = "Labor_Cost")]
    pub labor_cost: f64,
}

/// Every location's staff, built once per operations run.
#[derive(Debug, Default)]
pub struct Rosters {
    by_location: BTreeMap<LocationId, Vec<StaffMember>>,
}

impl Rosters {
    pub fn build(config: &PipelineConfig, rng: &mut StageRng) -> Self {
        let mut by_location = BTreeMap::new();
        for location in &config.locations {
            let mut members = Vec::new();
            for role in StaffRole::ALL {
                let Some(role_cfg) = config.role(role) else {
                    log::warn!("no staffing config for role {}; roster skipped", role.as_str());
                    continue;
                };
                for _ in 0..location.staff.size_for(role) {
                    let employment = if rng.chance(role_cfg.full_time_share) {
                        EmploymentType::FullTime
                    } else {
                        EmploymentType::PartTime
                    };
                    members.push(StaffMember {
                        staff_id: format!("{}-S{:03}", location.location_id, members.len() + 1),
                        name: NameGenerator::staff_name(role, rng),
                        role,
                        employment,
                        hourly_rate: round_cents(
                            rng.uniform(role_cfg.hourly_rate_min, role_cfg.hourly_rate_max),
                        ),
                    });
                }
            }
            log::debug!("roster {}: {} staff", location.location_id, members.len());
            by_location.insert(location.location_id.clone(), members);
        }
        Self { by_location }
    }

    pub fn for_location(&self, location_id: &str) -> &[StaffMember] {
        self.by_location
            .get(location_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Members of `role` working today: round(roster * working_fraction),
/// sampled without replacement.
fn working_today<'a>(
    members: &[&'a StaffMember],
    role_cfg: &RoleConfig,
    rng: &mut StageRng,
) -> Vec<&'a StaffMember> {
    let want = (members.len() as f64 * role_cfg.working_fraction).round() as usize;
    let mut picked = rng.sample_indices(members.len(), want);
    picked.sort_unstable();
    picked.into_iter().map(|i| members[i]).collect()
}

/// Simulate one day of shifts at a location. Saturday hours are halved.
pub fn simulate_day<'a>(
    config: &PipelineConfig,
    roster: &'a [StaffMember],
    is_saturday: bool,
    rng: &mut StageRng,
) -> Vec<Shift<'a>> {
    let mut shifts = Vec::new();
    for role in StaffRole::ALL {
        let Some(role_cfg) = config.role(role) else { continue };
        let members: Vec<&StaffMember> = roster.iter().filter(|m| m.role == role).collect();
        for member in working_today(&members, role_cfg, rng) {
            let (lo, hi) = member.employment.hour_range();
            let mut hours = rng.uniform(lo, hi);
            if is_saturday {
                hours /= 2.0;
            }
            let hours = (hours * 4.0).round() / 4.0;
            shifts.push(Shift {
                member,
                hours,
                labor_cost: round_cents(hours * member.hourly_rate),
            });
        }
    }
    shifts
}

pub fn shift_records(
    location: &LocationConfig,
    date: NaiveDate,
    shifts: &[Shift<'_>],
) -> Vec<StaffHoursRecord> {
    shifts
        .iter()
        .map(|s| StaffHoursRecord {
            date,
            location_id: location.location_id.clone(),
            location_name: location.name.clone(),
            staff_id: s.member.staff_id.clone(),
            staff_name: s.member.name.clone(),
            staff_role: s.member.role,
            employment_type: s.member.employment,
            hours_worked: s.hours,
            hourly_rate: s.member.hourly_rate,
            labor_cost: s.labor_cost,
        })
        .collect()
}
