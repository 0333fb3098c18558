//! Equipment inventory and daily usage.

use crate::{
    config::LocationConfig,
    rng::StageRng,
    types::{round_ratio, EntityId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Utilization never reported above this, leaving room for turnover.
pub const MAX_EQUIPMENT_UTILIZATION: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct EquipmentItem {
    pub equipment_id: EntityId,
    pub equipment_type: String,
    pub base_daily_uses: f64,
    pub minutes_per_use: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EquipmentUsageRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Location_ID")]
    pub location_id: String,
    #[serde(rename = "Location_Name")]
    pub location_name: String,
    #[serde(rename = "Equipment_ID")]
    pub equipment_id: String,
    #[serde(rename = "Equipment_Type")]
    pub equipment_type: String,
    #[serde(rename = "Usage_Count")]
    pub usage_count: u32,
    #[serde(rename = "Usage_Time_Minutes")]
    pub usage_minutes: f64,
    #[serde(rename = "Available_Minutes")]
    pub available_minutes: f64,
    #[serde(rename = "Utilization_Rate")]
    pub utilization_rate: f64,
    #[serde(rename = "Maintenance_Flag")]
    pub maintenance_flag: u8,
}

/// Expand a location's equipment config into individual items.
pub fn inventory(location: &LocationConfig) -> Vec<EquipmentItem> {
    let mut items = Vec::new();
    for eq in &location.equipment {
        for _ in 0..eq.count {
            items.push(EquipmentItem {
                equipment_id: format!("{}-EQ{:02}", location.location_id, items.len() + 1),
                equipment_type: eq.equipment_type.clone(),
                base_daily_uses: eq.base_daily_uses,
                minutes_per_use: eq.minutes_per_use,
            });
        }
    }
    items
}

/// One item's usage for a day. `volume_ratio` is actual over expected
/// appointment volume; use counts scale with it.
pub fn daily_usage(
    item: &EquipmentItem,
    location: &LocationConfig,
    date: NaiveDate,
    available_minutes: f64,
    volume_ratio: f64,
    rng: &mut StageRng,
) -> EquipmentUsageRecord {
    let uses = (item.base_daily_uses * volume_ratio * rng.uniform(0.8, 1.2))
        .round()
        .max(0.0);
    let usage_minutes = uses * item.minutes_per_use;
    let utilization = if available_minutes > 0.0 {
        (usage_minutes / available_minutes).min(MAX_EQUIPMENT_UTILIZATION)
    } else {
        0.0
    };
    EquipmentUsageRecord {
        date,
        location_id: location.location_id.clone(),
        location_name: location.name.clone(),
        equipment_id: item.equipment_id.clone(),
        equipment_type: item.equipment_type.clone(),
        usage_count: uses as u32,
        usage_minutes,
        available_minutes,
        utilization_rate: round_ratio(utilization),
        maintenance_flag: u8::from(rng.chance(0.01)),
    }
}
