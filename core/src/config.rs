use crate::types::LocationId;
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// ── Locations ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LocationTier {
    Flagship,
    Standard,
    Satellite,
}

impl LocationTier {
    /// Monthly revenue band used when no appointment data exists.
    pub fn base_monthly_revenue(&self) -> (f64, f64) {
        match self {
            Self::Flagship => (180_000.0, 240_000.0),
            Self::Standard => (110_000.0, 160_000.0),
            Self::Satellite => (60_000.0, 95_000.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentConfig {
    pub equipment_type: String,
    pub count: u32,
    pub base_daily_uses: f64,
    pub minutes_per_use: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffRoster {
    pub dentists: u32,
    pub hygienists: u32,
    pub assistants: u32,
    pub admins: u32,
}

impl StaffRoster {
    pub fn size_for(&self, role: StaffRole) -> u32 {
        match role {
            StaffRole::Dentist => self.dentists,
            StaffRole::Hygienist => self.hygienists,
            StaffRole::Assistant => self.assistants,
            StaffRole::Admin => self.admins,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub location_id: LocationId,
    pub name: String,
    pub city: String,
    /// Public review score, 1.0 to 5.0.
    pub google_rating: f64,
    pub tier: LocationTier,
    pub opened_date: NaiveDate,
    pub square_feet: f64,
    pub monthly_rent: f64,
    pub chairs: u32,
    pub open_hour: u32,
    pub close_hour: u32,
    pub saturday_close_hour: u32,
    pub target_chair_utilization: f64,
    pub target_collection_rate: f64,
    pub target_new_patients: u32,
    pub expected_daily_appointments: f64,
    pub monthly_marketing_budget: f64,
    pub staff: StaffRoster,
    pub equipment: Vec<EquipmentConfig>,
}

impl LocationConfig {
    /// Minutes the practice is open; Saturdays run a short day.
    pub fn open_minutes(&self, is_saturday: bool) -> f64 {
        let close = if is_saturday { self.saturday_close_hour } else { self.close_hour };
        (close.saturating_sub(self.open_hour) * 60) as f64
    }
}

// ── Providers ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub name: String,
    pub specialty: String,
    pub primary_location: LocationId,
    #[serde(default)]
    pub locations: Vec<LocationId>,
}

impl ProviderConfig {
    pub fn works_at(&self, location_id: &str) -> bool {
        self.primary_location == location_id || self.locations.iter().any(|l| l == location_id)
    }
}

// ── Procedures ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcedureCategory {
    Preventive,
    Diagnostic,
    Restorative,
    Endodontic,
    Periodontic,
    Prosthodontic,
    #[serde(rename = "Oral Surgery")]
    OralSurgery,
    Orthodontic,
    Implant,
    Adjunctive,
}

impl ProcedureCategory {
    pub const ALL: [ProcedureCategory; 10] = [
        Self::Preventive,
        Self::Diagnostic,
        Self::Restorative,
        Self::Endodontic,
        Self::Periodontic,
        Self::Prosthodontic,
        Self::OralSurgery,
        Self::Orthodontic,
        Self::Implant,
        Self::Adjunctive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preventive => "Preventive",
            Self::Diagnostic => "Diagnostic",
            Self::Restorative => "Restorative",
            Self::Endodontic => "Endodontic",
            Self::Periodontic => "Periodontic",
            Self::Prosthodontic => "Prosthodontic",
            Self::OralSurgery => "Oral Surgery",
            Self::Orthodontic => "Orthodontic",
            Self::Implant => "Implant",
            Self::Adjunctive => "Adjunctive",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == label)
    }

    /// Categories whose completed procedures can open a treatment plan.
    pub fn opens_treatment_plan(&self) -> bool {
        matches!(
            self,
            Self::Restorative | Self::Endodontic | Self::Prosthodontic | Self::Implant
        )
    }

    /// Share of revenue used when no appointment histogram exists.
    pub fn default_revenue_weight(&self) -> f64 {
        match self {
            Self::Preventive => 0.20,
            Self::Diagnostic => 0.10,
            Self::Restorative => 0.25,
            Self::Endodontic => 0.10,
            Self::Periodontic => 0.08,
            Self::Prosthodontic => 0.10,
            Self::OralSurgery => 0.05,
            Self::Orthodontic => 0.05,
            Self::Implant => 0.05,
            Self::Adjunctive => 0.02,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureConfig {
    pub code: String,
    pub description: String,
    pub category: ProcedureCategory,
    pub fee: f64,
    pub duration_minutes: u32,
    #[serde(default)]
    pub is_cleaning: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ProcedureCatalogFile {
    procedures: Vec<ProcedureConfig>,
    pediatric_codes: Vec<String>,
    senior_codes: Vec<String>,
}

// ── Insurance ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayorClass {
    #[serde(rename = "PPO")]
    Ppo,
    #[serde(rename = "DMO")]
    Dmo,
    Government,
    #[serde(rename = "Self-Pay")]
    SelfPay,
}

impl PayorClass {
    pub const ALL: [PayorClass; 4] = [Self::Ppo, Self::Dmo, Self::Government, Self::SelfPay];

    pub fn default_revenue_weight(&self) -> f64 {
        match self {
            Self::Ppo => 0.55,
            Self::Dmo => 0.15,
            Self::Government => 0.10,
            Self::SelfPay => 0.20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceCarrier {
    pub name: String,
    pub payor_class: PayorClass,
    pub coverage_rate: f64,
    pub weight: f64,
}

pub const SELF_PAY: &str = "Self-Pay";

// ── Staffing ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StaffRole {
    Dentist,
    Hygienist,
    Assistant,
    Admin,
}

impl StaffRole {
    pub const ALL: [StaffRole; 4] = [Self::Dentist, Self::Hygienist, Self::Assistant, Self::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dentist => "Dentist",
            Self::Hygienist => "Hygienist",
            Self::Assistant => "Assistant",
            Self::Admin => "Admin",
        }
    }

    pub fn is_clinical(&self) -> bool {
        !matches!(self, Self::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    pub role: StaffRole,
    pub working_fraction: f64,
    pub full_time_share: f64,
    pub hourly_rate_min: f64,
    pub hourly_rate_max: f64,
}

// ── Generation parameters ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub seed: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub num_patients: usize,
    pub num_records: usize,
    pub self_pay_share: f64,
}

/// File names exchanged between stages.
///
/// `financial_operations_input` intentionally defaults to a different
/// name than `operations_output`: a financial run that follows an
/// operations run in the same directory does not see its table unless
/// the two names are aligned here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLayout {
    pub appointments: String,
    pub operations_output: String,
    pub financial_operations_input: String,
    pub staff_hours: String,
    pub equipment_usage: String,
    pub financials: String,
}

impl Default for FileLayout {
    fn default() -> Self {
        Self {
            appointments: "Pat_App_Data.csv".into(),
            operations_output: "Dental_Operations_Data.csv".into(),
            financial_operations_input: "Operations_Data.csv".into(),
            staff_hours: "Dental_Staff_Hours_Data.csv".into(),
            equipment_usage: "Dental_Equipment_Usage_Data.csv".into(),
            financials: "Financial_Data.csv".into(),
        }
    }
}

impl FileLayout {
    /// Whether the financial stage reads the file the operations stage writes.
    pub fn operations_handoff_aligned(&self) -> bool {
        self.operations_output == self.financial_operations_input
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GenerationFile {
    generation: GenerationConfig,
    #[serde(default)]
    files: FileLayout,
}

#[derive(Debug, Clone, Deserialize)]
struct LocationsFile {
    locations: Vec<LocationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProvidersFile {
    providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct InsuranceFile {
    carriers: Vec<InsuranceCarrier>,
}

#[derive(Debug, Clone, Deserialize)]
struct HolidaysFile {
    holidays: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
struct StaffingFile {
    roles: Vec<RoleConfig>,
}

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub generation: GenerationConfig,
    pub files: FileLayout,
    pub locations: Vec<LocationConfig>,
    pub providers: Vec<ProviderConfig>,
    pub procedures: Vec<ProcedureConfig>,
    pub pediatric_codes: Vec<String>,
    pub senior_codes: Vec<String>,
    pub carriers: Vec<InsuranceCarrier>,
    pub holidays: BTreeSet<NaiveDate>,
    pub roles: Vec<RoleConfig>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Cannot parse {}: {e}", path.display()))
}

impl PipelineConfig {
    /// Load the catalog and generation parameters from `data_dir`.
    /// In tests, use PipelineConfig::default_test().
    pub fn load(data_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let data_dir = data_dir.as_ref();
        let catalog = data_dir.join("catalog");

        let generation_file: GenerationFile = read_json(&data_dir.join("generation.json"))?;
        let locations: LocationsFile = read_json(&catalog.join("locations.json"))?;
        let providers: ProvidersFile = read_json(&catalog.join("providers.json"))?;
        let procedures: ProcedureCatalogFile = read_json(&catalog.join("procedures.json"))?;
        let insurance: InsuranceFile = read_json(&catalog.join("insurance.json"))?;
        let holidays: HolidaysFile = read_json(&catalog.join("holidays.json"))?;
        let staffing: StaffingFile = read_json(&catalog.join("staffing.json"))?;

        let config = Self {
            generation: generation_file.generation,
            files: generation_file.files,
            locations: locations.locations,
            providers: providers.providers,
            procedures: procedures.procedures,
            pediatric_codes: procedures.pediatric_codes,
            senior_codes: procedures.senior_codes,
            carriers: insurance.carriers,
            holidays: holidays.holidays.into_iter().collect(),
            roles: staffing.roles,
        };
        config.validate()?;
        log::info!(
            "config: {} locations, {} providers, {} procedures, {} carriers, {} holidays",
            config.locations.len(),
            config.providers.len(),
            config.procedures.len(),
            config.carriers.len(),
            config.holidays.len()
        );
        Ok(config)
    }

    /// Reject catalogs the generators cannot sample from.
    pub fn validate(&self) -> anyhow::Result<()> {
        let g = &self.generation;
        if g.start_date > g.end_date {
            anyhow::bail!("start_date {} is after end_date {}", g.start_date, g.end_date);
        }
        if self.locations.is_empty() {
            anyhow::bail!("catalog has no locations");
        }
        if self.providers.is_empty() {
            anyhow::bail!("catalog has no providers");
        }
        if self.procedures.is_empty() {
            anyhow::bail!("catalog has no procedures");
        }
        if self.carriers.is_empty() {
            anyhow::bail!("catalog has no insurance carriers");
        }
        for location in &self.locations {
            if !(1.0..=5.0).contains(&location.google_rating) {
                anyhow::bail!(
                    "location {} has google_rating {} outside 1.0..=5.0",
                    location.location_id,
                    location.google_rating
                );
            }
        }
        for code in self.pediatric_codes.iter().chain(self.senior_codes.iter()) {
            if self.procedure(code).is_none() {
                anyhow::bail!("bias list references unknown procedure code {code}");
            }
        }
        Ok(())
    }

    pub fn location(&self, location_id: &str) -> Option<&LocationConfig> {
        self.locations.iter().find(|l| l.location_id == location_id)
    }

    pub fn procedure(&self, code: &str) -> Option<&ProcedureConfig> {
        self.procedures.iter().find(|p| p.code == code)
    }

    pub fn carrier(&self, name: &str) -> Option<&InsuranceCarrier> {
        self.carriers.iter().find(|c| c.name == name)
    }

    /// Payor class for a value of the Insurance_Provider column.
    pub fn payor_class(&self, insurance_provider: &str) -> PayorClass {
        if insurance_provider == SELF_PAY {
            return PayorClass::SelfPay;
        }
        self.carrier(insurance_provider)
            .map(|c| c.payor_class)
            .unwrap_or(PayorClass::Ppo)
    }

    pub fn role(&self, role: StaffRole) -> Option<&RoleConfig> {
        self.roles.iter().find(|r| r.role == role)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).expect("valid test date");

        let equipment = vec![
            EquipmentConfig {
                equipment_type: "X-Ray Unit".into(),
                count: 2,
                base_daily_uses: 12.0,
                minutes_per_use: 5.0,
            },
            EquipmentConfig {
                equipment_type: "Autoclave".into(),
                count: 1,
                base_daily_uses: 8.0,
                minutes_per_use: 40.0,
            },
        ];

        let locations = vec![
            LocationConfig {
                location_id: "LOC001".into(),
                name: "Downtown Dental Center".into(),
                city: "Springfield".into(),
                google_rating: 4.7,
                tier: LocationTier::Flagship,
                opened_date: d(2012, 4, 1),
                square_feet: 4200.0,
                monthly_rent: 18_500.0,
                chairs: 8,
                open_hour: 8,
                close_hour: 18,
                saturday_close_hour: 13,
                target_chair_utilization: 0.78,
                target_collection_rate: 0.96,
                target_new_patients: 4,
                expected_daily_appointments: 28.0,
                monthly_marketing_budget: 6_000.0,
                staff: StaffRoster { dentists: 4, hygienists: 5, assistants: 6, admins: 3 },
                equipment: equipment.clone(),
            },
            LocationConfig {
                location_id: "LOC002".into(),
                name: "Lakeside Smiles".into(),
                city: "Shelbyville".into(),
                google_rating: 4.4,
                tier: LocationTier::Satellite,
                opened_date: d(2021, 6, 1),
                square_feet: 2100.0,
                monthly_rent: 7_800.0,
                chairs: 4,
                open_hour: 8,
                close_hour: 17,
                saturday_close_hour: 12,
                target_chair_utilization: 0.70,
                target_collection_rate: 0.94,
                target_new_patients: 3,
                expected_daily_appointments: 14.0,
                monthly_marketing_budget: 3_500.0,
                staff: StaffRoster { dentists: 2, hygienists: 2, assistants: 3, admins: 2 },
                equipment,
            },
        ];

        let providers = vec![
            ProviderConfig {
                provider_id: "PRV001".into(),
                name: "Dr. Alice Morgan".into(),
                specialty: "General Dentistry".into(),
                primary_location: "LOC001".into(),
                locations: vec![],
            },
            ProviderConfig {
                provider_id: "PRV002".into(),
                name: "Dr. Rahul Patel".into(),
                specialty: "Endodontics".into(),
                primary_location: "LOC001".into(),
                locations: vec!["LOC002".into()],
            },
            ProviderConfig {
                provider_id: "PRV003".into(),
                name: "Dr. Grace Kim".into(),
                specialty: "General Dentistry".into(),
                primary_location: "LOC002".into(),
                locations: vec![],
            },
        ];

        let procedure = |code: &str, desc: &str, category, fee, duration, is_cleaning| ProcedureConfig {
            code: code.into(),
            description: desc.into(),
            category,
            fee,
            duration_minutes: duration,
            is_cleaning,
        };
        use ProcedureCategory::*;
        let procedures = vec![
            procedure("D0120", "Periodic Oral Evaluation", Diagnostic, 65.0, 20, false),
            procedure("D1110", "Adult Prophylaxis", Preventive, 110.0, 45, true),
            procedure("D0274", "Bitewings - Four Films", Diagnostic, 75.0, 15, false),
            procedure("D2391", "Resin Composite - One Surface Posterior", Restorative, 190.0, 45, false),
            procedure("D1120", "Child Prophylaxis", Preventive, 80.0, 30, true),
            procedure("D1208", "Topical Fluoride", Preventive, 40.0, 10, false),
            procedure("D1351", "Sealant - Per Tooth", Preventive, 55.0, 15, false),
            procedure("D2740", "Crown - Porcelain/Ceramic", Restorative, 1250.0, 90, false),
            procedure("D3330", "Root Canal - Molar", Endodontic, 1200.0, 105, false),
            procedure("D4341", "Scaling and Root Planing - Per Quadrant", Periodontic, 260.0, 60, false),
            procedure("D5110", "Complete Denture - Maxillary", Prosthodontic, 1800.0, 60, false),
            procedure("D6010", "Surgical Placement of Implant", Implant, 2200.0, 120, false),
            procedure("D7140", "Extraction - Erupted Tooth", OralSurgery, 200.0, 30, false),
            procedure("D8080", "Comprehensive Orthodontic Treatment", Orthodontic, 5500.0, 60, false),
            procedure("D9110", "Palliative Treatment", Adjunctive, 120.0, 30, false),
        ];

        let carriers = vec![
            InsuranceCarrier {
                name: "Delta Dental".into(),
                payor_class: PayorClass::Ppo,
                coverage_rate: 0.80,
                weight: 0.5,
            },
            InsuranceCarrier {
                name: "Guardian DentalGuard".into(),
                payor_class: PayorClass::Dmo,
                coverage_rate: 0.70,
                weight: 0.3,
            },
            InsuranceCarrier {
                name: "State Medicaid".into(),
                payor_class: PayorClass::Government,
                coverage_rate: 0.60,
                weight: 0.2,
            },
        ];

        let roles = vec![
            RoleConfig {
                role: StaffRole::Dentist,
                working_fraction: 0.8,
                full_time_share: 0.85,
                hourly_rate_min: 70.0,
                hourly_rate_max: 110.0,
            },
            RoleConfig {
                role: StaffRole::Hygienist,
                working_fraction: 0.85,
                full_time_share: 0.7,
                hourly_rate_min: 38.0,
                hourly_rate_max: 55.0,
            },
            RoleConfig {
                role: StaffRole::Assistant,
                working_fraction: 0.85,
                full_time_share: 0.75,
                hourly_rate_min: 19.0,
                hourly_rate_max: 28.0,
            },
            RoleConfig {
                role: StaffRole::Admin,
                working_fraction: 0.9,
                full_time_share: 0.8,
                hourly_rate_min: 17.0,
                hourly_rate_max: 25.0,
            },
        ];

        Self {
            generation: GenerationConfig {
                seed: 42,
                start_date: d(2023, 1, 1),
                end_date: d(2024, 12, 31),
                num_patients: 120,
                num_records: 800,
                self_pay_share: 0.2,
            },
            files: FileLayout::default(),
            locations,
            providers,
            procedures,
            pediatric_codes: vec!["D1120".into(), "D1208".into(), "D1351".into(), "D8080".into()],
            senior_codes: vec![
                "D2391".into(),
                "D2740".into(),
                "D3330".into(),
                "D5110".into(),
                "D6010".into(),
            ],
            carriers,
            holidays: [
                d(2023, 1, 2),
                d(2023, 7, 4),
                d(2023, 11, 23),
                d(2023, 12, 25),
                d(2024, 1, 1),
                d(2024, 7, 4),
                d(2024, 11, 28),
                d(2024, 12, 25),
            ]
            .into_iter()
            .collect(),
            roles,
        }
    }
}
