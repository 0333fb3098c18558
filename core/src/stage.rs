//! Pipeline stages and the dependency graph between them.
//!
//! RULE: every generator runs as a PipelineStage. A stage reads only
//! the outputs of the stages it declares as dependencies and writes
//! only its own slot in StageOutputs.
//!
//! Graph:
//!   Appointments ──► Operations ──► Financials
//!        └──────────────────────────────▲

use crate::{
    appointment_generator::{AppointmentGenerator, AppointmentRecord},
    config::PipelineConfig,
    error::{PipelineError, PipelineResult},
    financial_generator::{FinancialGenerator, FinancialRecord},
    index,
    operations_generator::{OperationsGenerator, OperationsOutput},
    patient::{self, Patient},
    rng::{RngBank, StageRng, StageSlot},
    visit_state::VisitState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    Appointments,
    Operations,
    Financials,
}

impl StageId {
    /// Fixed execution order. Every dependency precedes its dependents.
    pub const EXECUTION_ORDER: [StageId; 3] =
        [StageId::Appointments, StageId::Operations, StageId::Financials];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Appointments => "appointments",
            Self::Operations => "operations",
            Self::Financials => "financials",
        }
    }

    pub fn dependencies(&self) -> &'static [StageId] {
        match self {
            Self::Appointments => &[],
            Self::Operations => &[StageId::Appointments],
            Self::Financials => &[StageId::Appointments, StageId::Operations],
        }
    }

    pub fn slot(&self) -> StageSlot {
        match self {
            Self::Appointments => StageSlot::Appointments,
            Self::Operations => StageSlot::Operations,
            Self::Financials => StageSlot::Financials,
        }
    }
}

/// Typed results handed from stage to stage inside one process.
#[derive(Debug, Default)]
pub struct StageOutputs {
    pub patients: Option<Vec<Patient>>,
    pub appointments: Option<Vec<AppointmentRecord>>,
    pub operations: Option<OperationsOutput>,
    pub financials: Option<Vec<FinancialRecord>>,
}

impl StageOutputs {
    pub fn has(&self, stage: StageId) -> bool {
        match stage {
            StageId::Appointments => self.appointments.is_some(),
            StageId::Operations => self.operations.is_some(),
            StageId::Financials => self.financials.is_some(),
        }
    }

    fn require(&self, stage: StageId) -> PipelineResult<()> {
        for dependency in stage.dependencies() {
            if !self.has(*dependency) {
                return Err(PipelineError::StageOrder {
                    stage: stage.name(),
                    dependency: dependency.name(),
                });
            }
        }
        Ok(())
    }
}

/// The contract every generator stage fulfills.
pub trait PipelineStage {
    fn id(&self) -> StageId;

    /// Run once. Dependencies are guaranteed present in `outputs`.
    fn run(
        &mut self,
        config: &PipelineConfig,
        outputs: &mut StageOutputs,
        bank: &RngBank,
    ) -> PipelineResult<()>;
}

pub struct AppointmentStage;

impl PipelineStage for AppointmentStage {
    fn id(&self) -> StageId {
        StageId::Appointments
    }

    fn run(
        &mut self,
        config: &PipelineConfig,
        outputs: &mut StageOutputs,
        bank: &RngBank,
    ) -> PipelineResult<()> {
        let (patients, appointments) = generate_appointments(config, bank)?;
        outputs.patients = Some(patients);
        outputs.appointments = Some(appointments);
        Ok(())
    }
}

pub struct OperationsStage;

impl PipelineStage for OperationsStage {
    fn id(&self) -> StageId {
        StageId::Operations
    }

    fn run(
        &mut self,
        config: &PipelineConfig,
        outputs: &mut StageOutputs,
        bank: &RngBank,
    ) -> PipelineResult<()> {
        let appointments = outputs.appointments.as_deref().unwrap_or_default();
        let mut rng = bank.for_stage(StageSlot::Operations);
        let result = generate_operations(config, appointments, &mut rng)?;
        outputs.operations = Some(result);
        Ok(())
    }
}

pub struct FinancialStage;

impl PipelineStage for FinancialStage {
    fn id(&self) -> StageId {
        StageId::Financials
    }

    fn run(
        &mut self,
        config: &PipelineConfig,
        outputs: &mut StageOutputs,
        bank: &RngBank,
    ) -> PipelineResult<()> {
        let appointments = outputs.appointments.as_deref().unwrap_or_default();
        let operations = outputs
            .operations
            .as_ref()
            .map(|o| o.operations.as_slice())
            .unwrap_or_default();
        let mut rng = bank.for_stage(StageSlot::Financials);
        let rows = generate_financials(config, appointments, operations, &mut rng)?;
        outputs.financials = Some(rows);
        Ok(())
    }
}

// ── Stage bodies shared by in-process and file-mode runs ───────────

/// Population plus the appointment table. Each draws from its own stream.
pub fn generate_appointments(
    config: &PipelineConfig,
    bank: &RngBank,
) -> PipelineResult<(Vec<Patient>, Vec<AppointmentRecord>)> {
    let mut population_rng = bank.for_stage(StageSlot::Population);
    let patients = patient::generate_population(config, &mut population_rng);

    let mut rng = bank.for_stage(StageSlot::Appointments);
    let mut state = VisitState::new();
    let appointments = AppointmentGenerator::new(config).generate(&patients, &mut state, &mut rng)?;
    Ok((patients, appointments))
}

pub fn generate_operations(
    config: &PipelineConfig,
    appointments: &[AppointmentRecord],
    rng: &mut StageRng,
) -> PipelineResult<OperationsOutput> {
    let day_index = index::build_day_index(appointments, config);
    OperationsGenerator::new(config, &day_index).generate(rng)
}

pub fn generate_financials(
    config: &PipelineConfig,
    appointments: &[AppointmentRecord],
    operations: &[crate::operations_generator::OperationsRecord],
    rng: &mut StageRng,
) -> PipelineResult<Vec<FinancialRecord>> {
    let appointment_index = index::build_appointment_month_index(appointments, config);
    let operations_index = index::build_operations_month_index(operations);
    FinancialGenerator::new(config, &appointment_index, &operations_index).generate(rng)
}

/// Registered stages, run in registration order.
pub struct StageGraph {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// All three generators in execution order.
    pub fn standard() -> Self {
        let mut graph = Self::new();
        graph.register(Box::new(AppointmentStage));
        graph.register(Box::new(OperationsStage));
        graph.register(Box::new(FinancialStage));
        graph
    }

    pub fn register(&mut self, stage: Box<dyn PipelineStage>) {
        self.stages.push(stage);
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id()).collect()
    }

    /// Run every stage. Fails before running a stage whose
    /// dependencies have not produced output.
    pub fn run(&mut self, config: &PipelineConfig, bank: &RngBank) -> PipelineResult<StageOutputs> {
        let mut outputs = StageOutputs::default();
        for stage in &mut self.stages {
            let id = stage.id();
            outputs.require(id)?;
            log::info!("stage {}: start", id.name());
            stage.run(config, &mut outputs, bank)?;
        }
        Ok(outputs)
    }
}

impl Default for StageGraph {
    fn default() -> Self {
        Self::new()
    }
}
