//! Synthetic dataset generator for a multi-location dental practice group.
//!
//! Three generators, run in a fixed order:
//!   1. appointments  (leaf)
//!   2. operations    (reads appointments)
//!   3. financials    (reads appointments and operations)
//!
//! Later tables are rebuilt from earlier ones through aggregation
//! indices and fall back to synthesis wherever an index has no data.

pub mod appointment_generator;
pub mod calendar;
pub mod config;
pub mod csv_io;
pub mod equipment;
pub mod error;
pub mod financial_generator;
pub mod index;
pub mod name_generator;
pub mod operations_generator;
pub mod patient;
pub mod pipeline;
pub mod rng;
pub mod stage;
pub mod staffing;
pub mod types;
pub mod visit_state;
