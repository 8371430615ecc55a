//! ShipWatch - continuous shipment risk simulation control
//!
//! Keeps a long-running "simulate shipment telemetry and run risk analysis"
//! job converged with an operator-controlled desired-state flag in the
//! database, at most one run in flight, surviving restarts, with a bounded
//! in-memory activity trail. Analyst feedback on past predictions is
//! aggregated into learning examples that calibrate the risk analyzer.
//!
//! # Architecture
//!
//! ```text
//! operator toggle ──> desired-state flag (Postgres)
//!                          │ poll
//!                          ▼
//!                  Reconciler ──start/stop──> SimulationManager
//!                                                   │ tick
//!                                                   ▼
//!                                            SimulationRunner
//!                                             │           │
//!                                    ActivityLedger   alerts/shipments
//!                                                         │
//!                             analyst feedback ──> FeedbackAggregator
//!                                                         │
//!                                              learning examples ──> RiskAnalyzer
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod feedback;
pub mod models;
pub mod risk;
pub mod service;
pub mod sim;
pub mod store;

pub use error::{AppError, AppResult};
