// Moderation decision engine.
//
// Detector outcomes flow one way per request:
//   orchestrator (fail-safe fan-out) → aggregator (per-category risk)
//   → policy (tiered verdict) → Decision

pub mod aggregate;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod readiness;
pub mod service;
