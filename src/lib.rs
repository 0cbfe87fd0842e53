// Lookout: fail-closed image moderation
//
// This is the library root. `moderation` holds the decision engine,
// `detectors` the model-backed signal sources that feed it.

pub mod client;
pub mod config;
pub mod detectors;
pub mod moderation;
pub mod output;
pub mod status;

#[cfg(feature = "web")]
pub mod web;
