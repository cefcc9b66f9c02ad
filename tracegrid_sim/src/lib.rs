//! TraceGrid Simulation Harness
//!
//! Drives the `tracegrid_core` engines step by step the way a deployment
//! would, with every external input under control:
//! - **Positions**: a seeded random-walk feed or scripted frames
//! - **Self-reports**: declarations scheduled against specific steps
//! - **Verification**: an Oracle that sees every contact and computes the
//!   ground-truth spread the protocol should reproduce
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      SimWorld                        │
//! │  ┌──────────────┐    positions    ┌───────────────┐  │
//! │  │ PositionFeed │───────────────► │  Coordinator  │  │
//! │  └──────────────┘                 │  ┌─────────┐  │  │
//! │                                   │  │LocalAgnt│… │  │
//! │  declarations ──────────────────► │  └─────────┘  │  │
//! │                                   └───────┬───────┘  │
//! │                          collisions       │          │
//! │                 ┌─────────────────────────▼───────┐  │
//! │                 │   Oracle (ground truth spread)  │  │
//! │                 └─────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tracegrid_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 50).with_steps(100);
//! let result = runner.run(ScenarioId::RandomWalk);
//! assert!(result.passed);
//! ```

mod error;
mod exporter;
mod feed;
mod oracle;
mod runner;
mod world;
pub mod scenarios;

pub use error::{SimError, SimResult};
pub use exporter::{SimEvent, SimExport, SimFrame, UserFrame};
pub use feed::{MobilityFeed, PositionFeed, ScriptedFeed};
pub use oracle::Oracle;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{Declaration, SimConfig, SimWorld, StepReport};
