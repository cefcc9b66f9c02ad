//! JSON exporter for external renderers.
//!
//! Exports the grid layout and per-step position / infection frames. The
//! exporter only reads engine state.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use tracegrid_core::{GridPartition, InfectionEvent, StepView};

use crate::error::SimResult;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Step this frame was taken after
    pub step: u64,

    /// Every user's position and status
    pub users: Vec<UserFrame>,

    /// Tiles with two or more occupants
    pub contended_tiles: Vec<usize>,

    /// Infection notifications raised during the step
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<SimEvent>,
}

/// Position and status of one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFrame {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub tile: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infected_at: Option<u64>,
}

/// Grid cell behind a tile id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TileCell {
    pub id: usize,
    pub row: usize,
    pub col: usize,
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    pub user: u64,
    pub infected_at: u64,
}

impl From<&InfectionEvent> for SimEvent {
    fn from(event: &InfectionEvent) -> Self {
        let message = match event.previous {
            Some(previous) => format!(
                "{} infection moved from {} to {}",
                event.user, previous, event.infected_at
            ),
            None => format!("{} has been infected at {}", event.user, event.infected_at),
        };
        Self {
            message,
            user: event.user.get(),
            infected_at: event.infected_at.get(),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Tiles per axis
    pub resolution: usize,

    /// Cut points shared by both axes
    pub boundaries: Vec<f64>,

    /// Row-major tile table
    pub tiles: Vec<TileCell>,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    /// Size of the infection map at the end
    pub final_infected: usize,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, grid: &GridPartition) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            resolution: grid.resolution(),
            boundaries: grid.boundaries().to_vec(),
            tiles: grid
                .tiles()
                .iter()
                .filter_map(|&tile| {
                    grid.cell_of(tile)
                        .map(|(row, col)| TileCell { id: tile.0, row, col })
                })
                .collect(),
            frames: Vec::new(),
            passed: false,
            final_infected: 0,
        }
    }

    /// Adds a frame built from an engine view.
    pub fn add_view(&mut self, view: &StepView, contended: &[usize], events: &[InfectionEvent]) {
        let users = view
            .positions
            .iter()
            .map(|row| UserFrame {
                id: row.user.get(),
                x: row.x,
                y: row.y,
                tile: row.tile.0,
                infected_at: view.infected.get(&row.user).map(|t| t.get()),
            })
            .collect();

        self.frames.push(SimFrame {
            step: view.step.map(|t| t.get()).unwrap_or(0),
            users,
            contended_tiles: contended.to_vec(),
            events: events.iter().map(SimEvent::from).collect(),
        });
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, final_infected: usize) {
        self.passed = passed;
        self.final_infected = final_infected;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> SimResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tracegrid_core::{PositionRow, TileId, TimeStep, UserId};

    #[test]
    fn test_export_frame_serializes() {
        let grid = GridPartition::new(3).unwrap();
        let mut export = SimExport::new("chain", 7, &grid);

        let mut infected = BTreeMap::new();
        infected.insert(UserId(1), TimeStep(0));
        let view = StepView {
            step: Some(TimeStep(2)),
            positions: vec![
                PositionRow { user: UserId(0), x: 0.1, y: 0.1, tile: TileId(0) },
                PositionRow { user: UserId(1), x: 0.9, y: 0.9, tile: TileId(4) },
            ],
            infected,
        };
        let event = InfectionEvent {
            user: UserId(1),
            infected_at: TimeStep(0),
            previous: None,
        };
        export.add_view(&view, &[], &[event]);
        export.finalize(true, 1);

        let json: serde_json::Value = serde_json::to_value(&export).unwrap();
        assert_eq!(json["resolution"], 3);
        assert_eq!(json["tiles"].as_array().unwrap().len(), 9);
        assert_eq!(json["tiles"][5]["row"], 1);
        assert_eq!(json["tiles"][5]["col"], 2);
        assert_eq!(json["frames"][0]["step"], 2);
        assert_eq!(json["frames"][0]["users"][1]["infected_at"], 0);
        assert!(json["frames"][0]["users"][0].get("infected_at").is_none());
        assert_eq!(json["frames"][0]["events"][0]["message"], "user 1 has been infected at t=0");
        assert_eq!(json["passed"], true);
    }

    #[test]
    fn test_event_message_for_earlier_report() {
        let event = InfectionEvent {
            user: UserId(4),
            infected_at: TimeStep(2),
            previous: Some(TimeStep(6)),
        };

        let sim_event = SimEvent::from(&event);
        assert_eq!(sim_event.message, "user 4 infection moved from t=6 to t=2");
    }
}
