//! Position feeds for the simulation.
//!
//! A feed supplies one position per user per step, ordered by user id:
//! - `MobilityFeed`: seeded Gaussian random walk inside the unit square
//! - `ScriptedFeed`: fixed frames for hand-written scenarios

use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracegrid_core::PositionUpdate;

use crate::error::{SimError, SimResult};

/// Source of per-step positions.
pub trait PositionFeed {
    /// Number of users this feed produces rows for.
    fn user_count(&self) -> usize;

    /// Produces the positions for the next step.
    fn next_positions(&mut self) -> SimResult<Vec<PositionUpdate>>;
}

/// Random-walk feed with deterministic noise.
pub struct MobilityFeed {
    /// RNG for placement and movement
    rng: ChaCha8Rng,

    /// Step distribution per axis
    step: Normal<f64>,

    /// Current walker positions, indexed by user id
    walkers: Vec<Vector2<f64>>,

    /// Whether the initial placement has been emitted yet
    started: bool,
}

impl MobilityFeed {
    /// Creates a feed with `users` walkers placed uniformly at random.
    ///
    /// `step_std` is the per-axis standard deviation of one move and must be
    /// finite and non-negative.
    pub fn new(seed: u64, users: usize, step_std: f64) -> SimResult<Self> {
        if !step_std.is_finite() || step_std < 0.0 {
            return Err(SimError::Feed(format!("invalid step_std {}", step_std)));
        }
        let step = Normal::new(0.0, step_std)
            .map_err(|e| SimError::Feed(format!("invalid step_std {}: {}", step_std, e)))?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let walkers = (0..users)
            .map(|_| Vector2::new(rng.gen::<f64>(), rng.gen::<f64>()))
            .collect();

        Ok(Self {
            rng,
            step,
            walkers,
            started: false,
        })
    }

    /// Current walker positions.
    pub fn walkers(&self) -> &[Vector2<f64>] {
        &self.walkers
    }

    /// Moves every walker by one noisy step, reflecting off the edges.
    fn advance(&mut self) {
        for walker in self.walkers.iter_mut() {
            let delta = Vector2::new(
                self.step.sample(&mut self.rng),
                self.step.sample(&mut self.rng),
            );
            let moved = *walker + delta;
            *walker = Vector2::new(reflect(moved.x), reflect(moved.y));
        }
    }
}

impl PositionFeed for MobilityFeed {
    fn user_count(&self) -> usize {
        self.walkers.len()
    }

    fn next_positions(&mut self) -> SimResult<Vec<PositionUpdate>> {
        // First step reports the initial placement
        if self.started {
            self.advance();
        }
        self.started = true;

        Ok(self
            .walkers
            .iter()
            .enumerate()
            .map(|(i, p)| PositionUpdate::new(i as u64, p.x, p.y))
            .collect())
    }
}

/// Folds any real value back into [0,1] as if bouncing off the walls.
fn reflect(v: f64) -> f64 {
    let folded = v.rem_euclid(2.0);
    if folded > 1.0 {
        2.0 - folded
    } else {
        folded
    }
}

/// Replays a fixed list of frames, one per step.
pub struct ScriptedFeed {
    frames: Vec<Vec<(f64, f64)>>,
    cursor: usize,
}

impl ScriptedFeed {
    /// Every frame must list the same users, by position in the frame.
    pub fn new(frames: Vec<Vec<(f64, f64)>>) -> Self {
        Self { frames, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl PositionFeed for ScriptedFeed {
    fn user_count(&self) -> usize {
        self.frames.first().map(Vec::len).unwrap_or(0)
    }

    fn next_positions(&mut self) -> SimResult<Vec<PositionUpdate>> {
        let frame = self
            .frames
            .get(self.cursor)
            .ok_or(SimError::FeedExhausted(self.cursor))?;
        self.cursor += 1;

        Ok(frame
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| PositionUpdate::new(i as u64, x, y))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobility_feed_deterministic() {
        let mut feed1 = MobilityFeed::new(42, 10, 0.05).unwrap();
        let mut feed2 = MobilityFeed::new(42, 10, 0.05).unwrap();

        for _ in 0..5 {
            // Same seed = same trajectories
            assert_eq!(feed1.next_positions().unwrap(), feed2.next_positions().unwrap());
        }
    }

    #[test]
    fn test_mobility_feed_seeds_differ() {
        let mut feed1 = MobilityFeed::new(1, 10, 0.05).unwrap();
        let mut feed2 = MobilityFeed::new(2, 10, 0.05).unwrap();

        assert_ne!(feed1.next_positions().unwrap(), feed2.next_positions().unwrap());
    }

    #[test]
    fn test_mobility_feed_stays_in_unit_square() {
        // Large steps force plenty of reflections
        let mut feed = MobilityFeed::new(7, 20, 0.8).unwrap();

        for _ in 0..50 {
            let rows = feed.next_positions().unwrap();
            assert_eq!(rows.len(), 20);
            for (i, row) in rows.iter().enumerate() {
                assert_eq!(row.user.get(), i as u64);
                assert!((0.0..=1.0).contains(&row.x));
                assert!((0.0..=1.0).contains(&row.y));
            }
        }
    }

    #[test]
    fn test_mobility_feed_first_frame_is_placement() {
        let mut feed = MobilityFeed::new(3, 4, 0.1).unwrap();
        let placed: Vec<_> = feed.walkers().to_vec();

        let rows = feed.next_positions().unwrap();
        for (row, p) in rows.iter().zip(placed.iter()) {
            assert_eq!(row.x, p.x);
            assert_eq!(row.y, p.y);
        }
    }

    #[test]
    fn test_invalid_step_std() {
        for bad in [-1.0, -1e-9, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                MobilityFeed::new(1, 3, bad),
                Err(SimError::Feed(_))
            ));
        }
    }

    #[test]
    fn test_zero_step_std_stands_still() {
        let mut feed = MobilityFeed::new(5, 3, 0.0).unwrap();

        let first = feed.next_positions().unwrap();
        let second = feed.next_positions().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(0.3), 0.3);
        assert!((reflect(1.2) - 0.8).abs() < 1e-12);
        assert!((reflect(-0.25) - 0.25).abs() < 1e-12);
        assert!((reflect(2.5) - 0.5).abs() < 1e-12);
        assert_eq!(reflect(1.0), 1.0);
    }

    #[test]
    fn test_scripted_feed_replays_then_ends() {
        let mut feed = ScriptedFeed::new(vec![
            vec![(0.1, 0.1), (0.2, 0.2)],
            vec![(0.3, 0.3), (0.4, 0.4)],
        ]);

        assert_eq!(feed.user_count(), 2);
        assert_eq!(feed.next_positions().unwrap()[1].x, 0.2);
        assert_eq!(feed.next_positions().unwrap()[0].y, 0.3);
        assert!(matches!(
            feed.next_positions(),
            Err(SimError::FeedExhausted(2))
        ));
    }
}
