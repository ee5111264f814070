//! Observation-to-identity association.
//!
//! The [`Associator`] scores every (observation, identity) pair with the
//! similarity for the observation's sensor, vetoes implausible class pairs,
//! and solves the assignment greedily.

mod gate;
mod similarity;

pub use gate::can_associate;
pub use similarity::{
    camera_similarity, distance_similarity, ellipse_similarity, lidar_similarity, radar_similarity,
};

use nalgebra::DMatrix;
use tracing::{debug, trace};

use crate::config::{AssociationConfig, EngineMode};
use crate::identity::Identity;
use crate::localization::LocalizationService;
use crate::matching::{assignments, match_greedy};
use crate::observation::{Observation, SensorKind};

/// Mode-aware similarity scoring and greedy assignment.
#[derive(Clone, Debug)]
pub struct Associator {
    mode: EngineMode,
    config: AssociationConfig,
}

impl Associator {
    pub fn new(mode: EngineMode, config: AssociationConfig) -> Self {
        Self { mode, config }
    }

    /// Similarity of one pair, before gating. Negative ellipse results are
    /// clamped to 0.
    pub fn similarity(&self, identity: &Identity, observation: &Observation, localization: &LocalizationService) -> f64 {
        if !self.mode.accepts(observation.sensor()) {
            debug!(mode = ?self.mode, sensor = ?observation.sensor(), "Observation not scored in this mode");
            return 0.0;
        }
        let score = match observation.sensor().primary() {
            SensorKind::LIDAR => lidar_similarity(identity, observation, &self.config),
            SensorKind::CAMERA => camera_similarity(identity, observation, localization, &self.config),
            SensorKind::RADAR => radar_similarity(identity, observation, &self.config),
            _ => 0.0,
        };
        score.max(0.0)
    }

    /// Build the (observations x identities) similarity matrix.
    ///
    /// Class-incompatible cells are 0.
    pub fn similarity_matrix(
        &self,
        identities: &[Identity],
        observations: &[Observation],
        localization: &LocalizationService,
    ) -> DMatrix<f64> {
        let mut matrix = DMatrix::from_element(observations.len(), identities.len(), -1.0);
        for (i, observation) in observations.iter().enumerate() {
            for (j, identity) in identities.iter().enumerate() {
                matrix[(i, j)] = if can_associate(identity.class(), observation.class()) {
                    self.similarity(identity, observation, localization)
                } else {
                    0.0
                };
            }
        }
        matrix
    }

    /// Assign each observation to at most one identity index.
    pub fn associate(
        &self,
        identities: &[Identity],
        observations: &[Observation],
        localization: &LocalizationService,
    ) -> Vec<Option<usize>> {
        let matrix = self.similarity_matrix(identities, observations, localization);
        let ids: Vec<u32> = identities.iter().map(|t| t.id()).collect();
        let (matched_obs, matched_identities) = match_greedy(&matrix, &ids, self.config.min_similarity);
        trace!(
            observations = observations.len(),
            identities = identities.len(),
            matches = matched_obs.len(),
            "Association solved"
        );
        assignments(observations.len(), &matched_obs, &matched_identities)
    }
}
