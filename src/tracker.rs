//! Main tracker implementation.
//!
//! The tracker consumes observation batches in (roughly) time order. Each
//! batch is associated and fused per sensor, new identities are spawned from
//! unmatched observations, a checkpoint is taken, and identities are aged
//! through their life states. Batches that arrive slightly late trigger a
//! rollback to the identities' checkpoints followed by a replay of the
//! buffered batches in corrected order.

use std::collections::VecDeque;

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::association::Associator;
use crate::config::{EngineMode, TrackerConfig};
use crate::id_pool::IdentityPool;
use crate::identity::{Identity, IdentitySnapshot, IdentityState};
use crate::lifecycle::{LifeState, LifecycleManager};
use crate::localization::LocalizationService;
use crate::observation::{Observation, ObservationBatch, SensorKind};
use crate::updater::Updater;
use crate::Result;

/// Counters describing what the tracker has done so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStats {
    /// Batches that went through association (directly or via replay)
    pub batches_processed: u64,
    /// Batches dropped for arriving too late
    pub stale_batches: u64,
    pub rollbacks: u64,
    /// Batches re-run during rollbacks
    pub replayed_batches: u64,
    /// Observations dropped because the engine mode does not use their sensor
    pub skipped_observations: u64,
    pub identities_created: u64,
    pub identities_removed: u64,
    /// Unmatched observations that could not get an identity number
    pub rejected_creations: u64,
}

/// What happened to a submitted batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Processed in order
    Processed,
    /// Inserted into history; this many batches (including it) were replayed
    Replayed { batches: usize },
    /// Too old to roll back to; dropped without any effect
    Stale,
    /// No usable observations; identities were only aged
    Empty,
}

/// Buffered batch, pre-split by primary sensor.
#[derive(Clone, Debug)]
struct HistoryEntry {
    min_timestamp: f64,
    groups: [Vec<Observation>; 3],
}

impl HistoryEntry {
    fn new(min_timestamp: f64, observations: Vec<Observation>) -> Self {
        let mut groups: [Vec<Observation>; 3] = Default::default();
        for observation in observations {
            let primary = observation.sensor().primary();
            if let Some(slot) = SensorKind::SINGLES.iter().position(|s| *s == primary) {
                groups[slot].push(observation);
            }
        }
        Self { min_timestamp, groups }
    }
}

/// Identity removed as Idle, kept with its number held until no rollback can
/// reach back past its removal.
#[derive(Clone, Debug)]
struct RetiredIdentity {
    identity: Identity,
    removed_at: f64,
}

/// Multi-object tracker.
pub struct Tracker {
    config: TrackerConfig,
    identities: Vec<Identity>,
    retired: Vec<RetiredIdentity>,
    id_pool: IdentityPool,
    localization: LocalizationService,
    associator: Associator,
    updater: Updater,
    lifecycle: LifecycleManager,
    history: VecDeque<HistoryEntry>,
    stats: TrackerStats,
}

impl Tracker {
    /// Create a new tracker with the given configuration.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the configuration fails validation.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let id_pool = IdentityPool::new(config.id_range_start, config.id_range_end)?;
        info!(mode = ?config.mode, capacity = id_pool.capacity(), "Tracker created");

        Ok(Self {
            id_pool,
            localization: LocalizationService::new(config.pose_history_window),
            associator: Associator::new(config.mode, config.association.clone()),
            updater: Updater::new(&config),
            lifecycle: LifecycleManager::new(config.lifecycle.clone()),
            identities: Vec::new(),
            retired: Vec::new(),
            history: VecDeque::new(),
            stats: TrackerStats::default(),
            config,
        })
    }

    /// Process one batch of observations.
    ///
    /// # Arguments
    /// * `batch` - Observations delivered together, with their minimum timestamp
    ///
    /// # Returns
    /// How the batch was handled.
    pub fn process_batch(&mut self, batch: ObservationBatch) -> BatchOutcome {
        let Some(min_timestamp) = batch.min_timestamp() else {
            trace!("Ignoring batch without timestamp");
            return BatchOutcome::Empty;
        };

        let mode = self.config.mode;
        let (accepted, rejected): (Vec<Observation>, Vec<Observation>) = batch
            .into_observations()
            .into_iter()
            .partition(|o| mode.accepts(o.sensor()));
        for observation in &rejected {
            error!(
                mode = ?mode,
                sensor = ?observation.sensor(),
                timestamp = observation.timestamp(),
                "Observation not supported in this engine mode, skipping"
            );
        }
        self.stats.skipped_observations += rejected.len() as u64;

        if accepted.is_empty() {
            self.age(min_timestamp);
            return BatchOutcome::Empty;
        }
        let entry = HistoryEntry::new(min_timestamp, accepted);

        let latest = self.history.back().map(|e| e.min_timestamp);
        let outcome = match latest {
            Some(latest) if min_timestamp < latest => {
                if latest - min_timestamp > self.config.rollback_threshold {
                    warn!(
                        batch = min_timestamp,
                        latest,
                        "Discarding batch older than the rollback threshold"
                    );
                    self.stats.stale_batches += 1;
                    return BatchOutcome::Stale;
                }
                let batches = self.rollback_and_replay(entry);
                BatchOutcome::Replayed { batches }
            }
            _ => {
                self.step(&entry);
                self.history.push_back(entry);
                BatchOutcome::Processed
            }
        };

        self.prune_history();
        outcome
    }

    /// Record an ego pose.
    ///
    /// # Returns
    /// `false` if the timestamp does not advance past the newest pose.
    pub fn update_pose(&mut self, pose: Matrix4<f64>, timestamp: f64) -> bool {
        match self.localization.push_pose(pose, timestamp) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Rejected ego pose");
                false
            }
        }
    }

    /// All live identities.
    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Identities currently in the Confirmed state.
    pub fn confirmed_identities(&self) -> impl Iterator<Item = &Identity> {
        self.identities
            .iter()
            .filter(|t| t.life_state() == LifeState::Confirmed)
    }

    pub fn identity(&self, id: u32) -> Option<&Identity> {
        self.identities.iter().find(|t| t.id() == id)
    }

    /// Owned snapshots of all live identities, ordered by identity number.
    pub fn snapshots(&self) -> Vec<IdentitySnapshot> {
        let mut snapshots: Vec<IdentitySnapshot> = self.identities.iter().map(|t| t.snapshot()).collect();
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    pub fn mode(&self) -> EngineMode {
        self.config.mode
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    pub fn localization(&self) -> &LocalizationService {
        &self.localization
    }

    /// Number of batches buffered for replay.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Identity numbers still available for new identities.
    pub fn available_ids(&self) -> usize {
        self.id_pool.available()
    }

    // Internal: associate, update, spawn, checkpoint, then age
    fn step(&mut self, entry: &HistoryEntry) {
        for group in &entry.groups {
            if group.is_empty() {
                continue;
            }
            let assignment = self.associator.associate(&self.identities, group, &self.localization);
            for (observation, target) in group.iter().zip(assignment) {
                match target {
                    Some(idx) => self.updater.update(&mut self.identities[idx], observation),
                    None => self.spawn(observation),
                }
            }
        }

        let window = self.config.checkpoint_window;
        for identity in &mut self.identities {
            identity.save_checkpoint(window);
        }

        self.stats.batches_processed += 1;
        self.age(entry.min_timestamp);
    }

    // Internal: rewind identities to the late batch's time and replay history from there
    fn rollback_and_replay(&mut self, entry: HistoryEntry) -> usize {
        let rollback_timestamp = entry.min_timestamp;
        let start = self
            .history
            .iter()
            .position(|e| rollback_timestamp < e.min_timestamp)
            .unwrap_or(self.history.len());
        self.history.insert(start, entry);

        let mut discarded = Vec::new();
        self.identities.retain_mut(|identity| {
            if identity.restore_to(rollback_timestamp) {
                true
            } else {
                discarded.push(identity.id());
                false
            }
        });
        // Identities removed after the rollback point were still alive then.
        let mut revived = 0;
        let retired = std::mem::take(&mut self.retired);
        for mut entry in retired {
            if entry.removed_at <= rollback_timestamp {
                self.retired.push(entry);
            } else if entry.identity.restore_to(rollback_timestamp) {
                revived += 1;
                self.identities.push(entry.identity);
            } else {
                discarded.push(entry.identity.id());
            }
        }
        self.identities.sort_by_key(|t| t.id());

        // Identities born after the rollback point are re-created by the replay.
        self.id_pool.reclaim(&discarded);

        let history = std::mem::take(&mut self.history);
        for replayed in history.iter().skip(start) {
            self.step(replayed);
        }
        self.history = history;

        let replayed = self.history.len() - start;
        self.stats.rollbacks += 1;
        self.stats.replayed_batches += replayed as u64;
        warn!(
            timestamp = rollback_timestamp,
            discarded = discarded.len(),
            revived,
            replayed,
            "Out-of-order batch, rolled back and replayed"
        );
        replayed
    }

    fn spawn(&mut self, observation: &Observation) {
        if !self.config.mode.can_spawn(observation) {
            trace!(sensor = ?observation.sensor(), "Unmatched observation cannot create an identity");
            return;
        }
        match self.id_pool.allocate() {
            Ok(id) => {
                let state = IdentityState::from_observation(id, observation, &self.config.motion);
                self.identities.push(Identity::new(state));
                self.stats.identities_created += 1;
                debug!(id, timestamp = observation.timestamp(), "Identity created");
            }
            Err(e) => {
                error!(error = %e, "Cannot create identity");
                self.stats.rejected_creations += 1;
            }
        }
    }

    fn age(&mut self, timestamp: f64) {
        for identity in &mut self.identities {
            let next = self.lifecycle.age(timestamp, identity.state());
            if next != identity.life_state() {
                debug!(id = identity.id(), from = ?identity.life_state(), to = ?next, "Life state changed");
                identity.state_mut().life_state = next;
            }
        }

        let (idle, live): (Vec<Identity>, Vec<Identity>) = std::mem::take(&mut self.identities)
            .into_iter()
            .partition(|t| t.life_state() == LifeState::Idle);
        self.identities = live;
        for identity in idle {
            debug!(id = identity.id(), "Identity removed");
            self.stats.identities_removed += 1;
            self.retired.push(RetiredIdentity {
                identity,
                removed_at: timestamp,
            });
        }

        let retention = self.config.batch_history_window.max(self.config.rollback_threshold);
        let pool = &mut self.id_pool;
        self.retired.retain(|entry| {
            if timestamp - entry.removed_at <= retention {
                return true;
            }
            pool.release(entry.identity.id());
            false
        });
    }

    fn prune_history(&mut self) {
        while let (Some(front), Some(back)) = (self.history.front(), self.history.back()) {
            if back.min_timestamp - front.min_timestamp <= self.config.batch_history_window {
                break;
            }
            self.history.pop_front();
        }
    }
}
