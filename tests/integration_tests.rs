//! Integration tests for the fusion tracker.
//!
//! These tests drive complete tracking workflows through the public API.

use nalgebra::Matrix4;

use fusion_tracker::{
    BatchOutcome, EngineMode, LifeState, ObjectClass, Observation, ObservationBatch, SensorKind, Tracker,
    TrackerConfig,
};

fn lidar(t: f64, x: f64, y: f64, class: ObjectClass) -> Observation {
    Observation::lidar(t, [x, y, 0.8], 0.0, [4.5, 1.9, 1.6])
        .with_class(class)
        .with_confidence(0.9)
        .build()
        .expect("valid lidar observation")
}

fn camera(t: f64, x: f64, y: f64) -> Observation {
    Observation::camera(t, [x, y, 0.8], 0.0, [4.5, 1.9, 1.6])
        .with_class(ObjectClass::Vehicle)
        .with_confidence(0.8)
        .build()
        .expect("valid camera observation")
}

fn radar(t: f64, x: f64, y: f64, vx: f64, vy: f64) -> Observation {
    Observation::radar(t, [x, y], [vx, vy])
        .with_confidence(0.6)
        .build()
        .expect("valid radar observation")
}

fn ego_pose(x: f64, y: f64) -> Matrix4<f64> {
    let mut pose = Matrix4::identity();
    pose[(0, 3)] = x;
    pose[(1, 3)] = y;
    pose
}

// =============================================================================
// Test 1: Confirmation
// =============================================================================

#[test]
fn test_integration_confirm_after_five_detections() {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");

    for k in 0..5 {
        let t = k as f64 * 0.1;
        let outcome = tracker.process_batch(ObservationBatch::new(vec![lidar(t, 10.0 + t, 0.0, ObjectClass::Vehicle)]));
        assert_eq!(outcome, BatchOutcome::Processed);

        assert_eq!(tracker.identities().len(), 1, "Batch {}: expected a single identity", k);
        let identity = &tracker.identities()[0];
        assert_eq!(identity.id(), 1);
        assert_eq!(identity.lifetime(), k + 1);

        let expected = if k < 4 { LifeState::Init } else { LifeState::Confirmed };
        assert_eq!(identity.life_state(), expected, "Batch {}: unexpected life state", k);
    }

    assert_eq!(tracker.confirmed_identities().count(), 1);
    let identity = &tracker.identities()[0];
    assert!(
        identity.estimator().vx() > 0.0,
        "Expected positive forward velocity, got {}",
        identity.estimator().vx()
    );
}

// =============================================================================
// Test 2: Lost, recovery and removal
// =============================================================================

fn confirmed_tracker() -> Tracker {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");
    for k in 0..5 {
        let t = k as f64 * 0.1;
        tracker.process_batch(ObservationBatch::new(vec![lidar(t, 10.0, 0.0, ObjectClass::Vehicle)]));
    }
    assert_eq!(tracker.identities()[0].life_state(), LifeState::Confirmed);
    tracker
}

#[test]
fn test_integration_lost_then_idle() {
    let mut tracker = confirmed_tracker();

    tracker.process_batch(ObservationBatch::empty(0.6));
    assert_eq!(tracker.identities()[0].life_state(), LifeState::Confirmed);

    tracker.process_batch(ObservationBatch::empty(0.72));
    assert_eq!(tracker.identities()[0].life_state(), LifeState::Lost);

    tracker.process_batch(ObservationBatch::empty(1.1));
    assert!(tracker.identities().is_empty(), "Idle identity should be removed");
    assert_eq!(tracker.stats().identities_removed, 1);

    // The released number goes to the back of the pool
    tracker.process_batch(ObservationBatch::new(vec![lidar(1.2, 10.0, 0.0, ObjectClass::Vehicle)]));
    assert_eq!(tracker.identities()[0].id(), 2);
}

#[test]
fn test_integration_lost_identity_recovers() {
    let mut tracker = confirmed_tracker();

    tracker.process_batch(ObservationBatch::empty(0.72));
    assert_eq!(tracker.identities()[0].life_state(), LifeState::Lost);

    tracker.process_batch(ObservationBatch::new(vec![lidar(0.75, 10.0, 0.0, ObjectClass::Vehicle)]));
    assert_eq!(tracker.identities().len(), 1);
    let identity = &tracker.identities()[0];
    assert_eq!(identity.id(), 1);
    assert_eq!(identity.life_state(), LifeState::Confirmed);
    assert_eq!(identity.lifetime(), 6);
}

// =============================================================================
// Test 3: Out-of-order batches
// =============================================================================

fn scene(t: f64) -> ObservationBatch {
    ObservationBatch::new(vec![
        lidar(t, 10.0 + 5.0 * t, 0.0, ObjectClass::Vehicle),
        lidar(t, 30.0, 8.0 - 2.0 * t, ObjectClass::Cyclist),
    ])
}

#[test]
fn test_integration_stale_batch_discarded() {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");
    tracker.process_batch(scene(0.0));
    tracker.process_batch(scene(0.6));
    let before = tracker.snapshots();

    assert_eq!(tracker.process_batch(scene(0.05)), BatchOutcome::Stale);
    assert_eq!(tracker.snapshots(), before);
    assert_eq!(tracker.stats().stale_batches, 1);
}

#[test]
fn test_integration_rollback_matches_in_order() {
    let mut in_order = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");
    for t in [0.0, 0.1, 0.2] {
        assert_eq!(in_order.process_batch(scene(t)), BatchOutcome::Processed);
    }

    let mut shuffled = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");
    shuffled.process_batch(scene(0.1));
    shuffled.process_batch(scene(0.2));
    let outcome = shuffled.process_batch(scene(0.0));
    assert_eq!(outcome, BatchOutcome::Replayed { batches: 3 });

    assert_eq!(shuffled.snapshots(), in_order.snapshots());
    assert_eq!(shuffled.history_len(), in_order.history_len());
    assert_eq!(shuffled.available_ids(), in_order.available_ids());
    assert_eq!(shuffled.stats().rollbacks, 1);
}

#[test]
fn test_integration_rollback_to_checkpoint() {
    let mut in_order = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");
    for t in [0.0, 0.1, 0.2, 0.3] {
        in_order.process_batch(scene(t));
    }

    let mut shuffled = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");
    for t in [0.0, 0.2, 0.3, 0.1] {
        shuffled.process_batch(scene(t));
    }

    assert_eq!(shuffled.snapshots(), in_order.snapshots());
    for (a, b) in shuffled.identities().iter().zip(in_order.identities()) {
        assert_eq!(a.checkpoints().len(), b.checkpoints().len());
    }
}

#[test]
fn test_integration_rollback_revives_identity_removed_after_rollback_point() {
    let batches = |t: f64| match t {
        t if t < 0.1 => ObservationBatch::new(vec![lidar(0.0, 10.0, 0.0, ObjectClass::Vehicle)]),
        t if t < 0.3 => ObservationBatch::new(vec![lidar(0.2, 10.2, 0.0, ObjectClass::Vehicle)]),
        _ => ObservationBatch::new(vec![lidar(0.4, 50.0, 0.0, ObjectClass::Vehicle)]),
    };

    let mut in_order = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");
    for t in [0.0, 0.2, 0.4] {
        assert_eq!(in_order.process_batch(batches(t)), BatchOutcome::Processed);
    }

    let mut shuffled = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");
    shuffled.process_batch(batches(0.0));
    shuffled.process_batch(batches(0.4));
    // Without the 0.2 batch the first identity ages out at 0.4
    assert_eq!(shuffled.identities().len(), 1);
    assert_eq!(shuffled.process_batch(batches(0.2)), BatchOutcome::Replayed { batches: 2 });

    let summary = |tracker: &Tracker| -> Vec<(u32, u32, f64)> {
        tracker.snapshots().iter().map(|s| (s.id, s.lifetime, s.x)).collect()
    };
    assert_eq!(summary(&shuffled), summary(&in_order));
    assert_eq!(shuffled.snapshots(), in_order.snapshots());
    assert_eq!(shuffled.available_ids(), in_order.available_ids());
    assert_eq!(shuffled.identity(1).map(|t| t.lifetime()), Some(2));
}

// =============================================================================
// Test 4: Identity pool
// =============================================================================

#[test]
fn test_integration_pool_exhaustion() {
    let mut config = TrackerConfig::new(EngineMode::Lidar);
    config.id_range_start = 100;
    config.id_range_end = 102;
    let mut tracker = Tracker::new(config).expect("Failed to create tracker");

    tracker.process_batch(ObservationBatch::new(vec![
        lidar(0.0, 10.0, 0.0, ObjectClass::Vehicle),
        lidar(0.0, 30.0, 0.0, ObjectClass::Vehicle),
        lidar(0.0, 50.0, 0.0, ObjectClass::Vehicle),
    ]));

    let ids: Vec<u32> = tracker.snapshots().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![100, 101]);
    assert_eq!(tracker.stats().rejected_creations, 1);
    assert_eq!(tracker.available_ids(), 0);
}

// =============================================================================
// Test 5: Class gate
// =============================================================================

#[test]
fn test_integration_type_gate_spawns_new_identity() {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");
    tracker.process_batch(ObservationBatch::new(vec![lidar(0.0, 10.0, 0.0, ObjectClass::Vehicle)]));
    tracker.process_batch(ObservationBatch::new(vec![lidar(0.1, 10.0, 0.0, ObjectClass::Pedestrian)]));

    let snapshots = tracker.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].class, ObjectClass::Vehicle);
    assert_eq!(snapshots[0].lifetime, 1);
    assert_eq!(snapshots[1].class, ObjectClass::Pedestrian);
}

// =============================================================================
// Test 6: Camera mode
// =============================================================================

#[test]
fn test_integration_camera_with_poses() {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Camera)).expect("Failed to create tracker");

    for k in 0..6 {
        let t = k as f64 * 0.1;
        assert!(tracker.update_pose(ego_pose(t, 0.0), t));
        tracker.process_batch(ObservationBatch::new(vec![camera(t, 20.0 + 0.5 * t, 0.0)]));
    }

    assert_eq!(tracker.identities().len(), 1);
    let identity = &tracker.identities()[0];
    assert_eq!(identity.lifetime(), 6);
    assert_eq!(identity.life_state(), LifeState::Confirmed);
    assert_eq!(identity.sensor(), SensorKind::CAMERA);
}

#[test]
fn test_integration_camera_without_poses_never_matches() {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Camera)).expect("Failed to create tracker");
    tracker.process_batch(ObservationBatch::new(vec![camera(0.0, 20.0, 0.0)]));
    tracker.process_batch(ObservationBatch::new(vec![camera(0.1, 20.0, 0.0)]));
    assert_eq!(tracker.identities().len(), 2);
}

#[test]
fn test_integration_pose_rejection() {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Camera)).expect("Failed to create tracker");
    assert!(tracker.update_pose(ego_pose(0.0, 0.0), 1.0));
    assert!(!tracker.update_pose(ego_pose(1.0, 0.0), 0.5));
    assert_eq!(tracker.localization().len(), 1);
}

// =============================================================================
// Test 7: Fusion and radar modes
// =============================================================================

#[test]
fn test_integration_fusion_radar_refines_velocity() {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Fusion)).expect("Failed to create tracker");
    tracker.process_batch(ObservationBatch::new(vec![lidar(0.0, 10.0, 0.0, ObjectClass::Vehicle)]));
    let confidence = tracker.identities()[0].confidence();

    tracker.process_batch(ObservationBatch::new(vec![
        radar(0.1, 10.0, 0.0, 5.0, 0.0),
        radar(0.1, 100.0, 0.0, 5.0, 0.0),
    ]));

    // Radar alone never creates identities in fusion mode
    assert_eq!(tracker.identities().len(), 1);
    let identity = &tracker.identities()[0];
    assert_eq!(identity.lifetime(), 2);
    assert_eq!(identity.class(), ObjectClass::Vehicle);
    assert_eq!(identity.confidence(), confidence);
    assert!(identity.sensor().contains(SensorKind::LIDAR));
    assert!(identity.sensor().contains(SensorKind::RADAR));
    assert!(identity.estimator().speed() > 0.0);

    let center = identity.bounding_box().center();
    assert_eq!(center.x, identity.estimator().x());
    assert_eq!(center.y, identity.estimator().y());
}

#[test]
fn test_integration_fusion_mixed_batch() {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Fusion)).expect("Failed to create tracker");
    tracker.process_batch(ObservationBatch::new(vec![lidar(0.0, 10.0, 0.0, ObjectClass::Vehicle)]));
    tracker.process_batch(ObservationBatch::new(vec![
        lidar(0.1, 10.2, 0.0, ObjectClass::Vehicle),
        radar(0.1, 10.2, 0.0, 2.0, 0.0),
    ]));

    // Each sensor is associated on its own, so both reach the same identity
    assert_eq!(tracker.identities().len(), 1);
    assert_eq!(tracker.identities()[0].lifetime(), 3);
}

#[test]
fn test_integration_radar_mode_spawns_from_radar() {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Radar)).expect("Failed to create tracker");
    for k in 0..5 {
        let t = k as f64 * 0.1;
        tracker.process_batch(ObservationBatch::new(vec![radar(t, 20.0 + 4.0 * t, 5.0, 4.0, 0.0)]));
    }

    assert_eq!(tracker.identities().len(), 1);
    let identity = &tracker.identities()[0];
    assert_eq!(identity.life_state(), LifeState::Confirmed);
    assert!(identity.estimator().speed() > 1.0);
}

#[test]
fn test_integration_unsupported_sensor_skipped() {
    let mut tracker = Tracker::new(TrackerConfig::new(EngineMode::Lidar)).expect("Failed to create tracker");
    let outcome = tracker.process_batch(ObservationBatch::new(vec![
        radar(0.0, 10.0, 0.0, 1.0, 0.0),
        lidar(0.0, 10.0, 0.0, ObjectClass::Vehicle),
    ]));
    assert_eq!(outcome, BatchOutcome::Processed);
    assert_eq!(tracker.identities().len(), 1);
    assert_eq!(tracker.stats().skipped_observations, 1);
}

// =============================================================================
// Test 8: Configuration files
// =============================================================================

#[test]
fn test_integration_config_from_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("tracker.json");
    std::fs::write(&path, r#"{"mode": "fusion", "lifecycle": {"min_lifetime_to_confirm": 2}}"#).expect("write config");

    let config = TrackerConfig::from_json_file(&path).expect("valid config");
    assert_eq!(config.mode, EngineMode::Fusion);

    let mut tracker = Tracker::new(config).expect("Failed to create tracker");
    tracker.process_batch(ObservationBatch::new(vec![lidar(0.0, 10.0, 0.0, ObjectClass::Vehicle)]));
    tracker.process_batch(ObservationBatch::new(vec![lidar(0.1, 10.0, 0.0, ObjectClass::Vehicle)]));
    assert_eq!(tracker.identities()[0].life_state(), LifeState::Confirmed);
}
