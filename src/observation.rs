//! Sensor observations and observation batches.
//!
//! Observations are immutable once built. They are constructed through
//! [`ObservationBuilder`], which validates every field before handing out an
//! [`Observation`].

use std::fmt;
use std::ops::BitOr;

use nalgebra::{Matrix2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::polar_from_cartesian;
use crate::{Error, Result};

/// Object classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    #[default]
    Unknown,
    Vehicle,
    Truck,
    Cyclist,
    Pedestrian,
}

impl ObjectClass {
    /// Number of classes; class indices are `0..COUNT`.
    pub const COUNT: usize = 5;

    pub const ALL: [ObjectClass; Self::COUNT] = [
        ObjectClass::Unknown,
        ObjectClass::Vehicle,
        ObjectClass::Truck,
        ObjectClass::Cyclist,
        ObjectClass::Pedestrian,
    ];

    pub fn index(self) -> usize {
        match self {
            ObjectClass::Unknown => 0,
            ObjectClass::Vehicle => 1,
            ObjectClass::Truck => 2,
            ObjectClass::Cyclist => 3,
            ObjectClass::Pedestrian => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Bitmask of contributing sensors.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorKind(u8);

impl SensorKind {
    pub const NONE: SensorKind = SensorKind(0);
    pub const LIDAR: SensorKind = SensorKind(1);
    pub const CAMERA: SensorKind = SensorKind(1 << 1);
    pub const RADAR: SensorKind = SensorKind(1 << 2);

    /// Single-sensor kinds, in bit order.
    pub const SINGLES: [SensorKind; 3] = [SensorKind::LIDAR, SensorKind::CAMERA, SensorKind::RADAR];

    pub fn from_bits(bits: u8) -> Self {
        SensorKind(bits & 0b111)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: SensorKind) -> bool {
        !other.is_empty() && self.0 & other.0 == other.0
    }

    pub fn union(self, other: SensorKind) -> Self {
        SensorKind(self.0 | other.0)
    }

    /// Iterate over the single-sensor bits set in this mask.
    pub fn iter(self) -> impl Iterator<Item = SensorKind> {
        Self::SINGLES.into_iter().filter(move |s| self.contains(*s))
    }

    /// The sensor that drives dispatch for this mask: lidar, then camera, then radar.
    pub fn primary(self) -> SensorKind {
        self.iter().next().unwrap_or(SensorKind::NONE)
    }
}

impl BitOr for SensorKind {
    type Output = SensorKind;

    fn bitor(self, rhs: SensorKind) -> SensorKind {
        self.union(rhs)
    }
}

impl fmt::Debug for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .iter()
            .map(|s| match s {
                SensorKind::LIDAR => "Lidar",
                SensorKind::CAMERA => "Camera",
                _ => "Radar",
            })
            .collect();
        if names.is_empty() {
            write!(f, "SensorKind(None)")
        } else {
            write!(f, "SensorKind({})", names.join("|"))
        }
    }
}

/// A single detection from one (or several fused) sensors.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    timestamp: f64,
    sensor: SensorKind,
    class: ObjectClass,
    confidence: f64,
    center: Vector3<f64>,
    heading: f64,
    pitch: f64,
    length: f64,
    width: f64,
    height: f64,
    velocity: Option<Vector2<f64>>,
    velocity_covariance: Option<Matrix2<f64>>,
}

impl Observation {
    /// Start building an observation for the given sensor mask.
    pub fn builder(timestamp: f64, sensor: SensorKind) -> ObservationBuilder {
        ObservationBuilder::new(timestamp, sensor)
    }

    /// Lidar detection: center `[x, y, z]`, heading and extents `[length, width, height]`.
    pub fn lidar(timestamp: f64, center: [f64; 3], heading: f64, extents: [f64; 3]) -> ObservationBuilder {
        Self::builder(timestamp, SensorKind::LIDAR)
            .with_center(center)
            .with_heading(heading)
            .with_extents(extents)
    }

    /// Camera detection: center `[x, y, z]`, heading and extents `[length, width, height]`.
    pub fn camera(timestamp: f64, center: [f64; 3], heading: f64, extents: [f64; 3]) -> ObservationBuilder {
        Self::builder(timestamp, SensorKind::CAMERA)
            .with_center(center)
            .with_heading(heading)
            .with_extents(extents)
    }

    /// Radar detection: planar position and planar velocity.
    ///
    /// Heading defaults to the direction of the velocity vector.
    pub fn radar(timestamp: f64, position: [f64; 2], velocity: [f64; 2]) -> ObservationBuilder {
        let (_, heading) = polar_from_cartesian(velocity[0], velocity[1]);
        Self::builder(timestamp, SensorKind::RADAR)
            .with_center([position[0], position[1], 0.0])
            .with_heading(heading)
            .with_velocity(velocity)
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn sensor(&self) -> SensorKind {
        self.sensor
    }

    pub fn class(&self) -> ObjectClass {
        self.class
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn center(&self) -> &Vector3<f64> {
        &self.center
    }

    pub fn x(&self) -> f64 {
        self.center.x
    }

    pub fn y(&self) -> f64 {
        self.center.y
    }

    pub fn z(&self) -> f64 {
        self.center.z
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Planar velocity; present only for radar observations.
    pub fn velocity(&self) -> Option<&Vector2<f64>> {
        self.velocity.as_ref()
    }

    pub fn velocity_covariance(&self) -> Option<&Matrix2<f64>> {
        self.velocity_covariance.as_ref()
    }

    pub fn is_lidar(&self) -> bool {
        self.sensor.primary() == SensorKind::LIDAR
    }

    pub fn is_camera(&self) -> bool {
        self.sensor.primary() == SensorKind::CAMERA
    }

    pub fn is_radar(&self) -> bool {
        self.sensor.primary() == SensorKind::RADAR
    }

    /// Copy of this observation placed at a different pose.
    pub(crate) fn with_pose(&self, center: Vector3<f64>, heading: f64, velocity: Option<Vector2<f64>>) -> Self {
        Self {
            center,
            heading,
            velocity,
            ..self.clone()
        }
    }
}

/// Validating builder for [`Observation`].
#[derive(Clone, Debug)]
pub struct ObservationBuilder {
    inner: Observation,
}

impl ObservationBuilder {
    fn new(timestamp: f64, sensor: SensorKind) -> Self {
        Self {
            inner: Observation {
                timestamp,
                sensor,
                class: ObjectClass::Unknown,
                confidence: 1.0,
                center: Vector3::zeros(),
                heading: 0.0,
                pitch: 0.0,
                length: 1.0,
                width: 1.0,
                height: 1.0,
                velocity: None,
                velocity_covariance: None,
            },
        }
    }

    pub fn with_class(mut self, class: ObjectClass) -> Self {
        self.inner.class = class;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.inner.confidence = confidence;
        self
    }

    pub fn with_center(mut self, center: [f64; 3]) -> Self {
        self.inner.center = Vector3::from(center);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.inner.heading = heading;
        self
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.inner.pitch = pitch;
        self
    }

    /// Extents as `[length, width, height]`.
    pub fn with_extents(mut self, extents: [f64; 3]) -> Self {
        self.inner.length = extents[0];
        self.inner.width = extents[1];
        self.inner.height = extents[2];
        self
    }

    pub fn with_velocity(mut self, velocity: [f64; 2]) -> Self {
        self.inner.velocity = Some(Vector2::from(velocity));
        self
    }

    /// Row-major 2x2 velocity covariance.
    pub fn with_velocity_covariance(mut self, covariance: [[f64; 2]; 2]) -> Self {
        self.inner.velocity_covariance = Some(Matrix2::new(
            covariance[0][0],
            covariance[0][1],
            covariance[1][0],
            covariance[1][1],
        ));
        self
    }

    /// Validate and produce the observation.
    ///
    /// # Errors
    /// Returns `Error::InvalidObservation` for non-finite numbers, a confidence
    /// outside [0, 1], non-positive length or width, negative height, an empty
    /// sensor mask, a radar observation without velocity, or a velocity on a
    /// non-radar observation.
    pub fn build(self) -> Result<Observation> {
        let obs = self.inner;
        let invalid = |msg: String| Err(Error::InvalidObservation(msg));

        if obs.sensor.is_empty() {
            return invalid("sensor mask is empty".to_string());
        }
        let scalars = [
            ("timestamp", obs.timestamp),
            ("confidence", obs.confidence),
            ("heading", obs.heading),
            ("pitch", obs.pitch),
            ("length", obs.length),
            ("width", obs.width),
            ("height", obs.height),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return invalid(format!("{} is not finite", name));
            }
        }
        if obs.center.iter().any(|v| !v.is_finite()) {
            return invalid("center is not finite".to_string());
        }
        if !(0.0..=1.0).contains(&obs.confidence) {
            return invalid(format!("confidence {} outside [0, 1]", obs.confidence));
        }
        if obs.length <= 0.0 || obs.width <= 0.0 || obs.height < 0.0 {
            return invalid(format!(
                "extents must be positive, got {}x{}x{}",
                obs.length, obs.width, obs.height
            ));
        }

        let radar = obs.sensor.contains(SensorKind::RADAR);
        match (&obs.velocity, radar) {
            (None, true) => return invalid("radar observation requires a velocity".to_string()),
            (Some(_), false) => return invalid("velocity is only accepted on radar observations".to_string()),
            (Some(v), true) if v.iter().any(|c| !c.is_finite()) => {
                return invalid("velocity is not finite".to_string())
            }
            _ => {}
        }
        if let Some(cov) = &obs.velocity_covariance {
            if !radar {
                return invalid("velocity covariance is only accepted on radar observations".to_string());
            }
            if cov.iter().any(|c| !c.is_finite()) {
                return invalid("velocity covariance is not finite".to_string());
            }
        }

        Ok(obs)
    }
}

/// A set of observations delivered together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationBatch {
    min_timestamp: Option<f64>,
    observations: Vec<Observation>,
}

impl ObservationBatch {
    /// Batch whose minimum timestamp is taken from its observations.
    pub fn new(observations: Vec<Observation>) -> Self {
        let min_timestamp = observations
            .iter()
            .map(|o| o.timestamp())
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |m| m.min(t))));
        Self {
            min_timestamp,
            observations,
        }
    }

    /// Batch with an explicit minimum timestamp.
    pub fn with_min_timestamp(observations: Vec<Observation>, min_timestamp: f64) -> Self {
        Self {
            min_timestamp: Some(min_timestamp),
            observations,
        }
    }

    /// Observation-free batch that only advances time.
    pub fn empty(timestamp: f64) -> Self {
        Self::with_min_timestamp(Vec::new(), timestamp)
    }

    pub fn min_timestamp(&self) -> Option<f64> {
        self.min_timestamp
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn into_observations(self) -> Vec<Observation> {
        self.observations
    }
}
