//! Class compatibility gate.

use crate::observation::ObjectClass;

/// Whether an identity of class `identity` may absorb an observation of class `observation`.
///
/// Vetoed pairs (in either order): vehicle/pedestrian, truck/pedestrian,
/// truck/cyclist.
pub fn can_associate(identity: ObjectClass, observation: ObjectClass) -> bool {
    use ObjectClass::*;
    !matches!(
        (identity, observation),
        (Vehicle, Pedestrian)
            | (Pedestrian, Vehicle)
            | (Truck, Pedestrian)
            | (Pedestrian, Truck)
            | (Truck, Cyclist)
            | (Cyclist, Truck)
    )
}
