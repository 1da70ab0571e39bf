use crate::error::CalibrationError;
use crate::telemetry::OrientationSample;
use log::*;
use nalgebra as na;

/// Orientation after the calibration reference has been removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibratedOrientation {
    /// Euler angles in degrees, relative to the captured offset.
    Euler(na::Vector3<f64>),
    Quaternion(na::UnitQuaternion<f64>),
}

/// Normalize a raw quaternion, rejecting non-finite and zero-magnitude input.
pub fn normalize(q: &na::Quaternion<f64>) -> Option<na::UnitQuaternion<f64>> {
    if !q.coords.iter().all(|c| c.is_finite()) {
        return None;
    }
    let unit = na::UnitQuaternion::try_new(*q, f64::EPSILON)?;
    if unit.coords.iter().all(|c| c.is_finite()) && (unit.norm() - 1.0).abs() < 1e-6 {
        Some(unit)
    } else {
        None
    }
}

/// Reference frame captured on demand and removed from every later reading.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStore {
    euler_offset: na::Vector3<f64>,
    reference: na::UnitQuaternion<f64>,
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self {
            euler_offset: na::Vector3::zeros(),
            reference: na::UnitQuaternion::identity(),
        }
    }
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture `sample` as the new zero orientation.
    pub fn calibrate(&mut self, sample: &OrientationSample) -> Result<(), CalibrationError> {
        match sample {
            OrientationSample::Euler(vector) => {
                self.euler_offset = *vector;
                info!(
                    "Euler offset set to {:.2} {:.2} {:.2}",
                    vector.x, vector.y, vector.z
                );
            }
            OrientationSample::Quaternion(q) => {
                self.reference = normalize(q).ok_or(CalibrationError::DegenerateReference)?;
                info!("Reference quaternion set to {:?}", self.reference.coords);
            }
        }
        Ok(())
    }

    /// Drop any captured reference and go back to identity.
    pub fn reset(&mut self) {
        *self = Self::default();
        info!("Calibration reset");
    }

    pub fn is_calibrated(&self) -> bool {
        *self != Self::default()
    }

    pub fn euler_offset(&self) -> &na::Vector3<f64> {
        &self.euler_offset
    }

    pub fn reference(&self) -> &na::UnitQuaternion<f64> {
        &self.reference
    }

    /// Express `sample` relative to the captured reference.
    ///
    /// The quaternion path computes `reference⁻¹ · raw`, so the reference
    /// pose itself maps to identity. A raw quaternion that cannot be
    /// normalized is treated as identity.
    pub fn apply(&self, sample: &OrientationSample) -> CalibratedOrientation {
        match sample {
            OrientationSample::Euler(vector) => {
                CalibratedOrientation::Euler(vector - self.euler_offset)
            }
            OrientationSample::Quaternion(q) => {
                let raw = normalize(q).unwrap_or_else(na::UnitQuaternion::identity);
                CalibratedOrientation::Quaternion(self.reference.inverse() * raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quaternion_sample(w: f64, x: f64, y: f64, z: f64) -> OrientationSample {
        OrientationSample::Quaternion(na::Quaternion::new(w, x, y, z))
    }

    fn unwrap_quaternion(orientation: CalibratedOrientation) -> na::UnitQuaternion<f64> {
        match orientation {
            CalibratedOrientation::Quaternion(q) => q,
            other => panic!("expected quaternion, got {:?}", other),
        }
    }

    #[test]
    fn test_uncalibrated_apply_is_identity() {
        let store = CalibrationStore::new();
        assert!(!store.is_calibrated());

        let euler = OrientationSample::Euler(na::Vector3::new(12.0, -40.5, 170.0));
        assert_eq!(
            store.apply(&euler),
            CalibratedOrientation::Euler(na::Vector3::new(12.0, -40.5, 170.0))
        );

        let expected = na::UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1);
        let sample = OrientationSample::Quaternion(*expected.quaternion());
        let applied = unwrap_quaternion(store.apply(&sample));
        assert_relative_eq!(applied.coords, expected.coords, epsilon = 1e-12);
    }

    #[test]
    fn test_euler_round_trip() {
        let mut store = CalibrationStore::new();
        let reference = OrientationSample::Euler(na::Vector3::new(10.0, 20.0, -30.0));
        store.calibrate(&reference).unwrap();
        assert!(store.is_calibrated());
        assert_eq!(
            store.apply(&reference),
            CalibratedOrientation::Euler(na::Vector3::zeros())
        );
    }

    #[test]
    fn test_quaternion_round_trip_with_unnormalized_reference() {
        let mut store = CalibrationStore::new();
        let reference = quaternion_sample(2.0, 0.4, -1.0, 0.7);
        store.calibrate(&reference).unwrap();
        let applied = unwrap_quaternion(store.apply(&reference));
        assert_relative_eq!(applied.angle(), 0.0, epsilon = 1e-7);
    }

    #[test]
    fn test_relative_rotation_uses_reference_inverse_first() {
        let mut store = CalibrationStore::new();
        let reference = na::UnitQuaternion::from_euler_angles(0.0, 0.0, 0.5);
        let delta = na::UnitQuaternion::from_euler_angles(0.2, 0.0, 0.0);
        store
            .calibrate(&OrientationSample::Quaternion(*reference.quaternion()))
            .unwrap();
        let raw = reference * delta;
        let applied = unwrap_quaternion(store.apply(&OrientationSample::Quaternion(*raw.quaternion())));
        assert_relative_eq!(applied.angle_to(&delta), 0.0, epsilon = 1e-7);
    }

    #[test]
    fn test_apply_is_finite_for_unnormalized_input() {
        let store = CalibrationStore::new();
        for sample in [
            quaternion_sample(1e-9, 0.0, 0.0, 0.0),
            quaternion_sample(1000.0, -2000.0, 5.0, 0.1),
            quaternion_sample(0.0, 0.0, 0.0, 3.0),
        ] {
            let applied = unwrap_quaternion(store.apply(&sample));
            assert!(applied.coords.iter().all(|c| c.is_finite()));
            assert_relative_eq!(applied.norm(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_quaternion_is_neutralized() {
        let store = CalibrationStore::new();
        let applied = unwrap_quaternion(store.apply(&quaternion_sample(0.0, 0.0, 0.0, 0.0)));
        assert_eq!(applied, na::UnitQuaternion::identity());
    }

    #[test]
    fn test_degenerate_reference_keeps_previous() {
        let mut store = CalibrationStore::new();
        store.calibrate(&quaternion_sample(0.0, 1.0, 0.0, 0.0)).unwrap();
        let before = *store.reference();
        assert_eq!(
            store.calibrate(&quaternion_sample(0.0, 0.0, 0.0, 0.0)),
            Err(CalibrationError::DegenerateReference)
        );
        assert_eq!(*store.reference(), before);
    }

    #[test]
    fn test_reset() {
        let mut store = CalibrationStore::new();
        store
            .calibrate(&OrientationSample::Euler(na::Vector3::new(1.0, 2.0, 3.0)))
            .unwrap();
        store.reset();
        assert!(!store.is_calibrated());
        assert_eq!(*store.euler_offset(), na::Vector3::zeros());
    }
}
