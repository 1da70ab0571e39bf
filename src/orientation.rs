use crate::calibration::{CalibratedOrientation, CalibrationStore};
use crate::telemetry::OrientationSample;
use nalgebra as na;

/// Hand tuned correction for how the board sits in its enclosure, in degrees,
/// applied to the cube's X, Y and Z axes on the Euler path.
pub const MOUNTING_OFFSET_DEG: [f64; 3] = [176.44, -6.75, -174.81];

/// Rotation pushed to the render surface, in radians.
///
/// Uses nalgebra's convention: `R = Rz(yaw) * Ry(pitch) * Rx(roll)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub fn from_unit_quaternion(rotation: &na::UnitQuaternion<f64>) -> Self {
        let (roll, pitch, yaw) = rotation.euler_angles();
        Self { roll, pitch, yaw }
    }

    pub fn to_unit_quaternion(&self) -> na::UnitQuaternion<f64> {
        na::UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw)
    }

    pub fn is_finite(&self) -> bool {
        self.roll.is_finite() && self.pitch.is_finite() && self.yaw.is_finite()
    }
}

/// Anything that can show a rotated object.
pub trait RenderSurface {
    fn set_rotation(&mut self, rotation: &EulerAngles);
}

/// Map a calibrated Euler reading onto the cube axes.
///
/// The board reports heading, pitch and roll. The cube rotates about X by
/// the inverted roll, about Y by the heading and about Z by the pitch, in
/// that order, with the mounting offset added on each axis.
fn cube_rotation_from_euler(degrees: &na::Vector3<f64>) -> na::UnitQuaternion<f64> {
    let x = 360.0 - degrees[2] + MOUNTING_OFFSET_DEG[0];
    let y = degrees[0] + MOUNTING_OFFSET_DEG[1];
    let z = degrees[1] + MOUNTING_OFFSET_DEG[2];
    na::UnitQuaternion::from_axis_angle(&na::Vector3::x_axis(), x.to_radians())
        * na::UnitQuaternion::from_axis_angle(&na::Vector3::y_axis(), y.to_radians())
        * na::UnitQuaternion::from_axis_angle(&na::Vector3::z_axis(), z.to_radians())
}

/// Compute the rotation for the next frame. No sample renders as identity.
pub fn compute_rotation(
    sample: Option<&OrientationSample>,
    calibration: &CalibrationStore,
) -> EulerAngles {
    let rotation = match sample.map(|sample| calibration.apply(sample)) {
        Some(CalibratedOrientation::Quaternion(q)) => q,
        Some(CalibratedOrientation::Euler(degrees)) => cube_rotation_from_euler(&degrees),
        None => na::UnitQuaternion::identity(),
    };
    let angles = EulerAngles::from_unit_quaternion(&rotation);
    if angles.is_finite() {
        angles
    } else {
        EulerAngles::default()
    }
}

/// Pushes the newest calibrated orientation to a surface once per frame.
pub struct OrientationRenderer<S: RenderSurface> {
    surface: S,
    frames: u64,
}

impl<S: RenderSurface> OrientationRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self { surface, frames: 0 }
    }

    /// Render whatever sample is current. Never waits for a new one.
    pub fn render_frame(
        &mut self,
        sample: Option<&OrientationSample>,
        calibration: &CalibrationStore,
    ) -> EulerAngles {
        let rotation = compute_rotation(sample, calibration);
        self.surface.set_rotation(&rotation);
        self.frames += 1;
        rotation
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
