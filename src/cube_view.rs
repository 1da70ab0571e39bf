use crate::orientation::{EulerAngles, RenderSurface};
use kiss3d::scene::SceneNode;
use kiss3d::window::Window;
use nalgebra as na;

/// The cube standing in for the board, with its own axis arrows so the
/// orientation stays readable on a symmetric shape.
pub struct CubeView {
    display_node: SceneNode,
}

impl CubeView {
    pub fn new(window: &mut Window, size: f32) -> Self {
        let mut display_node = window.add_group();
        let mut body = display_node.add_cube(size, size, size * 0.3);
        body.set_material_with_name("normals");
        add_arrows(&mut display_node, size * 0.9);
        Self { display_node }
    }
}

/// kiss3d scene nodes take single precision rotations.
fn node_rotation(rotation: &EulerAngles) -> na::UnitQuaternion<f32> {
    na::UnitQuaternion::from_euler_angles(
        rotation.roll as f32,
        rotation.pitch as f32,
        rotation.yaw as f32,
    )
}

impl RenderSurface for CubeView {
    fn set_rotation(&mut self, rotation: &EulerAngles) {
        self.display_node.set_local_rotation(node_rotation(rotation));
    }
}

fn add_arrows(node: &mut SceneNode, length: f32) {
    let mut x_arrow = node.add_cube(length, 0.02, 0.02);
    let mut y_arrow = node.add_cube(0.02, length, 0.02);
    let mut z_arrow = node.add_cube(0.02, 0.02, length);
    x_arrow.set_color(1.0, 0.0, 0.0);
    x_arrow.append_translation(&na::Translation3::new(length * 0.5, 0.0, 0.0));
    y_arrow.set_color(0.0, 1.0, 0.0);
    y_arrow.append_translation(&na::Translation3::new(0.0, length * 0.5, 0.0));
    z_arrow.set_color(0.0, 0.0, 1.0);
    z_arrow.append_translation(&na::Translation3::new(0.0, 0.0, length * 0.5));
}

/// Fixed world axes at the origin.
pub fn add_world_axes(window: &mut Window, length: f32) -> SceneNode {
    let mut node = window.add_group();
    let mut x_axis = node.add_cube(length, 0.005, 0.005);
    let mut y_axis = node.add_cube(0.005, length, 0.005);
    let mut z_axis = node.add_cube(0.005, 0.005, length);
    x_axis.set_color(0.6, 0.2, 0.2);
    x_axis.append_translation(&na::Translation3::new(length * 0.5, 0.0, 0.0));
    y_axis.set_color(0.2, 0.6, 0.2);
    y_axis.append_translation(&na::Translation3::new(0.0, length * 0.5, 0.0));
    z_axis.set_color(0.2, 0.2, 0.6);
    z_axis.append_translation(&na::Translation3::new(0.0, 0.0, length * 0.5));
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_node_rotation_matches_double_precision_pose() {
        let pose = EulerAngles {
            roll: 0.4,
            pitch: -0.3,
            yaw: 2.1,
        };
        let expected = pose.to_unit_quaternion();
        let node = node_rotation(&pose);
        assert_relative_eq!(node.w, expected.w as f32, epsilon = 1e-6);
        assert_relative_eq!(node.i, expected.i as f32, epsilon = 1e-6);
        assert_relative_eq!(node.j, expected.j as f32, epsilon = 1e-6);
        assert_relative_eq!(node.k, expected.k as f32, epsilon = 1e-6);
    }
}
