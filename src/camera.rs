use nalgebra::{Matrix4, Point3, Vector3};
use winit::event::{ElementState, MouseButton, WindowEvent};

use crate::transform::{Axis, FrameGraph, FrameId};

#[inline]
pub(crate) fn deg2rad(deg: f32) -> f32 {
    deg * std::f32::consts::PI / 180.0
}

// drag scaling: pixels to world units / pixels to degrees
const TXYZ_SCALAR: f32 = 0.01;
const RXYZ_SCALAR: f32 = 0.25;

pub trait Camera {
    // the camera frame's world matrix, mapping view space into world space
    fn eye_to_world(&self) -> Matrix4<f32>;
    fn eye_position(&self) -> Point3<f32>;
}

pub trait InteractiveCamera: Camera {
    /// Feeds one window event into the camera. Returns true when the camera
    /// moved and the convergence run must be restarted.
    fn handle_event(&mut self, event: &WindowEvent) -> bool;
}

/// Orbit/pan/dolly camera over a fixed root -> parent -> camera frame
/// hierarchy. The parent frame is the orbit target; the eye starts backed
/// away from it along -y, looking at it.
pub struct OrbitCamera {
    frames: FrameGraph,
    parent: FrameId,
    camera: FrameId,

    l_button_down: bool,
    r_button_down: bool,
    shift_down: bool,
    ctrl_down: bool,
    lx: f32,
    ly: f32,
}

impl OrbitCamera {
    pub fn new() -> OrbitCamera {
        let mut frames = FrameGraph::new();
        let root = frames.add_frame(None);
        let parent = frames.add_frame(Some(root));
        let camera = frames.add_frame(Some(parent));
        frames.translate(camera, Vector3::new(0.0, -5.0, 0.0), None);

        OrbitCamera {
            frames,
            parent,
            camera,
            l_button_down: false,
            r_button_down: false,
            shift_down: false,
            ctrl_down: false,
            lx: 0.0,
            ly: 0.0,
        }
    }

    pub fn orbit_target(&self) -> Point3<f32> {
        self.frames
            .world(self.parent)
            .transform_point(&Point3::origin())
    }

    fn apply_drag(&mut self, x: f32, y: f32) -> bool {
        if !self.l_button_down && !self.r_button_down {
            return false;
        }
        let dx = x - self.lx;
        let dy = y - self.ly;
        if dx == 0.0 && dy == 0.0 {
            return false;
        }

        if (self.l_button_down && self.r_button_down) || (self.l_button_down && self.shift_down) {
            // dolly along the camera's own view axis
            self.frames.translate(
                self.camera,
                Vector3::new(0.0, dx * TXYZ_SCALAR, 0.0),
                None,
            );
        } else if (self.l_button_down && self.ctrl_down) || self.r_button_down {
            // move the orbit target in camera space
            let dv = self.frames.map_direction(
                self.camera,
                Vector3::new(-dx * TXYZ_SCALAR, 0.0, dy * TXYZ_SCALAR),
                self.parent,
            );
            self.frames.translate(self.parent, dv, None);
        } else {
            // yaw the orbit target around its own z-axis, pitch the camera
            // around the target's x-axis
            self.frames
                .rotate_axis(self.parent, Axis::Z, deg2rad(-dx) * RXYZ_SCALAR, None);
            self.frames.rotate_axis(
                self.camera,
                Axis::X,
                deg2rad(-dy) * RXYZ_SCALAR,
                Some(self.parent),
            );
        }
        true
    }
}

impl Camera for OrbitCamera {
    fn eye_to_world(&self) -> Matrix4<f32> {
        self.frames.world_matrix(self.camera)
    }

    fn eye_position(&self) -> Point3<f32> {
        self.frames
            .world(self.camera)
            .transform_point(&Point3::origin())
    }
}

impl InteractiveCamera for OrbitCamera {
    fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                let down = *state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.l_button_down = down,
                    MouseButton::Right => self.r_button_down = down,
                    _ => {}
                }
                false
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.shift_down = modifiers.state().shift_key();
                self.ctrl_down = modifiers.state().control_key();
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                let x = position.x as f32;
                let y = position.y as f32;
                let moved = self.apply_drag(x, y);
                self.lx = x;
                self.ly = y;
                moved
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-5;

    #[test]
    fn starts_backed_away_from_the_target() {
        let camera = OrbitCamera::new();
        let eye = camera.eye_position();
        assert!((eye - Point3::new(0.0, -5.0, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn idle_cursor_motion_does_not_restart() {
        let mut camera = OrbitCamera::new();
        assert!(!camera.apply_drag(100.0, 100.0));
        let eye = camera.eye_position();
        assert!((eye - Point3::new(0.0, -5.0, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn dolly_moves_along_the_view_axis() {
        let mut camera = OrbitCamera::new();
        camera.l_button_down = true;
        camera.r_button_down = true;
        assert!(camera.apply_drag(100.0, 0.0));

        let eye = camera.eye_position();
        // 100 px at 0.01 world units per px, toward the target
        assert!((eye - Point3::new(0.0, -4.0, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn orbit_preserves_distance_to_the_target() {
        let mut camera = OrbitCamera::new();
        camera.l_button_down = true;
        assert!(camera.apply_drag(37.0, -12.0));

        let distance = (camera.eye_position() - camera.orbit_target()).norm();
        assert!((distance - 5.0).abs() < TOLERANCE);
    }

    #[test]
    fn pan_carries_the_camera_with_the_target() {
        let mut camera = OrbitCamera::new();
        camera.r_button_down = true;
        assert!(camera.apply_drag(50.0, 0.0));

        let offset = camera.eye_position() - camera.orbit_target();
        // the eye-to-target offset is unchanged by a pan
        assert!((offset - Vector3::new(0.0, -5.0, 0.0)).norm() < TOLERANCE);
        // and the target itself moved in the camera's x direction
        assert!((camera.orbit_target().x - (-0.5)).abs() < TOLERANCE);
    }
}
