use nalgebra::{Isometry3, Matrix4, Point3, Translation3, UnitQuaternion, UnitVector3, Vector3};

/// Handle into a [`FrameGraph`]'s frame table. Frames refer to their parent
/// by handle, never by ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn unit(self) -> UnitVector3<f32> {
        match self {
            Axis::X => Vector3::x_axis(),
            Axis::Y => Vector3::y_axis(),
            Axis::Z => Vector3::z_axis(),
        }
    }
}

struct Frame {
    // local-to-parent transform
    local: Isometry3<f32>,
    parent: Option<FrameId>,
}

/// Rooted tree of coordinate frames. World transforms are recomputed on
/// every query, so a mutation anywhere in the chain is always observed.
pub struct FrameGraph {
    frames: Vec<Frame>,
}

impl FrameGraph {
    pub fn new() -> FrameGraph {
        FrameGraph { frames: vec![] }
    }

    /// Adds a frame at the identity pose. A frame without a parent is a root;
    /// its world transform equals its local transform.
    pub fn add_frame(&mut self, parent: Option<FrameId>) -> FrameId {
        let id = FrameId(self.frames.len());
        self.frames.push(Frame {
            local: Isometry3::identity(),
            parent,
        });
        id
    }

    pub fn local(&self, id: FrameId) -> Isometry3<f32> {
        self.frames[id.0].local
    }

    pub fn world(&self, id: FrameId) -> Isometry3<f32> {
        let frame = &self.frames[id.0];
        match frame.parent {
            Some(parent) => self.world(parent) * frame.local,
            None => frame.local,
        }
    }

    pub fn world_matrix(&self, id: FrameId) -> Matrix4<f32> {
        self.world(id).to_homogeneous()
    }

    /// Composes a translation into the frame's local transform. With no
    /// relative frame the delta is expressed in the frame's own axes;
    /// otherwise it is expressed in `relative_to` and mapped into the
    /// frame's parent space before being applied.
    pub fn translate(&mut self, id: FrameId, delta: Vector3<f32>, relative_to: Option<FrameId>) {
        match relative_to {
            None => {
                let frame = &mut self.frames[id.0];
                frame.local = frame.local * Translation3::from(delta);
            }
            Some(rf) => {
                let delta_parent = self.to_parent_space(id, rf).transform_vector(&delta);
                let frame = &mut self.frames[id.0];
                frame.local = Translation3::from(delta_parent) * frame.local;
            }
        }
    }

    /// Composes a rotation about a principal axis. With no relative frame
    /// the frame spins about its own axis in place; with one, the rotation
    /// happens about `relative_to`'s origin and axis, so the frame orbits it.
    pub fn rotate_axis(
        &mut self,
        id: FrameId,
        axis: Axis,
        angle_radians: f32,
        relative_to: Option<FrameId>,
    ) {
        let rotation = UnitQuaternion::from_axis_angle(&axis.unit(), angle_radians);
        match relative_to {
            None => {
                let frame = &mut self.frames[id.0];
                frame.local = frame.local * rotation;
            }
            Some(rf) => {
                let m = self.to_parent_space(id, rf);
                let frame = &mut self.frames[id.0];
                frame.local = m * rotation * m.inverse() * frame.local;
            }
        }
    }

    /// Re-expresses a point given in this frame's space in `target`'s space.
    /// Purely functional.
    pub fn map_position(&self, id: FrameId, point: Point3<f32>, target: FrameId) -> Point3<f32> {
        (self.world(target).inverse() * self.world(id)).transform_point(&point)
    }

    /// Direction variant of [`FrameGraph::map_position`]: rotation only, no
    /// translation.
    pub fn map_direction(&self, id: FrameId, vector: Vector3<f32>, target: FrameId) -> Vector3<f32> {
        (self.world(target).inverse() * self.world(id)).transform_vector(&vector)
    }

    // isometry taking coordinates in `rf`'s space to coordinates in `id`'s
    // parent space (world space when `id` is a root)
    fn to_parent_space(&self, id: FrameId, rf: FrameId) -> Isometry3<f32> {
        match self.frames[id.0].parent {
            Some(parent) => self.world(parent).inverse() * self.world(rf),
            None => self.world(rf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const TOLERANCE: f32 = 1e-5;

    fn three_level() -> (FrameGraph, FrameId, FrameId, FrameId) {
        let mut frames = FrameGraph::new();
        let root = frames.add_frame(None);
        let parent = frames.add_frame(Some(root));
        let camera = frames.add_frame(Some(parent));
        (frames, root, parent, camera)
    }

    fn assert_mat_eq(a: &Matrix4<f32>, b: &Matrix4<f32>) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < TOLERANCE, "{} != {}", a, b);
        }
    }

    fn assert_point_eq(a: Point3<f32>, b: Point3<f32>) {
        assert!((a - b).norm() < TOLERANCE, "{} != {}", a, b);
    }

    #[test]
    fn root_world_equals_local() {
        let (mut frames, root, ..) = three_level();
        frames.translate(root, Vector3::new(1.0, 2.0, 3.0), None);
        frames.rotate_axis(root, Axis::Y, 0.3, None);
        assert_mat_eq(
            &frames.world_matrix(root),
            &frames.local(root).to_homogeneous(),
        );
    }

    #[test]
    fn translation_chain_composes() {
        let (mut frames, root, parent, camera) = three_level();
        frames.translate(parent, Vector3::new(1.0, 2.0, 3.0), None);
        frames.translate(camera, Vector3::new(0.0, -5.0, 0.0), None);

        let product = frames.local(root).to_homogeneous()
            * frames.local(parent).to_homogeneous()
            * frames.local(camera).to_homogeneous();
        assert_mat_eq(&frames.world_matrix(camera), &product);
    }

    #[test]
    fn map_position_round_trips() {
        let (mut frames, _root, parent, camera) = three_level();
        frames.translate(parent, Vector3::new(-2.0, 0.5, 4.0), None);
        frames.rotate_axis(parent, Axis::Z, 1.1, None);
        frames.translate(camera, Vector3::new(0.0, -5.0, 0.0), None);
        frames.rotate_axis(camera, Axis::X, -0.7, Some(parent));

        let v = Point3::new(3.0, -1.0, 2.5);
        let mapped = frames.map_position(camera, v, parent);
        let back = frames.map_position(parent, mapped, camera);
        assert_point_eq(back, v);
    }

    #[test]
    fn orbit_about_parent_axis_moves_eye() {
        let (mut frames, _root, parent, camera) = three_level();
        frames.translate(camera, Vector3::new(0.0, -5.0, 0.0), None);
        frames.rotate_axis(camera, Axis::Z, FRAC_PI_2, Some(parent));

        let eye = frames.world(camera).transform_point(&Point3::origin());
        assert_point_eq(eye, Point3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn rotation_about_own_axis_keeps_position() {
        let (mut frames, _root, parent, _camera) = three_level();
        frames.translate(parent, Vector3::new(2.0, -1.0, 7.0), None);
        let before = frames.world(parent).transform_point(&Point3::origin());

        frames.rotate_axis(parent, Axis::Z, 0.9, None);
        let after = frames.world(parent).transform_point(&Point3::origin());
        assert_point_eq(before, after);
    }

    #[test]
    fn relative_translation_is_expressed_in_the_named_frame() {
        let (mut frames, root, parent, camera) = three_level();
        frames.rotate_axis(parent, Axis::Z, FRAC_PI_2, None);

        let before = frames.map_position(camera, Point3::origin(), root);
        frames.translate(camera, Vector3::new(1.0, 0.0, 0.0), Some(root));
        let after = frames.map_position(camera, Point3::origin(), root);

        assert_point_eq(after, before + Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn mutating_an_ancestor_is_observed_by_descendants() {
        let (mut frames, _root, parent, camera) = three_level();
        frames.translate(camera, Vector3::new(0.0, -5.0, 0.0), None);
        let before = frames.world(camera).transform_point(&Point3::origin());

        frames.translate(parent, Vector3::new(0.0, 0.0, 10.0), None);
        let after = frames.world(camera).transform_point(&Point3::origin());
        assert_point_eq(after, before + Vector3::new(0.0, 0.0, 10.0));
    }
}
