//! Free-fly camera, its controller and the uniform uploaded to the GPU.
//!
//! The camera looks along +Z when yaw and pitch are zero. Movement keys,
//! pointer drags, touches and the mouse wheel all end up in
//! [`CameraController`], which applies them once per frame in [`CameraController::update`].

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, TouchPhase, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::config::{CameraSettings, KeyBindings, ZoomSettings};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.0001;

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Point3<f32>,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
}

impl Camera {
    pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        position: V,
        yaw: Y,
        pitch: P,
    ) -> Self {
        Self {
            position: position.into(),
            yaw: yaw.into(),
            pitch: pitch.into(),
        }
    }

    /// Unit vector the camera is looking along (the camera's local Z axis).
    pub fn forward(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        Vector3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw).normalize()
    }

    /// Screen-right as seen through [`Camera::calc_matrix`].
    pub fn right(&self) -> Vector3<f32> {
        self.forward().cross(Vector3::unit_y()).normalize()
    }

    /// Moves the camera along its forward axis by the wheel offset.
    pub fn zoom(&mut self, delta_y: f32, zoom: &ZoomSettings) {
        self.position += self.forward() * zoom.offset(delta_y);
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.forward(), Vector3::unit_y())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns raw input into camera motion.
///
/// Key presses only flip "amount" flags; the actual movement happens in
/// [`CameraController::update`] so it is frame-rate independent.
#[derive(Debug, Clone)]
pub struct CameraController {
    speed: f32,
    look_sensitivity: f32,
    bindings: KeyBindings,
    amount_forward: f32,
    amount_backward: f32,
    amount_left: f32,
    amount_right: f32,
    rotate_horizontal: f32,
    rotate_vertical: f32,
    dragging: bool,
    last_pointer: Option<PhysicalPosition<f64>>,
    touch_id: Option<u64>,
}

impl CameraController {
    pub fn new(settings: &CameraSettings) -> Self {
        Self {
            speed: settings.speed,
            look_sensitivity: settings.look_sensitivity,
            bindings: settings.bindings,
            amount_forward: 0.0,
            amount_backward: 0.0,
            amount_left: 0.0,
            amount_right: 0.0,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            dragging: false,
            last_pointer: None,
            touch_id: None,
        }
    }

    /// Returns `true` if `key` is one of the movement bindings.
    pub fn process_key(&mut self, key: KeyCode, pressed: bool) -> bool {
        let amount = if pressed { 1.0 } else { 0.0 };
        match key {
            k if k == self.bindings.up => self.amount_forward = amount,
            k if k == self.bindings.down => self.amount_backward = amount,
            k if k == self.bindings.left => self.amount_left = amount,
            k if k == self.bindings.right => self.amount_right = amount,
            _ => return false,
        }
        true
    }

    pub fn process_pointer_button(&mut self, pressed: bool) {
        self.dragging = pressed;
        if !pressed {
            self.last_pointer = None;
        }
    }

    pub fn process_pointer_moved(&mut self, position: PhysicalPosition<f64>) {
        if self.dragging {
            if let Some(last) = self.last_pointer {
                self.rotate_horizontal += (position.x - last.x) as f32;
                self.rotate_vertical += (position.y - last.y) as f32;
            }
        }
        self.last_pointer = Some(position);
    }

    fn process_touch(&mut self, id: u64, phase: TouchPhase, location: PhysicalPosition<f64>) {
        // Only the first finger steers, extra fingers are ignored
        match phase {
            TouchPhase::Started if self.touch_id.is_none() => {
                self.touch_id = Some(id);
                self.last_pointer = Some(location);
                self.dragging = true;
            }
            TouchPhase::Moved if self.touch_id == Some(id) => self.process_pointer_moved(location),
            TouchPhase::Ended | TouchPhase::Cancelled if self.touch_id == Some(id) => {
                self.touch_id = None;
                self.process_pointer_button(false);
            }
            _ => (),
        }
    }

    /// Feeds a winit window event into the controller. Returns `true` if it was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => match event.physical_key {
                PhysicalKey::Code(code) => {
                    self.process_key(code, event.state == ElementState::Pressed)
                }
                PhysicalKey::Unidentified(_) => false,
            },
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.process_pointer_button(state.is_pressed());
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.process_pointer_moved(*position);
                self.dragging
            }
            WindowEvent::Touch(touch) => {
                self.process_touch(touch.id, touch.phase, touch.location);
                true
            }
            _ => false,
        }
    }

    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        // speed is specified per 60 Hz frame
        let frames = dt.as_secs_f32() * 60.0;
        let forward = camera.forward();
        let right = camera.right();
        camera.position += forward * (self.amount_forward - self.amount_backward) * self.speed * frames;
        camera.position += right * (self.amount_right - self.amount_left) * self.speed * frames;

        camera.yaw += Rad(self.rotate_horizontal * self.look_sensitivity);
        camera.pitch += Rad(-self.rotate_vertical * self.look_sensitivity);
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;

        if camera.pitch < -Rad(SAFE_FRAC_PI_2) {
            camera.pitch = -Rad(SAFE_FRAC_PI_2);
        } else if camera.pitch > Rad(SAFE_FRAC_PI_2) {
            camera.pitch = Rad(SAFE_FRAC_PI_2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_camera() -> Camera {
        Camera::new((0.0, 2.0, -20.0), Rad(0.0), Rad(0.0))
    }

    fn assert_close(actual: Point3<f32>, expected: Point3<f32>) {
        let diff = actual - expected;
        assert!(diff.magnitude() < 1e-4, "{:?} != {:?}", actual, expected);
    }

    #[test]
    fn wheel_moves_along_forward_axis() {
        let mut camera = start_camera();
        camera.zoom(100.0, &ZoomSettings::default());
        assert_close(camera.position, Point3::new(0.0, 2.0, -18.0));

        camera.yaw = Rad(FRAC_PI_2);
        camera.zoom(-50.0, &ZoomSettings::default());
        assert_close(camera.position, Point3::new(-1.0, 2.0, -18.0));
    }

    #[test]
    fn movement_keys_follow_bindings() {
        let settings = CameraSettings::default();
        let mut controller = CameraController::new(&settings);
        let mut camera = start_camera();

        assert!(controller.process_key(KeyCode::KeyW, true));
        assert!(!controller.process_key(KeyCode::KeyQ, true));
        controller.update(&mut camera, Duration::from_secs_f32(1.0 / 60.0));
        assert_close(camera.position, Point3::new(0.0, 2.0, -19.5));

        controller.process_key(KeyCode::KeyW, false);
        controller.update(&mut camera, Duration::from_secs_f32(1.0 / 60.0));
        assert_close(camera.position, Point3::new(0.0, 2.0, -19.5));
    }

    #[test]
    fn strafing_is_perpendicular_to_forward() {
        let mut controller = CameraController::new(&CameraSettings::default());
        let mut camera = start_camera();
        controller.process_key(KeyCode::KeyD, true);
        controller.update(&mut camera, Duration::from_secs_f32(1.0 / 60.0));
        let moved = camera.position - Point3::new(0.0, 2.0, -20.0);
        assert!(moved.dot(Vector3::unit_z()).abs() < 1e-5);
        assert!((moved.magnitude() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn drag_rotates_and_pitch_is_clamped() {
        let mut controller = CameraController::new(&CameraSettings::default());
        let mut camera = start_camera();

        // moving without a pressed button only records the position
        controller.process_pointer_moved(PhysicalPosition::new(0.0, 0.0));
        controller.update(&mut camera, Duration::ZERO);
        assert_eq!(camera.yaw, Rad(0.0));

        controller.process_pointer_button(true);
        controller.process_pointer_moved(PhysicalPosition::new(100.0, -100_000.0));
        controller.update(&mut camera, Duration::ZERO);
        assert!((camera.yaw.0 - 0.2).abs() < 1e-5);
        assert_eq!(camera.pitch, Rad(SAFE_FRAC_PI_2));
    }
}
