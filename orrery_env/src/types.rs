//! Common value types shared between the core and the host engine.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Points closer than this to the camera plane are treated as behind it.
const NEAR_PLANE: f64 = 1e-3;

/// Vectors shorter than this cannot be normalized.
const MIN_NORM: f64 = 1e-12;

/// Size of the render target in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Width over height; 1.0 for a degenerate viewport.
    pub fn aspect(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// The pixel at the middle of the viewport.
    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.width * 0.5, self.height * 0.5)
    }

    /// Returns true if the point lies on the render target.
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= 0.0 && point.x <= self.width && point.y >= 0.0 && point.y <= self.height
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

/// A position on screen in pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: ScreenPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A half-line with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vector3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Builds a ray, normalizing the direction.
    ///
    /// Returns `None` for a zero-length direction.
    pub fn new(origin: Vector3<f64>, direction: Vector3<f64>) -> Option<Self> {
        let direction = direction.try_normalize(MIN_NORM)?;
        Some(Self { origin, direction })
    }

    /// Point at parameter `t` along the ray.
    pub fn point_at(&self, t: f64) -> Vector3<f64> {
        self.origin + self.direction * t
    }
}

/// Linear RGB color with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Mixes the color towards white by `amount` (0 = unchanged, 1 = white).
    pub fn lighten(&self, amount: f32) -> Self {
        let t = amount.clamp(0.0, 1.0);
        Self {
            r: self.r + (1.0 - self.r) * t,
            g: self.g + (1.0 - self.g) * t,
            b: self.b + (1.0 - self.b) * t,
        }
    }

    /// CSS-style `#rrggbb` string.
    pub fn to_hex(&self) -> String {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", channel(self.r), channel(self.g), channel(self.b))
    }
}

/// Snapshot of the engine camera for one frame.
///
/// `fov` is the vertical field of view in radians. The core also uses it as
/// the angular threshold for "in view" tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub position: Vector3<f64>,
    pub forward: Vector3<f64>,
    pub up: Vector3<f64>,
    pub fov: f64,
    pub viewport: Viewport,
}

impl CameraState {
    /// Creates a camera at `position` looking along `forward`.
    ///
    /// A zero `forward` falls back to -Z; `up` is re-orthogonalized against it.
    pub fn new(position: Vector3<f64>, forward: Vector3<f64>, fov: f64, viewport: Viewport) -> Self {
        let forward = forward
            .try_normalize(MIN_NORM)
            .unwrap_or_else(|| -Vector3::z());
        let up = orthogonal_up(&forward);
        Self {
            position,
            forward,
            up,
            fov,
            viewport,
        }
    }

    /// Creates a camera at `eye` looking at `target`.
    pub fn looking_at(eye: Vector3<f64>, target: Vector3<f64>, fov: f64, viewport: Viewport) -> Self {
        Self::new(eye, target - eye, fov, viewport)
    }

    /// The point `distance` units in front of the camera.
    pub fn look_target(&self, distance: f64) -> Vector3<f64> {
        self.position + self.forward * distance
    }

    pub fn distance_to(&self, point: &Vector3<f64>) -> f64 {
        (point - self.position).norm()
    }

    /// Angle in radians between the camera forward and the camera→point vector.
    ///
    /// Returns `None` when the point coincides with the camera.
    pub fn angle_to(&self, point: &Vector3<f64>) -> Option<f64> {
        let to_point = (point - self.position).try_normalize(MIN_NORM)?;
        Some(self.forward.dot(&to_point).clamp(-1.0, 1.0).acos())
    }

    /// Right and up unit vectors of the view basis.
    pub fn basis(&self) -> (Vector3<f64>, Vector3<f64>) {
        let right = self
            .forward
            .cross(&self.up)
            .try_normalize(MIN_NORM)
            .unwrap_or_else(|| Vector3::x());
        let up = right.cross(&self.forward);
        (right, up)
    }

    /// Projects a world point to screen pixels.
    ///
    /// Returns `None` for points behind the camera or outside the viewport.
    pub fn project(&self, point: &Vector3<f64>) -> Option<ScreenPoint> {
        let relative = point - self.position;
        let depth = relative.dot(&self.forward);
        if depth <= NEAR_PLANE {
            return None;
        }

        let (right, up) = self.basis();
        let half_height = (self.fov * 0.5).tan();
        let half_width = half_height * self.viewport.aspect();

        let ndc_x = relative.dot(&right) / (depth * half_width);
        let ndc_y = relative.dot(&up) / (depth * half_height);
        if ndc_x.abs() > 1.0 || ndc_y.abs() > 1.0 {
            return None;
        }

        Some(ScreenPoint::new(
            (ndc_x + 1.0) * 0.5 * self.viewport.width,
            (1.0 - ndc_y) * 0.5 * self.viewport.height,
        ))
    }

    /// The world-space ray through a screen pixel.
    pub fn viewport_ray(&self, screen: ScreenPoint) -> Option<Ray> {
        if self.viewport.width <= 0.0 || self.viewport.height <= 0.0 {
            return None;
        }
        let (right, up) = self.basis();
        let half_height = (self.fov * 0.5).tan();
        let half_width = half_height * self.viewport.aspect();

        let ndc_x = screen.x / self.viewport.width * 2.0 - 1.0;
        let ndc_y = 1.0 - screen.y / self.viewport.height * 2.0;

        let direction = self.forward + right * (ndc_x * half_width) + up * (ndc_y * half_height);
        Ray::new(self.position, direction)
    }

    /// The ray straight down the view axis.
    pub fn center_ray(&self) -> Ray {
        Ray {
            origin: self.position,
            direction: self.forward,
        }
    }
}

/// World +Y made orthogonal to `forward`, or +Z when looking straight up/down.
fn orthogonal_up(forward: &Vector3<f64>) -> Vector3<f64> {
    let world_up = Vector3::y();
    let candidate = world_up - forward * forward.dot(&world_up);
    candidate
        .try_normalize(1e-6)
        .unwrap_or_else(|| Vector3::z())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> CameraState {
        CameraState::looking_at(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -10.0),
            1.0,
            Viewport::new(800.0, 600.0),
        )
    }

    #[test]
    fn test_center_projects_to_viewport_center() {
        let cam = camera();
        let screen = cam.project(&Vector3::new(0.0, 0.0, -5.0)).unwrap();
        assert_relative_eq!(screen.x, 400.0, epsilon = 1e-9);
        assert_relative_eq!(screen.y, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_points_behind_camera_do_not_project() {
        let cam = camera();
        assert!(cam.project(&Vector3::new(0.0, 0.0, 5.0)).is_none());
    }

    #[test]
    fn test_right_of_axis_projects_right_of_center() {
        let cam = camera();
        let screen = cam.project(&Vector3::new(1.0, 1.0, -10.0)).unwrap();
        assert!(screen.x > 400.0);
        // Screen y grows downward
        assert!(screen.y < 300.0);
    }

    #[test]
    fn test_viewport_ray_round_trips_projection() {
        let cam = camera();
        let point = Vector3::new(1.5, -0.5, -8.0);
        let screen = cam.project(&point).unwrap();
        let ray = cam.viewport_ray(screen).unwrap();

        let expected = (point - cam.position).normalize();
        assert_relative_eq!(ray.direction, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_angle_to_point() {
        let cam = camera();
        assert_relative_eq!(cam.angle_to(&Vector3::new(0.0, 0.0, -3.0)).unwrap(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(
            cam.angle_to(&Vector3::new(3.0, 0.0, 0.0)).unwrap(),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-9
        );
        assert!(cam.angle_to(&cam.position).is_none());
    }

    #[test]
    fn test_zero_direction_ray_is_rejected() {
        assert!(Ray::new(Vector3::zeros(), Vector3::zeros()).is_none());
    }

    #[test]
    fn test_rgb_lighten_and_hex() {
        let red = Rgb::new(1.0, 0.0, 0.0);
        assert_eq!(red.to_hex(), "#ff0000");
        assert_eq!(red.lighten(1.0), Rgb::WHITE);
        assert_eq!(red.lighten(0.0), red);
    }
}
