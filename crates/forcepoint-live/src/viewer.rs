//! kiss3d marker display
//!
//! Top-down view of the display plane:
//! - ±20 unit display region (grey border)
//! - ±12 unit reference square (white)
//! - Sphere marker, green on contact, dim red otherwise
//!
//! Display x/y map straight onto kiss3d x/y; the camera looks down -z.
//!
//! Controls:
//! - Mouse drag: Rotate view
//! - Scroll: Zoom
//! - Esc / close: Stop the loop

use kiss3d::camera::ArcBall;
use kiss3d::light::Light;
use kiss3d::nalgebra::{Point3, Translation3};
use kiss3d::scene::SceneNode;
use kiss3d::window::Window;

use forcepoint_core::Estimate;

use crate::sink::MarkerSink;

/// Half-width of the drawn display region
const REGION_EXTENT: f32 = 20.0;
/// Half-width of the reference square
const REFERENCE_EXTENT: f32 = 12.0;
const MARKER_RADIUS: f32 = 0.8;
const CAMERA_DISTANCE: f32 = 60.0;

pub struct ViewerSink {
    window: Window,
    camera: ArcBall,
    marker: SceneNode,
}

impl ViewerSink {
    pub fn new(title: &str) -> Self {
        let mut window = Window::new(title);
        window.set_light(Light::StickToCamera);
        window.set_background_color(0.05, 0.05, 0.1);

        let mut marker = window.add_sphere(MARKER_RADIUS);
        marker.set_color(0.5, 0.2, 0.2);

        let eye = Point3::new(0.0, 0.0, CAMERA_DISTANCE);
        let at = Point3::origin();

        Self {
            window,
            camera: ArcBall::new(eye, at),
            marker,
        }
    }

    fn draw_square(&mut self, half: f32, color: Point3<f32>) {
        let corners = [
            Point3::new(-half, -half, 0.0),
            Point3::new(half, -half, 0.0),
            Point3::new(half, half, 0.0),
            Point3::new(-half, half, 0.0),
        ];
        for i in 0..corners.len() {
            let next = corners[(i + 1) % corners.len()];
            self.window.draw_line(&corners[i], &next, &color);
        }
    }

    /// Draw the static overlay and present one frame
    fn render(&mut self) -> bool {
        self.draw_square(REGION_EXTENT, Point3::new(0.4, 0.4, 0.4));
        self.draw_square(REFERENCE_EXTENT, Point3::new(1.0, 1.0, 1.0));

        // Axes
        let origin = Point3::origin();
        self.window
            .draw_line(&origin, &Point3::new(2.0, 0.0, 0.0), &Point3::new(1.0, 0.0, 0.0));
        self.window
            .draw_line(&origin, &Point3::new(0.0, 2.0, 0.0), &Point3::new(0.0, 1.0, 0.0));

        self.window.render_with_camera(&mut self.camera)
    }
}

impl MarkerSink for ViewerSink {
    fn present(&mut self, estimate: &Estimate) -> bool {
        let marker = estimate.marker();
        self.marker
            .set_local_translation(Translation3::new(marker.x as f32, marker.y as f32, 0.0));
        if estimate.is_contact() {
            self.marker.set_color(0.2, 0.9, 0.3);
        } else {
            self.marker.set_color(0.5, 0.2, 0.2);
        }
        self.render()
    }

    fn idle(&mut self) -> bool {
        self.render()
    }
}
