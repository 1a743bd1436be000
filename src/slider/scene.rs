//! Curved slide surface.
//!
//! The slide texture is wrapped around a horizontal cylinder of radius one,
//! with texture row zero facing the camera. Only the visible arc is
//! tessellated, and the mesh is projected once per geometry change; per
//! frame only the texture shader is swapped.

use std::f32::consts::TAU;

use glam::{Mat4, Vec3};
use skia_safe::vertices::VertexMode;
use skia_safe::{
    BlendMode, Canvas, Color, FilterMode, Image, MipmapMode, Paint, Point, SamplingOptions,
    TileMode, Vertices,
};

use crate::geometry::Size;
use crate::slider::layout::LayoutGeometry;

/// Brightness at the grazing edge of the visible arc.
const EDGE_SHADE: f32 = 0.35;

/// Tessellated cylinder segment.
#[derive(Debug, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    /// Texture pixel coordinates.
    pub tex_coords: Vec<Point>,
    pub shades: Vec<f32>,
    pub indices: Vec<u16>,
}

impl Mesh {
    pub fn new(layout: &LayoutGeometry) -> Self {
        let columns = layout.columns.max(1) as usize;
        let rows = layout.rows.max(1) as usize;
        let raster_width = layout.raster.width as f32;
        let raster_height = layout.raster.height.max(1) as f32;

        // Keep texture pixels square on the surface.
        let length = raster_width * TAU / raster_height;
        let arc = layout.curvature as f32;

        let mut mesh = Self::default();
        for row in 0..=rows {
            let angle = -arc / 2. + arc * row as f32 / rows as f32;
            let shade = EDGE_SHADE + (1. - EDGE_SHADE) * angle.cos();

            for column in 0..=columns {
                let u = column as f32 / columns as f32;
                let position = Vec3::new((u - 0.5) * length, -angle.sin(), angle.cos());

                mesh.positions.push(position);
                mesh.tex_coords.push(Point::new(u * raster_width, angle / TAU * raster_height));
                mesh.shades.push(shade);
            }
        }

        let stride = columns + 1;
        for row in 0..rows {
            for column in 0..columns {
                let top_left = (row * stride + column) as u16;
                let top_right = top_left + 1;
                let bottom_left = top_left + stride as u16;
                let bottom_right = bottom_left + 1;
                mesh.indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }

        mesh
    }
}

/// Perspective camera looking at the cylinder axis.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    view_projection: Mat4,
    viewport: Size<f32>,
}

impl Camera {
    pub fn new(layout: &LayoutGeometry, viewport: Size<f32>) -> Self {
        let distance = layout.camera_distance as f32;
        let tilt = layout.camera_tilt as f32;
        let eye = Vec3::new(0., distance * tilt.sin(), distance * tilt.cos());

        let aspect = viewport.width / viewport.height.max(1.);
        let projection = Mat4::perspective_rh(layout.fov as f32, aspect, 0.1, 100.);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);

        Self { view_projection: projection * view, viewport }
    }

    /// Project a world position to viewport pixels.
    pub fn project(&self, position: Vec3) -> Point {
        let ndc = self.view_projection.project_point3(position);
        let x = (ndc.x + 1.) / 2. * self.viewport.width;
        let y = (1. - ndc.y) / 2. * self.viewport.height;
        Point::new(x, y)
    }
}

/// Projected surface ready for drawing.
pub struct Scene {
    vertices: Vertices,
    viewport: Size<f32>,
    paint: Paint,
}

impl Scene {
    pub fn new(layout: &LayoutGeometry, viewport: Size<f32>) -> Self {
        let mesh = Mesh::new(layout);
        let camera = Camera::new(layout, viewport);

        let positions: Vec<_> = mesh.positions.iter().map(|pos| camera.project(*pos)).collect();
        let colors: Vec<_> = mesh
            .shades
            .iter()
            .map(|shade| {
                let value = (shade * 255.).round() as u8;
                Color::from_rgb(value, value, value)
            })
            .collect();

        let vertices = Vertices::new_copy(
            VertexMode::Triangles,
            &positions,
            &mesh.tex_coords,
            &colors,
            Some(mesh.indices.as_slice()),
        );

        let mut paint = Paint::default();
        paint.set_anti_alias(true);

        Self { vertices, viewport, paint }
    }

    /// Use a new texture for the surface.
    pub fn set_texture(&mut self, image: &Image) {
        let sampling = SamplingOptions::new(FilterMode::Linear, MipmapMode::None);
        let shader = image.to_shader((TileMode::Clamp, TileMode::Repeat), sampling, None);
        self.paint.set_shader(shader);
    }

    /// Draw the surface, stretching it if the viewport changed since projection.
    pub fn draw(&self, canvas: &Canvas, viewport: Size<f32>) {
        if self.paint.shader().is_none() {
            return;
        }

        canvas.save();
        if viewport != self.viewport {
            let x_scale = viewport.width / self.viewport.width.max(1.);
            let y_scale = viewport.height / self.viewport.height.max(1.);
            canvas.scale((x_scale, y_scale));
        }
        canvas.draw_vertices(&self.vertices, BlendMode::Modulate, &self.paint);
        canvas.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slider::layout::Halo;

    fn mobile() -> LayoutGeometry {
        LayoutGeometry::new(Size::new(390, 844), 7, Halo::default())
    }

    #[test]
    fn mesh_topology() {
        let layout = mobile();
        let mesh = Mesh::new(&layout);

        let columns = layout.columns as usize;
        let rows = layout.rows as usize;
        assert_eq!(mesh.positions.len(), (columns + 1) * (rows + 1));
        assert_eq!(mesh.tex_coords.len(), mesh.positions.len());
        assert_eq!(mesh.indices.len(), columns * rows * 6);
        assert!(mesh.indices.iter().all(|index| (*index as usize) < mesh.positions.len()));
    }

    #[test]
    fn front_row_samples_texture_origin() {
        let layout = mobile();
        let mesh = Mesh::new(&layout);

        let front = (layout.rows as usize / 2) * (layout.columns as usize + 1);
        assert!(mesh.tex_coords[front].y.abs() < 1e-3);
        assert!((mesh.positions[front].z - 1.).abs() < 1e-6);
        assert!((mesh.shades[front] - 1.).abs() < 1e-6);

        // Rows above the front wrap into the bottom of the texture.
        assert!(mesh.tex_coords[0].y < 0.);
        assert!(mesh.shades[0] < mesh.shades[front]);
    }

    #[test]
    fn untilted_camera_centers_front() {
        let layout = mobile();
        assert_eq!(layout.camera_tilt, 0.);

        let viewport = Size::new(390., 844.);
        let camera = Camera::new(&layout, viewport);

        let center = camera.project(Vec3::new(0., 0., 1.));
        assert!((center.x - 195.).abs() < 1e-2);
        assert!((center.y - 422.).abs() < 1e-2);

        let left = camera.project(Vec3::new(-0.3, 0., 1.));
        let right = camera.project(Vec3::new(0.3, 0., 1.));
        assert!((left.x + right.x - 390.).abs() < 1e-2);

        // Slides further down the arc end up lower on screen.
        let below = camera.project(Vec3::new(0., -0.5, 0.866));
        assert!(below.y > center.y);
    }
}
