//! Cyclic slide layout.
//!
//! All positions are in texture pixels. One cycle covers every slide plus
//! its trailing gap and maps onto the full texture height, so the texture
//! wraps around the cylinder exactly once.

use std::f64::consts::PI;

use crate::geometry::Size;
use crate::slider::scroll::wrap_unit;

/// Widest viewport still treated as mobile.
pub const MOBILE_MAX_WIDTH: u32 = 768;

/// Viewport class selecting the geometry profile.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

impl DeviceClass {
    pub fn for_width(width: u32) -> Self {
        if width <= MOBILE_MAX_WIDTH { Self::Mobile } else { Self::Desktop }
    }

    fn profile(&self) -> &'static Profile {
        match self {
            Self::Mobile => &MOBILE,
            Self::Desktop => &DESKTOP,
        }
    }
}

/// Fixed geometry constants of a device class.
#[derive(Debug)]
struct Profile {
    raster_width: u32,
    /// Tallest texture, longer cycles are compressed to fit.
    max_raster_height: u32,
    slide_height: f64,
    gap: f64,
    margin: f64,
    corner_radius: f64,
    arc: f64,
    camera_distance: f64,
    camera_tilt: f64,
    fov: f64,
    columns: u16,
    rows: u16,
}

const DESKTOP: Profile = Profile {
    raster_width: 1024,
    max_raster_height: 8192,
    slide_height: 576.,
    gap: 64.,
    margin: 64.,
    corner_radius: 28.,
    arc: 120. * PI / 180.,
    camera_distance: 2.4,
    camera_tilt: -6. * PI / 180.,
    fov: 40. * PI / 180.,
    columns: 12,
    rows: 48,
};

const MOBILE: Profile = Profile {
    raster_width: 512,
    max_raster_height: 4096,
    slide_height: 448.,
    gap: 40.,
    margin: 24.,
    corner_radius: 18.,
    arc: 90. * PI / 180.,
    camera_distance: 3.,
    camera_tilt: 0.,
    fov: 60. * PI / 180.,
    columns: 6,
    rows: 24,
};

/// Halo width per device class.
#[derive(Copy, Clone, Debug)]
pub struct Halo {
    pub mobile: u16,
    pub desktop: u16,
}

impl Default for Halo {
    fn default() -> Self {
        Self { mobile: 1, desktop: 2 }
    }
}

/// Geometry derived from the viewport and slide count.
#[derive(PartialEq, Clone, Debug)]
pub struct LayoutGeometry {
    pub device: DeviceClass,
    pub viewport: Size,
    pub slide_count: usize,

    pub slide_height: f64,
    pub slide_width: f64,
    pub gap: f64,
    pub cycle_height: f64,
    pub corner_radius: f64,
    pub halo: u16,

    /// Texture resolution.
    pub raster: Size,

    /// Visible arc of the cylinder in radians.
    pub curvature: f64,
    pub camera_distance: f64,
    pub camera_tilt: f64,
    pub fov: f64,

    /// Mesh tessellation along the cylinder axis.
    pub columns: u16,
    /// Mesh tessellation around the visible arc.
    pub rows: u16,
}

impl LayoutGeometry {
    pub fn new(viewport: Size, slide_count: usize, halo: Halo) -> Self {
        let device = DeviceClass::for_width(viewport.width);
        let profile = device.profile();

        let stride = profile.slide_height + profile.gap;
        let cycle_height = slide_count.max(1) as f64 * stride;
        let raster_height = (cycle_height.round() as u32).min(profile.max_raster_height);
        let raster = Size::new(profile.raster_width, raster_height);

        let halo = match device {
            DeviceClass::Mobile => halo.mobile,
            DeviceClass::Desktop => halo.desktop,
        };

        Self {
            device,
            viewport,
            slide_count,
            cycle_height,
            raster,
            halo,
            slide_height: profile.slide_height,
            slide_width: profile.raster_width as f64 - 2. * profile.margin,
            gap: profile.gap,
            corner_radius: profile.corner_radius,
            curvature: profile.arc,
            camera_distance: profile.camera_distance,
            camera_tilt: profile.camera_tilt,
            fov: profile.fov,
            columns: profile.columns,
            rows: profile.rows,
        }
    }

    /// Distance between two consecutive slide centers.
    pub fn stride(&self) -> f64 {
        self.slide_height + self.gap
    }

    /// Slide center inside one cycle, in `[0, cycle_height)`.
    pub fn position(&self, index: usize, offset: f64) -> f64 {
        let position = -(index as f64) * self.stride() + offset * self.cycle_height;
        wrap_unit(position / self.cycle_height) * self.cycle_height
    }

    /// Slide center relative to the centerline, in `[-cycle/2, cycle/2)`.
    pub fn signed_position(&self, index: usize, offset: f64) -> f64 {
        let half = self.cycle_height / 2.;
        let position = self.position(index, offset) + half;
        wrap_unit(position / self.cycle_height) * self.cycle_height - half
    }

    /// Index of the slide closest to the centerline.
    ///
    /// Ties resolve to the lowest index.
    pub fn centered_slide(&self, offset: f64) -> Option<usize> {
        let mut centered: Option<(usize, f64)> = None;
        for index in 0..self.slide_count {
            let distance = self.signed_position(index, offset).abs();
            match centered {
                Some((_, min)) if distance >= min => (),
                _ => centered = Some((index, distance)),
            }
        }
        centered.map(|(index, _)| index)
    }

    /// Convert a cycle position to a texture row.
    pub fn row(&self, position: f64) -> f64 {
        position / self.cycle_height * self.raster.height as f64
    }

    /// Slide copies intersecting the texture.
    ///
    /// Every real slide is placed once inside the cycle, plus `halo` cycle
    /// copies on either side which cover slides crossing the texture seam.
    pub fn placements(&self, offset: f64) -> Vec<Placement> {
        let raster_height = self.raster.height as f64;
        let half_height = self.row(self.slide_height) / 2.;
        let halo = self.halo as i32;

        let mut placements = Vec::with_capacity(self.slide_count);
        for index in 0..self.slide_count {
            let position = self.position(index, offset);
            for copy in -halo..=halo {
                let row = self.row(position + copy as f64 * self.cycle_height);
                if row + half_height <= 0. || row - half_height >= raster_height {
                    continue;
                }
                placements.push(Placement { index, row });
            }
        }
        placements
    }
}

/// Slide copy positioned in the texture.
#[derive(PartialEq, Copy, Clone, Debug)]
pub struct Placement {
    pub index: usize,
    /// Texture row of the slide center.
    pub row: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop(slide_count: usize) -> LayoutGeometry {
        LayoutGeometry::new(Size::new(1280, 800), slide_count, Halo::default())
    }

    #[test]
    fn device_class_cutover() {
        assert_eq!(DeviceClass::for_width(768), DeviceClass::Mobile);
        assert_eq!(DeviceClass::for_width(769), DeviceClass::Desktop);
        assert_eq!(DeviceClass::for_width(0), DeviceClass::Mobile);
    }

    #[test]
    fn cycle_height() {
        let layout = desktop(7);
        assert_eq!(layout.cycle_height, 7. * 640.);
        assert_eq!(layout.raster, Size::new(1024, 4480));
    }

    #[test]
    fn seven_slides_at_zero() {
        let layout = desktop(7);
        assert_eq!(layout.centered_slide(0.), Some(0));
        assert_eq!(layout.centered_slide(3. / 7.), Some(3));
        assert_eq!(layout.centered_slide(6.6 / 7.), Some(0));
    }

    #[test]
    fn center_is_periodic() {
        let layout = desktop(7);
        for offset in [0.1, 0.33, 0.5, 0.92] {
            let centered = layout.centered_slide(offset);
            assert_eq!(layout.centered_slide(offset + 1.), centered);
            assert_eq!(layout.centered_slide(offset - 3.), centered);
        }
    }

    #[test]
    fn ties_prefer_lowest_index() {
        let layout = desktop(2);
        assert_eq!(layout.signed_position(0, 0.25), 320.);
        assert_eq!(layout.signed_position(1, 0.25), -320.);
        assert_eq!(layout.centered_slide(0.25), Some(0));
    }

    #[test]
    fn positions_are_wrapped() {
        let layout = desktop(7);
        for index in 0..7 {
            for offset in [-2.4, -0.1, 0., 0.7, 5.3] {
                let position = layout.position(index, offset);
                assert!((0.0..layout.cycle_height).contains(&position));

                let half = layout.cycle_height / 2.;
                let signed = layout.signed_position(index, offset);
                assert!((-half..half).contains(&signed));
            }
        }
    }

    #[test]
    fn empty_layout_has_no_center() {
        let layout = desktop(0);
        assert_eq!(layout.centered_slide(0.3), None);
        assert!(layout.placements(0.3).is_empty());
    }

    #[test]
    fn halo_covers_seam() {
        let mut layout = desktop(7);

        layout.halo = 0;
        assert_eq!(layout.placements(0.).len(), 7);

        // The centered slide straddles the seam and is repeated once below.
        layout.halo = 1;
        let placements = layout.placements(0.);
        assert_eq!(placements.len(), 8);
        assert!(placements.contains(&Placement { index: 0, row: 4480. }));

        // Wider halos only add culled copies.
        layout.halo = 3;
        assert_eq!(layout.placements(0.).len(), 8);
    }

    #[test]
    fn long_cycles_are_compressed() {
        let layout = desktop(30);
        assert_eq!(layout.cycle_height, 30. * 640.);
        assert_eq!(layout.raster, Size::new(1024, 8192));

        // Rows still cover the whole texture exactly once.
        assert_eq!(layout.row(layout.cycle_height), 8192.);
        for placement in layout.placements(0.37) {
            assert!(placement.row > -layout.row(layout.slide_height));
            assert!(placement.row < 8192. + layout.row(layout.slide_height));
        }

        let mobile = LayoutGeometry::new(Size::new(390, 844), 30, Halo::default());
        assert_eq!(mobile.raster, Size::new(512, 4096));
    }

    #[test]
    fn mobile_profile() {
        let layout = LayoutGeometry::new(Size::new(390, 844), 7, Halo { mobile: 0, desktop: 2 });
        assert_eq!(layout.device, DeviceClass::Mobile);
        assert_eq!(layout.halo, 0);
        assert_eq!(layout.raster.width, 512);
        assert!(layout.rows < desktop(7).rows);
    }
}
