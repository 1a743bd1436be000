//! Slide texture compositing.

use skia_safe::{
    Canvas, ClipOp, Color4f, FilterMode, Image, ImageInfo, MipmapMode, Paint, RRect, Rect,
    SamplingOptions, Surface,
};

use tracing::error;

use crate::geometry::Size;
use crate::slider::layout::LayoutGeometry;
use crate::slides::SlideDescriptor;

/// Texture appearance.
#[derive(Copy, Clone, Debug)]
pub struct TextureStyle {
    pub background: Color4f,
    /// Opacity of slides other than the centered one.
    pub dim: f32,
}

/// Raster holding one full slide cycle.
#[derive(Default)]
pub struct SlideTexture {
    surface: Option<Surface>,
    image: Option<Image>,
    size: Size,
}

impl SlideTexture {
    /// Redraw all slides for an offset.
    ///
    /// The backing surface is allocated through `target`, so it lives on the
    /// same backend as the canvas it is painted onto.
    ///
    /// Returns the number of slide images drawn.
    pub fn compose(
        &mut self,
        target: &Canvas,
        layout: &LayoutGeometry,
        slides: &[SlideDescriptor],
        offset: f64,
        centered: Option<usize>,
        style: TextureStyle,
    ) -> usize {
        let surface = match self.surface(target, layout.raster) {
            Some(surface) => surface,
            None => return 0,
        };
        let canvas = surface.canvas();
        canvas.clear(style.background);

        let sampling = SamplingOptions::new(FilterMode::Linear, MipmapMode::None);
        let mut dimmed = Paint::default();
        dimmed.set_alpha_f(style.dim);
        let focused = Paint::default();

        let mut drawn = 0;
        for placement in layout.placements(offset) {
            // Slides without image keep their slot but stay blank.
            let image = match slides.get(placement.index).and_then(|slide| slide.image.as_ref()) {
                Some(image) => image,
                None => continue,
            };

            let region = slide_region(layout, placement.row);
            let image_size = Size::new(image.width() as f32, image.height() as f32);
            let destination = cover_rect(image_size, region);
            let paint = if centered == Some(placement.index) { &focused } else { &dimmed };

            let radius = layout.corner_radius as f32;
            canvas.save();
            canvas.clip_rrect(RRect::new_rect_xy(region, radius, radius), ClipOp::Intersect, true);
            canvas.draw_image_rect_with_sampling_options(image, None, destination, sampling, paint);
            canvas.restore();

            drawn += 1;
        }

        let image = surface.image_snapshot();
        self.image = Some(image);

        drawn
    }

    /// Latest composed texture.
    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    /// Drop the backing surface and texture.
    pub fn release(&mut self) {
        self.image = None;
        self.surface = None;
        self.size = Size::default();
    }

    /// Get the backing surface, reallocating it on size change.
    fn surface(&mut self, target: &Canvas, size: Size) -> Option<&mut Surface> {
        if self.size != size || self.surface.is_none() {
            let info = ImageInfo::new_n32_premul(size, None);
            self.surface = target.new_surface(&info, None);
            if self.surface.is_none() && self.size != size {
                error!("Failed to allocate {}x{} slide texture", size.width, size.height);
            }
            self.size = size;
        }

        self.surface.as_mut()
    }
}

/// Texture region of a slide centered on a row.
pub fn slide_region(layout: &LayoutGeometry, row: f64) -> Rect {
    let height = layout.row(layout.slide_height);
    let x = (layout.raster.width as f64 - layout.slide_width) / 2.;
    let y = row - height / 2.;
    Rect::from_xywh(x as f32, y as f32, layout.slide_width as f32, height as f32)
}

/// Scale an image to cover a region, preserving its aspect ratio.
///
/// The result is centered on the region and overflows it on one axis.
pub fn cover_rect(image: Size<f32>, region: Rect) -> Rect {
    if image.width <= 0. || image.height <= 0. {
        return region;
    }

    let image_ratio = image.width / image.height;
    let region_ratio = region.width() / region.height();

    if image_ratio > region_ratio {
        let width = region.height() * image_ratio;
        let x = region.left + (region.width() - width) / 2.;
        Rect::from_xywh(x, region.top, width, region.height())
    } else {
        let height = region.width() / image_ratio;
        let y = region.top + (region.height() - height) / 2.;
        Rect::from_xywh(region.left, y, region.width(), height)
    }
}

#[cfg(test)]
mod tests {
    use skia_safe::{Color, surfaces};

    use super::*;
    use crate::slider::layout::Halo;

    fn test_image() -> Image {
        let mut surface = surfaces::raster_n32_premul((16, 9)).unwrap();
        surface.canvas().clear(Color::RED);
        surface.image_snapshot()
    }

    fn slide(index: usize, image: Option<Image>) -> SlideDescriptor {
        SlideDescriptor {
            index,
            image,
            title: format!("Slide {index}"),
            subtitle: String::new(),
            button: String::new(),
            route: String::new(),
        }
    }

    #[test]
    fn cover_wide_image() {
        let region = Rect::from_xywh(10., 20., 100., 100.);
        let rect = cover_rect(Size::new(200., 100.), region);
        assert_eq!(rect, Rect::from_xywh(-40., 20., 200., 100.));
    }

    #[test]
    fn cover_tall_image() {
        let region = Rect::from_xywh(0., 0., 160., 90.);
        let rect = cover_rect(Size::new(100., 100.), region);
        assert_eq!(rect, Rect::from_xywh(0., -35., 160., 160.));
    }

    #[test]
    fn cover_matching_ratio() {
        let region = Rect::from_xywh(5., 5., 160., 90.);
        let rect = cover_rect(Size::new(16., 9.), region);
        assert!((rect.width() - region.width()).abs() < 1e-3);
        assert!((rect.height() - region.height()).abs() < 1e-3);

        // Degenerate images fill the region.
        assert_eq!(cover_rect(Size::new(0., 9.), region), region);
    }

    #[test]
    fn region_is_centered_on_row() {
        let layout = LayoutGeometry::new(Size::new(1280, 800), 7, Halo::default());
        let region = slide_region(&layout, 1000.);
        assert!((region.center_y() - 1000.).abs() < 1e-3);
        assert!((region.center_x() - 512.).abs() < 1e-3);
        assert!((region.height() - 576.).abs() < 1e-3);
    }

    #[test]
    fn broken_images_are_skipped() {
        let layout = LayoutGeometry::new(Size::new(390, 844), 4, Halo { mobile: 0, desktop: 0 });
        let slides = [
            slide(0, Some(test_image())),
            slide(1, None),
            slide(2, Some(test_image())),
            slide(3, None),
        ];

        let mut target = surfaces::raster_n32_premul((8, 8)).unwrap();
        let style = TextureStyle { background: Color4f::new(0., 0., 0., 1.), dim: 0.5 };

        let mut texture = SlideTexture::default();
        let drawn = texture.compose(target.canvas(), &layout, &slides, 0.1, Some(1), style);

        assert_eq!(drawn, 2);
        let image = texture.image().unwrap();
        assert_eq!(image.width() as u32, layout.raster.width);
        assert_eq!(image.height() as u32, layout.raster.height);

        texture.release();
        assert!(texture.image().is_none());
    }
}
