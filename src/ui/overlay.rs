//! Slide text overlay rendering.

use skia_safe::textlayout::{
    FontCollection, Paragraph, ParagraphBuilder, ParagraphStyle, TextAlign, TextStyle,
};
use skia_safe::{Canvas, FontMgr, Paint, Point, RRect, Rect};

use crate::config::{Colors, Config};
use crate::geometry::{Point as GeometryPoint, Size};
use crate::slider::overlay::OverlaySynchronizer;
use crate::slides::SlideDescriptor;

/// Widest text block at scale 1.
const MAX_TEXT_WIDTH: f32 = 640.;

/// Fraction of the viewport width available for text.
const TEXT_WIDTH_RATIO: f32 = 0.84;

/// Vertical space between overlay elements at scale 1.
const SPACING: f32 = 16.;

/// Button padding at scale 1.
const BUTTON_PADDING: (f32, f32) = (24., 10.);

/// Paints the title, subtitle and button of visible overlays.
pub struct OverlayPainter {
    font_collection: FontCollection,
    title_style: ParagraphStyle,
    subtitle_style: ParagraphStyle,
    button_style: ParagraphStyle,
    button_paint: Paint,

    colors: Colors,
    font_family: String,
    font_size: f64,
    title_size: f64,
    scale: f64,

    /// Button of the active overlay in physical pixels.
    button: Option<(usize, Rect)>,
}

impl OverlayPainter {
    pub fn new(config: &Config, scale: f64) -> Self {
        let mut font_collection = FontCollection::new();
        font_collection.set_default_font_manager(FontMgr::new(), None);

        let mut painter = Self {
            font_collection,
            scale,
            colors: config.colors,
            font_family: config.font.family.clone(),
            font_size: config.font.size,
            title_size: config.font.title_size,
            title_style: ParagraphStyle::new(),
            subtitle_style: ParagraphStyle::new(),
            button_style: ParagraphStyle::new(),
            button_paint: Paint::default(),
            button: None,
        };
        painter.rebuild_styles();

        painter
    }

    /// Draw all visible overlays, centered in the viewport.
    pub fn draw(
        &mut self,
        canvas: &Canvas,
        viewport: Size<f32>,
        slides: &[SlideDescriptor],
        overlays: &OverlaySynchronizer,
    ) {
        self.button = None;

        let scale = self.scale as f32;
        let width = (viewport.width * TEXT_WIDTH_RATIO).min(MAX_TEXT_WIDTH * scale);
        let center = Point::new(viewport.width / 2., viewport.height / 2.);

        for binding in overlays.visible() {
            let slide = match slides.get(binding.index) {
                Some(slide) => slide,
                None => continue,
            };

            let block = self.layout(slide, width);
            let origin = Point::new(center.x - width / 2., center.y - block.height(scale) / 2.);

            let alpha = (binding.opacity().clamp(0., 1.) * 255.).round() as u32;
            let overlay_scale = binding.scale() as f32;

            canvas.save_layer_alpha(None::<Rect>, alpha);
            canvas.translate(center);
            canvas.scale((overlay_scale, overlay_scale));
            canvas.translate(-center);

            let button = block.paint(canvas, origin, width, scale, &self.button_paint);

            canvas.restore();

            if overlays.active() == Some(binding.index) {
                let button = button.map(|rect| scale_about(rect, center, overlay_scale));
                self.button = button.map(|rect| (binding.index, rect));
            }
        }
    }

    /// Slide whose button is at a physical position.
    pub fn button_at(&self, point: GeometryPoint<f64>) -> Option<usize> {
        self.button.filter(|(_, rect)| point.within(rect)).map(|(index, _)| index)
    }

    /// Handle config updates.
    pub fn update_config(&mut self, config: &Config) {
        let dirty = self.font_family != config.font.family
            || self.font_size != config.font.size
            || self.title_size != config.font.title_size
            || self.colors != config.colors;

        if dirty {
            self.font_family = config.font.family.clone();
            self.font_size = config.font.size;
            self.title_size = config.font.title_size;
            self.colors = config.colors;
            self.rebuild_styles();
        }
    }

    /// Update render scale.
    pub fn set_scale_factor(&mut self, scale: f64) {
        self.scale = scale;
        self.rebuild_styles();
    }

    /// Forget the hit area of the last drawn button.
    pub fn clear(&mut self) {
        self.button = None;
    }

    fn rebuild_styles(&mut self) {
        let foreground = self.colors.foreground.as_color4f();
        let families = [&self.font_family];

        let mut text_paint = Paint::default();
        text_paint.set_color4f(foreground, None);
        text_paint.set_anti_alias(true);

        let paragraph_style = |size: f64, max_lines: usize| {
            let mut text_style = TextStyle::new();
            text_style.set_foreground_paint(&text_paint);
            text_style.set_font_size((size * self.scale) as f32);
            text_style.set_font_families(&families);

            let mut paragraph_style = ParagraphStyle::new();
            paragraph_style.set_text_align(TextAlign::Center);
            paragraph_style.set_text_style(&text_style);
            paragraph_style.set_max_lines(max_lines);
            paragraph_style.set_ellipsis("…");
            paragraph_style
        };

        self.title_style = paragraph_style(self.title_size, 2);
        self.subtitle_style = paragraph_style(self.font_size, 4);
        self.button_style = paragraph_style(self.font_size, 1);

        self.button_paint.set_color4f(self.colors.accent.as_color4f(), None);
        self.button_paint.set_anti_alias(true);
    }

    /// Lay out the text of a slide.
    fn layout(&self, slide: &SlideDescriptor, width: f32) -> TextBlock {
        let paragraph = |style: &ParagraphStyle, text: &str| {
            if text.is_empty() {
                return None;
            }

            let mut builder = ParagraphBuilder::new(style, &self.font_collection);
            builder.add_text(text);
            let mut paragraph = builder.build();
            paragraph.layout(width);
            Some(paragraph)
        };

        TextBlock {
            title: paragraph(&self.title_style, &slide.title),
            subtitle: paragraph(&self.subtitle_style, &slide.subtitle),
            button: paragraph(&self.button_style, &slide.button),
        }
    }
}

/// Laid out overlay text.
struct TextBlock {
    title: Option<Paragraph>,
    subtitle: Option<Paragraph>,
    button: Option<Paragraph>,
}

impl TextBlock {
    /// Total height including spacing and button padding.
    fn height(&self, scale: f32) -> f32 {
        let mut heights = Vec::with_capacity(3);
        heights.extend(self.title.as_ref().map(|title| title.height()));
        heights.extend(self.subtitle.as_ref().map(|subtitle| subtitle.height()));
        heights.extend(self.button.as_ref().map(|button| {
            button.height() + 2. * BUTTON_PADDING.1 * scale
        }));

        let spacing = heights.len().saturating_sub(1) as f32 * SPACING * scale;
        heights.iter().sum::<f32>() + spacing
    }

    /// Paint the text block.
    ///
    /// Returns the button's rectangle in canvas coordinates.
    fn paint(
        &self,
        canvas: &Canvas,
        mut origin: Point,
        width: f32,
        scale: f32,
        button_paint: &Paint,
    ) -> Option<Rect> {
        let spacing = SPACING * scale;

        for paragraph in [&self.title, &self.subtitle].into_iter().flatten() {
            paragraph.paint(canvas, origin);
            origin.y += paragraph.height() + spacing;
        }

        let label = self.button.as_ref()?;
        let (x_padding, y_padding) = (BUTTON_PADDING.0 * scale, BUTTON_PADDING.1 * scale);
        let label_width = label.max_intrinsic_width().min(width - 2. * x_padding);
        let button_width = label_width + 2. * x_padding;
        let button_height = label.height() + 2. * y_padding;

        let x = origin.x + (width - button_width) / 2.;
        let rect = Rect::from_xywh(x, origin.y, button_width, button_height);
        let radius = button_height / 2.;
        canvas.draw_rrect(RRect::new_rect_xy(rect, radius, radius), button_paint);

        label.paint(canvas, Point::new(origin.x, origin.y + y_padding));

        Some(rect)
    }
}

/// Scale a rectangle around a fixed point.
fn scale_about(rect: Rect, center: Point, scale: f32) -> Rect {
    let transform = |point: Point| center + (point - center) * scale;
    let top_left = transform(Point::new(rect.left, rect.top));
    let bottom_right = transform(Point::new(rect.right, rect.bottom));
    Rect::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_about_center() {
        let rect = Rect::from_xywh(0., 0., 100., 40.);
        let scaled = scale_about(rect, Point::new(50., 20.), 0.5);
        assert_eq!(scaled, Rect::from_xywh(25., 10., 50., 20.));

        assert_eq!(scale_about(rect, Point::new(10., 10.), 1.), rect);
    }

    #[test]
    fn inactive_painter_has_no_button() {
        let painter = OverlayPainter::new(&Config::default(), 1.);
        assert_eq!(painter.button_at(GeometryPoint::new(0., 0.)), None);
    }
}
