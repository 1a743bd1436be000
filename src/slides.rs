//! Slide content loading.

use std::path::{Path, PathBuf};
use std::{fs, io};

use rayon::prelude::*;
use resvg::tiny_skia::Pixmap as SvgPixmap;
use resvg::usvg::{Options as SvgOptions, Transform as SvgTransform, Tree as SvgTree};
use skia_safe::image::images;
use skia_safe::{
    AlphaType, ColorType, Data, FilterMode, Image, ImageInfo, MipmapMode, SamplingOptions,
};
use tracing::{error, info};
use xdg::BaseDirectories;

use crate::config::SlideConfig;
use crate::geometry::Size;

/// Widest decoded slide image.
///
/// Matches the widest texture profile.
const MAX_IMAGE_WIDTH: u32 = 1024;

/// Immutable slide content.
#[derive(Debug)]
pub struct SlideDescriptor {
    pub index: usize,
    /// Decoded image, `None` if loading failed.
    pub image: Option<Image>,
    pub title: String,
    pub subtitle: String,
    pub button: String,
    pub route: String,
}

/// Load all slides in parallel.
///
/// Images which cannot be loaded are logged and left blank, without
/// affecting the slide order.
pub fn load(configs: &[SlideConfig]) -> Vec<SlideDescriptor> {
    let dirs = BaseDirectories::with_prefix("slidereel");

    let slides: Vec<_> = configs
        .par_iter()
        .enumerate()
        .map(|(index, config)| {
            let image = match load_image(&dirs, &config.image) {
                Ok(image) => Some(image),
                Err(err) => {
                    error!("Failed to load slide image {:?}: {err}", config.image);
                    None
                },
            };

            SlideDescriptor {
                index,
                image,
                title: config.title.clone(),
                subtitle: config.subtitle.clone(),
                button: config.button.clone(),
                route: config.route.clone(),
            }
        })
        .collect();

    let loaded = slides.iter().filter(|slide| slide.image.is_some()).count();
    info!("Loaded {loaded}/{} slide images", slides.len());

    slides
}

/// Load and decode one slide image.
fn load_image(dirs: &BaseDirectories, path: &str) -> Result<Image, Error> {
    let path = resolve(dirs, path).ok_or_else(|| Error::NotFound(path.into()))?;
    let data = fs::read(&path)?;

    let is_svg = path.extension().is_some_and(|extension| extension.eq_ignore_ascii_case("svg"));
    if is_svg { render_svg(&data) } else { decode_raster(&data) }
}

/// Resolve relative image paths against the XDG data directories.
fn resolve(dirs: &BaseDirectories, path: &str) -> Option<PathBuf> {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.exists().then(|| path.to_path_buf());
    }

    dirs.find_data_file(path)
}

/// Rasterize an SVG at the maximum slide width.
fn render_svg(data: &[u8]) -> Result<Image, Error> {
    let svg_tree = SvgTree::from_data(data, &SvgOptions::default())?;

    let tree_size = svg_tree.size();
    let scale = MAX_IMAGE_WIDTH as f32 / tree_size.width();
    let width = MAX_IMAGE_WIDTH;
    let height = (tree_size.height() * scale).round() as u32;

    let mut pixmap = SvgPixmap::new(width, height).ok_or(Error::InvalidSize)?;
    let transform = SvgTransform::from_scale(scale, scale);
    resvg::render(&svg_tree, transform, &mut pixmap.as_mut());

    // tiny-skia pixmaps are premultiplied.
    let size = Size::new(width, height);
    let info = ImageInfo::new(size, ColorType::RGBA8888, AlphaType::Premul, None);
    let data = Data::new_copy(pixmap.data());
    images::raster_from_data(&info, data, width as usize * 4).ok_or(Error::Decode)
}

/// Decode a PNG, JPEG or WebP image, downscaling oversized images.
fn decode_raster(data: &[u8]) -> Result<Image, Error> {
    let image = Image::from_encoded(Data::new_copy(data)).ok_or(Error::Decode)?;
    if image.width() <= 0 || image.height() <= 0 {
        return Err(Error::InvalidSize);
    }

    // Scaling also forces decoding while still on the loader thread.
    let width = (image.width() as u32).min(MAX_IMAGE_WIDTH);
    let height = (image.height() as f64 * width as f64 / image.width() as f64).round() as u32;
    let size = Size::new(width, height.max(1));

    let sampling = SamplingOptions::new(FilterMode::Linear, MipmapMode::Linear);
    let info = ImageInfo::new(size, ColorType::RGBA8888, AlphaType::Premul, None);
    image.make_scaled(&info, sampling).ok_or(Error::Decode)
}

/// Slide image loading error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Svg(#[from] resvg::usvg::Error),
    #[error("unsupported image data")]
    Decode,
    #[error("invalid image size")]
    InvalidSize,
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    fn config(image: &str) -> SlideConfig {
        SlideConfig {
            image: image.into(),
            title: "Title".into(),
            subtitle: "Subtitle".into(),
            button: "Open".into(),
            route: "/about".into(),
        }
    }

    #[test]
    fn missing_images_keep_order() {
        let configs = [config("/nonexistent/a.png"), config("/nonexistent/b.svg")];
        let slides = load(&configs);

        assert_eq!(slides.len(), 2);
        for (index, slide) in slides.iter().enumerate() {
            assert_eq!(slide.index, index);
            assert!(slide.image.is_none());
            assert_eq!(slide.route, "/about");
        }
    }

    #[test]
    fn svg_images_load() {
        let path = env::temp_dir().join("slidereel-test-slide.svg");
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="160" height="90">
            <rect width="160" height="90" fill="#336699"/>
        </svg>"#;
        fs::write(&path, svg).unwrap();

        let slides = load(&[config(path.to_str().unwrap())]);
        let image = slides[0].image.as_ref().unwrap();
        assert_eq!(image.width(), 1024);
        assert_eq!(image.height(), 576);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode_raster(b"not an image"), Err(Error::Decode)));
        assert!(render_svg(b"<nope").is_err());
    }
}
