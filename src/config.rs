//! Configuration options.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use calloop::LoopHandle;
use calloop::channel::{self, Event, Sender};
use configory::EventHandler;
use configory::docgen::{DocType, Docgen, Leaf};
use serde::de::Visitor;
use serde::{Deserialize, Deserializer};
use skia_safe::Color4f;
use tracing::{error, info};

use crate::State;
use crate::slider::layout::Halo;
use crate::slider::overlay::Fades;
use crate::slider::{self, Tuning};

/// # Slidereel
///
/// ## Syntax
///
/// Slidereel's configuration file uses the TOML format. The format's
/// specification can be found at _https://toml.io/en/v1.0.0_.
///
/// ## Location
///
/// Slidereel doesn't create the configuration file for you, but it looks for
/// one at <br> `${XDG_CONFIG_HOME:-$HOME/.config}/slidereel/slidereel.toml`.
///
/// Relative slide image paths are looked up in
/// `${XDG_DATA_HOME:-$HOME/.local/share}/slidereel/`.
///
/// ## Fields
#[derive(Docgen, Deserialize, Default, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// This section documents the `[font]` table.
    pub font: Font,
    /// This section documents the `[color]` table.
    pub colors: Colors,
    /// This section documents the `[input]` table.
    pub input: Input,
    /// This section documents the `[slider]` table.
    pub slider: Slider,
    /// This section documents the `[navigation]` table.
    pub navigation: Navigation,
    /// Ordered slide list, each entry is a `[[slides]]` table with the keys
    /// `image`, `title`, `subtitle`, `button` and `route`.
    pub slides: Slides,
}

/// Slowest accepted scroll smoothing, anything lower never settles.
const MIN_DAMPING: f64 = 0.01;

impl Config {
    /// Engine tuning derived from the configuration.
    pub fn tuning(&self) -> Tuning {
        Tuning {
            mobile: self.input.mobile.into(),
            desktop: self.input.desktop.into(),
            damping: match self.input.damping {
                damping if damping.is_finite() => damping.clamp(MIN_DAMPING, 1.),
                _ => Tuning::default().damping,
            },
            interval: Duration::from_millis(self.input.smoothing_interval.max(1) as u64),
            fling: self.input.fling.max(0.),
            halo: Halo { mobile: self.slider.halo_mobile, desktop: self.slider.halo_desktop },
            fades: Fades {
                fade_in: Duration::from_millis(self.slider.fade_in as u64),
                fade_out: Duration::from_millis(self.slider.fade_out as u64),
            },
        }
    }
}

/// Font configuration.
#[derive(Docgen, Deserialize, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Font {
    /// Font family.
    pub family: String,
    /// Subtitle and button font size.
    pub size: f64,
    /// Title font size.
    pub title_size: f64,
}

impl Default for Font {
    fn default() -> Self {
        Self { family: String::from("sans"), size: 18., title_size: 40. }
    }
}

/// Color configuration.
#[derive(Docgen, Deserialize, Copy, Clone, Hash, PartialEq, Eq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Colors {
    /// Primary foreground color.
    #[serde(alias = "fg")]
    pub foreground: Color,
    /// Primary background color.
    #[serde(alias = "bg")]
    pub background: Color,
    /// Button background color.
    pub accent: Color,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            foreground: Color::new(255, 255, 255),
            background: Color::new(12, 14, 20),
            accent: Color::new(46, 108, 246),
        }
    }
}

/// Input configuration.
#[derive(Docgen, Deserialize, PartialEq, Copy, Clone, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Input {
    /// Square of the maximum distance before touch input is considered a drag.
    pub max_tap_distance: f64,

    /// Fraction of the remaining scroll distance covered per interval.
    pub damping: f64,
    /// Milliseconds per smoothing interval.
    pub smoothing_interval: u16,
    /// Multiplier of the last drag step continued after release.
    pub fling: f64,

    /// Offset per pixel on viewports up to 768 pixels wide.
    pub mobile: Sensitivity,
    /// Offset per pixel on wider viewports.
    pub desktop: Sensitivity,
}

impl Default for Input {
    fn default() -> Self {
        let tuning = Tuning::default();
        Self {
            max_tap_distance: 400.,
            damping: tuning.damping,
            smoothing_interval: tuning.interval.as_millis() as u16,
            fling: tuning.fling,
            mobile: tuning.mobile.into(),
            desktop: tuning.desktop.into(),
        }
    }
}

/// Input sensitivity per device.
#[derive(Docgen, Deserialize, PartialEq, Copy, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct Sensitivity {
    /// Mouse drag.
    pub pointer: f64,
    /// Scroll wheel and touchpad.
    pub wheel: f64,
    /// Touch drag.
    pub touch: f64,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Tuning::default().desktop.into()
    }
}

impl From<slider::Sensitivity> for Sensitivity {
    fn from(sensitivity: slider::Sensitivity) -> Self {
        Self { pointer: sensitivity.pointer, wheel: sensitivity.wheel, touch: sensitivity.touch }
    }
}

impl From<Sensitivity> for slider::Sensitivity {
    fn from(sensitivity: Sensitivity) -> Self {
        Self { pointer: sensitivity.pointer, wheel: sensitivity.wheel, touch: sensitivity.touch }
    }
}

/// Slider configuration.
#[derive(Docgen, Deserialize, PartialEq, Copy, Clone, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Slider {
    /// Slide cycles pre-rendered around the texture seam on mobile.
    pub halo_mobile: u16,
    /// Slide cycles pre-rendered around the texture seam on desktop.
    pub halo_desktop: u16,

    /// Overlay fade-in milliseconds.
    pub fade_in: u16,
    /// Overlay fade-out milliseconds.
    pub fade_out: u16,

    /// Milliseconds without resize before the geometry is rebuilt.
    pub resize_debounce: u16,

    /// Opacity of slides which are not centered.
    pub dim: f64,
}

impl Default for Slider {
    fn default() -> Self {
        let Halo { mobile, desktop } = Halo::default();
        let fades = Fades::default();
        Self {
            halo_mobile: mobile,
            halo_desktop: desktop,
            fade_in: fades.fade_in.as_millis() as u16,
            fade_out: fades.fade_out.as_millis() as u16,
            resize_debounce: 250,
            dim: 0.55,
        }
    }
}

impl Slider {
    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce as u64)
    }
}

/// Navigation configuration.
#[derive(Docgen, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Navigation {
    /// Command executed with the target URL as its only argument.
    pub command: String,
    /// URL prefixed to slide routes.
    pub base_url: String,
}

impl Default for Navigation {
    fn default() -> Self {
        Self { command: String::from("xdg-open"), base_url: String::from("http://localhost:3000") }
    }
}

impl Navigation {
    /// Full URL of a route.
    pub fn url(&self, route: &str) -> String {
        if route.contains("://") {
            return route.into();
        }

        let base = self.base_url.trim_end_matches('/');
        if route.starts_with('/') { format!("{base}{route}") } else { format!("{base}/{route}") }
    }
}

/// Ordered slide list.
#[derive(Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(transparent)]
pub struct Slides(pub Vec<SlideConfig>);

impl Default for Slides {
    fn default() -> Self {
        let slide = |image: &str, title: &str, subtitle: &str, button: &str, route: &str| {
            SlideConfig {
                image: image.into(),
                title: title.into(),
                subtitle: subtitle.into(),
                button: button.into(),
                route: route.into(),
            }
        };

        Self(vec![
            slide(
                "slides/origins.jpg",
                "Where we started",
                "A small desk of analysts asking better questions about markets.",
                "Our story",
                "/about",
            ),
            slide(
                "slides/research.jpg",
                "Research first",
                "Every view we publish begins with primary data and patient work.",
                "Read research",
                "/research",
            ),
            slide(
                "slides/models.jpg",
                "Models with judgment",
                "Quantitative signals reviewed by people who know the sectors.",
                "Methodology",
                "/methodology",
            ),
            slide(
                "slides/independence.jpg",
                "Independent by design",
                "No banking conflicts. Our only client is the investor.",
                "Principles",
                "/principles",
            ),
            slide(
                "slides/team.jpg",
                "The team",
                "Economists, engineers and former portfolio managers.",
                "Meet the team",
                "/team",
            ),
            slide(
                "slides/clients.jpg",
                "Who we serve",
                "Funds, family offices and allocators across three continents.",
                "Get in touch",
                "/contact",
            ),
            slide(
                "slides/careers.jpg",
                "Join us",
                "We are hiring curious people who like hard problems.",
                "Careers",
                "/careers",
            ),
        ])
    }
}

impl Docgen for Slides {
    fn doc_type() -> DocType {
        DocType::Leaf(Leaf::new("slides"))
    }

    fn format(&self) -> String {
        format!("{} slides", self.0.len())
    }
}

/// Single slide.
#[derive(Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SlideConfig {
    /// Image path, relative to the data directory unless absolute.
    pub image: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub button: String,
    #[serde(default)]
    pub route: String,
}

/// RGB color.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn as_color4f(&self) -> Color4f {
        Color4f { r: self.r as f32 / 255., g: self.g as f32 / 255., b: self.b as f32 / 255., a: 1. }
    }
}

impl Docgen for Color {
    fn doc_type() -> DocType {
        DocType::Leaf(Leaf::new("color"))
    }

    fn format(&self) -> String {
        format!("\"{self}\"")
    }
}

/// Deserialize rgb color from a hex string.
impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ColorVisitor;

        impl Visitor<'_> for ColorVisitor {
            type Value = Color;

            fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str("hex color like #ff00ff")
            }

            fn visit_str<E>(self, value: &str) -> Result<Color, E>
            where
                E: serde::de::Error,
            {
                let channels = match value.strip_prefix('#') {
                    Some(channels) => channels,
                    None => {
                        return Err(E::custom(format!("color {value:?} is missing leading '#'")));
                    },
                };

                let digits = channels.len();
                if digits != 6 {
                    let msg = format!("color {value:?} has {digits} digits; expected 6");
                    return Err(E::custom(msg));
                }

                match u32::from_str_radix(channels, 16) {
                    Ok(color) => {
                        let [_, r, g, b] = color.to_be_bytes();
                        Ok(Color::new(r, g, b))
                    },
                    Err(_) => Err(E::custom(format!("color {value:?} contains non-hex digits"))),
                }
            }
        }

        deserializer.deserialize_str(ColorVisitor)
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "#{:0>2x}{:0>2x}{:0>2x}", self.r, self.g, self.b)
    }
}

/// Event handler for configuration manager updates.
pub struct ConfigEventHandler {
    tx: Sender<Config>,
}

impl ConfigEventHandler {
    pub fn new(event_loop: &LoopHandle<'static, State>) -> Self {
        // Create calloop channel to apply config updates.
        let (tx, rx) = channel::channel();
        let _ = event_loop
            .insert_source(rx, |event, _, state| {
                if let Event::Msg(config) = event {
                    state.window.update_config(config);
                }
            })
            .inspect_err(|err| error!("Failed to insert config source: {err}"));

        Self { tx }
    }

    /// Reload the configuration file.
    fn reload_config(&self, config: &configory::Config) {
        info!("Reloading configuration file");

        // Parse config or fall back to the default.
        let parsed = config
            .get::<&str, Config>(&[])
            .inspect_err(|err| error!("Config error: {err}"))
            .ok()
            .flatten()
            .unwrap_or_default();

        // Update the config.
        if let Err(err) = self.tx.send(parsed) {
            error!("Failed to send on config channel: {err}");
        }
    }
}

impl EventHandler<()> for ConfigEventHandler {
    fn file_changed(&self, config: &configory::Config) {
        self.reload_config(config);
    }

    fn ipc_changed(&self, config: &configory::Config) {
        self.reload_config(config);
    }

    fn file_error(&self, _config: &configory::Config, err: configory::Error) {
        error!("Configuration file error: {err}");
    }
}
