mod overlay;
mod renderer;
mod skia;
pub mod window;
