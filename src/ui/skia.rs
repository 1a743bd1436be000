//! Skia graphics rendering.

use skia_safe::gpu::gl::{Format, FramebufferInfo, Interface};
use skia_safe::gpu::{
    DirectContext, SurfaceOrigin, backend_render_targets, direct_contexts, surfaces,
};
use skia_safe::{Canvas as SkiaCanvas, ColorType, Surface as SkiaSurface};
use tracing::error;

use crate::geometry::Size;
use crate::gl;
use crate::gl::types::GLint;

/// OpenGL-based Skia render target.
#[derive(Default)]
pub struct Canvas {
    surface: Option<Surface>,
}

impl Canvas {
    /// Draw to the Skia canvas.
    ///
    /// Returns `false` if no GPU surface could be created.
    pub fn draw<F>(&mut self, gl_config: GlConfig, size: Size, f: F) -> bool
    where
        F: FnOnce(&SkiaCanvas),
    {
        // Create Skia surface on-demand.
        if self.surface.is_none() {
            self.surface = Surface::new(gl_config, size);
        }
        let surface = match &mut self.surface {
            Some(surface) => surface,
            None => return false,
        };

        // Resize surface if necessary.
        if !surface.resize(gl_config, size) {
            return false;
        }

        // Perform custom rendering operations.
        f(surface.surface.canvas());

        // Flush GPU commands.
        surface.context.flush_and_submit();

        true
    }

    /// Free all GPU resources.
    ///
    /// This must be called while the OpenGL context is still alive.
    pub fn release(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.context.free_gpu_resources();
        }
    }
}

struct Surface {
    fb_info: FramebufferInfo,
    context: DirectContext,
    surface: SkiaSurface,
    size: Size,
}

impl Surface {
    fn new(gl_config: GlConfig, size: Size) -> Option<Self> {
        let interface = Interface::new_native()?;
        let mut context = direct_contexts::make_gl(interface, None)?;

        let mut fboid: GLint = 0;
        unsafe { gl::GetIntegerv(gl::FRAMEBUFFER_BINDING, &mut fboid) };
        let fb_info = FramebufferInfo {
            fboid: fboid.try_into().ok()?,
            format: Format::RGBA8.into(),
            ..Default::default()
        };

        let surface = Self::create_surface(fb_info, &mut context, gl_config, size);
        if surface.is_none() {
            error!("Failed to create Skia GPU surface");
        }

        Some(Self { context, fb_info, size, surface: surface? })
    }

    /// Resize the underlying Skia surface.
    ///
    /// The previous surface is kept if no new one could be created.
    fn resize(&mut self, gl_config: GlConfig, size: Size) -> bool {
        if self.size == size {
            return true;
        }

        match Self::create_surface(self.fb_info, &mut self.context, gl_config, size) {
            Some(surface) => {
                self.surface = surface;
                self.size = size;
                true
            },
            None => {
                error!("Failed to resize Skia surface to {}x{}", size.width, size.height);
                false
            },
        }
    }

    /// Create a new Skia surface for a framebuffer.
    fn create_surface(
        fb_info: FramebufferInfo,
        context: &mut DirectContext,
        gl_config: GlConfig,
        size: Size,
    ) -> Option<SkiaSurface> {
        let size = (size.width as i32, size.height as i32);
        let target = backend_render_targets::make_gl(
            size,
            gl_config.sample_count,
            gl_config.stencil_size,
            fb_info,
        );
        surfaces::wrap_backend_render_target(
            context,
            &target,
            SurfaceOrigin::BottomLeft,
            ColorType::RGBA8888,
            None,
            None,
        )
    }
}

/// Skia OpenGL config parameters.
#[derive(Copy, Clone)]
pub struct GlConfig {
    pub stencil_size: usize,
    pub sample_count: usize,
}
