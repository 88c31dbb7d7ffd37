use anyhow::Result;
use winit::window::Window;

use crate::config::EngineConfig;

/// What a hook sees of the running engine.
#[derive(Clone, Copy, Debug)]
pub struct AppContext<'a> {
    pub window: &'a Window,
    pub config: &'a EngineConfig,
    /// Number of frames drawn before this call.
    pub frame: u64,
}

/// Lifecycle hooks driven by [`crate::Engine::run`].
///
/// `on_init` runs once after the renderer is fully up, `on_frame` before
/// every frame, and `on_cleanup` once when the loop exits while every GPU
/// object is still alive. An error from any hook ends the run.
pub trait App {
    fn on_init(&mut self, _context: &AppContext) -> Result<()> {
        Ok(())
    }

    fn on_frame(&mut self, _context: &AppContext) -> Result<()> {
        Ok(())
    }

    fn on_cleanup(&mut self, _context: &AppContext) -> Result<()> {
        Ok(())
    }
}

/// Draws the triangle and nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopApp;

impl App for NoopApp {}
