use anyhow::Result;
use winit::window::Window;

use crate::config::EngineConfig;
use crate::vulkan::VulkanRenderer;

pub struct Renderer {
    vk_renderer: VulkanRenderer,
}

impl Renderer {
    /// Creates every GPU object needed to draw.
    pub unsafe fn create(window: &Window, config: &EngineConfig) -> Result<Self> {
        let vk_renderer = VulkanRenderer::new(window, config)?;

        Ok(Self { vk_renderer })
    }

    /// Renders a frame.
    pub unsafe fn render(&mut self, window: &Window) -> Result<()> {
        self.vk_renderer.render(window)
    }

    pub fn request_resize(&mut self) {
        self.vk_renderer.request_resize();
    }

    /// Destroys every GPU object.
    pub unsafe fn destroy(&mut self) {
        self.vk_renderer.destroy();
    }
}
