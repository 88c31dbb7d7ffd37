use anyhow::Result;
use log::*;
use renderer::Renderer;
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

pub use app::{App, AppContext, NoopApp};
pub use config::EngineConfig;

mod app;
mod config;
mod file;
mod renderer;
mod vulkan;

pub struct Engine {
    window: Window,
    renderer: Renderer,
    event_loop: EventLoop<()>,
    config: EngineConfig,
}

impl Engine {
    /// Opens the window and brings the renderer up. Any setup failure is
    /// returned after the partially created GPU objects are released.
    pub fn new(config: EngineConfig) -> Result<Engine> {
        // Window
        let event_loop = EventLoop::new()?;
        let window = WindowBuilder::new()
            .with_title(config.title.as_str())
            .with_inner_size(LogicalSize::new(config.width, config.height))
            .build(&event_loop)?;
        info!(
            "Created window `{}` ({}x{}).",
            config.title, config.width, config.height
        );

        let renderer = unsafe { Renderer::create(&window, &config)? };

        Ok(Engine {
            window,
            renderer,
            event_loop,
            config,
        })
    }

    /// Drives the frame loop until the window is closed or a frame fails.
    /// Teardown always happens before this returns.
    pub fn run<A: App>(self, app: &mut A) -> Result<()> {
        let Engine {
            window,
            mut renderer,
            event_loop,
            config,
        } = self;

        let mut frame = 0u64;
        let mut failure: Option<anyhow::Error> = None;

        let init = AppContext {
            window: &window,
            config: &config,
            frame,
        };
        if let Err(error) = app.on_init(&init) {
            unsafe { renderer.destroy() };
            return Err(error);
        }

        event_loop.run(|event, elwt| match event {
            // Request a redraw when all events were processed.
            Event::AboutToWait => window.request_redraw(),
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::RedrawRequested if !elwt.exiting() => {
                    let context = AppContext {
                        window: &window,
                        config: &config,
                        frame,
                    };
                    let result = app
                        .on_frame(&context)
                        .and_then(|_| unsafe { renderer.render(&window) });
                    frame += 1;

                    if let Err(error) = result {
                        error!("Frame {} failed: {:#}", frame, error);
                        failure = Some(error);
                        elwt.exit();
                    }
                }
                WindowEvent::Resized(size) => {
                    debug!("Window resized to {}x{}.", size.width, size.height);
                    renderer.request_resize();
                }
                WindowEvent::CloseRequested => elwt.exit(),
                _ => {}
            },
            Event::LoopExiting => {
                let context = AppContext {
                    window: &window,
                    config: &config,
                    frame,
                };
                if let Err(error) = app.on_cleanup(&context) {
                    error!("Cleanup hook failed: {:#}", error);
                    failure.get_or_insert(error);
                }
                unsafe { renderer.destroy() };
                info!("Frame loop ended after {} frame(s).", frame);
            }
            _ => {}
        })?;

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
