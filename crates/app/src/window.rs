use std::time::Instant;

use pixels::{Pixels, SurfaceTexture};
use vibe_visualiser_core::{PixmapSurface, Result, VibeError, Visualizer};
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

/// What a key press asks the visualiser to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NextStyle,
    NextColorMode,
    ToggleCapture,
    Quit,
}

impl Command {
    pub fn from_key(key: VirtualKeyCode) -> Option<Self> {
        match key {
            VirtualKeyCode::Tab => Some(Command::NextStyle),
            VirtualKeyCode::C => Some(Command::NextColorMode),
            VirtualKeyCode::Space => Some(Command::ToggleCapture),
            VirtualKeyCode::Escape => Some(Command::Quit),
            _ => None,
        }
    }

    /// Applies the command; returns `false` when the loop should exit.
    pub fn apply(self, visualizer: &mut Visualizer) -> bool {
        match self {
            Command::NextStyle => visualizer.set_style(visualizer.style().next()),
            Command::NextColorMode => visualizer.set_color_mode(visualizer.color_mode().next()),
            Command::ToggleCapture => visualizer.toggle_capture(),
            Command::Quit => return false,
        }
        true
    }
}

/// Opens the window and runs the frame loop until it is closed.
pub fn run(mut visualizer: Visualizer, width: u32, height: u32) -> Result<()> {
    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("Vibe Visualiser")
        .with_inner_size(LogicalSize::new(width as f64, height as f64))
        .with_min_inner_size(LogicalSize::new(160.0, 120.0))
        .build(&event_loop)
        .map_err(|err| VibeError::msg(format!("cannot open window: {err}")))?;

    let inner = window.inner_size();
    let surface_texture = SurfaceTexture::new(inner.width, inner.height, &window);
    let mut pixels = Pixels::new(inner.width, inner.height, surface_texture)
        .map_err(|err| VibeError::msg(format!("cannot create frame buffer: {err}")))?;
    let mut surface = PixmapSurface::new(inner.width, inner.height)?;

    visualizer.request_start();
    let mut last_frame = Instant::now();
    tracing::info!(width = inner.width, height = inner.height, "window opened");

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                WindowEvent::Resized(size) => {
                    if size.width == 0 || size.height == 0 {
                        return;
                    }
                    if let Err(err) = pixels.resize_surface(size.width, size.height) {
                        tracing::error!(%err, "surface resize failed");
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                    if let Err(err) = pixels.resize_buffer(size.width, size.height) {
                        tracing::error!(%err, "buffer resize failed");
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                    if let Err(err) = surface.resize(size.width, size.height) {
                        tracing::error!(%err, "pixmap resize failed");
                        *control_flow = ControlFlow::Exit;
                    }
                }
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(key),
                            ..
                        },
                    ..
                } => {
                    if let Some(command) = Command::from_key(key) {
                        if !command.apply(&mut visualizer) {
                            *control_flow = ControlFlow::Exit;
                        }
                    }
                }
                _ => {}
            },
            Event::MainEventsCleared => window.request_redraw(),
            Event::RedrawRequested(_) => {
                let now = Instant::now();
                visualizer.tick(&mut surface, now - last_frame);
                last_frame = now;

                let frame = pixels.frame_mut();
                if frame.len() == surface.data().len() {
                    frame.copy_from_slice(surface.data());
                }
                if let Err(err) = pixels.render() {
                    tracing::error!(%err, "present failed");
                    *control_flow = ControlFlow::Exit;
                }
            }
            Event::LoopDestroyed => {
                visualizer.request_stop();
                tracing::info!("window closed");
            }
            _ => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(Command::from_key(VirtualKeyCode::Tab), Some(Command::NextStyle));
        assert_eq!(Command::from_key(VirtualKeyCode::C), Some(Command::NextColorMode));
        assert_eq!(Command::from_key(VirtualKeyCode::Space), Some(Command::ToggleCapture));
        assert_eq!(Command::from_key(VirtualKeyCode::Escape), Some(Command::Quit));
        assert_eq!(Command::from_key(VirtualKeyCode::A), None);
    }
}
