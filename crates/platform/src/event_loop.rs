//! Event pumping for a single-window, caller-driven render loop.
//!
//! Instead of handing control to `EventLoop::run_app`, the render loop owns
//! the iteration and pumps pending events once per frame. While the window is
//! minimized the renderer blocks in [`ViewportSource::wait_events`] instead.

use std::time::Duration;

use ash::vk;
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

use ember_core::{Error, Result, WindowConfig};

use crate::input::InputState;
use crate::viewport::ViewportSource;
use crate::window::Window;

/// Pumps allowed for the platform to deliver `resumed` and create the window.
const WINDOW_CREATION_PUMPS: usize = 100;

/// Event-side state updated by the winit callbacks.
struct WindowState {
    config: WindowConfig,
    /// Filled by `resumed`, then moved into [`Platform`].
    created: Option<Window>,
    creation_error: Option<Error>,
    resized: bool,
    close_requested: bool,
    input: InputState,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.created.is_some() || self.creation_error.is_some() {
            return;
        }
        match Window::new(event_loop, &self.config) {
            Ok(window) => self.created = Some(window),
            Err(e) => {
                self.creation_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                self.resized = true;
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        ..
                    },
                ..
            } => match state {
                ElementState::Pressed if key == KeyCode::Escape => {
                    info!("Escape pressed");
                    self.close_requested = true;
                }
                ElementState::Pressed => self.input.on_key_pressed(key),
                ElementState::Released => self.input.on_key_released(key),
            },
            WindowEvent::Focused(false) => self.input.release_all(),
            _ => {}
        }
    }
}

/// The window plus the event loop that feeds it.
pub struct Platform {
    window: Window,
    event_loop: EventLoop<()>,
    state: WindowState,
}

impl Platform {
    /// Creates the event loop and opens the window described by `config`.
    ///
    /// # Errors
    /// Returns [`Error::Window`] if the event loop cannot be created or the
    /// window never appears.
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;
        let mut state = WindowState {
            config: config.clone(),
            created: None,
            creation_error: None,
            resized: false,
            close_requested: false,
            input: InputState::new(),
        };

        for _ in 0..WINDOW_CREATION_PUMPS {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(1)), &mut state);
            if let Some(e) = state.creation_error.take() {
                return Err(e);
            }
            if let Some(window) = state.created.take() {
                // Resizes reported before the first frame are already
                // reflected in the initial surface.
                state.resized = false;
                return Ok(Self {
                    window,
                    event_loop,
                    state,
                });
            }
            if let PumpStatus::Exit(code) = status {
                return Err(Error::Window(format!(
                    "Event loop exited with code {} before the window was created",
                    code
                )));
            }
        }

        Err(Error::Window(
            "Timed out waiting for the window to be created".to_string(),
        ))
    }

    #[inline]
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Keyboard state as of the last pump.
    #[inline]
    pub fn input(&self) -> &InputState {
        &self.state.input
    }

    /// Processes pending events without blocking.
    pub fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            warn!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }
}

impl ViewportSource for Platform {
    fn extent(&self) -> vk::Extent2D {
        self.window.extent()
    }

    fn was_resized(&self) -> bool {
        self.state.resized
    }

    fn reset_resized_flag(&mut self) {
        self.state.resized = false;
    }

    fn wait_events(&mut self) {
        if self.state.close_requested {
            return;
        }
        self.pump(None);
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }
}
