use crate::common::{Point, Size, WindowRect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Opaque OS window identifier handed out by a [`WindowLocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Synthetic input towards the automated window. Every call is
/// fire-and-forget: delivery is assumed, never confirmed.
pub trait InputInjector: Send + Sync {
    /// Clicks at a window-relative position.
    fn click_at(&self, window: WindowHandle, point: Point);
    /// Moves the aim to window pixel `(x, y)`.
    fn aim_to(&self, x: f32, y: f32, window_origin: Point, window_size: Size);
    fn fire(&self);
    fn press_key(&self, window: WindowHandle, key: &str);
}

pub trait WindowLocator: Send + Sync {
    fn find_by_title(&self, title_substring: &str) -> Option<WindowHandle>;
    fn is_foreground_and_focused(&self, window: WindowHandle) -> bool;
    fn window_rect(&self, window: WindowHandle) -> Option<WindowRect>;
}

/// The window the workers act on, resolved once at startup.
#[derive(Clone)]
pub struct GameWindow {
    handle: WindowHandle,
    locator: Arc<dyn WindowLocator>,
}

impl GameWindow {
    pub fn new(handle: WindowHandle, locator: Arc<dyn WindowLocator>) -> Self {
        Self { handle, locator }
    }

    pub fn handle(&self) -> WindowHandle {
        self.handle
    }

    pub fn is_focused(&self) -> bool {
        self.locator.is_foreground_and_focused(self.handle)
    }

    pub fn rect(&self) -> Option<WindowRect> {
        self.locator.window_rect(self.handle)
    }
}

impl fmt::Debug for GameWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameWindow")
            .field("handle", &self.handle)
            .finish()
    }
}

/// Injector that only logs what it would have done.
#[derive(Debug, Default, Clone)]
pub struct DryRunInjector;

impl InputInjector for DryRunInjector {
    fn click_at(&self, window: WindowHandle, point: Point) {
        info!("[dry-run] click at ({}, {}) in window {}", point.x, point.y, window);
    }

    fn aim_to(&self, x: f32, y: f32, window_origin: Point, window_size: Size) {
        info!(
            "[dry-run] aim to ({:.1}, {:.1}) in {}x{} window at ({}, {})",
            x, y, window_size.width, window_size.height, window_origin.x, window_origin.y
        );
    }

    fn fire(&self) {
        info!("[dry-run] fire");
    }

    fn press_key(&self, window: WindowHandle, key: &str) {
        info!("[dry-run] press '{}' in window {}", key, window);
    }
}

/// Locator reporting a single always-focused window of fixed geometry.
#[derive(Debug, Clone)]
pub struct FixedWindowLocator {
    title: String,
    rect: WindowRect,
}

impl FixedWindowLocator {
    pub fn new(title: impl Into<String>, rect: WindowRect) -> Self {
        Self {
            title: title.into(),
            rect,
        }
    }
}

impl WindowLocator for FixedWindowLocator {
    fn find_by_title(&self, title_substring: &str) -> Option<WindowHandle> {
        self.title
            .contains(title_substring)
            .then_some(WindowHandle(1))
    }

    fn is_foreground_and_focused(&self, _window: WindowHandle) -> bool {
        true
    }

    fn window_rect(&self, _window: WindowHandle) -> Option<WindowRect> {
        Some(self.rect)
    }
}
