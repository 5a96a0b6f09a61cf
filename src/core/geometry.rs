//! Window geometry - Aspect-locked sizing for the session window

use crate::host::{TitleBarStyle, WindowOptions};

/// Size constraints derived from a base width and height.
///
/// The window may grow but never shrinks below the base box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowGeometry {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub min_width: u32,
    pub min_height: u32,
}

impl WindowGeometry {
    /// Zero dimensions are treated as one so the ratio stays finite
    pub fn from_base(width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let aspect_ratio = f64::from(width) / f64::from(height);
        let min_width = width;
        let min_height = (f64::from(min_width) / aspect_ratio).round() as u32;
        Self {
            width,
            height,
            aspect_ratio,
            min_width,
            min_height,
        }
    }

    /// Options for a centered, frameless, dark window with this geometry
    pub fn window_options(&self, title: &str, icon: &str) -> WindowOptions {
        WindowOptions {
            center: true,
            fullscreenable: true,
            title: title.to_string(),
            icon: icon.to_string(),
            dark_mode: true,
            vibrancy: false,
            frame: false,
            title_bar_style: TitleBarStyle::Inset,
            width: self.width,
            height: self.height,
            min_width: self.min_width,
            min_height: self.min_height,
            aspect_ratio: self.aspect_ratio,
        }
    }
}
