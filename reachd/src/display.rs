//! Terminal presentation of rendered frames.

use std::io::Write as _;

use reachgrid::grid::Rgb;
use reachgrid::render::{Surface, TextSurface};
use tracing::warn;

/// Text surface that prints every finished frame to stdout.
#[derive(Debug, Clone)]
pub struct TerminalSurface {
    text: TextSurface,
}

impl TerminalSurface {
    pub fn new(grid_number: u32) -> Self {
        Self {
            text: TextSurface::new(grid_number),
        }
    }
}

impl Surface for TerminalSurface {
    fn size(&self) -> (f64, f64) {
        self.text.size()
    }

    fn clear(&mut self) {
        self.text.clear();
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        self.text.stroke_rect(x, y, w, h, color);
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        self.text.fill_rect(x, y, w, h, color);
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, r: f64, color: Rgb) {
        self.text.fill_circle(cx, cy, r, color);
    }

    fn present(&mut self) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "\n{}", self.text.frame()).and_then(|_| out.flush()) {
            warn!("Could not draw frame: {}", e);
        }
    }
}

/// Surface for headless runs: draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn size(&self) -> (f64, f64) {
        (1.0, 1.0)
    }

    fn clear(&mut self) {}

    fn stroke_rect(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _color: Rgb) {}

    fn fill_rect(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _color: Rgb) {}

    fn fill_circle(&mut self, _cx: f64, _cy: f64, _r: f64, _color: Rgb) {}
}
