//! Drawing the grid world onto a 2D surface.
//!
//! [`render`] always redraws everything, in a fixed order:
//! clear, grid lines, player, goals, blocks. Blocks go last so they occlude
//! anything sharing their cell.

use crate::grid::{GridWorld, Rgb};

/// Minimal 2D drawing target, in surface units with the origin top-left.
pub trait Surface {
    fn size(&self) -> (f64, f64);
    fn clear(&mut self);
    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb);
    fn fill_circle(&mut self, cx: f64, cy: f64, r: f64, color: Rgb);

    /// Called once a full frame is drawn.
    fn present(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub grid_line: Rgb,
    pub player: Rgb,
    pub block: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            grid_line: Rgb::BLACK,
            player: Rgb::BLUE,
            block: Rgb::BROWN,
        }
    }
}

pub fn render(world: &GridWorld, surface: &mut dyn Surface) {
    render_with(world, surface, &Palette::default());
}

pub fn render_with(world: &GridWorld, surface: &mut dyn Surface, palette: &Palette) {
    let n = world.grid_number();
    let (w, h) = surface.size();
    let cell_w = w / n as f64;
    let cell_h = h / n as f64;

    // Model y points up; surface rows grow downward.
    let top = |y: i32| (n as i32 - 1 - y) as f64 * cell_h;
    let left = |x: i32| x as f64 * cell_w;

    surface.clear();

    for row in 0..n {
        for col in 0..n {
            surface.stroke_rect(
                col as f64 * cell_w,
                row as f64 * cell_h,
                cell_w,
                cell_h,
                palette.grid_line,
            );
        }
    }

    let p = world.player();
    surface.fill_circle(
        left(p.x) + cell_w / 2.0,
        top(p.y) + cell_h / 2.0,
        cell_w.min(cell_h) / 2.0,
        palette.player,
    );

    for goal in world.goals() {
        surface.fill_rect(left(goal.cell.x), top(goal.cell.y), cell_w, cell_h, goal.color);
    }

    // Sorted so the frame does not depend on hash iteration order.
    let mut blocks: Vec<_> = world.blocks().collect();
    blocks.sort_by_key(|c| (c.y, c.x));
    for b in blocks {
        surface.fill_rect(left(b.x), top(b.y), cell_w, cell_h, palette.block);
    }

    surface.present();
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear,
    StrokeRect { x: f64, y: f64, w: f64, h: f64, color: Rgb },
    FillRect { x: f64, y: f64, w: f64, h: f64, color: Rgb },
    FillCircle { cx: f64, cy: f64, r: f64, color: Rgb },
}

/// Surface that records the operations of the last frame.
#[derive(Debug, Clone)]
pub struct DrawList {
    width: f64,
    height: f64,
    ops: Vec<DrawOp>,
    frames: u64,
}

impl DrawList {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
            frames: 0,
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Surface for DrawList {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.ops.push(DrawOp::Clear);
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        self.ops.push(DrawOp::StrokeRect { x, y, w, h, color });
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        self.ops.push(DrawOp::FillRect { x, y, w, h, color });
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, r: f64, color: Rgb) {
        self.ops.push(DrawOp::FillCircle { cx, cy, r, color });
    }

    fn present(&mut self) {
        self.frames += 1;
    }
}

/// One character per grid cell.
///
/// `@` player, `#` block, goals as a digit 0-9 scaled from their red channel,
/// `.` empty. Grid lines are not drawn.
#[derive(Debug, Clone)]
pub struct TextSurface {
    side: usize,
    chars: Vec<char>,
    block: Rgb,
}

impl TextSurface {
    pub fn new(grid_number: u32) -> Self {
        let side = grid_number.max(1) as usize;
        Self {
            side,
            chars: vec!['.'; side * side],
            block: Palette::default().block,
        }
    }

    fn put(&mut self, x: f64, y: f64, ch: char) {
        if x < 0.0 || y < 0.0 {
            return;
        }
        let (col, row) = (x.floor() as usize, y.floor() as usize);
        if col < self.side && row < self.side {
            self.chars[row * self.side + col] = ch;
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.chars
            .chunks(self.side)
            .map(|row| row.iter().collect())
            .collect()
    }

    pub fn frame(&self) -> String {
        self.lines().join("\n")
    }
}

impl Surface for TextSurface {
    fn size(&self) -> (f64, f64) {
        (self.side as f64, self.side as f64)
    }

    fn clear(&mut self) {
        self.chars.fill('.');
    }

    fn stroke_rect(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _color: Rgb) {}

    fn fill_rect(&mut self, x: f64, y: f64, _w: f64, _h: f64, color: Rgb) {
        let ch = if color == self.block {
            '#'
        } else {
            let level = (color.r as u32 * 10 / 256).min(9);
            char::from_digit(level, 10).unwrap_or('?')
        };
        self.put(x, y, ch);
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, _r: f64, _color: Rgb) {
        self.put(cx, cy, '@');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, GameMap};

    fn sample_world() -> GridWorld {
        let mut w = GridWorld::new(4);
        w.reset_from_map(&GameMap {
            start: Cell::new(0, 0),
            goals: vec![Cell::new(3, 3), Cell::new(0, 3), Cell::new(3, 0)],
            blocks: vec![Cell::new(1, 0), Cell::new(2, 2)],
        });
        w
    }

    #[test]
    fn frame_order_is_clear_grid_player_goals_blocks() {
        let w = sample_world();
        let mut list = DrawList::new(400.0, 400.0);
        render(&w, &mut list);

        let ops = list.ops();
        assert_eq!(ops[0], DrawOp::Clear);
        assert!(ops[1..17]
            .iter()
            .all(|op| matches!(op, DrawOp::StrokeRect { .. })));
        assert!(matches!(ops[17], DrawOp::FillCircle { .. }));
        assert!(ops[18..21]
            .iter()
            .all(|op| matches!(op, DrawOp::FillRect { color, .. } if *color == crate::grid::DEFAULT_GOAL_COLOR)));
        assert!(ops[21..]
            .iter()
            .all(|op| matches!(op, DrawOp::FillRect { color, .. } if *color == Rgb::BROWN)));
        assert_eq!(ops.len(), 23);
        assert_eq!(list.frames(), 1);
    }

    #[test]
    fn player_circle_is_centered_with_y_flipped() {
        let w = sample_world();
        let mut list = DrawList::new(400.0, 400.0);
        render(&w, &mut list);

        let circle = list
            .ops()
            .iter()
            .find(|op| matches!(op, DrawOp::FillCircle { .. }))
            .cloned();
        assert_eq!(
            circle,
            Some(DrawOp::FillCircle {
                cx: 50.0,
                cy: 350.0,
                r: 50.0,
                color: Rgb::BLUE
            })
        );
    }

    #[test]
    fn render_is_deterministic() {
        let w = sample_world();
        let mut a = DrawList::new(300.0, 300.0);
        let mut b = DrawList::new(300.0, 300.0);
        render(&w, &mut a);
        render(&w, &mut a);
        render(&w, &mut b);
        assert_eq!(a.ops(), b.ops());
    }

    #[test]
    fn text_surface_rasterizes_one_char_per_cell() {
        let mut w = sample_world();
        w.update_beliefs(&[1.0, 0.0, 0.5]).unwrap();
        let mut text = TextSurface::new(4);
        render(&w, &mut text);
        assert_eq!(text.lines(), ["0..9", "..#.", "....", "@#.4"]);
    }
}
