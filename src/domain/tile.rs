/// Tile collision map: the static solid/empty grid the world is built on.
///
/// ## Coordinates
///
///   - World space is in pixels, y grows downward. The grid starts
///     `y_offset` pixels below the world origin (room for the HUD strip).
///   - Tile space is `(col, row)` as `i32`. Columns wrap around the map
///     width; row `-1` is the open sky above the grid.
///
/// Tile ids are kept as loaded (`SOLID_ID` = solid) alongside a derived
/// boolean mask, so every collision query is a single index lookup.
///
/// The map never changes after load, except for the visible window
/// (the column range around the player) which is recomputed every tick.

use glam::Vec2;

/// Tile id that marks a solid cell in the map file.
pub const SOLID_ID: u32 = 2;

/// Column range currently in view, in unwrapped column units.
/// `left` may be negative and `right` may exceed `cols`; callers wrap.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct VisibleWindow {
    pub left: i32,
    pub right: i32,
    /// World-space edges of the window (unwrapped).
    pub left_px: f32,
    pub right_px: f32,
}

impl VisibleWindow {
    /// Is world x (any wrap) within the window?
    pub fn contains_x(&self, x: f32, world_w: f32) -> bool {
        if world_w <= 0.0 { return false; }
        let span = self.right_px - self.left_px;
        if span >= world_w { return true; }
        let rel = (x - self.left_px).rem_euclid(world_w);
        rel <= span
    }
}

#[derive(Clone, Debug)]
pub struct TileMap {
    tile_w: f32,
    tile_h: f32,
    cols: usize,
    rows: usize,
    y_offset: f32,
    /// Row-major tile ids.
    tiles: Vec<u32>,
    /// Row-major solidity mask derived from `tiles`.
    solid: Vec<bool>,
    spawn_points: Vec<Vec2>,
    window: VisibleWindow,
}

impl TileMap {
    /// Build a map from already validated parts. The loader in
    /// `sim::level` performs the validation; tests build maps directly.
    pub fn new(
        tile_w: u32,
        tile_h: u32,
        cols: usize,
        rows: usize,
        tiles: Vec<u32>,
        spawn_points: Vec<Vec2>,
        y_offset: f32,
    ) -> Self {
        let solid = tiles.iter().map(|&id| id == SOLID_ID).collect();
        TileMap {
            tile_w: tile_w as f32,
            tile_h: tile_h as f32,
            cols,
            rows,
            y_offset,
            tiles,
            solid,
            spawn_points,
            window: VisibleWindow::default(),
        }
    }

    pub fn tile_w(&self) -> f32 { self.tile_w }
    pub fn tile_h(&self) -> f32 { self.tile_h }
    pub fn cols(&self) -> usize { self.cols }
    pub fn rows(&self) -> usize { self.rows }
    pub fn y_offset(&self) -> f32 { self.y_offset }
    pub fn spawn_points(&self) -> &[Vec2] { &self.spawn_points }
    pub fn window(&self) -> VisibleWindow { self.window }

    /// Pixel width of the whole map (the wraparound period).
    pub fn pixel_width(&self) -> f32 {
        self.cols as f32 * self.tile_w
    }

    /// Pixel height of the grid alone.
    pub fn pixel_height(&self) -> f32 {
        self.rows as f32 * self.tile_h
    }

    /// Grid height plus the vertical offset.
    pub fn real_height(&self) -> f32 {
        self.pixel_height() + self.y_offset
    }

    /// Raw tile id, 0 for anything off the grid.
    pub fn tile_id(&self, col: i32, row: i32) -> u32 {
        match self.index(col, row) {
            Some(i) => self.tiles[i],
            None => 0,
        }
    }

    // ── Coordinate conversion ──

    /// World pixel column, wrapped into `0..cols`.
    pub fn column_at(&self, x: f32) -> i32 {
        self.wrap_col((x / self.tile_w).floor() as i32)
    }

    /// Unclamped row for a world y (may be negative or past the bottom).
    pub fn row_at(&self, y: f32) -> i32 {
        ((y - self.y_offset) / self.tile_h).floor() as i32
    }

    pub fn wrap_col(&self, col: i32) -> i32 {
        if self.cols == 0 { return 0; }
        col.rem_euclid(self.cols as i32)
    }

    /// World position to tile index.
    ///
    /// Columns wrap; anything above the grid is row -1 (always empty),
    /// anything below it is the last row.
    pub fn world_to_tile(&self, x: f32, y: f32) -> (i32, i32) {
        let col = self.column_at(x);
        let row = if y < self.y_offset {
            -1
        } else if y >= self.real_height() {
            self.rows as i32 - 1
        } else {
            self.row_at(y)
        };
        (col, row)
    }

    /// Top-left corner of a tile in world pixels.
    pub fn tile_to_world(&self, col: i32, row: i32) -> (f32, f32) {
        (
            col as f32 * self.tile_w,
            row as f32 * self.tile_h + self.y_offset,
        )
    }

    /// World y of the top edge of `row`.
    pub fn row_top(&self, row: i32) -> f32 {
        self.tile_to_world(0, row).1
    }

    // ── Solidity ──

    /// Is this cell solid? Out-of-range cells are empty, never a panic.
    pub fn is_solid(&self, col: i32, row: i32) -> bool {
        match self.index(col, row) {
            Some(i) => self.solid[i],
            None => false,
        }
    }

    /// Solidity for a column that may lie outside `0..cols`.
    pub fn is_solid_wrapped(&self, col: i32, row: i32) -> bool {
        self.is_solid(self.wrap_col(col), row)
    }

    /// Does the world point resolve into a solid cell?
    pub fn solid_at(&self, x: f32, y: f32) -> bool {
        let (col, row) = self.world_to_tile(x, y);
        self.is_solid(col, row)
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 { return None; }
        let (c, r) = (col as usize, row as usize);
        if c >= self.cols || r >= self.rows { return None; }
        Some(r * self.cols + c)
    }

    // ── Probes ──

    /// How far a head at `(x, y)` may rise this step.
    ///
    /// Returns `step` when the path is clear. Otherwise the distance to the
    /// underside of the nearest solid tile above, which is zero when the
    /// head already touches it and negative when it is embedded.
    pub fn probe_ceiling(&self, x: f32, y: f32, step: f32) -> f32 {
        let col = self.column_at(x);
        let nearest = ((y - self.y_offset) / self.tile_h).ceil() as i32 - 1;
        let farthest = self.row_at(y - step);
        let mut row = nearest;
        while row >= farthest {
            if self.is_solid(col, row) {
                return y - (self.row_top(row) + self.tile_h);
            }
            row -= 1;
        }
        step
    }

    /// How far feet at `(x, y)` may drop this step.
    ///
    /// Returns `step` when the path is clear, else the distance to the top
    /// of the nearest solid tile below (zero when standing on it).
    pub fn probe_floor(&self, x: f32, y: f32, step: f32) -> f32 {
        let col = self.column_at(x);
        let nearest = self.row_at(y);
        let farthest = ((y + step - self.y_offset) / self.tile_h).ceil() as i32 - 1;
        for row in nearest..=farthest {
            if self.is_solid(col, row) {
                return self.row_top(row) - y;
            }
        }
        step
    }

    /// First solid row in a column, scanning from the top.
    pub fn find_floor_row(&self, col: i32) -> Option<i32> {
        let col = self.wrap_col(col);
        (0..self.rows as i32).find(|&row| self.is_solid(col, row))
    }

    /// First solid row at or below `from_row`.
    pub fn find_floor_below(&self, col: i32, from_row: i32) -> Option<i32> {
        let col = self.wrap_col(col);
        (from_row.max(0)..self.rows as i32).find(|&row| self.is_solid(col, row))
    }

    /// First empty column in the bottom row, if any.
    pub fn bottom_gap(&self) -> Option<usize> {
        if self.rows == 0 { return None; }
        let last = self.rows as i32 - 1;
        (0..self.cols).find(|&c| !self.is_solid(c as i32, last))
    }

    // ── Visible window ──

    /// Center the visible window on world x, `view_px` pixels wide.
    pub fn recenter(&mut self, x: f32, view_px: f32) {
        let half = view_px / 2.0;
        let left_px = x - half;
        let right_px = x + half;
        self.window = VisibleWindow {
            left: (left_px / self.tile_w).floor() as i32,
            right: (right_px / self.tile_w).ceil() as i32,
            left_px,
            right_px,
        };
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Build a map from ASCII rows: `#` solid, anything else empty.
    /// Tiles are 16×16 with no vertical offset.
    pub fn map_from(rows: &[&str]) -> TileMap {
        map_from_sized(rows, 16, 16, 0.0)
    }

    pub fn map_from_sized(rows: &[&str], tw: u32, th: u32, y_offset: f32) -> TileMap {
        let cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut tiles = Vec::with_capacity(cols * rows.len());
        for r in rows {
            let bytes = r.as_bytes();
            for c in 0..cols {
                let solid = bytes.get(c).copied() == Some(b'#');
                tiles.push(if solid { SOLID_ID } else { 0 });
            }
        }
        TileMap::new(tw, th, cols, rows.len(), tiles, vec![Vec2::new(8.0, 0.0)], y_offset)
    }

    fn open_map() -> TileMap {
        map_from_sized(
            &[
                "          ",
                "    #     ",
                "          ",
                "##########",
            ],
            16, 16, 32.0,
        )
    }

    #[test]
    fn world_to_tile_basic() {
        let m = open_map();
        assert_eq!(m.world_to_tile(0.0, 32.0), (0, 0));
        assert_eq!(m.world_to_tile(17.0, 50.0), (1, 1));
        assert_eq!(m.world_to_tile(159.9, 95.9), (9, 3));
    }

    #[test]
    fn world_to_tile_above_grid_is_sky_row() {
        let m = open_map();
        assert_eq!(m.world_to_tile(40.0, 10.0).1, -1);
        assert!(!m.solid_at(40.0, 10.0));
    }

    #[test]
    fn world_to_tile_below_grid_is_last_row() {
        let m = open_map();
        assert_eq!(m.world_to_tile(40.0, 500.0).1, 3);
    }

    #[test]
    fn negative_x_wraps_to_last_columns() {
        let m = open_map();
        assert_eq!(m.world_to_tile(-1.0, 40.0).0, 9);
        assert_eq!(m.world_to_tile(-16.0, 40.0).0, 9);
        assert_eq!(m.world_to_tile(-17.0, 40.0).0, 8);
    }

    #[test]
    fn tile_to_world_adds_offset() {
        let m = open_map();
        assert_eq!(m.tile_to_world(4, 1), (64.0, 48.0));
    }

    #[test]
    fn out_of_range_is_empty() {
        let m = open_map();
        assert!(!m.is_solid(-1, 3));
        assert!(!m.is_solid(0, -1));
        assert!(!m.is_solid(10, 3));
        assert!(!m.is_solid(0, 4));
        assert!(!m.is_solid(i32::MIN, i32::MAX));
        assert!(m.is_solid(4, 1));
        assert!(m.is_solid_wrapped(14, 1));
    }

    #[test]
    fn probe_floor_clear_returns_step() {
        let m = open_map();
        assert_eq!(m.probe_floor(8.0, 40.0, 4.0), 4.0);
    }

    #[test]
    fn probe_floor_stops_on_tile_top() {
        let m = open_map();
        // Ground row top is at 32 + 3*16 = 80.
        assert_eq!(m.probe_floor(8.0, 74.0, 10.0), 6.0);
        assert_eq!(m.probe_floor(8.0, 80.0, 10.0), 0.0);
    }

    #[test]
    fn probe_ceiling_stops_on_tile_underside() {
        let m = open_map();
        // Tile (4,1) spans y 48..64.
        assert_eq!(m.probe_ceiling(70.0, 70.0, 10.0), 6.0);
        assert_eq!(m.probe_ceiling(70.0, 64.0, 10.0), 0.0);
        assert_eq!(m.probe_ceiling(30.0, 70.0, 10.0), 10.0);
    }

    #[test]
    fn find_floor_row_scans_from_top() {
        let m = open_map();
        assert_eq!(m.find_floor_row(4), Some(1));
        assert_eq!(m.find_floor_row(0), Some(3));
        assert_eq!(m.find_floor_row(14), Some(1));
        assert_eq!(m.find_floor_below(4, 2), Some(3));
    }

    #[test]
    fn bottom_gap_detected() {
        let m = map_from(&["    ", "## #"]);
        assert_eq!(m.bottom_gap(), Some(2));
        assert_eq!(open_map().bottom_gap(), None);
    }

    #[test]
    fn recenter_tracks_position() {
        let mut m = open_map();
        m.recenter(80.0, 64.0);
        let w = m.window();
        assert_eq!((w.left, w.right), (3, 7));
        assert!(w.contains_x(60.0, m.pixel_width()));
        assert!(!w.contains_x(20.0, m.pixel_width()));
    }

    #[test]
    fn window_contains_across_wrap_seam() {
        let mut m = open_map();
        m.recenter(4.0, 64.0);
        let w = m.window();
        assert!(w.left < 0);
        assert!(w.contains_x(150.0, m.pixel_width()));
        assert!(!w.contains_x(80.0, m.pixel_width()));
    }

    proptest! {
        #[test]
        fn tile_round_trip_stays_in_cell(x in 0u32..160, y in 32u32..96) {
            let m = open_map();
            let (x, y) = (x as f32, y as f32);
            let (col, row) = m.world_to_tile(x, y);
            let (wx, wy) = m.tile_to_world(col, row);
            prop_assert!(x - wx >= 0.0 && x - wx < m.tile_w());
            prop_assert!(y - wy >= 0.0 && y - wy < m.tile_h());
        }

        #[test]
        fn world_to_tile_is_periodic(x in -400i32..400, y in 0u32..200, k in -3i32..3) {
            let m = open_map();
            let (x, y) = (x as f32, y as f32);
            let shifted = x + k as f32 * m.pixel_width();
            prop_assert_eq!(m.world_to_tile(shifted, y), m.world_to_tile(x, y));
        }
    }
}
