//! Conversion between tile-grid coordinates and screen pixels

use shared::TILE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelPos {
    pub x: f32,
    pub y: f32,
}

impl PixelPos {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Maps grid cells to the top-left pixel of their on-screen square.
///
/// The mapper is a pure function of its offset and tile size. Both are fixed
/// when a level is loaded and only change when a new level replaces it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    offset_x: f32,
    offset_y: f32,
    tile_size: u32,
}

impl CoordinateMapper {
    pub fn new(offset_x: f32, offset_y: f32, tile_size: u32) -> Self {
        Self {
            offset_x,
            offset_y,
            tile_size: tile_size.max(1),
        }
    }

    /// Largest integer tile size that fits the whole grid on screen, centred.
    pub fn fit(screen_width: f32, screen_height: f32, cols: usize, rows: usize) -> Self {
        if cols == 0 || rows == 0 {
            return Self::default();
        }

        let size_x = (screen_width / cols as f32).floor();
        let size_y = (screen_height / rows as f32).floor();
        let tile_size = size_x.min(size_y).max(1.0) as u32;

        let total_width = (cols as u32 * tile_size) as f32;
        let total_height = (rows as u32 * tile_size) as f32;

        Self::new(
            (screen_width - total_width) / 2.0,
            (screen_height - total_height) / 2.0,
            tile_size,
        )
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn offset(&self) -> (f32, f32) {
        (self.offset_x, self.offset_y)
    }

    pub fn to_pixel(&self, tile_x: i32, tile_y: i32) -> PixelPos {
        let size = self.tile_size as f32;
        PixelPos {
            x: self.offset_x + tile_x as f32 * size,
            y: self.offset_y + tile_y as f32 * size,
        }
    }

    pub fn to_tile(&self, px: f32, py: f32) -> TilePos {
        let size = self.tile_size as f32;
        TilePos {
            x: ((px - self.offset_x) / size).floor() as i32,
            y: ((py - self.offset_y) / size).floor() as i32,
        }
    }

    /// Top-left pixel of the cell containing `(px, py)`.
    pub fn snap_to_tile(&self, px: f32, py: f32) -> PixelPos {
        let tile = self.to_tile(px, py);
        self.to_pixel(tile.x, tile.y)
    }

    pub fn tile_center(&self, tile_x: i32, tile_y: i32) -> PixelPos {
        let corner = self.to_pixel(tile_x, tile_y);
        let half = self.tile_size as f32 / 2.0;
        PixelPos::new(corner.x + half, corner.y + half)
    }
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::new(0.0, 0.0, TILE_SIZE)
    }
}
