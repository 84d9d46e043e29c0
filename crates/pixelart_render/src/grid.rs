use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PixelArtError;

/// An opaque 8-bit RGB color. Serialized as a `#rrggbb` string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(value: [u8; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = PixelArtError;

    /// Accepts `#rrggbb`, `rrggbb` and the short `#rgb` form.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || PixelArtError::InvalidColor(value.to_string());
        let hex = value.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        match hex.len() {
            6 => {
                let channel =
                    |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
                Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
            },
            3 => {
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16).map(|v| v * 17).map_err(|_| invalid())
                };
                Ok(Self::new(channel(0)?, channel(1)?, channel(2)?))
            },
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = PixelArtError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// Row-major `width × height` artwork where each cell is a color or empty.
///
/// Serialized as an array of rows; deserialization rejects ragged or empty
/// grids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Option<Rgb>>>", into = "Vec<Vec<Option<Rgb>>>")]
pub struct PixelGrid {
    width: u32,
    height: u32,
    cells: Vec<Option<Rgb>>,
}

impl PixelGrid {
    pub fn new(width: u32, height: u32, cells: Vec<Option<Rgb>>) -> Result<Self, PixelArtError> {
        if width == 0 || height == 0 {
            return Err(PixelArtError::EmptyGrid);
        }

        let expected = width as usize * height as usize;
        if cells.len() != expected {
            return Err(PixelArtError::CellCountMismatch { expected, found: cells.len() });
        }

        Ok(Self { width, height, cells })
    }

    /// A grid with every cell empty.
    pub fn blank(width: u32, height: u32) -> Result<Self, PixelArtError> {
        Self::new(width, height, vec![None; width as usize * height as usize])
    }

    pub fn from_rows(rows: Vec<Vec<Option<Rgb>>>) -> Result<Self, PixelArtError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 || height == 0 {
            return Err(PixelArtError::EmptyGrid);
        }

        let mut cells = Vec::with_capacity(width * height);
        for (row_index, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(PixelArtError::RaggedRow {
                    row: row_index,
                    expected: width,
                    found: row.len(),
                });
            }
            cells.extend(row);
        }

        Self::new(width as u32, height as u32, cells)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[Option<Rgb>] {
        &self.cells
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells[y as usize * self.width as usize + x as usize]
    }

    /// Sets one cell. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, color: Option<Rgb>) {
        if x < self.width && y < self.height {
            self.cells[y as usize * self.width as usize + x as usize] = color;
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<Rgb>]> + '_ {
        self.cells.chunks(self.width as usize)
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }
}

impl TryFrom<Vec<Vec<Option<Rgb>>>> for PixelGrid {
    type Error = PixelArtError;

    fn try_from(rows: Vec<Vec<Option<Rgb>>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<PixelGrid> for Vec<Vec<Option<Rgb>>> {
    fn from(grid: PixelGrid) -> Self {
        grid.rows().map(<[Option<Rgb>]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!("#ff8000".parse::<Rgb>().unwrap(), Rgb::new(255, 128, 0));
        assert_eq!("0a0b0c".parse::<Rgb>().unwrap(), Rgb::new(10, 11, 12));
        assert_eq!("#fff".parse::<Rgb>().unwrap(), Rgb::WHITE);
        assert!("#ggg".parse::<Rgb>().is_err());
        assert!("#12345".parse::<Rgb>().is_err());
    }

    #[test]
    fn rejects_ragged_rows() {
        let rows = vec![vec![None, None], vec![None]];
        assert!(matches!(
            PixelGrid::from_rows(rows),
            Err(PixelArtError::RaggedRow { row: 1, expected: 2, found: 1 })
        ));
    }

    #[test]
    fn rejects_zero_area() {
        assert!(matches!(PixelGrid::blank(0, 3), Err(PixelArtError::EmptyGrid)));
        assert!(matches!(PixelGrid::from_rows(Vec::new()), Err(PixelArtError::EmptyGrid)));
    }

    #[test]
    fn json_round_trip_keeps_empty_cells() {
        let mut grid = PixelGrid::blank(2, 2).unwrap();
        grid.set(1, 0, Some(Rgb::new(1, 2, 3)));

        let json = serde_json::to_string(&grid).unwrap();
        assert_eq!(json, r##"[[null,"#010203"],[null,null]]"##);

        let parsed: PixelGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, grid);
        assert_eq!(parsed.filled_count(), 1);
    }
}
