use kurbo::{Affine, BezPath, Point, Rect, Shape};
use serde::{Deserialize, Serialize};

use crate::PixelArtError;

/// Control point distance for a quarter circle drawn as one cubic: 4/3 * tan(π/8).
const KAPPA: f64 = 0.552_284_749_830_793_4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellShape {
    #[default]
    Rectangle,
    Circle,
    Diamond,
    Triangle,
    Hexagon,
    Custom,
}

/// Per-corner rounding, each a percentage of the cell size. The effective
/// radius never exceeds half the cell size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerRadius {
    pub enabled: bool,
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_left: f32,
    pub bottom_right: f32,
}

impl CornerRadius {
    pub fn uniform(percentage: f32) -> Self {
        Self {
            enabled: true,
            top_left: percentage,
            top_right: percentage,
            bottom_left: percentage,
            bottom_right: percentage,
        }
    }

    /// Percentages clamped to `[0, 100]`, or all zero when rounding is off.
    pub fn clamped(&self) -> [f32; 4] {
        if !self.enabled {
            return [0.0; 4];
        }

        let clamp = |value: f32| if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) };
        [
            clamp(self.top_left),
            clamp(self.top_right),
            clamp(self.bottom_right),
            clamp(self.bottom_left),
        ]
    }
}

/// Caller-supplied outline in SVG path syntax. It is used verbatim: the path
/// is translated to the cell origin but never rescaled from `view_box`.
// TODO: decide whether custom paths should be mapped from `view_box` onto the cell size.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomPath {
    pub path: String,
    pub view_box: String,
}

impl CustomPath {
    pub fn new(path: impl Into<String>, view_box: impl Into<String>) -> Self {
        Self { path: path.into(), view_box: view_box.into() }
    }

    /// Parses `view_box` as `min-x min-y width height`.
    pub fn view_box_rect(&self) -> Option<Rect> {
        let values: Vec<f64> = self
            .view_box
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<_, _>>()
            .ok()?;

        match values.as_slice() {
            &[x, y, width, height] if width >= 0.0 && height >= 0.0 => {
                Some(Rect::new(x, y, x + width, y + height))
            },
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellShapeConfig {
    pub shape: CellShape,
    pub corner_radius: CornerRadius,
    pub custom_path: Option<CustomPath>,
}

impl CellShapeConfig {
    pub fn new(shape: CellShape) -> Self {
        Self { shape, ..Default::default() }
    }

    pub fn custom(path: CustomPath) -> Self {
        Self { shape: CellShape::Custom, custom_path: Some(path), ..Default::default() }
    }

    pub fn with_corner_radius(mut self, corner_radius: CornerRadius) -> Self {
        self.corner_radius = corner_radius;
        self
    }

    /// Custom shapes need path data. Other shapes ignore `custom_path`.
    pub fn validate(&self) -> Result<(), PixelArtError> {
        if self.shape == CellShape::Custom && self.custom_path.is_none() {
            return Err(PixelArtError::MissingCustomPath);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outline {
    Path(BezPath),
    /// Unparsed custom path data; backends interpret it.
    Custom(CustomPath),
}

/// Closed outline for one cell plus its bounding box.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapePath {
    outline: Outline,
    origin: Point,
    bounds: Rect,
}

impl ShapePath {
    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// The outline in cell space. `None` when custom path data does not parse.
    pub fn to_bez_path(&self) -> Option<BezPath> {
        match &self.outline {
            Outline::Path(path) => Some(path.clone()),
            Outline::Custom(custom) => parse_custom(custom, self.origin),
        }
    }
}

/// `None` for data that does not parse or parses to no elements.
fn parse_custom(custom: &CustomPath, origin: Point) -> Option<BezPath> {
    let mut path = BezPath::from_svg(custom.path.trim())
        .ok()
        .filter(|path| !path.elements().is_empty())?;
    path.apply_affine(Affine::translate(origin.to_vec2()));
    Some(path)
}

pub(crate) fn build_shape(
    x: f64,
    y: f64,
    size: f64,
    config: &CellShapeConfig,
) -> Result<ShapePath, PixelArtError> {
    let origin = Point::new(x, y);

    let path = match config.shape {
        CellShape::Rectangle => rectangle(x, y, size, config.corner_radius.clamped()),
        CellShape::Circle => circle(Point::new(x + size / 2.0, y + size / 2.0), size / 2.0),
        CellShape::Diamond => polygon(&[
            Point::new(x + size / 2.0, y),
            Point::new(x + size, y + size / 2.0),
            Point::new(x + size / 2.0, y + size),
            Point::new(x, y + size / 2.0),
        ]),
        CellShape::Triangle => polygon(&[
            Point::new(x + size / 2.0, y),
            Point::new(x + size, y + size),
            Point::new(x, y + size),
        ]),
        CellShape::Hexagon => hexagon(Point::new(x + size / 2.0, y + size / 2.0), size / 2.0),
        CellShape::Custom => {
            let custom = config.custom_path.clone().ok_or(PixelArtError::MissingCustomPath)?;
            let bounds = parse_custom(&custom, origin)
                .map(|path| path.bounding_box())
                .or_else(|| {
                    custom.view_box_rect().map(|rect| rect + origin.to_vec2())
                })
                .unwrap_or_else(|| Rect::from_origin_size(origin, (0.0, 0.0)));
            return Ok(ShapePath { outline: Outline::Custom(custom), origin, bounds });
        },
    };

    let bounds = path.bounding_box();
    Ok(ShapePath { outline: Outline::Path(path), origin, bounds })
}

fn polygon(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    path.move_to(points[0]);
    for &point in &points[1..] {
        path.line_to(point);
    }
    path.close_path();
    path
}

/// Square cell, optionally with rounded corners. `percentages` is in
/// top-left, top-right, bottom-right, bottom-left order.
fn rectangle(x: f64, y: f64, size: f64, percentages: [f32; 4]) -> BezPath {
    let [tl, tr, br, bl] = percentages.map(|p| (size * p as f64 / 100.0).min(size / 2.0));

    if tl == 0.0 && tr == 0.0 && br == 0.0 && bl == 0.0 {
        return polygon(&[
            Point::new(x, y),
            Point::new(x + size, y),
            Point::new(x + size, y + size),
            Point::new(x, y + size),
        ]);
    }

    let right = x + size;
    let bottom = y + size;
    let mut path = BezPath::new();

    path.move_to((x + tl, y));
    path.line_to((right - tr, y));
    if tr > 0.0 {
        path.curve_to(
            (right - tr + KAPPA * tr, y),
            (right, y + tr - KAPPA * tr),
            (right, y + tr),
        );
    }

    path.line_to((right, bottom - br));
    if br > 0.0 {
        path.curve_to(
            (right, bottom - br + KAPPA * br),
            (right - br + KAPPA * br, bottom),
            (right - br, bottom),
        );
    }

    path.line_to((x + bl, bottom));
    if bl > 0.0 {
        path.curve_to(
            (x + bl - KAPPA * bl, bottom),
            (x, bottom - bl + KAPPA * bl),
            (x, bottom - bl),
        );
    }

    path.line_to((x, y + tl));
    if tl > 0.0 {
        path.curve_to((x, y + tl - KAPPA * tl), (x + tl - KAPPA * tl, y), (x + tl, y));
    }

    path.close_path();
    path
}

/// Four quarter arcs starting at the top, so the extrema land on segment ends.
fn circle(center: Point, radius: f64) -> BezPath {
    let Point { x: cx, y: cy } = center;
    let k = radius * KAPPA;
    let mut path = BezPath::new();

    path.move_to((cx, cy - radius));
    path.curve_to((cx + k, cy - radius), (cx + radius, cy - k), (cx + radius, cy));
    path.curve_to((cx + radius, cy + k), (cx + k, cy + radius), (cx, cy + radius));
    path.curve_to((cx - k, cy + radius), (cx - radius, cy + k), (cx - radius, cy));
    path.curve_to((cx - radius, cy - k), (cx - k, cy - radius), (cx, cy - radius));
    path.close_path();
    path
}

fn hexagon(center: Point, radius: f64) -> BezPath {
    let points: Vec<Point> = (0..6)
        .map(|i| {
            let angle = (i as f64 * 60.0).to_radians();
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect();
    polygon(&points)
}
