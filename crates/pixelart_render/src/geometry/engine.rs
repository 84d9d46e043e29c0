use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::trace;

use super::shape::{build_shape, CellShape, CellShapeConfig, CustomPath, ShapePath};
use crate::PixelArtError;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Everything that affects a cell outline. Floats are keyed by bit pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ShapeKey {
    x: u64,
    y: u64,
    size: u64,
    shape: CellShape,
    corners: [u32; 4],
    custom: Option<CustomPath>,
}

impl ShapeKey {
    fn new(x: f64, y: f64, size: f64, config: &CellShapeConfig) -> Self {
        let (corners, custom) = match config.shape {
            CellShape::Rectangle => (config.corner_radius.clamped().map(f32::to_bits), None),
            CellShape::Custom => ([0; 4], config.custom_path.clone()),
            _ => ([0; 4], None),
        };

        Self {
            x: key_bits(x),
            y: key_bits(y),
            size: key_bits(size),
            shape: config.shape,
            corners,
            custom,
        }
    }
}

/// Collapses `-0.0` onto `0.0` so both hit the same entry.
fn key_bits(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Builds cell outlines and memoizes them in a bounded cache.
///
/// Once the cache grows past its capacity the oldest insertion is evicted,
/// regardless of how recently it was read. Each engine owns its own cache.
#[derive(Debug)]
pub struct ShapeGeometryEngine {
    capacity: usize,
    entries: HashMap<ShapeKey, Arc<ShapePath>>,
    insertion_order: VecDeque<ShapeKey>,
    stats: CacheStats,
}

impl Default for ShapeGeometryEngine {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ShapeGeometryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity + 1),
            insertion_order: VecDeque::with_capacity(capacity + 1),
            stats: CacheStats::default(),
        }
    }

    /// Outline of a `size × size` cell whose top-left corner is `(x, y)`.
    ///
    /// Fails only for a custom shape without path data; nothing is cached then.
    pub fn path_for(
        &mut self,
        x: f64,
        y: f64,
        size: f64,
        config: &CellShapeConfig,
    ) -> Result<Arc<ShapePath>, PixelArtError> {
        let key = ShapeKey::new(x, y, size, config);
        if let Some(path) = self.entries.get(&key) {
            self.stats.hits += 1;
            return Ok(Arc::clone(path));
        }

        let path = Arc::new(build_shape(x, y, size, config)?);
        self.stats.misses += 1;

        self.entries.insert(key.clone(), Arc::clone(&path));
        self.insertion_order.push_back(key);

        if self.entries.len() > self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
                trace!(
                    "evicted cached {:?} outline at ({}, {})",
                    oldest.shape,
                    f64::from_bits(oldest.x),
                    f64::from_bits(oldest.y)
                );
            }
        }

        Ok(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }
}
