/// Grid dimensions an image is resampled to before quantization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetGeometry {
    pub columns: u32,
    pub rows: u32,
}

impl TargetGeometry {
    pub fn cell_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutPolicy {
    /// Fixed column count; rows follow the source aspect ratio.
    FixedColumns(u32),
    /// Exact grid size, ignoring the source aspect ratio.
    Exact { columns: u32, rows: u32 },
    /// Largest grid that fits inside `columns × rows` and keeps the aspect ratio.
    FitWithin { columns: u32, rows: u32 },
}

impl LayoutPolicy {
    pub fn derive(&self, source_width: u32, source_height: u32) -> Option<TargetGeometry> {
        if source_width == 0 || source_height == 0 {
            return None;
        }

        let image_ratio = source_height as f64 / source_width as f64;

        match *self {
            LayoutPolicy::FixedColumns(columns) => {
                let columns = columns.max(1);
                let rows = ((image_ratio * columns as f64).round() as u32).max(1);
                Some(TargetGeometry { columns, rows })
            },
            LayoutPolicy::Exact { columns, rows } => {
                Some(TargetGeometry { columns: columns.max(1), rows: rows.max(1) })
            },
            LayoutPolicy::FitWithin { columns, rows } => {
                let mut columns = columns.max(1);
                let rows_limit = rows.max(1);
                let mut rows = ((image_ratio * columns as f64).round() as u32).max(1);

                if rows > rows_limit {
                    rows = rows_limit;
                    let derived_columns = ((rows as f64) / image_ratio).round() as u32;
                    columns = columns.min(derived_columns.max(1));
                }

                Some(TargetGeometry { columns, rows })
            },
        }
    }
}
