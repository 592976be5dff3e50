use crate::prelude::{SyncError, SyncResult};
use ndarray::Array2;
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Square binary grid indexed `[y, x]`, with `y` growing southward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    cells: Array2<u8>,
}

impl OccupancyGrid {
    pub fn empty(size: usize) -> Self {
        Self {
            cells: Array2::zeros((size, size)),
        }
    }

    /// Builds a grid from rows; any non-zero value is stored as 1.
    pub fn from_rows(rows: &[Vec<u8>]) -> SyncResult<Self> {
        let size = rows.len();
        let mut grid = Self::empty(size);
        for (y, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(SyncError::InvalidInput(format!(
                    "grid row {} has {} cells, expected {}",
                    y,
                    row.len(),
                    size
                )));
            }
            for (x, &value) in row.iter().enumerate() {
                if value != 0 {
                    grid.set(x, y);
                }
            }
        }
        Ok(grid)
    }

    pub fn size(&self) -> usize {
        self.cells.nrows()
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.cells.get((y, x)).is_some_and(|&v| v != 0)
    }

    pub fn set(&mut self, x: usize, y: usize) {
        if let Some(cell) = self.cells.get_mut((y, x)) {
            *cell = 1;
        }
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }

    pub fn cells(&self) -> &Array2<u8> {
        &self.cells
    }

    /// Zeroes every cell for which `keep` returns false.
    pub fn retain(&mut self, keep: impl Fn(usize, usize) -> bool) {
        for ((y, x), cell) in self.cells.indexed_iter_mut() {
            if !keep(x, y) {
                *cell = 0;
            }
        }
    }

}

impl Serialize for OccupancyGrid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.size()))?;
        for row in self.cells.rows() {
            seq.serialize_element(&row.to_vec())?;
        }
        seq.end()
    }
}

/// Index of the pooled cell that source position `pos` (of `src_len`) falls into.
pub fn pool_index(pos: usize, src_len: usize, dst_len: usize) -> usize {
    if src_len == 0 || dst_len == 0 {
        return 0;
    }
    (pos * dst_len / src_len).min(dst_len - 1)
}
