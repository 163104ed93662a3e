use crate::observation::Implementation;

/// Placement of K groups in a fixed-width grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
    pub panels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    /// Only the bottom row carries the x-axis label.
    pub x_label: bool,
    /// Only the leftmost column carries the y-axis label.
    pub y_label: bool,
}

impl GridLayout {
    pub const COLUMNS: usize = 2;

    /// `None` when there is nothing to lay out.
    pub fn for_groups(count: usize) -> Option<Self> {
        if count == 0 {
            return None;
        }
        Some(Self {
            rows: count.div_ceil(Self::COLUMNS),
            cols: Self::COLUMNS,
            panels: count,
        })
    }

    pub fn cell(&self, index: usize) -> GridCell {
        let row = index / self.cols;
        let col = index % self.cols;
        GridCell {
            index,
            row,
            col,
            x_label: row == self.rows - 1,
            y_label: col == 0,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.panels).map(|i| self.cell(i))
    }

    /// Grid slots that receive no subplot and are left out of the figure.
    pub fn unused(&self) -> std::ops::Range<usize> {
        self.panels..self.rows * self.cols
    }
}

/// Figure-wide legend, one entry per kernel in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedLegend {
    entries: Vec<Implementation>,
}

impl SharedLegend {
    /// Registers a drawn series. Returns `false` if the kernel already has an entry.
    pub fn register(&mut self, implementation: Implementation) -> bool {
        if self.entries.contains(&implementation) {
            return false;
        }
        self.entries.push(implementation);
        true
    }

    pub fn entries(&self) -> &[Implementation] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
