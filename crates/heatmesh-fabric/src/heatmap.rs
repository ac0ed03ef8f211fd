//! Host-side reconstruction of the heat map from chip reports.

use heatmesh_core::{ChipCoord, HostReport};
use indexmap::IndexMap;

use crate::layout::GridLayout;

/// Last reported value of every cell, row-major, `y` rows of `x` columns.
///
/// Cells no core covers stay at 0.
#[derive(Clone, Debug, PartialEq)]
pub struct Heatmap {
    width: usize,
    height: usize,
    values: Vec<f64>,
    chip_cells: IndexMap<ChipCoord, Vec<(u16, u16)>>,
}

impl Heatmap {
    /// An all-zero map covering `layout`.
    pub fn for_layout(layout: &GridLayout) -> Self {
        let width = usize::from(layout.width());
        let height = usize::from(layout.height());
        let chip_cells = layout
            .chips()
            .map(|chip| {
                let cells = layout.cells_on(chip).iter().map(|c| (c.x, c.y)).collect();
                (chip, cells)
            })
            .collect();
        Self {
            width,
            height,
            values: vec![0.0; width * height],
            chip_cells,
        }
    }

    /// Apply a chip report. Value `i` belongs to the chip's `i`-th cell.
    ///
    /// Returns the number of cells updated; reports from unknown chips
    /// update nothing.
    pub fn apply(&mut self, report: &HostReport) -> usize {
        let Some(cells) = self.chip_cells.get(&report.source.chip) else {
            return 0;
        };
        let mut updated = 0;
        for (&(x, y), value) in cells.iter().zip(&report.values) {
            self.values[usize::from(y) * self.width + usize::from(x)] = value.to_f64();
            updated += 1;
        }
        updated
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Value at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        (x < self.width && y < self.height).then(|| self.values[y * self.width + x])
    }

    /// Row `y`, west to east.
    pub fn row(&self, y: usize) -> Option<&[f64]> {
        (y < self.height).then(|| &self.values[y * self.width..(y + 1) * self.width])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatmesh_core::{AgentId, CoreId, Fix16};

    #[test]
    fn report_lands_on_chip_cells() {
        let layout = GridLayout::new(2, 1, 16).unwrap();
        let mut map = Heatmap::for_layout(&layout);
        let report = HostReport::new(
            AgentId::new(ChipCoord::new(1, 0), CoreId(1)),
            ChipCoord::ORIGIN,
            (0..16).map(Fix16::from_int).collect(),
        );

        assert_eq!(map.apply(&report), 16);
        assert_eq!(map.get(4, 0), Some(0.0));
        assert_eq!(map.get(5, 0), Some(1.0));
        assert_eq!(map.get(4, 1), Some(4.0));
        assert_eq!(map.get(7, 3), Some(15.0));
        assert_eq!(map.get(0, 0), Some(0.0));
        assert_eq!(map.get(8, 0), None);
    }

    #[test]
    fn short_report_updates_prefix() {
        let layout = GridLayout::new(1, 1, 16).unwrap();
        let mut map = Heatmap::for_layout(&layout);
        let report = HostReport::new(
            AgentId::new(ChipCoord::ORIGIN, CoreId(1)),
            ChipCoord::ORIGIN,
            vec![Fix16::ONE; 2],
        );
        assert_eq!(map.apply(&report), 2);
        assert_eq!(map.row(0), Some(&[1.0, 1.0, 0.0, 0.0][..]));
    }

    #[test]
    fn unknown_chip_is_ignored() {
        let layout = GridLayout::new(1, 1, 4).unwrap();
        let mut map = Heatmap::for_layout(&layout);
        let report = HostReport::new(
            AgentId::new(ChipCoord::new(3, 3), CoreId(1)),
            ChipCoord::ORIGIN,
            vec![Fix16::ONE],
        );
        assert_eq!(map.apply(&report), 0);
    }
}
