//! The display column interface.

use super::registry::Named;

/// A snapshot of the solving statistics a display column can render.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisplayView {
    pub n_nodes: u64,
    pub n_open: usize,
    pub n_lp_iterations: u64,
    pub n_sols: usize,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub gap: f64,
    pub depth: usize,
}

/// One column of the periodic solving-progress table.
pub trait DisplayColumn: Named {
    fn header(&self) -> &str;

    fn width(&self) -> usize {
        10
    }

    fn render(&self, view: &DisplayView) -> String;
}
