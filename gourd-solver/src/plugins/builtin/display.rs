//! The standard progress-table columns.

use crate::plugins::DisplayColumn;
use crate::plugins::DisplayView;
use crate::plugins::Named;

/// Renders a possibly infinite bound with a fixed precision.
fn render_bound(value: f64) -> String {
    if value >= 1e20 {
        "+inf".to_owned()
    } else if value <= -1e20 {
        "-inf".to_owned()
    } else {
        format!("{value:.4}")
    }
}

#[derive(Debug, Default)]
pub struct NodesColumn;

impl Named for NodesColumn {
    fn name(&self) -> &str {
        "nodes"
    }

    fn description(&self) -> &str {
        "number of processed nodes"
    }

    fn priority(&self) -> i32 {
        100000
    }
}

impl DisplayColumn for NodesColumn {
    fn header(&self) -> &str {
        "node"
    }

    fn width(&self) -> usize {
        8
    }

    fn render(&self, view: &DisplayView) -> String {
        view.n_nodes.to_string()
    }
}

#[derive(Debug, Default)]
pub struct OpenColumn;

impl Named for OpenColumn {
    fn name(&self) -> &str {
        "open"
    }

    fn description(&self) -> &str {
        "number of open nodes"
    }

    fn priority(&self) -> i32 {
        90000
    }
}

impl DisplayColumn for OpenColumn {
    fn header(&self) -> &str {
        "open"
    }

    fn width(&self) -> usize {
        8
    }

    fn render(&self, view: &DisplayView) -> String {
        view.n_open.to_string()
    }
}

#[derive(Debug, Default)]
pub struct DualColumn;

impl Named for DualColumn {
    fn name(&self) -> &str {
        "dualbound"
    }

    fn description(&self) -> &str {
        "global lower bound"
    }

    fn priority(&self) -> i32 {
        80000
    }
}

impl DisplayColumn for DualColumn {
    fn header(&self) -> &str {
        "dualbound"
    }

    fn width(&self) -> usize {
        14
    }

    fn render(&self, view: &DisplayView) -> String {
        render_bound(view.lower_bound)
    }
}

#[derive(Debug, Default)]
pub struct PrimalColumn;

impl Named for PrimalColumn {
    fn name(&self) -> &str {
        "primalbound"
    }

    fn description(&self) -> &str {
        "objective of the best solution"
    }

    fn priority(&self) -> i32 {
        70000
    }
}

impl DisplayColumn for PrimalColumn {
    fn header(&self) -> &str {
        "primalbound"
    }

    fn width(&self) -> usize {
        14
    }

    fn render(&self, view: &DisplayView) -> String {
        if view.n_sols == 0 {
            "--".to_owned()
        } else {
            render_bound(view.upper_bound)
        }
    }
}

#[derive(Debug, Default)]
pub struct GapColumn;

impl Named for GapColumn {
    fn name(&self) -> &str {
        "gap"
    }

    fn description(&self) -> &str {
        "relative primal-dual gap"
    }

    fn priority(&self) -> i32 {
        60000
    }
}

impl DisplayColumn for GapColumn {
    fn header(&self) -> &str {
        "gap"
    }

    fn render(&self, view: &DisplayView) -> String {
        if view.gap >= 1e20 {
            "inf".to_owned()
        } else {
            format!("{:.2}%", view.gap * 100.0)
        }
    }
}
