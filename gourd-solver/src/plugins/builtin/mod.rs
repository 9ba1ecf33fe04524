//! The builtin plugin suite registered by a default solver.

pub mod branching;
pub mod conflict_linear;
pub mod display;
pub mod fracdiving;
pub mod linear;
pub mod nodesel;
pub mod presol_trivial;
pub mod reader_cip;
pub mod rounding;

pub use branching::MostFracBranching;
pub use conflict_linear::LinearConflictHdlr;
pub use display::DualColumn;
pub use display::GapColumn;
pub use display::NodesColumn;
pub use display::OpenColumn;
pub use display::PrimalColumn;
pub use fracdiving::FracDiving;
pub use linear::LinearConsData;
pub use linear::LinearConsHdlr;
pub use nodesel::BestBoundSel;
pub use nodesel::DfsSel;
pub use presol_trivial::TrivialPresol;
pub use reader_cip::CipReader;
pub use rounding::RoundingHeur;
