//! Photovoltaic sources.

pub mod cell;
pub mod string;

pub use cell::{PvCell, PvCellConfig, PvEnvironment, PvRegion};
pub use string::{PvString, PvStringConfig, PvStringInput};
