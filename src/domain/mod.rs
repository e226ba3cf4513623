pub mod channel;
pub mod grid;
pub mod registers;
pub mod stack;

pub use channel::{ChannelNetwork, NodeProps};
pub use grid::{CellGrid, DirGrid, GridSpec, Mask};
pub use registers::{ColDirs, MinMax, SpeciesColDirs, SpeciesCols};
pub use stack::{LayerConc, StackSet};
