pub mod channel_file;
pub mod deck;
pub mod echo;
pub mod export;
pub mod grid_ascii;
pub mod grids_out;
pub mod massbalance;
pub mod scanner;
pub mod summary;
