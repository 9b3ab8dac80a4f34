//! Output of water-area time series

pub mod export;

pub use export::{write_csv, write_csv_file, WaterAreaRecord};
