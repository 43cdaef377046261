//! CSV input and output for rosters and payment exports

pub mod csv_format;
