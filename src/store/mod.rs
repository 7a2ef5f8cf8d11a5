mod error;
mod format;
mod store;

pub use error::StorageError;
pub use format::{DataFormat, CSV_HEADER};
pub use store::{read_observations, scan_file, store_path, Scan, Store};
