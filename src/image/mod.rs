pub mod catalog;

pub use catalog::{ImageCatalog, format_size};
