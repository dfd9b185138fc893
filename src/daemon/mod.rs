pub mod refresh;
pub mod start;
