pub mod analysis;
pub mod config;
pub mod display;
pub mod import;
pub mod sampler;
