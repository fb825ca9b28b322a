pub mod config;
pub mod cycle;
pub mod database;
pub mod distance;
pub mod emitter;
pub mod filter;
pub mod output;
pub mod report;
pub mod scanner;
pub mod sink;
pub mod tracker;
pub mod validation;

pub use config::Config;
pub use cycle::CycleRunner;
pub use distance::{to_distance, DistanceModel};
pub use filter::{FilterState, NoiseFilter, RecursiveFilter, WindowFilter};
pub use tracker::TrackerRegistry;
