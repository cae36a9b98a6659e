pub mod cache;
pub mod fs;
pub mod hash;

pub use cache::SingleFlight;
