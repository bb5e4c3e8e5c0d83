pub mod error;
pub mod gazetteer;
pub mod regions;

pub use error::GeoError;
pub use gazetteer::{City, Country, Gazetteer};
pub use regions::{RegionSet, to_region};
