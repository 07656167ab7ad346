//! Business logic services

pub mod baseline;
pub mod geo;
pub mod geocoding;
pub mod geocoding_cache;
pub mod nominatim;
pub mod optimizer;
pub mod retry;
pub mod routing;
pub mod vrp;

#[cfg(test)]
pub mod testing;
