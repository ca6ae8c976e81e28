pub mod metrics;
pub mod sessions;
pub mod stats;
pub mod verification;
