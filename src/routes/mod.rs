pub mod databases;
pub mod health;
pub mod metrics;
pub mod stats;
pub mod verify;
