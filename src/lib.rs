pub mod config;
pub mod controller;
pub mod power;
pub mod telemetry;
