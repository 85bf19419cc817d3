// Application-side seams; adapters live under `infra`
pub mod ports;
