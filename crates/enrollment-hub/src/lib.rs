pub mod config;
pub mod cpf;
pub mod enrollment;
pub mod error;
pub mod messaging;
pub mod registry;
pub mod store;
pub mod telemetry;
