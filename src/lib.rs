pub mod browse;
pub mod cli;
pub mod config;
pub mod controller;
pub mod events;
pub mod fetch;
pub mod io;
pub mod manifest;
pub mod ollama;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod shell;
pub mod status;
pub mod styles;

pub use config::{AppConfig, Credentials, ProviderKind};
pub use controller::Controller;
