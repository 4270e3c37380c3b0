//! Headless Minecraft Java client core for running many bots against one
//! server.

pub mod account;
pub mod bot;
pub mod config;
pub mod connection;
pub mod control;
pub mod data;
pub mod error;
pub mod executor;
pub mod factory;
pub mod identity;
pub mod listener;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod tick;
pub mod transport;

pub use bot::Bot;
pub use connection::{BotHandle, BotSettings};
pub use error::BotError;
