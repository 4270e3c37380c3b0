use thiserror::Error;

use mc_swarm_proto::packets::ProtocolState;

/// Errors raised while driving one bot connection.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] mc_swarm_proto::ProtoError),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("timed out while {0}")]
    Timeout(&'static str),

    #[error("crypto error: {0}")]
    Crypto(#[from] mc_swarm_crypto::CryptoError),

    #[error("NBT error: {0}")]
    Nbt(#[from] mc_swarm_nbt::NbtError),

    #[error("world error: {0}")]
    World(#[from] mc_swarm_world::WorldError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed")]
    Closed,

    #[error("cannot send {packet} packet while outbound phase is {state}")]
    WrongPhase {
        packet: ProtocolState,
        state: ProtocolState,
    },

    #[error("executor manager already shut down")]
    ExecutorShutdown,

    #[error("task failed: {0}")]
    Task(String),
}

impl BotError {
    /// Render a caught panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("panicked: {s}")
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("panicked: {s}")
        } else {
            "panicked with unknown payload".to_string()
        };
        BotError::Task(message)
    }
}
