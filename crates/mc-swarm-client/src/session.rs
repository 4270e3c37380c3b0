//! Negotiated connection state: phase per direction, cipher and
//! compression, plus the transport to write through.

use tracing::{debug, trace};

use mc_swarm_crypto::SECRET_LEN;
use mc_swarm_proto::packets::{ProtocolState, Serverbound};

use crate::error::BotError;
use crate::transport::TransportHandle;

#[derive(Debug)]
pub struct Session {
    inbound: ProtocolState,
    outbound: ProtocolState,
    compression_threshold: Option<i32>,
    encrypted: bool,
    transport: TransportHandle,
}

impl Session {
    pub fn new(transport: TransportHandle) -> Self {
        Self {
            inbound: ProtocolState::Handshake,
            outbound: ProtocolState::Handshake,
            compression_threshold: None,
            encrypted: false,
            transport,
        }
    }

    pub fn inbound(&self) -> ProtocolState {
        self.inbound
    }

    pub fn outbound(&self) -> ProtocolState {
        self.outbound
    }

    pub fn set_inbound(&mut self, state: ProtocolState) {
        debug!("Inbound phase {} -> {state}", self.inbound);
        self.inbound = state;
    }

    pub fn set_outbound(&mut self, state: ProtocolState) {
        debug!("Outbound phase {} -> {state}", self.outbound);
        self.outbound = state;
    }

    pub fn set_state(&mut self, state: ProtocolState) {
        self.set_inbound(state);
        self.set_outbound(state);
    }

    pub fn compression_threshold(&self) -> Option<i32> {
        self.compression_threshold
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn transport(&self) -> &TransportHandle {
        &self.transport
    }

    /// Send a packet of the current outbound phase. Packets of any other
    /// phase are refused.
    pub fn send(&self, packet: impl Into<Serverbound>) -> Result<(), BotError> {
        let packet = packet.into();
        if packet.state() != self.outbound {
            return Err(BotError::WrongPhase {
                packet: packet.state(),
                state: self.outbound,
            });
        }
        trace!("Sending {packet:?}");
        self.transport.send_raw(packet.encode())
    }

    /// Switch compression on for outgoing packets. Only the first
    /// non-negative threshold takes effect.
    pub fn enable_compression(&mut self, threshold: i32) -> Result<bool, BotError> {
        if threshold < 0 || self.compression_threshold.is_some() {
            return Ok(false);
        }
        self.transport.set_compression(threshold)?;
        self.compression_threshold = Some(threshold);
        debug!("Compression enabled with threshold {threshold}");
        Ok(true)
    }

    /// Send the key response and encrypt everything after it.
    pub fn send_key_and_encrypt(
        &mut self,
        key: impl Into<Serverbound>,
        secret: [u8; SECRET_LEN],
    ) -> Result<(), BotError> {
        let key = key.into();
        if key.state() != self.outbound {
            return Err(BotError::WrongPhase {
                packet: key.state(),
                state: self.outbound,
            });
        }
        self.transport.send_key_and_encrypt(key.encode(), secret)?;
        self.encrypted = true;
        debug!("Encryption enabled");
        Ok(())
    }

    pub fn close(&self) {
        self.transport.close();
    }
}
