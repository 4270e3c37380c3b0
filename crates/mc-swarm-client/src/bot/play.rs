use tracing::info;

use mc_swarm_proto::packets::play::ServerboundPlayPacket;

use super::*;

impl Bot {
    /// Connection plumbing is answered here; everything else updates the
    /// session state.
    pub(super) fn handle_play(&mut self, packet: ClientboundPlayPacket) -> Result<(), BotError> {
        match packet {
            ClientboundPlayPacket::KeepAlive(keep_alive) => {
                self.session.send(ServerboundPlayPacket::KeepAlive(keep_alive))
            }
            ClientboundPlayPacket::Ping(ping) => self.session.send(ServerboundPlayPacket::Pong(ping)),
            ClientboundPlayPacket::Disconnect { reason } => {
                self.was_disconnected(&reason.to_plain());
                Ok(())
            }
            ClientboundPlayPacket::StartConfiguration => {
                info!("Server requested reconfiguration");
                self.session.set_inbound(ProtocolState::Configuration);
                self.session
                    .send(ServerboundPlayPacket::ConfigurationAcknowledged)?;
                self.session.set_outbound(ProtocolState::Configuration);
                Ok(())
            }
            packet => self.data.handle(packet, &self.session),
        }
    }
}
