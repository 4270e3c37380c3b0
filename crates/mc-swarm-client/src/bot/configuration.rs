use tracing::{debug, trace};

use mc_swarm_proto::codec::read_string;
use mc_swarm_proto::packets::common::{CookieResponse, CustomPayload, KnownPack};
use mc_swarm_proto::packets::configuration::ServerboundConfigurationPacket;
use mc_swarm_proto::types::Identifier;

use crate::registry::KnownPackSnapshot;

use super::*;

impl Bot {
    pub(super) fn handle_configuration(
        &mut self,
        packet: ClientboundConfigurationPacket,
    ) -> Result<(), BotError> {
        use ClientboundConfigurationPacket as P;
        match packet {
            P::KeepAlive(keep_alive) => self
                .session
                .send(ServerboundConfigurationPacket::KeepAlive(keep_alive)),
            P::Ping(ping) => self.session.send(ServerboundConfigurationPacket::Pong(ping)),
            P::Disconnect { reason } => {
                self.was_disconnected(&reason.to_plain());
                Ok(())
            }
            P::RegistryData(data) => {
                self.data.handle_registry_data(data);
                Ok(())
            }
            P::UpdateTags(tags) => {
                self.data.handle_update_tags(&tags);
                Ok(())
            }
            P::SelectKnownPacks { packs } => self.on_select_known_packs(packs),
            P::CookieRequest(request) => {
                self.session
                    .send(ServerboundConfigurationPacket::CookieResponse(CookieResponse {
                        key: request.key,
                        payload: None,
                    }))
            }
            P::CustomPayload(payload) => self.on_configuration_payload(payload),
            P::UpdateEnabledFeatures { features } => {
                debug!("Enabled features: {features:?}");
                Ok(())
            }
            P::ResetChat => Ok(()),
            P::FinishConfiguration => {
                self.session.set_inbound(ProtocolState::Play);
                self.session
                    .send(ServerboundConfigurationPacket::FinishConfiguration)?;
                self.session.set_outbound(ProtocolState::Play);
                Ok(())
            }
        }
    }

    /// Answer with the offered packs whose contents are bundled, so the
    /// server can leave those registry entries out.
    fn on_select_known_packs(&mut self, offered: Vec<KnownPack>) -> Result<(), BotError> {
        let snapshot = KnownPackSnapshot::bundled();
        let packs: Vec<KnownPack> = offered
            .into_iter()
            .filter(|pack| snapshot.covers(pack))
            .collect();
        debug!("Accepting {} known packs", packs.len());
        self.session
            .send(ServerboundConfigurationPacket::SelectKnownPacks { packs })
    }

    fn on_configuration_payload(&mut self, payload: CustomPayload) -> Result<(), BotError> {
        if payload.channel != Identifier::vanilla("brand") {
            trace!("Ignoring plugin message on {}", payload.channel);
            return Ok(());
        }
        let mut data = payload.data;
        let brand = read_string(&mut data, 32767)?;
        debug!("Server brand: {brand}");
        self.data.set_server_brand(brand);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use bytes::BytesMut;

    use mc_swarm_proto::codec::write_string;
    use mc_swarm_proto::packets::common::{CookieRequest, KeepAlive, PingId};
    use mc_swarm_proto::packets::configuration::{id, RegistryData, RegistryEntry};
    use mc_swarm_proto::text::TextComponent;

    use crate::transport::WriterCommand;

    #[test]
    fn keep_alive_and_ping_are_echoed() {
        let mut t = test_bot(ProtocolState::Configuration);
        t.bot
            .handle_configuration(ClientboundConfigurationPacket::KeepAlive(KeepAlive { id: 77 }))
            .unwrap();
        t.bot
            .handle_configuration(ClientboundConfigurationPacket::Ping(PingId { id: 3 }))
            .unwrap();
        let frames: Vec<_> = std::iter::from_fn(|| t.writes.try_recv().ok())
            .filter_map(|command| match command {
                WriterCommand::Packet(frame) => RawPacket::from_frame(frame).ok(),
                _ => None,
            })
            .collect();
        assert_eq!(frames[0].id, id::SB_KEEP_ALIVE);
        assert_eq!(&frames[0].body[..], &77i64.to_be_bytes());
        assert_eq!(frames[1].id, id::PONG);
        assert_eq!(&frames[1].body[..], &3i32.to_be_bytes());
    }

    #[test]
    fn known_packs_are_filtered() {
        let mut t = test_bot(ProtocolState::Configuration);
        let foreign = KnownPack {
            namespace: "example".into(),
            id: "datapack".into(),
            version: "1".into(),
        };
        t.bot
            .handle_configuration(ClientboundConfigurationPacket::SelectKnownPacks {
                packs: vec![KnownPack::core(), foreign],
            })
            .unwrap();
        let Some(WriterCommand::Packet(frame)) = t.writes.try_recv().ok() else {
            panic!("expected a reply");
        };
        let raw = RawPacket::from_frame(frame).unwrap();
        assert_eq!(raw.id, id::SB_SELECT_KNOWN_PACKS);
        // one entry: count prefix followed by the core pack
        assert_eq!(raw.body[0], 1);
    }

    #[test]
    fn registries_and_brand_are_stored() {
        let mut t = test_bot(ProtocolState::Configuration);
        t.bot
            .handle_configuration(ClientboundConfigurationPacket::RegistryData(RegistryData {
                registry: Identifier::vanilla(crate::registry::DIMENSION_TYPE),
                entries: vec![RegistryEntry {
                    id: Identifier::vanilla("overworld"),
                    data: None,
                }],
            }))
            .unwrap();
        assert!(t
            .bot
            .data()
            .registries()
            .index_of(
                &Identifier::vanilla(crate::registry::DIMENSION_TYPE),
                &Identifier::vanilla("overworld")
            )
            .is_some());

        let mut buf = BytesMut::new();
        write_string(&mut buf, "Paper");
        t.bot
            .handle_configuration(ClientboundConfigurationPacket::CustomPayload(CustomPayload {
                channel: Identifier::vanilla("brand"),
                data: buf.freeze(),
            }))
            .unwrap();
        assert_eq!(t.bot.data().server_brand(), Some("Paper"));
    }

    #[test]
    fn finish_switches_to_play() {
        let mut t = test_bot(ProtocolState::Configuration);
        t.bot
            .handle_configuration(ClientboundConfigurationPacket::CookieRequest(CookieRequest {
                key: Identifier::new("example", "cookie"),
            }))
            .unwrap();
        t.bot
            .handle_configuration(ClientboundConfigurationPacket::FinishConfiguration)
            .unwrap();
        assert_eq!(t.bot.session().inbound(), ProtocolState::Play);
        assert_eq!(t.bot.session().outbound(), ProtocolState::Play);
        assert_eq!(
            sent_ids(&mut t.writes),
            vec![id::SB_COOKIE_RESPONSE, id::SB_FINISH_CONFIGURATION]
        );
    }

    #[test]
    fn disconnect_stops_the_bot() {
        let mut t = test_bot(ProtocolState::Configuration);
        t.bot
            .handle_configuration(ClientboundConfigurationPacket::Disconnect {
                reason: TextComponent::literal("Kicked"),
            })
            .unwrap();
        assert!(!t.bot.is_running());
    }
}
