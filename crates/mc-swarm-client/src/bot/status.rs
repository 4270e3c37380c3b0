use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use mc_swarm_proto::packets::status::{ServerStatus, ServerboundStatusPacket};

use super::*;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

impl Bot {
    pub(super) fn handle_status(&mut self, packet: ClientboundStatusPacket) -> Result<(), BotError> {
        match packet {
            ClientboundStatusPacket::StatusResponse { json } => {
                let status = ServerStatus::parse(&json)?;
                info!(
                    "Server status: {} (protocol {}), {}/{} players: {}",
                    status.version_name,
                    status.protocol,
                    status.online_players,
                    status.max_players,
                    status.description.to_plain()
                );
                if let Some(favicon) = &status.favicon {
                    debug!("Server favicon: {} bytes", favicon.len());
                }
                self.session
                    .send(ServerboundStatusPacket::PingRequest { time: now_millis() })
            }
            ClientboundStatusPacket::PongResponse { time } => {
                info!("Status ping: {}ms", (now_millis() - time).max(0));
                self.graceful_disconnect("Finished");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use mc_swarm_proto::packets::status::id;

    #[test]
    fn response_is_followed_by_ping() {
        let mut t = test_bot(ProtocolState::Status);
        t.bot
            .handle_status(ClientboundStatusPacket::StatusResponse {
                json: r#"{"version":{"name":"1.21.4","protocol":769},"description":"hi"}"#.into(),
            })
            .unwrap();
        assert_eq!(sent_ids(&mut t.writes), vec![id::PING_REQUEST]);
    }

    #[test]
    fn malformed_status_is_an_error() {
        let mut t = test_bot(ProtocolState::Status);
        assert!(t
            .bot
            .handle_status(ClientboundStatusPacket::StatusResponse { json: "{".into() })
            .is_err());
        assert!(sent_ids(&mut t.writes).is_empty());
    }

    #[tokio::test]
    async fn pong_finishes_the_query() {
        let mut t = test_bot(ProtocolState::Status);
        t.bot
            .handle_status(ClientboundStatusPacket::PongResponse { time: now_millis() })
            .unwrap();
        t.stop.changed().await.unwrap();
        assert_eq!(t.bot.lifecycle().disconnect_reason().as_deref(), Some("Finished"));
    }
}
