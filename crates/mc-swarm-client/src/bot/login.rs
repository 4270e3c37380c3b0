use std::sync::Arc;

use tracing::{debug, info, warn};

use mc_swarm_crypto::{generate_shared_secret, server_hash, SECRET_LEN};
use mc_swarm_proto::packets::common::{ClientInformation, CookieResponse, CustomPayload};
use mc_swarm_proto::packets::configuration::ServerboundConfigurationPacket;
use mc_swarm_proto::packets::login::{GameProfile, Hello, ServerboundLoginPacket};

use crate::account::AuthKind;

use super::*;

impl Bot {
    pub(super) fn handle_login(&mut self, packet: ClientboundLoginPacket) -> Result<(), BotError> {
        match packet {
            ClientboundLoginPacket::Hello(hello) => self.on_hello(hello),
            ClientboundLoginPacket::LoginCompression { threshold } => {
                self.session.enable_compression(threshold)?;
                Ok(())
            }
            ClientboundLoginPacket::LoginFinished(profile) => self.on_login_finished(profile),
            ClientboundLoginPacket::LoginDisconnect { reason } => {
                self.was_disconnected(&reason.to_plain());
                Ok(())
            }
            ClientboundLoginPacket::CustomQuery {
                transaction_id,
                channel,
                ..
            } => {
                debug!("Declining login query {transaction_id} on {channel}");
                self.session
                    .send(ServerboundLoginPacket::CustomQueryAnswer { transaction_id })
            }
            ClientboundLoginPacket::CookieRequest(request) => {
                self.session
                    .send(ServerboundLoginPacket::CookieResponse(CookieResponse {
                        key: request.key,
                        payload: None,
                    }))
            }
        }
    }

    /// Encryption request. Online accounts confirm the join with the
    /// session service first; that call blocks, so it runs off the worker
    /// and the key response is scheduled back onto it.
    fn on_hello(&mut self, hello: Hello) -> Result<(), BotError> {
        let secret = generate_shared_secret();
        if !hello.should_authenticate {
            return self.finish_encryption(&hello, secret);
        }
        let AuthKind::Online { access_token } = &self.settings.account.auth else {
            warn!("Server sent an encryption request, but we're offline mode. Not authenticating with mojang.");
            return self.finish_encryption(&hello, secret);
        };

        let hash = server_hash(&hello.server_id, &secret, &hello.public_key);
        let identity = Arc::clone(&self.identity);
        let scheduler = self.scheduler.clone();
        let profile_id = self.settings.account.profile_id;
        let access_token = access_token.clone();
        self.scheduler.run_async(move || {
            match identity.join(profile_id, &access_token, &hash) {
                Ok(()) => {
                    debug!("Session join confirmed");
                    scheduler.schedule(move |bot: &mut Bot| bot.finish_encryption(&hello, secret));
                }
                Err(e) => {
                    let reason = format!("Login failed: {}", BotError::Authentication(e.to_string()));
                    scheduler.schedule(move |bot: &mut Bot| {
                        bot.graceful_disconnect(reason);
                        Ok(())
                    });
                }
            }
            Ok(())
        });
        Ok(())
    }

    fn finish_encryption(&mut self, hello: &Hello, secret: [u8; SECRET_LEN]) -> Result<(), BotError> {
        let (encrypted_secret, encrypted_verify_token) =
            mc_swarm_crypto::rsa::encrypt_key_response(&hello.public_key, &secret, &hello.verify_token)?;
        self.session.send_key_and_encrypt(
            ServerboundLoginPacket::Key {
                encrypted_secret,
                encrypted_verify_token,
            },
            secret,
        )
    }

    fn on_login_finished(&mut self, profile: GameProfile) -> Result<(), BotError> {
        info!("Logged in as {} ({})", profile.name, profile.id);
        self.data.set_profile_id(profile.id);

        self.session.set_inbound(ProtocolState::Configuration);
        self.session.send(ServerboundLoginPacket::LoginAcknowledged)?;
        self.session.set_outbound(ProtocolState::Configuration);

        let client = &self.settings.client;
        self.session.send(ServerboundConfigurationPacket::CustomPayload(
            CustomPayload::brand(&client.brand),
        ))?;
        self.session
            .send(ServerboundConfigurationPacket::ClientInformation(ClientInformation {
                locale: client.locale.clone(),
                view_distance: client.view_distance,
                ..Default::default()
            }))
    }
}
