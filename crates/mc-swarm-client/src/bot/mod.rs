//! The per-connection context every handler, task and listener runs
//! against.
//!
//! A [`Bot`] is owned by its connection worker. Clientbound packets are
//! decoded for the current inbound phase and handed to the matching phase
//! handler in the submodules; play packets that carry world or entity state
//! continue on to the [`SessionDataManager`].

mod configuration;
mod login;
mod play;
mod status;

use std::sync::Arc;

use tracing::{error, warn};
use uuid::Uuid;

use mc_swarm_proto::packets::configuration::ClientboundConfigurationPacket;
use mc_swarm_proto::packets::login::ClientboundLoginPacket;
use mc_swarm_proto::packets::play::ClientboundPlayPacket;
use mc_swarm_proto::packets::status::ClientboundStatusPacket;
use mc_swarm_proto::packets::{ProtocolState, RawPacket};
use mc_swarm_proto::ProtoError;

use crate::account::Account;
use crate::connection::{BotSettings, Lifecycle};
use crate::control::{BotControl, Control};
use crate::data::SessionDataManager;
use crate::error::BotError;
use crate::executor::ExecutorManager;
use crate::identity::IdentityProvider;
use crate::listener::{BotListener, TickHookKind, TickHooks};
use crate::scheduler::{spawn_in_span, SchedulerHandle};
use crate::session::Session;

pub struct Bot {
    id: Uuid,
    settings: Arc<BotSettings>,
    session: Session,
    data: SessionDataManager,
    control: BotControl,
    hooks: TickHooks<Bot>,
    listeners: Vec<Box<dyn BotListener>>,
    scheduler: SchedulerHandle<Bot>,
    lifecycle: Arc<Lifecycle>,
    identity: Arc<dyn IdentityProvider>,
}

impl Bot {
    pub fn new(
        id: Uuid,
        settings: Arc<BotSettings>,
        session: Session,
        scheduler: SchedulerHandle<Bot>,
        lifecycle: Arc<Lifecycle>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let data = SessionDataManager::with_shapes(
            settings.account.profile_id,
            settings.auto_respawn,
            settings.shapes.clone(),
        );
        Self {
            id,
            settings,
            session,
            data,
            control: BotControl::default(),
            hooks: TickHooks::default(),
            listeners: Vec::new(),
            scheduler,
            lifecycle,
            identity,
        }
    }

    /// Connection id, unique per connect.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.settings.account.name
    }

    pub fn account(&self) -> &Account {
        &self.settings.account
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn data(&self) -> &SessionDataManager {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut SessionDataManager {
        &mut self.data
    }

    pub fn control(&mut self) -> Control<'_> {
        Control::new(&mut self.control, &self.session, &mut self.data)
    }

    pub fn scheduler(&self) -> &SchedulerHandle<Bot> {
        &self.scheduler
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Pools scoped to this bot; they stop when it disconnects.
    pub fn executors(&self) -> &ExecutorManager {
        self.lifecycle.executors()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn add_listener(&mut self, listener: impl BotListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Run `hook` once during the current tick. The table is cleared at the
    /// start of every tick.
    pub fn register_hook(&mut self, kind: TickHookKind, hook: impl FnOnce(&mut Bot) + Send + 'static) {
        self.hooks.register(kind, hook);
    }

    /// Start a graceful disconnect in the background. Later calls are
    /// no-ops.
    pub fn graceful_disconnect(&self, reason: impl Into<String>) {
        let lifecycle = Arc::clone(&self.lifecycle);
        let reason = reason.into();
        spawn_in_span(async move { lifecycle.graceful_disconnect(&reason).await });
    }

    pub fn was_disconnected(&self, reason: &str) {
        self.lifecycle.was_disconnected(reason);
    }

    /// Decode a packet for the current inbound phase and handle it. Errors
    /// are reported here and never escape.
    pub fn handle_packet(&mut self, raw: RawPacket) {
        let state = self.session.inbound();
        let result = match state {
            ProtocolState::Handshake => {
                warn!("Unexpected packet 0x{:02X} before the handshake was sent", raw.id);
                Ok(())
            }
            ProtocolState::Status => ClientboundStatusPacket::decode(raw)
                .map_err(BotError::from)
                .and_then(|p| self.handle_status(p)),
            ProtocolState::Login => ClientboundLoginPacket::decode(raw)
                .map_err(BotError::from)
                .and_then(|p| self.handle_login(p)),
            ProtocolState::Configuration => ClientboundConfigurationPacket::decode(raw)
                .map_err(BotError::from)
                .and_then(|p| self.handle_configuration(p)),
            ProtocolState::Play => ClientboundPlayPacket::decode(raw)
                .map_err(BotError::from)
                .and_then(|p| self.handle_play(p)),
        };
        if let Err(e) = result {
            self.report_packet_error(state, e);
        }
    }

    fn report_packet_error(&self, state: ProtocolState, e: BotError) {
        match e {
            BotError::Protocol(ProtoError::UnknownPacketId { .. }) => warn!("{e}"),
            BotError::Protocol(_) if state == ProtocolState::Login => {
                self.was_disconnected(&format!("Internal Exception: {e}"));
            }
            e => error!("Error handling {state} packet: {e}"),
        }
    }

    /// One logical tick, after inbound packets and cross-thread hooks.
    pub(crate) fn tick_state(&mut self) -> Result<(), BotError> {
        self.data.tick(&self.session)?;
        self.control.tick();
        Ok(())
    }

    pub(crate) fn take_listeners(&mut self) -> Vec<Box<dyn BotListener>> {
        std::mem::take(&mut self.listeners)
    }

    /// Put listeners back, keeping any that were added while they were out.
    pub(crate) fn restore_listeners(&mut self, mut listeners: Vec<Box<dyn BotListener>>) {
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }

    pub(crate) fn hooks_mut(&mut self) -> &mut TickHooks<Bot> {
        &mut self.hooks
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("id", &self.id)
            .field("name", &self.settings.account.name)
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr};

    use bytes::{BufMut, BytesMut};
    use tokio::sync::{mpsc, watch};

    use mc_swarm_proto::codec::ProtoEncode;
    use mc_swarm_proto::types::VarInt;

    use crate::config::{ClientSection, ConnectIntent, TimeoutsSection};
    use crate::identity::NoIdentityService;
    use crate::scheduler::BotScheduler;
    use crate::transport::{ReaderCommand, TransportHandle, WriterCommand};

    pub struct TestBot {
        pub bot: Bot,
        pub scheduler: BotScheduler<Bot>,
        pub writes: mpsc::UnboundedReceiver<WriterCommand>,
        pub reads: mpsc::UnboundedReceiver<ReaderCommand>,
        pub stop: watch::Receiver<bool>,
    }

    pub fn settings(account: Account) -> BotSettings {
        BotSettings {
            account,
            protocol_version: mc_swarm_proto::packets::PROTOCOL_VERSION,
            host: "localhost".into(),
            port: 25565,
            address: SocketAddr::from((Ipv4Addr::LOCALHOST, 25565)),
            intent: ConnectIntent::Login,
            proxy: None,
            timeouts: TimeoutsSection::default(),
            client: ClientSection::default(),
            auto_respawn: false,
            shapes: mc_swarm_world::BlockShapeTable::bundled(),
        }
    }

    pub fn test_bot_with(
        account: Account,
        state: ProtocolState,
        identity: Arc<dyn IdentityProvider>,
    ) -> TestBot {
        let (transport, writes, reads) = TransportHandle::channel();
        let scheduler = BotScheduler::new();
        let executors = ExecutorManager::new(account.name.clone());
        let (lifecycle, stop) = Lifecycle::new(transport.clone(), scheduler.handle(), executors);
        let lifecycle = Arc::new(lifecycle.with_grace(std::time::Duration::ZERO));
        let mut session = Session::new(transport);
        session.set_state(state);
        let bot = Bot::new(
            Uuid::new_v4(),
            Arc::new(settings(account)),
            session,
            scheduler.handle(),
            lifecycle,
            identity,
        );
        TestBot {
            bot,
            scheduler,
            writes,
            reads,
            stop,
        }
    }

    pub fn test_bot(state: ProtocolState) -> TestBot {
        test_bot_with(Account::offline("Tester"), state, Arc::new(NoIdentityService))
    }

    /// Frame an `id + body` packet as the reader would deliver it.
    pub fn raw(id: u32, body: impl FnOnce(&mut BytesMut)) -> RawPacket {
        let mut buf = BytesMut::new();
        VarInt(id as i32).proto_encode(&mut buf);
        body(&mut buf);
        RawPacket::from_frame(buf.freeze()).unwrap()
    }

    pub fn put_i64(value: i64) -> impl FnOnce(&mut BytesMut) {
        move |buf| buf.put_i64(value)
    }

    /// Ids of every packet queued so far.
    pub fn sent_ids(writes: &mut mpsc::UnboundedReceiver<WriterCommand>) -> Vec<u32> {
        crate::data::test_support::sent_ids(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use mc_swarm_proto::packets::play::id as play_id;

    #[test]
    fn bot_pools_stop_on_disconnect() {
        let t = test_bot(ProtocolState::Play);
        let pool = t.bot.executors().new_fixed_executor("combat", 2).unwrap();
        assert_eq!(pool.name(), "Tester-combat");

        t.bot.was_disconnected("Kicked");
        assert!(!pool.is_running());
        assert!(t.bot.executors().is_shutdown());
    }

    #[test]
    fn unknown_packet_id_is_ignored() {
        let mut t = test_bot(ProtocolState::Play);
        t.bot.handle_packet(raw(0x7F, |_| {}));
        assert!(t.bot.is_running());
        assert!(sent_ids(&mut t.writes).is_empty());
    }

    #[test]
    fn malformed_login_packet_disconnects() {
        let mut t = test_bot(ProtocolState::Login);
        // compression packet without its threshold
        t.bot.handle_packet(raw(0x03, |_| {}));
        assert!(!t.bot.is_running());
        assert!(*t.stop.borrow());
        assert!(t
            .bot
            .lifecycle()
            .disconnect_reason()
            .unwrap()
            .starts_with("Internal Exception: "));
    }

    #[test]
    fn malformed_play_packet_is_logged() {
        let mut t = test_bot(ProtocolState::Play);
        t.bot.handle_packet(raw(play_id::KEEP_ALIVE, |_| {}));
        assert!(t.bot.is_running());
    }

    #[test]
    fn listeners_added_during_dispatch_are_kept() {
        struct Noop;
        impl BotListener for Noop {}

        let mut t = test_bot(ProtocolState::Play);
        t.bot.add_listener(Noop);
        let taken = t.bot.take_listeners();
        t.bot.add_listener(Noop);
        t.bot.restore_listeners(taken);
        assert_eq!(t.bot.take_listeners().len(), 2);
    }
}
