//! One bot connection: opening the socket, the lifecycle shared between
//! the worker and the outside world, and the worker loop that drives the
//! bot at 20 ticks per second.

use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use mc_swarm_proto::packets::handshake::{ClientIntent, ClientIntention, ServerboundHandshakePacket};
use mc_swarm_proto::packets::login::ServerboundLoginPacket;
use mc_swarm_proto::packets::status::ServerboundStatusPacket;
use mc_swarm_proto::packets::ProtocolState;
use mc_swarm_world::BlockShapeTable;

use crate::account::Account;
use crate::bot::Bot;
use crate::config::{ClientSection, ConnectIntent, ProxySection, TimeoutsSection};
use crate::error::BotError;
use crate::executor::ExecutorManager;
use crate::identity::IdentityProvider;
use crate::listener::{run_hooks, BotListener, TickHookKind};
use crate::scheduler::{BotScheduler, SchedulerHandle};
use crate::session::Session;
use crate::tick::{TickTimer, TICK_LENGTH};
use crate::transport::{self, InboundEvent, Transport, TransportHandle};

/// Time the writer gets to flush after a graceful close.
const CLOSE_GRACE: Duration = Duration::from_secs(1);
/// Time running tasks get to notice the scheduler shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Everything needed to open one connection.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub account: Account,
    pub protocol_version: i32,
    /// Host name sent in the handshake.
    pub host: String,
    pub port: u16,
    /// Resolved address to connect to.
    pub address: SocketAddr,
    pub intent: ConnectIntent,
    pub proxy: Option<ProxySection>,
    pub timeouts: TimeoutsSection,
    pub client: ClientSection,
    pub auto_respawn: bool,
    pub shapes: Arc<BlockShapeTable>,
}

type ShutdownHook = Box<dyn FnOnce() + Send>;

struct LifecycleState {
    running: bool,
    reason: Option<String>,
    shutdown_hooks: Vec<ShutdownHook>,
}

/// Running flag and teardown of one connection. Both disconnect paths run
/// at most once; whichever comes first wins.
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
    stop: watch::Sender<bool>,
    scheduler: SchedulerHandle<Bot>,
    transport: TransportHandle,
    executors: ExecutorManager,
    close_grace: Duration,
    shutdown_grace: Duration,
}

impl Lifecycle {
    /// The receiver flips to `true` once the worker should exit. The
    /// executors are stopped on either disconnect path.
    pub fn new(
        transport: TransportHandle,
        scheduler: SchedulerHandle<Bot>,
        executors: ExecutorManager,
    ) -> (Self, watch::Receiver<bool>) {
        let (stop, stopped) = watch::channel(false);
        let lifecycle = Self {
            state: Mutex::new(LifecycleState {
                running: true,
                reason: None,
                shutdown_hooks: Vec::new(),
            }),
            stop,
            scheduler,
            transport,
            executors,
            close_grace: CLOSE_GRACE,
            shutdown_grace: SHUTDOWN_GRACE,
        };
        (lifecycle, stopped)
    }

    /// Override both grace periods.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self.shutdown_grace = grace;
        self
    }

    /// Run `hook` once when the connection goes down. Hooks added after
    /// that run immediately.
    pub fn add_shutdown_hook(&self, hook: impl FnOnce() + Send + 'static) {
        let mut state = self.state.lock();
        if state.running {
            state.shutdown_hooks.push(Box::new(hook));
            return;
        }
        drop(state);
        hook();
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn disconnect_reason(&self) -> Option<String> {
        self.state.lock().reason.clone()
    }

    /// Auxiliary pools owned by this connection.
    pub fn executors(&self) -> &ExecutorManager {
        &self.executors
    }

    /// Flip to stopped and hand out the hooks. `None` if already stopped.
    fn begin_stop(&self, reason: &str) -> Option<Vec<ShutdownHook>> {
        let mut state = self.state.lock();
        if !state.running {
            return None;
        }
        state.running = false;
        state.reason = Some(reason.to_string());
        Some(std::mem::take(&mut state.shutdown_hooks))
    }

    fn run_shutdown_hooks(hooks: Vec<ShutdownHook>) {
        for hook in hooks {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(hook)) {
                error!("Error in shutdown hook: {}", BotError::from_panic(panic));
            }
        }
    }

    /// Close from our side: let queued packets drain, then stop the
    /// scheduler and the worker.
    pub async fn graceful_disconnect(&self, reason: &str) {
        let Some(hooks) = self.begin_stop(reason) else {
            return;
        };
        info!("Disconnecting: {reason}");
        Self::run_shutdown_hooks(hooks);
        self.transport.close();
        tokio::time::sleep(self.close_grace).await;
        self.scheduler.shutdown();
        self.executors.shutdown_all();
        tokio::time::sleep(self.shutdown_grace).await;
        self.stop.send_replace(true);
    }

    /// The server closed the connection or the stream failed.
    pub fn was_disconnected(&self, reason: &str) {
        let Some(hooks) = self.begin_stop(reason) else {
            return;
        };
        info!("Disconnected: {reason}");
        Self::run_shutdown_hooks(hooks);
        self.scheduler.shutdown();
        self.executors.shutdown_all();
        self.transport.abort_reader();
        self.stop.send_replace(true);
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Lifecycle")
            .field("running", &state.running)
            .field("reason", &state.reason)
            .finish()
    }
}

type CrossThreadHook = Box<dyn FnOnce(&mut Bot) + Send>;

/// Outside view of a running bot.
#[derive(Debug)]
pub struct BotHandle {
    id: Uuid,
    name: String,
    lifecycle: Arc<Lifecycle>,
    scheduler: SchedulerHandle<Bot>,
    before_tick: mpsc::UnboundedSender<CrossThreadHook>,
    worker: JoinHandle<()>,
}

impl BotHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    pub fn scheduler(&self) -> &SchedulerHandle<Bot> {
        &self.scheduler
    }

    /// Run `hook` on the worker at the start of the next tick.
    pub fn run_before_tick(&self, hook: impl FnOnce(&mut Bot) + Send + 'static) -> bool {
        self.before_tick.send(Box::new(hook)).is_ok()
    }

    pub async fn graceful_disconnect(&self, reason: &str) {
        self.lifecycle.graceful_disconnect(reason).await;
    }

    /// Wait for the worker to exit.
    pub async fn wait(self) -> Result<(), BotError> {
        self.worker
            .await
            .map_err(|e| BotError::Task(e.to_string()))
    }
}

/// Open the connection, send the handshake and the first packet of the
/// chosen intent, then start the worker.
pub async fn connect(
    settings: Arc<BotSettings>,
    identity: Arc<dyn IdentityProvider>,
) -> Result<BotHandle, BotError> {
    let id = Uuid::new_v4();
    let span = info_span!("bot", name = %settings.account.name, id = %id);
    let (started, worker) = start(id, settings, identity).instrument(span.clone()).await?;
    Ok(BotHandle {
        id,
        name: started.name,
        lifecycle: started.lifecycle,
        scheduler: started.scheduler,
        before_tick: started.before_tick,
        worker: tokio::spawn(worker.run().instrument(span)),
    })
}

struct Started {
    name: String,
    lifecycle: Arc<Lifecycle>,
    scheduler: SchedulerHandle<Bot>,
    before_tick: mpsc::UnboundedSender<CrossThreadHook>,
}

async fn start(
    id: Uuid,
    settings: Arc<BotSettings>,
    identity: Arc<dyn IdentityProvider>,
) -> Result<(Started, Worker), BotError> {
    debug!("Connecting to {} ({})", settings.address, settings.host);
    let stream = transport::open_stream(
        settings.address,
        &settings.host,
        settings.proxy.as_ref(),
        settings.timeouts.connect(),
    )
    .await?;
    let Transport { handle, inbound } =
        transport::spawn(stream, settings.timeouts.read(), settings.timeouts.write());

    let scheduler = BotScheduler::new();
    let executors = ExecutorManager::new(settings.account.name.clone());
    let (lifecycle, stop) = Lifecycle::new(handle.clone(), scheduler.handle(), executors);
    let lifecycle = Arc::new(lifecycle);

    let mut session = Session::new(handle);
    let (state, intent) = match settings.intent {
        ConnectIntent::Login => (ProtocolState::Login, ClientIntent::Login),
        ConnectIntent::Status => (ProtocolState::Status, ClientIntent::Status),
    };
    session.send(ServerboundHandshakePacket::ClientIntention(ClientIntention {
        protocol_version: settings.protocol_version,
        host: settings.host.clone(),
        port: settings.port,
        intent,
    }))?;
    session.set_state(state);
    match settings.intent {
        ConnectIntent::Login => session.send(ServerboundLoginPacket::Hello {
            name: settings.account.name.clone(),
            profile_id: settings.account.profile_id,
        })?,
        ConnectIntent::Status => session.send(ServerboundStatusPacket::StatusRequest)?,
    }

    let (before_tick, before_tick_rx) = mpsc::unbounded_channel();
    let started = Started {
        name: settings.account.name.clone(),
        lifecycle: Arc::clone(&lifecycle),
        scheduler: scheduler.handle(),
        before_tick,
    };
    let bot = Bot::new(id, settings, session, scheduler.handle(), lifecycle, identity);
    info!("Connected");
    Ok((started, Worker::new(bot, scheduler, inbound, before_tick_rx, stop)))
}

/// Why the worker woke up.
enum Wake {
    Stop,
    Inbound(Option<InboundEvent>),
    Scheduled,
    Tick,
}

/// Owns the bot and everything that touches it.
pub(crate) struct Worker {
    bot: Bot,
    scheduler: BotScheduler<Bot>,
    inbound: mpsc::Receiver<InboundEvent>,
    before_tick: mpsc::UnboundedReceiver<CrossThreadHook>,
    stop: watch::Receiver<bool>,
    timer: TickTimer,
}

impl Worker {
    pub(crate) fn new(
        bot: Bot,
        scheduler: BotScheduler<Bot>,
        inbound: mpsc::Receiver<InboundEvent>,
        before_tick: mpsc::UnboundedReceiver<CrossThreadHook>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bot,
            scheduler,
            inbound,
            before_tick,
            stop,
            timer: TickTimer::new(Instant::now()),
        }
    }

    pub(crate) async fn run(mut self) {
        let mut interval = tokio::time::interval(TICK_LENGTH);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            let wake = tokio::select! {
                biased;
                changed = self.stop.changed() => {
                    if changed.is_err() || *self.stop.borrow() {
                        Wake::Stop
                    } else {
                        Wake::Tick
                    }
                }
                event = self.inbound.recv() => Wake::Inbound(event),
                _ = self.scheduler.wait() => Wake::Scheduled,
                _ = interval.tick() => Wake::Tick,
            };
            match wake {
                Wake::Stop => break,
                Wake::Inbound(Some(event)) => self.handle_event(event),
                Wake::Inbound(None) => {
                    self.bot.was_disconnected("Connection closed");
                    break;
                }
                Wake::Scheduled | Wake::Tick => {}
            }

            self.scheduler.run_due(&mut self.bot);
            let ticks = self.timer.advance(Instant::now());
            for _ in 0..ticks {
                if !self.bot.is_running() {
                    break;
                }
                self.tick();
            }
        }
        self.finish();
    }

    fn handle_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Packet(raw) => {
                if !self.bot.is_running() {
                    return;
                }
                let id = raw.id;
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.bot.handle_packet(raw))) {
                    error!("Error handling packet 0x{id:02X}: {}", BotError::from_panic(panic));
                }
            }
            InboundEvent::Closed(reason) => self.bot.was_disconnected(&reason),
        }
    }

    pub(crate) fn tick(&mut self) {
        while let Ok(event) = self.inbound.try_recv() {
            self.handle_event(event);
        }
        while let Ok(hook) = self.before_tick.try_recv() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| hook(&mut self.bot))) {
                error!("Error in cross-thread hook: {}", BotError::from_panic(panic));
            }
        }

        self.bot.hooks_mut().clear();
        self.each_listener("pre-tick", |listener, bot| listener.on_pre_tick(bot));
        let hooks = self.bot.hooks_mut().take(TickHookKind::PreTick);
        run_hooks(&mut self.bot, TickHookKind::PreTick, hooks);

        match catch_unwind(AssertUnwindSafe(|| self.bot.tick_state())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error during tick: {e}"),
            Err(panic) => error!("Error during tick: {}", BotError::from_panic(panic)),
        }

        self.each_listener("post-tick", |listener, bot| listener.on_post_tick(bot));
        let hooks = self.bot.hooks_mut().take(TickHookKind::PostTick);
        run_hooks(&mut self.bot, TickHookKind::PostTick, hooks);
    }

    fn each_listener(
        &mut self,
        event: &str,
        mut call: impl FnMut(&mut Box<dyn BotListener>, &mut Bot),
    ) {
        let mut listeners = self.bot.take_listeners();
        for listener in &mut listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| call(listener, &mut self.bot))) {
                error!("Error in {event} listener: {}", BotError::from_panic(panic));
            }
        }
        self.bot.restore_listeners(listeners);
    }

    fn finish(mut self) {
        let reason = self
            .bot
            .lifecycle()
            .disconnect_reason()
            .unwrap_or_else(|| "Disconnected".to_string());
        self.each_listener("disconnect", |listener, bot| listener.on_disconnect(bot, &reason));
        self.bot.session().transport().abort_reader();
        if self.scheduler.pending() > 0 {
            warn!("Dropping {} pending tasks", self.scheduler.pending());
        }
        debug!("Worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_support::*;
    use crate::identity::NoIdentityService;
    use bytes::BytesMut;
    use mc_swarm_proto::codec::{write_string, ProtoEncode};
    use mc_swarm_proto::frame::FrameCodec;
    use mc_swarm_proto::packets::RawPacket;
    use mc_swarm_proto::types::VarInt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn lifecycle() -> (Arc<Lifecycle>, watch::Receiver<bool>, SchedulerHandle<Bot>) {
        let (transport, _writes, _reads) = TransportHandle::channel();
        let scheduler = BotScheduler::<Bot>::new().handle();
        let (lifecycle, stop) =
            Lifecycle::new(transport, scheduler.clone(), ExecutorManager::new("Tester"));
        (Arc::new(lifecycle.with_grace(Duration::ZERO)), stop, scheduler)
    }

    #[test]
    fn was_disconnected_runs_once() {
        let (lifecycle, stop, scheduler) = lifecycle();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        lifecycle.add_shutdown_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        lifecycle.was_disconnected("Timed out");
        lifecycle.was_disconnected("Again");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.disconnect_reason().as_deref(), Some("Timed out"));
        assert!(*stop.borrow());
        assert!(scheduler.is_shutdown());
    }

    #[test]
    fn executors_stop_with_the_connection() {
        let (lifecycle, _stop, _scheduler) = lifecycle();
        let pool = lifecycle.executors().new_executor("pathing").unwrap();
        assert_eq!(pool.name(), "Tester-pathing");
        assert!(pool.is_running());

        lifecycle.was_disconnected("Kicked");
        assert!(!pool.is_running());
        assert!(lifecycle.executors().is_shutdown());
        assert!(matches!(
            lifecycle.executors().new_executor("late"),
            Err(BotError::ExecutorShutdown)
        ));
    }

    #[tokio::test]
    async fn graceful_disconnect_stops_executors() {
        let (lifecycle, _stop, _scheduler) = lifecycle();
        let pool = lifecycle.executors().new_scheduled_executor("timer").unwrap();
        lifecycle.graceful_disconnect("Finished").await;
        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn graceful_after_server_disconnect_is_noop() {
        let (lifecycle, _stop, _scheduler) = lifecycle();
        lifecycle.was_disconnected("Kicked");
        lifecycle.graceful_disconnect("Bye").await;
        assert_eq!(lifecycle.disconnect_reason().as_deref(), Some("Kicked"));
    }

    #[tokio::test]
    async fn graceful_disconnect_shuts_scheduler_down() {
        let (lifecycle, stop, scheduler) = lifecycle();
        lifecycle.graceful_disconnect("Finished").await;
        lifecycle.graceful_disconnect("Twice").await;
        assert!(!lifecycle.is_running());
        assert!(scheduler.is_shutdown());
        assert!(*stop.borrow());
        assert_eq!(lifecycle.disconnect_reason().as_deref(), Some("Finished"));
    }

    #[test]
    fn late_shutdown_hook_runs_immediately() {
        let (lifecycle, _stop, _scheduler) = lifecycle();
        lifecycle.was_disconnected("Closed");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        lifecycle.add_shutdown_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    impl BotListener for Recorder {
        fn on_pre_tick(&mut self, bot: &mut Bot) {
            self.0.lock().push("pre");
            let log = Arc::clone(&self.0);
            bot.register_hook(TickHookKind::PostTick, move |_| log.lock().push("hook"));
        }

        fn on_post_tick(&mut self, _bot: &mut Bot) {
            self.0.lock().push("post");
        }

        fn on_disconnect(&mut self, _bot: &mut Bot, reason: &str) {
            assert_eq!(reason, "Closed by test");
            self.0.lock().push("disconnect");
        }
    }

    fn worker(t: TestBot) -> (Worker, mpsc::Sender<InboundEvent>, mpsc::UnboundedSender<CrossThreadHook>) {
        let (inbound_tx, inbound) = mpsc::channel(8);
        let (hook_tx, hook_rx) = mpsc::unbounded_channel();
        let worker = Worker::new(t.bot, t.scheduler, inbound, hook_rx, t.stop);
        (worker, inbound_tx, hook_tx)
    }

    #[test]
    fn tick_order() {
        let t = test_bot(ProtocolState::Play);
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut worker, _inbound, hooks) = worker(t);
        worker.bot.add_listener(Recorder(Arc::clone(&log)));
        let early = Arc::clone(&log);
        hooks
            .send(Box::new(move |_: &mut Bot| early.lock().push("cross-thread")))
            .unwrap();

        worker.tick();
        worker.tick();
        assert_eq!(
            *log.lock(),
            vec!["cross-thread", "pre", "post", "hook", "pre", "post", "hook"]
        );
    }

    #[test]
    fn inbound_packets_are_drained_each_tick() {
        let t = test_bot(ProtocolState::Play);
        let (mut worker, inbound, _hooks) = worker(t);
        inbound
            .try_send(InboundEvent::Packet(raw(
                mc_swarm_proto::packets::play::id::KEEP_ALIVE,
                put_i64(1),
            )))
            .unwrap();
        inbound
            .try_send(InboundEvent::Closed("Connection reset".into()))
            .unwrap();
        worker.tick();
        assert!(!worker.bot.is_running());
        assert_eq!(
            worker.bot.lifecycle().disconnect_reason().as_deref(),
            Some("Connection reset")
        );
    }

    #[tokio::test]
    async fn worker_exits_and_notifies_listeners() {
        let t = test_bot(ProtocolState::Play);
        let log = Arc::new(Mutex::new(Vec::new()));
        let (mut worker, inbound, _hooks) = worker(t);
        worker.bot.add_listener(Recorder(Arc::clone(&log)));
        inbound
            .send(InboundEvent::Closed("Closed by test".into()))
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), worker.run())
            .await
            .unwrap();
        assert_eq!(log.lock().last(), Some(&"disconnect"));
    }

    fn frame(codec: &FrameCodec, id: u32, body: &[u8]) -> BytesMut {
        let mut packet = BytesMut::new();
        VarInt(id as i32).proto_encode(&mut packet);
        packet.extend_from_slice(body);
        let mut out = BytesMut::new();
        codec.encode(&packet, &mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn status_query_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let codec = FrameCodec::new();
            let mut buf = BytesMut::new();
            let mut ids = Vec::new();
            while ids.len() < 3 {
                if let Some(packet) = codec.decode(&mut buf).unwrap() {
                    let raw = RawPacket::from_frame(packet).unwrap();
                    ids.push(raw.id);
                    let reply = match ids.len() {
                        2 => {
                            let mut body = BytesMut::new();
                            write_string(
                                &mut body,
                                r#"{"version":{"name":"1.21.4","protocol":769},"players":{"max":20,"online":0},"description":"test"}"#,
                            );
                            Some(frame(&codec, 0x00, &body))
                        }
                        3 => Some(frame(&codec, 0x01, &raw.body)),
                        _ => None,
                    };
                    if let Some(reply) = reply {
                        socket.write_all(&reply).await.unwrap();
                    }
                    continue;
                }
                if socket.read_buf(&mut buf).await.unwrap() == 0 {
                    break;
                }
            }
            ids
        });

        let mut settings = settings(Account::offline("Pinger"));
        settings.address = address;
        settings.intent = ConnectIntent::Status;
        let handle = connect(Arc::new(settings), Arc::new(NoIdentityService))
            .await
            .unwrap();
        let lifecycle = Arc::clone(handle.lifecycle());
        tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(server.await.unwrap(), vec![0x00, 0x00, 0x01]);
        assert_eq!(lifecycle.disconnect_reason().as_deref(), Some("Finished"));
    }
}
