//! Play-phase state of one bot.
//!
//! [`SessionDataManager`] owns everything the server pushes once the bot is
//! in game: the current level, tracked entities, the local player and the
//! player's own stats. Each clientbound play packet that carries state has
//! exactly one handler; the handlers are split by topic into the
//! submodules.

mod entities;
mod player;
mod world;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::trace;
use uuid::Uuid;

use mc_swarm_entity::{EntityTracker, LocalPlayer};
use mc_swarm_proto::packets::common::UpdateTags;
use mc_swarm_proto::packets::configuration::RegistryData;
use mc_swarm_proto::packets::play::{ClientboundPlayPacket, ServerboundPlayPacket};
use mc_swarm_proto::packets::ProtocolState;
use mc_swarm_proto::text::TextComponent;
use mc_swarm_proto::types::{BlockPos, ChunkPos, Identifier};
use mc_swarm_world::{BlockShapeTable, CollisionShapeProvider, Level, SectionInterner, TagsState};

use crate::error::BotError;
use crate::registry::{KnownPackSnapshot, RegistryStore};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => GameMode::Creative,
            2 => GameMode::Adventure,
            3 => GameMode::Spectator,
            _ => GameMode::Survival,
        }
    }

    /// `-1` means none.
    pub fn from_nullable_id(id: i32) -> Option<Self> {
        (id >= 0).then(|| Self::from_id(id))
    }
}

/// Fixed facts from the join packet.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginData {
    pub player_id: i32,
    pub hardcore: bool,
    pub levels: Vec<Identifier>,
    pub max_players: i32,
    pub reduced_debug_info: bool,
    pub do_limited_crafting: bool,
    pub enforces_secure_chat: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Experience {
    pub progress: f32,
    pub level: i32,
    pub total: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Weather {
    pub raining: bool,
    pub rain_level: f32,
    pub thunder_level: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerListEntry {
    pub profile_id: Uuid,
    pub name: String,
    pub game_mode: GameMode,
    pub listed: bool,
    pub latency: i32,
    pub display_name: Option<TextComponent>,
}

/// Paces chunk delivery like the vanilla client: tracks an average of the
/// time spent per chunk and asks for as many chunks per tick as fit into
/// the budget.
#[derive(Debug, Clone)]
pub struct ChunkBatchSizeCalculator {
    aggregated_nanos_per_chunk: f64,
    old_samples_weight: u32,
    batch_start: Option<Instant>,
}

impl Default for ChunkBatchSizeCalculator {
    fn default() -> Self {
        Self {
            aggregated_nanos_per_chunk: 2_000_000.0,
            old_samples_weight: 1,
            batch_start: None,
        }
    }
}

impl ChunkBatchSizeCalculator {
    const MAX_OLD_SAMPLES_WEIGHT: u32 = 49;
    const NANOS_BUDGET_PER_TICK: f64 = 7_000_000.0;

    pub fn on_batch_start(&mut self, now: Instant) {
        self.batch_start = Some(now);
    }

    pub fn on_batch_finished(&mut self, batch_size: i32, now: Instant) {
        let Some(start) = self.batch_start.take() else {
            return;
        };
        if batch_size <= 0 {
            return;
        }
        let nanos = now.saturating_duration_since(start).as_nanos() as f64;
        let per_chunk = nanos / f64::from(batch_size);
        let clamped = per_chunk.clamp(
            self.aggregated_nanos_per_chunk / 3.0,
            self.aggregated_nanos_per_chunk * 3.0,
        );
        let weight = f64::from(self.old_samples_weight);
        self.aggregated_nanos_per_chunk =
            (self.aggregated_nanos_per_chunk * weight + clamped) / (weight + 1.0);
        self.old_samples_weight = (self.old_samples_weight + 1).min(Self::MAX_OLD_SAMPLES_WEIGHT);
    }

    pub fn desired_chunks_per_tick(&self) -> f32 {
        (Self::NANOS_BUDGET_PER_TICK / self.aggregated_nanos_per_chunk) as f32
    }
}

pub struct SessionDataManager {
    auto_respawn: bool,
    profile_id: Uuid,
    registries: RegistryStore,
    tags: TagsState,
    interner: Arc<SectionInterner>,
    shapes: Arc<dyn CollisionShapeProvider>,
    entities: EntityTracker,
    login: Option<LoginData>,
    level: Option<Level>,
    player: Option<LocalPlayer>,
    game_mode: GameMode,
    previous_game_mode: Option<GameMode>,
    health: f32,
    food: i32,
    saturation: f32,
    is_dead: bool,
    experience: Experience,
    enable_respawn_screen: bool,
    limited_crafting: bool,
    view_distance: i32,
    simulation_distance: i32,
    center_chunk: ChunkPos,
    weather: Weather,
    default_spawn: Option<(BlockPos, f32)>,
    last_death: Option<(Identifier, BlockPos)>,
    player_list: HashMap<Uuid, PlayerListEntry>,
    server_brand: Option<String>,
    difficulty: Option<(u8, bool)>,
    player_loaded: bool,
    chunk_batch: ChunkBatchSizeCalculator,
}

impl SessionDataManager {
    pub fn new(profile_id: Uuid, auto_respawn: bool) -> Self {
        Self::with_shapes(profile_id, auto_respawn, BlockShapeTable::bundled())
    }

    pub fn with_shapes(
        profile_id: Uuid,
        auto_respawn: bool,
        shapes: Arc<dyn CollisionShapeProvider>,
    ) -> Self {
        Self {
            auto_respawn,
            profile_id,
            registries: RegistryStore::new(),
            tags: KnownPackSnapshot::bundled().default_tags(),
            interner: Arc::new(SectionInterner::new()),
            shapes,
            entities: EntityTracker::new(),
            login: None,
            level: None,
            player: None,
            game_mode: GameMode::Survival,
            previous_game_mode: None,
            health: 20.0,
            food: 20,
            saturation: 5.0,
            is_dead: false,
            experience: Experience::default(),
            enable_respawn_screen: true,
            limited_crafting: false,
            view_distance: 0,
            simulation_distance: 0,
            center_chunk: ChunkPos::new(0, 0),
            weather: Weather::default(),
            default_spawn: None,
            last_death: None,
            player_list: HashMap::new(),
            server_brand: None,
            difficulty: None,
            player_loaded: false,
            chunk_batch: ChunkBatchSizeCalculator::default(),
        }
    }

    /// The profile id the server assigned at the end of login.
    pub fn set_profile_id(&mut self, profile_id: Uuid) {
        self.profile_id = profile_id;
    }

    pub fn profile_id(&self) -> Uuid {
        self.profile_id
    }

    pub fn handle_registry_data(&mut self, packet: RegistryData) {
        self.registries
            .handle_registry_data(packet, KnownPackSnapshot::bundled());
    }

    pub fn handle_update_tags(&mut self, packet: &UpdateTags) {
        self.tags.handle_update(packet);
        if let Some(level) = &mut self.level {
            level.tags_mut().handle_update(packet);
        }
    }

    pub fn set_server_brand(&mut self, brand: String) {
        self.server_brand = Some(brand);
    }

    /// Apply one play packet to the state.
    pub fn handle(&mut self, packet: ClientboundPlayPacket, session: &Session) -> Result<(), BotError> {
        use ClientboundPlayPacket as P;
        match packet {
            P::Login(p) => self.on_login(*p),
            P::Respawn(p) => self.on_respawn(*p),
            P::PlayerPosition(p) => self.on_player_position(p, session),
            P::SetHealth(p) => self.on_set_health(p, session),
            P::SetExperience(p) => self.on_set_experience(p),
            P::PlayerCombatKill(p) => self.on_player_combat_kill(p, session),
            P::GameEvent(p) => self.on_game_event(p, session),
            P::SetDefaultSpawnPosition(p) => self.on_set_default_spawn(p),
            P::SystemChat(p) => self.on_system_chat(p),
            P::PlayerInfoUpdate(p) => self.on_player_info_update(p),
            P::PlayerInfoRemove(p) => self.on_player_info_remove(p),
            P::ChangeDifficulty { difficulty, locked } => self.on_change_difficulty(difficulty, locked),
            P::CustomPayload(p) => self.on_custom_payload(p),

            P::LevelChunkWithLight(p) => self.on_level_chunk(p),
            P::ChunksBiomes { chunks } => self.on_chunks_biomes(chunks),
            P::ForgetLevelChunk(p) => self.on_forget_level_chunk(p),
            P::BlockUpdate(p) => self.on_block_update(p),
            P::SectionBlocksUpdate(p) => self.on_section_blocks_update(p),
            P::BlockChangedAck { sequence } => {
                trace!("Block change {sequence} acknowledged");
                Ok(())
            }
            P::ChunkBatchStart => self.on_chunk_batch_start(),
            P::ChunkBatchFinished { batch_size } => self.on_chunk_batch_finished(batch_size, session),
            P::SetChunkCacheCenter { x, z } => self.on_set_chunk_cache_center(x, z),
            P::SetChunkCacheRadius { radius } => self.on_set_chunk_cache_radius(radius),
            P::SetSimulationDistance { distance } => self.on_set_simulation_distance(distance),
            P::SetTime(p) => self.on_set_time(p),
            P::UpdateTags(p) => {
                self.handle_update_tags(&p);
                Ok(())
            }

            P::AddEntity(p) => self.on_add_entity(p),
            P::RemoveEntities(p) => self.on_remove_entities(p),
            P::MoveEntity(p) => self.on_move_entity(p),
            P::RotateHead(p) => self.on_rotate_head(p),
            P::SetEntityMotion(p) => self.on_set_entity_motion(p),
            P::TeleportEntity(p) => self.on_teleport_entity(p),
            P::SetEntityData(p) => self.on_set_entity_data(p),
            P::UpdateAttributes(p) => self.on_update_attributes(p),
            P::UpdateMobEffect(p) => self.on_update_mob_effect(p),
            P::RemoveMobEffect(p) => self.on_remove_mob_effect(p),
            P::EntityEvent(p) => self.on_entity_event(p),

            // connection plumbing, handled by the play phase itself
            P::KeepAlive(_)
            | P::Ping(_)
            | P::PongResponse { .. }
            | P::Disconnect { .. }
            | P::StartConfiguration => Ok(()),
        }
    }

    /// Advance the level, every tracked entity and the local player by one
    /// tick.
    pub fn tick(&mut self, session: &Session) -> Result<(), BotError> {
        let Some(level) = &mut self.level else {
            return Ok(());
        };
        level.tick();
        self.entities.tick();
        if session.outbound() != ProtocolState::Play {
            return Ok(());
        }
        if let Some(player) = &mut self.player {
            if let Some(movement) = player.tick(level) {
                session.send(ServerboundPlayPacket::MovePlayer(movement))?;
            }
        }
        Ok(())
    }

    pub fn registries(&self) -> &RegistryStore {
        &self.registries
    }

    pub fn tags(&self) -> &TagsState {
        &self.tags
    }

    pub fn interner(&self) -> &Arc<SectionInterner> {
        &self.interner
    }

    pub fn entities(&self) -> &EntityTracker {
        &self.entities
    }

    pub fn login_data(&self) -> Option<&LoginData> {
        self.login.as_ref()
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    pub fn player(&self) -> Option<&LocalPlayer> {
        self.player.as_ref()
    }

    pub fn player_mut(&mut self) -> Option<&mut LocalPlayer> {
        self.player.as_mut()
    }

    /// Network id of the bot's own entity.
    pub fn player_id(&self) -> Option<i32> {
        self.login.as_ref().map(|login| login.player_id)
    }

    pub fn game_mode(&self) -> GameMode {
        self.game_mode
    }

    pub fn previous_game_mode(&self) -> Option<GameMode> {
        self.previous_game_mode
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn food(&self) -> i32 {
        self.food
    }

    pub fn saturation(&self) -> f32 {
        self.saturation
    }

    pub fn is_dead(&self) -> bool {
        self.is_dead
    }

    pub fn experience(&self) -> Experience {
        self.experience
    }

    pub fn enable_respawn_screen(&self) -> bool {
        self.enable_respawn_screen
    }

    pub fn limited_crafting(&self) -> bool {
        self.limited_crafting
    }

    pub fn view_distance(&self) -> i32 {
        self.view_distance
    }

    pub fn simulation_distance(&self) -> i32 {
        self.simulation_distance
    }

    pub fn center_chunk(&self) -> ChunkPos {
        self.center_chunk
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    pub fn default_spawn(&self) -> Option<(BlockPos, f32)> {
        self.default_spawn
    }

    pub fn last_death(&self) -> Option<&(Identifier, BlockPos)> {
        self.last_death.as_ref()
    }

    pub fn player_list(&self) -> &HashMap<Uuid, PlayerListEntry> {
        &self.player_list
    }

    pub fn server_brand(&self) -> Option<&str> {
        self.server_brand.as_deref()
    }

    pub fn difficulty(&self) -> Option<(u8, bool)> {
        self.difficulty
    }

    pub fn player_loaded(&self) -> bool {
        self.player_loaded
    }

    pub fn chunk_batch(&self) -> &ChunkBatchSizeCalculator {
        &self.chunk_batch
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use mc_swarm_proto::packets::configuration::RegistryEntry;
    use mc_swarm_proto::packets::play::player::{CommonPlayerSpawnInfo, Login};
    use tokio::sync::mpsc;

    use crate::transport::{ReaderCommand, TransportHandle, WriterCommand};

    pub const PLAYER_ID: i32 = 42;

    pub fn play_session() -> (
        Session,
        mpsc::UnboundedReceiver<WriterCommand>,
        mpsc::UnboundedReceiver<ReaderCommand>,
    ) {
        let (transport, writes, reads) = TransportHandle::channel();
        let mut session = Session::new(transport);
        session.set_state(ProtocolState::Play);
        (session, writes, reads)
    }

    /// Ids of every packet queued so far.
    pub fn sent_ids(writes: &mut mpsc::UnboundedReceiver<WriterCommand>) -> Vec<u32> {
        let mut ids = Vec::new();
        while let Ok(command) = writes.try_recv() {
            if let WriterCommand::Packet(bytes) = command {
                let raw = mc_swarm_proto::packets::RawPacket::from_frame(bytes).unwrap();
                ids.push(raw.id);
            }
        }
        ids
    }

    pub fn spawn_info(dimension: &str, dimension_type: i32) -> CommonPlayerSpawnInfo {
        CommonPlayerSpawnInfo {
            dimension_type,
            dimension: dimension.parse().unwrap(),
            hashed_seed: 1,
            game_mode: 0,
            previous_game_mode: -1,
            is_debug: false,
            is_flat: false,
            last_death_location: None,
            portal_cooldown: 0,
            sea_level: 63,
        }
    }

    pub fn login_packet(show_death_screen: bool) -> Login {
        Login {
            player_id: PLAYER_ID,
            hardcore: false,
            levels: vec![Identifier::vanilla("overworld"), Identifier::vanilla("the_nether")],
            max_players: 20,
            chunk_radius: 10,
            simulation_distance: 8,
            reduced_debug_info: false,
            show_death_screen,
            do_limited_crafting: false,
            common: spawn_info("minecraft:overworld", 0),
            enforces_secure_chat: false,
        }
    }

    /// A manager with vanilla dimension types registered, not yet joined.
    pub fn configured(auto_respawn: bool) -> SessionDataManager {
        let mut data = SessionDataManager::new(Uuid::from_u128(7), auto_respawn);
        data.handle_registry_data(RegistryData {
            registry: Identifier::vanilla(crate::registry::DIMENSION_TYPE),
            entries: ["overworld", "the_nether"]
                .into_iter()
                .map(|id| RegistryEntry {
                    id: Identifier::vanilla(id),
                    data: None,
                })
                .collect(),
        });
        data
    }

    /// Feed an all-air chunk column at `(x, z)`.
    pub fn load_empty_chunk(data: &mut SessionDataManager, session: &Session, x: i32, z: i32) {
        use bytes::BytesMut;
        use mc_swarm_proto::packets::play::world::LevelChunkWithLight;
        use mc_swarm_world::{BlockAccessor, ChunkSection};

        let sections = data.level().unwrap().chunks().sections_count();
        let mut payload = BytesMut::new();
        for _ in 0..sections {
            ChunkSection::empty(0).write(&mut payload);
        }
        data.handle(
            ClientboundPlayPacket::LevelChunkWithLight(LevelChunkWithLight {
                pos: ChunkPos::new(x, z),
                heightmaps: None,
                data: payload.freeze(),
            }),
            session,
        )
        .unwrap();
    }

    /// A manager that has received the join packet.
    pub fn joined(session: &Session) -> SessionDataManager {
        let mut data = configured(false);
        data.handle(ClientboundPlayPacket::Login(Box::new(login_packet(true))), session)
            .unwrap();
        data
    }
}
