use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use mc_swarm_proto::packets::play::world::{
    game_event, BlockUpdate, ChunkBiomeData, ForgetLevelChunk, GameEvent, LevelChunkWithLight,
    SectionBlocksUpdate, SetDefaultSpawnPosition, SetTime,
};
use mc_swarm_proto::packets::play::{ClientCommandAction, ServerboundPlayPacket};
use mc_swarm_proto::types::ChunkPos;
use mc_swarm_world::{BlockAccessor, BlockState, ChunkData};

use super::*;

impl SessionDataManager {
    pub(super) fn on_level_chunk(&mut self, p: LevelChunkWithLight) -> Result<(), BotError> {
        let Some(level) = &self.level else {
            warn!("Chunk {} received before joining a level", p.pos);
            return Ok(());
        };
        let store = level.chunks();
        let mut data = p.data;
        let chunk = ChunkData::read(&mut data, store.sections_count(), store.interner())?;
        store.set_chunk(p.pos.x, p.pos.z, chunk);
        trace!("Loaded chunk {}", p.pos);
        Ok(())
    }

    pub(super) fn on_chunks_biomes(&mut self, chunks: Vec<ChunkBiomeData>) -> Result<(), BotError> {
        let Some(level) = &self.level else {
            return Ok(());
        };
        let store = level.chunks();
        let interner = Arc::clone(store.interner());
        for ChunkBiomeData { pos, mut data } in chunks {
            let mut result = Ok(());
            let loaded = store.update_chunk(pos.x, pos.z, |chunk| {
                result = chunk.read_biomes(&mut data, &interner);
            });
            if !loaded {
                debug!("Biomes for unloaded chunk {pos}");
            }
            result?;
        }
        Ok(())
    }

    pub(super) fn on_forget_level_chunk(&mut self, p: ForgetLevelChunk) -> Result<(), BotError> {
        if let Some(level) = &self.level {
            level.chunks().remove_chunk(p.pos.x, p.pos.z);
        }
        Ok(())
    }

    pub(super) fn on_block_update(&mut self, p: BlockUpdate) -> Result<(), BotError> {
        if let Some(level) = &self.level {
            level.set_block_state(p.pos, BlockState(p.state));
        }
        Ok(())
    }

    pub(super) fn on_section_blocks_update(&mut self, p: SectionBlocksUpdate) -> Result<(), BotError> {
        if let Some(level) = &self.level {
            for (pos, state) in p.changes {
                level.set_block_state(pos, BlockState(state));
            }
        }
        Ok(())
    }

    pub(super) fn on_chunk_batch_start(&mut self) -> Result<(), BotError> {
        self.chunk_batch.on_batch_start(Instant::now());
        Ok(())
    }

    pub(super) fn on_chunk_batch_finished(
        &mut self,
        batch_size: i32,
        session: &Session,
    ) -> Result<(), BotError> {
        self.chunk_batch.on_batch_finished(batch_size, Instant::now());
        session.send(ServerboundPlayPacket::ChunkBatchReceived {
            desired_chunks_per_tick: self.chunk_batch.desired_chunks_per_tick(),
        })
    }

    pub(super) fn on_set_chunk_cache_center(&mut self, x: i32, z: i32) -> Result<(), BotError> {
        self.center_chunk = ChunkPos::new(x, z);
        Ok(())
    }

    pub(super) fn on_set_chunk_cache_radius(&mut self, radius: i32) -> Result<(), BotError> {
        self.view_distance = radius;
        Ok(())
    }

    pub(super) fn on_set_simulation_distance(&mut self, distance: i32) -> Result<(), BotError> {
        self.simulation_distance = distance;
        Ok(())
    }

    pub(super) fn on_set_time(&mut self, p: SetTime) -> Result<(), BotError> {
        if let Some(level) = &mut self.level {
            level.set_time(p.game_time, p.day_time, p.tick_day_time);
        }
        Ok(())
    }

    pub(super) fn on_set_default_spawn(&mut self, p: SetDefaultSpawnPosition) -> Result<(), BotError> {
        self.default_spawn = Some((p.pos, p.angle));
        Ok(())
    }

    pub(super) fn on_change_difficulty(&mut self, difficulty: u8, locked: bool) -> Result<(), BotError> {
        self.difficulty = Some((difficulty, locked));
        Ok(())
    }

    pub(super) fn on_game_event(&mut self, p: GameEvent, session: &Session) -> Result<(), BotError> {
        match p.event {
            game_event::START_RAINING => {
                self.weather.raining = true;
                self.weather.rain_level = 0.0;
            }
            game_event::STOP_RAINING => {
                self.weather.raining = false;
                self.weather.rain_level = 1.0;
            }
            game_event::RAIN_LEVEL_CHANGE => self.weather.rain_level = p.param,
            game_event::THUNDER_LEVEL_CHANGE => self.weather.thunder_level = p.param,
            game_event::CHANGE_GAME_MODE => {
                let mode = GameMode::from_id(p.param as i32);
                self.previous_game_mode = Some(self.game_mode);
                self.game_mode = mode;
                debug!("Game mode changed to {mode:?}");
            }
            game_event::WIN_GAME => {
                session.send(ServerboundPlayPacket::ClientCommand(
                    ClientCommandAction::PerformRespawn,
                ))?;
            }
            game_event::IMMEDIATE_RESPAWN => self.enable_respawn_screen = p.param == 0.0,
            game_event::LIMITED_CRAFTING => self.limited_crafting = p.param == 1.0,
            other => trace!("Game event {other} ({})", p.param),
        }
        Ok(())
    }
}
