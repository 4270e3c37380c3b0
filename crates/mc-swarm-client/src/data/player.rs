use tracing::{debug, info, trace};

use mc_swarm_entity::entity::PLAYER_ENTITY_TYPE;
use mc_swarm_entity::{Entity, LocalPlayer};
use mc_swarm_proto::codec::read_string;
use mc_swarm_proto::packets::common::CustomPayload;
use mc_swarm_proto::packets::play::player::{
    info_action, keep, CommonPlayerSpawnInfo, Login, PlayerCombatKill, PlayerInfoRemove,
    PlayerInfoUpdate, PlayerPosition, Respawn, SetExperience, SetHealth, SystemChat,
};
use mc_swarm_proto::packets::play::{ClientCommandAction, ServerboundPlayPacket};
use mc_swarm_world::LevelInfo;

use super::*;

const BRAND_CHANNEL: &str = "brand";

impl SessionDataManager {
    pub(super) fn on_login(&mut self, p: Login) -> Result<(), BotError> {
        self.login = Some(LoginData {
            player_id: p.player_id,
            hardcore: p.hardcore,
            levels: p.levels,
            max_players: p.max_players,
            reduced_debug_info: p.reduced_debug_info,
            do_limited_crafting: p.do_limited_crafting,
            enforces_secure_chat: p.enforces_secure_chat,
        });
        self.view_distance = p.chunk_radius;
        self.simulation_distance = p.simulation_distance;
        self.enable_respawn_screen = p.show_death_screen;
        self.limited_crafting = p.do_limited_crafting;
        self.apply_spawn_info(&p.common)?;

        self.entities.clear();
        let entity = self
            .entities
            .add_entity(Entity::new(p.player_id, self.profile_id, PLAYER_ENTITY_TYPE));
        self.player = Some(LocalPlayer::new(entity));
        self.is_dead = false;
        self.player_loaded = false;
        info!("Joined {} as entity {}", p.common.dimension, p.player_id);
        Ok(())
    }

    pub(super) fn on_respawn(&mut self, p: Respawn) -> Result<(), BotError> {
        self.apply_spawn_info(&p.common)?;
        self.entities.clear();
        if let Some(player) = &mut self.player {
            player.respawn(
                p.data_to_keep & keep::ATTRIBUTES != 0,
                p.data_to_keep & keep::ENTITY_DATA != 0,
            );
            self.entities.add_entity_ref(player.entity().clone());
        }
        self.is_dead = false;
        self.player_loaded = false;
        debug!("Respawned in {}", p.common.dimension);
        Ok(())
    }

    /// Swap in a fresh level for the dimension the server put us in.
    fn apply_spawn_info(&mut self, info: &CommonPlayerSpawnInfo) -> Result<(), BotError> {
        let dimension_type = self.registries.dimension_type(info.dimension_type)?;
        self.level = Some(Level::new(
            LevelInfo {
                dimension: info.dimension.clone(),
                dimension_type,
                hashed_seed: info.hashed_seed,
                is_debug: info.is_debug,
                is_flat: info.is_flat,
                sea_level: info.sea_level,
            },
            self.tags.clone(),
            Arc::clone(&self.shapes),
            Arc::clone(&self.interner),
        ));
        self.game_mode = GameMode::from_id(i32::from(info.game_mode));
        self.previous_game_mode = GameMode::from_nullable_id(i32::from(info.previous_game_mode));
        self.last_death = info.last_death_location.clone();
        Ok(())
    }

    pub(super) fn on_player_position(&mut self, p: PlayerPosition, session: &Session) -> Result<(), BotError> {
        let Some(player) = &mut self.player else {
            debug!("Position before join");
            return Ok(());
        };
        let confirmation = player.handle_teleport(&p.change, p.relatives);
        session.send(ServerboundPlayPacket::AcceptTeleportation {
            teleport_id: p.teleport_id,
        })?;
        session.send(ServerboundPlayPacket::MovePlayer(confirmation))?;
        if !self.player_loaded {
            self.player_loaded = true;
            session.send(ServerboundPlayPacket::PlayerLoaded)?;
        }
        Ok(())
    }

    pub(super) fn on_set_health(&mut self, p: SetHealth, session: &Session) -> Result<(), BotError> {
        self.health = p.health;
        self.food = p.food;
        self.saturation = p.saturation;
        if p.health <= 0.0 {
            self.on_death(session)?;
        }
        Ok(())
    }

    pub(super) fn on_player_combat_kill(
        &mut self,
        p: PlayerCombatKill,
        session: &Session,
    ) -> Result<(), BotError> {
        if !self.is_local_player_id(p.player_id) {
            return Ok(());
        }
        info!("Died: {}", p.message.to_plain());
        self.on_death(session)
    }

    fn is_local_player_id(&self, id: i32) -> bool {
        self.player_id() == Some(id)
    }

    fn on_death(&mut self, session: &Session) -> Result<(), BotError> {
        if self.is_dead {
            return Ok(());
        }
        self.is_dead = true;
        if !self.enable_respawn_screen || self.auto_respawn {
            debug!("Requesting respawn");
            session.send(ServerboundPlayPacket::ClientCommand(
                ClientCommandAction::PerformRespawn,
            ))?;
        }
        Ok(())
    }

    pub(super) fn on_set_experience(&mut self, p: SetExperience) -> Result<(), BotError> {
        self.experience = Experience {
            progress: p.progress,
            level: p.level,
            total: p.total,
        };
        Ok(())
    }

    pub(super) fn on_system_chat(&mut self, p: SystemChat) -> Result<(), BotError> {
        if p.overlay {
            trace!("Action bar: {}", p.content.to_plain());
        } else {
            info!("Chat: {}", p.content.to_plain());
        }
        Ok(())
    }

    pub(super) fn on_player_info_update(&mut self, p: PlayerInfoUpdate) -> Result<(), BotError> {
        for entry in p.entries {
            if p.actions & info_action::ADD_PLAYER != 0 {
                self.player_list.insert(
                    entry.profile_id,
                    PlayerListEntry {
                        profile_id: entry.profile_id,
                        name: entry.name.clone().unwrap_or_default(),
                        game_mode: GameMode::Survival,
                        listed: false,
                        latency: 0,
                        display_name: None,
                    },
                );
            }
            let Some(listed) = self.player_list.get_mut(&entry.profile_id) else {
                trace!("Player info for unlisted profile {}", entry.profile_id);
                continue;
            };
            if let Some(game_mode) = entry.game_mode {
                listed.game_mode = GameMode::from_id(game_mode);
            }
            if let Some(flag) = entry.listed {
                listed.listed = flag;
            }
            if let Some(latency) = entry.latency {
                listed.latency = latency;
            }
            if let Some(display_name) = entry.display_name {
                listed.display_name = display_name;
            }
        }
        Ok(())
    }

    pub(super) fn on_player_info_remove(&mut self, p: PlayerInfoRemove) -> Result<(), BotError> {
        for id in p.profile_ids {
            self.player_list.remove(&id);
        }
        Ok(())
    }

    pub(super) fn on_custom_payload(&mut self, p: CustomPayload) -> Result<(), BotError> {
        if p.channel == Identifier::vanilla(BRAND_CHANNEL) {
            let mut data = p.data;
            let brand = read_string(&mut data, 32767)?;
            debug!("Server brand: {brand}");
            self.server_brand = Some(brand);
        } else {
            trace!("Ignoring plugin message on {}", p.channel);
        }
        Ok(())
    }
}
