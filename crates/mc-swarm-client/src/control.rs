//! High level actions a listener or script performs through a bot.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tracing::debug;

use mc_swarm_entity::attribute::attribute_id;
use mc_swarm_entity::{EntityRef, MovementInput};
use mc_swarm_proto::packets::play::{Hand, PlayerCommandAction, ServerboundPlayPacket};
use mc_swarm_world::geometry::{Vec3, AABB};

use crate::data::SessionDataManager;
use crate::error::BotError;
use crate::session::Session;

/// Largest distance at which [`Control::can_see`] traces a line.
const MAX_SIGHT_DISTANCE: f64 = 256.0;

/// Control state carried between ticks.
#[derive(Debug, Default)]
pub struct BotControl {
    attack_cooldown: u32,
}

impl BotControl {
    pub fn tick(&mut self) {
        self.attack_cooldown = self.attack_cooldown.saturating_sub(1);
    }

    /// Ticks until the next attack is allowed.
    pub fn attack_cooldown(&self) -> u32 {
        self.attack_cooldown
    }
}

/// Borrowed view over one bot for issuing actions.
pub struct Control<'a> {
    pub(crate) state: &'a mut BotControl,
    pub(crate) session: &'a Session,
    pub(crate) data: &'a mut SessionDataManager,
}

impl<'a> Control<'a> {
    pub fn new(state: &'a mut BotControl, session: &'a Session, data: &'a mut SessionDataManager) -> Self {
        Self {
            state,
            session,
            data,
        }
    }

    /// Send chat. Lines starting with `/` are sent as commands.
    pub fn send_message(&self, message: &str) -> Result<(), BotError> {
        if let Some(command) = message.strip_prefix('/') {
            return self.session.send(ServerboundPlayPacket::ChatCommand {
                command: command.to_string(),
            });
        }
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        self.session.send(ServerboundPlayPacket::Chat {
            message: message.to_string(),
            timestamp,
            salt: rand::thread_rng().gen(),
        })
    }

    fn player(&self) -> Option<EntityRef> {
        self.data.player().map(|player| player.entity().clone())
    }

    /// Movement keys of the local player.
    pub fn input(&mut self) -> Option<&mut MovementInput> {
        self.data.player_mut().map(|player| &mut player.input)
    }

    /// Hit an entity and swing the main hand. Returns `false` while the
    /// attack is cooling down or before the player exists.
    pub fn attack(&mut self, entity_id: i32) -> Result<bool, BotError> {
        if self.state.attack_cooldown > 0 {
            return Ok(false);
        }
        let Some(player) = self.player() else {
            return Ok(false);
        };
        let attack_speed = player
            .read()
            .attributes
            .value_of(attribute_id::ATTACK_SPEED)
            .unwrap_or(4.0);
        let sneaking = self.data.player().is_some_and(|p| p.input.sneaking);
        self.session.send(ServerboundPlayPacket::Attack {
            entity_id,
            sneaking,
        })?;
        self.session.send(ServerboundPlayPacket::Swing(Hand::Main))?;
        self.state.attack_cooldown = (20.0 / attack_speed.max(f64::EPSILON)).round() as u32;
        debug!("Attacked entity {entity_id}");
        Ok(true)
    }

    pub fn swing(&self, hand: Hand) -> Result<(), BotError> {
        self.session.send(ServerboundPlayPacket::Swing(hand))
    }

    /// Start or stop sprinting. Only a change is sent.
    pub fn set_sprinting(&mut self, sprinting: bool) -> Result<(), BotError> {
        let Some(entity_id) = self.data.player_id() else {
            return Ok(());
        };
        let Some(input) = self.input() else {
            return Ok(());
        };
        if input.sprinting == sprinting {
            return Ok(());
        }
        input.sprinting = sprinting;
        let action = if sprinting {
            PlayerCommandAction::StartSprinting
        } else {
            PlayerCommandAction::StopSprinting
        };
        self.session
            .send(ServerboundPlayPacket::PlayerCommand { entity_id, action })
    }

    /// Press or release sneak. Only a change is sent.
    pub fn set_sneaking(&mut self, sneaking: bool) -> Result<(), BotError> {
        let Some(entity_id) = self.data.player_id() else {
            return Ok(());
        };
        let Some(input) = self.input() else {
            return Ok(());
        };
        if input.sneaking == sneaking {
            return Ok(());
        }
        input.sneaking = sneaking;
        let action = if sneaking {
            PlayerCommandAction::PressShiftKey
        } else {
            PlayerCommandAction::ReleaseShiftKey
        };
        self.session
            .send(ServerboundPlayPacket::PlayerCommand { entity_id, action })
    }

    pub fn toggle_sprint(&mut self) -> Result<(), BotError> {
        let sprinting = self.data.player().is_some_and(|p| p.input.sprinting);
        self.set_sprinting(!sprinting)
    }

    pub fn toggle_sneak(&mut self) -> Result<(), BotError> {
        let sneaking = self.data.player().is_some_and(|p| p.input.sneaking);
        self.set_sneaking(!sneaking)
    }

    /// Turn the player's eyes towards `target`. The new rotation goes out
    /// with the next movement report.
    pub fn look_at(&mut self, target: Vec3) {
        if let Some(player) = self.player() {
            player.write().look_at(target);
        }
    }

    /// Nearest other entity within `range` blocks of the player.
    pub fn closest_entity(&self, range: f64) -> Option<EntityRef> {
        let player = self.player()?;
        let (own_id, origin) = {
            let player = player.read();
            (player.id(), player.position())
        };
        self.data
            .entities()
            .get_entities()
            .into_iter()
            .filter_map(|entity| {
                let distance = {
                    let e = entity.read();
                    if e.id() == own_id {
                        return None;
                    }
                    e.position().distance_to_sqr(origin)
                };
                (distance <= range * range).then_some((distance, entity))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, entity)| entity)
    }

    /// Whether a straight line from the player's eyes to `target` is free
    /// of block collision boxes.
    pub fn can_see(&self, target: Vec3) -> bool {
        let (Some(player), Some(level)) = (self.player(), self.data.level()) else {
            return false;
        };
        let eye = player.read().eye_position();
        if eye.distance_to_sqr(target) >= MAX_SIGHT_DISTANCE * MAX_SIGHT_DISTANCE {
            return false;
        }
        if !level.is_chunk_loaded(target.block_pos()) {
            return false;
        }
        let boxes = level.get_collision_boxes(&AABB::from_corners(eye, target));
        AABB::clip_boxes(&boxes, eye, target, target.block_pos()).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::*;
    use mc_swarm_entity::Entity;
    use mc_swarm_proto::packets::play::id;
    use mc_swarm_proto::packets::play::player::{PlayerPosition, PositionMoveRotation};
    use mc_swarm_proto::packets::play::world::BlockUpdate;
    use mc_swarm_proto::packets::play::ClientboundPlayPacket;
    use mc_swarm_proto::types::BlockPos;
    use uuid::Uuid;

    fn place_player(data: &mut SessionDataManager, session: &Session) {
        data.handle(
            ClientboundPlayPacket::PlayerPosition(PlayerPosition {
                teleport_id: 1,
                change: PositionMoveRotation {
                    x: 8.5,
                    y: 64.0,
                    z: 8.5,
                    ..Default::default()
                },
                relatives: 0,
            }),
            session,
        )
        .unwrap();
    }

    fn zombie(id: i32, x: f64) -> Entity {
        let mut entity = Entity::new(id, Uuid::from_u128(id as u128), 145);
        entity.set_position(Vec3::new(x, 64.0, 8.5));
        entity
    }

    #[test]
    fn messages_and_commands() {
        let (session, mut writes, _reads) = play_session();
        let mut data = joined(&session);
        let mut state = BotControl::default();
        let control = Control::new(&mut state, &session, &mut data);
        control.send_message("hello").unwrap();
        control.send_message("/spawn").unwrap();
        assert_eq!(sent_ids(&mut writes), vec![id::CHAT, id::CHAT_COMMAND]);
    }

    #[test]
    fn attack_respects_cooldown() {
        let (session, mut writes, _reads) = play_session();
        let mut data = joined(&session);
        let mut state = BotControl::default();
        {
            let mut control = Control::new(&mut state, &session, &mut data);
            assert!(control.attack(5).unwrap());
            assert!(!control.attack(5).unwrap());
        }
        assert_eq!(state.attack_cooldown(), 5);
        for _ in 0..5 {
            state.tick();
        }
        let mut control = Control::new(&mut state, &session, &mut data);
        assert!(control.attack(5).unwrap());
        assert_eq!(
            sent_ids(&mut writes),
            vec![id::INTERACT, id::SWING, id::INTERACT, id::SWING]
        );
    }

    #[test]
    fn sprint_changes_are_sent_once() {
        let (session, mut writes, _reads) = play_session();
        let mut data = joined(&session);
        let mut state = BotControl::default();
        let mut control = Control::new(&mut state, &session, &mut data);
        control.set_sprinting(true).unwrap();
        control.set_sprinting(true).unwrap();
        control.toggle_sprint().unwrap();
        control.toggle_sneak().unwrap();
        assert_eq!(
            sent_ids(&mut writes),
            vec![id::PLAYER_COMMAND, id::PLAYER_COMMAND, id::PLAYER_COMMAND]
        );
        assert!(data.player().unwrap().input.sneaking);
        assert!(!data.player().unwrap().input.sprinting);
    }

    #[test]
    fn closest_entity_skips_self() {
        let (session, _writes, _reads) = play_session();
        let mut data = joined(&session);
        place_player(&mut data, &session);
        data.entities().add_entity(zombie(10, 12.5));
        data.entities().add_entity(zombie(11, 10.5));
        data.entities().add_entity(zombie(12, 40.5));
        let mut state = BotControl::default();
        let control = Control::new(&mut state, &session, &mut data);
        let closest = control.closest_entity(16.0).unwrap();
        assert_eq!(closest.read().id(), 11);
        assert!(control.closest_entity(1.0).is_none());
    }

    #[test]
    fn sight_needs_loaded_chunk_and_clear_line() {
        let (session, _writes, _reads) = play_session();
        let mut data = joined(&session);
        place_player(&mut data, &session);
        let target = Vec3::new(12.5, 65.0, 8.5);
        {
            let mut state = BotControl::default();
            let control = Control::new(&mut state, &session, &mut data);
            assert!(!control.can_see(target));
        }

        load_empty_chunk(&mut data, &session, 0, 0);
        {
            let mut state = BotControl::default();
            let control = Control::new(&mut state, &session, &mut data);
            assert!(control.can_see(target));
        }

        data.handle(
            ClientboundPlayPacket::BlockUpdate(BlockUpdate {
                pos: BlockPos::new(10, 65, 8),
                state: 1,
            }),
            &session,
        )
        .unwrap();
        let mut state = BotControl::default();
        let control = Control::new(&mut state, &session, &mut data);
        assert!(!control.can_see(target));
    }

    #[test]
    fn look_at_turns_player() {
        let (session, _writes, _reads) = play_session();
        let mut data = joined(&session);
        place_player(&mut data, &session);
        let mut state = BotControl::default();
        let mut control = Control::new(&mut state, &session, &mut data);
        control.look_at(Vec3::new(8.5, 65.62, 20.5));
        let yaw = data.player().unwrap().entity().read().yaw();
        assert!(yaw.abs() < 1e-3);
    }
}
