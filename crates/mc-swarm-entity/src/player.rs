//! The bot's own player entity: movement input, physics and the
//! position reports sent back to the server.

use mc_swarm_proto::packets::play::player::{MovePlayer, PositionMoveRotation};
use mc_swarm_world::geometry::{Axis, Vec3, AABB};
use mc_swarm_world::Level;

use crate::attribute::{attribute_id, AttributeType};
use crate::effect::effect_id;
use crate::entity::{Entity, EntityDimensions};
use crate::tracker::EntityRef;

/// Horizontal coordinates reported to the server are clamped to this.
pub const MAX_HORIZONTAL_POSITION: f64 = 2.9999999E7;

/// Ticks after which the position is re-sent even when unchanged.
const POSITION_REMINDER_INTERVAL: u32 = 20;
const MIN_MOVEMENT_SQR: f64 = 2.0e-4 * 2.0e-4;

const PLAYER_BASE_SPEED: f64 = 0.1;
const SPRINT_SPEED_FACTOR: f64 = 1.3;
const BLOCK_FRICTION: f64 = 0.6;
const AIR_DRAG: f64 = 0.91;
const VERTICAL_DRAG: f64 = 0.98;
const AIR_ACCELERATION: f64 = 0.02;
const SPRINT_AIR_ACCELERATION: f64 = 0.026;
const INPUT_FACTOR: f64 = 0.98;
const STOP_THRESHOLD: f64 = 0.003;
const JUMP_COOLDOWN: u32 = 10;

/// Keys held by the bot this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jumping: bool,
    pub sneaking: bool,
    pub sprinting: bool,
}

impl MovementInput {
    /// `(strafe, forward)` impulse, each in `-1..=1`.
    pub fn impulse(&self) -> (f64, f64) {
        let axis = |pos: bool, neg: bool| match (pos, neg) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        };
        (axis(self.left, self.right), axis(self.forward, self.backward))
    }

    pub fn is_moving(&self) -> bool {
        self.impulse() != (0.0, 0.0)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// State last reported to the server.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Reported {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    on_ground: bool,
    horizontal_collision: bool,
}

#[derive(Debug)]
pub struct LocalPlayer {
    entity: EntityRef,
    pub input: MovementInput,
    reported: Option<Reported>,
    position_reminder: u32,
    jump_cooldown: u32,
}

impl LocalPlayer {
    pub fn new(entity: EntityRef) -> Self {
        Self {
            entity,
            input: MovementInput::default(),
            reported: None,
            position_reminder: 0,
            jump_cooldown: 0,
        }
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// True once the server has placed the player.
    pub fn has_position(&self) -> bool {
        self.reported.is_some()
    }

    /// Apply a server teleport and build the position confirmation.
    pub fn handle_teleport(&mut self, change: &PositionMoveRotation, relatives: i32) -> MovePlayer {
        let mut entity = self.entity.write();
        entity.apply_teleport(change, relatives);
        entity.set_old_pos_and_rot();
        let position = clamp_horizontal(entity.position());
        self.reported = Some(Reported {
            position,
            yaw: entity.yaw(),
            pitch: entity.pitch(),
            on_ground: false,
            horizontal_collision: entity.horizontal_collision,
        });
        self.position_reminder = 0;
        MovePlayer {
            position: Some([position.x, position.y, position.z]),
            rotation: Some((entity.yaw(), entity.pitch())),
            on_ground: false,
            horizontal_collision: false,
        }
    }

    /// Forget the placement; the server sends a new one after respawning.
    pub fn respawn(&mut self, keep_attributes: bool, keep_metadata: bool) {
        let mut entity = self.entity.write();
        entity.velocity = Vec3::ZERO;
        entity.on_ground = false;
        entity.effects.clear();
        if !keep_attributes {
            entity.attributes = Default::default();
        }
        if !keep_metadata {
            entity.metadata = Default::default();
        }
        self.reported = None;
        self.input.reset();
    }

    /// Run one tick of movement and return the report to send, if any.
    /// Nothing moves until the server has placed the player.
    pub fn tick(&mut self, level: &Level) -> Option<MovePlayer> {
        if !self.has_position() {
            return None;
        }
        if self.jump_cooldown > 0 {
            self.jump_cooldown -= 1;
        }
        {
            let handle = self.entity.clone();
            let mut entity = handle.write();
            entity.set_dimensions(if self.input.sneaking {
                EntityDimensions::PLAYER_CROUCHING
            } else {
                EntityDimensions::PLAYER
            });
            if level.is_chunk_loaded(entity.block_pos()) {
                self.travel(&mut entity, level);
            }
        }
        self.position_update()
    }

    fn attribute(entity: &Entity, id: i32, fallback: f64) -> f64 {
        match AttributeType::by_id(id) {
            Some(kind) => entity
                .attributes
                .get(kind)
                .map(|a| a.calculate_value())
                .unwrap_or(fallback),
            None => fallback,
        }
    }

    fn travel(&mut self, entity: &mut Entity, level: &Level) {
        let mut velocity = entity.velocity;
        for v in [&mut velocity.x, &mut velocity.y, &mut velocity.z] {
            if v.abs() < STOP_THRESHOLD {
                *v = 0.0;
            }
        }

        if self.input.jumping && entity.on_ground && self.jump_cooldown == 0 {
            let mut jump = Self::attribute(entity, attribute_id::JUMP_STRENGTH, 0.42);
            if let Some(boost) = entity.effects.get(effect_id::JUMP_BOOST) {
                jump += 0.1 * (boost.amplifier + 1) as f64;
            }
            velocity.y = velocity.y.max(jump);
            if self.input.sprinting {
                let yaw = (entity.yaw() as f64).to_radians();
                velocity = velocity.offset(-yaw.sin() * 0.2, 0.0, yaw.cos() * 0.2);
            }
            self.jump_cooldown = JUMP_COOLDOWN;
        }

        let (mut strafe, mut forward) = self.input.impulse();
        strafe *= INPUT_FACTOR;
        forward *= INPUT_FACTOR;
        if self.input.sneaking {
            let factor = Self::attribute(entity, attribute_id::SNEAKING_SPEED, 0.3);
            strafe *= factor;
            forward *= factor;
        }

        let speed = if entity.on_ground {
            let mut speed = Self::attribute(entity, attribute_id::MOVEMENT_SPEED, PLAYER_BASE_SPEED);
            if self.input.sprinting {
                speed *= SPRINT_SPEED_FACTOR;
            }
            speed * (0.216 / (BLOCK_FRICTION * BLOCK_FRICTION * BLOCK_FRICTION))
        } else if self.input.sprinting {
            SPRINT_AIR_ACCELERATION
        } else {
            AIR_ACCELERATION
        };
        velocity = velocity + input_vector(strafe, forward, speed, entity.yaw());

        let moved = collide(&entity.bounding_box(), velocity, level);
        entity.add_position(moved.x, moved.y, moved.z);
        let x_collision = moved.x != velocity.x;
        let z_collision = moved.z != velocity.z;
        let vertical_collision = moved.y != velocity.y;
        entity.horizontal_collision = x_collision || z_collision;
        entity.on_ground = vertical_collision && velocity.y < 0.0;
        if x_collision {
            velocity.x = 0.0;
        }
        if z_collision {
            velocity.z = 0.0;
        }
        if vertical_collision {
            velocity.y = 0.0;
        }

        if let Some(levitation) = entity.effects.get(effect_id::LEVITATION) {
            velocity.y += (0.05 * (levitation.amplifier + 1) as f64 - velocity.y) * 0.2;
        } else if !entity.metadata.has_no_gravity() {
            let mut gravity = Self::attribute(entity, attribute_id::GRAVITY, 0.08);
            if velocity.y <= 0.0 && entity.effects.has(effect_id::SLOW_FALLING) {
                gravity = gravity.min(0.01);
            }
            velocity.y -= gravity;
        }
        let drag = if entity.on_ground {
            BLOCK_FRICTION * AIR_DRAG
        } else {
            AIR_DRAG
        };
        entity.velocity = Vec3::new(velocity.x * drag, velocity.y * VERTICAL_DRAG, velocity.z * drag);
    }

    /// Decide which movement report, if any, this tick needs.
    fn position_update(&mut self) -> Option<MovePlayer> {
        let entity = self.entity.read();
        let last = self.reported.as_mut()?;
        let position = clamp_horizontal(entity.position());

        self.position_reminder += 1;
        let send_pos = (position - last.position).length_sqr() > MIN_MOVEMENT_SQR
            || self.position_reminder >= POSITION_REMINDER_INTERVAL;
        let send_rot = entity.yaw() != last.yaw || entity.pitch() != last.pitch;
        let status_changed = entity.on_ground != last.on_ground
            || entity.horizontal_collision != last.horizontal_collision;

        let packet = if send_pos || send_rot || status_changed {
            Some(MovePlayer {
                position: send_pos.then_some([position.x, position.y, position.z]),
                rotation: send_rot.then_some((entity.yaw(), entity.pitch())),
                on_ground: entity.on_ground,
                horizontal_collision: entity.horizontal_collision,
            })
        } else {
            None
        };

        if send_pos {
            last.position = position;
            self.position_reminder = 0;
        }
        if send_rot {
            last.yaw = entity.yaw();
            last.pitch = entity.pitch();
        }
        last.on_ground = entity.on_ground;
        last.horizontal_collision = entity.horizontal_collision;
        packet
    }
}

fn clamp_horizontal(position: Vec3) -> Vec3 {
    Vec3::new(
        position.x.clamp(-MAX_HORIZONTAL_POSITION, MAX_HORIZONTAL_POSITION),
        position.y,
        position.z.clamp(-MAX_HORIZONTAL_POSITION, MAX_HORIZONTAL_POSITION),
    )
}

/// Rotate a local `(strafe, forward)` impulse into world space.
fn input_vector(strafe: f64, forward: f64, speed: f64, yaw: f32) -> Vec3 {
    let length_sqr = strafe * strafe + forward * forward;
    if length_sqr < 1.0e-7 {
        return Vec3::ZERO;
    }
    let scale = if length_sqr > 1.0 {
        speed / length_sqr.sqrt()
    } else {
        speed
    };
    let (strafe, forward) = (strafe * scale, forward * scale);
    let (sin, cos) = (yaw as f64).to_radians().sin_cos();
    Vec3::new(strafe * cos - forward * sin, 0.0, forward * cos + strafe * sin)
}

/// Clip `movement` against the level, resolving Y first, then X, then Z.
pub fn collide(aabb: &AABB, movement: Vec3, level: &Level) -> Vec3 {
    if movement.length_sqr() == 0.0 {
        return movement;
    }
    let boxes = level.get_collision_boxes(&aabb.expand_towards(movement.x, movement.y, movement.z));
    if boxes.is_empty() {
        return movement;
    }
    let mut moving = *aabb;
    let mut result = Vec3::ZERO;
    for axis in [Axis::Y, Axis::X, Axis::Z] {
        let mut offset = axis.choose(movement.x, movement.y, movement.z);
        for obstacle in &boxes {
            if offset == 0.0 {
                break;
            }
            offset = obstacle.collide(axis, &moving, offset);
        }
        match axis {
            Axis::X => {
                result.x = offset;
                moving = moving.move_by(offset, 0.0, 0.0);
            }
            Axis::Y => {
                result.y = offset;
                moving = moving.move_by(0.0, offset, 0.0);
            }
            Axis::Z => {
                result.z = offset;
                moving = moving.move_by(0.0, 0.0, offset);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PLAYER_ENTITY_TYPE;
    use crate::tracker::EntityTracker;
    use mc_swarm_proto::types::{BlockPos, Identifier};
    use mc_swarm_world::{BlockShapeTable, BlockState, DimensionType, LevelInfo, SectionInterner, TagsState};
    use std::sync::Arc;
    use uuid::Uuid;

    fn flat_level() -> Level {
        let level = Level::new(
            LevelInfo {
                dimension: Identifier::vanilla("overworld"),
                dimension_type: DimensionType::overworld(),
                hashed_seed: 0,
                is_debug: false,
                is_flat: true,
                sea_level: 63,
            },
            TagsState::new(),
            BlockShapeTable::bundled(),
            Arc::new(SectionInterner::new()),
        );
        for cx in -1..=1 {
            for cz in -1..=1 {
                level.chunks().get_or_create_chunk(cx, cz);
            }
        }
        for x in -16..32 {
            for z in -16..32 {
                level.set_block_state(BlockPos::new(x, 63, z), BlockState(1));
            }
        }
        level
    }

    fn placed_player(x: f64, y: f64, z: f64) -> LocalPlayer {
        let tracker = EntityTracker::new();
        let entity = tracker.add_entity(Entity::new(1, Uuid::nil(), PLAYER_ENTITY_TYPE));
        let mut player = LocalPlayer::new(entity);
        player.handle_teleport(
            &PositionMoveRotation {
                x,
                y,
                z,
                ..Default::default()
            },
            0,
        );
        player
    }

    /// Two ticks: the first starts the fall, the second lands.
    fn settle(player: &mut LocalPlayer, level: &Level) -> Option<MovePlayer> {
        assert!(player.tick(level).is_none());
        player.tick(level)
    }

    #[test]
    fn no_movement_before_placement() {
        let level = flat_level();
        let tracker = EntityTracker::new();
        let mut player = LocalPlayer::new(tracker.add_entity(Entity::new(1, Uuid::nil(), PLAYER_ENTITY_TYPE)));
        assert!(player.tick(&level).is_none());
        assert!(!player.has_position());
    }

    #[test]
    fn teleport_confirmation() {
        let mut player = placed_player(0.0, 0.0, 0.0);
        let packet = player.handle_teleport(
            &PositionMoveRotation {
                x: 4.0e7,
                y: 70.0,
                z: -5.0,
                yaw: 45.0,
                pitch: 10.0,
                ..Default::default()
            },
            0,
        );
        assert_eq!(packet.position, Some([MAX_HORIZONTAL_POSITION, 70.0, -5.0]));
        assert_eq!(packet.rotation, Some((45.0, 10.0)));
        assert!(!packet.on_ground);
    }

    #[test]
    fn falls_and_lands_on_floor() {
        let level = flat_level();
        let mut player = placed_player(0.5, 66.0, 0.5);
        for _ in 0..40 {
            player.tick(&level);
        }
        let entity = player.entity().read();
        assert!(entity.on_ground);
        assert!((entity.y() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn standing_still_reports_every_twenty_ticks() {
        let level = flat_level();
        let mut player = placed_player(0.5, 64.0, 0.5);
        // landing changes the on-ground status once
        let first = settle(&mut player, &level).expect("status change");
        assert!(first.position.is_none() && first.on_ground);

        let mut sent = Vec::new();
        for tick in 3..=40 {
            if let Some(packet) = player.tick(&level) {
                sent.push((tick, packet));
            }
        }
        let ticks: Vec<u32> = sent.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![20, 40]);
        assert!(sent.iter().all(|(_, p)| p.position.is_some() && p.rotation.is_none()));
    }

    #[test]
    fn rotation_change_sends_rotation_only() {
        let level = flat_level();
        let mut player = placed_player(0.5, 64.0, 0.5);
        settle(&mut player, &level);
        player.entity().write().set_rotation(90.0, 0.0);
        let packet = player.tick(&level).expect("rotation report");
        assert_eq!(packet.rotation, Some((90.0, 0.0)));
        assert!(packet.position.is_none());
        assert!(player.tick(&level).is_none());
    }

    #[test]
    fn walking_forward_moves_along_yaw() {
        let level = flat_level();
        let mut player = placed_player(0.5, 64.0, 0.5);
        settle(&mut player, &level);
        player.input.forward = true;
        let mut reported = false;
        for _ in 0..10 {
            if let Some(p) = player.tick(&level) {
                reported |= p.position.is_some();
            }
        }
        let entity = player.entity().read();
        // yaw 0 faces +z
        assert!(entity.z() > 1.5);
        assert!((entity.x() - 0.5).abs() < 1e-9);
        assert!((entity.y() - 64.0).abs() < 1e-9);
        assert!(reported);
    }

    #[test]
    fn wall_stops_horizontal_motion() {
        let level = flat_level();
        for y in 64..66 {
            level.set_block_state(BlockPos::new(0, y, 2), BlockState(1));
        }
        let mut player = placed_player(0.5, 64.0, 0.5);
        settle(&mut player, &level);
        player.input.forward = true;
        for _ in 0..20 {
            player.tick(&level);
        }
        let entity = player.entity().read();
        assert!((entity.z() - 1.7).abs() < 1e-6);
        assert!(entity.horizontal_collision);
    }

    #[test]
    fn jump_leaves_ground() {
        let level = flat_level();
        let mut player = placed_player(0.5, 64.0, 0.5);
        settle(&mut player, &level);
        player.input.jumping = true;
        player.tick(&level);
        let entity = player.entity().read();
        assert!(!entity.on_ground);
        assert!(entity.y() > 64.3);
    }

    #[test]
    fn respawn_clears_placement() {
        let level = flat_level();
        let mut player = placed_player(0.5, 64.0, 0.5);
        player.input.forward = true;
        player.respawn(true, false);
        assert!(!player.has_position());
        assert!(!player.input.forward);
        assert!(player.tick(&level).is_none());
    }

    #[test]
    fn collide_y_then_x() {
        let level = flat_level();
        let aabb = AABB::new(0.2, 64.5, 0.2, 0.8, 66.3, 0.8);
        let moved = collide(&aabb, Vec3::new(0.0, -1.0, 0.0), &level);
        assert!((moved.y + 0.5).abs() < 1e-9);
        let free = collide(&aabb, Vec3::new(0.3, 0.0, 0.0), &level);
        assert_eq!(free, Vec3::new(0.3, 0.0, 0.0));
    }
}
