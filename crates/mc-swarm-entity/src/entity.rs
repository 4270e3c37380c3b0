//! Tracked entities.
//!
//! Every entity the server spawns for the bot, including the bot itself,
//! is one [`Entity`]. Positions are doubles, rotations are degrees.

use mc_swarm_proto::packets::play::entity::AddEntity;
use mc_swarm_proto::packets::play::player::{relative, PositionMoveRotation};
use mc_swarm_proto::types::BlockPos;
use mc_swarm_world::geometry::{Vec3, AABB};
use uuid::Uuid;

use crate::attribute::AttributeState;
use crate::effect::EffectState;
use crate::metadata::MetadataState;

/// Network id of `minecraft:player` in the entity type registry.
pub const PLAYER_ENTITY_TYPE: i32 = 147;

/// Wrap an angle into `[-180, 180)`.
pub fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees % 360.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else if wrapped < -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityDimensions {
    pub width: f32,
    pub height: f32,
    pub eye_height: f32,
}

impl EntityDimensions {
    pub const PLAYER: Self = Self::new(0.6, 1.8, 1.62);
    pub const PLAYER_CROUCHING: Self = Self::new(0.6, 1.5, 1.27);

    pub const fn new(width: f32, height: f32, eye_height: f32) -> Self {
        Self {
            width,
            height,
            eye_height,
        }
    }

    /// Default eye height is 85% of the height.
    pub fn scalable(width: f32, height: f32) -> Self {
        Self::new(width, height, height * 0.85)
    }

    pub fn for_type(entity_type: i32) -> Self {
        if entity_type == PLAYER_ENTITY_TYPE {
            Self::PLAYER
        } else {
            Self::scalable(0.6, 1.8)
        }
    }

    pub fn make_bounding_box(&self, pos: Vec3) -> AABB {
        let half = self.width as f64 / 2.0;
        AABB::new(
            pos.x - half,
            pos.y,
            pos.z - half,
            pos.x + half,
            pos.y + self.height as f64,
            pos.z + half,
        )
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Entity {
    id: i32,
    uuid: Uuid,
    entity_type: i32,
    data: i32,
    position: Vec3,
    yaw: f32,
    pitch: f32,
    dimensions: EntityDimensions,
    pub old_position: Vec3,
    pub old_yaw: f32,
    pub old_pitch: f32,
    pub head_yaw: f32,
    pub velocity: Vec3,
    pub on_ground: bool,
    pub horizontal_collision: bool,
    pub attributes: AttributeState,
    pub effects: EffectState,
    pub metadata: MetadataState,
    pub ticks_existed: u64,
}

impl Entity {
    pub fn new(id: i32, uuid: Uuid, entity_type: i32) -> Self {
        Self {
            id,
            uuid,
            entity_type,
            data: 0,
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            dimensions: EntityDimensions::for_type(entity_type),
            old_position: Vec3::ZERO,
            old_yaw: 0.0,
            old_pitch: 0.0,
            head_yaw: 0.0,
            velocity: Vec3::ZERO,
            on_ground: false,
            horizontal_collision: false,
            attributes: AttributeState::default(),
            effects: EffectState::default(),
            metadata: MetadataState::default(),
            ticks_existed: 0,
        }
    }

    /// Build from a spawn packet.
    pub fn from_spawn(p: &AddEntity) -> Self {
        let mut entity = Self::new(p.id, p.uuid, p.entity_type);
        entity.data = p.data;
        entity.set_position(Vec3::new(p.x, p.y, p.z));
        entity.set_rotation(p.yaw.to_degrees(), p.pitch.to_degrees());
        entity.head_yaw = p.head_yaw.to_degrees();
        entity.velocity = Vec3::new(p.velocity[0], p.velocity[1], p.velocity[2]);
        entity.set_old_pos_and_rot();
        entity
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn entity_type(&self) -> i32 {
        self.entity_type
    }

    /// Spawn data field, meaning depends on the type.
    pub fn data(&self) -> i32 {
        self.data
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn z(&self) -> f64 {
        self.position.z
    }

    pub fn block_pos(&self) -> BlockPos {
        self.position.block_pos()
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn add_position(&mut self, dx: f64, dy: f64, dz: f64) {
        self.position = self.position.offset(dx, dy, dz);
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Non-finite angles are ignored.
    pub fn set_rotation(&mut self, yaw: f32, pitch: f32) {
        if yaw.is_finite() {
            self.yaw = yaw;
        }
        if pitch.is_finite() {
            self.pitch = pitch;
        }
    }

    pub fn set_old_pos_and_rot(&mut self) {
        self.old_position = self.position;
        self.old_yaw = self.yaw;
        self.old_pitch = self.pitch;
    }

    pub fn dimensions(&self) -> EntityDimensions {
        self.dimensions
    }

    pub fn set_dimensions(&mut self, dimensions: EntityDimensions) {
        self.dimensions = dimensions;
    }

    pub fn bounding_box(&self) -> AABB {
        self.dimensions.make_bounding_box(self.position)
    }

    pub fn eye_height(&self) -> f64 {
        self.dimensions.eye_height as f64
    }

    pub fn eye_position(&self) -> Vec3 {
        self.position.offset(0.0, self.eye_height(), 0.0)
    }

    /// Unit vector the entity is looking along.
    pub fn rotation_vector(&self) -> Vec3 {
        let yaw = (self.yaw as f64).to_radians();
        let pitch = (self.pitch as f64).to_radians();
        Vec3::new(
            -yaw.sin() * pitch.cos(),
            -pitch.sin(),
            yaw.cos() * pitch.cos(),
        )
    }

    /// Turn the eyes towards `target`.
    pub fn look_at(&mut self, target: Vec3) {
        let eye = self.eye_position();
        let dx = target.x - eye.x;
        let dy = target.y - eye.y;
        let dz = target.z - eye.z;
        let horizontal = (dx * dx + dz * dz).sqrt();
        let pitch = wrap_degrees(-dy.atan2(horizontal).to_degrees() as f32);
        let yaw = wrap_degrees(dz.atan2(dx).to_degrees() as f32 - 90.0);
        self.set_rotation(yaw, pitch);
        self.head_yaw = yaw;
    }

    /// Apply an absolute or partly relative teleport.
    pub fn apply_teleport(&mut self, change: &PositionMoveRotation, relatives: i32) {
        let is = |flag: i32| relatives & flag != 0;
        let pick = |flag: i32, current: f64, value: f64| {
            if is(flag) {
                current + value
            } else {
                value
            }
        };

        let position = Vec3::new(
            pick(relative::X, self.position.x, change.x),
            pick(relative::Y, self.position.y, change.y),
            pick(relative::Z, self.position.z, change.z),
        );
        let yaw = if is(relative::Y_ROT) {
            self.yaw + change.yaw
        } else {
            change.yaw
        };
        let pitch = if is(relative::X_ROT) {
            self.pitch + change.pitch
        } else {
            change.pitch
        }
        .clamp(-90.0, 90.0);

        let mut velocity = self.velocity;
        if is(relative::ROTATE_DELTA) {
            velocity = rotate_x(velocity, (self.pitch - pitch) as f64);
            velocity = rotate_y(velocity, (self.yaw - yaw) as f64);
        }
        self.velocity = Vec3::new(
            pick(relative::DELTA_X, velocity.x, change.dx),
            pick(relative::DELTA_Y, velocity.y, change.dy),
            pick(relative::DELTA_Z, velocity.z, change.dz),
        );
        self.position = position;
        self.set_rotation(yaw, pitch);
    }

    pub fn tick(&mut self) {
        self.ticks_existed += 1;
        self.effects.tick();
    }
}

fn rotate_x(v: Vec3, degrees: f64) -> Vec3 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec3::new(v.x, v.y * cos + v.z * sin, v.z * cos - v.y * sin)
}

fn rotate_y(v: Vec3, degrees: f64) -> Vec3 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec3::new(v.x * cos + v.z * sin, v.y, v.z * cos - v.x * sin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_swarm_proto::types::Angle;

    fn player() -> Entity {
        Entity::new(1, Uuid::nil(), PLAYER_ENTITY_TYPE)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn wrap() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(180.0), -180.0);
        assert_eq!(wrap_degrees(725.0), 5.0);
    }

    #[test]
    fn bounding_box_and_eyes() {
        let mut e = player();
        e.set_position(Vec3::new(10.5, 64.0, -3.5));
        let bb = e.bounding_box();
        assert!(close(bb.min_x, 10.2) && close(bb.max_x, 10.8));
        assert!(close(bb.min_z, -3.8) && close(bb.max_z, -3.2));
        assert!(close(bb.min_y, 64.0) && close(bb.max_y, 65.8));
        assert!(close(e.eye_position().y, 65.62));
        e.set_dimensions(EntityDimensions::PLAYER_CROUCHING);
        assert!(close(e.bounding_box().max_y, 65.5));
    }

    #[test]
    fn look_at_cardinal_directions() {
        let mut e = player();
        let eye = e.eye_position();

        e.look_at(eye.offset(0.0, 0.0, 5.0));
        assert!((e.yaw() - 0.0).abs() < 1e-4);
        assert!((e.pitch() - 0.0).abs() < 1e-4);

        e.look_at(eye.offset(-5.0, 0.0, 0.0));
        assert!((e.yaw() - 90.0).abs() < 1e-4);

        e.look_at(eye.offset(0.0, 5.0, 0.0));
        assert!((e.pitch() + 90.0).abs() < 1e-4);
    }

    #[test]
    fn rotation_vector_matches_look_at() {
        let mut e = player();
        let target = e.eye_position().offset(3.0, -2.0, 4.0);
        e.look_at(target);
        let dir = e.rotation_vector();
        let expected = (target - e.eye_position()).scale(1.0 / (target - e.eye_position()).length());
        assert!(close(dir.x, expected.x) && close(dir.y, expected.y) && close(dir.z, expected.z));
    }

    #[test]
    fn teleport_absolute_and_relative() {
        let mut e = player();
        e.set_position(Vec3::new(1.0, 2.0, 3.0));
        e.set_rotation(10.0, 5.0);
        e.velocity = Vec3::new(0.5, 0.5, 0.5);

        let change = PositionMoveRotation {
            x: 1.0,
            y: 100.0,
            z: -1.0,
            yaw: 20.0,
            pitch: 0.0,
            ..Default::default()
        };
        e.apply_teleport(&change, relative::X | relative::Z | relative::Y_ROT | relative::DELTA_Y);
        assert_eq!(e.position(), Vec3::new(2.0, 100.0, 2.0));
        assert_eq!(e.yaw(), 30.0);
        assert_eq!(e.pitch(), 0.0);
        assert_eq!(e.velocity, Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn teleport_clamps_pitch() {
        let mut e = player();
        let change = PositionMoveRotation {
            pitch: 120.0,
            ..Default::default()
        };
        e.apply_teleport(&change, 0);
        assert_eq!(e.pitch(), 90.0);
    }

    #[test]
    fn spawn_packet() {
        let e = Entity::from_spawn(&AddEntity {
            id: 42,
            uuid: Uuid::from_u128(7),
            entity_type: 5,
            x: 1.0,
            y: 2.0,
            z: 3.0,
            pitch: Angle(0),
            yaw: Angle(64),
            head_yaw: Angle(64),
            data: 0,
            velocity: [0.0, -0.1, 0.0],
        });
        assert_eq!(e.id(), 42);
        assert_eq!(e.yaw(), 90.0);
        assert_eq!(e.old_position, e.position());
        assert_eq!(e.dimensions(), EntityDimensions::scalable(0.6, 1.8));
    }

    #[test]
    fn tick_counts_down_effects() {
        let mut e = player();
        e.effects.update(
            0,
            crate::effect::EffectData {
                amplifier: 0,
                duration: 1,
                ambient: false,
                visible: false,
                show_icon: false,
                blend: false,
            },
        );
        e.tick();
        assert!(e.effects.is_empty());
        assert_eq!(e.ticks_existed, 1);
    }
}
