use tracing::{trace, warn};

use mc_swarm_entity::{EffectData, Entity, EntityRef};
use mc_swarm_proto::packets::play::entity::{
    AddEntity, EntityEvent, MoveEntity, RemoveEntities, RemoveMobEffect, RotateHead,
    SetEntityData, SetEntityMotion, TeleportEntity, UpdateAttributes, UpdateMobEffect,
};
use mc_swarm_world::geometry::Vec3;

use super::*;

impl SessionDataManager {
    /// Entity by network id, warning when the server refers to one we do
    /// not track.
    fn tracked(&self, id: i32, packet: &str) -> Option<EntityRef> {
        let entity = self.entities.get_entity(id);
        if entity.is_none() {
            warn!("{packet} for unknown entity {id}");
        }
        entity
    }

    fn is_local_player(&self, id: i32) -> bool {
        self.player_id() == Some(id)
    }

    pub(super) fn on_add_entity(&mut self, p: AddEntity) -> Result<(), BotError> {
        trace!("Adding entity {} of type {}", p.id, p.entity_type);
        self.entities.add_entity(Entity::from_spawn(&p));
        Ok(())
    }

    pub(super) fn on_remove_entities(&mut self, p: RemoveEntities) -> Result<(), BotError> {
        for id in p.ids {
            if self.entities.remove_entity(id).is_none() {
                warn!("Remove for unknown entity {id}");
            }
        }
        Ok(())
    }

    pub(super) fn on_move_entity(&mut self, p: MoveEntity) -> Result<(), BotError> {
        // the client is authoritative for its own position
        if self.is_local_player(p.id) {
            return Ok(());
        }
        let Some(entity) = self.tracked(p.id, "Move") else {
            return Ok(());
        };
        let mut entity = entity.write();
        if let Some([dx, dy, dz]) = p.delta {
            entity.add_position(dx, dy, dz);
        }
        if let Some((yaw, pitch)) = p.rotation {
            entity.set_rotation(yaw.to_degrees(), pitch.to_degrees());
        }
        entity.on_ground = p.on_ground;
        Ok(())
    }

    pub(super) fn on_teleport_entity(&mut self, p: TeleportEntity) -> Result<(), BotError> {
        if self.is_local_player(p.id) {
            return Ok(());
        }
        let Some(entity) = self.tracked(p.id, "Teleport") else {
            return Ok(());
        };
        let mut entity = entity.write();
        entity.apply_teleport(&p.change, p.relatives);
        entity.on_ground = p.on_ground;
        Ok(())
    }

    pub(super) fn on_rotate_head(&mut self, p: RotateHead) -> Result<(), BotError> {
        if let Some(entity) = self.tracked(p.id, "Head rotation") {
            entity.write().head_yaw = p.head_yaw.to_degrees();
        }
        Ok(())
    }

    pub(super) fn on_set_entity_motion(&mut self, p: SetEntityMotion) -> Result<(), BotError> {
        if let Some(entity) = self.tracked(p.id, "Motion") {
            let [x, y, z] = p.velocity;
            entity.write().velocity = Vec3::new(x, y, z);
        }
        Ok(())
    }

    pub(super) fn on_set_entity_data(&mut self, p: SetEntityData) -> Result<(), BotError> {
        if let Some(entity) = self.tracked(p.id, "Metadata") {
            entity.write().metadata.apply(&p.items);
        }
        Ok(())
    }

    pub(super) fn on_update_attributes(&mut self, p: UpdateAttributes) -> Result<(), BotError> {
        if let Some(entity) = self.tracked(p.id, "Attributes") {
            let mut entity = entity.write();
            for snapshot in &p.attributes {
                entity.attributes.apply(snapshot);
            }
        }
        Ok(())
    }

    pub(super) fn on_update_mob_effect(&mut self, p: UpdateMobEffect) -> Result<(), BotError> {
        if let Some(entity) = self.tracked(p.id, "Effect") {
            entity.write().effects.update(p.effect, EffectData::from(&p));
        }
        Ok(())
    }

    pub(super) fn on_remove_mob_effect(&mut self, p: RemoveMobEffect) -> Result<(), BotError> {
        if let Some(entity) = self.tracked(p.id, "Effect removal") {
            entity.write().effects.remove(p.effect);
        }
        Ok(())
    }

    pub(super) fn on_entity_event(&mut self, p: EntityEvent) -> Result<(), BotError> {
        trace!("Entity {} event {}", p.id, p.event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use mc_swarm_entity::attribute::attribute_id;
    use mc_swarm_proto::packets::play::entity::AttributeSnapshot;
    use mc_swarm_proto::packets::play::player::PositionMoveRotation;
    use mc_swarm_proto::types::Angle;

    const ZOMBIE: i32 = 145;

    fn spawn(id: i32) -> ClientboundPlayPacket {
        ClientboundPlayPacket::AddEntity(AddEntity {
            id,
            uuid: Uuid::from_u128(id as u128),
            entity_type: ZOMBIE,
            x: 10.0,
            y: 64.0,
            z: 10.0,
            pitch: Angle::from_degrees(0.0),
            yaw: Angle::from_degrees(90.0),
            head_yaw: Angle::from_degrees(90.0),
            data: 0,
            velocity: [0.0; 3],
        })
    }

    #[test]
    fn spawn_move_remove() {
        let (session, _writes, _reads) = play_session();
        let mut data = joined(&session);
        data.handle(spawn(5), &session).unwrap();
        assert_eq!(data.entities().entity_count(), 2);

        data.handle(
            ClientboundPlayPacket::MoveEntity(MoveEntity {
                id: 5,
                delta: Some([1.0, 0.5, -1.0]),
                rotation: None,
                on_ground: true,
            }),
            &session,
        )
        .unwrap();
        {
            let zombie = data.entities().get_entity(5).unwrap();
            let zombie = zombie.read();
            assert_eq!(zombie.position(), Vec3::new(11.0, 64.5, 9.0));
            assert!(zombie.on_ground);
        }

        data.handle(
            ClientboundPlayPacket::RemoveEntities(RemoveEntities { ids: vec![5, 99] }),
            &session,
        )
        .unwrap();
        assert!(data.entities().get_entity(5).is_none());
        assert_eq!(data.entities().entity_count(), 1);
    }

    #[test]
    fn unknown_entities_are_ignored() {
        let (session, _writes, _reads) = play_session();
        let mut data = joined(&session);
        data.handle(
            ClientboundPlayPacket::SetEntityMotion(SetEntityMotion {
                id: 77,
                velocity: [1.0, 0.0, 0.0],
            }),
            &session,
        )
        .unwrap();
        data.handle(
            ClientboundPlayPacket::RemoveMobEffect(RemoveMobEffect { id: 77, effect: 1 }),
            &session,
        )
        .unwrap();
        assert!(data.entities().get_entity(77).is_none());
    }

    #[test]
    fn server_moves_of_local_player_are_ignored() {
        let (session, _writes, _reads) = play_session();
        let mut data = joined(&session);
        data.handle(
            ClientboundPlayPacket::TeleportEntity(TeleportEntity {
                id: PLAYER_ID,
                change: PositionMoveRotation {
                    x: 100.0,
                    y: 70.0,
                    z: 100.0,
                    ..Default::default()
                },
                relatives: 0,
                on_ground: true,
            }),
            &session,
        )
        .unwrap();
        let player = data.player().unwrap().entity().read().position();
        assert_eq!(player, Vec3::ZERO);
    }

    #[test]
    fn motion_and_attributes() {
        let (session, _writes, _reads) = play_session();
        let mut data = joined(&session);
        data.handle(spawn(6), &session).unwrap();
        data.handle(
            ClientboundPlayPacket::SetEntityMotion(SetEntityMotion {
                id: 6,
                velocity: [0.0, 0.42, 0.0],
            }),
            &session,
        )
        .unwrap();
        data.handle(
            ClientboundPlayPacket::UpdateAttributes(UpdateAttributes {
                id: 6,
                attributes: vec![AttributeSnapshot {
                    attribute: attribute_id::MOVEMENT_SPEED,
                    base: 0.23,
                    modifiers: vec![],
                }],
            }),
            &session,
        )
        .unwrap();
        let zombie = data.entities().get_entity(6).unwrap();
        let zombie = zombie.read();
        assert_eq!(zombie.velocity, Vec3::new(0.0, 0.42, 0.0));
        assert_eq!(zombie.attributes.value_of(attribute_id::MOVEMENT_SPEED), Some(0.23));
    }
}
