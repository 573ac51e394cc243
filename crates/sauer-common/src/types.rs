// types.rs — shared primitive types used by both the wire codec and the
// game-state core.
//
// Converted from the spirit of myq2-original/qcommon/q_shared.h, trimmed to
// the handful of primitives an authoritative match server actually needs:
// this server never touches vertex normals, BSP planes or MD2 frames, so
// none of that survives the conversion.

/// A 3-D point or vector. Only used for splash-damage distance math (§4.4) —
/// positions themselves are opaque bytes as far as the worldstate builder
/// is concerned (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

/// Maximum concurrently connected human clients.
pub const MAXCLIENTS: usize = 128;

/// Bot handles live in a separate namespace offset by MAXCLIENTS (§3 invariant).
pub const MAXCLIENTS_BOT_OFFSET: i32 = MAXCLIENTS as i32;

/// Maximum queued events per client before excess is dropped (§3).
pub const MAXEVENTS: usize = 100;

/// Capacity of a client's in-flight projectile ring (§3, §9).
pub const PROJECTILE_RING_CAPACITY: usize = 8;

/// Grace window during which a just-dead client still reads as alive,
/// to resolve near-simultaneous hits (§3 `isAlive`).
pub const DEATH_GRACE_MILLIS: i64 = 300;

/// Minimum time between a death and the client being allowed to respawn (§4.4).
pub const DEATHMILLIS: i64 = 300;

/// Max datagram size for the game socket; matches the teacher's MAX_MSGLEN.
pub const MAX_MSGLEN: usize = 4096;

/// Longest line the command buffer will macro-expand before giving up.
pub const MAX_STRING_CHARS: usize = 1024;

/// Max tokens produced by one call to `cmd_tokenize_string`.
pub const MAX_STRING_TOKENS: usize = 80;
