//! Room vnums and static navigation routes.
//!
//! The bots operate in the Mob Factory training area: a central hub room
//! with four monster cages around it, a shop one level down, and the
//! trainer/practice rooms off the school entrance. A [`Route`] is a partial
//! map from room vnum to the exit direction that makes progress toward the
//! route's destination; rooms off the route fall back to `recall`.

/// Recall point (temple altar).
pub const RECALL_ROOM: i32 = 3001;
/// School entrance, one flight up from the recall point.
pub const SCHOOL_ENTRANCE: i32 = 3700;

/// Hub room connecting the four cages.
pub const CENTRAL_ROOM: i32 = 3712;
pub const NORTH_CAGE: i32 = 3713;
pub const WEST_CAGE: i32 = 3714;
pub const SOUTH_CAGE: i32 = 3715;
pub const EAST_CAGE: i32 = 3716;

/// Landing room below the hub; the shop and the dark corridor branch off it.
pub const INTERMEDIATE_ROOM: i32 = 3717;
pub const SHOP_ROOM: i32 = 3718;
/// Corridor leading to the unlit room.
pub const CORRIDOR_ROOM: i32 = 3719;
/// The unlit room; needs a light source.
pub const DARK_ROOM: i32 = 3720;

pub const TRAIN_ROOM: i32 = 3758;
pub const PRACTICE_ROOM: i32 = 3759;

pub const CAGE_ROOMS: [i32; 4] = [NORTH_CAGE, WEST_CAGE, SOUTH_CAGE, EAST_CAGE];
/// Rooms the patrol circuit considers "home".
pub const PATROL_ROOMS: [i32; 5] = [CENTRAL_ROOM, NORTH_CAGE, WEST_CAGE, SOUTH_CAGE, EAST_CAGE];

/// Patrol visiting order: north, east, south, west.
pub const PATROL_SEQUENCE: [i32; 4] = [NORTH_CAGE, EAST_CAGE, SOUTH_CAGE, WEST_CAGE];

/// Direction from the hub into each cage.
pub fn cage_enter_direction(cage: i32) -> Option<&'static str> {
    match cage {
        NORTH_CAGE => Some("north"),
        EAST_CAGE => Some("east"),
        SOUTH_CAGE => Some("south"),
        WEST_CAGE => Some("west"),
        _ => None,
    }
}

/// Direction from each cage back to the hub.
pub fn cage_exit_direction(cage: i32) -> Option<&'static str> {
    match cage {
        NORTH_CAGE => Some("south"),
        EAST_CAGE => Some("west"),
        SOUTH_CAGE => Some("north"),
        WEST_CAGE => Some("east"),
        _ => None,
    }
}

// ── Route ─────────────────────────────────────────────────────────────────

/// A partial map from room vnum to the direction to walk next.
#[derive(Debug, Clone, Copy)]
pub struct Route(pub &'static [(i32, &'static str)]);

impl Route {
    /// The direction to take from `vnum`, if the room is on the route.
    pub fn step(&self, vnum: i32) -> Option<&'static str> {
        self.0.iter().find(|(v, _)| *v == vnum).map(|(_, d)| *d)
    }

    pub fn contains(&self, vnum: i32) -> bool {
        self.step(vnum).is_some()
    }
}

/// Recall point and school corridor up to the cage hub.
pub const ROUTE_TO_CAGE_ROOM: Route = Route(&[
    (RECALL_ROOM, "up"),
    (SCHOOL_ENTRANCE, "north"),
    (3701, "north"),
    (3702, "west"),
    (3703, "north"),
    (3704, "north"),
    (3705, "west"),
    (3706, "down"),
    // Rooms below / beside the hub.
    (INTERMEDIATE_ROOM, "up"),
    (SHOP_ROOM, "north"),
    (CORRIDOR_ROOM, "west"),
    // Back from the trainer wing.
    (PRACTICE_ROOM, "west"),
    (TRAIN_ROOM, "south"),
    (3757, "south"),
    (3756, "east"),
]);

/// Recall point to the trainer.
pub const ROUTE_TO_TRAIN_ROOM: Route = Route(&[
    (RECALL_ROOM, "up"),
    (SCHOOL_ENTRANCE, "west"),
    (3756, "north"),
    (3757, "north"),
    (PRACTICE_ROOM, "west"),
]);

/// Recall point to the practice hall (one door east of the trainer).
pub const ROUTE_TO_PRACTICE_ROOM: Route = Route(&[
    (RECALL_ROOM, "up"),
    (SCHOOL_ENTRANCE, "west"),
    (3756, "north"),
    (3757, "north"),
    (TRAIN_ROOM, "east"),
]);

/// Union route used to get home from anywhere the bots normally end up:
/// the school corridor, the cages, and the shop wing.
pub const ROUTE_BACK_TO_HUB: Route = Route(&[
    (RECALL_ROOM, "up"),
    (SCHOOL_ENTRANCE, "north"),
    (3701, "north"),
    (3702, "west"),
    (3703, "north"),
    (3704, "north"),
    (3705, "west"),
    (3706, "down"),
    (NORTH_CAGE, "south"),
    (WEST_CAGE, "east"),
    (SOUTH_CAGE, "north"),
    (EAST_CAGE, "west"),
    (INTERMEDIATE_ROOM, "up"),
    (SHOP_ROOM, "north"),
    (CORRIDOR_ROOM, "west"),
    (PRACTICE_ROOM, "west"),
    (TRAIN_ROOM, "south"),
    (3757, "south"),
    (3756, "east"),
]);

// ── Tests ─────────────────────────────────────────────────────────────────
