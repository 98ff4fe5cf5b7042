//! Navigation behaviors: route following, patrol, exploration, the walk
//! home, and the dark-room errand.

use std::collections::HashSet;
use std::time::Duration;

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::{
    priority, Behavior, BotCtl, Context, TickResult, MIN_ATTACK_HP_PERCENT, PATROL_LINGER_TICKS,
};
use crate::rooms::{
    cage_enter_direction, cage_exit_direction, Route, CAGE_ROOMS, CENTRAL_ROOM, CORRIDOR_ROOM,
    DARK_ROOM, PATROL_ROOMS, PATROL_SEQUENCE,
};

fn opposite_direction(direction: &str) -> Option<&'static str> {
    match direction {
        "north" => Some("south"),
        "south" => Some("north"),
        "east" => Some("west"),
        "west" => Some("east"),
        "up" => Some("down"),
        "down" => Some("up"),
        _ => None,
    }
}

const STUCK_LIMIT: u32 = 5;

// ── Navigate ──────────────────────────────────────────────────────────────

/// Follow a static route to a destination vnum, one step per tick.
///
/// Off-route rooms fall back to `recall`; standing still for
/// [`STUCK_LIMIT`] ticks fails the run. One-shot mode marks the behavior
/// permanently done on arrival, which is how the startup walk to the hub is
/// kept from re-triggering out of the cages.
pub struct Navigate {
    route: Route,
    destination: i32,
    one_shot: bool,
    priority_override: Option<i32>,
    done: bool,
    stuck_count: u32,
    last_room: i32,
}

impl Navigate {
    pub fn new(route: Route, destination: i32) -> Self {
        Self {
            route,
            destination,
            one_shot: false,
            priority_override: None,
            done: false,
            stuck_count: 0,
            last_room: 0,
        }
    }

    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority_override = Some(priority);
        self
    }
}

impl Behavior for Navigate {
    fn priority(&self) -> i32 {
        self.priority_override.unwrap_or(priority::NAVIGATE)
    }

    fn name(&self) -> &'static str {
        "Navigate"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        if self.done || ctx.in_combat {
            return false;
        }
        ctx.room_vnum != 0 && ctx.room_vnum != self.destination
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if ctx.in_combat {
            return TickResult::Waiting;
        }

        if ctx.room_vnum == self.destination {
            info!(bot = bot.bot_id, room = self.destination, "arrived");
            if self.one_shot {
                self.done = true;
            }
            bot.send_command("look");
            return TickResult::Completed;
        }

        // Stuck detection: the same room over consecutive ticks.
        if ctx.room_vnum == self.last_room {
            self.stuck_count += 1;
            if self.stuck_count >= STUCK_LIMIT {
                warn!(bot = bot.bot_id, room = ctx.room_vnum, "navigation stuck");
                self.stuck_count = 0;
                return TickResult::Failed;
            }
        } else {
            self.stuck_count = 0;
            self.last_room = ctx.room_vnum;
        }

        if !ctx.position.can_move() {
            bot.send_command("wake");
            bot.send_command("stand");
            return TickResult::Continue;
        }

        match self.route.step(ctx.room_vnum) {
            Some(direction) => {
                debug!(bot = bot.bot_id, room = ctx.room_vnum, direction, "step");
                bot.send_command(direction);
            }
            None => {
                warn!(bot = bot.bot_id, room = ctx.room_vnum, "off route, recalling");
                bot.send_command("recall");
            }
        }
        TickResult::Continue
    }
}

// ── Explore ───────────────────────────────────────────────────────────────

/// Wander through exits, preferring rooms not seen before (using structured
/// exit records when available) and avoiding an immediate about-face.
pub struct Explore {
    visited: HashSet<i32>,
    last_direction: Option<String>,
    stuck_count: u32,
}

impl Explore {
    pub fn new() -> Self {
        Self {
            visited: HashSet::new(),
            last_direction: None,
            stuck_count: 0,
        }
    }

    fn choose_direction(&self, ctx: &Context) -> Option<String> {
        if ctx.room_exits.is_empty() {
            return None;
        }
        let back = self.last_direction.as_deref().and_then(opposite_direction);
        let mut available: Vec<&String> = ctx
            .room_exits
            .iter()
            .filter(|e| Some(e.as_str()) != back)
            .collect();
        if available.is_empty() {
            available = ctx.room_exits.iter().collect();
        }

        // With structured exit records, walk toward rooms we haven't seen.
        if ctx.bot_mode && !ctx.bot_exits.is_empty() {
            let unvisited: Vec<&String> = available
                .iter()
                .copied()
                .filter(|dir| {
                    ctx.bot_exits
                        .iter()
                        .any(|e| &e.direction == *dir && !self.visited.contains(&e.vnum))
                })
                .collect();
            if let Some(dir) = unvisited.choose(&mut rand::thread_rng()) {
                return Some((*dir).clone());
            }
        }

        available
            .choose(&mut rand::thread_rng())
            .map(|d| (*d).clone())
    }
}

impl Default for Explore {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for Explore {
    fn priority(&self) -> i32 {
        priority::EXPLORE
    }

    fn name(&self) -> &'static str {
        "Explore"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_secs(2)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        !ctx.in_combat && ctx.position.can_move() && !ctx.room_exits.is_empty()
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if ctx.in_combat {
            return TickResult::Waiting;
        }
        if ctx.room_vnum != 0 {
            self.visited.insert(ctx.room_vnum);
        }

        match self.choose_direction(ctx) {
            Some(direction) => {
                self.stuck_count = 0;
                debug!(bot = bot.bot_id, direction, seen = self.visited.len(), "explore");
                bot.send_command(direction.clone());
                self.last_direction = Some(direction);
                TickResult::Continue
            }
            None => {
                self.stuck_count += 1;
                if self.stuck_count >= 3 {
                    warn!(bot = bot.bot_id, "nowhere to go, recalling");
                    bot.send_command("recall");
                    self.stuck_count = 0;
                    return TickResult::Continue;
                }
                TickResult::Waiting
            }
        }
    }
}

// ── Patrol ────────────────────────────────────────────────────────────────

/// Cycle through the four cages around the hub, lingering briefly after
/// each fight, and arm a supply run after every completed circuit.
pub struct Patrol {
    sequence_index: usize,
    linger_ticks: u32,
    circuits: u32,
}

impl Patrol {
    pub fn new() -> Self {
        Self {
            sequence_index: 0,
            linger_ticks: 0,
            circuits: 0,
        }
    }

    fn has_attackable_mob(ctx: &Context) -> bool {
        if !ctx.bot_mode || ctx.bot_mobs.is_empty() {
            return false;
        }
        ctx.bot_mobs.iter().any(|mob| {
            let name = mob.name.to_lowercase();
            !["shopkeeper", "guard", "healer", "receptionist", "adept"]
                .iter()
                .any(|k| name.contains(k))
        })
    }
}

impl Default for Patrol {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for Patrol {
    fn priority(&self) -> i32 {
        priority::PATROL
    }

    fn name(&self) -> &'static str {
        "Patrol"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        !ctx.in_combat
            && ctx.position.can_move()
            && ctx.hp_percent() >= MIN_ATTACK_HP_PERCENT
            && PATROL_ROOMS.contains(&ctx.room_vnum)
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if ctx.in_combat {
            return TickResult::Waiting;
        }

        // Inside a cage: let Attack take the fight, linger, then move on.
        if CAGE_ROOMS.contains(&ctx.room_vnum) {
            if Self::has_attackable_mob(ctx) {
                return TickResult::Waiting;
            }
            self.linger_ticks += 1;
            if self.linger_ticks < PATROL_LINGER_TICKS {
                return TickResult::Continue;
            }
            if let Some(exit) = cage_exit_direction(ctx.room_vnum) {
                debug!(bot = bot.bot_id, cage = ctx.room_vnum, exit, "leaving cage");
                bot.send_command(exit);
                self.linger_ticks = 0;
                self.sequence_index = (self.sequence_index + 1) % PATROL_SEQUENCE.len();
                if self.sequence_index == 0 {
                    self.circuits += 1;
                    info!(bot = bot.bot_id, circuits = self.circuits, "patrol circuit complete");
                    bot.flags.should_proactive_shop = true;
                }
            }
            return TickResult::Continue;
        }

        // At the hub: enter the next cage in the sequence.
        if ctx.room_vnum == CENTRAL_ROOM {
            let target = PATROL_SEQUENCE[self.sequence_index];
            if let Some(direction) = cage_enter_direction(target) {
                debug!(bot = bot.bot_id, cage = target, direction, "entering cage");
                bot.send_command(direction);
            }
            return TickResult::Continue;
        }

        warn!(bot = bot.bot_id, room = ctx.room_vnum, "patrol drifted off its rooms");
        TickResult::Failed
    }
}

// ── ReturnToCage ──────────────────────────────────────────────────────────

/// After a death, recall, or failed errand: walk the union route back to
/// the hub.
pub struct ReturnToCage {
    route: Route,
}

impl ReturnToCage {
    pub fn new(route: Route) -> Self {
        Self { route }
    }
}

impl Behavior for ReturnToCage {
    fn priority(&self) -> i32 {
        priority::RETURN_TO_CAGE
    }

    fn name(&self) -> &'static str {
        "ReturnToCage"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        if ctx.in_combat || !ctx.position.can_move() {
            return false;
        }
        if ctx.hp_percent() < MIN_ATTACK_HP_PERCENT {
            return false;
        }
        // Only from a displaced position, and only when we know the way.
        !PATROL_ROOMS.contains(&ctx.room_vnum) && self.route.contains(ctx.room_vnum)
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if ctx.in_combat {
            return TickResult::Waiting;
        }
        if ctx.room_vnum == CENTRAL_ROOM {
            info!(bot = bot.bot_id, "back at the hub");
            return TickResult::Completed;
        }
        if !ctx.position.can_move() {
            bot.send_command("wake");
            bot.send_command("stand");
            return TickResult::Continue;
        }
        match self.route.step(ctx.room_vnum) {
            Some(direction) => {
                debug!(bot = bot.bot_id, room = ctx.room_vnum, direction, "homeward");
                bot.send_command(direction);
            }
            None => {
                warn!(bot = bot.bot_id, room = ctx.room_vnum, "lost, recalling");
                bot.send_command("recall");
            }
        }
        TickResult::Continue
    }
}

// ── FightDarkCreature ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DarkState {
    Approach,
    Engage,
    Return,
}

/// The lantern errand's payoff: walk from the corridor into the unlit room,
/// kill the creature that holds the key, and come back out.
///
/// Armed by [`super::inventory::BuySupplies`] after a proactive restock;
/// disarmed here on completion and by death recovery.
pub struct FightDarkCreature {
    state: DarkState,
    attack_sent: bool,
}

impl FightDarkCreature {
    pub fn new() -> Self {
        Self {
            state: DarkState::Approach,
            attack_sent: false,
        }
    }
}

impl Default for FightDarkCreature {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for FightDarkCreature {
    fn priority(&self) -> i32 {
        priority::FIGHT_DARK_CREATURE
    }

    fn name(&self) -> &'static str {
        "FightDarkCreature"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        ctx.should_fight_dark_creature
            && !ctx.in_combat
            && ctx.hp_percent() >= MIN_ATTACK_HP_PERCENT
    }

    fn start(&mut self, _bot: &mut BotCtl<'_>, _ctx: &Context) {
        self.state = DarkState::Approach;
        self.attack_sent = false;
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if ctx.in_combat {
            // Combat (priority 80) runs the fight; we resume afterwards.
            return TickResult::Waiting;
        }

        match self.state {
            DarkState::Approach => {
                if ctx.room_vnum == DARK_ROOM {
                    self.state = DarkState::Engage;
                    return TickResult::Continue;
                }
                if ctx.room_vnum == CORRIDOR_ROOM {
                    bot.send_command("east");
                    return TickResult::Continue;
                }
                warn!(bot = bot.bot_id, room = ctx.room_vnum, "lost the way to the dark room");
                bot.flags.should_fight_dark_creature = false;
                TickResult::Failed
            }
            DarkState::Engage => {
                let creature_here = ctx
                    .room_mobs
                    .iter()
                    .any(|m| m.to_lowercase().contains("creature"));
                if creature_here && !self.attack_sent {
                    info!(bot = bot.bot_id, "engaging the dark-room creature");
                    bot.send_command("kill creature");
                    self.attack_sent = true;
                    return TickResult::Continue;
                }
                if !creature_here {
                    // Dead (loot handled elsewhere) or never here; head back.
                    self.state = DarkState::Return;
                }
                TickResult::Continue
            }
            DarkState::Return => {
                if ctx.room_vnum == DARK_ROOM {
                    bot.send_command("west");
                    return TickResult::Continue;
                }
                info!(bot = bot.bot_id, "dark-room errand finished");
                bot.flags.should_fight_dark_creature = false;
                TickResult::Completed
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
