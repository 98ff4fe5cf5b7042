//! The behavior system: a priority-preemptive set of small state machines
//! that play the game.
//!
//! Each behavior declares a static priority, a name, and a minimum tick
//! spacing, and implements two methods: `can_start` (may I take control
//! given this snapshot?) and `tick` (do one step). The engine in
//! [`engine`] scans behaviors in descending priority each tick and lets the
//! best candidate run.
//!
//! Behaviors never block on I/O: they push commands into [`BotCtl`] and
//! return. The worker drains the queue through the session's throttle after
//! the tick, which keeps per-session write ordering intact.

pub mod combat;
pub mod engine;
pub mod idle;
pub mod inventory;
pub mod navigation;
pub mod survival;
pub mod training;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::metrics::BotMetrics;
use crate::msdp::Position;
use crate::text::{BotExit, BotMob, BotObject};

// ── Priorities ────────────────────────────────────────────────────────────

/// Behavior priorities, highest first. Higher preempts lower; equal
/// priorities keep registration order.
pub mod priority {
    pub const DEATH_RECOVERY: i32 = 200;
    pub const SURVIVE: i32 = 100;
    pub const RECALL: i32 = 95;
    pub const LIGHT_SOURCE: i32 = 85;
    pub const COMBAT: i32 = 80;
    pub const LOOT: i32 = 75;
    pub const HEAL: i32 = 70;
    pub const BOT_RESET: i32 = 65;
    pub const TRAIN: i32 = 62;
    pub const PRACTICE: i32 = 61;
    /// Startup navigation to the hub; registered after Practice so the
    /// equal-priority tie resolves in favor of finishing practice first.
    pub const INITIAL_NAVIGATE: i32 = 61;
    pub const ATTACK: i32 = 60;
    pub const FIGHT_DARK_CREATURE: i32 = 57;
    pub const BUY_SUPPLIES: i32 = 56;
    pub const PATROL: i32 = 55;
    pub const NAVIGATE: i32 = 45;
    pub const EXPLORE: i32 = 40;
    pub const RETURN_TO_CAGE: i32 = 35;
    pub const IDLE: i32 = 10;
}

// ── Thresholds ────────────────────────────────────────────────────────────

pub const DEFAULT_FLEE_HP_PERCENT: f64 = 20.0;
pub const DEFAULT_REST_HP_PERCENT: f64 = 50.0;
pub const DEFAULT_REST_MANA_PERCENT: f64 = 30.0;
pub const DEFAULT_REST_MOVE_PERCENT: f64 = 20.0;
/// Below this, a failed flee escalates to recall.
pub const CRITICAL_HP_PERCENT: f64 = 25.0;
/// Don't pick fights (or patrol) below this.
pub const MIN_ATTACK_HP_PERCENT: f64 = 50.0;
/// Yield to healing during startup errands below this.
pub const CRITICAL_MOVE_PERCENT: f64 = 15.0;
pub const MAX_FLEE_ATTEMPTS: u32 = 5;
/// Gold needed before a shopping run makes sense.
pub const MIN_SHOPPING_MONEY: i64 = 50;
/// Ticks to linger in a cage after combat before moving on.
pub const PATROL_LINGER_TICKS: u32 = 3;
/// Engine text buffer bound, in lines.
pub const MAX_TEXT_BUFFER_LINES: usize = 50;

// ── Context ───────────────────────────────────────────────────────────────

/// Immutable snapshot of game state, rebuilt each tick and handed to every
/// behavior's `can_start` and `tick`.
#[derive(Debug, Clone, Default)]
pub struct Context {
    // Vitals.
    pub health: i32,
    pub health_max: i32,
    pub mana: i32,
    pub mana_max: i32,
    pub movement: i32,
    pub movement_max: i32,

    // Character.
    pub level: i32,
    pub experience: i64,
    pub money: i64,
    pub position: Position,

    // Combat.
    pub in_combat: bool,
    pub opponent_name: String,
    pub opponent_level: i32,
    pub opponent_health: i32,
    pub opponent_health_max: i32,

    // Location.
    pub room_vnum: i32,
    pub room_exits: Vec<String>,

    // Room contents.
    pub room_mobs: Vec<String>,
    pub has_corpse: bool,

    // Structured records, when the server emits them.
    pub bot_mode: bool,
    pub bot_mobs: Vec<BotMob>,
    pub bot_objects: Vec<BotObject>,
    pub bot_exits: Vec<BotExit>,
    pub bot_room_flags: Vec<String>,
    pub bot_sector: String,

    /// Recent server output (engine rolling buffer, joined).
    pub last_text: String,

    // Engine-owned flags.
    pub is_hungry: bool,
    pub is_thirsty: bool,
    pub flee_failed: bool,
    pub should_proactive_shop: bool,
    pub should_fight_dark_creature: bool,
}

fn percent(cur: i32, max: i32) -> f64 {
    if max <= 0 {
        return 100.0;
    }
    (cur as f64 / max as f64) * 100.0
}

impl Context {
    pub fn hp_percent(&self) -> f64 {
        percent(self.health, self.health_max)
    }

    pub fn mana_percent(&self) -> f64 {
        percent(self.mana, self.mana_max)
    }

    pub fn move_percent(&self) -> f64 {
        percent(self.movement, self.movement_max)
    }
}

// ── Results & control handle ──────────────────────────────────────────────

/// Outcome of one behavior tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    /// Still working; keep me active.
    Continue,
    /// Finished successfully; release control.
    Completed,
    /// Gave up; release control.
    Failed,
    /// Active but nothing to do this tick.
    Waiting,
}

/// Flags behaviors raise on the engine; they persist across behavior
/// changes until explicitly cleared.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineFlags {
    /// Survive gave up fleeing; Recall should fire.
    pub flee_failed: bool,
    /// A patrol circuit completed; restock supplies.
    pub should_proactive_shop: bool,
    /// Supplies (and lantern) bought; go fight the dark-room creature.
    pub should_fight_dark_creature: bool,
}

/// The control surface a behavior sees during `start`/`tick`: the command
/// queue, the engine flags, and the session's metrics record.
pub struct BotCtl<'a> {
    pub bot_id: &'a str,
    pub flags: &'a mut EngineFlags,
    commands: &'a mut Vec<String>,
    metrics: Option<&'a Arc<Mutex<BotMetrics>>>,
    /// Set by a behavior that invalidated recent output (e.g. after loot).
    pub clear_text_buffer: bool,
    /// Set to wipe hunger/thirst/shopping state (hard reset).
    pub reset_needs: bool,
}

impl<'a> BotCtl<'a> {
    pub fn new(
        bot_id: &'a str,
        flags: &'a mut EngineFlags,
        commands: &'a mut Vec<String>,
        metrics: Option<&'a Arc<Mutex<BotMetrics>>>,
    ) -> Self {
        Self {
            bot_id,
            flags,
            commands,
            metrics,
            clear_text_buffer: false,
            reset_needs: false,
        }
    }

    /// Queue a game command; the worker sends it after the tick.
    pub fn send_command(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    pub fn record_death(&self) {
        if let Some(m) = self.metrics {
            if let Ok(mut m) = m.lock() {
                m.record_death();
            }
        }
    }

    pub fn record_flee_attempt(&self) {
        if let Some(m) = self.metrics {
            if let Ok(mut m) = m.lock() {
                m.record_flee_attempt();
            }
        }
    }
}

// ── Behavior trait ────────────────────────────────────────────────────────

/// A unit in the scheduler: a priority, a name, and a `can_start`/`tick`
/// pair. Behaviors relinquish control by returning [`TickResult::Completed`]
/// or [`TickResult::Failed`]; they never raise.
pub trait Behavior: Send {
    fn priority(&self) -> i32;
    fn name(&self) -> &'static str;

    /// Minimum wall-time between ticks while active.
    fn tick_delay(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// Whether this behavior wants control under `ctx`.
    fn can_start(&self, ctx: &Context) -> bool;

    /// Run one step.
    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult;

    /// Called when the behavior becomes active.
    fn start(&mut self, _bot: &mut BotCtl<'_>, _ctx: &Context) {}

    /// Called when the behavior is preempted or finishes.
    fn stop(&mut self) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a healthy, standing, out-of-combat context.
    pub fn ctx() -> Context {
        Context {
            health: 100,
            health_max: 100,
            mana: 100,
            mana_max: 100,
            movement: 100,
            movement_max: 100,
            level: 8,
            position: Position::Standing,
            ..Context::default()
        }
    }

    /// Run a closure with a throwaway `BotCtl`, returning queued commands.
    pub fn with_ctl<R>(f: impl FnOnce(&mut BotCtl<'_>) -> R) -> (R, Vec<String>, EngineFlags) {
        let mut flags = EngineFlags::default();
        let mut commands = Vec::new();
        let r = {
            let mut ctl = BotCtl::new("test", &mut flags, &mut commands, None);
            f(&mut ctl)
        };
        (r, commands, flags)
    }
}
