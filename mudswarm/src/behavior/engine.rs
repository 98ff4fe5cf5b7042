//! Priority-preemptive behavior scheduler.
//!
//! Invariants the engine maintains:
//! - at most one behavior is active at a time;
//! - each tick, the highest-priority behavior whose `can_start` returns
//!   true takes over **iff** its priority strictly exceeds the active
//!   behavior's (equal priority never interrupts; ties between candidates
//!   resolve by registration order because the scan is stable-sorted);
//! - an active behavior is only ticked once its `tick_delay` has elapsed;
//! - `Completed` / `Failed` clears the active slot; `Continue` / `Waiting`
//!   keeps it;
//! - a panic inside a tick is logged and treated as `Failed` — one broken
//!   behavior must not take the whole session down.
//!
//! The engine also owns a line-bounded rolling buffer of recent server
//! output for behaviors that parse results (loot/compare), and watches it
//! for hunger/thirst messages to maintain the persistent needs flags.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, error};

use crate::metrics::BotMetrics;
use crate::msdp::{CharacterStats, RoomInfo};
use crate::session::Session;
use crate::text::{self, BotSnapshot};

use super::{Behavior, BotCtl, Context, EngineFlags, TickResult, MAX_TEXT_BUFFER_LINES};

// ── WorldView ─────────────────────────────────────────────────────────────

/// The session-owned inputs the engine snapshots into a [`Context`].
#[derive(Debug, Clone, Default)]
pub struct WorldView {
    pub stats: CharacterStats,
    pub room: RoomInfo,
    pub bot_mode: bool,
    pub bot: BotSnapshot,
}

impl WorldView {
    pub fn from_session(session: &Session) -> Self {
        Self {
            stats: session.stats().clone(),
            room: session.room().clone(),
            bot_mode: session.bot_mode(),
            bot: session.bot_data().clone(),
        }
    }
}

// ── Engine ────────────────────────────────────────────────────────────────

struct Entry {
    behavior: Box<dyn Behavior>,
    started: bool,
    last_tick: Option<Instant>,
}

/// Owns the behavior set for one session and schedules it.
pub struct Engine {
    bot_id: String,
    behaviors: Vec<Entry>,
    /// Name of the active behavior, if any.
    current: Option<&'static str>,
    text_buffer: VecDeque<String>,
    is_hungry: bool,
    is_thirsty: bool,
    flags: EngineFlags,
}

impl Engine {
    pub fn new(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            behaviors: Vec::new(),
            current: None,
            text_buffer: VecDeque::new(),
            is_hungry: false,
            is_thirsty: false,
            flags: EngineFlags::default(),
        }
    }

    /// Register a behavior. Registration happens before the first tick;
    /// the list stays sorted by descending priority, ties keeping
    /// registration order.
    pub fn add(&mut self, behavior: Box<dyn Behavior>) {
        debug!(
            bot = %self.bot_id,
            name = behavior.name(),
            priority = behavior.priority(),
            "behavior registered"
        );
        self.behaviors.push(Entry {
            behavior,
            started: false,
            last_tick: None,
        });
        // Stable sort preserves registration order for equal priorities.
        self.behaviors
            .sort_by(|a, b| b.behavior.priority().cmp(&a.behavior.priority()));
    }

    pub fn current_behavior_name(&self) -> Option<&'static str> {
        self.current
    }

    /// Registered behavior names in scan order (descending priority).
    pub fn behavior_names(&self) -> Vec<&'static str> {
        self.behaviors.iter().map(|e| e.behavior.name()).collect()
    }

    pub fn flags(&self) -> EngineFlags {
        self.flags
    }

    /// Clear hunger/thirst and shopping triggers (hard reset).
    pub fn reset_needs_state(&mut self) {
        self.is_hungry = false;
        self.is_thirsty = false;
        self.flags.should_proactive_shop = false;
    }

    pub fn clear_text_buffer(&mut self) {
        self.text_buffer.clear();
    }

    /// Fold a chunk of server output into the rolling buffer and update the
    /// needs flags. The flags persist across behavior changes and reset only
    /// via [`Self::reset_needs_state`] or the "no longer" messages.
    pub fn observe_text(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        for line in chunk.split('\n') {
            self.text_buffer.push_back(line.to_owned());
        }
        while self.text_buffer.len() > MAX_TEXT_BUFFER_LINES {
            self.text_buffer.pop_front();
        }

        let lower = chunk.to_lowercase();
        if lower.contains("you are hungry") {
            self.is_hungry = true;
        }
        if lower.contains("you are thirsty") {
            self.is_thirsty = true;
        }
        if lower.contains("you are no longer hungry") || lower.contains("you eat") {
            self.is_hungry = false;
        }
        if lower.contains("you are no longer thirsty") || lower.contains("you drink") {
            self.is_thirsty = false;
        }
    }

    fn buffered_text(&self) -> String {
        let lines: Vec<&str> = self.text_buffer.iter().map(String::as_str).collect();
        lines.join("\n")
    }

    /// Build the per-tick snapshot from session state plus engine state.
    pub fn build_context(&self, world: &WorldView) -> Context {
        let stats = &world.stats;
        let mut ctx = Context {
            health: stats.health,
            health_max: stats.health_max,
            mana: stats.mana,
            mana_max: stats.mana_max,
            movement: stats.movement,
            movement_max: stats.movement_max,
            level: stats.level,
            experience: stats.experience,
            money: stats.money,
            position: stats.position,
            in_combat: stats.in_combat,
            opponent_name: stats.opponent_name.clone(),
            opponent_level: stats.opponent_level,
            opponent_health: stats.opponent_health,
            opponent_health_max: stats.opponent_health_max,
            room_vnum: stats.room_vnum,
            room_exits: world.room.exits.clone(),
            last_text: self.buffered_text(),
            is_hungry: self.is_hungry,
            is_thirsty: self.is_thirsty,
            flee_failed: self.flags.flee_failed,
            should_proactive_shop: self.flags.should_proactive_shop,
            should_fight_dark_creature: self.flags.should_fight_dark_creature,
            ..Context::default()
        };

        if world.bot_mode {
            // Structured records are authoritative for room contents; the
            // room vnum stays with MSDP, which updates instantly on moves
            // while records only refresh on `look`.
            ctx.bot_mode = true;
            ctx.bot_mobs = world.bot.mobs.clone();
            ctx.bot_objects = world.bot.objects.clone();
            ctx.bot_exits = world.bot.exits.clone();
            if let Some(room) = &world.bot.room {
                ctx.bot_room_flags = room.flags.clone();
                ctx.bot_sector = room.sector.clone();
            }
            if !world.bot.exits.is_empty() {
                ctx.room_exits = world.bot.exits.iter().map(|e| e.direction.clone()).collect();
            }
            ctx.room_mobs = world.bot.mobs.iter().map(|m| m.name.clone()).collect();
            ctx.has_corpse = world.bot.has_corpse();
        } else {
            let text = self.buffered_text();
            ctx.room_mobs = text::mob_lines(&text);
            ctx.has_corpse = text::has_corpse_text(&text);
        }
        ctx
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.behaviors
            .iter()
            .position(|e| e.behavior.name() == name)
    }

    /// Run one scheduler tick. Commands queued by the active behavior are
    /// appended to `commands` for the worker to send.
    ///
    /// Returns the name of the behavior that is (or just finished being)
    /// active, or `None` when nothing ran.
    pub fn tick(
        &mut self,
        world: &WorldView,
        metrics: Option<&Arc<Mutex<BotMetrics>>>,
        commands: &mut Vec<String>,
    ) -> Option<&'static str> {
        let ctx = self.build_context(world);

        // Scan for a candidate that outranks the active behavior.
        let current_priority = self
            .current
            .and_then(|n| self.index_of(n))
            .map(|i| self.behaviors[i].behavior.priority());
        let mut switch_to = None;
        for (i, entry) in self.behaviors.iter().enumerate() {
            if !entry.behavior.can_start(&ctx) {
                continue;
            }
            match current_priority {
                None => {
                    switch_to = Some(i);
                    break;
                }
                Some(p) if entry.behavior.priority() > p => {
                    switch_to = Some(i);
                    break;
                }
                Some(_) => {} // cannot interrupt — keep the active behavior
            }
        }

        if let Some(i) = switch_to {
            if let Some(old) = self.current {
                if let Some(oi) = self.index_of(old) {
                    if oi != i {
                        debug!(bot = %self.bot_id, from = old, to = self.behaviors[i].behavior.name(), "preempt");
                        self.behaviors[oi].behavior.stop();
                        self.behaviors[oi].started = false;
                    }
                }
            }
            let Self {
                bot_id,
                behaviors,
                flags,
                ..
            } = self;
            let entry = &mut behaviors[i];
            if !entry.started {
                let mut ctl = BotCtl::new(bot_id, flags, commands, metrics);
                entry.behavior.start(&mut ctl, &ctx);
                entry.started = true;
            }
            self.current = Some(self.behaviors[i].behavior.name());
        }

        // Tick the active behavior, honoring its tick delay.
        let Some(active) = self.current else {
            return None;
        };
        let Some(i) = self.index_of(active) else {
            self.current = None;
            return None;
        };

        let due = self.behaviors[i]
            .last_tick
            .map_or(true, |t| t.elapsed() >= self.behaviors[i].behavior.tick_delay());
        if !due {
            return Some(active);
        }
        self.behaviors[i].last_tick = Some(Instant::now());

        let (result, wants_clear, wants_reset) = {
            let Self {
                bot_id,
                behaviors,
                flags,
                ..
            } = self;
            let entry = &mut behaviors[i];
            let mut ctl = BotCtl::new(bot_id, flags, commands, metrics);
            let result = match catch_unwind(AssertUnwindSafe(|| entry.behavior.tick(&mut ctl, &ctx)))
            {
                Ok(r) => r,
                Err(_) => {
                    error!(bot = %bot_id, behavior = entry.behavior.name(), "tick panicked");
                    TickResult::Failed
                }
            };
            (result, ctl.clear_text_buffer, ctl.reset_needs)
        };

        if wants_clear {
            self.clear_text_buffer();
        }
        if wants_reset {
            self.reset_needs_state();
        }

        match result {
            TickResult::Completed | TickResult::Failed => {
                debug!(bot = %self.bot_id, behavior = active, ?result, "behavior released");
                self.behaviors[i].behavior.stop();
                self.behaviors[i].started = false;
                self.current = None;
            }
            TickResult::Continue | TickResult::Waiting => {}
        }
        Some(active)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
