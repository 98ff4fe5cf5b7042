//! Survival behaviors: death recovery, emergency flee, last-resort recall,
//! light management, and resting.

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::{
    priority, Behavior, BotCtl, Context, TickResult, CRITICAL_HP_PERCENT,
    DEFAULT_FLEE_HP_PERCENT, DEFAULT_REST_HP_PERCENT, DEFAULT_REST_MANA_PERCENT,
    DEFAULT_REST_MOVE_PERCENT, MAX_FLEE_ATTEMPTS,
};

// ── DeathRecovery ─────────────────────────────────────────────────────────

const RESPAWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Truly dead means DEAD/MORTAL/INCAP, or STUNNED with no health left.
/// A login/teleport stun with normal health is not a death.
fn is_truly_dead(ctx: &Context) -> bool {
    ctx.position.is_dead() || (ctx.position.is_stunned_or_worse() && ctx.hp_percent() <= 0.0)
}

/// Highest priority: park the session until the character respawns.
pub struct DeathRecovery {
    death_recorded: bool,
    waiting_since: Option<Instant>,
}

impl DeathRecovery {
    pub fn new() -> Self {
        Self {
            death_recorded: false,
            waiting_since: None,
        }
    }
}

impl Default for DeathRecovery {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for DeathRecovery {
    fn priority(&self) -> i32 {
        priority::DEATH_RECOVERY
    }

    fn name(&self) -> &'static str {
        "DeathRecovery"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        is_truly_dead(ctx)
    }

    fn start(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) {
        self.death_recorded = false;
        self.waiting_since = Some(Instant::now());
        error!(
            bot = bot.bot_id,
            position = ctx.position.name(),
            hp = ctx.hp_percent(),
            "died"
        );
        // The dark-room errand restarts from scratch after a death.
        bot.flags.should_fight_dark_creature = false;
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if !self.death_recorded {
            bot.record_death();
            self.death_recorded = true;
        }

        if !is_truly_dead(ctx) && ctx.hp_percent() > 0.0 {
            info!(
                bot = bot.bot_id,
                position = ctx.position.name(),
                room = ctx.room_vnum,
                "respawned"
            );
            bot.send_command("look");
            return TickResult::Completed;
        }

        let waited = self
            .waiting_since
            .get_or_insert_with(Instant::now)
            .elapsed();
        if waited > RESPAWN_TIMEOUT {
            error!(bot = bot.bot_id, "respawn never came");
            return TickResult::Failed;
        }
        TickResult::Waiting
    }

    fn stop(&mut self) {
        self.waiting_since = None;
    }
}

// ── Survive ───────────────────────────────────────────────────────────────

/// Emergency flee when health drops below the threshold mid-combat.
pub struct Survive {
    flee_hp_percent: f64,
    flee_attempts: u32,
}

impl Survive {
    pub fn new(flee_hp_percent: f64) -> Self {
        Self {
            flee_hp_percent,
            flee_attempts: 0,
        }
    }
}

impl Default for Survive {
    fn default() -> Self {
        Self::new(DEFAULT_FLEE_HP_PERCENT)
    }
}

impl Behavior for Survive {
    fn priority(&self) -> i32 {
        priority::SURVIVE
    }

    fn name(&self) -> &'static str {
        "Survive"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(300)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        ctx.in_combat && ctx.hp_percent() < self.flee_hp_percent
    }

    fn start(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) {
        self.flee_attempts = 0;
        warn!(bot = bot.bot_id, hp = ctx.hp_percent(), "health critical, fleeing");
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if is_truly_dead(ctx) {
            error!(bot = bot.bot_id, "died while fleeing");
            bot.record_death();
            return TickResult::Failed;
        }
        if !ctx.in_combat {
            info!(bot = bot.bot_id, "escaped combat");
            self.flee_attempts = 0;
            return TickResult::Completed;
        }

        if self.flee_attempts >= MAX_FLEE_ATTEMPTS {
            error!(bot = bot.bot_id, attempts = self.flee_attempts, "flee exhausted");
            bot.send_command("recall");
            bot.flags.flee_failed = true;
            self.flee_attempts = 0;
            return TickResult::Failed;
        }

        self.flee_attempts += 1;
        bot.record_flee_attempt();
        warn!(bot = bot.bot_id, attempt = self.flee_attempts, "flee");
        bot.send_command("flee");
        TickResult::Continue
    }
}

// ── Recall ────────────────────────────────────────────────────────────────

/// Last-resort recall, armed by a failed flee.
pub struct Recall {
    critical_hp_percent: f64,
}

impl Recall {
    pub fn new() -> Self {
        Self {
            critical_hp_percent: CRITICAL_HP_PERCENT,
        }
    }
}

impl Default for Recall {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for Recall {
    fn priority(&self) -> i32 {
        priority::RECALL
    }

    fn name(&self) -> &'static str {
        "Recall"
    }

    fn can_start(&self, ctx: &Context) -> bool {
        ctx.flee_failed && ctx.hp_percent() < self.critical_hp_percent
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        info!(bot = bot.bot_id, hp = ctx.hp_percent(), "emergency recall");
        bot.send_command("recall");
        bot.flags.flee_failed = false;
        TickResult::Completed
    }
}

// ── LightSource ───────────────────────────────────────────────────────────

/// Swap a lantern in when the room is dark and back out when it is not.
pub struct LightSource {
    holding_lantern: bool,
    step: u8,
}

impl LightSource {
    pub fn new() -> Self {
        Self {
            holding_lantern: false,
            step: 0,
        }
    }
}

impl Default for LightSource {
    fn default() -> Self {
        Self::new()
    }
}

fn room_is_dark(ctx: &Context) -> bool {
    ctx.bot_room_flags.iter().any(|f| f == "dark")
}

impl Behavior for LightSource {
    fn priority(&self) -> i32 {
        priority::LIGHT_SOURCE
    }

    fn name(&self) -> &'static str {
        "LightSource"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(300)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        let dark = room_is_dark(ctx);
        (dark && !self.holding_lantern) || (!dark && self.holding_lantern)
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        let dark = room_is_dark(ctx);

        if dark && !self.holding_lantern {
            // Two-step swap: free the held slot, then wear the lantern.
            self.step += 1;
            if self.step == 1 {
                info!(bot = bot.bot_id, "dark room, equipping lantern");
                bot.send_command("remove held");
                return TickResult::Continue;
            }
            bot.send_command("wear lantern");
            self.holding_lantern = true;
            self.step = 0;
            return TickResult::Completed;
        }

        if !dark && self.holding_lantern {
            self.step += 1;
            if self.step == 1 {
                info!(bot = bot.bot_id, "back in the light, stowing lantern");
                bot.send_command("remove lantern");
                return TickResult::Continue;
            }
            bot.send_command("put lantern bag");
            self.holding_lantern = false;
            self.step = 0;
            return TickResult::Completed;
        }

        TickResult::Completed
    }

    fn stop(&mut self) {
        self.step = 0;
    }
}

// ── Heal ──────────────────────────────────────────────────────────────────

/// Rest (or sleep when badly hurt) until vitals recover.
pub struct Heal {
    rest_hp_percent: f64,
    rest_mana_percent: f64,
    rest_move_percent: f64,
    /// Below this, sleep instead of rest for faster regen.
    deep_rest_hp_percent: f64,
    resting: bool,
    sleeping: bool,
}

impl Heal {
    pub fn new(rest_hp_percent: f64, rest_mana_percent: f64, rest_move_percent: f64) -> Self {
        Self {
            rest_hp_percent,
            rest_mana_percent,
            rest_move_percent,
            deep_rest_hp_percent: 30.0,
            resting: false,
            sleeping: false,
        }
    }
}

impl Default for Heal {
    fn default() -> Self {
        Self::new(
            DEFAULT_REST_HP_PERCENT,
            DEFAULT_REST_MANA_PERCENT,
            DEFAULT_REST_MOVE_PERCENT,
        )
    }
}

impl Behavior for Heal {
    fn priority(&self) -> i32 {
        priority::HEAL
    }

    fn name(&self) -> &'static str {
        "Heal"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_secs(2)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        if ctx.in_combat {
            return false;
        }
        ctx.hp_percent() < self.rest_hp_percent
            || ctx.mana_percent() < self.rest_mana_percent
            || ctx.move_percent() < self.rest_move_percent
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        // Combat interrupts resting: get up and hand control back.
        if ctx.in_combat {
            if self.resting || self.sleeping {
                bot.send_command("wake");
                bot.send_command("stand");
            }
            self.resting = false;
            self.sleeping = false;
            return TickResult::Failed;
        }

        let recovered = ctx.hp_percent() >= 99.0
            && ctx.mana_percent() >= 99.0
            && ctx.move_percent() >= 99.0;
        if recovered {
            if self.resting || self.sleeping {
                bot.send_command("wake");
                bot.send_command("stand");
            }
            info!(bot = bot.bot_id, "fully recovered");
            self.resting = false;
            self.sleeping = false;
            return TickResult::Completed;
        }

        if !self.resting && !self.sleeping {
            if ctx.hp_percent() < self.deep_rest_hp_percent {
                bot.send_command("sleep");
                self.sleeping = true;
            } else {
                bot.send_command("rest");
                self.resting = true;
            }
        }
        TickResult::Continue
    }

    fn stop(&mut self) {
        self.resting = false;
        self.sleeping = false;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
