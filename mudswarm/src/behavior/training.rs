//! Startup errands: the hard reset, stat training, and skill practice.
//! All three are one-shot — once completed they never re-arm.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{priority, Behavior, BotCtl, Context, TickResult, CRITICAL_MOVE_PERCENT};
use crate::rooms::{Route, PRACTICE_ROOM, ROUTE_TO_PRACTICE_ROOM, ROUTE_TO_TRAIN_ROOM,
    SCHOOL_ENTRANCE, TRAIN_ROOM};

// ── BotReset ──────────────────────────────────────────────────────────────

/// How many ticks to wait for the reset teleport before carrying on anyway.
const RESET_WAIT_TICKS: u32 = 20;

/// Sends the server-side character reset once at startup and waits until
/// the teleport back to the school entrance shows up in the room vnum.
pub struct BotReset {
    reset_sent: bool,
    wait_ticks: u32,
    done: bool,
}

impl BotReset {
    pub fn new() -> Self {
        Self {
            reset_sent: false,
            wait_ticks: 0,
            done: false,
        }
    }
}

impl Default for BotReset {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for BotReset {
    fn priority(&self) -> i32 {
        priority::BOT_RESET
    }

    fn name(&self) -> &'static str {
        "BotReset"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        !self.done && !ctx.in_combat
    }

    fn start(&mut self, bot: &mut BotCtl<'_>, _ctx: &Context) {
        // Fresh character, fresh appetite tracking.
        bot.reset_needs = true;
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if ctx.in_combat {
            return TickResult::Waiting;
        }

        if !self.reset_sent {
            info!(bot = bot.bot_id, "requesting hard character reset");
            bot.send_command("botreset hard");
            self.reset_sent = true;
            self.wait_ticks = 0;
            return TickResult::Continue;
        }

        if ctx.room_vnum == SCHOOL_ENTRANCE {
            info!(bot = bot.bot_id, "reset landed at the school entrance");
            self.done = true;
            bot.send_command("look");
            return TickResult::Completed;
        }

        self.wait_ticks += 1;
        if self.wait_ticks >= RESET_WAIT_TICKS {
            warn!(
                bot = bot.bot_id,
                room = ctx.room_vnum,
                "reset teleport never observed, carrying on"
            );
            self.done = true;
            return TickResult::Completed;
        }
        TickResult::Waiting
    }
}

// ── Train ─────────────────────────────────────────────────────────────────

const DEFAULT_TRAIN_STATS: &[&str] = &["con", "str", "dex", "wis", "int"];
const TRAINS_PER_STAT: u32 = 5;

/// Walk to the trainer and spend sessions across the stat list, batched in
/// a single tick (the command throttle paces them on the wire).
pub struct Train {
    stats: Vec<String>,
    route: Route,
    trains_per_stat: u32,
    navigating: bool,
    done: bool,
}

impl Train {
    pub fn new(route: Route) -> Self {
        Self {
            stats: DEFAULT_TRAIN_STATS.iter().map(|s| (*s).to_owned()).collect(),
            route,
            trains_per_stat: TRAINS_PER_STAT,
            navigating: true,
            done: false,
        }
    }
}

impl Default for Train {
    fn default() -> Self {
        Self::new(ROUTE_TO_TRAIN_ROOM)
    }
}

impl Behavior for Train {
    fn priority(&self) -> i32 {
        priority::TRAIN
    }

    fn name(&self) -> &'static str {
        "Train"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        !self.done
            && !ctx.in_combat
            && ctx.move_percent() >= CRITICAL_MOVE_PERCENT
            && ctx.position.can_move()
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if ctx.in_combat {
            return TickResult::Waiting;
        }

        if self.navigating {
            if ctx.room_vnum == TRAIN_ROOM {
                info!(bot = bot.bot_id, "at the trainer");
                self.navigating = false;
                return TickResult::Continue;
            }
            if !ctx.position.can_move() {
                bot.send_command("wake");
                bot.send_command("stand");
                return TickResult::Continue;
            }
            match self.route.step(ctx.room_vnum) {
                Some(direction) => {
                    debug!(bot = bot.bot_id, room = ctx.room_vnum, direction, "toward trainer");
                    bot.send_command(direction);
                }
                None => {
                    warn!(bot = bot.bot_id, room = ctx.room_vnum, "off route to trainer");
                    bot.send_command("recall");
                }
            }
            return TickResult::Continue;
        }

        let mut sent = 0u32;
        for stat in &self.stats {
            for _ in 0..self.trains_per_stat {
                bot.send_command(format!("train {stat}"));
                sent += 1;
            }
        }
        info!(bot = bot.bot_id, commands = sent, "training done");
        self.done = true;
        TickResult::Completed
    }
}

// ── Practice ──────────────────────────────────────────────────────────────

const DEFAULT_PRACTICE_SKILLS: &[&str] =
    &["sword", "dagger", "shield block", "dodge", "parry", "second attack"];
const PRACTICES_PER_SKILL: u32 = 5;

/// Walk to the practice hall, reset practice points once, then spread them
/// across the skill list.
pub struct Practice {
    skills: Vec<String>,
    route: Route,
    practices_per_skill: u32,
    reset_first: bool,
    navigating: bool,
    reset_sent: bool,
    done: bool,
}

impl Practice {
    pub fn new(route: Route, reset_first: bool) -> Self {
        Self {
            skills: DEFAULT_PRACTICE_SKILLS.iter().map(|s| (*s).to_owned()).collect(),
            route,
            practices_per_skill: PRACTICES_PER_SKILL,
            reset_first,
            navigating: true,
            reset_sent: false,
            done: false,
        }
    }
}

impl Default for Practice {
    fn default() -> Self {
        Self::new(ROUTE_TO_PRACTICE_ROOM, true)
    }
}

impl Behavior for Practice {
    fn priority(&self) -> i32 {
        priority::PRACTICE
    }

    fn name(&self) -> &'static str {
        "Practice"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        !self.done
            && !ctx.in_combat
            && ctx.move_percent() >= CRITICAL_MOVE_PERCENT
            && ctx.position.can_move()
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if ctx.in_combat {
            return TickResult::Waiting;
        }

        if self.navigating {
            if ctx.room_vnum == PRACTICE_ROOM {
                info!(bot = bot.bot_id, "at the practice hall");
                self.navigating = false;
                return TickResult::Continue;
            }
            if !ctx.position.can_move() {
                bot.send_command("wake");
                bot.send_command("stand");
                return TickResult::Continue;
            }
            match self.route.step(ctx.room_vnum) {
                Some(direction) => {
                    debug!(bot = bot.bot_id, room = ctx.room_vnum, direction, "toward practice");
                    bot.send_command(direction);
                }
                None => {
                    warn!(bot = bot.bot_id, room = ctx.room_vnum, "off route to practice");
                    bot.send_command("recall");
                }
            }
            return TickResult::Continue;
        }

        if self.reset_first && !self.reset_sent {
            bot.send_command("practice reset");
            self.reset_sent = true;
            return TickResult::Continue;
        }

        let mut sent = 0u32;
        for skill in &self.skills {
            for _ in 0..self.practices_per_skill {
                bot.send_command(format!("practice {skill}"));
                sent += 1;
            }
        }
        info!(bot = bot.bot_id, commands = sent, "practice done");
        self.done = true;
        TickResult::Completed
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::test_support::{ctx, with_ctl};

    // ── BotReset ──────────────────────────────────────────────────────────

    #[test]
    fn reset_sends_command_then_waits_for_teleport() {
        let mut b = BotReset::new();
        let mut c = ctx();
        c.room_vnum = 3712;

        let ((), _, _) = with_ctl(|ctl| {
            b.start(ctl, &c);
            assert!(ctl.reset_needs);
        });

        let (r, commands, _) = with_ctl(|ctl| b.tick(ctl, &c));
        assert_eq!(r, TickResult::Continue);
        assert_eq!(commands, vec!["botreset hard"]);

        // Still in the old room: waiting.
        let (r, _, _) = with_ctl(|ctl| b.tick(ctl, &c));
        assert_eq!(r, TickResult::Waiting);

        // Teleport observed: done for good.
        c.room_vnum = SCHOOL_ENTRANCE;
        let (r, commands, _) = with_ctl(|ctl| b.tick(ctl, &c));
        assert_eq!(r, TickResult::Completed);
        assert_eq!(commands, vec!["look"]);
        assert!(!b.can_start(&c));
    }

    #[test]
    fn reset_gives_up_waiting_eventually() {
        let mut b = BotReset::new();
        let mut c = ctx();
        c.room_vnum = 3712;
        let _ = with_ctl(|ctl| b.tick(ctl, &c)); // sends the reset
        let mut last = TickResult::Waiting;
        for _ in 0..RESET_WAIT_TICKS {
            let (r, _, _) = with_ctl(|ctl| b.tick(ctl, &c));
            last = r;
        }
        assert_eq!(last, TickResult::Completed);
        assert!(!b.can_start(&c));
    }

    // ── Train ─────────────────────────────────────────────────────────────

    #[test]
    fn train_navigates_then_batches_commands() {
        let mut b = Train::default();
        let mut c = ctx();
        c.room_vnum = 3001;

        let (_, commands, _) = with_ctl(|ctl| b.tick(ctl, &c));
        assert_eq!(commands, vec!["up"]);

        c.room_vnum = TRAIN_ROOM;
        let (r, _, _) = with_ctl(|ctl| b.tick(ctl, &c)); // arrival
        assert_eq!(r, TickResult::Continue);

        let (r, commands, _) = with_ctl(|ctl| b.tick(ctl, &c));
        assert_eq!(r, TickResult::Completed);
        assert_eq!(
            commands.len() as u32,
            TRAINS_PER_STAT * DEFAULT_TRAIN_STATS.len() as u32
        );
        assert_eq!(commands[0], "train con");
        assert!(!b.can_start(&c), "one-shot");
    }

    #[test]
    fn train_yields_when_exhausted() {
        let b = Train::default();
        let mut c = ctx();
        c.movement = 5; // below the critical line
        assert!(!b.can_start(&c));
    }

    // ── Practice ──────────────────────────────────────────────────────────

    #[test]
    fn practice_resets_then_practices() {
        let mut b = Practice::default();
        let mut c = ctx();
        c.room_vnum = PRACTICE_ROOM;

        let (r, _, _) = with_ctl(|ctl| b.tick(ctl, &c)); // arrival
        assert_eq!(r, TickResult::Continue);

        let (_, commands, _) = with_ctl(|ctl| b.tick(ctl, &c));
        assert_eq!(commands, vec!["practice reset"]);

        let (r, commands, _) = with_ctl(|ctl| b.tick(ctl, &c));
        assert_eq!(r, TickResult::Completed);
        assert_eq!(
            commands.len() as u32,
            PRACTICES_PER_SKILL * DEFAULT_PRACTICE_SKILLS.len() as u32
        );
        assert!(commands.iter().all(|c| c.starts_with("practice ")));
        assert!(!b.can_start(&c), "one-shot");
    }

    #[test]
    fn practice_without_reset() {
        let mut b = Practice::new(ROUTE_TO_PRACTICE_ROOM, false);
        let mut c = ctx();
        c.room_vnum = PRACTICE_ROOM;
        let _ = with_ctl(|ctl| b.tick(ctl, &c)); // arrival
        let (_, commands, _) = with_ctl(|ctl| b.tick(ctl, &c));
        assert!(commands[0].starts_with("practice "));
        assert_ne!(commands[0], "practice reset");
    }
}
