//! Fallback behavior: occasional diagnostics while nothing else wants
//! control, so the session keeps generating traffic.

use std::time::Duration;

use rand::seq::SliceRandom;

use super::{priority, Behavior, BotCtl, Context, TickResult};

const IDLE_ACTIONS: &[&str] = &["look", "score", "inventory"];

pub struct Idle {
    tick_count: u64,
}

impl Idle {
    pub fn new() -> Self {
        Self { tick_count: 0 }
    }
}

impl Default for Idle {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for Idle {
    fn priority(&self) -> i32 {
        priority::IDLE
    }

    fn name(&self) -> &'static str {
        "Idle"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_secs(3)
    }

    fn can_start(&self, _ctx: &Context) -> bool {
        true
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, _ctx: &Context) -> TickResult {
        self.tick_count += 1;
        if self.tick_count % 3 == 0 {
            if let Some(action) = IDLE_ACTIONS.choose(&mut rand::thread_rng()) {
                bot.send_command(*action);
            }
        }
        TickResult::Waiting
    }
}
