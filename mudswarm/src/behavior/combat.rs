//! Combat behaviors: keeping a fight going and picking new fights.

use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{error, info};

use super::{priority, Behavior, BotCtl, Context, TickResult, MIN_ATTACK_HP_PERCENT};
use crate::text::BotMob;

// ── Combat ────────────────────────────────────────────────────────────────

/// Keeps an ongoing fight alive: auto-attack does the work, with an
/// occasional skill thrown in.
pub struct Combat {
    skills: Vec<String>,
}

impl Combat {
    pub fn new(skills: Vec<String>) -> Self {
        Self { skills }
    }
}

impl Default for Combat {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Behavior for Combat {
    fn priority(&self) -> i32 {
        priority::COMBAT
    }

    fn name(&self) -> &'static str {
        "Combat"
    }

    fn tick_delay(&self) -> Duration {
        // Matches the server's combat round pacing.
        Duration::from_secs(1)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        ctx.in_combat
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        let died = ctx.position.is_dead()
            || (ctx.position.is_stunned_or_worse() && ctx.hp_percent() <= 0.0);
        if died {
            error!(bot = bot.bot_id, "lost the fight");
            bot.record_death();
            return TickResult::Failed;
        }

        if !ctx.in_combat {
            info!(bot = bot.bot_id, "victory");
            // Refresh the room so stale mob records don't trigger re-attacks.
            bot.send_command("look");
            return TickResult::Completed;
        }

        if !self.skills.is_empty() && rand::thread_rng().gen_bool(0.3) {
            if let Some(skill) = self.skills.choose(&mut rand::thread_rng()) {
                bot.send_command(skill.clone());
            }
        }
        TickResult::Waiting
    }
}

// ── Attack ────────────────────────────────────────────────────────────────

/// Mob names we never attack, whatever the whitelist says.
const AVOID_KEYWORDS: &[&str] = &[
    "guard",
    "cityguard",
    "hassan",
    "acolyte",
    "adept",
    "shopkeeper",
    "healer",
    "receptionist",
];

/// Mob flags that mark service mobs. Aggressive mobs are fair game.
const AVOID_FLAGS: &[&str] = &["pet", "train", "practice", "healer", "changer", "skill_train"];

const ATTACK_COOLDOWN: Duration = Duration::from_secs(2);

/// Picks a target and opens a fight, then backs off while the server
/// reports combat state.
pub struct Attack {
    /// Optional whitelist of name keywords; empty attacks anything eligible.
    targets: Vec<String>,
    max_level_diff: i32,
    cooldown_until: Option<Instant>,
}

impl Attack {
    pub fn new(targets: Vec<String>, max_level_diff: i32) -> Self {
        Self {
            targets,
            max_level_diff,
            cooldown_until: None,
        }
    }

    fn on_cooldown(&self) -> bool {
        self.cooldown_until.is_some_and(|t| Instant::now() < t)
    }

    fn can_attack_mob(&self, mob: &BotMob, player_level: i32) -> bool {
        if player_level > 0 && mob.level > player_level + self.max_level_diff {
            return false;
        }
        if mob.flags.iter().any(|f| AVOID_FLAGS.contains(&f.as_str())) {
            return false;
        }
        let name = mob.name.to_lowercase();
        if AVOID_KEYWORDS.iter().any(|k| name.contains(k)) {
            return false;
        }
        if !self.targets.is_empty() {
            return self.targets.iter().any(|t| name.contains(&t.to_lowercase()));
        }
        true
    }

    fn can_attack_text(&self, description: &str) -> bool {
        let lower = description.to_lowercase();
        if AVOID_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return false;
        }
        if !self.targets.is_empty() {
            return self.targets.iter().any(|t| lower.contains(&t.to_lowercase()));
        }
        true
    }
}

impl Default for Attack {
    fn default() -> Self {
        Self::new(Vec::new(), 5)
    }
}

/// First usable keyword from a mob description: ANSI and parenthetical
/// prefixes stripped, filler words skipped.
fn target_keyword(description: &str) -> String {
    const SKIP: &[&str] = &[
        "a", "an", "the", "is", "are", "here", "there", "to", "in", "on", "at", "for", "and",
        "but", "or", "of", "leashed", "resting", "sleeping", "standing", "sitting", "waiting",
        "watching", "looking",
    ];

    let clean = crate::text::strip_ansi(description);
    // Drop parenthetical aura prefixes like "(White Aura)".
    let mut stripped = String::with_capacity(clean.len());
    let mut depth = 0u32;
    for ch in clean.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(ch),
            _ => {}
        }
    }

    let lower = stripped.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    for word in &words {
        let w = word.trim_matches(|c: char| c.is_ascii_punctuation());
        if !w.is_empty() && !SKIP.contains(&w) {
            return w.to_owned();
        }
    }
    words.last().map(|w| (*w).to_owned()).unwrap_or_else(|| "mob".to_owned())
}

impl Behavior for Attack {
    fn priority(&self) -> i32 {
        priority::ATTACK
    }

    fn name(&self) -> &'static str {
        "Attack"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        if self.on_cooldown() || ctx.in_combat {
            return false;
        }
        if !ctx.position.can_fight() {
            return false;
        }
        if ctx.hp_percent() < MIN_ATTACK_HP_PERCENT {
            return false;
        }

        if ctx.bot_mode {
            if ctx.bot_mobs.is_empty() {
                // Structured mode with no records yet: the `look` that
                // repopulates them is still in flight. Text would be stale.
                return false;
            }
            return ctx
                .bot_mobs
                .iter()
                .any(|m| self.can_attack_mob(m, ctx.level));
        }
        ctx.room_mobs.iter().any(|m| self.can_attack_text(m))
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if ctx.in_combat {
            return TickResult::Completed;
        }

        if ctx.bot_mode {
            for mob in &ctx.bot_mobs {
                if self.can_attack_mob(mob, ctx.level) {
                    let keyword = target_keyword(&mob.name);
                    info!(
                        bot = bot.bot_id,
                        target = %mob.name,
                        level = mob.level,
                        hp = mob.hp_percent,
                        keyword,
                        "attacking"
                    );
                    bot.send_command(format!("kill {keyword}"));
                    self.cooldown_until = Some(Instant::now() + ATTACK_COOLDOWN);
                    return TickResult::Completed;
                }
            }
        } else {
            for description in &ctx.room_mobs {
                if self.can_attack_text(description) {
                    let keyword = target_keyword(description);
                    info!(bot = bot.bot_id, target = %description, keyword, "attacking");
                    bot.send_command(format!("kill {keyword}"));
                    self.cooldown_until = Some(Instant::now() + ATTACK_COOLDOWN);
                    return TickResult::Completed;
                }
            }
        }
        TickResult::Failed
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
