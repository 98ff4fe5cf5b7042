//! Inventory behaviors: corpse looting with equipment upgrades, and the
//! supply run to the shop.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use super::{priority, Behavior, BotCtl, Context, TickResult, MIN_SHOPPING_MONEY};
use crate::rooms::{
    cage_exit_direction, CAGE_ROOMS, CENTRAL_ROOM, CORRIDOR_ROOM, INTERMEDIATE_ROOM, SHOP_ROOM,
};

// ── Loot ──────────────────────────────────────────────────────────────────

static LOOTED_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)You get (.+?) from (?:the )?corpse").expect("hard-coded regex")
});

/// Item keywords pulled out of "You get X from the corpse" lines. Coins and
/// parenthesised money drops are skipped; the last word of the item name is
/// the keyword the server will match.
fn parse_looted_items(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    for caps in LOOTED_ITEM_RE.captures_iter(text) {
        let name = caps[1].trim();
        let lower = name.to_lowercase();
        if lower.contains("gold") || lower.contains("coin") {
            continue;
        }
        if name.starts_with('(') && name.ends_with(')') {
            continue;
        }
        if let Some(word) = name.split_whitespace().last() {
            let keyword = word.trim_end_matches('.');
            if !matches!(keyword, "a" | "an" | "the" | "some") && !keyword.is_empty() {
                items.push(keyword.to_owned());
            }
        }
    }
    items
}

/// What `compare` told us to do with a looted item.
#[derive(Debug, PartialEq, Eq)]
enum CompareVerdict {
    Wear,
    Drop,
    Keep,
    Unknown,
}

fn parse_compare_result(text: &str) -> CompareVerdict {
    if text.contains("aren't wearing anything comparable") {
        return CompareVerdict::Wear;
    }
    if text.contains("looks better than") {
        return CompareVerdict::Wear;
    }
    if text.contains("looks worse than") {
        return CompareVerdict::Drop;
    }
    if text.contains("look about the same") || text.contains("can't compare") {
        return CompareVerdict::Keep;
    }
    CompareVerdict::Unknown
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LootState {
    Loot,
    WaitLoot,
    Compare,
    WaitCompare,
    Sacrifice,
    Done,
}

const LOOT_COOLDOWN: Duration = Duration::from_secs(5);

/// Empty a corpse, upgrade equipment piece by piece via `compare`, then
/// sacrifice the remains.
pub struct Loot {
    state: LootState,
    items: Vec<String>,
    item_index: usize,
    wait_ticks: u32,
    cooldown_until: Option<Instant>,
}

impl Loot {
    pub fn new() -> Self {
        Self {
            state: LootState::Loot,
            items: Vec::new(),
            item_index: 0,
            wait_ticks: 0,
            cooldown_until: None,
        }
    }
}

impl Default for Loot {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for Loot {
    fn priority(&self) -> i32 {
        priority::LOOT
    }

    fn name(&self) -> &'static str {
        "Loot"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        if self.cooldown_until.is_some_and(|t| Instant::now() < t) {
            return false;
        }
        !ctx.in_combat && ctx.has_corpse
    }

    fn start(&mut self, bot: &mut BotCtl<'_>, _ctx: &Context) {
        self.state = LootState::Loot;
        self.items.clear();
        self.item_index = 0;
        self.wait_ticks = 0;
        info!(bot = bot.bot_id, "looting corpse");
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        match self.state {
            LootState::Loot => {
                bot.send_command("get all corpse");
                self.state = LootState::WaitLoot;
                self.wait_ticks = 0;
                TickResult::Continue
            }
            LootState::WaitLoot => {
                self.wait_ticks += 1;
                if self.wait_ticks >= 2 {
                    self.items = parse_looted_items(&ctx.last_text);
                    if self.items.is_empty() {
                        self.state = LootState::Sacrifice;
                    } else {
                        info!(bot = bot.bot_id, items = ?self.items, "looted");
                        self.state = LootState::Compare;
                        self.item_index = 0;
                    }
                }
                TickResult::Continue
            }
            LootState::Compare => {
                if self.item_index >= self.items.len() {
                    self.state = LootState::Sacrifice;
                    return TickResult::Continue;
                }
                let item = &self.items[self.item_index];
                bot.send_command(format!("compare {item}"));
                self.state = LootState::WaitCompare;
                self.wait_ticks = 0;
                TickResult::Continue
            }
            LootState::WaitCompare => {
                self.wait_ticks += 1;
                if self.wait_ticks >= 2 {
                    let item = self.items[self.item_index].clone();
                    match parse_compare_result(&ctx.last_text) {
                        CompareVerdict::Wear => {
                            info!(bot = bot.bot_id, item, "equipping upgrade");
                            bot.send_command(format!("wear {item}"));
                        }
                        CompareVerdict::Drop => {
                            debug!(bot = bot.bot_id, item, "dropping downgrade");
                            bot.send_command(format!("drop {item}"));
                        }
                        CompareVerdict::Keep => {
                            debug!(bot = bot.bot_id, item, "keeping");
                        }
                        CompareVerdict::Unknown => {
                            // No readable verdict; wearing is the safe bet.
                            bot.send_command(format!("wear {item}"));
                        }
                    }
                    self.item_index += 1;
                    self.state = LootState::Compare;
                }
                TickResult::Continue
            }
            LootState::Sacrifice => {
                bot.send_command("sacrifice corpse");
                self.state = LootState::Done;
                TickResult::Continue
            }
            LootState::Done => {
                bot.send_command("look");
                // The loot/compare chatter is spent; drop it so the next
                // corpse parses fresh.
                bot.clear_text_buffer = true;
                self.cooldown_until = Some(Instant::now() + LOOT_COOLDOWN);
                info!(bot = bot.bot_id, "looting complete");
                TickResult::Completed
            }
        }
    }
}

// ── BuySupplies ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShopState {
    GoToShop,
    BuyFood,
    BuyDrink,
    BuyLantern,
    Eat,
    Drink,
    Return,
}

/// Walk to the shop for food, water, and a lantern; eat/drink when the trip
/// was triggered by hunger or thirst; return to the cage area (or, after a
/// proactive restock with a lantern, continue to the dark corridor).
pub struct BuySupplies {
    buy_lantern: bool,
    state: ShopState,
    wait_ticks: u32,
    bought_food: bool,
    bought_drink: bool,
    bought_lantern: bool,
    proactive: bool,
    active: bool,
}

impl BuySupplies {
    pub fn new(buy_lantern: bool) -> Self {
        Self {
            buy_lantern,
            state: ShopState::GoToShop,
            wait_ticks: 0,
            bought_food: false,
            bought_drink: false,
            bought_lantern: false,
            proactive: false,
            active: false,
        }
    }
}

impl Default for BuySupplies {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Behavior for BuySupplies {
    fn priority(&self) -> i32 {
        priority::BUY_SUPPLIES
    }

    fn name(&self) -> &'static str {
        "BuySupplies"
    }

    fn tick_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn can_start(&self, ctx: &Context) -> bool {
        if self.active {
            // Mid-errand: stay eligible so a preemption can hand control back.
            return true;
        }
        let reactive = ctx.is_hungry || ctx.is_thirsty;
        if !reactive && !ctx.should_proactive_shop {
            return false;
        }
        if ctx.money < MIN_SHOPPING_MONEY {
            return false;
        }
        if ctx.in_combat {
            return false;
        }
        // Only set out from home territory.
        ctx.room_vnum == CENTRAL_ROOM || CAGE_ROOMS.contains(&ctx.room_vnum)
    }

    fn start(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) {
        self.state = ShopState::GoToShop;
        self.wait_ticks = 0;
        self.bought_food = false;
        self.bought_drink = false;
        self.bought_lantern = false;
        self.proactive = ctx.should_proactive_shop && !ctx.is_hungry && !ctx.is_thirsty;
        self.active = true;
        // Consume the trigger so the next circuit re-arms it.
        bot.flags.should_proactive_shop = false;
        info!(
            bot = bot.bot_id,
            proactive = self.proactive,
            money = ctx.money,
            "heading to the shop"
        );
    }

    fn tick(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        let result = match self.state {
            ShopState::GoToShop => self.go_to_shop(bot, ctx),
            ShopState::BuyFood => self.buy_food(bot, ctx),
            ShopState::BuyDrink => self.buy_drink(bot, ctx),
            ShopState::BuyLantern => self.buy_lantern_step(bot, ctx),
            ShopState::Eat => self.eat(bot),
            ShopState::Drink => self.drink(bot),
            ShopState::Return => self.return_home(bot, ctx),
        };
        if matches!(result, TickResult::Completed | TickResult::Failed) {
            self.active = false;
        }
        result
    }

    fn stop(&mut self) {
        // A preempted errand restarts from the walk on its next start().
    }
}

impl BuySupplies {
    fn go_to_shop(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if ctx.room_vnum == SHOP_ROOM {
            self.state = if self.proactive || ctx.is_hungry {
                ShopState::BuyFood
            } else if ctx.is_thirsty {
                ShopState::BuyDrink
            } else {
                ShopState::Return
            };
            return TickResult::Continue;
        }

        if let Some(dir) = cage_exit_direction(ctx.room_vnum) {
            bot.send_command(dir);
        } else if ctx.room_vnum == CENTRAL_ROOM {
            bot.send_command("down");
        } else if ctx.room_vnum == INTERMEDIATE_ROOM {
            bot.send_command("south");
        } else {
            warn!(bot = bot.bot_id, room = ctx.room_vnum, "lost on the way to the shop");
            bot.send_command("recall");
            return TickResult::Failed;
        }
        TickResult::Continue
    }

    fn buy_food(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        if !self.bought_food {
            bot.send_command("buy soup");
            self.bought_food = true;
            self.wait_ticks = 0;
            return TickResult::Continue;
        }
        self.wait_ticks += 1;
        if self.wait_ticks >= 2 {
            self.state = if self.proactive || ctx.is_thirsty {
                ShopState::BuyDrink
            } else {
                ShopState::Eat
            };
        }
        TickResult::Continue
    }

    fn buy_drink(&mut self, bot: &mut BotCtl<'_>, _ctx: &Context) -> TickResult {
        if !self.bought_drink {
            bot.send_command("buy skin");
            self.bought_drink = true;
            self.wait_ticks = 0;
            return TickResult::Continue;
        }
        self.wait_ticks += 1;
        if self.wait_ticks >= 2 {
            self.state = if self.buy_lantern && !self.bought_lantern {
                ShopState::BuyLantern
            } else if self.bought_food && !self.proactive {
                ShopState::Eat
            } else if !self.proactive {
                ShopState::Drink
            } else {
                ShopState::Return
            };
        }
        TickResult::Continue
    }

    fn buy_lantern_step(&mut self, bot: &mut BotCtl<'_>, _ctx: &Context) -> TickResult {
        if !self.bought_lantern {
            bot.send_command("buy lantern");
            bot.send_command("wear lantern");
            self.bought_lantern = true;
            self.wait_ticks = 0;
            info!(bot = bot.bot_id, "bought a lantern for the dark rooms");
            return TickResult::Continue;
        }
        self.wait_ticks += 1;
        if self.wait_ticks >= 2 {
            self.state = if self.bought_food && !self.proactive {
                ShopState::Eat
            } else if self.bought_drink && !self.proactive {
                ShopState::Drink
            } else {
                ShopState::Return
            };
        }
        TickResult::Continue
    }

    fn eat(&mut self, bot: &mut BotCtl<'_>) -> TickResult {
        bot.send_command("eat soup");
        self.state = if self.bought_drink && !self.proactive {
            ShopState::Drink
        } else {
            ShopState::Return
        };
        TickResult::Continue
    }

    fn drink(&mut self, bot: &mut BotCtl<'_>) -> TickResult {
        bot.send_command("drink skin");
        self.wait_ticks += 1;
        if self.wait_ticks >= 3 {
            self.state = ShopState::Return;
        }
        TickResult::Continue
    }

    fn return_home(&mut self, bot: &mut BotCtl<'_>, ctx: &Context) -> TickResult {
        // After a proactive restock with a lantern in hand, push on to the
        // corridor and arm the dark-room errand instead of going home.
        if self.proactive && self.bought_lantern {
            if ctx.room_vnum == CORRIDOR_ROOM {
                info!(bot = bot.bot_id, "restocked; corridor reached, dark room next");
                bot.flags.should_fight_dark_creature = true;
                return TickResult::Completed;
            }
            match ctx.room_vnum {
                SHOP_ROOM => bot.send_command("north"),
                INTERMEDIATE_ROOM => {
                    // The corridor door may have swung shut.
                    bot.send_command("open east");
                    bot.send_command("east");
                }
                _ => bot.send_command("recall"),
            }
            return TickResult::Continue;
        }

        if ctx.room_vnum == CENTRAL_ROOM || CAGE_ROOMS.contains(&ctx.room_vnum) {
            info!(bot = bot.bot_id, room = ctx.room_vnum, "shopping done, back home");
            return TickResult::Completed;
        }
        match ctx.room_vnum {
            SHOP_ROOM => bot.send_command("north"),
            INTERMEDIATE_ROOM => bot.send_command("up"),
            _ => bot.send_command("recall"),
        }
        TickResult::Continue
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
