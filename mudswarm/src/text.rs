//! Game-text parsing: prompts, exits, combat lines, kills, XP, and the
//! structured `[BOT:…]` records some servers emit for flagged sessions.
//!
//! Everything here operates on ANSI-stripped UTF-8 and is stateless — parse
//! functions return data, they never mutate game state. Callers own the
//! lifecycle of whatever snapshots they build from the results.

use std::sync::LazyLock;

use regex::Regex;

// ── ANSI ──────────────────────────────────────────────────────────────────

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("hard-coded regex"));

/// Remove ANSI escape sequences (`ESC [ <digits and ;>* <letter>`).
///
/// Idempotent: stripping twice yields the same string.
pub fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

// ── Prompts ───────────────────────────────────────────────────────────────

/// Vitals parsed out of a prompt. Max fields are zero for the short prompt
/// form that only reports current values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptInfo {
    pub hp: i32,
    pub hp_max: i32,
    pub mana: i32,
    pub mana_max: i32,
    pub moves: i32,
    pub moves_max: i32,
}

static PROMPT_FULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(\d+)/(\d+)hp (\d+)/(\d+)m (\d+)/(\d+)mv>").expect("hard-coded regex")
});
static PROMPT_SIMPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(\d+)hp (\d+)m (\d+)mv>").expect("hard-coded regex"));
static PROMPT_BRACKET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d+)(?:/(\d+))?hp (\d+)(?:/(\d+))?m (\d+)(?:/(\d+))?mv\]")
        .expect("hard-coded regex")
});

fn cap_i32(caps: &regex::Captures<'_>, i: usize) -> i32 {
    caps.get(i)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Parse the last recognisable prompt in `text`, if any.
pub fn parse_prompt(text: &str) -> Option<PromptInfo> {
    if let Some(caps) = PROMPT_FULL.captures_iter(text).last() {
        return Some(PromptInfo {
            hp: cap_i32(&caps, 1),
            hp_max: cap_i32(&caps, 2),
            mana: cap_i32(&caps, 3),
            mana_max: cap_i32(&caps, 4),
            moves: cap_i32(&caps, 5),
            moves_max: cap_i32(&caps, 6),
        });
    }
    if let Some(caps) = PROMPT_BRACKET.captures_iter(text).last() {
        return Some(PromptInfo {
            hp: cap_i32(&caps, 1),
            hp_max: cap_i32(&caps, 2),
            mana: cap_i32(&caps, 3),
            mana_max: cap_i32(&caps, 4),
            moves: cap_i32(&caps, 5),
            moves_max: cap_i32(&caps, 6),
        });
    }
    if let Some(caps) = PROMPT_SIMPLE.captures_iter(text).last() {
        return Some(PromptInfo {
            hp: cap_i32(&caps, 1),
            mana: cap_i32(&caps, 2),
            moves: cap_i32(&caps, 3),
            ..PromptInfo::default()
        });
    }
    None
}

/// Whether `text` contains any recognised prompt shape.
pub fn has_prompt(text: &str) -> bool {
    PROMPT_FULL.is_match(text) || PROMPT_BRACKET.is_match(text) || PROMPT_SIMPLE.is_match(text)
}

// ── Directions & exits ────────────────────────────────────────────────────

/// Normalize a direction token to its full name, or `None` for non-directions.
pub fn normalize_direction(token: &str) -> Option<&'static str> {
    match token.trim_matches(|c: char| !c.is_ascii_alphabetic()) {
        "n" | "north" | "N" | "North" => Some("north"),
        "s" | "south" | "S" | "South" => Some("south"),
        "e" | "east" | "E" | "East" => Some("east"),
        "w" | "west" | "W" | "West" => Some("west"),
        "u" | "up" | "U" | "Up" => Some("up"),
        "d" | "down" | "D" | "Down" => Some("down"),
        _ => None,
    }
}

static EXITS_BRACKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[Exits:([^\]]*)\]").expect("hard-coded regex"));
static EXITS_OBVIOUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^Obvious exits:\s*(.*)$").expect("hard-coded regex"));

/// Extract exit directions from `[Exits: …]` or `Obvious exits: …` output.
///
/// Returns `None` when no exit line is present; an explicit `none` yields
/// `Some(vec![])`.
pub fn parse_exits(text: &str) -> Option<Vec<String>> {
    let raw = EXITS_BRACKET
        .captures(text)
        .or_else(|| EXITS_OBVIOUS.captures(text))?
        .get(1)?
        .as_str()
        .trim()
        .to_owned();

    if raw.eq_ignore_ascii_case("none") {
        return Some(Vec::new());
    }
    Some(
        raw.split_whitespace()
            .filter_map(normalize_direction)
            .map(str::to_owned)
            .collect(),
    )
}

// ── Combat ────────────────────────────────────────────────────────────────

/// Damage severity ladder, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DamageTier {
    Miss,
    Scratch,
    Light,
    Moderate,
    Heavy,
    Devastating,
    Lethal,
}

/// Map a damage verb (singular or third-person) to its tier.
pub fn damage_tier(verb: &str) -> Option<DamageTier> {
    let v = verb.trim_end_matches(|c: char| c.is_ascii_punctuation());
    Some(match v {
        "miss" | "misses" => DamageTier::Miss,
        "scratch" | "scratches" | "graze" | "grazes" => DamageTier::Scratch,
        "hit" | "hits" => DamageTier::Light,
        "injure" | "injures" | "wound" | "wounds" => DamageTier::Moderate,
        "maul" | "mauls" | "decimate" | "decimates" => DamageTier::Heavy,
        "devastate" | "devastates" => DamageTier::Devastating,
        "maim" | "maims" | "mutilate" | "mutilates" | "eviscerate" | "eviscerates"
        | "dismember" | "dismembers" => DamageTier::Lethal,
        _ => return None,
    })
}

/// One attack line from the combat log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatHit {
    pub attacker: String,
    pub target: String,
    pub verb: String,
    pub tier: DamageTier,
    /// `true` for "Your …" lines, `false` for "<mob>'s … you" lines.
    pub is_player_attack: bool,
}

/// Parse a single combat line, e.g.
/// `Your slash devastates a wimpy monster!` or
/// `The monster's claw scratches you.`
pub fn parse_combat_hit(line: &str) -> Option<CombatHit> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("Your ") {
        // Find the first known damage verb; everything before it is the
        // attack name, everything after is the target.
        let words: Vec<&str> = rest.split_whitespace().collect();
        for (i, word) in words.iter().enumerate() {
            if let Some(tier) = damage_tier(word) {
                let attacker = words[..i].join(" ");
                let target = words[i + 1..]
                    .join(" ")
                    .trim_end_matches(['.', '!'])
                    .to_owned();
                return Some(CombatHit {
                    attacker,
                    target,
                    verb: word.trim_end_matches(['.', '!']).to_owned(),
                    tier,
                    is_player_attack: true,
                });
            }
        }
        return None;
    }

    // "<attacker>'s <attack> <verb> you"
    if let Some(pos) = line.find("'s ") {
        let attacker = line[..pos].to_owned();
        let rest = &line[pos + 3..];
        let words: Vec<&str> = rest.split_whitespace().collect();
        for (i, word) in words.iter().enumerate() {
            if let Some(tier) = damage_tier(word) {
                let target = words[i + 1..]
                    .join(" ")
                    .trim_end_matches(['.', '!'])
                    .to_owned();
                if target != "you" {
                    return None;
                }
                return Some(CombatHit {
                    attacker,
                    target,
                    verb: word.trim_end_matches(['.', '!']).to_owned(),
                    tier,
                    is_player_attack: false,
                });
            }
        }
    }
    None
}

static KILL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(.+?) is DEAD!").expect("hard-coded regex"));

/// Name of the victim in a `"<name> is DEAD!"` line, if present.
pub fn parse_kill(text: &str) -> Option<String> {
    Some(KILL_RE.captures(text)?.get(1)?.as_str().trim().to_owned())
}

static XP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"You (?:gain|receive) (\d+) (?:experience|exp)\b").expect("hard-coded regex")
});

/// Experience awarded by a `"You gain N experience"` line, if present.
pub fn parse_xp_gain(text: &str) -> Option<i64> {
    XP_RE.captures(text)?.get(1)?.as_str().parse().ok()
}

// ── Structured BOT records ────────────────────────────────────────────────

/// Room record from a `[BOT:ROOM|…]` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotRoom {
    pub vnum: i32,
    pub flags: Vec<String>,
    pub sector: String,
}

/// Exit record from a `[BOT:EXIT|…]` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotExit {
    pub direction: String,
    pub vnum: i32,
    pub flags: Vec<String>,
}

/// Mob record from a `[BOT:MOB|…]` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotMob {
    pub name: String,
    pub vnum: i32,
    pub level: i32,
    pub flags: Vec<String>,
    /// Health as an integer percent, 0–100.
    pub hp_percent: i32,
    pub alignment: i32,
}

/// Object record from a `[BOT:OBJ|…]` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotObject {
    pub name: String,
    pub vnum: i32,
    pub item_type: String,
    pub flags: Vec<String>,
    pub wear: Vec<String>,
}

impl BotObject {
    /// Corpse containers are identified by their item type or name.
    pub fn is_corpse(&self) -> bool {
        self.item_type.to_lowercase().contains("corpse")
            || self.name.to_lowercase().contains("corpse")
    }
}

/// One room's worth of structured records, replaced wholesale per `look`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotSnapshot {
    pub room: Option<BotRoom>,
    pub exits: Vec<BotExit>,
    pub mobs: Vec<BotMob>,
    pub objects: Vec<BotObject>,
}

impl BotSnapshot {
    pub fn is_empty(&self) -> bool {
        self.room.is_none() && self.exits.is_empty() && self.mobs.is_empty()
            && self.objects.is_empty()
    }

    pub fn has_corpse(&self) -> bool {
        self.objects.iter().any(BotObject::is_corpse)
    }
}

static BOT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[BOT:(\w+)\|([^\]]*)\]").expect("hard-coded regex"));

/// Whether `text` contains any structured record markers.
pub fn has_bot_data(text: &str) -> bool {
    text.contains("[BOT:")
}

fn parse_flag_list(value: &str) -> Vec<String> {
    if value == "(none)" || value.is_empty() {
        return Vec::new();
    }
    value.split_whitespace().map(str::to_owned).collect()
}

fn field<'a>(fields: &[(&'a str, &'a str)], key: &str) -> &'a str {
    fields
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or("")
}

fn field_i32(fields: &[(&str, &str)], key: &str) -> i32 {
    field(fields, key).trim().parse().unwrap_or(0)
}

/// Parse all `[BOT:…]` records in `text` into one snapshot.
pub fn parse_bot_data(text: &str) -> BotSnapshot {
    let mut snap = BotSnapshot::default();

    for caps in BOT_LINE_RE.captures_iter(text) {
        let tag = &caps[1];
        let fields: Vec<(&str, &str)> = caps
            .get(2)
            .map(|m| m.as_str())
            .unwrap_or("")
            .split('|')
            .filter_map(|kv| kv.split_once('='))
            .collect();

        match tag {
            "ROOM" => {
                snap.room = Some(BotRoom {
                    vnum: field_i32(&fields, "vnum"),
                    flags: parse_flag_list(field(&fields, "flags")),
                    sector: field(&fields, "sector").to_owned(),
                });
            }
            "EXIT" => {
                snap.exits.push(BotExit {
                    direction: field(&fields, "dir").to_owned(),
                    vnum: field_i32(&fields, "vnum"),
                    flags: parse_flag_list(field(&fields, "flags")),
                });
            }
            "MOB" => {
                let hp_raw = field(&fields, "hp");
                let hp = hp_raw
                    .trim_end_matches('%')
                    .trim()
                    .parse::<i32>()
                    .unwrap_or(100)
                    .clamp(0, 100);
                snap.mobs.push(BotMob {
                    name: field(&fields, "name").to_owned(),
                    vnum: field_i32(&fields, "vnum"),
                    level: field_i32(&fields, "level"),
                    flags: parse_flag_list(field(&fields, "flags")),
                    hp_percent: hp,
                    alignment: field_i32(&fields, "align"),
                });
            }
            "OBJ" => {
                snap.objects.push(BotObject {
                    name: field(&fields, "name").to_owned(),
                    vnum: field_i32(&fields, "vnum"),
                    item_type: field(&fields, "type").to_owned(),
                    flags: parse_flag_list(field(&fields, "flags")),
                    wear: parse_flag_list(field(&fields, "wear")),
                });
            }
            _ => {} // unknown tag — skip
        }
    }
    snap
}

fn flags_to_field(flags: &[String]) -> String {
    if flags.is_empty() {
        "(none)".to_owned()
    } else {
        flags.join(" ")
    }
}

impl BotRoom {
    pub fn to_line(&self) -> String {
        format!(
            "[BOT:ROOM|vnum={}|flags={}|sector={}]",
            self.vnum,
            flags_to_field(&self.flags),
            self.sector
        )
    }
}

impl BotExit {
    pub fn to_line(&self) -> String {
        format!(
            "[BOT:EXIT|dir={}|vnum={}|flags={}]",
            self.direction,
            self.vnum,
            flags_to_field(&self.flags)
        )
    }
}

impl BotMob {
    pub fn to_line(&self) -> String {
        format!(
            "[BOT:MOB|name={}|vnum={}|level={}|flags={}|hp={}%|align={}]",
            self.name,
            self.vnum,
            self.level,
            flags_to_field(&self.flags),
            self.hp_percent,
            self.alignment
        )
    }
}

impl BotObject {
    pub fn to_line(&self) -> String {
        format!(
            "[BOT:OBJ|name={}|vnum={}|type={}|flags={}|wear={}]",
            self.name,
            self.vnum,
            self.item_type,
            flags_to_field(&self.flags),
            flags_to_field(&self.wear)
        )
    }
}

// ── Heuristic room scanning (no BOT mode) ─────────────────────────────────

const MOB_INDICATORS: &[&str] = &[
    "is here",
    "are here",
    "stands here",
    "stand here",
    "leashed here",
    "resting here",
    "sleeping here",
];

/// Lines that look like mob descriptions in plain room text.
pub fn mob_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            let lower = line.to_lowercase();
            MOB_INDICATORS.iter().any(|ind| lower.contains(ind))
        })
        .map(str::to_owned)
        .collect()
}

/// Whether plain room text mentions a lootable corpse.
pub fn has_corpse_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("corpse of") || lower.contains("corpse is")
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── ANSI ──────────────────────────────────────────────────────────────

    #[test]
    fn strips_color_codes() {
        let s = "\x1b[1;31ma fierce monster\x1b[0m is here";
        assert_eq!(strip_ansi(s), "a fierce monster is here");
    }

    #[test]
    fn strip_is_idempotent() {
        let s = "\x1b[32mgreen\x1b[0m text";
        let once = strip_ansi(s);
        assert_eq!(strip_ansi(&once), once);
    }

    // ── prompts ───────────────────────────────────────────────────────────

    #[test]
    fn full_prompt_parses() {
        let p = parse_prompt("<100/120hp 30/30m 90/100mv> ").unwrap();
        assert_eq!(p.hp, 100);
        assert_eq!(p.hp_max, 120);
        assert_eq!(p.mana, 30);
        assert_eq!(p.moves_max, 100);
    }

    #[test]
    fn simple_prompt_parses() {
        let p = parse_prompt("<100hp 50m 200mv>").unwrap();
        assert_eq!(p.hp, 100);
        assert_eq!(p.hp_max, 0);
        assert_eq!(p.moves, 200);
    }

    #[test]
    fn bracket_prompt_parses() {
        let p = parse_prompt("[100/100hp 50/50m 200/200mv]").unwrap();
        assert_eq!(p.hp_max, 100);
        assert!(has_prompt("[100/100hp 50/50m 200/200mv]"));
    }

    #[test]
    fn no_prompt_in_plain_text() {
        assert!(parse_prompt("You see nothing special.").is_none());
        assert!(!has_prompt("just some words"));
    }

    // ── exits ─────────────────────────────────────────────────────────────

    #[test]
    fn bracket_exits() {
        let exits = parse_exits("[Exits: north east up]").unwrap();
        assert_eq!(exits, vec!["north", "east", "up"]);
    }

    #[test]
    fn obvious_exits_with_abbreviations() {
        let exits = parse_exits("Obvious exits: n s e w").unwrap();
        assert_eq!(exits, vec!["north", "south", "east", "west"]);
    }

    #[test]
    fn exits_none_is_empty() {
        assert_eq!(parse_exits("[Exits: none]").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn no_exit_line() {
        assert!(parse_exits("A dark cave.").is_none());
    }

    // ── combat ────────────────────────────────────────────────────────────

    #[test]
    fn tiers_are_ordered() {
        assert!(DamageTier::Miss < DamageTier::Scratch);
        assert!(DamageTier::Devastating < DamageTier::Lethal);
        assert_eq!(damage_tier("eviscerates"), Some(DamageTier::Lethal));
        assert_eq!(damage_tier("mauls"), Some(DamageTier::Heavy));
        assert_eq!(damage_tier("frobnicates"), None);
    }

    #[test]
    fn player_attack_line() {
        let hit = parse_combat_hit("Your slash devastates a wimpy monster!").unwrap();
        assert!(hit.is_player_attack);
        assert_eq!(hit.attacker, "slash");
        assert_eq!(hit.target, "a wimpy monster");
        assert_eq!(hit.tier, DamageTier::Devastating);
    }

    #[test]
    fn mob_attack_line() {
        let hit = parse_combat_hit("The monster's claw scratches you.").unwrap();
        assert!(!hit.is_player_attack);
        assert_eq!(hit.attacker, "The monster");
        assert_eq!(hit.tier, DamageTier::Scratch);
    }

    #[test]
    fn miss_line() {
        let hit = parse_combat_hit("Your punch misses a monster.").unwrap();
        assert_eq!(hit.tier, DamageTier::Miss);
    }

    #[test]
    fn non_combat_line() {
        assert!(parse_combat_hit("You feel refreshed.").is_none());
    }

    #[test]
    fn kill_line() {
        assert_eq!(
            parse_kill("A wimpy monster is DEAD!"),
            Some("A wimpy monster".to_owned())
        );
        assert!(parse_kill("A monster arrives.").is_none());
    }

    #[test]
    fn xp_gain_line() {
        assert_eq!(parse_xp_gain("You gain 125 experience points."), Some(125));
        assert_eq!(parse_xp_gain("You receive 40 exp for your kill."), Some(40));
        assert!(parse_xp_gain("You gain nothing.").is_none());
    }

    // ── BOT records ───────────────────────────────────────────────────────

    #[test]
    fn room_record() {
        let snap = parse_bot_data("[BOT:ROOM|vnum=3712|flags=(none)|sector=inside]");
        let room = snap.room.unwrap();
        assert_eq!(room.vnum, 3712);
        assert!(room.flags.is_empty());
        assert_eq!(room.sector, "inside");
    }

    #[test]
    fn room_record_with_flags() {
        let snap = parse_bot_data("[BOT:ROOM|vnum=3720|flags=dark no_recall|sector=inside]");
        let room = snap.room.unwrap();
        assert_eq!(room.flags, vec!["dark", "no_recall"]);
    }

    #[test]
    fn exit_records() {
        let text = "[BOT:EXIT|dir=north|vnum=3713|flags=(none)]\n\
                    [BOT:EXIT|dir=down|vnum=3717|flags=door]";
        let snap = parse_bot_data(text);
        assert_eq!(snap.exits.len(), 2);
        assert_eq!(snap.exits[0].direction, "north");
        assert_eq!(snap.exits[1].vnum, 3717);
        assert_eq!(snap.exits[1].flags, vec!["door"]);
    }

    #[test]
    fn mob_record_strips_hp_percent() {
        let snap =
            parse_bot_data("[BOT:MOB|name=a wimpy monster|vnum=3703|level=2|flags=wimpy|hp=87%|align=0]");
        let mob = &snap.mobs[0];
        assert_eq!(mob.name, "a wimpy monster");
        assert_eq!(mob.hp_percent, 87);
        assert_eq!(mob.flags, vec!["wimpy"]);
    }

    #[test]
    fn obj_record_and_corpse_detection() {
        let snap = parse_bot_data(
            "[BOT:OBJ|name=the corpse of a monster|vnum=10|type=npccorpse|flags=(none)|wear=(none)]",
        );
        assert!(snap.objects[0].is_corpse());
        assert!(snap.has_corpse());
    }

    #[test]
    fn full_look_replaces_everything() {
        let text = "[BOT:ROOM|vnum=3713|flags=(none)|sector=inside]\n\
                    [BOT:EXIT|dir=south|vnum=3712|flags=(none)]\n\
                    [BOT:MOB|name=a monster|vnum=3700|level=3|flags=(none)|hp=100%|align=0]\n\
                    [BOT:OBJ|name=a fountain|vnum=3714|type=fountain|flags=(none)|wear=(none)]";
        let snap = parse_bot_data(text);
        assert!(snap.room.is_some());
        assert_eq!(snap.exits.len(), 1);
        assert_eq!(snap.mobs.len(), 1);
        assert_eq!(snap.objects.len(), 1);
        assert!(!snap.is_empty());
        assert!(!snap.has_corpse());
    }

    #[test]
    fn record_round_trip() {
        let lines = [
            "[BOT:ROOM|vnum=3712|flags=(none)|sector=inside]",
            "[BOT:EXIT|dir=north|vnum=3713|flags=door closed]",
            "[BOT:MOB|name=a wimpy monster|vnum=3703|level=2|flags=wimpy|hp=87%|align=0]",
            "[BOT:OBJ|name=a pit|vnum=3010|type=container|flags=(none)|wear=take]",
        ];
        let snap = parse_bot_data(&lines.join("\n"));
        assert_eq!(snap.room.as_ref().unwrap().to_line(), lines[0]);
        assert_eq!(snap.exits[0].to_line(), lines[1]);
        assert_eq!(snap.mobs[0].to_line(), lines[2]);
        assert_eq!(snap.objects[0].to_line(), lines[3]);
    }

    #[test]
    fn bot_marker_detection() {
        assert!(has_bot_data("before [BOT:ROOM|vnum=1|flags=(none)|sector=x] after"));
        assert!(!has_bot_data("no structured data here"));
    }

    // ── heuristics ────────────────────────────────────────────────────────

    #[test]
    fn mob_indicator_lines() {
        let text = "The Cage\n\
                    A wimpy monster is leashed here.\n\
                    A guard stands here.\n\
                    The floor is dusty.";
        let mobs = mob_lines(text);
        assert_eq!(mobs.len(), 2);
        assert!(mobs[0].contains("leashed here"));
    }

    #[test]
    fn corpse_text_detection() {
        assert!(has_corpse_text("The corpse of a monster lies here."));
        assert!(!has_corpse_text("A monster is here."));
    }
}
