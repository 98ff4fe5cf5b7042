//! MSDP (MUD Server Data Protocol) decoder and typed state mirrors.
//!
//! MSDP subnegotiation payloads are a tag-coded key/value tree:
//!
//! ```text
//! variable := VAR <name> VAL <value>
//! value    := <byte run> | TABLE_OPEN (VAR name VAL value)* TABLE_CLOSE
//!                        | ARRAY_OPEN (VAL value)* ARRAY_CLOSE
//! ```
//!
//! Names and atomic values are UTF-8 byte runs terminated by the next code
//! byte; the code bytes themselves never appear inside them.
//!
//! [`MsdpDecoder`] keeps every variable it has ever seen in a generic store
//! and additionally mirrors the well-known names into [`CharacterStats`] and
//! [`RoomInfo`] so the rest of the client reads typed state instead of raw
//! strings. A value that fails the typed conversion is logged at debug and
//! left in the store untyped; it never aborts the decode.
//!
//! GMCP is the JSON sibling: `Package.Message[ <json>]`, handled by
//! [`decode_gmcp`].

use std::collections::HashMap;

use tracing::debug;

use crate::telnet::{build_subneg, opt};

// ── Wire codes ────────────────────────────────────────────────────────────

pub const MSDP_VAR: u8 = 1;
pub const MSDP_VAL: u8 = 2;
pub const MSDP_TABLE_OPEN: u8 = 3;
pub const MSDP_TABLE_CLOSE: u8 = 4;
pub const MSDP_ARRAY_OPEN: u8 = 5;
pub const MSDP_ARRAY_CLOSE: u8 = 6;

fn is_code(b: u8) -> bool {
    (MSDP_VAR..=MSDP_ARRAY_CLOSE).contains(&b)
}

// ── Value ─────────────────────────────────────────────────────────────────

/// A decoded MSDP value: an atom, a string-keyed table, or an ordered array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Atom(String),
    Table(HashMap<String, Value>),
    Array(Vec<Value>),
}

impl Value {
    /// The atom contents, if this is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Value::Atom(s) => Some(s),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        self.as_atom()?.trim().parse().ok()
    }
}

// ── Position ──────────────────────────────────────────────────────────────

/// Character posture, ordered from dead to standing as the server orders its
/// position codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Position {
    Dead = 0,
    Mortal = 1,
    Incap = 2,
    Stunned = 3,
    Sleeping = 4,
    Resting = 5,
    Sitting = 6,
    Fighting = 7,
    #[default]
    Standing = 8,
}

impl Position {
    /// Parse from the numeric position code or the lowercase name.
    pub fn parse(s: &str) -> Option<Position> {
        let t = s.trim();
        if let Ok(code) = t.parse::<i64>() {
            return Self::from_code(code);
        }
        match t.to_ascii_lowercase().as_str() {
            "dead" => Some(Position::Dead),
            "mortal" | "mortally wounded" => Some(Position::Mortal),
            "incap" | "incapacitated" => Some(Position::Incap),
            "stunned" => Some(Position::Stunned),
            "sleeping" => Some(Position::Sleeping),
            "resting" => Some(Position::Resting),
            "sitting" => Some(Position::Sitting),
            "fighting" => Some(Position::Fighting),
            "standing" => Some(Position::Standing),
            _ => None,
        }
    }

    pub fn from_code(code: i64) -> Option<Position> {
        match code {
            0 => Some(Position::Dead),
            1 => Some(Position::Mortal),
            2 => Some(Position::Incap),
            3 => Some(Position::Stunned),
            4 => Some(Position::Sleeping),
            5 => Some(Position::Resting),
            6 => Some(Position::Sitting),
            7 => Some(Position::Fighting),
            8 => Some(Position::Standing),
            _ => None,
        }
    }

    /// Dead, mortally wounded, or incapacitated.
    pub fn is_dead(self) -> bool {
        self <= Position::Incap
    }

    /// Stunned or any worse state.
    pub fn is_stunned_or_worse(self) -> bool {
        self <= Position::Stunned
    }

    /// Able to walk out of the room right now.
    pub fn can_move(self) -> bool {
        self == Position::Standing
    }

    /// Able to initiate or continue a fight.
    pub fn can_fight(self) -> bool {
        self >= Position::Fighting
    }

    pub fn name(self) -> &'static str {
        match self {
            Position::Dead => "dead",
            Position::Mortal => "mortal",
            Position::Incap => "incap",
            Position::Stunned => "stunned",
            Position::Sleeping => "sleeping",
            Position::Resting => "resting",
            Position::Sitting => "sitting",
            Position::Fighting => "fighting",
            Position::Standing => "standing",
        }
    }
}

// ── Typed mirrors ─────────────────────────────────────────────────────────

/// Live character state assembled from reported MSDP variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterStats {
    pub health: i32,
    pub health_max: i32,
    pub mana: i32,
    pub mana_max: i32,
    pub movement: i32,
    pub movement_max: i32,
    pub level: i32,
    pub experience: i64,
    pub experience_max: i64,
    pub alignment: i32,
    pub money: i64,
    pub in_combat: bool,
    pub opponent_name: String,
    pub opponent_level: i32,
    pub opponent_health: i32,
    pub opponent_health_max: i32,
    pub room_vnum: i32,
    pub position: Position,
}

/// Percent of `cur` against `max`; 100 when `max` is non-positive so that a
/// session with no data yet never looks wounded.
fn percent(cur: i32, max: i32) -> f64 {
    if max <= 0 {
        return 100.0;
    }
    (cur as f64 / max as f64) * 100.0
}

impl CharacterStats {
    pub fn hp_percent(&self) -> f64 {
        percent(self.health, self.health_max)
    }

    pub fn mana_percent(&self) -> f64 {
        percent(self.mana, self.mana_max)
    }

    pub fn move_percent(&self) -> f64 {
        percent(self.movement, self.movement_max)
    }

    pub fn opponent_hp_percent(&self) -> f64 {
        percent(self.opponent_health, self.opponent_health_max)
    }
}

/// Current room state assembled from reported MSDP variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomInfo {
    pub name: String,
    pub vnum: i32,
    pub area: String,
    /// Exit directions, normalized to full names.
    pub exits: Vec<String>,
}

// ── Decoder ───────────────────────────────────────────────────────────────

/// Stateful MSDP decoder: variable store plus typed mirrors.
#[derive(Debug, Default)]
pub struct MsdpDecoder {
    variables: HashMap<String, Value>,
    pub stats: CharacterStats,
    pub room: RoomInfo,
}

impl MsdpDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previously decoded variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Number of distinct variables seen so far.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Decode one subnegotiation payload (everything after the option byte).
    ///
    /// Returns the names of the variables updated by this payload.
    pub fn parse(&mut self, data: &[u8]) -> Vec<String> {
        let mut updated = Vec::new();
        let mut i = 0;
        while i < data.len() {
            if data[i] != MSDP_VAR {
                i += 1;
                continue;
            }
            i += 1;
            let name_end = find_code(data, i);
            let name = String::from_utf8_lossy(&data[i..name_end]).into_owned();
            i = name_end;

            if i < data.len() && data[i] == MSDP_VAL {
                i += 1;
                let (value, next) = parse_value(data, i);
                i = next;
                self.apply(&name, &value);
                self.variables.insert(name.clone(), value);
                updated.push(name);
            }
        }
        updated
    }

    /// Mirror a well-known variable into the typed structures.
    fn apply(&mut self, name: &str, value: &Value) {
        macro_rules! int_field {
            ($field:expr, $ty:ty) => {
                match value.as_i64() {
                    Some(n) => $field = n as $ty,
                    None => debug!(name, ?value, "non-integer MSDP value"),
                }
            };
        }

        match name {
            "HEALTH" => int_field!(self.stats.health, i32),
            "HEALTH_MAX" => int_field!(self.stats.health_max, i32),
            "MANA" => int_field!(self.stats.mana, i32),
            "MANA_MAX" => int_field!(self.stats.mana_max, i32),
            "MOVEMENT" => int_field!(self.stats.movement, i32),
            "MOVEMENT_MAX" => int_field!(self.stats.movement_max, i32),
            "LEVEL" => int_field!(self.stats.level, i32),
            "EXPERIENCE" => int_field!(self.stats.experience, i64),
            "EXPERIENCE_MAX" => int_field!(self.stats.experience_max, i64),
            "ALIGNMENT" => int_field!(self.stats.alignment, i32),
            "MONEY" => int_field!(self.stats.money, i64),
            "IN_COMBAT" => match value.as_i64() {
                Some(n) => self.stats.in_combat = n != 0,
                None => debug!(name, ?value, "non-integer MSDP value"),
            },
            "OPPONENT_NAME" => {
                if let Some(s) = value.as_atom() {
                    self.stats.opponent_name = s.to_owned();
                }
            }
            "OPPONENT_LEVEL" => int_field!(self.stats.opponent_level, i32),
            "OPPONENT_HEALTH" => int_field!(self.stats.opponent_health, i32),
            "OPPONENT_HEALTH_MAX" => int_field!(self.stats.opponent_health_max, i32),
            "ROOM_VNUM" => {
                int_field!(self.stats.room_vnum, i32);
                self.room.vnum = self.stats.room_vnum;
            }
            "POSITION" => match value.as_atom().and_then(Position::parse) {
                Some(p) => self.stats.position = p,
                None => debug!(name, ?value, "unrecognised position"),
            },
            "ROOM" => {
                if let Value::Table(t) = value {
                    if let Some(n) = t.get("NAME").and_then(Value::as_atom) {
                        self.room.name = n.to_owned();
                    }
                    if let Some(v) = t.get("VNUM").and_then(Value::as_i64) {
                        self.room.vnum = v as i32;
                    }
                    if let Some(a) = t.get("AREA").and_then(Value::as_atom) {
                        self.room.area = a.to_owned();
                    }
                }
            }
            "ROOM_EXITS" => match value {
                Value::Array(items) => {
                    self.room.exits = items
                        .iter()
                        .filter_map(Value::as_atom)
                        .map(normalize_exit)
                        .collect();
                }
                Value::Atom(s) => {
                    self.room.exits = s.split_whitespace().map(normalize_exit).collect();
                }
                Value::Table(_) => debug!(name, "unexpected table for exits"),
            },
            _ => {} // unknown variable — retained in the store, not typed
        }
    }
}

/// Exit tokens come in as single letters or full names; store full names.
fn normalize_exit(token: &str) -> String {
    crate::text::normalize_direction(token)
        .map(str::to_owned)
        .unwrap_or_else(|| token.to_owned())
}

/// Index of the next MSDP code byte at or after `start` (or `data.len()`).
fn find_code(data: &[u8], start: usize) -> usize {
    data[start..]
        .iter()
        .position(|&b| is_code(b))
        .map(|p| start + p)
        .unwrap_or(data.len())
}

/// Parse one value starting at `i`; returns the value and the index after it.
fn parse_value(data: &[u8], i: usize) -> (Value, usize) {
    if i >= data.len() {
        return (Value::Atom(String::new()), i);
    }
    match data[i] {
        MSDP_TABLE_OPEN => parse_table(data, i + 1),
        MSDP_ARRAY_OPEN => parse_array(data, i + 1),
        _ => {
            let end = find_code(data, i);
            let s = String::from_utf8_lossy(&data[i..end]).into_owned();
            (Value::Atom(s), end)
        }
    }
}

fn parse_table(data: &[u8], start: usize) -> (Value, usize) {
    let mut table = HashMap::new();
    let mut i = start;
    while i < data.len() {
        match data[i] {
            MSDP_TABLE_CLOSE => return (Value::Table(table), i + 1),
            MSDP_VAR => {
                i += 1;
                let key_end = find_code(data, i);
                let key = String::from_utf8_lossy(&data[i..key_end]).into_owned();
                i = key_end;
                if i < data.len() && data[i] == MSDP_VAL {
                    i += 1;
                    let (value, next) = parse_value(data, i);
                    i = next;
                    table.insert(key, value);
                }
            }
            _ => i += 1,
        }
    }
    (Value::Table(table), i)
}

fn parse_array(data: &[u8], start: usize) -> (Value, usize) {
    let mut items = Vec::new();
    let mut i = start;
    while i < data.len() {
        match data[i] {
            MSDP_ARRAY_CLOSE => return (Value::Array(items), i + 1),
            MSDP_VAL => {
                i += 1;
                let (value, next) = parse_value(data, i);
                i = next;
                items.push(value);
            }
            _ => i += 1,
        }
    }
    (Value::Array(items), i)
}

// ── Subscription ──────────────────────────────────────────────────────────

/// The variable set every session REPORTs once MSDP negotiates on.
pub const REPORT_VARIABLES: &[&str] = &[
    "HEALTH",
    "HEALTH_MAX",
    "MANA",
    "MANA_MAX",
    "MOVEMENT",
    "MOVEMENT_MAX",
    "LEVEL",
    "EXPERIENCE",
    "ALIGNMENT",
    "MONEY",
    "ROOM_EXITS",
    "ROOM_VNUM",
    "POSITION",
    "IN_COMBAT",
    "OPPONENT_NAME",
    "OPPONENT_LEVEL",
    "OPPONENT_HEALTH",
    "OPPONENT_HEALTH_MAX",
];

/// Build the complete `IAC SB MSDP VAR "REPORT" (VAL <name>)* IAC SE` frame
/// subscribing to updates for `variables`.
pub fn build_report(variables: &[&str]) -> Vec<u8> {
    build_command("REPORT", variables)
}

/// Build an MSDP command frame: `VAR <command> (VAL <name>)*`.
pub fn build_command(command: &str, variables: &[&str]) -> Vec<u8> {
    let mut payload = vec![MSDP_VAR];
    payload.extend_from_slice(command.as_bytes());
    for var in variables {
        payload.push(MSDP_VAL);
        payload.extend_from_slice(var.as_bytes());
    }
    build_subneg(opt::MSDP, &payload)
}

// ── GMCP ──────────────────────────────────────────────────────────────────

/// Decode a GMCP payload: `Package.Message[ <json>]`.
///
/// Returns the package name and the decoded JSON value if one is present.
/// A payload whose tail fails JSON parsing yields the raw tail as a JSON
/// string so callers still see it.
pub fn decode_gmcp(data: &[u8]) -> Option<(String, Option<serde_json::Value>)> {
    let text = std::str::from_utf8(data).ok()?;
    match text.split_once(' ') {
        None => Some((text.to_owned(), None)),
        Some((package, rest)) => {
            let rest = rest.trim();
            let value = serde_json::from_str(rest)
                .unwrap_or_else(|_| serde_json::Value::String(rest.to_owned()));
            Some((package.to_owned(), Some(value)))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telnet::{IAC, SB, SE};

    fn pair(name: &str, val: &str) -> Vec<u8> {
        let mut v = vec![MSDP_VAR];
        v.extend_from_slice(name.as_bytes());
        v.push(MSDP_VAL);
        v.extend_from_slice(val.as_bytes());
        v
    }

    #[test]
    fn atom_pair_updates_store_and_stats() {
        let mut d = MsdpDecoder::new();
        let updated = d.parse(&pair("HEALTH", "17"));
        assert_eq!(updated, vec!["HEALTH"]);
        assert_eq!(d.get("HEALTH"), Some(&Value::Atom("17".into())));
        assert_eq!(d.stats.health, 17);
    }

    #[test]
    fn hp_percent_from_pairs() {
        let mut d = MsdpDecoder::new();
        let mut data = pair("HEALTH", "17");
        data.extend(pair("HEALTH_MAX", "20"));
        d.parse(&data);
        assert_eq!(d.stats.health, 17);
        assert_eq!(d.stats.health_max, 20);
        assert!((d.stats.hp_percent() - 85.0).abs() < f64::EPSILON);
    }

    #[test]
    fn percent_is_100_for_zero_max() {
        let stats = CharacterStats::default();
        assert_eq!(stats.hp_percent(), 100.0);
        assert_eq!(stats.mana_percent(), 100.0);
        assert_eq!(stats.move_percent(), 100.0);
    }

    #[test]
    fn last_write_wins() {
        let mut d = MsdpDecoder::new();
        d.parse(&pair("HEALTH", "10"));
        d.parse(&pair("HEALTH", "25"));
        assert_eq!(d.get("HEALTH"), Some(&Value::Atom("25".into())));
        assert_eq!(d.stats.health, 25);
    }

    #[test]
    fn non_integer_value_is_retained_untyped() {
        let mut d = MsdpDecoder::new();
        d.stats.health = 9;
        d.parse(&pair("HEALTH", "banana"));
        // Store keeps the raw atom; the typed mirror keeps its old value.
        assert_eq!(d.get("HEALTH"), Some(&Value::Atom("banana".into())));
        assert_eq!(d.stats.health, 9);
    }

    #[test]
    fn in_combat_nonzero_is_true() {
        let mut d = MsdpDecoder::new();
        d.parse(&pair("IN_COMBAT", "1"));
        assert!(d.stats.in_combat);
        d.parse(&pair("IN_COMBAT", "0"));
        assert!(!d.stats.in_combat);
    }

    #[test]
    fn position_code_and_name() {
        let mut d = MsdpDecoder::new();
        d.parse(&pair("POSITION", "5"));
        assert_eq!(d.stats.position, Position::Resting);
        d.parse(&pair("POSITION", "standing"));
        assert_eq!(d.stats.position, Position::Standing);
    }

    #[test]
    fn position_predicates() {
        assert!(Position::Dead.is_dead());
        assert!(Position::Incap.is_dead());
        assert!(!Position::Stunned.is_dead());
        assert!(Position::Stunned.is_stunned_or_worse());
        assert!(!Position::Sleeping.is_stunned_or_worse());
        assert!(Position::Standing.can_move());
        assert!(!Position::Resting.can_move());
        assert!(Position::Fighting.can_fight());
        assert!(Position::Standing.can_fight());
        assert!(!Position::Sitting.can_fight());
    }

    #[test]
    fn room_exits_array() {
        let mut d = MsdpDecoder::new();
        let mut data = vec![MSDP_VAR];
        data.extend_from_slice(b"ROOM_EXITS");
        data.push(MSDP_VAL);
        data.push(MSDP_ARRAY_OPEN);
        for dir in ["north", "up"] {
            data.push(MSDP_VAL);
            data.extend_from_slice(dir.as_bytes());
        }
        data.push(MSDP_ARRAY_CLOSE);
        d.parse(&data);
        assert_eq!(d.room.exits, vec!["north", "up"]);
    }

    #[test]
    fn room_exits_space_separated_atom() {
        let mut d = MsdpDecoder::new();
        d.parse(&pair("ROOM_EXITS", "north south down"));
        assert_eq!(d.room.exits, vec!["north", "south", "down"]);
    }

    #[test]
    fn room_table() {
        let mut d = MsdpDecoder::new();
        let mut data = vec![MSDP_VAR];
        data.extend_from_slice(b"ROOM");
        data.push(MSDP_VAL);
        data.push(MSDP_TABLE_OPEN);
        data.extend(pair("NAME", "The Cage Hub"));
        data.extend(pair("VNUM", "3712"));
        data.extend(pair("AREA", "Mob Factory"));
        data.push(MSDP_TABLE_CLOSE);
        d.parse(&data);
        assert_eq!(d.room.name, "The Cage Hub");
        assert_eq!(d.room.vnum, 3712);
        assert_eq!(d.room.area, "Mob Factory");
    }

    #[test]
    fn nested_opponent_table_in_store() {
        let mut d = MsdpDecoder::new();
        let mut data = vec![MSDP_VAR];
        data.extend_from_slice(b"OPPONENT");
        data.push(MSDP_VAL);
        data.push(MSDP_TABLE_OPEN);
        data.extend(pair("NAME", "a wimpy monster"));
        data.extend(pair("LEVEL", "3"));
        data.push(MSDP_TABLE_CLOSE);
        d.parse(&data);
        let Some(Value::Table(t)) = d.get("OPPONENT") else {
            panic!("expected table");
        };
        assert_eq!(t.get("NAME"), Some(&Value::Atom("a wimpy monster".into())));
        assert_eq!(t.get("LEVEL"), Some(&Value::Atom("3".into())));
    }

    #[test]
    fn multiple_pairs_in_one_payload() {
        let mut d = MsdpDecoder::new();
        let mut data = pair("LEVEL", "8");
        data.extend(pair("MONEY", "123"));
        data.extend(pair("ROOM_VNUM", "3712"));
        let updated = d.parse(&data);
        assert_eq!(updated, vec!["LEVEL", "MONEY", "ROOM_VNUM"]);
        assert_eq!(d.stats.level, 8);
        assert_eq!(d.stats.money, 123);
        assert_eq!(d.stats.room_vnum, 3712);
    }

    #[test]
    fn report_frame_layout() {
        let frame = build_report(&["HEALTH", "MANA"]);
        let mut expected = vec![IAC, SB, opt::MSDP, MSDP_VAR];
        expected.extend_from_slice(b"REPORT");
        expected.push(MSDP_VAL);
        expected.extend_from_slice(b"HEALTH");
        expected.push(MSDP_VAL);
        expected.extend_from_slice(b"MANA");
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(frame, expected);
    }

    #[test]
    fn gmcp_with_json() {
        let (pkg, val) = decode_gmcp(b"Char.Vitals {\"hp\":100,\"mana\":50}").unwrap();
        assert_eq!(pkg, "Char.Vitals");
        let val = val.unwrap();
        assert_eq!(val["hp"], 100);
        assert_eq!(val["mana"], 50);
    }

    #[test]
    fn gmcp_without_payload() {
        let (pkg, val) = decode_gmcp(b"Core.Ping").unwrap();
        assert_eq!(pkg, "Core.Ping");
        assert!(val.is_none());
    }

    #[test]
    fn gmcp_non_json_tail_kept_as_string() {
        let (pkg, val) = decode_gmcp(b"Comm.Channel not json at all").unwrap();
        assert_eq!(pkg, "Comm.Channel");
        assert_eq!(
            val,
            Some(serde_json::Value::String("not json at all".into()))
        );
    }
}
