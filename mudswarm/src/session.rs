//! One bot session: connection lifecycle, the login / character-creation
//! state machine, command throttling, and the per-chunk data fan-in.
//!
//! The session reads raw events from [`Connection::recv`] and fans them out:
//! clean text accumulates in the session buffer (ANSI-stripped) and is
//! scanned for `[BOT:…]` records and prompts; MSDP payloads update the typed
//! decoder; a room change observed through MSDP drops the BOT snapshot so
//! stale mob/object records never leak across rooms.
//!
//! Login is substring-driven: each read, the accumulated buffer is tested
//! against the prompts a ROM-lineage nanny emits ("By what name …",
//! "Password:", "Did I get that right", the creation questions, the MOTD
//! pause) and the matching reply is sent. Once PLAYING, the session emits
//! the MSDP REPORT subscription exactly once and refreshes the room with
//! `look`.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::msdp::{self, CharacterStats, MsdpDecoder, RoomInfo};
use crate::net::{ConnectError, ConnectOptions, Connection, NetEvent};
use crate::text::{self, BotSnapshot};

// ── Config ────────────────────────────────────────────────────────────────

/// Per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub verify_tls: bool,
    pub connect_timeout: Duration,
    pub login_timeout: Duration,

    pub username: String,
    pub password: String,

    // Replies for the character-creation questions.
    pub new_char_race: String,
    pub new_char_class: String,
    pub new_char_sex: String,
    pub new_char_alignment: String,
    pub new_char_weapon: String,

    /// Minimum wall-time between outbound lines.
    pub min_command_delay: Duration,
    pub auto_subscribe_msdp: bool,
    pub read_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 4000,
            tls: false,
            verify_tls: false,
            connect_timeout: Duration::from_secs(30),
            login_timeout: Duration::from_secs(60),
            username: String::new(),
            password: String::new(),
            new_char_race: "human".to_owned(),
            new_char_class: "warrior".to_owned(),
            new_char_sex: "male".to_owned(),
            new_char_alignment: "neutral".to_owned(),
            new_char_weapon: "sword".to_owned(),
            min_command_delay: Duration::from_millis(250),
            auto_subscribe_msdp: true,
            read_buffer: 4096,
        }
    }
}

// ── States & errors ───────────────────────────────────────────────────────

/// High-level session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Disconnected,
    Connecting,
    AwaitingName,
    AwaitingPassword,
    /// New character: "Did I get that right?"
    ConfirmingName,
    CreatingCharacter,
    AwaitingMotd,
    Playing,
    Error,
}

/// Fatal session failures. Behaviors never see these; they end the worker.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("login timed out")]
    LoginTimeout,
    #[error("server rejected password")]
    WrongPassword,
    #[error("connection lost")]
    ConnectionLost,
    #[error(transparent)]
    Io(#[from] io::Error),
}

// ── Login matching (pure, testable) ───────────────────────────────────────

fn buffer_has(buffer: &str, needles: &[&str]) -> bool {
    let lower = buffer.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// State transitions driven purely by observed text, evaluated before the
/// per-state action on every read.
pub(crate) fn passive_transition(state: BotState, buffer: &str) -> Option<BotState> {
    match state {
        BotState::AwaitingName => {
            if buffer_has(buffer, &["password:"]) {
                Some(BotState::AwaitingPassword)
            } else if buffer_has(buffer, &["did i get that right"]) {
                Some(BotState::ConfirmingName)
            } else {
                None
            }
        }
        BotState::AwaitingPassword => {
            if buffer_has(
                buffer,
                &[
                    "hit return to continue",
                    "press enter",
                    "[hit return",
                    "message of the day",
                ],
            ) {
                Some(BotState::AwaitingMotd)
            } else if buffer_has(buffer, &["reconnecting"]) {
                // Character was still connected — straight back into the game.
                Some(BotState::Playing)
            } else if buffer_has(buffer, &["wrong password"]) {
                Some(BotState::Error)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// What to do with the current creation prompt.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CreationAction {
    /// Send this line and clear the buffer.
    Reply(String),
    /// Creation is over; wait for the MOTD pause.
    ToMotd,
}

/// Pick the reply for whatever creation question the buffer is showing.
pub(crate) fn creation_action(buffer: &str, cfg: &SessionConfig) -> Option<CreationAction> {
    let lower = buffer.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["select a race", "choose a race", "the following races"]) {
        return Some(CreationAction::Reply(cfg.new_char_race.clone()));
    }
    if has(&["select a class", "choose a class", "the following classes"]) {
        return Some(CreationAction::Reply(cfg.new_char_class.clone()));
    }
    if lower.contains("sex") && (lower.contains("male") || lower.contains("female")) {
        return Some(CreationAction::Reply(cfg.new_char_sex.clone()));
    }
    if lower.contains("alignment")
        && (lower.contains("good") || lower.contains("neutral") || lower.contains("evil"))
    {
        return Some(CreationAction::Reply(cfg.new_char_alignment.clone()));
    }
    if has(&["give me a password", "retype password", "please retype"]) {
        return Some(CreationAction::Reply(cfg.password.clone()));
    }
    if lower.contains("customize") {
        // Take the default group picks.
        return Some(CreationAction::Reply("n".to_owned()));
    }
    if has(&["pick a weapon", "weapon from the following"]) {
        return Some(CreationAction::Reply(cfg.new_char_weapon.clone()));
    }
    if has(&["press enter", "[hit return"]) || lower.contains("motd") {
        return Some(CreationAction::ToMotd);
    }
    None
}

// ── Session ───────────────────────────────────────────────────────────────

const DIRECTION_COMMANDS: &[&str] = &[
    "north", "south", "east", "west", "up", "down", "n", "s", "e", "w", "u", "d",
];

/// A single bot client: connection, protocol state, login, and live
/// character/room/BOT snapshots.
pub struct Session {
    config: SessionConfig,
    conn: Option<Connection>,
    msdp: MsdpDecoder,
    state: BotState,
    text_buffer: String,
    prompt_seen: bool,
    bot_mode: bool,
    bot_data: BotSnapshot,
    last_command_at: Option<Instant>,
    report_sent: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            conn: None,
            msdp: MsdpDecoder::new(),
            state: BotState::Disconnected,
            text_buffer: String::new(),
            prompt_seen: false,
            bot_mode: false,
            bot_data: BotSnapshot::default(),
            last_command_at: None,
            report_sent: false,
        }
    }

    /// Session identifier: the account name.
    pub fn bot_id(&self) -> &str {
        if self.config.username.is_empty() {
            "unnamed"
        } else {
            &self.config.username
        }
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == BotState::Playing
    }

    pub fn stats(&self) -> &CharacterStats {
        &self.msdp.stats
    }

    pub fn room(&self) -> &RoomInfo {
        &self.msdp.room
    }

    /// Whether structured `[BOT:…]` output has been observed.
    pub fn bot_mode(&self) -> bool {
        self.bot_mode
    }

    pub fn bot_data(&self) -> &BotSnapshot {
        &self.bot_data
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Establish the TCP/TLS connection.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        self.state = BotState::Connecting;
        let opts = ConnectOptions {
            tls: self.config.tls,
            verify_tls: self.config.verify_tls,
            timeout: self.config.connect_timeout,
            read_buffer: self.config.read_buffer,
        };
        match Connection::open(&self.config.host, self.config.port, &opts).await {
            Ok(conn) => {
                self.conn = Some(conn);
                self.state = BotState::AwaitingName;
                Ok(())
            }
            Err(e) => {
                self.state = BotState::Error;
                Err(e.into())
            }
        }
    }

    /// Drive the login state machine until PLAYING or failure.
    pub async fn login(&mut self) -> Result<(), SessionError> {
        if self.conn.is_none() {
            self.connect().await?;
        }
        let deadline = Instant::now() + self.config.login_timeout;

        while Instant::now() < deadline {
            self.pump(Duration::from_secs(1)).await?;

            if let Some(next) = passive_transition(self.state, &self.text_buffer) {
                debug!(bot = self.bot_id(), from = ?self.state, to = ?next, "login transition");
                self.state = next;
            }

            match self.state {
                BotState::AwaitingName => {
                    if buffer_has(&self.text_buffer, &["what name", "by what name", "your name"])
                    {
                        let name = self.config.username.clone();
                        self.send_line_throttled(&name).await?;
                        self.text_buffer.clear();
                    }
                }
                BotState::AwaitingPassword => {
                    if buffer_has(&self.text_buffer, &["password:"]) {
                        let password = self.config.password.clone();
                        self.send_line_throttled(&password).await?;
                        self.text_buffer.clear();
                    }
                }
                BotState::ConfirmingName => {
                    if buffer_has(&self.text_buffer, &["did i get that right"]) {
                        self.send_line_throttled("y").await?;
                        self.text_buffer.clear();
                        self.state = BotState::CreatingCharacter;
                    }
                }
                BotState::CreatingCharacter => {
                    match creation_action(&self.text_buffer, &self.config) {
                        Some(CreationAction::Reply(reply)) => {
                            self.send_line_throttled(&reply).await?;
                            self.text_buffer.clear();
                        }
                        Some(CreationAction::ToMotd) => {
                            self.state = BotState::AwaitingMotd;
                        }
                        None => {}
                    }
                }
                BotState::AwaitingMotd => {
                    if buffer_has(
                        &self.text_buffer,
                        &["press enter", "[hit return", "continue]"],
                    ) {
                        self.send_line_throttled("").await?;
                        self.text_buffer.clear();
                        self.state = BotState::Playing;
                    }
                }
                BotState::Playing => {
                    info!(bot = self.bot_id(), "login complete, now playing");
                    self.enter_playing().await?;
                    return Ok(());
                }
                BotState::Error => return Err(SessionError::WrongPassword),
                BotState::Disconnected => return Err(SessionError::ConnectionLost),
                BotState::Connecting => {}
            }
        }

        warn!(bot = self.bot_id(), "login timed out");
        Err(SessionError::LoginTimeout)
    }

    /// First actions after reaching PLAYING: the one-time MSDP subscription
    /// and an initial `look` to seed room data.
    async fn enter_playing(&mut self) -> Result<(), SessionError> {
        if self.config.auto_subscribe_msdp && !self.report_sent {
            let msdp_on = self
                .conn
                .as_ref()
                .is_some_and(|c| c.protocol().msdp_on());
            if msdp_on {
                info!(
                    bot = self.bot_id(),
                    vars = msdp::REPORT_VARIABLES.len(),
                    "subscribing to MSDP reports"
                );
                let frame = msdp::build_report(msdp::REPORT_VARIABLES);
                let conn = self.conn.as_mut().ok_or(SessionError::ConnectionLost)?;
                conn.send_raw(&frame).await?;
                self.report_sent = true;
            }
        }
        self.send_line_throttled("look").await?;
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.pump(Duration::from_secs(1)).await?;
        Ok(())
    }

    /// Send `quit` (best effort) and close the socket.
    pub async fn quit_and_close(&mut self) {
        if self.is_playing() {
            let _ = self.send_line_throttled("quit").await;
        }
        if let Some(conn) = self.conn.as_mut() {
            conn.close().await;
        }
        self.state = BotState::Disconnected;
    }

    // ── Data fan-in ───────────────────────────────────────────────────────

    /// One bounded read: decode events and fold them into session state.
    pub async fn pump(&mut self, timeout: Duration) -> Result<(), SessionError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(SessionError::ConnectionLost);
        };
        let events = conn.recv(timeout).await?;
        for event in events {
            match event {
                NetEvent::Text(bytes) => {
                    let chunk = text::strip_ansi(&String::from_utf8_lossy(&bytes));
                    self.ingest_text(&chunk);
                }
                NetEvent::Prompt => self.prompt_seen = true,
                NetEvent::Msdp(payload) => self.ingest_msdp(&payload),
                NetEvent::Gmcp(payload) => {
                    if let Some((package, value)) = msdp::decode_gmcp(&payload) {
                        debug!(bot = self.bot_id(), %package, ?value, "gmcp");
                    }
                }
                NetEvent::Closed => {
                    info!(bot = self.bot_id(), "server closed connection");
                    self.state = BotState::Disconnected;
                }
            }
        }
        Ok(())
    }

    fn ingest_text(&mut self, chunk: &str) {
        self.text_buffer.push_str(chunk);

        if text::has_bot_data(chunk) {
            self.bot_mode = true;
            self.bot_data = text::parse_bot_data(chunk);
            debug!(
                bot = self.bot_id(),
                mobs = self.bot_data.mobs.len(),
                objects = self.bot_data.objects.len(),
                exits = self.bot_data.exits.len(),
                "bot snapshot refreshed"
            );
        }
        if text::has_prompt(chunk) {
            self.prompt_seen = true;
        }
    }

    fn ingest_msdp(&mut self, payload: &[u8]) {
        let old_vnum = self.msdp.stats.room_vnum;
        self.msdp.parse(payload);
        let new_vnum = self.msdp.stats.room_vnum;

        // Stale BOT records must not survive a room change; the next `look`
        // repopulates them.
        if new_vnum != old_vnum && old_vnum != 0 {
            debug!(bot = self.bot_id(), from = old_vnum, to = new_vnum, "room change");
            self.bot_data = BotSnapshot::default();
        }
    }

    /// Read whatever is available within `timeout` and return it as one
    /// ANSI-stripped chunk. The session buffer is consumed.
    pub async fn read_text(&mut self, timeout: Duration) -> Result<String, SessionError> {
        self.text_buffer.clear();
        self.pump(timeout).await?;
        Ok(std::mem::take(&mut self.text_buffer))
    }

    /// Wait until a prompt is detected or `timeout` elapses.
    pub async fn wait_for_prompt(&mut self, timeout: Duration) -> Result<bool, SessionError> {
        let deadline = Instant::now() + timeout;
        self.prompt_seen = false;
        while Instant::now() < deadline {
            self.pump(Duration::from_millis(500)).await?;
            if self.prompt_seen {
                return Ok(true);
            }
            if self.state == BotState::Disconnected {
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Send a command and collect output until the next prompt (or the
    /// timeout). Convenience wrapper used by probes and tests.
    pub async fn send_and_wait(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        self.text_buffer.clear();
        self.send_command(command).await?;
        self.wait_for_prompt(timeout).await?;
        Ok(std::mem::take(&mut self.text_buffer))
    }

    // ── Sending ───────────────────────────────────────────────────────────

    /// Send a game command, honoring the inter-command throttle.
    ///
    /// Ignored with a warning when the session is not PLAYING.
    pub async fn send_command(&mut self, command: &str) -> Result<(), SessionError> {
        if !self.is_playing() {
            warn!(bot = self.bot_id(), command, "dropping command, not playing");
            return Ok(());
        }
        let first = command.split_whitespace().next().unwrap_or("");
        if DIRECTION_COMMANDS.contains(&first) {
            debug!(bot = self.bot_id(), command, from = self.msdp.stats.room_vnum, "move");
        } else {
            debug!(bot = self.bot_id(), command, "command");
        }
        self.send_line_throttled(command).await
    }

    async fn send_line_throttled(&mut self, line: &str) -> Result<(), SessionError> {
        if let Some(last) = self.last_command_at {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_command_delay {
                tokio::time::sleep(self.config.min_command_delay - elapsed).await;
            }
        }
        self.last_command_at = Some(Instant::now());
        let conn = self.conn.as_mut().ok_or(SessionError::ConnectionLost)?;
        conn.send_line(line).await?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
