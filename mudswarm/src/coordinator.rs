//! Multi-session coordinator: accounts, staggered spawn, per-bot workers,
//! the monitor loop, and shutdown fan-out.
//!
//! Each bot runs on its own tokio task and owns its session end to end; the
//! only shared state is the metrics registry. The coordinator staggers
//! connection attempts so the server sees a ramp instead of a thundering
//! herd, prints a status line while the test runs, and on shutdown raises
//! every worker's stop flag and waits for them to drain.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use crate::behavior::combat::{Attack, Combat};
use crate::behavior::engine::{Engine, WorldView};
use crate::behavior::idle::Idle;
use crate::behavior::inventory::{BuySupplies, Loot};
use crate::behavior::navigation::{Explore, FightDarkCreature, Navigate, Patrol, ReturnToCage};
use crate::behavior::survival::{DeathRecovery, Heal, LightSource, Recall, Survive};
use crate::behavior::training::{BotReset, Practice, Train};
use crate::behavior::{priority, DEFAULT_REST_MANA_PERCENT, DEFAULT_REST_MOVE_PERCENT};
use crate::metrics::{BotMetrics, MetricsCollector};
use crate::rooms::{CENTRAL_ROOM, ROUTE_BACK_TO_HUB, ROUTE_TO_CAGE_ROOM};
use crate::session::{Session, SessionConfig};

// ── Accounts ──────────────────────────────────────────────────────────────

/// One login credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub password: String,
}

/// Read `username:password` lines. `#` comments and blank lines are
/// skipped; malformed lines are logged and skipped.
pub fn load_accounts(path: &Path) -> std::io::Result<Vec<Account>> {
    let contents = std::fs::read_to_string(path)?;
    let mut accounts = Vec::new();

    for (lineno, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((username, password)) = line.split_once(':') else {
            warn!(line = lineno + 1, "accounts file: missing ':' separator");
            continue;
        };
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() || password.is_empty() {
            warn!(line = lineno + 1, "accounts file: empty username or password");
            continue;
        }
        accounts.push(Account {
            username: username.to_owned(),
            password: password.to_owned(),
        });
    }

    info!(count = accounts.len(), path = %path.display(), "accounts loaded");
    Ok(accounts)
}

// ── Config ────────────────────────────────────────────────────────────────

/// Everything the coordinator needs for a run.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub verify_tls: bool,

    pub accounts: Vec<Account>,
    /// Cap on concurrent bots; 0 uses every account.
    pub num_bots: usize,

    pub stagger_delay: Duration,
    pub runtime: Duration,
    pub tick_interval: Duration,
    pub status_interval: Duration,

    pub flee_hp_percent: f64,
    pub rest_hp_percent: f64,
    /// Attack whitelist; empty attacks anything eligible.
    pub targets: Vec<String>,

    // Startup errands.
    pub hard_reset_on_startup: bool,
    pub train_on_startup: bool,
    pub practice_on_startup: bool,
    /// Random wandering; off by default since the patrol owns movement.
    pub include_explore: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 4000,
            tls: false,
            verify_tls: false,
            accounts: Vec::new(),
            num_bots: 0,
            stagger_delay: Duration::from_secs(1),
            runtime: Duration::from_secs(300),
            tick_interval: Duration::from_millis(500),
            status_interval: Duration::from_secs(5),
            flee_hp_percent: 20.0,
            rest_hp_percent: 50.0,
            targets: vec!["monster".to_owned()],
            hard_reset_on_startup: true,
            train_on_startup: true,
            practice_on_startup: true,
            include_explore: false,
        }
    }
}

impl CoordinatorConfig {
    /// The accounts this run will actually use.
    pub fn selected_accounts(&self) -> &[Account] {
        if self.num_bots > 0 && self.num_bots < self.accounts.len() {
            &self.accounts[..self.num_bots]
        } else {
            &self.accounts
        }
    }
}

/// How the run ended, for the process exit code.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOutcome {
    pub interrupted: bool,
    pub all_connections_failed: bool,
}

// ── Coordinator ───────────────────────────────────────────────────────────

struct Worker {
    bot_id: String,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owns the worker set and the metrics collector for one run.
pub struct Coordinator {
    config: CoordinatorConfig,
    collector: Arc<MetricsCollector>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            collector: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    /// Run the whole test: spawn, monitor, shut down. Blocks until the
    /// configured runtime elapses, every bot exits, or ctrl-c arrives.
    pub async fn run(&self) -> RunOutcome {
        let accounts: Vec<Account> = self.config.selected_accounts().to_vec();
        if accounts.is_empty() {
            error!("no accounts to run");
            return RunOutcome {
                interrupted: false,
                all_connections_failed: true,
            };
        }

        info!(
            bots = accounts.len(),
            host = %self.config.host,
            port = self.config.port,
            stagger = ?self.config.stagger_delay,
            "starting load run"
        );
        self.collector.start();

        let mut interrupted = false;
        let mut workers: Vec<Worker> = Vec::with_capacity(accounts.len());
        let started = Instant::now();

        // Staggered spawn; ctrl-c during the ramp skips the rest.
        for (i, account) in accounts.iter().enumerate() {
            workers.push(self.spawn_worker(account.clone()));
            if i + 1 < accounts.len() {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.config.stagger_delay) => {}
                }
            }
        }
        info!(spawned = workers.len(), "all bots spawned");

        // Monitor until the clock, the bots, or the operator says stop.
        let mut last_status = Instant::now();
        while !interrupted {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received");
                    interrupted = true;
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            }

            if started.elapsed() >= self.config.runtime {
                info!("test duration reached");
                break;
            }
            if last_status.elapsed() >= self.config.status_interval {
                println!("{}", self.collector.live_status_line());
                last_status = Instant::now();
            }
            if workers.iter().all(|w| w.handle.is_finished()) {
                warn!("all bots have terminated");
                break;
            }
        }

        // Shutdown fan-out.
        for worker in &workers {
            worker.stop.store(true, Ordering::Relaxed);
        }
        for worker in workers {
            if let Err(e) = worker.handle.await {
                debug!(bot = %worker.bot_id, error = %e, "worker join");
            }
        }
        self.collector.stop();

        let agg = self.collector.aggregate();
        RunOutcome {
            interrupted,
            all_connections_failed: agg.total_connection_attempts > 0
                && agg.total_connection_failures >= agg.total_connection_attempts,
        }
    }

    fn spawn_worker(&self, account: Account) -> Worker {
        let bot_id = account.username.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let metrics = self.collector.register(&bot_id);

        let session_config = SessionConfig {
            host: self.config.host.clone(),
            port: self.config.port,
            tls: self.config.tls,
            verify_tls: self.config.verify_tls,
            username: account.username,
            password: account.password,
            ..SessionConfig::default()
        };

        let worker_config = self.config.clone();
        let worker_stop = Arc::clone(&stop);
        let span = tracing::info_span!("bot", id = %bot_id);
        let handle = tokio::spawn(
            run_bot(session_config, worker_config, metrics, worker_stop).instrument(span),
        );

        Worker {
            bot_id,
            stop,
            handle,
        }
    }
}

// ── Worker ────────────────────────────────────────────────────────────────

/// Build the behavior set for one session per the run configuration.
fn build_engine(bot_id: &str, config: &CoordinatorConfig) -> Engine {
    let mut engine = Engine::new(bot_id);

    engine.add(Box::new(DeathRecovery::new()));
    engine.add(Box::new(Survive::new(config.flee_hp_percent)));
    engine.add(Box::new(Recall::new()));
    engine.add(Box::new(LightSource::new()));
    engine.add(Box::new(Combat::default()));
    engine.add(Box::new(Loot::new()));
    engine.add(Box::new(Heal::new(
        config.rest_hp_percent,
        DEFAULT_REST_MANA_PERCENT,
        DEFAULT_REST_MOVE_PERCENT,
    )));

    if config.hard_reset_on_startup {
        engine.add(Box::new(BotReset::new()));
    }
    if config.train_on_startup {
        engine.add(Box::new(Train::default()));
    }
    if config.practice_on_startup {
        // The hard reset already wiped practice points when it ran.
        engine.add(Box::new(Practice::new(
            crate::rooms::ROUTE_TO_PRACTICE_ROOM,
            !config.hard_reset_on_startup,
        )));
    }
    // Registered after Practice: the equal-priority tie keeps practice
    // first, then this one-shot walks the bot to the hub.
    engine.add(Box::new(
        Navigate::new(ROUTE_TO_CAGE_ROOM, CENTRAL_ROOM)
            .one_shot()
            .with_priority(priority::INITIAL_NAVIGATE),
    ));

    engine.add(Box::new(Attack::new(config.targets.clone(), 5)));
    engine.add(Box::new(FightDarkCreature::new()));
    engine.add(Box::new(BuySupplies::default()));
    engine.add(Box::new(Patrol::new()));
    engine.add(Box::new(ReturnToCage::new(ROUTE_BACK_TO_HUB)));
    if config.include_explore {
        engine.add(Box::new(Explore::new()));
    }
    engine.add(Box::new(Idle::new()));
    engine
}

/// One bot, end to end: connect+login, behavior loop, cleanup.
async fn run_bot(
    session_config: SessionConfig,
    config: CoordinatorConfig,
    metrics: Arc<Mutex<BotMetrics>>,
    stop: Arc<AtomicBool>,
) {
    let mut session = Session::new(session_config);
    let bot_id = session.bot_id().to_owned();

    if let Ok(mut m) = metrics.lock() {
        m.connection_attempts += 1;
    }

    if let Err(e) = session.login().await {
        error!(error = %e, "login failed");
        if let Ok(mut m) = metrics.lock() {
            m.connection_failures += 1;
        }
        return;
    }

    if let Ok(mut m) = metrics.lock() {
        m.connected = true;
        m.connect_time = Some(std::time::Instant::now());
    }
    info!("logged in");

    let mut engine = build_engine(&bot_id, &config);
    let mut last_xp: Option<i64> = None;

    while !stop.load(Ordering::Relaxed) && session.is_playing() {
        // Drain whatever the server sent since the last tick.
        match session.read_text(Duration::from_millis(200)).await {
            Ok(text) => {
                if !text.is_empty() {
                    engine.observe_text(&text);
                    if let Ok(mut m) = metrics.lock() {
                        m.record_response_received(text.len());
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "read failed, leaving");
                break;
            }
        }

        // One scheduler tick, then push its commands through the throttle.
        let world = WorldView::from_session(&session);
        let mut commands = Vec::new();
        let behavior = engine.tick(&world, Some(&metrics), &mut commands);

        let mut send_failed = false;
        for command in commands {
            if let Err(e) = session.send_command(&command).await {
                warn!(error = %e, command, "send failed, leaving");
                send_failed = true;
                break;
            }
            if let Ok(mut m) = metrics.lock() {
                m.record_command_sent(command.len() + 2);
            }
        }
        if send_failed {
            break;
        }

        // Live stats and XP-delta kill accounting.
        {
            let stats = session.stats();
            if let Ok(mut m) = metrics.lock() {
                if let Some(name) = behavior {
                    m.current_behavior = name.to_owned();
                }
                m.hp_percent = stats.hp_percent();
                m.current_room_vnum = stats.room_vnum;
                match last_xp {
                    None => last_xp = Some(stats.experience),
                    Some(prev) if stats.experience > prev => {
                        let gain = stats.experience - prev;
                        m.record_kill(gain);
                        debug!(xp = gain, "kill");
                        last_xp = Some(stats.experience);
                    }
                    Some(_) => {}
                }
            }
        }

        tokio::time::sleep(config.tick_interval).await;
    }

    session.quit_and_close().await;
    if let Ok(mut m) = metrics.lock() {
        m.connected = false;
        m.disconnect_time = Some(std::time::Instant::now());
    }
    debug!("worker stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────
