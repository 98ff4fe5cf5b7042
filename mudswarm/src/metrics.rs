//! Load-test metrics: per-session counters with a rolling latency window,
//! and a lock-guarded collector that aggregates across sessions.
//!
//! Latency is measured command-to-response: every outbound command stamps a
//! pending timestamp; the next inbound chunk closes it into the window.
//! The window is bounded (default 100 samples) so long runs report recent
//! latency, not the whole history.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use serde_json::json;

const LATENCY_WINDOW: usize = 100;

// ── Per-session record ────────────────────────────────────────────────────

/// Counters for one bot session. Owned behind `Arc<Mutex<…>>`: the worker
/// updates it, the collector reads it.
#[derive(Debug)]
pub struct BotMetrics {
    pub bot_id: String,

    // Connection.
    pub connected: bool,
    pub connect_time: Option<Instant>,
    pub disconnect_time: Option<Instant>,
    pub connection_attempts: u64,
    pub connection_failures: u64,

    // Commands.
    pub commands_sent: u64,
    pub responses_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,

    // Latency.
    latency_window: VecDeque<f64>,
    pending_command: Option<Instant>,

    // Game events.
    pub kills: u64,
    pub deaths: u64,
    pub flee_attempts: u64,
    pub xp_gained: i64,

    // Live state.
    pub current_behavior: String,
    pub current_room_vnum: i32,
    pub hp_percent: f64,

    // Errors.
    pub parse_errors: u64,
    pub timeout_errors: u64,
}

impl BotMetrics {
    pub fn new(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            connected: false,
            connect_time: None,
            disconnect_time: None,
            connection_attempts: 0,
            connection_failures: 0,
            commands_sent: 0,
            responses_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
            latency_window: VecDeque::with_capacity(LATENCY_WINDOW),
            pending_command: None,
            kills: 0,
            deaths: 0,
            flee_attempts: 0,
            xp_gained: 0,
            current_behavior: String::new(),
            current_room_vnum: 0,
            hp_percent: 100.0,
            parse_errors: 0,
            timeout_errors: 0,
        }
    }

    /// Record an outbound command and stamp the latency probe.
    pub fn record_command_sent(&mut self, bytes: usize) {
        self.commands_sent += 1;
        self.bytes_sent += bytes as u64;
        self.pending_command = Some(Instant::now());
    }

    /// Record inbound data; closes a pending latency probe if one exists.
    pub fn record_response_received(&mut self, bytes: usize) {
        self.responses_received += 1;
        self.bytes_received += bytes as u64;

        if let Some(sent_at) = self.pending_command.take() {
            let ms = sent_at.elapsed().as_secs_f64() * 1000.0;
            if self.latency_window.len() == LATENCY_WINDOW {
                self.latency_window.pop_front();
            }
            self.latency_window.push_back(ms);
        }
    }

    pub fn record_kill(&mut self, xp: i64) {
        self.kills += 1;
        self.xp_gained += xp;
    }

    pub fn record_death(&mut self) {
        self.deaths += 1;
    }

    pub fn record_flee_attempt(&mut self) {
        self.flee_attempts += 1;
    }

    pub fn latency_avg_ms(&self) -> f64 {
        if self.latency_window.is_empty() {
            return 0.0;
        }
        self.latency_window.iter().sum::<f64>() / self.latency_window.len() as f64
    }

    pub fn latency_samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.latency_window.iter().copied()
    }
}

// ── Aggregate ─────────────────────────────────────────────────────────────

/// Totals across all sessions, computed under the collector lock.
#[derive(Debug, Default, Clone)]
pub struct AggregateMetrics {
    pub duration_seconds: f64,

    pub total_bots: u64,
    pub bots_connected: u64,
    pub bots_playing: u64,

    pub total_commands: u64,
    pub total_responses: u64,
    pub total_bytes_sent: u64,
    pub total_bytes_received: u64,

    pub total_kills: u64,
    pub total_deaths: u64,
    pub total_xp: i64,

    pub total_connection_attempts: u64,
    pub total_connection_failures: u64,
    pub total_parse_errors: u64,
    pub total_timeout_errors: u64,

    pub avg_latency_ms: f64,
    pub p99_latency_ms: f64,
}

impl AggregateMetrics {
    pub fn commands_per_second(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            return 0.0;
        }
        self.total_commands as f64 / self.duration_seconds
    }

    pub fn kills_per_minute(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            return 0.0;
        }
        (self.total_kills as f64 / self.duration_seconds) * 60.0
    }

    pub fn connection_success_rate(&self) -> f64 {
        if self.total_connection_attempts == 0 {
            return 100.0;
        }
        let ok = self.total_connection_attempts - self.total_connection_failures;
        (ok as f64 / self.total_connection_attempts as f64) * 100.0
    }
}

// ── Run config echo ───────────────────────────────────────────────────────

/// The run parameters echoed into the JSON report.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RunConfig {
    pub host: String,
    pub port: u16,
    pub num_bots: usize,
    pub duration: f64,
    pub targets: Vec<String>,
}

// ── Collector ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Registry {
    bots: Vec<Arc<Mutex<BotMetrics>>>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

/// Aggregates per-session records. Workers hold their own `Arc` handles;
/// the registry lock is only taken to register and to read.
#[derive(Default)]
pub struct MetricsCollector {
    registry: Mutex<Registry>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        if let Ok(mut r) = self.registry.lock() {
            r.started_at = Some(Instant::now());
            r.stopped_at = None;
        }
    }

    pub fn stop(&self) {
        if let Ok(mut r) = self.registry.lock() {
            r.stopped_at = Some(Instant::now());
        }
    }

    /// Register a session and hand back its record handle.
    pub fn register(&self, bot_id: impl Into<String>) -> Arc<Mutex<BotMetrics>> {
        let record = Arc::new(Mutex::new(BotMetrics::new(bot_id)));
        if let Ok(mut r) = self.registry.lock() {
            r.bots.push(Arc::clone(&record));
        }
        record
    }

    /// Compute totals over all registered sessions.
    pub fn aggregate(&self) -> AggregateMetrics {
        let Ok(registry) = self.registry.lock() else {
            return AggregateMetrics::default();
        };

        let mut agg = AggregateMetrics {
            total_bots: registry.bots.len() as u64,
            duration_seconds: match (registry.started_at, registry.stopped_at) {
                (Some(start), Some(stop)) => (stop - start).as_secs_f64(),
                (Some(start), None) => start.elapsed().as_secs_f64(),
                _ => 0.0,
            },
            ..AggregateMetrics::default()
        };

        let mut all_latencies: Vec<f64> = Vec::new();
        for record in &registry.bots {
            let Ok(m) = record.lock() else { continue };
            if m.connected {
                agg.bots_connected += 1;
            }
            if !m.current_behavior.is_empty() {
                agg.bots_playing += 1;
            }
            agg.total_commands += m.commands_sent;
            agg.total_responses += m.responses_received;
            agg.total_bytes_sent += m.bytes_sent;
            agg.total_bytes_received += m.bytes_received;
            agg.total_kills += m.kills;
            agg.total_deaths += m.deaths;
            agg.total_xp += m.xp_gained;
            agg.total_connection_attempts += m.connection_attempts;
            agg.total_connection_failures += m.connection_failures;
            agg.total_parse_errors += m.parse_errors;
            agg.total_timeout_errors += m.timeout_errors;
            all_latencies.extend(m.latency_samples());
        }

        if !all_latencies.is_empty() {
            agg.avg_latency_ms = all_latencies.iter().sum::<f64>() / all_latencies.len() as f64;
            all_latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let idx = ((all_latencies.len() as f64) * 0.99) as usize;
            agg.p99_latency_ms = all_latencies[idx.min(all_latencies.len() - 1)];
        }
        agg
    }

    /// One compact status line for the monitor loop.
    pub fn live_status_line(&self) -> String {
        let agg = self.aggregate();
        format!(
            "[{:6.1}s] Bots: {}/{} | Cmds: {:5} ({:.1}/s) | Lat: {:5.1}ms | Kills: {} | Deaths: {}",
            agg.duration_seconds,
            agg.bots_connected,
            agg.total_bots,
            agg.total_commands,
            agg.commands_per_second(),
            agg.avg_latency_ms,
            agg.total_kills,
            agg.total_deaths,
        )
    }

    /// Multi-section human-readable final report.
    pub fn summary(&self) -> String {
        let agg = self.aggregate();
        let mut out = String::new();
        let bar = "=".repeat(60);
        out.push_str(&format!("{bar}\nLOAD TEST SUMMARY\n{bar}\n"));
        out.push_str(&format!("\nDuration: {:.1} seconds\n", agg.duration_seconds));
        out.push_str(&format!(
            "Bots: {}/{} connected, {} playing\n",
            agg.bots_connected, agg.total_bots, agg.bots_playing
        ));
        out.push_str(&format!(
            "\nConnections:\n  Attempts: {}\n  Failures: {}\n  Success rate: {:.1}%\n",
            agg.total_connection_attempts,
            agg.total_connection_failures,
            agg.connection_success_rate()
        ));
        out.push_str(&format!(
            "\nThroughput:\n  Commands sent: {}\n  Commands/sec: {:.1}\n  Bytes sent: {}\n  Bytes received: {}\n",
            agg.total_commands,
            agg.commands_per_second(),
            agg.total_bytes_sent,
            agg.total_bytes_received
        ));
        out.push_str(&format!(
            "\nLatency:\n  Average: {:.1} ms\n  P99: {:.1} ms\n",
            agg.avg_latency_ms, agg.p99_latency_ms
        ));
        out.push_str(&format!(
            "\nGame:\n  Kills: {}\n  Deaths: {}\n  XP gained: {}\n  Kills/min: {:.1}\n",
            agg.total_kills,
            agg.total_deaths,
            agg.total_xp,
            agg.kills_per_minute()
        ));
        out.push_str(&format!(
            "\nErrors:\n  Parse: {}\n  Timeout: {}\n{bar}\n",
            agg.total_parse_errors, agg.total_timeout_errors
        ));
        out
    }

    /// The JSON report document.
    pub fn to_json(&self, config: &RunConfig) -> serde_json::Value {
        let agg = self.aggregate();

        let mut per_bot = serde_json::Map::new();
        if let Ok(registry) = self.registry.lock() {
            for record in &registry.bots {
                let Ok(m) = record.lock() else { continue };
                per_bot.insert(
                    m.bot_id.clone(),
                    json!({
                        "connected": m.connected,
                        "commands": m.commands_sent,
                        "kills": m.kills,
                        "hp_percent": m.hp_percent,
                        "behavior": m.current_behavior,
                    }),
                );
            }
        }

        json!({
            "duration_seconds": agg.duration_seconds,
            "bots": {
                "total": agg.total_bots,
                "connected": agg.bots_connected,
                "playing": agg.bots_playing,
            },
            "connections": {
                "attempts": agg.total_connection_attempts,
                "failures": agg.total_connection_failures,
                "success_rate": agg.connection_success_rate(),
            },
            "throughput": {
                "commands_sent": agg.total_commands,
                "commands_per_second": agg.commands_per_second(),
                "bytes_sent": agg.total_bytes_sent,
                "bytes_received": agg.total_bytes_received,
            },
            "latency": {
                "avg_ms": agg.avg_latency_ms,
                "p99_ms": agg.p99_latency_ms,
            },
            "game": {
                "kills": agg.total_kills,
                "deaths": agg.total_deaths,
                "xp_gained": agg.total_xp,
                "kills_per_minute": agg.kills_per_minute(),
            },
            "errors": {
                "parse": agg.total_parse_errors,
                "timeout": agg.total_timeout_errors,
            },
            "per_bot": serde_json::Value::Object(per_bot),
            "config": serde_json::to_value(config).unwrap_or_default(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_closes_on_next_response_only() {
        let mut m = BotMetrics::new("b1");
        m.record_command_sent(5);
        m.record_response_received(100);
        assert_eq!(m.latency_window.len(), 1);

        // A response with no pending command records no sample.
        m.record_response_received(50);
        assert_eq!(m.latency_window.len(), 1);
    }

    #[test]
    fn latency_window_is_bounded() {
        let mut m = BotMetrics::new("b1");
        for _ in 0..(LATENCY_WINDOW + 20) {
            m.record_command_sent(1);
            m.record_response_received(1);
        }
        assert_eq!(m.latency_window.len(), LATENCY_WINDOW);
    }

    #[test]
    fn aggregate_sums_across_bots() {
        let collector = MetricsCollector::new();
        collector.start();
        let a = collector.register("a");
        let b = collector.register("b");

        {
            let mut a = a.lock().unwrap();
            a.connected = true;
            a.record_command_sent(10);
            a.record_kill(50);
        }
        {
            let mut b = b.lock().unwrap();
            b.connected = true;
            b.record_command_sent(10);
            b.record_command_sent(10);
            b.record_death();
        }

        let agg = collector.aggregate();
        assert_eq!(agg.total_bots, 2);
        assert_eq!(agg.bots_connected, 2);
        assert_eq!(agg.total_commands, 3);
        assert_eq!(agg.total_kills, 1);
        assert_eq!(agg.total_deaths, 1);
        assert_eq!(agg.total_xp, 50);
    }

    #[test]
    fn success_rate_with_no_attempts_is_full() {
        let agg = AggregateMetrics::default();
        assert_eq!(agg.connection_success_rate(), 100.0);
    }

    #[test]
    fn rates_zero_when_no_duration() {
        let agg = AggregateMetrics {
            total_commands: 100,
            total_kills: 5,
            ..AggregateMetrics::default()
        };
        assert_eq!(agg.commands_per_second(), 0.0);
        assert_eq!(agg.kills_per_minute(), 0.0);
    }

    #[test]
    fn json_report_shape() {
        let collector = MetricsCollector::new();
        collector.start();
        let a = collector.register("zaxx");
        {
            let mut a = a.lock().unwrap();
            a.connected = true;
            a.current_behavior = "Patrol".to_owned();
            a.hp_percent = 87.5;
            a.record_command_sent(4);
            a.record_kill(25);
        }
        collector.stop();

        let config = RunConfig {
            host: "localhost".to_owned(),
            port: 4000,
            num_bots: 1,
            duration: 60.0,
            targets: vec!["monster".to_owned()],
        };
        let doc = collector.to_json(&config);

        for key in [
            "duration_seconds",
            "bots",
            "connections",
            "throughput",
            "latency",
            "game",
            "errors",
            "per_bot",
            "config",
        ] {
            assert!(doc.get(key).is_some(), "missing {key}");
        }
        assert_eq!(doc["bots"]["total"], 1);
        assert_eq!(doc["per_bot"]["zaxx"]["kills"], 1);
        assert_eq!(doc["per_bot"]["zaxx"]["behavior"], "Patrol");
        assert_eq!(doc["config"]["port"], 4000);
        assert_eq!(doc["game"]["xp_gained"], 25);
    }

    #[test]
    fn flee_attempts_counter() {
        let mut m = BotMetrics::new("b");
        for _ in 0..5 {
            m.record_flee_attempt();
        }
        assert_eq!(m.flee_attempts, 5);
    }

    #[test]
    fn live_status_line_mentions_counts() {
        let collector = MetricsCollector::new();
        collector.start();
        let _ = collector.register("a");
        let line = collector.live_status_line();
        assert!(line.contains("Bots: 0/1"));
    }
}
