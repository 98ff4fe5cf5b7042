//! Command-line surface.
//!
//! Two credential modes, mutually exclusive:
//! - `--accounts PATH` drives a fleet from a `username:password` file;
//! - `--user`/`--password` drives a single bot.

use std::path::PathBuf;

use clap::Parser;

/// Multi-session load generator and autonomous player for DikuMUD/ROM
/// servers.
#[derive(Debug, Parser)]
#[command(name = "mudswarm", version, about)]
pub struct Args {
    /// MUD server hostname.
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// MUD server port.
    #[arg(long, default_value_t = 4000)]
    pub port: u16,

    /// Connect over TLS (certificate verification stays off for lab use).
    #[arg(long)]
    pub tls: bool,

    /// Verify the TLS certificate against the system roots.
    #[arg(long, requires = "tls")]
    pub tls_verify: bool,

    /// Accounts file: one username:password per line, # comments.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["user", "password"])]
    pub accounts: Option<PathBuf>,

    /// Single-bot mode: character name.
    #[arg(long, requires = "password")]
    pub user: Option<String>,

    /// Single-bot mode: password.
    #[arg(long)]
    pub password: Option<String>,

    /// Cap on concurrent bots (0 = use every account).
    #[arg(long, default_value_t = 0)]
    pub bots: usize,

    /// Test duration in seconds.
    #[arg(long, default_value_t = 300.0)]
    pub duration: f64,

    /// Delay between bot spawns in seconds.
    #[arg(long, default_value_t = 1.0)]
    pub stagger: f64,

    /// Attack whitelist keywords; empty attacks anything eligible.
    #[arg(long, value_name = "KW", num_args = 1..)]
    pub targets: Vec<String>,

    /// Health percent below which bots flee.
    #[arg(long = "flee-hp", default_value_t = 20.0)]
    pub flee_hp: f64,

    /// Health percent below which bots rest.
    #[arg(long = "rest-hp", default_value_t = 50.0)]
    pub rest_hp: f64,

    /// Write the JSON metrics report here.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Shorthand for --log-level debug.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Cross-flag validation clap can't express: exactly one credential
    /// source must be present.
    pub fn validate(&self) -> Result<(), String> {
        match (&self.accounts, &self.user) {
            (None, None) => {
                Err("either --accounts or --user/--password is required".to_owned())
            }
            _ => Ok(()),
        }
    }

    pub fn effective_log_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once(&"mudswarm").chain(args))
    }

    #[test]
    fn defaults() {
        let a = parse(&["--accounts", "bots.txt"]).unwrap();
        assert_eq!(a.host, "localhost");
        assert_eq!(a.port, 4000);
        assert!(!a.tls);
        assert_eq!(a.bots, 0);
        assert_eq!(a.duration, 300.0);
        assert_eq!(a.stagger, 1.0);
        assert_eq!(a.flee_hp, 20.0);
        assert_eq!(a.rest_hp, 50.0);
        assert!(a.targets.is_empty());
        assert_eq!(a.log_level, "info");
    }

    #[test]
    fn full_fleet_invocation() {
        let a = parse(&[
            "--host", "mud.lab", "--port", "5000", "--tls",
            "--accounts", "fleet.txt", "--bots", "25",
            "--duration", "600", "--stagger", "0.5",
            "--targets", "monster", "beast",
            "--flee-hp", "15", "--rest-hp", "60",
            "--output", "report.json",
        ])
        .unwrap();
        assert_eq!(a.host, "mud.lab");
        assert_eq!(a.port, 5000);
        assert!(a.tls);
        assert_eq!(a.bots, 25);
        assert_eq!(a.targets, vec!["monster", "beast"]);
        assert_eq!(a.output.as_deref(), Some(std::path::Path::new("report.json")));
        a.validate().unwrap();
    }

    #[test]
    fn single_bot_mode() {
        let a = parse(&["--user", "zaxx", "--password", "pw"]).unwrap();
        a.validate().unwrap();
        assert_eq!(a.user.as_deref(), Some("zaxx"));
    }

    #[test]
    fn accounts_and_user_conflict() {
        assert!(parse(&["--accounts", "f.txt", "--user", "zaxx", "--password", "pw"]).is_err());
    }

    #[test]
    fn user_requires_password() {
        assert!(parse(&["--user", "zaxx"]).is_err());
    }

    #[test]
    fn no_credentials_fails_validation() {
        let a = parse(&[]).unwrap();
        assert!(a.validate().is_err());
    }

    #[test]
    fn tls_verify_requires_tls() {
        assert!(parse(&["--tls-verify", "--accounts", "f.txt"]).is_err());
        assert!(parse(&["--tls", "--tls-verify", "--accounts", "f.txt"]).is_ok());
    }

    #[test]
    fn verbose_overrides_log_level() {
        let a = parse(&["--accounts", "f.txt", "-v"]).unwrap();
        assert_eq!(a.effective_log_level(), "debug");
        let a = parse(&["--accounts", "f.txt", "--log-level", "trace"]).unwrap();
        assert_eq!(a.effective_log_level(), "trace");
    }
}
