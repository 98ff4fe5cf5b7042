use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mudswarm::cli::Args;
use mudswarm::coordinator::{load_accounts, Account, Coordinator, CoordinatorConfig};
use mudswarm::metrics::RunConfig;

const EXIT_OK: u8 = 0;
const EXIT_FAILURE: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG, when set, wins over the flags.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.effective_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = args.validate() {
        error!("{e}");
        return ExitCode::from(EXIT_FAILURE);
    }

    // Credentials: a fleet file or a single inline account.
    let accounts: Vec<Account> = if let Some(path) = &args.accounts {
        match load_accounts(path) {
            Ok(accounts) if !accounts.is_empty() => accounts,
            Ok(_) => {
                error!("accounts file {} holds no usable accounts", path.display());
                return ExitCode::from(EXIT_FAILURE);
            }
            Err(e) => {
                error!("cannot read accounts file {}: {e}", path.display());
                return ExitCode::from(EXIT_FAILURE);
            }
        }
    } else {
        // validate() guarantees user+password here; clap ties them together.
        let (Some(user), Some(password)) = (&args.user, &args.password) else {
            error!("--user requires --password");
            return ExitCode::from(EXIT_FAILURE);
        };
        vec![Account {
            username: user.clone(),
            password: password.clone(),
        }]
    };

    let config = CoordinatorConfig {
        host: args.host.clone(),
        port: args.port,
        tls: args.tls,
        verify_tls: args.tls_verify,
        accounts,
        num_bots: args.bots,
        stagger_delay: Duration::from_secs_f64(args.stagger.max(0.0)),
        runtime: Duration::from_secs_f64(args.duration.max(0.0)),
        flee_hp_percent: args.flee_hp,
        rest_hp_percent: args.rest_hp,
        targets: args.targets.clone(),
        ..CoordinatorConfig::default()
    };
    let num_bots = config.selected_accounts().len();

    let coordinator = Coordinator::new(config);
    let outcome = coordinator.run().await;

    // The report prints even after a partial failure.
    println!("{}", coordinator.collector().summary());

    if let Some(path) = &args.output {
        let run_config = RunConfig {
            host: args.host.clone(),
            port: args.port,
            num_bots,
            duration: args.duration,
            targets: args.targets.clone(),
        };
        let doc = coordinator.collector().to_json(&run_config);
        match serde_json::to_string_pretty(&doc) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    error!("cannot write {}: {e}", path.display());
                    return ExitCode::from(EXIT_FAILURE);
                }
                println!("Metrics written to {}", path.display());
            }
            Err(e) => {
                error!("cannot serialize metrics: {e}");
                return ExitCode::from(EXIT_FAILURE);
            }
        }
    }

    if outcome.interrupted {
        return ExitCode::from(EXIT_INTERRUPTED);
    }
    if outcome.all_connections_failed {
        error!("every connection attempt failed");
        return ExitCode::from(EXIT_FAILURE);
    }
    ExitCode::from(EXIT_OK)
}
