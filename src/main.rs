//! Control server binary
//!
//! Run the server:
//!   frontman /dev/ttyUSB0 [--players N] [--allow-revive] [--disable-kills]
//!            [--bind ADDR] [--state FILE]
//!
//! Board maintenance (one-shot, then exit):
//!   frontman /dev/ttyUSB0 set-id 7
//!   frontman /dev/ttyUSB0 read-id
//!   frontman /dev/ttyUSB0 arm | disarm | reset
//!   frontman /dev/ttyUSB0 kill 2 4 17
//!
//! Reseed the snapshot from a file of surviving player numbers (one per
//! line; everyone else is marked dead):
//!   frontman seed-alive survivors.txt [--players N] [--state FILE]

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::process;
use std::time::Duration;

use frontman::device::DeviceLink;
use frontman::protocol::constants::DEFAULT_BAUD_RATE;
use frontman::protocol::DeviceCommand;
use frontman::roster::RosterStore;
use frontman::server::DEFAULT_PLAYER_COUNT;
use frontman::{Result, Server, ServerConfig};

const USAGE: &str = "\
usage: frontman <device> [--players N] [--allow-revive] [--disable-kills]
                [--bind ADDR] [--state FILE]
       frontman <device> set-id <n> | read-id | arm | disarm | reset | kill <n>...
       frontman seed-alive <file> [--players N] [--state FILE]";

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut positionals: Vec<String> = Vec::new();
    let mut players = DEFAULT_PLAYER_COUNT;
    let mut allow_revive = false;
    let mut disable_kills = false;
    let mut bind: Option<SocketAddr> = None;
    let mut state = String::from("state.json");

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--players" => {
                let value = iter.next().unwrap_or_else(|| usage_error("--players needs a value"));
                players = parse_number(value, "--players");
            }
            "--allow-revive" => allow_revive = true,
            "--disable-kills" => disable_kills = true,
            "--bind" => {
                let value = iter.next().unwrap_or_else(|| usage_error("--bind needs a value"));
                bind = Some(
                    value
                        .parse()
                        .unwrap_or_else(|_| usage_error("--bind needs HOST:PORT")),
                );
            }
            "--state" => {
                let value = iter.next().unwrap_or_else(|| usage_error("--state needs a value"));
                state = value.clone();
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                return Ok(());
            }
            flag if flag.starts_with("--") => usage_error("unknown flag"),
            _ => positionals.push(arg.clone()),
        }
    }

    match positionals.first().map(String::as_str) {
        None => usage_error("a serial device path is required"),
        Some("seed-alive") => {
            let file = positionals
                .get(1)
                .unwrap_or_else(|| usage_error("seed-alive needs a survivor file"));
            seed_alive(file, &state, players, allow_revive).await
        }
        Some(device) => match positionals.get(1) {
            None => {
                let mut config = ServerConfig::new(device)
                    .player_count(players)
                    .allow_revive(allow_revive)
                    .disable_kills(disable_kills)
                    .snapshot_path(&state);
                if let Some(addr) = bind {
                    config = config.bind(addr);
                }

                let server = Server::new(config).await?;
                server
                    .run_until(async {
                        let _ = tokio::signal::ctrl_c().await;
                    })
                    .await
            }
            Some(command) => run_maintenance(device, command, &positionals[2..]).await,
        },
    }
}

/// Regenerate the snapshot from a survivor list: everyone dead except the
/// numbers listed in `file`
async fn seed_alive(file: &str, state: &str, players: u32, allow_revive: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)?;
    let mut survivors = BTreeSet::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        survivors.insert(parse_number(line, "survivor file"));
    }

    let store = RosterStore::open(state, players, allow_revive).await?;
    store.reseed(&survivors).await?;
    tracing::info!(survivors = survivors.len(), state = %state, "Roster reseeded");
    Ok(())
}

/// One-shot board maintenance commands, driving the link directly
async fn run_maintenance(device_path: &str, command: &str, rest: &[String]) -> Result<()> {
    let link = DeviceLink::open(device_path, DEFAULT_BAUD_RATE)?;
    // The board takes a moment to boot once the port opens.
    tokio::time::sleep(Duration::from_secs(1)).await;

    match command {
        "set-id" => {
            let number = rest
                .first()
                .unwrap_or_else(|| usage_error("set-id needs a board number"));
            link.send(&DeviceCommand::SetId(parse_number(number, "set-id")))
                .await
        }
        "read-id" => {
            link.spawn_monitor().await?;
            link.send(&DeviceCommand::ReadId).await?;
            // Leave the monitor a moment to log the reply line.
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        }
        "arm" => link.send(&DeviceCommand::Arm(true)).await,
        "disarm" => link.send(&DeviceCommand::Arm(false)).await,
        "reset" => link.reset().await,
        "kill" => {
            if rest.is_empty() {
                usage_error("kill needs at least one player number");
            }
            let ids: BTreeSet<u32> = rest.iter().map(|n| parse_number(n, "kill")).collect();
            link.send(&DeviceCommand::Detonate(ids)).await
        }
        _ => usage_error("unknown maintenance command"),
    }
}

fn parse_number(value: &str, context: &str) -> u32 {
    value
        .parse()
        .unwrap_or_else(|_| usage_error(&format!("{}: expected a number, got {:?}", context, value)))
}

fn usage_error(message: &str) -> ! {
    eprintln!("error: {}\n\n{}", message, USAGE);
    process::exit(2);
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
