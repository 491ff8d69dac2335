// CLI entry point for the blockbot.
//
// Connects one bot to a server and runs it until the server disconnects or
// kicks it. Commands arrive through in-game chat and, with `--console`,
// from stdin. See `client.rs` for the session loop and `commands.rs` for
// the command list.
//
// Usage:
//   blockbot [OPTIONS]
//     --config <FILE>      JSON config file (read before other flags)
//     --host <HOST>        Server host (default: localhost)
//     --port <PORT>        Server port (default: 25565)
//     --user <NAME>        Username (default: blockbot)
//     --password <PASS>    Account / server password (optional)
//     --locations <FILE>   JSON file for marked places (default: in memory)
//     --log <FILTER>       Log filter, e.g. `debug` (default: $RUST_LOG or info)
//     --console            Read commands from stdin too

use std::path::PathBuf;

use blockbot_client::{
    BuiltinCommands, Client, ClientConfig, JsonLocationStore, MemoryLocationStore, OfflineSession,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

struct Args {
    config: ClientConfig,
    log: Option<String>,
    console: bool,
}

fn main() {
    let args = parse_args();

    let filter = match &args.log {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = args.config;
    info!(address = %config.address(), username = %config.username, "blockbot starting");

    let router = match &config.locations_path {
        Some(path) => match JsonLocationStore::open(path) {
            Ok(store) => BuiltinCommands::new(store),
            Err(e) => {
                eprintln!("Failed to open location store: {e}");
                std::process::exit(1);
            }
        },
        None => BuiltinCommands::new(MemoryLocationStore::new()),
    };

    let mut client = match Client::connect(&config, Box::new(OfflineSession), Box::new(router)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect to {}: {e}", config.address());
            std::process::exit(1);
        }
    };
    if args.console {
        client.attach_console();
    }

    match client.run() {
        Ok(()) => info!("disconnected"),
        Err(e) => {
            error!(error = %e, "session failed");
            std::process::exit(1);
        }
    }
}

fn value(args: &[String], i: usize, flag: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("{flag} requires a value");
        std::process::exit(1);
    })
}

/// Parse command-line arguments. `--config` is applied first wherever it
/// appears, so the other flags override the file.
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();

    let mut config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = PathBuf::from(value(&args, i + 1, "--config"));
            ClientConfig::load(&path).unwrap_or_else(|e| {
                eprintln!("{e}");
                std::process::exit(1);
            })
        }
        None => ClientConfig::default(),
    };
    let mut log = None;
    let mut console = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
            }
            "--host" => {
                i += 1;
                config.host = value(&args, i, "--host");
            }
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--user" => {
                i += 1;
                config.username = value(&args, i, "--user");
            }
            "--password" => {
                i += 1;
                config.password = Some(value(&args, i, "--password"));
            }
            "--locations" => {
                i += 1;
                config.locations_path = Some(PathBuf::from(value(&args, i, "--locations")));
            }
            "--log" => {
                i += 1;
                log = Some(value(&args, i, "--log"));
            }
            "--console" => console = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    Args {
        config,
        log,
        console,
    }
}

fn print_usage() {
    println!("Usage: blockbot [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <FILE>      JSON config file (read before other flags)");
    println!("  --host <HOST>        Server host (default: localhost)");
    println!("  --port <PORT>        Server port (default: 25565)");
    println!("  --user <NAME>        Username (default: blockbot)");
    println!("  --password <PASS>    Account / server password (optional)");
    println!("  --locations <FILE>   JSON file for marked places (default: in memory)");
    println!("  --log <FILTER>       Log filter, e.g. debug (default: $RUST_LOG or info)");
    println!("  --console            Read commands from stdin too");
    println!("  --help, -h           Show this help");
}
