/*!
 * blocksync - block-delta file synchronization over TCP
 *
 * Subcommands:
 *   serve --port <N> [--block-size <B>]
 *   push  <local> <host> <port> <remote>
 *   pull  <host> <port> <remote> <local>
 */

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, Command};

use blocksync::config::{ConfigFile, HashAlgorithm};
use blocksync::{client, logging, server, SyncConfig};

fn build_config(matches: &clap::ArgMatches) -> SyncConfig {
    let mut config = SyncConfig::default();
    ConfigFile::load_with_fallback().apply_to(&mut config);

    if let Some(block_size) = matches.get_one::<usize>("block-size") {
        config.block_size = *block_size;
    }
    if let Some(algo) = matches.get_one::<String>("hash-algorithm") {
        if let Ok(parsed) = algo.parse::<HashAlgorithm>() {
            config.hash_algorithm = parsed;
        }
    }

    config
}

fn main() -> Result<()> {
    let matches = Command::new("blocksync")
        .version("0.1.0")
        .about("Block-delta file synchronization over TCP, rsync-inspired")
        .arg(
            Arg::new("block-size")
                .long("block-size")
                .global(true)
                .value_name("BYTES")
                .help("Block size used by both sides of a transaction")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("hash-algorithm")
                .long("hash-algorithm")
                .global(true)
                .value_name("ALGO")
                .help("Strong hash algorithm: blake3 or sha256"),
        )
        .subcommand(
            Command::new("serve")
                .about("Listen for PUSH/PULL transactions")
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_name("PORT")
                        .help("Port to bind (default 9031)")
                        .value_parser(clap::value_parser!(u16)),
                ),
        )
        .subcommand(
            Command::new("push")
                .about("Send a local file to a remote peer")
                .arg(Arg::new("local").value_name("LOCAL").required(true))
                .arg(Arg::new("host").value_name("HOST").required(true))
                .arg(
                    Arg::new("port")
                        .value_name("PORT")
                        .required(true)
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(Arg::new("remote").value_name("REMOTE").required(true)),
        )
        .subcommand(
            Command::new("pull")
                .about("Fetch a remote file down to a local destination")
                .arg(Arg::new("host").value_name("HOST").required(true))
                .arg(
                    Arg::new("port")
                        .value_name("PORT")
                        .required(true)
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(Arg::new("remote").value_name("REMOTE").required(true))
                .arg(Arg::new("local").value_name("LOCAL").required(true)),
        )
        .get_matches();

    let config = build_config(&matches);
    logging::init_logging(&config).context("failed to initialize logging")?;

    match matches.subcommand() {
        Some(("serve", sub)) => {
            let mut config = config;
            if let Some(port) = sub.get_one::<u16>("port") {
                config.bind_addr = format!("0.0.0.0:{}", port);
            }
            server::serve(config).context("server exited with an error")?;
        }
        Some(("push", sub)) => {
            let local: PathBuf = sub.get_one::<String>("local").unwrap().into();
            let host = sub.get_one::<String>("host").unwrap();
            let port = *sub.get_one::<u16>("port").unwrap();
            let remote = sub.get_one::<String>("remote").unwrap();
            client::push(host, port, &local, remote, &config).context("push failed")?;
            println!("push complete: {} -> {}:{}:{}", local.display(), host, port, remote);
        }
        Some(("pull", sub)) => {
            let host = sub.get_one::<String>("host").unwrap();
            let port = *sub.get_one::<u16>("port").unwrap();
            let remote = sub.get_one::<String>("remote").unwrap();
            let local: PathBuf = sub.get_one::<String>("local").unwrap().into();
            client::pull(host, port, remote, &local, &config).context("pull failed")?;
            println!("pull complete: {}:{}:{} -> {}", host, port, remote, local.display());
        }
        _ => {
            eprintln!("no subcommand given; use --help for usage");
            std::process::exit(2);
        }
    }

    Ok(())
}
