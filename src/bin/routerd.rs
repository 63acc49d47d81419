// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Standalone entry point that wires up the routing core in isolation: a
//! router worker pool, the retained store, and the broker dispatch path,
//! with no transport listeners attached (those are external collaborators,
//! spec §1). Useful for smoke-testing a deployment's `routing.*` config and
//! for embedding in integration harnesses that attach their own listeners.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;

use routercore::config::Config;
use routercore::dispatch::Broker;
use routercore::error::{Error, ErrorKind, Result};
use routercore::retained::RetainedStore;
use routercore::route::RouterWorkerPool;

const LOG_FILE_SIZE: u64 = 16 * 1024 * 1024;
const LOG_ROLLER_COUNT: u32 = 10;

#[derive(Parser, Debug)]
#[command(name = "routerd", about = "MQTT broker routing/dispatch core")]
struct Cli {
    /// Path to a TOML config file; falls back to built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the rolling log file.
    #[arg(long, default_value = "./log")]
    log_dir: PathBuf,

    /// This node's cluster identifier.
    #[arg(long, default_value_t = 1)]
    node_id: u32,

    /// Validate the config and exit without starting anything.
    #[arg(short = 't', long)]
    test_config: bool,
}

fn init_log(log_dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join("routerd.log");

    let stdout = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{d} {h({l})} - {m}{n}")))
        .build();

    let roller_pattern = format!("{}.{{}}.gz", log_path.display());
    let roller = FixedWindowRoller::builder()
        .build(&roller_pattern, LOG_ROLLER_COUNT)
        .map_err(|err| Error::new(ErrorKind::Internal, format!("log roller init failed: {err}")))?;
    let policy = Box::new(CompoundPolicy::new(
        Box::new(SizeTrigger::new(LOG_FILE_SIZE)),
        Box::new(roller),
    ));
    let rolling = RollingFileAppender::builder()
        .build(&log_path, policy)
        .map_err(|err| Error::new(ErrorKind::Internal, format!("log file init failed: {err}")))?;

    const STDOUT: &str = "stdout";
    const ROLLER: &str = "roller";
    let config = log4rs::Config::builder()
        .appender(Appender::builder().build(STDOUT, Box::new(stdout)))
        .appender(Appender::builder().build(ROLLER, Box::new(rolling)))
        .build(Root::builder().appenders([STDOUT, ROLLER]).build(log::LevelFilter::Info))
        .map_err(|err| Error::new(ErrorKind::Internal, format!("log4rs config failed: {err}")))?;

    log4rs::init_config(config)
        .map_err(|err| Error::new(ErrorKind::Internal, format!("log4rs init failed: {err}")))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if cli.test_config {
        println!("config ok");
        return Ok(());
    }

    init_log(&cli.log_dir)?;
    log::info!(
        "routerd starting: node_id={} worker_pool_size={} lock_mode={:?}",
        cli.node_id,
        config.routing.worker_pool_size,
        config.routing.lock_mode
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let routes = Arc::new(RouterWorkerPool::spawn(
            config.routing.worker_pool_size,
            config.routing.lock_mode,
            None,
        ));
        let retained = Arc::new(RetainedStore::new());
        let _broker = Broker::new(
            cli.node_id,
            routes,
            retained,
            config.shared_subscription.policy,
            None,
        );

        log::info!("routing core ready; no transport listeners attached (out of scope)");
        tokio::signal::ctrl_c().await.ok();
        log::info!("routerd shutting down");
    });

    Ok(())
}
