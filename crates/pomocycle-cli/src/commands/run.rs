use std::path::Path;
use std::time::Duration;

use clap::Args;
use pomocycle_core::storage::CueConfig;
use pomocycle_core::timer::{CommandCueSink, CueSink, Engine, LogCueSink};
use pomocycle_core::Config;

use super::config_path;
use crate::{render, server};

const RENDER_PERIOD: Duration = Duration::from_millis(250);

#[derive(Args)]
pub struct RunArgs {
    /// Do not start the HTTP status server
    #[arg(long)]
    no_server: bool,
    /// Do not draw progress bars
    #[arg(long)]
    no_render: bool,
    /// Seconds to keep the diagnostic visible before exiting on a config error
    #[arg(long, default_value = "5")]
    exit_delay_secs: u64,
}

fn build_sink(cues: &CueConfig) -> Box<dyn CueSink> {
    if !cues.enabled {
        return Box::new(LogCueSink);
    }
    Box::new(CommandCueSink::new(
        cues.sounds_dir.clone(),
        cues.sounds.clone(),
        cues.player.clone(),
    ))
}

pub fn run(explicit: Option<&Path>, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path(explicit)?;
    let config = match Config::load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            eprintln!("create one with `pomocycle config init`");
            std::thread::sleep(Duration::from_secs(args.exit_delay_secs));
            return Err(e.into());
        }
    };
    tracing::info!(path = %path.display(), config = ?config, "configuration loaded");

    let handle = Engine::start(&config, build_sink(&config.cues))?;
    let reader = handle.reader();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let server_task = if config.server.enabled && !args.no_server {
            let addr = config.server.addr();
            let reader = reader.clone();
            Some(tokio::spawn(async move {
                let shutdown = async move {
                    let _ = stop_rx.await;
                };
                if let Err(e) = server::serve(reader, &addr, shutdown).await {
                    tracing::error!(addr = %addr, error = %e, "status server failed");
                }
            }))
        } else {
            None
        };

        let render_enabled = !args.no_render;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    tracing::error!(error = %e, "failed to listen for ctrl-c");
                }
            }
            _ = render::run(reader.clone(), RENDER_PERIOD), if render_enabled => {}
        }

        let _ = stop_tx.send(());
        if let Some(task) = server_task {
            let _ = task.await;
        }
    });

    if !args.no_render {
        println!();
    }
    // Waits are not preemptible; the driver thread is left to end with the
    // process instead of blocking exit until its current interval is over.
    handle.shutdown_signal().request();
    tracing::info!("shutdown requested, exiting");
    Ok(())
}
