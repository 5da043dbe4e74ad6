//! CLI command handler: resolve settings, run one sync, report.

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::engine::arg_parser::Cli;
use crate::engine::core::Synchronizer;
use crate::engine::progress::{create_counter, refresh_bar, track_event};
use crate::engine::tools::{absolutize, window_secs_to_ns};
use crate::events::{ChannelSink, EventSink};
use crate::store::CatalogStore;
use crate::utils::catalog_toml::{apply_file_to_opts, load_catalog_toml};
use crate::utils::setup_logging;
use crate::{CatalogChangeEvent, CatalogOpts};

/// Defaults, then `.photocat.toml` in DIR, then CLI flags.
fn setup_opts(cli: &Cli) -> CatalogOpts {
    let mut opts = CatalogOpts::for_root(absolutize(&cli.dir));
    if let Some(file) = load_catalog_toml(&opts.root) {
        apply_file_to_opts(&file, &mut opts);
    }
    if let Some(ref p) = cli.store {
        opts.store_dir = absolutize(p);
    }
    if let Some(ref p) = cli.backups {
        opts.backups_dir = absolutize(p);
    }
    if let Some(ref p) = cli.frames {
        opts.first_frame_dir = absolutize(p);
    }
    if let Some(n) = cli.batch {
        opts.batch_size = n;
    }
    if let Some(w) = cli.thumb_width {
        opts.thumbnail_max_width = w;
    }
    if let Some(h) = cli.thumb_height {
        opts.thumbnail_max_height = h;
    }
    if let Some(mode) = cli.hash {
        opts.hash_mode = mode;
    }
    if let Some(v) = cli.videos {
        opts.analyse_videos = v;
    }
    if let Some(v) = cli.verbose {
        opts.verbose = v;
    }
    if let Some(secs) = cli.mtime_window {
        opts.mtime_window_ns = window_secs_to_ns(secs);
    }
    setup_logging(opts.verbose, cli.json);
    opts
}

/// Drain events on a separate thread: JSON lines, or a counter in verbose mode.
fn spawn_event_consumer(
    rx: Receiver<CatalogChangeEvent>,
    json: bool,
    verbose: bool,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let bar = (verbose && !json).then(|| {
            let b = create_counter("Cataloging");
            refresh_bar(&b);
            b
        });
        for event in rx {
            if json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("cannot serialize {} event: {e}", event.reason()),
                }
            } else if let Some(ref bar) = bar {
                track_event(bar, &event);
            }
        }
        if bar.is_some() {
            eprintln!();
        }
    })
}

/// Run one sync over DIR. Ctrl+C stops after the current step; nothing is persisted then.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );

    let cancel_requested = Arc::new(AtomicBool::new(false));
    let cancel_requested_handler = Arc::clone(&cancel_requested);
    ctrlc::set_handler(move || {
        cancel_requested_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    let mut store = CatalogStore::open(&opts.store_dir)?;
    let (tx, rx) = crossbeam_channel::unbounded();
    let consumer = spawn_event_consumer(rx, cli.json, opts.verbose);
    let summary = {
        let mut sink = ChannelSink(tx);
        Synchronizer::new(&opts, &mut store)
            .synchronize(Some(&mut sink as &mut dyn EventSink), Some(&cancel_requested))
    };
    consumer
        .join()
        .map_err(|_| anyhow::anyhow!("event consumer thread panicked"))?;

    if summary.errored {
        anyhow::bail!("synchronization of {} failed", opts.root.display());
    }
    if summary.cancelled {
        warn!("Sync cancelled by user; pending changes were not persisted");
    }
    Ok(())
}
