mod auth;
mod bulk;
mod cache;
mod config;
mod db;
mod error;
mod ipc;
mod model;
mod notify;
mod roster;
mod stats;
mod store;

use clap::Parser;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging() {
    // stdout carries the protocol; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn main() {
    let args = config::Args::parse();
    init_logging();

    let (events_tx, events_rx) = mpsc::channel();
    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        tokens: auth::TokenSigner::new(
            args.token_secret(),
            chrono::Duration::hours(args.token_ttl_hours),
        ),
        hub: notify::SubscriptionHub::new(),
        history_cache: cache::TtlCache::new(Duration::from_secs(args.history_cache_ttl_secs)),
        events: events_tx,
        subscriptions: HashMap::new(),
    };

    if let Some(path) = args.workspace.clone() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(error = ?e, "failed to open startup workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; report anyway.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        // Events raised while handling the request follow its response.
        for event in events_rx.try_iter() {
            if let Ok(s) = serde_json::to_string(&event) {
                let _ = writeln!(stdout, "{}", s);
            }
        }
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed, exiting");
}
