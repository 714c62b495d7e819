use std::collections::BTreeSet;
use std::env;
use std::io;
use std::path::Path;

use swap_pool::access::Unrestricted;
use swap_pool::csv::{Input, read_inputs, write_swaps};
use swap_pool::snapshot::Snapshot;
use swap_pool::{Address, AssetLedger, InMemoryLedger, SwapPool, SwapStatus};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Custody account of the in-memory asset ledger
const POOL_ADDRESS: Address = Address::repeat_byte(0xee);

const USAGE: &str = "usage: swap-pool <calls.csv> [state.json]
balances are not part of state.json: seed custody of pending swaps with mint rows";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let calls_path = args.next().expect(USAGE);
    let state_path = args.next();

    if !calls_path.ends_with(".csv") {
        warn!(path = %calls_path, "input file seems to not be a csv file");
    }

    // seed balances before any call runs, row errors are reported by the producer
    let mut ledger = InMemoryLedger::new(POOL_ADDRESS);
    let rows = match read_inputs(&calls_path) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    for input in rows.flatten() {
        match input {
            Input::Mint {
                asset,
                account,
                amount,
            } => {
                if let Err(e) = ledger.mint(asset, account, amount) {
                    warn!("{e}");
                }
            }
            Input::Approve {
                asset,
                owner,
                amount,
            } => ledger.approve(asset, owner, amount),
            Input::Call(_) => {}
        }
    }

    let mut pool = match state_path.as_deref().filter(|p| Path::new(p).exists()) {
        Some(path) => {
            let snapshot = Snapshot::load(path).expect("failed to load state");
            info!(path, swaps = snapshot.swaps.len(), "state loaded");
            SwapPool::restore(snapshot, ledger, Unrestricted).expect("invalid state")
        }
        None => SwapPool::new(ledger),
    };

    let escrowed_assets: BTreeSet<Address> = pool
        .swaps()
        .filter(|s| s.status == SwapStatus::Pending)
        .map(|s| s.in_asset)
        .collect();
    for asset in escrowed_assets {
        let held = pool.assets().custody_balance(asset);
        let escrowed = pool.escrowed(&asset);
        if held < escrowed {
            warn!(%asset, %held, %escrowed, "custody below escrowed total, declines may fail");
        }
    }

    let (call_sender, call_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        let rows = match read_inputs(&calls_path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };
        for result in rows {
            match result {
                Ok(Input::Call(call)) => {
                    if call_sender.send(call).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("{e}"),
            }
        }
    });

    pool.run(ReceiverStream::new(call_receiver)).await;

    for event in pool.drain_events() {
        info!(?event, "event");
    }

    write_swaps(pool.swaps(), io::stdout().lock()).expect("failed to write swaps");

    if let Some(path) = state_path {
        pool.snapshot()
            .save(&path)
            .expect("failed to save state");
    }
}
