//! Desktop build: same request handling and transmit loop as the firmware,
//! with the IR LED replaced by an edge counter.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc, Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use tokio::net::TcpListener;
use thread_priority::{set_current_thread_priority, ThreadPriority};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use ac_remote_common::{config::IrHardwareConfig, IrOutput, RemoteControl, RuntimeConfig};

const HOST_MIN_STACK_SIZE: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    remote: RemoteControl,
}

/// Stands in for the IR LED. Delays spin on the monotonic clock like the
/// ROM delay does on the target.
struct SimulatedIrOutput {
    high: bool,
    rising_edges: Arc<AtomicU64>,
}

impl IrOutput for SimulatedIrOutput {
    fn set_high(&mut self) {
        if !self.high {
            self.rising_edges.fetch_add(1, Ordering::Relaxed);
        }
        self.high = true;
    }

    fn set_low(&mut self) {
        self.high = false;
    }

    fn delay_us(&mut self, us: u32) {
        spin_wait(Duration::from_micros(u64::from(us)));
    }
}

fn spin_wait(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut runtime = RuntimeConfig::default();
    runtime.ir.sanitize();
    runtime.ir.validate().context("invalid IR configuration")?;

    let remote = RemoteControl::new(runtime.ir.timing());
    spawn_transmit_task(&remote, &runtime.ir)?;

    let app = router(AppState { remote });

    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    Router::new()
        .route("/toggle", get(handle_toggle))
        .route("/api/ir/diagnostics", get(handle_get_ir_diagnostics))
        .fallback_service(ServeDir::new(web_root))
        .with_state(state)
}

/// What the OS granted the transmit thread.
#[derive(Debug)]
struct TransmitIsolation {
    pinned_core: Option<usize>,
    /// Cores the thread may still run on after pinning.
    visible_cores: usize,
    priority_error: Option<String>,
}

/// Raises the calling thread to the highest priority the OS allows and pins
/// it to one core, so the spin-waits are neither preempted by tokio workers
/// nor migrated mid-frame.
fn isolate_current_thread(core_index: usize) -> TransmitIsolation {
    let priority_error = set_current_thread_priority(ThreadPriority::Max)
        .err()
        .map(|err| format!("{err:?}"));

    let pinned_core = core_affinity::get_core_ids().and_then(|ids| {
        let core = ids.get(core_index).or_else(|| ids.last()).copied()?;
        core_affinity::set_for_current(core).then_some(core.id)
    });
    let visible_cores = core_affinity::get_core_ids().map_or(0, |ids| ids.len());

    TransmitIsolation {
        pinned_core,
        visible_cores,
        priority_error,
    }
}

/// The transmit loop blocks its thread for the whole frame, so it gets a
/// dedicated OS thread rather than a tokio worker.
fn spawn_transmit_task(
    remote: &RemoteControl,
    ir: &IrHardwareConfig,
) -> anyhow::Result<TransmitIsolation> {
    let task = remote.transmit_task(SimulatedIrOutput {
        high: false,
        rising_edges: Arc::new(AtomicU64::new(0)),
    });
    let core_index = usize::from(ir.transmit_core);
    let (report_tx, report_rx) = mpsc::channel();

    thread::Builder::new()
        .name("ir-tx".into())
        .stack_size(ir.transmit_stack_size.max(HOST_MIN_STACK_SIZE))
        .spawn(move || {
            let _ = report_tx.send(isolate_current_thread(core_index));
            task.run();
        })
        .context("failed to spawn IR transmit thread")?;

    let isolation = report_rx
        .recv_timeout(Duration::from_secs(1))
        .map_err(|err| anyhow!("IR transmit thread did not report its setup: {err}"))?;

    if let Some(err) = &isolation.priority_error {
        warn!("could not raise IR transmit thread priority, waveform timing may jitter: {err}");
    }
    match isolation.pinned_core {
        Some(core) => info!(
            "IR transmit thread pinned to core {core} ({} visible)",
            isolation.visible_cores
        ),
        None => warn!("could not pin IR transmit thread to a core, it may migrate mid-frame"),
    }

    info!(
        "simulated IR transmitter on GPIO{} ({} Hz carrier)",
        ir.tx_pin,
        remote.timing().carrier_hz()
    );
    Ok(isolation)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn handle_toggle(State(state): State<AppState>) -> &'static str {
    state.remote.on_toggle().as_str()
}

async fn handle_get_ir_diagnostics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.remote.diagnostics())
}

#[cfg(test)]
mod tests {
    use ac_remote_common::CarrierTiming;

    use super::*;

    fn app_state() -> AppState {
        AppState {
            remote: RemoteControl::new(CarrierTiming::default()),
        }
    }

    #[tokio::test]
    async fn toggle_reports_alternating_state() {
        let state = app_state();

        assert_eq!(handle_toggle(State(state.clone())).await, "ON");
        assert_eq!(handle_toggle(State(state.clone())).await, "OFF");
        assert_eq!(handle_toggle(State(state)).await, "ON");
    }

    #[tokio::test]
    async fn toggles_without_consumer_stay_pending_as_one() {
        let state = app_state();

        handle_toggle(State(state.clone())).await;
        handle_toggle(State(state.clone())).await;

        let diagnostics = state.remote.diagnostics();
        assert!(diagnostics.pending);
        assert_eq!(diagnostics.signals, 2);
        assert_eq!(diagnostics.coalesced, 1);
        assert_eq!(diagnostics.transmissions, 0);
    }

    #[test]
    fn transmit_thread_is_pinned_or_reports_why_not() {
        let remote = RemoteControl::new(CarrierTiming::default());
        let isolation = spawn_transmit_task(&remote, &IrHardwareConfig::default()).unwrap();

        if isolation.pinned_core.is_some() {
            assert_eq!(isolation.visible_cores, 1);
        }
        if let Some(err) = &isolation.priority_error {
            assert!(!err.is_empty());
        }
    }

    #[test]
    fn isolation_pins_the_calling_thread() {
        let isolation = thread::spawn(|| isolate_current_thread(0)).join().unwrap();

        if let Some(core) = isolation.pinned_core {
            let available = core_affinity::get_core_ids().unwrap_or_default();
            assert!(available.iter().any(|id| id.id == core));
            assert_eq!(isolation.visible_cores, 1);
        }
    }

    #[test]
    fn simulated_output_counts_carrier_cycles() {
        let remote = RemoteControl::new(CarrierTiming::default());
        let rising_edges = Arc::new(AtomicU64::new(0));
        let mut task = remote.transmit_task(SimulatedIrOutput {
            high: false,
            rising_edges: rising_edges.clone(),
        });

        remote.on_toggle();
        assert!(task.poll(Duration::from_millis(100)));

        let marks = ac_remote_common::frame::bits()
            .filter(|bit| *bit == ac_remote_common::Bit::One)
            .count() as u64;
        let cycles = u64::from(remote.timing().cycles_per_mark());
        assert_eq!(rising_edges.load(Ordering::Relaxed), marks * cycles);
        assert_eq!(remote.stats().transmissions(), 1);
    }
}
