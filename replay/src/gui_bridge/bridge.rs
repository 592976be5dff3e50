use crate::generator::scenario::{ScenarioConfig, SyntheticScenario};
use crate::gui_bridge::model::SyncSnapshot;
use crate::workflow::runner::Runner;
use anyhow::Result;
use log::{error, info};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

#[derive(Debug)]
struct WarpError;

impl warp::reject::Reject for WarpError {}

type SharedSnapshot = Arc<RwLock<SyncSnapshot>>;

fn read_state(state: &RwLock<SyncSnapshot>) -> RwLockReadGuard<'_, SyncSnapshot> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_state(state: &RwLock<SyncSnapshot>) -> RwLockWriteGuard<'_, SyncSnapshot> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

/// Bridge that serves the latest sync snapshot over HTTP and runs scenarios on request.
pub struct GuiBridge {
    state: SharedSnapshot,
}

impl GuiBridge {
    pub fn new(runner: Arc<Runner>, addr: SocketAddr) -> Self {
        let state: SharedSnapshot = Arc::new(RwLock::new(SyncSnapshot::default()));
        let state_for_filter = state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());
        let runner_filter = warp::any().map(move || runner.clone());

        let snapshot_route = warp::path("snapshot")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: SharedSnapshot| warp::reply::json(&*read_state(&state)));

        let history_route = warp::path("history")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: SharedSnapshot| warp::reply::json(&read_state(&state).history));

        let summary_route = warp::path("summary")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: SharedSnapshot| warp::reply::json(&read_state(&state).summary));

        let scenario_route = warp::path("ingest-config")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter)
            .and(runner_filter)
            .and_then(
                |config: ScenarioConfig, state: SharedSnapshot, runner: Arc<Runner>| async move {
                    let config = config.aligned_with(runner.sync());
                    let played = SyntheticScenario::generate(&config).and_then(|mut scenario| {
                        runner.play(&scenario.files, scenario.manifest.clone(), &mut scenario.frames)
                    });
                    match played {
                        Ok(result) => {
                            let label = config.scenario.clone().unwrap_or_else(|| "synthetic".into());
                            info!(
                                "[GUI] Scenario {} -> compared {} ticks",
                                label, result.compared
                            );
                            *write_state(&state) =
                                SyncSnapshot::from_playback(format!("scenario {label}"), &result);
                            Ok::<_, warp::Rejection>(warp::reply::with_status(
                                warp::reply::json(&json!({
                                    "status": "ok",
                                    "compared": result.compared,
                                    "mean_match_percent": result.mean_match_percent,
                                    "description": config.description.clone().unwrap_or_default()
                                })),
                                StatusCode::OK,
                            ))
                        }
                        Err(err) => {
                            error!("ingest-config error: {:#}", err);
                            Err(warp::reject::custom(WarpError))
                        }
                    }
                },
            );

        thread::spawn(move || {
            let routes = snapshot_route
                .or(history_route)
                .or(summary_route)
                .or(scenario_route);
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("failed to build bridge runtime: {}", err);
                    return;
                }
            };
            runtime.block_on(async move {
                match warp::serve(routes).try_bind_ephemeral(addr) {
                    Ok((bound, server)) => {
                        info!("[GUI] bridge listening on http://{}", bound);
                        server.await;
                    }
                    Err(err) => error!("bridge could not bind {}: {}", addr, err),
                }
            });
        });

        Self { state }
    }

    pub fn publish(&self, snapshot: &SyncSnapshot) -> Result<()> {
        let mut guard = write_state(&self.state);
        *guard = snapshot.clone();
        println!(
            "[GUI] history points: {}, last match: {}",
            guard.history.len(),
            guard
                .last_tick
                .as_ref()
                .map(|t| format!("{}%", t.stats.overall_match_percent))
                .unwrap_or_else(|| "-".into())
        );
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        write_state(&self.state).status = message.to_string();
        println!("[GUI] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> SyncSnapshot {
        read_state(&self.state).clone()
    }
}
