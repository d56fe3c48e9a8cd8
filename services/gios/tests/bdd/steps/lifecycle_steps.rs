//! BDD step definitions for the service builder and lifecycle

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};
use tokio_util::sync::CancellationToken;

use gios::api::AirQualityApi;
use gios::config::{ApiConfig, Config, DashboardConfig, StationConfig};
use gios::io::HttpClient;
use gios::integration::RetryPolicy;
use gios::GiosBuilder;

use crate::steps::api_client_steps::BASE_URL;
use crate::world::{FixtureApi, GiosWorld};

fn config(station_id: u32) -> Config {
    Config {
        station: StationConfig {
            station_id,
            ..StationConfig::default()
        },
        api: ApiConfig {
            base_url: BASE_URL.to_string(),
            ..ApiConfig::default()
        },
        dashboard: DashboardConfig {
            enabled: false,
            ..DashboardConfig::default()
        },
        ..Config::default()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial: Duration::from_millis(1),
        max: Duration::from_millis(5),
    }
}

fn builder(world: &mut GiosWorld, cancel: CancellationToken) -> GiosBuilder {
    let api = Arc::clone(world.api.as_ref().expect("station not configured"));
    GiosBuilder::new(config(api.station_id()))
        .with_api(api as Arc<dyn AirQualityApi>)
        .with_registry(std::mem::take(&mut world.registry))
        .with_retry_policy(fast_retry())
        .with_cancellation_token(cancel)
}

async fn run_until_reported(
    world: &mut GiosWorld,
    builder: GiosBuilder,
    cancel: CancellationToken,
    entity_id: &str,
) {
    let service = builder.build().await.expect("build failed");
    let state = service.state();

    let watcher = async {
        for _ in 0..500 {
            if state.read().await.get(entity_id).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
    };

    let (result, ()) = tokio::join!(service.start(), watcher);
    world.state = Some(state);
    world.service_result = Some(result);
}

// --- Given steps ---

#[given(expr = "a service for station {int}")]
fn service_for_station(world: &mut GiosWorld, station_id: u32) {
    world.api = Some(Arc::new(FixtureApi::new(station_id)));
}

#[given("a pre-cancelled cancellation token")]
fn pre_cancelled_token(world: &mut GiosWorld) {
    world.pre_cancelled = true;
}

// --- When steps ---

#[when("the service is started")]
async fn service_is_started(world: &mut GiosWorld) {
    let cancel = CancellationToken::new();
    if world.pre_cancelled {
        cancel.cancel();
    }
    let result = match builder(world, cancel).build().await {
        Ok(service) => service.start().await,
        Err(e) => Err(e),
    };
    world.service_result = Some(result);
}

#[when(expr = "the service runs until entity {string} is reported and is then cancelled")]
async fn service_runs_until_reported(world: &mut GiosWorld, entity_id: String) {
    let cancel = CancellationToken::new();
    let builder = builder(world, cancel.clone());
    run_until_reported(world, builder, cancel, &entity_id).await;
}

#[when(
    expr = "the service for station {int} runs over the REST API until entity {string} is reported and is then cancelled"
)]
async fn service_over_rest_runs_until_reported(
    world: &mut GiosWorld,
    station_id: u32,
    entity_id: String,
) {
    let http = Arc::clone(world.http.as_ref().expect("HTTP client not configured"));
    let cancel = CancellationToken::new();
    let builder = GiosBuilder::new(config(station_id))
        .with_http_client(http as Arc<dyn HttpClient>)
        .with_retry_policy(fast_retry())
        .with_cancellation_token(cancel.clone());
    run_until_reported(world, builder, cancel, &entity_id).await;
}

// --- Then steps ---

#[then("the service stops cleanly")]
fn service_stops_cleanly(world: &mut GiosWorld) {
    let result = world.service_result.as_ref().expect("service not started");
    assert!(result.is_ok(), "{:?}", result);
}

#[then("the service fails because the station does not exist")]
fn service_fails_no_station(world: &mut GiosWorld) {
    let result = world.service_result.as_ref().expect("service not started");
    assert!(
        matches!(result, Err(gios::GiosError::NoStation(_))),
        "{:?}",
        result
    );
}

#[then("the service fails with a configuration error")]
fn service_fails_config(world: &mut GiosWorld) {
    let result = world.service_result.as_ref().expect("service not started");
    assert!(
        matches!(result, Err(gios::GiosError::Config(_))),
        "{:?}",
        result
    );
}
