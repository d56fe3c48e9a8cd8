//! BDD step definitions for the GIOŚ REST API client

use std::collections::HashMap;
use std::sync::Arc;

use cucumber::{given, then, when};
use tokio::sync::RwLock;

use gios::api::{AirQualityApi, GiosClient};
use gios::io::{HttpClient, HttpResponse};
use gios::GiosError;

use crate::world::GiosWorld;

pub const BASE_URL: &str = "http://gios.test/pjp-api/rest";

// --- Test doubles ---

/// Answers each URL with a canned response, 404 for anything unknown
#[derive(Debug, Default)]
pub struct RoutedHttpClient {
    routes: RwLock<HashMap<String, HttpResponse>>,
    fallback_status: RwLock<Option<u16>>,
    pub requests: RwLock<Vec<String>>,
}

impl RoutedHttpClient {
    async fn route(&self, path: &str, body: String) {
        self.routes.write().await.insert(
            format!("{}{}", BASE_URL, path),
            HttpResponse { status: 200, body },
        );
    }
}

#[async_trait::async_trait]
impl HttpClient for RoutedHttpClient {
    async fn get(&self, url: &str) -> gios::Result<HttpResponse> {
        self.requests.write().await.push(url.to_string());
        if let Some(status) = *self.fallback_status.read().await {
            return Ok(HttpResponse {
                status,
                body: "Internal Server Error".to_string(),
            });
        }
        Ok(self
            .routes
            .read()
            .await
            .get(url)
            .cloned()
            .unwrap_or(HttpResponse {
                status: 404,
                body: "Not Found".to_string(),
            }))
    }
}

fn client(world: &GiosWorld, station_id: u32) -> GiosClient {
    let http = world.http.as_ref().expect("HTTP client not configured");
    GiosClient::new(station_id, BASE_URL, Arc::clone(http) as Arc<dyn HttpClient>)
}

fn sensor_data(code: &str) -> String {
    let (newest, older) = match code {
        "PM2.5" => ("4", "5"),
        "PM10" => ("16.8344", "17.8344"),
        "O3" => ("null", "95.7768"),
        _ => ("1.0", "1.0"),
    };
    format!(
        r#"{{"key": "{}", "values": [
            {{"date": "2020-07-31 15:00:00", "value": {}}},
            {{"date": "2020-07-31 14:00:00", "value": {}}}
        ]}}"#,
        code, newest, older
    )
}

// --- Given steps ---

#[given(expr = "a GIOŚ REST API serving station {int} with sensors {string}")]
async fn rest_api_with_sensors(world: &mut GiosWorld, station_id: u32, codes: String) {
    let http = Arc::new(RoutedHttpClient::default());
    let codes: Vec<&str> = codes.split(',').map(str::trim).collect();

    let installed: Vec<serde_json::Value> = codes
        .iter()
        .enumerate()
        .map(|(i, code)| {
            serde_json::json!({
                "id": 1000 + i,
                "stationId": station_id,
                "param": {"paramName": code, "paramFormula": code, "paramCode": code, "idParam": i}
            })
        })
        .collect();
    http.route(
        &format!("/station/sensors/{}", station_id),
        serde_json::Value::from(installed).to_string(),
    )
    .await;
    for (i, code) in codes.iter().enumerate() {
        http.route(&format!("/data/getData/{}", 1000 + i), sensor_data(code))
            .await;
    }
    http.route(
        &format!("/aqindex/getIndex/{}", station_id),
        crate::world::INDEXES.to_string(),
    )
    .await;
    http.route("/station/findAll", crate::world::STATIONS.to_string())
        .await;

    world.http = Some(http);
}

#[given(expr = "a GIOŚ REST API answering every request with status {int}")]
async fn rest_api_failing(world: &mut GiosWorld, status: u16) {
    let http = Arc::new(RoutedHttpClient::default());
    *http.fallback_status.write().await = Some(status);
    world.http = Some(http);
}

// --- When steps ---

#[when(expr = "all sensors are requested for station {int}")]
async fn all_sensors_requested(world: &mut GiosWorld, station_id: u32) {
    let result = client(world, station_id).get_all_sensors().await;
    world.all_sensors = Some(result);
}

#[when(expr = "the indexes are requested for station {int}")]
async fn indexes_requested(world: &mut GiosWorld, station_id: u32) {
    let result = client(world, station_id).get_indexes().await;
    world.indexes = Some(result);
}

// --- Then steps ---

#[then(expr = "the result contains parameter {string} with newest value {word}")]
fn result_contains_parameter(world: &mut GiosWorld, code: String, value: String) {
    let sensors = world
        .all_sensors
        .as_ref()
        .expect("no request made")
        .as_ref()
        .expect("request failed");
    let sensor = sensors
        .get(&code)
        .unwrap_or_else(|| panic!("parameter {} missing", code));
    let expected = match value.as_str() {
        "null" => None,
        number => Some(number.parse::<f64>().expect("not a number")),
    };
    assert_eq!(sensor.values[0].value, expected);
}

#[then(expr = "the result contains {int} parameters")]
fn result_contains_parameters(world: &mut GiosWorld, count: usize) {
    let sensors = world
        .all_sensors
        .as_ref()
        .expect("no request made")
        .as_ref()
        .expect("request failed");
    assert_eq!(sensors.len(), count);
}

#[then("the request fails with an API error")]
fn request_fails_with_api_error(world: &mut GiosWorld) {
    let err = match (&world.all_sensors, &world.indexes) {
        (Some(Err(e)), _) | (_, Some(Err(e))) => e,
        other => panic!("expected a failed request, got {:?}", other),
    };
    assert!(matches!(err, GiosError::Api(_)), "{err:?}");
}

#[then(expr = "the indexes report station level {string}")]
fn indexes_report_station_level(world: &mut GiosWorld, name: String) {
    let indexes = world
        .indexes
        .as_ref()
        .expect("no request made")
        .as_ref()
        .expect("request failed");
    match &indexes.st_index_level {
        gios::api::IndexField::Level(level) => {
            assert_eq!(level.index_level_name.as_deref(), Some(name.as_str()))
        }
        other => panic!("unexpected station level {:?}", other),
    }
}

#[then(expr = "{int} requests were made")]
async fn requests_were_made(world: &mut GiosWorld, count: usize) {
    let http = world.http.as_ref().expect("HTTP client not configured");
    assert_eq!(http.requests.read().await.len(), count);
}
