use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use ssr_charger::{
    link::{
        mock::{MockConnector, MockWire},
        LinkSettings,
    },
    models::LocalBattery,
    routes, AppState, HostBattery, Mode, SerialLink, Thresholds,
};

// ---

#[derive(Default)]
struct StubBattery {
    percentage: Mutex<Option<f64>>,
}

impl StubBattery {
    fn set(&self, p: Option<f64>) {
        *self.percentage.lock().unwrap() = p;
    }
}

impl HostBattery for StubBattery {
    fn read(&self) -> Option<LocalBattery> {
        self.percentage.lock().unwrap().map(|percentage| LocalBattery {
            percentage,
            plugged_in: true,
            seconds_remaining: -2,
        })
    }

    fn health_percent(&self) -> Option<f64> {
        Some(93.0)
    }
}

struct TestServer {
    base: String,
    client: Client,
    state: AppState,
    wire: MockWire,
    battery: Arc<StubBattery>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        Ok(self.client.get(self.url(path)).send().await?.json().await?)
    }

    async fn post(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        let resp = self.client.post(self.url(path)).json(&body).send().await?;
        let status = resp.status();
        Ok((status, resp.json().await?))
    }
}

async fn spawn_server() -> Result<TestServer> {
    // ---
    let connector = MockConnector::new();
    let wire = connector.wire();
    let link = Arc::new(SerialLink::new(
        connector,
        LinkSettings {
            baud_rate: 115_200,
            timeout: Duration::from_millis(50),
            settle: Duration::ZERO,
        },
    ));
    link.connect(None).await?;

    let battery = Arc::new(StubBattery::default());
    battery.set(Some(50.0));

    let state = AppState::new(
        link,
        battery.clone(),
        None,
        Mode::Manual,
        Thresholds {
            low: 20.0,
            high: 80.0,
            interval: 5.0,
        },
        Duration::from_millis(20),
    );

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    let app = routes::router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    Ok(TestServer {
        base: format!("http://{addr}"),
        client: Client::new(),
        state,
        wire,
        battery,
    })
}

#[tokio::test]
async fn health_reports_link_state() -> Result<()> {
    // ---
    let srv = spawn_server().await?;
    let body = srv.get("/health").await?;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["mode"], "MANUAL");
    assert_eq!(body["serial_connected"], true);
    Ok(())
}

#[tokio::test]
async fn mode_switch_to_auto_energizes_relay() -> Result<()> {
    // ---
    let srv = spawn_server().await?;

    let (status, body) = srv.post("/api/mode", json!({ "mode": "auto" })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "AUTO");
    assert_eq!(body["previous"], "MANUAL");
    assert_eq!(srv.wire.commands(), vec!["ON", "MODE:AUTO"]);

    let body = srv.get("/api/mode").await?;
    assert_eq!(body["mode"], "AUTO");
    assert_eq!(body["relay"], "UNKNOWN");

    let (status, body) = srv.post("/api/mode", json!({ "mode": "turbo" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn thresholds_validate_each_field() -> Result<()> {
    // ---
    let srv = spawn_server().await?;

    let (status, _) = srv
        .post("/api/thresholds", json!({ "check_interval": 0 }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = srv
        .post("/api/thresholds", json!({ "check_interval": "soon" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = srv.get("/api/thresholds").await?;
    assert_eq!(body["check_interval"], 5.0);

    let (status, body) = srv
        .post("/api/thresholds", json!({ "low_threshold": 30, "check_interval": 2 }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["low_threshold"], 30.0);
    assert_eq!(body["high_threshold"], 80.0);
    assert_eq!(body["check_interval"], 2.0);
    Ok(())
}

#[tokio::test]
async fn sources_round_trip_and_active_fallback() -> Result<()> {
    // ---
    let srv = spawn_server().await?;

    let (status, body) = srv
        .post(
            "/api/sources",
            json!({ "name": "pixel", "percentage": 42, "device_type": "phone" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["percentage"], 42.0);

    let (status, _) = srv
        .post("/api/sources", json!({ "name": "", "percentage": 50 }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = srv
        .post("/api/sources", json!({ "name": "a", "percentage": 150 }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = srv
        .post("/api/sources/active", json!({ "name": "pixel" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], "pixel");
    assert_eq!(body["percentage"], 42.0);

    let list = srv.get("/api/sources").await?;
    assert_eq!(list["sources"][0]["device_type"], "phone");

    let resp = srv.client.delete(srv.url("/api/sources/pixel")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["active"], "local");

    let resp = srv.client.delete(srv.url("/api/sources/pixel")).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let (status, _) = srv
        .post("/api/sources/active", json!({ "name": "pixel" }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn manual_command_returns_device_reply() -> Result<()> {
    // ---
    let srv = spawn_server().await?;
    srv.wire.push_inbound("stale line\n");
    srv.wire.respond_to(
        "STATUS",
        "{\"percentage\":55,\"voltage\":3.8,\"temperature\":30}\nSTATUS:ON\n",
    );

    let (status, body) = srv.post("/api/command", json!({ "command": "status" })).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["command"], "STATUS");
    assert_eq!(body["responses"], json!(["STATUS:ON"]));
    assert_eq!(srv.wire.commands(), vec!["STATUS"]);

    let battery = srv.get("/api/battery").await?;
    assert_eq!(battery["device"]["percentage"], 55.0);
    Ok(())
}

#[tokio::test]
async fn overlapping_commands_each_get_their_reply() -> Result<()> {
    // ---
    let srv = spawn_server().await?;
    srv.wire.respond_to("STATUS", "STATUS:ON\n");
    srv.wire.respond_to("PING", "PONG\n");

    let (first, second) = tokio::join!(
        srv.post("/api/command", json!({ "command": "STATUS" })),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            srv.post("/api/command", json!({ "command": "PING" })).await
        }
    );
    let (status_a, body_a) = first?;
    let (status_b, body_b) = second?;

    assert_eq!(status_a, StatusCode::OK);
    assert_eq!(status_b, StatusCode::OK);
    assert_eq!(body_a["responses"], json!(["STATUS:ON"]));
    assert_eq!(body_b["responses"], json!(["PONG"]));
    Ok(())
}

#[tokio::test]
async fn reserved_source_name_is_rejected() -> Result<()> {
    // ---
    let srv = spawn_server().await?;

    let (status, body) = srv
        .post("/api/sources", json!({ "name": "active", "percentage": 40 }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let list = srv.get("/api/sources").await?;
    assert_eq!(list["sources"], json!([]));
    Ok(())
}

#[tokio::test]
async fn ssr_shorthand_and_link_failure() -> Result<()> {
    // ---
    let srv = spawn_server().await?;

    let (status, _) = srv.post("/api/ssr", json!({ "state": "on" })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(srv.wire.commands(), vec!["ON"]);

    let (status, _) = srv.post("/api/ssr", json!({ "state": "maybe" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let resp = srv
        .client
        .post(srv.url("/api/serial/disconnect"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, body) = srv.post("/api/ssr", json!({ "state": "off" })).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "serial not connected");
    Ok(())
}

#[tokio::test]
async fn serial_reconnect_without_body() -> Result<()> {
    // ---
    let srv = spawn_server().await?;

    let ports = srv.get("/api/serial/ports").await?;
    assert_eq!(ports["preferred"], "/dev/ttyMOCK0");

    let resp = srv
        .client
        .post(srv.url("/api/serial/connect"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, body) = srv
        .post("/api/serial/connect", json!({ "port": "/dev/ttyUSB7" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["port"], "/dev/ttyUSB7");

    let status = srv.get("/api/serial/status").await?;
    assert_eq!(status["connected"], true);
    assert_eq!(status["port"], "/dev/ttyUSB7");
    assert_eq!(
        srv.wire.opened(),
        vec!["/dev/ttyMOCK0", "/dev/ttyMOCK0", "/dev/ttyUSB7"]
    );
    Ok(())
}

#[tokio::test]
async fn battery_endpoint_renders_charging_state() -> Result<()> {
    // ---
    let srv = spawn_server().await?;
    let body = srv.get("/api/battery").await?;

    assert_eq!(body["status"]["percentage"], 50.0);
    assert_eq!(body["status"]["time_left"], "charging");
    assert_eq!(body["status"]["health"], 93.0);
    assert_eq!(body["active_source"], "local");

    srv.battery.set(None);
    let body = srv.get("/api/battery").await?;
    assert!(body["status"].is_null());
    assert!(body["percentage"].is_null());
    Ok(())
}

#[tokio::test]
async fn auto_loop_follows_pushed_source() -> Result<()> {
    // ---
    let srv = spawn_server().await?;
    srv.post(
        "/api/sources",
        json!({ "name": "bank", "percentage": 12, "device_type": "power_bank" }),
    )
    .await?;
    srv.post("/api/sources/active", json!({ "name": "bank" }))
        .await?;
    srv.post("/api/mode", json!({ "mode": "AUTO" })).await?;
    srv.wire.clear_written();

    srv.state.controller.tick().await;
    assert_eq!(srv.wire.commands(), vec!["ON"]);

    srv.post(
        "/api/sources",
        json!({ "name": "bank", "percentage": 88, "device_type": "power_bank" }),
    )
    .await?;
    srv.state.controller.tick().await;
    assert_eq!(srv.wire.commands(), vec!["ON", "OFF"]);

    let logs = srv.get("/api/logs?limit=5").await?;
    assert_eq!(logs[0]["action"], "relay");
    assert_eq!(logs[0]["type"], "success");
    Ok(())
}
