use warpflow::server::routes::route_request;

const THREE_EVENTS: &str = r#"[
    {"schema": "flat", "round": 1, "source": "A", "target": "B",
     "category": "normal", "raw_damage": 100, "mitigated": 20},
    {"schema": "flat", "round": 1, "source": "A", "target": "B",
     "category": "isolytic", "raw_damage": 50},
    {"schema": "flat", "round": 1, "source": "B", "target": "A",
     "category": "normal", "raw_damage": 10, "mitigated": 5}
]"#;

#[test]
fn health_endpoint_returns_ok_json() {
    let response = route_request("GET", "/api/health", "");
    assert_eq!(response.status_code, 200);
    assert_eq!(response.content_type, "application/json");
    assert!(response.body.contains("\"status\": \"ok\""));
}

#[test]
fn analyze_endpoint_scopes_view_to_entities() {
    let body = serde_json::json!({
        "records": serde_json::from_str::<serde_json::Value>(THREE_EVENTS).expect("records"),
        "entities": ["A"],
        "direction": "outgoing"
    })
    .to_string();
    let response = route_request("POST", "/api/analyze", &body);
    assert_eq!(response.status_code, 200);

    let payload: serde_json::Value =
        serde_json::from_str(&response.body).expect("response should be valid json");
    let rows = payload["view"]["rows"].as_array().expect("rows array");
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row["source"], 0);
        assert_eq!(row["target"], 1);
        assert_eq!(row["matched"], "outgoing");
        assert_eq!(row["valid"], true);
    }
    assert_eq!(payload["summary"]["flagged"], false);
    assert!(payload.get("destination").is_none());
    assert!(payload.get("crit_hits").is_none());
}

#[test]
fn analyze_endpoint_accepts_log_text_and_series() {
    let log = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/battle_logs/sample_battle.tsv"
    ))
    .expect("fixture");
    let body = serde_json::json!({
        "log": log,
        "entities": ["Kirk"],
        "direction": "incoming",
        "view_by": "shot"
    })
    .to_string();
    let response = route_request("POST", "/api/analyze", &body);
    assert_eq!(response.status_code, 200);

    let payload: serde_json::Value = serde_json::from_str(&response.body).expect("json");
    let series = payload["destination"].as_array().expect("series");
    assert_eq!(series.len(), 2);
    assert_eq!(series[0]["segments"]["shield"], 900.0);
    assert_eq!(series[0]["raw"]["normal_crit"], 1000.0);

    let crits = payload["crit_hits"].as_array().expect("crit series");
    assert_eq!(crits.len(), 2);
    assert_eq!(crits[0]["crits"], 1);
    assert_eq!(crits[1]["crit_rate"], 0.0);
}

#[test]
fn analyze_endpoint_rejects_bad_requests() {
    let response = route_request("POST", "/api/analyze", "{oops");
    assert_eq!(response.status_code, 400);
    assert!(response.body.contains("\"status\": \"error\""));

    let response = route_request("POST", "/api/analyze", "{}");
    assert_eq!(response.status_code, 400);

    let body = serde_json::json!({ "log": THREE_EVENTS, "entities": ["Nobody"] }).to_string();
    let response = route_request("POST", "/api/analyze", &body);
    assert_eq!(response.status_code, 400);
    assert!(response.body.contains("Nobody"));
}

#[test]
fn unreadable_log_is_unprocessable() {
    let body = serde_json::json!({ "log": "   " }).to_string();
    let response = route_request("POST", "/api/analyze", &body);
    assert_eq!(response.status_code, 422);
}

#[test]
fn unknown_routes_and_methods() {
    assert_eq!(route_request("GET", "/nope", "").status_code, 404);
    assert_eq!(route_request("GET", "/api/analyze", "").status_code, 405);
    let http = route_request("GET", "/api/health", "").to_http_string();
    assert!(http.starts_with("HTTP/1.1 200 OK\r\n"));
}
