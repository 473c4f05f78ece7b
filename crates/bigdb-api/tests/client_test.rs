#![allow(clippy::unwrap_used)]
// Integration tests for `BigDbClient` and `PathNode` verbs using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bigdb_api::{
    BigDbClient, Error, FieldExt, RequestOptions, RetryPolicy, Timeout, TimeoutSpec,
    TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, BigDbClient) {
    let server = MockServer::start().await;
    let client = client_for(&server);
    (server, client)
}

fn client_for(server: &MockServer) -> BigDbClient {
    let base_url = Url::parse(&server.uri()).unwrap();
    BigDbClient::new(base_url, &TransportConfig::default()).unwrap()
}

fn data(suffix: &str) -> String {
    format!("/api/v1/data/controller/{suffix}")
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

// ── Data namespace ──────────────────────────────────────────────────

#[tokio::test]
async fn test_get_returns_document() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(data("core/switch-config")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "leaf1", "fabric-role": "leaf" },
            { "name": "spine1", "fabric-role": "spine" }
        ])))
        .mount(&server)
        .await;

    let doc = client.root().child("core").child("switch_config").get().await.unwrap();
    let items = doc.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].field_str("fabric_role"), Some("leaf"));
    assert_eq!(items[1].field_str("name"), Some("spine1"));
}

#[tokio::test]
async fn test_awaiting_node_is_get() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(data("core/version/appliance")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "5.2" })))
        .mount(&server)
        .await;

    let node = client.root() / "core" / "version" / "appliance";
    let by_ref = (&node).await.unwrap();
    let by_value = node.await.unwrap();
    assert_eq!(by_ref, json!({ "version": "5.2" }));
    assert_eq!(by_value, by_ref);
}

#[tokio::test]
async fn test_get_with_predicate_path() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(data("core/switch[name='leaf1']/interface")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": "ethernet1" }])))
        .mount(&server)
        .await;

    let doc = client
        .root()
        .child("core")
        .child("switch")
        .matching([("name", "leaf1")])
        .child("interface")
        .get()
        .await
        .unwrap();
    assert_eq!(doc, json!([{ "name": "ethernet1" }]));
}

#[tokio::test]
async fn test_get_with_params() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(data("core/switch")))
        .and(query_param("select", "name"))
        .and(query_param("state-type", "global-config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let opts = RequestOptions::new()
        .param("select", "name")
        .param("state-type", "global-config");
    let doc = client.root().child("core").child("switch").get_with(&opts).await.unwrap();
    assert_eq!(doc, json!([]));
}

#[tokio::test]
async fn test_get_as_typed() {
    #[derive(serde::Deserialize)]
    struct Version {
        version: String,
    }

    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(data("core/version/appliance")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "5.2" })))
        .mount(&server)
        .await;

    let v: Version = client
        .node("controller/core/version/appliance")
        .get_as()
        .await
        .unwrap();
    assert_eq!(v.version, "5.2");
}

#[tokio::test]
async fn test_mutations_send_json_bodies() {
    let (server, client) = setup().await;
    let body = json!({ "name": "leaf1", "fabric-role": "leaf" });

    for verb in ["POST", "PUT", "PATCH"] {
        Mock::given(method(verb))
            .and(path(data("core/switch-config")))
            .and(body_json(&body))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }

    let node = client.root().child("core").child("switch_config");
    assert_eq!(node.post(&body).await.unwrap(), None);
    assert_eq!(node.put(&body).await.unwrap(), None);
    assert_eq!(node.patch(&body).await.unwrap(), None);
}

#[tokio::test]
async fn test_mutation_returns_body_when_present() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(data("core/switch-config")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "created": true })))
        .mount(&server)
        .await;

    let result = client
        .root()
        .child("core")
        .child("switch_config")
        .post(&json!({ "name": "leaf2" }))
        .await
        .unwrap();
    assert_eq!(result, Some(json!({ "created": true })));
}

#[tokio::test]
async fn test_delete() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path(data("core/switch-config[name='leaf1']")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .root()
        .child("core")
        .child("switch_config")
        .filter("name=$n", [("n", "leaf1")])
        .delete()
        .await
        .unwrap();
    assert_eq!(result, None);
}

// ── Error normalization ─────────────────────────────────────────────

#[tokio::test]
async fn test_error_carries_server_description() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(data("core/nothing")))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "description": "No such path: nothing" })),
        )
        .mount(&server)
        .await;

    let err = client.root().child("core").child("nothing").get().await.unwrap_err();
    assert!(err.is_not_found(), "expected 404, got: {err:?}");
    assert_eq!(err.description(), Some("No such path: nothing"));
    assert!(err.to_string().ends_with(": No such path: nothing"));
}

#[tokio::test]
async fn test_error_without_json_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(data("core")))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>boom</html>"))
        .mount(&server)
        .await;

    let err = client.root().child("core").get().await.unwrap_err();
    match err {
        Error::Http {
            status,
            description,
            ..
        } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(description, None);
        }
        other => panic!("expected Http error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_json_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(data("core")))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client.root().child("core").get().await.unwrap_err();
    assert!(
        matches!(err, Error::Deserialization { ref body, .. } if body == "not json"),
        "expected Deserialization error, got: {err:?}"
    );
}

// ── RPC / schema ────────────────────────────────────────────────────

#[tokio::test]
async fn test_rpc_no_content_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/rpc/controller/core/switch[dpid='00:00:00:00:00:00:00:01']/disconnect"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .root()
        .child("core")
        .child("switch")
        .matching([("dpid", "00:00:00:00:00:00:00:01")])
        .child("disconnect")
        .rpc(None)
        .await
        .unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn test_rpc_accepted_without_body_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/rpc/controller/core/aaa/reset"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let result = client
        .node("controller/core/aaa/reset")
        .rpc(Some(&json!({ "all": true })))
        .await
        .unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn test_rpc_accepted_with_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/rpc/controller/core/aaa/reset"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "job": 7 })))
        .mount(&server)
        .await;

    let result = client.node("controller/core/aaa/reset").rpc(None).await.unwrap();
    assert_eq!(result, Some(json!({ "job": 7 })));
}

#[tokio::test]
async fn test_rpc_returns_json() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/rpc/controller/core/aaa/session/login"))
        .and(body_json(json!({ "user": "admin", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    let result = client
        .root()
        .child("core")
        .child("aaa")
        .child("session")
        .child("login")
        .rpc(Some(&json!({ "user": "admin", "password": "pw" })))
        .await
        .unwrap();
    assert_eq!(result, Some(json!({ "success": true })));
}

#[tokio::test]
async fn test_schema() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/schema/controller/core/switch"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "nodeType": "LIST", "name": "switch" })),
        )
        .mount(&server)
        .await;

    let schema = client.root().child("core").child("switch").schema().await.unwrap();
    assert_eq!(schema.field_str("nodeType"), Some("LIST"));
}

// ── Timeouts ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_default_timeout_applies() {
    let (server, client) = setup().await;
    let client = client.with_timeout(Duration::from_millis(100));

    Mock::given(method("GET"))
        .and(path(data("core")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = client.root().child("core").get().await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got: {err:?}");
}

#[tokio::test]
async fn test_forever_override_ignores_default() {
    let (server, client) = setup().await;
    let client = client.with_timeout(Timeout::Split {
        connect: Duration::from_millis(50),
        read: Duration::from_millis(50),
    });

    Mock::given(method("GET"))
        .and(path(data("core")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let opts = RequestOptions::new().timeout(TimeoutSpec::FOREVER);
    let doc = client.root().child("core").get_with(&opts).await.unwrap();
    assert_eq!(doc, json!({ "ok": true }));
}

// ── Retries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_forcelist_retries_until_success() {
    let (server, client) = setup().await;
    let client = client.with_retries(RetryPolicy::new(3).with_status_forcelist([503]));

    Mock::given(method("GET"))
        .and(path(data("core")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(data("core")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let doc = client.root().child("core").get().await.unwrap();
    assert_eq!(doc, json!({ "ok": true }));
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_forcelist_exhausted_returns_last_status() {
    let (server, client) = setup().await;
    let client = client.with_retries(RetryPolicy::new(2).with_status_forcelist([503]));

    Mock::given(method("GET"))
        .and(path(data("core")))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "description": "busy" })))
        .mount(&server)
        .await;

    let err = client.root().child("core").get().await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    assert_eq!(err.description(), Some("busy"));
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_count_policy_does_not_retry_status() {
    let (server, client) = setup().await;
    let client = client.with_retries(3);

    Mock::given(method("GET"))
        .and(path(data("core")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.root().child("core").get().await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_post_not_retried_by_default_methods() {
    let (server, client) = setup().await;
    let client = client.with_retries(RetryPolicy::new(3).with_status_forcelist([503]));

    Mock::given(method("POST"))
        .and(path(data("core/switch-config")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client
        .root()
        .child("core")
        .child("switch_config")
        .post(&json!({ "name": "leaf1" }))
        .await
        .unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_connection_failure_is_transient() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let base_url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
    let client = BigDbClient::new(base_url, &TransportConfig::default())
        .unwrap()
        .with_retries(2);

    let err = client.root().child("core").get().await.unwrap_err();
    assert!(err.is_transient(), "expected connection error, got: {err:?}");
}

#[tokio::test]
async fn test_timed_out_get_retried_but_post_is_not() {
    let (server, client) = setup().await;
    let client = client
        .with_timeout(Duration::from_millis(100))
        .with_retries(3);

    let slow = ResponseTemplate::new(200)
        .set_body_json(json!({}))
        .set_delay(Duration::from_millis(400));
    Mock::given(method("GET"))
        .and(path(data("core")))
        .respond_with(slow.clone())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(data("core")))
        .respond_with(slow)
        .mount(&server)
        .await;

    let err = client.root().child("core").get().await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got: {err:?}");

    let err = client.root().child("core").post(&json!({})).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got: {err:?}");

    let received = server.received_requests().await.unwrap();
    let count = |verb: &str| received.iter().filter(|r| r.method.as_str() == verb).count();
    assert_eq!(count("GET"), 4);
    assert_eq!(count("POST"), 1);
}
