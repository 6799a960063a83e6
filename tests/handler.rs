use std::io::Write;
use std::time::Duration;

use serde_json::Value;
use squadcast_handler::config::HandlerConfig;
use squadcast_handler::event::Event;
use squadcast_handler::notifications::service::{HandlerError, HandlerService, Stage};
use squadcast_handler::notifications::senders::SenderError;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn webhook(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn event(status: u32, output: &str) -> Event {
    let raw = serde_json::json!({
        "timestamp": 1700000000,
        "entity": {
            "entity_class": "host",
            "subscriptions": ["linux"],
            "metadata": {"name": "entity1", "namespace": "default"}
        },
        "check": {
            "command": "command",
            "interval": 60,
            "status": status,
            "output": output,
            "handlers": ["squadcast"],
            "metadata": {"name": "check1", "namespace": "default"}
        }
    });
    Event::from_json(&raw.to_string()).unwrap()
}

fn config(api_url: String) -> HandlerConfig {
    HandlerConfig {
        api_url,
        message: "{{Entity.Name}}/{{Check.Name}}".to_string(),
        description: "{{Check.Output}}".to_string(),
        timeout_secs: 5,
        ..Default::default()
    }
}

async fn last_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    let request = requests.last().expect("webhook was not called");
    serde_json::from_slice(&request.body).unwrap()
}

#[tokio::test]
async fn test_send_event_to_squadcast() {
    let cases = [(0, "resolve"), (1, "trigger"), (2, "trigger"), (127, "trigger")];

    for (sensu_status, webhook_status) in cases {
        let server = webhook(200).await;
        let service = HandlerService::from_config(config(server.uri())).unwrap();

        service.handle(&event(sensu_status, "Check failed!")).await.unwrap();

        let body = last_body(&server).await;
        assert_eq!(body["message"], "entity1/check1");
        assert_eq!(body["event_id"], "entity1/check1");
        assert_eq!(body["status"], webhook_status, "sensu status {sensu_status}");
        assert_eq!(body["description"], "Check failed!");
        assert_eq!(body["check"]["status"], sensu_status);
        assert_eq!(body["entity"]["metadata"]["name"], "entity1");
    }
}

#[tokio::test]
async fn test_send_event_with_template_file() {
    let mut template = tempfile::NamedTempFile::new().unwrap();
    write!(template, "TODO:\n{{{{Check.Output}}}}").unwrap();

    for (sensu_status, webhook_status) in [(0, "resolve"), (1, "trigger")] {
        let server = webhook(200).await;
        let config = HandlerConfig {
            template: template.path().to_string_lossy().into_owned(),
            ..config(server.uri())
        };
        let service = HandlerService::from_config(config).unwrap();

        service.handle(&event(sensu_status, "Check failed!")).await.unwrap();

        let body = last_body(&server).await;
        assert_eq!(body["message"], "entity1/check1");
        assert_eq!(body["status"], webhook_status);
        assert_eq!(body["description"], "TODO:\nCheck failed!");
    }
}

#[tokio::test]
async fn test_legacy_dot_templates() {
    let server = webhook(200).await;
    let config = HandlerConfig {
        message: "{{.Entity.Name}}/{{.Check.Name}}".to_string(),
        description: "{{.Check.Output}}".to_string(),
        ..config(server.uri())
    };
    HandlerService::from_config(config)
        .unwrap()
        .handle(&event(2, "disk full"))
        .await
        .unwrap();

    let body = last_body(&server).await;
    assert_eq!(body["message"], "entity1/check1");
    assert_eq!(body["description"], "disk full");
}

#[tokio::test]
async fn test_remote_rejection_fails_the_run() {
    let server = webhook(500).await;
    let err = HandlerService::from_config(config(server.uri()))
        .unwrap()
        .handle(&event(2, "boom"))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Deliver);
    match err {
        HandlerError::Delivery(sender_err) => assert_eq!(sender_err.status_code(), Some(500)),
        other => panic!("expected a delivery error, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_connection_refused_fails_the_run() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = HandlerService::from_config(config(format!("http://{addr}")))
        .unwrap()
        .handle(&event(2, "boom"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HandlerError::Delivery(SenderError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_render_failure_never_contacts_the_endpoint() {
    let server = webhook(200).await;
    let config = HandlerConfig {
        description: "{{Check.DoesNotExist}}".to_string(),
        ..config(server.uri())
    };
    let err = HandlerService::from_config(config)
        .unwrap()
        .handle(&event(2, "boom"))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Build);
    assert!(err.to_string().contains("description"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_event_from_stdin_json_round_trip() {
    let server = webhook(200).await;
    let raw = r#"{
        "timestamp": 1700000123,
        "entity": {
            "entity_class": "agent",
            "metadata": {"name": "web-01", "namespace": "default"},
            "system": {"hostname": "web-01"}
        },
        "check": {
            "status": 1,
            "output": "WARNING: load 4.2",
            "metadata": {"name": "load"},
            "thresholds": [1, 2]
        }
    }"#;
    let event = Event::from_reader(raw.as_bytes()).unwrap();

    HandlerService::from_config(config(server.uri()))
        .unwrap()
        .handle(&event)
        .await
        .unwrap();

    let body = last_body(&server).await;
    assert_eq!(body["message"], "web-01/load");
    assert_eq!(body["status"], "trigger");
    assert_eq!(body["entity"]["system"]["hostname"], "web-01");
    assert_eq!(body["check"]["thresholds"], serde_json::json!([1, 2]));
}

#[tokio::test]
async fn test_pipeline_event_with_null_handlers() {
    let server = webhook(200).await;
    let raw = r#"{
        "entity": {
            "metadata": {"name": "web-01"},
            "subscriptions": null,
            "system": {"hostname": "web-01.example.com"}
        },
        "check": {"metadata": {"name": "disk"}, "status": 2, "output": "full", "handlers": null}
    }"#;
    let event = Event::from_reader(raw.as_bytes()).unwrap();
    let config = HandlerConfig {
        message: "{{.Entity.System.Hostname}}/{{.Check.Name}}".to_string(),
        ..config(server.uri())
    };

    HandlerService::from_config(config)
        .unwrap()
        .handle(&event)
        .await
        .unwrap();

    let body = last_body(&server).await;
    assert_eq!(body["message"], "web-01.example.com/disk");
    assert_eq!(body["status"], "trigger");
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = HandlerConfig {
        timeout_secs: 1,
        ..config(server.uri())
    };
    let err = HandlerService::from_config(config)
        .unwrap()
        .handle(&event(2, "boom"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HandlerError::Delivery(SenderError::Transport { .. })
    ));
}
