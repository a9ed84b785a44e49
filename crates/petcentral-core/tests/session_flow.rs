//! End-to-end: expired session, re-login, and landing back where the user was.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use petcentral_core::api::{AdminResource, ListQuery};
use petcentral_core::auth::{FileStore, NOT_LOGGED_IN_MESSAGE};
use petcentral_core::{
    ApiClient, ApiError, AvailabilityProber, Config, HistoryNavigator, LoginRequest, Navigator,
    ProbeState, Route, SessionContext, SessionController, View,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn open_session(
    config: &Config,
    dir: &std::path::Path,
    location: &str,
) -> Result<(SessionController, Arc<HistoryNavigator>)> {
    let context = SessionContext::new(Arc::new(FileStore::new(dir)));
    let navigator = Arc::new(HistoryNavigator::new(location));
    let client = ApiClient::new(config, context, navigator.clone())?;
    Ok((SessionController::new(client), navigator))
}

#[tokio::test]
async fn test_expired_session_returns_user_to_the_same_screen() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let dir = tempfile::tempdir()?;
    let config = Config {
        api_base_url: server.uri(),
        ..Config::default()
    };

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"token": "second"}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/breeds"))
        .and(header("authorization", "Bearer first"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/breeds"))
        .and(header("authorization", "Bearer second"))
        .and(query_param("search", "lab"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Labrador"}])))
        .mount(&server)
        .await;

    // A session left over from an earlier run
    {
        let (controller, _) = open_session(&config, dir.path(), "/")?;
        controller.client().context().tokens().set("first")?;
    }

    // Restart: the stored credential is picked up
    let (controller, navigator) = open_session(&config, dir.path(), "/breeds?search=lab")?;
    assert!(controller.is_authenticated());
    assert_eq!(controller.view(), View::Shell(Route::Breeds));

    let query = ListQuery {
        search: Some("lab".to_string()),
        ..ListQuery::default()
    };
    let err = controller
        .client()
        .list(AdminResource::Breeds, &query)
        .await
        .err()
        .ok_or_else(|| anyhow!("expected the stale token to be rejected"))?;
    assert!(matches!(err, ApiError::SessionExpired { ref redirect } if redirect == "/breeds?search=lab"));

    assert_eq!(navigator.navigations(), vec!["/breeds?search=lab"]);
    assert_eq!(controller.view(), View::Login);
    assert_eq!(controller.take_auth_message().as_deref(), Some(NOT_LOGGED_IN_MESSAGE));
    assert_eq!(controller.take_auth_message(), None);

    let target = controller
        .login(&LoginRequest::new("admin@petcentral.app", "hunter2"))
        .await?;
    assert_eq!(target, "/breeds?search=lab");
    assert_eq!(navigator.current_location(), "/breeds?search=lab");
    assert_eq!(controller.client().context().pending_redirect(), None);

    let breeds = controller.client().list(AdminResource::Breeds, &query).await?;
    assert_eq!(breeds[0]["name"], "Labrador");

    // And the new credential survives another restart
    let (reopened, _) = open_session(&config, dir.path(), "/")?;
    assert_eq!(reopened.client().context().token().as_deref(), Some("second"));

    reopened.logout()?;
    assert!(!controller.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn test_prober_waits_for_health_endpoint() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let dir = tempfile::tempdir()?;
    let config = Config {
        api_base_url: server.uri(),
        ..Config::default()
    };

    Mock::given(method("GET"))
        .and(path("/weatherforecast"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weatherforecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (controller, _) = open_session(&config, dir.path(), "/")?;
    let mut prober = AvailabilityProber::new(
        Arc::new(controller.client().clone()),
        Duration::from_millis(50),
    );
    prober.start();
    let mut states = prober.subscribe();

    tokio::time::timeout(Duration::from_secs(5), async {
        while *states.borrow_and_update() != ProbeState::Available {
            if states.changed().await.is_err() {
                break;
            }
        }
    })
    .await?;

    assert_eq!(prober.state(), ProbeState::Available);
    assert_eq!(prober.attempts(), 3);

    // Polling has stopped; no further health requests arrive
    tokio::time::sleep(Duration::from_millis(200)).await;
    let requests = server
        .received_requests()
        .await
        .ok_or_else(|| anyhow!("request recording disabled"))?;
    assert_eq!(requests.len(), 3);
    Ok(())
}
