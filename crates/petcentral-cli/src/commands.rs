//! Command parsing and execution.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use petcentral_core::api::{AdminResource, ListQuery, MultipartBody, Payload, RequestConfig};
use petcentral_core::auth::KeyValueStore;
use petcentral_core::navigation::split_location;
use petcentral_core::{
    ApiClient, AvailabilityProber, Config, HistoryNavigator, LoginRequest, Navigator, ProbePolicy,
    ProbeState, Route, SessionContext, SessionController, View,
};

pub const USAGE: &str = "\
Usage: petcentral [--log-file] <command>

Commands:
  login [email]                      Log in and resume the interrupted screen
  logout                             Forget the stored credential
  status                             Show session state
  probe [--continuous]               Wait for the API to come up
  get <resource>[?query] [id]        List a resource, or fetch one item
  create <resource> <body>           Create an item
  update <resource> <id> <body>      Replace an item
  delete <resource> <id>             Delete an item
  stories [days]                     Story activity summary

A body is inline JSON, @file.json, or --multipart name=value image=@photo.png

Resources: pet-types breeds colors pet-foods user-types pet-owners
           business-profiles stories";

// ============================================================================
// Parsing
// ============================================================================

/// Request body given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Inline JSON, or `@path` to a JSON file
    Json(String),
    /// `name=value` pairs; a value of `@path` attaches that file
    Fields(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Login { email: Option<String> },
    Logout,
    Status,
    Probe { continuous: bool },
    Get { target: String, id: Option<String> },
    Create { resource: String, body: Body },
    Update { resource: String, id: String, body: Body },
    Delete { resource: String, id: String },
    Stories { days: Option<u32> },
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

        let command = match (name.as_str(), rest.as_slice()) {
            ("help" | "--help" | "-h", _) => Command::Help,
            ("login", []) => Command::Login { email: None },
            ("login", [email]) => Command::Login {
                email: Some(email.to_string()),
            },
            ("logout", []) => Command::Logout,
            ("status", []) => Command::Status,
            ("probe", []) => Command::Probe { continuous: false },
            ("probe", ["--continuous"]) => Command::Probe { continuous: true },
            ("get", [target]) => Command::Get {
                target: target.to_string(),
                id: None,
            },
            ("get", [target, id]) => Command::Get {
                target: target.to_string(),
                id: Some(id.to_string()),
            },
            ("create", [resource, body @ ..]) if !body.is_empty() => Command::Create {
                resource: resource.to_string(),
                body: parse_body(body)?,
            },
            ("update", [resource, id, body @ ..]) if !body.is_empty() => Command::Update {
                resource: resource.to_string(),
                id: id.to_string(),
                body: parse_body(body)?,
            },
            ("delete", [resource, id]) => Command::Delete {
                resource: resource.to_string(),
                id: id.to_string(),
            },
            ("stories", []) => Command::Stories { days: None },
            ("stories", [days]) => Command::Stories {
                days: Some(
                    days.parse::<u32>()
                        .with_context(|| format!("Invalid number of days: {}", days))?,
                ),
            },
            (other, _) => bail!("Unrecognized arguments for '{}'\n\n{}", other, USAGE),
        };
        Ok(command)
    }
}

fn parse_body(args: &[&str]) -> Result<Body> {
    match args {
        ["--multipart", fields @ ..] => {
            let fields = fields
                .iter()
                .map(|field| {
                    field
                        .split_once('=')
                        .map(|(name, value)| (name.to_string(), value.to_string()))
                        .ok_or_else(|| anyhow!("Expected name=value, got '{}'", field))
                })
                .collect::<Result<Vec<_>>>()?;
            if fields.is_empty() {
                bail!("--multipart needs at least one name=value field");
            }
            Ok(Body::Fields(fields))
        }
        [json] => Ok(Body::Json(json.to_string())),
        _ => bail!("Expected a single JSON body or --multipart fields"),
    }
}

impl Body {
    fn into_payload(self) -> Result<Payload> {
        match self {
            Body::Json(text) => {
                let text = match text.strip_prefix('@') {
                    Some(path) => std::fs::read_to_string(path)
                        .with_context(|| format!("Failed to read {}", path))?,
                    None => text.clone(),
                };
                let value: Value = serde_json::from_str(&text).context("Body is not valid JSON")?;
                Ok(Payload::Json(value))
            }
            Body::Fields(fields) => {
                let mut form = MultipartBody::new();
                for (name, value) in fields {
                    form = match value.strip_prefix('@') {
                        Some(path) => {
                            let bytes = std::fs::read(path)
                                .with_context(|| format!("Failed to read {}", path))?;
                            let file_name = Path::new(path)
                                .file_name()
                                .and_then(|n| n.to_str())
                                .unwrap_or(path);
                            form.file(&name, file_name, bytes)
                        }
                        None => form.text(&name, value.as_str()),
                    };
                }
                Ok(Payload::Multipart(form))
            }
        }
    }
}

fn resolve_resource(name: &str) -> Result<AdminResource> {
    AdminResource::from_name(name)
        .ok_or_else(|| anyhow!("Unknown resource '{}'\n\n{}", name, USAGE))
}

/// Split `breeds?search=lab` into the resource and its screen location
fn resolve_target(target: &str) -> Result<(AdminResource, String)> {
    let (name, query) = split_location(target);
    let resource = resolve_resource(name)?;
    let location = match query {
        Some(query) => format!("{}?{}", resource.route().path(), query),
        None => resource.route().path().to_string(),
    };
    Ok((resource, location))
}

/// Query parameters of a screen location, passed through as-is
fn location_query(location: &str) -> RequestConfig {
    let (_, query) = split_location(location);
    query
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| match pair.split_once('=') {
            Some((key, value)) => Some((key, value)),
            None if !pair.is_empty() => Some((pair, "")),
            None => None,
        })
        .fold(RequestConfig::new(), |config, (key, value)| config.query(key, value))
}

// ============================================================================
// Execution
// ============================================================================

pub struct Console {
    config: Config,
    controller: SessionController,
    navigator: Arc<HistoryNavigator>,
}

impl Console {
    pub fn open(config: Config) -> Result<Self> {
        let store = config.open_store()?;
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let context = SessionContext::new(store);
        let navigator = Arc::new(HistoryNavigator::default());
        let client = ApiClient::new(&config, context, navigator.clone())?;

        Ok(Self {
            config,
            controller: SessionController::new(client),
            navigator,
        })
    }

    fn client(&self) -> &ApiClient {
        self.controller.client()
    }

    pub async fn run(mut self, command: Command) -> Result<()> {
        debug!(?command, "Running command");
        match command {
            Command::Help => println!("{}", USAGE),
            Command::Login { email } => self.login(email).await?,
            Command::Logout => {
                self.controller.logout()?;
                println!("Logged out");
            }
            Command::Status => self.status(),
            Command::Probe { continuous } => {
                self.probe(continuous).await?;
            }
            Command::Get { target, id } => {
                let (resource, location) = resolve_target(&target)?;
                self.enter(&location)?;
                let value = match id {
                    Some(id) => self.client().get_item(resource, id).await?,
                    None => self.list_at(resource, &location).await?,
                };
                print_json(&value)?;
            }
            Command::Create { resource, body } => {
                let resource = resolve_resource(&resource)?;
                self.enter(resource.route().path())?;
                let value = self.client().create(resource, body.into_payload()?).await?;
                print_json(&value)?;
            }
            Command::Update { resource, id, body } => {
                let resource = resolve_resource(&resource)?;
                self.enter(resource.route().path())?;
                let value = self
                    .client()
                    .update(resource, id, body.into_payload()?)
                    .await?;
                print_json(&value)?;
            }
            Command::Delete { resource, id } => {
                let resource = resolve_resource(&resource)?;
                self.enter(resource.route().path())?;
                let value = self.client().delete_item(resource, &id).await?;
                if value.is_null() {
                    println!("Deleted {} {}", resource.name(), id);
                } else {
                    print_json(&value)?;
                }
            }
            Command::Stories { days } => {
                let location = match days {
                    Some(days) => format!("{}?days={}", Route::Stories.path(), days),
                    None => Route::Stories.path().to_string(),
                };
                self.enter(&location)?;
                let query = ListQuery {
                    days,
                    ..ListQuery::default()
                };
                let value = self
                    .client()
                    .list(AdminResource::StoriesSummary, &query)
                    .await?;
                print_json(&value)?;
            }
        }
        Ok(())
    }

    /// Move to a screen. Without a session the screen is remembered for
    /// after login and the user is asked to log in first.
    fn enter(&self, location: &str) -> Result<()> {
        self.navigator.set_location(location);
        match self.controller.view() {
            View::Shell(_) => Ok(()),
            View::Login | View::ServerDown => {
                self.controller.defer_to_login(location)?;
                bail!("Not logged in. Run `petcentral login` to continue at {}", location)
            }
        }
    }

    async fn list_at(&self, resource: AdminResource, location: &str) -> Result<Value> {
        let config = location_query(location);
        Ok(self.client().get_with(&resource.path(), &config).await?)
    }

    async fn login(&mut self, email: Option<String>) -> Result<()> {
        self.navigator.set_location(Route::Login.path());
        if let Some(message) = self.controller.take_auth_message() {
            eprintln!("{}", message);
        }

        let email = match email.or_else(|| self.config.last_email.clone()) {
            Some(email) => email,
            None => prompt("Email: ")?,
        };
        let password = rpassword::prompt_password(format!("Password for {}: ", email))
            .context("Failed to read password")?;

        let request = LoginRequest::new(email.trim(), password);
        let resumed = self.complete_login(&request).await?;

        // Remember the email for next time
        self.config.last_email = Some(request.email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        if let Some(value) = resumed {
            print_json(&value)?;
        }
        Ok(())
    }

    /// Log in, then reload the screen the user was sent away from, if it
    /// lists a resource.
    async fn complete_login(&self, request: &LoginRequest) -> Result<Option<Value>> {
        let target = self.controller.login(request).await?;
        println!("Logged in");

        let route = Route::from_location(&target);
        match AdminResource::for_route(route) {
            Some(resource) => {
                println!("Returning to {}", route.label());
                Ok(Some(self.list_at(resource, &target).await?))
            }
            None => Ok(None),
        }
    }

    fn status(&self) {
        let context = self.client().context();
        println!("API:           {}", self.client().base_url());
        println!("Storage:       {:?}", self.config.storage);
        match context.tokens().issued_at() {
            Some(at) if self.controller.is_authenticated() => {
                println!("Session:       logged in since {}", at.format("%Y-%m-%d %H:%M UTC"))
            }
            _ if self.controller.is_authenticated() => println!("Session:       logged in"),
            _ => println!("Session:       not logged in"),
        }
        if self.controller.is_authenticated() {
            let screens: Vec<&str> = Route::NAV_ITEMS.iter().map(Route::label).collect();
            println!("Screens:       {}", screens.join(", "));
        }
        if let Some(redirect) = context.pending_redirect() {
            println!("Resume at:     {}", redirect);
        }
        if let Some(message) = context.auth_message() {
            println!("Notice:        {}", message);
        }
    }

    async fn probe(&self, continuous: bool) -> Result<ProbeState> {
        let policy = if continuous {
            ProbePolicy::Continuous
        } else {
            ProbePolicy::from_continuous(self.config.probe.continuous)
        };
        let mut prober = AvailabilityProber::new(
            Arc::new(self.client().clone()),
            self.config.probe.interval(),
        )
        .with_policy(policy);
        let interval = prober.interval();

        prober.start();
        let mut states = prober.subscribe();
        println!("Checking {}", self.client().url(&self.config.health_path));

        loop {
            let state = *states.borrow_and_update();
            match state {
                ProbeState::Checking => {}
                ProbeState::Available => {
                    println!("API is available (attempt {})", prober.attempts());
                    if policy == ProbePolicy::UntilAvailable {
                        break;
                    }
                }
                ProbeState::Unavailable => println!(
                    "API is unavailable (attempt {}), retrying in {}s",
                    prober.attempts(),
                    interval.as_secs_f32()
                ),
            }
            if states.changed().await.is_err() {
                break;
            }
        }

        prober.stop();
        self.navigator.navigate(Route::Dashboard.path());
        Ok(prober.state())
    }
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("No email given");
    }
    Ok(line)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use petcentral_core::auth::{MemoryStore, NOT_LOGGED_IN_MESSAGE};
    use petcentral_core::ApiError;
    use serde_json::json;
    use std::net::TcpListener;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn open_console(base_url: &str) -> Result<(Console, SessionContext)> {
        let config = Config {
            api_base_url: base_url.to_string(),
            ..Config::default()
        };
        let console = Console::with_store(config, Arc::new(MemoryStore::new()))?;
        let context = console.client().context().clone();
        Ok((console, context))
    }

    #[test]
    fn test_parse_no_args_is_help() {
        assert_eq!(Command::parse(&[]).unwrap(), Command::Help);
    }

    #[test]
    fn test_parse_get_with_query_and_id() {
        assert_eq!(
            Command::parse(&args(&["get", "breeds?search=lab"])).unwrap(),
            Command::Get {
                target: "breeds?search=lab".to_string(),
                id: None
            }
        );
        assert_eq!(
            Command::parse(&args(&["get", "colors", "7"])).unwrap(),
            Command::Get {
                target: "colors".to_string(),
                id: Some("7".to_string())
            }
        );
    }

    #[test]
    fn test_parse_multipart_body() {
        let command = Command::parse(&args(&[
            "create",
            "pet-types",
            "--multipart",
            "name=Dog",
            "image=@dog.png",
        ]))
        .unwrap();
        assert_eq!(
            command,
            Command::Create {
                resource: "pet-types".to_string(),
                body: Body::Fields(vec![
                    ("name".to_string(), "Dog".to_string()),
                    ("image".to_string(), "@dog.png".to_string()),
                ]),
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&args(&["create", "colors"])).is_err());
        assert!(Command::parse(&args(&["create", "colors", "--multipart", "name"])).is_err());
        assert!(Command::parse(&args(&["stories", "week"])).is_err());
        assert!(Command::parse(&args(&["frobnicate"])).is_err());
    }

    #[test]
    fn test_resolve_target_keeps_query() {
        let (resource, location) = resolve_target("pet-owners?goldPaw=true").unwrap();
        assert_eq!(resource, AdminResource::PetOwners);
        assert_eq!(location, "/pet-owners?goldPaw=true");

        let (resource, location) = resolve_target("stories").unwrap();
        assert_eq!(resource, AdminResource::StoriesSummary);
        assert_eq!(location, "/stories");

        assert!(resolve_target("cats").is_err());
    }

    #[test]
    fn test_location_query_pairs() {
        let config = location_query("/breeds?search=lab&verified");
        assert_eq!(
            config.query,
            vec![
                ("search".to_string(), "lab".to_string()),
                ("verified".to_string(), String::new()),
            ]
        );
        assert!(location_query("/breeds").query.is_empty());
    }

    #[test]
    fn test_json_body_payload() {
        let payload = Body::Json(r#"{"name":"Teal"}"#.to_string())
            .into_payload()
            .unwrap();
        assert!(matches!(payload, Payload::Json(v) if v["name"] == "Teal"));
        assert!(Body::Json("not json".to_string()).into_payload().is_err());
    }

    #[test]
    fn test_multipart_payload_text_fields() {
        let payload = Body::Fields(vec![("name".to_string(), "Dog".to_string())])
            .into_payload()
            .unwrap();
        match payload {
            Payload::Multipart(form) => assert_eq!(form.text_value("name"), Some("Dog")),
            other => panic!("expected multipart, got {:?}", other),
        }
    }

    #[test]
    fn test_enter_without_session_remembers_screen_only() -> Result<()> {
        // Never contacted
        let (console, context) = open_console("http://127.0.0.1:9")?;

        let err = console.enter("/colors").unwrap_err();
        assert!(err.to_string().contains("petcentral login"));

        assert_eq!(context.pending_redirect().as_deref(), Some("/colors"));
        assert_eq!(context.auth_message(), None);
        assert_eq!(console.navigator.current_location(), "/login");
        Ok(())
    }

    #[tokio::test]
    async fn test_get_without_session_then_login_resumes_list() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"token": "t1"}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/admin/breeds"))
            .and(query_param("search", "lab"))
            .and(header("authorization", "Bearer t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let config = Config {
            api_base_url: server.uri(),
            ..Config::default()
        };

        // First run: no session, nothing is sent
        let first = Console::with_store(config.clone(), store.clone())?;
        let command = Command::parse(&args(&["get", "breeds?search=lab"]))?;
        assert!(first.run(command).await.is_err());

        // Second run: log in and land back on the filtered list
        let second = Console::with_store(config, store)?;
        let resumed = second
            .complete_login(&LoginRequest::new("admin@petcentral.app", "hunter2"))
            .await?;
        assert_eq!(resumed, Some(json!([{"id": 1}])));
        assert_eq!(second.navigator.current_location(), "/breeds?search=lab");
        assert_eq!(second.client().context().pending_redirect(), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_login_without_redirect_lands_on_dashboard() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t1"})))
            .mount(&server)
            .await;

        let (console, context) = open_console(&server.uri())?;
        let resumed = console
            .complete_login(&LoginRequest::new("admin@petcentral.app", "hunter2"))
            .await?;

        assert_eq!(resumed, None);
        assert_eq!(console.navigator.current_location(), "/");
        assert_eq!(context.token().as_deref(), Some("t1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_token_on_get_queues_banner() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/colors/3"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (console, context) = open_console(&server.uri())?;
        context.tokens().set("stale")?;

        let command = Command::parse(&args(&["get", "colors", "3"]))?;
        let err = console.run(command).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::SessionExpired { redirect }) if redirect == "/colors"
        ));

        assert_eq!(context.token(), None);
        assert_eq!(context.pending_redirect().as_deref(), Some("/colors"));
        assert_eq!(context.auth_message().as_deref(), Some(NOT_LOGGED_IN_MESSAGE));
        Ok(())
    }

    #[tokio::test]
    async fn test_probe_with_zero_interval_finishes() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weatherforecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = Config {
            api_base_url: server.uri(),
            ..Config::default()
        };
        config.probe.interval_ms = 0;
        let console = Console::with_store(config, Arc::new(MemoryStore::new()))?;

        let state = tokio::time::timeout(Duration::from_secs(5), console.probe(false)).await??;
        assert_eq!(state, ProbeState::Available);
        assert_eq!(console.navigator.current_location(), "/");
        Ok(())
    }
}
