use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    serve, Form, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use lazy_static::lazy_static;
use minijinja::{path_loader, Environment, HtmlEscape, Value};
use minijinja_autoreload::AutoReloader;
use regex::Regex;
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::constants::PENDING_MESSAGE;
use crate::session::{SessionController, SessionView};
use crate::summary::parse_summary;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

lazy_static! {
    static ref BOLD: Regex = Regex::new(r"\*\*(.*?)\*\*").unwrap();
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub port: u16,
    /// When set, templates are read from this directory and reloaded on change.
    pub templates_dir: Option<PathBuf>,
    pub static_dir: PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    controller: SessionController,
}

impl AppState {
    pub fn new(controller: SessionController, templates_dir: Option<PathBuf>) -> Self {
        Self { templates: Arc::new(create_minijinja_env(templates_dir)), controller }
    }
}

/// Intents a WebSocket client may send instead of posting forms.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientIntent {
    Send { text: String },
    Retry { api_key: String },
    Dismiss,
}

#[derive(Debug, Deserialize)]
struct SendForm {
    text: String,
}

#[derive(Debug, Deserialize)]
struct RetryForm {
    api_key: String,
}

/// Escapes a message and turns `**text**` into `<strong>text</strong>`.
pub fn render_message_html(text: &str) -> String {
    let escaped = HtmlEscape(text).to_string();
    BOLD.replace_all(&escaped, "<strong>$1</strong>").into_owned()
}

fn bold_filter(value: String) -> Value {
    Value::from_safe_string(render_message_html(&value))
}

// Transcript bubbles for summary turns show the parsed record, or the text if it does not parse.
fn summary_filter(value: String) -> Value {
    Value::from_serialize(&parse_summary(&value))
}

fn create_minijinja_env(templates_dir: Option<PathBuf>) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.add_filter("bold", bold_filter);
        env.add_filter("summary", summary_filter);
        match &templates_dir {
            Some(dir) => {
                env.set_loader(path_loader(dir.clone()));
                notifier.watch_path(dir.as_path(), true);
            }
            None => env.add_template("index.html", INDEX_TEMPLATE)?,
        }
        Ok(env)
    })
}

fn render_index(state: &AppState, view: &SessionView) -> Result<String, minijinja::Error> {
    let env = state.templates.acquire_env()?;
    let tmpl = env.get_template("index.html")?;
    let html = tmpl.render(minijinja::context! {
        title => "Care Intake",
        pending_message => PENDING_MESSAGE,
        view => view,
    })?;
    Ok(html)
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let view = state.controller.view().await;
    render_index(&state, &view).map(Html).map_err(|e| {
        error!("Failed to get or render template: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, Html(format!("Internal Server Error: {}", e)))
    })
}

async fn session_handler(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.controller.view().await)
}

// Model calls run detached so a closed browser tab cannot strand the pending flag.
async fn send_handler(State(state): State<AppState>, Form(form): Form<SendForm>) -> Redirect {
    let controller = state.controller.clone();
    tokio::spawn(async move {
        let outcome = controller.send_text(&form.text).await;
        debug!(?outcome, "Send finished");
    });
    Redirect::to("/")
}

async fn retry_handler(State(state): State<AppState>, Form(form): Form<RetryForm>) -> Redirect {
    let controller = state.controller.clone();
    tokio::spawn(async move {
        let outcome = controller.retry_with_key(&form.api_key).await;
        debug!(?outcome, "Retry finished");
    });
    Redirect::to("/")
}

async fn dismiss_handler(State(state): State<AppState>) -> Redirect {
    state.controller.dismiss_error().await;
    Redirect::to("/")
}

async fn listen_handler(State(state): State<AppState>) -> Redirect {
    if let Err(e) = state.controller.start_voice_input().await {
        debug!("Voice input unavailable: {}", e);
    }
    Redirect::to("/")
}

async fn speak_handler(State(state): State<AppState>) -> Redirect {
    if let Err(e) = state.controller.speak_latest().await {
        debug!("Speech output unavailable: {}", e);
    }
    Redirect::to("/")
}

async fn stop_voice_handler(State(state): State<AppState>) -> Redirect {
    state.controller.stop_voice_input();
    state.controller.stop_speaking();
    Redirect::to("/")
}

// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn dispatch_intent(controller: &SessionController, intent: ClientIntent) {
    let controller = controller.clone();
    tokio::spawn(async move {
        match intent {
            ClientIntent::Send { text } => {
                controller.send_text(&text).await;
            }
            ClientIntent::Retry { api_key } => {
                controller.retry_with_key(&api_key).await;
            }
            ClientIntent::Dismiss => controller.dismiss_error().await,
        }
    });
}

// Pushes a fresh SessionView to the client after every session mutation.
async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("New WebSocket connection established");
    let mut views = state.controller.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let current = state.controller.view().await;
    match serde_json::to_string(&current) {
        Ok(json) => {
            if sender.send(Message::Text(json)).await.is_err() {
                warn!("Failed to send initial view to new WebSocket client");
                return;
            }
        }
        Err(e) => error!("Failed to serialize session view: {}", e),
    }

    loop {
        tokio::select! {
            Ok(view) = views.recv() => {
                match serde_json::to_string(&view) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            warn!("WebSocket client disconnected or send error. Closing connection.");
                            break;
                        }
                    }
                    Err(e) => error!("Failed to serialize session view: {}", e),
                }
            }

            Some(Ok(msg)) = receiver.next() => {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientIntent>(&text) {
                        Ok(intent) => {
                            debug!(?intent, "Received intent from WebSocket client");
                            dispatch_intent(&state.controller, intent);
                        }
                        Err(e) => warn!("Ignoring malformed WebSocket message: {}", e),
                    },
                    Message::Binary(_) => {
                        warn!("Received unexpected binary message from client");
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Close(_) => {
                        info!("Client requested WebSocket close");
                        break;
                    }
                }
            }

            else => {
                info!("WebSocket client disconnected");
                break;
            }
        }
    }
    info!("WebSocket connection closed");
}

pub fn build_router(state: AppState, static_dir: PathBuf) -> Router {
    let static_files_service = ServeDir::new(static_dir).not_found_service(tower::service_fn(|_: Request| async {
        Ok::<Response, Infallible>((StatusCode::NOT_FOUND, "Not Found").into_response())
    }));

    Router::new()
        .route("/", get(index_handler))
        .route("/api/session", get(session_handler))
        .route("/send", post(send_handler))
        .route("/retry", post(retry_handler))
        .route("/dismiss", post(dismiss_handler))
        .route("/voice/listen", post(listen_handler))
        .route("/voice/speak", post(speak_handler))
        .route("/voice/stop", post(stop_voice_handler))
        .route("/ws", get(ws_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(config: WebConfig, controller: SessionController) -> Result<()> {
    let state = AppState::new(controller, config.templates_dir);
    let app = build_router(state, config.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service()).await.context("Web server failed")?;

    Ok(())
}
