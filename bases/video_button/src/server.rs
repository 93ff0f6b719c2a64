// bases/video_button/src/server.rs
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use playback_coordinator::{PlayOutcome, PlaybackController, PlaybackState, TriggerSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    controller: PlaybackController,
}

/// Remote control page
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    image: String,
    video: String,
    playing: bool,
    notice: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MediaKind {
    Image,
    Video,
}

/// Selection form submission
#[derive(Debug, Deserialize)]
struct SelectForm {
    #[serde(rename = "type")]
    kind: MediaKind,
    path: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    state: PlaybackState,
    image: PathBuf,
    video: PathBuf,
}

pub fn router(controller: PlaybackController) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/play", get(play))
        .route("/select", post(select))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { controller })
}

/// Serve the remote trigger until `shutdown` is cancelled
pub async fn run(
    controller: PlaybackController,
    port: u16,
    shutdown: CancellationToken,
) -> color_eyre::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Remote trigger listening on http://{}", addr);

    axum::serve(listener, router(controller))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Remote trigger stopped");
    Ok(())
}

fn render_index(controller: &PlaybackController, notice: Option<String>) -> Result<String, AppError> {
    let media = controller.media().snapshot();
    let template = IndexTemplate {
        image: media.image.display().to_string(),
        video: media.video.display().to_string(),
        playing: controller.is_playing(),
        notice,
    };

    template
        .render()
        .map_err(|e| AppError::Template(e.to_string()))
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    Ok(Html(render_index(&state.controller, None)?))
}

/// Remote play trigger
async fn play(State(state): State<AppState>) -> Result<Response, AppError> {
    let outcome = state.controller.request_play(TriggerSource::Remote);
    info!("Remote play request: {:?}", outcome);

    let status = match outcome {
        PlayOutcome::Started => StatusCode::OK,
        PlayOutcome::AlreadyPlaying => StatusCode::CONFLICT,
        PlayOutcome::VideoMissing => StatusCode::NOT_FOUND,
    };
    let html = render_index(&state.controller, Some(outcome.message().to_string()))?;

    Ok((status, Html(html)).into_response())
}

async fn select(
    State(state): State<AppState>,
    Form(form): Form<SelectForm>,
) -> Result<Html<String>, AppError> {
    let path = form.path.trim();
    if path.is_empty() {
        return Err(AppError::Validation("No file path given".to_string()));
    }

    let media = state.controller.media();
    let notice = match form.kind {
        MediaKind::Video => {
            media.set_video_path(path);
            format!("Video selected: {}", path)
        }
        MediaKind::Image => {
            media.set_image_path(path);
            // while playing, the new image shows up when the session ends
            if state.controller.refresh_idle_image().await {
                format!("Image selected and displayed: {}", path)
            } else {
                format!("Image selected, shown after the current video: {}", path)
            }
        }
    };

    Ok(Html(render_index(&state.controller, Some(notice))?))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let media = state.controller.media().snapshot();
    Json(StatusResponse {
        state: state.controller.state(),
        image: media.image,
        video: media.video,
    })
}

/// Application-level errors for HTTP handlers
#[derive(Debug)]
enum AppError {
    Template(String),
    Validation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Template(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = format!(
            r#"<!DOCTYPE html>
            <html>
            <head><title>Error</title></head>
            <body>
                <h1>Error</h1>
                <p>{}</p>
                <a href="/">Back to home</a>
            </body>
            </html>"#,
            message
        );

        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use display_supervisor::test_utils::{RecordingSupervisor, SupervisorCall};
    use playback_coordinator::{MediaPaths, MediaSelection};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        controller: PlaybackController,
        supervisor: Arc<RecordingSupervisor>,
        _media_dir: TempDir,
    }

    fn harness() -> Harness {
        let media_dir = TempDir::new().unwrap();
        let video = media_dir.path().join("clip.mp4");
        std::fs::write(&video, b"mp4").unwrap();

        let supervisor = Arc::new(RecordingSupervisor::new());
        let controller = PlaybackController::new(
            supervisor.clone(),
            MediaSelection::new(MediaPaths::new("/srv/idle.png", video)),
            CancellationToken::new(),
        );

        Harness {
            app: router(controller.clone()),
            controller,
            supervisor,
            _media_dir: media_dir,
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn select_form(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/select")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn index_shows_current_selection() {
        let h = harness();

        let response = h.app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("idle.png"));
        assert!(body.contains("clip.mp4"));
    }

    #[tokio::test]
    async fn play_starts_once_then_conflicts() {
        let h = harness();

        let first = h.app.clone().oneshot(get_request("/play")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert!(body_text(first).await.contains("Video playback triggered!"));

        let second = h.app.clone().oneshot(get_request("/play")).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert!(body_text(second).await.contains("already playing"));

        h.supervisor.finish_video();
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn play_with_missing_video_is_not_found() {
        let h = harness();
        h.controller.media().set_video_path("/nonexistent/clip.mp4");

        let response = h.app.oneshot(get_request("/play")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(h.controller.state().is_idle());
    }

    #[tokio::test]
    async fn selecting_an_image_while_idle_displays_it() {
        let h = harness();

        let response = h
            .app
            .oneshot(select_form("type=image&path=%2Fsrv%2Fnew.png"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            h.supervisor.calls(),
            vec![SupervisorCall::ShowIdleImage(PathBuf::from("/srv/new.png"))]
        );
    }

    #[tokio::test]
    async fn selecting_a_video_only_updates_the_selection() {
        let h = harness();

        let response = h
            .app
            .oneshot(select_form("type=video&path=%2Fsrv%2Fother.mp4"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.controller.media().video_path(), PathBuf::from("/srv/other.mp4"));
        assert!(h.supervisor.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_path_is_rejected() {
        let h = harness();

        let response = h
            .app
            .oneshot(select_form("type=image&path=+++"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.controller.media().image_path(), PathBuf::from("/srv/idle.png"));
    }

    #[tokio::test]
    async fn status_reports_state_and_selection() {
        let h = harness();

        let response = h.app.oneshot(get_request("/status")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["state"], "idle");
        assert_eq!(json["image"], "/srv/idle.png");
    }
}
