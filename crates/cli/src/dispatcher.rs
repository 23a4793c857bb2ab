use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use execd_cache::{compute_fingerprint, Cache, StatsAggregator};
use execd_codec::WorkspaceBuilder;
use execd_core::{
    constants::DEFAULT_TIMEOUT_SECS, Commands, ConcurrencyMode, EnvironmentInfo, Error,
    ExecutionId, ExecutionResult, FilePayload, StoredResult,
};
use execd_environment::{Checkout, EnvironmentManager};
use execd_exec::{ChainRunner, CommandExecutor, SystemCommandExecutor};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::validation::validate_execution_request;

/// Shared state handed to every handler: the single cache, stats aggregator
/// and environment registry for the process's lifetime.
pub struct AppState {
    pub cache: Cache,
    pub stats: StatsAggregator,
    pub environments: EnvironmentManager,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", axum::routing::get(healthz))
        .route("/v1/execute", axum::routing::post(execute))
        .route("/v1/stats/execution", axum::routing::get(stats))
        .route("/v1/environment", axum::routing::post(create_environment))
        .with_state(state)
}

/// Flat `{error, code}` body per the error response contract.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let body = ErrorBody {
            error: self.0.to_string(),
            code: code.as_str(),
        };
        (code.status(), Json(body)).into_response()
    }
}

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.stats.snapshot())
}

/// A leased workspace root for one execution, whatever its source.
enum Workspace {
    Ephemeral(tempfile::TempDir),
    Named(Checkout),
}

impl Workspace {
    fn path(&self) -> &Path {
        match self {
            Workspace::Ephemeral(dir) => dir.path(),
            Workspace::Named(checkout) => checkout.root.as_path(),
        }
    }
}

pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<Value>,
) -> Result<Response, ApiError> {
    let request = validate_execution_request(&raw)?;
    let fingerprint = compute_fingerprint(&request);

    let environment_name = request.environment.clone();
    let committed = match &environment_name {
        Some(name) => state.environments.concurrency_mode(name)?.commits_writes(),
        None => false,
    };

    let workspace = match &environment_name {
        Some(name) => Workspace::Named(state.environments.checkout(name)?),
        None => {
            let dir = tempfile::Builder::new()
                .prefix("execd-exec-")
                .tempdir()
                .map_err(Error::from)?;
            Workspace::Ephemeral(dir)
        }
    };
    let root = workspace.path().to_path_buf();

    let files = request.files.clone();
    let env = request.env.clone();
    let stdin = request
        .stdin
        .clone()
        .map(|s| s.into_string())
        .unwrap_or_default();
    let track = request.track.clone();
    let default_timeout =
        Duration::from_secs_f64(request.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let continue_on_error = request.continue_on_error;
    let command = request.command.clone();

    let failure: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
    let failure_slot = Arc::clone(&failure);

    // This closure only actually runs for the caller that wins the
    // single-flight race for `fingerprint`; every other concurrent,
    // identical request observes its result without touching the
    // filesystem or spawning anything.
    let (stored, was_hit) = state
        .cache
        .get_or_compute(fingerprint, request.force, move || async move {
            match run_once(
                &root,
                &command,
                &env,
                &files,
                &stdin,
                default_timeout,
                continue_on_error,
                track.as_deref(),
            )
            .await
            {
                Ok(stored) => stored,
                Err(error) => {
                    *failure_slot.lock() = Some(error);
                    sentinel_stored_result()
                }
            }
        })
        .await;

    if let Some(error) = failure.lock().take() {
        if !was_hit {
            state.cache.invalidate(&fingerprint);
        }
        return Err(ApiError(error));
    }

    if was_hit {
        state.stats.record_hit();
    } else {
        let commands_executed = stored
            .commands
            .as_ref()
            .map(|c| c.len() as u64)
            .unwrap_or(1);
        state.stats.record_miss(stored.duration, commands_executed);
    }

    drop(workspace);

    let id = ExecutionId::new();
    let mut result = ExecutionResult::from_stored(id, (*stored).clone(), was_hit);
    if let Some(name) = environment_name {
        result = result.with_environment(EnvironmentInfo { name, committed });
    }

    Ok((StatusCode::CREATED, Json(result)).into_response())
}

/// Materializes `files` over `root` (overlaying any pre-existing base
/// content written at environment-creation time), runs `command`, and
/// harvests `track` back out. Isolated as a free function so it can be the
/// sole body of the cache's single-flight compute closure.
#[allow(clippy::too_many_arguments)]
async fn run_once(
    root: &Path,
    command: &Commands,
    env: &BTreeMap<String, String>,
    files: &BTreeMap<String, FilePayload>,
    stdin: &str,
    default_timeout: Duration,
    continue_on_error: bool,
    track: Option<&[String]>,
) -> Result<StoredResult, Error> {
    WorkspaceBuilder::materialize(root, files)?;

    let executor = SystemCommandExecutor::new();
    let chain_result = ChainRunner::run(
        &executor as &dyn CommandExecutor,
        command,
        root,
        env,
        stdin,
        default_timeout,
        continue_on_error,
    )
    .await?;

    let harvested = WorkspaceBuilder::harvest(root, track)?;

    Ok(StoredResult {
        stdout: chain_result.stdout,
        stderr: chain_result.stderr,
        exit_code: chain_result.exit_code,
        duration: chain_result.duration,
        timed_out: chain_result.timed_out,
        files: harvested,
        commands: chain_result.commands,
    })
}

fn sentinel_stored_result() -> StoredResult {
    StoredResult {
        stdout: String::new(),
        stderr: String::new(),
        exit_code: i32::MIN,
        duration: 0.0,
        timed_out: false,
        files: None,
        commands: None,
    }
}

#[derive(serde::Deserialize)]
pub struct CreateEnvironmentRequest {
    name: String,
    concurrency_mode: String,
    #[serde(default)]
    files: BTreeMap<String, FilePayload>,
}

#[derive(Serialize)]
struct FileReceipt {
    written_bytes: u64,
}

#[derive(Serialize)]
struct CreateEnvironmentResponse {
    name: String,
    concurrency_mode: String,
    files: BTreeMap<String, FileReceipt>,
}

pub async fn create_environment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateEnvironmentRequest>,
) -> Result<Response, ApiError> {
    let mode = ConcurrencyMode::parse(&body.concurrency_mode)
        .ok_or_else(|| Error::invalid_concurrency_mode(body.concurrency_mode.clone()))?;

    state.environments.create(&body.name, mode, &body.files)?;

    let mut files = BTreeMap::new();
    for (path, payload) in &body.files {
        let (format, compression) = execd_codec::format::parse_path(path)?;
        let encoded = execd_codec::format::encode(format, &payload.0, path)?;
        let bytes = execd_codec::compression::compress(&encoded, compression)?;
        files.insert(
            path.clone(),
            FileReceipt {
                written_bytes: bytes.len() as u64,
            },
        );
    }

    let response = CreateEnvironmentResponse {
        name: body.name,
        concurrency_mode: mode.as_str().to_string(),
        files,
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> (Arc<AppState>, tempfile::TempDir) {
        let scratch = tempfile::TempDir::new().unwrap();
        let app = Arc::new(AppState {
            cache: Cache::new(),
            stats: StatsAggregator::new(),
            environments: EnvironmentManager::new(scratch.path().to_path_buf()),
        });
        (app, scratch)
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        assert_eq!(healthz().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn execute_runs_a_minimal_command() {
        let (state, _scratch) = state();
        let response = execute(State(state), Json(json!({"command": "echo hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn execute_rejects_missing_command() {
        let (state, _scratch) = state();
        let err = execute(State(state), Json(json!({}))).await.unwrap_err();
        assert_eq!(err.0.code().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn execute_reports_cache_hit_on_repeat() {
        let (state, _scratch) = state();
        execute(State(Arc::clone(&state)), Json(json!({"command": "echo hi"})))
            .await
            .unwrap();
        let snapshot_after_first = state.stats.snapshot();
        assert_eq!(snapshot_after_first.cache.misses, 1);

        execute(State(Arc::clone(&state)), Json(json!({"command": "echo hi"})))
            .await
            .unwrap();
        let snapshot_after_second = state.stats.snapshot();
        assert_eq!(snapshot_after_second.cache.hits, 1);
        assert_eq!(snapshot_after_second.cache.misses, 1);
    }

    #[tokio::test]
    async fn create_environment_then_execute_commits_writes_under_never() {
        let (state, _scratch) = state();
        let create = create_environment(
            State(Arc::clone(&state)),
            Json(CreateEnvironmentRequest {
                name: "build".to_string(),
                concurrency_mode: "never".to_string(),
                files: BTreeMap::new(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(create.status(), StatusCode::CREATED);

        let response = execute(
            State(Arc::clone(&state)),
            Json(json!({
                "command": "echo hi > out.txt",
                "environment": "build",
            })),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let second = execute(
            State(state),
            Json(json!({
                "command": "cat out.txt",
                "environment": "build",
                "force": true,
            })),
        )
        .await
        .unwrap();
        assert_eq!(second.status(), StatusCode::CREATED);
    }
}
