//! # API REST
//!
//! REST API for the Swasth review backend.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, status codes, CORS)
//!
//! Case storage and validation live in `swasth-core`; wire types come from `api-shared`.

#![warn(rust_2018_idioms)]

use api_shared::{
    CaseRecord, CaseSubmission, CreateCaseRes, EpidemicRes, ErrorRes, HealthRes, HealthService,
    SymptomTrend, ValidateCaseReq, ValidateCaseRes,
};
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use swasth_core::constants::DEFAULT_TREND_DAYS;
use swasth_core::{CaseStatusFilter, CoreError, ReviewRepository};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    repo: Arc<ReviewRepository>,
}

impl AppState {
    pub fn new(repo: ReviewRepository) -> Self {
        Self {
            repo: Arc::new(repo),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, create_case, list_cases, validate_case, epidemic),
    components(schemas(
        HealthRes,
        CaseSubmission,
        CreateCaseRes,
        CaseRecord,
        ValidateCaseReq,
        ValidateCaseRes,
        SymptomTrend,
        EpidemicRes,
        ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Builds the application router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/cases", get(list_cases).post(create_case))
        .route("/api/cases/:id/validate", put(validate_case))
        .route("/api/epidemic", get(epidemic))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorRes>)>;

/// Maps a core error onto an HTTP status. Caller mistakes are 4xx; anything else is logged and
/// reported as a generic 500.
fn error_response(context: &str, err: CoreError) -> (StatusCode, Json<ErrorRes>) {
    let status = match &err {
        CoreError::Validation(_) | CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CoreError::CaseNotFound(_) => StatusCode::NOT_FOUND,
        _ => {
            tracing::error!("{context} error: {err:?}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes {
                    error: "Internal error".into(),
                }),
            );
        }
    };

    tracing::debug!("{context} rejected: {err}");
    (
        status,
        Json(ErrorRes {
            error: err.to_string(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Health check endpoint, also reporting how many cases are stored.
#[axum::debug_handler]
async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthRes>> {
    let count = state
        .repo
        .count()
        .map_err(|e| error_response("Health", e))?;
    Ok(Json(HealthService::check_health(count)))
}

#[utoipa::path(
    post,
    path = "/api/cases",
    request_body = CaseSubmission,
    responses(
        (status = 201, description = "Case stored", body = CreateCaseRes),
        (status = 200, description = "Case with this localId already stored", body = CreateCaseRes),
        (status = 400, description = "Invalid case", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Accept a triaged case from a device.
///
/// Re-delivery of a queued case (same `localId`) returns the id it was first stored under.
#[axum::debug_handler]
async fn create_case(
    State(state): State<AppState>,
    Json(req): Json<CaseSubmission>,
) -> ApiResult<(StatusCode, Json<CreateCaseRes>)> {
    let created = state
        .repo
        .create(req, Utc::now())
        .map_err(|e| error_response("Create case", e))?;

    let status = if created.newly_created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(CreateCaseRes {
            id: created.record.id,
            status: "saved".into(),
            timestamp: created.record.submitted_at,
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct ListCasesParams {
    status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/cases",
    params(
        ("status" = Option<String>, Query, description = "all (default), pending or validated")
    ),
    responses(
        (status = 200, description = "Cases, newest first", body = [CaseRecord]),
        (status = 400, description = "Unknown status filter", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn list_cases(
    State(state): State<AppState>,
    Query(params): Query<ListCasesParams>,
) -> ApiResult<Json<Vec<CaseRecord>>> {
    let filter = params
        .status
        .as_deref()
        .map(str::parse::<CaseStatusFilter>)
        .transpose()
        .map_err(|e| error_response("List cases", e))?
        .unwrap_or_default();

    let cases = state
        .repo
        .list(filter)
        .map_err(|e| error_response("List cases", e))?;
    Ok(Json(cases))
}

#[utoipa::path(
    put,
    path = "/api/cases/{id}/validate",
    params(("id" = String, Path, description = "Backend case id, e.g. CASE-1A2B3C4D")),
    request_body = ValidateCaseReq,
    responses(
        (status = 200, description = "Case validated", body = ValidateCaseRes),
        (status = 404, description = "No such case", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Record a reviewer's validation of a case.
#[axum::debug_handler]
async fn validate_case(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<ValidateCaseReq>,
) -> ApiResult<Json<ValidateCaseRes>> {
    let record = state
        .repo
        .validate(&id, req.comment, Utc::now())
        .map_err(|e| error_response("Validate case", e))?;

    Ok(Json(ValidateCaseRes {
        id: record.id,
        validated: record.validated,
        validated_at: record.validated_at.unwrap_or_else(Utc::now),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct EpidemicParams {
    days: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/api/epidemic",
    params(("days" = Option<u32>, Query, description = "Reporting window in days (default 7)")),
    responses(
        (status = 200, description = "Symptom trends", body = EpidemicRes),
        (status = 400, description = "Invalid window", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Most reported symptoms in the window, compared with the window before it.
#[axum::debug_handler]
async fn epidemic(
    State(state): State<AppState>,
    Query(params): Query<EpidemicParams>,
) -> ApiResult<Json<EpidemicRes>> {
    let days = params.days.unwrap_or(DEFAULT_TREND_DAYS);
    let res = state
        .repo
        .symptom_trends(days, Utc::now())
        .map_err(|e| error_response("Epidemic", e))?;
    Ok(Json(res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use swasth_core::{
        CaseBuilder, ExistingConditions, HttpBackend, MemoryStore, PendingQueue, RawAssessment,
        SubmissionOutcome, SubmissionPipeline,
    };
    use tempfile::TempDir;

    async fn spawn_server() -> (TempDir, String) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = ReviewRepository::open_dir(temp_dir.path().join("cases")).unwrap();
        let app = router(AppState::new(repo));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (temp_dir, format!("http://{addr}"))
    }

    fn raw(symptoms: &[&str], severity: &str) -> RawAssessment {
        RawAssessment {
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            age_group: "above60".into(),
            duration: "more5".into(),
            severity: severity.into(),
            medicine: "paracetamol".into(),
        }
    }

    #[tokio::test]
    async fn test_submit_online_then_review() {
        let (_temp_dir, base) = spawn_server().await;
        let pipeline = SubmissionPipeline::new(
            HttpBackend::new(&base).unwrap(),
            PendingQueue::new(Arc::new(MemoryStore::new())),
        );
        let case = CaseBuilder::default()
            .assess(&raw(&["fever"], "severe"), ExistingConditions::Yes)
            .unwrap();

        let outcome = pipeline.submit(case).await.unwrap();
        let SubmissionOutcome::Delivered { id, .. } = outcome else {
            panic!("backend is up, case should be delivered");
        };

        let client = reqwest::Client::new();
        let cases: Vec<CaseRecord> = client
            .get(format!("{base}/api/cases?status=pending"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id, id.as_str());
        assert_eq!(cases[0].risk_level, "HIGH");
        assert_eq!(cases[0].conditions, "yes");

        let res = client
            .put(format!("{base}/api/cases/{id}/validate"))
            .json(&ValidateCaseReq {
                comment: Some("Refer to PHC".into()),
            })
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let validated: ValidateCaseRes = res.json().await.unwrap();
        assert!(validated.validated);

        let cases: Vec<CaseRecord> = client
            .get(format!("{base}/api/cases?status=validated"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cases[0].doctor_comment.as_deref(), Some("Refer to PHC"));

        let health: HealthRes = client
            .get(format!("{base}/api/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.case_count, 1);
    }

    #[tokio::test]
    async fn test_offline_submit_then_reconcile_delivers_once() {
        let (_temp_dir, base) = spawn_server().await;
        let store = Arc::new(MemoryStore::new());

        // Nothing listens on the discard port, so delivery fails and the case is queued.
        let unreachable = SubmissionPipeline::new(
            HttpBackend::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap(),
            PendingQueue::new(store.clone()),
        );
        let builder = CaseBuilder::default();
        for symptoms in [&["breathing"][..], &["cough", "cold"][..]] {
            let case = builder
                .assess(&raw(symptoms, "mild"), ExistingConditions::Unknown)
                .unwrap();
            let outcome = unreachable.submit(case).await.unwrap();
            assert!(outcome.is_queued());
        }

        let online =
            SubmissionPipeline::new(HttpBackend::new(&base).unwrap(), PendingQueue::new(store));
        let report = online.reconcile().await.unwrap();
        assert_eq!(report.synced, 2);
        assert_eq!(report.still_pending, 0);

        let again = online.reconcile().await.unwrap();
        assert_eq!(again.synced, 0);

        let cases: Vec<CaseRecord> = reqwest::get(format!("{base}/api/cases"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.mode == "offline" && c.local_id.is_some()));
        assert!(cases.iter().any(|c| c.risk_level == "HIGH"));
    }

    #[tokio::test]
    async fn test_redelivery_with_same_local_id_is_not_duplicated() {
        let (_temp_dir, base) = spawn_server().await;
        let body = serde_json::json!({
            "symptoms": ["fever"],
            "ageGroup": "18-40",
            "duration": "today",
            "severity": "mild",
            "medicine": "none",
            "riskLevel": "LOW",
            "reasoningEn": "en",
            "reasoningHi": "hi",
            "mode": "offline",
            "localId": "OFFLINE-20260101T000000.000Z-00000000000040008000000000000000"
        });
        let client = reqwest::Client::new();

        let first = client
            .post(format!("{base}/api/cases"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(first.status(), reqwest::StatusCode::CREATED);
        let first: CreateCaseRes = first.json().await.unwrap();

        let second = client
            .post(format!("{base}/api/cases"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(second.status(), reqwest::StatusCode::OK);
        let second: CreateCaseRes = second.json().await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, "saved");
    }

    #[tokio::test]
    async fn test_bad_requests_map_to_4xx() {
        let (_temp_dir, base) = spawn_server().await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{base}/api/cases"))
            .json(&serde_json::json!({
                "symptoms": ["fever"],
                "ageGroup": "ancient",
                "duration": "today",
                "severity": "mild",
                "medicine": "none",
                "riskLevel": "LOW",
                "reasoningEn": "en",
                "reasoningHi": "hi"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
        let err: ErrorRes = res.json().await.unwrap();
        assert!(err.error.contains("ancient"));

        let res = client
            .put(format!("{base}/api/cases/CASE-00000000/validate"))
            .json(&ValidateCaseReq::default())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);

        let res = client
            .get(format!("{base}/api/cases?status=archived"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

        let res = client
            .get(format!("{base}/api/epidemic?days=0"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_epidemic_defaults_to_seven_days() {
        let (_temp_dir, base) = spawn_server().await;
        let client = reqwest::Client::new();
        for _ in 0..2 {
            client
                .post(format!("{base}/api/cases"))
                .json(&serde_json::json!({
                    "symptoms": ["cough", "fever"],
                    "ageGroup": "18-40",
                    "duration": "today",
                    "severity": "mild",
                    "medicine": "none",
                    "riskLevel": "MEDIUM",
                    "reasoningEn": "en",
                    "reasoningHi": "hi"
                }))
                .send()
                .await
                .unwrap();
        }

        let res: EpidemicRes = client
            .get(format!("{base}/api/epidemic"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(res.period_days, 7);
        assert_eq!(res.symptoms.len(), 2);
        assert_eq!(res.symptoms[0].id, "cough");
        assert_eq!(res.symptoms[0].count, 2);
        assert_eq!(res.symptoms[0].trend, "up");
        assert_eq!(res.symptoms[0].change_percent, 200.0);
    }

    #[test]
    fn test_openapi_lists_case_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();

        for path in [
            "/api/health",
            "/api/cases",
            "/api/cases/{id}/validate",
            "/api/epidemic",
        ] {
            assert!(paths.iter().any(|p| p == path), "missing {path}");
        }
    }
}
