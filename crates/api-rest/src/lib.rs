//! # API REST
//!
//! REST API implementation for Klaim.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! The router is generic over the record store and the generative lookup; the server binary
//! wires in the file store and the HTTP lookup.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use klaim_core::{
    ClaimError, ClaimService, Gender, GenerativeLookup, NewPatient, NonEmptyText, Patient,
    PatientCost, PatientStatus, RecordStore, ReferenceCatalog, ReferenceTemplate, ResolutionError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// Application state for the REST API server
///
/// Holds the claim service shared by every request handler.
pub struct AppState<S, L> {
    pub service: Arc<ClaimService<S, L>>,
}

impl<S, L> AppState<S, L> {
    pub fn new(service: ClaimService<S, L>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl<S, L> Clone for AppState<S, L> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

type ApiError = (StatusCode, String);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct PatientRes {
    #[schema(value_type = Object)]
    pub patient: Patient,
}

#[derive(Serialize, ToSchema)]
pub struct ListPatientsRes {
    #[schema(value_type = Vec<Object>)]
    pub patients: Vec<Patient>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientReq {
    pub mrn: String,
    #[serde(default)]
    pub bpjs_number: String,
    pub name: String,
    #[schema(value_type = String, example = "Female")]
    pub gender: Gender,
    #[schema(value_type = String, format = Date)]
    pub dob: NaiveDate,
    #[serde(default)]
    #[schema(value_type = String, example = "Admitted")]
    pub status: PatientStatus,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordDiagnosisReq {
    pub code: String,
    /// Free-text clinical context passed to the generative lookup.
    pub hint: Option<String>,
    /// Overrides the resolved description when non-empty.
    pub description: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordDiagnosisRes {
    /// `local` or `generated`.
    pub source: String,
    #[schema(value_type = Object)]
    pub patient: Patient,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCostsReq {
    pub billing_amount: Option<u64>,
    /// Manual INA-CBG tariff override. Zero or absent falls back to the catalog.
    pub ina_cbg_amount: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatusReq {
    #[schema(value_type = String, example = "Discharged")]
    pub status: PatientStatus,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TariffRes {
    pub patient_id: String,
    pub amount: u64,
    /// `override`, `catalog` or `unavailable`.
    pub source: String,
    pub is_from_catalog: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostSummaryRes {
    pub total_billing: u64,
    pub total_tariff: u64,
    pub variance: i64,
    #[schema(value_type = Vec<Object>)]
    pub patients: Vec<PatientCost>,
}

#[derive(Deserialize, ToSchema)]
pub struct ResolveReq {
    pub code: String,
    pub hint: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRes {
    pub source: String,
    pub code: String,
    pub description: String,
    pub severity: String,
    pub required_documents: Vec<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRes {
    #[schema(value_type = Vec<Object>)]
    pub templates: Vec<ReferenceTemplate>,
    /// Codes that appear more than once. Lookups use the first occurrence.
    pub duplicate_codes: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddTemplatesReq {
    /// Templates to append, each with `code`, `description`, `severity`, optional `tariff`
    /// and `requiredDocuments`.
    #[schema(value_type = Vec<Object>)]
    pub templates: Vec<ReferenceTemplate>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReplaceTemplateReq {
    #[schema(value_type = Object)]
    pub template: ReferenceTemplate,
}

#[derive(Deserialize, ToSchema)]
pub struct ImportCatalogReq {
    /// Delimited catalog text: sequence, code, description, tariff, documents, severity.
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct SkippedRowRes {
    pub line: u64,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct ImportCatalogRes {
    pub imported: usize,
    pub skipped: Vec<SkippedRowRes>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_patients,
        create_patient,
        get_patient,
        record_diagnosis,
        toggle_checklist_item,
        update_costs,
        update_status,
        patient_tariff,
        cost_summary,
        resolve,
        get_catalog,
        add_templates,
        replace_template,
        remove_template,
        import_catalog,
        export_catalog,
    ),
    components(schemas(
        HealthRes,
        PatientRes,
        ListPatientsRes,
        CreatePatientReq,
        RecordDiagnosisReq,
        RecordDiagnosisRes,
        UpdateCostsReq,
        UpdateStatusReq,
        TariffRes,
        CostSummaryRes,
        ResolveReq,
        ResolveRes,
        CatalogRes,
        AddTemplatesReq,
        ReplaceTemplateReq,
        ImportCatalogReq,
        ImportCatalogRes,
        SkippedRowRes,
    ))
)]
struct ApiDoc;

/// Builds the REST router with Swagger UI at `/swagger-ui`.
pub fn router<S, L>(state: AppState<S, L>) -> Router
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route(
            "/patients",
            get(list_patients::<S, L>).post(create_patient::<S, L>),
        )
        .route("/patients/:id", get(get_patient::<S, L>))
        .route("/patients/:id/diagnoses", post(record_diagnosis::<S, L>))
        .route(
            "/patients/:id/diagnoses/:diagnosis_id/checklist/:item_id/toggle",
            post(toggle_checklist_item::<S, L>),
        )
        .route("/patients/:id/costs", put(update_costs::<S, L>))
        .route("/patients/:id/status", put(update_status::<S, L>))
        .route("/patients/:id/tariff", get(patient_tariff::<S, L>))
        .route("/costs/summary", get(cost_summary::<S, L>))
        .route("/resolve", post(resolve::<S, L>))
        .route(
            "/catalog",
            get(get_catalog::<S, L>).post(add_templates::<S, L>),
        )
        .route(
            "/catalog/templates/:code",
            put(replace_template::<S, L>).delete(remove_template::<S, L>),
        )
        .route("/catalog/import", post(import_catalog::<S, L>))
        .route("/catalog/export", get(export_catalog::<S, L>))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Maps a core error onto a status code and a client-facing message.
///
/// Server-side failures are logged in full and reported as a generic message.
fn error_response(err: ClaimError) -> ApiError {
    let status = match &err {
        ClaimError::InvalidInput(_) | ClaimError::Text(_) => StatusCode::BAD_REQUEST,
        ClaimError::PatientNotFound(_)
        | ClaimError::DiagnosisNotFound(_)
        | ClaimError::ChecklistItemNotFound(_)
        | ClaimError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
        ClaimError::ResolutionPending(_) => StatusCode::CONFLICT,
        ClaimError::Resolution(ResolutionError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        ClaimError::Resolution(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Request failed: {:?}", err);
        (status, "Internal error".into())
    } else {
        tracing::error!("Request rejected ({}): {}", status, err);
        (status, err.to_string())
    }
}

fn non_empty(field: &'static str, value: String) -> Result<NonEmptyText, ApiError> {
    NonEmptyText::new(value).map_err(|_| (StatusCode::BAD_REQUEST, format!("{field} must not be empty")))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Klaim REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/patients",
    responses(
        (status = 200, description = "List of patients", body = ListPatientsRes),
        (status = 500, description = "Internal server error")
    )
)]
/// List all patients with their diagnoses and costs
async fn list_patients<S, L>(State(state): State<AppState<S, L>>) -> ApiResult<ListPatientsRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let patients = state.service.list_patients().map_err(error_response)?;
    Ok(Json(ListPatientsRes { patients }))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePatientReq,
    responses(
        (status = 201, description = "Patient registered", body = PatientRes),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a new patient
///
/// The patient starts with no diagnoses and no cost data.
///
/// # Errors
/// Returns `400 Bad Request` if the MRN or name is blank.
async fn create_patient<S, L>(
    State(state): State<AppState<S, L>>,
    Json(req): Json<CreatePatientReq>,
) -> Result<(StatusCode, Json<PatientRes>), ApiError>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let new_patient = NewPatient {
        mrn: non_empty("mrn", req.mrn)?,
        bpjs_number: req.bpjs_number,
        name: non_empty("name", req.name)?,
        gender: req.gender,
        dob: req.dob,
        status: req.status,
    };

    let patient = state
        .service
        .add_patient(new_patient)
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(PatientRes { patient })))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient record", body = PatientRes),
        (status = 404, description = "Patient not found")
    )
)]
async fn get_patient<S, L>(
    State(state): State<AppState<S, L>>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<PatientRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let patient = state.service.patient(&id).map_err(error_response)?;
    Ok(Json(PatientRes { patient }))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/diagnoses",
    params(("id" = String, Path, description = "Patient id")),
    request_body = RecordDiagnosisReq,
    responses(
        (status = 200, description = "Diagnosis recorded as the patient's newest", body = RecordDiagnosisRes),
        (status = 400, description = "Invalid diagnosis code"),
        (status = 404, description = "Patient not found"),
        (status = 409, description = "A resolution for this patient is already in flight"),
        (status = 502, description = "Generative lookup failed or returned an unusable answer"),
        (status = 504, description = "Generative lookup timed out")
    )
)]
/// Resolve a diagnosis code and record it for a patient
///
/// Codes found in the reference catalog are recorded immediately. Unknown codes go to the
/// generative lookup, which can take several seconds. Nothing is recorded on failure.
async fn record_diagnosis<S, L>(
    State(state): State<AppState<S, L>>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<RecordDiagnosisReq>,
) -> ApiResult<RecordDiagnosisRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let recorded = state
        .service
        .record_diagnosis(
            &id,
            &req.code,
            req.hint.as_deref(),
            req.description.as_deref(),
        )
        .await
        .map_err(error_response)?;

    Ok(Json(RecordDiagnosisRes {
        source: recorded.source.to_string(),
        patient: recorded.patient,
    }))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/diagnoses/{diagnosis_id}/checklist/{item_id}/toggle",
    params(
        ("id" = String, Path, description = "Patient id"),
        ("diagnosis_id" = String, Path, description = "Diagnosis id"),
        ("item_id" = String, Path, description = "Checklist item id")
    ),
    responses(
        (status = 200, description = "Checklist item toggled", body = PatientRes),
        (status = 404, description = "Patient, diagnosis or item not found")
    )
)]
async fn toggle_checklist_item<S, L>(
    State(state): State<AppState<S, L>>,
    AxumPath((id, diagnosis_id, item_id)): AxumPath<(String, String, String)>,
) -> ApiResult<PatientRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let patient = state
        .service
        .toggle_checklist_item(&id, &diagnosis_id, &item_id)
        .map_err(error_response)?;
    Ok(Json(PatientRes { patient }))
}

#[utoipa::path(
    put,
    path = "/patients/{id}/costs",
    params(("id" = String, Path, description = "Patient id")),
    request_body = UpdateCostsReq,
    responses(
        (status = 200, description = "Costs updated", body = PatientRes),
        (status = 404, description = "Patient not found")
    )
)]
/// Set the billed amount and tariff override; omitted values are cleared
async fn update_costs<S, L>(
    State(state): State<AppState<S, L>>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<UpdateCostsReq>,
) -> ApiResult<PatientRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let patient = state
        .service
        .update_costs(&id, req.billing_amount, req.ina_cbg_amount)
        .map_err(error_response)?;
    Ok(Json(PatientRes { patient }))
}

#[utoipa::path(
    put,
    path = "/patients/{id}/status",
    params(("id" = String, Path, description = "Patient id")),
    request_body = UpdateStatusReq,
    responses(
        (status = 200, description = "Status updated", body = PatientRes),
        (status = 404, description = "Patient not found")
    )
)]
async fn update_status<S, L>(
    State(state): State<AppState<S, L>>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<UpdateStatusReq>,
) -> ApiResult<PatientRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let patient = state
        .service
        .update_status(&id, req.status)
        .map_err(error_response)?;
    Ok(Json(PatientRes { patient }))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/tariff",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Effective INA-CBG tariff", body = TariffRes),
        (status = 404, description = "Patient not found")
    )
)]
/// Effective tariff for a patient
///
/// A positive manual override wins, then the catalog tariff of the newest diagnosis,
/// otherwise zero.
async fn patient_tariff<S, L>(
    State(state): State<AppState<S, L>>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<TariffRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let tariff = state.service.patient_tariff(&id).map_err(error_response)?;
    Ok(Json(TariffRes {
        patient_id: id,
        amount: tariff.amount,
        source: tariff.source.to_string(),
        is_from_catalog: tariff.is_from_catalog(),
    }))
}

#[utoipa::path(
    get,
    path = "/costs/summary",
    responses(
        (status = 200, description = "Population totals and per-patient breakdown", body = CostSummaryRes),
        (status = 500, description = "Internal server error")
    )
)]
async fn cost_summary<S, L>(State(state): State<AppState<S, L>>) -> ApiResult<CostSummaryRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let summary = state.service.cost_summary().map_err(error_response)?;
    let patients = state.service.cost_breakdown().map_err(error_response)?;
    Ok(Json(CostSummaryRes {
        total_billing: summary.total_billing,
        total_tariff: summary.total_tariff,
        variance: summary.variance,
        patients,
    }))
}

#[utoipa::path(
    post,
    path = "/resolve",
    request_body = ResolveReq,
    responses(
        (status = 200, description = "Resolved diagnosis, not recorded", body = ResolveRes),
        (status = 400, description = "Invalid diagnosis code"),
        (status = 502, description = "Generative lookup failed or returned an unusable answer"),
        (status = 504, description = "Generative lookup timed out")
    )
)]
/// Resolve a diagnosis code without recording it
async fn resolve<S, L>(
    State(state): State<AppState<S, L>>,
    Json(req): Json<ResolveReq>,
) -> ApiResult<ResolveRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let resolution = state
        .service
        .resolve(&req.code, req.hint.as_deref())
        .await
        .map_err(error_response)?;

    let source = resolution.source().to_string();
    let details = resolution.into_details();
    Ok(Json(ResolveRes {
        source,
        code: details.code.to_string(),
        description: details.description.into_inner(),
        severity: details.severity.to_string(),
        required_documents: details.required_documents,
    }))
}

#[utoipa::path(
    get,
    path = "/catalog",
    responses(
        (status = 200, description = "Reference catalog", body = CatalogRes),
        (status = 500, description = "Internal server error")
    )
)]
async fn get_catalog<S, L>(State(state): State<AppState<S, L>>) -> ApiResult<CatalogRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let catalog = state.service.catalog().map_err(error_response)?;
    Ok(Json(catalog_response(catalog)))
}

fn catalog_response(catalog: ReferenceCatalog) -> CatalogRes {
    let duplicate_codes = catalog
        .duplicate_codes()
        .into_iter()
        .map(|d| d.code.to_string())
        .collect();
    CatalogRes {
        templates: catalog.into_templates(),
        duplicate_codes,
    }
}

#[utoipa::path(
    post,
    path = "/catalog",
    request_body = AddTemplatesReq,
    responses(
        (status = 200, description = "Templates appended; the updated catalog", body = CatalogRes),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Append reference templates to the catalog
///
/// A code that is already present is appended as well and reported in `duplicateCodes`;
/// resolution keeps using the first entry.
async fn add_templates<S, L>(
    State(state): State<AppState<S, L>>,
    Json(req): Json<AddTemplatesReq>,
) -> ApiResult<CatalogRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let catalog = state
        .service
        .add_templates(req.templates)
        .map_err(error_response)?;
    Ok(Json(catalog_response(catalog)))
}

#[utoipa::path(
    put,
    path = "/catalog/templates/{code}",
    params(("code" = String, Path, description = "Diagnosis code")),
    request_body = ReplaceTemplateReq,
    responses(
        (status = 200, description = "First template for the code replaced", body = CatalogRes),
        (status = 404, description = "No template for the code")
    )
)]
async fn replace_template<S, L>(
    State(state): State<AppState<S, L>>,
    AxumPath(code): AxumPath<String>,
    Json(req): Json<ReplaceTemplateReq>,
) -> ApiResult<CatalogRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let catalog = state
        .service
        .replace_template(&code, req.template)
        .map_err(error_response)?;
    Ok(Json(catalog_response(catalog)))
}

#[utoipa::path(
    delete,
    path = "/catalog/templates/{code}",
    params(("code" = String, Path, description = "Diagnosis code")),
    responses(
        (status = 200, description = "All templates for the code removed", body = CatalogRes),
        (status = 404, description = "No template for the code")
    )
)]
async fn remove_template<S, L>(
    State(state): State<AppState<S, L>>,
    AxumPath(code): AxumPath<String>,
) -> ApiResult<CatalogRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let catalog = state
        .service
        .remove_template(&code)
        .map_err(error_response)?;
    Ok(Json(catalog_response(catalog)))
}

#[utoipa::path(
    post,
    path = "/catalog/import",
    request_body = ImportCatalogReq,
    responses(
        (status = 200, description = "Rows appended to the catalog; malformed rows reported", body = ImportCatalogRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Import reference templates from delimited text
///
/// The separator (`;`, tab, `|` or `,`) is detected from the first line and a header row
/// is skipped. Rows without a code or description are skipped and reported by line.
async fn import_catalog<S, L>(
    State(state): State<AppState<S, L>>,
    Json(req): Json<ImportCatalogReq>,
) -> ApiResult<ImportCatalogRes>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let report = state
        .service
        .import_catalog(&req.text)
        .map_err(error_response)?;

    Ok(Json(ImportCatalogRes {
        imported: report.imported_count(),
        skipped: report
            .skipped
            .into_iter()
            .map(|row| SkippedRowRes {
                line: row.line,
                reason: row.reason,
            })
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/catalog/export",
    responses(
        (status = 200, description = "Catalog as semicolon-separated text", body = String, content_type = "text/csv"),
        (status = 500, description = "Internal server error")
    )
)]
async fn export_catalog<S, L>(
    State(state): State<AppState<S, L>>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RecordStore + Send + Sync + 'static,
    L: GenerativeLookup + Send + Sync + 'static,
{
    let text = state.service.export_catalog().map_err(error_response)?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use klaim_core::{CoreConfig, DiagnosisCode, GeneratedPayload, MemoryStore};
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Clone)]
    struct FixedLookup(Result<GeneratedPayload, ResolutionError>);

    impl GenerativeLookup for FixedLookup {
        async fn generate(
            &self,
            _code: &DiagnosisCode,
            _hint: Option<&str>,
        ) -> Result<GeneratedPayload, ResolutionError> {
            self.0.clone()
        }
    }

    fn dengue() -> FixedLookup {
        FixedLookup(Ok(GeneratedPayload {
            code: Some("A91".into()),
            description: Some("Dengue haemorrhagic fever".into()),
            severity: Some("II".into()),
            required_documents: Some(vec!["SEP".into(), "Hasil Lab Trombosit".into()]),
        }))
    }

    fn app(lookup: FixedLookup) -> Router {
        let cfg = Arc::new(
            CoreConfig::new(
                PathBuf::from("unused"),
                Duration::from_secs(5),
                NonEmptyText::new("RSUD Test").unwrap(),
            )
            .expect("CoreConfig::new should succeed"),
        );
        let service = ClaimService::new(cfg, MemoryStore::new(), lookup);
        service
            .seed_catalog_if_empty()
            .expect("seed_catalog_if_empty should succeed");
        router(AppState::new(service))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("request should succeed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    async fn create_patient(app: &Router) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/patients",
            Some(json!({
                "mrn": "RM-0042",
                "bpjsNumber": "0001234567890",
                "name": "Siti Rahayu",
                "gender": "Female",
                "dob": "1985-02-03"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["patient"]["id"]
            .as_str()
            .expect("patient id should be a string")
            .to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(dengue()), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
    }

    #[tokio::test]
    async fn test_create_list_and_get_patient() {
        let app = app(dengue());
        let id = create_patient(&app).await;

        let (status, body) = send(&app, "GET", "/patients", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["patients"].as_array().map(Vec::len), Some(1));

        let (status, body) = send(&app, "GET", &format!("/patients/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["patient"]["status"], json!("Admitted"));

        let (status, _) = send(&app, "GET", "/patients/nobody", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let (status, _) = send(
            &app(dengue()),
            "POST",
            "/patients",
            Some(json!({"mrn": "RM-1", "name": "  ", "gender": "Male", "dob": "1990-01-01"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_record_catalog_diagnosis_then_tariff_and_toggle() {
        let app = app(FixedLookup(Err(ResolutionError::Lookup("unused".into()))));
        let id = create_patient(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/patients/{id}/diagnoses"),
            Some(json!({"code": " j45.9 "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], json!("local"));
        let diagnosis = &body["patient"]["diagnoses"][0];
        assert_eq!(diagnosis["code"], json!("J45.9"));

        let (status, body) = send(&app, "GET", &format!("/patients/{id}/tariff"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amount"], json!(2_114_700));
        assert_eq!(body["source"], json!("catalog"));
        assert_eq!(body["isFromCatalog"], json!(true));

        let diagnosis_id = diagnosis["id"].as_str().expect("diagnosis id");
        let item_id = diagnosis["checklist"][0]["id"].as_str().expect("item id");
        let (status, body) = send(
            &app,
            "POST",
            &format!("/patients/{id}/diagnoses/{diagnosis_id}/checklist/{item_id}/toggle"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["patient"]["diagnoses"][0]["checklist"][0]["isChecked"],
            json!(true)
        );

        let (status, _) = send(
            &app,
            "POST",
            &format!("/patients/{id}/diagnoses/{diagnosis_id}/checklist/missing/toggle"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_bad_gateway_and_records_nothing() {
        let app = app(FixedLookup(Err(ResolutionError::Lookup("503".into()))));
        let id = create_patient(&app).await;

        let (status, _) = send(
            &app,
            "POST",
            &format!("/patients/{id}/diagnoses"),
            Some(json!({"code": "A91", "hint": "fever"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (_, body) = send(&app, "GET", &format!("/patients/{id}"), None).await;
        assert_eq!(body["patient"]["diagnoses"], json!([]));

        let (status, _) = send(
            &app,
            "POST",
            &format!("/patients/{id}/diagnoses"),
            Some(json!({"code": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_resolve_generated_code() {
        let (status, body) = send(
            &app(dengue()),
            "POST",
            "/resolve",
            Some(json!({"code": "a91"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], json!("generated"));
        assert_eq!(body["code"], json!("A91"));
        assert_eq!(body["severity"], json!("II"));
    }

    #[tokio::test]
    async fn test_costs_summary_reports_variance() {
        let app = app(dengue());
        let id = create_patient(&app).await;

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/patients/{id}/costs"),
            Some(json!({"billingAmount": 800_000, "inaCbgAmount": 500_000})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "GET", "/costs/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalBilling"], json!(800_000));
        assert_eq!(body["totalTariff"], json!(500_000));
        assert_eq!(body["variance"], json!(-300_000));
        assert_eq!(body["patients"][0]["tariffSource"], json!("override"));
    }

    #[tokio::test]
    async fn test_update_status() {
        let app = app(dengue());
        let id = create_patient(&app).await;

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/patients/{id}/status"),
            Some(json!({"status": "Discharged"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["patient"]["status"], json!("Discharged"));
    }

    #[tokio::test]
    async fn test_catalog_add_replace_and_remove() {
        let app = app(FixedLookup(Err(ResolutionError::Lookup("unused".into()))));
        let dengue = json!({
            "code": "a91",
            "description": "Dengue haemorrhagic fever",
            "severity": "II",
            "tariff": 5_000_000,
            "requiredDocuments": ["SEP", "Hasil Lab Trombosit"]
        });

        let (status, body) = send(&app, "POST", "/catalog", Some(json!({"templates": [dengue.clone()]}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["duplicateCodes"], json!([]));
        let templates = body["templates"].as_array().expect("templates");
        assert_eq!(templates.last().map(|t| t["code"].clone()), Some(json!("A91")));

        let (status, body) = send(&app, "POST", "/catalog", Some(json!({"templates": [dengue]}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["duplicateCodes"], json!(["A91"]));

        let (status, body) = send(&app, "POST", "/resolve", Some(json!({"code": "A91"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], json!("local"));

        let (status, _) = send(
            &app,
            "PUT",
            "/catalog/templates/A91",
            Some(json!({"template": {
                "code": "A91",
                "description": "Dengue haemorrhagic fever with shock",
                "severity": "III",
                "requiredDocuments": ["SEP"]
            }})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, "POST", "/resolve", Some(json!({"code": "A91"}))).await;
        assert_eq!(body["severity"], json!("III"));

        let (status, body) = send(&app, "DELETE", "/catalog/templates/a91", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["duplicateCodes"], json!([]));

        let (status, _) = send(&app, "DELETE", "/catalog/templates/A91", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "POST", "/resolve", Some(json!({"code": "A91"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_catalog_import_and_export() {
        let app = app(dengue());

        let (status, body) = send(
            &app,
            "POST",
            "/catalog/import",
            Some(json!({"text": "No;Kode;Deskripsi;Tarif;Dokumen\n1;A91;Dengue haemorrhagic fever;Rp 5.000.000;SEP, Trombosit\n2;;missing code;1;SEP\n"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["imported"], json!(1));
        assert_eq!(body["skipped"][0]["line"], json!(3));

        let (status, body) = send(&app, "GET", "/catalog/export", None).await;
        assert_eq!(status, StatusCode::OK);
        let text = body.as_str().expect("export should be text");
        assert!(text.starts_with("No;Kode;Deskripsi;Tarif;Dokumen;Severity"));
        assert!(text.contains("A91;Dengue haemorrhagic fever;5000000;SEP, Trombosit;I"));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_response(ClaimError::ResolutionPending("p1".into())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_response(ClaimError::Resolution(ResolutionError::Timeout(
                Duration::from_secs(30)
            )))
            .0,
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            error_response(ClaimError::Resolution(ResolutionError::EmptyDocuments)).0,
            StatusCode::BAD_GATEWAY
        );

        let (status, message) = error_response(ClaimError::CatalogExport("writer failed".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal error");
    }
}
