//! Cooperative REST API client
//!
//! The cooperative API owns all persistent process state. This client reads
//! processes, stores phase records and advances processes; it never retries.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use shared::{DensityPass, PackagingRecord, Phase, PhaseRecord, Process, ProcessStatus, TechnicalNotes};

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};

/// Cooperative API client
#[derive(Clone)]
pub struct ProcessApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

/// Body of the process PATCH that advances a run
#[derive(Debug, Clone, Serialize)]
pub struct ProcessPatch {
    pub fase_actual: Phase,
    pub progreso: u8,
    pub notas_tecnicas: TechnicalNotes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estado: Option<ProcessStatus>,
}

impl ProcessApiClient {
    /// Create a client from configuration
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Create a client with custom base URL (for testing)
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Same client acting with the caller's bearer token, when one is given
    pub fn with_token(&self, token: Option<String>) -> Self {
        match token {
            Some(token) => Self {
                token: Some(token),
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    /// Fetch a process with its notes and lots
    pub async fn fetch_process(&self, process_id: i64) -> AppResult<Process> {
        tracing::debug!(process_id, "Fetching process");

        let response = self
            .request(Method::GET, &format!("procesos/{}/", process_id))
            .send()
            .await?;
        let response = check_status(response, "Process").await?;

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse process response: {}", e)))
    }

    /// Persist one phase record at its phase-specific endpoint
    pub async fn save_phase_record(
        &self,
        process_id: i64,
        record: &PhaseRecord,
    ) -> AppResult<serde_json::Value> {
        let endpoint = record_endpoint(record);
        tracing::debug!(process_id, endpoint, "Saving phase record");

        let response = self
            .request(Method::POST, &format!("procesos/{}/{}", process_id, endpoint))
            .json(record)
            .send()
            .await?;
        let response = check_status(response, "Process").await?;

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse saved record: {}", e)))
    }

    /// Advance a process and store its notes log
    pub async fn patch_process(&self, process_id: i64, patch: &ProcessPatch) -> AppResult<Process> {
        tracing::debug!(
            process_id,
            fase_actual = %patch.fase_actual,
            progreso = patch.progreso,
            "Patching process"
        );

        let response = self
            .request(Method::PATCH, &format!("procesos/{}/", process_id))
            .json(patch)
            .send()
            .await?;
        let response = check_status(response, "Process").await?;

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse process response: {}", e)))
    }

    /// Saved packaging figures, `None` when nothing was saved yet
    pub async fn fetch_packaging(&self, process_id: i64) -> AppResult<Option<PackagingRecord>> {
        let response = self
            .request(Method::GET, &format!("procesos/{}/empaque/", process_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response, "Packaging record").await?;

        let record = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse packaging record: {}", e)))?;
        Ok(Some(record))
    }

    /// Save the packaging figures and close the process at 100%
    pub async fn finalize_packaging(
        &self,
        process_id: i64,
        record: &PackagingRecord,
        notes: TechnicalNotes,
    ) -> AppResult<Process> {
        tracing::debug!(process_id, "Saving packaging figures");

        let response = self
            .request(Method::POST, &format!("procesos/{}/empaque/", process_id))
            .json(record)
            .send()
            .await?;
        check_status(response, "Process").await?;

        self.close_process(process_id, notes).await
    }

    /// Mark a process FINALIZADO / COMPLETADO at 100%
    pub async fn close_process(
        &self,
        process_id: i64,
        notes: TechnicalNotes,
    ) -> AppResult<Process> {
        self.patch_process(
            process_id,
            &ProcessPatch {
                fase_actual: Phase::Finalizado,
                progreso: 100,
                notas_tecnicas: notes,
                estado: Some(ProcessStatus::Completado),
            },
        )
        .await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Phase-specific endpoint for storing a record
pub fn record_endpoint(record: &PhaseRecord) -> &'static str {
    match record {
        PhaseRecord::Pilado(_) => "pilado/",
        PhaseRecord::Clasificacion(_) => "clasificacion/",
        PhaseRecord::Densidad(d) => match d.paso {
            DensityPass::First => "densidad/1/",
            DensityPass::Second => "densidad/2/",
        },
        PhaseRecord::Color(_) => "color/",
        PhaseRecord::Empaque(_) => "empaque/",
    }
}

async fn check_status(response: Response, resource: &str) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(resource.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "Cooperative API error: {}", body);
    Err(AppError::RemoteApi {
        status: status.as_u16(),
        body,
    })
}
