use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{
    cookie::{CookieStore, Jar},
    Client, RequestBuilder,
};
use serde::Deserialize;
use shared::{
    domain::PatientId,
    error::{ApiErrorBody, ApiException},
    protocol::{
        MasterItem, NoteCreateRequest, NoteCreateResponse, PatientCreateRequest,
        PatientDetailResponse, PatientSummary,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::Settings, csrf, ClinicalNotesApi, MasterDataApi, MasterItemQuery,
    PatientRegistryApi, SubmitError,
};

#[derive(Debug, Deserialize)]
struct PatientListResponse {
    #[serde(default)]
    results: Vec<PatientSummary>,
}

/// REST client for the EMR API. Session cookies live in a shared jar; write
/// requests carry the CSRF token found there.
pub struct HttpEmrClient {
    http: Client,
    base_url: Url,
    cookies: Arc<Jar>,
    csrf_cookie_name: String,
    csrf_header_name: String,
    csrf_seed: Option<String>,
}

impl HttpEmrClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut raw_base = settings.api_base_url.trim().to_string();
        if !raw_base.ends_with('/') {
            raw_base.push('/');
        }
        let base_url = Url::parse(&raw_base)
            .with_context(|| format!("invalid api_base_url '{}'", settings.api_base_url))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!("api_base_url must start with http:// or https://"));
        }

        let cookies = Arc::new(Jar::default());
        if let Some(session_cookie) = &settings.session_cookie {
            cookies.add_cookie_str(session_cookie, &base_url);
        }

        let http = Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            http,
            base_url,
            cookies,
            csrf_cookie_name: settings.csrf_cookie_name.clone(),
            csrf_header_name: settings.csrf_header_name.clone(),
            csrf_seed: settings.csrf_token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("failed to build url for '{path}'"))
    }

    /// Token from the cookie jar, else the configured seed.
    pub fn csrf_token(&self) -> Option<String> {
        self.cookies
            .cookies(&self.base_url)
            .and_then(|header| {
                header
                    .to_str()
                    .ok()
                    .and_then(|raw| csrf::token_from_cookie_header(raw, &self.csrf_cookie_name))
            })
            .or_else(|| self.csrf_seed.clone())
    }

    fn with_csrf(&self, request: RequestBuilder) -> RequestBuilder {
        match self.csrf_token() {
            Some(token) => request.header(self.csrf_header_name.as_str(), token),
            None => {
                debug!("transport: no csrf token available for write request");
                request
            }
        }
    }
}

/// Pulls `results` out of a master-items body. Anything other than an array
/// counts as empty; rows that do not parse are skipped.
pub fn parse_master_items(body: &serde_json::Value) -> Vec<MasterItem> {
    let Some(rows) = body.get("results").and_then(serde_json::Value::as_array) else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| match serde_json::from_value::<MasterItem>(row.clone()) {
            Ok(item) => Some(item),
            Err(err) => {
                debug!("transport: skipping malformed master item: {err}");
                None
            }
        })
        .collect()
}

#[async_trait]
impl MasterDataApi for HttpEmrClient {
    async fn master_items(&self, query: MasterItemQuery) -> Result<Vec<MasterItem>> {
        let mut params = vec![
            ("category", query.category.code().to_string()),
            ("page_size", query.page_size.to_string()),
        ];
        if let Some(search) = query.search {
            params.push(("search", search));
        }

        let body: serde_json::Value = self
            .http
            .get(self.endpoint("api/master/items/")?)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(parse_master_items(&body))
    }
}

#[async_trait]
impl ClinicalNotesApi for HttpEmrClient {
    async fn create_note(
        &self,
        patient_id: PatientId,
        request: &NoteCreateRequest,
    ) -> std::result::Result<NoteCreateResponse, SubmitError> {
        let url = self
            .endpoint(&format!("api/patients/{}/notes/", patient_id.0))
            .map_err(|err| SubmitError::Transport(err.to_string()))?;

        let response = self
            .with_csrf(self.http.post(url).json(request))
            .send()
            .await
            .map_err(|err| SubmitError::Transport(err.to_string()))?;

        let status = response.status();
        let body: NoteCreateResponse = response.json().await.unwrap_or_default();

        if !status.is_success() {
            warn!(
                patient_id = patient_id.0,
                status = status.as_u16(),
                "transport: note creation rejected"
            );
            return Err(SubmitError::Status {
                status: status.as_u16(),
                reason: body.error,
            });
        }
        if body.ok == Some(false) {
            return Err(SubmitError::Rejected { reason: body.error });
        }
        Ok(body)
    }
}

#[async_trait]
impl PatientRegistryApi for HttpEmrClient {
    async fn list_patients(&self) -> Result<Vec<PatientSummary>> {
        let body: PatientListResponse = self
            .http
            .get(self.endpoint("api/patients/")?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.results)
    }

    async fn create_patient(&self, request: &PatientCreateRequest) -> Result<PatientSummary> {
        let response = self
            .with_csrf(self.http.post(self.endpoint("api/patients/")?).json(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: ApiErrorBody = response.json().await.unwrap_or_default();
            return Err(ApiException::new(status.as_u16(), body.error).into());
        }
        Ok(response.json().await?)
    }

    async fn patient_detail(&self, patient_id: PatientId) -> Result<PatientDetailResponse> {
        let response = self
            .http
            .get(self.endpoint(&format!("api/patients/{}/", patient_id.0))?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: ApiErrorBody = response.json().await.unwrap_or_default();
            return Err(ApiException::new(status.as_u16(), body.error).into());
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
