use std::{fmt, sync::Arc};

use reqwest::{
    cookie::{CookieStore, Jar},
    header::{self, HeaderMap, HeaderValue},
    StatusCode, Url,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::sleep;

use crate::{
    auth::{AuthProvider, RefreshGate, SessionStore},
    error::{normalize, ClientError},
    headers::{
        cookie_value, normalize_bearer_authorization, server_correlation_id, stamp_diagnostics,
        X_CSRF_TOKEN,
    },
    log::{LogOutcome, RequestLog, RequestLogger, TracingLogger},
    metadata::RequestMeta,
    request::resolve_url,
    retry::{
        backoff_delay, has_idempotency_key, is_mutating_method, is_retryable_transport,
        should_retry, Failure,
    },
    ApiRequest, ApiResponse, ClientOptions, ResponseMeta,
};

/// Path of the token refresh endpoint used by the default [`SessionStore`].
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Response of one attempt, body already read.
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

#[derive(Clone)]
/// Resilient client for the narrative backend API.
///
/// Every call goes through the same pipeline: credential and diagnostic
/// headers, bounded retry of transient failures, one credential refresh on
/// 401, and normalization of every failure into [`crate::ApiError`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<dyn AuthProvider>,
    logger: Arc<dyn RequestLogger>,
    cookies: Arc<Jar>,
    refresh_gate: Arc<RefreshGate>,
    options: ClientOptions,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("auth", &"<provider>")
            .field("options", &self.options)
            .finish()
    }
}

impl ApiClient {
    /// Creates a client backed by an empty [`SessionStore`] that refreshes
    /// against `<base_url>/auth/refresh`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let store = SessionStore::new(Some(refresh_url(&base_url)));
        Self::with_auth_provider(base_url, Arc::new(store))
    }

    /// Creates a client whose session already holds `token`.
    pub fn new_bearer(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let store = SessionStore::with_access_token(Some(refresh_url(&base_url)), token);
        Self::with_auth_provider(base_url, Arc::new(store))
    }

    /// Creates a client reading and renewing credentials through `auth`.
    pub fn with_auth_provider(base_url: impl Into<String>, auth: Arc<dyn AuthProvider>) -> Self {
        let cookies = Arc::new(Jar::default());
        // `build` fails only when the TLS backend cannot initialize; the
        // fallback then panics the same way `reqwest::Client::new` does.
        let http = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            auth,
            logger: Arc::new(TracingLogger),
            cookies,
            refresh_gate: Arc::new(RefreshGate::default()),
            options: ClientOptions::default(),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `NARRATIVE_API_URL` — base URL of the backend (required)
    /// - `NARRATIVE_API_TOKEN` — access token (optional)
    /// - `NARRATIVE_API_TIMEOUT_MS`, `NARRATIVE_API_MAX_ATTEMPTS` — option overrides
    ///
    /// # Example
    ///
    /// ```no_run
    /// use narrative_http::ApiClient;
    ///
    /// let api = ApiClient::from_env().expect("missing NARRATIVE_API_URL");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let url = std::env::var("NARRATIVE_API_URL")
            .map_err(|_| "missing NARRATIVE_API_URL environment variable".to_owned())?;
        if url.trim().is_empty() {
            return Err("NARRATIVE_API_URL is set but empty".to_owned());
        }
        let options = ClientOptions::default().from_env_overrides()?;
        let client = match std::env::var("NARRATIVE_API_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Self::new_bearer(url, token),
            _ => Self::new(url),
        };
        Ok(client.with_options(options))
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Replaces the default [`TracingLogger`].
    pub fn with_logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Cookie jar shared with the transport; the CSRF token is read from it.
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.cookies
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResponse<T> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.send(ApiRequest::post(path).json(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.send(ApiRequest::put(path).json(body)).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.send(ApiRequest::patch(path).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResponse<T> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Sends `request` through the pipeline and returns the normalized envelope.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResponse<T> {
        match self.execute(&request).await {
            Ok((data, meta)) => ApiResponse::Success { data, meta },
            Err(err) => ApiResponse::Failure {
                error: normalize(&err),
            },
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<(T, ResponseMeta), ClientError> {
        let mutation_retry =
            request.allow_mutation_retry || has_idempotency_key(&request.headers);
        let max_attempts = request.max_attempts.unwrap_or(self.options.max_attempts);
        let mut meta = RequestMeta::first(max_attempts, mutation_retry);

        let url = match request
            .validate()
            .and_then(|()| check_max_attempts(max_attempts))
            .and_then(|()| resolve_url(&self.base_url, &request.path))
        {
            Ok(url) => url,
            Err(err) => {
                self.log(request, &request.path, &meta, None, LogOutcome::Failed);
                return Err(err);
            }
        };

        let mut renewed_token: Option<String> = None;
        loop {
            let token = match renewed_token.take() {
                Some(token) => Some(token),
                None => self.auth.get_token().await,
            };
            let authorization = match authorization_header(token.as_deref()) {
                Ok(value) => value,
                Err(err) => {
                    self.log(request, url.as_str(), &meta, None, LogOutcome::Failed);
                    return Err(err);
                }
            };

            let attempt = self
                .send_attempt(request, &url, &meta, authorization)
                .await;
            let (failure, error) = match attempt {
                Ok(raw) => {
                    meta = meta.adopt_server_correlation_id(server_correlation_id(&raw.headers));
                    let status = raw.status.as_u16();

                    if raw.status.is_success() {
                        return match decode_body(&raw.body) {
                            Ok(data) => {
                                self.log(
                                    request,
                                    url.as_str(),
                                    &meta,
                                    Some(status),
                                    LogOutcome::Success,
                                );
                                let response_meta = ResponseMeta::from_headers(
                                    &raw.headers,
                                    meta.correlation_id(),
                                    meta.attempt(),
                                );
                                Ok((data, response_meta))
                            }
                            Err(err) => {
                                self.log(
                                    request,
                                    url.as_str(),
                                    &meta,
                                    Some(status),
                                    LogOutcome::Failed,
                                );
                                Err(err)
                            }
                        };
                    }

                    if raw.status == StatusCode::UNAUTHORIZED
                        && request.refresh_on_unauthorized
                        && !meta.refreshed()
                    {
                        self.log(request, url.as_str(), &meta, Some(status), LogOutcome::Refresh);
                        match self
                            .refresh_gate
                            .refresh(self.auth.as_ref(), token.as_deref())
                            .await
                        {
                            Ok(fresh) => {
                                meta = meta.mark_refreshed();
                                renewed_token = Some(fresh);
                                continue;
                            }
                            Err(source) => {
                                tracing::warn!(
                                    correlation_id = %meta.correlation_id(),
                                    error = %source,
                                    "credential refresh failed, ending session"
                                );
                                self.auth.logout().await;
                                self.log(
                                    request,
                                    url.as_str(),
                                    &meta,
                                    Some(status),
                                    LogOutcome::Failed,
                                );
                                return Err(ClientError::Auth {
                                    source,
                                    redirect: self.options.login_path.clone(),
                                });
                            }
                        }
                    }

                    (
                        Failure::Status(raw.status),
                        ClientError::Http {
                            status,
                            body: raw.body,
                        },
                    )
                }
                Err(err) => {
                    let failure = if is_retryable_transport(&err) {
                        Failure::Transport
                    } else {
                        Failure::Fatal
                    };
                    (failure, ClientError::Transport(err))
                }
            };

            let status = error.status();
            if should_retry(
                failure,
                &request.method,
                meta.allow_mutation_retry(),
                meta.has_attempts_left(),
            ) {
                self.log(request, url.as_str(), &meta, status, LogOutcome::Retry);
                sleep(backoff_delay(&self.options, meta.attempt())).await;
                meta = meta.next_attempt();
                continue;
            }

            self.log(request, url.as_str(), &meta, status, LogOutcome::Failed);
            return Err(error);
        }
    }

    async fn send_attempt(
        &self,
        request: &ApiRequest,
        url: &Url,
        meta: &RequestMeta,
        authorization: Option<HeaderValue>,
    ) -> Result<RawResponse, reqwest::Error> {
        let mut headers = request.headers.clone();
        if let Some(value) = authorization {
            headers.insert(header::AUTHORIZATION, value);
        }
        if is_mutating_method(&request.method) {
            if let Some(csrf) = self.csrf_token(url) {
                headers.insert(X_CSRF_TOKEN, csrf);
            }
        }
        stamp_diagnostics(&mut headers, meta, &self.options.client_id);

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(headers)
            .timeout(self.options.timeout());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    fn csrf_token(&self, url: &Url) -> Option<HeaderValue> {
        let cookies = self.cookies.cookies(url)?;
        let cookies = cookies.to_str().ok()?;
        let token = cookie_value(cookies, &self.options.csrf_cookie_name)?;
        HeaderValue::from_str(token).ok()
    }

    fn log(
        &self,
        request: &ApiRequest,
        url: &str,
        meta: &RequestMeta,
        status: Option<u16>,
        outcome: LogOutcome,
    ) {
        self.logger.log(&RequestLog {
            method: request.method.to_string(),
            url: url.to_owned(),
            status,
            attempt: meta.attempt(),
            duration_ms: u64::try_from(meta.elapsed().as_millis()).unwrap_or(u64::MAX),
            correlation_id: meta.correlation_id().to_owned(),
            outcome,
        });
    }
}

fn refresh_url(base_url: &str) -> String {
    format!("{}{DEFAULT_REFRESH_PATH}", base_url.trim_end_matches('/'))
}

fn check_max_attempts(max_attempts: u32) -> Result<(), ClientError> {
    if max_attempts == 0 {
        return Err(ClientError::InvalidRequest(
            "max_attempts must be at least 1".to_owned(),
        ));
    }
    Ok(())
}

/// Builds the `Authorization` value for `token`, rejecting bytes a header cannot carry.
fn authorization_header(token: Option<&str>) -> Result<Option<HeaderValue>, ClientError> {
    let Some(token) = token else {
        return Ok(None);
    };
    let mut value = HeaderValue::from_str(&normalize_bearer_authorization(token)).map_err(|_| {
        ClientError::InvalidRequest("access token is not a valid header value".to_owned())
    })?;
    value.set_sensitive(true);
    Ok(Some(value))
}

/// Decodes a success body; an empty body decodes as JSON `null`.
fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    let text = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(text)
        .map_err(|err| ClientError::Decode(format!("invalid response JSON: {err}; body: {body}")))
}
