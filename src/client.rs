use crate::config::{ApiConfig, RetryPolicy};
use crate::error::{AppError, Result};
use crate::schedule::{Activity, ActivitySink, ScheduledActivity};
use crate::weather::{GeoEntity, ParcelSource, WeatherSnapshot, WeatherSource};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("agrotrack/", env!("CARGO_PKG_VERSION"));

/// Client for the agrotrack REST API
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy,
}

/// Responses arrive either bare or wrapped in `{"data": ...}`
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

impl ApiClient {
    pub fn new(config: &ApiConfig, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);

        retry_with_backoff(&self.retry, || async {
            let request = self.authorized(self.client.get(&url).query(query));
            let response = check_status(request.send().await?).await?;
            let body = response.json::<Envelope<T>>().await?;
            Ok(body.into_inner())
        })
        .await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);

        retry_with_backoff(&self.retry, || async {
            let request = self.authorized(self.client.post(&url).json(body));
            let response = check_status(request.send().await?).await?;
            let body = response.json::<Envelope<T>>().await?;
            Ok(body.into_inner())
        })
        .await
    }
}

impl ActivitySink for ApiClient {
    async fn create_activity(&self, activity: &ScheduledActivity) -> Result<Activity> {
        self.post_json("actividades", activity).await
    }
}

impl WeatherSource for ApiClient {
    async fn current_weather(&self, latitude: f64, longitude: f64) -> Result<WeatherSnapshot> {
        self.get_json(
            "clima/actual",
            &[("lat", latitude.to_string()), ("lon", longitude.to_string())],
        )
        .await
    }
}

impl ParcelSource for ApiClient {
    async fn list_parcels(&self) -> Result<Vec<GeoEntity>> {
        self.get_json("parcelas", &[]).await
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .ok()
        .filter(|body| !body.trim().is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());

    Err(AppError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Retry a future with exponential backoff
async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                retries += 1;

                if retries > policy.max_retries || !e.is_transient() {
                    return Err(e);
                }

                let delay = policy.delay_for_retry(retries);
                warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                    retries, policy.max_retries, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
