use std::time::Duration;

use api_types::{
    ErrorBody, LocationsResponse, PlayerPosition, UpdateLocationRequest, UpdateLocationResponse,
};
use reqwest::{Response, Url};

use crate::relay::{NetworkError, RelayClient, RelayFuture};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// [`RelayClient`] over HTTP/JSON.
#[derive(Clone, Debug)]
pub struct HttpRelayClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRelayClient {
    pub fn new(base_url: &str) -> Result<Self, NetworkError> {
        // Url::join drops the last path segment unless it ends in a slash
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url =
            Url::parse(&normalized).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, NetworkError> {
        self.base_url
            .join(path)
            .map_err(|e| NetworkError::InvalidUrl(e.to_string()))
    }

    pub fn locations_url(&self, game_code: &str) -> Result<Url, NetworkError> {
        let mut url = self.endpoint("locations")?;
        url.query_pairs_mut().append_pair("gameCode", game_code);
        Ok(url)
    }
}

/// Turn a non-2xx response into [`NetworkError::Status`], keeping the
/// relay's `{error}` message when it sent one.
async fn check_status(response: Response) -> Result<Response, NetworkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(NetworkError::Status {
        status: status.as_u16(),
        message,
    })
}

impl RelayClient for HttpRelayClient {
    fn update_location<'a>(
        &'a self,
        position: &'a PlayerPosition,
    ) -> RelayFuture<'a, UpdateLocationResponse> {
        Box::pin(async move {
            let url = self.endpoint("updateLocation")?;
            let body = UpdateLocationRequest::from(position);

            let response = self.client.post(url).json(&body).send().await?;
            let response = check_status(response).await?;

            Ok(response.json::<UpdateLocationResponse>().await?)
        })
    }

    fn locations<'a>(&'a self, game_code: &'a str) -> RelayFuture<'a, Vec<PlayerPosition>> {
        Box::pin(async move {
            let url = self.locations_url(game_code)?;

            let response = self.client.get(url).send().await?;
            let response = check_status(response).await?;

            Ok(response.json::<LocationsResponse>().await?.locations)
        })
    }
}
