use std::time::Duration;

use async_trait::async_trait;
use qwatch_core::gateway::{DataGateway, GatewayError, RecordResource, Resource};
use qwatch_core::records::{DatasourceResultMap, SettingsDocument};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

const SERVERS_PARAM: &str = "servers";

#[derive(Debug, Error)]
pub enum HttpGatewayError {
    #[error("invalid base url `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HttpGatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, HttpGatewayError> {
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, resource: Resource) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(resource.path());
        }
        url
    }

    fn request(&self, method: Method, resource: Resource, servers: &str) -> (Url, RequestBuilder) {
        let url = self.endpoint(resource);
        let builder = self
            .client
            .request(method, url.clone())
            .query(&[(SERVERS_PARAM, servers)]);
        (url, builder)
    }

    async fn send(&self, url: &Url, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let response = builder.send().await.map_err(|error| GatewayError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        })?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "gateway response");
        if !status.is_success() {
            return Err(GatewayError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn send_json<T>(&self, url: &Url, builder: RequestBuilder) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        self.send(url, builder)
            .await?
            .json::<T>()
            .await
            .map_err(|error| GatewayError::Decode {
                url: url.to_string(),
                message: error.to_string(),
            })
    }
}

#[async_trait]
impl DataGateway for HttpGateway {
    async fn fetch_records(
        &self,
        resource: RecordResource,
        servers: &str,
    ) -> Result<DatasourceResultMap, GatewayError> {
        let (url, builder) = self.request(Method::GET, resource.resource(), servers);
        self.send_json(&url, builder).await
    }

    async fn fetch_settings(&self, servers: &str) -> Result<SettingsDocument, GatewayError> {
        let (url, builder) = self.request(Method::GET, Resource::Setting, servers);
        self.send_json(&url, builder).await
    }

    async fn save_settings(
        &self,
        servers: &str,
        document: &SettingsDocument,
    ) -> Result<SettingsDocument, GatewayError> {
        let (url, builder) = self.request(Method::PUT, Resource::Setting, servers);
        self.send_json(&url, builder.json(document)).await
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, HttpGatewayError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|source| HttpGatewayError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })
}
