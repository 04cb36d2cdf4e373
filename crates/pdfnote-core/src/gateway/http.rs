//! REST gateway over `reqwest`.

use super::{BoxFuture, GatewayError, GatewayResult, PersistenceGateway};
use crate::config::ApiEndpoints;
use crate::record::{AnnotationId, AnnotationRecord, decode_records};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use url::Url;

/// JSON client for the four annotation endpoints.
///
/// `update` and `delete` are prefixes: the record id, percent-encoded as one
/// path segment, and a trailing slash are appended, so
/// `https://host/api/annotations/` becomes `https://host/api/annotations/{id}/`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    load: Url,
    create: Url,
    update: Url,
    delete: Url,
}

impl HttpGateway {
    /// Build a gateway from absolute endpoint URLs.
    pub fn new(endpoints: &ApiEndpoints) -> GatewayResult<Self> {
        Self::build(None, endpoints)
    }

    /// Build a gateway whose endpoints may be relative to `base`.
    pub fn with_base(base: &str, endpoints: &ApiEndpoints) -> GatewayResult<Self> {
        let base = Url::parse(base).map_err(|e| invalid_endpoint(base, e))?;
        Self::build(Some(&base), endpoints)
    }

    fn build(base: Option<&Url>, endpoints: &ApiEndpoints) -> GatewayResult<Self> {
        let resolve = |endpoint: &str| -> GatewayResult<Url> {
            match base {
                Some(base) => base.join(endpoint),
                None => Url::parse(endpoint),
            }
            .map_err(|e| invalid_endpoint(endpoint, e))
        };
        Ok(Self {
            client: Client::new(),
            load: resolve(&endpoints.load)?,
            create: resolve(&endpoints.create)?,
            update: resolve(&endpoints.update)?,
            delete: resolve(&endpoints.delete)?,
        })
    }

    fn item_url(prefix: &Url, id: &AnnotationId) -> GatewayResult<Url> {
        let id = id
            .as_persisted()
            .ok_or_else(|| GatewayError::Other(format!("{} has no backend id", id)))?;
        let mut url = prefix.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Other(format!("Endpoint {} cannot take an id", prefix)))?
            .pop_if_empty()
            .push(id)
            .push("");
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&AnnotationRecord>,
    ) -> GatewayResult<Response> {
        log::debug!("{} {}", method, url);
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| {
            log::error!("API error ({} {}): {}", method, url, e);
            GatewayError::Network(e.to_string())
        })?;
        let status = response.status();
        if !status.is_success() {
            log::error!("API error ({} {}): status {}", method, url, status);
            return Err(GatewayError::Status(status.as_u16()));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
        response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

fn invalid_endpoint(endpoint: &str, e: url::ParseError) -> GatewayError {
    GatewayError::Other(format!("Invalid endpoint {:?}: {}", endpoint, e))
}

impl PersistenceGateway for HttpGateway {
    fn load(&self) -> BoxFuture<'_, GatewayResult<Vec<AnnotationRecord>>> {
        Box::pin(async move {
            let response = self.send(Method::GET, self.load.clone(), None).await?;
            let values: Vec<serde_json::Value> = Self::json(response).await?;
            Ok(decode_records(values))
        })
    }

    fn create(&self, record: &AnnotationRecord) -> BoxFuture<'_, GatewayResult<AnnotationRecord>> {
        let record = record.clone();
        Box::pin(async move {
            let response = self
                .send(Method::POST, self.create.clone(), Some(&record))
                .await?;
            Self::json(response).await
        })
    }

    fn update(&self, record: &AnnotationRecord) -> BoxFuture<'_, GatewayResult<AnnotationRecord>> {
        let record = record.clone();
        Box::pin(async move {
            let url = Self::item_url(&self.update, &record.id)?;
            let response = self.send(Method::PUT, url, Some(&record)).await?;
            Self::json(response).await
        })
    }

    fn delete(&self, id: &AnnotationId) -> BoxFuture<'_, GatewayResult<()>> {
        let id = id.clone();
        Box::pin(async move {
            let url = Self::item_url(&self.delete, &id)?;
            self.send(Method::DELETE, url, None).await?;
            Ok(())
        })
    }
}
