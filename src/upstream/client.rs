use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

use super::{CrmSource, QueryParams, UpstreamError};
use crate::cache::models::Snapshot;
use crate::config::Config;

pub const CUSTOMERS: &str = "customers";
pub const PROJECTS: &str = "projects";
pub const SERVICE_REQUESTS: &str = "requests";
pub const INVOICES: &str = "invoices";

/// 基于 reqwest 的 CRM 客户端，不设置额外超时，也不重试
#[derive(Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CrmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.upstream_base_url, &config.upstream_api_key)
    }

    async fn get_collection(
        &self,
        instance: &str,
        resource: &str,
        params: &QueryParams,
    ) -> Result<Vec<Value>, UpstreamError> {
        let url = format!("{}/{}", self.base_url, resource);
        tracing::debug!("GET {} (instance {})", url, instance);

        let response = self
            .http
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("x-instance-id", instance)
            .query(params)
            .send()
            .await
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                resource: resource.to_string(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        extract_items(body, resource)
    }
}

/// 上游既可能直接返回数组，也可能包在 `data` 字段里
fn extract_items(body: Value, resource: &str) -> Result<Vec<Value>, UpstreamError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(UpstreamError::Decode(format!(
                "{} response has no data array",
                resource
            ))),
        },
        _ => Err(UpstreamError::Decode(format!(
            "{} response is not a list",
            resource
        ))),
    }
}

impl CrmSource for CrmClient {
    fn fetch_collection<'a>(
        &'a self,
        instance: &'a str,
        resource: &'a str,
        params: &'a QueryParams,
    ) -> BoxFuture<'a, Result<Vec<Value>, UpstreamError>> {
        self.get_collection(instance, resource, params).boxed()
    }

    fn fetch_snapshot<'a>(&'a self, instance: &'a str) -> BoxFuture<'a, Result<Snapshot, UpstreamError>> {
        async move {
            let no_params = QueryParams::new();
            let (customers, projects, service_requests, invoices) = tokio::try_join!(
                self.get_collection(instance, CUSTOMERS, &no_params),
                self.get_collection(instance, PROJECTS, &no_params),
                self.get_collection(instance, SERVICE_REQUESTS, &no_params),
                self.get_collection(instance, INVOICES, &no_params),
            )?;

            Ok(Snapshot {
                customers,
                projects,
                service_requests,
                invoices,
            })
        }
        .boxed()
    }
}
