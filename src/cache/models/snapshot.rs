use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 一次聚合拉取得到的四类上游数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub customers: Vec<Value>,
    pub projects: Vec<Value>,
    pub service_requests: Vec<Value>,
    pub invoices: Vec<Value>,
}

/// 写入缓存的聚合数据，带上真正拉取的时间
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSnapshot {
    pub snapshot: Snapshot,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedSnapshot {
    pub fn now(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            fetched_at: Utc::now(),
        }
    }
}

/// 数据来源标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Cache,
    Error,
}

/// 聚合接口的返回体，出错时各集合为空、source 为 error
///
/// `fetched_at` 是数据从上游拉回的时间，命中缓存时保持不变；失败时为本次尝试的时间。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResponse {
    pub customers: Vec<Value>,
    pub projects: Vec<Value>,
    pub service_requests: Vec<Value>,
    pub invoices: Vec<Value>,
    pub source: DataSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl AggregateResponse {
    pub fn from_snapshot(fetched: &FetchedSnapshot, source: DataSource) -> Self {
        let snapshot = &fetched.snapshot;
        Self {
            customers: snapshot.customers.clone(),
            projects: snapshot.projects.clone(),
            service_requests: snapshot.service_requests.clone(),
            invoices: snapshot.invoices.clone(),
            source,
            error: None,
            fetched_at: fetched.fetched_at,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            customers: Vec::new(),
            projects: Vec::new(),
            service_requests: Vec::new(),
            invoices: Vec::new(),
            source: DataSource::Error,
            error: Some(error.into()),
            fetched_at: Utc::now(),
        }
    }
}

/// 单一集合接口的返回体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResponse {
    pub items: Vec<Value>,
    pub source: DataSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
