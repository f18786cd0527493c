/// 上游 CRM 数据源
mod client;

pub use client::CrmClient;

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::cache::models::Snapshot;

/// 上游调用错误
///
/// 只保存错误描述，便于在多个等待方之间克隆同一个结果。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(String),
    #[error("upstream returned {status} for {resource}")]
    Status { status: u16, resource: String },
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

/// 查询参数，按顺序拼到请求上
pub type QueryParams = Vec<(String, String)>;

pub trait CrmSource: Send + Sync {
    fn fetch_collection<'a>(
        &'a self,
        instance: &'a str,
        resource: &'a str,
        params: &'a QueryParams,
    ) -> BoxFuture<'a, Result<Vec<Value>, UpstreamError>>;

    /// 一次性拉取客户、项目、服务请求和发票
    fn fetch_snapshot<'a>(&'a self, instance: &'a str) -> BoxFuture<'a, Result<Snapshot, UpstreamError>>;
}
