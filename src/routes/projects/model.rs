use serde::{Deserialize, Serialize};

use crate::upstream::QueryParams;

pub const PROJECTS_ENDPOINT: &str = "projects";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProjectQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ProjectQuery {
    /// 只转发有值的参数
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if let Some(status) = &self.status {
            params.push(("status".to_string(), status.clone()));
        }
        if let Some(page) = self.page {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            params.push(("page_size".to_string(), page_size.to_string()));
        }
        params
    }
}
