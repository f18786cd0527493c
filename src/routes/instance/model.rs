use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SwitchInstanceRequest {
    pub instance_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SwitchInstanceResponse {
    pub instance_id: String,
    pub previous_instance_id: String,
}
