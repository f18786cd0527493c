mod handler;
mod model;

pub use handler::switch_instance;
pub use model::{SwitchInstanceRequest, SwitchInstanceResponse};
