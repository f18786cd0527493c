pub mod dashboard;
pub mod instance;
pub mod projects;
pub mod system;
