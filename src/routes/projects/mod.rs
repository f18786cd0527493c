mod handler;
mod model;

pub use handler::list_projects;
pub use model::ProjectQuery;
