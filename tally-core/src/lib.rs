pub mod config;
pub mod error;
pub mod handler;
pub mod request;
pub mod response;

pub use config::TallyConfig;
pub use error::TallyError;
pub use handler::{Handler, Middleware, Pipeline};
pub use request::Request;
pub use response::{BufferedResponse, ResponseSink};
