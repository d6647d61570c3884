pub mod connection;
pub mod http1;
pub mod routes;
pub mod worker;
