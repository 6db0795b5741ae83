//! HTTP API for the allocation service.
//!
//! ## Endpoints
//!
//! - `POST /api/upload` - Replace the loaded dataset with an uploaded workbook
//! - `GET /api/allocations` - Run an allocation pass and return all three outputs
//! - `GET /api/allocations/csv` - Program summary as a CSV attachment
//! - `GET /api/health` - Health check

mod routes;

pub use routes::{router, serve, AppState};
