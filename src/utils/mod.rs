// Utility modules for the Aspirant backend

pub mod audit_logger;
pub mod service_error;

pub use audit_logger::{AuditAction, AuditLog, AuditLogger};
pub use service_error::ServiceError;
