pub mod app_error;
pub mod session_error;

pub use app_error::{AppError, AppResult};
pub use session_error::{ErrorCode, SessionError};
