pub mod department;
pub mod message;
pub mod types;

pub use department::{DepartmentPolicy, DEFAULT_DEPARTMENTS};
pub use message::{render_admin_alert, render_welcome, AdminAlert, RenderedMessage};
pub use types::{EmployeeDraft, EmployeeRecord, InvalidField};
