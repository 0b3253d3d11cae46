use serde::Serialize;

use crate::types::EmployeeRecord;

/// A rendered message ready to hand to the mail transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMessage {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Plain-text alert for the administrator channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminAlert {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Renders the welcome message sent after a successful create.
pub fn render_welcome(record: &EmployeeRecord) -> RenderedMessage {
    let subject = format!("Welcome to the Company, {}", record.full_name());
    let html_body = format!(
        "<html><body>\
         <h1>Welcome, {name}!</h1>\
         <p>Your account has been set up with the following details:</p>\
         <ul>\
         <li>Email: {email}</li>\
         <li>Department: {department}</li>\
         <li>Salary: {salary:.2}</li>\
         </ul>\
         <p>We are glad to have you on board.</p>\
         </body></html>",
        name = record.full_name(),
        email = record.email,
        department = record.department,
        salary = record.salary,
    );
    let text_body = format!(
        "Welcome, {name}!\n\n\
         Your account has been set up with the following details:\n\
         Email: {email}\n\
         Department: {department}\n\
         Salary: {salary:.2}\n",
        name = record.full_name(),
        email = record.email,
        department = record.department,
        salary = record.salary,
    );

    RenderedMessage {
        recipient: record.email.clone(),
        subject,
        html_body,
        text_body,
    }
}

/// Renders the administrator alert used when welcome delivery is exhausted.
pub fn render_admin_alert(admin_email: &str, record: &EmployeeRecord, error: &str) -> AdminAlert {
    let body = format!(
        "Failed to send email to employee:\n\
         Name: {name}\n\
         Email: {email}\n\
         Department: {department}\n\
         Salary: {salary:.2}\n\
         \n\
         Error: {error}\n",
        name = record.full_name(),
        email = record.email,
        department = record.department,
        salary = record.salary,
    );

    AdminAlert {
        recipient: admin_email.to_string(),
        subject: "Email Sending Failure Notification".to_string(),
        body,
    }
}
