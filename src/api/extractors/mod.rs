pub mod admin;
pub mod request_input;
