pub mod log;
pub mod response;
pub mod text;
