pub mod bar;
pub mod raw;
pub mod request_params;
