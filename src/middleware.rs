pub mod extract;
pub mod server_header;
