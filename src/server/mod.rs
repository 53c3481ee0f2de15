//! Transport-facing types: the incoming request handed to the dispatcher and
//! the response it produces.

pub mod request;
pub mod response;

pub use request::{
    normalize_content_type, parse_cookies, parse_query_params, split_query, IncomingRequest,
};
pub use response::{ApiResponse, ResponseBody, ResponseWriter};
