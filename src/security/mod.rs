pub mod credentials;

pub use credentials::{API_KEY_ENV, api_key_from_env, filter_uri, filter_uri_str, mask_token};
