pub mod error;
pub mod formatting;
#[cfg(test)]
pub mod http_stub;
pub mod logging;
