//! Session identity from browser cookies

mod cookie;

pub use cookie::{CookieError, CookieJar, CookieSession};
