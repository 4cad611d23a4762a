pub mod timezone;

pub use timezone::{deposito_now, deposito_now_rfc3339, deposito_today};
