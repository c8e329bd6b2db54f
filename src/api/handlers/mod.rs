pub mod health;
pub use self::health::health;

pub mod oauth;
pub mod tokens;
