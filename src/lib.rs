pub mod api;
pub mod channel;
pub mod config;
pub mod model;
pub mod res;
pub mod session;
pub mod views;

use std::fmt;

use serde_json::Value;

pub use config::Config;
pub use session::{Session, UiEvent, UiHandle};

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_u64_field(&self, field: &str) -> AppResult<u64>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or(format!("expected {field} in {self}"))?
            .as_str()
            .ok_or(format!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }

    fn get_u64_field(&self, field: &str) -> AppResult<u64> {
        Ok(
            self.get(field)
            .ok_or(format!("expected {field} in {self}"))?
            .as_u64()
            .ok_or(format!("expected {field} in {self} to be an unsigned integer"))?
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
pub struct AppError(pub anyhow::Error);

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(reqwest::Error);
apperr_impl!(url::ParseError);
apperr_impl!(std::num::ParseIntError);
