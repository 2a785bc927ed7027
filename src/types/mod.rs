//! Wire types for the crop advisor service

pub mod request;
pub mod response;

pub use request::PredictionRequest;
pub use response::{PredictionFailure, PredictionReply, PredictionResponse};
