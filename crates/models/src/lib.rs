//! Wire types exchanged with the SafeRice content and inference backends.
//!
//! Field names follow the JSON the backends emit, so several structs rename
//! to camelCase or keep the backend's own spelling (`use_id`).

pub mod errors;
pub mod account;
pub mod catalog;
pub mod inference;

pub use account::{
    LoginRequest, LoginResponse, LogoutRequest, LogoutResponse, Profile, SignupRequest,
    SignupResponse, UserId, UsernameResponse,
};
pub use catalog::{DiseaseSolution, Dish, Medicine, Nutrient};
pub use inference::{Diagnosis, GrainRecord, MultiGrainNutrition, OutlineReport, SingleGrainReport};
