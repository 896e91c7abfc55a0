pub mod app_config;
pub mod config;
pub mod identifier;
pub mod types;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, S3Settings};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use identifier::{validate_identifier, IdentifierError};
pub use types::{
    NewPage, NewPost, NewSocialUser, Post, Profile, RelationKind, ScrapedPost, ScrapedProfile,
    ScrapedSocialUser, SocialUser,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
