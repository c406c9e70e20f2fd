mod helpers;
mod secret;

pub use helpers::{
    env_flag,
    env_in_range,
    env_or_default,
    env_parsed,
    in_range_or_default,
    parse_boolean_flag,
    required_env,
    ConfigError,
};
pub use secret::Secret;
