//! Path containment and environment-variable name validation shared by the
//! codec, environment manager, and dispatcher.

pub mod validator;

pub use validator::{validate_env_var_name, validate_relative_path};
