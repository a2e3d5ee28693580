/// Errors raised by the shell itself, before any client is built.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0} is not set: pass the flag or export the environment variable")]
    MissingSetting(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidSetting { name: &'static str, value: String },
}
