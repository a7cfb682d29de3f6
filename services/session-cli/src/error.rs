//! Command-line usage errors

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("no command given")]
    MissingCommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("unknown option for {command}: {option}")]
    UnknownOption { command: String, option: String },

    #[error("invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offender() {
        assert_eq!(
            Error::UnknownCommand("refresh".into()).to_string(),
            "unknown command: refresh"
        );
        assert_eq!(
            Error::InvalidValue {
                option: "--expires-in".into(),
                value: "soon".into()
            }
            .to_string(),
            "invalid value for --expires-in: soon"
        );
    }
}
