//! Argument parsing
//!
//! Usage: `session-cli [--config PATH] [--metrics] <command> [options]`

use std::time::Duration;

use session_auth::TokenInput;

use crate::error::{Error, Result};

pub const USAGE: &str = "\
usage: session-cli [--config PATH] [--metrics] <command>

commands:
  login <access-token> [--refresh-token T] [--token-type T] [--expires-in SECS] [--expires-at UNIX_MS]
  token [--reload]     print the current access token, refreshing if expired
  header               print the Authorization header value
  status               print session metadata and cache stats as JSON
  logout               notify the backend and clear the stored session
  remove               clear the stored session without contacting the backend";

#[derive(Debug, PartialEq, Eq)]
pub struct Cli {
    pub config: Option<String>,
    pub metrics: bool,
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Login(LoginArgs),
    Token { reload: bool },
    Header,
    Status,
    Logout,
    Remove,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoginArgs {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<Duration>,
    pub expires_at: Option<u64>,
}

impl LoginArgs {
    pub fn into_input(self) -> TokenInput {
        let mut input = TokenInput::new(self.access_token);
        if let Some(refresh_token) = self.refresh_token {
            input = input.refresh_token(refresh_token);
        }
        if let Some(token_type) = self.token_type {
            input = input.token_type(token_type);
        }
        if let Some(expires_in) = self.expires_in {
            input = input.expires_in(expires_in);
        }
        if let Some(expires_at) = self.expires_at {
            input = input.expires_at(expires_at);
        }
        input
    }
}

impl Cli {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut config = None;
        let mut metrics = false;
        let mut rest = args.iter();

        let name = loop {
            match rest.next().map(String::as_str) {
                Some("--config") => {
                    config = Some(value(&mut rest, "--config")?.to_string());
                }
                Some("--metrics") => metrics = true,
                Some(name) => break name,
                None => return Err(Error::MissingCommand),
            }
        };

        let command = match name {
            "login" => Command::Login(parse_login(&mut rest)?),
            "token" => {
                let mut reload = false;
                for arg in rest.by_ref() {
                    match arg.as_str() {
                        "--reload" => reload = true,
                        other => return Err(unknown_option(name, other)),
                    }
                }
                Command::Token { reload }
            }
            "header" => Command::Header,
            "status" => Command::Status,
            "logout" => Command::Logout,
            "remove" => Command::Remove,
            other => return Err(Error::UnknownCommand(other.to_string())),
        };

        if let Some(extra) = rest.next() {
            return Err(unknown_option(name, extra));
        }

        Ok(Self {
            config,
            metrics,
            command,
        })
    }
}

fn parse_login<'a>(rest: &mut impl Iterator<Item = &'a String>) -> Result<LoginArgs> {
    let mut login = LoginArgs::default();
    let mut access_token = None;

    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--refresh-token" => login.refresh_token = Some(value(rest, arg)?.to_string()),
            "--token-type" => login.token_type = Some(value(rest, arg)?.to_string()),
            "--expires-in" => {
                let secs = number(value(rest, arg)?, arg)?;
                login.expires_in = Some(Duration::from_secs(secs));
            }
            "--expires-at" => login.expires_at = Some(number(value(rest, arg)?, arg)?),
            flag if flag.starts_with("--") => return Err(unknown_option("login", flag)),
            token if access_token.is_none() => access_token = Some(token.to_string()),
            extra => return Err(unknown_option("login", extra)),
        }
    }

    login.access_token = access_token.ok_or_else(|| Error::MissingValue("login".into()))?;
    Ok(login)
}

fn value<'a>(rest: &mut impl Iterator<Item = &'a String>, option: &str) -> Result<&'a str> {
    rest.next()
        .map(String::as_str)
        .ok_or_else(|| Error::MissingValue(option.to_string()))
}

fn number(value: &str, option: &str) -> Result<u64> {
    value.parse().map_err(|_| Error::InvalidValue {
        option: option.to_string(),
        value: value.to_string(),
    })
}

fn unknown_option(command: &str, option: &str) -> Error {
    Error::UnknownOption {
        command: command.to_string(),
        option: option.to_string(),
    }
}
