//! Proxy configuration.
//!
//! Defaults can be overridden by environment variables, which in turn are
//! overridden by command-line arguments.

use crate::buffer::{DEFAULT_BUFFER_SIZE, DEFAULT_POOL_CAPACITY};
use crate::connection::dispatch::DEFAULT_QUEUE_DEPTH;
use crate::connection::ServerConfig;
use thiserror::Error;

/// Default port of the issuing link
pub const DEFAULT_ISSUING_PORT: u16 = 5000;

/// Default port of the acquiring link
pub const DEFAULT_ACQUIRING_PORT: u16 = 5001;

/// Default host both links bind to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Environment variable overriding the issuing port
pub const ISSUING_PORT_ENV: &str = "POSTILION_ISSUING_PORT";

/// Environment variable overriding the acquiring port
pub const ACQUIRING_PORT_ENV: &str = "POSTILION_ACQUIRING_PORT";

/// Errors raised while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error("issuing and acquiring links cannot share port {0}")]
    PortConflict(u16),
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(ProxyConfig),
    Help,
    Version,
}

/// Settings for the whole proxy process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Host both listeners bind to
    pub host: String,
    /// Port of the issuing link
    pub issuing_port: u16,
    /// Port of the acquiring link
    pub acquiring_port: u16,
    /// Frames that may wait for a connection's dispatcher
    pub dispatch_queue_depth: usize,
    /// Buffers pre-allocated in the shared pool
    pub pool_capacity: usize,
    /// Initial size of each pooled buffer
    pub pool_buffer_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            issuing_port: DEFAULT_ISSUING_PORT,
            acquiring_port: DEFAULT_ACQUIRING_PORT,
            dispatch_queue_depth: DEFAULT_QUEUE_DEPTH,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            pool_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ProxyConfig {
    /// Reads the process environment and command line.
    pub fn load() -> Result<Command, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_args(std::env::args().skip(1))
    }

    /// Applies port overrides from the environment.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ISSUING_PORT_ENV) {
            self.issuing_port = parse_value(ISSUING_PORT_ENV, &value)?;
        }
        if let Some(value) = lookup(ACQUIRING_PORT_ENV) {
            self.acquiring_port = parse_value(ACQUIRING_PORT_ENV, &value)?;
        }
        Ok(())
    }

    /// Parses command-line arguments (without the program name).
    pub fn from_args<I, S>(args: I) -> Result<Command, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().apply_args(args)
    }

    fn apply_args<I, S>(mut self, args: I) -> Result<Command, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" => return Ok(Command::Help),
                "--version" | "-v" => return Ok(Command::Version),
                "--host" | "-h" => self.host = next_value(&arg, &mut args)?,
                "--issuing-port" => {
                    self.issuing_port = parse_value(&arg, &next_value(&arg, &mut args)?)?
                }
                "--acquiring-port" => {
                    self.acquiring_port = parse_value(&arg, &next_value(&arg, &mut args)?)?
                }
                "--queue-depth" => {
                    self.dispatch_queue_depth = parse_value(&arg, &next_value(&arg, &mut args)?)?
                }
                "--pool-capacity" => {
                    self.pool_capacity = parse_value(&arg, &next_value(&arg, &mut args)?)?
                }
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        self.validate()?;
        Ok(Command::Run(self))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // Port 0 lets the OS pick, so two zero ports do not collide
        if self.issuing_port != 0 && self.issuing_port == self.acquiring_port {
            return Err(ConfigError::PortConflict(self.issuing_port));
        }
        if self.dispatch_queue_depth == 0 {
            return Err(ConfigError::InvalidValue {
                option: "--queue-depth".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn issuing_address(&self) -> String {
        format!("{}:{}", self.host, self.issuing_port)
    }

    pub fn acquiring_address(&self) -> String {
        format!("{}:{}", self.host, self.acquiring_port)
    }

    /// Server settings for a link named `link`.
    pub fn server_config(&self, link: &str) -> ServerConfig {
        ServerConfig::new(link).with_dispatch_queue_depth(self.dispatch_queue_depth)
    }
}

fn next_value(option: &str, args: &mut impl Iterator<Item = String>) -> Result<String, ConfigError> {
    args.next()
        .ok_or_else(|| ConfigError::MissingValue(option.to_string()))
}

fn parse_value<T: std::str::FromStr>(option: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        option: option.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> ProxyConfig {
        match ProxyConfig::from_args(args.iter().copied()).unwrap() {
            Command::Run(config) => config,
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let config = run(&[]);
        assert_eq!(config, ProxyConfig::default());
        assert_eq!(config.issuing_address(), "0.0.0.0:5000");
        assert_eq!(config.acquiring_address(), "0.0.0.0:5001");
    }

    #[test]
    fn test_ports_and_host() {
        let config = run(&[
            "--host",
            "127.0.0.1",
            "--issuing-port",
            "7000",
            "--acquiring-port",
            "7001",
            "--queue-depth",
            "16",
        ]);
        assert_eq!(config.issuing_address(), "127.0.0.1:7000");
        assert_eq!(config.acquiring_address(), "127.0.0.1:7001");
        assert_eq!(config.server_config("issuing").dispatch_queue_depth, 16);
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(ProxyConfig::from_args(["--help"]), Ok(Command::Help));
        assert_eq!(ProxyConfig::from_args(["-v"]), Ok(Command::Version));
    }

    #[test]
    fn test_invalid_arguments() {
        assert_eq!(
            ProxyConfig::from_args(["--issuing-port"]),
            Err(ConfigError::MissingValue("--issuing-port".to_string()))
        );
        assert!(matches!(
            ProxyConfig::from_args(["--acquiring-port", "70000"]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            ProxyConfig::from_args(["--bogus"]),
            Err(ConfigError::UnknownArgument("--bogus".to_string()))
        );
        assert_eq!(
            ProxyConfig::from_args(["--issuing-port", "6000", "--acquiring-port", "6000"]),
            Err(ConfigError::PortConflict(6000))
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ProxyConfig::default();
        config
            .apply_env(|key| match key {
                ISSUING_PORT_ENV => Some("9100".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.issuing_port, 9100);
        assert_eq!(config.acquiring_port, DEFAULT_ACQUIRING_PORT);

        let err = config
            .apply_env(|key| (key == ACQUIRING_PORT_ENV).then(|| "x".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
