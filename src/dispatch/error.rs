use thiserror::Error;

use crate::docker::DockerError;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("\"{0}\" is not a valid command! Use help for help.")]
    UnknownVerb(String),

    #[error("Missing argument for {verb}! Command is used as {usage}")]
    MissingArgument { verb: &'static str, usage: &'static str },

    #[error("No container exists with the name or ID \"{0}\"")]
    NoSuchContainer(String),

    #[error("No image exists with the name \"{0}\"")]
    NoSuchImage(String),

    #[error("Container \"{0}\" is not running")]
    NotRunning(String),

    #[error(transparent)]
    Docker(#[from] DockerError),
}
