use std::io;

use got_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Empty download url.")]
    EmptyUrl,
    #[error("{0}")]
    Init(#[source] CoreError),
    #[error("{0}")]
    Transfer(#[source] CoreError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}
