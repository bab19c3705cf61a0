use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(#[from] ingress_types::backend::Error),

    #[error("deferring sync till stores have synced")]
    NotSynced,

    #[error("shutdown already in progress")]
    ShutdownInProgress,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("{0} was not found")]
    MissingResource(String),

    #[error("ssl error: {0}")]
    Ssl(String),
}
