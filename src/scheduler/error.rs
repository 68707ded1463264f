use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("cron field out of range: {0}")]
    InvalidCronExpression(String),

    #[error("job '{0}' is already registered")]
    JobAlreadyExists(String),

    #[error("job '{0}' is not registered")]
    JobNotFound(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
