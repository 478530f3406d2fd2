use eventq_domain::error::QueueError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    #[error("handler not found: event={event}")]
    HandlerNotFound { event: String },

    #[error("handler already registered: {handler}")]
    AlreadyRegistered { handler: String },

    #[error("handler {handler} failed on {event}: {reason}")]
    Handler {
        handler: String,
        event: String,
        reason: String,
    },
}

pub type WorkerResult<T> = Result<T, WorkerError>;
