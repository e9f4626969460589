//! Error kinds surfaced by the core (spec.md §7). Every fallible operation
//! in this crate returns [`Result`], whose `Err` carries one of these
//! variants plus, where the driver supplied one, a diagnostic string copied
//! out of the driver before its native result was destroyed.

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A nil/empty connection string, nil SQL, or a connection with no
    /// driver attached (spec.md §7).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// `try_begin` found the busy flag already set (spec.md §4.3, §7).
    #[error("connection is busy with another operation")]
    Busy,

    /// The driver call itself failed; `message` is the driver's own text,
    /// copied into a connection-owned buffer so it survives destruction of
    /// the driver's native result (spec.md §4.2, §7).
    #[error("driver error: {message}")]
    Driver { message: String },

    /// A parameter kind outside the known set, or binding failed
    /// (spec.md §7).
    #[error("parameter error: {0}")]
    Parameter(String),

    /// An internal channel closed or a spawned task could not be joined.
    /// This crate's analogue of the C core's allocation failures (spec.md
    /// §7; see DESIGN.md for the mapping).
    #[error("internal dispatch failure: {0}")]
    Dispatch(String),

    /// A blocking pool checkout found `total + pending_temp >= max_size`
    /// and no idle connection (spec.md §4.5, §7).
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Any operation attempted against a pool whose destroyed flag is set
    /// (spec.md §4.5, §7).
    #[error("connection pool has been destroyed")]
    PoolDestroyed,

    /// `pool_create` was asked for `initial_size == 0` or
    /// `initial_size > max_size` (spec.md §8).
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(&'static str),

    /// The selected [`crate::driver::DriverKind`] was not compiled into
    /// this build (spec.md §4.2: "Drivers compiled out should not be
    /// linkable").
    #[error("driver {0:?} is not available in this build")]
    DriverUnavailable(crate::driver::DriverKind),
}

impl Error {
    pub fn driver(message: impl Into<String>) -> Self {
        Error::Driver {
            message: message.into(),
        }
    }
}
