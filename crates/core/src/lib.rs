pub mod cancel;
pub mod codec;
pub mod config;
pub mod error;
pub mod execution;
pub mod executor;
pub mod notation;
pub mod operation;
pub mod progress;
pub mod store;

pub mod prelude {
    pub use crate::cancel::CancellationToken;
    pub use crate::codec::*;
    pub use crate::error::*;
    pub use crate::execution::Execution;
    pub use crate::executor::{ExecutionEvent, Outcome};
    pub use crate::notation::Notation;
    pub use crate::operation::{ConfiguredOperation, Operation, OperationKind, Task};
    pub use crate::progress::{Flow, ProgressEvent, ProgressSink};
}
