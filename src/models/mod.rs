pub mod operation;
pub mod period;
pub mod project;
pub mod session;

pub use operation::{OperationKind, PendingOperation};
pub use period::{Period, PeriodType, PeriodUpdate};
pub use project::{Project, ProjectUpdate};
pub use session::{Session, SessionStatus};
