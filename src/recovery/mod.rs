pub mod coordinator;

pub use coordinator::{RecoveryCoordinator, RecoveryReport};
