pub mod amount;
pub mod audit;
pub mod config;
pub mod csv;
pub mod engine;
pub mod model;

pub use amount::Amount;
pub use config::{Config, ReservationPolicy};
pub use engine::{Engine, EngineError, ErrorKind};
pub use model::{
    Actor, Command, Identity, InitiateRequest, NewProject, PaymentCallback, PaymentReceipt,
    PaymentStatus, ProjectId, ProjectStatus, Role, UserId,
};
