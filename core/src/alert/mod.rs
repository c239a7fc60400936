pub mod dispatcher;
pub mod player;
pub mod policy;

pub use dispatcher::{AlertDispatcher, DispatchOutcome, DispatchSnapshot};
pub use player::{AudioPlayer, CommandPlayer};
pub use policy::{AlertAction, AlertPolicy};

/// Specialized classes that trigger the alert sound out of the box.
pub const DEFAULT_DANGEROUS_SPECIES: [&str; 7] =
    ["Elephant", "Buffalo", "Rhino", "Cheetah", "Jaguar", "Tiger", "Lion"];
