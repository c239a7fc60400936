pub mod profile;
pub mod scenario;
