pub mod esi;
pub mod notifications;
