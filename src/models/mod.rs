//! Data models

pub mod operator;
pub mod shipment;
pub mod alert;
pub mod feedback;

pub use operator::*;
pub use shipment::*;
pub use alert::*;
pub use feedback::*;
