//! Concrete rigs driven through a [`DeviceSession`](crate::session::DeviceSession).

pub mod servo_tripod;

pub use servo_tripod::ServoTripod;
