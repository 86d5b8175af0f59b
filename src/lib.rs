pub mod bus;
pub mod config;
pub mod control;
pub mod messages;
pub mod motion;
pub mod motor;
pub mod plant;
pub mod runtime;
pub mod sensor;
