//! Frame synchronization between the authority and predicting clients

pub mod client;
pub mod server;

pub use client::{Prediction, RenderSink};
pub use server::{Authority, Seat};
