#![deny(missing_docs, missing_debug_implementations)]

//! Implements AMQP 0-9-1 data types and method definitions as spoken by RabbitMQ.
//!
//! This crate is free of I/O. It only knows how to turn the AMQP type system and the
//! method arguments of the Connection, Channel, Exchange, Queue and Basic classes into
//! bytes and back.

pub mod codec;
pub mod definitions;
pub mod methods;
pub mod primitives;
pub mod properties;

pub use codec::{Decode, Encode, Error, Reader};
