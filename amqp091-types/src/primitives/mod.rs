//! Primitive types of the AMQP 0-9-1 field table grammar

mod decimal;
pub use decimal::Decimal;

mod timestamp;
pub use timestamp::Timestamp;

mod table;
pub use table::{FieldArray, FieldTable};

mod value;
pub use value::FieldValue;

pub use ordered_float::OrderedFloat;
