// Row processing: schemas, coercion, validation and normalization

pub mod coerce;
pub mod normalize;
pub mod schema;
pub mod validate;
