pub mod forestry;
pub mod settings;
pub mod types;
pub mod validator;

pub use forestry::{schema as forestry_schema, MeasurementSystem, SampleType, Variable};
pub use settings::Settings;
pub use types::*;
pub use validator::*;
