//! Feature Engineering Engine
//!
//! Synthetic flight features, robust statistics and the encoding primitives
//! shared by training and inference.

mod encoding;
mod error;
pub mod statistics;
mod synthetic;

pub use encoding::{
    cyclic_cos, target_encoding, ColumnEncoding, CyclicDate, EncodingMap, EncodingMapBuilder,
    ENCODING_DECIMALS, ENCODING_FORMAT_VERSION,
};
pub use error::FeatureError;
pub use synthetic::{
    day_period, delay_minutes, is_high_season, is_minor_delay, DayPeriod, Delay,
    SyntheticFeatures, HIGH_SEASONS, MINOR_DELAY_THRESHOLD_MINUTES,
};
