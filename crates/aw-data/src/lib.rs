//! # aw-data
//!
//! Turns raw transaction exports into a validated numeric [`aw_types::Dataset`]:
//! CSV loading, column encoding, feature scaling, class balancing and a
//! stratified train/test split.

pub mod balance;
pub mod encode;
pub mod loader;
pub mod scaler;
pub mod split;

pub use balance::undersample;
pub use encode::{
    parse_timestamp, payment_format_code, ColumnEncoder, ColumnEncoding, FeatureEncoders,
    PAYMENT_FORMAT_COLUMN, TIMESTAMP_COLUMN,
};
pub use loader::{RawTable, TransactionLoader};
pub use scaler::ScalerParams;
pub use split::train_test_split;
