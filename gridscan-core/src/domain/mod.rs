//! Domain types shared by providers, the metrics pipeline and the scanner.

pub mod bar;
pub mod instrument;
pub mod record;

pub use bar::{Bar, RawBar};
pub use instrument::{AssetClass, Instrument};
pub use record::GridRecord;
