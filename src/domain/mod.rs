pub mod address;
pub mod amount;
pub mod error;
pub mod event;
pub mod flight;
pub mod params;

pub use address::Address;
pub use amount::Wei;
pub use error::{SuretyError, SuretyResult};
pub use event::{Event, EventRecord};
pub use flight::{Flight, FlightKey, StatusCode};
pub use params::{Parameters, PayoutRatio};
