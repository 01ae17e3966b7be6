pub mod clock;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{SeatError, StoreError};
pub use models::{SeatStatus, ShowSeat};
pub use repository::SeatRepository;
pub use service::SeatService;

pub type SeatResult<T> = Result<T, SeatError>;
pub type StoreResult<T> = Result<T, StoreError>;
