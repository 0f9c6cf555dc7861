pub mod resource;
pub mod reservation;
pub mod payment;
pub mod refund;
pub mod settlement;
pub mod settings;

pub use resource::*;
pub use reservation::*;
pub use payment::*;
pub use refund::*;
pub use settlement::*;
pub use settings::*;
