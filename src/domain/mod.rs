pub mod models;
pub mod signals;

pub use models::*;
pub use signals::{ContentStats, Heading, Image, PageSignals, SiteFacts};
