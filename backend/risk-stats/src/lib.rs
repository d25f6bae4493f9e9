pub mod concentration;
pub mod moments;
pub mod var;

pub use concentration::herfindahl_index;
pub use moments::{correlation, mean, std_dev, variance};
pub use var::{conditional_value_at_risk, value_at_risk};
