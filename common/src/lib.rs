pub mod axis;
pub mod config;
pub mod layout;
pub mod normalize;
pub mod observation;
pub mod plot;
pub mod style;
pub mod util;
