mod fragrance;
mod history;
mod insights;
mod profile;
mod recommendation;

pub use fragrance::*;
pub use history::*;
pub use insights::*;
pub use profile::*;
pub use recommendation::*;
