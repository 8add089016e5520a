pub mod composer;
pub mod experiments;
pub mod insights;
pub mod providers;
pub mod scoring;
