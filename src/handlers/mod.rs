//! One handler per subcommand.

pub mod analyze;
pub mod plan;
pub mod profile;
