/// Timeline entries, the tiles built from them, and the list that keeps tiles linked.
pub mod timeline;
/// The room view-model: composer, commands, attachments and room lifecycle.
pub mod room;
/// Change notification shared by tiles and view-models.
pub mod shared;

pub mod config;
pub mod errors;
pub mod image_utils;
pub mod power_levels;
pub mod utils;
