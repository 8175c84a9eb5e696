/// Command, text, photo and callback handlers
pub mod handlers;
/// Photo downscaling before upload to the model
pub mod media;
/// Outbound delivery: cleaning, splitting, part headers
pub mod messaging;
/// Per-user answer mode selection
pub mod state;
