//! Session lifecycle: template generation, the turn state machine and story
//! assembly.

pub mod service;
pub mod story;
pub mod template;

pub use service::SessionService;
pub use story::assemble_story;
