pub mod content;
pub mod identity;
pub mod social;

pub use content::ContentService;
pub use identity::IdentityService;
pub use social::SocialService;
