mod image;
mod normalize;
mod prompt;
mod response;
mod service;

pub use image::{image_data_url, image_mime_type};
pub use normalize::{NormalizeError, normalize, repair_latex_escapes, strip_code_fences};
pub use prompt::{DEFAULT_IMAGE_QUESTION, SYSTEM_PROMPT};
pub use response::{Step, TutoringResponse};
pub use service::{AskError, AskRequest, TutorService};
