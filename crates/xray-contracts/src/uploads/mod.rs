mod preview;
mod set;

pub use preview::{PreviewHandle, PreviewRegistry};
pub use set::{
    filter_images, is_image_mime, mime_for_path, normalize_mime, CandidateFile, ImageSource,
    UploadSet, UploadedImage, UNKNOWN_MIME,
};
