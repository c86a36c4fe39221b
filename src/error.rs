use crate::logo::MAX_LOGO_BYTES;

/// Everything that can stop a submission. Each failure is terminal for that
/// run and carries a message suitable for showing to the user as-is; the
/// tools attach anyhow context on top and nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no link was provided")]
    EmptyInput,

    #[error("the link is not a valid absolute URL: {0}")]
    MalformedUrl(#[from] url::ParseError),

    #[error("could not find a file id in the link (expected a /d/<id> segment or an id= parameter)")]
    MissingResourceId,

    #[error("unsupported share link ({host}{path}); expected a Drive, Docs, Sheets or Slides link")]
    UnsupportedLinkFormat { host: String, path: String },

    #[error("logo file is {size} bytes, the cap is {cap} bytes", cap = MAX_LOGO_BYTES)]
    LogoTooLarge { size: usize },

    #[error("could not encode the QR image: {0}")]
    EncodingFailed(String),

    #[error("could not read the logo image: {0}")]
    LogoLoadFailed(String),

    #[error("could not allocate the drawing surface")]
    SurfaceUnavailable,
}
