use serde::Deserialize;

/// Widget configuration read from the environment, mirroring how the
/// hosting page initializes the third-party uploader.
#[derive(Debug, Clone)]
pub struct UploadWidgetConfig {
    pub cloud_name: String,
    pub upload_preset: String,
}

impl UploadWidgetConfig {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            cloud_name: std::env::var("CLOUDINARY_CLOUD_NAME").ok()?,
            upload_preset: std::env::var("CLOUDINARY_UPLOAD_PRESET").ok()?,
        })
    }
}

/// One callback invocation from the upload widget. The widget reports many
/// event kinds; only `"success"` carries a usable URL.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UploadEvent {
    pub event: String,
    pub info: UploadInfo,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UploadInfo {
    pub secure_url: String,
}

/// Applies the widget's `(error, result)` callback contract: the URL is
/// only taken from an error-free `"success"` event.
pub fn secure_url(error: Option<String>, result: Option<UploadEvent>) -> Option<String> {
    if error.is_some() {
        return None;
    }
    let result = result?;
    if result.event != "success" {
        return None;
    }
    Some(result.info.secure_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: &str) -> UploadEvent {
        UploadEvent {
            event: kind.to_owned(),
            info: UploadInfo {
                secure_url: "https://images.example.com/profile.png".to_owned(),
            },
        }
    }

    #[test]
    fn success_event_yields_the_url() {
        assert_eq!(
            secure_url(None, Some(event("success"))),
            Some("https://images.example.com/profile.png".to_owned())
        );
    }

    #[test]
    fn non_success_events_are_ignored() {
        assert_eq!(secure_url(None, Some(event("close"))), None);
        assert_eq!(secure_url(None, Some(event("queues-start"))), None);
    }

    #[test]
    fn errors_suppress_the_result() {
        assert_eq!(
            secure_url(Some("upload failed".to_owned()), Some(event("success"))),
            None
        );
    }

    #[test]
    fn missing_result_yields_nothing() {
        assert_eq!(secure_url(None, None), None);
    }
}
