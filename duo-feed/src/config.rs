use std::time::Duration;

/// Configuration for [`crate::PostRepository`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Document collection holding the posts
    pub collection: String,

    /// Content type both images are uploaded with
    pub image_content_type: String,

    /// Upper bound for writing the post document
    pub write_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            collection: "posts".to_string(),
            image_content_type: "image/jpeg".to_string(),
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl FeedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection<S: Into<String>>(mut self, collection: S) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_image_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.image_content_type = content_type.into();
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Defaults overridden by `<PREFIX>__COLLECTION`, `<PREFIX>__IMAGE_CONTENT_TYPE`
    /// and `<PREFIX>__WRITE_TIMEOUT_SECS`
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Same as [`FeedConfig::from_env`] over an explicit set of variables.
    /// Unparseable values keep the default.
    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        let prefix = format!("{}__", prefix.trim_end_matches('_'));

        for (key, value) in vars {
            let Some(stripped) = key.as_ref().strip_prefix(&prefix) else {
                continue;
            };
            let value = value.into();
            match stripped.to_ascii_lowercase().as_str() {
                "collection" if !value.is_empty() => config.collection = value,
                "image_content_type" if !value.is_empty() => config.image_content_type = value,
                "write_timeout_secs" => {
                    if let Ok(secs) = value.parse::<u64>() {
                        config.write_timeout = Duration::from_secs(secs);
                    }
                }
                _ => {}
            }
        }

        config
    }
}
