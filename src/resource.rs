use reqwest::RequestBuilder;
use url::Url;

/// Just a wrapper around a URL and credentials
#[derive(Clone)]
pub struct Resource {
    url: Url,
    username: String,
    password: String,
}

impl Resource {
    pub fn new(url: Url, username: String, password: String) -> Self {
        Self { url, username, password }
    }

    pub fn url(&self) -> &Url { &self.url }

    /// Build a new Resource by keeping the same credentials, scheme and server from `base` but changing the path part
    pub fn combine(&self, new_path: &str) -> Resource {
        let mut built = (*self).clone();
        built.url.set_path(new_path);
        built
    }

    /// Build a new Resource at another URL, with the same credentials
    pub fn with_url(&self, url: Url) -> Resource {
        Resource { url, ..self.clone() }
    }

    /// Build a new Resource for a file in this collection
    pub fn child(&self, file_name: &str) -> Resource {
        let mut built = (*self).clone();
        built.url.path_segments_mut()
            .map(|mut segments| { segments.pop_if_empty().push(file_name); })
            .unwrap_or_else(|_| log::warn!("{} cannot be a base URL", self.url));
        built
    }

    /// Add the credentials of this resource to a request
    pub fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .finish()
    }
}
