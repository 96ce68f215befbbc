use crate::config::{BrowserHeaders, Config};
use crate::errors::{DataHubError, Result};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};

/// Which `accept` profile a request goes out with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestProfile {
    /// Regular page navigation.
    Html,
    /// `XMLHttpRequest` issued from a page (JSON/JS payloads).
    Xhr,
}

/// Blocking HTTP client for the upstream site.
///
/// Every request carries the configured browser headers; one client value
/// is shared by all scrapers of a run.
pub struct HttpClient {
    client: Client,
    base_url: String,
    headers: BrowserHeaders,
}

impl HttpClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.headers.user_agent.clone())
            .build()
            .map_err(DataHubError::RequestError)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            headers: config.headers.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `path` is relative to the base URL (`/fii_resultado.php`).
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// GET `path` and return the body; non-2xx is an error.
    pub fn get_text(&self, path: &str, profile: RequestProfile, referer: Option<&str>) -> Result<String> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.header_map(profile, referer))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataHubError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        Ok(response.text()?)
    }

    /// Try each path in order; the first 2xx response with a non-blank body
    /// wins. Returns the winning path with its body.
    pub fn first_available(
        &self,
        paths: &[String],
        profile: RequestProfile,
        referer: Option<&str>,
    ) -> Result<(String, String)> {
        let mut last_error = None;
        for path in paths {
            match self.get_text(path, profile, referer) {
                Ok(body) if !body.trim().is_empty() => return Ok((path.clone(), body)),
                Ok(_) => debug!("{} returned an empty body", path),
                Err(e) => {
                    debug!("{} failed: {}", path, e);
                    last_error = Some(e);
                }
            }
        }

        Err(DataHubError::Extraction(match last_error {
            Some(e) => format!("no candidate page available (last error: {})", e),
            None => "no candidate page available".to_string(),
        }))
    }

    fn header_map(&self, profile: RequestProfile, referer: Option<&str>) -> HeaderMap {
        let h = &self.headers;
        let accept = match profile {
            RequestProfile::Html => &h.accept_html,
            RequestProfile::Xhr => &h.accept_xhr,
        };

        let mut map = HeaderMap::new();
        insert(&mut map, ACCEPT, accept);
        insert(&mut map, ACCEPT_LANGUAGE, &h.accept_language);
        insert(&mut map, HeaderName::from_static("sec-ch-ua"), &h.sec_ch_ua);
        insert(&mut map, HeaderName::from_static("sec-ch-ua-platform"), &h.sec_ch_ua_platform);
        insert(&mut map, HeaderName::from_static("sec-ch-ua-mobile"), &h.sec_ch_ua_mobile);

        if profile == RequestProfile::Xhr {
            insert(&mut map, HeaderName::from_static("x-requested-with"), "XMLHttpRequest");
            insert(&mut map, HeaderName::from_static("sec-fetch-dest"), "empty");
            insert(&mut map, HeaderName::from_static("sec-fetch-mode"), "cors");
            insert(&mut map, HeaderName::from_static("sec-fetch-site"), "same-origin");
        }

        if let Some(referer) = referer {
            insert(&mut map, REFERER, referer);
        }
        map
    }
}

// 非法的头部值直接跳过，不影响请求
fn insert(map: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        map.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = Config::new().with_base_url("http://localhost:1234/");
        let http = HttpClient::new(&config).unwrap();
        assert_eq!(http.url("/fii_resultado.php"), "http://localhost:1234/fii_resultado.php");
        assert_eq!(http.url("script/cmplte.php"), "http://localhost:1234/script/cmplte.php");
    }

    #[test]
    fn test_xhr_profile_headers() {
        let http = HttpClient::new(&Config::new()).unwrap();
        let map = http.header_map(RequestProfile::Xhr, Some("https://example.com/ref"));
        assert_eq!(map.get("x-requested-with").unwrap(), "XMLHttpRequest");
        assert_eq!(map.get(REFERER).unwrap(), "https://example.com/ref");
        assert!(map.get(ACCEPT).unwrap().to_str().unwrap().starts_with("application/json"));

        let html = http.header_map(RequestProfile::Html, None);
        assert!(html.get("x-requested-with").is_none());
        assert!(html.get(ACCEPT).unwrap().to_str().unwrap().starts_with("text/html"));
    }
}
