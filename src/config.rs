use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.fundamentus.com.br";

/// Date formats tried in order by the history parser. First match wins.
///
/// `%d/%m/%Y` comes after `%Y/%m/%d`; reordering this list changes how
/// ambiguous slash dates resolve.
pub const DEFAULT_DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"];

/// Browser-like request headers sent to the upstream site.
#[derive(Debug, Clone)]
pub struct BrowserHeaders {
    pub user_agent: String,
    pub accept_html: String,
    pub accept_xhr: String,
    pub accept_language: String,
    pub sec_ch_ua: String,
    pub sec_ch_ua_platform: String,
    pub sec_ch_ua_mobile: String,
}

impl Default for BrowserHeaders {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36"
                .to_string(),
            accept_html: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
            accept_xhr: "application/json, text/javascript, */*; q=0.01".to_string(),
            accept_language: "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            sec_ch_ua: "\"Not;A=Brand\";v=\"99\", \"Google Chrome\";v=\"139\", \"Chromium\";v=\"139\""
                .to_string(),
            sec_ch_ua_platform: "\"Windows\"".to_string(),
            sec_ch_ua_mobile: "?0".to_string(),
        }
    }
}

pub struct Config {
    pub debug_mode: bool,
    pub debug_limit: usize,
    pub base_url: String,
    pub db_path: String,
    pub data_dir: String,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub headers: BrowserHeaders,
    pub date_formats: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            debug_mode: false,
            debug_limit: 10,
            base_url: DEFAULT_BASE_URL.to_string(),
            db_path: "data/ibovespa.sqlite".to_string(),
            data_dir: "data".to_string(),
            request_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(30),
            headers: BrowserHeaders::default(),
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn with_debug_limit(mut self, limit: usize) -> Self {
        self.debug_limit = limit;
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_db_path(mut self, path: &str) -> Self {
        self.db_path = path.to_string();
        self
    }

    pub fn with_data_dir(mut self, dir: &str) -> Self {
        self.data_dir = dir.to_string();
        self
    }

    /// Pause inserted between network calls of one entity and between entities.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_headers(mut self, headers: BrowserHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_date_formats(mut self, formats: &[&str]) -> Self {
        self.date_formats = formats.iter().map(|f| f.to_string()).collect();
        self
    }
}
