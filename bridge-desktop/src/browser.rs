//! Headless Browser Surface
//!
//! Records what the engine asks the browser to do, per flow, and lets a
//! driver (a desktop shell, an automation script, a test) inject cookies and
//! observe presentations. Nothing is rendered.

use async_trait::async_trait;
use bridge_traits::{
    browser::{BrowserController, BrowserCookies, FlowId},
    error::{BridgeError, Result},
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// What happened to a flow's browser surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserNotice {
    Presented { flow: FlowId, url: String },
    Navigated { flow: FlowId, url: String },
    Closed { flow: FlowId },
}

/// Recorded state of one flow's browser.
#[derive(Debug, Clone, Default)]
pub struct BrowserSession {
    pub current_url: String,
    /// Header names are stored lower-cased.
    pub headers: BTreeMap<String, String>,
    pub presented: bool,
    pub intercept_requests: bool,
    pub visited_urls: Vec<String>,
    cookie_jar: HashMap<String, BrowserCookies>,
}

impl BrowserSession {
    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("user-agent").map(String::as_str)
    }
}

/// Browser that keeps per-flow state in memory.
pub struct HeadlessBrowser {
    sessions: Mutex<HashMap<FlowId, BrowserSession>>,
    notices: broadcast::Sender<BrowserNotice>,
}

impl HeadlessBrowser {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(64);
        Self {
            sessions: Mutex::new(HashMap::new()),
            notices,
        }
    }

    /// Subscribe to presentation, navigation and close notices.
    pub fn subscribe(&self) -> broadcast::Receiver<BrowserNotice> {
        self.notices.subscribe()
    }

    /// Copy of the recorded state for `flow`.
    pub fn session(&self, flow: FlowId) -> Option<BrowserSession> {
        self.lock().get(&flow).cloned()
    }

    pub fn presented_flows(&self) -> Vec<FlowId> {
        self.lock()
            .iter()
            .filter(|(_, s)| s.presented)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Store cookies for `domain` in the flow's jar, as a page would.
    pub fn set_cookies(&self, flow: FlowId, domain: &str, cookies: BrowserCookies) -> Result<()> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(&flow)
            .ok_or_else(|| BridgeError::BrowserInactive(flow.to_string()))?;
        let jar = session
            .cookie_jar
            .entry(normalize_domain(domain))
            .or_default();
        jar.0.extend(cookies.0);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<FlowId, BrowserSession>> {
        // A poisoned map still holds consistent per-flow entries.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, notice: BrowserNotice) {
        let _ = self.notices.send(notice);
    }
}

impl Default for HeadlessBrowser {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim_start_matches('.').to_ascii_lowercase()
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(normalize_domain))
}

/// Cookies visible to `host`: those of the host itself and its parent domains.
fn cookies_visible_to(jar: &HashMap<String, BrowserCookies>, host: &str) -> BrowserCookies {
    let mut visible = BrowserCookies::new();
    for (domain, cookies) in jar {
        if host == domain || host.ends_with(&format!(".{}", domain)) {
            visible.0.extend(cookies.0.clone());
        }
    }
    visible
}

#[async_trait]
impl BrowserController for HeadlessBrowser {
    async fn prepare_browser(&self, flow: FlowId, url: &str) -> Result<()> {
        let mut sessions = self.lock();
        let session = sessions.entry(flow).or_default();
        session.current_url = url.to_string();
        session.headers.clear();
        session.visited_urls.push(url.to_string());
        debug!(%flow, "Prepared headless browser");
        Ok(())
    }

    async fn set_browser_header(&self, flow: FlowId, key: &str, value: &str) -> Result<()> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(&flow)
            .ok_or_else(|| BridgeError::BrowserInactive(flow.to_string()))?;
        session
            .headers
            .insert(key.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    async fn present_browser(&self, flow: FlowId, intercept_requests: bool) -> Result<()> {
        let url = {
            let mut sessions = self.lock();
            let session = sessions
                .get_mut(&flow)
                .ok_or_else(|| BridgeError::BrowserInactive(flow.to_string()))?;
            session.presented = true;
            session.intercept_requests = intercept_requests;
            session.current_url.clone()
        };
        debug!(%flow, intercept_requests, "Presented headless browser");
        self.notify(BrowserNotice::Presented { flow, url });
        Ok(())
    }

    async fn close_browser(&self, flow: FlowId) -> Result<()> {
        let was_open = self.lock().remove(&flow).is_some();
        if was_open {
            self.notify(BrowserNotice::Closed { flow });
        }
        Ok(())
    }

    async fn change_browser_url(&self, flow: FlowId, url: &str) -> Result<()> {
        {
            let mut sessions = self.lock();
            let session = sessions
                .get_mut(&flow)
                .filter(|s| s.presented)
                .ok_or_else(|| BridgeError::BrowserInactive(flow.to_string()))?;
            session.current_url = url.to_string();
            session.visited_urls.push(url.to_string());
        }
        self.notify(BrowserNotice::Navigated {
            flow,
            url: url.to_string(),
        });
        Ok(())
    }

    async fn cookies_for_current_url(&self, flow: FlowId) -> Result<Option<BrowserCookies>> {
        let sessions = self.lock();
        let Some(session) = sessions.get(&flow).filter(|s| s.presented) else {
            return Ok(None);
        };
        Ok(host_of(&session.current_url).map(|host| cookies_visible_to(&session.cookie_jar, &host)))
    }

    async fn cookies_for_domain(
        &self,
        flow: FlowId,
        domain: &str,
    ) -> Result<Option<BrowserCookies>> {
        let sessions = self.lock();
        let Some(session) = sessions.get(&flow).filter(|s| s.presented) else {
            return Ok(None);
        };
        Ok(Some(cookies_visible_to(
            &session.cookie_jar,
            &normalize_domain(domain),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_headers_are_lowercased_and_reset_on_prepare() {
        let browser = HeadlessBrowser::new();
        let flow = FlowId::new();

        browser.prepare_browser(flow, "https://m.uber.com").await.unwrap();
        browser
            .set_browser_header(flow, "User-Agent", "Opacity/1.0")
            .await
            .unwrap();
        assert_eq!(browser.session(flow).unwrap().user_agent(), Some("Opacity/1.0"));

        browser.prepare_browser(flow, "https://m.uber.com/go").await.unwrap();
        assert!(browser.session(flow).unwrap().headers.is_empty());
    }

    #[tokio::test]
    async fn test_cookies_unavailable_until_presented() {
        let browser = HeadlessBrowser::new();
        let flow = FlowId::new();

        assert_eq!(browser.cookies_for_current_url(flow).await.unwrap(), None);

        browser.prepare_browser(flow, "https://www.reddit.com/login").await.unwrap();
        browser
            .set_cookies(flow, ".reddit.com", BrowserCookies::new().with("reddit_session", "abc"))
            .unwrap();
        assert_eq!(browser.cookies_for_domain(flow, "reddit.com").await.unwrap(), None);

        browser.present_browser(flow, false).await.unwrap();
        let cookies = browser.cookies_for_current_url(flow).await.unwrap().unwrap();
        assert_eq!(cookies.get("reddit_session"), Some("abc"));
    }

    #[tokio::test]
    async fn test_flows_do_not_share_cookies() {
        let browser = HeadlessBrowser::new();
        let a = FlowId::new();
        let b = FlowId::new();

        for flow in [a, b] {
            browser.prepare_browser(flow, "https://github.com/login").await.unwrap();
            browser.present_browser(flow, false).await.unwrap();
        }
        browser
            .set_cookies(a, "github.com", BrowserCookies::new().with("user_session", "A"))
            .unwrap();

        let seen_by_b = browser.cookies_for_domain(b, "github.com").await.unwrap().unwrap();
        assert!(seen_by_b.is_empty());
    }

    #[tokio::test]
    async fn test_notices_and_close() {
        let browser = HeadlessBrowser::new();
        let mut notices = browser.subscribe();
        let flow = FlowId::new();

        browser.prepare_browser(flow, "https://example.com").await.unwrap();
        browser.present_browser(flow, true).await.unwrap();
        assert_eq!(browser.presented_flows(), vec![flow]);
        browser.close_browser(flow).await.unwrap();
        browser.close_browser(flow).await.unwrap();

        assert!(matches!(notices.recv().await.unwrap(), BrowserNotice::Presented { .. }));
        assert_eq!(notices.recv().await.unwrap(), BrowserNotice::Closed { flow });
        assert!(browser.session(flow).is_none());
    }
}
