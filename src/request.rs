use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::{info_time, Error, Result};

/// A fetched page: where it came from and the raw HTML.
/// Parsing happens in `parse`, on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Page(Page),
    NotFound,
}

impl Fetched {
    /// Turns a `NotFound` into an error, for callers that can't make use of one.
    pub fn found(self, url: &str) -> Result<Page> {
        match self {
            Fetched::Page(page) => Ok(page),
            Fetched::NotFound => Err(Error::NotFound(url.to_string())),
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched>;
}

/// Plain `reqwest` fetcher. A 404 is reported as `Fetched::NotFound`, any other
/// status is handed back as a page and left for extraction to reject.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        info_time!("Requesting page {url}");
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::transport(url, e))?;
        let status = res.status();
        info_time!("Received page {url} with status {}", status.as_u16());

        if status == StatusCode::NOT_FOUND {
            return Ok(Fetched::NotFound);
        }
        let html = res.text().await.map_err(|e| Error::transport(url, e))?;
        Ok(Fetched::Page(Page {
            url: url.to_string(),
            html,
        }))
    }
}

/// Builds the URL of the n-th (1-based) page of a paginated listing.
/// A `{page}` placeholder is substituted, otherwise `/{n}` is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplate(String);

impl PageTemplate {
    pub fn new(base: impl Into<String>) -> Self {
        Self(base.into())
    }

    pub fn url(&self, page_num: usize) -> String {
        if self.0.contains("{page}") {
            self.0.replace("{page}", &page_num.to_string())
        } else {
            format!("{}/{page_num}", self.0.trim_end_matches('/'))
        }
    }
}

/// Walks a paginated listing one page at a time, stopping for good at the first
/// page that isn't found.
pub struct Paginator<'a, F: ?Sized> {
    fetcher: &'a F,
    template: PageTemplate,
    next_page_num: usize,
    done: bool,
}

impl<'a, F: Fetcher + ?Sized> Paginator<'a, F> {
    pub fn new(fetcher: &'a F, template: PageTemplate) -> Self {
        Self {
            fetcher,
            template,
            next_page_num: 1,
            done: false,
        }
    }

    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.done {
            return Ok(None);
        }
        let page_num = self.next_page_num;
        let url = self.template.url(page_num);
        info_time!("Request list page {page_num}");

        match self.fetcher.fetch(&url).await? {
            Fetched::Page(page) => {
                self.next_page_num += 1;
                Ok(Some(page))
            }
            Fetched::NotFound => {
                info_time!("List page {page_num} not found, end of listing");
                self.done = true;
                Ok(None)
            }
        }
    }
}

/// Requests every page of a paginated listing, in order.
/// The page that wasn't found is not part of the result.
pub async fn request_all_pages<F: Fetcher + ?Sized>(
    fetcher: &F,
    template: PageTemplate,
) -> Result<Vec<Page>> {
    info_time!("Requesting paginated list pages from {}", template.url(1));
    let mut paginator = Paginator::new(fetcher, template);
    let mut pages = Vec::new();
    while let Some(page) = paginator.next_page().await? {
        pages.push(page);
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Client::builder().no_proxy().build().unwrap())
    }

    /// Answers a single request on a local port with a canned response.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request: Vec<u8> = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/category/issues/page/1")
    }

    #[tokio::test]
    async fn http_ok_is_a_page() {
        let url = serve_once("200 OK", "<html><body>issue</body></html>").await;
        let fetched = fetcher().fetch(&url).await.unwrap();
        assert_eq!(
            fetched,
            Fetched::Page(Page {
                url: url.clone(),
                html: "<html><body>issue</body></html>".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn http_404_is_not_found() {
        let url = serve_once("404 Not Found", "gone").await;
        assert_eq!(fetcher().fetch(&url).await.unwrap(), Fetched::NotFound);
    }

    #[tokio::test]
    async fn http_500_is_still_a_page() {
        let url = serve_once("500 Internal Server Error", "<p>oops</p>").await;
        match fetcher().fetch(&url).await.unwrap() {
            Fetched::Page(page) => assert_eq!(page.html, "<p>oops</p>"),
            Fetched::NotFound => panic!("a 500 must not end pagination"),
        }
    }

    #[tokio::test]
    async fn closed_port_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = format!("http://{addr}/page/1");

        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::Transport { url: failed, .. } if failed == url));
    }

    #[test]
    fn template_appends_page_number() {
        let template = PageTemplate::new("http://mag.test/category/issues/page");
        assert_eq!(template.url(1), "http://mag.test/category/issues/page/1");
        let template = PageTemplate::new("http://mag.test/page/");
        assert_eq!(template.url(12), "http://mag.test/page/12");
    }

    #[test]
    fn template_substitutes_placeholder() {
        let template = PageTemplate::new("http://mag.test/issues?page={page}&sort=new");
        assert_eq!(template.url(3), "http://mag.test/issues?page=3&sort=new");
    }

    #[test]
    fn not_found_becomes_an_error_when_a_page_is_required() {
        let err = Fetched::NotFound.found("http://mag.test/x").unwrap_err();
        assert!(matches!(err, Error::NotFound(url) if url == "http://mag.test/x"));
    }
}
