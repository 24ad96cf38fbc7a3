#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use harvest::request::{Fetched, Fetcher, Page};
use harvest::{Error, Result};

/// Serves canned HTML by URL. Unknown URLs are not found, `broken` ones fail
/// like a dropped connection. Every request is logged.
#[derive(Default)]
pub struct FixtureFetcher {
    pages: Mutex<HashMap<String, String>>,
    broken: Mutex<HashSet<String>>,
    requested: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: String) -> Self {
        self.add_page(url, html);
        self
    }

    pub fn add_page(&self, url: &str, html: String) {
        self.pages.lock().unwrap().insert(url.to_string(), html);
    }

    pub fn break_url(&self, url: &str) {
        self.broken.lock().unwrap().insert(url.to_string());
    }

    pub fn fix_url(&self, url: &str) {
        self.broken.lock().unwrap().remove(url);
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requested.lock().unwrap().clear();
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        self.requested.lock().unwrap().push(url.to_string());
        if self.broken.lock().unwrap().contains(url) {
            return Err(Error::Transport {
                url: url.to_string(),
                source: Box::new(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
            });
        }
        let html = self.pages.lock().unwrap().get(url).cloned();
        Ok(match html {
            Some(html) => Fetched::Page(Page {
                url: url.to_string(),
                html,
            }),
            None => Fetched::NotFound,
        })
    }
}

pub const LISTING: &str = "http://mag.test/category/issues/page";

pub fn listing_url(page_num: usize) -> String {
    format!("{LISTING}/{page_num}")
}

fn layout(content_box: &str) -> String {
    format!(
        r#"<html><head><title>Mag</title></head><body>
<div id="wrapper"><div id="header"></div><div id="main"><div id="content">
<div class="content_box">
{content_box}
</div></div></div></div></body></html>"#
    )
}

fn post(category: Option<&str>, href: &str, title: &str) -> String {
    let category = category
        .map(|c| format!("<h3>{c}</h3>"))
        .unwrap_or_default();
    format!(
        r#"<div class="post_wrapper">
  <div class="post_content">
    {category}
    <h2 class="posttitle"><a href="{href}">{title}</a></h2>
    <p>Teaser text.</p>
  </div>
</div>"#
    )
}

/// A listing page linking to the given issues.
pub fn listing_page(issue_urls: &[&str]) -> String {
    layout(
        &issue_urls
            .iter()
            .map(|url| post(None, url, "Issue"))
            .collect::<String>(),
    )
}

/// An issue page with `(category, story url)` entries plus an editorial without a category.
pub fn issue_page(entries: &[(&str, &str)]) -> String {
    let mut html = post(None, "http://mag.test/editorial", "Editorial");
    for (category, url) in entries {
        html.push_str(&post(Some(category), url, "Story"));
    }
    layout(&html)
}

pub fn story_page(title: &str, author: &str, genre: &str, body: &str) -> String {
    layout(&format!(
        r#"<h3>{genre}</h3>
<div id="post-4242" class="post type-post">
  <h1 class="posttitle">{title}</h1>
  <p class="postmetadata date">March 2014 | <a href="http://mag.test/issues/mar-2014/">Issue 46, March 2014</a> | Word count: 4500 (approx)</p>
  <div class="entry">
    {body}
  </div>
</div>
<div class="about_author"><h2>About the Author, <span>{author}</span></h2></div>"#
    ))
}
