use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::request::Page;
use crate::{info_time, Error, Result};

/// Path from the document root to the box holding every listing entry, story
/// pages included. Each step is the first matching descendant of the last.
const CONTENT_BOX_PATH: &[&str] = &[
    "body",
    "div#wrapper",
    "div#main",
    "div#content",
    "div.content_box",
];
const POST_WRAPPER: &str = "div.post_wrapper";
const ISSUE_TITLE_LINK_PATH: &[&str] = &["div.post_content", "h2.posttitle", "a"];

const STORY_AUTHOR_PATH: &[&str] = &["div.about_author", "h2", "span"];
/// The generator appends a numeric id, so only the prefix is stable.
const STORY_CONTAINER: &str = r#"div[id^="post-"]"#;
const STORY_METADATA: &str = "p.postmetadata.date";

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("bare number pattern is valid"));

/// Written for every section divider in a story body.
pub const DIVIDER: &str = ". . . .\n\n";

/// One extracted story. Serialized field names match the stories checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub author: String,
    pub title: String,
    pub issue: String,
    pub issue_url: String,
    pub word_count: String,
    #[serde(rename = "type")]
    pub genre: String,
    pub content: String,
    pub story_url: String,
}

impl StoryRecord {
    /// Key the story is stored under: `"<title>-<author>"`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.title, self.author)
    }
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

fn find<'a>(node: ElementRef<'a>, sel_str: &str) -> Result<Option<ElementRef<'a>>> {
    let selector = create_selector(sel_str)?;
    Ok(node.select(&selector).next())
}

/// Follows an optional path. `None` as soon as a step is missing.
fn find_path<'a>(node: ElementRef<'a>, path: &[&str]) -> Result<Option<ElementRef<'a>>> {
    let mut current = node;
    for step in path {
        match find(current, step)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Follows a required path. A missing step means the page template changed.
fn descend<'a>(node: ElementRef<'a>, path: &[&'static str]) -> Result<ElementRef<'a>> {
    let mut current = node;
    for &step in path {
        current = find(current, step)?.ok_or(Error::StructureMismatch { step })?;
    }
    Ok(current)
}

fn post_wrappers<'a>(content_box: ElementRef<'a>) -> Result<Vec<ElementRef<'a>>> {
    let selector = create_selector(POST_WRAPPER)?;
    Ok(content_box.select(&selector).collect())
}

/// Text of the first text node under `node`, the label of headings and spans.
fn first_text(node: ElementRef) -> Option<String> {
    node.text().next().map(str::to_string)
}

/// Finds the issue URL of every entry on a listing page, in document order.
pub fn find_issue_links(html: &str) -> Result<Vec<String>> {
    let doc = Html::parse_document(html);
    let content_box = descend(doc.root_element(), CONTENT_BOX_PATH)?;

    post_wrappers(content_box)?
        .into_iter()
        .map(|entry| {
            let link = descend(entry, ISSUE_TITLE_LINK_PATH)?;
            link.value()
                .attr("href")
                .map(str::to_string)
                .ok_or(Error::StructureMismatch { step: "a[href]" })
        })
        .collect()
}

/// Finds issue URLs across listing pages: page order, then in-page order.
pub fn find_all_issue_links(pages: &[Page]) -> Result<Vec<String>> {
    info_time!("Finding all issue links");
    let mut urls = Vec::new();
    for (idx, page) in pages.iter().enumerate() {
        info_time!("Finding issue links in page {}", idx + 1);
        urls.extend(find_issue_links(&page.html)?);
        info_time!("Total issue links found so far: {}", urls.len());
    }
    Ok(urls)
}

/// Finds links to the stories of an issue whose category is one of `genres`.
/// Entries without a category or a title link (editorials, ads) are skipped.
pub fn find_story_links(html: &str, genres: &[String]) -> Result<Vec<String>> {
    let doc = Html::parse_document(html);
    let content_box = descend(doc.root_element(), CONTENT_BOX_PATH)?;
    let entries = post_wrappers(content_box)?;
    info_time!("Found {} post_wrapper divs", entries.len());

    let mut links = Vec::new();
    for entry in entries {
        let Some(post_content) = find(entry, "div.post_content")? else {
            continue;
        };
        let category = find(post_content, "h3")?.and_then(first_text);
        let link = find_path(post_content, &["h2.posttitle", "a"])?
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);

        let (Some(category), Some(link)) = (category, link) else {
            continue;
        };
        if genres.iter().any(|genre| *genre == category) {
            links.push(link);
        }
    }
    Ok(links)
}

/// Extracts a story record from a story page.
/// Every missing required field is reported together in one `MalformedStory`.
pub fn find_story(html: &str, story_url: &str) -> Result<StoryRecord> {
    let doc = Html::parse_document(html);
    let content_box = descend(doc.root_element(), CONTENT_BOX_PATH)?;
    let mut missing = Vec::new();

    let genre = find(content_box, "h3")?
        .and_then(first_text)
        .unwrap_or_default();
    let author = find_path(content_box, STORY_AUTHOR_PATH)?.and_then(first_text);
    if author.is_none() {
        missing.push("author");
    }

    let Some(post) = find(content_box, STORY_CONTAINER)? else {
        missing.push("content container");
        return Err(Error::MalformedStory {
            url: story_url.to_string(),
            missing,
        });
    };

    let title = find(post, "h1.posttitle")?.and_then(first_text);
    if title.is_none() {
        missing.push("title");
    }

    let metadata = find(post, STORY_METADATA)?;
    let issue_link = match metadata {
        Some(metadata) => find(metadata, "a")?,
        None => None,
    };
    let issue = issue_link.and_then(first_text);
    if issue.is_none() {
        missing.push("issue");
    }
    let issue_url = issue_link
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);
    if issue_url.is_none() {
        missing.push("issue_url");
    }
    let word_count = match metadata {
        Some(metadata) => word_count(metadata),
        None => None,
    };
    if word_count.is_none() {
        missing.push("word_count");
    }

    let content = match find(post, "div.entry")? {
        Some(entry) => Some(story_body(entry)?),
        None => {
            missing.push("content");
            None
        }
    };

    match (author, title, issue, issue_url, word_count, content) {
        (Some(author), Some(title), Some(issue), Some(issue_url), Some(word_count), Some(content)) => {
            Ok(StoryRecord {
                author,
                title,
                issue,
                issue_url,
                word_count,
                genre,
                content,
                story_url: story_url.to_string(),
            })
        }
        _ => Err(Error::MalformedStory {
            url: story_url.to_string(),
            missing,
        }),
    }
}

/// First bare integer in the third segment of the metadata line,
/// e.g. `"<date> | <a>Issue</a> | Word count: 4500 (approx)"`.
fn word_count(metadata: ElementRef) -> Option<String> {
    let segment = metadata.children().nth(2)?;
    let text = match ElementRef::wrap(segment) {
        Some(element) => element.text().collect::<String>(),
        None => segment
            .value()
            .as_text()
            .map(|text| text.to_string())
            .unwrap_or_default(),
    };
    BARE_NUMBER.find(&text).map(|m| m.as_str().to_string())
}

/// Builds the story text out of the direct children of the entry container.
///
/// Children holding an image or a link are decoration and are skipped whole.
/// Paragraphs end with a blank line, lists keep one item per line, and section
/// dividers become `DIVIDER`. Anything else adds nothing.
fn story_body(entry: ElementRef) -> Result<String> {
    let decoration = create_selector("img, a")?;
    let mut content = String::new();

    for child in entry.children().filter_map(ElementRef::wrap) {
        if child.select(&decoration).next().is_some() {
            continue;
        }
        match child.value().name() {
            "p" => {
                content.push_str(&child.text().collect::<String>());
                content.push_str("\n\n");
            }
            "ol" | "ul" => content.push_str(&child.text().collect::<Vec<_>>().join("\n")),
            "div" if child.value().classes().any(|class| class == "divider") => {
                content.push_str(DIVIDER)
            }
            _ => {}
        }
    }
    Ok(content)
}
