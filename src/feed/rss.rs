//! Single-channel RSS reading and batch writing.
//!
//! Items are kept as the exact source text of their `<item>` element so that a
//! batch file reproduces what the upstream feed published, while the handful of
//! child elements the pipeline needs are decoded alongside.

use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::types::{Channel, FeedItem};
use super::FeedError;

/// `pubDate` layout, e.g. `Mon, 01 Jan 2024 10:00:00 +0000`.
pub const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Parse an RSS `pubDate` and normalize it to UTC.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_str(raw, PUB_DATE_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

struct ItemBuilder {
    start: usize,
    depth: usize,
    item: FeedItem,
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn field_mut<'a>(item: &'a mut FeedItem, name: &str) -> Option<&'a mut String> {
    match name {
        "title" => Some(&mut item.title),
        "link" => Some(&mut item.link),
        "description" => Some(&mut item.description),
        "content:encoded" => Some(&mut item.content),
        "pubDate" => Some(&mut item.pub_date_raw),
        "guid" => Some(&mut item.guid),
        _ => None,
    }
}

fn root_attributes(e: &BytesStart<'_>, position: u64) -> Result<Vec<(String, String)>, FeedError> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| FeedError::Xml {
            position,
            message: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| FeedError::Xml {
                position,
                message: err.to_string(),
            })?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// Parse a feed document. The document must contain a `channel` element; every
/// `item` that is a direct child of a channel is returned in document order.
pub fn parse_channel(xml: &str) -> Result<Channel, FeedError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut channel = Channel::default();
    let mut saw_channel = false;
    let mut current: Option<ItemBuilder> = None;

    loop {
        let start = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                return Err(FeedError::Xml {
                    position: reader.error_position(),
                    message: err.to_string(),
                })
            }
        };

        match event {
            Event::Start(e) => {
                let name = element_name(&e);
                if stack.is_empty() && name == "rss" {
                    channel.root_attributes = root_attributes(&e, reader.buffer_position())?;
                }
                if name == "channel" {
                    saw_channel = true;
                    // Batches have no channel attributes, so channel-level namespaces move to the root.
                    for (key, value) in root_attributes(&e, reader.buffer_position())? {
                        let declared = channel.root_attributes.iter().any(|(k, _)| *k == key);
                        if key.starts_with("xmlns") && !declared {
                            channel.root_attributes.push((key, value));
                        }
                    }
                }
                let in_channel = stack.last().is_some_and(|parent| parent == "channel");
                stack.push(name);
                if in_channel && stack.last().is_some_and(|n| n == "item") {
                    current = Some(ItemBuilder {
                        start,
                        depth: stack.len(),
                        item: FeedItem::default(),
                    });
                }
            }
            Event::Empty(e) => {
                let name = element_name(&e);
                if name == "channel" {
                    saw_channel = true;
                }
                let in_channel = stack.last().is_some_and(|parent| parent == "channel");
                if in_channel && name == "item" {
                    let end = reader.buffer_position() as usize;
                    channel.items.push(FeedItem {
                        raw_xml: xml[start..end].to_string(),
                        ..FeedItem::default()
                    });
                }
            }
            Event::End(_) => {
                let depth = stack.len();
                stack.pop();
                if let Some(builder) = current.take_if(|b| b.depth == depth) {
                    let end = reader.buffer_position() as usize;
                    let mut item = builder.item;
                    item.raw_xml = xml[builder.start..end].to_string();
                    channel.items.push(item);
                }
            }
            Event::Text(e) => {
                if let Some(builder) = current.as_mut() {
                    if stack.len() == builder.depth + 1 {
                        let text = e.unescape().map_err(|err| FeedError::Xml {
                            position: reader.buffer_position(),
                            message: err.to_string(),
                        })?;
                        if let Some(field) = stack.last().and_then(|n| field_mut(&mut builder.item, n)) {
                            field.push_str(&text);
                        }
                    }
                }
            }
            Event::CData(e) => {
                if let Some(builder) = current.as_mut() {
                    if stack.len() == builder.depth + 1 {
                        let text = String::from_utf8_lossy(&e);
                        if let Some(field) = stack.last().and_then(|n| field_mut(&mut builder.item, n)) {
                            field.push_str(&text);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(FeedError::Unclosed(open));
    }
    if !saw_channel {
        return Err(FeedError::MissingChannel);
    }

    for item in &mut channel.items {
        item.title = item.title.trim().to_string();
        item.link = item.link.trim().to_string();
        item.pub_date_raw = item.pub_date_raw.trim().to_string();
        item.guid = item.guid.trim().to_string();
    }

    Ok(channel)
}

/// Serialize items into a new single-channel RSS document. `root_attributes`
/// are copied onto `<rss>` so prefixed elements inside the items stay bound.
pub fn write_batch<'a>(
    root_attributes: &[(String, String)],
    items: impl IntoIterator<Item = &'a FeedItem>,
) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss");
    for (key, value) in root_attributes {
        out.push_str(&format!(" {}=\"{}\"", key, escape(value.as_str())));
    }
    out.push_str(">\n<channel>\n");
    for item in items {
        out.push_str(&item.raw_xml);
        out.push('\n');
    }
    out.push_str("</channel>\n</rss>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>All jobs</title>
    <item>
      <title><![CDATA[Video editor for YouTube channel]]></title>
      <link>https://example.com/jobs/1</link>
      <description><![CDATA[Cut weekly videos<br /><b>Hourly Range</b>: $20.00-$35.00<br /><b>Country</b>: United States<br />]]></description>
      <content:encoded><![CDATA[<p>Full text</p>]]></content:encoded>
      <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate>
      <guid>https://example.com/jobs/1</guid>
    </item>
    <item>
      <title>Logo &amp; branding</title>
      <link>https://example.com/jobs/2</link>
      <description>&lt;b&gt;Budget&lt;/b&gt;: $300 &lt;br /&gt;</description>
      <pubDate>Tue, 02 Jan 2024 08:30:00 -0500</pubDate>
      <guid>https://example.com/jobs/2</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_pub_date_normalizes_to_utc() {
        let dt = parse_pub_date("Tue, 02 Jan 2024 08:30:00 -0500").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 2, 13, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_pub_date_rejects_other_layouts() {
        assert!(parse_pub_date("2024-01-02T08:30:00Z").is_none());
        assert!(parse_pub_date("").is_none());
        assert!(parse_pub_date("Tue, 02 Jan 2024").is_none());
    }

    #[test]
    fn test_parse_channel_fields() {
        let channel = parse_channel(FEED).unwrap();
        assert_eq!(channel.items.len(), 2);

        let first = &channel.items[0];
        assert_eq!(first.title, "Video editor for YouTube channel");
        assert_eq!(first.link, "https://example.com/jobs/1");
        assert!(first.description.contains("<b>Hourly Range</b>: $20.00-$35.00"));
        assert_eq!(first.content, "<p>Full text</p>");
        assert_eq!(first.guid, "https://example.com/jobs/1");
        assert!(first.raw_xml.starts_with("<item>"));
        assert!(first.raw_xml.ends_with("</item>"));

        let second = &channel.items[1];
        assert_eq!(second.title, "Logo & branding");
        assert_eq!(second.description, "<b>Budget</b>: $300 <br />");
        assert!(second.content.is_empty());
        assert_eq!(
            second.pub_date(),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 13, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_channel_keeps_namespace_declarations() {
        let channel = parse_channel(FEED).unwrap();
        assert!(channel
            .root_attributes
            .iter()
            .any(|(k, v)| k == "xmlns:content" && v == "http://purl.org/rss/1.0/modules/content/"));
    }

    #[test]
    fn test_channel_namespaces_carry_into_batch() {
        let xml = r#"<rss version="2.0"><channel xmlns:content="http://purl.org/rss/1.0/modules/content/" lang="en">
            <item><guid>1</guid><content:encoded>body</content:encoded></item>
        </channel></rss>"#;
        let channel = parse_channel(xml).unwrap();
        assert_eq!(
            channel.root_attributes,
            vec![
                ("version".to_string(), "2.0".to_string()),
                ("xmlns:content".to_string(), "http://purl.org/rss/1.0/modules/content/".to_string()),
            ]
        );

        let batch = write_batch(&channel.root_attributes, &channel.items);
        assert!(batch.contains("<rss version=\"2.0\" xmlns:content=\"http://purl.org/rss/1.0/modules/content/\">"));
        assert_eq!(parse_channel(&batch).unwrap().items[0].content, "body");
    }

    #[test]
    fn test_empty_channel_has_no_items() {
        let channel = parse_channel("<rss><channel><title>x</title></channel></rss>").unwrap();
        assert!(channel.items.is_empty());
    }

    #[test]
    fn test_mismatched_tags_are_rejected() {
        assert!(parse_channel("<rss><channel><item></channel></rss>").is_err());
    }

    #[test]
    fn test_truncated_document_is_rejected() {
        assert!(parse_channel("<rss><channel><item><title>x</title>").is_err());
    }

    #[test]
    fn test_document_without_channel_is_rejected() {
        assert!(matches!(
            parse_channel("<html><body>maintenance</body></html>"),
            Err(FeedError::MissingChannel)
        ));
        assert!(matches!(parse_channel("not xml at all"), Err(FeedError::MissingChannel)));
    }

    #[test]
    fn test_write_batch_reparses_to_same_items() {
        let channel = parse_channel(FEED).unwrap();
        let batch = write_batch(&channel.root_attributes, channel.items.iter().skip(1));
        let reparsed = parse_channel(&batch).unwrap();

        assert_eq!(reparsed.items.len(), 1);
        assert_eq!(reparsed.items[0].raw_xml, channel.items[1].raw_xml);
        assert_eq!(reparsed.items[0].title, "Logo & branding");
        assert!(batch.contains("xmlns:content=\"http://purl.org/rss/1.0/modules/content/\""));
    }
}
