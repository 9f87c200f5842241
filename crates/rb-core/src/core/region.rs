use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{DatasetItem, RegionId};

static REGION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<region>(.*?)</region>").expect("valid regex"));

/// Payloads containing this stopword describe regions that must never be
/// annotated; matching is case-insensitive on the trimmed payload.
const EXCLUDED_PAYLOAD: &str = "beyaz";

/// One placeholder marker found inside a turn's text.
///
/// Offsets are byte positions of the entire tag (delimiters included) in the
/// exact string that was parsed. A parse on any other string invalidates
/// them. Regions are recomputed on demand and never persisted; only their
/// ids survive in stored boxes, which is why parsing must stay deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRegion {
    pub id: RegionId,
    pub index: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Extract the ordered region list from a text blob.
///
/// Candidates are collected first, then filtered, then numbered, so an
/// excluded payload leaves no gap in the surviving indices. Unterminated or
/// garbled tags simply do not match; an empty result is a valid outcome.
pub fn parse_regions(text: &str) -> Vec<ParsedRegion> {
    // Pass 1: every well-formed tag, with the full match span.
    let candidates: Vec<(usize, usize, &str)> = REGION_TAG
        .captures_iter(text)
        .map(|caps| {
            let whole = caps.get(0).expect("group 0 is the whole match");
            let payload = caps.get(1).expect("pattern has one capture group");
            (whole.start(), whole.end(), payload.as_str())
        })
        .collect();

    // Pass 2: drop excluded payloads, then number the survivors 1-based.
    let mut regions = Vec::new();
    for (start_offset, end_offset, raw) in candidates {
        let payload = strip_quotes(raw.trim());
        if payload.to_lowercase().contains(EXCLUDED_PAYLOAD) {
            continue;
        }

        let index = regions.len() + 1;
        regions.push(ParsedRegion {
            id: RegionId::new(format!("region-{index}")),
            index,
            text: payload.to_owned(),
            start_offset,
            end_offset,
        });
    }

    regions
}

/// Regions for a dataset item: parses the first `gpt` turn, empty when the
/// item has none.
pub fn regions_for_item(item: &DatasetItem) -> Vec<ParsedRegion> {
    match item.gpt_turn() {
        Some(turn) => parse_regions(&turn.value),
        None => Vec::new(),
    }
}

/// Strip one layer of leading/trailing single or double quotes.
fn strip_quotes(value: &str) -> &str {
    let value = value.strip_prefix(['"', '\'']).unwrap_or(value);
    value.strip_suffix(['"', '\'']).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Conversation, ImageId, Role};

    #[test]
    fn test_single_region() {
        let regions = parse_regions("bak: <region>kirmizi kutu</region> burada");

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].id, RegionId::new("region-1"));
        assert_eq!(regions[0].index, 1);
        assert_eq!(regions[0].text, "kirmizi kutu");
        assert_eq!(regions[0].start_offset, 5);
        assert_eq!(regions[0].end_offset, 5 + "<region>kirmizi kutu</region>".len());
    }

    #[test]
    fn test_offsets_cover_entire_tag() {
        let text = "a <region>mavi araba</region> b <region>sari cizgi</region> c";
        let regions = parse_regions(text);

        assert_eq!(regions.len(), 2);
        for region in &regions {
            assert_eq!(
                &text[region.start_offset..region.end_offset],
                format!("<region>{}</region>", region.text)
            );
        }
        assert!(regions[0].start_offset < regions[1].start_offset);
    }

    #[test]
    fn test_excluded_payload_leaves_no_index_gap() {
        let text = "a <region>beyaz</region> b <region>kirmizi kutu</region> c";
        let regions = parse_regions(text);

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].index, 1);
        assert_eq!(regions[0].text, "kirmizi kutu");
    }

    #[test]
    fn test_exclusion_is_case_insensitive_and_substring() {
        let regions = parse_regions(
            "<region>Beyaz duvar</region> <region>acik BEYAZ zemin</region> <region>gri kapi</region>",
        );

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text, "gri kapi");
        assert_eq!(regions[0].id, RegionId::new("region-1"));
    }

    #[test]
    fn test_trims_and_strips_one_quote_layer() {
        let regions = parse_regions("<region> \"mavi araba\" </region> <region>'sari cizgi'</region>");

        assert_eq!(regions[0].text, "mavi araba");
        assert_eq!(regions[1].text, "sari cizgi");
    }

    #[test]
    fn test_multiline_payload() {
        let regions = parse_regions("<region>kirmizi\nkutu</region>");

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text, "kirmizi\nkutu");
    }

    #[test]
    fn test_unterminated_tag_is_ignored() {
        assert!(parse_regions("bak: <region>kirmizi kutu").is_empty());
        assert!(parse_regions("hic tag yok").is_empty());
        assert!(parse_regions("").is_empty());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "a <region>beyaz</region> b <region>kirmizi kutu</region> c <region>mavi</region>";
        assert_eq!(parse_regions(text), parse_regions(text));
    }

    #[test]
    fn test_regions_for_item_uses_first_gpt_turn() {
        let item = DatasetItem {
            id: ImageId::new("img_0001"),
            image: "images/img_0001.jpg".to_owned(),
            conversations: vec![
                Conversation {
                    from: Role::Human,
                    value: "<region>ignored</region>".to_owned(),
                },
                Conversation {
                    from: Role::Gpt,
                    value: "<region>kirmizi kutu</region>".to_owned(),
                },
            ],
        };

        let regions = regions_for_item(&item);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text, "kirmizi kutu");
    }

    #[test]
    fn test_regions_for_item_without_gpt_turn() {
        let item = DatasetItem {
            id: ImageId::new("img_0002"),
            image: "images/img_0002.jpg".to_owned(),
            conversations: vec![Conversation {
                from: Role::Human,
                value: "soru".to_owned(),
            }],
        };

        assert!(regions_for_item(&item).is_empty());
    }
}
