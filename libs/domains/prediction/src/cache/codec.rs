//! Key layout and value encoding shared by every cache backend

use crate::error::CacheError;
use crate::models::{ImageFingerprint, ItemId, ItemMetadata, RankedIdList};

pub fn response_key(fingerprint: &ImageFingerprint) -> String {
    format!("prediction:{fingerprint}")
}

pub fn entity_key(id: ItemId) -> String {
    format!("entity:{id}")
}

/// Comma-joined decimal ids, rank order preserved
pub fn encode_ids(ids: &RankedIdList) -> String {
    ids.ids()
        .iter()
        .map(ItemId::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Any id that fails to parse rejects the whole entry
pub fn decode_ids(raw: &str) -> Result<RankedIdList, CacheError> {
    if raw.trim().is_empty() {
        return Ok(RankedIdList::default());
    }

    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<ItemId>()
                .map_err(|e| CacheError::Codec(format!("bad id {part:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(RankedIdList::new)
}

pub fn encode_entity(item: &ItemMetadata) -> Result<String, CacheError> {
    Ok(serde_json::to_string(item)?)
}

pub fn decode_entity(raw: &str) -> Result<ItemMetadata, CacheError> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let fp = ImageFingerprint::new("d41d8cd98f00b204e9800998ecf8427e").unwrap();
        assert_eq!(response_key(&fp), "prediction:d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(entity_key(-4), "entity:-4");
    }

    #[test]
    fn test_ids_keep_order() {
        let ids = RankedIdList::new(vec![30, 10, 20]);
        let raw = encode_ids(&ids);

        assert_eq!(raw, "30,10,20");
        assert_eq!(decode_ids(&raw).unwrap(), ids);
    }

    #[test]
    fn test_decode_tolerates_whitespace() {
        assert_eq!(decode_ids(" 1, 2 ,3").unwrap().ids(), &[1, 2, 3]);
        assert!(decode_ids("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_id_rejects_entry() {
        assert!(matches!(decode_ids("1,2,x3,4"), Err(CacheError::Codec(_))));
        assert!(matches!(decode_ids("1,,2"), Err(CacheError::Codec(_))));
    }

    #[test]
    fn test_entity_is_flat_camel_case_json() {
        let item = ItemMetadata::placeholder(10).with_title("A");
        let raw = encode_entity(&item).unwrap();

        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["itemId"], 10);
        assert_eq!(json["title"], "A");
        assert!(json.get("rank").is_none());
        assert_eq!(decode_entity(&raw).unwrap(), item);
    }

    #[test]
    fn test_corrupt_entity_is_codec_error() {
        assert!(matches!(decode_entity("{not json"), Err(CacheError::Codec(_))));
    }
}
