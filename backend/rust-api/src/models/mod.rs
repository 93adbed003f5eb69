pub mod cheating_log;
pub mod coding;
pub mod exam;
pub mod question;
pub mod result;
pub mod sms;
pub mod user;

use mongodb::bson::oid::ObjectId;

/// Hex form of an optional document id; empty before the document is inserted.
pub fn id_hex(id: &Option<ObjectId>) -> String {
    id.map(|oid| oid.to_hex()).unwrap_or_default()
}

// Serde converters for chrono::DateTime <-> mongodb::bson::DateTime
pub(crate) mod bson_datetime_as_chrono {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bson_dt = bson::DateTime::from_millis(date.timestamp_millis());
        bson_dt.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bson_dt = bson::DateTime::deserialize(deserializer)?;
        DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
            .ok_or_else(|| D::Error::custom("timestamp out of range"))
    }
}

pub(crate) mod bson_datetime_as_chrono_option {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let bson_dt = bson::DateTime::from_millis(d.timestamp_millis());
                serializer.serialize_some(&bson_dt)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt_bson_dt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        opt_bson_dt
            .map(|bson_dt| {
                DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
                    .ok_or_else(|| D::Error::custom("timestamp out of range"))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use mongodb::bson::{self, doc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Stamped {
        #[serde(with = "bson_datetime_as_chrono")]
        at: DateTime<Utc>,
        #[serde(default, with = "bson_datetime_as_chrono_option")]
        maybe: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_datetime_is_stored_as_bson_date() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let doc = bson::to_document(&Stamped { at, maybe: None }).unwrap();

        assert!(matches!(doc.get("at"), Some(bson::Bson::DateTime(_))));

        let back: Stamped = bson::from_document(doc).unwrap();
        assert_eq!(back.at, at);
        assert!(back.maybe.is_none());
    }

    #[test]
    fn test_optional_datetime_reads_bson_date() {
        let now = bson::DateTime::now();
        let doc = doc! { "at": now, "maybe": now };
        let parsed: Stamped = bson::from_document(doc).unwrap();
        assert_eq!(parsed.maybe.map(|d| d.timestamp_millis()), Some(now.timestamp_millis()));
    }

    #[test]
    fn test_id_hex() {
        let oid = ObjectId::new();
        assert_eq!(id_hex(&Some(oid)), oid.to_hex());
        assert_eq!(id_hex(&None), "");
    }
}
