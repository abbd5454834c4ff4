fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;

    use uplink_protocol::{
        ApiError, CheckResponse, DuplicateAction, InstantResponse, PollResponse,
        UnitUploadRequest, UnitUploadResponse, parse_response,
    };
    use uplink_transfer::{UnitLayout, decode_bitmap, encode_bitmap};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Reads a captured service reply.
    fn load_fixture(name: &str) -> Vec<u8> {
        let path = fixtures_dir().join(name);
        fs::read(&path).unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Decodes an enveloped fixture into the endpoint's response type.
    fn decode<T: serde::de::DeserializeOwned>(name: &str) -> T {
        parse_response(&load_fixture(name))
            .unwrap_or_else(|e| panic!("failed to decode {name}: {e}"))
    }

    // --- check ---

    #[test]
    fn fixture_check_resumable() {
        let resp: CheckResponse = decode("check_resumable.json");
        assert!(!resp.hash_exists);
        assert!(!resp.file_exists);

        let ru = resp.resumable_upload.expect("resumable descriptor");
        assert!(!ru.all_units_ready);
        assert_eq!(ru.number_of_units.as_u64(), Some(3));
        assert_eq!(ru.upload_key.as_deref(), Some("rk3h2f8b"));

        let units = decode_bitmap(&ru.bitmap, 3).unwrap();
        assert_eq!(units, vec![true, false, true]);

        let layout = UnitLayout::new(10 * 1024 * 1024);
        assert_eq!(layout.count(), 3);
        assert_eq!(
            ru.unit_size.and_then(|s| s.as_u64()),
            Some(layout.unit_size())
        );
        assert_eq!(layout.bytes_for(&units), 6 * 1024 * 1024);
    }

    #[test]
    fn fixture_check_hash_exists() {
        let resp: CheckResponse = decode("check_hash_exists.json");
        assert!(resp.hash_exists);
        assert!(resp.file_exists);
        assert_eq!(resp.duplicate_quickkey.as_deref(), Some("dq7c1o9x"));

        let ru = resp.resumable_upload.expect("resumable descriptor");
        assert!(ru.all_units_ready);
        assert_eq!(ru.upload_key, None, "empty upload key decodes to None");
    }

    #[test]
    fn fixture_check_large_bitmap() {
        let resp: CheckResponse = decode("check_large_bitmap.json");
        let ru = resp.resumable_upload.expect("resumable descriptor");
        let units = decode_bitmap(&ru.bitmap, 40).unwrap();

        let missing: Vec<usize> = units
            .iter()
            .enumerate()
            .filter(|(_, done)| !**done)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(missing, vec![31]);

        let reencoded = encode_bitmap(&units);
        let words: Vec<Option<u64>> = reencoded.words.iter().map(|w| w.as_u64()).collect();
        let original: Vec<Option<u64>> = ru.bitmap.words.iter().map(|w| w.as_u64()).collect();
        assert_eq!(words, original);
    }

    #[test]
    fn fixture_check_numeric_fields() {
        let resp: CheckResponse = decode("check_numeric_fields.json");
        let ru = resp.resumable_upload.expect("resumable descriptor");
        assert_eq!(ru.number_of_units.as_u64(), Some(2));
        assert_eq!(decode_bitmap(&ru.bitmap, 2).unwrap(), vec![false, true]);
    }

    #[test]
    fn fixture_error_envelope() {
        let err = parse_response::<CheckResponse>(&load_fixture("error_session.json")).unwrap_err();
        match err {
            ApiError::Service { code, message } => {
                assert_eq!(code, 105);
                assert!(message.contains("Session Token"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // --- instant ---

    #[test]
    fn fixture_instant() {
        let resp: InstantResponse = decode("instant.json");
        assert_eq!(resp.quickkey.as_deref(), Some("qk5b2m1z"));
    }

    // --- resumable ---

    #[test]
    fn fixture_resumable_accepted() {
        let resp: UnitUploadResponse = decode("resumable_ok.json");
        assert!(resp.doupload.is_ok());
        assert_eq!(resp.doupload.key.as_deref(), Some("uk4x8q2w"));
    }

    #[test]
    fn fixture_resumable_rejected() {
        let resp: UnitUploadResponse = decode("resumable_rejected.json");
        assert!(!resp.doupload.is_ok());
        assert_eq!(resp.doupload.key, None);
    }

    #[test]
    fn unit_upload_request_shape() {
        let path = fixtures_dir().join("unit_upload_request.json");
        let expected: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();

        let req = UnitUploadRequest {
            filename: "holiday.jpg".into(),
            file_size: 10 * 1024 * 1024,
            file_type: "image/jpeg".into(),
            file_hash: "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08".into(),
            unit_id: 1,
            unit_hash: "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae".into(),
            unit_size: 4 * 1024 * 1024,
            folder_key: "myfiles".into(),
            path: Some("photos/2024".into()),
            action_on_duplicate: Some(DuplicateAction::Replace),
        };

        let headers: BTreeMap<String, String> = req
            .headers()
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        let query: BTreeMap<String, String> = req
            .query()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        assert_eq!(serde_json::to_value(&headers).unwrap(), expected["headers"]);
        assert_eq!(serde_json::to_value(&query).unwrap(), expected["query"]);
    }

    // --- poll ---

    #[test]
    fn fixture_poll_pending() {
        let resp: PollResponse = decode("poll_pending.json");
        assert!(resp.doupload.is_ok());
        assert!(!resp.doupload.is_finished());
        assert_eq!(resp.doupload.file_error(), None);
        assert_eq!(resp.doupload.quickkey, None);
    }

    #[test]
    fn fixture_poll_finished() {
        let resp: PollResponse = decode("poll_finished.json");
        assert!(resp.doupload.is_finished());
        assert_eq!(resp.doupload.file_error(), None);
        assert_eq!(resp.doupload.quickkey.as_deref(), Some("qk9t3e6r"));
    }

    #[test]
    fn fixture_poll_file_error() {
        let resp: PollResponse = decode("poll_file_error.json");
        assert!(resp.doupload.is_finished());
        assert_eq!(resp.doupload.file_error(), Some(13));
    }
}
