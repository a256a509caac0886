//! Property-based checks of pipeline invariants

#[cfg(test)]
mod tests {
    use arcveil_core::{
        apply_filters, query_archives, ArchiveStore, MemoryArchiveStore, QueryRequest,
    };
    use proptest::prelude::*;
    use serde_json::json;

    const DAY: i64 = 1_705_276_800; // 2024-01-15T00:00:00Z

    fn store_with(n: usize) -> MemoryArchiveStore {
        let store = MemoryArchiveStore::new();
        for i in 0..n {
            store.append(
                "archive:2024-01-15",
                json!({"id": i, "timestamp": DAY}).to_string(),
            );
        }
        store
    }

    proptest! {
        #[test]
        fn pagination_invariant(
            records in 0usize..60,
            limit in 0usize..80,
            offset in 0usize..80,
        ) {
            let store = store_with(records);
            let req = QueryRequest {
                time_range: serde_json::from_value(json!({"start": DAY, "end": DAY})).unwrap(),
                limit,
                offset,
                ..Default::default()
            };
            let res = query_archives(&store, &req).unwrap();
            prop_assert_eq!(res.count, records);
            // len(data) == min(limit, max(0, count - offset))
            let expected = limit.min(res.count.saturating_sub(offset));
            prop_assert_eq!(res.data.unwrap().len(), expected);
        }

        #[test]
        fn filter_conjunction_on_range(age in -100i64..200) {
            let records = vec![match json!({"age": age}) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            }];
            let spec = serde_json::from_value(
                json!({"field_rules": {"age": {"range": {"min": 18, "max": 65}}}}),
            )
            .unwrap();
            let res = apply_filters(&records, &spec).unwrap();
            let kept = (18..=65).contains(&age);
            prop_assert_eq!(res.count, usize::from(kept));
        }

        #[test]
        fn projection_never_invents_fields(include in proptest::collection::vec("[a-c]", 0..4)) {
            let records = vec![match json!({"a": 1, "b": 2}) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            }];
            let spec = serde_json::from_value(json!({"include_fields": include})).unwrap();
            let res = apply_filters(&records, &spec).unwrap();
            for record in &res.filtered_data {
                for key in record.keys() {
                    prop_assert!(key == "a" || key == "b");
                }
            }
        }
    }
}
