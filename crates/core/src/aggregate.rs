use crate::records::{DatasourceResultMap, QueryRecord};

pub const ALL_DATASOURCES_KEY: &str = "[ALL]";

/// Inserts (or replaces) `aggregate_key` with every record of every other
/// bucket, newest first.
///
/// The aggregate bucket is placed last so that iteration still yields the
/// real datasources in response order first. Ties on `time` keep the order
/// in which the buckets were concatenated.
#[must_use]
pub fn aggregate(mut map: DatasourceResultMap, aggregate_key: &str) -> DatasourceResultMap {
    map.shift_remove(aggregate_key);

    let mut merged = map
        .values()
        .flat_map(|records| records.iter().cloned())
        .collect::<Vec<QueryRecord>>();
    merged.sort_by(|a, b| b.time.cmp(&a.time));

    map.insert(aggregate_key.to_string(), merged);
    map
}

#[cfg(test)]
mod tests {
    use super::{aggregate, ALL_DATASOURCES_KEY};
    use crate::records::{DatasourceResultMap, QueryRecord};

    fn times(records: &[QueryRecord]) -> Vec<i64> {
        records.iter().map(|record| record.time).collect()
    }

    fn map_of(entries: &[(&str, &[i64])]) -> DatasourceResultMap {
        entries
            .iter()
            .map(|(name, times)| {
                (
                    (*name).to_string(),
                    times.iter().copied().map(QueryRecord::new).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn merges_two_datasources_newest_first() {
        let map = map_of(&[("db1", &[100]), ("db2", &[200])]);

        let merged = aggregate(map, ALL_DATASOURCES_KEY);

        assert_eq!(times(&merged[ALL_DATASOURCES_KEY]), vec![200, 100]);
        assert_eq!(times(&merged["db1"]), vec![100]);
        assert_eq!(times(&merged["db2"]), vec![200]);
    }

    #[test]
    fn result_does_not_depend_on_key_order() {
        let forward = map_of(&[("a", &[5, 1]), ("b", &[9, 3]), ("c", &[7])]);
        let backward = map_of(&[("c", &[7]), ("b", &[9, 3]), ("a", &[5, 1])]);

        let forward = aggregate(forward, ALL_DATASOURCES_KEY);
        let backward = aggregate(backward, ALL_DATASOURCES_KEY);

        assert_eq!(times(&forward[ALL_DATASOURCES_KEY]), vec![9, 7, 5, 3, 1]);
        assert_eq!(
            times(&forward[ALL_DATASOURCES_KEY]),
            times(&backward[ALL_DATASOURCES_KEY])
        );
    }

    #[test]
    fn aggregate_bucket_is_appended_after_datasources() {
        let map = map_of(&[("db1", &[1]), ("db2", &[2])]);

        let merged = aggregate(map, ALL_DATASOURCES_KEY);

        let keys = merged.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, vec!["db1", "db2", ALL_DATASOURCES_KEY]);
    }

    #[test]
    fn existing_aggregate_entry_is_replaced_not_merged() {
        let map = map_of(&[(ALL_DATASOURCES_KEY, &[999]), ("db1", &[1])]);

        let merged = aggregate(map, ALL_DATASOURCES_KEY);

        assert_eq!(times(&merged[ALL_DATASOURCES_KEY]), vec![1]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn empty_map_gets_an_empty_aggregate_bucket() {
        let merged = aggregate(DatasourceResultMap::new(), ALL_DATASOURCES_KEY);

        assert_eq!(merged.len(), 1);
        assert!(merged[ALL_DATASOURCES_KEY].is_empty());
    }
}
