//! Settle concurrent forks of a primitive into one winning document.

use geoweave_core::{Document, PrimitiveStore, StoreError};

/// Pick the winning fork among `forks`.
///
/// Deleted forks are ignored. Among the rest, the greatest by
/// [`Document::cmp_fork`] wins. Returns `None` when nothing survives.
///
/// # Examples
///
/// ```
/// use geoweave_core::{Document, Primitive, VersionToken};
/// use geoweave_data::select_fork;
///
/// let fork = |version: &str, deleted| Document {
///     id: "n1".into(),
///     version: VersionToken::from(version),
///     timestamp: None,
///     deleted,
///     primitive: Primitive::node(0.0, 0.0),
/// };
/// let winner = select_fork([fork("1", false), fork("3", true), fork("2", false)]);
/// assert_eq!(winner.map(|doc| doc.version), Some(VersionToken::from("2")));
/// ```
pub fn select_fork<I>(forks: I) -> Option<Document>
where
    I: IntoIterator<Item = Document>,
{
    forks
        .into_iter()
        .filter(|fork| !fork.deleted)
        .max_by(Document::cmp_fork)
}

/// Read every fork of `id` from `store` and return the winner.
///
/// # Errors
///
/// Propagates store failures.
pub async fn resolve<S>(store: &S, id: &str) -> Result<Option<Document>, StoreError>
where
    S: PrimitiveStore + ?Sized,
{
    let forks = store.get_versions(id).await?;
    let winner = select_fork(forks);
    if winner.is_none() {
        log::debug!("no live fork of {id}");
    }
    Ok(winner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoweave_core::test_support::{FailingStore, MemoryStore};
    use geoweave_core::{Primitive, VersionToken};
    use rstest::rstest;

    fn fork(version: &str, timestamp: Option<u64>, deleted: bool) -> Document {
        Document {
            id: "n1".into(),
            version: VersionToken::from(version),
            timestamp,
            deleted,
            primitive: Primitive::node(0.0, 0.0),
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("build runtime")
            .block_on(future)
    }

    #[rstest]
    #[case::single(vec![fork("1", None, false)], Some("1"))]
    #[case::greater_version(vec![fork("2", None, false), fork("10", None, false)], Some("10"))]
    #[case::newer_timestamp(vec![fork("9", Some(100), false), fork("2", Some(200), false)], Some("2"))]
    #[case::equal_timestamps(vec![fork("4", Some(100), false), fork("7", Some(100), false)], Some("7"))]
    #[case::missing_timestamp(vec![fork("4", Some(900), false), fork("7", None, false)], Some("7"))]
    #[case::deleted_winner_skipped(vec![fork("1", None, false), fork("2", None, true)], Some("1"))]
    #[case::all_deleted(vec![fork("1", None, true)], None)]
    #[case::no_forks(Vec::new(), None)]
    fn picks_winning_fork(#[case] forks: Vec<Document>, #[case] expected: Option<&str>) {
        let winner = select_fork(forks).map(|doc| doc.version);
        assert_eq!(winner, expected.map(VersionToken::from));
    }

    #[rstest]
    fn resolves_concurrent_forks_from_store() {
        let store = MemoryStore::default();
        store.insert_fork("n1", Primitive::node(1.0, 1.0), Some(500));
        let newest = store.insert_fork("n1", Primitive::node(2.0, 2.0), Some(900));
        store.insert_deleted_fork("n1", Primitive::node(3.0, 3.0), Some(1_000));

        let winner = block_on(resolve(&store, "n1")).expect("resolve");
        assert_eq!(winner.map(|doc| doc.version), Some(newest));
    }

    #[rstest]
    fn unknown_ids_resolve_to_nothing() {
        let store = MemoryStore::default();
        assert_eq!(block_on(resolve(&store, "missing")).expect("resolve"), None);
    }

    #[rstest]
    fn store_failures_propagate() {
        let error = block_on(resolve(&FailingStore, "n1")).expect_err("store fails");
        assert!(matches!(error, StoreError::Unavailable { .. }));
    }
}
