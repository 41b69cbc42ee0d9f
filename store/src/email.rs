//! Email storage and the paginated, filtered listing over it.

use kvmail_types::{EmailPage, EmailRecord, EmailType, NewEmail, Pagination};
use std::cmp::Reverse;
use tracing::{debug, warn};

use crate::id::IdGenerator;
use crate::traits::RecordStore;
use crate::{Error, Result};

pub const EMAIL_PREFIX: &str = "email:";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Attempts at finding a free key before `store` gives up.
const MAX_ID_ATTEMPTS: usize = 16;

pub fn email_key(millis: u64) -> String {
    format!("{EMAIL_PREFIX}{millis}")
}

/// The creation time embedded in an email id, or 0 when it does not parse.
pub fn id_millis(id: &str) -> u64 {
    id.split_once(':')
        .and_then(|(_, millis)| millis.parse().ok())
        .unwrap_or(0)
}

/// A page request with out-of-range values clamped.
///
/// `page` is at least 1; `page_size` is between 1 and [`MAX_PAGE_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: u32::try_from(page.max(1)).unwrap_or(u32::MAX),
            page_size: u32::try_from(page_size.clamp(1, i64::from(MAX_PAGE_SIZE)))
                .unwrap_or(MAX_PAGE_SIZE),
        }
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.page_size as usize)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailRepository<S> {
    records: S,
    ids: IdGenerator,
}

impl<S: RecordStore> EmailRepository<S> {
    pub fn new(records: S) -> Self {
        Self::with_ids(records, IdGenerator::new())
    }

    pub fn with_ids(records: S, ids: IdGenerator) -> Self {
        Self { records, ids }
    }

    /// Persist `email` under a fresh `email:<millis>` key and return it with its id.
    ///
    /// Keys are written create-only. If another writer already holds the
    /// key, the next free millisecond is tried instead.
    pub async fn store(&self, email: NewEmail) -> Result<EmailRecord> {
        let value = serde_json::to_string(&email)?;
        let mut millis = self.ids.next();

        for _ in 0..MAX_ID_ATTEMPTS {
            let key = email_key(millis);
            if self.records.insert(&key, &value).await? {
                debug!(%key, kind = ?email.kind, "stored email");
                return Ok(email.into_record(key));
            }
            warn!(%key, "email id already taken, trying the next one");
            millis = self.ids.next_at_least(millis + 1);
        }

        Err(Error::IdConflict(email_key(millis)))
    }

    /// One page of stored emails, newest first, optionally restricted to one type.
    ///
    /// Out-of-range `page`/`page_size` values are clamped (see [`PageRequest`]).
    /// A page past the end is empty but still reports the full `total_count`.
    pub async fn list(
        &self,
        page: i64,
        page_size: i64,
        kind: Option<EmailType>,
    ) -> Result<EmailPage> {
        let request = PageRequest::new(page, page_size);
        let mut emails = self.scan().await?;

        emails.sort_by_key(|email| Reverse(id_millis(&email.id)));

        if let Some(kind) = kind {
            emails.retain(|email| kind != EmailType::Unknown && email.kind == Some(kind));
        }

        let total_count = emails.len();
        let total_pages = total_count.div_ceil(request.page_size as usize);

        let emails = emails
            .into_iter()
            .skip(request.offset())
            .take(request.page_size as usize)
            .collect();

        Ok(EmailPage {
            emails,
            pagination: Pagination {
                page: request.page,
                page_size: request.page_size,
                total_count,
                total_pages,
            },
        })
    }

    pub async fn get_by_id(&self, id: &str) -> Result<EmailRecord> {
        if !id.starts_with(EMAIL_PREFIX) {
            return Err(Error::NotFound(id.to_string()));
        }

        match self.records.get(id).await? {
            Some(value) => parse_record(id.to_string(), &value),
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    /// Every stored email, unordered.
    ///
    /// This is a full prefix scan; a secondary index would replace it here
    /// without changing `list`.
    async fn scan(&self) -> Result<Vec<EmailRecord>> {
        let keys = self.records.list(EMAIL_PREFIX).await?;
        let mut emails = Vec::with_capacity(keys.len());

        for key in keys {
            match self.records.get(&key).await? {
                Some(value) => emails.push(parse_record(key, &value)?),
                None => debug!(%key, "email vanished during scan"),
            }
        }

        Ok(emails)
    }
}

fn parse_record(key: String, value: &str) -> Result<EmailRecord> {
    match serde_json::from_str::<NewEmail>(value) {
        Ok(email) => Ok(email.into_record(key)),
        Err(source) => Err(Error::Parse { key, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use proptest::prelude::*;

    fn email(kind: EmailType, subject: &str) -> NewEmail {
        NewEmail::new(kind, "sender@example.com", "me@example.com", subject, "body")
    }

    async fn put_at(store: &MemoryStore, millis: u64, kind: EmailType, subject: &str) {
        let value = serde_json::to_string(&email(kind, subject)).unwrap();
        store.put(&email_key(millis), &value).await.unwrap();
    }

    fn ids(page: &EmailPage) -> Vec<String> {
        page.emails.iter().map(|e| e.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_store_assigns_email_id() {
        let repo = EmailRepository::new(MemoryStore::new());

        let stored = repo.store(email(EmailType::Sent, "hello")).await.unwrap();

        let millis = stored.id.strip_prefix("email:").unwrap();
        assert!(!millis.is_empty());
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(stored.subject, "hello");
        assert_eq!(stored.kind, Some(EmailType::Sent));
    }

    #[tokio::test]
    async fn test_store_in_quick_succession_never_collides() {
        let repo = EmailRepository::new(MemoryStore::new());

        let mut seen = std::collections::HashSet::new();
        for i in 0..50 {
            let stored = repo.store(email(EmailType::Sent, &i.to_string())).await.unwrap();
            assert!(seen.insert(stored.id));
        }

        let page = repo.list(1, 100, None).await.unwrap();
        assert_eq!(page.pagination.total_count, 50);
    }

    #[tokio::test]
    async fn test_store_skips_key_held_by_another_writer() {
        let store = MemoryStore::new();
        let base = 9_000_000_000_000;
        put_at(&store, base + 1, EmailType::Received, "existing").await;

        let repo = EmailRepository::with_ids(store, IdGenerator::starting_after(base));
        let stored = repo.store(email(EmailType::Sent, "new")).await.unwrap();

        assert_eq!(stored.id, email_key(base + 2));
        let existing = repo.get_by_id(&email_key(base + 1)).await.unwrap();
        assert_eq!(existing.subject, "existing");
    }

    #[tokio::test]
    async fn test_filter_received_scenario() {
        let store = MemoryStore::new();
        put_at(&store, 1_700_000_000_001, EmailType::Received, "t1").await;
        put_at(&store, 1_700_000_000_002, EmailType::Sent, "t2").await;
        put_at(&store, 1_700_000_000_003, EmailType::Received, "t3").await;
        let repo = EmailRepository::new(store);

        let page = repo.list(1, 10, Some(EmailType::Received)).await.unwrap();

        assert_eq!(
            ids(&page),
            vec!["email:1700000000003", "email:1700000000001"]
        );
        assert_eq!(page.pagination.total_count, 2);
        assert_eq!(page.pagination.total_pages, 1);
    }

    #[tokio::test]
    async fn test_third_page_of_twenty_five() {
        let store = MemoryStore::new();
        for i in 1..=25 {
            put_at(&store, 1_700_000_000_000 + i, EmailType::Sent, &i.to_string()).await;
        }
        let repo = EmailRepository::new(store);

        let page = repo.list(3, 10, None).await.unwrap();

        assert_eq!(page.emails.len(), 5);
        let subjects: Vec<_> = page.emails.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["5", "4", "3", "2", "1"]);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(page.pagination.total_count, 25);
    }

    #[tokio::test]
    async fn test_page_past_end_is_empty() {
        let store = MemoryStore::new();
        for i in 1..=4 {
            put_at(&store, 1_000 + i, EmailType::Sent, "x").await;
        }
        let repo = EmailRepository::new(store);

        let page = repo.list(7, 2, None).await.unwrap();

        assert!(page.emails.is_empty());
        assert_eq!(page.pagination.page, 7);
        assert_eq!(page.pagination.total_count, 4);
        assert_eq!(page.pagination.total_pages, 2);
    }

    #[tokio::test]
    async fn test_sort_is_numeric_not_lexicographic() {
        let store = MemoryStore::new();
        put_at(&store, 999, EmailType::Sent, "short").await;
        put_at(&store, 1_000, EmailType::Sent, "long").await;
        let repo = EmailRepository::new(store);

        let page = repo.list(1, 10, None).await.unwrap();

        assert_eq!(ids(&page), vec!["email:1000", "email:999"]);
    }

    #[tokio::test]
    async fn test_missing_and_unknown_type_excluded_by_filter() {
        let store = MemoryStore::new();
        store
            .put(
                "email:1",
                r#"{"from":"a","to":"b","subject":"s","text":"t","timestamp":"2024-05-01T12:00:00.000Z"}"#,
            )
            .await
            .unwrap();
        store
            .put(
                "email:2",
                r#"{"from":"a","to":"b","subject":"s","text":"t","type":"draft","timestamp":"2024-05-01T12:00:00.000Z"}"#,
            )
            .await
            .unwrap();
        put_at(&store, 3, EmailType::Sent, "s").await;
        let repo = EmailRepository::new(store);

        let all = repo.list(1, 10, None).await.unwrap();
        assert_eq!(all.pagination.total_count, 3);

        let sent = repo.list(1, 10, Some(EmailType::Sent)).await.unwrap();
        assert_eq!(ids(&sent), vec!["email:3"]);

        let unknown = repo.list(1, 10, Some(EmailType::Unknown)).await.unwrap();
        assert_eq!(unknown.pagination.total_count, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_page_values_are_clamped() {
        let store = MemoryStore::new();
        for i in 1..=3 {
            put_at(&store, i, EmailType::Sent, "x").await;
        }
        let repo = EmailRepository::new(store);

        let page = repo.list(0, 0, None).await.unwrap();
        assert_eq!(page.pagination.page, 1);
        assert_eq!(page.pagination.page_size, 1);
        assert_eq!(ids(&page), vec!["email:3"]);

        let page = repo.list(-5, 1_000, None).await.unwrap();
        assert_eq!(page.pagination.page, 1);
        assert_eq!(page.pagination.page_size, MAX_PAGE_SIZE);
        assert_eq!(page.emails.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let repo = EmailRepository::new(MemoryStore::new());

        let page = repo.list(1, 10, None).await.unwrap();

        assert!(page.emails.is_empty());
        assert_eq!(page.pagination.total_count, 0);
        assert_eq!(page.pagination.total_pages, 0);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let repo = EmailRepository::new(MemoryStore::new());
        let stored = repo
            .store(email(EmailType::Received, "hi").with_html("<p>hi</p>"))
            .await
            .unwrap();

        let first = repo.get_by_id(&stored.id).await.unwrap();
        let second = repo.get_by_id(&stored.id).await.unwrap();

        assert_eq!(first, stored);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let store = MemoryStore::new();
        store.put("session:abc", "{}").await.unwrap();
        let repo = EmailRepository::new(store);

        assert!(matches!(
            repo.get_by_id("email:42").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            repo.get_by_id("session:abc").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_parse_error() {
        let store = MemoryStore::new();
        store.put("email:5", "not json").await.unwrap();
        put_at(&store, 6, EmailType::Sent, "fine").await;
        let repo = EmailRepository::new(store);

        match repo.get_by_id("email:5").await {
            Err(Error::Parse { key, .. }) => assert_eq!(key, "email:5"),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(matches!(
            repo.list(1, 10, None).await,
            Err(Error::Parse { .. })
        ));
    }

    fn kind_strategy() -> impl Strategy<Value = EmailType> {
        prop_oneof![Just(EmailType::Sent), Just(EmailType::Received)]
    }

    fn seeded(kinds: &[EmailType]) -> EmailRepository<MemoryStore> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let store = MemoryStore::new();
        runtime.block_on(async {
            for (i, kind) in kinds.iter().enumerate() {
                put_at(&store, 1_600_000_000_000 + i as u64 * 7, *kind, &i.to_string()).await;
            }
        });
        EmailRepository::new(store)
    }

    fn list_blocking(
        repo: &EmailRepository<MemoryStore>,
        page: i64,
        page_size: i64,
        kind: Option<EmailType>,
    ) -> EmailPage {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(repo.list(page, page_size, kind))
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_consecutive_pages_partition_a_double_page(
            kinds in prop::collection::vec(kind_strategy(), 0..40),
            n in 1i64..15,
        ) {
            let repo = seeded(&kinds);

            let first = list_blocking(&repo, 1, n, None);
            let second = list_blocking(&repo, 2, n, None);
            let double = list_blocking(&repo, 1, 2 * n, None);

            let mut joined = ids(&first);
            joined.extend(ids(&second));
            prop_assert_eq!(joined, ids(&double));
        }

        #[test]
        fn prop_pages_are_newest_first(
            kinds in prop::collection::vec(kind_strategy(), 0..40),
            page in 1i64..5,
            n in 1i64..15,
        ) {
            let repo = seeded(&kinds);
            let listed = list_blocking(&repo, page, n, None);

            for pair in listed.emails.windows(2) {
                prop_assert!(id_millis(&pair[0].id) >= id_millis(&pair[1].id));
            }
        }

        #[test]
        fn prop_filter_matches_and_counts(
            kinds in prop::collection::vec(kind_strategy(), 0..40),
            filter in kind_strategy(),
        ) {
            let repo = seeded(&kinds);
            let listed = list_blocking(&repo, 1, 100, Some(filter));

            prop_assert!(listed.emails.iter().all(|e| e.kind == Some(filter)));
            let expected = kinds.iter().filter(|k| **k == filter).count();
            prop_assert_eq!(listed.pagination.total_count, expected);
            prop_assert_eq!(listed.pagination.total_pages, expected.div_ceil(100));
        }
    }
}
