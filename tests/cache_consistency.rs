//! End-to-end consistency tests for the cached service decorators.
//!
//! A fake system-of-record counts how often each loader runs, so the tests
//! can tell cache hits from fall-throughs without inspecting the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use pinboard::application::pagination::PageRequest;
use pinboard::application::repos::{
    BoardQueryFilter, BoardsService, CreateBoardParams, CreatePinParams, PinQueryFilter,
    PinsService, RepoError, UpdateBoardParams, UpdatePinParams,
};
use pinboard::cache::{
    CacheAside, CacheConfig, CacheKey, CacheStore, CachedBoardsService, CachedPinsService,
    InvalidationCoordinator, InvalidationRegistry, StoreError,
};
use pinboard::domain::entities::{BoardDetails, BoardRecord, PinDetails, PinRecord};
use pinboard::infra::memory::MemoryStore;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeBoards {
    records: Mutex<HashMap<Uuid, BoardRecord>>,
    find_calls: AtomicUsize,
    details_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FakeBoards {
    fn find_count(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    fn details_count(&self) -> usize {
        self.details_calls.load(Ordering::SeqCst)
    }

    fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BoardsService for FakeBoards {
    async fn find_by_id(&self, id: Uuid) -> Result<BoardRecord, RepoError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn find_details(&self, id: Uuid) -> Result<BoardDetails, RepoError> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        let board = self
            .records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)?;
        Ok(BoardDetails {
            board,
            pin_count: 0,
            follower_count: 0,
        })
    }

    async fn list_boards(
        &self,
        filter: &BoardQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<BoardRecord>, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().unwrap();
        let mut matched: Vec<BoardRecord> = records
            .values()
            .filter(|board| filter.owner_id.is_none_or(|owner| board.owner_id == owner))
            .cloned()
            .collect();
        matched.sort_by_key(|board| board.id);
        Ok(matched
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn create_board(&self, params: CreateBoardParams) -> Result<BoardRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let board = BoardRecord {
            id: Uuid::new_v4(),
            owner_id: params.owner_id,
            name: params.name,
            description: params.description,
            created_at: now,
            updated_at: now,
        };
        self.records.lock().unwrap().insert(board.id, board.clone());
        Ok(board)
    }

    async fn update_board(&self, params: UpdateBoardParams) -> Result<BoardRecord, RepoError> {
        let mut records = self.records.lock().unwrap();
        let board = records.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        board.name = params.name;
        board.description = params.description;
        board.updated_at = OffsetDateTime::now_utc();
        Ok(board.clone())
    }

    async fn delete_board(&self, id: Uuid) -> Result<(), RepoError> {
        self.records
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[derive(Default)]
struct FakePins {
    records: Mutex<HashMap<Uuid, PinRecord>>,
    list_calls: AtomicUsize,
}

impl FakePins {
    fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PinsService for FakePins {
    async fn find_by_id(&self, id: Uuid) -> Result<PinRecord, RepoError> {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn find_details(&self, id: Uuid) -> Result<PinDetails, RepoError> {
        let pin = self.find_by_id(id).await?;
        Ok(PinDetails {
            pin,
            comment_count: 0,
            like_count: 0,
        })
    }

    async fn list_pins(
        &self,
        filter: &PinQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<PinRecord>, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().unwrap();
        let mut matched: Vec<PinRecord> = records
            .values()
            .filter(|pin| filter.board_id.is_none_or(|board| pin.board_id == board))
            .filter(|pin| filter.author_id.is_none_or(|author| pin.author_id == author))
            .filter(|pin| {
                filter
                    .hashtag
                    .as_ref()
                    .is_none_or(|tag| pin.hashtags.contains(tag))
            })
            .cloned()
            .collect();
        matched.sort_by_key(|pin| pin.id);
        Ok(matched
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn create_pin(&self, params: CreatePinParams) -> Result<PinRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let pin = PinRecord {
            id: Uuid::new_v4(),
            board_id: params.board_id,
            author_id: params.author_id,
            title: params.title,
            description: params.description,
            hashtags: params.hashtags,
            media_id: params.media_id,
            created_at: now,
            updated_at: now,
        };
        self.records.lock().unwrap().insert(pin.id, pin.clone());
        Ok(pin)
    }

    async fn update_pin(&self, params: UpdatePinParams) -> Result<PinRecord, RepoError> {
        let mut records = self.records.lock().unwrap();
        let pin = records.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        pin.board_id = params.board_id;
        pin.title = params.title;
        pin.description = params.description;
        pin.hashtags = params.hashtags;
        pin.updated_at = OffsetDateTime::now_utc();
        Ok(pin.clone())
    }

    async fn delete_pin(&self, id: Uuid) -> Result<(), RepoError> {
        self.records
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

/// Store stand-in for an outage: every call fails.
struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::unavailable("store offline"))
    }

    async fn set(
        &self,
        _key: &CacheKey,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        Err(StoreError::unavailable("store offline"))
    }

    async fn delete(&self, _keys: &[CacheKey]) -> Result<(), StoreError> {
        Err(StoreError::unavailable("store offline"))
    }
}

// ============================================================================
// Wiring helpers
// ============================================================================

fn wire_boards(inner: Arc<FakeBoards>, store: Arc<dyn CacheStore>) -> CachedBoardsService {
    let config = CacheConfig::default();
    let engine = Arc::new(CacheAside::new(store.clone(), &config));
    let registry = Arc::new(InvalidationRegistry::default());
    let coordinator = Arc::new(InvalidationCoordinator::new(store, registry, &config));
    CachedBoardsService::new(inner, engine, coordinator, &config)
}

fn wire_pins(inner: Arc<FakePins>, store: Arc<dyn CacheStore>) -> CachedPinsService {
    let config = CacheConfig::default();
    let engine = Arc::new(CacheAside::new(store.clone(), &config));
    let registry = Arc::new(InvalidationRegistry::default());
    let coordinator = Arc::new(InvalidationCoordinator::new(store, registry, &config));
    CachedPinsService::new(inner, engine, coordinator, &config)
}

fn owner_filter(owner_id: Uuid) -> BoardQueryFilter {
    BoardQueryFilter {
        owner_id: Some(owner_id),
        ..Default::default()
    }
}

fn board_filter(board_id: Uuid) -> PinQueryFilter {
    PinQueryFilter {
        board_id: Some(board_id),
        ..Default::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn repeated_reads_load_once() {
    let inner = Arc::new(FakeBoards::default());
    let cached = wire_boards(inner.clone(), Arc::new(MemoryStore::with_capacity(64)));

    let board = cached
        .create_board(CreateBoardParams {
            owner_id: Uuid::new_v4(),
            name: "travel".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    // evict the eagerly refreshed entry so the first read is a genuine miss
    let fresh = wire_boards(inner.clone(), Arc::new(MemoryStore::with_capacity(64)));

    let first = fresh.find_by_id(board.id).await.unwrap();
    let second = fresh.find_by_id(board.id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(inner.find_count(), 1);
}

#[tokio::test]
async fn read_right_after_create_is_a_hit() {
    let inner = Arc::new(FakeBoards::default());
    let cached = wire_boards(inner.clone(), Arc::new(MemoryStore::with_capacity(64)));

    let created = cached
        .create_board(CreateBoardParams {
            owner_id: Uuid::new_v4(),
            name: "recipes".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    let found = cached.find_by_id(created.id).await.unwrap();
    assert_eq!(found, created);
    // served from the refreshed entry, never from the system-of-record
    assert_eq!(inner.find_count(), 0);
}

#[tokio::test]
async fn missing_records_are_never_cached() {
    let inner = Arc::new(FakeBoards::default());
    let cached = wire_boards(inner.clone(), Arc::new(MemoryStore::with_capacity(64)));
    let id = Uuid::new_v4();

    assert!(matches!(
        cached.find_by_id(id).await,
        Err(RepoError::NotFound)
    ));
    assert!(matches!(
        cached.find_by_id(id).await,
        Err(RepoError::NotFound)
    ));
    // both reads reached the system-of-record
    assert_eq!(inner.find_count(), 2);
}

#[tokio::test]
async fn update_refreshes_record_and_evicts_details() {
    let inner = Arc::new(FakeBoards::default());
    let cached = wire_boards(inner.clone(), Arc::new(MemoryStore::with_capacity(64)));

    let board = cached
        .create_board(CreateBoardParams {
            owner_id: Uuid::new_v4(),
            name: "before".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    cached.find_details(board.id).await.unwrap();
    assert_eq!(inner.details_count(), 1);

    cached
        .update_board(UpdateBoardParams {
            id: board.id,
            name: "after".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    // basic projection was refreshed in place
    let found = cached.find_by_id(board.id).await.unwrap();
    assert_eq!(found.name, "after");
    assert_eq!(inner.find_count(), 0);

    // derived projection was evicted and reloads
    let details = cached.find_details(board.id).await.unwrap();
    assert_eq!(details.board.name, "after");
    assert_eq!(inner.details_count(), 2);
}

#[tokio::test]
async fn delete_evicts_record_and_owner_pages() {
    let inner = Arc::new(FakeBoards::default());
    let cached = wire_boards(inner.clone(), Arc::new(MemoryStore::with_capacity(64)));
    let owner = Uuid::new_v4();

    let board = cached
        .create_board(CreateBoardParams {
            owner_id: owner,
            name: "short-lived".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    let page = PageRequest::first(10).unwrap();
    let listed = cached.list_boards(&owner_filter(owner), page).await.unwrap();
    assert_eq!(listed.len(), 1);
    cached.list_boards(&owner_filter(owner), page).await.unwrap();
    assert_eq!(inner.list_count(), 1);

    cached.delete_board(board.id).await.unwrap();

    assert!(matches!(
        cached.find_by_id(board.id).await,
        Err(RepoError::NotFound)
    ));
    let listed = cached.list_boards(&owner_filter(owner), page).await.unwrap();
    assert!(listed.is_empty());
    assert_eq!(inner.list_count(), 2);
}

#[tokio::test]
async fn empty_pages_are_never_cached() {
    let inner = Arc::new(FakeBoards::default());
    let cached = wire_boards(inner.clone(), Arc::new(MemoryStore::with_capacity(64)));
    let page = PageRequest::first(10).unwrap();
    let filter = owner_filter(Uuid::new_v4());

    assert!(cached.list_boards(&filter, page).await.unwrap().is_empty());
    assert!(cached.list_boards(&filter, page).await.unwrap().is_empty());
    assert_eq!(inner.list_count(), 2);
}

#[tokio::test]
async fn distinct_windows_are_cached_separately() {
    let inner = Arc::new(FakeBoards::default());
    let cached = wire_boards(inner.clone(), Arc::new(MemoryStore::with_capacity(64)));
    let owner = Uuid::new_v4();

    for n in 0..3 {
        cached
            .create_board(CreateBoardParams {
                owner_id: owner,
                name: format!("board-{n}"),
                description: String::new(),
            })
            .await
            .unwrap();
    }

    let first = cached
        .list_boards(&owner_filter(owner), PageRequest::new(2, 0).unwrap())
        .await
        .unwrap();
    let second = cached
        .list_boards(&owner_filter(owner), PageRequest::new(2, 2).unwrap())
        .await
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert_eq!(inner.list_count(), 2);

    // both windows now hit
    cached
        .list_boards(&owner_filter(owner), PageRequest::new(2, 0).unwrap())
        .await
        .unwrap();
    cached
        .list_boards(&owner_filter(owner), PageRequest::new(2, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(inner.list_count(), 2);
}

#[tokio::test]
async fn store_outage_degrades_to_passthrough() {
    let inner = Arc::new(FakeBoards::default());
    let cached = wire_boards(inner.clone(), Arc::new(FailingStore));

    let board = cached
        .create_board(CreateBoardParams {
            owner_id: Uuid::new_v4(),
            name: "resilient".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    // every read falls through, none fails
    assert_eq!(cached.find_by_id(board.id).await.unwrap(), board);
    assert_eq!(cached.find_by_id(board.id).await.unwrap(), board);
    assert_eq!(inner.find_count(), 2);

    cached
        .update_board(UpdateBoardParams {
            id: board.id,
            name: "still here".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    cached.delete_board(board.id).await.unwrap();
}

#[tokio::test]
async fn disabled_cache_delegates_directly() {
    let inner = Arc::new(FakeBoards::default());
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::with_capacity(64));
    let config = CacheConfig {
        enabled: false,
        ..Default::default()
    };
    let engine = Arc::new(CacheAside::new(store.clone(), &config));
    let registry = Arc::new(InvalidationRegistry::default());
    let coordinator = Arc::new(InvalidationCoordinator::new(store, registry, &config));
    let cached = CachedBoardsService::new(inner.clone(), engine, coordinator, &config);

    let board = cached
        .create_board(CreateBoardParams {
            owner_id: Uuid::new_v4(),
            name: "uncached".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    cached.find_by_id(board.id).await.unwrap();
    cached.find_by_id(board.id).await.unwrap();
    assert_eq!(inner.find_count(), 2);
}

#[tokio::test]
async fn moving_a_pin_evicts_both_board_pages() {
    let inner = Arc::new(FakePins::default());
    let cached = wire_pins(inner.clone(), Arc::new(MemoryStore::with_capacity(64)));
    let (board_a, board_b) = (Uuid::new_v4(), Uuid::new_v4());
    let author = Uuid::new_v4();
    let page = PageRequest::first(10).unwrap();

    let pin = cached
        .create_pin(CreatePinParams {
            board_id: board_a,
            author_id: author,
            title: "sunset".into(),
            description: String::new(),
            hashtags: vec!["golden-hour".into()],
            media_id: None,
        })
        .await
        .unwrap();
    cached
        .create_pin(CreatePinParams {
            board_id: board_b,
            author_id: author,
            title: "sunrise".into(),
            description: String::new(),
            hashtags: vec![],
            media_id: None,
        })
        .await
        .unwrap();

    assert_eq!(
        cached.list_pins(&board_filter(board_a), page).await.unwrap().len(),
        1
    );
    assert_eq!(
        cached.list_pins(&board_filter(board_b), page).await.unwrap().len(),
        1
    );
    assert_eq!(inner.list_count(), 2);

    // move the pin from board A to board B
    cached
        .update_pin(UpdatePinParams {
            id: pin.id,
            board_id: board_b,
            title: pin.title.clone(),
            description: String::new(),
            hashtags: pin.hashtags.clone(),
        })
        .await
        .unwrap();

    // both the vacated and the receiving board's pages reload
    assert!(
        cached
            .list_pins(&board_filter(board_a), page)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        cached.list_pins(&board_filter(board_b), page).await.unwrap().len(),
        2
    );
    assert_eq!(inner.list_count(), 4);
}

#[tokio::test]
async fn moving_an_uncached_pin_still_evicts_the_vacated_board_page() {
    let inner = Arc::new(FakePins::default());
    let cached = wire_pins(inner.clone(), Arc::new(MemoryStore::with_capacity(64)));
    let (board_a, board_b) = (Uuid::new_v4(), Uuid::new_v4());
    let page = PageRequest::first(10).unwrap();

    // Written behind the cache's back, so no projection of it is cached and
    // the pre-update record can only come from the system-of-record.
    let now = OffsetDateTime::now_utc();
    let pin = PinRecord {
        id: Uuid::new_v4(),
        board_id: board_a,
        author_id: Uuid::new_v4(),
        title: "driftwood".into(),
        description: String::new(),
        hashtags: vec![],
        media_id: None,
        created_at: now,
        updated_at: now,
    };
    inner.records.lock().unwrap().insert(pin.id, pin.clone());

    assert_eq!(
        cached.list_pins(&board_filter(board_a), page).await.unwrap().len(),
        1
    );

    cached
        .update_pin(UpdatePinParams {
            id: pin.id,
            board_id: board_b,
            title: pin.title.clone(),
            description: String::new(),
            hashtags: vec![],
        })
        .await
        .unwrap();

    // The vacated board's page must reload empty instead of stale-serving
    // the moved pin.
    assert!(
        cached
            .list_pins(&board_filter(board_a), page)
            .await
            .unwrap()
            .is_empty()
    );
}
