use photo_visibility::{
    Actor, Album, AppConfig, Column, Conditions, MemoryRepository, MockAlbumPolicy,
    PUBLIC_PHOTOS_HIDDEN, Photo, PhotoAuthorizer, PhotoRef, Query, disassemble,
};

// --- Test Data Helpers ---

const OWNER: i64 = 9;
const VIEWER: i64 = 7;

fn photo(id: i64, owner: Option<i64>, album: Option<i64>, public: bool) -> Photo {
    Photo {
        id,
        owner_id: owner,
        album_id: album,
        is_public: public,
        title: format!("photo {id}"),
        ..Default::default()
    }
}

fn album(id: i64) -> Album {
    Album {
        id,
        owner_id: Some(OWNER),
        title: format!("album {id}"),
        is_public: false,
    }
}

fn public_exposed() -> AppConfig {
    AppConfig::default().with_setting(PUBLIC_PHOTOS_HIDDEN, "0")
}

/// A store holding albums 5 and 6 and the given photos.
fn store(photos: Vec<Photo>) -> MemoryRepository {
    photos.into_iter().fold(
        MemoryRepository::new().with_album(album(5)).with_album(album(6)),
        |repo, photo| repo.with_photo(photo),
    )
}

// --- Admin bypass ---

#[tokio::test]
async fn test_admin_filter_is_unchanged() {
    let actor = Actor::admin(1);
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([]);
    let repo = store(vec![]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    let query = Query::photos().where_eq(Column::PhotoAlbumId, 5_i64);
    let filtered = auth.apply_visibility_filter(query.clone()).unwrap();

    assert_eq!(filtered, query);
}

#[tokio::test]
async fn test_admin_sees_everything_without_lookups() {
    let actor = Actor::admin(1);
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new_failing();
    let hidden = photo(42, Some(OWNER), Some(5), false);
    let repo = store(vec![hidden.clone()]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    assert!(auth.is_visible(&hidden).await.unwrap());
    assert!(auth.is_visible(42_i64).await.unwrap());
    // Even a photo that does not exist: admins are never asked about.
    assert!(auth.is_visible(4242_i64).await.unwrap());

    assert_eq!(repo.probes(), 0);
    assert_eq!(repo.materialized(), 0);
}

// --- Rules ---

#[tokio::test]
async fn test_owner_always_sees_own_photo() {
    let actor = Actor::user(OWNER);
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([]);
    let own = photo(42, Some(OWNER), Some(5), false);
    let repo = store(vec![own.clone()]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    assert!(auth.is_visible(&own).await.unwrap());
    assert!(auth.is_visible(42_i64).await.unwrap());
}

#[tokio::test]
async fn test_uploader_sees_unsorted_photos() {
    // actor id=7, photo{id=42, owner_id=9, public=false, album_id=null}, can_upload
    let actor = Actor::uploader(VIEWER);
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new_failing();
    let unsorted = photo(42, Some(OWNER), None, false);
    let repo = store(vec![unsorted.clone()]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    // The album policy is never consulted for unsorted photos.
    assert!(auth.is_visible(&unsorted).await.unwrap());
}

#[tokio::test]
async fn test_non_uploader_does_not_see_unsorted_photos() {
    let actor = Actor::user(VIEWER);
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([5]);
    let unsorted = photo(42, Some(OWNER), None, false);
    let repo = store(vec![unsorted.clone()]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    assert!(!auth.is_visible(&unsorted).await.unwrap());
    assert!(!auth.is_visible(42_i64).await.unwrap());
}

#[tokio::test]
async fn test_anonymous_sees_public_photo_in_inaccessible_album() {
    // anonymous, public-hidden disabled, photo{public=true, album_id=5}, album inaccessible
    let actor = Actor::Anonymous;
    let config = public_exposed();
    let albums = MockAlbumPolicy::new([]);
    let public = photo(42, Some(OWNER), Some(5), true);
    let repo = store(vec![public.clone()]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    assert!(auth.is_visible(&public).await.unwrap());
    assert!(auth.is_visible(42_i64).await.unwrap());
}

#[tokio::test]
async fn test_public_flag_ignored_by_default() {
    let actor = Actor::Anonymous;
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([]);
    let public = photo(42, Some(OWNER), Some(5), true);
    let repo = store(vec![public.clone()]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    assert!(!auth.is_visible(&public).await.unwrap());
    assert!(!auth.is_visible(42_i64).await.unwrap());
}

#[tokio::test]
async fn test_accessible_album_grants_visibility() {
    let actor = Actor::Anonymous;
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([5]);
    let inside = photo(1, Some(OWNER), Some(5), false);
    let outside = photo(2, Some(OWNER), Some(6), false);
    let repo = store(vec![inside.clone(), outside.clone()]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    assert!(auth.is_visible(&inside).await.unwrap());
    assert!(!auth.is_visible(&outside).await.unwrap());
    assert!(auth.is_visible(1_i64).await.unwrap());
    assert!(!auth.is_visible(2_i64).await.unwrap());
}

#[tokio::test]
async fn test_missing_photo_is_not_visible() {
    let actor = Actor::uploader(VIEWER);
    let config = public_exposed();
    let albums = MockAlbumPolicy::new([5, 6]);
    let repo = store(vec![]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    assert!(!auth.is_visible(404_i64).await.unwrap());
}

// --- Query filter ---

#[tokio::test]
async fn test_filter_rejects_album_queries() {
    let actor = Actor::user(VIEWER);
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([5]);
    let repo = store(vec![]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    let err = auth.apply_visibility_filter(Query::albums()).unwrap_err();
    assert!(err.is_invalid_input());

    // Admins are rejected just the same.
    let admin = Actor::admin(1);
    let auth = PhotoAuthorizer::new(&admin, &config, &albums, &repo);
    assert!(auth.apply_visibility_filter(Query::albums()).unwrap_err().is_invalid_input());
    assert_eq!(repo.probes(), 0);
}

#[tokio::test]
async fn test_filter_renders_one_nested_group() {
    let actor = Actor::uploader(VIEWER);
    let config = public_exposed();
    let albums = MockAlbumPolicy::new([5]);
    let repo = store(vec![]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    let query = auth
        .apply_visibility_filter(Query::photos().where_eq(Column::PhotoId, 42_i64))
        .unwrap();

    assert_eq!(
        query.where_sql(),
        "WHERE photos.id = $1 AND (\
         EXISTS (SELECT 1 FROM albums WHERE albums.id = photos.album_id AND (albums.id IN ($2))) \
         OR photos.owner_id = $3 \
         OR photos.album_id IS NULL \
         OR photos.is_public = $4)"
    );
}

#[tokio::test]
async fn test_filter_omits_clauses_that_cannot_hold() {
    let actor = Actor::Anonymous;
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([5]);
    let repo = store(vec![]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    let query = auth.apply_visibility_filter(Query::photos()).unwrap();

    assert_eq!(
        query.where_sql(),
        "WHERE (EXISTS (SELECT 1 FROM albums WHERE albums.id = photos.album_id AND (albums.id IN ($1))))"
    );
}

#[tokio::test]
async fn test_filter_keeps_caller_or_clause_intact() {
    // The caller asks for "photos of owner 9 OR public photos". Visibility must
    // narrow that set, not widen it with its own OR terms.
    let actor = Actor::uploader(VIEWER);
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([]);
    let repo = store(vec![
        photo(1, Some(OWNER), Some(5), false),
        photo(2, Some(3), Some(6), true),
        photo(3, Some(VIEWER), Some(6), false),
        photo(4, Some(3), None, false),
    ]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    let query = Query::photos()
        .where_eq(Column::PhotoOwnerId, OWNER)
        .or_where_eq(Column::PhotoIsPublic, true);

    let sql = auth.apply_visibility_filter(query.clone()).unwrap().where_sql();
    assert!(sql.starts_with("WHERE (photos.owner_id = $1 OR photos.is_public = $2) AND ("));

    let visible = auth.visible_photos(query).await.unwrap();

    // Photo 3 (own) and photo 4 (unsorted) are visible but do not match the
    // caller's conditions; photos 1 and 2 match but are not visible.
    assert!(visible.is_empty());
}

#[tokio::test]
async fn test_visible_photos_and_count() {
    let actor = Actor::user(VIEWER);
    let config = public_exposed();
    let albums = MockAlbumPolicy::new([5]);
    let repo = store(vec![
        photo(1, Some(OWNER), Some(5), false),
        photo(2, Some(OWNER), Some(6), false),
        photo(3, Some(VIEWER), Some(6), false),
        photo(4, Some(OWNER), None, true),
        photo(5, Some(OWNER), None, false),
    ]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    let query = Query::photos().order_by(Column::PhotoId, photo_visibility::Order::Desc);
    let ids: Vec<i64> = auth
        .visible_photos(query.clone())
        .await
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();

    assert_eq!(ids, vec![4, 3, 1]);
    assert_eq!(auth.count_visible(query).await.unwrap(), 3);
}

// --- Zero hydration ---

#[tokio::test]
async fn test_by_id_never_materializes_a_photo() {
    let actor = Actor::user(VIEWER);
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([5]);
    let repo = store(vec![photo(42, Some(OWNER), Some(5), false)]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    assert!(auth.is_visible(42_i64).await.unwrap());

    assert_eq!(repo.probes(), 1);
    assert_eq!(repo.materialized(), 0);
    // Album accessibility went into the query, not through lookups.
    assert_eq!(albums.lookups_by_id() + albums.lookups_by_entity(), 0);
}

#[tokio::test]
async fn test_by_entity_never_queries_the_store() {
    let actor = Actor::user(VIEWER);
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([5]);
    let loaded = photo(42, Some(OWNER), Some(5), false);
    let repo = store(vec![loaded.clone()]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    assert!(auth.is_visible(&loaded).await.unwrap());

    assert_eq!(repo.probes(), 0);
    assert_eq!(repo.materialized(), 0);
}

#[tokio::test]
async fn test_unresolved_album_is_passed_by_id() {
    let actor = Actor::Anonymous;
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([5]);
    let repo = store(vec![]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    let unresolved = photo(42, Some(OWNER), Some(5), false);
    assert!(auth.is_visible(&unresolved).await.unwrap());
    assert_eq!(albums.lookups_by_id(), 1);
    assert_eq!(albums.lookups_by_entity(), 0);

    let resolved = unresolved.clone().with_album(Some(album(5)));
    assert!(auth.is_visible(&resolved).await.unwrap());
    assert_eq!(albums.lookups_by_id(), 1);
    assert_eq!(albums.lookups_by_entity(), 1);
}

#[tokio::test]
async fn test_resolved_absence_wins_over_album_id() {
    // The relation was loaded and came back empty: treat the photo as
    // unsorted and do not ask the album policy about album_id.
    let actor = Actor::uploader(VIEWER);
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new([]);
    let repo = store(vec![]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    let orphan = photo(42, Some(OWNER), Some(5), false).with_album(None);
    assert!(auth.is_visible(&orphan).await.unwrap());
    assert_eq!(albums.lookups_by_id() + albums.lookups_by_entity(), 0);
}

// --- Errors ---

#[tokio::test]
async fn test_album_policy_errors_propagate() {
    let actor = Actor::Anonymous;
    let config = AppConfig::default();
    let albums = MockAlbumPolicy::new_failing();
    let repo = store(vec![photo(42, Some(OWNER), Some(5), false)]);
    let auth = PhotoAuthorizer::new(&actor, &config, &albums, &repo);

    let loaded = photo(42, Some(OWNER), Some(5), false);
    assert!(matches!(
        auth.is_visible(&loaded).await,
        Err(photo_visibility::Error::Collaborator { .. })
    ));
    assert!(matches!(
        auth.is_visible(42_i64).await,
        Err(photo_visibility::Error::Collaborator { .. })
    ));
}

// --- Shape normalization ---

#[test]
fn test_disassemble() {
    let loaded = photo(42, None, None, false);

    let (id, entity) = disassemble(PhotoRef::ById(7));
    assert_eq!(id, 7);
    assert!(entity.is_none());

    let (id, entity) = disassemble(PhotoRef::from(&loaded));
    assert_eq!(id, 42);
    assert_eq!(entity, Some(&loaded));
}
