//! Read models composed over a populated in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::DocumentId;
use doc_store::{
    Cascade, Changes, Document, DocumentStore, Filter, InMemoryDocumentStore, Pipeline, Toggled,
    WriteOptions, id_value,
};
use domain::{
    AccountService, CommentService, InMemoryAssetHost, LikeService, LikeTarget, PasswordHasher,
    PlaylistService, PublishVideo, RegisterAccount, SubscriptionService, TokenPolicy,
    VideoService,
};
use read_model::{
    ChannelsView, CommentsView, LikesView, ListVideos, PageRequest, PlaylistsView,
    ReadModelError, SubscriptionsView, VideosView,
};
use serde_json::{Value, json};

struct TestHasher;

impl PasswordHasher for TestHasher {
    fn hash(&self, password: &str) -> domain::Result<String> {
        Ok(format!("hashed:{password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        hash == format!("hashed:{password}")
    }
}

/// Store wrapper counting every call that reaches storage.
#[derive(Clone, Default)]
struct CountingStore {
    inner: InMemoryDocumentStore,
    calls: Arc<AtomicUsize>,
}

impl CountingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn insert(
        &self,
        collection: &str,
        doc: Document,
        options: WriteOptions,
    ) -> doc_store::Result<Document> {
        self.hit();
        self.inner.insert(collection, doc, options).await
    }

    async fn find(&self, collection: &str, filter: &Filter) -> doc_store::Result<Vec<Document>> {
        self.hit();
        self.inner.find(collection, filter).await
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: DocumentId,
    ) -> doc_store::Result<Option<Document>> {
        self.hit();
        self.inner.find_by_id(collection, id).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> doc_store::Result<u64> {
        self.hit();
        self.inner.count(collection, filter).await
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: DocumentId,
        changes: &Changes,
        options: WriteOptions,
    ) -> doc_store::Result<Option<Document>> {
        self.hit();
        self.inner.update_by_id(collection, id, changes, options).await
    }

    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> doc_store::Result<bool> {
        self.hit();
        self.inner.delete_by_id(collection, id).await
    }

    async fn delete_cascade(
        &self,
        collection: &str,
        id: DocumentId,
        rules: &[Cascade],
    ) -> doc_store::Result<bool> {
        self.hit();
        self.inner.delete_cascade(collection, id, rules).await
    }

    async fn toggle(&self, collection: &str, key: &Filter) -> doc_store::Result<Toggled> {
        self.hit();
        self.inner.toggle(collection, key).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
    ) -> doc_store::Result<Vec<Document>> {
        self.hit();
        self.inner.aggregate(collection, pipeline).await
    }
}

struct World {
    store: InMemoryDocumentStore,
    accounts: AccountService<InMemoryDocumentStore>,
    videos: VideoService<InMemoryDocumentStore>,
    comments: CommentService<InMemoryDocumentStore>,
    likes: LikeService<InMemoryDocumentStore>,
    subscriptions: SubscriptionService<InMemoryDocumentStore>,
    playlists: PlaylistService<InMemoryDocumentStore>,
}

impl World {
    fn new() -> Self {
        let store = InMemoryDocumentStore::new();
        let assets = Arc::new(InMemoryAssetHost::new());
        Self {
            accounts: AccountService::new(
                store.clone(),
                assets.clone(),
                Arc::new(TestHasher),
                TokenPolicy::default(),
            ),
            videos: VideoService::new(store.clone(), assets),
            comments: CommentService::new(store.clone()),
            likes: LikeService::new(store.clone()),
            subscriptions: SubscriptionService::new(store.clone()),
            playlists: PlaylistService::new(store.clone()),
            store,
        }
    }

    async fn register(&self, username: &str) -> DocumentId {
        self.accounts
            .register(RegisterAccount {
                fullname: format!("{username} fullname"),
                email: format!("{username}@example.com"),
                username: username.into(),
                password: "secret".into(),
                avatar_path: Some(format!("/staged/{username}.png")),
                cover_image_path: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn publish(&self, owner: DocumentId, title: &str) -> DocumentId {
        let id = self
            .videos
            .publish(
                owner,
                PublishVideo {
                    title: title.into(),
                    description: format!("about {title}"),
                    video_file_path: "/staged/clip.mp4".into(),
                    thumbnail_path: format!("/staged/{title}.jpg"),
                },
            )
            .await
            .unwrap()
            .id;
        settle().await;
        id
    }

    async fn comment(&self, owner: DocumentId, video: DocumentId, content: &str) -> DocumentId {
        let id = self.comments.add(owner, video, content).await.unwrap().id;
        settle().await;
        id
    }
}

/// Keeps creation timestamps of consecutive writes distinct.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}

fn ids(docs: &[Document]) -> Vec<Value> {
    docs.iter().map(|d| d.get("_id").cloned().unwrap_or(Value::Null)).collect()
}

fn titles(docs: &[Document]) -> Vec<String> {
    docs.iter()
        .map(|d| d.get("title").and_then(Value::as_str).unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn malformed_identifiers_never_reach_storage() {
    let store = CountingStore::default();

    let err = CommentsView::new(store.clone())
        .video_comments("42", None, PageRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ReadModelError::Validation(ref m) if m == "Invalid videoId"));

    let err = VideosView::new(store.clone())
        .video_detail("not-an-id", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReadModelError::Validation(_)));

    let err = VideosView::new(store.clone())
        .list_videos(ListVideos {
            owner_id: Some("bogus".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ReadModelError::Validation(ref m) if m == "Invalid userId"));

    let err = PlaylistsView::new(store.clone())
        .playlist_detail("")
        .await
        .unwrap_err();
    assert!(matches!(err, ReadModelError::Validation(_)));

    let err = SubscriptionsView::new(store.clone())
        .channel_subscribers("xyz", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReadModelError::Validation(_)));

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn comments_page_newest_first_with_metadata() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;
    let video = world.publish(alice, "intro").await;

    world.comment(bob, video, "first").await;
    world.comment(bob, video, "second").await;

    let view = CommentsView::new(world.store.clone());
    let page = view
        .video_comments(&video.to_string(), None, PageRequest::new(1, 1))
        .await
        .unwrap();

    assert_eq!(page.total_items, 2);
    assert_eq!(page.total_pages, 2);
    assert!(page.has_next);
    assert!(!page.has_prev);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].get("content"), Some(&json!("second")));
    assert_eq!(page.items[0].get_path("ownerDetails.username"), Some(&json!("bob")));

    let second = view
        .video_comments(&video.to_string(), None, PageRequest::new(2, 1))
        .await
        .unwrap();
    assert_eq!(second.items[0].get("content"), Some(&json!("first")));
    assert!(!second.has_next);

    let past_end = view
        .video_comments(&video.to_string(), None, PageRequest::new(5, 1))
        .await
        .unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.total_items, 2);
}

#[tokio::test]
async fn comment_like_statistics_depend_on_viewer() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;
    let carol = world.register("carol").await;
    let video = world.publish(alice, "intro").await;
    let comment = world.comment(bob, video, "nice").await;

    world.likes.toggle(carol, LikeTarget::Comment(comment)).await.unwrap();
    world.likes.toggle(alice, LikeTarget::Comment(comment)).await.unwrap();

    let view = CommentsView::new(world.store.clone());
    let as_carol = view
        .video_comments(&video.to_string(), Some(carol), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(as_carol.items[0].get("totalLikes"), Some(&json!(2)));
    assert_eq!(as_carol.items[0].get("likedByMe"), Some(&json!(true)));

    let as_bob = view
        .video_comments(&video.to_string(), Some(bob), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(as_bob.items[0].get("likedByMe"), Some(&json!(false)));

    let anonymous = view
        .video_comments(&video.to_string(), None, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(anonymous.items[0].get("likedByMe"), Some(&json!(false)));
}

#[tokio::test]
async fn comments_on_missing_video_are_not_found() {
    let world = World::new();
    let err = CommentsView::new(world.store.clone())
        .video_comments(&DocumentId::new().to_string(), None, PageRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ReadModelError::NotFound { entity: "Video" }));
}

#[tokio::test]
async fn consecutive_pages_cover_the_whole_listing() {
    let world = World::new();
    let alice = world.register("alice").await;
    for n in 0..7 {
        world.publish(alice, &format!("clip {n}")).await;
    }

    let view = VideosView::new(world.store.clone());
    let everything = view
        .list_videos(ListVideos {
            page: PageRequest::new(1, 100),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(everything.total_items, 7);

    let mut collected = Vec::new();
    for page in 1..=3 {
        let window = view
            .list_videos(ListVideos {
                page: PageRequest::new(page, 3),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(window.total_pages, 3);
        collected.extend(ids(&window.items));
    }
    assert_eq!(collected, ids(&everything.items));
    assert_eq!(titles(&everything.items)[0], "clip 6");
}

#[tokio::test]
async fn listing_filters_searches_and_sorts() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;
    world.publish(alice, "Rust Basics").await;
    world.publish(alice, "advanced rust").await;
    let hidden = world.publish(alice, "rust secrets").await;
    world.publish(bob, "Cooking").await;
    world.videos.toggle_publish(alice, hidden).await.unwrap();

    let view = VideosView::new(world.store.clone());

    let search = view
        .list_videos(ListVideos {
            query: Some("RUST".into()),
            sort_by: Some("title".into()),
            sort_type: Some("asc".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(titles(&search.items), vec!["Rust Basics", "advanced rust"]);
    assert_eq!(search.items[0].get_path("ownerDetails.username"), Some(&json!("alice")));
    assert!(search.items[0].get("videoFileUrl").is_some());
    assert!(search.items[0].get("owner").is_none());

    let bobs = view
        .list_videos(ListVideos {
            owner_id: Some(bob.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(titles(&bobs.items), vec!["Cooking"]);

    let unknown_sort = view
        .list_videos(ListVideos {
            sort_by: Some("password".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(titles(&unknown_sort.items)[0], "Cooking");
}

#[tokio::test]
async fn video_detail_reports_likes_and_channel() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;
    let video = world.publish(alice, "intro").await;
    world.likes.toggle(bob, LikeTarget::Video(video)).await.unwrap();
    world.subscriptions.toggle(bob, alice).await.unwrap();

    let view = VideosView::new(world.store.clone());
    let detail = view.video_detail(&video.to_string(), Some(bob)).await.unwrap();

    assert_eq!(detail.get("totalLikes"), Some(&json!(1)));
    assert_eq!(detail.get("likedByMe"), Some(&json!(true)));
    assert_eq!(detail.get_path("ownerDetails._id"), Some(&id_value(alice)));
    assert_eq!(detail.get_path("ownerDetails.subscriberCount"), Some(&json!(1)));
    assert_eq!(
        detail.get_path("ownerDetails.isSubscribedByCaller"),
        Some(&json!(true))
    );

    let anonymous = view.video_detail(&video.to_string(), None).await.unwrap();
    assert_eq!(anonymous.get("likedByMe"), Some(&json!(false)));
    assert_eq!(
        anonymous.get_path("ownerDetails.isSubscribedByCaller"),
        Some(&json!(false))
    );
}

#[tokio::test]
async fn unpublished_video_is_visible_to_its_owner_only() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;
    let video = world.publish(alice, "draft").await;
    world.videos.toggle_publish(alice, video).await.unwrap();

    let view = VideosView::new(world.store.clone());
    assert!(view.video_detail(&video.to_string(), Some(alice)).await.is_ok());

    let err = view.video_detail(&video.to_string(), Some(bob)).await.unwrap_err();
    assert!(matches!(err, ReadModelError::NotFound { entity: "Video" }));
}

#[tokio::test]
async fn liked_videos_skip_unpublished_ones() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;
    let kept = world.publish(alice, "kept").await;
    let hidden = world.publish(alice, "hidden").await;

    world.likes.toggle(bob, LikeTarget::Video(kept)).await.unwrap();
    world.likes.toggle(bob, LikeTarget::Video(hidden)).await.unwrap();
    world.videos.toggle_publish(alice, hidden).await.unwrap();

    let liked = LikesView::new(world.store.clone()).liked_videos(bob).await.unwrap();
    assert_eq!(titles(&liked), vec!["kept"]);
    assert_eq!(liked[0].get("_id"), Some(&id_value(kept)));
    assert_eq!(liked[0].get_path("ownerDetails.username"), Some(&json!("alice")));
}

#[tokio::test]
async fn subscription_listings_in_both_directions() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;
    let carol = world.register("carol").await;
    world.publish(alice, "older").await;
    world.publish(alice, "newer").await;

    world.subscriptions.toggle(bob, alice).await.unwrap();
    world.subscriptions.toggle(carol, alice).await.unwrap();
    world.subscriptions.toggle(carol, bob).await.unwrap();

    let view = SubscriptionsView::new(world.store.clone());

    let subscribers = view
        .channel_subscribers(&alice.to_string(), Some(carol))
        .await
        .unwrap();
    assert_eq!(subscribers.len(), 2);
    let bob_row = subscribers
        .iter()
        .find(|row| row.get("username") == Some(&json!("bob")))
        .unwrap();
    assert_eq!(bob_row.get("subscriberCount"), Some(&json!(1)));
    assert_eq!(bob_row.get("isSubscribedByCaller"), Some(&json!(true)));

    let channels = view.subscribed_channels(&bob.to_string()).await.unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].get("username"), Some(&json!("alice")));
    assert_eq!(channels[0].get("totalVideos"), Some(&json!(2)));
    assert_eq!(channels[0].get_path("latestVideo.title"), Some(&json!("newer")));

    let carols = view.subscribed_channels(&carol.to_string()).await.unwrap();
    let bob_channel = carols
        .iter()
        .find(|row| row.get("username") == Some(&json!("bob")))
        .unwrap();
    assert_eq!(bob_channel.get("totalVideos"), Some(&json!(0)));
    assert_eq!(bob_channel.get("latestVideo"), Some(&Value::Null));
}

#[tokio::test]
async fn channel_profile_counts_both_directions() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;
    world.subscriptions.toggle(bob, alice).await.unwrap();
    world.subscriptions.toggle(alice, bob).await.unwrap();

    let view = ChannelsView::new(world.store.clone());
    let profile = view.channel_profile("ALICE", Some(bob)).await.unwrap();

    assert_eq!(profile.get("fullname"), Some(&json!("alice fullname")));
    assert_eq!(profile.get("subscriberCount"), Some(&json!(1)));
    assert_eq!(profile.get("subscribedToCount"), Some(&json!(1)));
    assert_eq!(profile.get("isSubscribedByCaller"), Some(&json!(true)));
    assert!(profile.get("email").is_none());
    assert!(profile.get("password").is_none());

    let err = view.channel_profile("   ", None).await.unwrap_err();
    assert!(matches!(err, ReadModelError::Validation(ref m) if m == "Username is missing"));

    let err = view.channel_profile("nobody", None).await.unwrap_err();
    assert!(matches!(err, ReadModelError::NotFound { entity: "Channel" }));
}

#[tokio::test]
async fn watch_history_is_most_recent_first() {
    let world = World::new();
    let alice = world.register("alice").await;
    let bob = world.register("bob").await;
    let first = world.publish(alice, "first").await;
    let second = world.publish(alice, "second").await;

    world.videos.record_view(first, Some(bob)).await.unwrap();
    world.videos.record_view(second, Some(bob)).await.unwrap();
    world.videos.record_view(first, Some(bob)).await.unwrap();

    let history = ChannelsView::new(world.store.clone())
        .watch_history(bob)
        .await
        .unwrap();
    assert_eq!(titles(&history), vec!["first", "second"]);
    assert_eq!(history[0].get("views"), Some(&json!(2)));
    assert_eq!(history[0].get_path("ownerDetails.username"), Some(&json!("alice")));

    let empty = ChannelsView::new(world.store.clone())
        .watch_history(alice)
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn playlists_count_published_videos_only() {
    let world = World::new();
    let alice = world.register("alice").await;
    let older = world.publish(alice, "older").await;
    let newer = world.publish(alice, "newer").await;
    let draft = world.publish(alice, "draft").await;
    world.videos.toggle_publish(alice, draft).await.unwrap();

    let playlist = world
        .playlists
        .create(alice, "favourites", Some("best of"))
        .await
        .unwrap()
        .id;
    for video in [older, newer, draft] {
        world.playlists.add_video(alice, playlist, video).await.unwrap();
    }

    let view = PlaylistsView::new(world.store.clone());

    let listing = view.user_playlists(&alice.to_string()).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].get("totalVideos"), Some(&json!(2)));
    let cover = listing[0]
        .get("coverThumbnailUrl")
        .and_then(Value::as_str)
        .unwrap();
    assert!(cover.contains("newer"));

    let detail = view.playlist_detail(&playlist.to_string()).await.unwrap();
    assert_eq!(detail.get("name"), Some(&json!("favourites")));
    assert_eq!(detail.get("totalVideos"), Some(&json!(2)));
    assert_eq!(detail.get_path("owner.username"), Some(&json!("alice")));
    let videos = detail.get("videos").and_then(Value::as_array).unwrap();
    let listed: Vec<&Value> = videos.iter().filter_map(|v| v.get("title")).collect();
    assert_eq!(listed, vec![&json!("newer"), &json!("older")]);

    let err = view
        .user_playlists(&DocumentId::new().to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ReadModelError::NotFound { entity: "User" }));
}
