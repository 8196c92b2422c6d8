use common::DocumentId;
use criterion::{Criterion, criterion_group, criterion_main};
use doc_store::{Document, DocumentStore, InMemoryDocumentStore, WriteOptions, id_value};
use domain::collections;
use read_model::{CommentsView, ListVideos, PageRequest, VideosView};
use serde_json::{Value, json};

async fn insert(store: &InMemoryDocumentStore, collection: &str, body: Value) -> Value {
    let doc = store
        .insert(collection, Document::from_value(body).unwrap(), WriteOptions::new())
        .await
        .unwrap();
    doc.get("_id").unwrap().clone()
}

/// 20 accounts, 50 videos, 200 comments on the first video and 5 likes on
/// each comment.
fn populated_store(rt: &tokio::runtime::Runtime) -> (InMemoryDocumentStore, DocumentId, DocumentId) {
    let store = InMemoryDocumentStore::new();
    let viewer = DocumentId::new();
    let first_video = DocumentId::new();

    rt.block_on(async {
        let mut accounts = vec![id_value(viewer)];
        insert(
            &store,
            collections::ACCOUNTS,
            json!({"_id": id_value(viewer), "username": "viewer", "avatar": {"url": "memory://a/viewer.png"}}),
        )
        .await;
        for n in 1..20 {
            accounts.push(
                insert(
                    &store,
                    collections::ACCOUNTS,
                    json!({"username": format!("user{n}"), "avatar": {"url": format!("memory://a/{n}.png")}}),
                )
                .await,
            );
        }

        for n in 0..50 {
            let mut body = json!({
                "owner": accounts[n % accounts.len()],
                "title": format!("video {n}"),
                "description": "bench",
                "duration": 60.0,
                "views": n,
                "isPublished": n % 5 != 0,
                "videoFile": {"url": format!("memory://v/{n}.mp4")},
                "thumbnail": {"url": format!("memory://t/{n}.jpg")},
            });
            if n == 0 {
                body["_id"] = id_value(first_video);
                body["isPublished"] = json!(true);
            }
            insert(&store, collections::VIDEOS, body).await;
        }

        for n in 0..200 {
            let comment = insert(
                &store,
                collections::COMMENTS,
                json!({
                    "content": format!("comment {n}"),
                    "video": id_value(first_video),
                    "owner": accounts[n % accounts.len()],
                }),
            )
            .await;
            for liker in accounts.iter().skip(n % 3).take(5) {
                insert(
                    &store,
                    collections::LIKES,
                    json!({"comment": comment.clone(), "likedBy": liker}),
                )
                .await;
            }
        }
    });

    (store, first_video, viewer)
}

fn bench_comment_page(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, video, viewer) = populated_store(&rt);
    let view = CommentsView::new(store);
    let video = video.to_string();

    c.bench_function("read_model/comments_page_3_of_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                view.video_comments(&video, Some(viewer), PageRequest::new(3, 20))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_video_listing(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, _, _) = populated_store(&rt);
    let view = VideosView::new(store);

    c.bench_function("read_model/list_videos_sorted_by_views", |b| {
        b.iter(|| {
            rt.block_on(async {
                view.list_videos(ListVideos {
                    sort_by: Some("views".into()),
                    page: PageRequest::new(2, 10),
                    ..Default::default()
                })
                .await
                .unwrap();
            });
        });
    });
}

fn bench_search(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, _, _) = populated_store(&rt);
    let view = VideosView::new(store);

    c.bench_function("read_model/search_titles", |b| {
        b.iter(|| {
            rt.block_on(async {
                view.list_videos(ListVideos {
                    query: Some("VIDEO 1".into()),
                    ..Default::default()
                })
                .await
                .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_comment_page, bench_video_listing, bench_search);
criterion_main!(benches);
