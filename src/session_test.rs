use super::*;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use scene::consts::PLACEHOLDER_PNG;
use scene::geom::Point;
use scene::input::{Key, Modifiers};
use scene::notice::NoticeKind;

use crate::loader::{FetchMode, ImageFetcher};

fn png_bytes(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
    buf
}

// =========================================================================
// Mocks
// =========================================================================

/// Serves every URL containing "ok" with a PNG after `delay_ms` taken from a
/// `?ms=` suffix; anything else fails. `?opaque` serves without CORS.
struct MockFetcher;

fn delay_of(url: &str) -> u64 {
    url.split("ms=").nth(1).and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[async_trait::async_trait]
impl ImageFetcher for MockFetcher {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Vec<u8>, LoadError> {
        tokio::time::sleep(Duration::from_millis(delay_of(url))).await;
        if !url.contains("ok") {
            return Err(LoadError::Status(404));
        }
        if url.contains("opaque") && mode == FetchMode::Cors {
            return Err(LoadError::CorsDenied);
        }
        Ok(png_bytes(100, 80, [200, 10, 10, 255]))
    }
}

struct MockPublisher {
    result: Mutex<Option<Result<PublishReceipt, PublishError>>>,
    seen: Mutex<Vec<PublishPayload>>,
}

impl MockPublisher {
    fn ok() -> Self {
        Self::with(Ok(PublishReceipt {
            success: true,
            public_url: "https://boards.example/m/1".into(),
            moodboard_id: Some("1".into()),
        }))
    }

    fn failing(message: &str) -> Self {
        Self::with(Err(PublishError::Rejected { status: 500, message: message.into() }))
    }

    fn with(result: Result<PublishReceipt, PublishError>) -> Self {
        Self { result: Mutex::new(Some(result)), seen: Mutex::new(Vec::new()) }
    }

    fn payloads(&self) -> Vec<PublishPayload> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, payload: &PublishPayload) -> Result<PublishReceipt, PublishError> {
        self.seen.lock().unwrap().push(payload.clone());
        self.result.lock().unwrap().take().unwrap_or(Err(PublishError::NotSuccessful))
    }
}

fn session() -> Session {
    let engine = EngineCore::new(800.0, 600.0).unwrap();
    let loads = LoadQueue::new(Arc::new(MockFetcher), Duration::from_secs(2), 16);
    Session::new(engine, loads)
}

fn messages(session: &mut Session) -> Vec<(NoticeKind, String)> {
    session.take_notices().into_iter().map(|n| (n.kind, n.message)).collect()
}

const WAIT: Duration = Duration::from_secs(2);

// =========================================================================
// Loading
// =========================================================================

#[tokio::test]
async fn requested_image_appears_after_settle() {
    let mut s = session();
    assert!(s.request_image("https://cdn.example/ok.png").is_some());
    assert_eq!(s.pending_loads(), 1);
    assert!(s.engine().objects().is_empty());

    assert_eq!(s.settle(WAIT).await, 1);
    assert_eq!(s.pending_loads(), 0);
    let obj = &s.engine().objects()[0];
    assert_eq!(obj.source, ObjectSource::Url("https://cdn.example/ok.png".into()));
    assert!(s.take_redraw());
    assert_eq!(messages(&mut s), vec![(NoticeKind::Success, notice::IMAGE_ADDED.to_owned())]);
}

#[tokio::test]
async fn invalid_url_notifies_without_loading() {
    let mut s = session();
    assert!(s.request_image("not a url").is_none());
    assert_eq!(s.pending_loads(), 0);
    assert_eq!(messages(&mut s), vec![(NoticeKind::Error, notice::INVALID_URL.to_owned())]);
}

#[tokio::test]
async fn failed_load_notifies_and_leaves_scene() {
    let mut s = session();
    s.request_image("https://cdn.example/missing.png");
    assert_eq!(s.settle(WAIT).await, 0);
    assert!(s.engine().objects().is_empty());
    assert_eq!(messages(&mut s), vec![(NoticeKind::Error, notice::LOAD_FAILED.to_owned())]);
}

#[tokio::test]
async fn objects_paint_in_completion_order() {
    let mut s = session();
    s.request_image("https://cdn.example/ok-slow.png?ms=150");
    s.request_image("https://cdn.example/ok-fast.png?ms=5");
    assert_eq!(s.settle(WAIT).await, 2);

    let urls = s.engine().scene.source_urls();
    assert_eq!(urls, vec!["https://cdn.example/ok-fast.png?ms=5", "https://cdn.example/ok-slow.png?ms=150"]);
}

#[tokio::test]
async fn pump_does_not_wait() {
    let mut s = session();
    s.request_image("https://cdn.example/ok.png?ms=200");
    assert_eq!(s.pump(), 0);
    assert_eq!(s.pending_loads(), 1);
}

#[tokio::test]
async fn settle_gives_up_at_deadline() {
    let mut s = session();
    s.request_image("https://cdn.example/ok.png?ms=500");
    assert_eq!(s.settle(Duration::from_millis(20)).await, 0);
    assert_eq!(s.pending_loads(), 1);
    // still interactive while the load is outstanding
    s.run(EngineCore::arrange_grid);
}

#[tokio::test]
async fn late_completion_after_close_is_discarded() {
    let mut s = session();
    s.request_image("https://cdn.example/ok.png?ms=30");
    s.close();
    assert!(!s.is_alive());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(s.pump(), 0);
    assert!(s.engine().objects().is_empty());
    assert!(s.request_image("https://cdn.example/ok.png").is_none());
}

#[tokio::test]
async fn paste_places_sentinel_object() {
    let mut s = session();
    let id = s.paste_image(&png_bytes(40, 40, [0, 0, 255, 255])).unwrap();
    assert_eq!(s.engine().object(&id).unwrap().source, ObjectSource::Pasted);
    assert!(s.product_links().is_empty());
    assert_eq!(messages(&mut s), vec![(NoticeKind::Success, notice::IMAGE_PASTED.to_owned())]);
}

#[tokio::test]
async fn bad_paste_notifies() {
    let mut s = session();
    assert!(matches!(s.paste_image(b"nope"), Err(SessionError::Load(_))));
    assert_eq!(messages(&mut s), vec![(NoticeKind::Error, notice::PASTE_FAILED.to_owned())]);
}

// =========================================================================
// Engine operations
// =========================================================================

#[tokio::test]
async fn run_absorbs_actions() {
    let mut s = session();
    s.request_image("https://cdn.example/ok.png");
    s.settle(WAIT).await;
    s.take_notices();
    s.take_redraw();

    s.run(|e| e.on_pointer_down(Point::new(400.0, 300.0), scene::input::Button::Primary, Modifiers::default()));
    assert!(s.engine().selection().is_some());
    s.run(|e| e.on_key_down(&Key::new("r"), Modifiers::default()));
    assert!(s.take_redraw());
    assert_eq!(messages(&mut s), vec![(NoticeKind::Success, notice::IMAGE_ROTATED.to_owned())]);
}

#[tokio::test]
async fn try_run_propagates_errors() {
    let mut s = session();
    assert!(matches!(s.try_run(|e| e.set_background("chartreuse")), Err(SessionError::Color(_))));
    assert!(matches!(s.try_run(|e| e.resize_canvas(0.0, 10.0)), Err(SessionError::Scene(_))));
    s.try_run(|e| e.set_background("#000")).unwrap();
    assert_eq!(s.engine().background(), image::Rgba([0, 0, 0, 255]));

    s.close();
    assert!(matches!(s.try_run(|e| e.set_background("#fff")), Err(SessionError::Closed)));
}

#[tokio::test]
async fn export_of_cross_origin_board_is_placeholder() {
    let mut s = session();
    s.request_image("https://cdn.example/ok-opaque.png");
    s.settle(WAIT).await;
    s.take_notices();

    let composite = s.export(600, 600);
    assert!(composite.fallback);
    assert_eq!(composite.png, PLACEHOLDER_PNG);
    assert_eq!(messages(&mut s), vec![(NoticeKind::Info, notice::EXPORT_PLACEHOLDER.to_owned())]);
}

// =========================================================================
// Publish
// =========================================================================

#[tokio::test]
async fn publish_empty_board_is_refused() {
    let mut s = session();
    let publisher = MockPublisher::ok();
    assert!(matches!(s.publish(&publisher, 600, 600).await, Err(SessionError::EmptyBoard)));
    assert!(publisher.payloads().is_empty());
    assert_eq!(messages(&mut s), vec![(NoticeKind::Error, notice::EMPTY_BOARD.to_owned())]);
    assert!(s.is_alive());
}

#[tokio::test]
async fn publish_success_ends_session() {
    let mut s = session();
    s.set_title("Bedroom");
    s.request_image("https://shop.example/items/ok-linen-throw.png");
    s.settle(WAIT).await;
    s.paste_image(&png_bytes(10, 10, [0, 0, 0, 255])).unwrap();
    s.take_notices();

    let publisher = MockPublisher::ok();
    let receipt = s.publish(&publisher, 600, 600).await.unwrap();
    assert_eq!(receipt.public_url, "https://boards.example/m/1");
    assert!(!s.is_alive());
    assert_eq!(
        messages(&mut s),
        vec![
            (NoticeKind::Success, notice::EXPORTED.to_owned()),
            (NoticeKind::Success, notice::PUBLISHED.to_owned()),
        ]
    );

    let payloads = publisher.payloads();
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert_eq!(payload.title, "Bedroom");
    assert_eq!(payload.canvas_size, scene::geom::Size::new(800.0, 600.0));
    assert!(payload.image.starts_with("data:image/png;base64,"));
    // the pasted image is not a product
    assert_eq!(payload.products.len(), 1);
    assert_eq!(payload.products[0].title, "ok linen throw");
}

#[tokio::test]
async fn publish_failure_keeps_board() {
    let mut s = session();
    s.request_image("https://cdn.example/ok.png");
    s.settle(WAIT).await;
    s.take_notices();

    let err = s.publish(&MockPublisher::failing("Storage offline"), 600, 600).await.unwrap_err();
    assert!(matches!(err, SessionError::Publish(_)));
    assert!(s.is_alive());
    assert_eq!(s.engine().objects().len(), 1);
    assert_eq!(
        messages(&mut s),
        vec![
            (NoticeKind::Success, notice::EXPORTED.to_owned()),
            (NoticeKind::Error, "Storage offline".to_owned()),
        ]
    );

    // retry succeeds without rebuilding
    assert!(s.publish(&MockPublisher::ok(), 600, 600).await.is_ok());
}

#[tokio::test]
async fn untitled_board_gets_default_title() {
    let mut s = session();
    s.request_image("https://cdn.example/ok.png");
    s.settle(WAIT).await;
    let publisher = MockPublisher::ok();
    s.publish(&publisher, 600, 600).await.unwrap();
    assert_eq!(publisher.payloads()[0].title, crate::publish::DEFAULT_TITLE);
}

#[tokio::test]
async fn publish_of_tainted_board_reports_placeholder() {
    let mut s = session();
    s.request_image("https://cdn.example/ok-opaque.png");
    s.settle(WAIT).await;
    s.take_notices();

    let publisher = MockPublisher::ok();
    s.publish(&publisher, 600, 600).await.unwrap();
    assert_eq!(
        messages(&mut s),
        vec![
            (NoticeKind::Info, notice::EXPORT_PLACEHOLDER.to_owned()),
            (NoticeKind::Success, notice::PUBLISHED.to_owned()),
        ]
    );
    assert_eq!(publisher.payloads()[0].image, crate::publish::data_url(PLACEHOLDER_PNG));
}
